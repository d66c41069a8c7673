use std::sync::{Arc, PoisonError, RwLockReadGuard, RwLockWriteGuard};

use tokio::sync::watch;

use crate::audio_api::AudioOutput;
use crate::error::TransportError;
use crate::loader::{SampleCache, SoundBank, required_samples};
use crate::shared::{Instrument, InstrumentStates};

use super::clock::{ClockState, PlaybackClock};
use super::library::TuneLibrary;
use super::session::{Session, SharedSession};
use super::tune::{Tune, Variant};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TransportStatus {
    pub is_playing: bool,
    pub is_audio_loaded: bool,
    pub current_step: usize,
}

/// Play/pause/stop and live controls over one session.
pub struct Transport {
    library: TuneLibrary,
    session: SharedSession,
    cache: Arc<SampleCache>,
    output: Arc<dyn AudioOutput>,
    clock: PlaybackClock,
    loaded_tx: watch::Sender<bool>,
}

impl Transport {
    /// Starts on the library's first tune, or an empty one.
    pub fn new(library: TuneLibrary, cache: Arc<SampleCache>, output: Arc<dyn AudioOutput>) -> Self {
        let tune = library.iter().next().cloned().unwrap_or_default();
        let session = Session::new_shared(tune);
        let clock = PlaybackClock::new(Arc::clone(&session), Arc::clone(&output));
        let (loaded_tx, _) = watch::channel(false);
        Self {
            library,
            session,
            cache,
            output,
            clock,
            loaded_tx,
        }
    }

    pub fn session(&self) -> RwLockReadGuard<'_, Session> {
        self.session.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn session_mut(&self) -> RwLockWriteGuard<'_, Session> {
        self.session.write().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn status(&self) -> TransportStatus {
        TransportStatus {
            is_playing: self.clock.is_running(),
            is_audio_loaded: *self.loaded_tx.borrow(),
            current_step: self.session().cursor,
        }
    }

    pub fn clock_state(&self) -> ClockState {
        self.clock.state()
    }

    pub fn subscribe_steps(&self) -> watch::Receiver<usize> {
        self.clock.subscribe()
    }

    /// Resume the output, wait for the tune's takes, then start the clock.
    /// Already playing is a no-op.
    pub async fn play(&mut self) -> Result<(), TransportError> {
        if self.clock.is_running() {
            return Ok(());
        }
        self.check_variant()?;
        // a suspended output is expected before the first play
        if let Err(e) = self.output.resume() {
            tracing::warn!("could not resume audio output: {e}");
        }
        if !*self.loaded_tx.borrow() {
            self.load_sounds().await;
        }
        self.clock.start();
        let session = self.session();
        tracing::info!(tune = %session.tune.name, variant = %session.variant, "playing");
        Ok(())
    }

    /// Load the current tune's takes ahead of the first play.
    pub async fn preload(&mut self) {
        if !*self.loaded_tx.borrow() {
            self.load_sounds().await;
        }
    }

    pub fn pause(&mut self) {
        self.clock.pause();
    }

    pub fn stop(&mut self) {
        self.clock.stop();
    }

    fn check_variant(&self) -> Result<(), TransportError> {
        let session = self.session();
        if session.current_variant().is_none() {
            return Err(TransportError::VariantNotFound {
                tune: session.tune.name.clone(),
                variant: session.variant.clone(),
            });
        }
        Ok(())
    }

    async fn load_sounds(&self) {
        self.loaded_tx.send_replace(false);
        let tune = self.session().tune.clone();
        let bank = SoundBank::load_for_tune(&self.cache, &tune).await;
        let mut session = self.session_mut();
        // the tune may have been edited while loading; keep whatever we got
        session.sounds = Arc::new(bank);
        drop(session);
        self.loaded_tx.send_replace(true);
    }

    /// Switch to a library tune by name, starting on its first variant.
    /// Keeps playing if it was.
    pub async fn select_tune(&mut self, name: &str) -> Result<(), TransportError> {
        let tune = self
            .library
            .find(name)
            .cloned()
            .ok_or_else(|| TransportError::TuneNotFound(name.to_string()))?;
        self.load_tune(tune).await;
        Ok(())
    }

    /// Replace the session's tune with any tune, e.g. one being authored.
    pub async fn load_tune(&mut self, tune: Tune) {
        let tempo = tune.tempo();
        {
            let mut session = self.session_mut();
            session.variant = tune.first_variant().map(|v| v.name.clone()).unwrap_or_default();
            session.tune = tune;
            session.cursor = 0;
            self.clock.publish(0);
        }
        self.clock.set_tempo(tempo);
        self.loaded_tx.send_replace(false);
        if self.clock.is_running() {
            self.load_sounds().await;
        }
    }

    /// Unknown names leave everything as it was.
    pub async fn select_variant(&mut self, name: &str) -> Result<(), TransportError> {
        {
            let mut session = self.session_mut();
            if session.tune.variant(name).is_none() {
                return Err(TransportError::VariantNotFound {
                    tune: session.tune.name.clone(),
                    variant: name.to_string(),
                });
            }
            session.variant = name.to_string();
            session.cursor = 0;
            self.clock.publish(0);
        }
        if self.clock.is_running() || *self.loaded_tx.borrow() {
            self.load_sounds().await;
        }
        Ok(())
    }

    /// Write one step of the current variant. The new stroke plays on the
    /// next pass; call `refresh_sounds` to fetch takes it needs.
    pub fn set_step(&mut self, instrument: Instrument, step: usize, symbol: char) -> Result<(), TransportError> {
        self.edit_variant(|variant| variant.set_step(instrument, step, symbol))
    }

    /// Remove one instrument's part from the current variant.
    pub fn clear_channel(&mut self, instrument: Instrument) -> Result<(), TransportError> {
        self.edit_variant(|variant| variant.clear_channel(instrument))
    }

    fn edit_variant(&mut self, edit: impl FnOnce(&mut Variant)) -> Result<(), TransportError> {
        self.check_variant()?;
        let mut session = self.session_mut();
        let variant_name = session.variant.clone();
        if let Some(variant) = session.tune.variant_mut(&variant_name) {
            edit(variant);
        }
        Ok(())
    }

    /// After an edit: load what the tune now needs if the current bank lacks it.
    /// Does nothing before the first load, since `play` loads everything anyway.
    pub async fn refresh_sounds(&mut self) {
        if !*self.loaded_tx.borrow() {
            return;
        }
        let stale = {
            let session = self.session();
            let missing_instrument = session
                .tune
                .variants
                .iter()
                .flat_map(|v| v.used_instruments())
                .any(|i| session.sounds.get(i).is_none());
            missing_instrument || required_samples(&session.tune).into_iter().any(|id| self.cache.peek(id).is_none())
        };
        if stale {
            tracing::debug!("edited tune needs more takes, reloading");
            self.load_sounds().await;
        }
    }

    pub fn set_tempo(&self, bpm: f32) {
        self.clock.set_tempo(bpm);
    }

    pub fn set_master_volume(&self, volume: u8) {
        self.session_mut().set_master_volume(volume);
    }

    pub fn set_instrument_enabled(&self, instrument: Instrument, enabled: bool) {
        self.session_mut().instruments.set_enabled(instrument, enabled);
    }

    pub fn toggle_instrument(&self, instrument: Instrument) -> bool {
        self.session_mut().instruments.toggle(instrument)
    }

    pub fn set_instrument_volume(&self, instrument: Instrument, volume: u8) {
        self.session_mut().instruments.set_volume(instrument, volume);
    }

    pub fn set_instruments(&self, states: InstrumentStates) {
        self.session_mut().instruments = states;
    }
}
