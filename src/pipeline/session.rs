// Everything a playing tune reads on each step, behind one lock so the UI can
// change tempo, volumes and mutes while the clock task is running.

use std::sync::{Arc, RwLock};

use crate::loader::SoundBank;
use crate::shared::{DEFAULT_MASTER_VOLUME, InstrumentStates, MAX_BPM, MAX_VOLUME, MIN_BPM};

use super::tune::{Tune, Variant};

pub type SharedSession = Arc<RwLock<Session>>;

#[derive(Clone, Debug)]
pub struct Session {
    pub tune: Tune,
    pub variant: String,
    pub tempo: f32,
    pub master_volume: u8,
    pub instruments: InstrumentStates,
    pub cursor: usize,
    pub sounds: Arc<SoundBank>,
    pub epoch: u64, // bumped on pause/stop, retires the running clock task
}

impl Session {
    pub fn new(tune: Tune) -> Self {
        let variant = tune.first_variant().map(|v| v.name.clone()).unwrap_or_default();
        let tempo = clamp_bpm(tune.tempo());
        Self {
            tune,
            variant,
            tempo,
            master_volume: DEFAULT_MASTER_VOLUME,
            instruments: InstrumentStates::default_mix(),
            cursor: 0,
            sounds: Arc::new(SoundBank::default()),
            epoch: 0,
        }
    }

    pub fn new_shared(tune: Tune) -> SharedSession {
        Arc::new(RwLock::new(Self::new(tune)))
    }

    pub fn current_variant(&self) -> Option<&Variant> {
        self.tune.variant(&self.variant)
    }

    pub fn set_tempo(&mut self, bpm: f32) {
        self.tempo = clamp_bpm(bpm);
    }

    pub fn set_master_volume(&mut self, volume: u8) {
        self.master_volume = volume.min(MAX_VOLUME);
    }
}

pub fn clamp_bpm(bpm: f32) -> f32 {
    if bpm.is_finite() {
        bpm.clamp(MIN_BPM, MAX_BPM)
    } else {
        crate::shared::DEFAULT_BPM
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::Instrument;

    #[test]
    fn new_session_selects_first_variant_and_tune_tempo() {
        let tune = Tune::custom("mine", 400.0, [(Instrument::Ls, "X".to_string())]);
        let session = Session::new(tune);
        assert_eq!(session.variant, "Custom");
        assert_eq!(session.tempo, MAX_BPM);
        assert!(session.current_variant().is_some());
        assert_eq!(session.cursor, 0);
    }

    #[test]
    fn setters_clamp() {
        let mut session = Session::new(Tune::default());
        session.set_tempo(5.0);
        assert_eq!(session.tempo, MIN_BPM);
        session.set_tempo(f32::NAN);
        assert_eq!(session.tempo, crate::shared::DEFAULT_BPM);
        session.set_master_volume(140);
        assert_eq!(session.master_volume, MAX_VOLUME);
        assert!(session.current_variant().is_none());
    }
}
