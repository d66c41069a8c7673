// Sits between the terminal front end and the transport: turns input events
// into transport calls and builds the DisplayState the view draws each frame.

use tokio::runtime::Handle;

use crate::pipeline::persistence::Settings;
use crate::pipeline::transport::Transport;
use crate::shared::{ChannelRow, DisplayState, InputEvent, Instrument, MAX_VOLUME};

const TEMPO_STEP: f32 = 5.0;
const VOLUME_STEP: u8 = 5;

pub struct Middle {
    transport: Transport,
    runtime: Handle,
    selected_row: usize,
    edit_step: Option<usize>,
    status_text: String,
}

impl Middle {
    pub fn new(transport: Transport, runtime: Handle) -> Self {
        Self {
            transport,
            runtime,
            selected_row: 0,
            edit_step: None,
            status_text: String::new(),
        }
    }

    /// Block until the tune's takes are in, so the first play starts at once.
    pub fn preload(&mut self) {
        self.runtime.block_on(self.transport.preload());
    }

    pub fn handle_input(&mut self, event: InputEvent) {
        match event {
            InputEvent::PlayPress => {
                if self.transport.status().is_playing {
                    self.transport.pause();
                } else {
                    match self.runtime.block_on(self.transport.play()) {
                        Ok(()) => self.status_text.clear(),
                        Err(e) => self.status_text = e.to_string(),
                    }
                }
            }
            InputEvent::StopPress => self.transport.stop(),
            InputEvent::TempoDown => self.nudge_tempo(-TEMPO_STEP),
            InputEvent::TempoUp => self.nudge_tempo(TEMPO_STEP),
            InputEvent::VolumeDown => self.nudge_master(false),
            InputEvent::VolumeUp => self.nudge_master(true),
            InputEvent::ToggleInstrument(row) => {
                if let Some(instrument) = Instrument::ALL.get(row as usize) {
                    let enabled = self.transport.toggle_instrument(*instrument);
                    self.selected_row = row as usize;
                    tracing::debug!(%instrument, enabled, "toggled");
                }
            }
            InputEvent::SelectRow(delta) => {
                let rows = Instrument::ALL.len() as i32;
                self.selected_row = (self.selected_row as i32 + delta as i32).rem_euclid(rows) as usize;
            }
            InputEvent::RowVolume(delta) => {
                let instrument = self.selected_instrument();
                let current = self
                    .transport
                    .session()
                    .instruments
                    .get(instrument)
                    .map_or(0, |s| s.volume) as i16;
                let volume = (current + delta as i16).clamp(0, MAX_VOLUME as i16) as u8;
                self.transport.set_instrument_volume(instrument, volume);
            }
            InputEvent::NextVariant => self.next_variant(),
            InputEvent::ToggleEdit => {
                self.edit_step = match self.edit_step {
                    Some(_) => None,
                    None => Some(0),
                };
            }
            InputEvent::MoveEditStep(delta) => {
                let length = self.variant_length();
                if let Some(step) = self.edit_step.filter(|_| length > 0) {
                    self.edit_step = Some((step as i64 + delta as i64).rem_euclid(length as i64) as usize);
                }
            }
            InputEvent::WriteStep(symbol) => self.write_step(symbol),
            InputEvent::ClearRow => {
                if let Err(e) = self.transport.clear_channel(self.selected_instrument()) {
                    self.status_text = e.to_string();
                }
            }
            InputEvent::Quit => self.transport.stop(),
        }
    }

    fn selected_instrument(&self) -> Instrument {
        Instrument::ALL[self.selected_row % Instrument::ALL.len()]
    }

    fn variant_length(&self) -> usize {
        self.transport.session().current_variant().map_or(0, |v| v.effective_length())
    }

    // write at the edit column, then step right like a tracker
    fn write_step(&mut self, symbol: char) {
        let Some(step) = self.edit_step else {
            return;
        };
        let instrument = self.selected_instrument();
        if let Err(e) = self.transport.set_step(instrument, step, symbol) {
            self.status_text = e.to_string();
            return;
        }
        self.runtime.block_on(self.transport.refresh_sounds());
        let length = self.variant_length().max(1);
        self.edit_step = Some((step + 1) % length);
    }

    fn nudge_tempo(&mut self, delta: f32) {
        let tempo = self.transport.session().tempo;
        self.transport.set_tempo(tempo + delta);
    }

    fn nudge_master(&mut self, up: bool) {
        let master = self.transport.session().master_volume;
        let master = if up {
            master.saturating_add(VOLUME_STEP)
        } else {
            master.saturating_sub(VOLUME_STEP)
        };
        self.transport.set_master_volume(master);
    }

    fn next_variant(&mut self) {
        let next = {
            let session = self.transport.session();
            let names: Vec<&str> = session.tune.variant_names().collect();
            if names.is_empty() {
                return;
            }
            let current = names.iter().position(|n| *n == session.variant).unwrap_or(0);
            names[(current + 1) % names.len()].to_string()
        };
        if let Err(e) = self.runtime.block_on(self.transport.select_variant(&next)) {
            self.status_text = e.to_string();
        }
    }

    /// What to persist when the player quits.
    pub fn settings(&self, mut settings: Settings) -> Settings {
        let session = self.transport.session();
        settings.master_volume = session.master_volume;
        settings.instruments = session.instruments.clone();
        settings.last_tune = Some(session.tune.name.clone());
        settings
    }

    pub fn display_state(&self) -> DisplayState {
        let status = self.transport.status();
        let session = self.transport.session();
        let variant = session.current_variant();
        let length = variant.map_or(0, |v| v.effective_length());

        let rows = Instrument::ALL
            .into_iter()
            .map(|instrument| {
                let notation = variant
                    .and_then(|v| v.playable_channel(instrument))
                    .unwrap_or_default();
                let mut notation: String = notation.chars().take(length).collect();
                let pad = length.saturating_sub(notation.chars().count());
                notation.extend(std::iter::repeat_n(' ', pad));
                let state = session.instruments.get(instrument);
                ChannelRow {
                    instrument,
                    notation,
                    enabled: state.is_some_and(|s| s.enabled),
                    volume: state.map_or(0, |s| s.volume),
                }
            })
            .collect();

        let selected = self.selected_instrument();
        let mnemonic = variant.and_then(|v| {
            v.mnemonics
                .get(&selected)
                .or_else(|| v.mnemonics.values().next())
                .cloned()
        });

        DisplayState {
            title: session.tune.title().to_string(),
            variant: session.variant.clone(),
            variant_index: session.tune.variant_index(&session.variant).unwrap_or(0),
            variant_count: session.tune.variants.len(),
            playing: status.is_playing,
            audio_loaded: status.is_audio_loaded,
            current_step: session.cursor,
            length,
            bpm: session.tempo,
            master_volume: session.master_volume,
            rows,
            selected_row: self.selected_row,
            edit_step: self.edit_step,
            mnemonic,
            status_text: self.status_text.clone(),
        }
    }
}
