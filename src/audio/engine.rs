use crate::audio_api::{AudioCommand, PlayParams};

use super::frame::StereoFrame;
use super::voice::Voice;

const MAX_VOICES: usize = 32; // hard cap so we wont malloc in audio callback

/// Mixes every ringing hit. Driven by the cpal callback in realtime and by
/// the offline renderer, so both hear exactly the same thing.
pub struct Engine {
    voices: Vec<Voice>, // pre-allocated to MAX_VOICES
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}

impl Engine {
    pub fn new() -> Self {
        Self {
            voices: Vec::with_capacity(MAX_VOICES),
        }
    }

    pub fn active_voices(&self) -> usize {
        self.voices.len()
    }

    pub fn handle_cmd(&mut self, cmd: AudioCommand) {
        match cmd {
            AudioCommand::Play(p) => self.trigger_voice(p),
        }
    }

    fn trigger_voice(&mut self, p: PlayParams) {
        if p.buffer.is_empty() {
            return;
        }
        let voice = Voice::new(p.buffer, p.gain);
        if self.voices.len() < MAX_VOICES {
            self.voices.push(voice);
            return;
        }
        // pool is full: steal whichever voice has been ringing longest
        if let Some(oldest) = self
            .voices
            .iter_mut()
            .max_by_key(|v| v.position())
        {
            *oldest = voice;
        }
    }

    /// Overwrite `out` with the mix of every live voice.
    pub fn render_block(&mut self, out: &mut [StereoFrame]) {
        out.fill(StereoFrame::zero());
        self.voices.retain_mut(|v| v.render_into(out));
    }
}
