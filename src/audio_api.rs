use std::sync::Arc;

pub use crate::audio::{SampleBuffer, SampleId};
use crate::error::OutputError;

#[derive(Clone, Debug)]
pub struct PlayParams {
    pub buffer: Arc<SampleBuffer>,
    pub gain: f32,
}

#[derive(Clone, Debug)]
pub enum AudioCommand {
    // Buffers are decoded ahead of time (see loader/sample_cache.rs); the
    // engine only ever receives shared, ready-to-mix data.
    Play(PlayParams),
}

/// Where triggered hits go. Implementations must never block the caller.
pub trait AudioOutput: Send + Sync {
    /// Start a hit now. Returns false if the hit was dropped.
    fn play(&self, params: PlayParams) -> bool;

    /// Make sure the output is actually running. A suspended output is a
    /// precondition the first user-initiated play resolves, not a failure.
    fn resume(&self) -> Result<(), OutputError> {
        Ok(())
    }

    fn sample_rate(&self) -> u32;
}

/// Discards every hit; used for headless runs.
#[derive(Clone, Copy, Debug)]
pub struct NullOutput {
    pub sample_rate: u32,
}

impl AudioOutput for NullOutput {
    fn play(&self, _params: PlayParams) -> bool {
        true
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }
}
