// Test doubles: an in-memory sample source that counts its fetches and an
// output that records every hit instead of playing it.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};

use crate::audio::SampleId;
use crate::audio_api::{AudioOutput, PlayParams};
use crate::error::{FetchError, OutputError};
use crate::loader::source::{FetchFuture, SampleSource};

#[derive(Default)]
pub struct MemorySource {
    files: HashMap<SampleId, Vec<u8>>,
    fetches: Mutex<HashMap<SampleId, usize>>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, id: SampleId, bytes: Vec<u8>) -> Self {
        self.files.insert(id, bytes);
        self
    }

    pub fn fetch_count(&self, id: SampleId) -> usize {
        let fetches = self.fetches.lock().unwrap_or_else(PoisonError::into_inner);
        fetches.get(&id).copied().unwrap_or(0)
    }
}

impl SampleSource for MemorySource {
    fn fetch(&self, id: SampleId) -> FetchFuture<'_> {
        *self
            .fetches
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(id)
            .or_default() += 1;
        let file = self.files.get(&id).cloned();
        Box::pin(async move {
            // let other loaders pile up on the same cell
            tokio::task::yield_now().await;
            file.ok_or(FetchError::Missing(id))
        })
    }

    fn extension(&self) -> &str {
        "wav"
    }

    fn locate(&self, id: SampleId) -> String {
        format!("memory://{id}")
    }
}

pub struct RecordingOutput {
    sample_rate: u32,
    hits: Mutex<Vec<PlayParams>>,
    closed: AtomicBool,
    resumes: AtomicUsize,
}

impl RecordingOutput {
    pub fn new(sample_rate: u32) -> Self {
        Self {
            sample_rate,
            hits: Mutex::new(Vec::new()),
            closed: AtomicBool::new(false),
            resumes: AtomicUsize::new(0),
        }
    }

    pub fn close(&self) {
        self.closed.store(true, Ordering::Relaxed);
    }

    pub fn hits(&self) -> Vec<PlayParams> {
        self.hits.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn resume_count(&self) -> usize {
        self.resumes.load(Ordering::Relaxed)
    }

    pub fn clear(&self) {
        self.hits.lock().unwrap_or_else(PoisonError::into_inner).clear();
    }
}

impl AudioOutput for RecordingOutput {
    fn play(&self, params: PlayParams) -> bool {
        if self.closed.load(Ordering::Relaxed) {
            return false;
        }
        self.hits.lock().unwrap_or_else(PoisonError::into_inner).push(params);
        true
    }

    fn resume(&self) -> Result<(), OutputError> {
        self.resumes.fetch_add(1, Ordering::Relaxed);
        if self.closed.load(Ordering::Relaxed) {
            return Err(OutputError::Disconnected);
        }
        Ok(())
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }
}
