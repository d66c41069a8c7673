// Process-wide store of decoded takes. One OnceCell per sample id, so any
// number of concurrent requests for the same take share a single fetch, and
// whatever that fetch produced (a buffer or a failure) is kept for good.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::OnceCell;
use tokio::task::JoinSet;

use crate::audio::{FallbackSpec, SampleBuffer, SampleId, synthesize};
use crate::error::FetchError;
use crate::shared::Instrument;

use super::source::SampleSource;

type Slot = Arc<OnceCell<Option<Arc<SampleBuffer>>>>;

pub struct SampleCache {
    source: Arc<dyn SampleSource>,
    sample_rate: u32,
    slots: Mutex<HashMap<SampleId, Slot>>,
    synthesized: Mutex<HashMap<Instrument, Arc<SampleBuffer>>>,
}

impl SampleCache {
    pub fn new(source: Arc<dyn SampleSource>, sample_rate: u32) -> Self {
        Self {
            source,
            sample_rate,
            slots: Mutex::new(HashMap::new()),
            synthesized: Mutex::new(HashMap::new()),
        }
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn slot(&self, id: SampleId) -> Slot {
        let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(slots.entry(id).or_default())
    }

    /// Fetch and decode a take, or return what an earlier call got.
    /// `None` means the take is unavailable; that outcome is memoized too.
    pub async fn load(&self, id: SampleId) -> Option<Arc<SampleBuffer>> {
        let slot = self.slot(id);
        slot.get_or_init(|| async {
            match self.fetch_and_decode(id).await {
                Ok(buffer) => {
                    tracing::debug!(%id, frames = buffer.len(), "sample loaded");
                    Some(Arc::new(buffer))
                }
                Err(e) => {
                    tracing::warn!(%id, "sample unavailable: {e:#}");
                    None
                }
            }
        })
        .await
        .clone()
    }

    async fn fetch_and_decode(&self, id: SampleId) -> anyhow::Result<SampleBuffer> {
        let bytes = self.source.fetch(id).await?;
        if bytes.is_empty() {
            return Err(FetchError::Empty(self.source.locate(id)).into());
        }
        let extension = self.source.extension().to_string();
        let rate = self.sample_rate;
        // decoding is CPU bound, keep it off the async workers
        let buffer = tokio::task::spawn_blocking(move || {
            SampleBuffer::decode(&bytes, Some(extension.as_str()), rate)
        })
        .await??;
        if buffer.is_empty() {
            return Err(FetchError::Empty(self.source.locate(id)).into());
        }
        Ok(buffer)
    }

    /// Result of a finished load, without starting one.
    pub fn peek(&self, id: SampleId) -> Option<Option<Arc<SampleBuffer>>> {
        let slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        slots.get(&id).and_then(|slot| slot.get().cloned())
    }

    /// Load a set of takes concurrently. Returns how many decoded.
    pub async fn load_all(self: &Arc<Self>, ids: impl IntoIterator<Item = SampleId>) -> usize {
        let mut set = JoinSet::new();
        for id in ids {
            let cache = Arc::clone(self);
            set.spawn(async move { cache.load(id).await.is_some() });
        }
        let mut loaded = 0;
        while let Some(joined) = set.join_next().await {
            match joined {
                Ok(true) => loaded += 1,
                Ok(false) => {}
                Err(e) => tracing::warn!("sample load task failed: {e}"),
            }
        }
        loaded
    }

    pub fn loaded_count(&self) -> usize {
        let slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        slots.values().filter(|s| matches!(s.get(), Some(Some(_)))).count()
    }

    /// The synthesized stand-in for an instrument, built once per cache.
    pub fn synthesized(&self, instrument: Instrument, spec: FallbackSpec) -> Arc<SampleBuffer> {
        let mut synthesized = self.synthesized.lock().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(
            synthesized
                .entry(instrument)
                .or_insert_with(|| Arc::new(synthesize(spec, self.sample_rate))),
        )
    }
}
