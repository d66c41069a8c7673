pub mod resolver;
pub mod sample_cache;
pub mod source;

pub use resolver::{InstrumentSounds, Sound, SoundBank, SoundSource, required_samples, required_samples_for_variant};
pub use sample_cache::SampleCache;
pub use source::{DirSource, HttpSource, SampleSource, source_for};
