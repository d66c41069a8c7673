use std::f32::consts::TAU;

use rand::{Rng, SeedableRng};
use rand_pcg::Pcg32;

use super::sample_buffer::SampleBuffer;

// Stand-in sounds for when no recorded take decodes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FallbackKind {
    Kick,  // decaying sine
    Snare, // decaying noise
    Hihat, // short decaying noise
    Bell,  // long decaying sine
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FallbackSpec {
    pub kind: FallbackKind,
    pub frequency: f32,
    pub duration: f32, // seconds
}

impl FallbackSpec {
    pub const fn new(kind: FallbackKind, frequency: f32, duration: f32) -> Self {
        Self { kind, frequency, duration }
    }
}

/// Same parameters, same samples: the noise generator is seeded from them.
pub fn synthesize(spec: FallbackSpec, sample_rate: u32) -> SampleBuffer {
    let len = (spec.duration.max(0.0) * sample_rate as f32) as usize;
    let rate = sample_rate.max(1) as f32;
    let seed = ((spec.kind as u64) << 56)
        ^ ((spec.frequency.to_bits() as u64) << 24)
        ^ spec.duration.to_bits() as u64
        ^ sample_rate as u64;
    let mut rng = Pcg32::seed_from_u64(seed);

    SampleBuffer::from_mono((0..len).map(|i| {
        let t = i as f32 / rate;
        match spec.kind {
            FallbackKind::Kick => (TAU * spec.frequency * t).sin() * (-t * 30.0).exp() * 0.5,
            FallbackKind::Snare => rng.random_range(-1.0f32..1.0) * (-t * 40.0).exp() * 0.3,
            FallbackKind::Hihat => rng.random_range(-1.0f32..1.0) * (-t * 100.0).exp() * 0.2,
            FallbackKind::Bell => (TAU * spec.frequency * t).sin() * (-t * 5.0).exp() * 0.3,
        }
    }))
}
