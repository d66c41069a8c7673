// Offline export: the same step decisions as the clock, laid out on a
// timeline and mixed through the same voice engine, then written as WAV.

pub mod wav;

use crate::audio::{Engine, StereoFrame};
use crate::audio_api::{AudioCommand, PlayParams};
use crate::core::PlannedHit;
use crate::error::RenderError;
use crate::loader::SoundBank;
use crate::pipeline::clock::{plan_step, step_secs};
use crate::pipeline::tune::{Tune, Variant};
use crate::shared::{DEFAULT_MASTER_VOLUME, InstrumentStates};

pub const DEFAULT_DURATION_SECS: f64 = 8.0;

#[derive(Clone, Debug)]
pub struct RenderOptions {
    pub tempo: f32,
    pub master_volume: u8,
    pub duration_secs: f64,
    pub sample_rate: u32,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            tempo: crate::shared::DEFAULT_BPM,
            master_volume: DEFAULT_MASTER_VOLUME,
            duration_secs: DEFAULT_DURATION_SECS,
            sample_rate: 44100,
        }
    }
}

#[derive(Clone, Debug)]
pub struct ScheduledHit {
    pub time_secs: f64,
    pub step: usize, // position inside the pattern
    pub hit: PlannedHit,
}

/// How many whole passes of the pattern fit in `duration_secs`.
pub fn loops_that_fit(length: usize, tempo: f32, duration_secs: f64) -> usize {
    let loop_secs = step_secs(tempo) * length as f64;
    if loop_secs <= 0.0 || !duration_secs.is_finite() {
        return 0;
    }
    // durations that are an exact multiple of the loop must not lose one to rounding
    (duration_secs / loop_secs + 1e-9).floor().max(0.0) as usize
}

/// Every hit of as many whole loops of the variant as fit in `duration_secs`.
/// The tail after the last whole loop stays silent.
pub fn schedule(
    variant: &Variant,
    tempo: f32,
    states: &InstrumentStates,
    master: u8,
    duration_secs: f64,
    bank: &SoundBank,
) -> Vec<ScheduledHit> {
    let step_secs = step_secs(tempo);
    let length = variant.effective_length();
    let steps = loops_that_fit(length, tempo, duration_secs) * length;

    let mut hits = Vec::new();
    for n in 0..steps {
        let time_secs = n as f64 * step_secs;
        let step = n % length;
        hits.extend(
            plan_step(variant, step, states, master, bank)
                .into_iter()
                .map(|hit| ScheduledHit { time_secs, step, hit }),
        );
    }
    hits
}

#[derive(Clone, Debug, PartialEq)]
pub struct RenderedAudio {
    pub frames: Vec<StereoFrame>,
    pub sample_rate: u32,
}

impl RenderedAudio {
    pub fn duration_secs(&self) -> f64 {
        self.frames.len() as f64 / self.sample_rate.max(1) as f64
    }

    pub fn peak(&self) -> f32 {
        self.frames.iter().map(|f| f.peak()).fold(0.0, f32::max)
    }
}

pub fn render(
    tune: &Tune,
    variant_name: &str,
    states: &InstrumentStates,
    bank: &SoundBank,
    options: &RenderOptions,
) -> Result<RenderedAudio, RenderError> {
    let variant = tune.variant(variant_name).ok_or_else(|| RenderError::VariantNotFound {
        tune: tune.name.clone(),
        variant: variant_name.to_string(),
    })?;
    if !(options.duration_secs.is_finite() && options.duration_secs > 0.0) {
        return Err(RenderError::InvalidDuration(options.duration_secs));
    }

    let hits = schedule(
        variant,
        options.tempo,
        states,
        options.master_volume,
        options.duration_secs,
        bank,
    );
    let rate = options.sample_rate.max(1);
    let total = (options.duration_secs * rate as f64).round() as usize;
    let mut frames = vec![StereoFrame::zero(); total];

    let mut engine = Engine::new();
    let mut rendered = 0;
    for scheduled in hits {
        let at = ((scheduled.time_secs * rate as f64).round() as usize).min(total);
        if at > rendered {
            engine.render_block(&mut frames[rendered..at]);
            rendered = at;
        }
        engine.handle_cmd(AudioCommand::Play(PlayParams {
            buffer: scheduled.hit.buffer,
            gain: scheduled.hit.event.gain,
        }));
    }
    engine.render_block(&mut frames[rendered..]);

    tracing::info!(tune = %tune.name, variant = variant_name, seconds = options.duration_secs, "rendered");
    Ok(RenderedAudio { frames, sample_rate: rate })
}
