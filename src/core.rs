// Turns one notation char on one channel into a hit on the output.
// Shared by the realtime clock and the offline renderer so both make the
// same choice of take and gain for the same step.

use std::sync::Arc;

use crate::audio::SampleBuffer;
use crate::audio_api::{AudioOutput, PlayParams};
use crate::loader::{InstrumentSounds, Sound, SoundBank, SoundSource};
use crate::pipeline::notation::{Articulation, Stroke, classify};
use crate::shared::{Instrument, MAX_VOLUME};

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TriggerEvent {
    pub instrument: Instrument,
    pub articulation: Articulation,
    pub source: SoundSource,
    pub gain: f32,
}

/// A decided hit plus the buffer it plays.
#[derive(Clone, Debug)]
pub struct PlannedHit {
    pub event: TriggerEvent,
    pub buffer: Arc<SampleBuffer>,
}

pub fn gain(master: u8, instrument_volume: u8) -> f32 {
    let master = master.min(MAX_VOLUME) as f32 / MAX_VOLUME as f32;
    let volume = instrument_volume.min(MAX_VOLUME) as f32 / MAX_VOLUME as f32;
    master * volume
}

pub fn select_sound(sounds: &InstrumentSounds, instrument: Instrument, articulation: Articulation) -> &Sound {
    use Articulation::*;
    match (instrument, articulation) {
        (Instrument::Ag, LowBell | HighBell) | (Instrument::Sn, Standard | Ghost) => sounds.get(articulation),
        (i, Open) if i.is_surdo() => sounds.get(Open),
        _ => &sounds.default,
    }
}

/// Decide what a char plays without playing it. `None` for rests and
/// instruments the bank has nothing for.
pub fn plan(bank: &SoundBank, instrument: Instrument, c: char, instrument_volume: u8, master: u8) -> Option<PlannedHit> {
    let Stroke::Hit(articulation) = classify(c) else {
        return None;
    };
    let Some(sounds) = bank.get(instrument) else {
        tracing::trace!(%instrument, "no sounds loaded, skipping hit");
        return None;
    };
    let sound = select_sound(sounds, instrument, articulation);
    Some(PlannedHit {
        event: TriggerEvent {
            instrument,
            articulation,
            source: sound.source,
            gain: gain(master, instrument_volume),
        },
        buffer: Arc::clone(&sound.buffer),
    })
}

/// Fire-and-forget: a full or closed output drops the hit.
pub fn trigger(
    bank: &SoundBank,
    output: &dyn AudioOutput,
    instrument: Instrument,
    c: char,
    instrument_volume: u8,
    master: u8,
) -> Option<TriggerEvent> {
    let hit = plan(bank, instrument, c, instrument_volume, master)?;
    let event = hit.event;
    if !output.play(PlayParams { buffer: hit.buffer, gain: event.gain }) {
        tracing::debug!(%instrument, "output dropped hit");
        return None;
    }
    tracing::trace!(%instrument, articulation = ?event.articulation, gain = event.gain, "hit");
    Some(event)
}
