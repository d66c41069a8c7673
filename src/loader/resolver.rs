use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use crate::audio::{FallbackKind, FallbackSpec, SampleBuffer, SampleId, synthesize};
use crate::pipeline::notation::Articulation;
use crate::pipeline::tune::{Tune, Variant};
use crate::shared::Instrument;

use super::sample_cache::SampleCache;

/// Which takes an instrument plays and what to synthesize when none decode.
#[derive(Clone, Copy, Debug)]
pub struct InstrumentProfile {
    pub instrument: Instrument,
    pub preferred: &'static [u8], // primary take first, then alternates
    pub fallback: FallbackSpec,
    pub articulations: &'static [(Articulation, u8)],
}

impl InstrumentProfile {
    pub fn primary(&self) -> Option<SampleId> {
        self.preferred.first().map(|code| SampleId::new(self.instrument, *code))
    }
}

const fn profile_for(
    instrument: Instrument,
    preferred: &'static [u8],
    fallback: FallbackSpec,
    articulations: &'static [(Articulation, u8)],
) -> InstrumentProfile {
    InstrumentProfile { instrument, preferred, fallback, articulations }
}

const PROFILES: [InstrumentProfile; 9] = [
    profile_for(
        Instrument::Ls,
        &[0x73, 0x74],
        FallbackSpec::new(FallbackKind::Kick, 60.0, 0.5),
        &[(Articulation::Open, 0x30)],
    ),
    profile_for(
        Instrument::Ms,
        &[0x73, 0x74],
        FallbackSpec::new(FallbackKind::Kick, 80.0, 0.4),
        &[(Articulation::Open, 0x30)],
    ),
    profile_for(
        Instrument::Hs,
        &[0x74, 0x73],
        FallbackSpec::new(FallbackKind::Kick, 100.0, 0.3),
        &[(Articulation::Open, 0x30)],
    ),
    profile_for(Instrument::Re, &[0x58], FallbackSpec::new(FallbackKind::Snare, 200.0, 0.2), &[]),
    profile_for(
        Instrument::Sn,
        &[0x58],
        FallbackSpec::new(FallbackKind::Snare, 150.0, 0.2),
        &[(Articulation::Standard, 0x58), (Articulation::Ghost, 0x2e)],
    ),
    profile_for(Instrument::Ta, &[0x58], FallbackSpec::new(FallbackKind::Hihat, 300.0, 0.1), &[]),
    profile_for(
        Instrument::Ag,
        &[0x61],
        FallbackSpec::new(FallbackKind::Bell, 800.0, 0.3),
        &[(Articulation::LowBell, 0x61), (Articulation::HighBell, 0x6f)],
    ),
    profile_for(Instrument::Sh, &[0x58, 0x2e], FallbackSpec::new(FallbackKind::Hihat, 5000.0, 0.1), &[]),
    profile_for(Instrument::Ot, &[0x42], FallbackSpec::new(FallbackKind::Bell, 400.0, 0.2), &[]),
];

pub fn profile(instrument: Instrument) -> &'static InstrumentProfile {
    // PROFILES follows Instrument::ALL order
    &PROFILES[instrument as usize]
}

/// Takes a variant needs up front: each used instrument's primary take, its
/// fixed articulation takes, and the open tone only where a surdo channel has a `0`.
pub fn required_samples_for_variant(variant: &Variant) -> BTreeSet<SampleId> {
    let mut ids = BTreeSet::new();
    for instrument in variant.used_instruments() {
        let profile = profile(instrument);
        ids.extend(profile.primary());
        let has_open = variant
            .playable_channel(instrument)
            .is_some_and(|n| n.contains(Articulation::Open.symbol()));
        for (articulation, code) in profile.articulations {
            if *articulation != Articulation::Open || has_open {
                ids.insert(SampleId::new(instrument, *code));
            }
        }
    }
    ids
}

pub fn required_samples(tune: &Tune) -> BTreeSet<SampleId> {
    tune.variants.iter().flat_map(required_samples_for_variant).collect()
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SoundSource {
    Sample(SampleId),
    Synth(Instrument),
}

#[derive(Clone, Debug)]
pub struct Sound {
    pub source: SoundSource,
    pub buffer: Arc<SampleBuffer>,
}

#[derive(Clone, Debug)]
pub struct InstrumentSounds {
    pub default: Sound,
    pub variants: BTreeMap<Articulation, Sound>,
}

impl InstrumentSounds {
    pub fn get(&self, articulation: Articulation) -> &Sound {
        self.variants.get(&articulation).unwrap_or(&self.default)
    }
}

/// First take of the preference list that decodes, else the synthesized
/// stand-in. Alternates are only requested when an earlier take failed.
/// Articulation takes that are not in `wanted` are left to the default.
pub async fn resolve_for_instrument(
    instrument: Instrument,
    cache: &SampleCache,
    wanted: &BTreeSet<SampleId>,
) -> InstrumentSounds {
    let profile = profile(instrument);

    let mut default = None;
    for code in profile.preferred {
        let id = SampleId::new(instrument, *code);
        if let Some(buffer) = cache.load(id).await {
            default = Some(Sound { source: SoundSource::Sample(id), buffer });
            break;
        }
    }
    let default = default.unwrap_or_else(|| {
        tracing::info!(%instrument, "no take decoded, using synthesized sound");
        Sound {
            source: SoundSource::Synth(instrument),
            buffer: cache.synthesized(instrument, profile.fallback),
        }
    });

    let mut variants = BTreeMap::new();
    for (articulation, code) in profile.articulations {
        let id = SampleId::new(instrument, *code);
        if !wanted.contains(&id) {
            continue;
        }
        let sound = match cache.load(id).await {
            Some(buffer) => Sound { source: SoundSource::Sample(id), buffer },
            None => default.clone(),
        };
        variants.insert(*articulation, sound);
    }

    InstrumentSounds { default, variants }
}

/// Playable sounds for every instrument a tune uses.
#[derive(Clone, Debug, Default)]
pub struct SoundBank {
    sounds: BTreeMap<Instrument, InstrumentSounds>,
}

impl SoundBank {
    pub async fn load_for_tune(cache: &Arc<SampleCache>, tune: &Tune) -> Self {
        let wanted = required_samples(tune);
        let instruments: BTreeSet<Instrument> =
            tune.variants.iter().flat_map(|v| v.used_instruments()).collect();
        Self::load(cache, instruments, wanted).await
    }

    pub async fn load_for_variant(cache: &Arc<SampleCache>, variant: &Variant) -> Self {
        let wanted = required_samples_for_variant(variant);
        Self::load(cache, variant.used_instruments().collect(), wanted).await
    }

    async fn load(cache: &Arc<SampleCache>, instruments: BTreeSet<Instrument>, wanted: BTreeSet<SampleId>) -> Self {
        let decoded = cache.load_all(wanted.iter().copied()).await;
        tracing::info!(requested = wanted.len(), decoded, "samples ready");
        let mut sounds = BTreeMap::new();
        for instrument in instruments {
            sounds.insert(instrument, resolve_for_instrument(instrument, cache, &wanted).await);
        }
        Self { sounds }
    }

    /// Synthesized sounds for every instrument, no fetching at all.
    pub fn fallback_only(sample_rate: u32) -> Self {
        let sounds = Instrument::ALL
            .into_iter()
            .map(|instrument| {
                let sound = Sound {
                    source: SoundSource::Synth(instrument),
                    buffer: Arc::new(synthesize(profile(instrument).fallback, sample_rate)),
                };
                (instrument, InstrumentSounds { default: sound, variants: BTreeMap::new() })
            })
            .collect();
        Self { sounds }
    }

    pub fn get(&self, instrument: Instrument) -> Option<&InstrumentSounds> {
        self.sounds.get(&instrument)
    }

    pub fn instruments(&self) -> impl Iterator<Item = Instrument> + '_ {
        self.sounds.keys().copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::wav_bytes;
    use crate::pipeline::test_fixture::MemorySource;

    fn id(instrument: Instrument, code: u8) -> SampleId {
        SampleId::new(instrument, code)
    }

    #[test]
    fn profiles_line_up_with_instruments() {
        for instrument in Instrument::ALL {
            assert_eq!(profile(instrument).instrument, instrument);
            assert!(profile(instrument).primary().is_some());
        }
    }

    #[test]
    fn required_samples_cover_articulations() {
        let v = Variant::new("t")
            .with_channel(Instrument::Sn, ".X.X")
            .with_channel(Instrument::Ag, "a o ")
            .with_channel(Instrument::Ls, "X   ")
            .with_channel(Instrument::Ms, "0  X")
            .with_channel(Instrument::Re, "    ");
        let ids = required_samples_for_variant(&v);
        let expected: BTreeSet<_> = [
            id(Instrument::Sn, 0x58),
            id(Instrument::Sn, 0x2e),
            id(Instrument::Ag, 0x61),
            id(Instrument::Ag, 0x6f),
            id(Instrument::Ls, 0x73),
            id(Instrument::Ms, 0x73),
            id(Instrument::Ms, 0x30),
        ]
        .into();
        assert_eq!(ids, expected);
    }

    #[tokio::test]
    async fn alternate_take_only_after_primary_fails() {
        let source = Arc::new(MemorySource::new().with(id(Instrument::Ls, 0x74), wav_bytes(&[500; 16], 1, 44100)));
        let cache = SampleCache::new(source.clone(), 44100);

        let sounds = resolve_for_instrument(Instrument::Ls, &cache, &BTreeSet::new()).await;
        assert_eq!(sounds.default.source, SoundSource::Sample(id(Instrument::Ls, 0x74)));
        assert_eq!(source.fetch_count(id(Instrument::Ls, 0x73)), 1);

        let source = Arc::new(
            MemorySource::new()
                .with(id(Instrument::Hs, 0x74), wav_bytes(&[500; 16], 1, 44100))
                .with(id(Instrument::Hs, 0x73), wav_bytes(&[500; 16], 1, 44100)),
        );
        let cache = SampleCache::new(source.clone(), 44100);
        let sounds = resolve_for_instrument(Instrument::Hs, &cache, &BTreeSet::new()).await;
        assert_eq!(sounds.default.source, SoundSource::Sample(id(Instrument::Hs, 0x74)));
        assert_eq!(source.fetch_count(id(Instrument::Hs, 0x73)), 0);
    }

    #[tokio::test]
    async fn everything_failing_falls_back_to_synthesis() {
        let cache = SampleCache::new(Arc::new(MemorySource::new()), 8000);
        let sounds = resolve_for_instrument(Instrument::Ta, &cache, &BTreeSet::new()).await;
        assert_eq!(sounds.default.source, SoundSource::Synth(Instrument::Ta));
        assert_eq!(sounds.default.buffer.len(), 800);
    }

    #[tokio::test]
    async fn missing_articulation_uses_default() {
        let source = Arc::new(MemorySource::new().with(id(Instrument::Sn, 0x58), wav_bytes(&[500; 16], 1, 44100)));
        let cache = Arc::new(SampleCache::new(source, 44100));
        let v = Variant::new("t").with_channel(Instrument::Sn, ".X..");
        let bank = SoundBank::load_for_variant(&cache, &v).await;

        let sn = bank.get(Instrument::Sn).unwrap();
        assert_eq!(sn.get(Articulation::Standard).source, SoundSource::Sample(id(Instrument::Sn, 0x58)));
        assert_eq!(sn.get(Articulation::Ghost).source, SoundSource::Sample(id(Instrument::Sn, 0x58)));
        assert!(bank.get(Instrument::Ls).is_none());
    }

    #[test]
    fn fallback_bank_covers_every_instrument() {
        let bank = SoundBank::fallback_only(8000);
        assert_eq!(bank.instruments().count(), Instrument::ALL.len());
        assert!(bank.get(Instrument::Ag).is_some_and(|s| !s.default.buffer.is_empty()));
    }
}
