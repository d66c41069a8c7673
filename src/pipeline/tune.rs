// Tunes and their variants, as the player and the renderer consume them.
//
// "tune": a named piece, e.g. Karla or Funk, with some display metadata.
// "variant": one arrangement inside a tune (the main groove, a break, an alt agogô part).
// "channel": one instrument's notation string inside a variant, one char per step.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::shared::{DEFAULT_BPM, Instrument};

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Variant {
    pub name: String,

    // Advisory only, playback always wraps.
    #[serde(default, rename = "loop", skip_serializing_if = "Option::is_none")]
    pub looped: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub upbeat: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time: Option<u32>,

    #[serde(default)]
    pub channels: BTreeMap<Instrument, String>,

    // Display-only lyrics that help players remember the rhythm.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub mnemonics: BTreeMap<Instrument, String>,
}

impl Variant {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn with_channel(mut self, instrument: Instrument, notation: impl Into<String>) -> Self {
        self.channels.insert(instrument, notation.into());
        self
    }

    /// Write one step of a channel, padding it with rests as needed.
    /// Writing into an alias replaces the alias with a literal copy first.
    pub fn set_step(&mut self, instrument: Instrument, step: usize, symbol: char) {
        let literal = self.resolve_channel(instrument).unwrap_or_default();
        let mut chars: Vec<char> = if literal.starts_with(super::notation::ALIAS_MARKER) {
            Vec::new()
        } else {
            literal.chars().collect()
        };
        if chars.len() <= step {
            chars.resize(step + 1, ' ');
        }
        chars[step] = symbol;
        self.channels.insert(instrument, chars.into_iter().collect());
    }

    pub fn clear_channel(&mut self, instrument: Instrument) {
        self.channels.remove(&instrument);
        self.mnemonics.remove(&instrument);
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Tune {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub categories: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub speed: Option<f32>, // bpm
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub variants: Vec<Variant>,
}

impl Tune {
    /// A single looping "Custom" variant, as built by the pattern editor.
    pub fn custom(
        name: impl Into<String>,
        tempo: f32,
        channels: impl IntoIterator<Item = (Instrument, String)>,
    ) -> Self {
        let mut variant = Variant::new("Custom");
        variant.looped = Some(true);
        variant.channels = channels.into_iter().collect();
        Self {
            name: name.into(),
            speed: Some(tempo),
            variants: vec![variant],
            ..Self::default()
        }
    }

    pub fn title(&self) -> &str {
        self.display_name.as_deref().unwrap_or(&self.name)
    }

    pub fn tempo(&self) -> f32 {
        self.speed.unwrap_or(DEFAULT_BPM)
    }

    pub fn variant(&self, name: &str) -> Option<&Variant> {
        self.variants.iter().find(|v| v.name == name)
    }

    pub fn variant_mut(&mut self, name: &str) -> Option<&mut Variant> {
        self.variants.iter_mut().find(|v| v.name == name)
    }

    pub fn variant_index(&self, name: &str) -> Option<usize> {
        self.variants.iter().position(|v| v.name == name)
    }

    pub fn first_variant(&self) -> Option<&Variant> {
        self.variants.first()
    }

    pub fn variant_names(&self) -> impl Iterator<Item = &str> {
        self.variants.iter().map(|v| v.name.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const STOLEN: &str = r#"{
        "name": "stolen",
        "display_name": "Stolen",
        "speed": 200,
        "variants": [
            { "name": "Tune", "loop": true, "channels": { "ls": "XXXXXXXXX", "hs": "@ms", "ms": "  X   X" },
              "mnemonics": { "ls": "This beat?" } },
            { "name": "Break 1", "time": 3, "channels": { "re": "XXXX" } }
        ]
    }"#;

    #[test]
    fn parses_tune_json() {
        let tune: Tune = serde_json::from_str(STOLEN).unwrap();
        assert_eq!(tune.title(), "Stolen");
        assert_eq!(tune.tempo(), 200.0);
        assert_eq!(tune.variant_names().collect::<Vec<_>>(), vec!["Tune", "Break 1"]);
        let main = tune.variant("Tune").unwrap();
        assert_eq!(main.looped, Some(true));
        assert_eq!(main.channels[&Instrument::Hs], "@ms");
        assert_eq!(tune.variant("Break 1").unwrap().looped, None);
        assert!(tune.variant("Break 9").is_none());
    }

    #[test]
    fn custom_tune_has_single_looping_variant() {
        let tune = Tune::custom("mine", 95.0, [(Instrument::Ls, "X   ".to_string())]);
        assert_eq!(tune.title(), "mine");
        let v = tune.first_variant().unwrap();
        assert_eq!(v.name, "Custom");
        assert_eq!(v.looped, Some(true));
    }

    #[test]
    fn set_step_pads_and_detaches_aliases() {
        let mut v = Variant::new("Custom")
            .with_channel(Instrument::Ms, "X ")
            .with_channel(Instrument::Hs, "@ms");
        v.set_step(Instrument::Ls, 3, 'X');
        assert_eq!(v.channels[&Instrument::Ls], "   X");
        v.set_step(Instrument::Hs, 1, '0');
        assert_eq!(v.channels[&Instrument::Hs], "X0");
        assert_eq!(v.channels[&Instrument::Ms], "X ");
        v.clear_channel(Instrument::Ls);
        assert!(!v.channels.contains_key(&Instrument::Ls));
    }
}
