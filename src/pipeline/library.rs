// Built-in tunes and protest beats, plus loading tune files in the same JSON shape.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::LibraryError;
use crate::shared::Instrument;

use super::tune::{Tune, Variant};

const BUILTIN_TUNES: &str = include_str!("../../assets/tunes.json");
const BUILTIN_PROTEST_BEATS: &str = include_str!("../../assets/protest_beats.json");

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
}

/// A one-line chant rhythm that every section plays in unison.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ProtestBeat {
    pub id: String,
    pub name: String,
    pub description: String,
    #[serde(default)]
    pub full_description: String,
    pub pattern: String,
    pub difficulty: Difficulty,
    pub tempo: f32,
}

impl ProtestBeat {
    pub fn to_tune(&self) -> Tune {
        let variant = Instrument::ALL
            .into_iter()
            .filter(|i| *i != Instrument::Ot)
            .fold(Variant::new("Beat"), |v, i| v.with_channel(i, self.pattern.clone()));
        Tune {
            name: self.id.clone(),
            display_name: Some(self.name.clone()),
            categories: vec!["protest".to_string()],
            speed: Some(self.tempo),
            time: None,
            description: Some(self.description.clone()),
            variants: vec![Variant { looped: Some(true), ..variant }],
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct TuneLibrary {
    tunes: Vec<Tune>,
}

impl TuneLibrary {
    pub fn new(tunes: Vec<Tune>) -> Result<Self, LibraryError> {
        if let Some(empty) = tunes.iter().find(|t| t.variants.is_empty()) {
            return Err(LibraryError::Empty(empty.name.clone()));
        }
        Ok(Self { tunes })
    }

    /// The tunes and protest beats that ship with the player.
    pub fn builtin() -> Result<Self, LibraryError> {
        let mut tunes: Vec<Tune> = serde_json::from_str(BUILTIN_TUNES)?;
        let beats: Vec<ProtestBeat> = serde_json::from_str(BUILTIN_PROTEST_BEATS)?;
        tunes.extend(beats.iter().map(ProtestBeat::to_tune));
        Self::new(tunes)
    }

    /// A JSON file holding either one tune or a list of them.
    pub fn from_file(path: &Path) -> Result<Self, LibraryError> {
        let data = std::fs::read_to_string(path)?;
        Self::new(parse_tunes(&data)?)
    }

    pub fn extend(&mut self, other: TuneLibrary) {
        for tune in other.tunes {
            self.insert(tune);
        }
    }

    /// Add a tune, replacing any with the same name.
    pub fn insert(&mut self, tune: Tune) {
        match self.tunes.iter_mut().find(|t| t.name == tune.name) {
            Some(existing) => *existing = tune,
            None => self.tunes.push(tune),
        }
    }

    /// Case-insensitive match on the name or the display name.
    pub fn find(&self, name: &str) -> Option<&Tune> {
        self.tunes.iter().find(|t| {
            t.name.eq_ignore_ascii_case(name)
                || t.display_name.as_deref().is_some_and(|d| d.eq_ignore_ascii_case(name))
        })
    }

    pub fn iter(&self) -> impl Iterator<Item = &Tune> {
        self.tunes.iter()
    }

    pub fn len(&self) -> usize {
        self.tunes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tunes.is_empty()
    }
}

fn parse_tunes(data: &str) -> Result<Vec<Tune>, serde_json::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany {
        Many(Vec<Tune>),
        One(Tune),
    }
    Ok(match serde_json::from_str(data)? {
        OneOrMany::Many(tunes) => tunes,
        OneOrMany::One(tune) => vec![tune],
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_library_parses() {
        let library = TuneLibrary::builtin().unwrap();
        let stolen = library.find("Stolen").unwrap();
        assert_eq!(stolen.tempo(), 200.0);
        assert_eq!(stolen.variants.len(), 6);
        assert_eq!(stolen.variant("Tune").unwrap().resolve_channel(Instrument::Hs), Some("  X   X   XX XX"));
        assert!(library.find("KARLA").is_some());
        assert!(library.find("nope").is_none());
    }

    #[test]
    fn protest_beats_play_in_unison() {
        let library = TuneLibrary::builtin().unwrap();
        let clave = library.find("clave").unwrap();
        let beat = clave.variant("Beat").unwrap();
        assert_eq!(beat.used_instruments().count(), 8);
        assert_eq!(beat.channels[&Instrument::Sn], "X   X   X   X X ");
        assert_eq!(clave.tempo(), 120.0);
    }

    #[test]
    fn tune_files_hold_one_or_many() {
        let dir = tempfile::tempdir().unwrap();
        let one = dir.path().join("one.json");
        std::fs::write(&one, r#"{"name": "mine", "variants": [{"name": "A", "channels": {"ls": "X"}}]}"#).unwrap();
        assert_eq!(TuneLibrary::from_file(&one).unwrap().len(), 1);

        let many = dir.path().join("many.json");
        std::fs::write(&many, r#"[{"name": "a", "variants": [{"name": "A"}]}, {"name": "b", "variants": [{"name": "B"}]}]"#)
            .unwrap();
        let mut library = TuneLibrary::from_file(&many).unwrap();
        library.extend(TuneLibrary::from_file(&one).unwrap());
        assert_eq!(library.len(), 3);

        let bad = dir.path().join("bad.json");
        std::fs::write(&bad, r#"{"name": "hollow", "variants": []}"#).unwrap();
        assert!(matches!(TuneLibrary::from_file(&bad), Err(LibraryError::Empty(_))));
    }
}
