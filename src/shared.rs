// Types shared by every layer: the instrument set, per-instrument runtime state,
// and the display/input types the terminal front end trades with the middle layer.
//
// Keybinds (see tui/input.rs):
//   Space         //  PlayPress (play / pause)
//   s             //  StopPress
//   [ / ]         //  TempoDown / TempoUp
//   - / =         //  VolumeDown / VolumeUp
//   1 .. 9        //  ToggleInstrument(0 ..= 8)
//   Up / Down     //  SelectRow(-1 / +1)
//   Left / Right  //  RowVolume(-5 / +5)
//   Tab           //  NextVariant
//   e             //  ToggleEdit
//   Esc / q       //  Quit
//   ?             //  help line, handled in the tui
//
// Edit mode (tui/input.rs remaps these while editing):
//   Left / Right  //  MoveEditStep(-1 / +1)
//   X . a o f h r s z 0   //  WriteStep(c), Backspace / Delete write a rest
//   c             //  ClearRow
//   Esc           //  ToggleEdit (back to playing)

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

pub const MIN_PATTERN_STEPS: usize = 16;
pub const STEPS_PER_BEAT: u32 = 4; // sixteenth notes
pub const DEFAULT_BPM: f32 = 120.0;
pub const MIN_BPM: f32 = 20.0;
pub const MAX_BPM: f32 = 300.0;
pub const DEFAULT_MASTER_VOLUME: u8 = 70;
pub const MAX_VOLUME: u8 = 100;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Instrument {
    Ls,
    Ms,
    Hs,
    Re,
    Sn,
    Ta,
    Ag,
    Sh,
    Ot,
}

impl Instrument {
    pub const ALL: [Instrument; 9] = [
        Instrument::Ls,
        Instrument::Ms,
        Instrument::Hs,
        Instrument::Re,
        Instrument::Sn,
        Instrument::Ta,
        Instrument::Ag,
        Instrument::Sh,
        Instrument::Ot,
    ];

    /// Two-letter key used in notation data and sample file names.
    pub fn code(self) -> &'static str {
        match self {
            Instrument::Ls => "ls",
            Instrument::Ms => "ms",
            Instrument::Hs => "hs",
            Instrument::Re => "re",
            Instrument::Sn => "sn",
            Instrument::Ta => "ta",
            Instrument::Ag => "ag",
            Instrument::Sh => "sh",
            Instrument::Ot => "ot",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|i| i.code() == code)
    }

    pub fn label(self) -> &'static str {
        match self {
            Instrument::Ls => "Low Surdo",
            Instrument::Ms => "Mid Surdo",
            Instrument::Hs => "High Surdo",
            Instrument::Re => "Repi",
            Instrument::Sn => "Snare",
            Instrument::Ta => "Tamborim",
            Instrument::Ag => "Agogô",
            Instrument::Sh => "Shaker",
            Instrument::Ot => "Other",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            Instrument::Ls => "Bass drum",
            Instrument::Ms => "Mid drum",
            Instrument::Hs => "High drum",
            Instrument::Re => "Repinique",
            Instrument::Sn => "Caixa",
            Instrument::Ta => "Tam",
            Instrument::Ag => "Bell",
            Instrument::Sh => "Chocalho",
            Instrument::Ot => "Calls and extras",
        }
    }

    pub fn is_surdo(self) -> bool {
        matches!(self, Instrument::Ls | Instrument::Ms | Instrument::Hs)
    }
}

impl fmt::Display for Instrument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstrumentState {
    pub enabled: bool,
    pub volume: u8, // 0-100
}

impl InstrumentState {
    pub fn new(enabled: bool, volume: u8) -> Self {
        Self {
            enabled,
            volume: volume.min(MAX_VOLUME),
        }
    }
}

impl Default for InstrumentState {
    fn default() -> Self {
        Self::new(true, 70)
    }
}

// Instruments missing from the map are not played at all.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InstrumentStates(BTreeMap<Instrument, InstrumentState>);

impl InstrumentStates {
    pub fn empty() -> Self {
        Self(BTreeMap::new())
    }

    /// The player's stock mix: everything on, agogô kept well down.
    pub fn default_mix() -> Self {
        let volumes = [
            (Instrument::Ls, 80),
            (Instrument::Ms, 75),
            (Instrument::Hs, 70),
            (Instrument::Re, 85),
            (Instrument::Sn, 90),
            (Instrument::Ta, 75),
            (Instrument::Ag, 25),
            (Instrument::Sh, 60),
            (Instrument::Ot, 70),
        ];
        Self(
            volumes
                .into_iter()
                .map(|(inst, volume)| (inst, InstrumentState::new(true, volume)))
                .collect(),
        )
    }

    pub fn get(&self, instrument: Instrument) -> Option<InstrumentState> {
        self.0.get(&instrument).copied()
    }

    pub fn insert(&mut self, instrument: Instrument, state: InstrumentState) {
        self.0.insert(instrument, state);
    }

    pub fn set_enabled(&mut self, instrument: Instrument, enabled: bool) {
        self.0.entry(instrument).or_default().enabled = enabled;
    }

    pub fn toggle(&mut self, instrument: Instrument) -> bool {
        let state = self.0.entry(instrument).or_default();
        state.enabled = !state.enabled;
        state.enabled
    }

    pub fn set_volume(&mut self, instrument: Instrument, volume: u8) {
        self.0.entry(instrument).or_default().volume = volume.min(MAX_VOLUME);
    }

    pub fn iter(&self) -> impl Iterator<Item = (Instrument, InstrumentState)> + '_ {
        self.0.iter().map(|(i, s)| (*i, *s))
    }
}

impl FromIterator<(Instrument, InstrumentState)> for InstrumentStates {
    fn from_iter<T: IntoIterator<Item = (Instrument, InstrumentState)>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum InputEvent {
    PlayPress,
    StopPress,
    TempoDown,
    TempoUp,
    VolumeDown,
    VolumeUp,
    ToggleInstrument(u8), // row index 0-8
    SelectRow(i8),
    RowVolume(i8),
    NextVariant,
    ToggleEdit,
    MoveEditStep(i8),
    WriteStep(char), // into the selected row at the edit column
    ClearRow,
    Quit,
}

#[derive(Clone, Debug)]
pub struct ChannelRow {
    pub instrument: Instrument,
    pub notation: String, // resolved, padded to the variant length
    pub enabled: bool,
    pub volume: u8,
}

#[derive(Clone, Debug)]
pub struct DisplayState {
    pub title: String,
    pub variant: String,
    pub variant_index: usize,
    pub variant_count: usize,
    pub playing: bool,
    pub audio_loaded: bool,
    pub current_step: usize,
    pub length: usize,
    pub bpm: f32,
    pub master_volume: u8,
    pub rows: Vec<ChannelRow>,
    pub selected_row: usize,
    pub edit_step: Option<usize>, // Some while editing
    pub mnemonic: Option<String>,
    pub status_text: String, // last error / notice, empty when nothing to say
}
