use std::fmt;

use crate::shared::Instrument;

/// Names one recorded take: `{instrument}_{code}`, e.g. `sn_2e`.
/// The code is two hex digits; for most takes it is the ASCII of the
/// notation symbol it was recorded for (`2e` = '.', `58` = 'X').
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SampleId {
    pub instrument: Instrument,
    pub code: u8,
}

impl SampleId {
    pub const fn new(instrument: Instrument, code: u8) -> Self {
        Self { instrument, code }
    }

    pub fn file_name(&self, extension: &str) -> String {
        format!("{self}.{extension}")
    }
}

impl fmt::Display for SampleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{:02x}", self.instrument.code(), self.code)
    }
}
