use crate::shared::{Instrument, MIN_PATTERN_STEPS};

use super::tune::Variant;

pub const ALIAS_MARKER: char = '@';

/// How an instrument is struck on a given step.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Articulation {
    Standard, // X
    Ghost,    // .
    LowBell,  // a
    HighBell, // o
    Flam,     // f
    Hand,     // h
    Rim,      // r
    Slap,     // s
    Buzz,     // z
    Open,     // 0
}

impl Articulation {
    pub fn symbol(self) -> char {
        match self {
            Articulation::Standard => 'X',
            Articulation::Ghost => '.',
            Articulation::LowBell => 'a',
            Articulation::HighBell => 'o',
            Articulation::Flam => 'f',
            Articulation::Hand => 'h',
            Articulation::Rim => 'r',
            Articulation::Slap => 's',
            Articulation::Buzz => 'z',
            Articulation::Open => '0',
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Stroke {
    Silent,
    Hit(Articulation),
}

/// Total over every char: anything outside the notation alphabet is a rest.
pub fn classify(c: char) -> Stroke {
    let articulation = match c {
        'X' => Articulation::Standard,
        '.' => Articulation::Ghost,
        'a' => Articulation::LowBell,
        'o' => Articulation::HighBell,
        'f' => Articulation::Flam,
        'h' => Articulation::Hand,
        'r' => Articulation::Rim,
        's' => Articulation::Slap,
        'z' => Articulation::Buzz,
        '0' => Articulation::Open,
        _ => return Stroke::Silent,
    };
    Stroke::Hit(articulation)
}

pub fn is_alias(notation: &str) -> bool {
    notation.starts_with(ALIAS_MARKER)
}

impl Variant {
    /// The channel's notation with a `@other` alias followed exactly one hop.
    /// Chains, self references and dangling references come back as the raw marker.
    pub fn resolve_channel(&self, instrument: Instrument) -> Option<&str> {
        let stored = self.channels.get(&instrument)?.as_str();
        let Some(target) = stored.strip_prefix(ALIAS_MARKER) else {
            return Some(stored);
        };
        match Instrument::from_code(target.trim()).and_then(|i| self.channels.get(&i)) {
            Some(referenced) if !is_alias(referenced) => Some(referenced.as_str()),
            _ => Some(stored),
        }
    }

    /// Resolved notation that can actually be played; unresolved aliases count as empty.
    pub fn playable_channel(&self, instrument: Instrument) -> Option<&str> {
        self.resolve_channel(instrument).filter(|n| !is_alias(n))
    }

    pub fn effective_length(&self) -> usize {
        self.channels
            .keys()
            .filter_map(|i| self.playable_channel(*i))
            .map(|n| n.chars().count())
            .max()
            .unwrap_or(0)
            .max(MIN_PATTERN_STEPS)
    }

    // Steps past the end of a short channel are rests.
    pub fn char_at(&self, instrument: Instrument, step: usize) -> Option<char> {
        self.playable_channel(instrument)?.chars().nth(step)
    }

    pub fn stroke_at(&self, instrument: Instrument, step: usize) -> Stroke {
        self.char_at(instrument, step).map_or(Stroke::Silent, classify)
    }

    /// Instruments whose resolved channel has at least one non-whitespace char.
    pub fn used_instruments(&self) -> impl Iterator<Item = Instrument> + '_ {
        self.channels.keys().copied().filter(|i| {
            self.playable_channel(*i)
                .is_some_and(|n| n.chars().any(|c| !c.is_whitespace()))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RECOGNISED: [char; 11] = ['X', '.', 'a', 'o', 'f', 'h', 'r', 's', 'z', '0', ' '];

    #[test]
    fn classify_known_symbols() {
        assert_eq!(classify(' '), Stroke::Silent);
        assert_eq!(classify('X'), Stroke::Hit(Articulation::Standard));
        assert_eq!(classify('.'), Stroke::Hit(Articulation::Ghost));
        assert_eq!(classify('a'), Stroke::Hit(Articulation::LowBell));
        assert_eq!(classify('o'), Stroke::Hit(Articulation::HighBell));
        assert_eq!(classify('0'), Stroke::Hit(Articulation::Open));
        for a in [Articulation::Flam, Articulation::Hand, Articulation::Rim, Articulation::Slap, Articulation::Buzz] {
            assert_eq!(classify(a.symbol()), Stroke::Hit(a));
        }
    }

    #[test]
    fn everything_else_is_silent() {
        let all = (0..=0x10FFFFu32).filter_map(char::from_u32);
        for c in all.filter(|c| !RECOGNISED.contains(c)) {
            assert_eq!(classify(c), Stroke::Silent, "{c:?} should be a rest");
        }
    }

    #[test]
    fn effective_length_takes_longest_channel() {
        let v = Variant::new("t")
            .with_channel(Instrument::Ls, "")
            .with_channel(Instrument::Ms, "X".repeat(5))
            .with_channel(Instrument::Hs, "X".repeat(16))
            .with_channel(Instrument::Re, "X".repeat(33));
        assert_eq!(v.effective_length(), 33);
    }

    #[test]
    fn effective_length_has_floor_of_sixteen() {
        let v = Variant::new("t")
            .with_channel(Instrument::Ls, "X  X")
            .with_channel(Instrument::Sn, "....X");
        assert_eq!(v.effective_length(), 16);
        assert_eq!(Variant::new("empty").effective_length(), 16);
    }

    #[test]
    fn alias_resolves_one_hop() {
        let v = Variant::new("t")
            .with_channel(Instrument::Ms, "  X   X")
            .with_channel(Instrument::Hs, "@ms")
            .with_channel(Instrument::Ta, "@hs")
            .with_channel(Instrument::Sh, "@sh")
            .with_channel(Instrument::Ag, "@ot");
        assert_eq!(v.resolve_channel(Instrument::Hs), Some("  X   X"));
        // a second hop, a self reference and a dangling one stay unresolved
        assert_eq!(v.resolve_channel(Instrument::Ta), Some("@hs"));
        assert_eq!(v.resolve_channel(Instrument::Sh), Some("@sh"));
        assert_eq!(v.resolve_channel(Instrument::Ag), Some("@ot"));
        assert_eq!(v.resolve_channel(Instrument::Ls), None);
        assert_eq!(v.stroke_at(Instrument::Ta, 2), Stroke::Silent);
        assert_eq!(v.stroke_at(Instrument::Hs, 2), Stroke::Hit(Articulation::Standard));
    }

    #[test]
    fn short_channels_rest_past_their_end() {
        let v = Variant::new("t").with_channel(Instrument::Ls, "X");
        assert_eq!(v.char_at(Instrument::Ls, 0), Some('X'));
        assert_eq!(v.stroke_at(Instrument::Ls, 9), Stroke::Silent);
    }

    #[test]
    fn used_instruments_skip_blank_channels() {
        let v = Variant::new("t")
            .with_channel(Instrument::Ls, "X   ")
            .with_channel(Instrument::Ms, "        ")
            .with_channel(Instrument::Hs, "@ls")
            .with_channel(Instrument::Ta, "@zz");
        let used: Vec<_> = v.used_instruments().collect();
        assert_eq!(used, vec![Instrument::Ls, Instrument::Hs]);
    }
}
