use regex::Regex;
use std::fmt;
use std::sync::LazyLock;

use crate::music::note::PitchClass;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Mode {
    Major,
    Minor,
}

/// A musical key: root pitch class + mode, e.g. "G major", "Ab minor".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Key {
    pub root: PitchClass,
    pub mode: Mode,
}

// Key text: root with optional accidental, then an optional mode word.
// Bare "m" means minor ("Cm"); absent mode defaults to major.
static KEY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^\s*(?P<root>[A-G][#♯b♭]?)\s*(?P<mode>major|maj|minor|min|m)?\s*$").unwrap()
});

impl Key {
    pub fn new(root: PitchClass, mode: Mode) -> Key {
        Key { root, mode }
    }

    /// Parse key text like "G major", "Ab minor", "Cm", "F#".
    /// Returns None for atonal/unrecognized text.
    pub fn parse(text: &str) -> Option<Key> {
        let caps = KEY_RE.captures(text)?;
        let root = PitchClass::of(caps.name("root")?.as_str())?;
        let mode = match caps.name("mode").map(|m| m.as_str().to_lowercase()) {
            Some(m) if m == "minor" || m == "min" || m == "m" => Mode::Minor,
            _ => Mode::Major,
        };
        Some(Key { root, mode })
    }

    /// Smallest signed pitch-class motion from this key's root to the
    /// target's, in -5..=6 semitones. Invertible: applying the delta to this
    /// root always lands on the target root.
    pub fn delta_semitones(&self, to: &Key) -> i32 {
        let d = (to.root.semitone() - self.root.semitone()).rem_euclid(12);
        if d > 6 { d - 12 } else { d }
    }

    pub fn shift(&self, delta: i32) -> Key {
        Key {
            root: self.root.shift(delta),
            mode: self.mode,
        }
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mode = match self.mode {
            Mode::Major => "major",
            Mode::Minor => "minor",
        };
        write!(f, "{} {}", self.root, mode)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_modes() {
        assert_eq!(
            Key::parse("G major"),
            Some(Key::new(PitchClass::G, Mode::Major))
        );
        assert_eq!(
            Key::parse("Ab minor"),
            Some(Key::new(PitchClass::Gs, Mode::Minor))
        );
        assert_eq!(Key::parse("Cm"), Some(Key::new(PitchClass::C, Mode::Minor)));
        assert_eq!(
            Key::parse("f# min"),
            Some(Key::new(PitchClass::Fs, Mode::Minor))
        );
    }

    #[test]
    fn test_parse_defaults_major() {
        assert_eq!(Key::parse("D"), Some(Key::new(PitchClass::D, Mode::Major)));
        assert_eq!(
            Key::parse("Bb"),
            Some(Key::new(PitchClass::As, Mode::Major))
        );
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert_eq!(Key::parse(""), None);
        assert_eq!(Key::parse("X"), None);
        assert_eq!(Key::parse("H major"), None);
    }

    #[test]
    fn test_delta_prefers_shortest_path() {
        let c = Key::parse("C major").unwrap();
        let g = Key::parse("G major").unwrap();
        // C up to G is 7, down is 5; shortest is down
        assert_eq!(c.delta_semitones(&g), -5);
        assert_eq!(g.delta_semitones(&c), 5);

        let d = Key::parse("D major").unwrap();
        assert_eq!(c.delta_semitones(&d), 2);
        // Tritone goes up
        let fs = Key::parse("F# major").unwrap();
        assert_eq!(c.delta_semitones(&fs), 6);
    }

    #[test]
    fn test_delta_roundtrip() {
        let keys = ["C major", "Ab minor", "F# major", "B minor", "E major"];
        for from in keys {
            for to in keys {
                let from = Key::parse(from).unwrap();
                let to = Key::parse(to).unwrap();
                let delta = from.delta_semitones(&to);
                assert_eq!(from.shift(delta).root, to.root);
            }
        }
    }

    #[test]
    fn test_shift_keeps_mode() {
        let k = Key::parse("Ab minor").unwrap().shift(3);
        assert_eq!(k, Key::new(PitchClass::B, Mode::Minor));
        assert_eq!(k.to_string(), "B minor");
    }
}
