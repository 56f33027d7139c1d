use regex::Regex;
use std::fmt;
use std::sync::LazyLock;

use crate::music::note::PitchClass;

/// A chord name split into a root and everything after it.
///
/// The description is opaque: "minor", "m7", "sus4 add9" all pass through
/// untouched. Only the root participates in transposition, and the original
/// spelling is preserved whenever the shift is a no-op, so untransposed
/// content renders byte-identical to its authored form.
#[derive(Debug, Clone, PartialEq)]
pub struct Chord {
    pub name: String,
    pub root: PitchClass,
    separator: String,
    description: String,
}

static CHORD_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*(?P<root>[A-Ga-g][#♯b♭]?)(?P<sep>\s*)(?P<desc>.*?)\s*$").unwrap()
});

impl Chord {
    /// Parse chord text like "Ab minor", "C 7", "Em". Returns None when no
    /// root pitch can be read.
    pub fn parse(text: &str) -> Option<Chord> {
        let caps = CHORD_RE.captures(text)?;
        let root = PitchClass::of(caps.name("root")?.as_str())?;
        Some(Chord {
            name: text.trim().to_string(),
            root,
            separator: caps.name("sep").map_or(String::new(), |m| m.as_str().to_string()),
            description: caps.name("desc").map_or(String::new(), |m| m.as_str().to_string()),
        })
    }

    /// Transpose the root by `delta` semitones, re-rendering the name with
    /// sharp spelling. A whole-octave (or zero) shift returns the chord
    /// unchanged, original spelling intact.
    pub fn shift(&self, delta: i32) -> Chord {
        if delta.rem_euclid(12) == 0 {
            return self.clone();
        }
        let root = self.root.shift(delta);
        let name = format!("{}{}{}", root.name(), self.separator, self.description);
        Chord {
            name,
            root,
            separator: self.separator.clone(),
            description: self.description.clone(),
        }
    }
}

impl fmt::Display for Chord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_root_and_description() {
        let c = Chord::parse("Ab minor").unwrap();
        assert_eq!(c.root, PitchClass::Gs);
        assert_eq!(c.name, "Ab minor");

        let c = Chord::parse("G major").unwrap();
        assert_eq!(c.root, PitchClass::G);
    }

    #[test]
    fn test_parse_compact_form() {
        let c = Chord::parse("Em").unwrap();
        assert_eq!(c.root, PitchClass::E);

        let c = Chord::parse("C#m7b5").unwrap();
        assert_eq!(c.root, PitchClass::Cs);
    }

    #[test]
    fn test_parse_rejects_rootless() {
        assert_eq!(Chord::parse(""), None);
        assert_eq!(Chord::parse("X"), None);
    }

    #[test]
    fn test_shift_zero_preserves_spelling() {
        let c = Chord::parse("Ab minor").unwrap();
        assert_eq!(c.shift(0).name, "Ab minor");
        assert_eq!(c.shift(12).name, "Ab minor");
        assert_eq!(c.shift(-12).name, "Ab minor");
    }

    #[test]
    fn test_shift_transposes_root() {
        let c = Chord::parse("G major").unwrap();
        assert_eq!(c.shift(2).name, "A major");
        assert_eq!(c.shift(-4).name, "D# major");
    }

    #[test]
    fn test_shift_keeps_compact_separator() {
        let c = Chord::parse("Em7").unwrap();
        assert_eq!(c.shift(1).name, "Fm7");
        let c = Chord::parse("C 7").unwrap();
        assert_eq!(c.shift(2).name, "D 7");
    }
}
