use regex::Regex;
use std::fmt;
use std::sync::LazyLock;

/// The twelve pitch classes, spelled sharp-wise.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PitchClass {
    C,
    Cs,
    D,
    Ds,
    E,
    F,
    Fs,
    G,
    Gs,
    A,
    As,
    B,
}

// Note text: letter, optional accidental, optional octave.
// Atonal placeholders ("X", "-", empty) fall through to None.
static NOTE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*(?P<letter>[A-Ga-g])(?P<accidental>[#♯b♭]?)(?P<octave>-?\d+)?\s*$").unwrap()
});

impl PitchClass {
    /// Parse a pitch class from note text like "C", "f#", "Bb".
    /// Returns None for atonal/placeholder text.
    pub fn of(text: &str) -> Option<PitchClass> {
        let caps = NOTE_RE.captures(text)?;
        let letter = caps.name("letter")?.as_str();
        let base = match letter.to_ascii_uppercase().as_str() {
            "C" => 0,
            "D" => 2,
            "E" => 4,
            "F" => 5,
            "G" => 7,
            "A" => 9,
            "B" => 11,
            _ => return None,
        };
        let adjust = match caps.name("accidental").map(|m| m.as_str()) {
            Some("#") | Some("♯") => 1,
            Some("b") | Some("♭") => -1,
            _ => 0,
        };
        Some(PitchClass::from_semitone(base + adjust))
    }

    /// Semitone index 0..12 with C = 0.
    pub fn semitone(self) -> i32 {
        match self {
            PitchClass::C => 0,
            PitchClass::Cs => 1,
            PitchClass::D => 2,
            PitchClass::Ds => 3,
            PitchClass::E => 4,
            PitchClass::F => 5,
            PitchClass::Fs => 6,
            PitchClass::G => 7,
            PitchClass::Gs => 8,
            PitchClass::A => 9,
            PitchClass::As => 10,
            PitchClass::B => 11,
        }
    }

    pub fn from_semitone(index: i32) -> PitchClass {
        match index.rem_euclid(12) {
            0 => PitchClass::C,
            1 => PitchClass::Cs,
            2 => PitchClass::D,
            3 => PitchClass::Ds,
            4 => PitchClass::E,
            5 => PitchClass::F,
            6 => PitchClass::Fs,
            7 => PitchClass::G,
            8 => PitchClass::Gs,
            9 => PitchClass::A,
            10 => PitchClass::As,
            _ => PitchClass::B,
        }
    }

    pub fn shift(self, delta: i32) -> PitchClass {
        PitchClass::from_semitone(self.semitone() + delta)
    }

    /// Sharp spelling: "C#", "G", "A#".
    pub fn name(self) -> &'static str {
        match self {
            PitchClass::C => "C",
            PitchClass::Cs => "C#",
            PitchClass::D => "D",
            PitchClass::Ds => "D#",
            PitchClass::E => "E",
            PitchClass::F => "F",
            PitchClass::Fs => "F#",
            PitchClass::G => "G",
            PitchClass::Gs => "G#",
            PitchClass::A => "A",
            PitchClass::As => "A#",
            PitchClass::B => "B",
        }
    }
}

impl fmt::Display for PitchClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A pitch class placed in a specific octave, e.g. C#5.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Note {
    pub pitch_class: PitchClass,
    pub octave: i8,
}

impl Note {
    pub fn new(pitch_class: PitchClass, octave: i8) -> Note {
        Note { pitch_class, octave }
    }

    /// Parse note text like "C#5", "Bb3", "E" (octave defaults to 4).
    /// Returns None for atonal/placeholder text like "X".
    pub fn parse(text: &str) -> Option<Note> {
        let caps = NOTE_RE.captures(text)?;
        let pitch_class = PitchClass::of(text)?;
        let octave = caps
            .name("octave")
            .and_then(|m| m.as_str().parse().ok())
            .unwrap_or(4);
        Some(Note { pitch_class, octave })
    }

    /// Absolute semitone count: octave × 12 + pitch class index.
    pub fn semitones(self) -> i32 {
        i32::from(self.octave) * 12 + self.pitch_class.semitone()
    }

    pub fn from_semitones(total: i32) -> Note {
        Note {
            pitch_class: PitchClass::from_semitone(total.rem_euclid(12)),
            octave: total.div_euclid(12) as i8,
        }
    }

    pub fn shift(self, delta: i32) -> Note {
        Note::from_semitones(self.semitones() + delta)
    }

    /// Re-octave this note's pitch class as close as possible to a reference
    /// note. When the distance up equals the distance down, the lower
    /// placement wins.
    pub fn nearest_octave_of(self, reference: Note) -> Note {
        let mut best = Note::new(self.pitch_class, reference.octave - 1);
        let mut best_distance = (best.semitones() - reference.semitones()).abs();
        for octave in [reference.octave, reference.octave + 1] {
            let candidate = Note::new(self.pitch_class, octave);
            let distance = (candidate.semitones() - reference.semitones()).abs();
            if distance < best_distance {
                best = candidate;
                best_distance = distance;
            }
        }
        best
    }
}

impl fmt::Display for Note {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.pitch_class, self.octave)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // === Pitch class parsing ===

    #[test]
    fn test_parse_naturals() {
        assert_eq!(PitchClass::of("C"), Some(PitchClass::C));
        assert_eq!(PitchClass::of("g"), Some(PitchClass::G));
        assert_eq!(PitchClass::of("B"), Some(PitchClass::B));
    }

    #[test]
    fn test_parse_accidentals() {
        assert_eq!(PitchClass::of("C#"), Some(PitchClass::Cs));
        assert_eq!(PitchClass::of("Ab"), Some(PitchClass::Gs));
        assert_eq!(PitchClass::of("Bb"), Some(PitchClass::As));
        assert_eq!(PitchClass::of("Cb"), Some(PitchClass::B));
        assert_eq!(PitchClass::of("B#"), Some(PitchClass::C));
    }

    #[test]
    fn test_parse_atonal_is_none() {
        assert_eq!(PitchClass::of("X"), None);
        assert_eq!(PitchClass::of(""), None);
        assert_eq!(PitchClass::of("-"), None);
    }

    #[test]
    fn test_shift_wraps() {
        assert_eq!(PitchClass::C.shift(3), PitchClass::Ds);
        assert_eq!(PitchClass::A.shift(4), PitchClass::Cs);
        assert_eq!(PitchClass::C.shift(-1), PitchClass::B);
        assert_eq!(PitchClass::G.shift(12), PitchClass::G);
    }

    // === Notes ===

    #[test]
    fn test_note_parse() {
        let n = Note::parse("C#5").unwrap();
        assert_eq!(n.pitch_class, PitchClass::Cs);
        assert_eq!(n.octave, 5);

        let n = Note::parse("Bb3").unwrap();
        assert_eq!(n.pitch_class, PitchClass::As);
        assert_eq!(n.octave, 3);
    }

    #[test]
    fn test_note_parse_default_octave() {
        let n = Note::parse("E").unwrap();
        assert_eq!(n.octave, 4);
    }

    #[test]
    fn test_note_parse_atonal() {
        assert_eq!(Note::parse("X"), None);
        assert_eq!(Note::parse("xxx"), None);
    }

    #[test]
    fn test_note_shift_across_octave() {
        let n = Note::parse("B4").unwrap().shift(1);
        assert_eq!(n.to_string(), "C5");

        let n = Note::parse("C5").unwrap().shift(-2);
        assert_eq!(n.to_string(), "A#4");
    }

    #[test]
    fn test_note_display_roundtrip() {
        for text in ["C4", "F#2", "A#7"] {
            assert_eq!(Note::parse(text).unwrap().to_string(), text);
        }
    }

    // === Nearest octave ===

    #[test]
    fn test_nearest_octave_same_class() {
        let reference = Note::parse("C5").unwrap();
        let n = Note::parse("C2").unwrap().nearest_octave_of(reference);
        assert_eq!(n.to_string(), "C5");
    }

    #[test]
    fn test_nearest_octave_above_and_below() {
        let reference = Note::parse("C5").unwrap();
        // D is 2 up from C5, nearer than 10 down
        let d = Note::parse("D2").unwrap().nearest_octave_of(reference);
        assert_eq!(d.to_string(), "D5");
        // A is 3 down from C5, nearer than 9 up
        let a = Note::parse("A2").unwrap().nearest_octave_of(reference);
        assert_eq!(a.to_string(), "A4");
    }

    #[test]
    fn test_nearest_octave_tie_prefers_lower() {
        // F# is exactly 6 semitones from C in both directions
        let reference = Note::parse("C5").unwrap();
        let n = Note::parse("F#1").unwrap().nearest_octave_of(reference);
        assert_eq!(n.to_string(), "F#4");
    }
}
