use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

fn default_intensity() -> f64 {
    1.0
}

fn default_velocity() -> f64 {
    1.0
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProgramType {
    Macro,
    Main,
    Rhythm,
    Detail,
}

impl fmt::Display for ProgramType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ProgramType::Macro => "Macro",
            ProgramType::Main => "Main",
            ProgramType::Rhythm => "Rhythm",
            ProgramType::Detail => "Detail",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum InstrumentType {
    Percussive,
    Bass,
    Pad,
    Sticky,
    Stripe,
    Stab,
}

impl fmt::Display for InstrumentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            InstrumentType::Percussive => "Percussive",
            InstrumentType::Bass => "Bass",
            InstrumentType::Pad => "Pad",
            InstrumentType::Sticky => "Sticky",
            InstrumentType::Stripe => "Stripe",
            InstrumentType::Stab => "Stab",
        };
        f.write_str(s)
    }
}

/// Where a pattern may land within a segment's beat range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PatternType {
    Intro,
    Loop,
    Outro,
}

/// A top-level piece of catalog content. Macro and Main programs carry
/// sequence bindings; Rhythm and Detail programs carry voices and patterns.
#[derive(Debug, Clone, Deserialize)]
pub struct Program {
    pub id: Uuid,
    pub name: String,
    #[serde(rename = "type")]
    pub program_type: ProgramType,
    pub key: String,
    pub tempo: f64,
    #[serde(default = "default_intensity")]
    pub intensity: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProgramMeme {
    pub id: Uuid,
    pub program_id: Uuid,
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProgramSequence {
    pub id: Uuid,
    pub program_id: Uuid,
    pub name: String,
    /// Falls back to the program's key when absent.
    #[serde(default)]
    pub key: Option<String>,
    /// Falls back to the program's tempo when absent.
    #[serde(default)]
    pub tempo: Option<f64>,
    #[serde(default)]
    pub intensity: Option<f64>,
    /// Total beats.
    pub total: i32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProgramSequenceChord {
    pub id: Uuid,
    pub program_sequence_id: Uuid,
    pub position: f64,
    pub name: String,
}

/// Placement of a sequence at an ordinal offset within its program.
/// Offsets are not necessarily contiguous, and one offset may hold several
/// bindings.
#[derive(Debug, Clone, Deserialize)]
pub struct ProgramSequenceBinding {
    pub id: Uuid,
    pub program_id: Uuid,
    pub program_sequence_id: Uuid,
    pub offset: i32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProgramSequenceBindingMeme {
    pub id: Uuid,
    pub program_sequence_binding_id: Uuid,
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProgramVoice {
    pub id: Uuid,
    pub program_id: Uuid,
    #[serde(rename = "type")]
    pub instrument_type: InstrumentType,
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProgramVoiceTrack {
    pub id: Uuid,
    pub program_voice_id: Uuid,
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProgramSequencePattern {
    pub id: Uuid,
    pub program_sequence_id: Uuid,
    pub program_voice_id: Uuid,
    #[serde(rename = "type")]
    pub pattern_type: PatternType,
    /// Total beats.
    pub total: i32,
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProgramSequencePatternEvent {
    pub id: Uuid,
    pub program_sequence_pattern_id: Uuid,
    pub program_voice_track_id: Uuid,
    /// Beat position within the pattern.
    pub position: f64,
    /// Beats.
    pub duration: f64,
    /// Comma-separated note names; "X" marks an atonal trigger.
    pub tones: String,
    #[serde(default = "default_velocity")]
    pub velocity: f64,
}

impl ProgramSequencePatternEvent {
    pub fn tone_list(&self) -> Vec<String> {
        self.tones
            .split(',')
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .collect()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Instrument {
    pub id: Uuid,
    pub name: String,
    #[serde(rename = "type")]
    pub instrument_type: InstrumentType,
    #[serde(default = "default_intensity")]
    pub intensity: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct InstrumentMeme {
    pub id: Uuid,
    pub instrument_id: Uuid,
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct InstrumentAudio {
    pub id: Uuid,
    pub instrument_id: Uuid,
    pub name: String,
    pub waveform_key: String,
    /// Seconds into the waveform file.
    #[serde(default)]
    pub start: f64,
    /// Seconds.
    #[serde(default)]
    pub length: f64,
    #[serde(default)]
    pub tempo: f64,
    /// Tuning pitch in Hz, for the renderer.
    #[serde(default)]
    pub pitch: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct InstrumentAudioEvent {
    pub id: Uuid,
    pub instrument_audio_id: Uuid,
    pub name: String,
    pub position: f64,
    pub duration: f64,
    /// Note name; "X" for atonal.
    pub note: String,
    #[serde(default = "default_velocity")]
    pub velocity: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tone_list_splits_and_trims() {
        let event = ProgramSequencePatternEvent {
            id: Uuid::new_v4(),
            program_sequence_pattern_id: Uuid::new_v4(),
            program_voice_track_id: Uuid::new_v4(),
            position: 0.0,
            duration: 1.0,
            tones: "C2, Eb2 ,G2".into(),
            velocity: 1.0,
        };
        assert_eq!(event.tone_list(), vec!["C2", "Eb2", "G2"]);
    }

    #[test]
    fn test_tone_list_single() {
        let event = ProgramSequencePatternEvent {
            id: Uuid::new_v4(),
            program_sequence_pattern_id: Uuid::new_v4(),
            program_voice_track_id: Uuid::new_v4(),
            position: 0.0,
            duration: 1.0,
            tones: "X".into(),
            velocity: 1.0,
        };
        assert_eq!(event.tone_list(), vec!["X"]);
    }
}
