pub mod entities;

use std::collections::BTreeSet;

use entities::{
    Instrument, InstrumentAudio, InstrumentAudioEvent, InstrumentMeme, InstrumentType, PatternType,
    Program, ProgramMeme, ProgramSequence, ProgramSequenceBinding, ProgramSequenceBindingMeme,
    ProgramSequenceChord, ProgramSequencePattern, ProgramSequencePatternEvent, ProgramType,
    ProgramVoice, ProgramVoiceTrack,
};
use uuid::Uuid;

/// Read-only indexed view over one catalog snapshot.
///
/// Everything lives in memory for the whole fabrication run; queries are
/// linear scans over the snapshot's collections, which stay small enough
/// (hundreds of rows) that nothing here shows up in a profile.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
pub struct ContentCatalog {
    pub programs: Vec<Program>,
    pub program_memes: Vec<ProgramMeme>,
    pub program_sequences: Vec<ProgramSequence>,
    pub program_sequence_chords: Vec<ProgramSequenceChord>,
    pub program_sequence_bindings: Vec<ProgramSequenceBinding>,
    pub program_sequence_binding_memes: Vec<ProgramSequenceBindingMeme>,
    pub program_voices: Vec<ProgramVoice>,
    pub program_voice_tracks: Vec<ProgramVoiceTrack>,
    pub program_sequence_patterns: Vec<ProgramSequencePattern>,
    pub program_sequence_pattern_events: Vec<ProgramSequencePatternEvent>,
    pub instruments: Vec<Instrument>,
    pub instrument_memes: Vec<InstrumentMeme>,
    pub instrument_audios: Vec<InstrumentAudio>,
    pub instrument_audio_events: Vec<InstrumentAudioEvent>,
}

impl ContentCatalog {
    /// Load a catalog snapshot from JSON. Unknown collections are ignored,
    /// absent ones default to empty.
    pub fn from_json(json: &str) -> Result<ContentCatalog, serde_json::Error> {
        serde_json::from_str(json)
    }

    // === Programs ===

    pub fn program(&self, id: Uuid) -> Option<&Program> {
        self.programs.iter().find(|p| p.id == id)
    }

    pub fn programs_of_type(&self, program_type: ProgramType) -> Vec<&Program> {
        self.programs
            .iter()
            .filter(|p| p.program_type == program_type)
            .collect()
    }

    pub fn memes_of_program(&self, program_id: Uuid) -> Vec<String> {
        self.program_memes
            .iter()
            .filter(|m| m.program_id == program_id)
            .map(|m| m.name.clone())
            .collect()
    }

    // === Sequences ===

    pub fn sequence(&self, id: Uuid) -> Option<&ProgramSequence> {
        self.program_sequences.iter().find(|s| s.id == id)
    }

    pub fn sequences_of_program(&self, program_id: Uuid) -> Vec<&ProgramSequence> {
        self.program_sequences
            .iter()
            .filter(|s| s.program_id == program_id)
            .collect()
    }

    /// Chords of a sequence ordered by beat position.
    pub fn chords_of_sequence(&self, sequence_id: Uuid) -> Vec<&ProgramSequenceChord> {
        let mut chords: Vec<&ProgramSequenceChord> = self
            .program_sequence_chords
            .iter()
            .filter(|c| c.program_sequence_id == sequence_id)
            .collect();
        chords.sort_by(|a, b| a.position.partial_cmp(&b.position).unwrap_or(std::cmp::Ordering::Equal));
        chords
    }

    // === Sequence bindings ===

    pub fn binding(&self, id: Uuid) -> Option<&ProgramSequenceBinding> {
        self.program_sequence_bindings.iter().find(|b| b.id == id)
    }

    pub fn bindings_of_program(&self, program_id: Uuid) -> Vec<&ProgramSequenceBinding> {
        let mut bindings: Vec<&ProgramSequenceBinding> = self
            .program_sequence_bindings
            .iter()
            .filter(|b| b.program_id == program_id)
            .collect();
        bindings.sort_by_key(|b| b.offset);
        bindings
    }

    pub fn bindings_at_offset(&self, program_id: Uuid, offset: i32) -> Vec<&ProgramSequenceBinding> {
        self.program_sequence_bindings
            .iter()
            .filter(|b| b.program_id == program_id && b.offset == offset)
            .collect()
    }

    /// The distinct binding offsets a program actually has, ascending.
    /// Offsets are authored data and may skip numbers; never assume 0..n.
    pub fn available_offsets(&self, program_id: Uuid) -> Vec<i32> {
        let offsets: BTreeSet<i32> = self
            .program_sequence_bindings
            .iter()
            .filter(|b| b.program_id == program_id)
            .map(|b| b.offset)
            .collect();
        offsets.into_iter().collect()
    }

    pub fn memes_of_binding(&self, binding_id: Uuid) -> Vec<String> {
        self.program_sequence_binding_memes
            .iter()
            .filter(|m| m.program_sequence_binding_id == binding_id)
            .map(|m| m.name.clone())
            .collect()
    }

    // === Voices, tracks, patterns, events ===

    pub fn voice(&self, id: Uuid) -> Option<&ProgramVoice> {
        self.program_voices.iter().find(|v| v.id == id)
    }

    pub fn voices_of_program(&self, program_id: Uuid) -> Vec<&ProgramVoice> {
        self.program_voices
            .iter()
            .filter(|v| v.program_id == program_id)
            .collect()
    }

    pub fn track(&self, id: Uuid) -> Option<&ProgramVoiceTrack> {
        self.program_voice_tracks.iter().find(|t| t.id == id)
    }

    pub fn tracks_of_voice(&self, voice_id: Uuid) -> Vec<&ProgramVoiceTrack> {
        self.program_voice_tracks
            .iter()
            .filter(|t| t.program_voice_id == voice_id)
            .collect()
    }

    pub fn patterns_of_voice(
        &self,
        sequence_id: Uuid,
        voice_id: Uuid,
        pattern_type: PatternType,
    ) -> Vec<&ProgramSequencePattern> {
        self.program_sequence_patterns
            .iter()
            .filter(|p| {
                p.program_sequence_id == sequence_id
                    && p.program_voice_id == voice_id
                    && p.pattern_type == pattern_type
            })
            .collect()
    }

    /// Events of a pattern ordered by beat position.
    pub fn events_of_pattern(&self, pattern_id: Uuid) -> Vec<&ProgramSequencePatternEvent> {
        let mut events: Vec<&ProgramSequencePatternEvent> = self
            .program_sequence_pattern_events
            .iter()
            .filter(|e| e.program_sequence_pattern_id == pattern_id)
            .collect();
        events.sort_by(|a, b| a.position.partial_cmp(&b.position).unwrap_or(std::cmp::Ordering::Equal));
        events
    }

    pub fn events_of_track(&self, track_id: Uuid) -> Vec<&ProgramSequencePatternEvent> {
        self.program_sequence_pattern_events
            .iter()
            .filter(|e| e.program_voice_track_id == track_id)
            .collect()
    }

    pub fn pattern_event(&self, id: Uuid) -> Option<&ProgramSequencePatternEvent> {
        self.program_sequence_pattern_events.iter().find(|e| e.id == id)
    }

    // === Instruments ===

    pub fn instrument(&self, id: Uuid) -> Option<&Instrument> {
        self.instruments.iter().find(|i| i.id == id)
    }

    pub fn instruments_of_type(&self, instrument_type: InstrumentType) -> Vec<&Instrument> {
        self.instruments
            .iter()
            .filter(|i| i.instrument_type == instrument_type)
            .collect()
    }

    pub fn memes_of_instrument(&self, instrument_id: Uuid) -> Vec<String> {
        self.instrument_memes
            .iter()
            .filter(|m| m.instrument_id == instrument_id)
            .map(|m| m.name.clone())
            .collect()
    }

    pub fn audio(&self, id: Uuid) -> Option<&InstrumentAudio> {
        self.instrument_audios.iter().find(|a| a.id == id)
    }

    pub fn audios_of_instrument(&self, instrument_id: Uuid) -> Vec<&InstrumentAudio> {
        self.instrument_audios
            .iter()
            .filter(|a| a.instrument_id == instrument_id)
            .collect()
    }

    /// The earliest-positioned event of an audio, its trigger identity for
    /// matching against pattern events.
    pub fn first_event_of_audio(&self, audio_id: Uuid) -> Option<&InstrumentAudioEvent> {
        self.instrument_audio_events
            .iter()
            .filter(|e| e.instrument_audio_id == audio_id)
            .min_by(|a, b| a.position.partial_cmp(&b.position).unwrap_or(std::cmp::Ordering::Equal))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_program(program_type: ProgramType, name: &str) -> Program {
        Program {
            id: Uuid::new_v4(),
            name: name.into(),
            program_type,
            key: "C major".into(),
            tempo: 120.0,
            intensity: 1.0,
        }
    }

    fn make_binding(program_id: Uuid, offset: i32) -> ProgramSequenceBinding {
        ProgramSequenceBinding {
            id: Uuid::new_v4(),
            program_id,
            program_sequence_id: Uuid::new_v4(),
            offset,
        }
    }

    #[test]
    fn test_available_offsets_are_sorted_and_deduped() {
        let mut catalog = ContentCatalog::default();
        let program = make_program(ProgramType::Macro, "Sparse");
        let pid = program.id;
        catalog.programs.push(program);
        for offset in [5, 0, 2, 2] {
            catalog.program_sequence_bindings.push(make_binding(pid, offset));
        }

        // Non-contiguous offsets come back as authored, not assumed 0..n
        assert_eq!(catalog.available_offsets(pid), vec![0, 2, 5]);
        assert_eq!(catalog.bindings_at_offset(pid, 2).len(), 2);
        assert_eq!(catalog.bindings_at_offset(pid, 1).len(), 0);
    }

    #[test]
    fn test_memes_of_binding() {
        let mut catalog = ContentCatalog::default();
        let binding = make_binding(Uuid::new_v4(), 0);
        let bid = binding.id;
        catalog.program_sequence_bindings.push(binding);
        for name in ["TROPICAL", "WILD"] {
            catalog
                .program_sequence_binding_memes
                .push(ProgramSequenceBindingMeme {
                    id: Uuid::new_v4(),
                    program_sequence_binding_id: bid,
                    name: name.into(),
                });
        }
        assert_eq!(catalog.memes_of_binding(bid), vec!["TROPICAL", "WILD"]);
        assert!(catalog.memes_of_binding(Uuid::new_v4()).is_empty());
    }

    #[test]
    fn test_first_event_of_audio_is_earliest() {
        let mut catalog = ContentCatalog::default();
        let audio_id = Uuid::new_v4();
        for (position, name) in [(1.0, "LATE"), (0.0, "FIRST"), (2.0, "LAST")] {
            catalog.instrument_audio_events.push(InstrumentAudioEvent {
                id: Uuid::new_v4(),
                instrument_audio_id: audio_id,
                name: name.into(),
                position,
                duration: 1.0,
                note: "C4".into(),
                velocity: 1.0,
            });
        }
        assert_eq!(catalog.first_event_of_audio(audio_id).unwrap().name, "FIRST");
    }

    #[test]
    fn test_from_json_minimal_snapshot() {
        let json = r#"{
            "programs": [{
                "id": "00000000-0000-0000-0000-000000000001",
                "name": "Opener",
                "type": "Macro",
                "key": "C major",
                "tempo": 130.0
            }],
            "program_memes": [{
                "id": "00000000-0000-0000-0000-000000000002",
                "program_id": "00000000-0000-0000-0000-000000000001",
                "name": "TROPICAL"
            }]
        }"#;
        let catalog = ContentCatalog::from_json(json).unwrap();
        assert_eq!(catalog.programs.len(), 1);
        assert_eq!(catalog.programs_of_type(ProgramType::Macro).len(), 1);
        assert_eq!(catalog.programs_of_type(ProgramType::Main).len(), 0);
        // intensity fell back to its default
        assert!((catalog.programs[0].intensity - 1.0).abs() < f64::EPSILON);
        let pid = catalog.programs[0].id;
        assert_eq!(catalog.memes_of_program(pid), vec!["TROPICAL"]);
    }
}
