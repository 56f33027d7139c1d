pub mod store;

use std::fmt;

use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::catalog::entities::ProgramType;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SegmentState {
    Planned,
    Crafting,
    Crafted,
    Failed,
}

impl fmt::Display for SegmentState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SegmentState::Planned => "Planned",
            SegmentState::Crafting => "Crafting",
            SegmentState::Crafted => "Crafted",
            SegmentState::Failed => "Failed",
        };
        f.write_str(s)
    }
}

/// How a segment relates to its predecessor. Computed from the previous
/// segment's choices, never chosen directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SegmentType {
    Initial,
    Continue,
    NextMain,
    NextMacro,
}

impl fmt::Display for SegmentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SegmentType::Initial => "Initial",
            SegmentType::Continue => "Continue",
            SegmentType::NextMain => "NextMain",
            SegmentType::NextMacro => "NextMacro",
        };
        f.write_str(s)
    }
}

/// An ordered, append-only run of segments.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chain {
    pub id: Uuid,
    pub name: String,
    pub start_at: DateTime<Utc>,
}

impl Chain {
    pub fn new(name: &str, start_at: DateTime<Utc>) -> Chain {
        Chain {
            id: Uuid::new_v4(),
            name: name.into(),
            start_at,
        }
    }
}

/// One discrete, independently fabricated time-slot of a chain.
///
/// Created Planned with only its position and begin instant; everything else
/// is filled in during the Crafting phase and frozen at Crafted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Segment {
    pub id: Uuid,
    pub chain_id: Uuid,
    pub offset: u64,
    pub state: SegmentState,
    #[serde(rename = "type")]
    pub segment_type: Option<SegmentType>,
    pub begin_at: DateTime<Utc>,
    pub end_at: Option<DateTime<Utc>>,
    pub key: Option<String>,
    pub tempo: Option<f64>,
    pub intensity: Option<f64>,
    /// Total beats.
    pub total: Option<i32>,
}

impl Segment {
    pub fn planned(chain_id: Uuid, offset: u64, begin_at: DateTime<Utc>) -> Segment {
        Segment {
            id: Uuid::new_v4(),
            chain_id,
            offset,
            state: SegmentState::Planned,
            segment_type: None,
            begin_at,
            end_at: None,
            key: None,
            tempo: None,
            intensity: None,
            total: None,
        }
    }
}

/// Binds a segment to one chosen program (and, for macro/main choices, the
/// specific sequence binding) with the transpose that keeps it
/// pitch-continuous.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SegmentChoice {
    pub id: Uuid,
    pub segment_id: Uuid,
    pub program_type: ProgramType,
    pub program_id: Uuid,
    pub program_sequence_binding_id: Option<Uuid>,
    /// Semitones.
    pub transpose: i32,
}

impl SegmentChoice {
    pub fn new(
        segment_id: Uuid,
        program_type: ProgramType,
        program_id: Uuid,
        program_sequence_binding_id: Option<Uuid>,
        transpose: i32,
    ) -> SegmentChoice {
        SegmentChoice {
            id: Uuid::new_v4(),
            segment_id,
            program_type,
            program_id,
            program_sequence_binding_id,
            transpose,
        }
    }
}

/// Which instrument plays which voice of a choice's program.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SegmentChoiceArrangement {
    pub id: Uuid,
    pub segment_id: Uuid,
    pub segment_choice_id: Uuid,
    pub program_voice_id: Uuid,
    pub instrument_id: Uuid,
}

impl SegmentChoiceArrangement {
    pub fn new(
        segment_id: Uuid,
        segment_choice_id: Uuid,
        program_voice_id: Uuid,
        instrument_id: Uuid,
    ) -> SegmentChoiceArrangement {
        SegmentChoiceArrangement {
            id: Uuid::new_v4(),
            segment_id,
            segment_choice_id,
            program_voice_id,
            instrument_id,
        }
    }
}

/// One concrete note trigger, ready for the renderer: which audio, when,
/// how long, how loud, sounding what.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SegmentChoiceArrangementPick {
    pub id: Uuid,
    pub segment_id: Uuid,
    pub segment_choice_arrangement_id: Uuid,
    pub program_sequence_pattern_event_id: Uuid,
    pub instrument_audio_id: Uuid,
    pub start_micros: i64,
    pub length_micros: i64,
    pub amplitude: f64,
    /// Resolved note name, or "X" for atonal triggers.
    pub note: String,
    /// Track name, e.g. "KICK".
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SegmentMeme {
    pub id: Uuid,
    pub segment_id: Uuid,
    pub name: String,
}

impl SegmentMeme {
    pub fn new(segment_id: Uuid, name: &str) -> SegmentMeme {
        SegmentMeme {
            id: Uuid::new_v4(),
            segment_id,
            name: name.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SegmentChord {
    pub id: Uuid,
    pub segment_id: Uuid,
    pub position: f64,
    pub name: String,
}

impl SegmentChord {
    pub fn new(segment_id: Uuid, position: f64, name: &str) -> SegmentChord {
        SegmentChord {
            id: Uuid::new_v4(),
            segment_id,
            position,
            name: name.into(),
        }
    }
}

/// Key → JSON-value note-to-self persisted with a segment, e.g. sticky buns.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SegmentMeta {
    pub id: Uuid,
    pub segment_id: Uuid,
    pub key: String,
    pub value: String,
}

impl SegmentMeta {
    pub fn new(segment_id: Uuid, key: &str, value: &str) -> SegmentMeta {
        SegmentMeta {
            id: Uuid::new_v4(),
            segment_id,
            key: key.into(),
            value: value.into(),
        }
    }
}

/// A persisted per-event random selection: one value per event tone, drawn
/// once, then reused verbatim for as long as the event keeps continuing
/// into following segments.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StickyBun {
    pub event_id: Uuid,
    pub values: Vec<u32>,
}

impl StickyBun {
    /// Values are uniform in 0..MAX_VALUE.
    pub const MAX_VALUE: u32 = 100;

    pub fn new(event_id: Uuid, count: usize, rng: &mut impl Rng) -> StickyBun {
        StickyBun {
            event_id,
            values: (0..count).map(|_| rng.gen_range(0..Self::MAX_VALUE)).collect(),
        }
    }

    /// The segment-meta key this bun is stored under.
    pub fn meta_key(event_id: Uuid) -> String {
        format!("StickyBun_{event_id}")
    }

    /// Map the stored value for tone `index` onto a list of `options`
    /// candidates by linear scaling. Growing the option list never
    /// reshuffles which option a low value lands on.
    pub fn note_index(&self, index: usize, options: usize) -> usize {
        if options == 0 {
            return 0;
        }
        let value = self.values.get(index).copied().unwrap_or(0);
        ((value as usize * options) / Self::MAX_VALUE as usize).min(options - 1)
    }
}

/// Everything persisted for one segment, batched for the store and for
/// chain export.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SegmentBundle {
    pub segment: Segment,
    pub choices: Vec<SegmentChoice>,
    pub arrangements: Vec<SegmentChoiceArrangement>,
    pub picks: Vec<SegmentChoiceArrangementPick>,
    pub memes: Vec<SegmentMeme>,
    pub chords: Vec<SegmentChord>,
    pub metas: Vec<SegmentMeta>,
}
