//! Read-only view of what the previous segment decided.

use uuid::Uuid;

use crate::catalog::entities::ProgramType;
use crate::segment::store::SegmentStore;
use crate::segment::{
    Segment, SegmentChoice, SegmentChoiceArrangementPick, SegmentMeme, SegmentMeta, SegmentState,
};

/// Loaded once when a craft begins, so the rest of the pipeline never
/// touches the store. Only a Crafted predecessor counts: anything else has
/// no decisions worth continuing from.
#[derive(Debug, Default)]
pub struct SegmentRetrospective {
    previous: Option<Segment>,
    choices: Vec<SegmentChoice>,
    memes: Vec<SegmentMeme>,
    metas: Vec<SegmentMeta>,
    picks: Vec<SegmentChoiceArrangementPick>,
}

impl SegmentRetrospective {
    pub fn load(store: &SegmentStore, segment: &Segment) -> SegmentRetrospective {
        if segment.offset == 0 {
            return SegmentRetrospective::default();
        }
        let Some(previous) = store.segment_at_offset(segment.chain_id, segment.offset - 1) else {
            return SegmentRetrospective::default();
        };
        if previous.state != SegmentState::Crafted {
            return SegmentRetrospective::default();
        }
        SegmentRetrospective {
            choices: store.choices_of_segment(previous.id),
            memes: store.memes_of_segment(previous.id),
            metas: store.metas_of_segment(previous.id),
            picks: store.picks_of_segment(previous.id),
            previous: Some(previous),
        }
    }

    pub fn previous_segment(&self) -> Option<&Segment> {
        self.previous.as_ref()
    }

    pub fn previous_choice(&self, program_type: ProgramType) -> Option<&SegmentChoice> {
        self.choices.iter().find(|c| c.program_type == program_type)
    }

    pub fn previous_memes(&self) -> Vec<String> {
        self.memes.iter().map(|m| m.name.clone()).collect()
    }

    pub fn previous_meta(&self, key: &str) -> Option<&SegmentMeta> {
        self.metas.iter().find(|m| m.key == key)
    }

    /// The previous segment's pick for the same authored event, if it made
    /// one. Lets a continued event keep sounding the same audio register.
    pub fn previous_pick_for_event(
        &self,
        event_id: Uuid,
    ) -> Option<&SegmentChoiceArrangementPick> {
        self.picks
            .iter()
            .find(|p| p.program_sequence_pattern_event_id == event_id)
    }
}
