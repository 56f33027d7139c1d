//! Mutable scratchpad for the segment being crafted.

use crate::catalog::entities::ProgramType;
use crate::meme::normalize;
use crate::segment::{
    Segment, SegmentBundle, SegmentChoice, SegmentChoiceArrangement, SegmentChoiceArrangementPick,
    SegmentChord, SegmentMeme, SegmentMeta,
};

/// Accumulates every child entity while craft stages run, then folds into
/// a [`SegmentBundle`] for a single store write. Nothing here is persisted
/// until the fabricator finishes.
#[derive(Debug)]
pub struct SegmentWorkbench {
    pub segment: Segment,
    choices: Vec<SegmentChoice>,
    arrangements: Vec<SegmentChoiceArrangement>,
    picks: Vec<SegmentChoiceArrangementPick>,
    memes: Vec<SegmentMeme>,
    chords: Vec<SegmentChord>,
    metas: Vec<SegmentMeta>,
}

impl SegmentWorkbench {
    pub fn new(segment: Segment) -> SegmentWorkbench {
        SegmentWorkbench {
            segment,
            choices: Vec::new(),
            arrangements: Vec::new(),
            picks: Vec::new(),
            memes: Vec::new(),
            chords: Vec::new(),
            metas: Vec::new(),
        }
    }

    pub fn put_choice(&mut self, choice: SegmentChoice) {
        self.choices.push(choice);
    }

    pub fn put_arrangement(&mut self, arrangement: SegmentChoiceArrangement) {
        self.arrangements.push(arrangement);
    }

    pub fn put_pick(&mut self, pick: SegmentChoiceArrangementPick) {
        self.picks.push(pick);
    }

    /// Meme names are unique per segment; a duplicate (case-insensitive)
    /// is silently dropped.
    pub fn put_meme(&mut self, meme: SegmentMeme) {
        let name = normalize(&meme.name);
        if self.memes.iter().any(|m| normalize(&m.name) == name) {
            return;
        }
        self.memes.push(meme);
    }

    pub fn put_chord(&mut self, chord: SegmentChord) {
        self.chords.push(chord);
    }

    /// Metas are keyed; a second put with the same key replaces the first.
    pub fn put_meta(&mut self, meta: SegmentMeta) {
        self.metas.retain(|m| m.key != meta.key);
        self.metas.push(meta);
    }

    pub fn choices(&self) -> &[SegmentChoice] {
        &self.choices
    }

    pub fn choice_of_type(&self, program_type: ProgramType) -> Option<&SegmentChoice> {
        self.choices.iter().find(|c| c.program_type == program_type)
    }

    pub fn arrangements(&self) -> &[SegmentChoiceArrangement] {
        &self.arrangements
    }

    pub fn picks(&self) -> &[SegmentChoiceArrangementPick] {
        &self.picks
    }

    pub fn memes(&self) -> &[SegmentMeme] {
        &self.memes
    }

    pub fn meme_names(&self) -> Vec<String> {
        self.memes.iter().map(|m| m.name.clone()).collect()
    }

    pub fn chords(&self) -> &[SegmentChord] {
        &self.chords
    }

    pub fn meta(&self, key: &str) -> Option<&SegmentMeta> {
        self.metas.iter().find(|m| m.key == key)
    }

    pub fn into_bundle(self) -> SegmentBundle {
        SegmentBundle {
            segment: self.segment,
            choices: self.choices,
            arrangements: self.arrangements,
            picks: self.picks,
            memes: self.memes,
            chords: self.chords,
            metas: self.metas,
        }
    }
}
