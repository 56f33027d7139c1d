//! In-memory segment store with guarded state transitions.
//!
//! Reads return clones so callers never hold references into the store;
//! writes go through [`protect_transition`] so a segment can only move
//! along Planned → Crafting → Crafted (or Failed), with Crafting
//! revertible back to Planned.

use std::collections::HashMap;

use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

use super::{
    Chain, Segment, SegmentBundle, SegmentChoice, SegmentChoiceArrangement,
    SegmentChoiceArrangementPick, SegmentChord, SegmentMeme, SegmentMeta, SegmentState,
};

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("{kind} {id} not found")]
    NotFound { kind: &'static str, id: Uuid },

    #[error("segment at offset {offset} is {state}, not Planned; claim refused")]
    ClaimConflict { offset: u64, state: SegmentState },

    #[error("segment state may not move from {from} to {to}")]
    IllegalTransition {
        from: SegmentState,
        to: SegmentState,
    },
}

pub type Result<T> = std::result::Result<T, StoreError>;

/// Which state changes are legal. Same-state writes are always allowed so
/// a bundle can be re-put while still Crafting.
fn protect_transition(from: SegmentState, to: SegmentState) -> Result<()> {
    use SegmentState::*;
    let ok = matches!(
        (from, to),
        (Planned, Planned | Crafting)
            | (Crafting, Crafting | Crafted | Failed | Planned)
            | (Crafted, Crafted)
            | (Failed, Failed)
    );
    if ok {
        Ok(())
    } else {
        Err(StoreError::IllegalTransition { from, to })
    }
}

/// A full chain with every segment's children, for JSON export.
#[derive(Debug, Serialize)]
pub struct ChainExport {
    pub chain: Chain,
    pub segments: Vec<SegmentBundle>,
}

#[derive(Debug, Default)]
pub struct SegmentStore {
    chains: HashMap<Uuid, Chain>,
    segments: HashMap<Uuid, Segment>,
    choices: HashMap<Uuid, SegmentChoice>,
    arrangements: HashMap<Uuid, SegmentChoiceArrangement>,
    picks: HashMap<Uuid, SegmentChoiceArrangementPick>,
    memes: HashMap<Uuid, SegmentMeme>,
    chords: HashMap<Uuid, SegmentChord>,
    metas: HashMap<Uuid, SegmentMeta>,
}

impl SegmentStore {
    pub fn new() -> SegmentStore {
        SegmentStore::default()
    }

    pub fn put_chain(&mut self, chain: Chain) {
        self.chains.insert(chain.id, chain);
    }

    pub fn chain(&self, id: Uuid) -> Result<Chain> {
        self.chains
            .get(&id)
            .cloned()
            .ok_or(StoreError::NotFound { kind: "chain", id })
    }

    /// Create the next Planned segment of a chain: offset one past the
    /// current last (or 0), beginning where the previous segment ends (or
    /// at the chain start).
    pub fn append_planned_segment(&mut self, chain_id: Uuid) -> Result<Segment> {
        let chain = self.chain(chain_id)?;
        let last = self
            .segments_of_chain(chain_id)
            .into_iter()
            .next_back();
        let (offset, begin_at) = match last {
            Some(prev) => (prev.offset + 1, prev.end_at.unwrap_or(prev.begin_at)),
            None => (0, chain.start_at),
        };
        let segment = Segment::planned(chain_id, offset, begin_at);
        self.segments.insert(segment.id, segment.clone());
        Ok(segment)
    }

    pub fn segment(&self, id: Uuid) -> Result<Segment> {
        self.segments
            .get(&id)
            .cloned()
            .ok_or(StoreError::NotFound { kind: "segment", id })
    }

    /// All segments of a chain, ascending by offset.
    pub fn segments_of_chain(&self, chain_id: Uuid) -> Vec<Segment> {
        let mut out: Vec<Segment> = self
            .segments
            .values()
            .filter(|s| s.chain_id == chain_id)
            .cloned()
            .collect();
        out.sort_by_key(|s| s.offset);
        out
    }

    pub fn segment_at_offset(&self, chain_id: Uuid, offset: u64) -> Option<Segment> {
        self.segments
            .values()
            .find(|s| s.chain_id == chain_id && s.offset == offset)
            .cloned()
    }

    /// Take exclusive ownership of a Planned segment for crafting.
    /// Compare-and-set: any other state fails immediately rather than
    /// blocking, so two workers can never craft the same slot.
    pub fn claim_segment(&mut self, id: Uuid) -> Result<Segment> {
        let segment = self
            .segments
            .get_mut(&id)
            .ok_or(StoreError::NotFound { kind: "segment", id })?;
        if segment.state != SegmentState::Planned {
            return Err(StoreError::ClaimConflict {
                offset: segment.offset,
                state: segment.state,
            });
        }
        segment.state = SegmentState::Crafting;
        Ok(segment.clone())
    }

    /// Move a segment to `to`, subject to the transition guard.
    pub fn update_segment_state(&mut self, id: Uuid, to: SegmentState) -> Result<()> {
        let segment = self
            .segments
            .get_mut(&id)
            .ok_or(StoreError::NotFound { kind: "segment", id })?;
        protect_transition(segment.state, to)?;
        segment.state = to;
        Ok(())
    }

    /// Abandon a craft in progress: destroy everything derived, clear the
    /// derived attributes, and hand the slot back as Planned so it can be
    /// re-queued.
    pub fn revert_segment(&mut self, id: Uuid) -> Result<()> {
        {
            let segment = self
                .segments
                .get(&id)
                .ok_or(StoreError::NotFound { kind: "segment", id })?;
            protect_transition(segment.state, SegmentState::Planned)?;
        }
        self.delete_segment_children(id);
        let segment = self.segments.get_mut(&id).ok_or(StoreError::NotFound {
            kind: "segment",
            id,
        })?;
        segment.state = SegmentState::Planned;
        segment.segment_type = None;
        segment.end_at = None;
        segment.key = None;
        segment.tempo = None;
        segment.intensity = None;
        segment.total = None;
        Ok(())
    }

    pub fn delete_segment_children(&mut self, segment_id: Uuid) {
        self.choices.retain(|_, c| c.segment_id != segment_id);
        self.arrangements.retain(|_, a| a.segment_id != segment_id);
        self.picks.retain(|_, p| p.segment_id != segment_id);
        self.memes.retain(|_, m| m.segment_id != segment_id);
        self.chords.retain(|_, c| c.segment_id != segment_id);
        self.metas.retain(|_, m| m.segment_id != segment_id);
    }

    /// Persist a crafted segment and all of its children in one step.
    /// The segment must already exist; its state change is guarded.
    pub fn put_bundle(&mut self, bundle: &SegmentBundle) -> Result<()> {
        let id = bundle.segment.id;
        let existing = self
            .segments
            .get(&id)
            .ok_or(StoreError::NotFound { kind: "segment", id })?;
        protect_transition(existing.state, bundle.segment.state)?;
        self.segments.insert(id, bundle.segment.clone());
        for c in &bundle.choices {
            self.choices.insert(c.id, c.clone());
        }
        for a in &bundle.arrangements {
            self.arrangements.insert(a.id, a.clone());
        }
        for p in &bundle.picks {
            self.picks.insert(p.id, p.clone());
        }
        for m in &bundle.memes {
            self.memes.insert(m.id, m.clone());
        }
        for c in &bundle.chords {
            self.chords.insert(c.id, c.clone());
        }
        for m in &bundle.metas {
            self.metas.insert(m.id, m.clone());
        }
        Ok(())
    }

    pub fn choices_of_segment(&self, segment_id: Uuid) -> Vec<SegmentChoice> {
        let mut out: Vec<SegmentChoice> = self
            .choices
            .values()
            .filter(|c| c.segment_id == segment_id)
            .cloned()
            .collect();
        out.sort_by_key(|c| c.program_type as u8);
        out
    }

    pub fn arrangements_of_segment(&self, segment_id: Uuid) -> Vec<SegmentChoiceArrangement> {
        self.arrangements
            .values()
            .filter(|a| a.segment_id == segment_id)
            .cloned()
            .collect()
    }

    pub fn picks_of_segment(&self, segment_id: Uuid) -> Vec<SegmentChoiceArrangementPick> {
        let mut out: Vec<SegmentChoiceArrangementPick> = self
            .picks
            .values()
            .filter(|p| p.segment_id == segment_id)
            .cloned()
            .collect();
        out.sort_by_key(|p| (p.start_micros, p.name.clone()));
        out
    }

    pub fn memes_of_segment(&self, segment_id: Uuid) -> Vec<SegmentMeme> {
        let mut out: Vec<SegmentMeme> = self
            .memes
            .values()
            .filter(|m| m.segment_id == segment_id)
            .cloned()
            .collect();
        out.sort_by(|a, b| a.name.cmp(&b.name));
        out
    }

    pub fn chords_of_segment(&self, segment_id: Uuid) -> Vec<SegmentChord> {
        let mut out: Vec<SegmentChord> = self
            .chords
            .values()
            .filter(|c| c.segment_id == segment_id)
            .cloned()
            .collect();
        out.sort_by(|a, b| a.position.partial_cmp(&b.position).unwrap_or(std::cmp::Ordering::Equal));
        out
    }

    pub fn metas_of_segment(&self, segment_id: Uuid) -> Vec<SegmentMeta> {
        let mut out: Vec<SegmentMeta> = self
            .metas
            .values()
            .filter(|m| m.segment_id == segment_id)
            .cloned()
            .collect();
        out.sort_by(|a, b| a.key.cmp(&b.key));
        out
    }

    pub fn meta_of_segment(&self, segment_id: Uuid, key: &str) -> Option<SegmentMeta> {
        self.metas
            .values()
            .find(|m| m.segment_id == segment_id && m.key == key)
            .cloned()
    }

    pub fn bundle_of_segment(&self, segment_id: Uuid) -> Result<SegmentBundle> {
        let segment = self.segment(segment_id)?;
        Ok(SegmentBundle {
            choices: self.choices_of_segment(segment_id),
            arrangements: self.arrangements_of_segment(segment_id),
            picks: self.picks_of_segment(segment_id),
            memes: self.memes_of_segment(segment_id),
            chords: self.chords_of_segment(segment_id),
            metas: self.metas_of_segment(segment_id),
            segment,
        })
    }

    pub fn export_chain(&self, chain_id: Uuid) -> Result<ChainExport> {
        let chain = self.chain(chain_id)?;
        let segments = self
            .segments_of_chain(chain_id)
            .into_iter()
            .map(|s| self.bundle_of_segment(s.id))
            .collect::<Result<Vec<_>>>()?;
        Ok(ChainExport { chain, segments })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::entities::ProgramType;
    use chrono::{TimeZone, Utc};

    fn make_store() -> (SegmentStore, Chain) {
        let mut store = SegmentStore::new();
        let chain = Chain::new("test", Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap());
        store.put_chain(chain.clone());
        (store, chain)
    }

    // === Append ===

    #[test]
    fn test_append_starts_at_offset_zero() {
        let (mut store, chain) = make_store();
        let seg = store.append_planned_segment(chain.id).unwrap();
        assert_eq!(seg.offset, 0);
        assert_eq!(seg.state, SegmentState::Planned);
        assert_eq!(seg.begin_at, chain.start_at);
        assert!(seg.segment_type.is_none());
    }

    #[test]
    fn test_append_chains_offsets_and_begin_instants() {
        let (mut store, chain) = make_store();
        let first = store.append_planned_segment(chain.id).unwrap();

        let mut crafted = first.clone();
        crafted.state = SegmentState::Crafting;
        store.claim_segment(first.id).unwrap();
        crafted.state = SegmentState::Crafted;
        crafted.end_at = Some(first.begin_at + chrono::Duration::microseconds(5_000_000));
        store
            .put_bundle(&SegmentBundle {
                segment: crafted.clone(),
                choices: vec![],
                arrangements: vec![],
                picks: vec![],
                memes: vec![],
                chords: vec![],
                metas: vec![],
            })
            .unwrap();

        let second = store.append_planned_segment(chain.id).unwrap();
        assert_eq!(second.offset, 1);
        assert_eq!(second.begin_at, crafted.end_at.unwrap());
    }

    #[test]
    fn test_append_unknown_chain_fails() {
        let mut store = SegmentStore::new();
        let err = store.append_planned_segment(Uuid::new_v4()).unwrap_err();
        assert!(matches!(err, StoreError::NotFound { kind: "chain", .. }));
    }

    // === Claim ===

    #[test]
    fn test_claim_moves_planned_to_crafting() {
        let (mut store, chain) = make_store();
        let seg = store.append_planned_segment(chain.id).unwrap();
        let claimed = store.claim_segment(seg.id).unwrap();
        assert_eq!(claimed.state, SegmentState::Crafting);
    }

    #[test]
    fn test_second_claim_conflicts() {
        let (mut store, chain) = make_store();
        let seg = store.append_planned_segment(chain.id).unwrap();
        store.claim_segment(seg.id).unwrap();
        let err = store.claim_segment(seg.id).unwrap_err();
        assert!(matches!(
            err,
            StoreError::ClaimConflict {
                offset: 0,
                state: SegmentState::Crafting
            }
        ));
    }

    // === Transitions ===

    #[test]
    fn test_crafted_is_terminal() {
        let (mut store, chain) = make_store();
        let seg = store.append_planned_segment(chain.id).unwrap();
        store.claim_segment(seg.id).unwrap();
        store
            .update_segment_state(seg.id, SegmentState::Crafted)
            .unwrap();
        let err = store
            .update_segment_state(seg.id, SegmentState::Crafting)
            .unwrap_err();
        assert!(matches!(err, StoreError::IllegalTransition { .. }));
        let err = store.revert_segment(seg.id).unwrap_err();
        assert!(matches!(err, StoreError::IllegalTransition { .. }));
    }

    #[test]
    fn test_planned_cannot_jump_to_crafted() {
        let (mut store, chain) = make_store();
        let seg = store.append_planned_segment(chain.id).unwrap();
        let err = store
            .update_segment_state(seg.id, SegmentState::Crafted)
            .unwrap_err();
        assert!(matches!(
            err,
            StoreError::IllegalTransition {
                from: SegmentState::Planned,
                to: SegmentState::Crafted
            }
        ));
    }

    #[test]
    fn test_crafting_may_fail() {
        let (mut store, chain) = make_store();
        let seg = store.append_planned_segment(chain.id).unwrap();
        store.claim_segment(seg.id).unwrap();
        store
            .update_segment_state(seg.id, SegmentState::Failed)
            .unwrap();
        assert_eq!(store.segment(seg.id).unwrap().state, SegmentState::Failed);
    }

    // === Revert ===

    #[test]
    fn test_revert_destroys_children_and_resets_attributes() {
        let (mut store, chain) = make_store();
        let seg = store.append_planned_segment(chain.id).unwrap();
        store.claim_segment(seg.id).unwrap();

        let mut mid = seg.clone();
        mid.state = SegmentState::Crafting;
        mid.key = Some("G major".into());
        mid.tempo = Some(140.0);
        mid.total = Some(16);
        let choice = SegmentChoice::new(seg.id, ProgramType::Main, Uuid::new_v4(), None, 0);
        store
            .put_bundle(&SegmentBundle {
                segment: mid,
                choices: vec![choice],
                arrangements: vec![],
                picks: vec![],
                memes: vec![SegmentMeme::new(seg.id, "WILD")],
                chords: vec![SegmentChord::new(seg.id, 0.0, "G major")],
                metas: vec![SegmentMeta::new(seg.id, "k", "v")],
            })
            .unwrap();

        store.revert_segment(seg.id).unwrap();

        let back = store.segment(seg.id).unwrap();
        assert_eq!(back.state, SegmentState::Planned);
        assert!(back.key.is_none());
        assert!(back.tempo.is_none());
        assert!(back.total.is_none());
        assert!(back.segment_type.is_none());
        assert!(store.choices_of_segment(seg.id).is_empty());
        assert!(store.memes_of_segment(seg.id).is_empty());
        assert!(store.chords_of_segment(seg.id).is_empty());
        assert!(store.metas_of_segment(seg.id).is_empty());

        // Slot can be claimed again
        store.claim_segment(seg.id).unwrap();
    }

    // === Bundles and export ===

    #[test]
    fn test_bundle_roundtrip_sorted_children() {
        let (mut store, chain) = make_store();
        let seg = store.append_planned_segment(chain.id).unwrap();
        store.claim_segment(seg.id).unwrap();

        let mut updated = seg.clone();
        updated.state = SegmentState::Crafted;
        store
            .put_bundle(&SegmentBundle {
                segment: updated,
                choices: vec![],
                arrangements: vec![],
                picks: vec![],
                memes: vec![
                    SegmentMeme::new(seg.id, "WILD"),
                    SegmentMeme::new(seg.id, "COZY"),
                ],
                chords: vec![
                    SegmentChord::new(seg.id, 8.0, "Ab minor"),
                    SegmentChord::new(seg.id, 0.0, "G major"),
                ],
                metas: vec![],
            })
            .unwrap();

        let bundle = store.bundle_of_segment(seg.id).unwrap();
        let meme_names: Vec<&str> = bundle.memes.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(meme_names, vec!["COZY", "WILD"]);
        let chord_names: Vec<&str> = bundle.chords.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(chord_names, vec!["G major", "Ab minor"]);
    }

    #[test]
    fn test_export_covers_all_segments_in_order() {
        let (mut store, chain) = make_store();
        for _ in 0..3 {
            let seg = store.append_planned_segment(chain.id).unwrap();
            store.claim_segment(seg.id).unwrap();
            store
                .update_segment_state(seg.id, SegmentState::Crafted)
                .unwrap();
        }
        let export = store.export_chain(chain.id).unwrap();
        assert_eq!(export.chain.id, chain.id);
        let offsets: Vec<u64> = export.segments.iter().map(|b| b.segment.offset).collect();
        assert_eq!(offsets, vec![0, 1, 2]);
    }
}
