//! Per-segment craft context.
//!
//! A [`Fabricator`] is built once per claimed segment. It loads the
//! previous segment's decisions, resolves what kind of segment this one
//! must be, and hands the craft stages a workbench plus the shared
//! helpers: meme algebra, key continuity, timeline math, sticky buns.

pub mod retrospective;
pub mod workbench;

use std::collections::HashSet;

use rand::SeedableRng;
use rand::rngs::SmallRng;
use thiserror::Error;
use uuid::Uuid;

use crate::MICROS_PER_MINUTE;
use crate::catalog::ContentCatalog;
use crate::catalog::entities::ProgramType;
use crate::meme::isometry::MemeIsometry;
use crate::meme::normalize;
use crate::meme::stack::MemeStack;
use crate::meme::taxonomy::MemeTaxonomy;
use crate::music::key::Key;
use crate::music::note::Note;
use crate::segment::store::{SegmentStore, StoreError};
use crate::segment::{
    Segment, SegmentBundle, SegmentChoice, SegmentChord, SegmentMeme, SegmentMeta, SegmentState,
    SegmentType, StickyBun,
};

use retrospective::SegmentRetrospective;
use workbench::SegmentWorkbench;

#[derive(Error, Debug)]
pub enum FabricationError {
    #[error("segment at offset {offset} has no previous {role} choice to continue from")]
    MissingPreviousChoice { role: &'static str, offset: u64 },

    #[error("no eligible {role} candidates for segment at offset {offset}")]
    NoCandidates { role: &'static str, offset: u64 },

    #[error("{what} {id} is not in the catalog")]
    MissingCatalogEntity { what: &'static str, id: Uuid },

    #[error("segment at offset {offset} has no tempo or total yet")]
    SegmentNotTimed { offset: u64 },

    #[error("segment meta {key} could not be encoded or decoded")]
    MetaCodec {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Beats at `tempo` BPM, as whole microseconds. Truncates.
pub fn micros_of_beats(tempo: f64, beats: f64) -> i64 {
    (beats * (MICROS_PER_MINUTE as f64 / tempo)) as i64
}

/// Each segment draws from its own stream so re-crafting any one slot of a
/// chain reproduces it exactly, regardless of what ran before.
fn rng_seed(seed: u64, chain_id: Uuid, offset: u64) -> u64 {
    seed ^ (chain_id.as_u128() as u64) ^ offset.wrapping_mul(0x9E37_79B9_7F4A_7C15)
}

/// Whether a macro/main choice can advance to a strictly later binding
/// offset within its program. Unresolvable bindings count as exhausted.
fn has_remaining_binding(catalog: &ContentCatalog, choice: &SegmentChoice) -> bool {
    let Some(binding_id) = choice.program_sequence_binding_id else {
        return false;
    };
    let Some(binding) = catalog.binding(binding_id) else {
        return false;
    };
    catalog
        .available_offsets(choice.program_id)
        .into_iter()
        .any(|o| o > binding.offset)
}

/// What kind of segment this is, from where the previous one left off:
/// first in the chain, continuing its main program, moving to the next
/// main under the same macro, or turning over the macro itself. A
/// predecessor that carries no macro/main decision is an error, never a
/// silent restart.
fn resolve_segment_type(
    catalog: &ContentCatalog,
    retrospective: &SegmentRetrospective,
    segment: &Segment,
) -> Result<SegmentType, FabricationError> {
    if segment.offset == 0 {
        return Ok(SegmentType::Initial);
    }
    let main_choice = retrospective.previous_choice(ProgramType::Main).ok_or(
        FabricationError::MissingPreviousChoice {
            role: "main",
            offset: segment.offset,
        },
    )?;
    let macro_choice = retrospective.previous_choice(ProgramType::Macro).ok_or(
        FabricationError::MissingPreviousChoice {
            role: "macro",
            offset: segment.offset,
        },
    )?;
    if has_remaining_binding(catalog, main_choice) {
        return Ok(SegmentType::Continue);
    }
    if has_remaining_binding(catalog, macro_choice) {
        return Ok(SegmentType::NextMain);
    }
    Ok(SegmentType::NextMacro)
}

#[derive(Debug)]
pub struct Fabricator<'a> {
    catalog: &'a ContentCatalog,
    pub retrospective: SegmentRetrospective,
    pub workbench: SegmentWorkbench,
    taxonomy: MemeTaxonomy,
    segment_type: SegmentType,
    rng: SmallRng,
}

impl<'a> Fabricator<'a> {
    pub fn new(
        catalog: &'a ContentCatalog,
        store: &SegmentStore,
        segment: Segment,
        taxonomy: MemeTaxonomy,
        seed: u64,
    ) -> Result<Fabricator<'a>, FabricationError> {
        let retrospective = SegmentRetrospective::load(store, &segment);
        let segment_type = resolve_segment_type(catalog, &retrospective, &segment)?;
        let rng = SmallRng::seed_from_u64(rng_seed(seed, segment.chain_id, segment.offset));
        let mut workbench = SegmentWorkbench::new(segment);
        workbench.segment.segment_type = Some(segment_type);
        Ok(Fabricator {
            catalog,
            retrospective,
            workbench,
            taxonomy,
            segment_type,
            rng,
        })
    }

    pub fn catalog(&self) -> &'a ContentCatalog {
        self.catalog
    }

    pub fn segment_type(&self) -> SegmentType {
        self.segment_type
    }

    pub fn rng(&mut self) -> &mut SmallRng {
        &mut self.rng
    }

    /// All memes a choice of this program + binding would stamp onto the
    /// segment: program memes plus binding memes, normalized, first
    /// occurrence wins.
    pub fn memes_of_choice(&self, program_id: Uuid, binding_id: Option<Uuid>) -> Vec<String> {
        let mut raw = self.catalog.memes_of_program(program_id);
        if let Some(id) = binding_id {
            raw.extend(self.catalog.memes_of_binding(id));
        }
        let mut seen = HashSet::new();
        raw.iter()
            .map(|name| normalize(name))
            .filter(|name| !name.is_empty() && seen.insert(name.clone()))
            .collect()
    }

    /// Record a choice and stamp its memes onto the segment.
    pub fn put_choice(&mut self, choice: SegmentChoice) {
        let names = self.memes_of_choice(choice.program_id, choice.program_sequence_binding_id);
        let segment_id = self.workbench.segment.id;
        for name in names {
            self.workbench.put_meme(SegmentMeme::new(segment_id, &name));
        }
        self.workbench.put_choice(choice);
    }

    /// The segment's memes so far, as a stack ready to vet candidates.
    pub fn meme_stack(&self) -> MemeStack {
        MemeStack::from(&self.taxonomy, &self.workbench.meme_names())
    }

    /// Reference memes for turning over the macro: the previous macro
    /// program's own memes plus the memes of its next-offset bindings,
    /// wrapping past the end.
    pub fn meme_isometry_of_next_sequence_in_previous_macro(&self) -> MemeIsometry {
        let Some(choice) = self.retrospective.previous_choice(ProgramType::Macro) else {
            return MemeIsometry::none();
        };
        let mut names = self.catalog.memes_of_program(choice.program_id);
        let current = choice
            .program_sequence_binding_id
            .and_then(|id| self.catalog.binding(id))
            .map(|b| b.offset);
        if let Some(current) = current {
            if let Some(next) = self.next_available_offset(choice.program_id, current) {
                for binding in self.catalog.bindings_at_offset(choice.program_id, next) {
                    names.extend(self.catalog.memes_of_binding(binding.id));
                }
            }
        }
        MemeIsometry::of(&names)
    }

    /// The binding offset a program advances to from `current`: the first
    /// strictly greater, wrapping back to the lowest at the end.
    pub fn next_available_offset(&self, program_id: Uuid, current: i32) -> Option<i32> {
        let offsets = self.catalog.available_offsets(program_id);
        offsets
            .iter()
            .copied()
            .find(|&o| o > current)
            .or_else(|| offsets.first().copied())
    }

    /// Semitones to add to content authored in `authored_key` so it lands
    /// where the chain already is: the previous segment's key. The first
    /// segment, and anything unparseable, transposes by zero.
    pub fn transpose_to_continuity(&self, authored_key: Option<&str>) -> i32 {
        let Some(authored) = authored_key.and_then(Key::parse) else {
            return 0;
        };
        let Some(target) = self
            .retrospective
            .previous_segment()
            .and_then(|s| s.key.as_deref())
            .and_then(Key::parse)
        else {
            return 0;
        };
        authored.delta_semitones(&target)
    }

    /// The chord sounding at a beat position: the latest chord at or
    /// before it.
    pub fn chord_at(&self, position: f64) -> Option<SegmentChord> {
        self.workbench
            .chords()
            .iter()
            .filter(|c| c.position <= position)
            .max_by(|a, b| {
                a.position
                    .partial_cmp(&b.position)
                    .unwrap_or(std::cmp::Ordering::Equal)
            })
            .cloned()
    }

    /// Lowest and highest notes sounded by any event of the program's
    /// voices. Atonal tones don't count.
    pub fn program_range(&self, program_id: Uuid) -> Option<(Note, Note)> {
        let mut low: Option<Note> = None;
        let mut high: Option<Note> = None;
        for voice in self.catalog.voices_of_program(program_id) {
            for track in self.catalog.tracks_of_voice(voice.id) {
                for event in self.catalog.events_of_track(track.id) {
                    for tone in event.tone_list() {
                        let Some(note) = Note::parse(&tone) else {
                            continue;
                        };
                        if low.is_none_or(|n| note.semitones() < n.semitones()) {
                            low = Some(note);
                        }
                        if high.is_none_or(|n| note.semitones() > n.semitones()) {
                            high = Some(note);
                        }
                    }
                }
            }
        }
        low.zip(high)
    }

    /// A beat position in this segment, as microseconds from its begin
    /// instant. Requires the macro/main stage to have set the tempo.
    pub fn segment_micros_at(&self, beats: f64) -> Result<i64, FabricationError> {
        let tempo =
            self.workbench
                .segment
                .tempo
                .ok_or(FabricationError::SegmentNotTimed {
                    offset: self.workbench.segment.offset,
                })?;
        Ok(micros_of_beats(tempo, beats))
    }

    pub fn segment_total(&self) -> Result<i32, FabricationError> {
        self.workbench
            .segment
            .total
            .ok_or(FabricationError::SegmentNotTimed {
                offset: self.workbench.segment.offset,
            })
    }

    /// The sticky bun for an event: reuse this segment's if already drawn,
    /// else continue the previous segment's, else draw a fresh one and
    /// persist it as a segment meta.
    pub fn sticky_bun(&mut self, event_id: Uuid) -> Result<StickyBun, FabricationError> {
        let key = StickyBun::meta_key(event_id);
        if let Some(meta) = self.workbench.meta(&key) {
            return serde_json::from_str(&meta.value).map_err(|source| {
                FabricationError::MetaCodec {
                    key: key.clone(),
                    source,
                }
            });
        }
        if let Some(meta) = self.retrospective.previous_meta(&key) {
            let bun: StickyBun = serde_json::from_str(&meta.value).map_err(|source| {
                FabricationError::MetaCodec {
                    key: key.clone(),
                    source,
                }
            })?;
            let segment_id = self.workbench.segment.id;
            self.workbench
                .put_meta(SegmentMeta::new(segment_id, &key, &meta.value));
            return Ok(bun);
        }
        let event = self.catalog.pattern_event(event_id).ok_or(
            FabricationError::MissingCatalogEntity {
                what: "program sequence pattern event",
                id: event_id,
            },
        )?;
        let count = event.tone_list().len().max(1);
        let bun = StickyBun::new(event_id, count, &mut self.rng);
        let value =
            serde_json::to_string(&bun).map_err(|source| FabricationError::MetaCodec {
                key: key.clone(),
                source,
            })?;
        let segment_id = self.workbench.segment.id;
        self.workbench
            .put_meta(SegmentMeta::new(segment_id, &key, &value));
        Ok(bun)
    }

    /// Freeze the workbench as Crafted and persist the whole bundle.
    pub fn finish(mut self, store: &mut SegmentStore) -> Result<SegmentBundle, FabricationError> {
        self.workbench.segment.state = SegmentState::Crafted;
        let bundle = self.workbench.into_bundle();
        store.put_bundle(&bundle)?;
        Ok(bundle)
    }
}
