//! Macro and main program choices, then the segment's own attributes:
//! key, tempo, intensity, total beats, end instant, and chords.
//!
//! The macro choice is made first so its memes constrain the main choice.
//! Everything the later layers need (tempo, total, chords) exists once
//! this stage returns.

use chrono::Duration;
use log::debug;
use rand::Rng;
use uuid::Uuid;

use crate::catalog::ContentCatalog;
use crate::catalog::entities::ProgramType;
use crate::config::EngineConfig;
use crate::fabricator::{FabricationError, Fabricator, micros_of_beats};
use crate::meme::isometry::MemeIsometry;
use crate::music::chord::Chord;
use crate::music::key::Key;
use crate::picker::EntityScorePicker;
use crate::segment::{SegmentChoice, SegmentChord, SegmentType};

/// The macro-level decision: which program, entered at which binding.
/// Continue segments may carry a predecessor's binding that no longer
/// resolves, hence the options.
struct MacroPlan {
    program_id: Uuid,
    binding_id: Option<Uuid>,
    sequence_id: Option<Uuid>,
}

/// The main-level decision. Unlike the macro's, this one must resolve to
/// a concrete sequence: the segment's attributes come from it.
struct MainPlan {
    program_id: Uuid,
    binding_id: Uuid,
    sequence_id: Uuid,
}

pub fn craft(fab: &mut Fabricator, config: &EngineConfig) -> Result<(), FabricationError> {
    let segment_id = fab.workbench.segment.id;

    let macro_plan = plan_macro(fab, config)?;
    let macro_key = authored_key(fab.catalog(), macro_plan.program_id, macro_plan.sequence_id);
    let macro_transpose = fab.transpose_to_continuity(macro_key.as_deref());
    fab.put_choice(SegmentChoice::new(
        segment_id,
        ProgramType::Macro,
        macro_plan.program_id,
        macro_plan.binding_id,
        macro_transpose,
    ));
    if let Some(program) = fab.catalog().program(macro_plan.program_id) {
        debug!("macro: {} transposed {:+}", program.name, macro_transpose);
    }

    let main_plan = plan_main(fab, config)?;
    let main_key = authored_key(fab.catalog(), main_plan.program_id, Some(main_plan.sequence_id));
    let main_transpose = fab.transpose_to_continuity(main_key.as_deref());
    fab.put_choice(SegmentChoice::new(
        segment_id,
        ProgramType::Main,
        main_plan.program_id,
        Some(main_plan.binding_id),
        main_transpose,
    ));
    if let Some(program) = fab.catalog().program(main_plan.program_id) {
        debug!("main: {} transposed {:+}", program.name, main_transpose);
    }

    apply_segment_attributes(fab, &main_plan, main_transpose)?;
    apply_chords(fab, &main_plan, main_transpose);
    Ok(())
}

fn plan_macro(fab: &mut Fabricator, config: &EngineConfig) -> Result<MacroPlan, FabricationError> {
    match fab.segment_type() {
        SegmentType::Initial => choose_fresh_macro(fab, config, &MemeIsometry::none(), None),
        SegmentType::Continue => {
            // The macro holds still while its main program plays out
            let (program_id, binding_id) = previous_macro(fab)?;
            let sequence_id = binding_id
                .and_then(|id| fab.catalog().binding(id))
                .map(|b| b.program_sequence_id);
            Ok(MacroPlan {
                program_id,
                binding_id,
                sequence_id,
            })
        }
        SegmentType::NextMain => {
            // Same macro program, advanced one binding offset, wrapping
            // back to the start rather than stalling at the end
            let (program_id, prev_binding) = previous_macro(fab)?;
            let current = prev_binding
                .and_then(|id| fab.catalog().binding(id))
                .map(|b| b.offset);
            match current.and_then(|c| fab.next_available_offset(program_id, c)) {
                Some(next) => {
                    let (binding_id, sequence_id) =
                        select_binding_at_offset(fab, program_id, next)?;
                    Ok(MacroPlan {
                        program_id,
                        binding_id: Some(binding_id),
                        sequence_id: Some(sequence_id),
                    })
                }
                None => {
                    let sequence_id = prev_binding
                        .and_then(|id| fab.catalog().binding(id))
                        .map(|b| b.program_sequence_id);
                    Ok(MacroPlan {
                        program_id,
                        binding_id: prev_binding,
                        sequence_id,
                    })
                }
            }
        }
        SegmentType::NextMacro => {
            let isometry = fab.meme_isometry_of_next_sequence_in_previous_macro();
            let avoid = fab
                .retrospective
                .previous_choice(ProgramType::Macro)
                .map(|c| c.program_id);
            choose_fresh_macro(fab, config, &isometry, avoid)
        }
    }
}

fn plan_main(fab: &mut Fabricator, config: &EngineConfig) -> Result<MainPlan, FabricationError> {
    match fab.segment_type() {
        SegmentType::Continue => {
            let (program_id, prev_binding) = previous_main(fab)?;
            let current = prev_binding
                .and_then(|id| fab.catalog().binding(id))
                .map(|b| b.offset);
            match current.and_then(|c| fab.next_available_offset(program_id, c)) {
                Some(next) => {
                    let (binding_id, sequence_id) =
                        select_binding_at_offset(fab, program_id, next)?;
                    Ok(MainPlan {
                        program_id,
                        binding_id,
                        sequence_id,
                    })
                }
                None => Err(FabricationError::MissingCatalogEntity {
                    what: "next sequence binding for main program",
                    id: program_id,
                }),
            }
        }
        _ => choose_fresh_main(fab, config),
    }
}

fn previous_macro(fab: &Fabricator) -> Result<(Uuid, Option<Uuid>), FabricationError> {
    let choice = fab.retrospective.previous_choice(ProgramType::Macro).ok_or(
        FabricationError::MissingPreviousChoice {
            role: "macro",
            offset: fab.workbench.segment.offset,
        },
    )?;
    Ok((choice.program_id, choice.program_sequence_binding_id))
}

fn previous_main(fab: &Fabricator) -> Result<(Uuid, Option<Uuid>), FabricationError> {
    let choice = fab.retrospective.previous_choice(ProgramType::Main).ok_or(
        FabricationError::MissingPreviousChoice {
            role: "main",
            offset: fab.workbench.segment.offset,
        },
    )?;
    Ok((choice.program_id, choice.program_sequence_binding_id))
}

/// Score every macro program that could enter the segment and take the
/// best, breaking exact ties uniformly.
fn choose_fresh_macro(
    fab: &mut Fabricator,
    config: &EngineConfig,
    isometry: &MemeIsometry,
    avoid_program: Option<Uuid>,
) -> Result<MacroPlan, FabricationError> {
    let catalog = fab.catalog();
    let stack = fab.meme_stack();
    let mut picker = EntityScorePicker::new();
    for program in catalog.programs_of_type(ProgramType::Macro) {
        if catalog.available_offsets(program.id).is_empty() {
            continue;
        }
        let memes = memes_at_beginning(catalog, program.id);
        if !stack.is_allowed(&memes) {
            debug!("macro {} conflicts with segment memes", program.name);
            continue;
        }
        let mut score = isometry.score(&memes) as f64 * config.craft.matched_memes_weight;
        if avoid_program == Some(program.id) {
            score += config.craft.avoid_previous_penalty;
        }
        picker.add(program.id, score);
    }
    let offset = fab.workbench.segment.offset;
    let program_id =
        picker
            .top_among_ties(fab.rng())
            .ok_or(FabricationError::NoCandidates {
                role: "macro",
                offset,
            })?;
    let (binding_id, sequence_id) = select_binding_at_first_offset(fab, program_id)?;
    Ok(MacroPlan {
        program_id,
        binding_id: Some(binding_id),
        sequence_id: Some(sequence_id),
    })
}

/// Score every main program against the memes the macro just stamped.
fn choose_fresh_main(
    fab: &mut Fabricator,
    config: &EngineConfig,
) -> Result<MainPlan, FabricationError> {
    let catalog = fab.catalog();
    let stack = fab.meme_stack();
    let isometry = MemeIsometry::of(&fab.workbench.meme_names());
    let avoid = fab
        .retrospective
        .previous_choice(ProgramType::Main)
        .map(|c| c.program_id);
    let mut picker = EntityScorePicker::new();
    for program in catalog.programs_of_type(ProgramType::Main) {
        if catalog.available_offsets(program.id).is_empty() {
            continue;
        }
        let memes = memes_at_beginning(catalog, program.id);
        if !stack.is_allowed(&memes) {
            debug!("main {} conflicts with segment memes", program.name);
            continue;
        }
        let mut score = isometry.score(&memes) as f64 * config.craft.matched_memes_weight;
        if avoid == Some(program.id) {
            score += config.craft.avoid_previous_penalty;
        }
        picker.add(program.id, score);
    }
    let offset = fab.workbench.segment.offset;
    let program_id =
        picker
            .top_among_ties(fab.rng())
            .ok_or(FabricationError::NoCandidates {
                role: "main",
                offset,
            })?;
    let (binding_id, sequence_id) = select_binding_at_first_offset(fab, program_id)?;
    Ok(MainPlan {
        program_id,
        binding_id,
        sequence_id,
    })
}

/// A fresh program enters at its first binding offset; its candidate memes
/// are the program's own plus that offset's binding memes.
fn memes_at_beginning(catalog: &ContentCatalog, program_id: Uuid) -> Vec<String> {
    let mut names = catalog.memes_of_program(program_id);
    if let Some(&first) = catalog.available_offsets(program_id).first() {
        for binding in catalog.bindings_at_offset(program_id, first) {
            names.extend(catalog.memes_of_binding(binding.id));
        }
    }
    names
}

/// One binding at the given offset. Several bindings at one offset are
/// authored alternates, picked uniformly.
fn select_binding_at_offset(
    fab: &mut Fabricator,
    program_id: Uuid,
    offset: i32,
) -> Result<(Uuid, Uuid), FabricationError> {
    let bindings = fab.catalog().bindings_at_offset(program_id, offset);
    if bindings.is_empty() {
        return Err(FabricationError::MissingCatalogEntity {
            what: "sequence binding for program",
            id: program_id,
        });
    }
    let index = if bindings.len() == 1 {
        0
    } else {
        fab.rng().gen_range(0..bindings.len())
    };
    let binding = bindings[index];
    Ok((binding.id, binding.program_sequence_id))
}

fn select_binding_at_first_offset(
    fab: &mut Fabricator,
    program_id: Uuid,
) -> Result<(Uuid, Uuid), FabricationError> {
    let Some(&first) = fab.catalog().available_offsets(program_id).first() else {
        return Err(FabricationError::MissingCatalogEntity {
            what: "sequence binding for program",
            id: program_id,
        });
    };
    select_binding_at_offset(fab, program_id, first)
}

/// The key content of a plan is authored in: the sequence's own key,
/// else its program's. Blank keys count as absent.
fn authored_key(
    catalog: &ContentCatalog,
    program_id: Uuid,
    sequence_id: Option<Uuid>,
) -> Option<String> {
    let sequence_key = sequence_id
        .and_then(|id| catalog.sequence(id))
        .and_then(|s| s.key.clone())
        .filter(|k| !k.trim().is_empty());
    sequence_key.or_else(|| {
        catalog
            .program(program_id)
            .map(|p| p.key.clone())
            .filter(|k| !k.trim().is_empty())
    })
}

/// The segment sounds like its main sequence: key (transposed), tempo,
/// intensity, and total beats come from it, and the end instant follows
/// from tempo and total.
fn apply_segment_attributes(
    fab: &mut Fabricator,
    plan: &MainPlan,
    transpose: i32,
) -> Result<(), FabricationError> {
    let catalog = fab.catalog();
    let program =
        catalog
            .program(plan.program_id)
            .ok_or(FabricationError::MissingCatalogEntity {
                what: "program",
                id: plan.program_id,
            })?;
    let sequence =
        catalog
            .sequence(plan.sequence_id)
            .ok_or(FabricationError::MissingCatalogEntity {
                what: "program sequence",
                id: plan.sequence_id,
            })?;

    let key = authored_key(catalog, plan.program_id, Some(plan.sequence_id)).map(|authored| {
        match Key::parse(&authored) {
            Some(k) => k.shift(transpose).to_string(),
            None => authored,
        }
    });
    let tempo = sequence.tempo.unwrap_or(program.tempo);
    let intensity = sequence.intensity.unwrap_or(program.intensity);
    let total = sequence.total;

    let segment = &mut fab.workbench.segment;
    segment.key = key;
    segment.tempo = Some(tempo);
    segment.intensity = Some(intensity);
    segment.total = Some(total);
    segment.end_at =
        Some(segment.begin_at + Duration::microseconds(micros_of_beats(tempo, total as f64)));
    Ok(())
}

/// Copy the main sequence's chords onto the segment, transposed into the
/// segment's key. Chords at or past the segment's end are dropped;
/// unparseable names are carried verbatim, untransposed.
fn apply_chords(fab: &mut Fabricator, plan: &MainPlan, transpose: i32) {
    let catalog = fab.catalog();
    let total = f64::from(fab.workbench.segment.total.unwrap_or(0));
    let segment_id = fab.workbench.segment.id;
    let mut chords = Vec::new();
    for chord in catalog.chords_of_sequence(plan.sequence_id) {
        if chord.position >= total {
            debug!("chord {} at {} is past the segment end", chord.name, chord.position);
            continue;
        }
        let name = match Chord::parse(&chord.name) {
            Some(parsed) => parsed.shift(transpose).name,
            None => chord.name.clone(),
        };
        chords.push(SegmentChord::new(segment_id, chord.position, &name));
    }
    for chord in chords {
        fab.workbench.put_chord(chord);
    }
}
