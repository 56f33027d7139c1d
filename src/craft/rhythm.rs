//! Rhythm and detail layers: one program choice for the layer, an
//! instrument arranged onto each of its voices, and the voice's patterns
//! cut into concrete audio picks across the segment's beats.
//!
//! A segment with no eligible program for a layer simply goes without it;
//! only the macro/main skeleton is allowed to fail fabrication.

use log::{debug, warn};
use rand::Rng;
use uuid::Uuid;

use crate::catalog::ContentCatalog;
use crate::catalog::entities::{
    InstrumentAudio, InstrumentType, PatternType, ProgramSequencePattern,
    ProgramSequencePatternEvent, ProgramType,
};
use crate::config::EngineConfig;
use crate::fabricator::{FabricationError, Fabricator};
use crate::meme::isometry::MemeIsometry;
use crate::music::key::Key;
use crate::music::note::Note;
use crate::picker::EntityScorePicker;
use crate::segment::{
    SegmentChoice, SegmentChoiceArrangement, SegmentChoiceArrangementPick, SegmentType,
};

/// Constants shared by every pick cut for one arranged voice.
struct VoiceLane {
    program_id: Uuid,
    arrangement_id: Uuid,
    instrument_id: Uuid,
    transpose: i32,
}

fn role_of(program_type: ProgramType) -> &'static str {
    match program_type {
        ProgramType::Macro => "macro",
        ProgramType::Main => "main",
        ProgramType::Rhythm => "rhythm",
        ProgramType::Detail => "detail",
    }
}

pub fn craft(
    fab: &mut Fabricator,
    config: &EngineConfig,
    program_type: ProgramType,
) -> Result<(), FabricationError> {
    let role = role_of(program_type);
    let Some(program_id) = choose_program(fab, config, program_type) else {
        debug!("no eligible {role} program; the layer stays empty");
        return Ok(());
    };

    let segment_id = fab.workbench.segment.id;
    let authored = fab.catalog().program(program_id).map(|p| p.key.clone());
    let transpose = transpose_to_segment(fab, authored.as_deref());
    let choice = SegmentChoice::new(segment_id, program_type, program_id, None, transpose);
    let choice_id = choice.id;
    fab.put_choice(choice);

    let Some(sequence_id) = choose_sequence(fab, program_id) else {
        debug!("{role} program has no sequences; nothing to arrange");
        return Ok(());
    };

    for voice in fab.catalog().voices_of_program(program_id) {
        let Some(instrument_id) = choose_instrument(fab, config, voice.instrument_type) else {
            warn!(
                "no {} instrument fits voice {}; the voice stays silent",
                voice.instrument_type, voice.name
            );
            continue;
        };
        let arrangement =
            SegmentChoiceArrangement::new(segment_id, choice_id, voice.id, instrument_id);
        let lane = VoiceLane {
            program_id,
            arrangement_id: arrangement.id,
            instrument_id,
            transpose,
        };
        fab.workbench.put_arrangement(arrangement);
        craft_voice(fab, &lane, sequence_id, voice.id)?;
    }
    Ok(())
}

/// A continued segment keeps its previous layer program; anything else
/// scores the field against the segment's memes. No candidate at all is
/// fine here, the layer is optional.
fn choose_program(
    fab: &mut Fabricator,
    config: &EngineConfig,
    program_type: ProgramType,
) -> Option<Uuid> {
    if fab.segment_type() == SegmentType::Continue {
        let previous = fab
            .retrospective
            .previous_choice(program_type)
            .map(|c| c.program_id);
        if let Some(id) = previous {
            if fab.catalog().program(id).is_some() {
                return Some(id);
            }
        }
    }
    let catalog = fab.catalog();
    let stack = fab.meme_stack();
    let isometry = MemeIsometry::of(&fab.workbench.meme_names());
    let mut picker = EntityScorePicker::new();
    for program in catalog.programs_of_type(program_type) {
        let memes = catalog.memes_of_program(program.id);
        if !stack.is_allowed(&memes) {
            debug!(
                "{} {} conflicts with segment memes",
                role_of(program_type),
                program.name
            );
            continue;
        }
        picker.add(
            program.id,
            isometry.score(&memes) as f64 * config.craft.rhythm_matched_memes_weight,
        );
    }
    picker.top_among_ties(fab.rng())
}

fn choose_sequence(fab: &mut Fabricator, program_id: Uuid) -> Option<Uuid> {
    let sequences = fab.catalog().sequences_of_program(program_id);
    if sequences.is_empty() {
        return None;
    }
    let index = if sequences.len() == 1 {
        0
    } else {
        fab.rng().gen_range(0..sequences.len())
    };
    Some(sequences[index].id)
}

fn choose_instrument(
    fab: &mut Fabricator,
    config: &EngineConfig,
    instrument_type: InstrumentType,
) -> Option<Uuid> {
    let catalog = fab.catalog();
    let stack = fab.meme_stack();
    let isometry = MemeIsometry::of(&fab.workbench.meme_names());
    let mut picker = EntityScorePicker::new();
    for instrument in catalog.instruments_of_type(instrument_type) {
        let memes = catalog.memes_of_instrument(instrument.id);
        if !stack.is_allowed(&memes) {
            debug!("instrument {} conflicts with segment memes", instrument.name);
            continue;
        }
        picker.add(
            instrument.id,
            isometry.score(&memes) as f64 * config.craft.rhythm_matched_memes_weight,
        );
    }
    picker.top_among_ties(fab.rng())
}

/// Semitone delta carrying an authored key into the key this segment
/// already sounds in. Unparseable on either side means no transposition.
fn transpose_to_segment(fab: &Fabricator, authored: Option<&str>) -> i32 {
    let Some(authored) = authored.and_then(Key::parse) else {
        return 0;
    };
    match fab.workbench.segment.key.as_deref().and_then(Key::parse) {
        Some(target) => authored.delta_semitones(&target),
        None => 0,
    }
}

/// Stitch one voice across the whole segment: intro first, loop patterns
/// (re-drawn each pass) until the outro's reserved tail, outro last.
fn craft_voice(
    fab: &mut Fabricator,
    lane: &VoiceLane,
    sequence_id: Uuid,
    voice_id: Uuid,
) -> Result<(), FabricationError> {
    let total = f64::from(fab.segment_total()?);

    // Size the outro before anything else so the loops know where to stop
    let outro = pick_pattern(fab, sequence_id, voice_id, PatternType::Outro);
    let loop_out = total - outro.map(|p| f64::from(p.total)).unwrap_or(0.0);

    let mut cursor = 0.0;
    if let Some(intro) = pick_pattern(fab, sequence_id, voice_id, PatternType::Intro) {
        cursor += craft_pattern_events(fab, lane, intro, cursor, loop_out)?;
    }
    while cursor < loop_out {
        let Some(looped) = pick_pattern(fab, sequence_id, voice_id, PatternType::Loop) else {
            break;
        };
        let consumed = craft_pattern_events(fab, lane, looped, cursor, loop_out)?;
        if consumed <= 0.0 {
            break;
        }
        cursor += consumed;
    }
    if let Some(outro) = outro {
        craft_pattern_events(fab, lane, outro, cursor.max(loop_out), total)?;
    }
    Ok(())
}

/// One pattern of the given type for this voice, drawn uniformly when the
/// author provided alternates.
fn pick_pattern<'a>(
    fab: &mut Fabricator<'a>,
    sequence_id: Uuid,
    voice_id: Uuid,
    pattern_type: PatternType,
) -> Option<&'a ProgramSequencePattern> {
    let patterns = fab
        .catalog()
        .patterns_of_voice(sequence_id, voice_id, pattern_type);
    if patterns.is_empty() {
        return None;
    }
    let index = if patterns.len() == 1 {
        0
    } else {
        fab.rng().gen_range(0..patterns.len())
    };
    Some(patterns[index])
}

/// Cut one pattern's events into picks between `from` and `until` beats.
/// Events past the clamped span are dropped, durations are clamped to it.
/// Returns the span of beats actually consumed.
fn craft_pattern_events(
    fab: &mut Fabricator,
    lane: &VoiceLane,
    pattern: &ProgramSequencePattern,
    from: f64,
    until: f64,
) -> Result<f64, FabricationError> {
    let span = (until - from).min(f64::from(pattern.total));
    if span <= 0.0 {
        return Ok(0.0);
    }
    for event in fab.catalog().events_of_pattern(pattern.id) {
        if event.position >= span {
            continue;
        }
        let duration = event.duration.min(span - event.position);
        pick_event(fab, lane, event, from + event.position, duration)?;
    }
    Ok(span)
}

/// Turn one pattern event into picks, one per tone. Atonal tones index the
/// audio pool through the event's sticky bun; tonal ones transpose, settle
/// into the octave nearest their continuity reference, and take the audio
/// whose trigger note lies closest.
fn pick_event(
    fab: &mut Fabricator,
    lane: &VoiceLane,
    event: &ProgramSequencePatternEvent,
    position: f64,
    duration: f64,
) -> Result<(), FabricationError> {
    let catalog = fab.catalog();
    let instrument =
        catalog
            .instrument(lane.instrument_id)
            .ok_or(FabricationError::MissingCatalogEntity {
                what: "instrument",
                id: lane.instrument_id,
            })?;
    let track = catalog.track(event.program_voice_track_id).ok_or(
        FabricationError::MissingCatalogEntity {
            what: "voice track",
            id: event.program_voice_track_id,
        },
    )?;

    let pool = audio_pool(catalog, lane.instrument_id, &track.name);
    if pool.is_empty() {
        warn!(
            "instrument {} has no audio for track {}",
            instrument.name, track.name
        );
        return Ok(());
    }

    let start_micros = fab.segment_micros_at(position)?;
    let length_micros = fab.segment_micros_at(position + duration)? - start_micros;
    let amplitude = event.velocity * instrument.intensity;
    let segment_id = fab.workbench.segment.id;

    for (index, tone) in event.tone_list().iter().enumerate() {
        let (audio_id, note) = if tone.eq_ignore_ascii_case("X") {
            let bun = fab.sticky_bun(event.id)?;
            let audio = pool[bun.note_index(index, pool.len())];
            (audio.id, "X".to_string())
        } else {
            let Some(authored) = Note::parse(tone) else {
                warn!("tone {} of track {} is not a note", tone, track.name);
                continue;
            };
            let target = authored.shift(lane.transpose);
            let reference = fab
                .retrospective
                .previous_pick_for_event(event.id)
                .and_then(|p| Note::parse(&p.note))
                .or_else(|| program_midpoint(fab, lane.program_id))
                .unwrap_or(target);
            let fitted = target.nearest_octave_of(reference);
            let Some(audio) = nearest_audio(catalog, &pool, fitted) else {
                warn!(
                    "instrument {} has no tonal audio for track {}",
                    instrument.name, track.name
                );
                continue;
            };
            (audio.id, fitted.to_string())
        };
        fab.workbench.put_pick(SegmentChoiceArrangementPick {
            id: Uuid::new_v4(),
            segment_id,
            segment_choice_arrangement_id: lane.arrangement_id,
            program_sequence_pattern_event_id: event.id,
            instrument_audio_id: audio_id,
            start_micros,
            length_micros,
            amplitude,
            note,
            name: track.name.clone(),
        });
    }
    Ok(())
}

/// An instrument's audios, narrowed to the ones whose trigger event is
/// named like the track when any are, ordered by audio name so sticky bun
/// indexing stays stable run to run.
fn audio_pool<'a>(
    catalog: &'a ContentCatalog,
    instrument_id: Uuid,
    track_name: &str,
) -> Vec<&'a InstrumentAudio> {
    let all = catalog.audios_of_instrument(instrument_id);
    let mut pool: Vec<&InstrumentAudio> = all
        .iter()
        .copied()
        .filter(|audio| {
            catalog
                .first_event_of_audio(audio.id)
                .is_some_and(|e| e.name.eq_ignore_ascii_case(track_name))
        })
        .collect();
    if pool.is_empty() {
        pool = all;
    }
    pool.sort_by(|a, b| a.name.cmp(&b.name));
    pool
}

/// Middle of the program's authored note range, the continuity reference
/// for the first tonal pick of an event.
fn program_midpoint(fab: &Fabricator, program_id: Uuid) -> Option<Note> {
    let (low, high) = fab.program_range(program_id)?;
    Some(Note::from_semitones((low.semitones() + high.semitones()) / 2))
}

/// The pool audio whose trigger note lies closest to the fitted note.
/// Exact ties resolve toward the lower-pitched audio.
fn nearest_audio<'a>(
    catalog: &ContentCatalog,
    pool: &[&'a InstrumentAudio],
    fitted: Note,
) -> Option<&'a InstrumentAudio> {
    pool.iter()
        .filter_map(|audio| {
            let event = catalog.first_event_of_audio(audio.id)?;
            let note = Note::parse(&event.note)?;
            Some((*audio, note))
        })
        .min_by_key(|(_, note)| {
            (
                (note.semitones() - fitted.semitones()).abs(),
                note.semitones(),
            )
        })
        .map(|(audio, _)| audio)
}
