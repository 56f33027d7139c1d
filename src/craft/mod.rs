//! The fabrication pipeline for one segment: claim it, run every craft
//! stage, persist the bundle, and revert the slot on failure so it can be
//! crafted again.

pub mod macro_main;
pub mod rhythm;

use indicatif::{ProgressBar, ProgressStyle};
use log::{debug, error, info};
use uuid::Uuid;

use crate::catalog::ContentCatalog;
use crate::catalog::entities::ProgramType;
use crate::config::EngineConfig;
use crate::fabricator::{FabricationError, Fabricator};
use crate::segment::store::SegmentStore;
use crate::segment::{Segment, SegmentBundle};

/// Claim the planned segment, craft it, and persist the result. Any craft
/// failure reverts the segment to Planned with its children deleted, then
/// surfaces the original error.
pub fn craft_segment(
    catalog: &ContentCatalog,
    store: &mut SegmentStore,
    segment_id: Uuid,
    config: &EngineConfig,
) -> Result<SegmentBundle, FabricationError> {
    let claimed = store.claim_segment(segment_id)?;
    let offset = claimed.offset;
    debug!("crafting segment at offset {offset}");
    match run(catalog, store, claimed, config) {
        Ok(bundle) => {
            if let Some(segment_type) = bundle.segment.segment_type {
                info!("crafted segment at offset {offset} as {segment_type}");
            }
            Ok(bundle)
        }
        Err(err) => {
            error!("crafting segment at offset {offset} failed: {err}");
            if let Err(revert_err) = store.revert_segment(segment_id) {
                error!("could not revert segment at offset {offset}: {revert_err}");
            }
            Err(err)
        }
    }
}

fn run(
    catalog: &ContentCatalog,
    store: &mut SegmentStore,
    claimed: Segment,
    config: &EngineConfig,
) -> Result<SegmentBundle, FabricationError> {
    let mut fab = Fabricator::new(catalog, store, claimed, config.taxonomy(), config.craft.seed)?;
    macro_main::craft(&mut fab, config)?;
    rhythm::craft(&mut fab, config, ProgramType::Rhythm)?;
    rhythm::craft(&mut fab, config, ProgramType::Detail)?;
    fab.finish(store)
}

/// Append and craft `count` segments onto a chain, one at a time, with a
/// progress bar. Stops at the first fatal craft error; segments already
/// crafted stay in the store.
pub fn fabricate_chain(
    catalog: &ContentCatalog,
    store: &mut SegmentStore,
    chain_id: Uuid,
    count: usize,
    config: &EngineConfig,
) -> Result<Vec<SegmentBundle>, FabricationError> {
    info!("Fabricating {} segments", count);

    let pb = ProgressBar::new(count as u64);
    pb.set_style(
        ProgressStyle::with_template(
            "{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} ({eta}) {msg}",
        )
        .unwrap()
        .progress_chars("#>-"),
    );

    let mut bundles = Vec::with_capacity(count);
    for _ in 0..count {
        let planned = store.append_planned_segment(chain_id)?;
        let bundle = craft_segment(catalog, store, planned.id, config)?;
        pb.inc(1);
        if let Some(segment_type) = bundle.segment.segment_type {
            pb.set_message(format!("offset {} {}", bundle.segment.offset, segment_type));
        }
        bundles.push(bundle);
    }
    pb.finish_with_message(format!("Done: {} segments crafted", bundles.len()));

    Ok(bundles)
}
