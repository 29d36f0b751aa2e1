//! The naive strategy: enumerate every valid bitmask, bin the masks by how
//! much source they keep, and test the most aggressive bins first.

use autopie_common::{
    context::clear_temp_directory, validate, BitMask, DependencyGraph, ReductionContext,
    ValidationMode,
};
use autopie_oracle::validate_results;
use autopie_syntax::{print_variant, MappingResult, SourceTree};
use eyre::Result;
use tracing::{debug, warn};

/// Number of iterative-deepening epochs.
pub const EPOCH_COUNT: usize = 5;

/// Runs the naive search. Returns true once an epoch confirms a minimum.
pub fn run(
    context: &mut ReductionContext,
    tree: &SourceTree,
    mapping: &MappingResult,
    ratio: f64,
) -> Result<bool> {
    let unit_count = mapping.unit_count;
    context.stats.expected_iterations = 2f64.powi(unit_count as i32);

    println!("Binning variants...");
    let bins = partition_into_bins(&mapping.graph, unit_count, ratio);

    for epoch in 0..EPOCH_COUNT {
        context.current_epoch = epoch;
        context.adjusted_error_lines.clear();

        generate_bin(context, tree, mapping, &bins[epoch])?;

        if validate_results(context)? {
            return Ok(true);
        }

        println!(
            "Epoch {} out of {EPOCH_COUNT}: A smaller program variant could not be found.",
            epoch + 1
        );
        clear_temp_directory()?;
    }

    Ok(false)
}

/// Enumerates all bitmasks and buckets the valid ones by surviving ratio:
/// one bin per epoch over `[0, ratio]`, plus two overflow bins that are
/// never tested (the all-ones mask always lands there).
fn partition_into_bins(
    graph: &DependencyGraph,
    unit_count: usize,
    ratio: f64,
) -> Vec<Vec<BitMask>> {
    let epoch_step = ratio / EPOCH_COUNT as f64;
    let mut bins = vec![Vec::new(); EPOCH_COUNT + 2];

    let mut mask = BitMask::zeroes(unit_count);
    while !mask.is_full() {
        mask.increment();

        let validity = validate(&mask, graph, ValidationMode::Strict);
        if !validity.valid {
            continue;
        }

        let slot = (0..EPOCH_COUNT)
            .find(|&bin| validity.ratio < (bin + 1) as f64 * epoch_step)
            .unwrap_or(if validity.ratio < 1.0 { EPOCH_COUNT } else { EPOCH_COUNT + 1 });
        bins[slot].push(mask.clone());
    }

    debug!(
        "binned {} valid masks",
        bins.iter().map(Vec::len).sum::<usize>()
    );
    bins
}

/// Prints every mask of one bin into the temp directory.
fn generate_bin(
    context: &mut ReductionContext,
    tree: &SourceTree,
    mapping: &MappingResult,
    masks: &[BitMask],
) -> Result<()> {
    let mut variants_count: u64 = 0;

    for mask in masks {
        variants_count += 1;
        context.stats.total_iterations += 1;

        if variants_count % 50 == 0 {
            println!("Done {variants_count} variants.");
        }

        debug!("processing valid bitmask {mask}");

        let path = context.variant_path(variants_count);
        match print_variant(tree, mapping, mask, &path) {
            Ok(adjusted) => {
                context.adjusted_error_lines.insert(variants_count, adjusted);
            }
            Err(error) => {
                warn!("could not process iteration no. {variants_count}: {error}");
            }
        }
    }

    println!("Finished. Done {variants_count} variants.");
    Ok(())
}
