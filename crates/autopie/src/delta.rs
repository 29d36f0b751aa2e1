//! The delta debugging strategy: an n-ary partition search converging to a
//! 1-minimal set of code units.

use autopie_common::{validate, BitMask, ReductionContext, ValidationMode};
use autopie_oracle::validate_variant;
use autopie_syntax::{print_variant, MappingResult, SourceTree};
use eyre::{Context as _, Result};
use std::{fs, path::PathBuf};
use tracing::{debug, warn};

/// Runs the delta debugging search. Returns true iff the surviving mask was
/// confirmed by the oracle.
pub fn run(
    context: &mut ReductionContext,
    tree: &SourceTree,
    mapping: &MappingResult,
) -> Result<bool> {
    let unit_count = mapping.unit_count;
    let mut mask = BitMask::ones(unit_count);
    let mut partition_count = 2usize;
    let mut iteration: u64 = 0;
    let mut best: Option<PathBuf> = None;

    loop {
        let kept = mask.ones_indices();

        debug!("current code unit count: {}", kept.len());
        debug!("current partition count: {partition_count}");

        if partition_count > kept.len() {
            // Cannot be split further.
            debug!("the current test case cannot be split further");
            break;
        }

        let partitions = split_evenly(&kept, partition_count);

        let mut progressed = false;

        // Subsets first, complements second, both in index order.
        for partition in &partitions {
            let candidate = subset_mask(unit_count, partition, mapping);
            if candidate.count_ones() >= mask.count_ones() {
                // Re-adding the criterion can recreate the current mask;
                // only strictly smaller candidates may be adopted.
                continue;
            }
            iteration += 1;
            if reproduces(context, tree, mapping, &candidate, iteration)? {
                println!("Iteration {iteration}: smaller subset found.");
                best = Some(context.variant_path(iteration));
                mask = candidate;
                partition_count = 2;
                progressed = true;
                break;
            }
        }

        if progressed {
            continue;
        }

        for partition in &partitions {
            let candidate = complement_mask(&mask, partition, mapping);
            if candidate.count_ones() >= mask.count_ones() {
                continue;
            }
            iteration += 1;
            if reproduces(context, tree, mapping, &candidate, iteration)? {
                println!("Iteration {iteration}: smaller complement found.");
                best = Some(context.variant_path(iteration));
                mask = candidate;
                partition_count = partition_count.saturating_sub(1).max(2);
                progressed = true;
                break;
            }
        }

        if progressed {
            continue;
        }

        debug!("iteration {iteration}: smaller subset not found");
        if partition_count >= kept.len() {
            // 1-minimal at the code-unit granularity.
            break;
        }
        partition_count = (partition_count * 2).min(kept.len());
    }

    let confirmed_path = match best {
        Some(path) => Some(path),
        None => {
            // Nothing was ever confirmed; the surviving mask is the
            // original program. Validate it once before concluding.
            iteration += 1;
            let path = context.variant_path(iteration);
            let adjusted = print_variant(tree, mapping, &mask, &path)
                .wrap_err("failed to write the final variant")?;
            context.adjusted_error_lines.insert(iteration, adjusted);
            validate_variant(context, &path).then_some(path)
        }
    };

    match confirmed_path {
        Some(path) => {
            println!("Found the smallest error-inducing source file: {}", path.display());
            let output = context.output_path();
            println!("Changing the file path to '{}'", output.display());
            fs::rename(&path, &output).wrap_err("failed to rename the result")?;
            context.stats.output_size_bytes =
                fs::metadata(&output).map(|meta| meta.len()).unwrap_or_default();
            Ok(true)
        }
        None => Ok(false),
    }
}

/// Materialises a candidate and asks the oracle whether the crash is still
/// reproduced. Invalid masks and unwritable variants are skipped.
fn reproduces(
    context: &mut ReductionContext,
    tree: &SourceTree,
    mapping: &MappingResult,
    candidate: &BitMask,
    iteration: u64,
) -> Result<bool> {
    if !validate(candidate, &mapping.graph, ValidationMode::Lax).valid {
        return Ok(false);
    }

    context.stats.total_iterations += 1;
    debug!("processing valid bitmask {candidate}");

    let path = context.variant_path(iteration);
    let adjusted = match print_variant(tree, mapping, candidate, &path) {
        Ok(adjusted) => adjusted,
        Err(error) => {
            warn!("could not process a subset: {error}");
            return Ok(false);
        }
    };
    context.adjusted_error_lines.insert(iteration, adjusted);

    Ok(validate_variant(context, &path))
}

/// Splits the kept indices into `count` nearly-equal consecutive
/// partitions, spreading the remainder over the leading ones.
fn split_evenly(kept: &[usize], count: usize) -> Vec<Vec<usize>> {
    let base = kept.len() / count;
    let remainder = kept.len() % count;

    let mut partitions = Vec::with_capacity(count);
    let mut offset = 0;
    for index in 0..count {
        let size = base + usize::from(index < remainder);
        partitions.push(kept[offset..offset + size].to_vec());
        offset += size;
    }
    partitions
}

/// A mask keeping only the given partition, plus the criterion.
fn subset_mask(unit_count: usize, partition: &[usize], mapping: &MappingResult) -> BitMask {
    let mut mask = BitMask::zeroes(unit_count);
    for &index in partition {
        mask.set(index, true);
    }
    for &index in mapping.graph.criterion() {
        mask.set(index, true);
    }
    mask
}

/// The current mask minus the given partition, with the criterion kept.
fn complement_mask(current: &BitMask, partition: &[usize], mapping: &MappingResult) -> BitMask {
    let mut mask = current.clone();
    for &index in partition {
        mask.set(index, false);
    }
    for &index in mapping.graph.criterion() {
        mask.set(index, true);
    }
    mask
}

#[cfg(test)]
mod tests {
    use super::*;
    use autopie_common::Language;
    use autopie_syntax::map_units;

    #[test]
    fn partitions_are_even_with_leading_remainder() {
        let kept: Vec<usize> = (0..7).collect();
        let partitions = split_evenly(&kept, 3);

        assert_eq!(partitions.len(), 3);
        assert_eq!(partitions[0], vec![0, 1, 2]);
        assert_eq!(partitions[1], vec![3, 4]);
        assert_eq!(partitions[2], vec![5, 6]);
    }

    #[test]
    fn splitting_into_as_many_parts_as_units_yields_singletons() {
        let kept: Vec<usize> = (0..4).collect();
        let partitions = split_evenly(&kept, 4);
        assert!(partitions.iter().all(|partition| partition.len() == 1));
    }

    fn sample_mapping() -> (SourceTree, MappingResult) {
        let source = "\
int main() {
    int x = 0;
    x = 1;
    return x;
}
";
        let tree = SourceTree::parse(source.to_owned(), Language::C).unwrap();
        let mapping = map_units(&tree, 4);
        (tree, mapping)
    }

    #[test]
    fn subset_masks_respect_the_criterion() {
        let (_, mapping) = sample_mapping();
        let mask = subset_mask(mapping.unit_count, &[0], &mapping);

        for &criterion in mapping.graph.criterion() {
            assert!(mask.get(criterion));
        }
        assert!(
            validate(&mask, &mapping.graph, ValidationMode::Lax).valid,
            "criterion-keeping subsets are always lax-valid"
        );
    }

    #[test]
    fn complement_masks_shrink_the_current_mask() {
        let (_, mapping) = sample_mapping();
        let full = BitMask::ones(mapping.unit_count);
        let kept = full.ones_indices();
        let partitions = split_evenly(&kept, 2);

        let complement = complement_mask(&full, &partitions[0], &mapping);
        assert!(complement.count_ones() < full.count_ones());
        for &criterion in mapping.graph.criterion() {
            assert!(complement.get(criterion));
        }
    }
}
