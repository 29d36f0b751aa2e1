//! The printing pass: applies a bitmask to a fresh copy of the source
//! buffer and writes the variant to disk.
//!
//! The walk, the classification, and the index counting mirror the mapping
//! pass exactly, so bit `i` always refers to the unit the mapping pass
//! numbered `i`.

use crate::{
    classify::{classify, NodeClass},
    mapping::MappingResult,
    tree::{start_line, SourceTree},
};
use autopie_common::{text, BitMask};
use std::{fs, io, ops::Range, path::Path};
use thiserror::Error;
use tracing::debug;

/// Per-variant failures; logged and skipped by the caller.
#[derive(Debug, Error)]
pub enum PrintError {
    #[error("failed to write the variant")]
    Io(#[from] io::Error),
    #[error("deletion ranges overlap")]
    OverlappingEdits,
}

struct Edit {
    range: Range<usize>,
    replacement: &'static str,
}

/// Produces the variant selected by `mask`, writes it to `out_path`, and
/// returns the adjusted potential error lines for the oracle.
pub fn print_variant(
    tree: &SourceTree,
    mapping: &MappingResult,
    mask: &BitMask,
    out_path: &Path,
) -> Result<Vec<u32>, PrintError> {
    let backups = &mapping.potential_error_lines;
    let mut adjusted = backups.clone();
    let mut edits = Vec::new();
    let mut index = 0usize;

    for node in tree.post_order() {
        let class = classify(&node);
        if matches!(class, NodeClass::Skip | NodeClass::Reference) {
            continue;
        }

        let current = index;
        index += 1;

        if mapping.skipped.contains(&current) || mask.get(current) {
            continue;
        }

        // Deleting a range whose enclosing range is also being deleted would
        // double-delete the overlap; only remove a node when every statement
        // parent survives.
        if mapping.graph.statement_parents(current).iter().any(|&parent| !mask.get(parent)) {
            continue;
        }

        let range = tree.corrected_range(&node);
        let snippet = text::range_text(tree.source(), &range);
        debug!("Removing node {current}:\n{snippet}");

        let newlines = text::count_newlines(snippet) as u32;
        let begin = start_line(&node);
        for (slot, &backup) in adjusted.iter_mut().zip(backups.iter()) {
            if begin < backup {
                *slot -= newlines.min(backup - begin);
            }
        }

        // A compound statement becomes a null statement instead of
        // disappearing; a bare deletion could leave an `if` or loop without
        // its required statement.
        let replacement = if node.kind() == "compound_statement" { ";" } else { "" };
        edits.push(Edit { range, replacement });
    }

    let variant = apply_edits(tree.source(), &mut edits)?;
    fs::write(out_path, variant)?;

    Ok(adjusted)
}

fn apply_edits(source: &str, edits: &mut [Edit]) -> Result<String, PrintError> {
    edits.sort_by_key(|edit| edit.range.start);

    let mut output = String::with_capacity(source.len());
    let mut position = 0usize;

    for edit in edits {
        if edit.range.start < position {
            return Err(PrintError::OverlappingEdits);
        }
        output.push_str(&source[position..edit.range.start]);
        output.push_str(edit.replacement);
        position = edit.range.end;
    }
    output.push_str(&source[position..]);

    Ok(output)
}
