//! Judges candidate variants and selects the confirmed minimum.

use crate::{
    compile,
    debugger::{self, StopExpectation},
};
use autopie_common::{text, ReductionContext, TEMP_DIR};
use eyre::{Context as _, Result};
use itertools::Itertools;
use std::{
    fs,
    path::{Path, PathBuf},
};
use tracing::{debug, warn};

/// Variant id encoded in the file name: `<iteration>_<basename>.<ext>`.
fn variant_iteration(path: &Path) -> Option<u64> {
    let name = path.file_name()?.to_str()?;
    name.split('_').next()?.parse().ok()
}

/// Compiles and replays one candidate. True iff the debuggee stopped in the
/// candidate's source, on one of its adjusted error lines, with a status
/// matching the expected message.
pub fn validate_variant(context: &ReductionContext, path: &Path) -> bool {
    if !compile::compile(path, context.language) {
        // The variant does not build; move on.
        return false;
    }

    debug!("processing file: {}", path.display());

    let fallback = vec![context.input.error_location.line];
    let error_lines = variant_iteration(path)
        .and_then(|iteration| context.adjusted_error_lines.get(&iteration))
        .unwrap_or(&fallback);

    if let Some(&line) = error_lines.first() {
        if let Some(window) = text::location_context(path, line) {
            for context_line in window {
                debug!("{context_line}");
            }
        }
    }

    // The session runs with the temp directory as working directory, so the
    // executable must be addressed absolutely.
    let executable = compile::executable_path(path);
    let executable = fs::canonicalize(&executable).unwrap_or(executable);
    let source_file = path.file_name().unwrap_or_default().to_string_lossy().into_owned();
    let expectation = StopExpectation {
        source_file: &source_file,
        error_lines,
        message: &context.input.error_message,
    };

    match debugger::run_session(&executable, Path::new(TEMP_DIR), &expectation) {
        Ok(outcome) => {
            debug!(
                "session over in state {}, confirmed: {}",
                outcome
                    .final_state
                    .map_or_else(|| "Unknown".to_owned(), |state| state.to_string()),
                outcome.confirmed
            );
            outcome.confirmed
        }
        Err(error) => {
            warn!("debugger session failed: {error}");
            false
        }
    }
}

/// Candidate sources of the current epoch, smallest file first.
fn collect_candidates(context: &ReductionContext) -> Result<Vec<PathBuf>> {
    let extension = context.language.extension().trim_start_matches('.');
    let output_name = context.output_path().file_name().map(|name| name.to_os_string());

    let entries = fs::read_dir(TEMP_DIR).wrap_err("failed to read the temp directory")?;
    let candidates = entries
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| {
            path.extension().and_then(|ext| ext.to_str()) == Some(extension)
                && path.file_name().map(|name| name.to_os_string()) != output_name
        })
        .sorted_by_key(|path| fs::metadata(path).map(|meta| meta.len()).unwrap_or(u64::MAX))
        .collect();

    Ok(candidates)
}

/// Validates the current temp directory: candidates are tried in
/// non-decreasing size order and the first confirmed one is renamed to the
/// fixed output path.
pub fn validate_results(context: &mut ReductionContext) -> Result<bool> {
    let candidates = collect_candidates(context)?;
    debug!("validating {} candidates", candidates.len());

    for candidate in candidates {
        if validate_variant(context, &candidate) {
            println!(
                "Found the smallest error-inducing source file: {}",
                candidate.display()
            );

            let output = context.output_path();
            println!("Changing the file path to '{}'", output.display());
            fs::rename(&candidate, &output).wrap_err("failed to rename the result")?;
            context.stats.output_size_bytes =
                fs::metadata(&output).map(|meta| meta.len()).unwrap_or_default();

            return Ok(true);
        }
    }

    Ok(false)
}
