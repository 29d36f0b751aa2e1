//! Entry point: option parsing, configuration checks, and strategy
//! dispatch.

mod delta;
mod naive;
mod opts;

use autopie_common::{
    context::{clear_temp_directory, ensure_visuals_directory},
    text, InputData, Language, Location, ReductionContext, LOG_FILE,
};
use autopie_oracle::DebuggerGuard;
use autopie_syntax::{map_units, SourceTree};
use clap::Parser;
use eyre::{bail, eyre, Result, WrapErr};
use opts::{Autopie, Strategy};
use std::{fs, process::ExitCode, sync::Mutex};
use tracing_subscriber::{
    filter::LevelFilter, layer::SubscriberExt as _, util::SubscriberInitExt as _, Layer as _,
};

fn main() -> Result<ExitCode> {
    color_eyre::install()?;

    let options = Autopie::parse();
    let common = options.strategy.common();
    init_tracing(common.verbose, common.log)?;

    let source_path = common.source.clone();
    let language = Language::from_path(&source_path)
        .ok_or_else(|| eyre!("unsupported source extension: {}", source_path.display()))?;

    // Configuration check: the error location must exist; its context is
    // shown to the user.
    let Some(window) = text::location_context(&common.loc_file, common.loc_line) else {
        bail!(
            "The specified error location is invalid!\nSource path: {}, line: {} could not be found.",
            common.loc_file.display(),
            common.loc_line
        );
    };
    println!("===---------------- Context of the error-inducing line ------------------===");
    for line in window {
        println!("{line}");
    }
    println!("===----------------------------------------------------------------------===");

    let input = InputData {
        error_message: common.error_message.clone(),
        error_location: Location::new(&common.loc_file, common.loc_line),
        reduction_ratio: match &options.strategy {
            Strategy::Naive(args) => args.ratio,
            Strategy::Delta(_) => 1.0,
        },
        dump_dot: common.dump_dot,
    };

    if !(input.reduction_ratio > 0.0 && input.reduction_ratio <= 1.0) {
        bail!("the reduction ratio must lie in (0, 1]");
    }

    let source_text =
        fs::read_to_string(&source_path).wrap_err("failed to read the source file")?;
    let tree = SourceTree::parse(source_text, language)
        .wrap_err("failed to parse the source file")?;

    let mapping = map_units(&tree, common.loc_line);
    if mapping.graph.is_empty() {
        bail!("the source file contains no code units to reduce");
    }
    mapping.graph.dump_for_debugging();

    let mut context = ReductionContext::new(input, language)?;

    if context.input.dump_dot {
        ensure_visuals_directory()?;
        let dot_path = context.dot_dump_path(0);
        mapping.graph.write_dot(&dot_path).wrap_err("failed to dump the dependency graph")?;
        println!("Dumped the dependency graph to {}", dot_path.display());
    }

    clear_temp_directory()?;

    // The debugger subsystem lives exactly as long as the reduction.
    let _sentry = DebuggerGuard::init()?;

    let confirmed = match &options.strategy {
        Strategy::Naive(args) => naive::run(&mut context, &tree, &mapping, args.ratio)?,
        Strategy::Delta(_) => delta::run(&mut context, &tree, &mapping)?,
    };

    if confirmed {
        report_statistics(&context);
        Ok(ExitCode::SUCCESS)
    } else {
        clear_temp_directory()?;
        println!("A reduced version of the program could not be found.");
        Ok(ExitCode::FAILURE)
    }
}

fn report_statistics(context: &ReductionContext) {
    let stats = &context.stats;
    println!("Variants tested: {}", stats.total_iterations);
    if stats.input_size_bytes > 0 {
        println!(
            "Reduced {} bytes to {} bytes ({:.1} % of the original size).",
            stats.input_size_bytes,
            stats.output_size_bytes,
            100.0 * stats.output_size_bytes as f64 / stats.input_size_bytes as f64
        );
    }
}

/// Console diagnostics honour `--verbose`; `--log` adds a timestamped copy
/// of the same stream in `autopie.log`.
fn init_tracing(verbose: bool, log: bool) -> Result<()> {
    let level = if verbose { LevelFilter::DEBUG } else { LevelFilter::WARN };

    let console = tracing_subscriber::fmt::layer()
        .with_target(false)
        .without_time()
        .with_filter(level);

    if log {
        let file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(LOG_FILE)
            .wrap_err("failed to open the log file")?;
        let file_layer = tracing_subscriber::fmt::layer()
            .with_target(false)
            .with_ansi(false)
            .with_writer(Mutex::new(file))
            .with_filter(level);
        tracing_subscriber::registry().with(console).with(file_layer).init();
    } else {
        tracing_subscriber::registry().with(console).init();
    }

    Ok(())
}
