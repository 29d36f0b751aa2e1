//! The command-line surface, shared between the two reduction strategies.

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// Minimises a crashing C/C++ source file while preserving the crash.
///
/// Given a file that fails at runtime on a known line with a known message,
/// autopie searches for the smallest syntactically valid sub-program that
/// still reproduces the failure.
#[derive(Debug, Parser)]
#[command(name = "autopie", version)]
pub struct Autopie {
    #[command(subcommand)]
    pub strategy: Strategy,
}

#[derive(Debug, Subcommand)]
pub enum Strategy {
    /// Exhaustive bitmask search, iteratively deepened by variant size.
    Naive(NaiveArgs),
    /// 1-minimal delta debugging search.
    Delta(ReduceArgs),
}

impl Strategy {
    pub fn common(&self) -> &ReduceArgs {
        match self {
            Self::Naive(args) => &args.common,
            Self::Delta(args) => args,
        }
    }
}

#[derive(Debug, Args)]
pub struct NaiveArgs {
    #[command(flatten)]
    pub common: ReduceArgs,

    /// Limits the reduction to a specific ratio between 0 and 1.
    #[arg(long, default_value_t = 1.0)]
    pub ratio: f64,
}

#[derive(Debug, Args)]
pub struct ReduceArgs {
    /// The name of the file in which the error occurred.
    #[arg(long = "loc-file")]
    pub loc_file: PathBuf,

    /// The line number on which the error occurred.
    #[arg(long = "loc-line")]
    pub loc_line: u32,

    /// A part of the error message specifying the nature of the error.
    /// Matched case-insensitively; an empty message matches any stop.
    #[arg(long = "error-message", default_value = "")]
    pub error_message: String,

    /// Dump a GraphViz file with the relationships of code units.
    #[arg(long = "dump-dot", short = 'd')]
    pub dump_dot: bool,

    /// Flood the standard output with optional messages.
    #[arg(long, short = 'v')]
    pub verbose: bool,

    /// Copy optional messages, with timestamps, to `autopie.log`.
    #[arg(long = "log", short = 'l')]
    pub log: bool,

    /// The source file to reduce.
    pub source: PathBuf,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Autopie::command().debug_assert();
    }

    #[test]
    fn naive_arguments_parse() {
        let parsed = Autopie::try_parse_from([
            "autopie",
            "naive",
            "--loc-file",
            "example.c",
            "--loc-line",
            "17",
            "--error-message",
            "segmentation fault",
            "--ratio",
            "0.5",
            "example.c",
        ])
        .unwrap();

        let Strategy::Naive(args) = parsed.strategy else { panic!("expected naive") };
        assert_eq!(args.ratio, 0.5);
        assert_eq!(args.common.loc_line, 17);
        assert_eq!(args.common.error_message, "segmentation fault");
        assert_eq!(args.common.source, PathBuf::from("example.c"));
        assert!(!args.common.dump_dot);
    }

    #[test]
    fn delta_arguments_parse_with_short_flags() {
        let parsed = Autopie::try_parse_from([
            "autopie", "delta", "--loc-file", "a.cpp", "--loc-line", "3", "-d", "-v", "-l",
            "a.cpp",
        ])
        .unwrap();

        let Strategy::Delta(args) = parsed.strategy else { panic!("expected delta") };
        assert!(args.dump_dot && args.verbose && args.log);
        assert_eq!(args.error_message, "");
    }

    #[test]
    fn location_options_are_required() {
        assert!(Autopie::try_parse_from(["autopie", "delta", "a.c"]).is_err());
        assert!(
            Autopie::try_parse_from(["autopie", "naive", "--loc-file", "a.c", "a.c"]).is_err()
        );
    }
}
