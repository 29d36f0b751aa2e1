//! Shared building blocks for the AutoPIE reducer: text range helpers, the
//! keep/delete bitmask, the code-unit dependency graph, and the reducer
//! context threaded through every component.

pub mod bitmask;
pub mod context;
pub mod graph;
pub mod text;

pub use bitmask::{validate, BitMask, ValidationMode, Validity};
pub use context::{InputData, Language, Location, ReductionContext, Statistics};
pub use graph::DependencyGraph;

/// Scratch directory for variants and executables, cleared on startup and
/// between epochs.
pub const TEMP_DIR: &str = "./temp";

/// GraphViz output directory. Never cleared.
pub const VISUALS_DIR: &str = "./visuals";

/// Diagnostic log file used with `--log`.
pub const LOG_FILE: &str = "./autopie.log";

/// Base name of the final confirmed variant inside [`TEMP_DIR`].
pub const OUTPUT_STEM: &str = "autoPieOut";
