//! Parse-tree consumption for the reducer: code-unit classification shared
//! by both passes, the mapping pass that builds the dependency graph, and
//! the printing pass that emits variants.

pub mod classify;
pub mod mapping;
pub mod printing;
pub mod tree;

pub use classify::{classify, NodeClass};
pub use mapping::{map_units, MappingResult};
pub use printing::{print_variant, PrintError};
pub use tree::{ParseError, SourceTree};
