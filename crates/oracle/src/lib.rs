//! The validation oracle: compiles each candidate variant and replays it
//! under a debugger to confirm that the crash still occurs at the adjusted
//! error line with a matching message.

pub mod compile;
pub mod debugger;
pub mod mi;
pub mod validate;

pub use debugger::{DebuggerGuard, SessionError, SessionOutcome, SessionState, StopExpectation};
pub use validate::{validate_results, validate_variant};
