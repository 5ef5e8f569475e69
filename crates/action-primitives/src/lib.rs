//! Step primitives - best-effort, idempotent UI actions
//!
//! Each primitive resolves its target through the locator, acts through the
//! page adapter and reports a [`StepOutcome`]:
//! - absent or timed-out targets are `SkippedNotFound`, never an error
//! - `fill`, `check` and `select_option` report `SkippedAlreadySatisfied` when
//!   the control already holds the requested state
//! - only a lost page session surfaces as [`ActionError`]

pub mod errors;
mod primitives;
pub mod types;
mod waiting;

pub use errors::*;
pub use primitives::*;
pub use types::*;
pub use waiting::*;
