//! Outcome verification for asynchronous remote state
//!
//! This crate decides whether a task took effect on the remote side:
//! - [`OutcomeSpec`] names success and failure signals (elements or text)
//! - [`PollLoop`] bounds how many observations are made and how far apart
//! - [`observe`] checks one snapshot, success first
//! - [`OutcomeVerifier::await_outcome`] alternates refresh and observation
//!   until a signal matches or the attempts run out, which is `Pending`

pub mod conditions;
pub mod errors;
pub mod evidence;
pub mod types;
pub mod validator;

pub use conditions::*;
pub use errors::*;
pub use evidence::*;
pub use types::*;
pub use validator::*;
