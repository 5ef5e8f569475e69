//! Locator resolution: finds zero-or-one element for a semantic target.
//!
//! A [`TargetDescriptor`] names a role, locale-alternative label patterns and an
//! optional scoping container. Resolution never fails for absence; it yields
//! [`Resolution::NotFound`] so callers can treat missing controls as skips.

pub mod errors;
pub mod matcher;
pub mod resolver;
pub mod types;

pub use errors::*;
pub use matcher::{match_all, match_descriptor, LabelMatcher};
pub use resolver::*;
pub use types::*;
