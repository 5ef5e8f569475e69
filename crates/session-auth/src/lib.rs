//! Session/auth management
//!
//! A human signs in once through [`SessionManager::login`], second factor
//! included; the resulting cookies and local storage are persisted by
//! [`SessionStore`] and replayed by [`SessionManager::restore`] on every
//! automated run. Credentials are never handled here.

pub mod errors;
pub mod manager;
pub mod state;
pub mod store;

pub use errors::*;
pub use manager::*;
pub use state::*;
pub use store::*;
