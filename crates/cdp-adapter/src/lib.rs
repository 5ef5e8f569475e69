//! Chromium DevTools Protocol adapter for the console automation stack.
//!
//! The adapter drives one page target over a raw CDP connection and exposes it through
//! the [`Cdp`] trait. Element addressing goes through [`DomSnapshot`] epochs: every
//! snapshot tags the live DOM, and a [`NodeRef`] is only valid until the next one.

pub mod adapter;
pub mod config;
pub mod dom;
pub mod error;
#[cfg(feature = "fake-page")]
pub mod fake;
pub mod metrics;
pub mod storage;
pub mod transport;

pub use adapter::{Cdp, CdpAdapter};
pub use config::{detect_chrome_executable, CdpConfig, Viewport};
pub use dom::{DomNode, DomSnapshot, NodeRef, Rect};
pub use error::{AdapterError, AdapterErrorKind};
pub use metrics::AdapterMetricsSnapshot;
pub use storage::{Cookie, OriginStorage};
pub use transport::{CdpTransport, ChromiumTransport, CommandTarget, TransportEvent};
