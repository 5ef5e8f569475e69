//! console-pilot
//!
//! Resilient UI automation for the Play Console: configuration, the engine
//! wiring, the console task workflows and the command line.

pub mod cli;
pub mod config;
pub mod engine;
pub mod errors;
pub mod metrics;
pub mod tasks;

pub use config::{load_settings, Settings};
pub use engine::Engine;
pub use errors::PilotError;
pub use tasks::{run_task, Task, TaskOutcome};
