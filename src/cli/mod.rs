pub mod app;
pub mod commands;
pub mod config;
pub mod context;
pub mod dispatch;
pub mod env;
pub mod output;
pub mod runtime;
pub mod tasks;

pub use app::run;
pub use commands::Commands;
pub use env::CliArgs;
