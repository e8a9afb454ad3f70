//! CLI command handlers, one per file.

mod config;
mod gate;
mod run;

pub use config::run_config;
pub use gate::run_gate;
pub use run::run_simulation;
