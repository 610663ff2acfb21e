//! Command implementations.

mod plugins;
mod run;
mod validate;

pub use plugins::run_plugins;
pub use run::run_bridge;
pub use validate::run_validate;
