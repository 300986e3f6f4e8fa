// CLI layer - argument parsing and command handlers.
// Adapts core results to terminal output, the way a web front end would
// adapt them to flash messages.

pub mod commands;
pub mod config;

pub use commands::{run, Cli};
pub use config::AppConfig;
