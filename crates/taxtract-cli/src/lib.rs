//! Taxtract CLI library.
//!
//! Command parsing, user settings, output formatting and the command
//! implementations behind the `taxtract` binary.

pub mod cli;
pub mod commands;
pub mod config;
pub mod error;
pub mod output;

pub use cli::{Cli, Command};
pub use config::{Config, OutputFormat};
pub use error::{CliError, Result};
pub use output::Formatter;

use tracing_subscriber::EnvFilter;

/// Log to stderr; `RUST_LOG` takes precedence over the `-v` count.
pub fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(filter)
        .init();
}

/// Dispatch a parsed command.
pub async fn execute(command: Command, config: &Config, formatter: &Formatter) -> Result<()> {
    match command {
        Command::Run(args) => commands::execute_run(args, config, formatter).await,
        Command::Species(args) => commands::execute_species(args, formatter).await,
        Command::Schema(args) => commands::execute_schema(args, formatter).await,
        Command::Show(args) => commands::execute_show(args, formatter).await,
        Command::Confirm(args) => commands::execute_confirm(args, formatter).await,
        Command::Correct(args) => commands::execute_correct(args, formatter).await,
        Command::Audit(args) => commands::execute_audit(args, formatter).await,
    }
}
