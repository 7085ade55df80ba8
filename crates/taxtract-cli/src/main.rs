//! Taxtract CLI - species resolution and guided extraction from documents.

use clap::Parser;
use taxtract_cli::{Cli, Config, Formatter};

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

async fn run() -> taxtract_cli::Result<()> {
    let cli = Cli::parse();
    taxtract_cli::init_tracing(cli.verbose);

    let config = Config::load(cli.settings.as_deref())?;

    let format = cli.format.map(Into::into).unwrap_or(config.settings.format);
    let color_enabled = !cli.no_color && config.settings.color;
    let formatter = Formatter::new(format, color_enabled);

    taxtract_cli::execute(cli.command, &config, &formatter).await
}
