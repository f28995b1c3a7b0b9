//! CreditSeer CLI - Command-line interface for the credit agreement extraction pipeline.

use clap::Parser;
use creditseer_cli::commands;
use creditseer_cli::{Cli, Command, Config, Formatter};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

async fn run() -> creditseer_cli::Result<()> {
    let cli = Cli::parse();

    // RUST_LOG wins over -v
    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .init();

    let config = Config::load(cli.config.as_deref())?;

    let format = cli
        .format
        .map(Into::into)
        .unwrap_or(config.settings.format);
    let color_enabled = !cli.no_color && config.settings.color;
    let formatter =
        Formatter::new(format, color_enabled).with_max_cell_chars(config.settings.max_cell_chars);

    match cli.command {
        Command::Extract(args) => commands::execute_extract(args, &config, &formatter).await?,
        Command::Chunk(args) => commands::execute_chunk(args, &config, &formatter).await?,
        Command::Schemas(args) => commands::execute_schemas(args, &config, &formatter).await?,
        Command::Config(args) => {
            commands::execute_config(args, &config, cli.config.as_deref(), &formatter).await?
        }
    }

    Ok(())
}
