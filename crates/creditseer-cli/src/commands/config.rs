//! Config command implementation.

use crate::cli::{ConfigAction, ConfigArgs};
use crate::config::Config;
use crate::error::{CliError, Result};
use crate::output::Formatter;
use std::path::Path;

/// Execute the config command.
pub async fn execute_config(
    args: ConfigArgs,
    config: &Config,
    path: Option<&Path>,
    formatter: &Formatter,
) -> Result<()> {
    let path = match path {
        Some(p) => p.to_path_buf(),
        None => Config::path()?,
    };
    match args.action {
        ConfigAction::Show => show_config(config, &path, formatter),
        ConfigAction::Init { force } => init_config(&path, force, formatter),
    }
}

/// Print the effective configuration.
fn show_config(config: &Config, path: &Path, formatter: &Formatter) -> Result<()> {
    if formatter.is_json() {
        println!("{}", formatter.json(config)?);
        return Ok(());
    }
    let origin = if path.exists() { "" } else { " (not found, using defaults)" };
    println!("{}", formatter.info(&format!("{}{}", path.display(), origin)));
    println!("{}", config.to_toml()?);
    Ok(())
}

/// Write a default configuration file.
fn init_config(path: &Path, force: bool, formatter: &Formatter) -> Result<()> {
    if path.exists() && !force {
        return Err(CliError::InvalidInput(format!(
            "{} already exists (use --force to overwrite)",
            path.display()
        )));
    }
    Config::default().save_to(path)?;
    println!(
        "{}",
        formatter.success(&format!("Wrote default configuration to {}", path.display()))
    );
    Ok(())
}
