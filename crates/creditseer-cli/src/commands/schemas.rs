//! Schemas command implementation.

use crate::cli::SchemasArgs;
use crate::config::Config;
use crate::error::Result;
use crate::output::Formatter;
use tracing::warn;

/// Execute the schemas command.
pub async fn execute_schemas(args: SchemasArgs, config: &Config, formatter: &Formatter) -> Result<()> {
    let registry = config.registry(args.dir.as_deref())?;
    println!("{}", formatter.format_schemas(&registry.entries())?);

    if !formatter.is_json() {
        match registry.validate_complete() {
            Ok(()) => println!("{}", formatter.success("Every chunk type has a Stage 1 schema")),
            Err(e) => {
                warn!("Schema set is incomplete: {}", e);
                println!("{}", formatter.warning(&e.to_string()));
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::OutputFormat;
    use crate::error::CliError;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_builtin_schemas_listed() {
        let formatter = Formatter::new(OutputFormat::Table, false);
        let args = SchemasArgs { dir: None };
        assert!(execute_schemas(args, &Config::default(), &formatter).await.is_ok());
    }

    #[tokio::test]
    async fn test_malformed_schema_dir_fails() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("broken.json"), "{ not json").unwrap();

        let formatter = Formatter::new(OutputFormat::Table, false);
        let args = SchemasArgs {
            dir: Some(dir.path().to_path_buf()),
        };
        let err = execute_schemas(args, &Config::default(), &formatter).await.unwrap_err();
        assert!(matches!(err, CliError::Schema(_)));
    }
}
