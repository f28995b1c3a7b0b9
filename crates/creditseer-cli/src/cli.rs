//! CLI command definitions and argument parsing.

use clap::{Parser, Subcommand};
use creditseer_domain::PipelineStage;
use std::path::PathBuf;

/// CreditSeer CLI - Extract structured terms from credit agreements.
#[derive(Debug, Parser)]
#[command(name = "creditseer")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Output format
    #[arg(short, long, value_enum, global = true)]
    pub format: Option<CliFormat>,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Configuration file path
    #[arg(short, long, global = true, env = "CREDITSEER_CONFIG")]
    pub config: Option<PathBuf>,

    /// Verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

/// Output format options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum CliFormat {
    /// Table format (default)
    Table,
    /// JSON format
    Json,
}

/// CLI commands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run the pipeline on a document
    Extract(ExtractArgs),

    /// Show how a document splits into chunks
    Chunk(ChunkArgs),

    /// List the loaded extraction schemas
    Schemas(SchemasArgs),

    /// Manage the configuration file
    Config(ConfigArgs),
}

/// Arguments for the extract command.
#[derive(Debug, Parser)]
pub struct ExtractArgs {
    /// PDF or text file
    pub file: PathBuf,

    /// Last stage to run
    #[arg(short, long, value_enum, default_value = "stage2")]
    pub through: ThroughArg,

    /// Schema directory, overriding the configuration
    #[arg(long)]
    pub schemas: Option<PathBuf>,
}

/// Arguments for the chunk command.
#[derive(Debug, Parser)]
pub struct ChunkArgs {
    /// PDF or text file
    pub file: PathBuf,
}

/// Arguments for the schemas command.
#[derive(Debug, Parser)]
pub struct SchemasArgs {
    /// Schema directory, overriding the configuration
    #[arg(short, long)]
    pub dir: Option<PathBuf>,
}

/// Arguments for configuration management.
#[derive(Debug, Parser)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub action: ConfigAction,
}

/// Configuration actions.
#[derive(Debug, Subcommand)]
pub enum ConfigAction {
    /// Print the effective configuration
    Show,

    /// Write a default configuration file
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

/// Stage to stop after.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, clap::ValueEnum)]
pub enum ThroughArg {
    /// Text extraction only
    Text,
    /// Through chunking
    Chunks,
    /// Through Stage 1 blocks
    Stage1,
    /// Through Stage 2 values
    Stage2,
}

impl From<CliFormat> for crate::config::OutputFormat {
    fn from(format: CliFormat) -> Self {
        match format {
            CliFormat::Table => crate::config::OutputFormat::Table,
            CliFormat::Json => crate::config::OutputFormat::Json,
        }
    }
}

impl From<ThroughArg> for PipelineStage {
    fn from(through: ThroughArg) -> Self {
        match through {
            ThroughArg::Text => PipelineStage::TextExtracted,
            ThroughArg::Chunks => PipelineStage::Chunked,
            ThroughArg::Stage1 => PipelineStage::Stage1Complete,
            ThroughArg::Stage2 => PipelineStage::Stage2Complete,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_defaults_to_stage2() {
        let cli = Cli::parse_from(["creditseer", "extract", "agreement.pdf"]);
        match cli.command {
            Command::Extract(args) => {
                assert_eq!(args.through, ThroughArg::Stage2);
                assert_eq!(args.file, PathBuf::from("agreement.pdf"));
            }
            _ => panic!("Expected Extract command"),
        }
    }

    #[test]
    fn test_global_flags() {
        let cli = Cli::parse_from([
            "creditseer",
            "chunk",
            "agreement.txt",
            "--format",
            "json",
            "--no-color",
            "-v",
        ]);
        assert_eq!(cli.format, Some(CliFormat::Json));
        assert!(cli.no_color);
        assert!(cli.verbose);
        assert!(matches!(cli.command, Command::Chunk(_)));
    }

    #[test]
    fn test_through_maps_to_pipeline_stage() {
        let cli = Cli::parse_from(["creditseer", "extract", "a.txt", "--through", "stage1"]);
        let Command::Extract(args) = cli.command else {
            panic!("Expected Extract command");
        };
        assert_eq!(PipelineStage::from(args.through), PipelineStage::Stage1Complete);
    }

    #[test]
    fn test_config_init_force() {
        let cli = Cli::parse_from(["creditseer", "config", "init", "--force"]);
        match cli.command {
            Command::Config(ConfigArgs {
                action: ConfigAction::Init { force },
            }) => assert!(force),
            _ => panic!("Expected Config Init command"),
        }
    }
}
