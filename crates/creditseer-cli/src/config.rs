//! Configuration management for the CLI.

use crate::error::{CliError, Result};
use creditseer_domain::InferenceService;
use creditseer_extractor::ExtractorConfig;
use creditseer_llm::{MockProvider, OllamaProvider, OpenAiProvider};
use creditseer_pdf::PdfConfig;
use creditseer_schema::SchemaRegistry;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

const DEFAULT_OLLAMA_ENDPOINT: &str = "http://localhost:11434";
const DEFAULT_OPENAI_ENDPOINT: &str = "https://api.openai.com";

/// CLI configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Inference service
    #[serde(default)]
    pub inference: InferenceSettings,

    /// Schema source
    #[serde(default)]
    pub schemas: SchemaSettings,

    /// Extraction stage tuning
    #[serde(default)]
    pub extractor: ExtractorConfig,

    /// PDF text extraction
    #[serde(default)]
    pub pdf: PdfConfig,

    /// Output settings
    #[serde(default)]
    pub settings: Settings,
}

/// Which inference backend to call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    /// Local Ollama server
    Ollama,
    /// OpenAI-compatible chat completions API
    OpenAi,
    /// Canned responses, for dry runs
    Mock,
}

/// Inference service settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InferenceSettings {
    /// Backend
    #[serde(default = "default_provider")]
    pub provider: ProviderKind,

    /// Base URL; the backend's default when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,

    /// Model name
    #[serde(default = "default_model")]
    pub model: String,

    /// Environment variable holding the API key
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,

    /// Response returned by the mock backend
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mock_response: Option<String>,
}

/// Schema source settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SchemaSettings {
    /// Directory of schema JSON files; the built-in set when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dir: Option<PathBuf>,
}

/// Global CLI settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    /// Enable colored output
    #[serde(default = "default_true")]
    pub color: bool,

    /// Default output format
    #[serde(default = "default_format")]
    pub format: OutputFormat,

    /// Longest text shown in a table cell
    #[serde(default = "default_max_cell_chars")]
    pub max_cell_chars: usize,
}

/// Output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Table format
    Table,
    /// JSON format
    Json,
}

impl Config {
    /// Get the default configuration file path.
    pub fn path() -> Result<PathBuf> {
        let home = dirs::home_dir()
            .ok_or_else(|| CliError::Config("Could not find home directory".into()))?;
        Ok(home.join(".creditseer").join("config.toml"))
    }

    /// Load configuration from `path`, or the default path; defaults when the file is missing.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = match path {
            Some(p) => p.to_path_buf(),
            None => Self::path()?,
        };
        Self::load_from(&path)
    }

    /// Load configuration from `path`; defaults when the file is missing.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            debug!("No configuration at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        debug!("Loading configuration from {}", path.display());
        let contents = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        config.extractor.validate().map_err(CliError::Config)?;
        Ok(config)
    }

    /// Save configuration to `path`.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, self.to_toml()?)?;
        Ok(())
    }

    /// Serialize to TOML.
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self)
            .map_err(|e| CliError::Config(format!("Failed to serialize config: {}", e)))
    }

    /// Load the schema registry, from `dir` when given, else from the configured source.
    pub fn registry(&self, dir: Option<&Path>) -> Result<SchemaRegistry> {
        let registry = match dir.or(self.schemas.dir.as_deref()) {
            Some(dir) => SchemaRegistry::from_dir(dir)?,
            None => SchemaRegistry::builtin()?,
        };
        Ok(registry)
    }

    /// Build the configured inference service.
    pub fn inference_service(&self) -> Result<Arc<dyn InferenceService>> {
        let settings = &self.inference;
        let timeout = self.extractor.inference_timeout_secs;

        let service: Arc<dyn InferenceService> = match settings.provider {
            ProviderKind::Ollama => Arc::new(
                OllamaProvider::new(
                    settings.endpoint.as_deref().unwrap_or(DEFAULT_OLLAMA_ENDPOINT),
                    settings.model.clone(),
                )
                .with_timeout(timeout),
            ),
            ProviderKind::OpenAi => {
                let api_key = std::env::var(&settings.api_key_env).map_err(|_| {
                    CliError::Config(format!(
                        "Environment variable {} is not set",
                        settings.api_key_env
                    ))
                })?;
                Arc::new(
                    OpenAiProvider::new(
                        settings.endpoint.as_deref().unwrap_or(DEFAULT_OPENAI_ENDPOINT),
                        settings.model.clone(),
                    )
                    .with_api_key(api_key)
                    .with_timeout(timeout),
                )
            }
            ProviderKind::Mock => Arc::new(MockProvider::new(
                settings
                    .mock_response
                    .clone()
                    .unwrap_or_else(|| r#"{"blocks": [], "values": []}"#.to_string()),
            )),
        };
        Ok(service)
    }
}

impl Default for InferenceSettings {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            endpoint: None,
            model: default_model(),
            api_key_env: default_api_key_env(),
            mock_response: None,
        }
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            color: true,
            format: OutputFormat::Table,
            max_cell_chars: default_max_cell_chars(),
        }
    }
}

fn default_provider() -> ProviderKind {
    ProviderKind::Ollama
}

fn default_model() -> String {
    "llama3.1".to_string()
}

fn default_api_key_env() -> String {
    "OPENAI_API_KEY".to_string()
}

fn default_true() -> bool {
    true
}

fn default_format() -> OutputFormat {
    OutputFormat::Table
}

fn default_max_cell_chars() -> usize {
    80
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{self, Write};
    use std::sync::Mutex;
    use tempfile::TempDir;

    /// Collects formatted log lines in memory
    #[derive(Clone, Default)]
    struct Captured(Arc<Mutex<Vec<u8>>>);

    impl Write for Captured {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_load_is_logged() {
        let captured = Captured::default();
        let writer = captured.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(move || writer.clone())
            .with_max_level(tracing::Level::DEBUG)
            .with_ansi(false)
            .finish();

        let dir = TempDir::new().unwrap();
        tracing::subscriber::with_default(subscriber, || {
            Config::load_from(&dir.path().join("absent.toml")).unwrap();
        });

        let logs = String::from_utf8(captured.0.lock().unwrap().clone()).unwrap();
        assert!(logs.contains("using defaults"), "{}", logs);
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.inference.provider, ProviderKind::Ollama);
        assert_eq!(config.extractor, ExtractorConfig::default());
        assert!(config.settings.color);
        assert!(config.schemas.dir.is_none());
    }

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = TempDir::new().unwrap();
        let config = Config::load_from(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_partial_file_keeps_other_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(
            &path,
            "[inference]\nprovider = \"openai\"\nmodel = \"gpt-4o-mini\"\n\n[extractor]\nmax_attempts = 5\n",
        )
        .unwrap();

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.inference.provider, ProviderKind::OpenAi);
        assert_eq!(config.inference.model, "gpt-4o-mini");
        assert_eq!(config.extractor.max_attempts, 5);
        assert_eq!(config.extractor.max_blocks_per_request, 8);
        assert_eq!(config.pdf, PdfConfig::default());
    }

    #[test]
    fn test_invalid_extractor_section_is_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "[extractor]\nmax_attempts = 0\n").unwrap();
        assert!(matches!(Config::load_from(&path), Err(CliError::Config(_))));
    }

    #[test]
    fn test_save_and_reload() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("config.toml");
        let mut config = Config::default();
        config.inference.provider = ProviderKind::Mock;
        config.settings.format = OutputFormat::Json;

        config.save_to(&path).unwrap();
        assert_eq!(Config::load_from(&path).unwrap(), config);
    }

    #[test]
    fn test_openai_requires_api_key() {
        let mut config = Config::default();
        config.inference.provider = ProviderKind::OpenAi;
        config.inference.api_key_env = "CREDITSEER_TEST_KEY_THAT_IS_NEVER_SET".into();
        assert!(matches!(config.inference_service(), Err(CliError::Config(_))));
    }

    #[test]
    fn test_mock_provider_builds() {
        let mut config = Config::default();
        config.inference.provider = ProviderKind::Mock;
        let service = config.inference_service().unwrap();
        assert_eq!(service.model_name(), "mock");
    }

    #[test]
    fn test_builtin_registry_by_default() {
        let registry = Config::default().registry(None).unwrap();
        assert!(registry.validate_complete().is_ok());
    }
}
