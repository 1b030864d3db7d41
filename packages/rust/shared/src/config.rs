//! Application configuration for QuizBuilder.
//!
//! User config lives at `~/.quizbuilder/quizbuilder.toml`.
//! CLI flags override config file values, which override defaults.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{QuizBuilderError, Result};
use crate::types::QuestionKind;

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "quizbuilder.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".quizbuilder";

// ---------------------------------------------------------------------------
// Config structs (matching quizbuilder.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Global defaults.
    #[serde(default)]
    pub defaults: DefaultsConfig,

    /// Chat endpoint settings.
    #[serde(default)]
    pub llm: LlmConfig,

    /// Creative question generation call.
    #[serde(default = "ModelCallConfig::generation")]
    pub generation: ModelCallConfig,

    /// Strict JSON formatting call.
    #[serde(default)]
    pub formatting: FormattingConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            defaults: DefaultsConfig::default(),
            llm: LlmConfig::default(),
            generation: ModelCallConfig::generation(),
            formatting: FormattingConfig::default(),
        }
    }
}

/// `[defaults]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DefaultsConfig {
    /// Database file. `~` is expanded to the home directory.
    #[serde(default = "default_db_path")]
    pub db_path: String,

    /// Number of variations requested from the model.
    #[serde(default = "default_variation_count")]
    pub variation_count: u32,

    /// Default class level (CP, CE1, CE2, CM1, CM2).
    #[serde(default = "default_class_level")]
    pub class_level: String,

    /// Default master-question kind.
    #[serde(default)]
    pub question_kind: QuestionKind,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            variation_count: default_variation_count(),
            class_level: default_class_level(),
            question_kind: QuestionKind::default(),
        }
    }
}

fn default_db_path() -> String {
    "~/.quizbuilder/quizbuilder.db".into()
}
fn default_variation_count() -> u32 {
    10
}
fn default_class_level() -> String {
    "CE1".into()
}

/// `[llm]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// OpenAI-compatible chat-completions URL.
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    /// Name of the env var holding the API key (never store the key itself).
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,

    /// Model used for both generation and formatting.
    #[serde(default = "default_model")]
    pub model: String,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            api_key_env: default_api_key_env(),
            model: default_model(),
        }
    }
}

fn default_endpoint() -> String {
    "https://openrouter.ai/api/v1/chat/completions".into()
}
fn default_api_key_env() -> String {
    "OPENROUTER_API_KEY".into()
}
fn default_model() -> String {
    "mistralai/mistral-small-3.2-24b-instruct".into()
}

/// Per-call model parameters. A section, once present, must be complete.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelCallConfig {
    pub temperature: f64,
    pub max_tokens: u32,
    /// Hard wall-clock budget for one call.
    pub timeout_secs: u64,
}

impl ModelCallConfig {
    /// Creative defaults for the question generator.
    pub fn generation() -> Self {
        Self {
            temperature: 0.7,
            max_tokens: 2000,
            timeout_secs: 30,
        }
    }

    /// Near-deterministic defaults for the JSON formatter.
    pub fn formatting() -> Self {
        Self {
            temperature: 0.1,
            max_tokens: 4000,
            timeout_secs: 30,
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// `[formatting]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FormattingConfig {
    #[serde(flatten)]
    pub call: ModelCallConfig,

    /// Upper bound (in characters) on raw model text echoed back in errors.
    #[serde(default = "default_raw_content_limit")]
    pub raw_content_limit: usize,
}

impl Default for FormattingConfig {
    fn default() -> Self {
        Self {
            call: ModelCallConfig::formatting(),
            raw_content_limit: default_raw_content_limit(),
        }
    }
}

fn default_raw_content_limit() -> usize {
    500
}

impl AppConfig {
    /// Resolved database path with `~` expanded.
    pub fn db_path(&self) -> Result<PathBuf> {
        expand_home(&self.defaults.db_path)
    }

    /// Check the values that the CLI cannot recover from at runtime.
    pub fn validate(&self) -> Result<()> {
        Url::parse(&self.llm.endpoint).map_err(|e| {
            QuizBuilderError::config(format!("invalid llm.endpoint {:?}: {e}", self.llm.endpoint))
        })?;

        if self.defaults.variation_count == 0 {
            return Err(QuizBuilderError::config(
                "defaults.variation_count must be at least 1",
            ));
        }

        for (name, call) in [
            ("generation", &self.generation),
            ("formatting", &self.formatting.call),
        ] {
            if !(0.0..=2.0).contains(&call.temperature) {
                return Err(QuizBuilderError::config(format!(
                    "{name}.temperature must be between 0.0 and 2.0"
                )));
            }
            if call.timeout_secs == 0 {
                return Err(QuizBuilderError::config(format!(
                    "{name}.timeout_secs must be at least 1"
                )));
            }
        }
        Ok(())
    }
}

fn expand_home(raw: &str) -> Result<PathBuf> {
    match raw.strip_prefix("~/") {
        Some(rest) => {
            let home = dirs::home_dir()
                .ok_or_else(|| QuizBuilderError::config("could not determine home directory"))?;
            Ok(home.join(rest))
        }
        None => Ok(PathBuf::from(raw)),
    }
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.quizbuilder/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| QuizBuilderError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.quizbuilder/quizbuilder.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| QuizBuilderError::io(path, e))?;

    let config: AppConfig = toml::from_str(&content).map_err(|e| {
        QuizBuilderError::config(format!("failed to parse {}: {e}", path.display()))
    })?;
    config.validate()?;
    Ok(config)
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| QuizBuilderError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| QuizBuilderError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| QuizBuilderError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}

/// Read the chat API key from the env var named in the config.
pub fn api_key(config: &AppConfig) -> Result<String> {
    let var_name = &config.llm.api_key_env;
    match std::env::var(var_name) {
        Ok(val) if !val.trim().is_empty() => Ok(val),
        _ => Err(QuizBuilderError::config(format!(
            "chat API key not found. Set the {var_name} environment variable."
        ))),
    }
}

/// Check that the chat API key env var is set and non-empty.
pub fn validate_api_key(config: &AppConfig) -> Result<()> {
    api_key(config).map(|_| ())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_serializes() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize default config");
        assert!(toml_str.contains("variation_count"));
        assert!(toml_str.contains("OPENROUTER_API_KEY"));
        assert!(toml_str.contains("[formatting]"));
    }

    #[test]
    fn config_roundtrip() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize");
        let parsed: AppConfig = toml::from_str(&toml_str).expect("deserialize");
        assert_eq!(parsed.defaults.variation_count, 10);
        assert_eq!(parsed.llm.api_key_env, "OPENROUTER_API_KEY");
        assert!((parsed.formatting.call.temperature - 0.1).abs() < f64::EPSILON);
    }

    #[test]
    fn empty_file_uses_call_defaults() {
        let config: AppConfig = toml::from_str("").expect("parse empty");
        assert!((config.generation.temperature - 0.7).abs() < f64::EPSILON);
        assert!((config.formatting.call.temperature - 0.1).abs() < f64::EPSILON);
        assert_eq!(config.formatting.raw_content_limit, 500);
        assert_eq!(config.generation.timeout(), Duration::from_secs(30));
    }

    #[test]
    fn partial_sections_override() {
        let toml_str = r#"
[defaults]
class_level = "CM1"
question_kind = "image"

[generation]
temperature = 0.9
max_tokens = 1500
timeout_secs = 45
"#;
        let config: AppConfig = toml::from_str(toml_str).expect("parse");
        assert_eq!(config.defaults.class_level, "CM1");
        assert_eq!(config.defaults.question_kind, QuestionKind::Image);
        assert_eq!(config.generation.timeout_secs, 45);
        assert_eq!(config.formatting.call.max_tokens, 4000);
    }

    #[test]
    fn validation_rejects_bad_values() {
        let mut config = AppConfig::default();
        assert!(config.validate().is_ok());

        config.llm.endpoint = "not a url".into();
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.defaults.variation_count = 0;
        assert!(config.validate().unwrap_err().to_string().contains("variation_count"));

        let mut config = AppConfig::default();
        config.formatting.call.temperature = 3.5;
        assert!(config.validate().unwrap_err().to_string().contains("formatting.temperature"));
    }

    #[test]
    fn db_path_expands_home() {
        let config = AppConfig::default();
        let path = config.db_path().expect("db path");
        assert!(path.ends_with(".quizbuilder/quizbuilder.db"));
        assert!(!path.to_string_lossy().starts_with('~'));
    }

    #[test]
    fn api_key_validation() {
        let mut config = AppConfig::default();
        // Use a unique env var name to avoid interfering with other tests
        config.llm.api_key_env = "QB_TEST_NONEXISTENT_KEY_12345".into();
        let result = validate_api_key(&config);
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("API key not found"));
    }
}
