use std::path::{Path, PathBuf};
use std::time::Duration;

use config::{Config, Environment, File};
use serde::Deserialize;
use sleuth::completion::RetryPolicy;
use sleuth::memory::{KEEP_LATEST, MAX_MESSAGES, TOKEN_BUDGET};
use sleuth::providers::configs::{OpenAiProviderConfig, OPENAI_HOST, OPENAI_MODEL};
use sleuth::web::firecrawl::{FirecrawlConfig, FIRECRAWL_HOST};

use crate::error::{to_env_var, ConfigError};

#[derive(Debug, Deserialize)]
pub struct ProviderSettings {
    #[serde(default = "default_openai_host")]
    pub host: String,
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default)]
    pub temperature: Option<f32>,
    #[serde(default)]
    pub max_tokens: Option<i32>,
}

impl ProviderSettings {
    pub fn into_config(self) -> OpenAiProviderConfig {
        OpenAiProviderConfig {
            host: self.host,
            api_key: self.api_key,
            model: self.model,
            temperature: self.temperature,
            max_tokens: self.max_tokens,
            ..OpenAiProviderConfig::new("")
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct FirecrawlSettings {
    #[serde(default = "default_firecrawl_host")]
    pub host: String,
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl FirecrawlSettings {
    pub fn into_config(self) -> FirecrawlConfig {
        FirecrawlConfig {
            host: self.host,
            api_key: self.api_key,
            timeout: Duration::from_secs(self.timeout_secs),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct AgentSettings {
    #[serde(default)]
    pub plan: bool,
    #[serde(default)]
    pub expose_search: bool,
    #[serde(default)]
    pub max_turns: Option<usize>,
    #[serde(default = "default_max_messages")]
    pub max_messages: usize,
    #[serde(default = "default_keep_latest")]
    pub keep_latest: usize,
    #[serde(default = "default_token_budget")]
    pub token_budget: usize,
    #[serde(default)]
    pub tokenizer_path: Option<PathBuf>,
    #[serde(default = "default_retry_attempts")]
    pub retry_attempts: u32,
    #[serde(default = "default_retry_max_wait_secs")]
    pub retry_max_wait_secs: u64,
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self {
            plan: false,
            expose_search: false,
            max_turns: None,
            max_messages: default_max_messages(),
            keep_latest: default_keep_latest(),
            token_budget: default_token_budget(),
            tokenizer_path: None,
            retry_attempts: default_retry_attempts(),
            retry_max_wait_secs: default_retry_max_wait_secs(),
        }
    }
}

impl AgentSettings {
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.retry_attempts,
            max_wait: Duration::from_secs(self.retry_max_wait_secs),
            ..RetryPolicy::default()
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct Settings {
    pub provider: ProviderSettings,
    pub firecrawl: FirecrawlSettings,
    #[serde(default)]
    pub agent: AgentSettings,
}

impl Settings {
    /// Load settings from an optional TOML file, then `SLEUTH_*` environment variables.
    /// `OPENAI_API_KEY` and `FIRECRAWL_API_KEY` are honoured as defaults for the keys.
    pub fn new(config_file: Option<&Path>) -> Result<Self, ConfigError> {
        let mut builder = Config::builder()
            .set_default("provider.host", default_openai_host())?
            .set_default("provider.model", default_model())?
            .set_default("firecrawl.host", default_firecrawl_host())?;

        if let Ok(key) = std::env::var("OPENAI_API_KEY") {
            builder = builder.set_default("provider.api_key", key)?;
        }
        if let Ok(key) = std::env::var("FIRECRAWL_API_KEY") {
            builder = builder.set_default("firecrawl.api_key", key)?;
        }
        if let Some(path) = config_file {
            builder = builder.add_source(File::from(path).required(true));
        }

        let config = builder
            .add_source(
                Environment::with_prefix("SLEUTH")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let settings: Self = match config.try_deserialize() {
            Ok(settings) => settings,
            Err(err) => {
                tracing::debug!("Configuration error: {:?}", &err);
                return Err(match missing_field(&err) {
                    Some(field) => ConfigError::MissingEnvVar {
                        env_var: to_env_var(&field),
                    },
                    None => ConfigError::Other(err),
                });
            }
        };
        settings.validate()
    }

    fn validate(self) -> Result<Self, ConfigError> {
        if self.provider.api_key.is_empty() {
            return Err(ConfigError::MissingEnvVar {
                env_var: to_env_var("provider.api_key"),
            });
        }
        if self.firecrawl.api_key.is_empty() {
            return Err(ConfigError::MissingEnvVar {
                env_var: to_env_var("firecrawl.api_key"),
            });
        }
        Ok(self)
    }
}

// "missing field `api_key` for key `provider`" -> "provider.api_key"
fn missing_field(err: &config::ConfigError) -> Option<String> {
    if let config::ConfigError::NotFound(field) = err {
        return Some(field.clone());
    }
    let message = err.to_string();
    let rest = message.strip_prefix("missing field `")?;
    let (field, rest) = rest.split_once('`')?;
    match rest
        .strip_prefix(" for key `")
        .and_then(|key| key.split_once('`'))
    {
        Some((key, _)) => Some(format!("{}.{}", key, field)),
        None => Some(field.to_string()),
    }
}

fn default_openai_host() -> String {
    OPENAI_HOST.to_string()
}

fn default_model() -> String {
    OPENAI_MODEL.to_string()
}

fn default_firecrawl_host() -> String {
    FIRECRAWL_HOST.to_string()
}

fn default_timeout_secs() -> u64 {
    120
}

fn default_max_messages() -> usize {
    MAX_MESSAGES
}

fn default_keep_latest() -> usize {
    KEEP_LATEST
}

fn default_token_budget() -> usize {
    TOKEN_BUDGET
}

fn default_retry_attempts() -> u32 {
    3
}

fn default_retry_max_wait_secs() -> u64 {
    40
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::env;
    use std::io::Write;

    fn clean_env() {
        for (key, _) in env::vars() {
            if key.starts_with("SLEUTH_") {
                env::remove_var(&key);
            }
        }
        env::remove_var("OPENAI_API_KEY");
        env::remove_var("FIRECRAWL_API_KEY");
    }

    #[test]
    #[serial]
    fn test_default_settings() {
        clean_env();
        env::set_var("SLEUTH_PROVIDER__API_KEY", "sk-test");
        env::set_var("SLEUTH_FIRECRAWL__API_KEY", "fc-test");

        let settings = Settings::new(None).unwrap();
        assert_eq!(settings.provider.host, "https://api.openai.com");
        assert_eq!(settings.provider.api_key, "sk-test");
        assert_eq!(settings.provider.model, "gpt-4o");
        assert_eq!(settings.provider.temperature, None);
        assert_eq!(settings.firecrawl.host, "https://api.firecrawl.dev");
        assert_eq!(settings.firecrawl.timeout_secs, 120);
        assert!(!settings.agent.plan);
        assert!(!settings.agent.expose_search);
        assert_eq!(settings.agent.max_turns, None);
        assert_eq!(settings.agent.max_messages, 24);
        assert_eq!(settings.agent.keep_latest, 12);
        assert_eq!(settings.agent.token_budget, 10_000);

        let retry = settings.agent.retry_policy();
        assert_eq!(retry.max_attempts, 3);
        assert_eq!(retry.max_wait, Duration::from_secs(40));

        clean_env();
    }

    #[test]
    #[serial]
    fn test_standard_api_key_variables() {
        clean_env();
        env::set_var("OPENAI_API_KEY", "sk-plain");
        env::set_var("FIRECRAWL_API_KEY", "fc-plain");

        let settings = Settings::new(None).unwrap();
        assert_eq!(settings.provider.api_key, "sk-plain");
        assert_eq!(settings.firecrawl.api_key, "fc-plain");

        // Prefixed variables win
        env::set_var("SLEUTH_PROVIDER__API_KEY", "sk-prefixed");
        let settings = Settings::new(None).unwrap();
        assert_eq!(settings.provider.api_key, "sk-prefixed");

        clean_env();
    }

    #[test]
    #[serial]
    fn test_missing_api_key() {
        clean_env();
        env::set_var("SLEUTH_PROVIDER__API_KEY", "sk-test");

        let error = Settings::new(None).unwrap_err();
        match error {
            ConfigError::MissingEnvVar { env_var } => {
                assert_eq!(env_var, "SLEUTH_FIRECRAWL__API_KEY")
            }
            other => panic!("Expected MissingEnvVar, got {:?}", other),
        }

        clean_env();
    }

    #[test]
    #[serial]
    fn test_environment_override() {
        clean_env();
        env::set_var("SLEUTH_PROVIDER__API_KEY", "sk-test");
        env::set_var("SLEUTH_PROVIDER__MODEL", "gpt-4o-mini");
        env::set_var("SLEUTH_PROVIDER__TEMPERATURE", "0.2");
        env::set_var("SLEUTH_FIRECRAWL__API_KEY", "fc-test");
        env::set_var("SLEUTH_AGENT__PLAN", "true");
        env::set_var("SLEUTH_AGENT__MAX_TURNS", "15");
        env::set_var("SLEUTH_AGENT__TOKEN_BUDGET", "4096");

        let settings = Settings::new(None).unwrap();
        assert_eq!(settings.provider.model, "gpt-4o-mini");
        assert_eq!(settings.provider.temperature, Some(0.2));
        assert!(settings.agent.plan);
        assert_eq!(settings.agent.max_turns, Some(15));
        assert_eq!(settings.agent.token_budget, 4096);

        clean_env();
    }

    #[test]
    #[serial]
    fn test_config_file() {
        clean_env();
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            r#"
[provider]
api_key = "sk-file"
host = "http://localhost:8080"

[firecrawl]
api_key = "fc-file"
timeout_secs = 30

[agent]
expose_search = true
keep_latest = 6
"#
        )
        .unwrap();

        let settings = Settings::new(Some(file.path())).unwrap();
        assert_eq!(settings.provider.api_key, "sk-file");
        assert_eq!(settings.provider.host, "http://localhost:8080");
        assert_eq!(settings.firecrawl.timeout_secs, 30);
        assert!(settings.agent.expose_search);
        assert_eq!(settings.agent.keep_latest, 6);
        assert_eq!(settings.agent.max_messages, 24);

        let firecrawl = settings.firecrawl.into_config();
        assert_eq!(firecrawl.timeout, Duration::from_secs(30));

        clean_env();
    }
}
