use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required configuration, set the {env_var} environment variable")]
    MissingEnvVar { env_var: String },

    #[error("Configuration error: {0}")]
    Other(#[from] config::ConfigError),
}

/// Environment variable that sets the given configuration key, e.g.
/// `provider.api_key` becomes `SLEUTH_PROVIDER__API_KEY`
pub fn to_env_var(field: &str) -> String {
    format!("SLEUTH_{}", field.replace('.', "__").to_uppercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_env_var() {
        assert_eq!(to_env_var("provider.api_key"), "SLEUTH_PROVIDER__API_KEY");
        assert_eq!(to_env_var("agent.max_turns"), "SLEUTH_AGENT__MAX_TURNS");
        assert_eq!(to_env_var("firecrawl"), "SLEUTH_FIRECRAWL");
    }

    #[test]
    fn test_missing_env_var_message() {
        let error = ConfigError::MissingEnvVar {
            env_var: "SLEUTH_FIRECRAWL__API_KEY".to_string(),
        };
        assert_eq!(
            error.to_string(),
            "Missing required configuration, set the SLEUTH_FIRECRAWL__API_KEY environment variable"
        );
    }
}
