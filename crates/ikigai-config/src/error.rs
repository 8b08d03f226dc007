//! Configuration error types, grounded on `arawn-config::error::ConfigError`.

pub type Result<T> = std::result::Result<T, ConfigError>;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file '{path}': {source}")]
    ReadFile { path: String, source: std::io::Error },

    #[error("failed to parse config '{path}': {source}")]
    Parse { path: String, source: toml::de::Error },

    #[error("invalid value '{value}' for environment variable {var}")]
    InvalidEnvValue { var: String, value: String },

    #[error("missing required field '{field}' — set it in the config file or via {env_var}")]
    MissingField { field: String, env_var: String },
}
