//! Configuration file parsing for the server.
//!
//! Loads settings from a TOML file, then lets environment variables override
//! the upstream endpoint, deployment and credentials. Anything missing or
//! malformed is a startup error; the server never starts half-configured.

use medex_extractor::ExtractorConfig;
use medex_llm::GatewayAuth;
use serde::Deserialize;
use std::fmt;
use std::path::Path;
use thiserror::Error;

/// Environment variable overriding `gateway.endpoint`
pub const ENV_ENDPOINT: &str = "AZURE_OPENAI_ENDPOINT";
/// Environment variable overriding `gateway.deployment`
pub const ENV_DEPLOYMENT: &str = "AZURE_OPENAI_DEPLOYMENT";
/// Environment variable overriding `gateway.api_key`
pub const ENV_API_KEY: &str = "AZURE_OPENAI_API_KEY";
/// Environment variable overriding `gateway.bearer_token`
pub const ENV_BEARER_TOKEN: &str = "AZURE_OPENAI_BEARER_TOKEN";

/// Upstream configuration error
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read config file
    #[error("Failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),

    /// Failed to parse TOML
    #[error("Failed to parse config TOML: {0}")]
    TomlParse(#[from] toml::de::Error),

    /// Missing required field
    #[error("Missing required configuration field: {0}")]
    MissingField(String),

    /// Field present but unusable
    #[error("Invalid configuration value for {field}: {reason}")]
    InvalidValue {
        /// Offending field
        field: String,
        /// Why it was rejected
        reason: String,
    },
}

/// Server configuration loaded from TOML
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Bind address (e.g., "0.0.0.0")
    #[serde(default = "default_bind_address")]
    pub bind_address: String,

    /// Bind port (e.g., 5000)
    #[serde(default = "default_bind_port")]
    pub bind_port: u16,

    /// Completion gateway settings
    #[serde(default)]
    pub gateway: GatewayConfig,

    /// Batch extraction settings
    #[serde(default)]
    pub extractor: ExtractorConfig,
}

/// Azure OpenAI deployment settings
#[derive(Clone, Deserialize)]
pub struct GatewayConfig {
    /// Resource endpoint (e.g., "https://my-resource.openai.azure.com")
    #[serde(default)]
    pub endpoint: String,

    /// Deployment name (e.g., "gpt-4o-mini")
    #[serde(default)]
    pub deployment: String,

    /// API key, sent as the `api-key` header
    #[serde(default)]
    pub api_key: Option<String>,

    /// Bearer token, used when no API key is set
    #[serde(default)]
    pub bearer_token: Option<String>,

    /// REST API version
    #[serde(default = "default_api_version")]
    pub api_version: String,

    /// Per-request HTTP timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            endpoint: String::new(),
            deployment: String::new(),
            api_key: None,
            bearer_token: None,
            api_version: default_api_version(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl fmt::Debug for GatewayConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GatewayConfig")
            .field("endpoint", &self.endpoint)
            .field("deployment", &self.deployment)
            .field("api_key", &self.api_key.as_ref().map(|_| "***"))
            .field("bearer_token", &self.bearer_token.as_ref().map(|_| "***"))
            .field("api_version", &self.api_version)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

fn default_bind_address() -> String {
    "0.0.0.0".to_string()
}

fn default_bind_port() -> u16 {
    5000
}

fn default_api_version() -> String {
    medex_llm::azure::DEFAULT_API_VERSION.to_string()
}

fn default_timeout_secs() -> u64 {
    medex_llm::azure::DEFAULT_TIMEOUT_SECS
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            bind_port: default_bind_port(),
            gateway: GatewayConfig::default(),
            extractor: ExtractorConfig::default(),
        }
    }
}

impl GatewayConfig {
    /// Credential to use, API key first
    pub fn auth(&self) -> Result<GatewayAuth, ConfigError> {
        let non_empty = |value: &Option<String>| value.clone().filter(|v| !v.trim().is_empty());

        if let Some(key) = non_empty(&self.api_key) {
            return Ok(GatewayAuth::ApiKey(key));
        }
        if let Some(token) = non_empty(&self.bearer_token) {
            return Ok(GatewayAuth::BearerToken(token));
        }
        Err(ConfigError::MissingField(
            "gateway.api_key or gateway.bearer_token".to_string(),
        ))
    }
}

impl ServerConfig {
    /// Load configuration from a TOML file, apply environment overrides and validate
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        let mut config: ServerConfig = toml::from_str(&contents)?;
        config.apply_env(|name| std::env::var(name).ok());
        config.validate()?;
        Ok(config)
    }

    /// Build configuration from defaults and environment variables only
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = ServerConfig::default();
        config.apply_env(|name| std::env::var(name).ok());
        config.validate()?;
        Ok(config)
    }

    /// Override gateway settings from a variable lookup
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(endpoint) = lookup(ENV_ENDPOINT) {
            self.gateway.endpoint = endpoint;
        }
        if let Some(deployment) = lookup(ENV_DEPLOYMENT) {
            self.gateway.deployment = deployment;
        }
        if let Some(key) = lookup(ENV_API_KEY) {
            self.gateway.api_key = Some(key);
        }
        if let Some(token) = lookup(ENV_BEARER_TOKEN) {
            self.gateway.bearer_token = Some(token);
        }
    }

    /// Check that the configuration can start a server
    pub fn validate(&self) -> Result<(), ConfigError> {
        let gateway = &self.gateway;

        if gateway.endpoint.trim().is_empty() {
            return Err(ConfigError::MissingField("gateway.endpoint".to_string()));
        }
        if !(gateway.endpoint.starts_with("https://") || gateway.endpoint.starts_with("http://")) {
            return Err(ConfigError::InvalidValue {
                field: "gateway.endpoint".to_string(),
                reason: "must be an http(s) URL".to_string(),
            });
        }
        if gateway.deployment.trim().is_empty() {
            return Err(ConfigError::MissingField("gateway.deployment".to_string()));
        }
        if gateway.timeout_secs == 0 {
            return Err(ConfigError::InvalidValue {
                field: "gateway.timeout_secs".to_string(),
                reason: "must be greater than 0".to_string(),
            });
        }
        gateway.auth()?;

        self.extractor
            .validate()
            .map_err(|reason| ConfigError::InvalidValue {
                field: "extractor".to_string(),
                reason,
            })
    }

    /// Create a default configuration for testing
    pub fn default_test_config() -> Self {
        ServerConfig {
            bind_address: "127.0.0.1".to_string(),
            bind_port: 5000,
            gateway: GatewayConfig {
                endpoint: "https://test-resource.openai.azure.com".to_string(),
                deployment: "gpt-4o-mini".to_string(),
                api_key: Some("test-key-do-not-use-in-production".to_string()),
                ..GatewayConfig::default()
            },
            extractor: ExtractorConfig::default(),
        }
    }

    /// Get the full bind address (address:port)
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.bind_address, self.bind_port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    #[test]
    fn test_default_test_config_is_valid() {
        let config = ServerConfig::default_test_config();
        assert!(config.validate().is_ok());
        assert_eq!(config.bind_addr(), "127.0.0.1:5000");
    }

    #[test]
    fn test_defaults() {
        let config = ServerConfig::default();
        assert_eq!(config.bind_addr(), "0.0.0.0:5000");
        assert_eq!(config.gateway.api_version, "2024-02-15-preview");
        assert_eq!(config.extractor.max_concurrency, 8);
    }

    #[test]
    fn test_parse_toml() {
        let toml = r#"
            bind_address = "127.0.0.1"
            bind_port = 9000

            [gateway]
            endpoint = "https://res.openai.azure.com"
            deployment = "gpt-4o"
            api_key = "abc"
            timeout_secs = 30

            [extractor]
            max_concurrency = 12
            item_timeout_secs = 45
        "#;

        let config: ServerConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.bind_port, 9000);
        assert_eq!(config.gateway.deployment, "gpt-4o");
        assert_eq!(config.gateway.api_version, "2024-02-15-preview");
        assert_eq!(config.gateway.timeout_secs, 30);
        assert_eq!(config.extractor.max_concurrency, 12);
        assert_eq!(config.extractor.max_batch_size, 1_000);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_env_overrides() {
        let vars: HashMap<&str, &str> = [
            (ENV_ENDPOINT, "https://override.openai.azure.com"),
            (ENV_BEARER_TOKEN, "token-1"),
        ]
        .into_iter()
        .collect();

        let mut config = ServerConfig::default_test_config();
        config.gateway.api_key = None;
        config.apply_env(|name| vars.get(name).map(|v| v.to_string()));

        assert_eq!(config.gateway.endpoint, "https://override.openai.azure.com");
        assert_eq!(config.gateway.deployment, "gpt-4o-mini");
        assert_eq!(
            config.gateway.auth().unwrap(),
            GatewayAuth::BearerToken("token-1".to_string())
        );
    }

    #[test]
    fn test_api_key_preferred_over_token() {
        let mut config = ServerConfig::default_test_config();
        config.gateway.bearer_token = Some("t".to_string());
        assert!(matches!(config.gateway.auth(), Ok(GatewayAuth::ApiKey(_))));
    }

    #[test]
    fn test_missing_credential() {
        let mut config = ServerConfig::default_test_config();
        config.gateway.api_key = Some("  ".to_string());
        assert!(matches!(config.validate(), Err(ConfigError::MissingField(_))));
    }

    #[test]
    fn test_missing_endpoint_and_deployment() {
        let mut config = ServerConfig::default_test_config();
        config.gateway.endpoint.clear();
        assert!(matches!(config.validate(), Err(ConfigError::MissingField(f)) if f == "gateway.endpoint"));

        let mut config = ServerConfig::default_test_config();
        config.gateway.deployment.clear();
        assert!(matches!(config.validate(), Err(ConfigError::MissingField(f)) if f == "gateway.deployment"));
    }

    #[test]
    fn test_invalid_endpoint_scheme() {
        let mut config = ServerConfig::default_test_config();
        config.gateway.endpoint = "res.openai.azure.com".to_string();
        assert!(matches!(config.validate(), Err(ConfigError::InvalidValue { .. })));
    }

    #[test]
    fn test_invalid_extractor_section() {
        let mut config = ServerConfig::default_test_config();
        config.extractor.max_concurrency = 0;
        assert!(matches!(config.validate(), Err(ConfigError::InvalidValue { field, .. }) if field == "extractor"));
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
            [gateway]
            endpoint = "https://res.openai.azure.com"
            deployment = "gpt-4o-mini"
            api_key = "from-file"
            "#
        )
        .unwrap();

        let config = ServerConfig::from_file(file.path()).unwrap();
        assert_eq!(config.gateway.deployment, "gpt-4o-mini");
    }

    #[test]
    fn test_from_file_errors() {
        assert!(matches!(
            ServerConfig::from_file("/nonexistent/medex.toml"),
            Err(ConfigError::FileRead(_))
        ));

        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "bind_port = \"not a number\"").unwrap();
        assert!(matches!(
            ServerConfig::from_file(file.path()),
            Err(ConfigError::TomlParse(_))
        ));
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let printed = format!("{:?}", ServerConfig::default_test_config());
        assert!(!printed.contains("test-key-do-not-use-in-production"));
    }
}
