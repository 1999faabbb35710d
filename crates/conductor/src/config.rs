//! Service configuration

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;

use crate::transport::RelayOptions;

/// Errors from configuration validation.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required field: {0}")]
    MissingField(&'static str),

    #[error("invalid value for {field}: {reason}")]
    Invalid {
        field: &'static str,
        reason: String,
    },
}

/// Conductor configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConductorConfig {
    /// Service name shown in logs.
    #[serde(default = "default_name")]
    pub name: String,
    /// Relay endpoints to subscribe on.
    #[serde(default)]
    pub relays: Vec<String>,
    /// Senders allowed to trigger pipelines. Accepts a list or a
    /// comma-joined string.
    #[serde(default, deserialize_with = "list_or_comma_string")]
    pub authorized_identities: Vec<String>,
    /// Signing key handed to the transport. Never logged.
    #[serde(default)]
    pub private_key: Option<String>,
    /// Maximum number of concurrently running jobs.
    #[serde(default = "default_max_concurrent_jobs")]
    pub max_concurrent_jobs: usize,
    /// Authorization cache TTL in seconds.
    #[serde(default = "default_auth_cache_ttl_secs")]
    pub auth_cache_ttl_secs: u64,
    /// Human-readable duration hint included in acks.
    #[serde(default = "default_estimated_duration")]
    pub estimated_duration: String,
    /// Proof-of-work difficulty, passed to the transport unmodified.
    #[serde(default)]
    pub pow_difficulty: Option<u8>,
    /// Publish timeout in milliseconds, passed to the transport unmodified.
    #[serde(default)]
    pub send_timeout_ms: Option<u64>,
}

fn default_name() -> String {
    "Conductor".to_string()
}

fn default_max_concurrent_jobs() -> usize {
    2
}

fn default_auth_cache_ttl_secs() -> u64 {
    300
}

fn default_estimated_duration() -> String {
    "5-10 minutes".to_string()
}

/// Accept either `["a", "b"]` or `"a, b"` for the allow-list.
fn list_or_comma_string<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum ListOrString {
        List(Vec<String>),
        Joined(String),
    }

    match ListOrString::deserialize(deserializer)? {
        ListOrString::List(list) => Ok(list),
        ListOrString::Joined(joined) => Ok(joined
            .split(',')
            .map(str::trim)
            .filter(|entry| !entry.is_empty())
            .map(String::from)
            .collect()),
    }
}

impl Default for ConductorConfig {
    fn default() -> Self {
        Self {
            name: default_name(),
            relays: vec![
                "wss://relay.damus.io".to_string(),
                "wss://nos.lol".to_string(),
                "wss://relay.nostr.band".to_string(),
            ],
            authorized_identities: Vec::new(),
            private_key: None,
            max_concurrent_jobs: default_max_concurrent_jobs(),
            auth_cache_ttl_secs: default_auth_cache_ttl_secs(),
            estimated_duration: default_estimated_duration(),
            pow_difficulty: None,
            send_timeout_ms: None,
        }
    }
}

impl ConductorConfig {
    /// Load config from the default path or create a default.
    pub fn load() -> anyhow::Result<Self> {
        let config_path = Self::config_path()?;

        if config_path.exists() {
            Self::from_path(&config_path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load config from a specific file.
    pub fn from_path(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: ConductorConfig = toml::from_str(&content)?;
        Ok(config)
    }

    /// Save config to the default path.
    pub fn save(&self) -> anyhow::Result<()> {
        let config_path = Self::config_path()?;

        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(&config_path, content)?;
        Ok(())
    }

    /// Get the config file path.
    pub fn config_path() -> anyhow::Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not determine config directory"))?;
        Ok(config_dir.join("conductor").join("config.toml"))
    }

    /// Check the fields required for startup.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.authorized_identities.is_empty() {
            return Err(ConfigError::MissingField("authorized_identities"));
        }
        if self.relays.is_empty() {
            return Err(ConfigError::MissingField("relays"));
        }
        match self.private_key.as_deref() {
            None => return Err(ConfigError::MissingField("private_key")),
            Some("") => return Err(ConfigError::MissingField("private_key")),
            Some(_) => {}
        }
        if self.max_concurrent_jobs == 0 {
            return Err(ConfigError::Invalid {
                field: "max_concurrent_jobs",
                reason: "must be a positive integer".to_string(),
            });
        }
        Ok(())
    }

    /// Relay tuning handed to the transport.
    pub fn relay_options(&self) -> RelayOptions {
        RelayOptions {
            relays: self.relays.clone(),
            pow_difficulty: self.pow_difficulty,
            send_timeout_ms: self.send_timeout_ms,
        }
    }

    /// Authorization cache TTL as a [`Duration`].
    pub fn auth_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.auth_cache_ttl_secs)
    }

    /// Set relays.
    pub fn with_relays(mut self, relays: Vec<String>) -> Self {
        self.relays = relays;
        self
    }

    /// Set the authorized sender list.
    pub fn with_authorized_identities(mut self, identities: Vec<String>) -> Self {
        self.authorized_identities = identities;
        self
    }

    /// Set the transport signing key.
    pub fn with_private_key(mut self, key: impl Into<String>) -> Self {
        self.private_key = Some(key.into());
        self
    }

    /// Set the concurrency limit.
    pub fn with_max_concurrent_jobs(mut self, max: usize) -> Self {
        self.max_concurrent_jobs = max;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_config() -> ConductorConfig {
        ConductorConfig::default()
            .with_authorized_identities(vec![
                "17162c921dc4d2518f9a101db33695df1afb56ab82f5ff3e5da07eb3e8690a25".to_string(),
            ])
            .with_private_key("nsec1examplekey")
    }

    #[test]
    fn test_default_config() {
        let config = ConductorConfig::default();
        assert_eq!(config.max_concurrent_jobs, 2);
        assert_eq!(config.auth_cache_ttl_secs, 300);
        assert!(!config.relays.is_empty());
    }

    #[test]
    fn test_config_serialization() {
        let config = valid_config();
        let toml_str = toml::to_string(&config).expect("should serialize");
        let parsed: ConductorConfig = toml::from_str(&toml_str).expect("should deserialize");
        assert_eq!(config.name, parsed.name);
        assert_eq!(config.authorized_identities, parsed.authorized_identities);
    }

    #[test]
    fn test_comma_joined_allow_list() {
        let parsed: ConductorConfig = toml::from_str(
            r#"
            authorized_identities = "npub1aaa, npub1bbb,,npub1ccc "
            "#,
        )
        .expect("should deserialize");

        assert_eq!(
            parsed.authorized_identities,
            vec!["npub1aaa", "npub1bbb", "npub1ccc"]
        );
    }

    #[test]
    fn test_validate_required_fields() {
        assert!(valid_config().validate().is_ok());

        let missing_auth = ConductorConfig::default().with_private_key("nsec1key");
        assert!(matches!(
            missing_auth.validate(),
            Err(ConfigError::MissingField("authorized_identities"))
        ));

        let missing_relays = valid_config().with_relays(Vec::new());
        assert!(matches!(
            missing_relays.validate(),
            Err(ConfigError::MissingField("relays"))
        ));

        let mut missing_key = valid_config();
        missing_key.private_key = None;
        assert!(matches!(
            missing_key.validate(),
            Err(ConfigError::MissingField("private_key"))
        ));

        let zero_jobs = valid_config().with_max_concurrent_jobs(0);
        assert!(matches!(
            zero_jobs.validate(),
            Err(ConfigError::Invalid { .. })
        ));
    }

    #[test]
    fn test_from_path_round_trip() {
        let dir = tempfile::tempdir().expect("should create temp dir");
        let path = dir.path().join("config.toml");
        let config = valid_config();
        std::fs::write(&path, toml::to_string_pretty(&config).unwrap()).unwrap();

        let loaded = ConductorConfig::from_path(&path).expect("should load");
        assert_eq!(loaded.authorized_identities, config.authorized_identities);
        assert_eq!(loaded.max_concurrent_jobs, config.max_concurrent_jobs);
    }
}
