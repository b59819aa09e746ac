//! Configuration loader with file and environment variable support

use crate::{AppConfig, ConfigError};
use std::env;
use std::path::PathBuf;
use tracing::info;

/// Standard config file search paths
const CONFIG_PATHS: &[&str] = &[
    "config.toml",
    "sms-bridge.toml",
    "./config/config.toml",
    "/etc/sms-bridge/config.toml",
];

/// Configuration loader
pub struct ConfigLoader {
    config_path: Option<PathBuf>,
}

impl ConfigLoader {
    /// Create a new configuration loader
    pub fn new() -> Self {
        Self { config_path: None }
    }

    /// Create a loader with a specific config file path
    pub fn with_path<P: Into<PathBuf>>(path: P) -> Self {
        Self {
            config_path: Some(path.into()),
        }
    }

    /// Load configuration from file (if found) with environment variable overrides
    pub fn load(&self) -> Result<AppConfig, ConfigError> {
        let mut config = AppConfig::default();

        if let Some(path) = self.find_config_file() {
            info!(?path, "Loading configuration from file");
            config = AppConfig::from_file(&path)?;
        }

        self.apply_env_overrides(&mut config);

        Ok(config)
    }

    /// Find the configuration file to use
    fn find_config_file(&self) -> Option<PathBuf> {
        if let Some(path) = &self.config_path {
            if path.exists() {
                return Some(path.clone());
            }
        }

        if let Ok(path) = env::var("SMS_BRIDGE_CONFIG") {
            let path = PathBuf::from(path);
            if path.exists() {
                return Some(path);
            }
        }

        for path in CONFIG_PATHS {
            let path = PathBuf::from(path);
            if path.exists() {
                return Some(path);
            }
        }

        None
    }

    /// Apply environment variable overrides
    fn apply_env_overrides(&self, config: &mut AppConfig) {
        // MongoDB
        if let Ok(val) = env::var("SMS_BRIDGE_MONGODB_URI") {
            config.mongodb.uri = val;
        }
        if let Ok(val) = env::var("SMS_BRIDGE_MONGODB_DATABASE") {
            config.mongodb.database = val;
        }

        // Queue
        if let Ok(val) = env::var("SMS_BRIDGE_QUEUE_TYPE") {
            config.queue.queue_type = val;
        }
        if let Ok(val) = env::var("SMS_BRIDGE_PROJECT_ID") {
            config.queue.project_id = val;
        }
        if let Ok(val) = env::var("SMS_BRIDGE_COMMAND_TOPIC") {
            config.queue.command_topic = val;
        }
        if let Ok(val) = env::var("SMS_BRIDGE_OUTGOING_TOPIC") {
            config.queue.outgoing_topic = val;
        }
        if let Ok(val) = env::var("SMS_BRIDGE_INCOMING_TOPIC") {
            config.queue.incoming_topic = val;
        }
        if let Ok(val) = env::var("SMS_BRIDGE_SQS_REGION") {
            config.queue.sqs.region = val;
        }

        // RapidPro
        if let Ok(val) = env::var("SMS_BRIDGE_RAPIDPRO_BASE_URL") {
            config.rapidpro.base_url = val;
        }
        if let Ok(val) = env::var("SMS_BRIDGE_RAPIDPRO_REQUEST_TIMEOUT_MS") {
            if let Ok(v) = val.parse() {
                config.rapidpro.request_timeout_ms = v;
            }
        }
        if let Ok(val) = env::var("SMS_BRIDGE_RAPIDPRO_CREDENTIALS_BLOB") {
            config.rapidpro.credentials_blob_name = val;
        }

        // Identity
        if let Ok(val) = env::var("SMS_BRIDGE_IDENTITY_COLLECTION") {
            config.identity.collection = val;
        }
        if let Ok(val) = env::var("SMS_BRIDGE_IDENTITY_TOKEN_PREFIX") {
            config.identity.token_prefix = val;
        }

        // Inbound
        if let Ok(val) = env::var("SMS_BRIDGE_INBOUND_POLL_INTERVAL_MS") {
            if let Ok(v) = val.parse() {
                config.inbound.poll_interval_ms = v;
            }
        }
        if let Ok(val) = env::var("SMS_BRIDGE_WATERMARK_PATH") {
            config.inbound.watermark_path = val;
        }

        // Outbound
        if let Ok(val) = env::var("SMS_BRIDGE_OUTBOUND_GROUP_SIZE") {
            if let Ok(v) = val.parse() {
                config.outbound.group_size = v;
            }
        }
        if let Ok(val) = env::var("SMS_BRIDGE_OUTBOUND_FAILURE_WINDOW_LIMIT") {
            if let Ok(v) = val.parse() {
                config.outbound.failure_window_limit = v;
            }
        }

        // Command router
        if let Ok(val) = env::var("SMS_BRIDGE_RELAY_ONLY") {
            config.command_router.relay_only = val.parse().unwrap_or(false);
        }

        // Secrets
        if let Ok(val) = env::var("SMS_BRIDGE_SECRETS_PROVIDER") {
            config.secrets.provider = val;
        }
        if let Ok(val) = env::var("SMS_BRIDGE_SECRETS_ENCRYPTION_KEY") {
            config.secrets.encryption_key = val;
        }
        if let Ok(val) = env::var("SMS_BRIDGE_SECRETS_AWS_REGION") {
            config.secrets.aws_region = val;
        }

        // General
        if let Ok(val) = env::var("SMS_BRIDGE_DATA_DIR") {
            config.data_dir = val;
        }
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_override_takes_precedence_over_default() {
        std::env::set_var("SMS_BRIDGE_MONGODB_DATABASE", "test_override_db");
        let loader = ConfigLoader::new();
        let mut config = AppConfig::default();
        loader.apply_env_overrides(&mut config);
        assert_eq!(config.mongodb.database, "test_override_db");
        std::env::remove_var("SMS_BRIDGE_MONGODB_DATABASE");
    }
}
