//! SMS Bridge Configuration System
//!
//! TOML-based configuration with environment variable override support,
//! following the same file-search + env-override layering used throughout
//! this codebase's services.

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

mod loader;

pub use loader::ConfigLoader;

/// Configuration error types
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

/// Root application configuration shared by both binaries (`sms-bridge`,
/// `command-router`). Each binary only reads the sections it needs.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub mongodb: MongoConfig,
    pub queue: QueueConfig,
    pub rapidpro: RapidProConfig,
    pub identity: IdentityConfig,
    pub inbound: InboundConfig,
    pub outbound: OutboundConfig,
    pub command_router: CommandRouterConfig,
    pub secrets: SecretsConfig,

    /// Data directory for local/embedded storage (watermark file, sqlite queue).
    pub data_dir: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            mongodb: MongoConfig::default(),
            queue: QueueConfig::default(),
            rapidpro: RapidProConfig::default(),
            identity: IdentityConfig::default(),
            inbound: InboundConfig::default(),
            outbound: OutboundConfig::default(),
            command_router: CommandRouterConfig::default(),
            secrets: SecretsConfig::default(),
            data_dir: "./data".to_string(),
        }
    }
}

/// MongoDB configuration (identity map table + conversation shards).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MongoConfig {
    pub uri: String,
    pub database: String,
}

impl Default for MongoConfig {
    fn default() -> Self {
        Self {
            uri: "mongodb://localhost:27017/?replicaSet=rs0&directConnection=true".to_string(),
            database: "sms_bridge".to_string(),
        }
    }
}

/// Pub/sub configuration: topic/subscription naming and broker backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueConfig {
    /// Backend: "sqs" or "sqlite" (embedded, for local/dev use)
    #[serde(rename = "type")]
    pub queue_type: String,
    pub project_id: String,
    /// Logical name of the command topic (spec default: "sms-channel-topic")
    pub command_topic: String,
    /// Logical name of the outbound topic (spec default: "sms-outgoing")
    pub outgoing_topic: String,
    /// Logical name of the incoming (inbound-published) topic
    pub incoming_topic: String,
    pub sqs: SqsConfig,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            queue_type: "sqlite".to_string(),
            project_id: "sms-bridge".to_string(),
            command_topic: "sms-channel-topic".to_string(),
            outgoing_topic: "sms-outgoing".to_string(),
            incoming_topic: "sms-incoming".to_string(),
            sqs: SqsConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SqsConfig {
    pub region: String,
    pub wait_time_seconds: u32,
    pub visibility_timeout: u32,
}

impl Default for SqsConfig {
    fn default() -> Self {
        Self {
            region: "us-east-1".to_string(),
            wait_time_seconds: 20,
            visibility_timeout: 120,
        }
    }
}

/// RapidPro gateway configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RapidProConfig {
    /// Base URL; normally supplied by the credentials bucket blob, this is
    /// the fallback/default used in dev mode.
    pub base_url: String,
    pub connect_timeout_ms: u64,
    /// Default 10 minutes for the fetch call.
    pub request_timeout_ms: u64,
    /// Name of the JSON blob holding `{"domain":..., "token":...}` in the
    /// credentials bucket.
    pub credentials_blob_name: String,
}

impl Default for RapidProConfig {
    fn default() -> Self {
        Self {
            base_url: "https://rapidpro.example.org".to_string(),
            connect_timeout_ms: 10_000,
            request_timeout_ms: 600_000,
            credentials_blob_name: "rapidpro-config.json".to_string(),
        }
    }
}

/// Identity map configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IdentityConfig {
    /// Mongo collection backing `tables/<table-name>/mappings`.
    pub collection: String,
    pub token_prefix: String,
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            collection: "uuid_table_mappings".to_string(),
            token_prefix: "nook-phone-uuid-".to_string(),
        }
    }
}

/// Inbound poller configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InboundConfig {
    /// Sleep between successful poll cycles, in milliseconds.
    pub poll_interval_ms: u64,
    /// Backoff schedule (seconds) for transient gateway fetch errors.
    pub backoff_schedule_secs: Vec<f64>,
    pub watermark_path: String,
}

impl Default for InboundConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 5_000,
            backoff_schedule_secs: vec![0.1, 0.5, 2.0, 4.0, 8.0, 16.0, 32.0],
            watermark_path: "./data/last_update_time.json".to_string(),
        }
    }
}

/// Outbound dispatcher configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutboundConfig {
    pub group_size: usize,
    /// Retry schedule (seconds) for transient gateway send errors.
    pub retry_schedule_secs: Vec<f64>,
    /// Retry is only attempted while group size is at or below this bound.
    pub max_retryable_group_size: usize,
    /// Failure window is considered saturated at this count.
    pub failure_window_limit: usize,
    pub failure_window_seconds: u64,
}

impl Default for OutboundConfig {
    fn default() -> Self {
        Self {
            group_size: 100,
            retry_schedule_secs: vec![4.0, 16.0, 32.0],
            max_retryable_group_size: 15,
            failure_window_limit: 10,
            failure_window_seconds: 300,
        }
    }
}

/// Command router configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CommandRouterConfig {
    /// When true, `add_opinion`/`sms_from_rapidpro` are never dispatched —
    /// the router only republishes `send_to_multi_ids`/`send_messages_to_ids`
    /// as `send_messages` on the outgoing topic. Resolves the source's
    /// duplicated-entry-point design note as a config flag instead of a
    /// second binary.
    pub relay_only: bool,
}

impl Default for CommandRouterConfig {
    fn default() -> Self {
        Self { relay_only: false }
    }
}

/// Secrets provider configuration (credential file / service-account JSON /
/// RapidPro config blob).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SecretsConfig {
    /// Provider type: env, encrypted, aws-sm
    pub provider: String,
    pub encryption_key: String,
    pub data_dir: String,
    pub aws_region: String,
    pub aws_prefix: String,
}

impl Default for SecretsConfig {
    fn default() -> Self {
        Self {
            provider: "env".to_string(),
            encryption_key: String::new(),
            data_dir: "./data/secrets".to_string(),
            aws_region: String::new(),
            aws_prefix: "/sms-bridge/".to_string(),
        }
    }
}

impl AppConfig {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: AppConfig = toml::from_str(&content)?;
        Ok(config)
    }

    /// Load configuration with environment variable override
    pub fn load() -> Result<Self, ConfigError> {
        let loader = ConfigLoader::new();
        loader.load()
    }

    /// Generate an example TOML configuration
    pub fn example_toml() -> String {
        r#"# SMS Bridge Configuration
# Environment variables override these settings

[mongodb]
uri = "mongodb://localhost:27017/?replicaSet=rs0&directConnection=true"
database = "sms_bridge"

[queue]
type = "sqlite"  # sqlite (embedded) or sqs
project_id = "sms-bridge"
command_topic = "sms-channel-topic"
outgoing_topic = "sms-outgoing"
incoming_topic = "sms-incoming"

[queue.sqs]
region = "us-east-1"
wait_time_seconds = 20
visibility_timeout = 120

[rapidpro]
base_url = "https://rapidpro.example.org"
connect_timeout_ms = 10000
request_timeout_ms = 600000
credentials_blob_name = "rapidpro-config.json"

[identity]
collection = "uuid_table_mappings"
token_prefix = "nook-phone-uuid-"

[inbound]
poll_interval_ms = 5000
backoff_schedule_secs = [0.1, 0.5, 2.0, 4.0, 8.0, 16.0, 32.0]
watermark_path = "./data/last_update_time.json"

[outbound]
group_size = 100
retry_schedule_secs = [4.0, 16.0, 32.0]
max_retryable_group_size = 15
failure_window_limit = 10
failure_window_seconds = 300

[command_router]
relay_only = false

[secrets]
provider = "env"  # env, encrypted, aws-sm
encryption_key = ""
data_dir = "./data/secrets"
aws_region = ""
aws_prefix = "/sms-bridge/"

data_dir = "./data"
"#
        .to_string()
    }
}
