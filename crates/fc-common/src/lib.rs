use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Instant;

pub mod logging;

// ============================================================================
// Pub/Sub Envelope
// ============================================================================

/// Every pub/sub message body is `{"payload": <action-discriminated object>}`.
/// `Payload` is generic so each crate can define its own closed action enum
/// while reusing the same wire envelope and queue plumbing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope<P> {
    pub payload: P,
}

impl<P> Envelope<P> {
    pub fn new(payload: P) -> Self {
        Self { payload }
    }
}

/// The generic message type carried through `fc-queue`. Crates that need a
/// typed payload deserialize `body` themselves; the queue layer only cares
/// about delivery bookkeeping (id, group, receipt handle).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    pub body: String,
    #[serde(default)]
    pub message_group_id: Option<String>,
}

/// A message that has been received from a queue with tracking metadata.
#[derive(Debug, Clone)]
pub struct QueuedMessage {
    pub message: Message,
    pub receipt_handle: String,
    pub broker_message_id: Option<String>,
    pub queue_identifier: String,
}

/// ACK/NACK decision returned by a handler (or sequencer) to the queue consumer.
#[derive(Debug, Clone)]
pub enum AckNack {
    Ack,
    Nack { delay_seconds: Option<u32> },
}

/// Tracks a message currently held by the ordered sequencer.
#[derive(Debug, Clone)]
pub struct InFlightMessage {
    pub message_id: String,
    pub queue_identifier: String,
    pub started_at: Instant,
    pub message_group_id: Option<String>,
}

impl InFlightMessage {
    pub fn new(message: &Message, queue_identifier: String) -> Self {
        Self {
            message_id: message.id.clone(),
            queue_identifier,
            started_at: Instant::now(),
            message_group_id: message.message_group_id.clone(),
        }
    }

    pub fn elapsed_seconds(&self) -> u64 {
        self.started_at.elapsed().as_secs()
    }
}

// ============================================================================
// Domain identifiers
// ============================================================================

/// De-identified token, of the form `<prefix><uuid-v4>`.
pub type Token = String;

/// Gateway-native address string, e.g. `tel:+15551234567`.
pub type Urn = String;

/// Topic/subscription naming convention carried over from the source system:
/// `projects/<project-id>/topics/<project-id>-<logical>`.
pub fn topic_path(project_id: &str, logical: &str) -> String {
    format!("projects/{project_id}/topics/{project_id}-{logical}")
}

/// `projects/<project-id>/subscriptions/<project-id>-<logical>-subscription`.
pub fn subscription_path(project_id: &str, logical: &str) -> String {
    format!("projects/{project_id}/subscriptions/{project_id}-{logical}-subscription")
}

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum FlowCatalystError {
    #[error("Queue error: {0}")]
    Queue(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Shutdown in progress")]
    ShutdownInProgress,
}

pub type Result<T> = std::result::Result<T, FlowCatalystError>;
