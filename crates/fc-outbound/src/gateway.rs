//! Gateway contract the dispatcher sends through.

use async_trait::async_trait;
use fc_common::Urn;
use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum SendError {
    /// Transport/5xx failure — worth retrying.
    #[error("http error: {0}")]
    Http(String),

    /// Gateway-side throttling — worth retrying.
    #[error("rate limit exceeded: {0}")]
    RateExceeded(String),

    /// Malformed request — retrying would just fail again.
    #[error("bad request: {0}")]
    BadRequest(String),
}

impl SendError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, SendError::Http(_) | SendError::RateExceeded(_))
    }
}

#[async_trait]
pub trait SmsGateway: Send + Sync {
    /// Sends `text` to every recipient in `group` as a single outbound
    /// broadcast. `interrupt` mirrors the gateway's "interrupt active
    /// flows" delivery flag — always `true` for this dispatcher.
    async fn send(&self, text: &str, group: &[Urn], interrupt: bool) -> Result<(), SendError>;
}
