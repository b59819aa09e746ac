//! Gateway contract the poller drives.
//!
//! Out of scope here: the concrete HTTP client and RapidPro wire format —
//! those belong to whatever adapter wires a `reqwest::Client` (configured
//! with a 10-minute default request timeout) behind this trait in the
//! `sms-bridge` binary.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use fc_common::Urn;
use thiserror::Error;

#[derive(Debug, Clone)]
pub struct InboundSms {
    pub address: Urn,
    pub created_on: DateTime<Utc>,
    pub text: String,
    pub direction: String,
}

#[derive(Debug, Error, Clone)]
pub enum GatewayError {
    /// Network blips, 5xx, rate limiting — worth retrying with backoff.
    #[error("transient gateway error: {0}")]
    Transient(String),

    /// Bad credentials, malformed response shape — retrying won't help.
    #[error("fatal gateway error: {0}")]
    Fatal(String),
}

#[async_trait]
pub trait RapidProGateway: Send + Sync {
    /// Returns every inbound message created at or after
    /// `created_after_inclusive`, oldest first.
    async fn fetch(
        &self,
        created_after_inclusive: DateTime<Utc>,
    ) -> std::result::Result<Vec<InboundSms>, GatewayError>;
}
