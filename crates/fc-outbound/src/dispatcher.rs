//! Outbound dispatcher.
//!
//! Consumes a `send_messages` command, resolves its recipient tokens back
//! to addresses, filters to `tel:+` addresses, splits into bounded groups,
//! and sends each group one text at a time through a single shared gateway
//! client. Every send goes through one mutex — the gateway client isn't
//! safe for concurrent use by multiple in-flight groups.

use fc_identity::IdentityMap;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{info, warn};

use crate::failure_window::FailureWindow;
use crate::gateway::{SendError, SmsGateway};
use crate::pipeline::{filter_tel_addresses, split_into_groups};
use fc_common::{Token, Urn};

#[derive(Debug, Error)]
pub enum OutboundError {
    #[error(transparent)]
    Identity(#[from] fc_identity::IdentityError),

    /// The gateway rejected the request outright; retrying would not help.
    #[error("bad request, not retrying: {0}")]
    BadRequest(String),

    /// Retry conditions were no longer met (group too large, retry budget
    /// spent, or too many recent failures system-wide).
    #[error("retries exhausted: {0}")]
    RetriesExhausted(String),
}

pub type Result<T> = std::result::Result<T, OutboundError>;

#[derive(Debug, Clone)]
pub struct OutboundDispatcherConfig {
    pub group_size: usize,
    pub retry_schedule: Vec<Duration>,
    pub max_retryable_group_size: usize,
    pub failure_window_limit: usize,
    pub failure_window: Duration,
}

impl Default for OutboundDispatcherConfig {
    fn default() -> Self {
        Self {
            group_size: 100,
            retry_schedule: vec![
                Duration::from_secs(4),
                Duration::from_secs(16),
                Duration::from_secs(32),
            ],
            max_retryable_group_size: 15,
            failure_window_limit: 10,
            failure_window: Duration::from_secs(300),
        }
    }
}

/// Wire payload for the `send_messages` action.
#[derive(Debug, Clone, serde::Deserialize, serde::Serialize)]
pub struct SendMessagesCommand {
    pub ids: Vec<Token>,
    pub messages: Vec<String>,
}

pub struct OutboundDispatcher<G, I> {
    gateway: Arc<G>,
    gateway_lock: Arc<tokio::sync::Mutex<()>>,
    identity: Arc<I>,
    failure_window: FailureWindow,
    config: OutboundDispatcherConfig,
}

impl<G, I> OutboundDispatcher<G, I>
where
    G: SmsGateway,
    I: IdentityMap,
{
    /// `gateway_lock` must be the same mutex the inbound poller locks
    /// around its fetch calls, so fetch and send against the shared
    /// gateway client never run concurrently.
    pub fn new(
        gateway: Arc<G>,
        identity: Arc<I>,
        config: OutboundDispatcherConfig,
        gateway_lock: Arc<tokio::sync::Mutex<()>>,
    ) -> Self {
        let failure_window = FailureWindow::new(config.failure_window);
        Self {
            gateway,
            gateway_lock,
            identity,
            failure_window,
            config,
        }
    }

    /// Runs a `send_messages` command to completion. A missing token in
    /// the identity map aborts the whole job (propagated from
    /// `lookup_batch`'s all-or-nothing contract).
    pub async fn process(&self, command: &SendMessagesCommand) -> Result<()> {
        let resolved = self.identity.lookup_batch(&command.ids).await?;
        let addresses: Vec<Urn> = command
            .ids
            .iter()
            .filter_map(|id| resolved.get(id).cloned())
            .collect();

        let filtered = filter_tel_addresses(addresses);
        let groups = split_into_groups(filtered, self.config.group_size);

        for group in &groups {
            for text in &command.messages {
                self.send_with_retry(text, group).await?;
            }
        }

        metrics::counter!("outbound.jobs_sent_total").increment(1);
        Ok(())
    }

    async fn send_with_retry(&self, text: &str, group: &[Urn]) -> Result<()> {
        let mut retry_count = 0usize;
        loop {
            let result = {
                let _guard = self.gateway_lock.lock().await;
                self.gateway.send(text, group, true).await
            };

            match result {
                Ok(()) => return Ok(()),
                Err(SendError::BadRequest(message)) => {
                    return Err(OutboundError::BadRequest(message));
                }
                Err(e) if e.is_retryable() => {
                    self.failure_window.record();
                    metrics::counter!("outbound.retry_total").increment(1);

                    let can_retry = group.len() <= self.config.max_retryable_group_size
                        && retry_count < self.config.retry_schedule.len()
                        && self.failure_window.len() < self.config.failure_window_limit;

                    if !can_retry {
                        metrics::gauge!("outbound.failure_window_size")
                            .set(self.failure_window.len() as f64);
                        return Err(OutboundError::RetriesExhausted(e.to_string()));
                    }

                    let delay = self.config.retry_schedule[retry_count];
                    warn!(error = %e, retry_count, delay_secs = delay.as_secs_f64(), "retrying outbound send");
                    tokio::time::sleep(delay).await;
                    retry_count += 1;
                }
                Err(e) => return Err(OutboundError::RetriesExhausted(e.to_string())),
            }
        }
    }
}
