//! Inbound poller.
//!
//! Polls the SMS gateway for messages created since a persisted watermark,
//! resolves each sender address through the identity map, and republishes
//! each one as a `sms_from_rapidpro` action. The watermark only advances to
//! the timestamp captured *before* the fetch call, so a crash between fetch
//! and publish always results in at-least-once redelivery of the
//! in-flight batch rather than silently skipping it.

mod gateway;
mod watermark;

pub use gateway::{GatewayError, InboundSms, RapidProGateway};
pub use watermark::{JsonFileWatermarkStore, WatermarkError, WatermarkStore};

use chrono::{DateTime, Utc};
use fc_common::Envelope;
use fc_identity::IdentityMap;
use fc_queue::QueuePublisher;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, error, info, warn};

#[derive(Debug, Error)]
pub enum InboundError {
    #[error(transparent)]
    Gateway(#[from] GatewayError),

    #[error(transparent)]
    Watermark(#[from] WatermarkError),

    #[error(transparent)]
    Identity(#[from] fc_identity::IdentityError),

    #[error(transparent)]
    Queue(#[from] fc_queue::QueueError),
}

pub type Result<T> = std::result::Result<T, InboundError>;

#[derive(Debug, Clone)]
pub struct InboundPollerConfig {
    pub poll_interval: Duration,
    /// Applied, in order, across consecutive transient gateway failures;
    /// resets to the first entry once a fetch succeeds.
    pub backoff_schedule: Vec<Duration>,
}

impl Default for InboundPollerConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(5),
            backoff_schedule: [0.1, 0.5, 2.0, 4.0, 8.0, 16.0, 32.0]
                .into_iter()
                .map(Duration::from_secs_f64)
                .collect(),
        }
    }
}

#[derive(Debug, Serialize)]
struct SmsRaw {
    deidentified_phone_number: String,
    created_on: DateTime<Utc>,
    text: String,
    direction: String,
}

#[derive(Debug, Serialize)]
#[serde(tag = "action", rename = "sms_from_rapidpro")]
struct SmsFromRapidProAction {
    sms_raw: SmsRaw,
}

pub struct InboundPoller<G, W, I> {
    gateway: G,
    watermark: W,
    identity: Arc<I>,
    publisher: Arc<dyn QueuePublisher>,
    config: InboundPollerConfig,
    gateway_lock: Arc<tokio::sync::Mutex<()>>,
}

impl<G, W, I> InboundPoller<G, W, I>
where
    G: RapidProGateway,
    W: WatermarkStore,
    I: IdentityMap,
{
    /// `gateway_lock` must be the same mutex the outbound dispatcher locks
    /// around its send calls, so fetch and send against the shared gateway
    /// client never run concurrently.
    pub fn new(
        gateway: G,
        watermark: W,
        identity: Arc<I>,
        publisher: Arc<dyn QueuePublisher>,
        config: InboundPollerConfig,
        gateway_lock: Arc<tokio::sync::Mutex<()>>,
    ) -> Self {
        Self {
            gateway,
            watermark,
            identity,
            publisher,
            config,
            gateway_lock,
        }
    }

    /// Runs the poll loop until a fatal gateway or watermark error occurs,
    /// or until transient gateway errors exhaust `backoff_schedule`.
    pub async fn run(&self) -> Result<()> {
        let mut backoff_index = 0usize;
        loop {
            match self.poll_once().await {
                Ok(published) => {
                    backoff_index = 0;
                    if published > 0 {
                        debug!(published, "inbound poll cycle published messages");
                    }
                    tokio::time::sleep(self.config.poll_interval).await;
                }
                Err(InboundError::Gateway(GatewayError::Transient(message))) => {
                    if backoff_index >= self.config.backoff_schedule.len() {
                        error!(error = %message, "transient gateway error, backoff schedule exhausted");
                        return Err(InboundError::Gateway(GatewayError::Transient(message)));
                    }
                    let delay = self.config.backoff_schedule[backoff_index];
                    warn!(error = %message, delay_secs = delay.as_secs_f64(), "transient gateway error, backing off");
                    backoff_index += 1;
                    tokio::time::sleep(delay).await;
                }
                Err(e) => {
                    error!(error = %e, "inbound poller stopping on fatal error");
                    return Err(e);
                }
            }
        }
    }

    /// One fetch/publish/watermark cycle. Returns the number of messages
    /// published. Exposed separately from `run` so it can be driven
    /// directly in tests.
    pub async fn poll_once(&self) -> Result<usize> {
        let watermark = self.watermark.read().await?;
        let cycle_started_at = Utc::now();

        let messages = {
            let _guard = self.gateway_lock.lock().await;
            self.gateway.fetch(watermark).await?
        };
        let count = messages.len();

        for sms in messages {
            let token = self.identity.resolve(&sms.address).await?;
            let action = SmsFromRapidProAction {
                sms_raw: SmsRaw {
                    deidentified_phone_number: token,
                    created_on: sms.created_on,
                    text: sms.text,
                    direction: sms.direction,
                },
            };
            let envelope = Envelope::new(action);
            let body = serde_json::to_string(&envelope).map_err(fc_queue::QueueError::Serialization)?;
            self.publisher
                .publish(fc_common::Message {
                    id: uuid::Uuid::new_v4().to_string(),
                    body,
                    message_group_id: None,
                })
                .await?;
        }

        // Watermark only advances to the timestamp captured before the
        // fetch, never past the last message's own timestamp, so a crash
        // mid-batch redelivers instead of silently skipping.
        self.watermark.write(cycle_started_at).await?;

        info!(count, "inbound poll cycle complete");
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use fc_identity::{IdentityError, IdentityMapConfig};
    use std::collections::HashMap;
    use std::sync::Mutex;

    struct StubGateway {
        batches: Mutex<Vec<std::result::Result<Vec<InboundSms>, GatewayError>>>,
    }

    #[async_trait]
    impl RapidProGateway for StubGateway {
        async fn fetch(
            &self,
            _created_after_inclusive: DateTime<Utc>,
        ) -> std::result::Result<Vec<InboundSms>, GatewayError> {
            let mut batches = self.batches.lock().unwrap();
            if batches.is_empty() {
                return Ok(Vec::new());
            }
            batches.remove(0)
        }
    }

    struct StubWatermark {
        value: Mutex<DateTime<Utc>>,
    }

    #[async_trait]
    impl WatermarkStore for StubWatermark {
        async fn read(&self) -> std::result::Result<DateTime<Utc>, WatermarkError> {
            Ok(*self.value.lock().unwrap())
        }

        async fn write(&self, value: DateTime<Utc>) -> std::result::Result<(), WatermarkError> {
            *self.value.lock().unwrap() = value;
            Ok(())
        }
    }

    struct StubIdentity;

    #[async_trait]
    impl IdentityMap for StubIdentity {
        async fn resolve(&self, address: &fc_common::Urn) -> fc_identity::Result<fc_common::Token> {
            Ok(format!("{}{}", IdentityMapConfig::default().token_prefix, address.len()))
        }

        async fn resolve_batch(
            &self,
            _addresses: &[fc_common::Urn],
        ) -> fc_identity::Result<HashMap<fc_common::Urn, fc_common::Token>> {
            Ok(HashMap::new())
        }

        async fn lookup(&self, _token: &fc_common::Token) -> fc_identity::Result<fc_common::Urn> {
            Err(IdentityError::NotFound("unused in this test".to_string()))
        }

        async fn lookup_batch(
            &self,
            _tokens: &[fc_common::Token],
        ) -> fc_identity::Result<HashMap<fc_common::Token, fc_common::Urn>> {
            Ok(HashMap::new())
        }
    }

    struct RecordingPublisher {
        published: Mutex<Vec<fc_common::Message>>,
    }

    #[async_trait]
    impl QueuePublisher for RecordingPublisher {
        fn identifier(&self) -> &str {
            "test-topic"
        }

        async fn publish(&self, message: fc_common::Message) -> fc_queue::Result<String> {
            let id = message.id.clone();
            self.published.lock().unwrap().push(message);
            Ok(id)
        }

        async fn publish_batch(&self, messages: Vec<fc_common::Message>) -> fc_queue::Result<Vec<String>> {
            let mut ids = Vec::new();
            for m in messages {
                ids.push(self.publish(m).await?);
            }
            Ok(ids)
        }
    }

    fn sample_sms(address: &str) -> InboundSms {
        InboundSms {
            address: address.to_string(),
            created_on: Utc::now(),
            text: "hi".to_string(),
            direction: "in".to_string(),
        }
    }

    #[tokio::test]
    async fn poll_once_publishes_one_envelope_per_message_and_advances_watermark() {
        let start = Utc::now();
        let gateway = StubGateway {
            batches: Mutex::new(vec![Ok(vec![sample_sms("tel:+15551230000")])]),
        };
        let watermark = StubWatermark {
            value: Mutex::new(start),
        };
        let publisher = Arc::new(RecordingPublisher {
            published: Mutex::new(Vec::new()),
        });
        let poller = InboundPoller::new(
            gateway,
            watermark,
            Arc::new(StubIdentity),
            publisher.clone(),
            InboundPollerConfig::default(),
            Arc::new(tokio::sync::Mutex::new(())),
        );

        let count = poller.poll_once().await.unwrap();
        assert_eq!(count, 1);
        assert_eq!(publisher.published.lock().unwrap().len(), 1);

        let new_watermark = poller.watermark.read().await.unwrap();
        assert!(new_watermark >= start);
    }

    #[tokio::test]
    async fn transient_gateway_error_does_not_advance_watermark() {
        let start = Utc::now();
        let gateway = StubGateway {
            batches: Mutex::new(vec![Err(GatewayError::Transient("timeout".to_string()))]),
        };
        let watermark = StubWatermark {
            value: Mutex::new(start),
        };
        let publisher = Arc::new(RecordingPublisher {
            published: Mutex::new(Vec::new()),
        });
        let poller = InboundPoller::new(
            gateway,
            watermark,
            Arc::new(StubIdentity),
            publisher,
            InboundPollerConfig::default(),
            Arc::new(tokio::sync::Mutex::new(())),
        );

        let result = poller.poll_once().await;
        assert!(matches!(result, Err(InboundError::Gateway(GatewayError::Transient(_)))));
        assert_eq!(poller.watermark.read().await.unwrap(), start);
    }

    #[tokio::test]
    async fn run_terminates_once_backoff_schedule_is_exhausted() {
        let gateway = StubGateway {
            batches: Mutex::new(vec![
                Err(GatewayError::Transient("timeout".to_string())),
                Err(GatewayError::Transient("timeout".to_string())),
                Err(GatewayError::Transient("timeout".to_string())),
            ]),
        };
        let watermark = StubWatermark {
            value: Mutex::new(Utc::now()),
        };
        let publisher = Arc::new(RecordingPublisher {
            published: Mutex::new(Vec::new()),
        });
        let poller = InboundPoller::new(
            gateway,
            watermark,
            Arc::new(StubIdentity),
            publisher,
            InboundPollerConfig {
                poll_interval: Duration::from_millis(1),
                backoff_schedule: vec![Duration::from_millis(1), Duration::from_millis(1)],
            },
            Arc::new(tokio::sync::Mutex::new(())),
        );

        let result = poller.run().await;
        assert!(
            matches!(result, Err(InboundError::Gateway(GatewayError::Transient(_)))),
            "run() must propagate once every scheduled backoff has been used"
        );
    }
}
