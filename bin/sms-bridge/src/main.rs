//! Bidirectional bridge between RapidPro and the rest of the system:
//! polls RapidPro for inbound SMS and republishes them, and consumes
//! outbound `send_messages` commands and dispatches them back to
//! RapidPro. Both halves share one gateway client and one process so a
//! single fail-stop in either direction is visible to the other via the
//! idle-loop check below.

mod cli;
mod rapidpro_client;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use fc_config::AppConfig;
use fc_identity::MongoIdentityMap;
use fc_inbound::{InboundPoller, InboundPollerConfig, JsonFileWatermarkStore};
use fc_outbound::{OutboundDispatcher, OutboundDispatcherConfig, SendMessagesCommand};
use fc_queue::{sqs::SqsQueueConsumer, sqs_publisher::SqsQueuePublisher, QueueConsumer, QueuePublisher};
use fc_secrets::{CredentialsBucket, RapidProCredentials, S3CredentialsBucket, ServiceAccountCredentials};
use fc_sequencer::{Sequencer, SequencerConfig, SequencedHandler};
use mongodb::Client as MongoClient;
use tracing::{error, info, warn};

use cli::Args;
use rapidpro_client::RapidProClient;

fn queue_name(project_id: &str, logical: &str) -> String {
    format!("{project_id}-{logical}")
}

async fn sqs_queue_url(client: &aws_sdk_sqs::Client, name: &str) -> anyhow::Result<String> {
    let response = client.get_queue_url().queue_name(name).send().await?;
    response
        .queue_url()
        .map(str::to_string)
        .ok_or_else(|| anyhow::anyhow!("SQS did not return a queue URL for {name}"))
}

struct OutboundHandler {
    dispatcher: Arc<OutboundDispatcher<RapidProClient, MongoIdentityMap>>,
}

#[async_trait]
impl SequencedHandler<fc_common::QueuedMessage> for OutboundHandler {
    type Error = String;

    async fn handle(&self, queued: fc_common::QueuedMessage) -> std::result::Result<(), String> {
        let envelope: fc_common::Envelope<SendMessagesCommand> = serde_json::from_str(&queued.message.body)
            .map_err(|e| format!("malformed send_messages envelope: {e}"))?;
        self.dispatcher
            .process(&envelope.payload)
            .await
            .map_err(|e| e.to_string())
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    fc_common::logging::init_logging("sms-bridge");

    let args = Args::parse(std::env::args())?;
    let config = AppConfig::load()?;

    let service_account = ServiceAccountCredentials::load(&args.crypto_token_file).await?;
    let project_id = args.project_name.clone().unwrap_or(service_account.project_id);
    info!(project_id = %project_id, "loaded service-account credentials");

    let s3 = S3CredentialsBucket::new(Some(config.queue.sqs.region.clone())).await;
    let rapidpro_creds: RapidProCredentials = s3
        .fetch_json(&args.credentials_bucket_name, &config.rapidpro.credentials_blob_name)
        .await?;

    let rapidpro_client = Arc::new(RapidProClient::new(
        format!("https://{}", rapidpro_creds.domain),
        rapidpro_creds.token,
        Duration::from_millis(config.rapidpro.connect_timeout_ms),
        Duration::from_millis(config.rapidpro.request_timeout_ms),
    )?);

    let mongo_client = MongoClient::with_uri_str(&config.mongodb.uri).await?;
    let db = mongo_client.database(&config.mongodb.database);
    let identity = Arc::new(MongoIdentityMap::new(
        mongo_client.clone(),
        db.clone(),
        fc_identity::IdentityMapConfig {
            collection: config.identity.collection.clone(),
            token_prefix: config.identity.token_prefix.clone(),
        },
    ));

    let aws_sdk_config = aws_config::defaults(aws_config::BehaviorVersion::latest())
        .region(aws_sdk_sqs::config::Region::new(config.queue.sqs.region.clone()))
        .load()
        .await;
    let sqs_client = aws_sdk_sqs::Client::new(&aws_sdk_config);

    let command_queue_name = queue_name(&project_id, &config.queue.command_topic);
    let outgoing_queue_name = queue_name(&project_id, &config.queue.outgoing_topic);

    let command_publisher: Arc<dyn QueuePublisher> = Arc::new(SqsQueuePublisher::new(
        sqs_client.clone(),
        sqs_queue_url(&sqs_client, &command_queue_name).await?,
        command_queue_name.clone(),
    ));
    let outgoing_queue_url = sqs_queue_url(&sqs_client, &outgoing_queue_name).await?;
    let outgoing_consumer = Arc::new(SqsQueueConsumer::new(
        sqs_client.clone(),
        outgoing_queue_url,
        outgoing_queue_name,
        config.queue.sqs.visibility_timeout as i32,
    ));

    // Shared between the inbound fetch and outbound send paths so the two
    // halves never drive the same gateway client concurrently.
    let gateway_lock = Arc::new(tokio::sync::Mutex::new(()));

    let watermark = JsonFileWatermarkStore::new(args.last_update_token_path.as_str());
    let poller = Arc::new(InboundPoller::new(
        (*rapidpro_client).clone(),
        watermark,
        identity.clone(),
        command_publisher,
        InboundPollerConfig {
            poll_interval: Duration::from_millis(config.inbound.poll_interval_ms),
            backoff_schedule: config
                .inbound
                .backoff_schedule_secs
                .iter()
                .map(|s| Duration::from_secs_f64(*s))
                .collect(),
        },
        gateway_lock.clone(),
    ));

    let dispatcher = Arc::new(OutboundDispatcher::new(
        rapidpro_client.clone(),
        identity.clone(),
        OutboundDispatcherConfig {
            group_size: config.outbound.group_size,
            retry_schedule: config
                .outbound
                .retry_schedule_secs
                .iter()
                .map(|s| Duration::from_secs_f64(*s))
                .collect(),
            max_retryable_group_size: config.outbound.max_retryable_group_size,
            failure_window_limit: config.outbound.failure_window_limit,
            failure_window: Duration::from_secs(config.outbound.failure_window_seconds),
        },
        gateway_lock,
    ));
    let sequencer = Arc::new(Sequencer::new(
        OutboundHandler {
            dispatcher: dispatcher.clone(),
        },
        SequencerConfig::default(),
    ));

    let inbound_task = tokio::spawn({
        let poller = poller.clone();
        async move { poller.run().await }
    });

    let outbound_task = tokio::spawn({
        let consumer = outgoing_consumer.clone();
        let sequencer = sequencer.clone();
        async move {
            loop {
                let messages = match consumer.poll(10).await {
                    Ok(messages) => messages,
                    Err(e) => {
                        warn!(error = %e, "outgoing queue poll failed, retrying");
                        tokio::time::sleep(Duration::from_secs(1)).await;
                        continue;
                    }
                };
                for queued in messages {
                    let receipt_handle = queued.receipt_handle.clone();
                    match sequencer.submit(queued).await {
                        Ok(fc_common::AckNack::Ack) => {
                            let _ = consumer.ack(&receipt_handle).await;
                        }
                        Ok(fc_common::AckNack::Nack { delay_seconds }) => {
                            let _ = consumer.nack(&receipt_handle, delay_seconds).await;
                        }
                        Err(e) => {
                            error!(error = %e, "outbound sequencer fail-stopped");
                            let _ = consumer.nack(&receipt_handle, None).await;
                            return;
                        }
                    }
                }
            }
        }
    });

    // Mirrors the combined binary's idle loop: wait for shutdown, checking
    // the outbound sequencer's terminal-error slot every 100ms across a
    // 5s idle window so a fail-stop on one side is noticed promptly even
    // while the other side has nothing to do.
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);
    loop {
        tokio::select! {
            _ = &mut shutdown => {
                info!("shutdown signal received");
                break;
            }
            _ = tokio::time::sleep(Duration::from_secs(5)) => {
                if sequencer.is_failed() {
                    error!("outbound sequencer is fail-stopped, stopping sms-bridge");
                    break;
                }
            }
        }
    }

    inbound_task.abort();
    outbound_task.abort();

    if sequencer.is_failed() {
        std::process::exit(1);
    }
    Ok(())
}
