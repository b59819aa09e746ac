//! Consumes the command topic and dispatches each action through
//! `fc_command::CommandRouter`, same ordered-sequencer wrapping as the
//! SMS bridge's outbound side so a handler failure fail-stops the queue
//! instead of silently dropping messages out of order.

mod cli;

use std::sync::Arc;

use async_trait::async_trait;
use fc_command::{CommandRouter, ConversationCache, MongoConversationStore, MongoSuggestedRepliesStore};
use fc_config::AppConfig;
use fc_queue::{sqs::SqsQueueConsumer, sqs_publisher::SqsQueuePublisher, QueueConsumer, QueuePublisher};
use fc_secrets::ServiceAccountCredentials;
use fc_sequencer::{Sequencer, SequencerConfig, SequencedHandler};
use mongodb::Client as MongoClient;
use tracing::{error, info, warn};

use cli::Args;

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

struct RoutingHandler {
    router: Arc<CommandRouter<MongoConversationStore, MongoSuggestedRepliesStore>>,
}

#[async_trait]
impl SequencedHandler<fc_common::QueuedMessage> for RoutingHandler {
    type Error = String;

    async fn handle(&self, queued: fc_common::QueuedMessage) -> std::result::Result<(), String> {
        let envelope: fc_common::Envelope<fc_command::CommandAction> =
            serde_json::from_str(&queued.message.body).map_err(|e| format!("malformed command envelope: {e}"))?;
        self.router
            .route(envelope.payload)
            .await
            .map_err(|e| e.to_string())
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    fc_common::logging::init_logging("command-router");

    let args = Args::parse(std::env::args())?;
    let config = AppConfig::load()?;

    let service_account = ServiceAccountCredentials::load(&args.crypto_token_file).await?;
    let project_id = service_account.project_id;
    info!(project_id = %project_id, "loaded service-account credentials");

    let mongo_client = MongoClient::with_uri_str(&config.mongodb.uri).await?;
    let db = mongo_client.database(&config.mongodb.database);

    let conversations = Arc::new(MongoConversationStore::new(db.clone(), "conversations"));
    let suggested_replies = Arc::new(MongoSuggestedRepliesStore::new(db.clone(), "suggested_replies"));
    let cache = ConversationCache::new(conversations);

    let aws_sdk_config = aws_config::defaults(aws_config::BehaviorVersion::latest())
        .region(aws_sdk_sqs::config::Region::new(config.queue.sqs.region.clone()))
        .load()
        .await;
    let sqs_client = aws_sdk_sqs::Client::new(&aws_sdk_config);

    let command_queue_name = queue_name(&project_id, &config.queue.command_topic);
    let outgoing_queue_name = queue_name(&project_id, &config.queue.outgoing_topic);

    let command_queue_url = sqs_queue_url(&sqs_client, &command_queue_name).await?;
    let command_consumer = Arc::new(SqsQueueConsumer::new(
        sqs_client.clone(),
        command_queue_url,
        command_queue_name,
        config.queue.sqs.visibility_timeout as i32,
    ));
    let outgoing_publisher: Arc<dyn QueuePublisher> = Arc::new(SqsQueuePublisher::new(
        sqs_client.clone(),
        sqs_queue_url(&sqs_client, &outgoing_queue_name).await?,
        outgoing_queue_name,
    ));

    let router = Arc::new(CommandRouter::new(
        cache,
        suggested_replies,
        outgoing_publisher,
        config.command_router.clone(),
    ));
    let sequencer = Arc::new(Sequencer::new(RoutingHandler { router }, SequencerConfig::default()));

    let consume_task = tokio::spawn({
        let consumer = command_consumer.clone();
        let sequencer = sequencer.clone();
        async move {
            loop {
                let messages = match consumer.poll(10).await {
                    Ok(messages) => messages,
                    Err(e) => {
                        warn!(error = %e, "command queue poll failed, retrying");
                        tokio::time::sleep(std::time::Duration::from_secs(1)).await;
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
                            error!(error = %e, "command router fail-stopped");
                            let _ = consumer.nack(&receipt_handle, None).await;
                            return;
                        }
                    }
                }
            }
        }
    });

    tokio::signal::ctrl_c().await?;
    info!("shutdown signal received");
    consume_task.abort();

    if sequencer.is_failed() {
        std::process::exit(1);
    }
    Ok(())
}
