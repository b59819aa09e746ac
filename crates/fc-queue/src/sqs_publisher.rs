//! AWS SQS publisher, the outbound twin of `SqsQueueConsumer`. The bridge
//! is bidirectional, so unlike a pure dispatch sink it needs both
//! directions against the same broker.

use async_trait::async_trait;
use aws_sdk_sqs::Client;
use tracing::debug;

use crate::{QueueError, QueuePublisher, Result};
use fc_common::Message;

pub struct SqsQueuePublisher {
    client: Client,
    queue_url: String,
    queue_name: String,
}

impl SqsQueuePublisher {
    pub fn new(client: Client, queue_url: String, queue_name: String) -> Self {
        Self {
            client,
            queue_url,
            queue_name,
        }
    }
}

#[async_trait]
impl QueuePublisher for SqsQueuePublisher {
    fn identifier(&self) -> &str {
        &self.queue_name
    }

    async fn publish(&self, message: Message) -> Result<String> {
        let body = serde_json::to_string(&message)?;
        let mut request = self.client.send_message().queue_url(&self.queue_url).message_body(body);

        if let Some(group_id) = &message.message_group_id {
            request = request
                .message_group_id(group_id)
                .message_deduplication_id(&message.id);
        }

        let result = request.send().await.map_err(|e| QueueError::Sqs(e.to_string()))?;
        let message_id = result.message_id().unwrap_or(&message.id).to_string();

        debug!(queue = %self.queue_name, message_id = %message_id, "Published message to SQS");
        Ok(message_id)
    }

    async fn publish_batch(&self, messages: Vec<Message>) -> Result<Vec<String>> {
        let mut ids = Vec::with_capacity(messages.len());
        for message in messages {
            ids.push(self.publish(message).await?);
        }
        Ok(ids)
    }
}
