//! Command router: the action table dispatch.

use fc_config::CommandRouterConfig;
use fc_queue::QueuePublisher;
use serde_json::Value;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};
use uuid::Uuid;

use fc_common::{Envelope, Token};

use crate::action::{CommandAction, SmsRawPayload};
use crate::cache::ConversationCache;
use crate::conversation::{ConversationError, ConversationMessage, ConversationStore};
use crate::namespace::OpinionNamespace;
use crate::suggested_replies::{SuggestedReplies, SuggestedRepliesStore};

#[derive(Debug, Error)]
pub enum CommandError {
    #[error("unknown opinion namespace: {0}")]
    UnknownNamespace(String),

    #[error(transparent)]
    Conversation(#[from] ConversationError),

    #[error(transparent)]
    Queue(#[from] fc_queue::QueueError),

    #[error("invalid opinion payload: {0}")]
    InvalidPayload(String),
}

pub type Result<T> = std::result::Result<T, CommandError>;

/// Republished onto the outgoing topic; the wire shape `fc-outbound`
/// expects of a `send_messages` action.
#[derive(Debug, serde::Serialize)]
#[serde(tag = "action", rename = "send_messages")]
struct SendMessagesAction {
    ids: Vec<Token>,
    messages: Vec<String>,
}

pub struct CommandRouter<S, R> {
    cache: ConversationCache<S>,
    suggested_replies: Arc<R>,
    outgoing_publisher: Arc<dyn QueuePublisher>,
    config: CommandRouterConfig,
}

impl<S, R> CommandRouter<S, R>
where
    S: ConversationStore,
    R: SuggestedRepliesStore,
{
    pub fn new(
        cache: ConversationCache<S>,
        suggested_replies: Arc<R>,
        outgoing_publisher: Arc<dyn QueuePublisher>,
        config: CommandRouterConfig,
    ) -> Self {
        Self {
            cache,
            suggested_replies,
            outgoing_publisher,
            config,
        }
    }

    pub async fn route(&self, action: CommandAction) -> Result<()> {
        match action {
            CommandAction::SendToMultiIds { ids, text } => {
                self.republish_send_messages(ids, vec![text]).await
            }
            CommandAction::SendMessagesToIds { ids, messages } => {
                self.republish_send_messages(ids, messages).await
            }
            CommandAction::AddOpinion {
                namespace,
                opinion,
                source,
                authenticated_user_email,
                authenticated_user_display_name,
            } => {
                if self.config.relay_only {
                    warn!(namespace = %namespace, "relay-only mode: dropping opinion, router only relays send actions");
                    return Ok(());
                }
                let ns = OpinionNamespace::parse(&namespace)
                    .ok_or_else(|| CommandError::UnknownNamespace(namespace.clone()))?;
                debug!(source = %source, namespace = %namespace, "add_opinion");
                self.apply_opinion(ns, opinion, authenticated_user_email, authenticated_user_display_name)
                    .await
            }
            CommandAction::SmsFromRapidpro { sms_raw } => {
                if self.config.relay_only {
                    warn!("relay-only mode: dropping sms_from_rapidpro, router only relays send actions");
                    return Ok(());
                }
                self.ingest_sms(&sms_raw).await
            }
        }
    }

    async fn republish_send_messages(&self, ids: Vec<Token>, messages: Vec<String>) -> Result<()> {
        let envelope = Envelope::new(SendMessagesAction { ids, messages });
        let body = serde_json::to_string(&envelope).map_err(fc_queue::QueueError::Serialization)?;
        self.outgoing_publisher
            .publish(fc_common::Message {
                id: Uuid::new_v4().to_string(),
                body,
                message_group_id: None,
            })
            .await?;
        Ok(())
    }

    async fn apply_opinion(
        &self,
        namespace: OpinionNamespace,
        opinion: Value,
        authenticated_user_email: Option<String>,
        authenticated_user_display_name: Option<String>,
    ) -> Result<()> {
        if namespace.is_inert() {
            debug!(namespace = namespace.as_str(), "accepted inert opinion namespace, no-op");
            return Ok(());
        }

        match namespace {
            OpinionNamespace::ConversationAddTags => {
                let token = conversation_token(&opinion)?;
                let tags = string_list(&opinion, "tags");
                self.cache
                    .mutate(&token, |c| {
                        for tag in tags {
                            if !c.tags.contains(&tag) {
                                c.tags.push(tag);
                            }
                        }
                    })
                    .await?;
                self.record_provenance(&token, authenticated_user_display_name, authenticated_user_email)
                    .await?;
                self.cache.flush().await?;
            }
            OpinionNamespace::ConversationRemoveTags => {
                let token = conversation_token(&opinion)?;
                let tags = string_list(&opinion, "tags");
                self.cache
                    .mutate(&token, |c| c.tags.retain(|t| !tags.contains(t)))
                    .await?;
                self.record_provenance(&token, authenticated_user_display_name, authenticated_user_email)
                    .await?;
                self.cache.flush().await?;
            }
            OpinionNamespace::ConversationSetNotes => {
                let token = conversation_token(&opinion)?;
                let notes = opinion
                    .get("notes")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string();
                self.cache.mutate(&token, |c| c.notes = Some(notes)).await?;
                self.record_provenance(&token, authenticated_user_display_name, authenticated_user_email)
                    .await?;
                self.cache.flush().await?;
            }
            OpinionNamespace::SmsRawMsg => {
                let sms_raw: SmsRawPayload = serde_json::from_value(opinion)
                    .map_err(|e| CommandError::InvalidPayload(format!("sms_raw_msg: {e}")))?;
                self.ingest_sms(&sms_raw).await?;
            }
            OpinionNamespace::SuggestedReplies => {
                let id = opinion
                    .get("__id")
                    .and_then(Value::as_str)
                    .ok_or_else(|| CommandError::InvalidPayload("suggested reply opinion missing __id".to_string()))?
                    .to_string();
                let replies: Vec<String> = opinion
                    .get("replies")
                    .and_then(Value::as_array)
                    .map(|values| {
                        values
                            .iter()
                            .filter_map(|v| v.as_str().map(str::to_string))
                            .collect()
                    })
                    .unwrap_or_default();
                self.suggested_replies
                    .set(&id, SuggestedReplies { replies })
                    .await?;
            }
            _ => unreachable!("inert namespaces are handled above"),
        }

        Ok(())
    }

    /// Writes the authenticated-user fields the router injects onto every
    /// opinion into `demographics_info`, so the conversation document
    /// records who last touched it.
    async fn record_provenance(
        &self,
        token: &Token,
        authenticated_user_display_name: Option<String>,
        authenticated_user_email: Option<String>,
    ) -> Result<()> {
        if authenticated_user_display_name.is_none() && authenticated_user_email.is_none() {
            return Ok(());
        }
        self.cache
            .mutate(token, |c| {
                let demographics = c
                    .demographics_info
                    .as_object_mut()
                    .expect("demographics_info is always initialized as an object");
                if let Some(user) = &authenticated_user_display_name {
                    demographics.insert("last_opinion_user".to_string(), Value::String(user.clone()));
                }
                if let Some(email) = &authenticated_user_email {
                    demographics.insert(
                        "last_opinion_user_email".to_string(),
                        Value::String(email.clone()),
                    );
                }
            })
            .await?;
        Ok(())
    }

    async fn ingest_sms(&self, sms_raw: &SmsRawPayload) -> Result<()> {
        let token = &sms_raw.deidentified_phone_number;
        self.cache
            .mutate(token, |c| {
                c.messages.push(ConversationMessage {
                    id: Uuid::new_v4().to_string(),
                    datetime: sms_raw.created_on,
                    direction: sms_raw.direction.clone(),
                    text: sms_raw.text.clone(),
                    translation: None,
                    tags: Vec::new(),
                });
            })
            .await?;
        self.cache.flush().await?;
        metrics::counter!("command.sms_ingested_total").increment(1);
        info!(token = %token, "ingested inbound sms into conversation");
        Ok(())
    }
}

fn string_list(payload: &Value, key: &str) -> Vec<String> {
    payload
        .get(key)
        .and_then(Value::as_array)
        .map(|values| values.iter().filter_map(|v| v.as_str().map(str::to_string)).collect())
        .unwrap_or_default()
}

fn conversation_token(opinion: &Value) -> Result<Token> {
    opinion
        .get("deidentified_phone_number")
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| CommandError::InvalidPayload("opinion missing deidentified_phone_number".to_string()))
}
