//! Conversation document model and store.
//!
//! The conversation path is conceptually a sharded document-store
//! convention (`nook_conversation_shards/shard-0/conversations/<token>`);
//! here it is flattened into a single Mongo collection name so the same
//! transactional-collection idiom used by the identity map applies
//! unchanged. See DESIGN.md for the shard-path flattening note.

use async_trait::async_trait;
use bson::doc;
use chrono::{DateTime, Utc};
use fc_common::Token;
use mongodb::{Collection, Database};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConversationError {
    #[error("database error: {0}")]
    Database(#[from] mongodb::error::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] bson::ser::Error),

    #[error("deserialization error: {0}")]
    Deserialization(#[from] bson::de::Error),
}

pub type Result<T> = std::result::Result<T, ConversationError>;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationMessage {
    pub id: String,
    pub datetime: DateTime<Utc>,
    pub direction: String,
    pub text: String,
    #[serde(default)]
    pub translation: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Conversation {
    pub deidentified_phone_number: Token,
    #[serde(default)]
    pub demographics_info: serde_json::Value,
    #[serde(default)]
    pub messages: Vec<ConversationMessage>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub unread: bool,
}

impl Conversation {
    pub fn new(token: Token) -> Self {
        Self {
            deidentified_phone_number: token,
            demographics_info: serde_json::Value::Object(Default::default()),
            messages: Vec::new(),
            notes: None,
            tags: Vec::new(),
            unread: true,
        }
    }
}

#[async_trait]
pub trait ConversationStore: Send + Sync {
    async fn load(&self, token: &Token) -> Result<Conversation>;
    async fn save(&self, token: &Token, conversation: &Conversation) -> Result<()>;
}

pub struct MongoConversationStore {
    collection: Collection<bson::Document>,
}

impl MongoConversationStore {
    pub fn new(db: Database, collection_name: &str) -> Self {
        Self {
            collection: db.collection(collection_name),
        }
    }
}

#[async_trait]
impl ConversationStore for MongoConversationStore {
    async fn load(&self, token: &Token) -> Result<Conversation> {
        let found = self.collection.find_one(doc! { "_id": token }).await?;
        match found {
            Some(doc) => Ok(bson::from_document(doc)?),
            None => Ok(Conversation::new(token.clone())),
        }
    }

    async fn save(&self, token: &Token, conversation: &Conversation) -> Result<()> {
        let mut document = bson::to_document(conversation)?;
        document.insert("_id", token.clone());
        self.collection
            .replace_one(doc! { "_id": token }, document)
            .upsert(true)
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_conversation_starts_empty_and_unread() {
        let conversation = Conversation::new("tok-1".to_string());
        assert!(conversation.messages.is_empty());
        assert!(conversation.tags.is_empty());
        assert!(conversation.unread);
    }
}
