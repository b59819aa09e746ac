//! Suggested replies, stored under a `suggestedReplies/<id>` doc-store
//! namespace.
//!
//! Unlike tags/notes, suggested replies are written immediately rather than
//! through the buffered conversation cache — a reply suggestion is a
//! point-in-time computation the caller wants visible right away, not a
//! field on the conversation document that accumulates edits.

use async_trait::async_trait;
use bson::doc;
use fc_common::Token;
use mongodb::{Collection, Database};
use serde::{Deserialize, Serialize};

use crate::conversation::{ConversationError, Result};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuggestedReplies {
    pub replies: Vec<String>,
}

#[async_trait]
pub trait SuggestedRepliesStore: Send + Sync {
    async fn set(&self, id: &Token, replies: SuggestedReplies) -> Result<()>;
}

pub struct MongoSuggestedRepliesStore {
    collection: Collection<bson::Document>,
}

impl MongoSuggestedRepliesStore {
    pub fn new(db: Database, collection_name: &str) -> Self {
        Self {
            collection: db.collection(collection_name),
        }
    }
}

#[async_trait]
impl SuggestedRepliesStore for MongoSuggestedRepliesStore {
    async fn set(&self, id: &Token, replies: SuggestedReplies) -> Result<()> {
        let mut document = bson::to_document(&replies).map_err(ConversationError::Serialization)?;
        document.insert("_id", id.clone());
        self.collection
            .replace_one(doc! { "_id": id }, document)
            .upsert(true)
            .await
            .map_err(ConversationError::Database)?;
        Ok(())
    }
}
