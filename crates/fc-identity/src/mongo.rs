//! MongoDB-backed Identity Map.
//!
//! Storage model: a document collection keyed by address; each
//! document stores the token in the `uuid` field. Get-or-create runs inside
//! a multi-document transaction, same `start_session` / `start_transaction`
//! / commit-or-abort shape as the unit-of-work commit path elsewhere in
//! this tree, so two concurrent `resolve` calls for the same address
//! serialize and the second observes the first's write.

use async_trait::async_trait;
use bson::{doc, Document};
use futures::stream::TryStreamExt;
use mongodb::{Client, Collection, Database};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, error};

use fc_common::{Token, Urn};

use crate::cache::IdentityCache;
use crate::{generate_token, IdentityError, IdentityMap, IdentityMapConfig, Result};

pub struct MongoIdentityMap {
    client: Client,
    db: Database,
    config: IdentityMapConfig,
    cache: Arc<IdentityCache>,
}

impl MongoIdentityMap {
    pub fn new(client: Client, db: Database, config: IdentityMapConfig) -> Self {
        Self {
            client,
            db,
            config,
            cache: Arc::new(IdentityCache::new()),
        }
    }

    fn collection(&self) -> Collection<Document> {
        self.db.collection(&self.config.collection)
    }

    async fn ensure_cache_loaded(&self) {
        let collection = self.collection();
        self.cache
            .ensure_loaded(|| async move {
                let mut cursor = match collection.find(doc! {}).await {
                    Ok(c) => c,
                    Err(e) => {
                        error!(error = %e, "Failed to stream identity map for cache warmup");
                        return Vec::new();
                    }
                };
                let mut pairs = Vec::new();
                while let Ok(Some(doc)) = cursor.try_next().await {
                    if let (Ok(address), Ok(token)) = (doc.get_str("_id"), doc.get_str("uuid")) {
                        pairs.push((address.to_string(), token.to_string()));
                    }
                }
                pairs
            })
            .await;
    }

    /// Transactional get-or-create.
    async fn get_or_create(&self, address: &Urn) -> Result<(Token, bool)> {
        let collection = self.collection();
        let mut session = self.client.start_session().await?;
        session.start_transaction().await?;

        let existing = collection
            .find_one(doc! { "_id": address })
            .session(&mut session)
            .await?;

        if let Some(doc) = existing {
            session.commit_transaction().await?;
            let token = doc
                .get_str("uuid")
                .map_err(|_| IdentityError::NotFound(address.clone()))?
                .to_string();
            return Ok((token, false));
        }

        let token = generate_token(&self.config.token_prefix);
        let result = collection
            .update_one(
                doc! { "_id": address },
                doc! { "$setOnInsert": { "uuid": &token } },
            )
            .upsert(true)
            .session(&mut session)
            .await;

        if let Err(e) = result {
            let _ = session.abort_transaction().await;
            return Err(e.into());
        }

        session.commit_transaction().await?;
        debug!(address = %address, token = %token, "Created new identity mapping");
        metrics::counter!("identity.resolve_created_total").increment(1);
        Ok((token, true))
    }

    async fn lookup_direct(&self, token: &Token) -> Result<Urn> {
        let doc = self
            .collection()
            .find_one(doc! { "uuid": token })
            .await?
            .ok_or_else(|| IdentityError::NotFound(token.clone()))?;

        doc.get_str("_id")
            .map(|s| s.to_string())
            .map_err(|_| IdentityError::NotFound(token.clone()))
    }
}

#[async_trait]
impl IdentityMap for MongoIdentityMap {
    async fn resolve(&self, address: &Urn) -> Result<Token> {
        self.ensure_cache_loaded().await;
        metrics::counter!("identity.resolve_total").increment(1);

        if let Some(token) = self.cache.get_token(address).await {
            return Ok(token);
        }

        let (token, _created) = self.get_or_create(address).await?;
        self.cache.insert(address.clone(), token.clone()).await;
        Ok(token)
    }

    async fn resolve_batch(&self, addresses: &[Urn]) -> Result<HashMap<Urn, Token>> {
        let mut seen = HashMap::new();
        for address in addresses {
            if seen.contains_key(address) {
                continue;
            }
            let token = self.resolve(address).await?;
            seen.insert(address.clone(), token);
        }
        Ok(seen)
    }

    async fn lookup(&self, token: &Token) -> Result<Urn> {
        self.ensure_cache_loaded().await;

        if let Some(address) = self.cache.get_address(token).await {
            return Ok(address);
        }

        metrics::counter!("identity.lookup_miss_total").increment(1);
        let address = self.lookup_direct(token).await?;
        self.cache.insert(address.clone(), token.clone()).await;
        Ok(address)
    }

    async fn lookup_batch(&self, tokens: &[Token]) -> Result<HashMap<Token, Urn>> {
        let mut out = HashMap::with_capacity(tokens.len());
        for token in tokens {
            let address = self.lookup(token).await?;
            out.insert(token.clone(), address);
        }
        Ok(out)
    }
}
