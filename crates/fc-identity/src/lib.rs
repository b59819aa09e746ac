//! De-identification UUID table (Identity Map).
//!
//! Persistent bijective mapping between a raw recipient address (e.g.
//! `tel:+15551234567`) and an opaque de-identified token. Tokens are created
//! transactionally on first demand and never mutated afterward.

mod cache;
mod mongo;

pub use cache::IdentityCache;
pub use mongo::MongoIdentityMap;

use async_trait::async_trait;
use fc_common::{Token, Urn};
use std::collections::HashMap;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum IdentityError {
    #[error("database error: {0}")]
    Database(#[from] mongodb::error::Error),

    #[error("token not found: {0}")]
    NotFound(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] bson::ser::Error),
}

pub type Result<T> = std::result::Result<T, IdentityError>;

/// Table name and token prefix are configuration, not hardcoded, so multiple
/// identity tables can share the same code path.
#[derive(Debug, Clone)]
pub struct IdentityMapConfig {
    pub collection: String,
    pub token_prefix: String,
}

impl Default for IdentityMapConfig {
    fn default() -> Self {
        Self {
            collection: "uuid_table_mappings".to_string(),
            token_prefix: "nook-phone-uuid-".to_string(),
        }
    }
}

/// The Identity Map contract.
#[async_trait]
pub trait IdentityMap: Send + Sync {
    /// Returns the existing token for `address`, or atomically creates and
    /// persists a new one.
    async fn resolve(&self, address: &Urn) -> Result<Token>;

    /// Deduplicates `addresses` and returns a mapping for all of them.
    async fn resolve_batch(&self, addresses: &[Urn]) -> Result<HashMap<Urn, Token>>;

    /// Returns the address for `token`. Fails with `NotFound` if no mapping
    /// exists.
    async fn lookup(&self, token: &Token) -> Result<Urn>;

    /// All-or-nothing: fails with `NotFound` on any miss; partial results
    /// are never returned.
    async fn lookup_batch(&self, tokens: &[Token]) -> Result<HashMap<Token, Urn>>;
}

/// Generate a token as `prefix ‖ fresh 128-bit random`, rendered canonically
/// as a UUIDv4 string.
pub(crate) fn generate_token(prefix: &str) -> Token {
    format!("{prefix}{}", uuid::Uuid::new_v4())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_tokens_carry_the_configured_prefix() {
        let token = generate_token("nook-phone-uuid-");
        assert!(token.starts_with("nook-phone-uuid-"));
        assert_eq!(token.len(), "nook-phone-uuid-".len() + 36);
    }

    #[test]
    fn generated_tokens_are_unique() {
        let a = generate_token("p-");
        let b = generate_token("p-");
        assert_ne!(a, b);
    }
}
