//! Best-effort in-memory reverse index over the identity map collection.
//!
//! Populated by a one-time streamed scan of the whole collection. The
//! cache is never authoritative for creates: a cached-miss `resolve`
//! still goes through the transactional store path.

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{OnceCell, RwLock};
use tracing::debug;

use fc_common::{Token, Urn};

#[derive(Default)]
struct Maps {
    address_to_token: HashMap<Urn, Token>,
    token_to_address: HashMap<Token, Urn>,
}

/// Address<->token cache, rebuilt at most once per process.
pub struct IdentityCache {
    maps: RwLock<Maps>,
    loaded: OnceCell<()>,
}

impl IdentityCache {
    pub fn new() -> Self {
        Self {
            maps: RwLock::new(Maps::default()),
            loaded: OnceCell::new(),
        }
    }

    /// Ensure the full collection has been streamed into the cache exactly
    /// once. `load_all` is only invoked on the first call across the
    /// process lifetime.
    pub async fn ensure_loaded<F, Fut>(&self, load_all: F)
    where
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = Vec<(Urn, Token)>>,
    {
        self.loaded
            .get_or_init(|| async {
                let pairs = load_all().await;
                let mut maps = self.maps.write().await;
                for (address, token) in pairs {
                    maps.address_to_token.insert(address.clone(), token.clone());
                    maps.token_to_address.insert(token, address);
                }
                debug!(count = maps.address_to_token.len(), "Identity cache populated");
            })
            .await;
    }

    pub async fn get_token(&self, address: &Urn) -> Option<Token> {
        self.maps.read().await.address_to_token.get(address).cloned()
    }

    pub async fn get_address(&self, token: &Token) -> Option<Urn> {
        self.maps.read().await.token_to_address.get(token).cloned()
    }

    pub async fn insert(&self, address: Urn, token: Token) {
        let mut maps = self.maps.write().await;
        maps.address_to_token.insert(address.clone(), token.clone());
        maps.token_to_address.insert(token, address);
    }
}

impl Default for IdentityCache {
    fn default() -> Self {
        Self::new()
    }
}

pub type SharedIdentityCache = Arc<IdentityCache>;

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn ensure_loaded_only_runs_once() {
        let cache = IdentityCache::new();
        let calls = std::sync::Arc::new(std::sync::atomic::AtomicU32::new(0));

        for _ in 0..3 {
            let calls = calls.clone();
            cache
                .ensure_loaded(|| async move {
                    calls.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
                    vec![("tel:+1".to_string(), "tok-1".to_string())]
                })
                .await;
        }

        assert_eq!(calls.load(std::sync::atomic::Ordering::SeqCst), 1);
        assert_eq!(cache.get_token(&"tel:+1".to_string()).await, Some("tok-1".to_string()));
    }

    #[tokio::test]
    async fn insert_updates_both_directions() {
        let cache = IdentityCache::new();
        cache.insert("tel:+2".to_string(), "tok-2".to_string()).await;
        assert_eq!(cache.get_token(&"tel:+2".to_string()).await, Some("tok-2".to_string()));
        assert_eq!(cache.get_address(&"tok-2".to_string()).await, Some("tel:+2".to_string()));
    }
}
