//! Conversation cache: `load`/`mutate`/`flush`.
//!
//! One mutex guards the whole loaded-entries-plus-dirty-set state, and it
//! is held for the entire drain in `flush` — the same "hold the lock
//! across the whole batch" policy the transactional unit-of-work commit
//! path uses elsewhere in this tree, just over an in-memory map instead of
//! a Mongo session.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::debug;

use fc_common::Token;

use crate::conversation::{Conversation, ConversationStore, Result};

struct CacheState {
    entries: HashMap<Token, Conversation>,
    dirty: HashSet<Token>,
}

pub struct ConversationCache<S> {
    store: Arc<S>,
    state: tokio::sync::Mutex<CacheState>,
}

impl<S: ConversationStore> ConversationCache<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self {
            store,
            state: tokio::sync::Mutex::new(CacheState {
                entries: HashMap::new(),
                dirty: HashSet::new(),
            }),
        }
    }

    /// Loads `token`'s conversation into the cache if it isn't already
    /// present, applies `f`, and marks it dirty.
    pub async fn mutate<F>(&self, token: &Token, f: F) -> Result<()>
    where
        F: FnOnce(&mut Conversation),
    {
        let mut state = self.state.lock().await;
        if !state.entries.contains_key(token) {
            let loaded = self.store.load(token).await?;
            state.entries.insert(token.clone(), loaded);
        }
        let conversation = state
            .entries
            .get_mut(token)
            .expect("just inserted or already present");
        f(conversation);
        state.dirty.insert(token.clone());
        Ok(())
    }

    /// Writes back every dirty conversation and clears the dirty set.
    /// Safe to call after every `mutate`, or periodically from a batching
    /// caller — both are valid uses of this component.
    pub async fn flush(&self) -> Result<()> {
        let mut state = self.state.lock().await;
        let dirty: Vec<Token> = state.dirty.drain().collect();
        for token in dirty {
            if let Some(conversation) = state.entries.get(&token) {
                self.store.save(&token, conversation).await?;
            }
        }
        debug!("conversation cache flush complete");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex as StdMutex;

    struct RecordingStore {
        saved: StdMutex<Vec<(Token, Conversation)>>,
    }

    #[async_trait]
    impl ConversationStore for RecordingStore {
        async fn load(&self, token: &Token) -> Result<Conversation> {
            Ok(Conversation::new(token.clone()))
        }

        async fn save(&self, token: &Token, conversation: &Conversation) -> Result<()> {
            self.saved
                .lock()
                .unwrap()
                .push((token.clone(), conversation.clone()));
            Ok(())
        }
    }

    #[tokio::test]
    async fn flush_writes_back_only_dirty_entries() {
        let store = Arc::new(RecordingStore {
            saved: StdMutex::new(Vec::new()),
        });
        let cache = ConversationCache::new(store.clone());

        cache
            .mutate(&"tok-1".to_string(), |c| c.tags.push("urgent".to_string()))
            .await
            .unwrap();

        cache.flush().await.unwrap();

        let saved = store.saved.lock().unwrap();
        assert_eq!(saved.len(), 1);
        assert_eq!(saved[0].0, "tok-1");
        assert_eq!(saved[0].1.tags, vec!["urgent".to_string()]);
    }

    #[tokio::test]
    async fn second_flush_with_no_new_mutations_writes_nothing() {
        let store = Arc::new(RecordingStore {
            saved: StdMutex::new(Vec::new()),
        });
        let cache = ConversationCache::new(store.clone());

        cache
            .mutate(&"tok-1".to_string(), |c| c.notes = Some("hi".to_string()))
            .await
            .unwrap();
        cache.flush().await.unwrap();
        cache.flush().await.unwrap();

        assert_eq!(store.saved.lock().unwrap().len(), 1);
    }
}
