//! Test doubles for the host layer

use async_trait::async_trait;
use std::collections::HashSet;
use tokio::sync::RwLock;

use crate::error::{AppError, AppResult};
use crate::ledger::world_state::{MemoryWorldState, WorldState};

/// In-memory world state whose writes to selected keys fail
pub struct FailingWorldState {
    inner: MemoryWorldState,
    failing_keys: RwLock<HashSet<String>>,
}

impl FailingWorldState {
    pub fn new() -> Self {
        Self {
            inner: MemoryWorldState::new(),
            failing_keys: RwLock::new(HashSet::new()),
        }
    }

    pub async fn fail_puts_to(&self, key: &str) {
        self.failing_keys.write().await.insert(key.to_string());
    }

    pub async fn heal(&self) {
        self.failing_keys.write().await.clear();
    }
}

#[async_trait]
impl WorldState for FailingWorldState {
    async fn get(&self, key: &str) -> AppResult<Option<Vec<u8>>> {
        self.inner.get(key).await
    }

    async fn put(&self, key: &str, value: Vec<u8>) -> AppResult<()> {
        if self.failing_keys.read().await.contains(key) {
            return Err(AppError::Storage(format!("injected write failure on '{}'", key)));
        }
        self.inner.put(key, value).await
    }

    async fn increment(&self, key: &str) -> AppResult<u64> {
        self.inner.increment(key).await
    }
}
