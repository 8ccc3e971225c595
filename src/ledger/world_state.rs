use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};
use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::{debug, error, warn};

use crate::error::{AppError, AppResult};

/// Durable key-value world state of a single ledger
///
/// Atomicity is guaranteed per key only. Writes spanning several keys go
/// through [`WriteSet`].
#[async_trait]
pub trait WorldState: Send + Sync {
    async fn get(&self, key: &str) -> AppResult<Option<Vec<u8>>>;

    async fn put(&self, key: &str, value: Vec<u8>) -> AppResult<()>;

    /// Atomically increment the integer stored under `key` (missing = 0)
    /// and return the new value
    async fn increment(&self, key: &str) -> AppResult<u64>;
}

/// In-memory world state
pub struct MemoryWorldState {
    entries: RwLock<HashMap<String, Vec<u8>>>,
}

impl MemoryWorldState {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
        }
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }
}

impl Default for MemoryWorldState {
    fn default() -> Self {
        Self::new()
    }
}

fn parse_counter(key: &str, bytes: &[u8]) -> AppResult<u64> {
    std::str::from_utf8(bytes)
        .ok()
        .and_then(|s| s.trim().parse::<u64>().ok())
        .ok_or_else(|| AppError::Storage(format!("Counter '{}' is not an integer", key)))
}

#[async_trait]
impl WorldState for MemoryWorldState {
    async fn get(&self, key: &str) -> AppResult<Option<Vec<u8>>> {
        let entries = self.entries.read().await;
        Ok(entries.get(key).cloned())
    }

    async fn put(&self, key: &str, value: Vec<u8>) -> AppResult<()> {
        let mut entries = self.entries.write().await;
        entries.insert(key.to_string(), value);
        Ok(())
    }

    async fn increment(&self, key: &str) -> AppResult<u64> {
        // Single write lock for read-increment-write
        let mut entries = self.entries.write().await;
        let current = match entries.get(key) {
            Some(bytes) => parse_counter(key, bytes)?,
            None => 0,
        };
        let next = current
            .checked_add(1)
            .ok_or_else(|| AppError::Storage(format!("Counter '{}' overflowed", key)))?;
        entries.insert(key.to_string(), next.to_string().into_bytes());
        Ok(next)
    }
}

/// Read and decode a record
pub async fn get_record<T: DeserializeOwned>(
    store: &dyn WorldState,
    key: &str,
) -> AppResult<Option<T>> {
    match store.get(key).await? {
        Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
        None => Ok(None),
    }
}

/// Encode and write a record
pub async fn put_record<T: Serialize>(store: &dyn WorldState, key: &str, record: &T) -> AppResult<()> {
    let bytes = serde_json::to_vec(record)?;
    store.put(key, bytes).await
}

/// Read the counter without advancing it
pub async fn read_counter(store: &dyn WorldState, key: &str) -> AppResult<u64> {
    match store.get(key).await? {
        Some(bytes) => parse_counter(key, &bytes),
        None => Ok(0),
    }
}

struct StagedWrite {
    key: String,
    before: Option<Vec<u8>>,
    after: Vec<u8>,
}

/// Ordered set of writes spanning several keys
///
/// Commits writes in staging order. When a write fails, every write already
/// applied is restored to its prior value, newest first. Keys that did not
/// exist before cannot be removed through the store interface and are left
/// in place; callers stage such keys first and reach them only through keys
/// staged after them.
pub struct WriteSet {
    writes: Vec<StagedWrite>,
}

impl WriteSet {
    pub fn new() -> Self {
        Self { writes: Vec::new() }
    }

    /// Stage a record, capturing the key's current value for compensation
    pub async fn stage<T: Serialize>(
        &mut self,
        store: &dyn WorldState,
        key: &str,
        record: &T,
    ) -> AppResult<()> {
        if self.writes.iter().any(|w| w.key == key) {
            return Err(AppError::Internal(format!(
                "Key '{}' staged twice in one write set",
                key
            )));
        }

        let before = store.get(key).await?;
        let after = serde_json::to_vec(record)?;
        self.writes.push(StagedWrite {
            key: key.to_string(),
            before,
            after,
        });
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.writes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.writes.is_empty()
    }

    pub async fn commit(self, store: &dyn WorldState) -> AppResult<()> {
        for (index, write) in self.writes.iter().enumerate() {
            if let Err(err) = store.put(&write.key, write.after.clone()).await {
                warn!(
                    "Write of '{}' failed after {} applied writes, compensating: {}",
                    write.key, index, err
                );
                Self::compensate(store, &self.writes[..index]).await;
                return Err(err);
            }
            debug!("Committed '{}'", write.key);
        }
        Ok(())
    }

    async fn compensate(store: &dyn WorldState, applied: &[StagedWrite]) {
        for write in applied.iter().rev() {
            let Some(before) = &write.before else {
                warn!("'{}' had no prior value; left in place", write.key);
                continue;
            };
            if let Err(err) = store.put(&write.key, before.clone()).await {
                error!(
                    "🚨 Compensation of '{}' failed, records diverged and need reconciliation: {}",
                    write.key, err
                );
            }
        }
    }
}

impl Default for WriteSet {
    fn default() -> Self {
        Self::new()
    }
}
