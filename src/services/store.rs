use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

use crate::models::{ParticipantId, Tier};

/// Errors that can occur with shared store operations
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Redis error: {0}")]
    RedisError(#[from] redis::RedisError),

    #[error("Unexpected value at {key}: {message}")]
    InvalidValue { key: String, message: String },
}

/// Shared key-value store used as the sole coordination point between matchers
///
/// Every method is a single-key operation and must be atomic on its own.
/// Nothing here spans more than one key; callers that need multi-key
/// consistency have to build it from these primitives.
#[async_trait]
pub trait SharedStore: Send + Sync {
    /// GET
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    /// SET key value NX PX ttl. Returns true if the key was written.
    async fn set_if_absent(&self, key: &str, value: &str, ttl: Duration) -> Result<bool, StoreError>;

    /// Delete `key` only if it currently holds `expected`. Returns true if deleted.
    async fn delete_if_equals(&self, key: &str, expected: &str) -> Result<bool, StoreError>;

    /// DEL
    async fn delete(&self, key: &str) -> Result<(), StoreError>;

    /// RPUSH (append to the tail)
    async fn push_back(&self, key: &str, value: &str) -> Result<usize, StoreError>;

    /// LPUSH (prepend to the head)
    async fn push_front(&self, key: &str, value: &str) -> Result<usize, StoreError>;

    /// LPOP (remove from the head)
    async fn pop_front(&self, key: &str) -> Result<Option<String>, StoreError>;

    /// LRANGE key 0 limit-1. A limit of `usize::MAX` returns the whole list.
    async fn range(&self, key: &str, limit: usize) -> Result<Vec<String>, StoreError>;

    /// LREM key 0 value. Returns the number of removed entries.
    async fn remove_all(&self, key: &str, value: &str) -> Result<usize, StoreError>;

    /// LLEN
    async fn len(&self, key: &str) -> Result<usize, StoreError>;

    /// LPOS
    async fn position(&self, key: &str, value: &str) -> Result<Option<usize>, StoreError>;

    /// LTRIM key -max_len -1 (keep the newest `max_len` entries)
    async fn trim_to_newest(&self, key: &str, max_len: usize) -> Result<(), StoreError>;

    /// PEXPIRE
    async fn expire(&self, key: &str, ttl: Duration) -> Result<(), StoreError>;

    /// PING
    async fn ping(&self) -> Result<(), StoreError>;
}

/// Store key builder
///
/// Keys follow `queue:<tier>`, `pair:<id>` and `recent:<id>`, optionally
/// namespaced by a prefix (`<prefix>:queue:free`).
#[derive(Debug, Clone, Default)]
pub struct StoreKey {
    prefix: Option<String>,
}

impl StoreKey {
    pub fn new(prefix: Option<String>) -> Self {
        let prefix = prefix.filter(|p| !p.is_empty());
        Self { prefix }
    }

    fn build(&self, kind: &str, name: &str) -> String {
        match &self.prefix {
            Some(prefix) => format!("{}:{}:{}", prefix, kind, name),
            None => format!("{}:{}", kind, name),
        }
    }

    /// Build the key for a tier's waiting list
    pub fn queue(&self, tier: Tier) -> String {
        self.build("queue", tier.as_str())
    }

    /// Build the key for a participant's pair entry
    pub fn pair(&self, id: &ParticipantId) -> String {
        self.build("pair", id.as_str())
    }

    /// Build the key for a participant's recent partner list
    pub fn recent(&self, id: &ParticipantId) -> String {
        self.build("recent", id.as_str())
    }
}
