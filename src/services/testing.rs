use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use crate::services::memory::MemoryStore;
use crate::services::store::{SharedStore, StoreError};

/// Memory store with switchable faults
#[derive(Default)]
pub struct FaultyStore {
    pub inner: MemoryStore,
    failing_gets: AtomicBool,
    corrupted_key: Mutex<Option<String>>,
    unacknowledged_set: Mutex<Option<String>>,
}

impl FaultyStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every GET fail until switched off
    pub fn fail_gets(&self, failing: bool) {
        self.failing_gets.store(failing, Ordering::SeqCst);
    }

    /// GET on `key` returns a foreign value
    pub fn corrupt_reads_of(&self, key: &str) {
        *lock(&self.corrupted_key) = Some(key.to_string());
    }

    /// The next SET NX on `key` is applied but reported as failed, like a
    /// timeout after the server already wrote it
    pub fn drop_ack_for(&self, key: &str) {
        *lock(&self.unacknowledged_set) = Some(key.to_string());
    }
}

fn lock<T>(m: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn injected() -> StoreError {
    StoreError::RedisError(redis::RedisError::from((redis::ErrorKind::IoError, "connection reset")))
}

#[async_trait]
impl SharedStore for FaultyStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        if self.failing_gets.load(Ordering::SeqCst) {
            return Err(injected());
        }
        if lock(&self.corrupted_key).as_deref() == Some(key) {
            return Ok(Some("someone-else".to_string()));
        }
        self.inner.get(key).await
    }

    async fn set_if_absent(&self, key: &str, value: &str, ttl: Duration) -> Result<bool, StoreError> {
        let written = self.inner.set_if_absent(key, value, ttl).await?;
        let mut unacknowledged = lock(&self.unacknowledged_set);
        if unacknowledged.as_deref() == Some(key) {
            *unacknowledged = None;
            return Err(injected());
        }
        Ok(written)
    }

    async fn delete_if_equals(&self, key: &str, expected: &str) -> Result<bool, StoreError> {
        self.inner.delete_if_equals(key, expected).await
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        self.inner.delete(key).await
    }

    async fn push_back(&self, key: &str, value: &str) -> Result<usize, StoreError> {
        self.inner.push_back(key, value).await
    }

    async fn push_front(&self, key: &str, value: &str) -> Result<usize, StoreError> {
        self.inner.push_front(key, value).await
    }

    async fn pop_front(&self, key: &str) -> Result<Option<String>, StoreError> {
        self.inner.pop_front(key).await
    }

    async fn range(&self, key: &str, limit: usize) -> Result<Vec<String>, StoreError> {
        self.inner.range(key, limit).await
    }

    async fn remove_all(&self, key: &str, value: &str) -> Result<usize, StoreError> {
        self.inner.remove_all(key, value).await
    }

    async fn len(&self, key: &str) -> Result<usize, StoreError> {
        self.inner.len(key).await
    }

    async fn position(&self, key: &str, value: &str) -> Result<Option<usize>, StoreError> {
        self.inner.position(key, value).await
    }

    async fn trim_to_newest(&self, key: &str, max_len: usize) -> Result<(), StoreError> {
        self.inner.trim_to_newest(key, max_len).await
    }

    async fn expire(&self, key: &str, ttl: Duration) -> Result<(), StoreError> {
        self.inner.expire(key, ttl).await
    }

    async fn ping(&self) -> Result<(), StoreError> {
        self.inner.ping().await
    }
}
