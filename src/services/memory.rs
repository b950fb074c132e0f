use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

use crate::services::store::{SharedStore, StoreError};

#[derive(Debug)]
enum Data {
    Value(String),
    List(VecDeque<String>),
}

#[derive(Debug)]
struct Entry {
    data: Data,
    expires_at: Option<Instant>,
}

impl Entry {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }
}

/// Operations between full sweeps for expired keys
const PURGE_EVERY: usize = 1024;

/// Single-process shared store with Redis semantics
///
/// Each operation runs under one lock, which gives the same single-key
/// atomicity the Redis store has. Expiry is evaluated on access, and every
/// [`PURGE_EVERY`] operations the whole map is swept so keys nobody reads
/// again (ended pairs, old recency lists) do not pile up.
/// Used for tests, benchmarks and `memory://` local runs; it does not
/// coordinate across processes.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, Entry>>,
    ops: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop every expired key now. Returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        let mut entries = self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        purge_all(&mut entries)
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, Entry>> {
        // A panic while holding the lock cannot leave an entry half-written
        let mut entries = self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        if self.ops.fetch_add(1, Ordering::Relaxed) % PURGE_EVERY == PURGE_EVERY - 1 {
            purge_all(&mut entries);
        }
        entries
    }
}

fn wrong_type(key: &str) -> StoreError {
    StoreError::InvalidValue {
        key: key.to_string(),
        message: "WRONGTYPE operation against a key holding the wrong kind of value".to_string(),
    }
}

/// Drop `key` if it has expired
fn purge(entries: &mut HashMap<String, Entry>, key: &str) {
    let now = Instant::now();
    if entries.get(key).is_some_and(|e| e.is_expired(now)) {
        entries.remove(key);
    }
}

fn purge_all(entries: &mut HashMap<String, Entry>) -> usize {
    let now = Instant::now();
    let before = entries.len();
    entries.retain(|_, e| !e.is_expired(now));
    before - entries.len()
}

fn list_mut<'a>(
    entries: &'a mut HashMap<String, Entry>,
    key: &str,
) -> Result<Option<&'a mut VecDeque<String>>, StoreError> {
    purge(entries, key);
    match entries.get_mut(key) {
        None => Ok(None),
        Some(Entry { data: Data::List(list), .. }) => Ok(Some(list)),
        Some(_) => Err(wrong_type(key)),
    }
}

fn list_or_create<'a>(
    entries: &'a mut HashMap<String, Entry>,
    key: &str,
) -> Result<&'a mut VecDeque<String>, StoreError> {
    purge(entries, key);
    let entry = entries.entry(key.to_string()).or_insert_with(|| Entry {
        data: Data::List(VecDeque::new()),
        expires_at: None,
    });
    match &mut entry.data {
        Data::List(list) => Ok(list),
        Data::Value(_) => Err(wrong_type(key)),
    }
}

/// Redis deletes a list key once its last element is gone
fn drop_if_empty(entries: &mut HashMap<String, Entry>, key: &str) {
    if matches!(entries.get(key), Some(Entry { data: Data::List(list), .. }) if list.is_empty()) {
        entries.remove(key);
    }
}

#[async_trait]
impl SharedStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let mut entries = self.lock();
        purge(&mut entries, key);
        match entries.get(key) {
            None => Ok(None),
            Some(Entry { data: Data::Value(v), .. }) => Ok(Some(v.clone())),
            Some(_) => Err(wrong_type(key)),
        }
    }

    async fn set_if_absent(&self, key: &str, value: &str, ttl: Duration) -> Result<bool, StoreError> {
        let mut entries = self.lock();
        purge(&mut entries, key);
        if entries.contains_key(key) {
            return Ok(false);
        }
        entries.insert(
            key.to_string(),
            Entry {
                data: Data::Value(value.to_string()),
                expires_at: Some(Instant::now() + ttl),
            },
        );
        Ok(true)
    }

    async fn delete_if_equals(&self, key: &str, expected: &str) -> Result<bool, StoreError> {
        let mut entries = self.lock();
        purge(&mut entries, key);
        let matches = matches!(entries.get(key), Some(Entry { data: Data::Value(v), .. }) if v == expected);
        if matches {
            entries.remove(key);
        }
        Ok(matches)
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        self.lock().remove(key);
        Ok(())
    }

    async fn push_back(&self, key: &str, value: &str) -> Result<usize, StoreError> {
        let mut entries = self.lock();
        let list = list_or_create(&mut entries, key)?;
        list.push_back(value.to_string());
        Ok(list.len())
    }

    async fn push_front(&self, key: &str, value: &str) -> Result<usize, StoreError> {
        let mut entries = self.lock();
        let list = list_or_create(&mut entries, key)?;
        list.push_front(value.to_string());
        Ok(list.len())
    }

    async fn pop_front(&self, key: &str) -> Result<Option<String>, StoreError> {
        let mut entries = self.lock();
        let popped = match list_mut(&mut entries, key)? {
            Some(list) => list.pop_front(),
            None => None,
        };
        drop_if_empty(&mut entries, key);
        Ok(popped)
    }

    async fn range(&self, key: &str, limit: usize) -> Result<Vec<String>, StoreError> {
        let mut entries = self.lock();
        Ok(list_mut(&mut entries, key)?
            .map(|list| list.iter().take(limit).cloned().collect())
            .unwrap_or_default())
    }

    async fn remove_all(&self, key: &str, value: &str) -> Result<usize, StoreError> {
        let mut entries = self.lock();
        let removed = match list_mut(&mut entries, key)? {
            Some(list) => {
                let before = list.len();
                list.retain(|v| v != value);
                before - list.len()
            }
            None => 0,
        };
        drop_if_empty(&mut entries, key);
        Ok(removed)
    }

    async fn len(&self, key: &str) -> Result<usize, StoreError> {
        let mut entries = self.lock();
        Ok(list_mut(&mut entries, key)?.map_or(0, |list| list.len()))
    }

    async fn position(&self, key: &str, value: &str) -> Result<Option<usize>, StoreError> {
        let mut entries = self.lock();
        Ok(list_mut(&mut entries, key)?.and_then(|list| list.iter().position(|v| v == value)))
    }

    async fn trim_to_newest(&self, key: &str, max_len: usize) -> Result<(), StoreError> {
        let mut entries = self.lock();
        if let Some(list) = list_mut(&mut entries, key)? {
            while list.len() > max_len {
                list.pop_front();
            }
        }
        drop_if_empty(&mut entries, key);
        Ok(())
    }

    async fn expire(&self, key: &str, ttl: Duration) -> Result<(), StoreError> {
        let mut entries = self.lock();
        purge(&mut entries, key);
        if let Some(entry) = entries.get_mut(key) {
            entry.expires_at = Some(Instant::now() + ttl);
        }
        Ok(())
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }
}
