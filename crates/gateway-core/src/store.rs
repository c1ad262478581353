//! Injected key-value store.
//!
//! All cross-request state (health records, rate-limit buckets, the inference
//! log and security events) lives behind [`KeyValueStore`]. Components take an
//! `Arc<dyn KeyValueStore>` so a shared backend can replace [`MemoryStore`]
//! without touching them.
//!
//! Primitives:
//! - plain values with optional TTL
//! - atomic compare-and-swap
//! - increment-with-TTL for fixed windows (TTL fixed at creation)
//! - append-only lists, capped in [`MemoryStore`] with the oldest entries dropped

use crate::error::GatewayError;
use async_trait::async_trait;
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::{HashMap, VecDeque};
use std::time::Duration;
use thiserror::Error;
use tokio::time::Instant;

/// Store operation errors
#[derive(Debug, Error)]
pub enum StoreError {
    /// Backend could not be reached or refused the operation
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    /// Value could not be (de)serialized
    #[error("Store serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl From<StoreError> for GatewayError {
    fn from(err: StoreError) -> Self {
        Self::Store {
            message: err.to_string(),
        }
    }
}

/// Result type for store operations
pub type StoreResult<T> = Result<T, StoreError>;

/// Counter state returned by [`KeyValueStore::increment`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowCount {
    /// Value after the increment
    pub count: u64,
    /// Time left before the counter expires
    pub expires_in: Duration,
}

/// Key-value store with the atomic primitives the gateway needs
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Get a value
    async fn get(&self, key: &str) -> StoreResult<Option<Vec<u8>>>;

    /// Set a value, optionally expiring after `ttl`
    async fn put(&self, key: &str, value: Vec<u8>, ttl: Option<Duration>) -> StoreResult<()>;

    /// Delete a key
    async fn delete(&self, key: &str) -> StoreResult<()>;

    /// Atomically replace the value at `key` if it currently equals `expected`.
    ///
    /// `expected == None` means "only if absent". Returns whether the swap
    /// happened.
    async fn compare_and_swap(
        &self,
        key: &str,
        expected: Option<&[u8]>,
        new: Vec<u8>,
    ) -> StoreResult<bool>;

    /// Atomically increment a counter.
    ///
    /// The TTL applies only when the counter is created; later increments
    /// never extend it.
    async fn increment(&self, key: &str, ttl: Duration) -> StoreResult<WindowCount>;

    /// Append to an append-only list
    async fn append(&self, key: &str, value: Vec<u8>) -> StoreResult<()>;

    /// Read an append-only list in insertion order
    async fn list(&self, key: &str) -> StoreResult<Vec<Vec<u8>>>;

    /// All live plain values whose key starts with `prefix`, sorted by key
    async fn scan_prefix(&self, prefix: &str) -> StoreResult<Vec<(String, Vec<u8>)>>;

    /// Backend name for logs
    fn name(&self) -> &'static str;
}

/// Read and deserialize a JSON value
///
/// # Errors
/// Returns an error if the backend fails or the stored bytes are not valid JSON for `T`
pub async fn get_json<T: DeserializeOwned>(
    store: &dyn KeyValueStore,
    key: &str,
) -> StoreResult<Option<T>> {
    match store.get(key).await? {
        Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
        None => Ok(None),
    }
}

/// Serialize and write a JSON value
///
/// # Errors
/// Returns an error if serialization or the backend write fails
pub async fn put_json<T: Serialize + Sync>(
    store: &dyn KeyValueStore,
    key: &str,
    value: &T,
    ttl: Option<Duration>,
) -> StoreResult<()> {
    let bytes = serde_json::to_vec(value)?;
    store.put(key, bytes, ttl).await
}

#[derive(Debug, Clone)]
struct Entry {
    value: Vec<u8>,
    expires_at: Option<Instant>,
}

impl Entry {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|at| now >= at)
    }
}

#[derive(Debug, Clone, Copy)]
struct Counter {
    count: u64,
    expires_at: Instant,
}

/// Default per-list cap for [`MemoryStore`]
pub const DEFAULT_LIST_CAPACITY: usize = 10_000;

#[derive(Debug, Default)]
struct MemoryState {
    values: HashMap<String, Entry>,
    counters: HashMap<String, Counter>,
    lists: HashMap<String, VecDeque<Vec<u8>>>,
    next_sweep: Option<Instant>,
}

impl MemoryState {
    /// Drop every expired value and counter
    fn sweep(&mut self, now: Instant) {
        self.values.retain(|_, e| !e.is_expired(now));
        self.counters.retain(|_, c| now < c.expires_at);
    }

    /// Sweep at most once per `period`
    fn sweep_due(&mut self, now: Instant, period: Duration) {
        if self.next_sweep.is_some_and(|at| now < at) {
            return;
        }
        self.sweep(now);
        self.next_sweep = Some(now + period);
    }

    fn live_value(&mut self, key: &str, now: Instant) -> Option<&Entry> {
        if self.values.get(key).is_some_and(|e| e.is_expired(now)) {
            self.values.remove(key);
        }
        self.values.get(key)
    }
}

/// In-process store.
///
/// Expiry uses tokio's clock, so `tokio::time::pause` and `advance` drive it
/// in tests. Every operation takes one short lock, which makes each primitive
/// atomic. Expired counters are swept once per window from `increment`, and
/// each list keeps at most `list_capacity` entries.
#[derive(Debug)]
pub struct MemoryStore {
    state: Mutex<MemoryState>,
    list_capacity: usize,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::with_list_capacity(DEFAULT_LIST_CAPACITY)
    }
}

impl MemoryStore {
    /// Create an empty store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty store whose lists keep the newest `capacity` entries
    #[must_use]
    pub fn with_list_capacity(capacity: usize) -> Self {
        Self {
            state: Mutex::new(MemoryState::default()),
            list_capacity: capacity.max(1),
        }
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, key: &str) -> StoreResult<Option<Vec<u8>>> {
        let now = Instant::now();
        let mut state = self.state.lock();
        Ok(state.live_value(key, now).map(|e| e.value.clone()))
    }

    async fn put(&self, key: &str, value: Vec<u8>, ttl: Option<Duration>) -> StoreResult<()> {
        let expires_at = ttl.map(|ttl| Instant::now() + ttl);
        self.state
            .lock()
            .values
            .insert(key.to_string(), Entry { value, expires_at });
        Ok(())
    }

    async fn delete(&self, key: &str) -> StoreResult<()> {
        let mut state = self.state.lock();
        state.values.remove(key);
        state.counters.remove(key);
        state.lists.remove(key);
        Ok(())
    }

    async fn compare_and_swap(
        &self,
        key: &str,
        expected: Option<&[u8]>,
        new: Vec<u8>,
    ) -> StoreResult<bool> {
        let now = Instant::now();
        let mut state = self.state.lock();
        let current = state.live_value(key, now).map(|e| e.value.as_slice());
        if current != expected {
            return Ok(false);
        }
        state.values.insert(
            key.to_string(),
            Entry {
                value: new,
                expires_at: None,
            },
        );
        Ok(true)
    }

    async fn increment(&self, key: &str, ttl: Duration) -> StoreResult<WindowCount> {
        let now = Instant::now();
        let mut state = self.state.lock();
        state.sweep_due(now, ttl);
        let counter = state
            .counters
            .entry(key.to_string())
            .and_modify(|c| {
                if now >= c.expires_at {
                    *c = Counter {
                        count: 0,
                        expires_at: now + ttl,
                    };
                }
            })
            .or_insert(Counter {
                count: 0,
                expires_at: now + ttl,
            });
        counter.count += 1;
        Ok(WindowCount {
            count: counter.count,
            expires_in: counter.expires_at.saturating_duration_since(now),
        })
    }

    async fn append(&self, key: &str, value: Vec<u8>) -> StoreResult<()> {
        let mut state = self.state.lock();
        let list = state.lists.entry(key.to_string()).or_default();
        if list.len() >= self.list_capacity {
            list.pop_front();
        }
        list.push_back(value);
        Ok(())
    }

    async fn list(&self, key: &str) -> StoreResult<Vec<Vec<u8>>> {
        Ok(self
            .state
            .lock()
            .lists
            .get(key)
            .map(|list| list.iter().cloned().collect())
            .unwrap_or_default())
    }

    async fn scan_prefix(&self, prefix: &str) -> StoreResult<Vec<(String, Vec<u8>)>> {
        let now = Instant::now();
        let mut state = self.state.lock();
        state.sweep(now);
        let mut found: Vec<(String, Vec<u8>)> = state
            .values
            .iter()
            .filter(|(k, _)| k.starts_with(prefix))
            .map(|(k, e)| (k.clone(), e.value.clone()))
            .collect();
        found.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(found)
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}
