//! Provider health records and snapshots.
//!
//! The health monitor is the only writer; the routing selector reads a
//! [`HealthSnapshot`] taken at the start of each failover attempt.

use crate::store::{KeyValueStore, StoreError, StoreResult};
use crate::types::ProviderId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

/// Key prefix for health records
pub const HEALTH_KEY_PREFIX: &str = "health:";

/// Give up a compare-and-swap upsert after this many lost races
const MAX_CAS_RETRIES: usize = 8;

/// Last observed health of one provider
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthRecord {
    /// Provider the record describes
    pub provider_id: ProviderId,
    /// When the last probe completed
    pub last_checked_at: DateTime<Utc>,
    /// Whether the provider is considered healthy
    pub healthy: bool,
    /// Round-trip time of the last successful probe
    pub measured_latency_ms: Option<u64>,
    /// Failed probes since the last success
    pub consecutive_failures: u32,
}

impl HealthRecord {
    /// Record for a successful probe
    #[must_use]
    pub fn healthy(provider_id: ProviderId, latency: Duration, at: DateTime<Utc>) -> Self {
        Self {
            provider_id,
            last_checked_at: at,
            healthy: true,
            measured_latency_ms: Some(latency.as_millis() as u64),
            consecutive_failures: 0,
        }
    }

    /// Record for a provider that has failed `failures` probes in a row
    #[must_use]
    pub fn unhealthy(provider_id: ProviderId, failures: u32, at: DateTime<Utc>) -> Self {
        Self {
            provider_id,
            last_checked_at: at,
            healthy: false,
            measured_latency_ms: None,
            consecutive_failures: failures,
        }
    }

    /// Whether the record was checked within `freshness` of `now`
    #[must_use]
    pub fn is_fresh(&self, now: DateTime<Utc>, freshness: Duration) -> bool {
        let age = now.signed_duration_since(self.last_checked_at);
        chrono::Duration::from_std(freshness).map_or(true, |limit| age <= limit)
    }
}

/// Point-in-time view of every health record
#[derive(Debug, Clone, Default)]
pub struct HealthSnapshot {
    records: HashMap<ProviderId, HealthRecord>,
    taken_at: DateTime<Utc>,
}

impl HealthSnapshot {
    /// Build a snapshot from records, taken at `taken_at`
    #[must_use]
    pub fn new(records: impl IntoIterator<Item = HealthRecord>, taken_at: DateTime<Utc>) -> Self {
        Self {
            records: records
                .into_iter()
                .map(|r| (r.provider_id.clone(), r))
                .collect(),
            taken_at,
        }
    }

    /// Record for a provider
    #[must_use]
    pub fn get(&self, id: &ProviderId) -> Option<&HealthRecord> {
        self.records.get(id)
    }

    /// When the snapshot was taken
    #[must_use]
    pub fn taken_at(&self) -> DateTime<Utc> {
        self.taken_at
    }

    /// Whether a provider may be routed to: a record exists, is healthy, and
    /// is no older than `freshness`
    #[must_use]
    pub fn is_routable(&self, id: &ProviderId, freshness: Duration) -> bool {
        self.records
            .get(id)
            .is_some_and(|r| r.healthy && r.is_fresh(self.taken_at, freshness))
    }

    /// All records
    pub fn records(&self) -> impl Iterator<Item = &HealthRecord> {
        self.records.values()
    }
}

/// Typed access to health records in the shared store
#[derive(Clone)]
pub struct HealthStore {
    store: Arc<dyn KeyValueStore>,
}

impl std::fmt::Debug for HealthStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HealthStore")
            .field("backend", &self.store.name())
            .finish()
    }
}

impl HealthStore {
    /// Wrap a store
    #[must_use]
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    fn key(id: &ProviderId) -> String {
        format!("{HEALTH_KEY_PREFIX}{id}")
    }

    /// Read one record
    ///
    /// # Errors
    /// Returns an error if the store read or decoding fails
    pub async fn get(&self, id: &ProviderId) -> StoreResult<Option<HealthRecord>> {
        crate::store::get_json(self.store.as_ref(), &Self::key(id)).await
    }

    /// Read every record into a snapshot stamped with the current time.
    ///
    /// Undecodable records are skipped, leaving that provider unroutable.
    ///
    /// # Errors
    /// Returns an error if the store scan fails
    pub async fn snapshot(&self) -> StoreResult<HealthSnapshot> {
        let entries = self.store.scan_prefix(HEALTH_KEY_PREFIX).await?;
        let records = entries.into_iter().filter_map(|(key, bytes)| {
            serde_json::from_slice::<HealthRecord>(&bytes)
                .map_err(|e| tracing::warn!(key = %key, error = %e, "Skipping corrupt health record"))
                .ok()
        });
        Ok(HealthSnapshot::new(records, Utc::now()))
    }

    /// Atomically replace a record computed from the current one.
    ///
    /// `update` may run several times if another writer races us.
    ///
    /// # Errors
    /// Returns an error if the store fails or the race is lost too often
    pub async fn upsert<F>(&self, id: &ProviderId, update: F) -> StoreResult<HealthRecord>
    where
        F: Fn(Option<&HealthRecord>) -> HealthRecord + Send + Sync,
    {
        let key = Self::key(id);
        for _ in 0..MAX_CAS_RETRIES {
            let current_bytes = self.store.get(&key).await?;
            let current: Option<HealthRecord> = current_bytes
                .as_deref()
                .and_then(|b| serde_json::from_slice(b).ok());
            let next = update(current.as_ref());
            let encoded = serde_json::to_vec(&next)?;

            if self
                .store
                .compare_and_swap(&key, current_bytes.as_deref(), encoded)
                .await?
            {
                return Ok(next);
            }
            tracing::debug!(provider = %id, "Health record changed concurrently, retrying");
        }
        Err(StoreError::Unavailable(format!(
            "health record for {id} kept changing during update"
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    fn at(secs: i64) -> DateTime<Utc> {
        DateTime::from_timestamp(1_700_000_000 + secs, 0).unwrap()
    }

    #[test]
    fn test_routable_requires_fresh_healthy_record() {
        let freshness = Duration::from_secs(300);
        let snapshot = HealthSnapshot::new(
            vec![
                HealthRecord::healthy("fresh".into(), Duration::from_millis(20), at(0)),
                HealthRecord::healthy("stale".into(), Duration::from_millis(20), at(-301)),
                HealthRecord::unhealthy("down".into(), 1, at(0)),
            ],
            at(0),
        );

        assert!(snapshot.is_routable(&"fresh".into(), freshness));
        assert!(!snapshot.is_routable(&"stale".into(), freshness));
        assert!(!snapshot.is_routable(&"down".into(), freshness));
        assert!(!snapshot.is_routable(&"unknown".into(), freshness));
    }

    #[tokio::test]
    async fn test_upsert_and_snapshot() {
        let store = HealthStore::new(Arc::new(MemoryStore::new()));
        let id = ProviderId::new("local");

        let first = store
            .upsert(&id, |_| HealthRecord::unhealthy(id.clone(), 1, Utc::now()))
            .await
            .unwrap();
        assert_eq!(first.consecutive_failures, 1);

        let second = store
            .upsert(&id, |current| {
                let failures = current.map_or(0, |r| r.consecutive_failures) + 1;
                HealthRecord::unhealthy(id.clone(), failures, Utc::now())
            })
            .await
            .unwrap();
        assert_eq!(second.consecutive_failures, 2);

        let snapshot = store.snapshot().await.unwrap();
        assert_eq!(snapshot.get(&id).unwrap().consecutive_failures, 2);
        assert_eq!(snapshot.records().count(), 1);
    }
}
