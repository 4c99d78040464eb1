#![allow(dead_code)]

use async_trait::async_trait;
use jobstore::memory::InMemoryStore;
use jobstore::{
    Acknowledged, CountQuery, DocumentStore, IndexMapping, PutRequest, PutResponse, ShardFailure,
    ShardInfo, StoreError, StoreResult, StoredDocument,
};
use monitors::admission::SCHEDULED_JOBS_INDEX;
use monitors::model::document::destination_to_source;
use monitors::model::{Action, Destination, Monitor, Throttle, ThrottleUnit, Trigger};
use std::collections::HashSet;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

pub async fn read_json(response: axum::response::Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body");
    serde_json::from_slice(&bytes).expect("json")
}

/// Per-operation call counters.
#[derive(Debug, Default)]
pub struct Calls {
    pub index_exists: AtomicUsize,
    pub create_index: AtomicUsize,
    pub put_mapping: AtomicUsize,
    pub count: AtomicUsize,
    pub probe: AtomicUsize,
    pub get: AtomicUsize,
    pub put: AtomicUsize,
}

impl Calls {
    pub fn of(counter: &AtomicUsize) -> usize {
        counter.load(Ordering::SeqCst)
    }
}

/// Faults injected into the wrapped store.
#[derive(Debug, Default)]
pub struct Faults {
    pub count_override: Option<u64>,
    pub shard_failures: Vec<String>,
    pub create_delay: Option<Duration>,
    pub get_delay: Option<Duration>,
    pub unacknowledged_create: bool,
    pub failing_create: bool,
    pub unacknowledged_mapping: bool,
    pub failing_mapping: bool,
    pub denied_indices: HashSet<String>,
    pub failing_gets: HashSet<String>,
}

/// In-memory store wrapper that counts calls and injects faults.
#[derive(Default)]
pub struct InstrumentedStore {
    inner: InMemoryStore,
    pub calls: Calls,
    faults: Mutex<Faults>,
}

impl InstrumentedStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn inner(&self) -> &InMemoryStore {
        &self.inner
    }

    pub fn faults(&self, change: impl FnOnce(&mut Faults)) {
        change(&mut *self.faults.lock().expect("faults"));
    }

    fn with_faults<T>(&self, read: impl FnOnce(&Faults) -> T) -> T {
        read(&*self.faults.lock().expect("faults"))
    }

    pub fn writes(&self) -> usize {
        Calls::of(&self.calls.put)
    }

    pub fn provisioning_calls(&self) -> usize {
        Calls::of(&self.calls.create_index) + Calls::of(&self.calls.put_mapping)
    }
}

#[async_trait]
impl DocumentStore for InstrumentedStore {
    async fn index_exists(&self, index: &str) -> StoreResult<bool> {
        self.calls.index_exists.fetch_add(1, Ordering::SeqCst);
        self.inner.index_exists(index).await
    }

    async fn create_index(&self, index: &str, mapping: &IndexMapping) -> StoreResult<Acknowledged> {
        self.calls.create_index.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.with_faults(|faults| faults.create_delay) {
            tokio::time::sleep(delay).await;
        }
        if self.with_faults(|faults| faults.failing_create) {
            return Err(StoreError::Unexpected(anyhow::anyhow!(
                "cluster block on [{index}]"
            )));
        }
        if self.with_faults(|faults| faults.unacknowledged_create) {
            return Ok(Acknowledged {
                acknowledged: false,
            });
        }
        self.inner.create_index(index, mapping).await
    }

    async fn put_mapping(&self, index: &str, mapping: &IndexMapping) -> StoreResult<Acknowledged> {
        self.calls.put_mapping.fetch_add(1, Ordering::SeqCst);
        if self.with_faults(|faults| faults.failing_mapping) {
            return Err(StoreError::Unexpected(anyhow::anyhow!(
                "mapper conflict on [{index}]"
            )));
        }
        if self.with_faults(|faults| faults.unacknowledged_mapping) {
            return Ok(Acknowledged {
                acknowledged: false,
            });
        }
        self.inner.put_mapping(index, mapping).await
    }

    async fn count(&self, index: &str, query: &CountQuery) -> StoreResult<u64> {
        self.calls.count.fetch_add(1, Ordering::SeqCst);
        match self.with_faults(|faults| faults.count_override) {
            Some(count) => Ok(count),
            None => self.inner.count(index, query).await,
        }
    }

    async fn probe(&self, indices: &[String]) -> StoreResult<()> {
        self.calls.probe.fetch_add(1, Ordering::SeqCst);
        let denied = self.with_faults(|faults| {
            indices
                .iter()
                .find(|index| faults.denied_indices.contains(index.as_str()))
                .cloned()
        });
        if let Some(index) = denied {
            return Err(StoreError::Forbidden(format!(
                "no permissions for [indices:data/read/search] on [{index}]"
            )));
        }
        Ok(())
    }

    async fn get(&self, index: &str, id: &str) -> StoreResult<Option<StoredDocument>> {
        self.calls.get.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.with_faults(|faults| faults.get_delay) {
            tokio::time::sleep(delay).await;
        }
        if self.with_faults(|faults| faults.failing_gets.contains(id)) {
            return Err(StoreError::Unexpected(anyhow::anyhow!(
                "shard unavailable for [{id}]"
            )));
        }
        self.inner.get(index, id).await
    }

    async fn put(&self, request: PutRequest) -> StoreResult<PutResponse> {
        self.calls.put.fetch_add(1, Ordering::SeqCst);
        let mut response = self.inner.put(request).await?;
        let reasons = self.with_faults(|faults| faults.shard_failures.clone());
        if !reasons.is_empty() {
            let total = reasons.len() as u32 + 1;
            response.shards = ShardInfo {
                total,
                successful: 1,
                failed: reasons.len() as u32,
                failures: reasons
                    .into_iter()
                    .enumerate()
                    .map(|(shard, reason)| ShardFailure {
                        shard: shard as u32 + 1,
                        reason,
                    })
                    .collect(),
            };
        }
        Ok(response)
    }

    async fn health_check(&self) -> StoreResult<()> {
        self.inner.health_check().await
    }

    fn backend_name(&self) -> &'static str {
        "instrumented-memory"
    }
}

pub fn throttled_action(name: &str, value: u64, unit: ThrottleUnit) -> Action {
    Action {
        name: name.to_string(),
        throttle_enabled: true,
        throttle: Some(Throttle::new(value, unit)),
        ..Action::default()
    }
}

pub fn destination_action(name: &str, destination_id: &str) -> Action {
    Action {
        name: name.to_string(),
        destination_id: Some(destination_id.to_string()),
        ..Action::default()
    }
}

pub fn sample_monitor(name: &str, actions: Vec<Action>) -> Monitor {
    Monitor {
        name: name.to_string(),
        enabled: true,
        enabled_time: Some(1_700_000_000_000),
        triggers: vec![Trigger {
            name: "errors-high".to_string(),
            severity: "1".to_string(),
            condition: serde_json::json!({"script": "ctx.results[0].hits.total > 0"}),
            actions,
        }],
        ..Monitor::default()
    }
}

/// Create the scheduled-jobs index (as an older process would have) and store
/// a destination document under `id`.
pub async fn seed_destination(store: &InMemoryStore, id: &str, destination_type: &str) {
    if !store
        .index_exists(SCHEDULED_JOBS_INDEX)
        .await
        .expect("exists")
    {
        store
            .create_index(SCHEDULED_JOBS_INDEX, &IndexMapping::default())
            .await
            .expect("index");
    }
    let source = destination_to_source(&Destination {
        name: id.to_string(),
        destination_type: destination_type.to_string(),
    })
    .expect("encode destination");
    store
        .put(PutRequest::new(SCHEDULED_JOBS_INDEX, source).with_id(id))
        .await
        .expect("seed destination");
}
