//! Scheduled-jobs index provisioning.
//!
//! # Purpose
//! Makes sure the scheduled-jobs index exists with the current mapping before
//! any monitor is written.
//!
//! # Key invariants
//! - [`IndexState`] starts not-ready and flips to ready at most once per
//!   process, after the store acknowledged a create or a mapping update.
//! - There is no lock around provisioning. Two first requests may both try to
//!   create the index; the store lets exactly one win and the loser re-enters
//!   as if the index had already existed.
use super::{AdmissionError, bounded};
use jobstore::{DocumentStore, IndexMapping, StoreError};
use serde_json::json;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

pub const SCHEDULED_JOBS_INDEX: &str = ".scheduled-jobs";
/// Mapping generation stamped on every monitor written by this process.
pub const SCHEMA_VERSION: u32 = 5;

pub fn scheduled_jobs_mapping() -> IndexMapping {
    IndexMapping {
        schema_version: SCHEMA_VERSION,
        properties: json!({
            "type": { "type": "keyword" },
            "monitor": {
                "dynamic": false,
                "properties": {
                    "name": { "type": "text", "fields": { "keyword": { "type": "keyword" } } },
                    "enabled": { "type": "boolean" },
                    "enabled_time": { "type": "date", "format": "epoch_millis" },
                    "schema_version": { "type": "integer" },
                    "inputs": { "type": "nested" },
                    "triggers": { "type": "nested" }
                }
            },
            "destination": {
                "dynamic": false,
                "properties": {
                    "name": { "type": "keyword" },
                    "type": { "type": "keyword" }
                }
            }
        }),
    }
}

/// Process-wide record of whether the index mapping is known to be current.
#[derive(Debug, Default)]
pub struct IndexState {
    ready: AtomicBool,
}

impl IndexState {
    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::Acquire)
    }

    /// Returns true for the call that performed the transition.
    fn mark_ready(&self) -> bool {
        !self.ready.swap(true, Ordering::AcqRel)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Readiness {
    /// Index exists and its mapping is current; continue.
    Ready,
    /// The index was just created or its mapping updated; the workflow
    /// re-enters readiness before continuing.
    Provisioned,
}

pub struct IndexReadiness<'a> {
    store: &'a dyn DocumentStore,
    state: &'a IndexState,
    index: &'a str,
}

impl<'a> IndexReadiness<'a> {
    pub fn new(store: &'a dyn DocumentStore, state: &'a IndexState, index: &'a str) -> Self {
        Self {
            store,
            state,
            index,
        }
    }

    pub async fn ensure_ready(&self, timeout: Duration) -> Result<Readiness, AdmissionError> {
        let exists = bounded(
            timeout,
            "index existence check",
            self.store.index_exists(self.index),
        )
        .await
        .map_err(|err| AdmissionError::store("failed to check scheduled jobs index", err))?;

        if !exists {
            return self.create(timeout).await;
        }
        if !self.state.is_ready() {
            return self.update_mapping(timeout).await;
        }
        Ok(Readiness::Ready)
    }

    async fn create(&self, timeout: Duration) -> Result<Readiness, AdmissionError> {
        let mapping = scheduled_jobs_mapping();
        let created = bounded(
            timeout,
            "create index",
            self.store.create_index(self.index, &mapping),
        )
        .await;
        match created {
            Ok(ack) if ack.acknowledged => {
                self.mark_ready("created");
                Ok(Readiness::Provisioned)
            }
            Ok(_) => Err(AdmissionError::Internal(format!(
                "Create {} mappings call not acknowledged.",
                self.index
            ))),
            Err(StoreError::AlreadyExists(_)) => {
                tracing::debug!(index = self.index, "index created by a concurrent request");
                Ok(Readiness::Provisioned)
            }
            Err(err) => Err(AdmissionError::store(
                format!("failed to create {}", self.index),
                err,
            )),
        }
    }

    async fn update_mapping(&self, timeout: Duration) -> Result<Readiness, AdmissionError> {
        let mapping = scheduled_jobs_mapping();
        let updated = bounded(
            timeout,
            "update mapping",
            self.store.put_mapping(self.index, &mapping),
        )
        .await;
        match updated {
            Ok(ack) if ack.acknowledged => {
                self.mark_ready("mapping_updated");
                Ok(Readiness::Provisioned)
            }
            Ok(_) => Err(AdmissionError::Internal(format!(
                "Update {} mappings call not acknowledged.",
                self.index
            ))),
            Err(err) => Err(AdmissionError::store(
                format!("failed to update {} mappings", self.index),
                err,
            )),
        }
    }

    fn mark_ready(&self, how: &'static str) {
        if self.state.mark_ready() {
            tracing::info!(
                index = self.index,
                schema_version = SCHEMA_VERSION,
                how,
                "scheduled jobs index ready"
            );
            metrics::counter!("monitor_index_provisioned_total", "how" => how).increment(1);
        }
    }
}
