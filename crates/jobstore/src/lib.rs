//! Document store boundary for scheduled-job definitions.
//!
//! # Purpose
//! Describes the small set of document-store primitives the monitor admission
//! workflow relies on: index provisioning, bounded counts, access probes,
//! get-by-id, and conditional puts with optimistic-concurrency preconditions.
//!
//! # Notes
//! Backends implement [`DocumentStore`]. The in-memory backend in [`memory`]
//! is used for local development and tests; it is not durable.
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub mod memory;
pub mod query;

pub use query::{CountQuery, Filter};

/// Sequence number carried by a write that expects no prior version.
pub const UNASSIGNED_SEQ_NO: i64 = -2;
/// Primary term carried by a write that expects no prior version.
pub const UNASSIGNED_PRIMARY_TERM: u64 = 0;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("not found: {0}")]
    NotFound(String),
    #[error("version conflict: {0}")]
    Conflict(String),
    #[error("already exists: {0}")]
    AlreadyExists(String),
    #[error("forbidden: {0}")]
    Forbidden(String),
    #[error("timed out: {0}")]
    Timeout(String),
    #[error(transparent)]
    Unexpected(#[from] anyhow::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Optimistic-concurrency token identifying the last observed revision of a
/// document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeqNoPrimaryTerm {
    pub seq_no: i64,
    pub primary_term: u64,
}

impl SeqNoPrimaryTerm {
    pub const UNASSIGNED: Self = Self {
        seq_no: UNASSIGNED_SEQ_NO,
        primary_term: UNASSIGNED_PRIMARY_TERM,
    };

    pub fn new(seq_no: i64, primary_term: u64) -> Self {
        Self {
            seq_no,
            primary_term,
        }
    }

    /// True when the caller supplied anything other than the "no prior
    /// version" sentinel.
    pub fn is_assigned(&self) -> bool {
        *self != Self::UNASSIGNED
    }
}

impl Default for SeqNoPrimaryTerm {
    fn default() -> Self {
        Self::UNASSIGNED
    }
}

/// Visibility hint passed through to the store on writes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum RefreshPolicy {
    #[default]
    #[serde(rename = "false")]
    None,
    #[serde(rename = "true")]
    Immediate,
    #[serde(rename = "wait_for")]
    WaitUntil,
}

impl RefreshPolicy {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "" | "true" => Some(Self::Immediate),
            "false" => Some(Self::None),
            "wait_for" => Some(Self::WaitUntil),
            _ => None,
        }
    }
}

/// Mapping applied when an index is created or its schema is upgraded.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IndexMapping {
    pub schema_version: u32,
    pub properties: serde_json::Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Acknowledged {
    pub acknowledged: bool,
}

/// A document as last persisted, with the revision metadata needed for
/// conditional writes.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredDocument {
    pub id: String,
    pub version: u64,
    pub seq_no: i64,
    pub primary_term: u64,
    pub source: serde_json::Value,
}

impl StoredDocument {
    pub fn revision(&self) -> SeqNoPrimaryTerm {
        SeqNoPrimaryTerm::new(self.seq_no, self.primary_term)
    }
}

#[derive(Debug, Clone)]
pub struct PutRequest {
    pub index: String,
    /// Generated by the store when absent.
    pub id: Option<String>,
    pub source: serde_json::Value,
    pub precondition: Option<SeqNoPrimaryTerm>,
    pub refresh: RefreshPolicy,
}

impl PutRequest {
    pub fn new(index: impl Into<String>, source: serde_json::Value) -> Self {
        Self {
            index: index.into(),
            id: None,
            source,
            precondition: None,
            refresh: RefreshPolicy::default(),
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_precondition(mut self, precondition: Option<SeqNoPrimaryTerm>) -> Self {
        self.precondition = precondition;
        self
    }

    pub fn with_refresh(mut self, refresh: RefreshPolicy) -> Self {
        self.refresh = refresh;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WriteResult {
    Created,
    Updated,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShardFailure {
    pub shard: u32,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShardInfo {
    pub total: u32,
    pub successful: u32,
    pub failed: u32,
    pub failures: Vec<ShardFailure>,
}

impl ShardInfo {
    pub fn all_successful(total: u32) -> Self {
        Self {
            total,
            successful: total,
            failed: 0,
            failures: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PutResponse {
    pub id: String,
    pub version: u64,
    pub seq_no: i64,
    pub primary_term: u64,
    pub result: WriteResult,
    pub shards: ShardInfo,
}

#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn index_exists(&self, index: &str) -> StoreResult<bool>;
    /// Fails with [`StoreError::AlreadyExists`] when the index was created
    /// concurrently; exactly one creation wins.
    async fn create_index(&self, index: &str, mapping: &IndexMapping) -> StoreResult<Acknowledged>;
    async fn put_mapping(&self, index: &str, mapping: &IndexMapping) -> StoreResult<Acknowledged>;
    async fn count(&self, index: &str, query: &CountQuery) -> StoreResult<u64>;
    /// Zero-size read against `indices`, used to confirm read access.
    async fn probe(&self, indices: &[String]) -> StoreResult<()>;
    async fn get(&self, index: &str, id: &str) -> StoreResult<Option<StoredDocument>>;
    async fn put(&self, request: PutRequest) -> StoreResult<PutResponse>;

    async fn health_check(&self) -> StoreResult<()>;
    fn backend_name(&self) -> &'static str;
}
