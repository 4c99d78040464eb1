//! In-memory implementation of the document store.
//!
//! # Purpose
//! Implements [`DocumentStore`] with `HashMap`s guarded by a
//! `tokio::sync::RwLock`. It exists for local development, tests, and
//! deployments where durability is not required.
//!
//! # Durability and consistency
//! - **Not durable**: all indices are lost on process restart.
//! - **Single-process consistency**: every mutation happens under the write
//!   lock, so index creation is atomic (exactly one concurrent creator wins)
//!   and conditional puts observe the latest revision.
//! - Documents are visible as soon as `put` returns regardless of the refresh
//!   policy.
//!
//! # Revisions
//! Each index assigns a monotonically increasing `seq_no`. The primary term is
//! fixed for the lifetime of the store. Versions count writes per document,
//! starting at 1.
use super::{
    Acknowledged, CountQuery, DocumentStore, IndexMapping, PutRequest, PutResponse, ShardInfo,
    StoreError, StoreResult, StoredDocument, WriteResult,
};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

const PRIMARY_TERM: u64 = 1;

#[derive(Debug)]
struct IndexData {
    mapping: IndexMapping,
    docs: HashMap<String, StoredDocument>,
    next_seq_no: i64,
}

impl IndexData {
    fn new(mapping: IndexMapping) -> Self {
        Self {
            mapping,
            docs: HashMap::new(),
            next_seq_no: 0,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct InMemoryStore {
    indices: Arc<RwLock<HashMap<String, IndexData>>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current mapping of `index`, if it exists.
    pub async fn mapping(&self, index: &str) -> Option<IndexMapping> {
        self.indices
            .read()
            .await
            .get(index)
            .map(|data| data.mapping.clone())
    }

    pub async fn document_count(&self, index: &str) -> usize {
        self.indices
            .read()
            .await
            .get(index)
            .map(|data| data.docs.len())
            .unwrap_or(0)
    }
}

fn index_not_found(index: &str) -> StoreError {
    StoreError::NotFound(format!("no such index [{index}]"))
}

fn merge_properties(current: &mut serde_json::Value, incoming: &serde_json::Value) {
    match (current.as_object_mut(), incoming.as_object()) {
        (Some(current), Some(incoming)) => {
            for (key, value) in incoming {
                current.insert(key.clone(), value.clone());
            }
        }
        _ => *current = incoming.clone(),
    }
}

#[async_trait]
impl DocumentStore for InMemoryStore {
    async fn index_exists(&self, index: &str) -> StoreResult<bool> {
        Ok(self.indices.read().await.contains_key(index))
    }

    async fn create_index(&self, index: &str, mapping: &IndexMapping) -> StoreResult<Acknowledged> {
        let mut indices = self.indices.write().await;
        if indices.contains_key(index) {
            return Err(StoreError::AlreadyExists(format!("index [{index}]")));
        }
        indices.insert(index.to_string(), IndexData::new(mapping.clone()));
        tracing::debug!(
            index,
            schema_version = mapping.schema_version,
            "index created"
        );
        Ok(Acknowledged { acknowledged: true })
    }

    async fn put_mapping(&self, index: &str, mapping: &IndexMapping) -> StoreResult<Acknowledged> {
        let mut indices = self.indices.write().await;
        let data = indices
            .get_mut(index)
            .ok_or_else(|| index_not_found(index))?;
        // Upsert: fields absent from the new mapping are kept.
        merge_properties(&mut data.mapping.properties, &mapping.properties);
        data.mapping.schema_version = mapping.schema_version;
        Ok(Acknowledged { acknowledged: true })
    }

    async fn count(&self, index: &str, query: &CountQuery) -> StoreResult<u64> {
        let indices = self.indices.read().await;
        let data = indices.get(index).ok_or_else(|| index_not_found(index))?;
        Ok(data
            .docs
            .values()
            .filter(|doc| query.matches(&doc.source))
            .count() as u64)
    }

    async fn probe(&self, indices: &[String]) -> StoreResult<()> {
        let known = self.indices.read().await;
        // Wildcard expressions resolve to zero or more indices and never fail.
        for index in indices.iter().filter(|index| !index.contains('*')) {
            if !known.contains_key(index.as_str()) {
                return Err(index_not_found(index));
            }
        }
        Ok(())
    }

    async fn get(&self, index: &str, id: &str) -> StoreResult<Option<StoredDocument>> {
        let indices = self.indices.read().await;
        let data = indices.get(index).ok_or_else(|| index_not_found(index))?;
        Ok(data.docs.get(id).cloned())
    }

    async fn put(&self, request: PutRequest) -> StoreResult<PutResponse> {
        let mut indices = self.indices.write().await;
        let data = indices
            .get_mut(&request.index)
            .ok_or_else(|| index_not_found(&request.index))?;
        let id = request
            .id
            .unwrap_or_else(|| uuid::Uuid::new_v4().simple().to_string());
        let existing = data.docs.get(&id);

        if let Some(expected) = request.precondition {
            match existing {
                Some(doc) if doc.revision() == expected => {}
                Some(doc) => {
                    return Err(StoreError::Conflict(format!(
                        "[{id}]: required seqNo [{}], primary term [{}]. current document has seqNo [{}] and primary term [{}]",
                        expected.seq_no, expected.primary_term, doc.seq_no, doc.primary_term
                    )));
                }
                None => {
                    return Err(StoreError::Conflict(format!(
                        "[{id}]: required seqNo [{}], primary term [{}] but no document was found",
                        expected.seq_no, expected.primary_term
                    )));
                }
            }
        }

        let (version, result) = match existing {
            Some(doc) => (doc.version + 1, WriteResult::Updated),
            None => (1, WriteResult::Created),
        };
        let seq_no = data.next_seq_no;
        data.next_seq_no += 1;
        data.docs.insert(
            id.clone(),
            StoredDocument {
                id: id.clone(),
                version,
                seq_no,
                primary_term: PRIMARY_TERM,
                source: request.source,
            },
        );
        Ok(PutResponse {
            id,
            version,
            seq_no,
            primary_term: PRIMARY_TERM,
            result,
            shards: ShardInfo::all_successful(1),
        })
    }

    async fn health_check(&self) -> StoreResult<()> {
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}
