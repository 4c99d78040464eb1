//! Admission request and response shapes.
use super::Monitor;
use jobstore::{RefreshPolicy, SeqNoPrimaryTerm};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use utoipa::ToSchema;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteOperation {
    Create,
    Update { monitor_id: String },
}

impl WriteOperation {
    pub fn name(&self) -> &'static str {
        match self {
            WriteOperation::Create => "create",
            WriteOperation::Update { .. } => "update",
        }
    }
}

/// Caller intent for one admission attempt.
#[derive(Debug, Clone)]
pub struct MonitorRequest {
    pub operation: WriteOperation,
    pub monitor: Monitor,
    /// Revision the caller last observed; unassigned means "no prior version
    /// expected".
    pub revision: SeqNoPrimaryTerm,
    pub refresh: RefreshPolicy,
    /// Overrides the live request timeout for read-side store calls.
    pub timeout: Option<Duration>,
}

impl MonitorRequest {
    pub fn create(monitor: Monitor) -> Self {
        Self {
            operation: WriteOperation::Create,
            monitor,
            revision: SeqNoPrimaryTerm::UNASSIGNED,
            refresh: RefreshPolicy::default(),
            timeout: None,
        }
    }

    pub fn update(monitor_id: impl Into<String>, monitor: Monitor) -> Self {
        Self {
            operation: WriteOperation::Update {
                monitor_id: monitor_id.into(),
            },
            ..Self::create(monitor)
        }
    }

    pub fn with_revision(mut self, revision: SeqNoPrimaryTerm) -> Self {
        self.revision = revision;
        self
    }

    pub fn with_refresh(mut self, refresh: RefreshPolicy) -> Self {
        self.refresh = refresh;
        self
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn monitor_id(&self) -> Option<&str> {
        match &self.operation {
            WriteOperation::Create => None,
            WriteOperation::Update { monitor_id } => Some(monitor_id),
        }
    }
}

// Both branches answer `created`; callers tell updates apart by the HTTP
// status of the route they called.
#[derive(Debug, Serialize, Deserialize, ToSchema, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ResponseStatus {
    Created,
}

#[derive(Debug, Serialize, Deserialize, ToSchema, Clone, PartialEq)]
pub struct IndexMonitorResponse {
    pub id: String,
    pub version: u64,
    pub seq_no: i64,
    pub primary_term: u64,
    pub status: ResponseStatus,
    pub monitor: Monitor,
}
