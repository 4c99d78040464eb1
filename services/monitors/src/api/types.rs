//! HTTP API request/response types.
//!
//! # Purpose
//! Defines payload shapes for the monitor REST API and OpenAPI schema
//! generation.
use crate::model::Monitor;
use jobstore::{RefreshPolicy, SeqNoPrimaryTerm};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use utoipa::ToSchema;

#[derive(Debug, Serialize, Deserialize, ToSchema, Clone)]
pub struct HealthStatus {
    pub status: String,
    pub backend: String,
    pub index_ready: bool,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    pub code: String,
    pub message: String,
    /// Offending index names or destination type for `forbidden` errors.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource: Option<String>,
    pub request_id: Option<String>,
}

/// Query parameters accepted by the monitor write routes.
#[derive(Debug, Default, Deserialize)]
pub struct MonitorWriteParams {
    pub if_seq_no: Option<i64>,
    pub if_primary_term: Option<u64>,
    pub refresh: Option<String>,
    pub timeout_ms: Option<u64>,
}

impl MonitorWriteParams {
    /// Both halves of the token must be given together.
    pub fn revision(&self) -> Result<SeqNoPrimaryTerm, String> {
        match (self.if_seq_no, self.if_primary_term) {
            (Some(seq_no), Some(primary_term)) => Ok(SeqNoPrimaryTerm::new(seq_no, primary_term)),
            (None, None) => Ok(SeqNoPrimaryTerm::UNASSIGNED),
            _ => Err("if_seq_no and if_primary_term must be supplied together".to_string()),
        }
    }

    pub fn refresh_policy(&self) -> Result<RefreshPolicy, String> {
        match self.refresh.as_deref() {
            None => Ok(RefreshPolicy::default()),
            Some(value) => RefreshPolicy::parse(value)
                .ok_or_else(|| format!("unknown refresh policy [{value}]")),
        }
    }

    pub fn timeout(&self) -> Result<Option<Duration>, String> {
        match self.timeout_ms {
            Some(0) => Err("timeout_ms must be greater than 0".to_string()),
            value => Ok(value.map(Duration::from_millis)),
        }
    }
}

/// A stored monitor with the revision needed for a follow-up update.
#[derive(Debug, Serialize, Deserialize, ToSchema, Clone)]
pub struct MonitorDocument {
    pub id: String,
    pub version: u64,
    pub seq_no: i64,
    pub primary_term: u64,
    pub monitor: Monitor,
}
