//! Admission failure taxonomy.
//!
//! Every failure carries a caller-facing classification ([`ErrorKind`]) and a
//! human-readable message. Store failures keep the underlying [`StoreError`]
//! so the HTTP layer can surface conflicts distinctly.
use jobstore::StoreError;
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Forbidden,
    NotFound,
    CapacityExceeded,
    Internal,
    Validation,
}

impl ErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::Forbidden => "forbidden",
            ErrorKind::NotFound => "not_found",
            ErrorKind::CapacityExceeded => "capacity_exceeded",
            ErrorKind::Internal => "internal",
            ErrorKind::Validation => "validation",
        }
    }
}

#[derive(Debug, Error)]
pub enum AdmissionError {
    #[error("{0}")]
    Validation(String),
    /// `resource` names the offending indices or destination type.
    #[error("{message}")]
    Forbidden { message: String, resource: String },
    #[error("{0}")]
    NotFound(String),
    #[error("This request would create more than {max_monitors} monitors.")]
    CapacityExceeded { max_monitors: u64 },
    #[error("{context}: {source}")]
    Store {
        context: String,
        #[source]
        source: StoreError,
    },
    /// The write was accepted but one or more shards failed to apply it.
    #[error("{0}")]
    PartialWrite(String),
    #[error("{0}")]
    Internal(String),
}

impl AdmissionError {
    pub fn store(context: impl Into<String>, source: StoreError) -> Self {
        AdmissionError::Store {
            context: context.into(),
            source,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            AdmissionError::Validation(_) => ErrorKind::Validation,
            AdmissionError::Forbidden { .. } => ErrorKind::Forbidden,
            AdmissionError::NotFound(_) => ErrorKind::NotFound,
            AdmissionError::CapacityExceeded { .. } => ErrorKind::CapacityExceeded,
            AdmissionError::Store { .. }
            | AdmissionError::PartialWrite(_)
            | AdmissionError::Internal(_) => ErrorKind::Internal,
        }
    }

    /// True when the store rejected a write because the caller's revision was
    /// stale.
    pub fn is_version_conflict(&self) -> bool {
        matches!(
            self,
            AdmissionError::Store {
                source: StoreError::Conflict(_),
                ..
            }
        )
    }
}
