//! Monitor admission workflow.
//!
//! # Purpose
//! Decides whether a create-or-update request for a monitor may be written to
//! the scheduled-jobs index, and performs the conditional write.
//!
//! # Flow
//! `ValidateSource → EnsureIndexReady → ValidatePolicy →
//! {CheckCapacity | FetchExisting} → Write`, driven step by step by
//! [`Admission`]. Each store round trip is bounded by a timeout taken from the
//! live settings snapshot captured when the request started.
//!
//! # Shared state
//! Only [`IndexState`] and the live settings are shared between requests; both
//! are single atomically replaced values.
mod error;
pub mod policy;
pub mod quota;
pub mod readiness;
pub mod source;
mod workflow;

pub use error::{AdmissionError, ErrorKind};
pub use readiness::{IndexState, Readiness, SCHEDULED_JOBS_INDEX, SCHEMA_VERSION};
pub use workflow::{Admission, AdmissionContext, Step};

use jobstore::{StoreError, StoreResult};
use std::future::Future;
use std::time::Duration;

/// Run a store call under `timeout`, reporting expiry as
/// [`StoreError::Timeout`].
pub(crate) async fn bounded<T>(
    timeout: Duration,
    operation: &str,
    call: impl Future<Output = StoreResult<T>>,
) -> StoreResult<T> {
    match tokio::time::timeout(timeout, call).await {
        Ok(result) => result,
        Err(_) => Err(StoreError::Timeout(format!(
            "{operation} did not complete within {}ms",
            timeout.as_millis()
        ))),
    }
}
