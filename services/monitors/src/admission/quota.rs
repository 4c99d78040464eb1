//! Monitor quota gate for the create path.
use super::{AdmissionError, bounded};
use crate::model::document::MONITOR_TYPE;
use jobstore::{CountQuery, DocumentStore};
use std::time::Duration;

pub fn monitor_count_query() -> CountQuery {
    CountQuery::new().term("type", MONITOR_TYPE)
}

pub fn enforce_capacity(existing: u64, max_monitors: u64) -> Result<(), AdmissionError> {
    if existing >= max_monitors {
        return Err(AdmissionError::CapacityExceeded { max_monitors });
    }
    Ok(())
}

pub async fn check_capacity(
    store: &dyn DocumentStore,
    index: &str,
    max_monitors: u64,
    timeout: Duration,
) -> Result<(), AdmissionError> {
    let existing = bounded(
        timeout,
        "monitor count",
        store.count(index, &monitor_count_query()),
    )
    .await
    .map_err(|err| AdmissionError::store("failed to count monitors", err))?;
    tracing::debug!(existing, max_monitors, "monitor quota checked");
    enforce_capacity(existing, max_monitors)
}
