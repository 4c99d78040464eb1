//! Read-access probes for a monitor's search inputs.
use super::{AdmissionError, bounded};
use crate::model::Monitor;
use futures::future::try_join_all;
use jobstore::DocumentStore;
use std::time::Duration;

/// Probe every search input's indices and join on all of them.
///
/// The first failing probe decides the error; it names the indices of the
/// input that failed.
pub async fn check_source_access(
    store: &dyn DocumentStore,
    monitor: &Monitor,
    timeout: Duration,
) -> Result<(), AdmissionError> {
    let probes = monitor.search_inputs().map(|input| async move {
        bounded(timeout, "source probe", store.probe(&input.indices))
            .await
            .map_err(|err| {
                let names = input.indices.join(",");
                tracing::debug!(indices = %names, error = %err, "source probe failed");
                AdmissionError::Forbidden {
                    message: format!(
                        "User doesn't have read permissions for one or more configured index {names}"
                    ),
                    resource: names,
                }
            })
    });
    try_join_all(probes).await?;
    Ok(())
}
