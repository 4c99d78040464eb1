//! Per-action policy checks: throttle bounds and destination allow-listing.
//!
//! Both checks run against the settings snapshot captured for the request.
//! Destination lookups are issued concurrently and joined before the workflow
//! moves on, so no write can be dispatched while a lookup is still pending.
use super::{AdmissionError, bounded};
use crate::model::Monitor;
use crate::model::document::destination_from_source;
use crate::settings::{LiveSettings, MIN_ACTION_THROTTLE, format_duration};
use futures::future::try_join_all;
use jobstore::DocumentStore;
use std::collections::BTreeSet;
use std::time::Duration;

pub fn check_throttles(monitor: &Monitor, max: Duration) -> Result<(), AdmissionError> {
    for action in monitor.actions() {
        let Some(throttle) = action.throttle else {
            continue;
        };
        if throttle.value == 0 {
            return Err(AdmissionError::Validation(format!(
                "Throttle value of action [{}] must be greater than 0",
                action.name
            )));
        }
        match throttle.duration() {
            Some(period) if period > max => {
                return Err(throttle_too_long(max));
            }
            Some(period) if period < MIN_ACTION_THROTTLE => {
                return Err(AdmissionError::Validation(
                    "Can only set throttle period greater than or equal to 1 minute".to_string(),
                ));
            }
            Some(_) => {}
            None => return Err(throttle_too_long(max)),
        }
    }
    Ok(())
}

fn throttle_too_long(max: Duration) -> AdmissionError {
    AdmissionError::Validation(format!(
        "Can only set throttle period less than or equal to {}",
        format_duration(max)
    ))
}

/// Distinct, non-empty destination ids referenced by the monitor's actions.
pub fn referenced_destinations(monitor: &Monitor) -> BTreeSet<&str> {
    monitor
        .actions()
        .filter_map(|action| action.destination_id.as_deref())
        .filter(|id| !id.is_empty())
        .collect()
}

pub async fn check_destinations(
    store: &dyn DocumentStore,
    index: &str,
    monitor: &Monitor,
    settings: &LiveSettings,
    timeout: Duration,
) -> Result<(), AdmissionError> {
    let lookups = referenced_destinations(monitor)
        .into_iter()
        .map(|id| check_destination(store, index, id, settings, timeout));
    try_join_all(lookups).await?;
    Ok(())
}

async fn check_destination(
    store: &dyn DocumentStore,
    index: &str,
    id: &str,
    settings: &LiveSettings,
    timeout: Duration,
) -> Result<(), AdmissionError> {
    let document = bounded(timeout, "destination lookup", store.get(index, id))
        .await
        .map_err(|err| AdmissionError::store(format!("failed to fetch destination {id}"), err))?
        .ok_or_else(|| {
            AdmissionError::NotFound(format!("Destination with id {id} is not found"))
        })?;
    let destination = destination_from_source(&document.source).map_err(|err| {
        AdmissionError::Internal(format!("failed to parse destination {id}: {err}"))
    })?;
    if !settings.allows_destination(&destination.destination_type) {
        tracing::debug!(
            destination_id = id,
            destination_type = %destination.destination_type,
            "destination type not allowed"
        );
        return Err(AdmissionError::Forbidden {
            message: format!(
                "Destination type is not allowed: {}",
                destination.destination_type
            ),
            resource: destination.destination_type,
        });
    }
    Ok(())
}
