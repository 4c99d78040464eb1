//! Stored document envelopes for the scheduled-jobs index.
//!
//! Every document carries a top-level `type` tag and its payload under a key of
//! the same name, so monitors and destinations can share one index and be
//! counted by type.
use super::{Destination, Monitor};
use serde::Deserialize;
use serde_json::{Value, json};
use thiserror::Error;

pub const MONITOR_TYPE: &str = "monitor";
pub const DESTINATION_TYPE: &str = "destination";

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("document is not a {0}")]
    WrongType(&'static str),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

fn payload<'a>(source: &'a Value, doc_type: &'static str) -> Result<&'a Value, CodecError> {
    if source.get("type").and_then(Value::as_str) != Some(doc_type) {
        return Err(CodecError::WrongType(doc_type));
    }
    source.get(doc_type).ok_or(CodecError::WrongType(doc_type))
}

pub fn monitor_to_source(monitor: &Monitor) -> Result<Value, CodecError> {
    Ok(json!({
        "type": MONITOR_TYPE,
        MONITOR_TYPE: serde_json::to_value(monitor)?,
    }))
}

pub fn monitor_from_source(source: &Value) -> Result<Monitor, CodecError> {
    let payload = payload(source, MONITOR_TYPE)?;
    Ok(Monitor::deserialize(payload)?)
}

pub fn destination_to_source(destination: &Destination) -> Result<Value, CodecError> {
    Ok(json!({
        "type": DESTINATION_TYPE,
        DESTINATION_TYPE: serde_json::to_value(destination)?,
    }))
}

pub fn destination_from_source(source: &Value) -> Result<Destination, CodecError> {
    let payload = payload(source, DESTINATION_TYPE)?;
    Ok(Destination::deserialize(payload)?)
}
