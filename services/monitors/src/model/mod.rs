//! Monitor service data model.
//!
//! # Purpose
//! Re-exports the monitor and destination models, the stored document codec,
//! and the admission request/response shapes shared by the workflow and API.
mod destination;
pub mod document;
mod monitor;
mod request;

pub use destination::Destination;
pub use monitor::{Action, Monitor, MonitorInput, SearchInput, Throttle, ThrottleUnit, Trigger};
pub use request::{IndexMonitorResponse, MonitorRequest, ResponseStatus, WriteOperation};
