//! Monitor HTTP API module.
pub mod error;
pub mod monitors;
pub mod openapi;
pub mod system;
pub mod types;
