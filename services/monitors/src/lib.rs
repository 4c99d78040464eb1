//! Monitor admission service library crate.
//!
//! # Purpose
//! Exposes the admission workflow, live settings, HTTP API, configuration, and
//! observability wiring for use by the binary and tests.
pub mod admission;
pub mod api;
pub mod app;
pub mod config;
pub mod model;
pub mod observability;
pub mod settings;
