//! Monitor service HTTP application wiring.
//!
//! # Purpose
//! Builds the Axum router, configures middleware, and defines the shared
//! application state injected into handlers.
use crate::admission::Admission;
use crate::api;
use crate::api::openapi::ApiDoc;
use crate::settings::SettingsHandle;
use axum::{Json, Router};
use jobstore::DocumentStore;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;

#[derive(Clone)]
pub struct AppState {
    pub admission: Admission,
    pub store: Arc<dyn DocumentStore>,
}

impl AppState {
    pub fn new(store: Arc<dyn DocumentStore>, settings: SettingsHandle) -> Self {
        Self {
            admission: Admission::new(store.clone(), settings),
            store,
        }
    }
}

pub fn build_router(state: AppState) -> Router {
    let trace_layer =
        TraceLayer::new_for_http().make_span_with(|request: &axum::http::Request<_>| {
            tracing::info_span!(
                "http.request",
                method = %request.method(),
                uri = %request.uri(),
                version = ?request.version()
            )
        });

    Router::new()
        .route(
            "/v1/system/health",
            axum::routing::get(api::system::system_health),
        )
        .route(
            "/v1/monitors",
            axum::routing::post(api::monitors::create_monitor),
        )
        .route(
            "/v1/monitors/:monitor_id",
            axum::routing::get(api::monitors::get_monitor).put(api::monitors::update_monitor),
        )
        .route(
            "/v1/openapi.json",
            axum::routing::get(|| async { Json(ApiDoc::openapi()) }),
        )
        .layer(trace_layer)
        .with_state(state)
}
