//! Monitor admission service entry point.
//!
//! # Purpose
//! Wires configuration, live settings, storage, and the HTTP router, then
//! serves the API until shutdown.
use jobstore::memory::InMemoryStore;
use monitors::app::{AppState, build_router};
use monitors::config::MonitorsConfig;
use monitors::observability;
use monitors::settings::{LiveSettings, SettingsHandle, watch_settings_file};
use std::future::Future;
use std::sync::Arc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = MonitorsConfig::from_env_or_yaml()?;
    run_with_shutdown(config, async {
        let _ = tokio::signal::ctrl_c().await;
    })
    .await
}

async fn run_with_shutdown<F>(config: MonitorsConfig, shutdown: F) -> anyhow::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let metrics_handle = observability::init_observability("monitors")?;
    let base_settings = LiveSettings::from_env()?;
    let settings = SettingsHandle::new(base_settings.clone());
    let state = build_state(settings.clone());
    tracing::info!(
        backend = state.store.backend_name(),
        max_monitors = base_settings.max_monitors,
        "monitor admission configured"
    );

    let metrics_task = tokio::spawn(observability::serve_metrics(
        metrics_handle,
        config.metrics_bind,
    ));
    let settings_task = config.settings_path.clone().map(|path| {
        tracing::info!(path = %path.display(), "watching live settings file");
        tokio::spawn(watch_settings_file(
            path,
            base_settings,
            settings,
            config.settings_poll_interval,
        ))
    });

    let app = build_router(state);
    let addr = config.bind_addr;
    tracing::info!(%addr, "monitor service listening");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tokio::pin!(shutdown);
    tokio::select! {
        result = axum::serve(listener, app.into_make_service()) => {
            result?;
        }
        _ = &mut shutdown => {}
    }

    metrics_task.abort();
    let _ = metrics_task.await;
    if let Some(task) = settings_task {
        task.abort();
        let _ = task.await;
    }
    Ok(())
}

fn build_state(settings: SettingsHandle) -> AppState {
    AppState::new(Arc::new(InMemoryStore::new()), settings)
}
