// Main entry point - Dependency injection and server setup
mod domain;
mod application;
mod infrastructure;
mod presentation;

use std::{net::SocketAddr, sync::Arc, time::Duration};
use anyhow::Context;
use tower_http::{compression::CompressionLayer, trace::TraceLayer};
use tracing_subscriber::EnvFilter;

use crate::application::connection_manager::ConnectionManager;
use crate::application::device_store::DeviceStore;
use crate::application::scada_api::ScadaApi;
use crate::application::widget_store::WidgetStore;
use crate::infrastructure::config::load_settings;
use crate::infrastructure::http_api::HttpScadaApi;
use crate::infrastructure::ws_transport::WebSocketTransport;
use crate::presentation::app_state::AppState;
use crate::presentation::handlers::router;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    // Load configuration
    let settings = load_settings().context("failed to load configuration")?;

    // Backend adapters (infrastructure layer)
    let api: Arc<dyn ScadaApi> = Arc::new(
        HttpScadaApi::new(
            settings.api.base_url.clone(),
            settings.api.token.clone(),
            Duration::from_secs(settings.api.timeout_secs),
        )
        .context("failed to build backend client")?,
    );
    let transport = Arc::new(WebSocketTransport::new(
        settings.realtime.url.clone(),
        settings.api.token.clone(),
    ));

    // Stores and connection lifecycle (application layer)
    let devices = Arc::new(DeviceStore::new(settings.realtime.store_options()));
    match api.list_devices().await {
        Ok(snapshot) => devices.set_devices(snapshot),
        Err(e) => tracing::warn!("Starting with an empty device list: {}", e),
    }

    let widgets = Arc::new(WidgetStore::new(api.clone()));
    if let Err(e) = widgets.fetch_widgets().await {
        tracing::warn!("Starting with an empty widget cache: {}", e);
    }

    let connection = ConnectionManager::new(
        transport,
        devices.clone(),
        settings.realtime.connection_options(),
    );
    if settings.realtime.auto_connect {
        connection.connect();
    }

    let state = Arc::new(AppState {
        connection: connection.clone(),
        devices,
        widgets,
    });

    // Build router (presentation layer)
    let app = router(state)
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http());

    // Start server
    let addr: SocketAddr = settings
        .server
        .bind
        .parse()
        .with_context(|| format!("invalid bind address {}", settings.server.bind))?;
    tracing::info!("Starting scada-console on {}", addr);

    axum::serve(tokio::net::TcpListener::bind(addr).await?, app)
        .with_graceful_shutdown(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!("Failed to listen for shutdown signal: {}", e);
            }
            tracing::info!("Shutting down");
            connection.disconnect();
        })
        .await?;

    Ok(())
}
