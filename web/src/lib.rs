use axum::Router;
use log::*;
use tokio::net::TcpListener;

pub use self::error::{Error, Result};
pub use service::AppState;

mod controller;
mod cors;
mod error;
mod params;
mod router;
mod sse;

/// Builds the complete application router with the CORS policy applied.
pub fn app(app_state: AppState) -> Router {
    let cors = cors::cors_layer(&app_state.config);
    router::define_routes(app_state).layer(cors)
}

pub async fn init_server(app_state: AppState) -> std::io::Result<()> {
    let interface = app_state.config.interface.as_deref().unwrap_or("127.0.0.1");
    let host = format!("{interface}:{}", app_state.config.port);

    info!("Server starting... listening for connections on http://{host}");

    let listener = TcpListener::bind(&host).await?;
    let engine = app_state.broadcast_engine.clone();

    axum::serve(listener, app(app_state))
        .with_graceful_shutdown(async move {
            shutdown_signal().await;
            // Open SSE responses never complete on their own
            engine.close_all();
        })
        .await
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => warn!("CTRL+C received, shutting down"),
        Err(e) => error!("Failed to listen for shutdown signal: {e}"),
    }
}
