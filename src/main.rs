//! SSE relay server: clients subscribe to a long-lived event stream and
//! producers push a shared integer value to every current subscriber.

use log::{error, info};
use service::{config::Config, logging::Logger};

#[tokio::main]
async fn main() {
    let config = Config::new();
    if let Err(e) = Logger::init_logger(&config) {
        eprintln!("Failed to start logger: {e}");
        std::process::exit(1);
    }

    info!(
        "Starting SSE relay on {}:{} (base path {})",
        config.interface.as_deref().unwrap_or("127.0.0.1"),
        config.port,
        config.api_base_path()
    );

    let engine = service::init_broadcast_engine(&config);
    let app_state = service::AppState::new(config, &engine);

    if let Err(e) = web::init_server(app_state).await {
        error!("Server error: {e}");
        std::process::exit(1);
    }

    info!("Server stopped. Goodbye.");
}
