use axum::http::{HeaderValue, Method};
use log::*;
use service::config::Config;
use std::time::Duration;
use tower_http::cors::{AllowHeaders, AllowOrigin, Any, CorsLayer};

const PERMISSIVE_MAX_AGE: Duration = Duration::from_secs(3600);

/// Builds the cross-origin policy from `allowed_origins`.
///
/// - `*` selects the permissive policy: any origin, method and header, no credentials.
/// - Anything else is a list of exact origins allowed to call GET/POST with
///   credentials; request headers are mirrored back.
pub(crate) fn cors_layer(config: &Config) -> CorsLayer {
    if config.allows_any_origin() {
        info!("CORS: allowing any origin");
        return CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
            .max_age(PERMISSIVE_MAX_AGE);
    }

    let origins: Vec<HeaderValue> = config
        .allowed_origins
        .iter()
        .filter_map(|origin| {
            let trimmed = origin.trim();
            match HeaderValue::from_str(trimmed) {
                Ok(value) => Some(value),
                Err(e) => {
                    warn!("Ignoring invalid CORS origin {trimmed:?}: {e}");
                    None
                }
            }
        })
        .collect();

    info!("CORS: allowing origins {:?}", config.allowed_origins);

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST])
        .allow_headers(AllowHeaders::mirror_request())
        .allow_credentials(true)
}
