use crate::{controller::health_check_controller, params, AppState};
use axum::{
    routing::{get, post},
    Router,
};

use crate::controller::{client_data_controller, notify_controller};
use crate::sse::handler as sse_handler;

use utoipa::OpenApi;
use utoipa_rapidoc::RapiDoc;

// This is the global definition of our OpenAPI spec. To be a part
// of the rendered spec, a path and schema must be listed here.
#[derive(OpenApi)]
#[openapi(
        info(
            title = "SSE Relay API"
        ),
        paths(
            health_check_controller::health_check,
            sse_handler::subscribe,
            notify_controller::notify,
            notify_controller::get_updated_data,
            client_data_controller::update,
            client_data_controller::read,
            client_data_controller::read_updated,
        ),
        components(
            schemas(
                params::client_data::NotifyParams,
            )
        ),
        tags(
            (name = "sse_relay", description = "Server-Sent Events push relay")
        )
    )]
struct ApiDoc;

pub fn define_routes(app_state: AppState) -> Router {
    let base_path = app_state.config.api_base_path();
    let relay = relay_routes(app_state);

    let router = Router::new().merge(health_routes());
    let router = if base_path == "/" {
        router.merge(relay)
    } else {
        router.nest(&base_path, relay)
    };

    router.merge(RapiDoc::with_openapi("/api-docs/openapi.json", ApiDoc::openapi()).path("/rapidoc"))
}

fn health_routes() -> Router {
    Router::new().route("/health", get(health_check_controller::health_check))
}

fn relay_routes(app_state: AppState) -> Router {
    Router::new()
        .route("/subscribe", get(sse_handler::subscribe))
        .route("/notify", post(notify_controller::notify))
        .route(
            "/get-updated-data",
            post(notify_controller::get_updated_data),
        )
        .route("/update", post(client_data_controller::update))
        .route("/getclientdata", get(client_data_controller::read))
        .route("/getupdatedata", get(client_data_controller::read_updated))
        .with_state(app_state)
}
