use crate::params::client_data::NotifyParams;
use crate::{AppState, Error};
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;

use log::*;

const NO_ACTIVE_CONNECTIONS: &str = "No active connections";

/// POST a value to every connected subscriber
#[utoipa::path(
    post,
    path = "/api/sse/notify",
    request_body = NotifyParams,
    responses(
        (status = 200, description = "Notification sent to current subscribers", body = String),
        (status = 400, description = "No clients connected", body = String),
        (status = 422, description = "Unprocessable Entity"),
    )
)]
pub async fn notify(
    State(app_state): State<AppState>,
    Json(params): Json<NotifyParams>,
) -> Result<impl IntoResponse, Error> {
    debug!("POST Notify clients with: {params:?}");

    let delivery = app_state.engine().publish(params.message).await?;

    debug!("Notify delivery: {delivery:?}");

    Ok((StatusCode::OK, "Notification sent"))
}

/// POST the last known client data to every connected subscriber
#[utoipa::path(
    post,
    path = "/api/sse/get-updated-data",
    responses(
        (status = 200, description = "Current client data sent to subscribers", body = String),
        (status = 400, description = "No active connections", body = String),
    )
)]
pub async fn get_updated_data(
    State(app_state): State<AppState>,
) -> Result<impl IntoResponse, Error> {
    debug!("POST Republish current client data");

    match app_state.engine().republish_state().await {
        Ok(delivery) => {
            debug!("Republish delivery: {delivery:?}");
            Ok((StatusCode::OK, "Data update initiated"))
        }
        Err(e) => {
            let e = Error::from(e);
            if e.is_no_subscribers() {
                Ok((StatusCode::BAD_REQUEST, NO_ACTIVE_CONNECTIONS))
            } else {
                Err(e)
            }
        }
    }
}
