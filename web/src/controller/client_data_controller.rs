use crate::error::NO_CLIENTS_CONNECTED;
use crate::params::client_data::UpdateParams;
use crate::AppState;
use axum::extract::rejection::{FormRejection, QueryRejection};
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::{Form, Json};
use serde_json::{json, Value};

use log::*;

/// POST overwrite the shared client data
///
/// `data` is read from the query string, or from a form-encoded body when the
/// query does not carry it.
#[utoipa::path(
    post,
    path = "/api/sse/update",
    params(UpdateParams),
    request_body(content = String, content_type = "application/x-www-form-urlencoded", description = "data=<integer>"),
    responses(
        (status = 200, description = "Client data updated"),
        (status = 400, description = "Missing or non-integer data parameter"),
    )
)]
pub async fn update(
    State(app_state): State<AppState>,
    query: Result<Query<UpdateParams>, QueryRejection>,
    form: Result<Form<UpdateParams>, FormRejection>,
) -> Response {
    let params = match (query, form) {
        (Ok(Query(params)), _) | (Err(_), Ok(Form(params))) => params,
        (Err(rejection), Err(_)) => return rejection.into_response(),
    };

    debug!("POST Update client data with: {params:?}");

    app_state.engine().update_state(params.data);

    StatusCode::OK.into_response()
}

/// GET the current shared client data
#[utoipa::path(
    get,
    path = "/api/sse/getclientdata",
    responses(
        (status = 200, description = "Current client data", body = i64),
    )
)]
pub async fn read(State(app_state): State<AppState>) -> impl IntoResponse {
    Json(app_state.engine().state())
}

/// GET the current shared client data, or a notice when nobody is subscribed
#[utoipa::path(
    get,
    path = "/api/sse/getupdatedata",
    responses(
        (status = 200, description = "Current client data, or a message when no clients are connected"),
    )
)]
pub async fn read_updated(State(app_state): State<AppState>) -> impl IntoResponse {
    let engine = app_state.engine();

    let body: Value = if !engine.has_subscribers() {
        json!(NO_CLIENTS_CONNECTED)
    } else {
        json!(engine.state())
    };

    Json(body)
}
