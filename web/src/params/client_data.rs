use serde::Deserialize;
use utoipa::{IntoParams, ToSchema};

/// JSON body of `POST /notify`.
#[derive(Debug, Deserialize, ToSchema)]
pub(crate) struct NotifyParams {
    /// Value pushed to every subscriber as a `data-event`
    pub(crate) message: i64,
}

/// Query string, or form body, of `POST /update`.
#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub(crate) struct UpdateParams {
    /// New value for the shared client data
    pub(crate) data: i64,
}
