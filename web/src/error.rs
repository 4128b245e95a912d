use std::error::Error as StdError;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use sse::error::{Error as SseError, ErrorKind};

pub type Result<T> = core::result::Result<T, Error>;

/// Body returned when a publish finds nobody to deliver to.
pub(crate) const NO_CLIENTS_CONNECTED: &str = "No clients connected";

#[derive(Debug)]
pub struct Error(SseError);

impl StdError for Error {}

impl std::fmt::Display for Error {
    fn fmt(&self, fmt: &mut std::fmt::Formatter) -> core::result::Result<(), std::fmt::Error> {
        write!(fmt, "{self:?}")
    }
}

impl Error {
    pub(crate) fn is_no_subscribers(&self) -> bool {
        self.0.is_no_subscribers()
    }
}

// Responses carry fixed bodies only; engine details stay in the logs.
impl IntoResponse for Error {
    fn into_response(self) -> Response {
        match self.0.error_kind {
            ErrorKind::NoSubscribers => {
                (StatusCode::BAD_REQUEST, NO_CLIENTS_CONNECTED).into_response()
            }
            ErrorKind::CapacityExceeded { .. } | ErrorKind::ShuttingDown => {
                (StatusCode::SERVICE_UNAVAILABLE, "SERVICE UNAVAILABLE").into_response()
            }
        }
    }
}

impl<E> From<E> for Error
where
    E: Into<SseError>,
{
    fn from(err: E) -> Self {
        Self(err.into())
    }
}
