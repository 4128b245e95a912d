use crate::{AppState, Error};
use async_stream::stream;
use axum::extract::State;
use axum::response::sse::{Event, KeepAlive, Sse};
use futures::Stream;
use log::*;
use std::convert::Infallible;

/// SSE handler that establishes a long-lived connection for `data-event` messages.
///
/// The subscription lives inside the response stream. When the client goes
/// away hyper drops the stream, which unsubscribes; when the engine drops the
/// subscriber the stream ends and the response completes.
#[utoipa::path(
    get,
    path = "/api/sse/subscribe",
    responses(
        (status = 200, description = "Event stream of `data-event` messages", body = String, content_type = "text/event-stream"),
        (status = 503, description = "Subscriber limit reached or server shutting down"),
    )
)]
pub(crate) async fn subscribe(
    State(app_state): State<AppState>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, Error> {
    let mut subscription = app_state.engine().subscribe()?;
    let subscriber_id = subscription.id().clone();

    debug!("Establishing SSE connection for subscriber {subscriber_id}");

    let stream = stream! {
        while let Some(message) = subscription.recv().await {
            match message.to_event() {
                Ok(event) => yield Ok::<Event, Infallible>(event),
                Err(e) => error!("Failed to serialize SSE message for {subscriber_id}: {e}"),
            }
        }

        debug!("SSE stream for subscriber {subscriber_id} ended");
    };

    let keep_alive = KeepAlive::new().interval(app_state.config.keep_alive_interval());

    Ok(Sse::new(stream).keep_alive(keep_alive))
}
