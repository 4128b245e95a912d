use axum::response::sse::Event;
use serde::Serialize;

/// Trait for getting the SSE event type name
pub trait EventType {
    fn event_type(&self) -> &'static str;
}

/// Messages pushed to subscribers.
///
/// The payload is serialized on its own (untagged) so a `Data(42)` message
/// arrives at the client as `event: data-event` / `data: 42`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum Message {
    Data(i64),
}

impl EventType for Message {
    fn event_type(&self) -> &'static str {
        match self {
            Message::Data(_) => "data-event",
        }
    }
}

impl Message {
    /// Render the message as a named SSE event with a JSON data field.
    pub fn to_event(&self) -> Result<Event, serde_json::Error> {
        let data = serde_json::to_string(self)?;
        Ok(Event::default().event(self.event_type()).data(data))
    }
}
