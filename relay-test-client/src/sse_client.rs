use anyhow::{anyhow, bail, Result};
use eventsource_client::{self as es, Client};
use futures_util::stream::StreamExt;
use log::*;
use serde_json::Value;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{timeout_at, Instant};

const DATA_EVENT: &str = "data-event";

/// One `data-event` as it came off the wire.
#[derive(Debug, Clone)]
pub struct Event {
    pub event_type: String,
    pub data: Value,
}

impl Event {
    pub fn value(&self) -> Option<i64> {
        self.data.as_i64()
    }
}

/// A subscriber stream held open against the relay's `/subscribe` endpoint.
///
/// A background task reads the stream and forwards `data-event`s. Keep-alive
/// comments and other event names are dropped there.
pub struct Connection {
    pub label: String,
    events: mpsc::UnboundedReceiver<Event>,
    reader: tokio::task::JoinHandle<()>,
}

impl Connection {
    pub async fn establish(base_url: &str, label: String) -> Result<Self> {
        let client = es::ClientBuilder::for_url(&format!("{base_url}/subscribe"))?.build();
        let (tx, events) = mpsc::unbounded_channel();

        let reader_label = label.clone();
        let reader = tokio::spawn(async move {
            let mut stream = client.stream();

            while let Some(item) = stream.next().await {
                let event = match item {
                    Ok(es::SSE::Event(event)) if event.event_type == DATA_EVENT => event,
                    Ok(_) => continue,
                    Err(e) => {
                        warn!("{reader_label}: stream error: {e}");
                        continue;
                    }
                };

                let data = match serde_json::from_str(&event.data) {
                    Ok(data) => data,
                    Err(e) => {
                        warn!("{reader_label}: undecodable payload {:?}: {e}", event.data);
                        continue;
                    }
                };

                let forwarded = Event {
                    event_type: event.event_type,
                    data,
                };
                if tx.send(forwarded).is_err() {
                    break;
                }
            }

            debug!("{reader_label}: stream reader finished");
        });

        Ok(Self {
            label,
            events,
            reader,
        })
    }

    /// Next `data-event`, or an error if none arrives before `timeout`.
    pub async fn next_event(&mut self, timeout: Duration) -> Result<Event> {
        match timeout_at(Instant::now() + timeout, self.events.recv()).await {
            Ok(Some(event)) => Ok(event),
            Ok(None) => bail!("{}: stream closed", self.label),
            Err(_) => bail!("{}: no {DATA_EVENT} within {timeout:?}", self.label),
        }
    }

    /// Next `data-event`, decoded as the integer the relay publishes.
    pub async fn next_value(&mut self, timeout: Duration) -> Result<i64> {
        let event = self.next_event(timeout).await?;
        event
            .value()
            .ok_or_else(|| anyhow!("{}: payload is not an integer: {}", self.label, event.data))
    }

    /// Drops the underlying HTTP stream, as a browser tab closing would.
    pub fn disconnect(self) {
        debug!("Disconnecting {}", self.label);
        self.reader.abort();
    }
}
