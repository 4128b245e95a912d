//! SSE HTTP handler for the web layer.
//!
//! This module contains only the Axum handler for the subscribe endpoint.
//! The broadcast core (BroadcastEngine, SubscriberRegistry, Message types)
//! lives in the `sse` crate.

pub mod handler;
