//! Server-Sent Events (SSE) broadcast core for the relay.
//!
//! This crate tracks a dynamic set of long-lived subscriber connections and
//! pushes one shared integer value (`clientData`) to all of them on demand.
//! It knows nothing about HTTP routing; the `web` crate adapts it to axum.
//!
//! # Architecture
//!
//! - **Registry**: `SubscriberRegistry` is the concurrency-safe set of live
//!   subscribers (add, idempotent remove, isolated snapshot). The default
//!   `ConnectionRegistry` is a sharded `DashMap`.
//! - **Engine**: `BroadcastEngine` owns the registry and `clientData`, and
//!   implements subscribe/unsubscribe/publish on top of them.
//! - **Per-subscriber isolation**: each subscriber has its own bounded queue.
//!   A publish writes to a snapshot of subscribers concurrently, each write
//!   bounded by a deadline; a failed or stalled subscriber is closed and
//!   removed while every other subscriber still gets the message.
//! - **Ephemeral messages**: nothing is persisted or replayed. A client that
//!   reconnects is a brand new subscriber.
//!
//! # Subscriber lifecycle
//!
//! 1. `BroadcastEngine::subscribe` registers an `Open` subscriber and returns
//!    a `Subscription` holding the receiving end of its queue.
//! 2. Publishes write `data-event` messages into the queue.
//! 3. The subscriber is removed exactly once, by whichever happens first:
//!    - the transport drops the `Subscription` (client disconnect, idle
//!      detection, response completed)
//!    - a write fails or times out during a publish
//!
//! # Example
//!
//! ```rust,ignore
//! let engine = BroadcastEngine::default();
//! let mut subscription = engine.subscribe()?;
//!
//! engine.update_state(42);
//! engine.republish_state().await?;
//!
//! assert_eq!(subscription.recv().await, Some(Message::Data(42)));
//! ```
//!
//! # Modules
//!
//! - `connection`: `Subscriber` handle, its `Open`/`Closed` state and `SubscriberId`
//! - `registry`: `SubscriberRegistry` contract and the `DashMap` implementation
//! - `engine`: `BroadcastEngine`, `Subscription` and delivery accounting
//! - `message`: wire message types and their SSE event names
//! - `error`: errors surfaced to producers and subscribers

pub mod connection;
pub mod engine;
pub mod error;
pub mod message;
pub mod registry;

pub use engine::{BroadcastEngine, Delivery, EngineConfig, Subscription};
pub use error::{Error, ErrorKind};
