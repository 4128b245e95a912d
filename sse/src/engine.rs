use crate::connection::{CloseReason, MessageReceiver, Subscriber, SubscriberId};
use crate::error::Error;
use crate::message::Message;
use crate::registry::{ConnectionRegistry, SubscriberRegistry};
use futures::future::join_all;
use log::*;
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

pub const DEFAULT_SUBSCRIBER_BUFFER: usize = 32;
pub const DEFAULT_WRITE_TIMEOUT: Duration = Duration::from_secs(5);

/// Limits applied by the engine to each subscriber.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    /// Upper bound on concurrent subscribers; `None` means unlimited.
    pub max_subscribers: Option<usize>,
    /// Messages that may be queued for a subscriber before writes start waiting.
    pub subscriber_buffer: usize,
    /// How long one write may wait for queue space before the subscriber is dropped.
    pub write_timeout: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_subscribers: None,
            subscriber_buffer: DEFAULT_SUBSCRIBER_BUFFER,
            write_timeout: DEFAULT_WRITE_TIMEOUT,
        }
    }
}

/// Outcome of a publish that reached at least one subscriber.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Delivery {
    pub attempted: usize,
    pub delivered: usize,
    pub failed: usize,
}

/// Owns the subscriber registry and the shared `clientData` value, and fans
/// messages out to every subscriber with per-subscriber failure isolation.
pub struct BroadcastEngine {
    membership: Arc<Membership>,
    client_data: AtomicI64,
    config: EngineConfig,
}

/// Registry plus the admission bookkeeping shared with every `SubscriptionGuard`.
///
/// `reserved` counts admitted subscribers that have not been removed yet. A
/// slot is taken before the registry insert and released by whichever removal
/// path wins, so the limit never depends on `count()`.
struct Membership {
    registry: Arc<dyn SubscriberRegistry>,
    reserved: AtomicUsize,
    closing: AtomicBool,
}

impl Membership {
    fn reserve(&self, max_subscribers: Option<usize>) -> Result<(), Error> {
        let Some(max_subscribers) = max_subscribers else {
            self.reserved.fetch_add(1, Ordering::AcqRel);
            return Ok(());
        };

        self.reserved
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |reserved| {
                (reserved < max_subscribers).then_some(reserved + 1)
            })
            .map(|_| ())
            .map_err(|_| {
                warn!("Rejecting subscriber: limit of {max_subscribers} reached");
                Error::capacity_exceeded(max_subscribers)
            })
    }

    fn remove(&self, id: &SubscriberId, reason: CloseReason) -> bool {
        match self.registry.remove(id) {
            Some(subscriber) => {
                subscriber.close();
                self.reserved.fetch_sub(1, Ordering::AcqRel);
                log_removal(id, reason, self.registry.count());
                true
            }
            None => false,
        }
    }
}

impl BroadcastEngine {
    pub fn new(config: EngineConfig) -> Self {
        Self::with_registry(config, Arc::new(ConnectionRegistry::new()))
    }

    pub fn with_registry(config: EngineConfig, registry: Arc<dyn SubscriberRegistry>) -> Self {
        Self {
            membership: Arc::new(Membership {
                registry,
                reserved: AtomicUsize::new(0),
                closing: AtomicBool::new(false),
            }),
            client_data: AtomicI64::new(0),
            config,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Register a new subscriber and hand back its receiving end.
    ///
    /// The subscriber stays registered until the returned `Subscription` is
    /// dropped or a write to it fails, whichever happens first. Fails once
    /// `close_all` has run or when `max_subscribers` slots are taken.
    pub fn subscribe(&self) -> Result<Subscription, Error> {
        let membership = &self.membership;
        if membership.closing.load(Ordering::Acquire) {
            return Err(Error::shutting_down());
        }
        membership.reserve(self.config.max_subscribers)?;

        let (tx, rx) = mpsc::channel(self.config.subscriber_buffer.max(1));
        let subscriber = Arc::new(Subscriber::new(tx));
        let id = subscriber.id().clone();
        membership.registry.add(subscriber);

        let subscription = Subscription {
            receiver: rx,
            guard: SubscriptionGuard {
                membership: Arc::clone(membership),
                id,
            },
        };

        // A subscriber added while close_all was sweeping would never be closed
        if membership.closing.load(Ordering::Acquire) {
            membership.remove(subscription.id(), CloseReason::Shutdown);
            return Err(Error::shutting_down());
        }

        info!(
            "New client subscribed ({})! Total clients: {}",
            subscription.id(),
            membership.registry.count()
        );

        Ok(subscription)
    }

    /// Remove a subscriber by id. Safe to call any number of times.
    pub fn unsubscribe(&self, id: &SubscriberId, reason: CloseReason) -> bool {
        self.membership.remove(id, reason)
    }

    /// Send `value` as a `data-event` to every current subscriber.
    ///
    /// Subscribers whose write fails or times out are closed and removed; the
    /// rest still receive the message. Only an empty registry is an error.
    pub async fn publish(&self, value: i64) -> Result<Delivery, Error> {
        let subscribers = self.membership.registry.snapshot();
        if subscribers.is_empty() {
            warn!("No clients subscribed to receive data!");
            return Err(Error::no_subscribers());
        }

        info!(
            "Notifying {} client(s) with value: {value}",
            subscribers.len()
        );

        let message = Message::Data(value);
        let timeout = self.config.write_timeout;
        let results = join_all(subscribers.iter().map(|subscriber| async move {
            (subscriber, subscriber.write(message, timeout).await)
        }))
        .await;

        let mut delivery = Delivery {
            attempted: subscribers.len(),
            ..Delivery::default()
        };

        for (subscriber, result) in results {
            match result {
                Ok(()) => {
                    delivery.delivered += 1;
                    trace!("Message sent to client {}: {value}", subscriber.id());
                }
                Err(reason) => {
                    delivery.failed += 1;
                    self.unsubscribe(subscriber.id(), reason);
                }
            }
        }

        debug!("Publish finished: {delivery:?}");
        Ok(delivery)
    }

    /// Overwrite the shared `clientData` value.
    pub fn update_state(&self, value: i64) {
        self.client_data.store(value, Ordering::SeqCst);
        info!("Updated client data to: {value}");
    }

    /// Current `clientData` value.
    pub fn state(&self) -> i64 {
        self.client_data.load(Ordering::SeqCst)
    }

    /// Re-send the last known `clientData` value to every subscriber.
    pub async fn republish_state(&self) -> Result<Delivery, Error> {
        let value = self.state();
        debug!("Sending updated client data to clients: {value}");
        self.publish(value).await
    }

    /// End every subscriber stream and refuse new ones. Used on shutdown so
    /// open responses can complete.
    pub fn close_all(&self) -> usize {
        self.membership.closing.store(true, Ordering::Release);
        let subscribers = self.membership.registry.snapshot();
        let closed = subscribers
            .iter()
            .filter(|subscriber| self.unsubscribe(subscriber.id(), CloseReason::Shutdown))
            .count();

        info!("Closed {closed} subscriber stream(s)");
        closed
    }

    /// Whether anyone is subscribed right now, judged from a fresh snapshot.
    pub fn has_subscribers(&self) -> bool {
        !self.membership.registry.snapshot().is_empty()
    }

    pub fn subscriber_count(&self) -> usize {
        self.membership.registry.count()
    }
}

impl Default for BroadcastEngine {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}

fn log_removal(id: &SubscriberId, reason: CloseReason, remaining: usize) {
    match reason {
        CloseReason::Disconnected => {
            info!("Client {id} disconnected. Remaining clients: {remaining}")
        }
        CloseReason::TimedOut => {
            warn!("Client {id} timed out. Remaining clients: {remaining}")
        }
        CloseReason::WriteFailed => {
            warn!("Removed failed client {id} ({reason}). Remaining clients: {remaining}")
        }
        CloseReason::Shutdown => {
            debug!("Closed client {id} for shutdown. Remaining clients: {remaining}")
        }
    }
}

/// Removes its subscriber from the registry when dropped.
///
/// The guard never holds the sender: after the engine prunes a subscriber,
/// the transport's receiver drains what is queued and then ends.
pub struct SubscriptionGuard {
    membership: Arc<Membership>,
    id: SubscriberId,
}

impl Drop for SubscriptionGuard {
    fn drop(&mut self) {
        self.membership.remove(&self.id, CloseReason::Disconnected);
    }
}

/// The transport's side of one subscriber: messages arrive on `recv` until
/// the engine drops the subscriber. Dropping the subscription unsubscribes.
pub struct Subscription {
    receiver: MessageReceiver,
    guard: SubscriptionGuard,
}

impl Subscription {
    pub fn id(&self) -> &SubscriberId {
        &self.guard.id
    }

    /// Next message for this subscriber, or `None` once it has been removed.
    pub async fn recv(&mut self) -> Option<Message> {
        self.receiver.recv().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use std::sync::Barrier;
    use std::thread;

    /// Registry whose inserts and counts are slow enough for concurrent
    /// subscribes to overlap.
    struct SlowRegistry(ConnectionRegistry);

    impl SubscriberRegistry for SlowRegistry {
        fn add(&self, subscriber: Arc<Subscriber>) {
            thread::sleep(Duration::from_millis(5));
            self.0.add(subscriber);
        }

        fn remove(&self, id: &SubscriberId) -> Option<Arc<Subscriber>> {
            self.0.remove(id)
        }

        fn snapshot(&self) -> Vec<Arc<Subscriber>> {
            self.0.snapshot()
        }

        fn count(&self) -> usize {
            thread::sleep(Duration::from_millis(5));
            self.0.count()
        }
    }

    fn engine_with_limit(max_subscribers: usize) -> BroadcastEngine {
        BroadcastEngine::new(EngineConfig {
            max_subscribers: Some(max_subscribers),
            ..EngineConfig::default()
        })
    }

    fn engine_with_timeout(write_timeout: Duration) -> BroadcastEngine {
        BroadcastEngine::new(EngineConfig {
            write_timeout,
            ..EngineConfig::default()
        })
    }

    #[tokio::test]
    async fn test_publish_with_no_subscribers_is_declined() {
        let engine = BroadcastEngine::default();

        let result = engine.publish(1).await;

        assert_eq!(result.unwrap_err().error_kind, ErrorKind::NoSubscribers);
        assert_eq!(engine.state(), 0);
        assert_eq!(engine.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn test_republish_with_no_subscribers_is_declined() {
        let engine = BroadcastEngine::default();
        engine.update_state(9);

        let result = engine.republish_state().await;

        assert!(result.unwrap_err().is_no_subscribers());
        assert_eq!(engine.state(), 9);
    }

    #[tokio::test]
    async fn test_publish_reaches_every_subscriber() {
        let engine = BroadcastEngine::default();
        let mut subscriptions: Vec<Subscription> =
            (0..3).map(|_| engine.subscribe().unwrap()).collect();

        let delivery = engine.publish(11).await.unwrap();

        assert_eq!(
            delivery,
            Delivery {
                attempted: 3,
                delivered: 3,
                failed: 0
            }
        );
        for subscription in subscriptions.iter_mut() {
            assert_eq!(subscription.recv().await, Some(Message::Data(11)));
        }
    }

    #[tokio::test]
    async fn test_failed_write_prunes_only_that_subscriber() {
        let engine = BroadcastEngine::default();
        let mut first = engine.subscribe().unwrap();
        let Subscription {
            receiver: broken_receiver,
            guard: broken_guard,
        } = engine.subscribe().unwrap();
        let mut third = engine.subscribe().unwrap();
        drop(broken_receiver);

        let delivery = engine.publish(4).await.unwrap();

        assert_eq!(delivery.attempted, 3);
        assert_eq!(delivery.delivered, 2);
        assert_eq!(delivery.failed, 1);
        assert_eq!(engine.subscriber_count(), 2);
        assert!(!engine.unsubscribe(&broken_guard.id, CloseReason::Disconnected));
        assert_eq!(first.recv().await, Some(Message::Data(4)));
        assert_eq!(third.recv().await, Some(Message::Data(4)));

        // The transport noticing the same disconnect later is a no-op
        drop(broken_guard);
        assert_eq!(engine.subscriber_count(), 2);
    }

    #[tokio::test]
    async fn test_stalled_subscriber_times_out_and_is_removed() {
        let engine = BroadcastEngine::new(EngineConfig {
            subscriber_buffer: 1,
            write_timeout: Duration::from_millis(20),
            ..EngineConfig::default()
        });
        let _stalled = engine.subscribe().unwrap();
        let mut healthy = engine.subscribe().unwrap();

        // Fills the stalled subscriber's single slot
        engine.publish(1).await.unwrap();
        assert_eq!(healthy.recv().await, Some(Message::Data(1)));

        let delivery = engine.publish(2).await.unwrap();

        assert_eq!(delivery.delivered, 1);
        assert_eq!(delivery.failed, 1);
        assert_eq!(engine.subscriber_count(), 1);
        assert_eq!(healthy.recv().await, Some(Message::Data(2)));
    }

    #[tokio::test]
    async fn test_removed_subscriber_stream_ends_after_buffered_messages() {
        let engine = engine_with_timeout(Duration::from_millis(20));
        let mut subscription = engine.subscribe().unwrap();
        engine.publish(8).await.unwrap();

        assert!(engine.unsubscribe(&subscription.id().clone(), CloseReason::Disconnected));

        assert_eq!(subscription.recv().await, Some(Message::Data(8)));
        assert_eq!(subscription.recv().await, None);
    }

    #[tokio::test]
    async fn test_dropping_subscription_unsubscribes_once() {
        let engine = BroadcastEngine::default();
        let subscription = engine.subscribe().unwrap();
        let id = subscription.id().clone();
        assert_eq!(engine.subscriber_count(), 1);

        drop(subscription);

        assert_eq!(engine.subscriber_count(), 0);
        assert!(!engine.unsubscribe(&id, CloseReason::Disconnected));
    }

    #[tokio::test]
    async fn test_update_then_republish_delivers_new_state() {
        let engine = BroadcastEngine::default();
        let mut first = engine.subscribe().unwrap();
        let mut second = engine.subscribe().unwrap();

        engine.update_state(5);
        let delivery = engine.republish_state().await.unwrap();

        assert_eq!(delivery.delivered, 2);
        assert_eq!(first.recv().await, Some(Message::Data(5)));
        assert_eq!(second.recv().await, Some(Message::Data(5)));
        assert_eq!(engine.state(), 5);
    }

    #[tokio::test]
    async fn test_disconnected_subscriber_misses_later_publish() {
        let engine = BroadcastEngine::default();
        let mut a = engine.subscribe().unwrap();
        let mut b = engine.subscribe().unwrap();

        engine.update_state(42);
        engine.republish_state().await.unwrap();
        assert_eq!(a.recv().await, Some(Message::Data(42)));
        assert_eq!(b.recv().await, Some(Message::Data(42)));

        drop(b);
        let delivery = engine.publish(7).await.unwrap();

        assert_eq!(delivery.attempted, 1);
        assert_eq!(delivery.delivered, 1);
        assert_eq!(a.recv().await, Some(Message::Data(7)));
        assert_eq!(engine.subscriber_count(), 1);
    }

    #[tokio::test]
    async fn test_close_all_ends_every_stream() {
        let engine = BroadcastEngine::default();
        let mut first = engine.subscribe().unwrap();
        let mut second = engine.subscribe().unwrap();

        assert_eq!(engine.close_all(), 2);

        assert_eq!(engine.subscriber_count(), 0);
        assert_eq!(first.recv().await, None);
        assert_eq!(second.recv().await, None);
        assert!(engine.publish(1).await.unwrap_err().is_no_subscribers());
    }

    #[tokio::test]
    async fn test_subscribe_rejected_at_capacity() {
        let engine = engine_with_limit(1);
        let first = engine.subscribe().unwrap();

        let rejected = engine.subscribe().map(|_| ()).unwrap_err();
        assert_eq!(
            rejected.error_kind,
            ErrorKind::CapacityExceeded { max_subscribers: 1 }
        );

        drop(first);
        assert!(engine.subscribe().is_ok());
    }

    #[test]
    fn test_concurrent_subscribes_never_exceed_the_limit() {
        let engine = Arc::new(BroadcastEngine::with_registry(
            EngineConfig {
                max_subscribers: Some(1),
                ..EngineConfig::default()
            },
            Arc::new(SlowRegistry(ConnectionRegistry::new())),
        ));
        let barrier = Arc::new(Barrier::new(8));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let engine = Arc::clone(&engine);
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    barrier.wait();
                    engine.subscribe()
                })
            })
            .collect();
        let results: Vec<Result<Subscription, Error>> =
            handles.into_iter().map(|h| h.join().unwrap()).collect();

        assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
        assert_eq!(engine.subscriber_count(), 1);
        for rejected in results.iter().filter_map(|r| r.as_ref().err()) {
            assert_eq!(
                rejected.error_kind,
                ErrorKind::CapacityExceeded { max_subscribers: 1 }
            );
        }

        drop(results);
        assert_eq!(engine.subscriber_count(), 0);
        assert!(engine.subscribe().is_ok());
    }

    #[tokio::test]
    async fn test_pruned_subscriber_releases_its_slot() {
        let engine = engine_with_limit(1);
        let Subscription { receiver, guard } = engine.subscribe().unwrap();
        drop(receiver);

        let delivery = engine.publish(1).await.unwrap();
        assert_eq!(delivery.failed, 1);

        let replacement = engine.subscribe();
        assert!(replacement.is_ok());
        drop(guard);
        assert_eq!(engine.subscriber_count(), 1);
    }

    #[tokio::test]
    async fn test_stalled_subscribers_do_not_delay_healthy_delivery() {
        let write_timeout = Duration::from_millis(500);
        let engine = Arc::new(BroadcastEngine::new(EngineConfig {
            subscriber_buffer: 1,
            write_timeout,
            ..EngineConfig::default()
        }));
        let _first_stalled = engine.subscribe().unwrap();
        let _second_stalled = engine.subscribe().unwrap();
        let mut healthy = engine.subscribe().unwrap();

        // Fills both stalled queues
        engine.publish(1).await.unwrap();
        assert_eq!(healthy.recv().await, Some(Message::Data(1)));

        let started = tokio::time::Instant::now();
        let publisher = tokio::spawn({
            let engine = Arc::clone(&engine);
            async move { engine.publish(2).await }
        });

        let received = tokio::time::timeout(write_timeout / 2, healthy.recv()).await;
        assert_eq!(received.ok().flatten(), Some(Message::Data(2)));

        let delivery = publisher.await.unwrap().unwrap();
        let elapsed = started.elapsed();
        assert_eq!(delivery.delivered, 1);
        assert_eq!(delivery.failed, 2);
        assert!(
            elapsed < write_timeout * 2,
            "publish took {elapsed:?}, expected about one write timeout"
        );
    }

    #[tokio::test]
    async fn test_subscribe_refused_after_close_all() {
        let engine = BroadcastEngine::default();
        let mut open = engine.subscribe().unwrap();

        engine.close_all();

        let refused = engine.subscribe().map(|_| ()).unwrap_err();
        assert_eq!(refused.error_kind, ErrorKind::ShuttingDown);
        assert_eq!(engine.subscriber_count(), 0);
        assert_eq!(open.recv().await, None);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_subscribers_and_publishers() {
        let engine = Arc::new(BroadcastEngine::default());

        let subscribers: Vec<_> = (0..20)
            .map(|_| {
                let engine = Arc::clone(&engine);
                tokio::spawn(async move { engine.subscribe().unwrap() })
            })
            .collect();
        let mut subscriptions = Vec::new();
        for task in subscribers {
            subscriptions.push(task.await.unwrap());
        }

        let publishers: Vec<_> = (0..5)
            .map(|value| {
                let engine = Arc::clone(&engine);
                tokio::spawn(async move { engine.publish(value).await.unwrap() })
            })
            .collect();
        for task in publishers {
            let delivery = task.await.unwrap();
            assert_eq!(delivery.delivered, 20);
        }

        for subscription in subscriptions.iter_mut() {
            let mut received = Vec::new();
            for _ in 0..5 {
                if let Some(Message::Data(value)) = subscription.recv().await {
                    received.push(value);
                }
            }
            received.sort_unstable();
            assert_eq!(received, vec![0, 1, 2, 3, 4]);
        }

        subscriptions.truncate(5);
        assert_eq!(engine.subscriber_count(), 5);
    }
}
