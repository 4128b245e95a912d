use crate::connection::{Subscriber, SubscriberId};
use dashmap::DashMap;
use std::sync::Arc;

/// A concurrency-safe set of live subscribers.
///
/// Implementations must allow `add`, `remove` and `snapshot` to be called
/// from any number of tasks at once. A subscriber is a member if and only if
/// it is `Open`; callers close a subscriber before removing it.
pub trait SubscriberRegistry: Send + Sync {
    /// Insert a subscriber. Never fails.
    fn add(&self, subscriber: Arc<Subscriber>);

    /// Remove a subscriber if present.
    ///
    /// Returns the removed handle to exactly one caller; every other call for
    /// the same id, concurrent or later, gets `None`.
    fn remove(&self, id: &SubscriberId) -> Option<Arc<Subscriber>>;

    /// Point-in-time copy of the members, oldest subscriber first.
    ///
    /// Later membership changes never show up in a snapshot already taken.
    fn snapshot(&self) -> Vec<Arc<Subscriber>>;

    /// Current number of members. Diagnostics only.
    fn count(&self) -> usize;
}

/// Sharded-map registry keyed by subscriber id - O(1) add and remove
pub struct ConnectionRegistry {
    connections: DashMap<SubscriberId, Arc<Subscriber>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self {
            connections: DashMap::new(),
        }
    }
}

impl Default for ConnectionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl SubscriberRegistry for ConnectionRegistry {
    fn add(&self, subscriber: Arc<Subscriber>) {
        self.connections.insert(subscriber.id().clone(), subscriber);
    }

    fn remove(&self, id: &SubscriberId) -> Option<Arc<Subscriber>> {
        self.connections.remove(id).map(|(_, subscriber)| subscriber)
    }

    fn snapshot(&self) -> Vec<Arc<Subscriber>> {
        let mut subscribers: Vec<Arc<Subscriber>> = self
            .connections
            .iter()
            .map(|entry| Arc::clone(entry.value()))
            .collect();

        subscribers.sort_by_key(|subscriber| subscriber.id().sequence());
        subscribers
    }

    fn count(&self) -> usize {
        self.connections.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    fn new_subscriber() -> Arc<Subscriber> {
        let (tx, _rx) = mpsc::channel(1);
        Arc::new(Subscriber::new(tx))
    }

    #[test]
    fn test_add_and_remove_update_count() {
        let registry = ConnectionRegistry::new();
        let first = new_subscriber();
        let second = new_subscriber();

        registry.add(first.clone());
        registry.add(second.clone());
        assert_eq!(registry.count(), 2);

        assert!(registry.remove(first.id()).is_some());
        assert_eq!(registry.count(), 1);
    }

    #[test]
    fn test_remove_is_idempotent() {
        let registry = ConnectionRegistry::new();
        let subscriber = new_subscriber();
        registry.add(subscriber.clone());

        assert!(registry.remove(subscriber.id()).is_some());
        assert!(registry.remove(subscriber.id()).is_none());
        assert_eq!(registry.count(), 0);
    }

    #[test]
    fn test_remove_of_unknown_subscriber_is_a_no_op() {
        let registry = ConnectionRegistry::new();
        registry.add(new_subscriber());

        let stranger = new_subscriber();
        assert!(registry.remove(stranger.id()).is_none());
        assert_eq!(registry.count(), 1);
    }

    #[test]
    fn test_adding_the_same_subscriber_twice_keeps_one_entry() {
        let registry = ConnectionRegistry::new();
        let subscriber = new_subscriber();

        registry.add(subscriber.clone());
        registry.add(subscriber.clone());

        assert_eq!(registry.count(), 1);
        assert_eq!(registry.snapshot().len(), 1);
    }

    #[test]
    fn test_snapshot_is_isolated_from_later_changes() {
        let registry = ConnectionRegistry::new();
        let first = new_subscriber();
        let second = new_subscriber();
        registry.add(first.clone());
        registry.add(second.clone());

        let snapshot = registry.snapshot();
        registry.remove(first.id());
        registry.add(new_subscriber());

        let ids: Vec<&SubscriberId> = snapshot.iter().map(|s| s.id()).collect();
        assert_eq!(ids, vec![first.id(), second.id()]);
        assert_eq!(registry.count(), 2);
    }

    #[test]
    fn test_snapshot_is_ordered_by_arrival() {
        let registry = ConnectionRegistry::new();
        let subscribers: Vec<Arc<Subscriber>> = (0..16).map(|_| new_subscriber()).collect();
        for subscriber in subscribers.iter().rev() {
            registry.add(subscriber.clone());
        }

        let sequences: Vec<u64> = registry
            .snapshot()
            .iter()
            .map(|s| s.id().sequence())
            .collect();
        let mut sorted = sequences.clone();
        sorted.sort_unstable();

        assert_eq!(sequences, sorted);
    }

    #[test]
    fn test_concurrent_adds_and_removes_leave_consistent_count() {
        let registry = Arc::new(ConnectionRegistry::new());
        let subscribers: Vec<Arc<Subscriber>> = (0..200).map(|_| new_subscriber()).collect();

        let handles: Vec<_> = subscribers
            .chunks(20)
            .map(|chunk| {
                let registry = Arc::clone(&registry);
                let chunk = chunk.to_vec();
                std::thread::spawn(move || {
                    for subscriber in &chunk {
                        registry.add(subscriber.clone());
                    }
                    // Remove every even-sequence subscriber, twice
                    let mut removed = 0;
                    for subscriber in &chunk {
                        if subscriber.id().sequence() % 2 == 0 {
                            if registry.remove(subscriber.id()).is_some() {
                                removed += 1;
                            }
                            assert!(registry.remove(subscriber.id()).is_none());
                        }
                    }
                    removed
                })
            })
            .collect();

        let removed: usize = handles.into_iter().map(|h| h.join().unwrap()).sum();

        assert_eq!(registry.count(), subscribers.len() - removed);
        assert_eq!(registry.snapshot().len(), registry.count());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_racing_removals_of_one_subscriber_remove_it_once() {
        let registry = Arc::new(ConnectionRegistry::new());
        let subscriber = new_subscriber();
        registry.add(subscriber.clone());

        let tasks: Vec<_> = (0..8)
            .map(|_| {
                let registry = Arc::clone(&registry);
                let id = subscriber.id().clone();
                tokio::spawn(async move { registry.remove(&id).is_some() })
            })
            .collect();

        let mut successes = 0;
        for task in tasks {
            if task.await.unwrap() {
                successes += 1;
            }
        }

        assert_eq!(successes, 1);
        assert_eq!(registry.count(), 0);
    }
}
