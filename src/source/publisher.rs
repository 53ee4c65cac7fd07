use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
};
use tokio::sync::mpsc;

pub type SubscriberId = u64;

struct Subscriber<T> {
    sender: mpsc::Sender<Arc<T>>,
    /// Age of the last delivered snapshot, `None` if nothing was delivered yet.
    seen: Option<DateTime<Utc>>,
}

/// Fan-out of snapshots to registered channels.
///
/// Every subscriber receives each snapshot at most once: a snapshot is only
/// sent to subscribers that have not yet seen one at least as recent. A
/// subscriber registered after a snapshot was published gets it on the next
/// [`Publisher::publish`] call.
///
/// Sending waits for room in the subscriber's channel, so a slow consumer
/// holds back delivery to the subscribers after it within the same call.
/// Give channels a buffer to decouple them.
pub struct Publisher<T> {
    subscribers: RwLock<HashMap<SubscriberId, Subscriber<T>>>,
    next_id: AtomicU64,
    // keeps deliveries to a single subscriber in publish order
    publishing: tokio::sync::Mutex<()>,
}

impl<T> Default for Publisher<T> {
    fn default() -> Self {
        Self {
            subscribers: Default::default(),
            next_id: AtomicU64::new(1),
            publishing: Default::default(),
        }
    }
}

impl<T: Send + Sync + 'static> Publisher<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, sender: mpsc::Sender<Arc<T>>) -> SubscriberId {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.subscribers
            .write()
            .insert(id, Subscriber { sender, seen: None });
        id
    }

    /// Returns `false` if the subscriber was not registered.
    pub fn unregister(&self, id: SubscriberId) -> bool {
        self.subscribers.write().remove(&id).is_some()
    }

    /// Registers a fresh channel and wraps its receiving end into a
    /// [`Subscription`] that unregisters itself when dropped.
    pub fn subscribe(self: &Arc<Self>, buffer: usize) -> Subscription<T> {
        let (sender, receiver) = mpsc::channel(buffer.max(1));
        let id = self.register(sender);
        Subscription {
            id,
            receiver,
            publisher: Arc::clone(self),
        }
    }

    pub fn len(&self) -> usize {
        self.subscribers.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.subscribers.read().is_empty()
    }

    /// Sends `value` to every subscriber that has only seen snapshots older
    /// than `age`. Returns the number of deliveries.
    pub async fn publish(&self, value: Arc<T>, age: DateTime<Utc>) -> usize {
        let _publishing = self.publishing.lock().await;
        let owed: Vec<_> = {
            let subscribers = self.subscribers.read();
            subscribers
                .iter()
                .filter(|(_, subscriber)| subscriber.seen.map_or(true, |seen| seen < age))
                .map(|(id, subscriber)| (*id, subscriber.sender.clone()))
                .collect()
        };

        let mut delivered = 0;
        for (id, sender) in owed {
            if sender.send(Arc::clone(&value)).await.is_err() {
                tracing::debug!(subscriber = id, "subscriber channel is closed");
                continue;
            }
            // could have been unregistered while we were sending
            if let Some(subscriber) = self.subscribers.write().get_mut(&id) {
                subscriber.seen = Some(age);
            }
            delivered += 1;
        }
        delivered
    }
}

/// Receiving end of a [`Publisher`] registration.
pub struct Subscription<T: Send + Sync + 'static> {
    id: SubscriberId,
    receiver: mpsc::Receiver<Arc<T>>,
    publisher: Arc<Publisher<T>>,
}

impl<T: Send + Sync + 'static> Subscription<T> {
    pub fn id(&self) -> SubscriberId {
        self.id
    }

    /// Waits for the next snapshot. Returns `None` once the publisher is gone.
    pub async fn recv(&mut self) -> Option<Arc<T>> {
        self.receiver.recv().await
    }
}

impl<T: Send + Sync + 'static> Drop for Subscription<T> {
    fn drop(&mut self) {
        self.publisher.unregister(self.id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::date;
    use pretty_assertions::assert_eq;
    use std::time::Duration;
    use tokio::time::timeout;

    const TIMEOUT: Duration = Duration::from_secs(10);

    #[tokio::test]
    async fn late_subscriber_gets_current_snapshot() {
        let publisher = Arc::new(Publisher::new());
        let value = Arc::new("first".to_string());
        assert_eq!(publisher.publish(value.clone(), date("2022-01-01")).await, 0);

        let mut subscription = publisher.subscribe(1);
        assert_eq!(publisher.publish(value, date("2022-01-01")).await, 1);
        assert_eq!(subscription.recv().await.unwrap().as_str(), "first");
    }

    #[tokio::test]
    async fn snapshot_is_delivered_once() {
        let publisher = Arc::new(Publisher::new());
        let mut subscription = publisher.subscribe(4);

        assert_eq!(publisher.publish(Arc::new(1), date("2022-01-02")).await, 1);
        assert_eq!(publisher.publish(Arc::new(1), date("2022-01-02")).await, 0);
        // older snapshots are never sent
        assert_eq!(publisher.publish(Arc::new(0), date("2022-01-01")).await, 0);
        assert_eq!(publisher.publish(Arc::new(2), date("2022-01-03")).await, 1);

        assert_eq!(*subscription.recv().await.unwrap(), 1);
        assert_eq!(*subscription.recv().await.unwrap(), 2);
        assert!(subscription.receiver.try_recv().is_err());
    }

    #[tokio::test]
    async fn every_subscriber_gets_snapshot() {
        let publisher = Arc::new(Publisher::new());
        let mut subscriptions: Vec<_> = (0..3).map(|_| publisher.subscribe(1)).collect();

        assert_eq!(publisher.publish(Arc::new(7), date("2022-01-01")).await, 3);
        for subscription in subscriptions.iter_mut() {
            assert_eq!(*subscription.recv().await.unwrap(), 7);
        }
    }

    #[tokio::test]
    async fn drop_unregisters() {
        let publisher = Arc::new(Publisher::<u32>::new());
        let first = publisher.subscribe(1);
        let second = publisher.subscribe(1);
        assert_eq!(publisher.len(), 2);

        drop(first);
        assert_eq!(publisher.len(), 1);
        assert!(!publisher.unregister(second.id() + 100));
        drop(second);
        assert!(publisher.is_empty());
    }

    #[tokio::test]
    async fn unregister_while_publishing() {
        let publisher = Arc::new(Publisher::new());
        let subscription = publisher.subscribe(1);

        // fill the channel so the next publish blocks
        assert_eq!(publisher.publish(Arc::new(1), date("2022-01-01")).await, 1);
        let handle = {
            let publisher = publisher.clone();
            tokio::spawn(async move { publisher.publish(Arc::new(2), date("2022-01-02")).await })
        };
        tokio::task::yield_now().await;
        assert!(!handle.is_finished());

        drop(subscription);
        let delivered = timeout(TIMEOUT, handle)
            .await
            .expect("publish should not block on a dropped subscriber")
            .unwrap();
        assert_eq!(delivered, 0);
        assert!(publisher.is_empty());
    }
}
