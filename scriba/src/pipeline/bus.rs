//! Per-session progress bus: a bounded, ordered event queue with a single
//! live subscriber.
//!
//! The orchestrator publishes through an [`EventPublisher`]; publishing
//! applies backpressure (it waits for queue space) instead of dropping, so
//! every status transition is observed at least once. At most one
//! [`Subscription`] drains the queue at a time; attaching a new one detaches
//! the previous subscriber immediately. Detaching never cancels the
//! pipeline, and a later subscriber resumes from the current queue position
//! with no replay of already-delivered events.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::{Duration, Instant};

use tokio::sync::{Notify, mpsc};

use super::events::PipelineEvent;

/// Default bounded queue capacity.
pub const DEFAULT_BUS_CAPACITY: usize = 256;

/// Default keep-alive interval for idle subscribers.
pub const DEFAULT_PING_INTERVAL: Duration = Duration::from_secs(30);

struct BusShared {
    rx: tokio::sync::Mutex<mpsc::Receiver<PipelineEvent>>,
    /// Bumped on every subscribe; a subscription is live while its epoch
    /// matches.
    epoch: AtomicU64,
    attached: AtomicBool,
    last_activity: parking_lot::Mutex<Instant>,
    detach: Notify,
    ping_interval: Duration,
}

/// Producer handle onto a session's event queue.
#[derive(Clone)]
pub struct EventPublisher {
    tx: mpsc::Sender<PipelineEvent>,
}

impl EventPublisher {
    /// Append an event, waiting for queue space when the buffer is full.
    pub async fn publish(&self, event: PipelineEvent) {
        if self.tx.send(event).await.is_err() {
            // Bus reclaimed while the pipeline still runs; nothing listens.
            tracing::debug!("progress bus closed; event dropped");
        }
    }
}

/// Consumer/admin side of the bus, owned by the session.
pub struct ProgressBus {
    shared: Arc<BusShared>,
}

impl ProgressBus {
    /// Create a bus and its producer handle.
    pub fn new(capacity: usize, ping_interval: Duration) -> (Self, EventPublisher) {
        let (tx, rx) = mpsc::channel(capacity);
        let shared = Arc::new(BusShared {
            rx: tokio::sync::Mutex::new(rx),
            epoch: AtomicU64::new(0),
            attached: AtomicBool::new(false),
            last_activity: parking_lot::Mutex::new(Instant::now()),
            detach: Notify::new(),
            ping_interval,
        });
        (Self { shared }, EventPublisher { tx })
    }

    /// Attach a subscriber, detaching any previous one immediately.
    pub fn subscribe(&self) -> Subscription {
        let epoch = self.shared.epoch.fetch_add(1, Ordering::SeqCst) + 1;
        self.shared.attached.store(true, Ordering::SeqCst);
        *self.shared.last_activity.lock() = Instant::now();
        self.shared.detach.notify_waiters();
        Subscription {
            shared: Arc::clone(&self.shared),
            epoch,
        }
    }

    /// Whether a subscriber is currently attached.
    pub fn has_subscriber(&self) -> bool {
        self.shared.attached.load(Ordering::SeqCst)
    }

    /// How long the bus has been subscriber-free; zero while attached.
    pub fn idle_for(&self) -> Duration {
        if self.has_subscriber() {
            Duration::ZERO
        } else {
            self.shared.last_activity.lock().elapsed()
        }
    }
}

/// A live drain handle. Dropping it releases the slot without touching the
/// pipeline.
pub struct Subscription {
    shared: Arc<BusShared>,
    epoch: u64,
}

impl Subscription {
    fn is_current(&self) -> bool {
        self.shared.epoch.load(Ordering::SeqCst) == self.epoch
    }

    /// Next event in publish order.
    ///
    /// Yields `Ping` when nothing arrives within the keep-alive interval.
    /// Returns `None` once this subscription has been detached by a newer
    /// one, or once the producer side is closed and the queue is drained.
    pub async fn recv(&mut self) -> Option<PipelineEvent> {
        loop {
            if !self.is_current() {
                return None;
            }

            // Detach always wins over a ready event so a displaced
            // subscriber can never consume something meant for its
            // replacement.
            let detached = self.shared.detach.notified();
            let mut rx = tokio::select! {
                biased;
                _ = detached => continue,
                guard = self.shared.rx.lock() => guard,
            };
            if !self.is_current() {
                return None;
            }

            let detached = self.shared.detach.notified();
            tokio::select! {
                biased;
                _ = detached => continue,
                event = rx.recv() => return event,
                _ = tokio::time::sleep(self.shared.ping_interval) => {
                    return Some(PipelineEvent::Ping);
                }
            }
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        // Only the current subscriber releases the slot; a detached one
        // dropping later must not clobber its replacement's state.
        if self.is_current() {
            self.shared.attached.store(false, Ordering::SeqCst);
            *self.shared.last_activity.lock() = Instant::now();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::events::EventLogLevel;
    use tokio::time::timeout;

    const PING: Duration = Duration::from_millis(50);

    fn log(msg: &str) -> PipelineEvent {
        PipelineEvent::log(EventLogLevel::Info, msg)
    }

    fn message(event: &PipelineEvent) -> String {
        match event {
            PipelineEvent::Log { message, .. } => message.clone(),
            other => panic!("expected log event, got {}", other.kind()),
        }
    }

    #[tokio::test]
    async fn test_events_delivered_in_publish_order() {
        let (bus, publisher) = ProgressBus::new(8, DEFAULT_PING_INTERVAL);
        for i in 0..3 {
            publisher.publish(log(&format!("e{i}"))).await;
        }
        let mut sub = bus.subscribe();
        for i in 0..3 {
            let event = sub.recv().await.unwrap();
            assert_eq!(message(&event), format!("e{i}"));
        }
    }

    #[tokio::test]
    async fn test_stream_ends_when_producer_closes() {
        let (bus, publisher) = ProgressBus::new(8, DEFAULT_PING_INTERVAL);
        publisher.publish(PipelineEvent::Done).await;
        drop(publisher);

        let mut sub = bus.subscribe();
        assert!(matches!(sub.recv().await, Some(PipelineEvent::Done)));
        assert!(sub.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_ping_on_idle() {
        let (bus, _publisher) = ProgressBus::new(8, PING);
        let mut sub = bus.subscribe();
        let event = timeout(Duration::from_secs(1), sub.recv())
            .await
            .expect("keep-alive must fire")
            .unwrap();
        assert!(matches!(event, PipelineEvent::Ping));
    }

    #[tokio::test]
    async fn test_second_subscriber_detaches_first() {
        let (bus, publisher) = ProgressBus::new(8, DEFAULT_PING_INTERVAL);
        let mut first = bus.subscribe();
        let waiter = tokio::spawn(async move { first.recv().await });

        // Give the first subscriber time to park on the queue.
        tokio::time::sleep(Duration::from_millis(20)).await;
        let mut second = bus.subscribe();
        publisher.publish(log("after-switch")).await;

        let first_result = timeout(Duration::from_secs(1), waiter)
            .await
            .expect("detached subscriber must wake")
            .unwrap();
        assert!(first_result.is_none());

        let event = timeout(Duration::from_secs(1), second.recv())
            .await
            .expect("new subscriber must receive")
            .unwrap();
        assert_eq!(message(&event), "after-switch");
    }

    #[tokio::test]
    async fn test_no_replay_after_resubscribe() {
        let (bus, publisher) = ProgressBus::new(8, DEFAULT_PING_INTERVAL);
        publisher.publish(log("first")).await;

        let mut sub = bus.subscribe();
        assert_eq!(message(&sub.recv().await.unwrap()), "first");
        drop(sub);
        assert!(!bus.has_subscriber());

        publisher.publish(log("second")).await;
        let mut sub = bus.subscribe();
        assert_eq!(message(&sub.recv().await.unwrap()), "second");
    }

    #[tokio::test]
    async fn test_publish_applies_backpressure_when_full() {
        let (bus, publisher) = ProgressBus::new(1, DEFAULT_PING_INTERVAL);
        publisher.publish(log("a")).await;

        let blocked = tokio::spawn({
            let publisher = publisher.clone();
            async move { publisher.publish(log("b")).await }
        });
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!blocked.is_finished(), "publish must wait for queue space");

        let mut sub = bus.subscribe();
        assert_eq!(message(&sub.recv().await.unwrap()), "a");
        timeout(Duration::from_secs(1), blocked)
            .await
            .expect("publish must resume after a drain")
            .unwrap();
        assert_eq!(message(&sub.recv().await.unwrap()), "b");
    }
}
