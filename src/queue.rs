//! Bounded per-subscription delivery queues.
//!
//! Every subscription owns one queue. Producers (the notifier stub, the
//! registry) post events from arbitrary threads; events are drained and
//! handed to the consumer callback on the consumer's own execution
//! context, never on the producer's thread. A full queue drops its
//! oldest event and counts the loss rather than blocking the producer.

use std::collections::VecDeque;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use tracing::warn;

use crate::context::ContextHandle;
use crate::error::QueueError;

/// Tuning for a delivery queue.
#[derive(Debug, Clone, Copy)]
pub struct QueueConfig {
    /// Maximum events held before the oldest is discarded.
    pub capacity: usize,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self { capacity: 1024 }
    }
}

/// Point-in-time counters for one queue.
#[derive(Debug, Clone)]
pub struct QueueStats {
    /// Events currently waiting to be drained.
    pub queued: usize,
    /// Events discarded to overflow since creation.
    pub dropped: u64,
    /// Whether the queue has been retired.
    pub retired: bool,
    /// When the queue was created.
    pub since: DateTime<Utc>,
}

type Consumer<E> = Arc<dyn Fn(E) + Send + Sync>;

struct Inner<E> {
    events: VecDeque<E>,
    consumer: Option<Consumer<E>>,
}

/// A bounded queue feeding one consumer callback on one context.
pub struct DeliveryQueue<E> {
    inner: Mutex<Inner<E>>,
    dropped: AtomicU64,
    wake_pending: AtomicBool,
    retired: AtomicBool,
    capacity: usize,
    label: String,
    ctx: ContextHandle,
    since: DateTime<Utc>,
}

impl<E: Send + 'static> DeliveryQueue<E> {
    /// Creates a queue draining onto `ctx`, invoking `consumer` per event.
    pub fn new(
        label: impl Into<String>,
        config: QueueConfig,
        ctx: ContextHandle,
        consumer: impl Fn(E) + Send + Sync + 'static,
    ) -> Arc<Self> {
        Arc::new(Self {
            inner: Mutex::new(Inner {
                events: VecDeque::new(),
                consumer: Some(Arc::new(consumer)),
            }),
            dropped: AtomicU64::new(0),
            wake_pending: AtomicBool::new(false),
            retired: AtomicBool::new(false),
            capacity: config.capacity.max(1),
            label: label.into(),
            ctx,
            since: Utc::now(),
        })
    }

    /// Enqueues an event and schedules a drain on the consumer context.
    ///
    /// Retired queues and queues whose context is torn down drop the
    /// event silently; a dead context also retires the queue since
    /// nothing can drain it anymore.
    pub fn post(self: &Arc<Self>, event: E) {
        let _ = self.try_post(event);
    }

    /// Like [`post`](Self::post) but reports why an event was refused.
    ///
    /// The event is dropped either way; dispatch paths ignore the
    /// result, diagnostics can branch on it.
    pub fn try_post(self: &Arc<Self>, event: E) -> Result<(), QueueError> {
        if self.is_retired() {
            return Err(QueueError::Retired);
        }
        if !self.ctx.is_alive() {
            self.retire();
            return Err(QueueError::ContextTornDown);
        }
        {
            let mut inner = self.lock_inner();
            if inner.events.len() >= self.capacity {
                inner.events.pop_front();
                let total = self.dropped.fetch_add(1, Ordering::Relaxed) + 1;
                warn!(
                    "delivery queue '{}' full (capacity {}), dropped oldest event ({} total)",
                    self.label, self.capacity, total
                );
            }
            inner.events.push_back(event);
        }
        self.schedule_wake();
        Ok(())
    }

    /// Stops delivery permanently and discards any backlog.
    ///
    /// Idempotent. Events already snapshot by a running drain are
    /// re-checked against this flag and skipped.
    pub fn retire(&self) {
        if self.retired.swap(true, Ordering::AcqRel) {
            return;
        }
        let mut inner = self.lock_inner();
        inner.events.clear();
        inner.consumer = None;
    }

    /// Returns true once [`retire`](Self::retire) has run.
    #[must_use]
    pub fn is_retired(&self) -> bool {
        self.retired.load(Ordering::Acquire)
    }

    /// Total events discarded to overflow since creation.
    #[must_use]
    pub fn dropped_events(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Current counters for this queue.
    #[must_use]
    pub fn stats(&self) -> QueueStats {
        QueueStats {
            queued: self.lock_inner().events.len(),
            dropped: self.dropped_events(),
            retired: self.is_retired(),
            since: self.since,
        }
    }

    /// Schedules at most one pending drain task per burst of posts.
    fn schedule_wake(self: &Arc<Self>) {
        if self.wake_pending.swap(true, Ordering::AcqRel) {
            return;
        }
        let queue = Arc::clone(self);
        if !self.ctx.post(Box::new(move || queue.drain())) {
            self.wake_pending.store(false, Ordering::Release);
        }
    }

    /// Runs on the consumer context: snapshots the backlog and invokes
    /// the consumer outside the lock, so callbacks may retire or
    /// re-post without deadlocking.
    fn drain(self: &Arc<Self>) {
        // Cleared before the snapshot so posts racing with this pass
        // schedule a fresh wake instead of stranding their events.
        self.wake_pending.store(false, Ordering::Release);

        let (events, consumer) = {
            let mut inner = self.lock_inner();
            let events = std::mem::take(&mut inner.events);
            (events, inner.consumer.clone())
        };
        let Some(consumer) = consumer else {
            return;
        };
        for event in events {
            if self.is_retired() || !self.ctx.is_alive() {
                break;
            }
            consumer(event);
        }
    }

    fn lock_inner(&self) -> MutexGuard<'_, Inner<E>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<E> fmt::Debug for DeliveryQueue<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeliveryQueue")
            .field("label", &self.label)
            .field("capacity", &self.capacity)
            .field("dropped", &self.dropped.load(Ordering::Relaxed))
            .field("retired", &self.retired.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::EventLoop;
    use std::sync::Mutex as StdMutex;

    fn collector() -> (Arc<StdMutex<Vec<u32>>>, impl Fn(u32) + Send + Sync) {
        let seen = Arc::new(StdMutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        (seen, move |event| sink.lock().unwrap().push(event))
    }

    #[test]
    fn test_events_arrive_in_post_order() {
        let event_loop = EventLoop::new();
        let (seen, sink) = collector();
        let queue = DeliveryQueue::new("t", QueueConfig::default(), event_loop.handle(), sink);

        for i in 0..8 {
            queue.post(i);
        }
        event_loop.run_until_idle();
        assert_eq!(*seen.lock().unwrap(), (0..8).collect::<Vec<_>>());
    }

    #[test]
    fn test_burst_coalesces_to_one_wake() {
        let event_loop = EventLoop::new();
        let (seen, sink) = collector();
        let queue = DeliveryQueue::new("t", QueueConfig::default(), event_loop.handle(), sink);

        for i in 0..100 {
            queue.post(i);
        }
        // One drain task covers the whole burst.
        assert_eq!(event_loop.run_until_idle(), 1);
        assert_eq!(seen.lock().unwrap().len(), 100);
    }

    #[test]
    fn test_overflow_drops_oldest() {
        let event_loop = EventLoop::new();
        let (seen, sink) = collector();
        let queue = DeliveryQueue::new(
            "t",
            QueueConfig { capacity: 4 },
            event_loop.handle(),
            sink,
        );

        for i in 0..6 {
            queue.post(i);
        }
        event_loop.run_until_idle();
        assert_eq!(*seen.lock().unwrap(), vec![2, 3, 4, 5]);
        assert_eq!(queue.dropped_events(), 2);
    }

    #[test]
    fn test_retire_discards_backlog_and_later_posts() {
        let event_loop = EventLoop::new();
        let (seen, sink) = collector();
        let queue = DeliveryQueue::new("t", QueueConfig::default(), event_loop.handle(), sink);

        queue.post(1);
        queue.retire();
        queue.retire();
        assert!(matches!(queue.try_post(2), Err(QueueError::Retired)));
        event_loop.run_until_idle();

        assert!(seen.lock().unwrap().is_empty());
        assert!(queue.is_retired());
        assert_eq!(queue.stats().queued, 0);
    }

    #[test]
    fn test_retire_from_consumer_skips_remaining_snapshot() {
        let event_loop = EventLoop::new();
        let seen = Arc::new(StdMutex::new(Vec::new()));
        let queue_slot: Arc<StdMutex<Option<Arc<DeliveryQueue<u32>>>>> =
            Arc::new(StdMutex::new(None));

        let sink_seen = Arc::clone(&seen);
        let sink_slot = Arc::clone(&queue_slot);
        let queue = DeliveryQueue::new(
            "t",
            QueueConfig::default(),
            event_loop.handle(),
            move |event: u32| {
                sink_seen.lock().unwrap().push(event);
                if let Some(queue) = sink_slot.lock().unwrap().as_ref() {
                    queue.retire();
                }
            },
        );
        *queue_slot.lock().unwrap() = Some(Arc::clone(&queue));

        for i in 0..5 {
            queue.post(i);
        }
        event_loop.run_until_idle();
        assert_eq!(*seen.lock().unwrap(), vec![0]);
    }

    #[test]
    fn test_dead_context_retires_queue() {
        let event_loop = EventLoop::new();
        let (seen, sink) = collector();
        let queue = DeliveryQueue::new("t", QueueConfig::default(), event_loop.handle(), sink);

        event_loop.tear_down();
        assert!(matches!(
            queue.try_post(1),
            Err(QueueError::ContextTornDown)
        ));

        assert!(queue.is_retired());
        assert!(seen.lock().unwrap().is_empty());
    }

    #[test]
    fn test_posts_during_drain_get_a_new_wake() {
        let event_loop = EventLoop::new();
        let seen = Arc::new(StdMutex::new(Vec::new()));
        let queue_slot: Arc<StdMutex<Option<Arc<DeliveryQueue<u32>>>>> =
            Arc::new(StdMutex::new(None));

        let sink_seen = Arc::clone(&seen);
        let sink_slot = Arc::clone(&queue_slot);
        let queue = DeliveryQueue::new(
            "t",
            QueueConfig::default(),
            event_loop.handle(),
            move |event: u32| {
                sink_seen.lock().unwrap().push(event);
                if event == 0 {
                    if let Some(queue) = sink_slot.lock().unwrap().as_ref() {
                        queue.post(99);
                    }
                }
            },
        );
        *queue_slot.lock().unwrap() = Some(Arc::clone(&queue));

        queue.post(0);
        event_loop.run_until_idle();
        event_loop.run_until_idle();
        assert_eq!(*seen.lock().unwrap(), vec![0, 99]);
    }

    #[test]
    fn test_cross_thread_posts_preserve_per_thread_order() {
        let event_loop = EventLoop::new();
        let (seen, sink) = collector();
        let queue = DeliveryQueue::new("t", QueueConfig::default(), event_loop.handle(), sink);

        let poster = {
            let queue = Arc::clone(&queue);
            std::thread::spawn(move || {
                for i in 0..50 {
                    queue.post(i);
                }
            })
        };
        poster.join().unwrap();

        while event_loop.run_until_idle() > 0 {}
        assert_eq!(*seen.lock().unwrap(), (0..50).collect::<Vec<_>>());
    }
}
