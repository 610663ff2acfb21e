//! EventQueue - bounded, drop-oldest event buffer
//!
//! A `HeapRb` guarded by a mutex. Insertion never blocks: when the ring is
//! full the oldest buffered event is evicted to admit the new one. Every
//! counter is updated under the same lock as the ring itself, so eviction
//! composes atomically with insertion and with concurrent dequeues from any
//! number of workers.

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};

use contracts::Event;
use ringbuf::{traits::*, HeapRb};
use tokio::sync::Notify;

struct Inner {
    ring: HeapRb<Arc<Event>>,
    pushed: u64,
    popped: u64,
    drops: u64,
}

/// Point-in-time queue counters
///
/// Taken under the queue lock, so `pushed == drops + len + popped` always
/// holds for a single snapshot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueueStats {
    pub len: usize,
    pub pushed: u64,
    pub popped: u64,
    pub drops: u64,
}

/// Bounded drop-oldest queue
pub struct EventQueue {
    inner: Mutex<Inner>,
    notify: Notify,
    capacity: usize,
}

impl fmt::Debug for EventQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let stats = self.stats();
        f.debug_struct("EventQueue")
            .field("len", &stats.len)
            .field("capacity", &self.capacity)
            .field("drops", &stats.drops)
            .finish()
    }
}

impl EventQueue {
    /// Create a queue holding at most `capacity` events (at least 1)
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            inner: Mutex::new(Inner {
                ring: HeapRb::new(capacity),
                pushed: 0,
                popped: 0,
                drops: 0,
            }),
            notify: Notify::new(),
            capacity,
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        // Counters stay consistent even if a holder panicked
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Append an event, evicting the oldest one if full
    ///
    /// Returns the evicted event, if any. Never blocks.
    pub fn push(&self, event: Arc<Event>) -> Option<Arc<Event>> {
        let evicted = {
            let mut inner = self.lock();
            inner.pushed += 1;
            let evicted = inner.ring.push_overwrite(event);
            if evicted.is_some() {
                inner.drops += 1;
            }
            evicted
        };
        self.notify.notify_one();
        evicted
    }

    /// Remove the oldest event without waiting
    pub fn try_pop(&self) -> Option<Arc<Event>> {
        let (event, remaining) = {
            let mut inner = self.lock();
            let event = inner.ring.try_pop();
            if event.is_some() {
                inner.popped += 1;
            }
            (event, inner.ring.occupied_len())
        };

        // Pass the wake-up on so an idle worker picks up the rest
        if event.is_some() && remaining > 0 {
            self.notify.notify_one();
        }
        event
    }

    /// Wait for the next event
    ///
    /// Cancel safe: dropping the future never loses an event.
    pub async fn pop(&self) -> Arc<Event> {
        loop {
            if let Some(event) = self.try_pop() {
                return event;
            }
            self.notify.notified().await;
        }
    }

    pub fn len(&self) -> usize {
        self.lock().ring.occupied_len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Cumulative evictions since creation
    pub fn drops(&self) -> u64 {
        self.lock().drops
    }

    pub fn stats(&self) -> QueueStats {
        let inner = self.lock();
        QueueStats {
            len: inner.ring.occupied_len(),
            pushed: inner.pushed,
            popped: inner.popped,
            drops: inner.drops,
        }
    }

    /// Buffered events, oldest first
    pub fn snapshot(&self) -> Vec<Arc<Event>> {
        self.lock().ring.iter().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::EventKind;
    use std::time::Duration;

    fn event(id: &str) -> Arc<Event> {
        Arc::new(
            Event::new(id, EventKind::Host, &serde_json::json!({ "name": id })).unwrap(),
        )
    }

    fn ids(queue: &EventQueue) -> Vec<String> {
        queue.snapshot().iter().map(|e| e.id.clone()).collect()
    }

    #[test]
    fn test_capacity_two_keeps_latest() {
        let queue = EventQueue::new(2);
        assert!(queue.push(event("e1")).is_none());
        assert!(queue.push(event("e2")).is_none());
        let evicted = queue.push(event("e3")).unwrap();

        assert_eq!(evicted.id, "e1");
        assert_eq!(ids(&queue), ["e2", "e3"]);
        assert_eq!(queue.drops(), 1);
        assert_eq!(queue.len(), 2);
    }

    #[test]
    fn test_overflow_holds_last_c_in_order() {
        let capacity = 5;
        for k in [0usize, 1, 7, 23] {
            let queue = EventQueue::new(capacity);
            let total = capacity + k;
            for i in 0..total {
                queue.push(event(&format!("e{i}")));
            }

            let expected: Vec<String> = (k..total).map(|i| format!("e{i}")).collect();
            assert_eq!(ids(&queue), expected);
            assert_eq!(queue.drops(), k as u64);
            assert!(queue.len() <= queue.capacity());
        }
    }

    #[test]
    fn test_try_pop_fifo_and_stats() {
        let queue = EventQueue::new(3);
        for i in 0..4 {
            queue.push(event(&format!("e{i}")));
        }

        assert_eq!(queue.try_pop().unwrap().id, "e1");
        assert_eq!(queue.try_pop().unwrap().id, "e2");

        let stats = queue.stats();
        assert_eq!(stats.pushed, 4);
        assert_eq!(stats.popped, 2);
        assert_eq!(stats.drops, 1);
        assert_eq!(stats.len, 1);
        assert_eq!(stats.pushed, stats.drops + stats.len as u64 + stats.popped);
    }

    #[test]
    fn test_zero_capacity_is_clamped() {
        let queue = EventQueue::new(0);
        assert_eq!(queue.capacity(), 1);
        queue.push(event("a"));
        queue.push(event("b"));
        assert_eq!(ids(&queue), ["b"]);
    }

    #[tokio::test]
    async fn test_pop_waits_for_push() {
        let queue = Arc::new(EventQueue::new(4));
        let waiter = {
            let queue = queue.clone();
            tokio::spawn(async move { queue.pop().await })
        };

        tokio::time::sleep(Duration::from_millis(10)).await;
        queue.push(event("late"));

        let popped = tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(popped.id, "late");
    }

    #[tokio::test]
    async fn test_concurrent_consumers_account_every_event() {
        let queue = Arc::new(EventQueue::new(8));
        let mut consumers = Vec::new();
        for _ in 0..4 {
            let queue = queue.clone();
            consumers.push(tokio::spawn(async move {
                let mut taken = 0u64;
                while tokio::time::timeout(Duration::from_millis(50), queue.pop())
                    .await
                    .is_ok()
                {
                    taken += 1;
                }
                taken
            }));
        }

        for i in 0..500 {
            queue.push(event(&format!("e{i}")));
            if i % 50 == 0 {
                tokio::task::yield_now().await;
            }
        }

        let mut taken = 0;
        for consumer in consumers {
            taken += consumer.await.unwrap();
        }

        let stats = queue.stats();
        assert_eq!(stats.pushed, 500);
        assert_eq!(stats.popped, taken);
        assert_eq!(stats.pushed, stats.drops + stats.len as u64 + stats.popped);
    }
}
