//! # Event Queue and Lifecycle
//!
//! Two wait domains shared by every thread:
//!
//! - [`EventQueue`]: unbounded FIFO between the producers and the single
//!   consumer. `push` never blocks; `pop` blocks up to a timeout.
//! - [`Lifecycle`]: the alive flag plus an interruptible sleep used by the
//!   producers between iterations.
//!
//! [`Lifecycle::broadcast_shutdown`] clears the flag and wakes both domains,
//! so every sleeping producer and a consumer blocked in `pop` return
//! immediately and re-check liveness.

use crate::protocol::Event;
use std::collections::VecDeque;
use std::sync::{Condvar, Mutex, MutexGuard};
use std::time::Duration;

/// Lock, ignoring poisoning. The guarded data has no invariants a panicking
/// holder could leave half-updated.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[derive(Debug, Default)]
struct QueueInner {
    events: VecDeque<Event>,
    closed: bool,
}

/// Thread-safe FIFO of [`Event`]s.
#[derive(Debug, Default)]
pub struct EventQueue {
    inner: Mutex<QueueInner>,
    ready: Condvar,
}

impl EventQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an event and wake one waiter. Never blocks on capacity.
    pub fn push(&self, event: Event) {
        lock(&self.inner).events.push_back(event);
        self.ready.notify_one();
    }

    /// Take the oldest event, waiting up to `timeout` for one to arrive.
    ///
    /// Returns `None` on timeout, or at once after [`EventQueue::close`] when
    /// nothing is queued.
    pub fn pop(&self, timeout: Duration) -> Option<Event> {
        let inner = lock(&self.inner);
        let (mut inner, _) = self
            .ready
            .wait_timeout_while(inner, timeout, |q| q.events.is_empty() && !q.closed)
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        inner.events.pop_front()
    }

    /// Stop blocking in [`EventQueue::pop`] and wake every waiter.
    pub fn close(&self) {
        lock(&self.inner).closed = true;
        self.ready.notify_all();
    }

    pub fn len(&self) -> usize {
        lock(&self.inner).events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Shared alive flag with an interruptible sleep.
#[derive(Debug)]
pub struct Lifecycle {
    alive: Mutex<bool>,
    wake: Condvar,
}

impl Default for Lifecycle {
    fn default() -> Self {
        Lifecycle {
            alive: Mutex::new(true),
            wake: Condvar::new(),
        }
    }
}

impl Lifecycle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_alive(&self) -> bool {
        *lock(&self.alive)
    }

    /// Sleep for `duration` unless shutdown is broadcast first.
    ///
    /// Returns whether the process is still alive afterwards.
    pub fn sleep(&self, duration: Duration) -> bool {
        let alive = lock(&self.alive);
        let (alive, _) = self
            .wake
            .wait_timeout_while(alive, duration, |alive| *alive)
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        *alive
    }

    /// Clear the alive flag and wake every thread waiting on either this
    /// lifecycle or `queue`.
    pub fn broadcast_shutdown(&self, queue: &EventQueue) {
        *lock(&self.alive) = false;
        self.wake.notify_all();
        queue.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{HeartbeatReport, Rgb};
    use std::collections::HashMap;
    use std::sync::Arc;
    use std::thread;
    use std::time::Instant;

    const LONG: Duration = Duration::from_secs(30);

    #[test]
    fn test_fifo_order() {
        let queue = EventQueue::new();
        queue.push(Event::State);
        queue.push(Event::Heartbeat);
        queue.push(Event::DeviceBoot);
        assert_eq!(queue.len(), 3);

        assert_eq!(queue.pop(Duration::ZERO), Some(Event::State));
        assert_eq!(queue.pop(Duration::ZERO), Some(Event::Heartbeat));
        assert_eq!(queue.pop(Duration::ZERO), Some(Event::DeviceBoot));
        assert!(queue.is_empty());
    }

    #[test]
    fn test_pop_times_out_when_empty() {
        let queue = EventQueue::new();
        let started = Instant::now();
        assert_eq!(queue.pop(Duration::from_millis(20)), None);
        assert!(started.elapsed() >= Duration::from_millis(20));
    }

    #[test]
    fn test_push_wakes_waiting_consumer() {
        let queue = Arc::new(EventQueue::new());
        let consumer = {
            let queue = Arc::clone(&queue);
            thread::spawn(move || queue.pop(LONG))
        };
        thread::sleep(Duration::from_millis(20));
        queue.push(Event::Exit);
        assert_eq!(consumer.join().unwrap(), Some(Event::Exit));
    }

    #[test]
    fn test_per_producer_order_is_preserved() {
        let queue = Arc::new(EventQueue::new());
        // Producer id in the red channel, sequence number in the brightness
        let producers: Vec<_> = (0..4u8)
            .map(|id| {
                let queue = Arc::clone(&queue);
                thread::spawn(move || {
                    for seq in 0..100u8 {
                        queue.push(Event::DeviceHeartbeatAck(HeartbeatReport {
                            brightness: seq,
                            vitaminder: Rgb::new(id, 0, 0),
                            ..Default::default()
                        }));
                    }
                })
            })
            .collect();
        for p in producers {
            p.join().unwrap();
        }

        let mut next_seq: HashMap<u8, u8> = HashMap::new();
        while let Some(event) = queue.pop(Duration::ZERO) {
            match event {
                Event::DeviceHeartbeatAck(report) => {
                    let id = report.vitaminder.r;
                    let expected = next_seq.entry(id).or_insert(0);
                    assert_eq!(report.brightness, *expected, "producer {id:?} out of order");
                    *expected += 1;
                }
                other => panic!("unexpected {other:?}"),
            }
        }
        assert_eq!(next_seq.len(), 4);
        assert!(next_seq.values().all(|&n| n == 100));
    }

    #[test]
    fn test_sleep_runs_full_duration_while_alive() {
        let lifecycle = Lifecycle::new();
        let started = Instant::now();
        assert!(lifecycle.sleep(Duration::from_millis(20)));
        assert!(started.elapsed() >= Duration::from_millis(20));
    }

    #[test]
    fn test_broadcast_wakes_sleepers_and_queue_waiters() {
        let lifecycle = Arc::new(Lifecycle::new());
        let queue = Arc::new(EventQueue::new());

        let sleepers: Vec<_> = (0..3)
            .map(|_| {
                let lifecycle = Arc::clone(&lifecycle);
                thread::spawn(move || lifecycle.sleep(LONG))
            })
            .collect();
        let waiter = {
            let queue = Arc::clone(&queue);
            thread::spawn(move || queue.pop(LONG))
        };

        thread::sleep(Duration::from_millis(20));
        let started = Instant::now();
        lifecycle.broadcast_shutdown(&queue);

        for s in sleepers {
            assert!(!s.join().unwrap());
        }
        assert_eq!(waiter.join().unwrap(), None);
        assert!(started.elapsed() < LONG);
        assert!(!lifecycle.is_alive());

        // Already dead: returns at once
        assert!(!lifecycle.sleep(LONG));
        assert_eq!(queue.pop(LONG), None);
    }
}
