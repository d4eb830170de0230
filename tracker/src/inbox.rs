use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;

/// Bounded single-consumer inbox with a drop-oldest overflow policy.
///
/// Producers never wait: pushing onto a full inbox evicts the oldest queued
/// item and counts it, so a stalled consumer sheds stale sensor data instead
/// of back-pressuring the pollers.
pub struct Inbox<T> {
    shared: Arc<Shared<T>>,
}

#[derive(Clone)]
pub struct InboxSender<T> {
    shared: Arc<Shared<T>>,
}

struct Shared<T> {
    queue: Mutex<VecDeque<T>>,
    notify: Notify,
    capacity: usize,
    dropped: AtomicU64,
    closed: AtomicBool,
}

/// Create a connected sender/receiver pair holding at most `capacity` items.
pub fn channel<T>(capacity: usize) -> (InboxSender<T>, Inbox<T>) {
    assert!(capacity > 0, "inbox capacity must be positive");
    let shared = Arc::new(Shared {
        queue: Mutex::new(VecDeque::with_capacity(capacity)),
        notify: Notify::new(),
        capacity,
        dropped: AtomicU64::new(0),
        closed: AtomicBool::new(false),
    });
    (
        InboxSender {
            shared: shared.clone(),
        },
        Inbox { shared },
    )
}

impl<T> InboxSender<T> {
    /// Enqueue an item, evicting the oldest one if the inbox is full.
    /// Returns `false` if the inbox was already closed.
    pub fn push(&self, item: T) -> bool {
        if self.shared.closed.load(Ordering::Acquire) {
            return false;
        }
        {
            let mut queue = self.shared.queue.lock().expect("inbox mutex poisoned");
            if queue.len() == self.shared.capacity {
                queue.pop_front();
                self.shared.dropped.fetch_add(1, Ordering::Relaxed);
            }
            queue.push_back(item);
        }
        self.shared.notify.notify_one();
        true
    }

    /// Stop accepting items; the consumer still drains what is queued.
    pub fn close(&self) {
        self.shared.closed.store(true, Ordering::Release);
        self.shared.notify.notify_one();
    }

    /// Number of items evicted by overflow so far.
    pub fn dropped(&self) -> u64 {
        self.shared.dropped.load(Ordering::Relaxed)
    }
}

impl<T> Inbox<T> {
    /// Receive the next item, waiting if the inbox is empty. Returns `None`
    /// once the inbox is closed and fully drained.
    pub async fn recv(&mut self) -> Option<T> {
        loop {
            let notified = self.shared.notify.notified();
            {
                let mut queue = self.shared.queue.lock().expect("inbox mutex poisoned");
                if let Some(item) = queue.pop_front() {
                    return Some(item);
                }
            }
            if self.shared.closed.load(Ordering::Acquire) {
                return None;
            }
            notified.await;
        }
    }

    /// Pop an item without waiting.
    pub fn try_recv(&mut self) -> Option<T> {
        self.shared
            .queue
            .lock()
            .expect("inbox mutex poisoned")
            .pop_front()
    }
}
