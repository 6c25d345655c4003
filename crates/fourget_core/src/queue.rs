use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};

use fourget_logging::log_error;
use thiserror::Error;
use tokio::sync::Notify;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum QueueError {
    #[error("queue is closed")]
    Closed,
    #[error("queue is full")]
    Full,
    #[error("mark_done called with no item in flight")]
    NotInFlight,
}

/// Point-in-time view of the queue counters, taken under the queue lock.
///
/// `pending + in_flight == enqueued - done` holds for every snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct QueueStats {
    pub pending: usize,
    pub in_flight: usize,
    pub enqueued: u64,
    pub done: u64,
}

struct QueueState<T> {
    items: VecDeque<T>,
    in_flight: usize,
    enqueued: u64,
    done: u64,
    closed: bool,
}

impl<T> QueueState<T> {
    fn is_drained(&self) -> bool {
        self.items.is_empty() && self.in_flight == 0
    }
}

/// Bounded FIFO of pending work with in-flight accounting.
///
/// A capacity of 0 means unbounded. `enqueue` suspends while the queue is full,
/// `dequeue` suspends while it is empty and `wait_drained` suspends until nothing
/// is pending or in flight.
pub struct WorkQueue<T> {
    state: Mutex<QueueState<T>>,
    capacity: usize,
    item_ready: Notify,
    space_ready: Notify,
    drained: Notify,
}

impl<T> WorkQueue<T> {
    pub fn new(capacity: usize) -> Self {
        Self {
            state: Mutex::new(QueueState {
                items: VecDeque::new(),
                in_flight: 0,
                enqueued: 0,
                done: 0,
                closed: false,
            }),
            capacity,
            item_ready: Notify::new(),
            space_ready: Notify::new(),
            drained: Notify::new(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    fn lock(&self) -> MutexGuard<'_, QueueState<T>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn has_space(&self, state: &QueueState<T>) -> bool {
        self.capacity == 0 || state.items.len() < self.capacity
    }

    fn push(&self, state: &mut QueueState<T>, item: T) {
        state.items.push_back(item);
        state.enqueued += 1;
        self.item_ready.notify_one();
    }

    /// Enqueues without waiting; fails with `Full` instead of suspending.
    pub fn try_enqueue(&self, item: T) -> Result<(), QueueError> {
        let mut state = self.lock();
        if state.closed {
            return Err(QueueError::Closed);
        }
        if !self.has_space(&state) {
            return Err(QueueError::Full);
        }
        self.push(&mut state, item);
        Ok(())
    }

    /// Enqueues `item`, suspending until there is room.
    ///
    /// Fails only once the queue has been closed.
    pub async fn enqueue(&self, item: T) -> Result<(), QueueError> {
        loop {
            let space = self.space_ready.notified();
            tokio::pin!(space);
            space.as_mut().enable();
            {
                let mut state = self.lock();
                if state.closed {
                    return Err(QueueError::Closed);
                }
                if self.has_space(&state) {
                    self.push(&mut state, item);
                    return Ok(());
                }
            }
            space.await;
        }
    }

    /// Takes the oldest pending item and moves its accounting to in-flight.
    ///
    /// Cancel safe: the item is only removed when the call returns it.
    pub async fn dequeue(&self) -> Result<T, QueueError> {
        loop {
            let ready = self.item_ready.notified();
            tokio::pin!(ready);
            ready.as_mut().enable();
            {
                let mut state = self.lock();
                if let Some(item) = state.items.pop_front() {
                    state.in_flight += 1;
                    self.space_ready.notify_one();
                    return Ok(item);
                }
                if state.closed {
                    return Err(QueueError::Closed);
                }
            }
            ready.await;
        }
    }

    /// Marks one in-flight item as finished.
    ///
    /// Must run exactly once per successful `dequeue`, whatever the item's fate.
    pub fn mark_done(&self) -> Result<(), QueueError> {
        let drained = {
            let mut state = self.lock();
            if state.in_flight == 0 {
                return Err(QueueError::NotInFlight);
            }
            state.in_flight -= 1;
            state.done += 1;
            state.is_drained()
        };
        if drained {
            self.drained.notify_waiters();
        }
        Ok(())
    }

    /// Suspends until nothing is pending or in flight.
    pub async fn wait_drained(&self) {
        loop {
            let drained = self.drained.notified();
            tokio::pin!(drained);
            drained.as_mut().enable();
            let done = self.lock().is_drained();
            if done {
                return;
            }
            drained.await;
        }
    }

    /// Permanently closes the queue and wakes every suspended caller.
    ///
    /// Pending items stay in the buffer; they are no longer handed out once the
    /// queue is empty, and further enqueues fail.
    pub fn close(&self) {
        self.lock().closed = true;
        self.item_ready.notify_waiters();
        self.space_ready.notify_waiters();
    }

    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    pub fn stats(&self) -> QueueStats {
        let state = self.lock();
        QueueStats {
            pending: state.items.len(),
            in_flight: state.in_flight,
            enqueued: state.enqueued,
            done: state.done,
        }
    }
}

/// Releases one in-flight claim when dropped, so drain accounting survives
/// failure and cancellation of the worker holding the item.
pub(crate) struct DoneGuard<'q, T> {
    queue: &'q WorkQueue<T>,
}

impl<'q, T> DoneGuard<'q, T> {
    pub(crate) fn new(queue: &'q WorkQueue<T>) -> Self {
        Self { queue }
    }
}

impl<T> Drop for DoneGuard<'_, T> {
    fn drop(&mut self) {
        if let Err(err) = self.queue.mark_done() {
            log_error!("In-flight accounting out of step: {}", err);
        }
    }
}
