//! Multi-consumer work queue with completion tracking
//!
//! Every pushed item counts as pending until the worker that claimed it
//! drops its [`Ack`]. [`WorkQueue::join`] resolves once nothing is pending,
//! i.e. every item ever pushed has been claimed and acknowledged.

use crate::pipeline::QueuePolicy;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};
use thiserror::Error;
use tokio::sync::{watch, Notify, Semaphore, TryAcquireError};

/// Returned when pushing to a closed queue
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("queue is closed")]
pub struct QueueClosed;

/// Outcome of a push that reached an open queue
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pushed {
    Queued,

    /// The queue was full under [`QueuePolicy::DropNewest`]
    Dropped,
}

/// Shared handle to a work queue
pub struct WorkQueue<T> {
    shared: Arc<Shared<T>>,
}

struct Shared<T> {
    name: &'static str,
    policy: QueuePolicy,
    state: Mutex<State<T>>,
    slots: Option<Semaphore>,
    available: Notify,
    pending: Arc<watch::Sender<usize>>,
}

struct State<T> {
    items: VecDeque<T>,
    closed: bool,
}

impl<T> Clone for WorkQueue<T> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<T> WorkQueue<T> {
    /// Creates an empty queue
    pub fn new(name: &'static str, policy: QueuePolicy) -> Self {
        let (pending, _) = watch::channel(0);
        Self {
            shared: Arc::new(Shared {
                name,
                policy,
                state: Mutex::new(State {
                    items: VecDeque::new(),
                    closed: false,
                }),
                slots: policy.capacity().map(Semaphore::new),
                available: Notify::new(),
                pending: Arc::new(pending),
            }),
        }
    }

    pub fn name(&self) -> &'static str {
        self.shared.name
    }

    /// Adds an item, honoring the queue's backpressure policy
    ///
    /// Under [`QueuePolicy::Block`] this waits for space. Fails once the
    /// queue is closed, including while waiting.
    pub async fn push(&self, item: T) -> Result<Pushed, QueueClosed> {
        if let Some(slots) = &self.shared.slots {
            match self.shared.policy {
                QueuePolicy::DropNewest { .. } => match slots.try_acquire() {
                    Ok(permit) => permit.forget(),
                    Err(TryAcquireError::Closed) => return Err(QueueClosed),
                    Err(TryAcquireError::NoPermits) => {
                        tracing::warn!("{} queue full, dropping item", self.shared.name);
                        return Ok(Pushed::Dropped);
                    }
                },
                _ => slots.acquire().await.map_err(|_| QueueClosed)?.forget(),
            }
        }

        {
            let mut state = self.state();
            if state.closed {
                return Err(QueueClosed);
            }
            state.items.push_back(item);
            self.shared.pending.send_modify(|n| *n += 1);
        }

        self.shared.available.notify_one();
        Ok(Pushed::Queued)
    }

    /// Claims the next item, waiting while the queue is empty
    ///
    /// Returns `None` once the queue is closed.
    pub async fn pop(&self) -> Option<Claimed<T>> {
        loop {
            let notified = self.shared.available.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            {
                let mut state = self.state();
                if let Some(item) = state.items.pop_front() {
                    if let Some(slots) = &self.shared.slots {
                        slots.add_permits(1);
                    }
                    if !state.items.is_empty() {
                        self.shared.available.notify_one();
                    }
                    return Some(Claimed {
                        item,
                        ack: Ack {
                            pending: Arc::clone(&self.shared.pending),
                        },
                    });
                }
                if state.closed {
                    return None;
                }
            }

            notified.await;
        }
    }

    /// Waits until every pushed item has been claimed and acknowledged
    pub async fn join(&self) {
        let mut pending = self.shared.pending.subscribe();
        // The sender lives in `self`, so the channel cannot close here
        let _ = pending.wait_for(|n| *n == 0).await;
    }

    /// Closes the queue and discards unclaimed items
    ///
    /// Wakes every waiting producer and consumer. Returns the number of
    /// items discarded.
    pub fn close(&self) -> usize {
        let discarded = {
            let mut state = self.state();
            if state.closed {
                return 0;
            }
            state.closed = true;
            let discarded = state.items.len();
            state.items.clear();
            self.shared
                .pending
                .send_modify(|n| *n = n.saturating_sub(discarded));
            discarded
        };

        if let Some(slots) = &self.shared.slots {
            slots.close();
        }
        self.shared.available.notify_waiters();

        if discarded > 0 {
            tracing::debug!(
                "{} queue closed with {} unclaimed items",
                self.shared.name,
                discarded
            );
        }
        discarded
    }

    /// Items waiting to be claimed
    pub fn len(&self) -> usize {
        self.state().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Items pushed but not yet acknowledged
    pub fn pending(&self) -> usize {
        *self.shared.pending.borrow()
    }

    fn state(&self) -> MutexGuard<'_, State<T>> {
        self.shared
            .state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// An item claimed from a queue
pub struct Claimed<T> {
    item: T,
    ack: Ack,
}

impl<T> Claimed<T> {
    pub fn item(&self) -> &T {
        &self.item
    }

    /// Splits the claim into the item and its acknowledgement
    pub fn into_parts(self) -> (T, Ack) {
        (self.item, self.ack)
    }
}

/// Marks a claimed item done when dropped
#[must_use = "dropping an Ack immediately acknowledges the item"]
pub struct Ack {
    pending: Arc<watch::Sender<usize>>,
}

impl Drop for Ack {
    fn drop(&mut self) {
        self.pending.send_modify(|n| *n = n.saturating_sub(1));
    }
}
