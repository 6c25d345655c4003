use std::error::Error as StdError;
use std::fmt;

use crate::queue::{QueueError, WorkQueue};

/// Non-error request, raised by a single item, to end the whole run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StopSignal {
    reason: String,
}

impl StopSignal {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }

    pub fn reason(&self) -> &str {
        &self.reason
    }
}

impl fmt::Display for StopSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.reason)
    }
}

/// Capability handed to an executing item for submitting follow-up work.
///
/// It borrows the queue for the duration of one `execute` call only, so an item
/// cannot keep submitting after it has returned.
pub struct Enqueuer<'q, T> {
    queue: &'q WorkQueue<T>,
}

impl<'q, T: Send> Enqueuer<'q, T> {
    pub(crate) fn new(queue: &'q WorkQueue<T>) -> Self {
        Self { queue }
    }

    /// Submits `item`, suspending while the queue is full.
    pub async fn submit(&self, item: T) -> Result<(), QueueError> {
        self.queue.enqueue(item).await
    }
}

/// One schedulable unit of work.
///
/// Implementations are usually a closed enum of item kinds dispatched with a
/// `match`. `Context` carries the shared capabilities every item needs.
#[async_trait::async_trait]
pub trait WorkItem: Sized + Send + Sync + 'static {
    type Context: Send + Sync + 'static;
    type Error: StdError + Send + Sync + 'static;

    /// Short label used in log lines.
    fn kind(&self) -> &'static str;

    /// Runs the item. `Ok(Some(_))` ends the run, `Ok(None)` keeps it going.
    async fn execute(
        self,
        ctx: &Self::Context,
        enqueue: &Enqueuer<'_, Self>,
    ) -> Result<Option<StopSignal>, Self::Error>;
}
