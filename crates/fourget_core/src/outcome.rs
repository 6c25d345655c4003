use crate::item::StopSignal;
use crate::queue::QueueStats;

/// The single terminal result of a run.
#[derive(Debug)]
pub enum CompletionOutcome<E> {
    /// Every enqueued item was executed and nothing remains in flight.
    Drained,
    /// An item asked for the run to end.
    Stopped(StopSignal),
    /// An item failed; the first such failure is kept.
    Failed(E),
}

impl<E> CompletionOutcome<E> {
    pub fn is_drained(&self) -> bool {
        matches!(self, CompletionOutcome::Drained)
    }

    pub fn stop_reason(&self) -> Option<&str> {
        match self {
            CompletionOutcome::Stopped(signal) => Some(signal.reason()),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&E> {
        match self {
            CompletionOutcome::Failed(err) => Some(err),
            _ => None,
        }
    }
}

/// Outcome of a run together with the queue counters at shutdown.
#[derive(Debug)]
pub struct RunReport<E> {
    pub outcome: CompletionOutcome<E>,
    pub stats: QueueStats,
}
