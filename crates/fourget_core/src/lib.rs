//! Fourget core: bounded work queue, item abstraction and the completion race
//! that drives a pool of workers over it.
mod controller;
mod item;
mod outcome;
mod queue;

pub use controller::{run, ConfigError, RunConfig};
pub use item::{Enqueuer, StopSignal, WorkItem};
pub use outcome::{CompletionOutcome, RunReport};
pub use queue::{QueueError, QueueStats, WorkQueue};
