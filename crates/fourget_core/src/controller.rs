use std::any::Any;
use std::fmt;
use std::sync::Arc;

use fourget_logging::{log_debug, log_error, log_info, log_trace, log_warn};
use thiserror::Error;
use tokio::task::{JoinError, JoinSet};
use tokio_util::sync::CancellationToken;

use crate::item::{Enqueuer, StopSignal, WorkItem};
use crate::outcome::{CompletionOutcome, RunReport};
use crate::queue::{DoneGuard, WorkQueue};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunConfig {
    pub worker_count: usize,
    /// 0 means unbounded.
    pub queue_capacity: usize,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            worker_count: 3,
            queue_capacity: 10_000,
        }
    }
}

/// Rejected before any task starts; never reported through the race.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("worker count must be at least 1")]
    NoWorkers,
    #[error("queue capacity {capacity} cannot hold the {initial} initial items")]
    QueueTooSmall { capacity: usize, initial: usize },
}

enum TaskExit<E> {
    Drained,
    Stopped(StopSignal),
    Failed(E),
    Cancelled,
}

impl<E> TaskExit<E> {
    /// Lower ranks win when several tasks finish in the same wake-up.
    fn rank(&self) -> u8 {
        match self {
            TaskExit::Failed(_) => 0,
            TaskExit::Stopped(_) => 1,
            TaskExit::Drained => 2,
            TaskExit::Cancelled => 3,
        }
    }

    fn is_decisive(&self) -> bool {
        !matches!(self, TaskExit::Cancelled)
    }
}

struct Finished<E> {
    /// Submission order: workers first, drain-watcher last.
    slot: usize,
    exit: TaskExit<E>,
}

/// Seeds a queue with `initial_items` and drives it with `worker_count` workers
/// until it drains, an item stops the run, or an item fails.
///
/// The first of those to happen decides the outcome. When several tasks finish
/// in the same wake-up, a failure beats a stop, which beats a drain; ties within
/// a kind go to the earliest submitted task. A worker that stops or fails
/// cancels its siblings before releasing its item, so no pending item starts
/// after that point. Remaining tasks are awaited before returning. A worker panic is resumed on the caller once every
/// task has shut down.
pub async fn run<I: WorkItem>(
    initial_items: Vec<I>,
    ctx: Arc<I::Context>,
    config: RunConfig,
) -> Result<RunReport<I::Error>, ConfigError> {
    if config.worker_count < 1 {
        return Err(ConfigError::NoWorkers);
    }
    let initial = initial_items.len();
    if config.queue_capacity > 0 && initial > config.queue_capacity {
        return Err(ConfigError::QueueTooSmall {
            capacity: config.queue_capacity,
            initial,
        });
    }

    let queue = Arc::new(WorkQueue::new(config.queue_capacity));
    for item in initial_items {
        queue
            .try_enqueue(item)
            .map_err(|_| ConfigError::QueueTooSmall {
                capacity: config.queue_capacity,
                initial,
            })?;
    }

    let cancel = CancellationToken::new();
    let mut tasks = JoinSet::new();
    for slot in 0..config.worker_count {
        tasks.spawn(worker(slot, queue.clone(), ctx.clone(), cancel.clone()));
    }
    tasks.spawn(drain_watcher::<I>(
        config.worker_count,
        queue.clone(),
        cancel.clone(),
    ));
    log_debug!(
        "Started {} workers over {} initial items",
        config.worker_count,
        initial
    );

    let mut finished = Vec::new();
    let mut panic: Option<Box<dyn Any + Send>> = None;
    while let Some(joined) = tasks.join_next().await {
        absorb(joined, &mut finished, &mut panic);
        while let Some(joined) = tasks.try_join_next() {
            absorb(joined, &mut finished, &mut panic);
        }
        if panic.is_some() || finished.iter().any(|f| f.exit.is_decisive()) {
            break;
        }
    }

    cancel.cancel();
    queue.close();
    shutdown(&mut tasks).await;

    if let Some(payload) = panic {
        std::panic::resume_unwind(payload);
    }

    let outcome = decide(finished);
    match &outcome {
        CompletionOutcome::Drained => log_info!("All items processed"),
        CompletionOutcome::Stopped(signal) => log_info!("{}", signal),
        CompletionOutcome::Failed(err) => log_error!("Run failed: {}", err),
    }

    Ok(RunReport {
        outcome,
        stats: queue.stats(),
    })
}

fn absorb<E>(
    joined: Result<Finished<E>, JoinError>,
    finished: &mut Vec<Finished<E>>,
    panic: &mut Option<Box<dyn Any + Send>>,
) {
    match joined {
        Ok(done) => finished.push(done),
        Err(err) if err.is_panic() => {
            if panic.is_none() {
                *panic = Some(err.into_panic());
            }
        }
        Err(err) => log_warn!("Task ended before the run was decided: {}", err),
    }
}

fn decide<E: fmt::Display>(mut finished: Vec<Finished<E>>) -> CompletionOutcome<E> {
    finished.sort_by_key(|f| (f.exit.rank(), f.slot));
    let mut finished = finished.into_iter();

    let outcome = match finished.next() {
        Some(Finished {
            exit: TaskExit::Failed(err),
            ..
        }) => CompletionOutcome::Failed(err),
        Some(Finished {
            exit: TaskExit::Stopped(signal),
            ..
        }) => CompletionOutcome::Stopped(signal),
        Some(Finished {
            exit: TaskExit::Drained,
            ..
        }) => CompletionOutcome::Drained,
        Some(Finished {
            exit: TaskExit::Cancelled,
            ..
        })
        | None => {
            // Only reachable when every task exited without a result.
            log_warn!("No task reported a result; treating the run as drained");
            CompletionOutcome::Drained
        }
    };

    for other in finished {
        match other.exit {
            TaskExit::Failed(err) => {
                log_warn!("Discarding failure from task {}: {}", other.slot, err)
            }
            TaskExit::Stopped(signal) => {
                log_debug!("Discarding stop from task {}: {}", other.slot, signal)
            }
            TaskExit::Drained | TaskExit::Cancelled => {}
        }
    }

    outcome
}

async fn shutdown<E: fmt::Display + 'static>(tasks: &mut JoinSet<Finished<E>>) {
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok(Finished {
                slot,
                exit: TaskExit::Failed(err),
            }) => log_warn!("Ignoring failure from task {} during shutdown: {}", slot, err),
            Ok(Finished {
                slot,
                exit: TaskExit::Stopped(signal),
            }) => log_debug!("Ignoring stop from task {} during shutdown: {}", slot, signal),
            Ok(_) => {}
            Err(err) if err.is_cancelled() => {}
            Err(err) => log_error!("Task failed during shutdown: {}", err),
        }
    }
}

async fn worker<I: WorkItem>(
    slot: usize,
    queue: Arc<WorkQueue<I>>,
    ctx: Arc<I::Context>,
    cancel: CancellationToken,
) -> Finished<I::Error> {
    let exit = work_loop(slot, &queue, &ctx, &cancel).await;
    Finished { slot, exit }
}

async fn work_loop<I: WorkItem>(
    slot: usize,
    queue: &WorkQueue<I>,
    ctx: &I::Context,
    cancel: &CancellationToken,
) -> TaskExit<I::Error> {
    loop {
        let item = tokio::select! {
            biased;
            _ = cancel.cancelled() => return TaskExit::Cancelled,
            dequeued = queue.dequeue() => match dequeued {
                Ok(item) => item,
                Err(_) => return TaskExit::Cancelled,
            },
        };

        // Dropping the claim marks the item done, on every path out of here.
        let claim = DoneGuard::new(queue);
        if cancel.is_cancelled() {
            log_trace!("Worker {} dropping {} after cancellation", slot, item.kind());
            return TaskExit::Cancelled;
        }
        log_trace!("Worker {} executing {}", slot, item.kind());
        let enqueuer = Enqueuer::new(queue);
        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => return TaskExit::Cancelled,
            result = item.execute(ctx, &enqueuer) => result,
        };

        // Siblings must not pick up more work once this run is decided.
        let exit = match result {
            Ok(None) => None,
            Ok(Some(signal)) => Some(TaskExit::Stopped(signal)),
            Err(err) => Some(TaskExit::Failed(err)),
        };
        if exit.is_some() {
            cancel.cancel();
        }
        drop(claim);
        if let Some(exit) = exit {
            return exit;
        }
    }
}

async fn drain_watcher<I: WorkItem>(
    slot: usize,
    queue: Arc<WorkQueue<I>>,
    cancel: CancellationToken,
) -> Finished<I::Error> {
    let exit = tokio::select! {
        biased;
        _ = cancel.cancelled() => TaskExit::Cancelled,
        _ = queue.wait_drained() => TaskExit::Drained,
    };
    Finished { slot, exit }
}
