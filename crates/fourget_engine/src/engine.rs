use std::path::PathBuf;
use std::sync::Arc;

use fourget_core::{run, CompletionOutcome, QueueStats, RunConfig};
use fourget_logging::log_info;

use crate::accumulator::{Tally, TallySnapshot};
use crate::api::{ChanEndpoints, ThreadRef};
use crate::fetch::{FetchSettings, ReqwestFetcher};
use crate::item::{EngineContext, Item, ThreadFetch};
use crate::persist::FsPersistence;
use crate::types::{EngineError, FetchError};

#[derive(Debug, Clone)]
pub struct HarvestConfig {
    pub output_dir: PathBuf,
    pub worker_count: usize,
    /// 0 means unbounded.
    pub queue_capacity: usize,
    pub fetch: FetchSettings,
    pub endpoints: ChanEndpoints,
}

impl Default for HarvestConfig {
    fn default() -> Self {
        let run = RunConfig::default();
        Self {
            output_dir: PathBuf::from("."),
            worker_count: run.worker_count,
            queue_capacity: run.queue_capacity,
            fetch: FetchSettings::default(),
            endpoints: ChanEndpoints::default(),
        }
    }
}

impl HarvestConfig {
    fn run_config(&self) -> RunConfig {
        RunConfig {
            worker_count: self.worker_count,
            queue_capacity: self.queue_capacity,
        }
    }
}

/// How a harvest ended, as the command line reports it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunStatus {
    /// Drained and at least one file was written.
    NewData,
    /// Drained with everything already on disk.
    NoOp,
    Stopped(String),
    Failed,
}

impl RunStatus {
    pub fn exit_code(&self) -> u8 {
        match self {
            RunStatus::NewData => 0,
            RunStatus::NoOp => 1,
            RunStatus::Stopped(_) => 2,
            RunStatus::Failed => 3,
        }
    }
}

#[derive(Debug)]
pub struct HarvestReport {
    pub outcome: CompletionOutcome<EngineError>,
    pub stats: QueueStats,
    pub tally: TallySnapshot,
}

impl HarvestReport {
    pub fn status(&self) -> RunStatus {
        match &self.outcome {
            CompletionOutcome::Drained if self.tally.new_work => RunStatus::NewData,
            CompletionOutcome::Drained => RunStatus::NoOp,
            CompletionOutcome::Stopped(signal) => RunStatus::Stopped(signal.reason().to_string()),
            CompletionOutcome::Failed(_) => RunStatus::Failed,
        }
    }
}

/// Archives one thread: its metadata and every attachment.
pub struct Harvester {
    config: HarvestConfig,
    context: EngineContext,
}

impl Harvester {
    /// Wires the reqwest fetcher and the local filesystem.
    ///
    /// As with [`Harvester::with_context`], byte counts live in each run's
    /// report, not in the stored context.
    pub fn new(config: HarvestConfig) -> Result<Self, FetchError> {
        let fetcher = Arc::new(ReqwestFetcher::new(
            config.fetch.clone(),
            config.endpoints.clone(),
        )?);
        let context = EngineContext {
            source: fetcher.clone(),
            transfer: fetcher,
            persistence: Arc::new(FsPersistence),
            tally: Arc::new(Tally::new()),
        };
        Ok(Self { config, context })
    }

    /// Uses caller-supplied capabilities.
    ///
    /// The context's `tally` is ignored: every call to [`Harvester::run`]
    /// counts into a fresh [`Tally`] and reports it in [`HarvestReport::tally`].
    pub fn with_context(context: EngineContext, config: HarvestConfig) -> Self {
        Self { config, context }
    }

    pub fn config(&self) -> &HarvestConfig {
        &self.config
    }

    pub async fn run(&self, thread: ThreadRef) -> Result<HarvestReport, EngineError> {
        log_info!(
            "Downloading files from {}",
            self.config.endpoints.thread_url(&thread)
        );

        let tally = Arc::new(Tally::new());
        let context = EngineContext {
            tally: tally.clone(),
            ..self.context.clone()
        };
        let seed = Item::ThreadFetch(ThreadFetch {
            thread,
            output_root: self.config.output_dir.clone(),
        });
        let report = run(vec![seed], Arc::new(context), self.config.run_config()).await?;

        Ok(HarvestReport {
            outcome: report.outcome,
            stats: report.stats,
            tally: tally.snapshot(),
        })
    }
}
