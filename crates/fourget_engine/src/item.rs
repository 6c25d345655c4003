use std::path::PathBuf;
use std::sync::Arc;

use bytes::Bytes;
use fourget_core::{Enqueuer, StopSignal, WorkItem};
use fourget_logging::{log_debug, log_info, log_warn};
use futures_util::StreamExt;

use crate::accumulator::Accumulator;
use crate::api::ThreadRef;
use crate::digest::{file_matches, ContentDigest, StreamingDigest};
use crate::fetch::{ThreadSource, Transfer};
use crate::persist::Persistence;
use crate::types::EngineError;

pub const THREAD_METADATA_FILE: &str = "thread.json";

/// Capabilities shared by every item of one harvest.
#[derive(Clone)]
pub struct EngineContext {
    pub source: Arc<dyn ThreadSource>,
    pub transfer: Arc<dyn Transfer>,
    pub persistence: Arc<dyn Persistence>,
    pub tally: Arc<dyn Accumulator>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Item {
    ThreadFetch(ThreadFetch),
    MediaFetch(MediaFetch),
    Persist(Persist),
}

/// Resolves a thread and fans out into its metadata and attachments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThreadFetch {
    pub thread: ThreadRef,
    pub output_root: PathBuf,
}

/// Downloads one attachment unless the destination already holds it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaFetch {
    pub destination: PathBuf,
    pub source: String,
    pub expected_size: u64,
    pub expected_digest: ContentDigest,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Persist {
    pub destination: PathBuf,
    pub payload: Bytes,
}

#[async_trait::async_trait]
impl WorkItem for Item {
    type Context = EngineContext;
    type Error = EngineError;

    fn kind(&self) -> &'static str {
        match self {
            Item::ThreadFetch(_) => "thread-fetch",
            Item::MediaFetch(_) => "media-fetch",
            Item::Persist(_) => "persist",
        }
    }

    async fn execute(
        self,
        ctx: &EngineContext,
        enqueue: &Enqueuer<'_, Self>,
    ) -> Result<Option<StopSignal>, EngineError> {
        match self {
            Item::ThreadFetch(item) => item.execute(ctx, enqueue).await,
            Item::MediaFetch(item) => item.execute(ctx).await.map(|()| None),
            Item::Persist(item) => item.execute(ctx).await.map(|()| None),
        }
    }
}

impl ThreadFetch {
    async fn execute(
        self,
        ctx: &EngineContext,
        enqueue: &Enqueuer<'_, Item>,
    ) -> Result<Option<StopSignal>, EngineError> {
        let description = match ctx.source.describe(&self.thread).await {
            Ok(description) => description,
            Err(err) if err.is_not_found() => {
                return Ok(Some(StopSignal::new(format!(
                    "thread {} not found",
                    self.thread
                ))));
            }
            Err(err) => return Err(err.into()),
        };

        ctx.tally.record_expected(description.total_size());
        let thread_dir = self.output_root.join(description.directory_name());
        log_debug!(
            "{} resolved to {} attachments under {}",
            self.thread,
            description.attachments.len(),
            thread_dir.display()
        );

        enqueue
            .submit(Item::Persist(Persist {
                destination: thread_dir.join(THREAD_METADATA_FILE),
                payload: description.raw.clone(),
            }))
            .await?;

        for attachment in description.attachments {
            enqueue
                .submit(Item::MediaFetch(MediaFetch {
                    destination: thread_dir.join(&attachment.name),
                    source: attachment.source_url,
                    expected_size: attachment.size,
                    expected_digest: attachment.digest,
                }))
                .await?;
        }
        Ok(None)
    }
}

impl MediaFetch {
    async fn execute(self, ctx: &EngineContext) -> Result<(), EngineError> {
        if file_matches(&self.destination, &self.expected_digest).await? {
            ctx.tally.record_present(self.expected_size);
            log_info!(
                "Not downloading {}, already exists",
                self.destination.display()
            );
            return Ok(());
        }

        let mut stream = ctx.transfer.open_source(&self.source).await?;
        let mut writer = ctx.persistence.create(&self.destination).await?;
        let mut hasher = StreamingDigest::new(self.expected_digest.algorithm());

        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            writer.append(&chunk).await?;
            hasher.update(&chunk);
            ctx.tally.record_bytes(chunk.len() as u64);
        }
        writer.finish().await?;
        ctx.tally.record_new_work();

        let actual = hasher.finalize();
        if actual != self.expected_digest {
            log_warn!(
                "{} does not match its expected digest (expected {}, got {})",
                self.destination.display(),
                self.expected_digest,
                actual
            );
        }
        log_info!("{} -> {}", self.source, self.destination.display());
        Ok(())
    }
}

impl Persist {
    async fn execute(self, ctx: &EngineContext) -> Result<(), EngineError> {
        ctx.persistence
            .write(&self.destination, &self.payload)
            .await?;
        log_debug!("Wrote {}", self.destination.display());
        Ok(())
    }
}
