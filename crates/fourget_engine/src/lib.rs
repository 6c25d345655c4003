//! Fourget engine: thread API adapter, digest verification, transfer and
//! persistence capabilities, and the work items that archive a thread.
mod accumulator;
mod api;
mod digest;
mod engine;
mod fetch;
mod filename;
mod item;
mod persist;
mod types;

pub use accumulator::{Accumulator, Tally, TallySnapshot};
pub use api::{
    parse_thread, Attachment, ChanEndpoints, ThreadDescription, ThreadRef, ThreadUrlError,
};
pub use digest::{
    digest_file, file_matches, ContentDigest, DigestAlgorithm, DigestError, StreamingDigest,
};
pub use engine::{HarvestConfig, HarvestReport, Harvester, RunStatus};
pub use fetch::{ByteStream, FetchSettings, ReqwestFetcher, ThreadSource, Transfer};
pub use filename::sanitize_file_name;
pub use item::{EngineContext, Item, MediaFetch, Persist, ThreadFetch, THREAD_METADATA_FILE};
pub use persist::{
    ensure_output_dir, AtomicFileWriter, ChunkWriter, FsPersistence, PersistError, Persistence,
};
pub use types::{EngineError, FailureKind, FetchError};
