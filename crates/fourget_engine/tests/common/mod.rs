#![allow(dead_code)]

use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use bytes::Bytes;
use fourget_engine::{
    Attachment, ByteStream, ChanEndpoints, ContentDigest, DigestAlgorithm, EngineContext,
    FailureKind, FetchError, FsPersistence, Tally, ThreadDescription, ThreadRef, ThreadSource,
    Transfer,
};
use futures_util::stream::{self, StreamExt};

/// Serves a fixed description, or a fixed error, for every thread.
pub struct FakeSource {
    answer: Result<ThreadDescription, FetchError>,
}

impl FakeSource {
    pub fn describing(description: ThreadDescription) -> Self {
        Self {
            answer: Ok(description),
        }
    }

    pub fn failing(kind: FailureKind) -> Self {
        Self {
            answer: Err(FetchError::new(kind, "fake source")),
        }
    }
}

#[async_trait::async_trait]
impl ThreadSource for FakeSource {
    async fn describe(&self, _thread: &ThreadRef) -> Result<ThreadDescription, FetchError> {
        self.answer.clone()
    }
}

/// In-memory remote files, served in small chunks, with a per-locator call count.
#[derive(Default)]
pub struct FakeTransfer {
    files: HashMap<String, Bytes>,
    failing: HashMap<String, FailureKind>,
    calls: Mutex<HashMap<String, usize>>,
    total_calls: AtomicUsize,
}

impl FakeTransfer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_file(mut self, locator: &str, content: &[u8]) -> Self {
        self.files
            .insert(locator.to_string(), Bytes::copy_from_slice(content));
        self
    }

    pub fn with_failure(mut self, locator: &str, kind: FailureKind) -> Self {
        self.failing.insert(locator.to_string(), kind);
        self
    }

    pub fn calls_for(&self, locator: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .get(locator)
            .copied()
            .unwrap_or(0)
    }

    pub fn total_calls(&self) -> usize {
        self.total_calls.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl Transfer for FakeTransfer {
    async fn open_source(&self, locator: &str) -> Result<ByteStream, FetchError> {
        self.total_calls.fetch_add(1, Ordering::SeqCst);
        *self
            .calls
            .lock()
            .unwrap()
            .entry(locator.to_string())
            .or_default() += 1;

        if let Some(kind) = self.failing.get(locator) {
            return Err(FetchError::new(kind.clone(), format!("{locator} refused")));
        }
        let Some(content) = self.files.get(locator) else {
            return Err(FetchError::new(FailureKind::NotFound, locator.to_string()));
        };
        let chunks: Vec<Result<Bytes, FetchError>> = content
            .chunks(7)
            .map(|chunk| Ok(Bytes::copy_from_slice(chunk)))
            .collect();
        Ok(stream::iter(chunks).boxed())
    }
}

pub fn md5_of(content: &[u8]) -> ContentDigest {
    ContentDigest::of_bytes(DigestAlgorithm::Md5, content)
}

pub fn attachment(name: &str, content: &[u8]) -> Attachment {
    Attachment {
        name: name.to_string(),
        size: content.len() as u64,
        digest: md5_of(content),
        source_url: format!("https://media.test/{name}"),
    }
}

pub fn description(attachments: Vec<Attachment>) -> ThreadDescription {
    ThreadDescription {
        board: "g".to_string(),
        collection_id: 123,
        description: Some("Cats".to_string()),
        attachments,
        raw: Bytes::from_static(b"{\n  \"posts\": []\n}"),
    }
}

pub fn context(source: Arc<FakeSource>, transfer: Arc<FakeTransfer>) -> EngineContext {
    EngineContext {
        source,
        transfer,
        persistence: Arc::new(FsPersistence),
        tally: Arc::new(Tally::new()),
    }
}

pub fn endpoints_for(base: &str) -> ChanEndpoints {
    ChanEndpoints {
        api_base: base.to_string(),
        media_base: base.to_string(),
    }
}

pub fn read(path: &Path) -> Vec<u8> {
    std::fs::read(path).unwrap()
}
