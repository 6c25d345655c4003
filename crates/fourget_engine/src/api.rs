//! Imageboard thread API: thread URLs, endpoint layout and the JSON shape of a
//! thread.

use std::fmt;

use bytes::Bytes;
use serde::Deserialize;
use thiserror::Error;
use url::Url;

use crate::digest::{ContentDigest, DigestAlgorithm};
use crate::filename::sanitize_file_name;
use crate::types::{FailureKind, FetchError};

const DESCRIPTION_MAX_CHARS: usize = 80;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error(
    "{url} does not look like a valid thread URL. Valid URLs take the form \
     \"https://boards.4channel.org/<board>/thread/<post_id>\". The \"4chan.org\" \
     domain may also be used."
)]
pub struct ThreadUrlError {
    pub url: String,
}

/// Identifies one thread: a board and the number of its opening post.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ThreadRef {
    pub board: String,
    pub thread_id: u64,
}

impl ThreadRef {
    pub fn new(board: impl Into<String>, thread_id: u64) -> Self {
        Self {
            board: board.into(),
            thread_id,
        }
    }

    /// Parses a desktop thread URL; a trailing slug segment is accepted.
    pub fn from_url(raw: &str) -> Result<Self, ThreadUrlError> {
        let malformed = || ThreadUrlError {
            url: raw.to_string(),
        };
        let url = Url::parse(raw).map_err(|_| malformed())?;
        let segments: Vec<&str> = url
            .path_segments()
            .map(|segments| segments.filter(|s| !s.is_empty()).collect())
            .unwrap_or_default();

        match segments.as_slice() {
            [board, "thread", id] | [board, "thread", id, _] => {
                let thread_id = id.parse().map_err(|_| malformed())?;
                Ok(Self::new(*board, thread_id))
            }
            _ => Err(malformed()),
        }
    }
}

impl fmt::Display for ThreadRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "/{}/thread/{}", self.board, self.thread_id)
    }
}

/// Base URLs of the JSON API and the media host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChanEndpoints {
    pub api_base: String,
    pub media_base: String,
}

impl Default for ChanEndpoints {
    fn default() -> Self {
        Self {
            api_base: "https://a.4cdn.org".to_string(),
            media_base: "https://i.4cdn.org".to_string(),
        }
    }
}

impl ChanEndpoints {
    pub fn thread_url(&self, thread: &ThreadRef) -> String {
        format!(
            "{}/{}/thread/{}.json",
            self.api_base.trim_end_matches('/'),
            thread.board,
            thread.thread_id
        )
    }

    pub fn media_url(&self, board: &str, timestamp: u64, extension: &str) -> String {
        format!(
            "{}/{}/{}{}",
            self.media_base.trim_end_matches('/'),
            board,
            timestamp,
            extension
        )
    }
}

/// One file attached to a post.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    /// Local file name, already sanitized.
    pub name: String,
    pub size: u64,
    pub digest: ContentDigest,
    pub source_url: String,
}

/// What a thread resolves to: its id, an optional short description, every
/// attachment, and the raw metadata to keep next to the files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThreadDescription {
    pub board: String,
    pub collection_id: u64,
    pub description: Option<String>,
    pub attachments: Vec<Attachment>,
    pub raw: Bytes,
}

impl ThreadDescription {
    pub fn total_size(&self) -> u64 {
        self.attachments.iter().map(|a| a.size).sum()
    }

    /// `4chan - <board> - <id>[ - <description>]`, sanitized.
    pub fn directory_name(&self) -> String {
        let trailer = self
            .description
            .as_deref()
            .map(|d| format!(" - {d}"))
            .unwrap_or_default();
        sanitize_file_name(&format!(
            "4chan - {} - {}{}",
            self.board, self.collection_id, trailer
        ))
    }
}

#[derive(Debug, Deserialize)]
struct ThreadJson {
    posts: Vec<PostJson>,
}

#[derive(Debug, Deserialize)]
struct PostJson {
    no: u64,
    sub: Option<String>,
    com: Option<String>,
    tim: Option<u64>,
    ext: Option<String>,
    fsize: Option<u64>,
    md5: Option<String>,
    filename: Option<String>,
}

impl PostJson {
    fn description(&self) -> Option<String> {
        [&self.sub, &self.com]
            .into_iter()
            .flatten()
            .find(|text| !text.is_empty())
            .map(|text| text.chars().take(DESCRIPTION_MAX_CHARS).collect())
    }

    fn attachment(
        &self,
        board: &str,
        endpoints: &ChanEndpoints,
    ) -> Result<Option<Attachment>, FetchError> {
        let (Some(tim), Some(ext), Some(size), Some(md5), Some(stem)) = (
            self.tim,
            self.ext.as_deref(),
            self.fsize,
            self.md5.as_deref(),
            self.filename.as_deref(),
        ) else {
            return Ok(None);
        };

        let digest = ContentDigest::from_base64(DigestAlgorithm::Md5, md5).map_err(|err| {
            FetchError::new(
                FailureKind::Malformed,
                format!("post {} has a bad md5: {err}", self.no),
            )
        })?;

        Ok(Some(Attachment {
            name: sanitize_file_name(&format!("{tim} - {stem}{ext}")),
            size,
            digest,
            source_url: endpoints.media_url(board, tim, ext),
        }))
    }
}

/// Maps the API's thread JSON onto a [`ThreadDescription`].
///
/// The raw payload kept for persistence is the same JSON pretty-printed.
pub fn parse_thread(
    thread: &ThreadRef,
    body: &[u8],
    endpoints: &ChanEndpoints,
) -> Result<ThreadDescription, FetchError> {
    let malformed = |err: serde_json::Error| FetchError::new(FailureKind::Malformed, err.to_string());

    let value: serde_json::Value = serde_json::from_slice(body).map_err(malformed)?;
    let parsed: ThreadJson = serde_json::from_value(value.clone()).map_err(malformed)?;

    let Some(first) = parsed.posts.first() else {
        return Err(FetchError::new(
            FailureKind::Malformed,
            format!("thread {thread} has no posts"),
        ));
    };

    let mut attachments = Vec::new();
    for post in &parsed.posts {
        if let Some(attachment) = post.attachment(&thread.board, endpoints)? {
            attachments.push(attachment);
        }
    }

    let raw = serde_json::to_vec_pretty(&value).map_err(malformed)?;

    Ok(ThreadDescription {
        board: thread.board.clone(),
        collection_id: first.no,
        description: first.description(),
        attachments,
        raw: Bytes::from(raw),
    })
}
