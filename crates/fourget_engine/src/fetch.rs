use std::time::Duration;

use bytes::Bytes;
use futures_util::stream::BoxStream;
use futures_util::StreamExt;

use crate::api::{parse_thread, ChanEndpoints, ThreadDescription, ThreadRef};
use crate::{FailureKind, FetchError};

/// Chunks of a remote resource as they arrive.
pub type ByteStream = BoxStream<'static, Result<Bytes, FetchError>>;

#[derive(Debug, Clone)]
pub struct FetchSettings {
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
    pub redirect_limit: usize,
    /// Cap on the thread JSON; media transfers are not capped.
    pub max_description_bytes: u64,
    pub user_agent: String,
}

impl Default for FetchSettings {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(30),
            redirect_limit: 5,
            max_description_bytes: 16 * 1024 * 1024,
            user_agent: concat!("fourget/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

/// Resolves a thread to its description.
#[async_trait::async_trait]
pub trait ThreadSource: Send + Sync {
    /// A missing thread is reported as [`FailureKind::NotFound`].
    async fn describe(&self, thread: &ThreadRef) -> Result<ThreadDescription, FetchError>;
}

/// Opens remote resources for streaming.
#[async_trait::async_trait]
pub trait Transfer: Send + Sync {
    async fn open_source(&self, locator: &str) -> Result<ByteStream, FetchError>;
}

#[derive(Debug, Clone)]
pub struct ReqwestFetcher {
    settings: FetchSettings,
    endpoints: ChanEndpoints,
    client: reqwest::Client,
}

impl ReqwestFetcher {
    pub fn new(settings: FetchSettings, endpoints: ChanEndpoints) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .connect_timeout(settings.connect_timeout)
            .timeout(settings.request_timeout)
            .redirect(reqwest::redirect::Policy::limited(settings.redirect_limit))
            .user_agent(settings.user_agent.clone())
            .build()
            .map_err(|err| FetchError::new(FailureKind::Network, err.to_string()))?;
        Ok(Self {
            settings,
            endpoints,
            client,
        })
    }

    pub fn endpoints(&self) -> &ChanEndpoints {
        &self.endpoints
    }

    async fn get(&self, url: &str) -> Result<reqwest::Response, FetchError> {
        let parsed = reqwest::Url::parse(url)
            .map_err(|err| FetchError::new(FailureKind::InvalidUrl, err.to_string()))?;

        let response = self
            .client
            .get(parsed)
            .send()
            .await
            .map_err(map_reqwest_error)?;

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(FetchError::new(
                FailureKind::NotFound,
                format!("{url} cannot be found"),
            ));
        }
        if !status.is_success() {
            return Err(FetchError::new(
                FailureKind::HttpStatus(status.as_u16()),
                status.to_string(),
            ));
        }
        Ok(response)
    }
}

#[async_trait::async_trait]
impl ThreadSource for ReqwestFetcher {
    async fn describe(&self, thread: &ThreadRef) -> Result<ThreadDescription, FetchError> {
        let url = self.endpoints.thread_url(thread);
        let response = self.get(&url).await?;

        let max_bytes = self.settings.max_description_bytes;
        if let Some(content_len) = response.content_length() {
            if content_len > max_bytes {
                return Err(FetchError::new(
                    FailureKind::TooLarge {
                        max_bytes,
                        actual: Some(content_len),
                    },
                    "thread description too large",
                ));
            }
        }

        let mut body = Vec::new();
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(map_reqwest_error)?;
            let next_len = body.len() as u64 + chunk.len() as u64;
            if next_len > max_bytes {
                return Err(FetchError::new(
                    FailureKind::TooLarge {
                        max_bytes,
                        actual: Some(next_len),
                    },
                    "thread description too large",
                ));
            }
            body.extend_from_slice(&chunk);
        }

        parse_thread(thread, &body, &self.endpoints)
    }
}

#[async_trait::async_trait]
impl Transfer for ReqwestFetcher {
    async fn open_source(&self, locator: &str) -> Result<ByteStream, FetchError> {
        let response = self.get(locator).await?;
        Ok(response
            .bytes_stream()
            .map(|chunk| chunk.map_err(map_reqwest_error))
            .boxed())
    }
}

fn map_reqwest_error(err: reqwest::Error) -> FetchError {
    if err.is_timeout() {
        return FetchError::new(FailureKind::Timeout, err.to_string());
    }
    if err.is_redirect() {
        return FetchError::new(FailureKind::RedirectLimitExceeded, err.to_string());
    }
    FetchError::new(FailureKind::Network, err.to_string())
}
