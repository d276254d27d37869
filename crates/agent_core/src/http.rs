//! reqwest implementation of [`GenerationBackend`].
//!
//! Agent turns stream back as newline-delimited JSON, one [`StreamChunk`] per
//! line. Every other endpoint is plain JSON in and out.

use std::{pin::Pin, time::Duration};

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use futures::{stream, Stream, StreamExt};
use reqwest::{header::ACCEPT, Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use shared::{
    error::{ApiError, ApiException},
    protocol::{
        AgentTurnRequest, GeneratedImage, ImageGenerationRequest, StreamChunk,
        VideoGenerationRequest, VideoOperation,
    },
};
use thiserror::Error;
use tracing::{debug, warn};
use url::Url;

use crate::backend::{ChunkStream, GenerationBackend};

const AGENT_STREAM_PATH: &str = "v1/agent/stream";
const IMAGES_PATH: &str = "v1/images";
const VIDEOS_PATH: &str = "v1/videos";
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Error)]
pub enum BackendError {
    #[error("backend rejected request with status {status}: {source}")]
    Rejected {
        status: u16,
        #[source]
        source: ApiException,
    },
    #[error("malformed stream chunk: {0}")]
    MalformedChunk(#[from] serde_json::Error),
    #[error("invalid backend endpoint '{path}': {source}")]
    InvalidEndpoint {
        path: String,
        #[source]
        source: url::ParseError,
    },
}

#[derive(Debug, Clone)]
pub struct HttpGenerationBackend {
    http: Client,
    base_url: Url,
    api_key: Option<String>,
}

impl HttpGenerationBackend {
    pub fn new(base_url: Url, api_key: Option<String>) -> Result<Self> {
        let http = Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .build()
            .context("failed to build HTTP client")?;
        Ok(Self::with_client(http, base_url, api_key))
    }

    pub fn with_client(http: Client, mut base_url: Url, api_key: Option<String>) -> Self {
        // Relative joins replace the last segment unless the base ends in '/'.
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }
        Self {
            http,
            base_url,
            api_key: api_key.filter(|key| !key.trim().is_empty()),
        }
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        self.base_url
            .join(path)
            .map_err(|source| {
                BackendError::InvalidEndpoint {
                    path: path.to_string(),
                    source,
                }
                .into()
            })
    }

    /// Attaches the API key, but only for requests to the backend's own origin.
    fn authorized(&self, url: &Url, request: RequestBuilder) -> RequestBuilder {
        match &self.api_key {
            Some(key) if url.origin() == self.base_url.origin() => request.bearer_auth(key),
            _ => request,
        }
    }

    async fn post_json<Req, Resp>(&self, path: &str, body: &Req) -> Result<Resp>
    where
        Req: serde::Serialize + Sync,
        Resp: DeserializeOwned,
    {
        let url = self.endpoint(path)?;
        let response = self
            .authorized(&url, self.http.post(url.clone()).json(body))
            .send()
            .await
            .with_context(|| format!("request to {url} failed"))?;
        let response = ensure_success(response).await?;
        response
            .json()
            .await
            .with_context(|| format!("invalid response body from {path}"))
    }
}

#[async_trait]
impl GenerationBackend for HttpGenerationBackend {
    async fn stream_turn(&self, request: AgentTurnRequest) -> Result<ChunkStream> {
        let url = self.endpoint(AGENT_STREAM_PATH)?;
        debug!(
            history = request.history.len(),
            context = request.context.len(),
            "backend: opening agent stream"
        );
        let response = self
            .authorized(&url, self.http.post(url.clone()).json(&request))
            .header(ACCEPT, "application/x-ndjson")
            .send()
            .await
            .context("agent stream request failed")?;
        let response = ensure_success(response).await?;
        Ok(decode_ndjson(response.bytes_stream()))
    }

    async fn generate_image(&self, request: ImageGenerationRequest) -> Result<GeneratedImage> {
        self.post_json(IMAGES_PATH, &request).await
    }

    async fn submit_video(&self, request: VideoGenerationRequest) -> Result<VideoOperation> {
        self.post_json(VIDEOS_PATH, &request).await
    }

    async fn poll_video(&self, operation_id: &str) -> Result<VideoOperation> {
        let mut url = self.endpoint(VIDEOS_PATH)?;
        url.path_segments_mut()
            .map_err(|_| anyhow!("backend URL {} cannot carry a path", self.base_url))?
            .push(operation_id);
        let response = self
            .authorized(&url, self.http.get(url.clone()))
            .send()
            .await
            .with_context(|| format!("failed to poll video operation {operation_id}"))?;
        let response = ensure_success(response).await?;
        response
            .json()
            .await
            .context("invalid video operation body")
    }

    async fn download_video(&self, video_uri: &str) -> Result<Vec<u8>> {
        let url = self.endpoint(video_uri)?;
        let response = self
            .authorized(&url, self.http.get(url.clone()))
            .send()
            .await
            .with_context(|| format!("failed to download video from {url}"))?;
        let response = ensure_success(response).await?;
        let bytes = response.bytes().await.context("video download interrupted")?;
        Ok(bytes.to_vec())
    }
}

/// Maps a non-2xx response to [`BackendError::Rejected`], preferring the
/// backend's own `ApiError` body when it sent one.
async fn ensure_success(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    let api_error = serde_json::from_str::<ApiError>(&body).unwrap_or_else(|_| {
        let message = if body.trim().is_empty() {
            status.canonical_reason().unwrap_or("request failed").to_string()
        } else {
            body.trim().to_string()
        };
        ApiError::from_status(status.as_u16(), message)
    });
    warn!(status = status.as_u16(), code = ?api_error.code, "backend: request rejected");
    Err(BackendError::Rejected {
        status: status.as_u16(),
        source: api_error.into(),
    }
    .into())
}

struct LineDecoder<S> {
    body: Pin<Box<S>>,
    buffer: Vec<u8>,
    finished: bool,
}

impl<S> LineDecoder<S> {
    /// Next non-blank line. A trailing line without a newline is only
    /// released once the body has ended.
    fn next_line(&mut self) -> Option<Vec<u8>> {
        loop {
            let line: Vec<u8> = match self.buffer.iter().position(|byte| *byte == b'\n') {
                Some(end) => self.buffer.drain(..=end).collect(),
                None if self.finished && !self.buffer.is_empty() => std::mem::take(&mut self.buffer),
                None => return None,
            };
            if !line.iter().all(u8::is_ascii_whitespace) {
                return Some(line);
            }
        }
    }
}

/// Splits a byte stream into newline-delimited [`StreamChunk`]s. Lines may be
/// split across body frames. A transport error ends the stream after being
/// yielded once.
pub fn decode_ndjson<S, B, E>(body: S) -> ChunkStream
where
    S: Stream<Item = std::result::Result<B, E>> + Send + 'static,
    B: AsRef<[u8]> + Send + 'static,
    E: Into<anyhow::Error> + Send + 'static,
{
    let decoder = LineDecoder {
        body: Box::pin(body),
        buffer: Vec::new(),
        finished: false,
    };
    stream::unfold(decoder, |mut decoder| async move {
        loop {
            if let Some(line) = decoder.next_line() {
                let chunk = serde_json::from_slice::<StreamChunk>(&line)
                    .map_err(|err| BackendError::MalformedChunk(err).into());
                return Some((chunk, decoder));
            }
            if decoder.finished {
                return None;
            }
            match decoder.body.next().await {
                Some(Ok(bytes)) => decoder.buffer.extend_from_slice(bytes.as_ref()),
                Some(Err(err)) => {
                    decoder.finished = true;
                    decoder.buffer.clear();
                    return Some((Err(err.into()), decoder));
                }
                None => decoder.finished = true,
            }
        }
    })
    .boxed()
}

#[cfg(test)]
#[path = "tests/http_tests.rs"]
mod tests;
