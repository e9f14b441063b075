//! Progress sources: where pull progress lines come from.

use async_trait::async_trait;
use reqwest::header::ACCEPT;
use serde::Serialize;

use crate::config::RegistryConfig;
use crate::error::{Error, Result};
use crate::progress::ProgressLine;
use crate::types::PullRequest;

/// Largest progress line accepted from the registry (512 KiB)
const MAX_LINE_BYTES: usize = 512 * 1024;

/// Callback receiving each progress line in arrival order
pub type ProgressSink<'a> = &'a (dyn Fn(ProgressLine) + Send + Sync);

/// A transport that performs a pull and reports its progress
///
/// Implementations call `sink` for every progress line and return once the
/// transfer ends: `Ok(())` when the stream closed normally, an error when the
/// transport failed. Dropping the returned future must abort the transfer.
#[async_trait]
pub trait PullSource: Send + Sync {
    /// Run the pull described by `request`
    async fn pull(&self, request: &PullRequest, sink: ProgressSink<'_>) -> Result<()>;
}

/// Body of the registry's pull endpoint
#[derive(Serialize)]
struct PullBody<'a> {
    model: &'a str,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    insecure: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    username: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    password: Option<&'a str>,
    stream: bool,
}

/// Pulls over HTTP from an Ollama-compatible registry endpoint
///
/// Issues `POST /api/pull` and reads the newline-delimited JSON response
/// incrementally.
#[derive(Clone, Debug)]
pub struct HttpPullSource {
    client: reqwest::Client,
    endpoint: url::Url,
}

impl HttpPullSource {
    /// Build a source from the registry configuration
    pub fn new(config: &RegistryConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout)
            .user_agent(config.user_agent.clone())
            .build()?;
        let endpoint = config
            .host
            .base_url()?
            .join("api/pull")
            .map_err(|e| Error::config("registry.host", e.to_string()))?;
        Ok(Self { client, endpoint })
    }

    /// Endpoint pulls are posted to
    pub fn endpoint(&self) -> &url::Url {
        &self.endpoint
    }
}

#[async_trait]
impl PullSource for HttpPullSource {
    async fn pull(&self, request: &PullRequest, sink: ProgressSink<'_>) -> Result<()> {
        let artifact = request.artifact()?;
        let body = PullBody {
            model: artifact.as_str(),
            insecure: request.insecure,
            username: request.username.as_deref(),
            password: request.password.as_deref(),
            stream: true,
        };

        tracing::debug!(artifact = %artifact, endpoint = %self.endpoint, "requesting pull");
        let mut response = self
            .client
            .post(self.endpoint.clone())
            .header(ACCEPT, "application/x-ndjson")
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        let mut lines = LineBuffer::default();
        let mut saw_line = false;

        while let Some(chunk) = response.chunk().await? {
            for line in lines.push(&chunk)? {
                saw_line = true;
                deliver(status, &line, sink)?;
            }
        }
        if let Some(line) = lines.finish() {
            saw_line = true;
            deliver(status, &line, sink)?;
        }

        if !saw_line && (status.is_client_error() || status.is_server_error()) {
            return Err(Error::Registry {
                status: status.as_u16(),
                message: status
                    .canonical_reason()
                    .unwrap_or("unknown status")
                    .to_string(),
            });
        }
        Ok(())
    }
}

// Decode one line and hand it to the sink, turning failure lines and error
// statuses into errors.
fn deliver(status: reqwest::StatusCode, raw: &[u8], sink: ProgressSink<'_>) -> Result<()> {
    let failed_status = status.is_client_error() || status.is_server_error();
    let line: ProgressLine = match serde_json::from_slice(raw) {
        Ok(line) => line,
        Err(_) if failed_status => {
            return Err(Error::Registry {
                status: status.as_u16(),
                message: String::from_utf8_lossy(raw).trim().to_string(),
            });
        }
        Err(e) => return Err(e.into()),
    };

    if let Some(message) = line.failure() {
        if failed_status {
            return Err(Error::Registry {
                status: status.as_u16(),
                message: message.to_string(),
            });
        }
        return Err(Error::Transport(message.to_string()));
    }
    if failed_status {
        return Err(Error::Registry {
            status: status.as_u16(),
            message: status
                .canonical_reason()
                .unwrap_or("unknown status")
                .to_string(),
        });
    }

    sink(line);
    Ok(())
}

/// Splits a byte stream into newline-terminated lines
#[derive(Debug, Default)]
pub(crate) struct LineBuffer {
    pending: Vec<u8>,
    // Prefix of `pending` already known to hold no newline
    scanned: usize,
}

impl LineBuffer {
    /// Append a chunk and return every line it completed (blank lines skipped)
    pub(crate) fn push(&mut self, chunk: &[u8]) -> Result<Vec<Vec<u8>>> {
        self.pending.extend_from_slice(chunk);

        let mut lines = Vec::new();
        while let Some(offset) = self.pending[self.scanned..]
            .iter()
            .position(|b| *b == b'\n')
        {
            let mut line: Vec<u8> = self.pending.drain(..=self.scanned + offset).collect();
            self.scanned = 0;
            line.pop();
            if line.last() == Some(&b'\r') {
                line.pop();
            }
            if !line.iter().all(u8::is_ascii_whitespace) {
                lines.push(line);
            }
        }
        self.scanned = self.pending.len();

        if self.pending.len() > MAX_LINE_BYTES {
            return Err(Error::Transport(format!(
                "progress line exceeds {MAX_LINE_BYTES} bytes"
            )));
        }
        Ok(lines)
    }

    /// The unterminated remainder, if it holds anything
    pub(crate) fn finish(self) -> Option<Vec<u8>> {
        let mut rest = self.pending;
        if rest.last() == Some(&b'\r') {
            rest.pop();
        }
        (!rest.iter().all(u8::is_ascii_whitespace)).then_some(rest)
    }
}
