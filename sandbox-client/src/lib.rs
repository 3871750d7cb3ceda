#![forbid(unsafe_code)]
#![warn(clippy::dbg_macro, clippy::use_debug, clippy::todo)]

use std::time::Duration;

use reqwest::StatusCode;
use url::Url;

pub mod schemas;

use schemas::{RunRequest, RunResult};

/// Client for the sandboxed code execution service.
///
/// The service compiles and runs untrusted source code in an isolated
/// environment and reports a numeric outcome code per run. The numeric codes
/// are a vendor detail and never leave this crate; see
/// [`schemas::OutcomeKind`].
#[derive(Debug, Clone)]
pub struct SandboxClient {
    base_url: Url,
    client: reqwest::Client,
}

impl SandboxClient {
    /// Create a new client. `request_timeout` is a hard upper bound on every
    /// run request, including the sandbox-side compile and execution time.
    pub fn new(base_url: Url, request_timeout: Duration) -> Result<Self, Error> {
        Ok(Self {
            base_url,
            client: reqwest::Client::builder().timeout(request_timeout).build()?,
        })
    }

    /// Submit a single run to the sandbox and wait for its outcome.
    pub async fn submit_run(&self, request: &RunRequest<'_>) -> Result<RunResult, Error> {
        let response = self
            .client
            .post(self.base_url.join("runs")?)
            .json(request)
            .send()
            .await?;
        match response.status() {
            StatusCode::OK => Ok(response.json().await?),
            code => Err(Error::UnexpectedStatusCode(code)),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The endpoint url could not be constructed.
    #[error("could not parse url: {0}")]
    UrlParseError(#[from] url::ParseError),
    /// [`reqwest`] returned an error (includes the hard request timeout).
    #[error("reqwest error: {0}")]
    ReqwestError(#[from] reqwest::Error),
    /// The sandbox responded with an unexpected status code.
    #[error("unexpected response status code: {0}")]
    UnexpectedStatusCode(StatusCode),
}

impl Error {
    /// Whether the error was caused by the hard request timeout.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::ReqwestError(err) if err.is_timeout())
    }
}
