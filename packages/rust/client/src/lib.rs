//! Build service client: one `POST {server}/compile` per program.

mod envelope;

use reqwest::Client;
use tracing::{debug, info, instrument, warn};
use url::Url;

use relaybuild_shared::{Program, RelayError, Result};

pub use envelope::{CompileFailure, CompileResponse, CompileSuccess, ServerFault, decode_envelope};

/// User-Agent string for compile requests.
const USER_AGENT: &str = concat!("relaybuild/", env!("CARGO_PKG_VERSION"));

/// Path segment of the compile endpoint under the server URL.
const COMPILE_PATH: &str = "compile";

/// Submits programs to a build service and interprets its envelopes.
#[derive(Debug, Clone)]
pub struct CompileClient {
    client: Client,
    endpoint: Url,
}

impl CompileClient {
    /// Create a client for the service rooted at `server`.
    pub fn new(server: &Url) -> Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| RelayError::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            endpoint: compile_endpoint(server)?,
        })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// Submit `program` and interpret the response envelope.
    ///
    /// The HTTP status does not decide the outcome; the envelope does.
    #[instrument(skip_all, fields(endpoint = %self.endpoint, files = program.len()))]
    pub async fn submit(&self, program: &Program) -> Result<CompileResponse> {
        info!("submitting compile request");

        let response = self
            .client
            .post(self.endpoint.clone())
            .json(program)
            .send()
            .await
            .map_err(|e| {
                warn!(error = %e, "compile request failed in transit");
                RelayError::Transport
            })?;

        let status = response.status();
        let body = response.text().await.map_err(|e| {
            warn!(%status, error = %e, "failed to read compile response body");
            RelayError::Transport
        })?;

        debug!(%status, bytes = body.len(), "compile response received");
        decode_envelope(&body)
    }
}

/// `{server}/compile`, tolerating a trailing slash on `server`.
fn compile_endpoint(server: &Url) -> Result<Url> {
    let mut endpoint = server.clone();
    endpoint
        .path_segments_mut()
        .map_err(|()| RelayError::config(format!("server url cannot be a base: {server}")))?
        .pop_if_empty()
        .push(COMPILE_PATH);
    endpoint.set_query(None);
    endpoint.set_fragment(None);
    Ok(endpoint)
}
