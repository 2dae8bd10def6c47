//! Host document loading and fragment discovery.
//!
//! A host document is an HTML page whose `<script>` elements carry source and
//! project configuration fragments, either inline or by `src` reference.
//! Enumeration takes one snapshot of those elements per compile invocation.

mod enumerate;

use std::path::Path;
use std::time::Duration;

use relaybuild_shared::{MarkerConfig, RelayError, Result};
use reqwest::Client;
use tracing::{debug, info, instrument};
use url::Url;

pub use enumerate::Enumeration;

/// Maximum number of redirects to follow when fetching a document.
const MAX_REDIRECTS: usize = 5;

/// Timeout in seconds for fetching a host document.
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// User-Agent string for document requests.
const USER_AGENT: &str = concat!("relaybuild/", env!("CARGO_PKG_VERSION"));

// ---------------------------------------------------------------------------
// HostDocument
// ---------------------------------------------------------------------------

/// An HTML host document and the URL its relative references resolve against.
#[derive(Debug, Clone)]
pub struct HostDocument {
    html: String,
    base: Url,
}

impl HostDocument {
    /// Build a document from HTML already in memory.
    pub fn from_html(html: impl Into<String>, base: Url) -> Self {
        Self {
            html: html.into(),
            base,
        }
    }

    /// Load a document from an `http(s)`/`file` URL or a filesystem path.
    #[instrument(skip_all, fields(location = %location))]
    pub async fn load(location: &str) -> Result<Self> {
        match Url::parse(location) {
            Ok(url) if matches!(url.scheme(), "http" | "https") => Self::fetch(url).await,
            Ok(url) if url.scheme() == "file" => {
                let path = url
                    .to_file_path()
                    .map_err(|()| RelayError::parse(format!("not a local file URL: {url}")))?;
                Self::read(&path).await
            }
            _ => Self::read(Path::new(location)).await,
        }
    }

    /// Override the base URL used to resolve `src` attributes.
    pub fn with_base(mut self, base: Url) -> Self {
        self.base = base;
        self
    }

    pub fn html(&self) -> &str {
        &self.html
    }

    pub fn base(&self) -> &Url {
        &self.base
    }

    /// Snapshot every fragment element matching `markers`.
    pub fn enumerate(&self, markers: &MarkerConfig) -> Result<Enumeration> {
        let enumeration = enumerate::enumerate_html(&self.html, &self.base, markers)?;
        info!(
            base = %self.base,
            remote = enumeration.remote_count(),
            inline = enumeration.inline_count(),
            "fragments enumerated"
        );
        Ok(enumeration)
    }

    async fn fetch(url: Url) -> Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .redirect(reqwest::redirect::Policy::limited(MAX_REDIRECTS))
            .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
            .build()
            .map_err(|e| RelayError::Network(format!("failed to build HTTP client: {e}")))?;

        let response = client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| RelayError::Network(format!("{url}: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(RelayError::Network(format!("{url}: HTTP {status}")));
        }

        // Redirects move the base along with the document.
        let base = response.url().clone();
        let html = response
            .text()
            .await
            .map_err(|e| RelayError::Network(format!("{url}: failed to read body: {e}")))?;

        debug!(%base, bytes = html.len(), "host document fetched");
        Ok(Self { html, base })
    }

    async fn read(path: &Path) -> Result<Self> {
        let html = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| RelayError::io(path, e))?;
        let absolute = std::path::absolute(path).map_err(|e| RelayError::io(path, e))?;
        let base = Url::from_file_path(&absolute).map_err(|()| {
            RelayError::parse(format!("cannot express {} as a URL", absolute.display()))
        })?;

        debug!(%base, bytes = html.len(), "host document read");
        Ok(Self { html, base })
    }
}
