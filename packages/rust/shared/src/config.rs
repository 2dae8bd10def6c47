//! Application configuration for relaybuild.
//!
//! User config lives at `~/.relaybuild/relaybuild.toml`.
//! CLI flags override config file values, which override defaults.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{RelayError, Result};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "relaybuild.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".relaybuild";

/// Server URL written by `config init`.
const STARTER_SERVER_URL: &str = "http://localhost:8080";

// ---------------------------------------------------------------------------
// Config structs (matching relaybuild.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Build service settings.
    #[serde(default)]
    pub server: ServerConfig,

    /// Host document marker labels.
    #[serde(default)]
    pub markers: MarkerConfig,

    /// Artifact execution mode labels.
    #[serde(default)]
    pub execution: ExecutionConfig,

    /// Fragment fetch behavior.
    #[serde(default)]
    pub fetch: FetchConfig,
}

/// `[server]` section.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Base URL of the build service. `/compile` is appended on submit.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

/// `[markers]` section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarkerConfig {
    /// `type` attribute of source fragment elements.
    #[serde(default = "default_source_marker")]
    pub source: String,

    /// `type` attribute of the project configuration element.
    #[serde(default = "default_config_marker")]
    pub config: String,

    /// Extension used for generated source fragment names.
    #[serde(default = "default_source_extension")]
    pub source_extension: String,
}

impl Default for MarkerConfig {
    fn default() -> Self {
        Self {
            source: default_source_marker(),
            config: default_config_marker(),
            source_extension: default_source_extension(),
        }
    }
}

fn default_source_marker() -> String {
    "text/typescript".into()
}
fn default_config_marker() -> String {
    "text/tsconfig+json".into()
}
fn default_source_extension() -> String {
    "ts".into()
}

/// `[execution]` section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionConfig {
    /// Label for directly-runnable artifacts.
    #[serde(default = "default_script_mode")]
    pub script_mode: String,

    /// Label for every other artifact kind (source maps, styles, ...).
    #[serde(default = "default_auxiliary_mode")]
    pub auxiliary_mode: String,

    /// Artifact name suffix selecting the script mode.
    #[serde(default = "default_script_extension")]
    pub script_extension: String,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            script_mode: default_script_mode(),
            auxiliary_mode: default_auxiliary_mode(),
            script_extension: default_script_extension(),
        }
    }
}

fn default_script_mode() -> String {
    "text/javascript".into()
}
fn default_auxiliary_mode() -> String {
    "text/plain".into()
}
fn default_script_extension() -> String {
    ".js".into()
}

/// Order of fragments in the submitted program.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FragmentOrder {
    /// One slot reserved per fragment at enumeration; document order is kept.
    #[default]
    Discovery,
    /// Inline fragments first, remote fragments as their fetches complete.
    Completion,
}

/// What a failed remote fetch does to the aggregation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FetchFailurePolicy {
    /// Abandon the attempt with a fetch error once the join completes.
    #[default]
    Abort,
    /// Submit whatever content was obtained, possibly empty.
    Tolerate,
}

/// `[fetch]` section.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FetchConfig {
    #[serde(default)]
    pub order: FragmentOrder,

    #[serde(default)]
    pub on_error: FetchFailurePolicy,
}

// ---------------------------------------------------------------------------
// Compile config (runtime, merged from config + CLI flags)
// ---------------------------------------------------------------------------

/// Runtime configuration for one session: endpoint, labels, fetch behavior.
#[derive(Debug, Clone)]
pub struct CompileConfig {
    /// Build service base URL.
    pub server: Url,
    pub markers: MarkerConfig,
    pub execution: ExecutionConfig,
    pub order: FragmentOrder,
    pub on_fetch_error: FetchFailurePolicy,
}

impl CompileConfig {
    /// Config with default labels pointed at `server`.
    pub fn new(server: Url) -> Self {
        Self {
            server,
            markers: MarkerConfig::default(),
            execution: ExecutionConfig::default(),
            order: FragmentOrder::default(),
            on_fetch_error: FetchFailurePolicy::default(),
        }
    }
}

impl TryFrom<&AppConfig> for CompileConfig {
    type Error = RelayError;

    fn try_from(config: &AppConfig) -> Result<Self> {
        let raw = config
            .server
            .url
            .as_deref()
            .ok_or_else(|| RelayError::config("no build service URL configured ([server] url)"))?;
        let server = Url::parse(raw)
            .map_err(|e| RelayError::config(format!("invalid server url '{raw}': {e}")))?;

        Ok(Self {
            server,
            markers: config.markers.clone(),
            execution: config.execution.clone(),
            order: config.fetch.order,
            on_fetch_error: config.fetch.on_error,
        })
    }
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.relaybuild/`).
pub fn config_dir() -> Result<PathBuf> {
    let home =
        dirs::home_dir().ok_or_else(|| RelayError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.relaybuild/relaybuild.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| RelayError::io(path, e))?;

    toml::from_str(&content)
        .map_err(|e| RelayError::config(format!("failed to parse {}: {e}", path.display())))
}

/// Create the config directory and write a starter config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| RelayError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    write_starter_config(&path)?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}

fn write_starter_config(path: &Path) -> Result<()> {
    let mut config = AppConfig::default();
    config.server.url = Some(STARTER_SERVER_URL.into());
    let content =
        toml::to_string_pretty(&config).map_err(|e| RelayError::config(e.to_string()))?;

    std::fs::write(path, content).map_err(|e| RelayError::io(path, e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_has_no_server() {
        let config = AppConfig::default();
        assert!(config.server.url.is_none());
        let err = CompileConfig::try_from(&config).unwrap_err();
        assert!(err.to_string().contains("no build service URL"));
    }

    #[test]
    fn starter_config_roundtrip() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join(CONFIG_FILE_NAME);
        write_starter_config(&path).expect("write");

        let parsed = load_config_from(&path).expect("load");
        assert_eq!(parsed.server.url.as_deref(), Some(STARTER_SERVER_URL));
        assert_eq!(parsed.markers.source, "text/typescript");
        assert_eq!(parsed.execution.script_extension, ".js");
        assert_eq!(parsed.fetch.order, FragmentOrder::Discovery);
    }

    #[test]
    fn partial_config_fills_defaults() {
        let toml_str = r#"
[server]
url = "https://build.example.com"

[execution]
auxiliary_mode = "text/css"

[fetch]
order = "completion"
on_error = "tolerate"
"#;
        let config: AppConfig = toml::from_str(toml_str).expect("parse");
        let compile = CompileConfig::try_from(&config).expect("compile config");
        assert_eq!(compile.server.as_str(), "https://build.example.com/");
        assert_eq!(compile.execution.auxiliary_mode, "text/css");
        assert_eq!(compile.execution.script_mode, "text/javascript");
        assert_eq!(compile.markers.config, "text/tsconfig+json");
        assert_eq!(compile.order, FragmentOrder::Completion);
        assert_eq!(compile.on_fetch_error, FetchFailurePolicy::Tolerate);
    }

    #[test]
    fn invalid_server_url_is_config_error() {
        let mut config = AppConfig::default();
        config.server.url = Some("not a url".into());
        let err = CompileConfig::try_from(&config).unwrap_err();
        assert!(matches!(err, RelayError::Config { .. }));
    }

    #[test]
    fn malformed_file_reports_path() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("broken.toml");
        std::fs::write(&path, "[server\nurl = 1").expect("write");
        let err = load_config_from(&path).unwrap_err();
        assert!(err.to_string().contains("broken.toml"));
    }
}
