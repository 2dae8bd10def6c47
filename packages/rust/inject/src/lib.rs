//! Execution of compiled artifacts in the host environment.
//!
//! Artifacts are executed strictly in response order. Each one is classified
//! by name: the configured script extension selects the script mode, anything
//! else (source maps, styles, ...) goes through the auxiliary mode. Injection
//! is append-only; a failure stops the batch and leaves earlier artifacts in
//! place.

mod html;

use relaybuild_shared::{ExecutionConfig, Fragment, Result};
use tracing::{debug, info, instrument, warn};

pub use html::HtmlDocumentHost;

/// How one artifact is executed, with the configured label.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionMode<'a> {
    /// Directly-runnable code.
    Script(&'a str),
    /// Non-executable or auxiliary content.
    Auxiliary(&'a str),
}

impl<'a> ExecutionMode<'a> {
    pub fn label(&self) -> &'a str {
        match self {
            Self::Script(label) | Self::Auxiliary(label) => label,
        }
    }

    pub fn is_script(&self) -> bool {
        matches!(self, Self::Script(_))
    }
}

/// The live environment artifacts are injected into.
pub trait HostEnvironment {
    /// Make `artifact` part of the environment using `mode`.
    fn execute(&mut self, artifact: &Fragment, mode: ExecutionMode<'_>) -> Result<()>;
}

/// Counts of artifacts injected per mode.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InjectionSummary {
    pub script: usize,
    pub auxiliary: usize,
}

impl InjectionSummary {
    pub fn total(&self) -> usize {
        self.script + self.auxiliary
    }
}

/// Classifies and injects artifacts according to [`ExecutionConfig`].
#[derive(Debug, Clone)]
pub struct ArtifactInjector {
    modes: ExecutionConfig,
}

impl ArtifactInjector {
    pub fn new(modes: ExecutionConfig) -> Self {
        Self { modes }
    }

    /// Pick the execution mode for an artifact name.
    pub fn classify(&self, name: &str) -> ExecutionMode<'_> {
        if name.ends_with(&self.modes.script_extension) {
            ExecutionMode::Script(&self.modes.script_mode)
        } else {
            ExecutionMode::Auxiliary(&self.modes.auxiliary_mode)
        }
    }

    /// Execute `artifacts` in order.
    #[instrument(skip_all, fields(artifacts = artifacts.len()))]
    pub fn inject(
        &self,
        artifacts: &[Fragment],
        host: &mut dyn HostEnvironment,
    ) -> Result<InjectionSummary> {
        let mut summary = InjectionSummary::default();

        for artifact in artifacts {
            let mode = self.classify(&artifact.name);
            debug!(name = %artifact.name, mode = mode.label(), "injecting artifact");

            if let Err(e) = host.execute(artifact, mode) {
                warn!(
                    name = %artifact.name,
                    injected = summary.total(),
                    error = %e,
                    "artifact injection stopped"
                );
                return Err(e);
            }

            if mode.is_script() {
                summary.script += 1;
            } else {
                summary.auxiliary += 1;
            }
        }

        info!(
            script = summary.script,
            auxiliary = summary.auxiliary,
            "artifacts injected"
        );
        Ok(summary)
    }
}
