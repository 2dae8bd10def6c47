//! End-to-end compile cycle: document → enumerate → fetch/join → compile → inject.

use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use tracing::{error, info, instrument};

use relaybuild_client::{CompileClient, CompileResponse};
use relaybuild_discovery::HostDocument;
use relaybuild_fetch::FetchCoordinator;
use relaybuild_inject::{ArtifactInjector, HostEnvironment};
use relaybuild_shared::{AttemptId, CompileConfig, Program, RelayError, Result};

/// Result of one successful compile cycle.
#[derive(Debug, Clone)]
pub struct CycleReport {
    pub attempt: AttemptId,
    /// Fragments submitted.
    pub fragment_count: usize,
    /// Artifacts returned and injected.
    pub artifact_count: usize,
    pub script_count: usize,
    pub auxiliary_count: usize,
    /// SHA-256 of the serialized program, hex encoded.
    pub program_digest: String,
    /// Diagnostic markup returned with the artifacts.
    pub diagnostics: String,
    pub completed_at: DateTime<Utc>,
    pub elapsed: Duration,
}

/// Status callbacks for presenting a cycle to whoever is watching.
pub trait StatusReporter: Send + Sync {
    /// Called when entering a new phase.
    fn phase(&self, name: &str);
    /// A non-fatal notice (e.g. missing configuration fragment).
    fn advisory(&self, message: &str);
    /// Diagnostic markup from the build service.
    fn diagnostics(&self, markup: &str);
    /// The attempt stopped; nothing will be injected.
    fn fatal(&self, message: &str);
    /// Called when the cycle completes.
    fn done(&self, report: &CycleReport);
}

/// No-op status reporter for headless/test usage.
pub struct SilentStatus;

impl StatusReporter for SilentStatus {
    fn phase(&self, _name: &str) {}
    fn advisory(&self, _message: &str) {}
    fn diagnostics(&self, _markup: &str) {}
    fn fatal(&self, _message: &str) {}
    fn done(&self, _report: &CycleReport) {}
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

/// Configure-once entry point.
#[derive(Debug, Default)]
pub struct Session {
    config: Option<CompileConfig>,
}

impl Session {
    /// An unconfigured session; [`Session::compile`] fails until configured.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the endpoint and labels. Only the first call succeeds.
    pub fn configure(&mut self, config: CompileConfig) -> Result<()> {
        if self.config.is_some() {
            return Err(RelayError::config("session is already configured"));
        }
        info!(server = %config.server, "session configured");
        self.config = Some(config);
        Ok(())
    }

    pub fn config(&self) -> Option<&CompileConfig> {
        self.config.as_ref()
    }

    /// Run one cycle with the session's configuration.
    pub async fn compile(
        &self,
        document: &HostDocument,
        host: &mut dyn HostEnvironment,
        status: &dyn StatusReporter,
    ) -> Result<CycleReport> {
        let Some(config) = &self.config else {
            error!("compile invoked before the session was configured");
            return Err(RelayError::NotConfigured);
        };
        compile_cycle(config, document, host, status).await
    }
}

// ---------------------------------------------------------------------------
// Cycle
// ---------------------------------------------------------------------------

/// Run one aggregation-to-injection cycle.
///
/// 1. Enumerate fragments (advisories forwarded to `status`)
/// 2. Fetch remote fragments and join into one program
/// 3. Submit to the build service
/// 4. Inject artifacts into `host`, only on success
#[instrument(skip_all, fields(server = %config.server))]
pub async fn compile_cycle(
    config: &CompileConfig,
    document: &HostDocument,
    host: &mut dyn HostEnvironment,
    status: &dyn StatusReporter,
) -> Result<CycleReport> {
    let start = Instant::now();
    let attempt = AttemptId::new();
    info!(%attempt, base = %document.base(), "starting compile cycle");

    // --- Phase 1: Enumerate ---
    status.phase("Enumerating fragments");
    let enumeration = document
        .enumerate(&config.markers)
        .map_err(|e| fatal(status, e))?;
    for advisory in &enumeration.advisories {
        status.advisory(advisory);
    }

    // --- Phase 2: Fetch/join ---
    status.phase(&format!(
        "Fetching {} remote fragment(s)",
        enumeration.remote_count()
    ));
    let coordinator = FetchCoordinator::from_config(config).map_err(|e| fatal(status, e))?;
    let program = coordinator
        .gather(enumeration.sources)
        .await
        .map_err(|e| fatal(status, e))?;
    let program_digest = program_digest(&program)?;
    info!(%attempt, files = program.len(), digest = %program_digest, "program assembled");

    // --- Phase 3: Compile ---
    status.phase("Compiling");
    let client = CompileClient::new(&config.server).map_err(|e| fatal(status, e))?;
    let response = client.submit(&program).await.map_err(|e| fatal(status, e))?;

    let success = match response {
        CompileResponse::Fault(fault) => {
            let err = fatal(
                status,
                RelayError::ServerFault {
                    reason: fault.reason,
                },
            );
            if let Some(markup) = fault.diagnostic_output.as_deref() {
                status.diagnostics(markup);
            }
            return Err(err);
        }
        CompileResponse::Failure(failure) => {
            status.diagnostics(&failure.diagnostic_output);
            return Err(fatal(
                status,
                RelayError::CompileFailure {
                    diagnostics: failure.diagnostic_output,
                },
            ));
        }
        CompileResponse::Success(success) => {
            if !success.diagnostic_output.is_empty() {
                status.diagnostics(&success.diagnostic_output);
            }
            success
        }
    };

    // --- Phase 4: Inject ---
    status.phase(&format!("Injecting {} artifact(s)", success.files.len()));
    let injector = ArtifactInjector::new(config.execution.clone());
    let summary = injector
        .inject(&success.files, host)
        .map_err(|e| fatal(status, e))?;

    let report = CycleReport {
        attempt,
        fragment_count: program.len(),
        artifact_count: summary.total(),
        script_count: summary.script,
        auxiliary_count: summary.auxiliary,
        program_digest,
        diagnostics: success.diagnostic_output,
        completed_at: Utc::now(),
        elapsed: start.elapsed(),
    };

    info!(
        %attempt,
        fragments = report.fragment_count,
        artifacts = report.artifact_count,
        elapsed_ms = report.elapsed.as_millis(),
        "compile cycle completed"
    );
    status.done(&report);

    Ok(report)
}

/// Report `err` as fatal and hand it back for propagation.
fn fatal(status: &dyn StatusReporter, err: RelayError) -> RelayError {
    error!(error = %err, "compile cycle stopped");
    status.fatal(&err.to_string());
    err
}

fn program_digest(program: &Program) -> Result<String> {
    let bytes = serde_json::to_vec(program)
        .map_err(|e| RelayError::validation(format!("program does not serialize: {e}")))?;
    let mut hasher = Sha256::new();
    hasher.update(&bytes);
    Ok(format!("{:x}", hasher.finalize()))
}
