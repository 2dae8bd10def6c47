//! CLI command definitions, routing, and tracing setup.

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, eyre};
use indicatif::{ProgressBar, ProgressStyle};
use relaybuild_core::{CycleReport, Session, StatusReporter};
use relaybuild_discovery::HostDocument;
use relaybuild_inject::HtmlDocumentHost;
use relaybuild_shared::{
    AppConfig, CompileConfig, FragmentKind, FragmentSource, init_config, load_config,
    load_config_from,
};
use tracing::info;
use url::Url;

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// relaybuild — compile page-embedded fragments on a remote build service.
#[derive(Parser)]
#[command(
    name = "relaybuild",
    version,
    about = "Bundle the source fragments of an HTML page, compile them remotely, and inject the results.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Config file to use instead of ~/.relaybuild/relaybuild.toml.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Run one compile cycle over a host document.
    Compile {
        /// HTML document: file path or http(s) URL.
        document: String,

        /// Build service URL (overrides [server] url).
        #[arg(long, env = "RELAYBUILD_SERVER")]
        server: Option<String>,

        /// Base URL for resolving fragment `src` attributes.
        #[arg(long)]
        base_url: Option<String>,

        /// Write the injected document here instead of stdout.
        #[arg(short, long)]
        out: Option<PathBuf>,
    },

    /// List the fragments a compile would collect, without compiling.
    Fragments {
        /// HTML document: file path or http(s) URL.
        document: String,

        /// Base URL for resolving fragment `src` attributes.
        #[arg(long)]
        base_url: Option<String>,
    },

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Initialize config file with defaults.
    Init,
    /// Show resolved configuration.
    Show,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags. Logs go to stderr.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "relaybuild=info",
        1 => "relaybuild=debug",
        _ => "relaybuild=trace",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .with_writer(std::io::stderr)
                .init();
        }
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    let config_path = cli.config.as_deref();
    match cli.command {
        Command::Compile {
            document,
            server,
            base_url,
            out,
        } => {
            cmd_compile(
                config_path,
                &document,
                server.as_deref(),
                base_url.as_deref(),
                out.as_deref(),
            )
            .await
        }
        Command::Fragments { document, base_url } => {
            cmd_fragments(config_path, &document, base_url.as_deref()).await
        }
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init(),
            ConfigAction::Show => cmd_config_show(config_path),
        },
    }
}

fn resolve_config(path: Option<&Path>) -> Result<AppConfig> {
    Ok(match path {
        Some(p) => load_config_from(p)?,
        None => load_config()?,
    })
}

async fn load_document(location: &str, base_url: Option<&str>) -> Result<HostDocument> {
    let document = HostDocument::load(location).await?;
    Ok(match base_url {
        Some(raw) => {
            let base = Url::parse(raw).map_err(|e| eyre!("invalid base URL '{raw}': {e}"))?;
            document.with_base(base)
        }
        None => document,
    })
}

async fn cmd_compile(
    config_path: Option<&Path>,
    location: &str,
    server: Option<&str>,
    base_url: Option<&str>,
    out: Option<&Path>,
) -> Result<()> {
    let mut app_config = resolve_config(config_path)?;
    if let Some(server) = server {
        app_config.server.url = Some(server.to_string());
    }

    let mut session = Session::new();
    session.configure(CompileConfig::try_from(&app_config)?)?;

    let document = load_document(location, base_url).await?;
    let mut host = HtmlDocumentHost::new(document.html());

    info!(document = location, "compiling host document");

    let reporter = CliStatus::new();
    let report = session.compile(&document, &mut host, &reporter).await?;

    let injected = host.into_html();
    match out {
        Some(path) => {
            std::fs::write(path, &injected)
                .map_err(|e| eyre!("failed to write {}: {e}", path.display()))?;
        }
        None => println!("{injected}"),
    }

    eprintln!();
    eprintln!("  Compile succeeded");
    eprintln!("  Attempt:   {}", report.attempt);
    eprintln!("  Fragments: {}", report.fragment_count);
    eprintln!(
        "  Artifacts: {} ({} script, {} auxiliary)",
        report.artifact_count, report.script_count, report.auxiliary_count
    );
    if let Some(path) = out {
        eprintln!("  Output:    {}", path.display());
    }
    eprintln!("  Time:      {:.1}s", report.elapsed.as_secs_f64());
    eprintln!();

    Ok(())
}

async fn cmd_fragments(
    config_path: Option<&Path>,
    location: &str,
    base_url: Option<&str>,
) -> Result<()> {
    let config = resolve_config(config_path)?;
    let document = load_document(location, base_url).await?;
    let enumeration = document.enumerate(&config.markers)?;

    for source in &enumeration.sources {
        let kind = match source.kind() {
            FragmentKind::Source => "source",
            FragmentKind::Config => "config",
        };
        match source {
            FragmentSource::Inline { name, content, .. } => {
                println!("{kind:<7} inline  {name} ({} bytes)", content.len());
            }
            FragmentSource::Remote { name, location, .. } => {
                println!("{kind:<7} remote  {name} <- {location}");
            }
        }
    }

    for advisory in &enumeration.advisories {
        eprintln!("note: {advisory}");
    }
    Ok(())
}

fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

fn cmd_config_show(config_path: Option<&Path>) -> Result<()> {
    let config = resolve_config(config_path)?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}

// ---------------------------------------------------------------------------
// CLI status reporter
// ---------------------------------------------------------------------------

/// Status reporter drawing an indicatif spinner on stderr.
struct CliStatus {
    spinner: ProgressBar,
}

impl CliStatus {
    fn new() -> Self {
        let spinner = ProgressBar::new_spinner();
        let style = ProgressStyle::with_template("{spinner:.cyan} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]);
        spinner.set_style(style);
        spinner.enable_steady_tick(std::time::Duration::from_millis(80));
        Self { spinner }
    }
}

impl StatusReporter for CliStatus {
    fn phase(&self, name: &str) {
        self.spinner.set_message(name.to_string());
    }

    fn advisory(&self, message: &str) {
        self.spinner.suspend(|| eprintln!("note: {message}"));
    }

    fn diagnostics(&self, markup: &str) {
        let text = render_markup(markup);
        if !text.trim().is_empty() {
            self.spinner.suspend(|| eprintln!("{text}"));
        }
    }

    // The error itself is printed once by color-eyre when `run` returns.
    fn fatal(&self, _message: &str) {
        self.spinner.finish_and_clear();
    }

    fn done(&self, _report: &CycleReport) {
        self.spinner.finish_and_clear();
    }
}

/// Render diagnostic markup as terminal text, falling back to the raw markup.
fn render_markup(markup: &str) -> String {
    let converter = htmd::HtmlToMarkdown::builder()
        .skip_tags(vec!["script", "style"])
        .build();
    converter
        .convert(markup)
        .unwrap_or_else(|_| markup.to_string())
}
