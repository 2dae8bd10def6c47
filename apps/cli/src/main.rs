//! relaybuild CLI — compile the fragments of an HTML page on a build service.
//!
//! Collects source and configuration `<script>` fragments from a host
//! document, submits them as one program, and writes the document back out
//! with the compiled artifacts injected.

mod commands;

use clap::Parser;
use color_eyre::eyre::Result;

use commands::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();
    commands::init_tracing(&cli);
    commands::run(cli).await
}
