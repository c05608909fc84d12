//! bertimbau - query an embedding service once and print the shape of its answers.
//!
//! # Usage
//!
//! ```bash
//! # HTTP service on the default address, default example sentence
//! bertimbau
//!
//! # Own text, other endpoint
//! bertimbau "O contrato vence em março." --url http://10.0.0.5:8000
//!
//! # Service started as a child process, speaking JSON lines over stdio
//! bertimbau --provider subprocess --config '{"command": "python3", "args": ["serve.py"]}'
//! ```
//!
//! The report goes to stdout. A failing service is reported on stderr as a
//! single `Python error: <message>` line and the process still exits normally.

use anyhow::{Context, Result};
use bertimbau::{
    client,
    error::ServiceError,
    providers::{http::HttpEmbedding, ProviderKind},
    report::Report,
};
use bertimbau_subprocess::SubprocessEmbedding;
use clap::Parser;
use serde_json::json;
use std::io::{self, Write};
use tracing::debug;
use tracing_subscriber::EnvFilter;

const EXAMPLE_SENTENCE: &str = "A multa será de 10% em caso de atraso.";

/// Prefix of the diagnostic line printed when the service fails.
const ERROR_PREFIX: &str = "Python error";

/// Query an embedding service for a sentence embedding and token embeddings.
#[derive(Parser, Debug)]
#[command(name = "bertimbau", version, about)]
struct Cli {
    /// Text to embed
    #[arg(default_value = EXAMPLE_SENTENCE)]
    text: String,

    /// Adapter used to reach the service (http, subprocess)
    #[arg(long, default_value_t = ProviderKind::Http)]
    provider: ProviderKind,

    /// Provider configuration as a JSON object
    #[arg(long)]
    config: Option<String>,

    /// Base URL of an HTTP service, shorthand for `--config '{"api_url": URL}'`
    #[arg(long, conflicts_with = "config")]
    url: Option<String>,

    /// Enable info level logging (RUST_LOG takes precedence)
    #[arg(short, long)]
    verbose: bool,
}

impl Cli {
    fn provider_config(&self) -> Option<String> {
        match &self.url {
            Some(url) => Some(json!({ "api_url": url }).to_string()),
            None => self.config.clone(),
        }
    }
}

async fn execute(cli: &Cli) -> Result<Report, ServiceError> {
    let config = cli.provider_config();
    match cli.provider {
        ProviderKind::Http => {
            client::session(HttpEmbedding::connect(config.as_deref()), &cli.text).await
        }
        ProviderKind::Subprocess => {
            let config = config.ok_or_else(|| {
                ServiceError::Config(
                    "the subprocess provider expects --config with at least a `command`".to_string(),
                )
            })?;
            client::session(SubprocessEmbedding::spawn(&config), &cli.text).await
        }
    }
}

/// Writes the report to `out`, or the single diagnostic line to `err`.
fn emit(
    outcome: &Result<Report, ServiceError>,
    out: &mut impl Write,
    err: &mut impl Write,
) -> io::Result<()> {
    match outcome {
        Ok(report) => writeln!(out, "{report}"),
        Err(e) => writeln!(err, "{ERROR_PREFIX}: {e}"),
    }
}

fn init_tracing(verbose: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(if verbose { "info" } else { "warn" }));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to start the async runtime")?;

    let outcome = runtime.block_on(execute(&cli));
    if outcome.is_err() {
        debug!(provider = %cli.provider, "embedding service call failed");
    }
    emit(&outcome, &mut io::stdout().lock(), &mut io::stderr().lock())
        .context("failed to write the report")?;

    Ok(())
}
