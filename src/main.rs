//! wss-probe command line.
//!
//! Sends one message to a WebSocket-over-TLS service with both the
//! blocking and the suspendable strategy and prints what each got back.

// ============================================================================
// Imports
// ============================================================================

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use clap::Parser;
use tracing::error;
use tracing_subscriber::EnvFilter;
use wss_probe::{Driver, Endpoint, SessionOptions, TrustStore};

// ============================================================================
// Cli
// ============================================================================

/// Command-line arguments.
#[derive(Debug, Parser)]
#[command(
    name = "wss-probe",
    about = "Send a message over a secure WebSocket, blocking and suspendable side by side",
    version,
    after_help = "Example:\n    wss-probe echo.websocket.org 443 \"Hello, world!\""
)]
struct Cli {
    /// Host name or IP address of the service.
    host: String,

    /// TCP port of the service.
    port: String,

    /// Text message to send.
    text: String,

    /// Request target of the opening handshake. Pass /401 to reproduce the
    /// rejected-handshake sample run; the default asks for an upgrade.
    #[arg(long, default_value = "/")]
    path: String,

    /// Deadline in seconds for TLS handshake, WebSocket handshake and close.
    #[arg(long, default_value_t = 30)]
    timeout_secs: u64,

    /// User-Agent sent with the opening handshake.
    #[arg(long)]
    user_agent: Option<String>,

    /// PEM bundle of trusted roots instead of the bundled web PKI roots.
    #[arg(long)]
    ca_file: Option<PathBuf>,

    /// Log every step, including handshake details.
    #[arg(long)]
    trace: bool,
}

// ============================================================================
// Functions
// ============================================================================

/// Initialize tracing/logging on stderr.
fn init_logging(trace: bool) {
    let filter = if trace {
        EnvFilter::new("wss_probe=trace,tungstenite=trace,rustls=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn run(cli: Cli) -> wss_probe::Result<()> {
    let endpoint = Endpoint::parse(cli.host, &cli.port)?;

    let trust_store = match &cli.ca_file {
        Some(path) => TrustStore::from_pem_file(path)?,
        None => TrustStore::load()?,
    };

    let mut options = SessionOptions::new()
        .path(cli.path)
        .step_timeout(Duration::from_secs(cli.timeout_secs));
    if let Some(agent) = &cli.user_agent {
        options = options.user_agent(agent);
    }

    Driver::builder()
        .host(endpoint.host())
        .port(endpoint.port())
        .text(cli.text)
        .options(options)
        .trust_store(trust_store)
        .build()?
        .run()
}

fn main() -> ExitCode {
    // Exits with status 2 and usage text on a malformed invocation.
    let cli = Cli::parse();
    init_logging(cli.trace);

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "wss-probe failed");
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}
