mod db;
mod ipc;
mod quran;

use clap::Parser;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Memorization-tracking sidecar: one JSON request per stdin line, one JSON response per stdout line.
#[derive(Parser)]
#[command(name = "tahfizd")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Workspace directory to open at startup
    #[arg(long)]
    workspace: Option<PathBuf>,

    /// Log filter (overrides TAHFIZD_LOG), e.g. "tahfizd=debug"
    #[arg(long)]
    log_filter: Option<String>,
}

fn init_logging(filter: Option<&str>) {
    let filter = match filter {
        Some(f) => EnvFilter::new(f),
        None => EnvFilter::try_from_env("TAHFIZD_LOG").unwrap_or_else(|_| "tahfizd=info".into()),
    };
    // stdout carries the protocol; logs go to stderr.
    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(io::stderr),
        )
        .init();
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.log_filter.as_deref());

    let mut state = ipc::AppState::default();
    if let Some(path) = cli.workspace {
        ipc::open_workspace(&mut state, path)?;
    }

    let stdin = io::stdin();
    let mut stdout = io::stdout();

    for line in stdin.lock().lines() {
        let line = match line {
            Ok(v) => v,
            Err(e) => {
                tracing::warn!(error = %e, "stdin closed");
                break;
            }
        };
        if line.trim().is_empty() {
            continue;
        }

        let resp = match serde_json::from_str::<ipc::Request>(&line) {
            Ok(req) => ipc::handle_request(&mut state, req),
            Err(e) => {
                // No id to echo back.
                tracing::warn!(error = %e, "malformed request");
                ipc::err("", "bad_json", e.to_string(), None)
            }
        };
        writeln!(stdout, "{}", resp)?;
        stdout.flush()?;
    }
    tracing::info!("shutting down");
    Ok(())
}
