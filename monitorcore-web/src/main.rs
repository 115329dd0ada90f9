use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use monitorcore::{Broadcaster, Pipeline, Settings};
use tokio::net::TcpListener;
use tracing::{error, info, warn};

use monitorcore_web::{router, serve, AppState};

#[derive(Parser, Debug)]
#[command(name = "monitorcore-web")]
#[command(about = "Live system metrics dashboard served over HTTP and websockets")]
struct Args {
    /// Settings file (defaults to ./monitorcore.toml when present)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Producer executable; skips the search list
    #[arg(short, long)]
    producer: Option<PathBuf>,

    /// Address to listen on (e.g. 127.0.0.1:5000)
    #[arg(short, long)]
    listen: Option<SocketAddr>,

    /// Directory served under /static
    #[arg(long)]
    static_dir: Option<PathBuf>,

    /// Log filter used when RUST_LOG is unset (e.g. "debug", "monitorcore=trace")
    #[arg(long)]
    log_level: Option<String>,
}

impl Args {
    fn apply(self, settings: &mut Settings) {
        if let Some(path) = self.producer {
            settings.producer.path = Some(path);
        }
        if let Some(listen) = self.listen {
            settings.web.listen = listen;
        }
        if let Some(dir) = self.static_dir {
            settings.web.static_dir = Some(dir);
        }
        if let Some(level) = self.log_level {
            settings.log.level = level;
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let mut settings = Settings::load(args.config.as_deref()).context("failed to load settings")?;
    args.apply(&mut settings);

    init_logging(&settings.log.level);

    let broadcaster = Broadcaster::with_capacity(settings.pipeline.subscriber_queue);
    let state = AppState::new(broadcaster.clone());
    let pipeline = start_pipeline(&settings, &state, broadcaster.clone());

    let app = router(state, settings.web.static_dir.as_deref());
    let listener = TcpListener::bind(settings.web.listen)
        .await
        .with_context(|| format!("failed to bind {}", settings.web.listen))?;

    serve(listener, app, shutdown_signal(broadcaster))
        .await
        .context("server error")?;

    if let Some(pipeline) = pipeline {
        let report = pipeline.shutdown().await;
        info!(status = report.status.label(), snapshots = report.stats.snapshots, "stopped");
    }
    Ok(())
}

/// Launch the producer. Failures are kept in the state so the dashboard
/// can still be served and explain what went wrong.
fn start_pipeline(settings: &Settings, state: &AppState, broadcaster: Broadcaster) -> Option<Pipeline> {
    let path = match settings.locate_producer() {
        Ok(path) => path,
        Err(e) => {
            warn!(error = %e, "producer lookup failed");
            state.set_fatal("Monitor executable not found. Please build the monitor first.");
            return None;
        }
    };
    state.set_producer(&path);

    match Pipeline::launch(&path, broadcaster, settings.pipeline_config()) {
        Ok(pipeline) => {
            state.track(pipeline.watch_status());
            Some(pipeline)
        }
        Err(e) => {
            error!(error = %e, "failed to start producer");
            state.set_fatal(format!("Failed to start monitor: {}", e));
            None
        }
    }
}

fn init_logging(level: &str) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

/// Resolves on ctrl-c. Closing the broadcaster ends every open socket, which
/// graceful shutdown waits for.
async fn shutdown_signal(broadcaster: Broadcaster) {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "failed to listen for ctrl-c");
        std::future::pending::<()>().await;
    }
    info!("shutting down");
    broadcaster.close();
}
