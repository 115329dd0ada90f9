use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use clap::Parser;
use crossterm::{
    event::Event,
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use monitorcore::{Broadcaster, Pipeline, Settings};
use ratatui::{backend::CrosstermBackend, Terminal};
use tracing::info;

use monitorcore_tui::{events, ui, App, ChannelSource, Theme};

/// Lower bound for the redraw interval.
const MIN_REFRESH_MS: u64 = 100;

#[derive(Parser, Debug)]
#[command(name = "monitorcore-tui")]
#[command(about = "Terminal dashboard for live system metrics")]
struct Args {
    /// Settings file (defaults to ./monitorcore.toml when present)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Producer executable; skips the search list
    #[arg(short, long)]
    producer: Option<PathBuf>,

    /// Redraw interval in milliseconds
    #[arg(short, long, default_value = "500")]
    refresh_ms: u64,

    /// Write logs to this file (the terminal is taken by the dashboard)
    #[arg(long)]
    log_file: Option<PathBuf>,

    /// Log filter used when RUST_LOG is unset
    #[arg(long)]
    log_level: Option<String>,
}

fn main() -> Result<()> {
    let args = Args::parse();
    let mut settings = Settings::load(args.config.as_deref()).context("failed to load settings")?;
    if let Some(path) = args.producer {
        settings.producer.path = Some(path);
    }
    if let Some(level) = args.log_level {
        settings.log.level = level;
    }
    if let Some(path) = &args.log_file {
        init_logging(path, &settings.log.level)?;
    }

    // Fail before the terminal switches to raw mode, so the message is readable.
    let producer = settings
        .locate_producer()
        .context("monitor executable not found; build the monitor first")?;

    let rt = tokio::runtime::Runtime::new()?;
    let _guard = rt.enter();

    let broadcaster = Broadcaster::with_capacity(settings.pipeline.subscriber_queue);
    let (tx, source) = ChannelSource::create(&format!("producer: {}", producer.display()));
    broadcaster.register("terminal", tx);

    let pipeline = Pipeline::launch(&producer, broadcaster, settings.pipeline_config())
        .with_context(|| format!("failed to start {}", producer.display()))?;
    info!(producer = %producer.display(), pid = ?pipeline.pid(), "producer started");
    let source = source.with_status(pipeline.watch_status());

    let refresh = Duration::from_millis(args.refresh_ms.max(MIN_REFRESH_MS));
    let result = run_tui(App::new(Box::new(source), Theme::auto_detect()), refresh);

    let report = rt.block_on(pipeline.shutdown());
    info!(
        status = report.status.label(),
        snapshots = report.stats.snapshots,
        decode_failures = report.stats.decode_failures,
        "pipeline stopped"
    );

    result
}

fn init_logging(path: &Path, level: &str) -> Result<()> {
    let file = File::create(path).with_context(|| format!("failed to create {}", path.display()))?;
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .init();
    Ok(())
}

fn run_tui(mut app: App, refresh_interval: Duration) -> Result<()> {
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    // Restore the terminal before the panic message is printed.
    let original_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |panic| {
        let _ = disable_raw_mode();
        let _ = execute!(io::stdout(), LeaveAlternateScreen);
        original_hook(panic);
    }));

    app.reload_data();
    let result = run_app(&mut terminal, &mut app, refresh_interval);

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    result
}

fn run_app(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    app: &mut App,
    refresh_interval: Duration,
) -> Result<()> {
    let mut last_refresh = Instant::now();

    while app.running {
        terminal.draw(|frame| ui::render(frame, app))?;

        // Resizes need no handling: every pass redraws.
        if let Some(Event::Key(key)) = events::poll_event(Duration::from_millis(100))? {
            events::handle_key_event(app, key);
        }

        if last_refresh.elapsed() >= refresh_interval {
            app.reload_data();
            last_refresh = Instant::now();
        }
    }

    Ok(())
}
