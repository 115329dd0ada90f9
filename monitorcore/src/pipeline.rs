//! The relay pipeline: producer streams in, snapshots out.
//!
//! A [`Pipeline`] runs two drain tasks for one producer:
//!
//! ```text
//!  stdout ─▶ LineReader ─▶ FrameAssembler ─▶ Broadcaster ─▶ sinks
//!  stderr ─▶ LineReader ─▶ tracing (target "monitorcore::producer")
//! ```
//!
//! The tasks run independently so a flood of diagnostics never stalls the
//! payload stream. Both observe a stop signal while waiting for a line, so
//! [`Pipeline::shutdown`] is deterministic without relying on the process
//! exiting.

use std::path::Path;
use std::process::ExitStatus;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::io::AsyncRead;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, trace, warn};

use crate::assembler::{FrameAssembler, DEFAULT_MAX_FRAME_BYTES};
use crate::broadcaster::Broadcaster;
use crate::error::{DecodeError, LaunchError};
use crate::supervisor::{LineReader, Supervisor};

/// Default number of decode failures logged in detail per pipeline.
pub const DEFAULT_DECODE_LOG_LIMIT: usize = 5;

/// Tuning for one pipeline instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineConfig {
    /// Largest frame the assembler will buffer.
    pub max_frame_bytes: usize,
    /// Decode failures logged with full detail before suppression.
    pub decode_log_limit: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_frame_bytes: DEFAULT_MAX_FRAME_BYTES,
            decode_log_limit: DEFAULT_DECODE_LOG_LIMIT,
        }
    }
}

/// Lifecycle of a pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineStatus {
    /// Draining the producer.
    Running,
    /// The producer closed stdout. Terminal, not an error.
    Ended,
    /// Shut down on request.
    Stopped,
    /// Reading stdout failed.
    Failed(String),
}

impl PipelineStatus {
    pub fn is_running(&self) -> bool {
        matches!(self, PipelineStatus::Running)
    }

    pub fn label(&self) -> &'static str {
        match self {
            PipelineStatus::Running => "running",
            PipelineStatus::Ended => "ended",
            PipelineStatus::Stopped => "stopped",
            PipelineStatus::Failed(_) => "failed",
        }
    }
}

/// Counters for one pipeline, readable while it runs.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PipelineStats {
    pub lines: u64,
    pub snapshots: u64,
    pub decode_failures: u64,
    pub discarded_bytes: u64,
    pub diagnostic_lines: u64,
}

#[derive(Debug, Default)]
struct Counters {
    lines: AtomicU64,
    snapshots: AtomicU64,
    decode_failures: AtomicU64,
    discarded_bytes: AtomicU64,
    diagnostic_lines: AtomicU64,
}

impl Counters {
    fn collect(&self) -> PipelineStats {
        PipelineStats {
            lines: self.lines.load(Ordering::Relaxed),
            snapshots: self.snapshots.load(Ordering::Relaxed),
            decode_failures: self.decode_failures.load(Ordering::Relaxed),
            discarded_bytes: self.discarded_bytes.load(Ordering::Relaxed),
            diagnostic_lines: self.diagnostic_lines.load(Ordering::Relaxed),
        }
    }
}

/// Final state returned by [`Pipeline::shutdown`].
#[derive(Debug, Clone)]
pub struct PipelineReport {
    pub status: PipelineStatus,
    pub stats: PipelineStats,
    /// Exit status of the producer, when the pipeline owned one.
    pub exit_status: Option<ExitStatus>,
}

/// Rate limiter for decode-failure diagnostics.
#[derive(Debug)]
struct DecodeLog {
    limit: usize,
    seen: usize,
    suppressing: bool,
}

impl DecodeLog {
    fn new(limit: usize) -> Self {
        Self {
            limit,
            seen: 0,
            suppressing: false,
        }
    }

    /// Log a failure. Returns true if it was logged in detail.
    fn record(&mut self, err: &DecodeError) -> bool {
        self.seen += 1;
        if self.seen > self.limit {
            if !self.suppressing {
                self.suppressing = true;
                warn!(limit = self.limit, "suppressing further decode diagnostics");
            }
            debug!(error = %err, failures = self.seen, "discarding frame");
            return false;
        }

        match err {
            DecodeError::Malformed {
                length,
                head,
                tail,
                source,
            } => warn!(
                error = %source,
                length,
                head = %head,
                tail = %tail,
                "discarding malformed frame"
            ),
            other => warn!(error = %other, "discarding frame"),
        }
        true
    }
}

/// A running producer-to-broadcaster pipeline.
///
/// # Example
///
/// ```rust,no_run
/// use monitorcore::{Broadcaster, Pipeline, PipelineConfig};
/// use tokio::sync::mpsc;
///
/// # tokio_test::block_on(async {
/// let broadcaster = Broadcaster::new();
/// let (tx, mut rx) = mpsc::channel(16);
/// broadcaster.register("printer", tx);
///
/// let pipeline = Pipeline::launch("./monitor", broadcaster, PipelineConfig::default()).unwrap();
/// while let Some(snapshot) = rx.recv().await {
///     println!("{}", serde_json::to_string(&snapshot).unwrap());
/// }
/// pipeline.shutdown().await;
/// # });
/// ```
#[derive(Debug)]
pub struct Pipeline {
    broadcaster: Broadcaster,
    supervisor: Option<Supervisor>,
    stop_tx: watch::Sender<bool>,
    status_rx: watch::Receiver<PipelineStatus>,
    counters: Arc<Counters>,
    stdout_task: JoinHandle<()>,
    stderr_task: JoinHandle<()>,
}

impl Pipeline {
    /// Start the producer at `path` and begin relaying its output.
    pub fn launch(
        path: impl AsRef<Path>,
        broadcaster: Broadcaster,
        config: PipelineConfig,
    ) -> Result<Self, LaunchError> {
        Self::start(Supervisor::start(path)?, broadcaster, config)
    }

    /// Begin relaying the output of an already started producer.
    pub fn start(
        mut supervisor: Supervisor,
        broadcaster: Broadcaster,
        config: PipelineConfig,
    ) -> Result<Self, LaunchError> {
        let stdout = supervisor
            .stdout_lines()
            .ok_or(LaunchError::MissingPipe("stdout"))?;
        let stderr = supervisor
            .stderr_lines()
            .ok_or(LaunchError::MissingPipe("stderr"))?;

        let mut pipeline = Self::spawn(stdout, stderr, broadcaster, config);
        pipeline.supervisor = Some(supervisor);
        Ok(pipeline)
    }

    /// Relay arbitrary byte streams, without a process behind them.
    pub fn from_streams<O, E>(
        stdout: O,
        stderr: E,
        broadcaster: Broadcaster,
        config: PipelineConfig,
    ) -> Self
    where
        O: AsyncRead + Unpin + Send + 'static,
        E: AsyncRead + Unpin + Send + 'static,
    {
        Self::spawn(
            LineReader::new(stdout),
            LineReader::new(stderr),
            broadcaster,
            config,
        )
    }

    fn spawn<O, E>(
        stdout: LineReader<O>,
        stderr: LineReader<E>,
        broadcaster: Broadcaster,
        config: PipelineConfig,
    ) -> Self
    where
        O: AsyncRead + Unpin + Send + 'static,
        E: AsyncRead + Unpin + Send + 'static,
    {
        let (stop_tx, stop_rx) = watch::channel(false);
        let (status_tx, status_rx) = watch::channel(PipelineStatus::Running);
        let counters = Arc::new(Counters::default());

        // Readers skip lines the assembler would discard anyway, so an
        // unterminated line cannot grow memory past the frame limit.
        let stdout = stdout.with_max_line_bytes(config.max_frame_bytes);
        let stderr = stderr.with_max_line_bytes(config.max_frame_bytes);

        let stdout_task = tokio::spawn(drain_stdout(
            stdout,
            FrameAssembler::with_max_frame_bytes(config.max_frame_bytes),
            broadcaster.clone(),
            DecodeLog::new(config.decode_log_limit),
            counters.clone(),
            status_tx,
            stop_rx.clone(),
        ));
        let stderr_task = tokio::spawn(drain_stderr(stderr, counters.clone(), stop_rx));

        Self {
            broadcaster,
            supervisor: None,
            stop_tx,
            status_rx,
            counters,
            stdout_task,
            stderr_task,
        }
    }

    /// The broadcaster this pipeline publishes to.
    pub fn broadcaster(&self) -> &Broadcaster {
        &self.broadcaster
    }

    pub fn status(&self) -> PipelineStatus {
        self.status_rx.borrow().clone()
    }

    /// A receiver that observes every status change.
    pub fn watch_status(&self) -> watch::Receiver<PipelineStatus> {
        self.status_rx.clone()
    }

    pub fn stats(&self) -> PipelineStats {
        self.counters.collect()
    }

    /// Producer process id, if a live process backs this pipeline.
    pub fn pid(&self) -> Option<u32> {
        self.supervisor.as_ref().and_then(Supervisor::id)
    }

    /// Wait until the pipeline leaves the running state.
    pub async fn ended(&mut self) -> PipelineStatus {
        let waited = match self.status_rx.wait_for(|status| !status.is_running()).await {
            Ok(status) => Some(status.clone()),
            Err(_) => None,
        };
        waited.unwrap_or_else(|| self.status_rx.borrow().clone())
    }

    /// Stop both drain loops, terminate the producer and close the broadcaster.
    pub async fn shutdown(mut self) -> PipelineReport {
        let _ = self.stop_tx.send(true);
        if let Some(supervisor) = self.supervisor.as_mut() {
            supervisor.terminate();
        }

        if let Err(e) = self.stdout_task.await {
            error!(error = %e, "stdout drain task failed");
        }
        if let Err(e) = self.stderr_task.await {
            error!(error = %e, "stderr drain task failed");
        }

        self.broadcaster.close();

        let exit_status = match self.supervisor.as_mut() {
            Some(supervisor) => match supervisor.wait().await {
                Ok(status) => Some(status),
                Err(e) => {
                    warn!(error = %e, "failed to reap producer");
                    None
                }
            },
            None => None,
        };

        let status = self.status_rx.borrow().clone();
        let stats = self.counters.collect();
        info!(
            status = status.label(),
            snapshots = stats.snapshots,
            decode_failures = stats.decode_failures,
            "pipeline shut down"
        );

        PipelineReport {
            status,
            stats,
            exit_status,
        }
    }
}

async fn drain_stdout<R>(
    mut lines: LineReader<R>,
    mut assembler: FrameAssembler,
    broadcaster: Broadcaster,
    mut decode_log: DecodeLog,
    counters: Arc<Counters>,
    status_tx: watch::Sender<PipelineStatus>,
    mut stop_rx: watch::Receiver<bool>,
) where
    R: AsyncRead + Unpin,
{
    let status = loop {
        let line = tokio::select! {
            biased;
            _ = stop_rx.changed() => break PipelineStatus::Stopped,
            line = lines.next_line() => line,
        };

        let skipped = lines.take_skipped();
        if skipped > 0 {
            // A skipped line breaks whatever frame it was part of.
            let err = DecodeError::Oversized {
                length: assembler.finish() + skipped,
                limit: assembler.max_frame_bytes(),
            };
            record_failure(&err, &counters, &mut decode_log);
        }

        match line {
            Ok(Some(line)) => {
                counters.lines.fetch_add(1, Ordering::Relaxed);
                match assembler.push_line(&line) {
                    None => {}
                    Some(Ok(snapshot)) => {
                        let published = counters.snapshots.fetch_add(1, Ordering::Relaxed) + 1;
                        let report = broadcaster.publish(snapshot);
                        if published <= 3 {
                            info!(published, subscribers = report.queued, "snapshot published");
                        } else {
                            trace!(published, queued = report.queued, dropped = report.dropped, "snapshot published");
                        }
                    }
                    Some(Err(err)) => record_failure(&err, &counters, &mut decode_log),
                }
            }
            Ok(None) => {
                let leftover = assembler.finish();
                if leftover > 0 {
                    counters
                        .discarded_bytes
                        .fetch_add(leftover as u64, Ordering::Relaxed);
                    debug!(bytes = leftover, "discarding incomplete frame at end of stream");
                }
                info!("producer stdout ended");
                break PipelineStatus::Ended;
            }
            Err(e) => {
                error!(error = %e, "failed to read producer stdout");
                break PipelineStatus::Failed(e.to_string());
            }
        }
    };

    status_tx.send_replace(status);
}

fn record_failure(err: &DecodeError, counters: &Counters, decode_log: &mut DecodeLog) {
    counters.decode_failures.fetch_add(1, Ordering::Relaxed);
    counters
        .discarded_bytes
        .fetch_add(err.discarded_bytes() as u64, Ordering::Relaxed);
    decode_log.record(err);
}

async fn drain_stderr<R>(
    mut lines: LineReader<R>,
    counters: Arc<Counters>,
    mut stop_rx: watch::Receiver<bool>,
) where
    R: AsyncRead + Unpin,
{
    loop {
        let line = tokio::select! {
            biased;
            _ = stop_rx.changed() => break,
            line = lines.next_line() => line,
        };

        match line {
            Ok(Some(line)) => {
                counters.diagnostic_lines.fetch_add(1, Ordering::Relaxed);
                let line = line.trim();
                if !line.is_empty() {
                    info!(target: "monitorcore::producer", "{}", line);
                }
            }
            Ok(None) => {
                debug!("producer stderr ended");
                break;
            }
            Err(e) => {
                warn!(error = %e, "failed to read producer stderr");
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::io::Cursor;
    use std::time::Duration;
    use tokio::io::AsyncWriteExt;
    use tokio::sync::mpsc;
    use tokio::time::timeout;

    fn malformed() -> DecodeError {
        DecodeError::Unbalanced { length: 1 }
    }

    #[test]
    fn test_decode_log_limits_detail() {
        let mut log = DecodeLog::new(5);
        let detailed: Vec<bool> = (0..8).map(|_| log.record(&malformed())).collect();
        assert_eq!(detailed, vec![true, true, true, true, true, false, false, false]);
        assert!(log.suppressing);
    }

    #[test]
    fn test_decode_log_notice_after_last_detailed() {
        let mut log = DecodeLog::new(2);
        log.record(&malformed());
        log.record(&malformed());
        assert!(!log.suppressing);
        assert!(!log.record(&malformed()));
        assert!(log.suppressing);
    }

    #[test]
    fn test_decode_log_zero_limit() {
        let mut log = DecodeLog::new(0);
        assert!(!log.suppressing);
        assert!(!log.record(&malformed()));
        // The notice still goes out once, on the first failure.
        assert!(log.suppressing);
    }

    #[test]
    fn test_status_labels() {
        assert!(PipelineStatus::Running.is_running());
        assert!(!PipelineStatus::Ended.is_running());
        assert_eq!(PipelineStatus::Failed("x".into()).label(), "failed");
    }

    #[tokio::test]
    async fn test_relays_split_records() {
        let broadcaster = Broadcaster::new();
        let (tx, mut rx) = mpsc::channel(8);
        broadcaster.register("test", tx);

        let stdout = Cursor::new("{\"cpu\":\n{\"usage\":50}}\n{\"seq\":2}\n");
        let mut pipeline = Pipeline::from_streams(
            stdout,
            Cursor::new(""),
            broadcaster,
            PipelineConfig::default(),
        );

        assert_eq!(rx.recv().await.unwrap().to_value(), json!({"cpu": {"usage": 50}}));
        assert_eq!(rx.recv().await.unwrap().to_value(), json!({"seq": 2}));
        assert_eq!(pipeline.ended().await, PipelineStatus::Ended);

        let stats = pipeline.stats();
        assert_eq!(stats.lines, 3);
        assert_eq!(stats.snapshots, 2);
        assert_eq!(stats.decode_failures, 0);
    }

    #[tokio::test]
    async fn test_partial_frame_at_eof_is_discarded() {
        let broadcaster = Broadcaster::new();
        let (tx, mut rx) = mpsc::channel(8);
        broadcaster.register("test", tx);

        let mut pipeline = Pipeline::from_streams(
            Cursor::new("{\"partial\":\n"),
            Cursor::new(""),
            broadcaster,
            PipelineConfig::default(),
        );

        assert_eq!(pipeline.ended().await, PipelineStatus::Ended);
        let report = pipeline.shutdown().await;
        assert_eq!(report.status, PipelineStatus::Ended);
        assert_eq!(report.stats.snapshots, 0);
        assert_eq!(report.stats.decode_failures, 0);
        assert_eq!(report.stats.discarded_bytes, 11);
        assert!(report.exit_status.is_none());
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_decode_failures_are_counted() {
        let broadcaster = Broadcaster::new();
        let (tx, mut rx) = mpsc::channel(8);
        broadcaster.register("test", tx);

        let mut pipeline = Pipeline::from_streams(
            Cursor::new("{\"a\":1,,}\n{\"b\":2}\n"),
            Cursor::new(""),
            broadcaster,
            PipelineConfig::default(),
        );

        assert_eq!(rx.recv().await.unwrap().to_value(), json!({"b": 2}));
        pipeline.ended().await;
        assert_eq!(pipeline.stats().decode_failures, 1);
        assert_eq!(pipeline.stats().discarded_bytes, 9);
    }

    #[tokio::test]
    async fn test_over_long_line_breaks_frame_without_buffering() {
        let broadcaster = Broadcaster::new();
        let (tx, mut rx) = mpsc::channel(8);
        broadcaster.register("test", tx);

        let long = format!("\"{}\"}}", "x".repeat(200));
        let stdout = format!("{{\"a\":1}}\n{{\"big\":\n{}\n{{\"b\":2}}\n", long);
        let config = PipelineConfig {
            max_frame_bytes: 64,
            ..PipelineConfig::default()
        };
        let mut pipeline =
            Pipeline::from_streams(Cursor::new(stdout), Cursor::new(""), broadcaster, config);

        assert_eq!(rx.recv().await.unwrap().to_value(), json!({"a": 1}));
        assert_eq!(rx.recv().await.unwrap().to_value(), json!({"b": 2}));
        assert_eq!(pipeline.ended().await, PipelineStatus::Ended);

        let stats = pipeline.stats();
        assert_eq!(stats.snapshots, 2);
        assert_eq!(stats.decode_failures, 1);
        // The buffered `{"big":` plus the skipped line and its newline.
        assert_eq!(stats.discarded_bytes, 7 + 203 + 1);
        assert_eq!(stats.lines, 3);
    }

    #[tokio::test]
    async fn test_shutdown_while_waiting_for_output() {
        let broadcaster = Broadcaster::new();
        let (tx, _rx) = mpsc::channel(8);
        broadcaster.register("test", tx);

        // Keep the writers alive so neither stream reaches EOF.
        let (stdout, _stdout_writer) = tokio::io::duplex(64);
        let (stderr, _stderr_writer) = tokio::io::duplex(64);
        let pipeline = Pipeline::from_streams(stdout, stderr, broadcaster.clone(), PipelineConfig::default());

        let report = timeout(Duration::from_secs(1), pipeline.shutdown())
            .await
            .expect("shutdown hung");
        assert_eq!(report.status, PipelineStatus::Stopped);
        assert!(broadcaster.is_empty());
    }

    #[tokio::test]
    async fn test_stderr_flood_does_not_stall_stdout() {
        let broadcaster = Broadcaster::new();
        let (tx, mut rx) = mpsc::channel(8);
        broadcaster.register("test", tx);

        let (stdout, mut stdout_writer) = tokio::io::duplex(64);
        let (stderr, mut stderr_writer) = tokio::io::duplex(64);
        let mut pipeline = Pipeline::from_streams(stdout, stderr, broadcaster, PipelineConfig::default());

        // The writer blocks on the small stderr pipe unless it is drained.
        let producer = tokio::spawn(async move {
            for i in 0..2_000 {
                let line = format!("diagnostic line {}\n", i);
                stderr_writer.write_all(line.as_bytes()).await.unwrap();
            }
            stdout_writer.write_all(b"{\"ok\":\n1}\n").await.unwrap();
        });

        let snapshot = timeout(Duration::from_secs(5), rx.recv())
            .await
            .expect("stdout stalled behind stderr")
            .unwrap();
        assert_eq!(snapshot.to_value(), json!({"ok": 1}));

        producer.await.unwrap();
        assert_eq!(pipeline.ended().await, PipelineStatus::Ended);
        // Only the last few lines can still sit in the 64-byte pipe.
        assert!(pipeline.stats().diagnostic_lines >= 1_990);
    }
}
