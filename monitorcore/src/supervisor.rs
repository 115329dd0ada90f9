//! Producer process supervision.
//!
//! The [`Supervisor`] owns the producer's lifetime and hands out its two
//! output streams as [`LineReader`]s. It never interprets what the producer
//! writes.
//!
//! Both streams must be drained at the same time: a producer blocked on a
//! full stderr pipe stops writing stdout too. The pipeline gives each reader
//! its own task.

use std::io;
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};

use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, ChildStderr, ChildStdout, Command};
use tracing::{debug, info};

use crate::error::LaunchError;

/// Reads text lines from an async byte stream.
///
/// Line terminators (`\n` or `\r\n`) are stripped and invalid UTF-8 is
/// replaced, so a noisy producer cannot stop the stream. Once the stream
/// reports end of file the reader stays exhausted.
///
/// Lines longer than the configured limit (terminator included) are never
/// held in memory: they are skipped and their size is reported through
/// [`LineReader::take_skipped`].
#[derive(Debug)]
pub struct LineReader<R> {
    reader: BufReader<R>,
    buf: Vec<u8>,
    max_line_bytes: usize,
    skipped: usize,
    exhausted: bool,
}

impl<R: AsyncRead + Unpin> LineReader<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader: BufReader::new(reader),
            buf: Vec::new(),
            max_line_bytes: usize::MAX,
            skipped: 0,
            exhausted: false,
        }
    }

    /// Skip lines longer than `limit` bytes instead of buffering them.
    pub fn with_max_line_bytes(mut self, limit: usize) -> Self {
        self.max_line_bytes = limit.max(1);
        self
    }

    /// Wait for the next line. Returns `Ok(None)` at end of stream.
    ///
    /// Not cancel safe: a partially read line is lost if the future is
    /// dropped. Callers only cancel when they stop reading altogether.
    pub async fn next_line(&mut self) -> io::Result<Option<String>> {
        loop {
            if self.exhausted {
                return Ok(None);
            }

            self.buf.clear();
            let mut length = 0usize;
            loop {
                let available = self.reader.fill_buf().await?;
                if available.is_empty() {
                    break;
                }
                let (used, found) = match available.iter().position(|&b| b == b'\n') {
                    Some(i) => (i + 1, true),
                    None => (available.len(), false),
                };
                if length.saturating_add(used) <= self.max_line_bytes {
                    self.buf.extend_from_slice(&available[..used]);
                } else {
                    self.buf.clear();
                }
                length = length.saturating_add(used);
                self.reader.consume(used);
                if found {
                    break;
                }
            }

            if length == 0 {
                self.exhausted = true;
                return Ok(None);
            }

            if length > self.max_line_bytes {
                debug!(bytes = length, limit = self.max_line_bytes, "skipping over-long line");
                self.skipped = self.skipped.saturating_add(length);
                continue;
            }

            if self.buf.last() == Some(&b'\n') {
                self.buf.pop();
                if self.buf.last() == Some(&b'\r') {
                    self.buf.pop();
                }
            }

            return Ok(Some(String::from_utf8_lossy(&self.buf).into_owned()));
        }
    }

    /// Bytes of over-long lines skipped since the last call.
    pub fn take_skipped(&mut self) -> usize {
        std::mem::take(&mut self.skipped)
    }

    pub fn is_exhausted(&self) -> bool {
        self.exhausted
    }
}

/// Owns a running producer process.
///
/// The process is started with no arguments, stdin closed, and stdout and
/// stderr piped. It is killed if still running when the supervisor is
/// dropped. There is no restart.
///
/// # Example
///
/// ```rust,no_run
/// use monitorcore::Supervisor;
///
/// # tokio_test::block_on(async {
/// let mut supervisor = Supervisor::start("./monitor").unwrap();
/// let mut stdout = supervisor.stdout_lines().unwrap();
/// while let Some(line) = stdout.next_line().await.unwrap() {
///     println!("{}", line);
/// }
/// # });
/// ```
#[derive(Debug)]
pub struct Supervisor {
    path: PathBuf,
    child: Child,
    stdout: Option<ChildStdout>,
    stderr: Option<ChildStderr>,
    terminated: bool,
}

impl Supervisor {
    /// Spawn the producer at `path`.
    ///
    /// Relative paths are resolved against the working directory.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(path: impl AsRef<Path>) -> Result<Self, LaunchError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(LaunchError::NotFound(path.to_path_buf()));
        }
        // A bare name like "monitor" would otherwise be looked up on PATH.
        let path = std::path::absolute(path).map_err(|source| LaunchError::Spawn {
            path: path.to_path_buf(),
            source,
        })?;

        let mut child = Command::new(&path)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| LaunchError::Spawn {
                path: path.clone(),
                source,
            })?;

        let stdout = child.stdout.take().ok_or(LaunchError::MissingPipe("stdout"))?;
        let stderr = child.stderr.take().ok_or(LaunchError::MissingPipe("stderr"))?;

        info!(path = %path.display(), pid = ?child.id(), "producer started");

        Ok(Self {
            path,
            child,
            stdout: Some(stdout),
            stderr: Some(stderr),
            terminated: false,
        })
    }

    /// Path the producer was started from.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// OS process id, if the process has not been reaped yet.
    pub fn id(&self) -> Option<u32> {
        self.child.id()
    }

    /// Take the structured-payload stream. Returns `None` after the first call.
    pub fn stdout_lines(&mut self) -> Option<LineReader<ChildStdout>> {
        self.stdout.take().map(LineReader::new)
    }

    /// Take the diagnostic stream. Returns `None` after the first call.
    pub fn stderr_lines(&mut self) -> Option<LineReader<ChildStderr>> {
        self.stderr.take().map(LineReader::new)
    }

    /// Ask the producer to stop. Best effort and idempotent.
    pub fn terminate(&mut self) {
        if self.terminated {
            return;
        }
        self.terminated = true;

        match self.child.start_kill() {
            Ok(()) => debug!(path = %self.path.display(), "producer kill requested"),
            // Already exited and reaped.
            Err(e) => debug!(error = %e, "producer kill skipped"),
        }
    }

    /// Wait for the producer to exit.
    pub async fn wait(&mut self) -> io::Result<ExitStatus> {
        self.child.wait().await
    }

    /// Check for exit without blocking.
    pub fn try_wait(&mut self) -> io::Result<Option<ExitStatus>> {
        self.child.try_wait()
    }
}
