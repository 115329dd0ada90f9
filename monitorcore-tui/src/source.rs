//! Snapshot sources for the renderer.

use std::fmt::Debug;

use monitorcore::{PipelineStatus, Snapshot};
use tokio::sync::watch;

/// Where the renderer gets snapshots from.
///
/// Polled from the draw loop, so implementations must not block.
pub trait DataSource: Send + Debug {
    /// The latest snapshot, if one arrived since the last poll.
    fn poll(&mut self) -> Option<Snapshot>;

    /// Human-readable origin, shown in the header.
    fn description(&self) -> &str;

    /// Why no further snapshots will arrive, if that is the case.
    fn error(&self) -> Option<&str>;
}

/// Source fed by a broadcaster through a watch channel.
///
/// The watch channel keeps only the newest snapshot, so a renderer that
/// falls behind skips straight to the latest reading.
///
/// # Example
///
/// ```
/// use monitorcore_tui::{ChannelSource, DataSource};
/// use monitorcore::Snapshot;
///
/// let (tx, mut source) = ChannelSource::create("test");
/// tx.send_replace(Some(Snapshot::decode(r#"{"cpu":{}}"#).unwrap()));
/// assert!(source.poll().is_some());
/// ```
#[derive(Debug)]
pub struct ChannelSource {
    receiver: watch::Receiver<Option<Snapshot>>,
    status: Option<watch::Receiver<PipelineStatus>>,
    description: String,
    error: Option<String>,
}

impl ChannelSource {
    pub fn new(receiver: watch::Receiver<Option<Snapshot>>, source_description: &str) -> Self {
        Self {
            receiver,
            status: None,
            description: source_description.to_string(),
            error: None,
        }
    }

    /// Create a sender and the source it feeds.
    ///
    /// The sender is a [`monitorcore::SnapshotSink`] and can be registered
    /// with a broadcaster directly.
    pub fn create(source_description: &str) -> (watch::Sender<Option<Snapshot>>, Self) {
        let (tx, rx) = watch::channel(None);
        (tx, Self::new(rx, source_description))
    }

    /// Also follow the pipeline status, to report when the producer stops.
    pub fn with_status(mut self, status: watch::Receiver<PipelineStatus>) -> Self {
        self.status = Some(status);
        self
    }

    fn refresh_error(&mut self) {
        let Some(status) = &self.status else {
            return;
        };
        self.error = match &*status.borrow() {
            PipelineStatus::Running => None,
            PipelineStatus::Ended => Some("producer exited".to_string()),
            PipelineStatus::Stopped => Some("pipeline stopped".to_string()),
            PipelineStatus::Failed(message) => Some(format!("producer stream failed: {}", message)),
        };
    }
}

impl DataSource for ChannelSource {
    fn poll(&mut self) -> Option<Snapshot> {
        self.refresh_error();

        if self.receiver.has_changed().unwrap_or(false) {
            self.receiver.borrow_and_update().clone()
        } else {
            None
        }
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }
}
