//! Shared state for the HTTP handlers.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use monitorcore::{Broadcaster, PipelineStatus};
use parking_lot::RwLock;
use serde::Serialize;
use tokio::sync::watch;
use tracing::{error, info};

/// Handle shared by every request and socket.
///
/// Cheap to clone.
#[derive(Debug, Clone)]
pub struct AppState {
    inner: Arc<Inner>,
}

#[derive(Debug)]
struct Inner {
    broadcaster: Broadcaster,
    producer: RwLock<Option<PathBuf>>,
    pipeline: RwLock<Option<watch::Receiver<PipelineStatus>>>,
    fatal: watch::Sender<Option<String>>,
}

/// Body of `GET /api/status`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatusReport {
    pub status: &'static str,
    pub monitor_exe: String,
    pub pipeline: &'static str,
    pub subscribers: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl AppState {
    pub fn new(broadcaster: Broadcaster) -> Self {
        let (fatal, _) = watch::channel(None);
        Self {
            inner: Arc::new(Inner {
                broadcaster,
                producer: RwLock::new(None),
                pipeline: RwLock::new(None),
                fatal,
            }),
        }
    }

    pub fn broadcaster(&self) -> &Broadcaster {
        &self.inner.broadcaster
    }

    pub fn set_producer(&self, path: impl AsRef<Path>) {
        *self.inner.producer.write() = Some(path.as_ref().to_path_buf());
    }

    pub fn producer(&self) -> Option<PathBuf> {
        self.inner.producer.read().clone()
    }

    /// Record an error that stops updates for good.
    ///
    /// Connected clients are told immediately, later ones on connect.
    pub fn set_fatal(&self, message: impl Into<String>) {
        let message = message.into();
        error!(error = %message, "pipeline unavailable");
        self.inner.fatal.send_replace(Some(message));
    }

    pub fn fatal(&self) -> Option<String> {
        self.inner.fatal.borrow().clone()
    }

    /// Receiver for fatal error changes. The current value counts as seen.
    pub fn watch_fatal(&self) -> watch::Receiver<Option<String>> {
        self.inner.fatal.subscribe()
    }

    /// Follow a running pipeline's status.
    ///
    /// A read failure on the producer becomes the fatal error.
    pub fn track(&self, mut status: watch::Receiver<PipelineStatus>) -> tokio::task::JoinHandle<()> {
        *self.inner.pipeline.write() = Some(status.clone());

        let state = self.clone();
        tokio::spawn(async move {
            while status.changed().await.is_ok() {
                let current = status.borrow_and_update().clone();
                match current {
                    PipelineStatus::Running => {}
                    PipelineStatus::Failed(message) => {
                        state.set_fatal(format!("Monitor stream failed: {}", message));
                        break;
                    }
                    other => {
                        info!(status = other.label(), "pipeline no longer running");
                        break;
                    }
                }
            }
        })
    }

    pub fn pipeline_status(&self) -> Option<PipelineStatus> {
        self.inner
            .pipeline
            .read()
            .as_ref()
            .map(|rx| rx.borrow().clone())
    }

    pub fn status_report(&self) -> StatusReport {
        StatusReport {
            status: "running",
            monitor_exe: self
                .producer()
                .map(|p| p.display().to_string())
                .unwrap_or_else(|| "not found".to_string()),
            pipeline: self
                .pipeline_status()
                .map(|s| s.label())
                .unwrap_or("unavailable"),
            subscribers: self.inner.broadcaster.len(),
            error: self.fatal(),
        }
    }
}
