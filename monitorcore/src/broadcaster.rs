//! Snapshot broadcaster: non-blocking fan-out over registered sinks.
//!
//! Every registered sink gets its own bounded queue and worker task, so a slow
//! or stuck sink only ever delays itself.
//!
//! ## What it guarantees
//! - `publish` never awaits and never blocks on a sink.
//! - Per-subscriber FIFO: each sink sees snapshots in publish order.
//! - A sink that fails or panics is unregistered; nobody else notices.
//! - A sink only receives snapshots published after it registered.
//!
//! ## What it does not guarantee
//! - No retries: when a sink's queue is full the snapshot is dropped for that
//!   sink, leaving a gap.
//! - No ordering between different sinks.
//!
//! ```text
//!    publish(snapshot)
//!        │                        (Arc-backed clone per subscriber)
//!        ├────────────────► [queue #1] ─► worker #1 ─► sink.deliver()
//!        ├────────────────► [queue #2] ─► worker #2 ─► sink.deliver()
//!        └────────────────► [queue #N] ─► worker #N ─► sink.deliver()
//! ```

use std::collections::HashMap;
use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use async_trait::async_trait;
use futures_util::FutureExt;
use parking_lot::RwLock;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::error::DeliveryError;
use crate::snapshot::Snapshot;

/// Default per-subscriber queue capacity.
pub const DEFAULT_QUEUE_CAPACITY: usize = 16;

/// A destination for published snapshots.
///
/// The sink is owned by its worker task, so `deliver` may take its time; only
/// this sink's queue backs up meanwhile. Returning an error unregisters the
/// sink.
#[async_trait]
pub trait SnapshotSink: Send + 'static {
    async fn deliver(&mut self, snapshot: Snapshot) -> Result<(), DeliveryError>;
}

#[async_trait]
impl SnapshotSink for mpsc::Sender<Snapshot> {
    async fn deliver(&mut self, snapshot: Snapshot) -> Result<(), DeliveryError> {
        self.send(snapshot).await.map_err(|_| DeliveryError::Disconnected)
    }
}

/// Keeps only the latest snapshot; suited to renderers that redraw on a timer.
#[async_trait]
impl SnapshotSink for watch::Sender<Option<Snapshot>> {
    async fn deliver(&mut self, snapshot: Snapshot) -> Result<(), DeliveryError> {
        self.send(Some(snapshot)).map_err(|_| DeliveryError::Disconnected)
    }
}

/// Handle identifying a registered subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriberId(u64);

impl fmt::Display for SubscriberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Outcome of one `publish` call.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PublishReport {
    /// Snapshots handed to a subscriber queue.
    pub queued: usize,
    /// Subscribers skipped because their queue was full.
    pub dropped: usize,
    /// Subscribers whose worker had already stopped.
    pub closed: usize,
}

struct Slot {
    name: String,
    sender: mpsc::Sender<Snapshot>,
    worker: JoinHandle<()>,
    dropped: AtomicU64,
}

struct Inner {
    slots: RwLock<HashMap<SubscriberId, Slot>>,
    next_id: AtomicU64,
    capacity: usize,
}

impl Inner {
    fn remove(&self, id: SubscriberId) -> Option<Slot> {
        self.slots.write().remove(&id)
    }
}

/// Registry of sinks with independent delivery paths.
///
/// Cloning yields another handle to the same registry.
///
/// # Example
///
/// ```rust
/// use monitorcore::{Broadcaster, Snapshot};
/// use tokio::sync::mpsc;
///
/// # tokio_test::block_on(async {
/// let broadcaster = Broadcaster::new();
/// let (tx, mut rx) = mpsc::channel(8);
/// broadcaster.register("printer", tx);
///
/// broadcaster.publish(Snapshot::decode(r#"{"cpu":{}}"#).unwrap());
/// assert!(rx.recv().await.is_some());
/// # });
/// ```
#[derive(Clone)]
pub struct Broadcaster {
    inner: Arc<Inner>,
}

impl Default for Broadcaster {
    fn default() -> Self {
        Self::new()
    }
}

impl Broadcaster {
    /// Create a broadcaster with the default queue capacity.
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_QUEUE_CAPACITY)
    }

    /// Create a broadcaster whose subscriber queues hold `capacity` snapshots.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            inner: Arc::new(Inner {
                slots: RwLock::new(HashMap::new()),
                next_id: AtomicU64::new(1),
                capacity: capacity.max(1),
            }),
        }
    }

    /// Add a sink and spawn its worker.
    ///
    /// Must be called from within a tokio runtime.
    pub fn register<S: SnapshotSink>(&self, name: &str, mut sink: S) -> SubscriberId {
        let id = SubscriberId(self.inner.next_id.fetch_add(1, Ordering::Relaxed));
        let (tx, mut rx) = mpsc::channel::<Snapshot>(self.inner.capacity);
        let registry: Weak<Inner> = Arc::downgrade(&self.inner);
        let worker_name = name.to_string();

        let worker = tokio::spawn(async move {
            while let Some(snapshot) = rx.recv().await {
                let failure = match AssertUnwindSafe(sink.deliver(snapshot)).catch_unwind().await {
                    Ok(Ok(())) => continue,
                    Ok(Err(e)) => e.to_string(),
                    Err(_) => "sink panicked".to_string(),
                };

                warn!(
                    subscriber = %id,
                    name = %worker_name,
                    error = %failure,
                    "delivery failed, unregistering subscriber"
                );
                if let Some(registry) = registry.upgrade() {
                    registry.remove(id);
                }
                break;
            }
        });

        self.inner.slots.write().insert(
            id,
            Slot {
                name: name.to_string(),
                sender: tx,
                worker,
                dropped: AtomicU64::new(0),
            },
        );

        debug!(subscriber = %id, name, "subscriber registered");
        id
    }

    /// Remove a sink. Returns false if it was not registered.
    ///
    /// A delivery in flight for this sink is abandoned.
    pub fn unregister(&self, id: SubscriberId) -> bool {
        match self.inner.remove(id) {
            Some(slot) => {
                slot.worker.abort();
                debug!(subscriber = %id, name = %slot.name, "subscriber unregistered");
                true
            }
            None => false,
        }
    }

    /// Queue a snapshot for every registered sink.
    pub fn publish(&self, snapshot: Snapshot) -> PublishReport {
        let mut report = PublishReport::default();
        let mut stale = Vec::new();

        {
            let slots = self.inner.slots.read();
            for (id, slot) in slots.iter() {
                match slot.sender.try_send(snapshot.clone()) {
                    Ok(()) => report.queued += 1,
                    Err(mpsc::error::TrySendError::Full(_)) => {
                        report.dropped += 1;
                        let total = slot.dropped.fetch_add(1, Ordering::Relaxed) + 1;
                        debug!(subscriber = %id, name = %slot.name, total, "queue full, snapshot dropped");
                    }
                    Err(mpsc::error::TrySendError::Closed(_)) => {
                        report.closed += 1;
                        stale.push(*id);
                    }
                }
            }
        }

        for id in stale {
            self.inner.remove(id);
        }

        report
    }

    /// Unregister every sink. Workers stop without draining their queues.
    pub fn close(&self) {
        let slots: Vec<(SubscriberId, Slot)> = self.inner.slots.write().drain().collect();
        for (_, slot) in &slots {
            slot.worker.abort();
        }
        if !slots.is_empty() {
            debug!(count = slots.len(), "broadcaster closed");
        }
    }

    /// True if `id` is currently registered.
    pub fn contains(&self, id: SubscriberId) -> bool {
        self.inner.slots.read().contains_key(&id)
    }

    /// Number of registered sinks.
    pub fn len(&self) -> usize {
        self.inner.slots.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.slots.read().is_empty()
    }

    /// Snapshots dropped for `id` because its queue was full.
    pub fn dropped(&self, id: SubscriberId) -> Option<u64> {
        self.inner
            .slots
            .read()
            .get(&id)
            .map(|slot| slot.dropped.load(Ordering::Relaxed))
    }

    /// Registered subscribers and their names, ordered by id.
    pub fn subscribers(&self) -> Vec<(SubscriberId, String)> {
        let mut list: Vec<_> = self
            .inner
            .slots
            .read()
            .iter()
            .map(|(id, slot)| (*id, slot.name.clone()))
            .collect();
        list.sort();
        list
    }
}

impl fmt::Debug for Broadcaster {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Broadcaster")
            .field("subscribers", &self.len())
            .field("capacity", &self.inner.capacity)
            .finish()
    }
}
