//! # monitorcore
//!
//! Relay core for a system-metrics producer process.
//!
//! The producer is an external executable that writes metrics snapshots as
//! structured text on stdout, split across lines at arbitrary points, and free
//! form diagnostics on stderr. This crate turns that output into a stream of
//! [`Snapshot`]s and fans each one out to any number of subscribers.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                            Pipeline                              │
//! │  ┌────────────┐ stdout ┌───────────────┐   ┌─────────────┐       │
//! │  │ Supervisor │───────▶│FrameAssembler │──▶│ Broadcaster │──▶ sinks
//! │  │ (process)  │        └───────────────┘   └─────────────┘       │
//! │  │            │ stderr ┌───────────────┐                         │
//! │  │            │───────▶│    tracing    │                         │
//! │  └────────────┘        └───────────────┘                         │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! - **[`supervisor`]**: starts the producer and exposes its streams as lines
//! - **[`assembler`]**: rebuilds complete records with lexical brace counting
//! - **[`broadcaster`]**: per-subscriber queues so one slow sink never blocks
//!   the others, or the assembler
//! - **[`pipeline`]**: the two drain loops, stop signal, status and counters
//! - **[`settings`]**: layered configuration and producer lookup
//!
//! ## Usage
//!
//! ```no_run
//! use monitorcore::{Broadcaster, Pipeline, Settings, Snapshot};
//! use tokio::sync::watch;
//!
//! # tokio_test::block_on(async {
//! let settings = Settings::load(None)?;
//! let producer = settings.locate_producer()?;
//!
//! let broadcaster = Broadcaster::with_capacity(settings.pipeline.subscriber_queue);
//! let (tx, mut latest) = watch::channel::<Option<Snapshot>>(None);
//! broadcaster.register("latest", tx);
//!
//! let pipeline = Pipeline::launch(&producer, broadcaster, settings.pipeline_config())?;
//! latest.changed().await.ok();
//! println!("{:?}", *latest.borrow());
//! pipeline.shutdown().await;
//! # Ok::<(), monitorcore::Error>(())
//! # });
//! ```

pub mod assembler;
pub mod broadcaster;
pub mod error;
pub mod pipeline;
pub mod settings;
pub mod snapshot;
pub mod supervisor;

pub use assembler::{AssemblerState, FrameAssembler, DEFAULT_MAX_FRAME_BYTES};
pub use broadcaster::{Broadcaster, PublishReport, SnapshotSink, SubscriberId, DEFAULT_QUEUE_CAPACITY};
pub use error::{DecodeError, DeliveryError, Error, LaunchError, Result, SettingsError};
pub use pipeline::{Pipeline, PipelineConfig, PipelineReport, PipelineStats, PipelineStatus};
pub use settings::Settings;
pub use snapshot::Snapshot;
pub use supervisor::{LineReader, Supervisor};
