//! Data models for the renderer.
//!
//! ```text
//! Snapshot (decoded record)
//!        │
//!        ▼
//! SystemMetrics::from_snapshot()   lenient typed view
//!        │
//!        └──▶ History::record()    for sparklines
//! ```

pub mod format;
pub mod history;
pub mod metrics;

pub use history::History;
pub use metrics::{
    CpuMetrics, DiskMetrics, GpuMetrics, MemoryMetrics, NetworkMetrics, ProcessMetrics,
    SystemMetrics,
};
