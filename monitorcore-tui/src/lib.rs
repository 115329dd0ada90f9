//! # monitorcore-tui
//!
//! Terminal dashboard for the snapshots relayed by [`monitorcore`].
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        Application                          │
//! │  ┌─────────┐    ┌──────────┐    ┌─────────┐    ┌─────────┐  │
//! │  │  app    │───▶│   data   │───▶│   ui    │───▶│ Terminal│  │
//! │  │ (state) │    │ (metrics)│    │(panels) │    │         │  │
//! │  └────┬────┘    └──────────┘    └─────────┘    └─────────┘  │
//! │       │                                                     │
//! │       ▼                                                     │
//! │  ┌─────────┐                                                │
//! │  │ source  │◀── ChannelSource ◀── Broadcaster               │
//! │  └─────────┘                                                │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! - **[`app`]**: application state, process sorting and toggles
//! - **[`source`]**: the [`DataSource`] trait and the watch-channel backed
//!   [`ChannelSource`]
//! - **[`data`]**: typed [`SystemMetrics`] decoded leniently from a
//!   [`monitorcore::Snapshot`], plus usage [`History`] for sparklines
//! - **[`ui`]**: ratatui rendering and themes
//!
//! ## Usage
//!
//! ```
//! use monitorcore_tui::{App, ChannelSource, Theme};
//!
//! let (_tx, source) = ChannelSource::create("example");
//! let app = App::new(Box::new(source), Theme::dark());
//! assert!(app.data.is_none());
//! ```

pub mod app;
pub mod data;
pub mod events;
pub mod source;
pub mod ui;

pub use app::{App, ProcessSort};
pub use data::{History, SystemMetrics};
pub use source::{ChannelSource, DataSource};
pub use ui::Theme;
