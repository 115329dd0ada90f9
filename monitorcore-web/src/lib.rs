//! # monitorcore-web
//!
//! Web dashboard for a system-metrics producer.
//!
//! One producer pipeline is shared by every connected browser. Each websocket
//! connection is a subscriber of the pipeline's broadcaster and receives the
//! snapshots assembled after it connected.
//!
//! | Route         | Purpose                                   |
//! |---------------|-------------------------------------------|
//! | `/`           | embedded dashboard page                   |
//! | `/api/status` | producer path, pipeline state, subscribers |
//! | `/ws`         | push socket                               |
//! | `/static`     | optional directory of extra assets        |

pub mod server;
pub mod socket;
pub mod state;

pub use server::{router, serve};
pub use state::{AppState, StatusReport};
