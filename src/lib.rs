//! ==============================================================================
//! enviro_host - windowed sensor aggregation for an environment display
//! ==============================================================================
//!
//! data flow:
//!
//! ```text
//!     message source ──(topic, payload)──> ingest loop ──record()──┐
//!                                                                  ▼
//!                                                           SensorStore
//!                                                       (records + dirty)
//!                                                                  │
//!     render loop <──take_dirty_and_clear() / snapshot()───────────┘
//!         │
//!         ├──> LogRenderer (stdout)
//!         └──> SharedFrame ──> web dashboard / json api
//! ```
//!
//! ==============================================================================

pub mod config;
pub mod domain;
pub mod error;
pub mod ingest;
pub mod logging;
pub mod record;
pub mod render;
pub mod server;
pub mod store;

pub use domain::{Channel, ChannelId, ChannelSnapshot, Frame, Message, Reading, Stats, Zone};
pub use error::StoreError;
pub use record::SensorRecord;
pub use store::{PayloadPolicy, SensorStore};
