//! ==============================================================================
//! error.rs - error taxonomy of the sensor store
//! ==============================================================================
//!
//! every error here is local to a single call. an unknown channel or a bad
//! payload affects one update only; the ingest and render loops log and
//! carry on.
//!
//! ==============================================================================

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum StoreError {
    /// the (zone, channel) pair was never registered, or does not name a
    /// known zone/channel at all
    #[error("Unknown channel '{zone}/{channel}'. Only channels registered at startup can be looked up.")]
    UnknownChannel { zone: String, channel: String },

    /// the payload text is not a number
    #[error("Malformed payload on '{topic}': {payload:?} is not a finite number")]
    MalformedPayload { topic: String, payload: String },

    /// the same (zone, channel) pair was registered twice while building a store
    #[error("Channel '{zone}/{channel}' registered more than once")]
    DuplicateChannel { zone: String, channel: String },
}

pub type Result<T> = std::result::Result<T, StoreError>;
