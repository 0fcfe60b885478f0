//! Common types and traits shared across Switchboard crates.
//!
//! This crate provides the contract between the coordinator and the
//! capability handlers: the [`Handler`] trait, the [`Execution`] result a
//! handler returns, and the [`ResponseEnvelope`] handed back to callers.

pub mod envelope;
pub mod error;
pub mod traits;

pub use envelope::{new_request_id, ResponseEnvelope, COORDINATOR, NO_HANDLER};
pub use error::{Result, SwitchboardError};
pub use traits::{clamp_confidence, Confidence, Execution, Handler, HandlerStatus};
