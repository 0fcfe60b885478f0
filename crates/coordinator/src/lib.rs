//! Routing coordinator for Switchboard.
//!
//! The coordinator is the single entry point for a query:
//! 1. Scores the query against every registered handler
//! 2. Selects the strict maximum, falling back to `GeneralAgent` below threshold
//! 3. Dispatches to the selected handler on its own task
//! 4. Records the outcome in a bounded history ledger
//!
//! # Architecture
//!
//! ```text
//! process_query
//!      │
//!      ▼
//! ┌─────────────────┐
//! │   Coordinator   │  ◄── score() on every handler
//! │   (this crate)  │
//! └────────┬────────┘
//!          │ execute()
//!    ┌─────┴─────┬──────────┐
//!    ▼           ▼          ▼
//! [Research] [Weather]  [General]
//! ```

pub mod config;
pub mod history;
pub mod routing;
pub mod triage;

pub use config::{CoordinatorConfig, RoutingConfig, ServerConfig};
pub use history::{HistoryEntry, HistoryLedger};
pub use routing::{select, HandlerScore, RouteDecision, Selection};
pub use triage::{Coordinator, CoordinatorStatus, DEFAULT_USER};
