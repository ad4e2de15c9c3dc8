//! Run Coordinator
//!
//! One pass over the status feed: load the alert ledger, decide each
//! vehicle's transition, send the notices, and commit the ledger once.
//! Delivery is at-least-once: a crash between a send and the commit re-sends
//! that notice on the next run, never drops it.

mod config;
mod coordinator;
mod error;
mod report;

pub use config::{AbsentEntityPolicy, CorruptStorePolicy, RunConfig};
pub use coordinator::RunCoordinator;
pub use error::RunError;
pub use report::{DecisionRecord, Outcome, RunReport, SkippedRow};
