//! Shared infrastructure for the risk gate: core types, wall-clock
//! timestamps, the service logger, and TCP plumbing.

pub mod logging;
pub mod net;
pub mod time;
pub mod types;

pub use types::{ListingId, OrderId, Price, Qty, SeqNum, Side, Timestamp};
