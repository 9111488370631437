//! Application layer: mirroring payment status between invoices and
//! contract payments.
//!
//! `SyncCoordinator` owns the lock, cool-down and error isolation;
//! `SyncedCollection` intercepts writes and hands payment changes to it once
//! they have completed; `MirrorWriter` translates a change onto the sibling
//! collection. `ReplayEngine` drives the whole thing from a stream of
//! operations.

pub mod config;
pub mod coordinator;
pub mod engine;
pub mod interceptor;
pub mod writer;
