//! Keeps the paid flag and paid-on date of invoices and their matching
//! contract payments in step, in both directions, without write loops.

pub mod application;
pub mod domain;
pub mod error;
pub mod infrastructure;
pub mod interfaces;
