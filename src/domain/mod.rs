//! Domain types: documents and their update descriptors, the two payment
//! collections, and the ports the application layer depends on.

pub mod document;
pub mod operation;
pub mod payment;
pub mod ports;
