//! # Formats Module
//!
//! Binary serialization of pool snapshots.
//!
//! File I/O is the app layer's concern; this module only turns snapshots
//! into bytes and back.

mod persistence;

pub use persistence::*;
