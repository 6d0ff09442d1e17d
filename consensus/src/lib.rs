//! Target and difficulty arithmetic for Mergepool
//!
//! This crate implements the conversions between the three representations
//! of chain difficulty used by the pool: the 256-bit target, the compact
//! `nbits` encoding carried in block headers, and the floating-point
//! difficulty reported to miners and persisted with shares.

pub mod target;

pub use target::{Target, TargetError};
