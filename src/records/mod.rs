//! # Record Serialization
//!
//! Rows are serialized against a schema by [`Marshal`] into a deterministic
//! fixed-plus-heap layout: a null bitmap, a fixed-width region where every
//! column has a precomputable offset, and an out-of-line string heap.
//! See [`marshal`] for the byte-level format.

mod marshal;

pub use marshal::Marshal;
