//! # Memory Module
//!
//! Pooled allocation support for type-erased component storage.
//!
//! Public API exposure is controlled by `lib.rs`.

pub mod pool;
