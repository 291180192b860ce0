//! TTL caching over a path-addressed document store.
//!
//! This module provides:
//! - A `Store` trait for point reads against the document store, plus an
//!   in-memory JSON tree implementation
//! - A single-value `TtlCache` that refills through a serial queue, so
//!   concurrent readers of a stale value trigger exactly one fetch
//! - Missing values are cached for the TTL like any other value

mod layer;
mod storage;
mod traits;

pub use layer::TtlCache;
pub use storage::{MemoryStore, Snapshot, Store};
pub use traits::{CacheResult, CacheSource};
