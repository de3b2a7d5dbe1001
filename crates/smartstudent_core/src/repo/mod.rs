//! Repository layer over named key/value entries.
//!
//! # Responsibility
//! - Define the storage contract the services depend on.
//! - Isolate SQLite details from reconciliation and services.
//!
//! # Invariants
//! - Writes are atomic per key only.
//! - Malformed stored JSON never surfaces as an error from `load_snapshot`.

pub mod kv_repo;
pub mod snapshot_repo;
