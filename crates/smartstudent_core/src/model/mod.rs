//! Canonical domain model for the school notification core.
//!
//! # Responsibility
//! - Define the records business logic operates on.
//! - Keep storage spellings (loose field names, mixed timestamp formats) out
//!   of these types; normalization happens in `snapshot::codec`.
//!
//! # Invariants
//! - Every user reference is a canonical `UserId`.
//! - Timestamps are Unix epoch milliseconds.

pub mod comment;
pub mod notification;
pub mod task;
pub mod user;
pub mod user_task;

/// Storage fields a record carries that the model does not interpret.
///
/// Kept verbatim so a commit writes them back unchanged.
pub type StorageExtras = serde_json::Map<String, serde_json::Value>;
