//! Core domain logic for Smart Student notifications.
//! This crate is the single source of truth for reconciliation invariants.

pub mod config;
pub mod db;
pub mod logging;
pub mod model;
pub mod reconcile;
pub mod repo;
pub mod service;
pub mod settings;
pub mod snapshot;

pub use config::{AppConfig, ConfigError};
pub use logging::{default_log_level, init_logging, init_stderr_logging, logging_status};
pub use model::user::{Actor, Role, UserId};
pub use reconcile::{
    compute, compute_with, repair, repair_in_place, NotificationView, ReconcileOptions,
};
pub use repo::kv_repo::{
    KvRepository, MemoryKvRepository, RepoError, RepoResult, SqliteKvRepository,
};
pub use service::notification_service::{
    NotificationService, RefreshOutcome, RefreshTrigger, ServiceError,
};
pub use settings::Language;
pub use snapshot::StorageSnapshot;

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
