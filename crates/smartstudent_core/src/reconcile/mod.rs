//! Notification reconciliation engine.
//!
//! # Responsibility
//! - Compute per-role "pending / unread / completed" views from independent
//!   collections with no central source of truth.
//! - Keep the query ([`compute`]) pure and isolate every write behind
//!   [`repair`] and the read-state operations.
//!
//! # Invariants
//! - Assignment and resolution rules live in exactly one place each
//!   (`assignment`, `resolution`) and every path goes through them.
//! - No step aborts a pass: missing references are skipped, unknown
//!   identities are attributed to the `unknown` sentinel.

pub mod assignment;
mod compute;
pub mod dedup;
mod read_state;
mod repair;
pub mod resolution;
pub mod view;

use crate::model::task::TaskId;
use crate::model::user::{Actor, UserId};
use crate::snapshot::StorageSnapshot;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub use read_state::{
    acknowledge_review, mark_all_read, mark_notification_read, ReadMarkReport, ReviewReport,
};
pub use repair::RepairReport;
pub use view::NotificationView;

/// Tunables for a reconciliation pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconcileOptions {
    /// Records with the same kind, task and sender within this many
    /// milliseconds display once.
    pub dedup_window_ms: i64,
}

impl Default for ReconcileOptions {
    fn default() -> Self {
        Self {
            dedup_window_ms: dedup::DEFAULT_DEDUP_WINDOW_MS,
        }
    }
}

/// Errors of targeted reconciliation operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcileError {
    UnknownTask(TaskId),
    NotTaskOwner { task_id: TaskId, user_id: UserId },
    NotAnEvaluation(TaskId),
}

impl Display for ReconcileError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnknownTask(task_id) => write!(f, "task not found: {task_id}"),
            Self::NotTaskOwner { task_id, user_id } => {
                write!(f, "user {user_id} did not create task {task_id}")
            }
            Self::NotAnEvaluation(task_id) => write!(f, "task {task_id} is not an evaluation"),
        }
    }
}

impl Error for ReconcileError {}

/// Computes `actor`'s notification view with default options.
pub fn compute(snapshot: &StorageSnapshot, actor: &Actor) -> NotificationView {
    compute_with(snapshot, actor, &ReconcileOptions::default())
}

/// Computes `actor`'s notification view.
pub fn compute_with(
    snapshot: &StorageSnapshot,
    actor: &Actor,
    options: &ReconcileOptions,
) -> NotificationView {
    compute::compute_view(snapshot, actor, options)
}

/// Returns a repaired copy of `snapshot`; see [`repair_in_place`].
pub fn repair(snapshot: &StorageSnapshot, actor: &Actor) -> StorageSnapshot {
    let mut repaired = snapshot.clone();
    repair_in_place(&mut repaired, actor);
    repaired
}

/// Repairs `snapshot` within `actor`'s scope and reports what changed.
///
/// Students repair their own results, teachers the results of tasks they
/// created, admins everything. Safe to run any number of times.
pub fn repair_in_place(snapshot: &mut StorageSnapshot, actor: &Actor) -> RepairReport {
    repair::repair_snapshot(snapshot, actor)
}
