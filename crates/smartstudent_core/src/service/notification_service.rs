//! Notification use-case service.
//!
//! # Responsibility
//! - Run reconciliation against a key/value store: load, repair, commit,
//!   compute.
//! - Apply read markers and classroom actions as load, mutate, commit.
//!
//! # Invariants
//! - Only collections whose encoding changed are written back.
//! - `view` never writes; every other entry point may.
//! - A classroom action that fails its preconditions writes nothing.

use crate::model::user::Actor;
use crate::reconcile::{
    self, NotificationView, ReadMarkReport, ReconcileError, ReconcileOptions, RepairReport,
    ReviewReport,
};
use crate::repo::kv_repo::{KvRepository, RepoError};
use crate::repo::snapshot_repo::{commit_snapshot, load_snapshot, CommitReport};
use crate::service::classroom::ClassroomError;
use crate::snapshot::StorageSnapshot;
use log::{info, warn};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Event that asks the host to recompute notifications.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshTrigger {
    /// Another tab or process changed storage.
    StorageChanged,
    /// The page became visible again.
    VisibilityChanged,
    /// The window regained focus.
    Focus,
    /// Explicit refresh by the host.
    Manual,
}

impl RefreshTrigger {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::StorageChanged => "storage_changed",
            Self::VisibilityChanged => "visibility_changed",
            Self::Focus => "focus",
            Self::Manual => "manual",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "storage_changed" | "storage" => Some(Self::StorageChanged),
            "visibility_changed" | "visibilitychange" => Some(Self::VisibilityChanged),
            "focus" => Some(Self::Focus),
            "manual" => Some(Self::Manual),
            _ => None,
        }
    }
}

/// Errors surfaced by [`NotificationService`].
#[derive(Debug)]
pub enum ServiceError {
    Repo(RepoError),
    Classroom(ClassroomError),
    Reconcile(ReconcileError),
}

impl Display for ServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Repo(err) => write!(f, "{err}"),
            Self::Classroom(err) => write!(f, "{err}"),
            Self::Reconcile(err) => write!(f, "{err}"),
        }
    }
}

impl Error for ServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Repo(err) => Some(err),
            Self::Classroom(err) => Some(err),
            Self::Reconcile(err) => Some(err),
        }
    }
}

impl From<RepoError> for ServiceError {
    fn from(value: RepoError) -> Self {
        Self::Repo(value)
    }
}

impl From<ClassroomError> for ServiceError {
    fn from(value: ClassroomError) -> Self {
        Self::Classroom(value)
    }
}

impl From<ReconcileError> for ServiceError {
    fn from(value: ReconcileError) -> Self {
        Self::Reconcile(value)
    }
}

pub type ServiceResult<T> = Result<T, ServiceError>;

/// Result of one refresh cycle.
#[derive(Debug, Clone, PartialEq)]
pub struct RefreshOutcome {
    pub view: NotificationView,
    pub repair: RepairReport,
    pub commit: CommitReport,
}

/// Use-case service wrapper for notification reconciliation.
pub struct NotificationService<R: KvRepository> {
    repo: R,
    options: ReconcileOptions,
}

impl<R: KvRepository> NotificationService<R> {
    /// Creates a service with default reconciliation options.
    pub fn new(repo: R) -> Self {
        Self::with_options(repo, ReconcileOptions::default())
    }

    pub fn with_options(repo: R, options: ReconcileOptions) -> Self {
        Self { repo, options }
    }

    pub fn repo(&self) -> &R {
        &self.repo
    }

    pub fn options(&self) -> &ReconcileOptions {
        &self.options
    }

    /// Loads the current snapshot.
    pub fn snapshot(&self) -> ServiceResult<StorageSnapshot> {
        Ok(load_snapshot(&self.repo)?)
    }

    /// Computes `actor`'s view without repairing or writing.
    pub fn view(&self, actor: &Actor) -> ServiceResult<NotificationView> {
        let snapshot = self.snapshot()?;
        Ok(reconcile::compute_with(&snapshot, actor, &self.options))
    }

    /// Repairs, commits and recomputes `actor`'s view.
    ///
    /// # Contract
    /// - A refresh over already-repaired storage writes nothing.
    /// - Per-key write failures do not fail the refresh; they are reported
    ///   in [`RefreshOutcome::commit`] and the view reflects the repaired
    ///   in-memory state.
    pub fn refresh(&self, trigger: RefreshTrigger, actor: &Actor) -> ServiceResult<RefreshOutcome> {
        let before = self.snapshot()?;
        let mut after = before.clone();
        let repair = reconcile::repair_in_place(&mut after, actor);
        let commit = commit_snapshot(&self.repo, &before, &after)?;
        let view = reconcile::compute_with(&after, actor, &self.options);

        info!(
            "event=refresh module=service status={} trigger={} actor={} role={} repaired={} written={} failed={} items={}",
            if commit.is_complete() { "ok" } else { "partial" },
            trigger.as_str(),
            actor.id,
            actor.role.as_str(),
            repair.changed(),
            commit.written.len(),
            commit.failed.len(),
            view.total()
        );
        Ok(RefreshOutcome {
            view,
            repair,
            commit,
        })
    }

    /// Marks everything `actor` may dismiss as read and persists it.
    pub fn mark_all_read(&self, actor: &Actor) -> ServiceResult<ReadMarkReport> {
        let (report, _) = self.mutate(|snapshot| Ok(reconcile::mark_all_read(snapshot, actor)))?;
        Ok(report)
    }

    /// Marks one notification read; returns whether it changed.
    pub fn mark_notification_read(&self, actor: &Actor, notification_id: &str) -> ServiceResult<bool> {
        let (changed, _) = self.mutate(|snapshot| {
            Ok(reconcile::mark_notification_read(
                snapshot,
                actor,
                notification_id,
            ))
        })?;
        Ok(changed)
    }

    /// Records that `teacher` reviewed the results of evaluation `task_id`.
    pub fn acknowledge_review(
        &self,
        teacher: &Actor,
        task_id: &str,
        reviewed_at: i64,
    ) -> ServiceResult<ReviewReport> {
        let (report, _) = self.mutate(|snapshot| {
            Ok(reconcile::acknowledge_review(
                snapshot,
                teacher,
                task_id,
                reviewed_at,
            )?)
        })?;
        Ok(report)
    }

    /// Applies a classroom action and persists what it wrote.
    ///
    /// # Example
    /// ```ignore
    /// let (task_id, _) = service.apply(|snapshot| {
    ///     classroom::create_task(snapshot, &teacher, request, now)
    /// })?;
    /// ```
    pub fn apply<T>(
        &self,
        action: impl FnOnce(&mut StorageSnapshot) -> Result<T, ClassroomError>,
    ) -> ServiceResult<(T, CommitReport)> {
        self.mutate(|snapshot| Ok(action(snapshot)?))
    }

    fn mutate<T>(
        &self,
        change: impl FnOnce(&mut StorageSnapshot) -> ServiceResult<T>,
    ) -> ServiceResult<(T, CommitReport)> {
        let before = self.snapshot()?;
        let mut after = before.clone();
        let value = change(&mut after)?;
        let commit = commit_snapshot(&self.repo, &before, &after)?;
        if !commit.is_complete() {
            warn!(
                "event=commit module=service status=partial written={} failed={}",
                commit.written.len(),
                commit.failed.len()
            );
        }
        Ok((value, commit))
    }
}
