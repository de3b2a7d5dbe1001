//! Notification domain model.
//!
//! # Responsibility
//! - Define the notification record and its kinds.
//! - Classify kinds by how they may leave the unread state.
//!
//! # Invariants
//! - `read` equals `read_by ⊇ target_ids`; [`Notification::sync_read_flag`]
//!   restores it after any `read_by` mutation.
//! - Pending-work kinds are never marked read while the work is open.

use crate::model::task::TaskId;
use crate::model::user::UserId;
use crate::model::StorageExtras;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

pub type NotificationId = String;

/// Notification subtype.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    NewTask,
    TaskSubmission,
    TaskCompleted,
    TeacherComment,
    GradeReceived,
    PendingGrading,
    EvaluationCompleted,
}

/// How a notification kind may become read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadPolicy {
    /// One-off event; any explicit read marks it.
    Transient,
    /// Outstanding obligation; only resolving the work clears it.
    PendingWork,
    /// Cleared by removal when the creator reviews results.
    ReviewDismissal,
}

impl NotificationKind {
    pub const ALL: [NotificationKind; 7] = [
        Self::NewTask,
        Self::TaskSubmission,
        Self::TaskCompleted,
        Self::TeacherComment,
        Self::GradeReceived,
        Self::PendingGrading,
        Self::EvaluationCompleted,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::NewTask => "new_task",
            Self::TaskSubmission => "task_submission",
            Self::TaskCompleted => "task_completed",
            Self::TeacherComment => "teacher_comment",
            Self::GradeReceived => "grade_received",
            Self::PendingGrading => "pending_grading",
            Self::EvaluationCompleted => "evaluation_completed",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        let normalized = value.trim();
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str().eq_ignore_ascii_case(normalized))
    }

    pub fn read_policy(self) -> ReadPolicy {
        match self {
            Self::TeacherComment
            | Self::GradeReceived
            | Self::TaskSubmission
            | Self::TaskCompleted => ReadPolicy::Transient,
            Self::NewTask | Self::PendingGrading => ReadPolicy::PendingWork,
            Self::EvaluationCompleted => ReadPolicy::ReviewDismissal,
        }
    }
}

/// Canonical notification record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub id: NotificationId,
    pub kind: NotificationKind,
    pub task_id: TaskId,
    pub from_user_id: UserId,
    pub target_ids: Vec<UserId>,
    /// Unix epoch milliseconds.
    pub created_at: i64,
    pub read_by: BTreeSet<UserId>,
    /// Derived from `read_by`; persisted for older readers.
    pub read: bool,
    pub extra: StorageExtras,
}

impl Notification {
    pub fn new(
        id: impl Into<NotificationId>,
        kind: NotificationKind,
        task_id: impl Into<TaskId>,
        from_user_id: impl Into<UserId>,
        target_ids: Vec<UserId>,
        created_at: i64,
    ) -> Self {
        Self {
            id: id.into(),
            kind,
            task_id: task_id.into(),
            from_user_id: from_user_id.into(),
            target_ids,
            created_at,
            read_by: BTreeSet::new(),
            read: false,
            extra: StorageExtras::new(),
        }
    }

    pub fn targets(&self, user_id: &str) -> bool {
        self.target_ids.iter().any(|target| target == user_id)
    }

    pub fn is_read_by(&self, user_id: &str) -> bool {
        self.read_by.contains(user_id)
    }

    /// Whether every target has read this notification.
    pub fn computed_read(&self) -> bool {
        !self.target_ids.is_empty()
            && self
                .target_ids
                .iter()
                .all(|target| self.read_by.contains(target))
    }

    /// Adds `user_id` to `read_by`; returns whether anything changed.
    pub fn mark_read_by(&mut self, user_id: &str) -> bool {
        let inserted = self.read_by.insert(user_id.to_string());
        self.sync_read_flag();
        inserted
    }

    /// Restores the `read` invariant; returns whether the flag changed.
    pub fn sync_read_flag(&mut self) -> bool {
        let expected = self.computed_read();
        let changed = self.read != expected;
        self.read = expected;
        changed
    }
}

#[cfg(test)]
mod tests {
    use super::{Notification, NotificationKind, ReadPolicy};

    #[test]
    fn read_flag_tracks_all_targets() {
        let mut notification = Notification::new(
            "n-1",
            NotificationKind::TeacherComment,
            "t-1",
            "teacher",
            vec!["s-1".to_string(), "s-2".to_string()],
            10,
        );
        assert!(notification.mark_read_by("s-1"));
        assert!(!notification.read);
        assert!(notification.mark_read_by("s-2"));
        assert!(notification.read);
        assert!(!notification.mark_read_by("s-2"));
    }

    #[test]
    fn kinds_parse_from_storage_strings() {
        for kind in NotificationKind::ALL {
            assert_eq!(NotificationKind::parse(kind.as_str()), Some(kind));
        }
        assert_eq!(NotificationKind::parse("bogus"), None);
    }

    #[test]
    fn pending_work_kinds_are_classified() {
        assert_eq!(NotificationKind::NewTask.read_policy(), ReadPolicy::PendingWork);
        assert_eq!(
            NotificationKind::PendingGrading.read_policy(),
            ReadPolicy::PendingWork
        );
        assert_eq!(
            NotificationKind::GradeReceived.read_policy(),
            ReadPolicy::Transient
        );
    }
}
