//! Read markers and review dismissal.
//!
//! # Invariants
//! - Marking is idempotent: `read_by` is a set and `read` is re-derived.
//! - Pending-work notifications are only marked once their work resolved.
//! - `evaluation_completed` is cleared by [`acknowledge_review`] only.

use super::assignment::is_assigned;
use super::compute::is_watched_comment;
use super::repair::{sync_task_results, RepairScope};
use super::resolution::is_resolved;
use super::ReconcileError;
use crate::model::notification::{Notification, NotificationKind, ReadPolicy};
use crate::model::user::{Actor, Role};
use crate::snapshot::StorageSnapshot;
use log::info;

/// Changes applied by a read-marking call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReadMarkReport {
    pub notifications_marked: usize,
    pub comments_marked: usize,
}

/// Changes applied when a teacher reviews evaluation results.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReviewReport {
    pub results_reviewed: usize,
    pub notifications_removed: usize,
}

/// Marks everything `actor` may dismiss as read.
pub fn mark_all_read(snapshot: &mut StorageSnapshot, actor: &Actor) -> ReadMarkReport {
    let notification_indices: Vec<usize> = snapshot
        .notifications
        .iter()
        .enumerate()
        .filter(|(_, notification)| may_mark(snapshot, actor, notification))
        .map(|(index, _)| index)
        .collect();

    let comment_indices: Vec<usize> = snapshot
        .comments
        .iter()
        .enumerate()
        .filter(|(_, comment)| {
            !comment.is_read_by(&actor.id)
                && snapshot
                    .task(&comment.task_id)
                    .is_some_and(|task| is_watched_comment(snapshot, actor, task, comment))
        })
        .map(|(index, _)| index)
        .collect();

    let mut report = ReadMarkReport::default();
    for index in notification_indices {
        if snapshot.notifications[index].mark_read_by(&actor.id) {
            report.notifications_marked += 1;
        }
    }
    for index in comment_indices {
        if snapshot.comments[index].read_by.insert(actor.id.clone()) {
            report.comments_marked += 1;
        }
    }

    info!(
        "event=mark_all_read module=reconcile status=ok actor={} notifications={} comments={}",
        actor.id, report.notifications_marked, report.comments_marked
    );
    report
}

/// Marks one notification read under the same policy as [`mark_all_read`].
///
/// Returns whether the notification changed.
pub fn mark_notification_read(
    snapshot: &mut StorageSnapshot,
    actor: &Actor,
    notification_id: &str,
) -> bool {
    let Some(index) = snapshot
        .notifications
        .iter()
        .position(|notification| notification.id == notification_id)
    else {
        return false;
    };
    if !may_mark(snapshot, actor, &snapshot.notifications[index]) {
        return false;
    }
    snapshot.notifications[index].mark_read_by(&actor.id)
}

/// Records that `teacher` opened the results of evaluation `task_id`.
///
/// Pending personal-copy results are synced first so they are reviewed too.
/// Every result gets `reviewed_at`, and the task's `evaluation_completed`
/// notifications stop targeting the teacher; records left with no target are
/// removed.
pub fn acknowledge_review(
    snapshot: &mut StorageSnapshot,
    teacher: &Actor,
    task_id: &str,
    reviewed_at: i64,
) -> Result<ReviewReport, ReconcileError> {
    let index = snapshot
        .tasks
        .iter()
        .position(|task| task.id == task_id)
        .ok_or_else(|| ReconcileError::UnknownTask(task_id.to_string()))?;
    let task = &snapshot.tasks[index];
    if teacher.role != Role::Admin && !task.is_created_by(&teacher.id) {
        return Err(ReconcileError::NotTaskOwner {
            task_id: task_id.to_string(),
            user_id: teacher.id.clone(),
        });
    }
    if !task.is_evaluation() {
        return Err(ReconcileError::NotAnEvaluation(task_id.to_string()));
    }

    sync_task_results(snapshot, index, RepairScope::Everything);

    let mut report = ReviewReport::default();
    for result in snapshot.tasks[index].results.values_mut() {
        if result.reviewed_at.is_none() {
            result.reviewed_at = Some(reviewed_at);
            report.results_reviewed += 1;
        }
    }

    let before = snapshot.notifications.len();
    snapshot.notifications.retain_mut(|notification| {
        if notification.kind != NotificationKind::EvaluationCompleted
            || notification.task_id != task_id
            || !notification.targets(&teacher.id)
        {
            return true;
        }
        notification.target_ids.retain(|target| *target != teacher.id);
        notification.read_by.remove(&teacher.id);
        notification.sync_read_flag();
        !notification.target_ids.is_empty()
    });
    report.notifications_removed = before - snapshot.notifications.len();

    info!(
        "event=acknowledge_review module=reconcile status=ok actor={} task_id={} results_reviewed={} notifications_removed={}",
        teacher.id, task_id, report.results_reviewed, report.notifications_removed
    );
    Ok(report)
}

fn may_mark(snapshot: &StorageSnapshot, actor: &Actor, notification: &Notification) -> bool {
    if !notification.targets(&actor.id) || notification.is_read_by(&actor.id) {
        return false;
    }
    match notification.kind.read_policy() {
        ReadPolicy::Transient => true,
        ReadPolicy::PendingWork => pending_work_done(snapshot, actor, notification),
        ReadPolicy::ReviewDismissal => false,
    }
}

/// Whether the obligation behind a pending-work notification is gone.
fn pending_work_done(
    snapshot: &StorageSnapshot,
    actor: &Actor,
    notification: &Notification,
) -> bool {
    let Some(task) = snapshot.task(&notification.task_id) else {
        return true;
    };
    match notification.kind {
        NotificationKind::NewTask => {
            !is_assigned(snapshot, task, &actor.id) || is_resolved(snapshot, task, &actor.id)
        }
        NotificationKind::PendingGrading => {
            is_resolved(snapshot, task, &notification.from_user_id)
        }
        _ => false,
    }
}
