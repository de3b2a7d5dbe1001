//! Read-only reconciliation query.
//!
//! # Responsibility
//! - Build the per-role notification view from a snapshot.
//!
//! # Invariants
//! - Never mutates the snapshot; repairs live in `repair`.
//! - Records that reference a missing task are skipped silently.
//! - Teachers only see work on tasks whose canonical creator is them, and
//!   only from students assigned to those tasks.

use super::assignment::{assigned_students, is_assigned};
use super::dedup::collapse_duplicates;
use super::resolution::{has_submitted, is_resolved, latest_submission};
use super::view::{
    CommentItem, CompletedEvaluationItem, CompletedTaskItem, NotificationItem, NotificationView,
    OpenEvaluationItem, PendingItem, StudentView, SubmissionItem, TeacherView,
};
use super::ReconcileOptions;
use crate::model::comment::Comment;
use crate::model::notification::{Notification, NotificationKind};
use crate::model::task::{Task, TaskKind};
use crate::model::user::{Actor, Role, UserId};
use crate::snapshot::StorageSnapshot;
use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};

pub(crate) fn compute_view(
    snapshot: &StorageSnapshot,
    actor: &Actor,
    options: &ReconcileOptions,
) -> NotificationView {
    match actor.role {
        Role::Student => NotificationView::Student(student_view(snapshot, actor, options)),
        Role::Teacher => NotificationView::Teacher(teacher_view(snapshot, actor, options)),
        Role::Admin => NotificationView::Empty,
    }
}

/// Whether `comment` is a discussion comment `actor` should be told about.
///
/// Students hear about staff comments on their tasks; teachers about student
/// comments on tasks they created. Submissions are never discussion items.
pub(crate) fn is_watched_comment(
    snapshot: &StorageSnapshot,
    actor: &Actor,
    task: &Task,
    comment: &Comment,
) -> bool {
    if comment.is_submission || comment.author_id == actor.id {
        return false;
    }
    match actor.role {
        Role::Student => {
            comment.author_role != Role::Student && is_assigned(snapshot, task, &actor.id)
        }
        Role::Teacher => {
            comment.author_role == Role::Student
                && task.is_created_by(&actor.id)
                && is_assigned(snapshot, task, &comment.author_id)
        }
        Role::Admin => false,
    }
}

fn student_view(
    snapshot: &StorageSnapshot,
    actor: &Actor,
    options: &ReconcileOptions,
) -> StudentView {
    let mut view = StudentView::default();

    for task in &snapshot.tasks {
        if !is_assigned(snapshot, task, &actor.id) || is_resolved(snapshot, task, &actor.id) {
            continue;
        }
        let item = PendingItem {
            task_id: task.id.clone(),
            title: task.title.clone(),
            course: task.course.clone(),
            kind: task.kind,
            due_at: task.due_at,
            submitted: task.kind == TaskKind::Assignment
                && has_submitted(snapshot, &task.id, &actor.id),
        };
        match task.kind {
            TaskKind::Evaluation => view.pending_evaluations.push(item),
            TaskKind::Assignment => view.pending_tasks.push(item),
        }
    }
    view.pending_evaluations.sort_by(pending_order);
    view.pending_tasks.sort_by(pending_order);

    view.unread_comments = unread_comments(snapshot, actor);

    let candidates = snapshot
        .notifications
        .iter()
        .filter(|notification| {
            notification.targets(&actor.id) && !notification.is_read_by(&actor.id)
        })
        .filter(|notification| {
            let Some(task) = snapshot.task(&notification.task_id) else {
                return false;
            };
            if !is_assigned(snapshot, task, &actor.id) {
                return false;
            }
            match notification.kind {
                NotificationKind::NewTask => !is_resolved(snapshot, task, &actor.id),
                NotificationKind::TeacherComment | NotificationKind::GradeReceived => true,
                _ => false,
            }
        })
        .collect();
    view.notifications = notification_items(snapshot, candidates, options);

    view
}

fn teacher_view(
    snapshot: &StorageSnapshot,
    actor: &Actor,
    options: &ReconcileOptions,
) -> TeacherView {
    let mut view = TeacherView::default();

    for task in snapshot
        .tasks
        .iter()
        .filter(|task| task.is_created_by(&actor.id))
    {
        match task.kind {
            TaskKind::Evaluation => collect_evaluation(snapshot, task, &mut view),
            TaskKind::Assignment => collect_assignment(snapshot, task, &mut view),
        }
    }

    view.pending_evaluations.sort_by(|left, right| {
        soonest_due(
            (left.due_at, &left.task_id),
            (right.due_at, &right.task_id),
        )
    });
    view.pending_grading.sort_by(|left, right| {
        newest_first(
            (left.submitted_at, &left.comment_id),
            (right.submitted_at, &right.comment_id),
        )
    });
    view.completed_evaluations.sort_by(|left, right| {
        newest_first(
            (left.completed_at, &left.task_id),
            (right.completed_at, &right.task_id),
        )
        .then_with(|| left.student_id.cmp(&right.student_id))
    });
    view.completed_tasks.sort_by(|left, right| {
        newest_first(
            (left.last_submission_at, &left.task_id),
            (right.last_submission_at, &right.task_id),
        )
    });
    view.unread_comments = unread_comments(snapshot, actor);

    let candidates = snapshot
        .notifications
        .iter()
        .filter(|notification| {
            notification.targets(&actor.id) && !notification.is_read_by(&actor.id)
        })
        .filter(|notification| {
            let Some(task) = snapshot.task(&notification.task_id) else {
                return false;
            };
            let student = notification.from_user_id.as_str();
            if !task.is_created_by(&actor.id) || !is_assigned(snapshot, task, student) {
                return false;
            }
            match notification.kind {
                NotificationKind::PendingGrading => !is_resolved(snapshot, task, student),
                NotificationKind::TaskSubmission | NotificationKind::TaskCompleted => true,
                _ => false,
            }
        })
        .collect();
    view.notifications = notification_items(snapshot, candidates, options);

    view
}

/// Collapses duplicate records into display items, newest first.
fn notification_items(
    snapshot: &StorageSnapshot,
    candidates: Vec<&Notification>,
    options: &ReconcileOptions,
) -> Vec<NotificationItem> {
    let mut items: Vec<NotificationItem> =
        collapse_duplicates(candidates, options.dedup_window_ms)
            .into_iter()
            .map(|(notification, collapsed)| NotificationItem {
                notification_id: notification.id.clone(),
                kind: notification.kind,
                task_id: notification.task_id.clone(),
                task_title: task_title(snapshot, &notification.task_id),
                from_user_id: notification.from_user_id.clone(),
                created_at: notification.created_at,
                collapsed,
            })
            .collect();
    items.sort_by(|left, right| {
        newest_first(
            (left.created_at, &left.notification_id),
            (right.created_at, &right.notification_id),
        )
    });
    items
}

fn collect_evaluation(snapshot: &StorageSnapshot, task: &Task, view: &mut TeacherView) {
    let assigned = assigned_students(snapshot, task);
    let completed = assigned
        .iter()
        .filter(|student| is_resolved(snapshot, task, student))
        .count();
    if completed < assigned.len() {
        view.pending_evaluations.push(OpenEvaluationItem {
            task_id: task.id.clone(),
            title: task.title.clone(),
            course: task.course.clone(),
            due_at: task.due_at,
            completed,
            assigned: assigned.len(),
        });
    }

    // Global results first; personal copies only fill gaps not yet synced.
    let mut finished: BTreeMap<UserId, (Option<f64>, i64)> = BTreeMap::new();
    for (student, result) in &task.results {
        if !result.is_reviewed() && assigned.contains(student) {
            finished.insert(student.clone(), (result.score, result.completed_at));
        }
    }
    for (owner, copies) in &snapshot.user_tasks {
        if task.results.contains_key(owner) || !assigned.contains(owner) {
            continue;
        }
        if let Some(copy) = copies
            .iter()
            .find(|copy| copy.task_id == task.id && copy.is_completed())
        {
            finished.insert(owner.clone(), (copy.score, copy.completion_time()));
        }
    }

    view.completed_evaluations
        .extend(
            finished
                .into_iter()
                .map(|(student_id, (score, completed_at))| CompletedEvaluationItem {
                    task_id: task.id.clone(),
                    task_title: task.title.clone(),
                    student_id,
                    score,
                    completed_at,
                }),
        );
}

fn collect_assignment(snapshot: &StorageSnapshot, task: &Task, view: &mut TeacherView) {
    let assigned = assigned_students(snapshot, task);
    let submitters: BTreeSet<&str> = snapshot
        .comments_for_task(&task.id)
        .filter(|comment| comment.is_submission && comment.author_role == Role::Student)
        .map(|comment| comment.author_id.as_str())
        .filter(|author| assigned.iter().any(|student| student == author))
        .collect();

    for student in &submitters {
        if is_resolved(snapshot, task, student) {
            continue;
        }
        if let Some(submission) = latest_submission(snapshot, &task.id, student) {
            view.pending_grading.push(SubmissionItem {
                comment_id: submission.id.clone(),
                task_id: task.id.clone(),
                task_title: task.title.clone(),
                student_id: submission.author_id.clone(),
                submitted_at: submission.created_at,
            });
        }
    }

    if assigned.is_empty()
        || !assigned
            .iter()
            .all(|student| submitters.contains(student.as_str()))
    {
        return;
    }
    let ungraded = assigned
        .iter()
        .filter(|student| !is_resolved(snapshot, task, student))
        .count();
    if ungraded == 0 {
        return;
    }
    let last_submission_at = snapshot
        .comments_for_task(&task.id)
        .filter(|comment| comment.is_submission && submitters.contains(comment.author_id.as_str()))
        .map(|comment| comment.created_at)
        .max()
        .unwrap_or(task.created_at);
    view.completed_tasks.push(CompletedTaskItem {
        task_id: task.id.clone(),
        title: task.title.clone(),
        course: task.course.clone(),
        last_submission_at,
        ungraded,
    });
}

fn unread_comments(snapshot: &StorageSnapshot, actor: &Actor) -> Vec<CommentItem> {
    let mut items: Vec<CommentItem> = snapshot
        .comments
        .iter()
        .filter(|comment| !comment.is_read_by(&actor.id))
        .filter_map(|comment| {
            let task = snapshot.task(&comment.task_id)?;
            is_watched_comment(snapshot, actor, task, comment).then(|| CommentItem {
                comment_id: comment.id.clone(),
                task_id: task.id.clone(),
                task_title: task.title.clone(),
                author_id: comment.author_id.clone(),
                text: comment.text.clone(),
                created_at: comment.created_at,
            })
        })
        .collect();
    items.sort_by(|left, right| {
        newest_first(
            (left.created_at, &left.comment_id),
            (right.created_at, &right.comment_id),
        )
    });
    items
}

fn task_title(snapshot: &StorageSnapshot, task_id: &str) -> String {
    snapshot
        .task(task_id)
        .map(|task| task.title.clone())
        .unwrap_or_default()
}

fn pending_order(left: &PendingItem, right: &PendingItem) -> Ordering {
    soonest_due((left.due_at, &left.task_id), (right.due_at, &right.task_id))
}

fn newest_first(left: (i64, &String), right: (i64, &String)) -> Ordering {
    right.0.cmp(&left.0).then_with(|| left.1.cmp(right.1))
}

/// Soonest due date first; undated items last.
fn soonest_due(left: (Option<i64>, &String), right: (Option<i64>, &String)) -> Ordering {
    match (left.0, right.0) {
        (Some(a), Some(b)) => a.cmp(&b),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
    .then_with(|| left.1.cmp(right.1))
}
