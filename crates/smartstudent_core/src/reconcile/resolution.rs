//! Resolution status: has a student finished a task?
//!
//! # Invariants
//! - Evaluation: a result in the global `results` map, or the student's
//!   personal copy is `completed`. Evaluations are reviewed, never graded.
//! - Assignment: the student authored a submission that carries a grade.

use crate::model::comment::Comment;
use crate::model::task::{Task, TaskKind};
use crate::snapshot::StorageSnapshot;

/// Whether `task` is resolved for `student_id`.
pub fn is_resolved(snapshot: &StorageSnapshot, task: &Task, student_id: &str) -> bool {
    match task.kind {
        TaskKind::Evaluation => {
            task.results.contains_key(student_id)
                || snapshot
                    .user_copy(student_id, &task.id)
                    .is_some_and(|copy| copy.is_completed())
        }
        TaskKind::Assignment => snapshot
            .comments_for_task(&task.id)
            .any(|comment| comment.author_id == student_id && comment.is_graded_submission()),
    }
}

/// Whether `student_id` submitted anything for `task_id`.
pub fn has_submitted(snapshot: &StorageSnapshot, task_id: &str, student_id: &str) -> bool {
    snapshot
        .comments_for_task(task_id)
        .any(|comment| comment.is_submission && comment.author_id == student_id)
}

/// Most recent submission of `student_id` for `task_id`.
pub fn latest_submission<'a>(
    snapshot: &'a StorageSnapshot,
    task_id: &str,
    student_id: &str,
) -> Option<&'a Comment> {
    snapshot
        .comments
        .iter()
        .filter(|comment| {
            comment.task_id == task_id && comment.is_submission && comment.author_id == student_id
        })
        .max_by(|left, right| {
            left.created_at
                .cmp(&right.created_at)
                .then_with(|| left.id.cmp(&right.id))
        })
}
