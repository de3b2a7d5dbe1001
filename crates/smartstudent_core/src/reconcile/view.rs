//! Output shapes of a reconciliation pass.

use crate::model::notification::NotificationKind;
use crate::model::task::TaskKind;
use serde::Serialize;

/// Task still waiting on the student.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PendingItem {
    pub task_id: String,
    pub title: String,
    pub course: String,
    pub kind: TaskKind,
    pub due_at: Option<i64>,
    /// The student already submitted; the task waits for a grade.
    pub submitted: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CommentItem {
    pub comment_id: String,
    pub task_id: String,
    pub task_title: String,
    pub author_id: String,
    pub text: String,
    pub created_at: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NotificationItem {
    pub notification_id: String,
    pub kind: NotificationKind,
    pub task_id: String,
    pub task_title: String,
    pub from_user_id: String,
    pub created_at: i64,
    /// Raw records collapsed into this item.
    pub collapsed: usize,
}

/// Evaluation authored by the teacher that some students have not finished.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OpenEvaluationItem {
    pub task_id: String,
    pub title: String,
    pub course: String,
    pub due_at: Option<i64>,
    pub completed: usize,
    pub assigned: usize,
}

/// Latest ungraded submission of one student.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SubmissionItem {
    pub comment_id: String,
    pub task_id: String,
    pub task_title: String,
    pub student_id: String,
    pub submitted_at: i64,
}

/// Finished evaluation the teacher has not reviewed yet.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompletedEvaluationItem {
    pub task_id: String,
    pub task_title: String,
    pub student_id: String,
    pub score: Option<f64>,
    pub completed_at: i64,
}

/// Assignment every target submitted, with grading still outstanding.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompletedTaskItem {
    pub task_id: String,
    pub title: String,
    pub course: String,
    pub last_submission_at: i64,
    pub ungraded: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct StudentView {
    pub pending_evaluations: Vec<PendingItem>,
    pub pending_tasks: Vec<PendingItem>,
    pub unread_comments: Vec<CommentItem>,
    pub notifications: Vec<NotificationItem>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TeacherView {
    pub pending_evaluations: Vec<OpenEvaluationItem>,
    pub pending_grading: Vec<SubmissionItem>,
    pub completed_evaluations: Vec<CompletedEvaluationItem>,
    pub completed_tasks: Vec<CompletedTaskItem>,
    pub unread_comments: Vec<CommentItem>,
    /// Submission and completion events on the teacher's own tasks.
    pub notifications: Vec<NotificationItem>,
}

/// Role-specific notification view.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "role", rename_all = "snake_case")]
pub enum NotificationView {
    Student(StudentView),
    Teacher(TeacherView),
    /// Roles without a notification panel.
    Empty,
}

impl NotificationView {
    pub fn as_student(&self) -> Option<&StudentView> {
        match self {
            Self::Student(view) => Some(view),
            _ => None,
        }
    }

    pub fn as_teacher(&self) -> Option<&TeacherView> {
        match self {
            Self::Teacher(view) => Some(view),
            _ => None,
        }
    }

    /// Badge count: every displayed item across categories.
    pub fn total(&self) -> usize {
        match self {
            Self::Student(view) => {
                view.pending_evaluations.len()
                    + view.pending_tasks.len()
                    + view.unread_comments.len()
                    + view.notifications.len()
            }
            Self::Teacher(view) => {
                view.pending_evaluations.len()
                    + view.pending_grading.len()
                    + view.completed_evaluations.len()
                    + view.completed_tasks.len()
                    + view.unread_comments.len()
                    + view.notifications.len()
            }
            Self::Empty => 0,
        }
    }
}
