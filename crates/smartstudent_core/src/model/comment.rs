//! Task comment and submission records.

use crate::model::task::TaskId;
use crate::model::user::{Role, UserId};
use crate::model::StorageExtras;
use std::collections::BTreeSet;

pub type CommentId = String;

/// Canonical comment record.
///
/// Submissions are comments with `is_submission = true`; a teacher grade is
/// attached to the submission itself.
#[derive(Debug, Clone, PartialEq)]
pub struct Comment {
    pub id: CommentId,
    pub task_id: TaskId,
    pub author_id: UserId,
    pub author_role: Role,
    pub text: String,
    /// Unix epoch milliseconds.
    pub created_at: i64,
    pub is_submission: bool,
    pub grade: Option<f64>,
    pub read_by: BTreeSet<UserId>,
    pub extra: StorageExtras,
}

impl Comment {
    pub fn new(
        id: impl Into<CommentId>,
        task_id: impl Into<TaskId>,
        author_id: impl Into<UserId>,
        author_role: Role,
        text: impl Into<String>,
        created_at: i64,
    ) -> Self {
        Self {
            id: id.into(),
            task_id: task_id.into(),
            author_id: author_id.into(),
            author_role,
            text: text.into(),
            created_at,
            is_submission: false,
            grade: None,
            read_by: BTreeSet::new(),
            extra: StorageExtras::new(),
        }
    }

    /// Turns this comment into a submission.
    pub fn as_submission(mut self) -> Self {
        self.is_submission = true;
        self
    }

    pub fn with_grade(mut self, grade: f64) -> Self {
        self.grade = Some(grade);
        self
    }

    pub fn is_graded_submission(&self) -> bool {
        self.is_submission && self.grade.is_some()
    }

    pub fn is_read_by(&self, user_id: &str) -> bool {
        self.read_by.contains(user_id)
    }
}
