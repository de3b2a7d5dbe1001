//! Per-user task copies and evaluation records.
//!
//! # Responsibility
//! - Model the per-user duplicate of a task that holds that user's status.
//! - Model the detailed evaluation results collection.
//!
//! # Invariants
//! - A copy is keyed by `(owner, task_id)`; the owner is implied by the
//!   storage key the copy lives under.

use crate::model::task::TaskId;
use crate::model::user::UserId;
use crate::model::StorageExtras;
use serde::{Deserialize, Serialize};

/// Completion state of a task from one user's point of view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CopyStatus {
    Pending,
    Submitted,
    Completed,
}

impl CopyStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Submitted => "submitted",
            Self::Completed => "completed",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "pending" => Some(Self::Pending),
            "submitted" | "delivered" => Some(Self::Submitted),
            "completed" | "finished" | "reviewed" => Some(Self::Completed),
            _ => None,
        }
    }
}

/// One user's local copy of a task.
#[derive(Debug, Clone, PartialEq)]
pub struct UserTaskCopy {
    pub task_id: TaskId,
    pub status: CopyStatus,
    pub score: Option<f64>,
    /// Unix epoch milliseconds.
    pub completed_at: Option<i64>,
    /// Unix epoch milliseconds.
    pub updated_at: i64,
    pub extra: StorageExtras,
}

impl UserTaskCopy {
    pub fn pending(task_id: impl Into<TaskId>, updated_at: i64) -> Self {
        Self {
            task_id: task_id.into(),
            status: CopyStatus::Pending,
            score: None,
            completed_at: None,
            updated_at,
            extra: StorageExtras::new(),
        }
    }

    pub fn completed(task_id: impl Into<TaskId>, score: Option<f64>, completed_at: i64) -> Self {
        Self {
            task_id: task_id.into(),
            status: CopyStatus::Completed,
            score,
            completed_at: Some(completed_at),
            updated_at: completed_at,
            extra: StorageExtras::new(),
        }
    }

    pub fn is_completed(&self) -> bool {
        self.status == CopyStatus::Completed
    }

    /// Completion time, falling back to the last update.
    pub fn completion_time(&self) -> i64 {
        self.completed_at.unwrap_or(self.updated_at)
    }
}

/// Detailed evaluation attempt stored in the evaluation results collection.
#[derive(Debug, Clone, PartialEq)]
pub struct EvaluationRecord {
    pub task_id: TaskId,
    pub student_id: UserId,
    pub score: Option<f64>,
    pub correct_answers: Option<u32>,
    pub total_questions: Option<u32>,
    /// Unix epoch milliseconds.
    pub completed_at: i64,
    pub extra: StorageExtras,
}

impl EvaluationRecord {
    pub fn new(
        task_id: impl Into<TaskId>,
        student_id: impl Into<UserId>,
        score: Option<f64>,
        completed_at: i64,
    ) -> Self {
        Self {
            task_id: task_id.into(),
            student_id: student_id.into(),
            score,
            correct_answers: None,
            total_questions: None,
            completed_at,
            extra: StorageExtras::new(),
        }
    }

    pub fn with_answers(mut self, correct: Option<u32>, total: Option<u32>) -> Self {
        self.correct_answers = correct;
        self.total_questions = total;
        self
    }
}
