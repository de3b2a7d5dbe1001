//! Task domain model.
//!
//! # Responsibility
//! - Define the canonical task record shared by assignments and evaluations.
//! - Hold the global per-student results map for evaluations.
//!
//! # Invariants
//! - `id` is unique across the tasks collection (enforced by repair).
//! - `creator_id` is already normalized to a canonical user id.
//! - `results` is keyed by canonical student id.

use crate::model::user::UserId;
use crate::model::StorageExtras;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Task identifier as recorded in storage.
pub type TaskId = String;

/// Kind of work a task represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskKind {
    /// Regular assignment, resolved by a graded submission.
    Assignment,
    /// Evaluation, resolved by a recorded result. Never graded.
    Evaluation,
}

impl TaskKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Assignment => "assignment",
            Self::Evaluation => "evaluation",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "assignment" | "tarea" => Some(Self::Assignment),
            "evaluation" | "evaluacion" => Some(Self::Evaluation),
            _ => None,
        }
    }
}

/// Who a task is assigned to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssignmentTarget {
    /// Every student enrolled in the task course.
    Course,
    /// Explicit list of canonical student ids.
    Students(Vec<UserId>),
}

/// One student's evaluation result in the global task record.
#[derive(Debug, Clone, PartialEq)]
pub struct StudentResult {
    pub score: Option<f64>,
    /// Unix epoch milliseconds.
    pub completed_at: i64,
    /// Set once the task creator opened the results view.
    pub reviewed_at: Option<i64>,
    pub extra: StorageExtras,
}

impl StudentResult {
    pub fn new(score: Option<f64>, completed_at: i64) -> Self {
        Self {
            score,
            completed_at,
            reviewed_at: None,
            extra: StorageExtras::new(),
        }
    }

    pub fn is_reviewed(&self) -> bool {
        self.reviewed_at.is_some()
    }
}

/// Canonical task record.
#[derive(Debug, Clone, PartialEq)]
pub struct Task {
    pub id: TaskId,
    pub title: String,
    /// Course/section identifier.
    pub course: String,
    pub target: AssignmentTarget,
    pub kind: TaskKind,
    /// Unix epoch milliseconds.
    pub due_at: Option<i64>,
    /// Unix epoch milliseconds.
    pub created_at: i64,
    pub creator_id: UserId,
    pub results: BTreeMap<UserId, StudentResult>,
    pub extra: StorageExtras,
}

impl Task {
    pub fn new(
        id: impl Into<TaskId>,
        title: impl Into<String>,
        course: impl Into<String>,
        kind: TaskKind,
        creator_id: impl Into<UserId>,
    ) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            course: course.into(),
            target: AssignmentTarget::Course,
            kind,
            due_at: None,
            created_at: 0,
            creator_id: creator_id.into(),
            results: BTreeMap::new(),
            extra: StorageExtras::new(),
        }
    }

    pub fn with_students<I, S>(mut self, students: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<UserId>,
    {
        self.target = AssignmentTarget::Students(students.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_due_at(mut self, due_at: i64) -> Self {
        self.due_at = Some(due_at);
        self
    }

    pub fn with_created_at(mut self, created_at: i64) -> Self {
        self.created_at = created_at;
        self
    }

    pub fn is_evaluation(&self) -> bool {
        self.kind == TaskKind::Evaluation
    }

    pub fn is_created_by(&self, user_id: &str) -> bool {
        self.creator_id == user_id
    }
}
