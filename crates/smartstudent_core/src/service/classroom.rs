//! Classroom lifecycle actions.
//!
//! # Responsibility
//! - Apply the writes a user action produces (new task, submission, grade,
//!   comment, finished evaluation, deletion) to a snapshot.
//! - Emit the notifications each action owes its audience.
//!
//! # Invariants
//! - Actions are pure snapshot mutations; persistence is the caller's job.
//! - A failed precondition leaves the snapshot untouched.
//! - Time is passed in, never read from the clock.

use crate::model::comment::{Comment, CommentId};
use crate::model::notification::{Notification, NotificationKind};
use crate::model::task::{AssignmentTarget, StudentResult, Task, TaskId, TaskKind};
use crate::model::user::{Actor, Role, UserId, UNKNOWN_ACTOR};
use crate::model::user_task::{CopyStatus, EvaluationRecord, UserTaskCopy};
use crate::reconcile::assignment::{assigned_students, is_assigned};
use crate::reconcile::resolution::{has_submitted, is_resolved, latest_submission};
use crate::snapshot::StorageSnapshot;
use log::info;
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

/// Precondition failures of classroom actions.
#[derive(Debug, Clone, PartialEq)]
pub enum ClassroomError {
    UnknownTask(TaskId),
    NotAssigned { task_id: TaskId, user_id: UserId },
    NotTaskOwner { task_id: TaskId, user_id: UserId },
    NotPermitted { user_id: UserId, role: Role },
    WrongTaskKind { task_id: TaskId, expected: TaskKind },
    NoSubmission { task_id: TaskId, student_id: UserId },
    AlreadyCompleted { task_id: TaskId, student_id: UserId },
    InvalidInput(String),
}

impl Display for ClassroomError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnknownTask(task_id) => write!(f, "task not found: {task_id}"),
            Self::NotAssigned { task_id, user_id } => {
                write!(f, "task {task_id} is not assigned to {user_id}")
            }
            Self::NotTaskOwner { task_id, user_id } => {
                write!(f, "user {user_id} did not create task {task_id}")
            }
            Self::NotPermitted { user_id, role } => {
                write!(f, "user {user_id} with role {} may not do this", role.as_str())
            }
            Self::WrongTaskKind { task_id, expected } => {
                write!(f, "task {task_id} is not of kind {}", expected.as_str())
            }
            Self::NoSubmission {
                task_id,
                student_id,
            } => write!(f, "{student_id} has no submission for task {task_id}"),
            Self::AlreadyCompleted {
                task_id,
                student_id,
            } => write!(f, "{student_id} already completed task {task_id}"),
            Self::InvalidInput(message) => write!(f, "invalid input: {message}"),
        }
    }
}

impl Error for ClassroomError {}

pub type ClassroomResult<T> = Result<T, ClassroomError>;

/// Request model for a new task or evaluation.
#[derive(Debug, Clone, PartialEq)]
pub struct NewTaskRequest {
    pub title: String,
    pub course: String,
    pub kind: TaskKind,
    pub target: AssignmentTarget,
    pub due_at: Option<i64>,
}

/// Score details of a finished evaluation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EvaluationScore {
    pub score: f64,
    pub correct_answers: Option<u32>,
    pub total_questions: Option<u32>,
}

/// Records removed by [`delete_task`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CascadeReport {
    pub tasks: usize,
    pub user_copies: usize,
    pub comments: usize,
    pub notifications: usize,
    pub evaluation_records: usize,
}

/// Creates a task and notifies its assigned students.
///
/// # Contract
/// - Only teachers and admins create tasks.
/// - Every assigned student gets a pending personal copy.
/// - One `new_task` notification targets all assigned students; none is
///   written when nobody is assigned.
pub fn create_task(
    snapshot: &mut StorageSnapshot,
    creator: &Actor,
    request: NewTaskRequest,
    at: i64,
) -> ClassroomResult<TaskId> {
    if creator.role == Role::Student {
        return Err(ClassroomError::NotPermitted {
            user_id: creator.id.clone(),
            role: creator.role,
        });
    }
    if request.title.trim().is_empty() {
        return Err(ClassroomError::InvalidInput(
            "task title cannot be empty".to_string(),
        ));
    }

    let mut task = Task::new(
        new_id(),
        request.title,
        request.course,
        request.kind,
        creator.id.clone(),
    )
    .with_created_at(at);
    task.target = request.target;
    task.due_at = request.due_at;

    let students = assigned_students(snapshot, &task);
    for student in &students {
        snapshot.upsert_user_copy(student, UserTaskCopy::pending(task.id.clone(), at));
    }
    if !students.is_empty() {
        snapshot.notifications.push(Notification::new(
            new_id(),
            NotificationKind::NewTask,
            task.id.clone(),
            creator.id.clone(),
            students.clone(),
            at,
        ));
    }

    let task_id = task.id.clone();
    snapshot.tasks.push(task);
    info!(
        "event=task_create module=classroom status=ok actor={} task_id={} kind={} assigned={}",
        creator.id,
        task_id,
        request.kind.as_str(),
        students.len()
    );
    Ok(task_id)
}

/// Records a student's submission for an assignment.
///
/// The creator receives `task_submission` and `pending_grading`; when this
/// submission completes the class, a single `task_completed` follows.
pub fn submit_task(
    snapshot: &mut StorageSnapshot,
    student: &Actor,
    task_id: &str,
    text: &str,
    at: i64,
) -> ClassroomResult<CommentId> {
    let task = require_task(snapshot, task_id)?;
    require_kind(task, TaskKind::Assignment)?;
    require_assigned(snapshot, task, student)?;
    let creator_id = task.creator_id.clone();
    let everyone_had_submitted = assigned_students(snapshot, task)
        .iter()
        .all(|id| has_submitted(snapshot, task_id, id));

    let mut comment = Comment::new(new_id(), task_id, student.id.clone(), student.role, text, at)
        .as_submission();
    comment.read_by.insert(student.id.clone());
    let comment_id = comment.id.clone();
    snapshot.comments.push(comment);

    let mut copy = snapshot
        .user_copy(&student.id, task_id)
        .cloned()
        .unwrap_or_else(|| UserTaskCopy::pending(task_id, at));
    if copy.status == CopyStatus::Pending {
        copy.status = CopyStatus::Submitted;
    }
    copy.updated_at = at;
    snapshot.upsert_user_copy(&student.id, copy);

    let everyone_submitted = snapshot.task(task_id).is_some_and(|task| {
        assigned_students(snapshot, task)
            .iter()
            .all(|id| has_submitted(snapshot, task_id, id))
    });

    if creator_id != UNKNOWN_ACTOR {
        for kind in [NotificationKind::TaskSubmission, NotificationKind::PendingGrading] {
            snapshot.notifications.push(Notification::new(
                new_id(),
                kind,
                task_id,
                student.id.clone(),
                vec![creator_id.clone()],
                at,
            ));
        }
        if everyone_submitted && !everyone_had_submitted {
            snapshot.notifications.push(Notification::new(
                new_id(),
                NotificationKind::TaskCompleted,
                task_id,
                student.id.clone(),
                vec![creator_id],
                at,
            ));
        }
    }

    info!(
        "event=task_submit module=classroom status=ok actor={} task_id={} comment_id={}",
        student.id, task_id, comment_id
    );
    Ok(comment_id)
}

/// Grades `student_id`'s latest submission.
///
/// Resolves the student's assignment: the matching `pending_grading`
/// notifications are marked read for the grader, the student's copy
/// completes, and the student receives `grade_received`.
pub fn grade_submission(
    snapshot: &mut StorageSnapshot,
    teacher: &Actor,
    task_id: &str,
    student_id: &str,
    grade: f64,
    at: i64,
) -> ClassroomResult<CommentId> {
    if !grade.is_finite() || grade < 0.0 {
        return Err(ClassroomError::InvalidInput(format!(
            "grade must be a non-negative number, got {grade}"
        )));
    }
    let task = require_task(snapshot, task_id)?;
    require_owner(task, teacher)?;
    require_kind(task, TaskKind::Assignment)?;
    let comment_id = latest_submission(snapshot, task_id, student_id)
        .map(|comment| comment.id.clone())
        .ok_or_else(|| ClassroomError::NoSubmission {
            task_id: task_id.to_string(),
            student_id: student_id.to_string(),
        })?;

    if let Some(comment) = snapshot
        .comments
        .iter_mut()
        .find(|comment| comment.id == comment_id)
    {
        comment.grade = Some(grade);
    }

    for notification in snapshot.notifications.iter_mut().filter(|notification| {
        notification.kind == NotificationKind::PendingGrading
            && notification.task_id == task_id
            && notification.from_user_id == student_id
    }) {
        notification.mark_read_by(&teacher.id);
    }

    snapshot.upsert_user_copy(
        student_id,
        UserTaskCopy::completed(task_id, Some(grade), at),
    );
    snapshot.notifications.push(Notification::new(
        new_id(),
        NotificationKind::GradeReceived,
        task_id,
        teacher.id.clone(),
        vec![student_id.to_string()],
        at,
    ));

    info!(
        "event=task_grade module=classroom status=ok actor={} task_id={} student_id={}",
        teacher.id, task_id, student_id
    );
    Ok(comment_id)
}

/// Adds a discussion comment to a task.
///
/// Students may comment on tasks assigned to them, teachers on tasks they
/// created. A staff comment notifies every assigned student.
pub fn add_comment(
    snapshot: &mut StorageSnapshot,
    author: &Actor,
    task_id: &str,
    text: &str,
    at: i64,
) -> ClassroomResult<CommentId> {
    if text.trim().is_empty() {
        return Err(ClassroomError::InvalidInput(
            "comment text cannot be empty".to_string(),
        ));
    }
    let task = require_task(snapshot, task_id)?;
    let audience = match author.role {
        Role::Student => {
            require_assigned(snapshot, task, author)?;
            Vec::new()
        }
        Role::Teacher | Role::Admin => {
            require_owner(task, author)?;
            assigned_students(snapshot, task)
        }
    };

    let mut comment = Comment::new(new_id(), task_id, author.id.clone(), author.role, text, at);
    comment.read_by.insert(author.id.clone());
    let comment_id = comment.id.clone();
    snapshot.comments.push(comment);

    if !audience.is_empty() {
        snapshot.notifications.push(Notification::new(
            new_id(),
            NotificationKind::TeacherComment,
            task_id,
            author.id.clone(),
            audience,
            at,
        ));
    }

    info!(
        "event=comment_add module=classroom status=ok actor={} task_id={} comment_id={}",
        author.id, task_id, comment_id
    );
    Ok(comment_id)
}

/// Records a finished evaluation in all three places it is read from.
///
/// Writes the student's completed copy, an evaluation record and the global
/// `results` entry, then notifies the creator with `evaluation_completed`.
pub fn finish_evaluation(
    snapshot: &mut StorageSnapshot,
    student: &Actor,
    task_id: &str,
    result: EvaluationScore,
    at: i64,
) -> ClassroomResult<()> {
    if !result.score.is_finite() {
        return Err(ClassroomError::InvalidInput(
            "evaluation score must be a finite number".to_string(),
        ));
    }
    let task = require_task(snapshot, task_id)?;
    require_kind(task, TaskKind::Evaluation)?;
    require_assigned(snapshot, task, student)?;
    if is_resolved(snapshot, task, &student.id) {
        return Err(ClassroomError::AlreadyCompleted {
            task_id: task_id.to_string(),
            student_id: student.id.clone(),
        });
    }
    let creator_id = task.creator_id.clone();

    snapshot.upsert_user_copy(
        &student.id,
        UserTaskCopy::completed(task_id, Some(result.score), at),
    );
    snapshot.evaluation_records.push(
        EvaluationRecord::new(task_id, student.id.clone(), Some(result.score), at)
            .with_answers(result.correct_answers, result.total_questions),
    );
    if let Some(task) = snapshot.task_mut(task_id) {
        task.results.insert(
            student.id.clone(),
            StudentResult::new(Some(result.score), at),
        );
    }
    if creator_id != UNKNOWN_ACTOR {
        snapshot.notifications.push(Notification::new(
            new_id(),
            NotificationKind::EvaluationCompleted,
            task_id,
            student.id.clone(),
            vec![creator_id],
            at,
        ));
    }

    info!(
        "event=evaluation_finish module=classroom status=ok actor={} task_id={}",
        student.id, task_id
    );
    Ok(())
}

/// Deletes a task and every record that references it.
pub fn delete_task(
    snapshot: &mut StorageSnapshot,
    actor: &Actor,
    task_id: &str,
) -> ClassroomResult<CascadeReport> {
    let task = require_task(snapshot, task_id)?;
    require_owner(task, actor)?;

    let mut report = CascadeReport::default();

    let before = snapshot.tasks.len();
    snapshot.tasks.retain(|task| task.id != task_id);
    report.tasks = before - snapshot.tasks.len();

    for copies in snapshot.user_tasks.values_mut() {
        let before = copies.len();
        copies.retain(|copy| copy.task_id != task_id);
        report.user_copies += before - copies.len();
    }

    let before = snapshot.comments.len();
    snapshot.comments.retain(|comment| comment.task_id != task_id);
    report.comments = before - snapshot.comments.len();

    let before = snapshot.notifications.len();
    snapshot
        .notifications
        .retain(|notification| notification.task_id != task_id);
    report.notifications = before - snapshot.notifications.len();

    let before = snapshot.evaluation_records.len();
    snapshot
        .evaluation_records
        .retain(|record| record.task_id != task_id);
    report.evaluation_records = before - snapshot.evaluation_records.len();

    info!(
        "event=task_delete module=classroom status=ok actor={} task_id={} copies={} comments={} notifications={} evaluation_records={}",
        actor.id,
        task_id,
        report.user_copies,
        report.comments,
        report.notifications,
        report.evaluation_records
    );
    Ok(report)
}

fn new_id() -> String {
    Uuid::new_v4().to_string()
}

fn require_task<'a>(snapshot: &'a StorageSnapshot, task_id: &str) -> ClassroomResult<&'a Task> {
    snapshot
        .task(task_id)
        .ok_or_else(|| ClassroomError::UnknownTask(task_id.to_string()))
}

fn require_kind(task: &Task, expected: TaskKind) -> ClassroomResult<()> {
    if task.kind == expected {
        Ok(())
    } else {
        Err(ClassroomError::WrongTaskKind {
            task_id: task.id.clone(),
            expected,
        })
    }
}

fn require_assigned(snapshot: &StorageSnapshot, task: &Task, actor: &Actor) -> ClassroomResult<()> {
    if is_assigned(snapshot, task, &actor.id) {
        Ok(())
    } else {
        Err(ClassroomError::NotAssigned {
            task_id: task.id.clone(),
            user_id: actor.id.clone(),
        })
    }
}

fn require_owner(task: &Task, actor: &Actor) -> ClassroomResult<()> {
    if actor.role == Role::Admin || task.is_created_by(&actor.id) {
        Ok(())
    } else {
        Err(ClassroomError::NotTaskOwner {
            task_id: task.id.clone(),
            user_id: actor.id.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::{add_comment, create_task, submit_task, ClassroomError, NewTaskRequest};
    use crate::model::notification::NotificationKind;
    use crate::model::task::{AssignmentTarget, TaskKind};
    use crate::model::user::{Actor, Role, UserProfile};
    use crate::snapshot::StorageSnapshot;

    fn course_snapshot() -> StorageSnapshot {
        StorageSnapshot {
            users: vec![
                UserProfile::new("t-1", "prof", Role::Teacher).with_courses(["4A"]),
                UserProfile::new("s-1", "ana", Role::Student).with_courses(["4A"]),
                UserProfile::new("s-2", "luis", Role::Student).with_courses(["4B"]),
            ],
            ..StorageSnapshot::default()
        }
    }

    fn request(kind: TaskKind) -> NewTaskRequest {
        NewTaskRequest {
            title: "Fracciones".to_string(),
            course: "4A".to_string(),
            kind,
            target: AssignmentTarget::Course,
            due_at: None,
        }
    }

    #[test]
    fn create_task_targets_only_the_course_students() {
        let mut snapshot = course_snapshot();
        let task_id = create_task(
            &mut snapshot,
            &Actor::teacher("t-1"),
            request(TaskKind::Assignment),
            10,
        )
        .expect("create task");

        assert_eq!(snapshot.notifications.len(), 1);
        let notification = &snapshot.notifications[0];
        assert_eq!(notification.kind, NotificationKind::NewTask);
        assert_eq!(notification.target_ids, vec!["s-1".to_string()]);
        assert!(snapshot.user_copy("s-1", &task_id).is_some());
        assert!(snapshot.user_copy("s-2", &task_id).is_none());
    }

    #[test]
    fn students_cannot_create_tasks() {
        let mut snapshot = course_snapshot();
        let err = create_task(
            &mut snapshot,
            &Actor::student("s-1"),
            request(TaskKind::Assignment),
            10,
        )
        .expect_err("students are rejected");
        assert!(matches!(err, ClassroomError::NotPermitted { .. }));
        assert!(snapshot.tasks.is_empty());
    }

    #[test]
    fn unassigned_students_cannot_submit_or_comment() {
        let mut snapshot = course_snapshot();
        let task_id = create_task(
            &mut snapshot,
            &Actor::teacher("t-1"),
            request(TaskKind::Assignment),
            10,
        )
        .expect("create task");
        let before = snapshot.clone();

        let outsider = Actor::student("s-2");
        assert!(matches!(
            submit_task(&mut snapshot, &outsider, &task_id, "hecho", 20),
            Err(ClassroomError::NotAssigned { .. })
        ));
        assert!(matches!(
            add_comment(&mut snapshot, &outsider, &task_id, "hola", 20),
            Err(ClassroomError::NotAssigned { .. })
        ));
        assert_eq!(snapshot, before);
    }
}
