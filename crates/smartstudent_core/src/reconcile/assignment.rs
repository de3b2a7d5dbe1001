//! Assignment resolution: is a user a target of a task?
//!
//! Every code path that considers a task for a user goes through
//! [`is_assigned`]; nothing else interprets `AssignmentTarget`.

use crate::model::task::{AssignmentTarget, Task};
use crate::model::user::{Role, UserId};
use crate::snapshot::StorageSnapshot;

/// Whether `user_id` is a target of `task`.
///
/// - Course mode: the user profile must list the task course.
/// - Student-list mode: the canonical id must appear in the list.
pub fn is_assigned(snapshot: &StorageSnapshot, task: &Task, user_id: &str) -> bool {
    match &task.target {
        AssignmentTarget::Course => snapshot
            .user(user_id)
            .is_some_and(|user| user.belongs_to(&task.course)),
        AssignmentTarget::Students(students) => students.iter().any(|student| student == user_id),
    }
}

/// Canonical ids of every student `task` is assigned to, in stable order.
pub fn assigned_students(snapshot: &StorageSnapshot, task: &Task) -> Vec<UserId> {
    match &task.target {
        AssignmentTarget::Course => snapshot
            .users
            .iter()
            .filter(|user| user.role == Role::Student && user.belongs_to(&task.course))
            .map(|user| user.id.clone())
            .collect(),
        AssignmentTarget::Students(students) => {
            let mut unique: Vec<UserId> = Vec::with_capacity(students.len());
            for student in students {
                if !unique.contains(student) {
                    unique.push(student.clone());
                }
            }
            unique
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{assigned_students, is_assigned};
    use crate::model::task::{Task, TaskKind};
    use crate::model::user::{Role, UserProfile};
    use crate::snapshot::StorageSnapshot;

    fn snapshot() -> StorageSnapshot {
        StorageSnapshot {
            users: vec![
                UserProfile::new("s-1", "ana", Role::Student).with_courses(["4A"]),
                UserProfile::new("s-2", "luis", Role::Student).with_courses(["4B"]),
                UserProfile::new("t-1", "prof", Role::Teacher).with_courses(["4A"]),
            ],
            ..StorageSnapshot::default()
        }
    }

    #[test]
    fn course_mode_requires_membership() {
        let snapshot = snapshot();
        let task = Task::new("t", "Essay", "4A", TaskKind::Assignment, "t-1");
        assert!(is_assigned(&snapshot, &task, "s-1"));
        assert!(!is_assigned(&snapshot, &task, "s-2"));
        assert!(!is_assigned(&snapshot, &task, "ghost"));
        assert_eq!(assigned_students(&snapshot, &task), vec!["s-1".to_string()]);
    }

    #[test]
    fn student_list_mode_ignores_course() {
        let snapshot = snapshot();
        let task = Task::new("t", "Essay", "4A", TaskKind::Assignment, "t-1")
            .with_students(["s-2", "s-2"]);
        assert!(is_assigned(&snapshot, &task, "s-2"));
        assert!(!is_assigned(&snapshot, &task, "s-1"));
        assert_eq!(assigned_students(&snapshot, &task), vec!["s-2".to_string()]);
    }
}
