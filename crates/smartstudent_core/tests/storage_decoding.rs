use smartstudent_core::model::user::{Actor, Role, UNKNOWN_ACTOR};
use smartstudent_core::snapshot::StorageEntries;
use smartstudent_core::{compute, StorageSnapshot};

const USERS: &str = r#"[
    {"id": "t-1", "username": "prof", "role": "teacher", "activeCourses": ["4A"]},
    {"id": "t-2", "username": "otra", "role": "teacher", "activeCourses": ["4A"]},
    {"id": "s-1", "username": "ana", "role": "student", "activeCourses": ["4A"]}
]"#;

fn entries(pairs: &[(&str, &str)]) -> StorageEntries {
    pairs
        .iter()
        .map(|(key, value)| (key.to_string(), value.to_string()))
        .collect()
}

#[test]
fn malformed_collection_decodes_empty_without_touching_others() {
    let snapshot = StorageSnapshot::from_entries(&entries(&[
        ("smart-student-users", USERS),
        ("smart-student-tasks", "{not json"),
        (
            "smart-student-task-notifications",
            r#"[{"id": "n-1", "type": "new_task", "taskId": "a-1", "fromUserId": "t-1",
                 "targetUserIds": ["s-1"], "timestamp": 1000}]"#,
        ),
    ]));

    assert_eq!(snapshot.users.len(), 3);
    assert!(snapshot.tasks.is_empty());
    assert_eq!(snapshot.notifications.len(), 1);

    // The notification references a task that no longer decodes.
    let view = compute(&snapshot, &Actor::student("s-1"));
    assert_eq!(view.total(), 0);
}

#[test]
fn undecodable_elements_are_dropped_individually() {
    let snapshot = StorageSnapshot::from_entries(&entries(&[
        ("smart-student-users", USERS),
        (
            "smart-student-tasks",
            r#"[42, {"title": "no id"}, {"id": "a-1", "title": "Ensayo", "course": "4A",
                "assignedById": "t-1", "taskType": "tarea"}]"#,
        ),
        ("smart-student-task-comments", r#"{"id": "c-1"}"#),
    ]));

    assert_eq!(snapshot.tasks.len(), 1);
    assert_eq!(snapshot.tasks[0].id, "a-1");
    assert!(snapshot.comments.is_empty());
}

#[test]
fn creator_identity_resolves_through_every_spelling() {
    let snapshot = StorageSnapshot::from_entries(&entries(&[
        ("smart-student-users", USERS),
        (
            "smart-student-tasks",
            r#"[
                {"id": "a-1", "title": "Ensayo", "course": "4A", "assignedBy": "prof"},
                {"id": "a-2", "title": "Mapa", "course": "4A", "assignedById": "t-2"},
                {"id": "a-3", "title": "Lectura", "course": "4A", "createdBy": "PROF"},
                {"id": "a-4", "title": "Huérfana", "course": "4A"}
            ]"#,
        ),
    ]));

    let creators: Vec<&str> = snapshot
        .tasks
        .iter()
        .map(|task| task.creator_id.as_str())
        .collect();
    assert_eq!(creators, vec!["t-1", "t-2", "t-1", UNKNOWN_ACTOR]);
}

#[test]
fn teachers_see_submissions_recorded_under_usernames() {
    let snapshot = StorageSnapshot::from_entries(&entries(&[
        ("smart-student-users", USERS),
        (
            "smart-student-tasks",
            r#"[
                {"id": "a-1", "title": "Ensayo", "course": "4A", "assignedBy": "prof"},
                {"id": "a-2", "title": "Mapa", "course": "4A", "assignedById": "t-2"}
            ]"#,
        ),
        (
            "smart-student-task-comments",
            r#"[
                {"id": "c-1", "taskId": "a-1", "studentUsername": "ana", "comment": "listo",
                 "timestamp": "2024-03-01T10:00:00Z", "isSubmission": true},
                {"id": "c-2", "taskId": "a-2", "authorId": "s-1", "comment": "listo",
                 "timestamp": 6000, "isSubmission": true},
                {"id": "c-3", "taskId": "a-1", "comment": "sin autor", "timestamp": 7000}
            ]"#,
        ),
    ]));

    let c1 = &snapshot.comments[0];
    assert_eq!(c1.author_id, "s-1");
    assert_eq!(c1.author_role, Role::Student);
    assert_eq!(c1.created_at, 1_709_287_200_000);
    assert_eq!(snapshot.comments[2].author_id, UNKNOWN_ACTOR);

    let view = compute(&snapshot, &Actor::teacher("t-1"));
    let grading = &view.as_teacher().unwrap().pending_grading;
    assert_eq!(grading.len(), 1);
    assert_eq!(grading[0].comment_id, "c-1");
}

#[test]
fn stored_read_flag_is_recomputed_from_read_by() {
    let snapshot = StorageSnapshot::from_entries(&entries(&[
        ("smart-student-users", USERS),
        (
            "smart-student-task-notifications",
            r#"[{"id": "n-1", "type": "grade_received", "taskId": "a-1", "fromUserId": "t-1",
                 "targetUserIds": ["s-1"], "readBy": ["ana"], "read": false, "timestamp": 1000}]"#,
        ),
    ]));

    let notification = &snapshot.notifications[0];
    assert!(notification.is_read_by("s-1"));
    assert!(notification.read);
}

#[test]
fn snapshot_survives_an_encode_decode_cycle() {
    let snapshot = StorageSnapshot::from_entries(&entries(&[
        ("smart-student-users", USERS),
        (
            "smart-student-tasks",
            r#"[{"id": "e-1", "title": "Quiz", "course": "4A", "assignedBy": "prof",
                 "taskType": "evaluacion", "dueDate": "2024-03-10",
                 "evaluationResults": {"ana": {"score": "85", "completedAt": 5000}}}]"#,
        ),
        (
            "userTasks_ana",
            r#"[{"taskId": "e-1", "status": "completed", "score": 85, "completedAt": 5000}]"#,
        ),
    ]));

    let task = snapshot.task("e-1").unwrap();
    assert!(task.is_evaluation());
    assert_eq!(task.results["s-1"].score, Some(85.0));
    assert!(task.due_at.is_some());

    let encoded = snapshot.to_entries().unwrap();
    assert_eq!(StorageSnapshot::from_entries(&encoded), snapshot);
}
