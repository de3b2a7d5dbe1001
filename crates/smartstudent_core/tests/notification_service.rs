use smartstudent_core::db::open_db_in_memory;
use smartstudent_core::model::notification::NotificationKind;
use smartstudent_core::model::task::{AssignmentTarget, TaskKind};
use smartstudent_core::model::user::Actor;
use smartstudent_core::model::user_task::CopyStatus;
use smartstudent_core::repo::snapshot_repo::{commit_snapshot, load_snapshot};
use smartstudent_core::service::classroom::{
    add_comment, create_task, delete_task, finish_evaluation, grade_submission, submit_task,
    ClassroomError, EvaluationScore, NewTaskRequest,
};
use smartstudent_core::{
    KvRepository, MemoryKvRepository, NotificationService, RefreshTrigger, RepoError, RepoResult,
    ServiceError, SqliteKvRepository, StorageSnapshot,
};

const USERS: &str = r#"[
    {"id": "t-1", "username": "prof", "role": "teacher", "activeCourses": ["4A"]},
    {"id": "t-2", "username": "otra", "role": "teacher", "activeCourses": ["4A"]},
    {"id": "s-1", "username": "ana", "role": "student", "activeCourses": ["4A"]},
    {"id": "s-2", "username": "luis", "role": "student", "activeCourses": ["4A"]}
]"#;

fn seeded_repo() -> MemoryKvRepository {
    let repo = MemoryKvRepository::new();
    repo.set("smart-student-users", USERS).unwrap();
    repo
}

fn request(kind: TaskKind) -> NewTaskRequest {
    NewTaskRequest {
        title: "Ensayo".to_string(),
        course: "4A".to_string(),
        kind,
        target: AssignmentTarget::Course,
        due_at: Some(100_000),
    }
}

fn count_kind(snapshot: &StorageSnapshot, kind: NotificationKind) -> usize {
    snapshot
        .notifications
        .iter()
        .filter(|notification| notification.kind == kind)
        .count()
}

/// Fails every write to one key; everything else goes to memory.
struct FlakyRepo {
    inner: MemoryKvRepository,
    failing_key: &'static str,
}

impl KvRepository for FlakyRepo {
    fn get(&self, key: &str) -> RepoResult<Option<String>> {
        self.inner.get(key)
    }

    fn set(&self, key: &str, value: &str) -> RepoResult<()> {
        if key == self.failing_key {
            return Err(RepoError::NotReady("quota exceeded".to_string()));
        }
        self.inner.set(key, value)
    }

    fn remove(&self, key: &str) -> RepoResult<bool> {
        self.inner.remove(key)
    }

    fn keys(&self) -> RepoResult<Vec<String>> {
        self.inner.keys()
    }
}

#[test]
fn assignment_lifecycle_flows_through_every_view() {
    let service = NotificationService::new(seeded_repo());
    let teacher = Actor::teacher("t-1");
    let ana = Actor::student("s-1");
    let luis = Actor::student("s-2");

    let (task_id, commit) = service
        .apply(|snapshot| create_task(snapshot, &teacher, request(TaskKind::Assignment), 1_000))
        .unwrap();
    assert!(commit.written.contains(&"smart-student-tasks".to_string()));
    assert!(commit.written.contains(&"userTasks_s-1".to_string()));

    let view = service.view(&ana).unwrap();
    let student = view.as_student().unwrap();
    assert_eq!(student.pending_tasks.len(), 1);
    assert_eq!(student.notifications.len(), 1);
    assert_eq!(student.notifications[0].kind, NotificationKind::NewTask);

    service
        .apply(|snapshot| submit_task(snapshot, &ana, &task_id, "mi ensayo", 2_000))
        .unwrap();
    let teacher_view = service.view(&teacher).unwrap();
    assert_eq!(teacher_view.as_teacher().unwrap().pending_grading.len(), 1);

    service
        .apply(|snapshot| submit_task(snapshot, &luis, &task_id, "el mío", 2_500))
        .unwrap();
    service
        .apply(|snapshot| submit_task(snapshot, &luis, &task_id, "corregido", 2_600))
        .unwrap();
    let snapshot = service.snapshot().unwrap();
    assert_eq!(count_kind(&snapshot, NotificationKind::TaskCompleted), 1);
    assert_eq!(
        snapshot.user_copy("s-2", &task_id).unwrap().status,
        CopyStatus::Submitted
    );
    let teacher_view = service.view(&teacher).unwrap();
    let teacher_view = teacher_view.as_teacher().unwrap();
    assert_eq!(teacher_view.pending_grading.len(), 2);
    assert_eq!(teacher_view.completed_tasks.len(), 1);

    service
        .apply(|snapshot| grade_submission(snapshot, &teacher, &task_id, "s-1", 9.0, 3_000))
        .unwrap();
    let snapshot = service.snapshot().unwrap();
    let copy = snapshot.user_copy("s-1", &task_id).unwrap();
    assert_eq!(copy.status, CopyStatus::Completed);
    assert_eq!(copy.score, Some(9.0));
    assert!(snapshot
        .notifications
        .iter()
        .filter(|notification| notification.kind == NotificationKind::PendingGrading
            && notification.from_user_id == "s-1")
        .all(|notification| notification.is_read_by("t-1")));

    let view = service.view(&ana).unwrap();
    let student = view.as_student().unwrap();
    assert!(student.pending_tasks.is_empty());
    assert_eq!(student.notifications.len(), 1);
    assert_eq!(student.notifications[0].kind, NotificationKind::GradeReceived);

    let first = service.refresh(RefreshTrigger::StorageChanged, &ana).unwrap();
    assert_eq!(first.repair.new_task_retired, 1);
    assert!(first
        .commit
        .written
        .contains(&"smart-student-task-notifications".to_string()));
    let second = service.refresh(RefreshTrigger::Focus, &ana).unwrap();
    assert!(second.commit.is_noop());
    assert!(!second.repair.changed());

    let report = service.mark_all_read(&ana).unwrap();
    assert_eq!(report.notifications_marked, 1);
    assert_eq!(service.view(&ana).unwrap().total(), 0);
}

#[test]
fn staff_comments_notify_assigned_students() {
    let service = NotificationService::new(seeded_repo());
    let teacher = Actor::teacher("t-1");
    let (task_id, _) = service
        .apply(|snapshot| create_task(snapshot, &teacher, request(TaskKind::Assignment), 1_000))
        .unwrap();

    service
        .apply(|snapshot| add_comment(snapshot, &teacher, &task_id, "revisen la rúbrica", 1_500))
        .unwrap();
    let view = service.view(&Actor::student("s-2")).unwrap();
    let student = view.as_student().unwrap();
    assert_eq!(student.unread_comments.len(), 1);
    assert!(student
        .notifications
        .iter()
        .any(|item| item.kind == NotificationKind::TeacherComment));

    let err = service
        .apply(|snapshot| add_comment(snapshot, &Actor::teacher("t-2"), &task_id, "hola", 1_600))
        .unwrap_err();
    assert!(matches!(
        err,
        ServiceError::Classroom(ClassroomError::NotTaskOwner { .. })
    ));
}

#[test]
fn evaluation_lifecycle_ends_with_review() {
    let service = NotificationService::new(seeded_repo());
    let teacher = Actor::teacher("t-1");
    let ana = Actor::student("s-1");
    let score = EvaluationScore {
        score: 80.0,
        correct_answers: Some(8),
        total_questions: Some(10),
    };

    let (task_id, _) = service
        .apply(|snapshot| create_task(snapshot, &teacher, request(TaskKind::Evaluation), 1_000))
        .unwrap();
    service
        .apply(|snapshot| finish_evaluation(snapshot, &ana, &task_id, score, 5_000))
        .unwrap();

    let snapshot = service.snapshot().unwrap();
    assert_eq!(snapshot.task(&task_id).unwrap().results["s-1"].score, Some(80.0));
    assert_eq!(snapshot.evaluation_records.len(), 1);
    assert_eq!(count_kind(&snapshot, NotificationKind::EvaluationCompleted), 1);

    let teacher_view = service.view(&teacher).unwrap();
    let teacher_view = teacher_view.as_teacher().unwrap();
    assert_eq!(teacher_view.completed_evaluations.len(), 1);
    assert_eq!(teacher_view.pending_evaluations[0].completed, 1);

    let before = service.repo().entries().unwrap();
    let err = service
        .apply(|snapshot| finish_evaluation(snapshot, &ana, &task_id, score, 6_000))
        .unwrap_err();
    assert!(matches!(
        err,
        ServiceError::Classroom(ClassroomError::AlreadyCompleted { .. })
    ));
    assert_eq!(service.repo().entries().unwrap(), before);

    let marked = service.mark_all_read(&teacher).unwrap();
    assert_eq!(marked.notifications_marked, 0);

    let review = service.acknowledge_review(&teacher, &task_id, 7_000).unwrap();
    assert_eq!(review.results_reviewed, 1);
    assert_eq!(review.notifications_removed, 1);
    let after = service.refresh(RefreshTrigger::VisibilityChanged, &teacher).unwrap();
    assert!(after.view.as_teacher().unwrap().completed_evaluations.is_empty());
    assert_eq!(after.repair.notifications_created, 0);
}

#[test]
fn delete_task_cascades_across_collections() {
    let service = NotificationService::new(seeded_repo());
    let teacher = Actor::teacher("t-1");
    let ana = Actor::student("s-1");
    let (task_id, _) = service
        .apply(|snapshot| create_task(snapshot, &teacher, request(TaskKind::Assignment), 1_000))
        .unwrap();
    service
        .apply(|snapshot| submit_task(snapshot, &ana, &task_id, "hecho", 2_000))
        .unwrap();
    service
        .apply(|snapshot| add_comment(snapshot, &teacher, &task_id, "bien", 2_500))
        .unwrap();

    let err = service
        .apply(|snapshot| delete_task(snapshot, &Actor::teacher("t-2"), &task_id))
        .unwrap_err();
    assert!(matches!(
        err,
        ServiceError::Classroom(ClassroomError::NotTaskOwner { .. })
    ));

    let (report, commit) = service
        .apply(|snapshot| delete_task(snapshot, &teacher, &task_id))
        .unwrap();
    assert!(commit.is_complete());
    assert_eq!(report.tasks, 1);
    assert_eq!(report.user_copies, 2);
    assert_eq!(report.comments, 2);
    assert_eq!(report.notifications, 4);

    let snapshot = service.snapshot().unwrap();
    assert!(snapshot.task(&task_id).is_none());
    assert!(snapshot.comments.is_empty());
    assert!(snapshot.notifications.is_empty());
    assert!(snapshot.user_copy("s-1", &task_id).is_none());
}

#[test]
fn partial_commit_keeps_going_and_orphans_stay_hidden() {
    let inner = seeded_repo();
    let service = NotificationService::new(FlakyRepo {
        inner,
        failing_key: "smart-student-task-comments",
    });
    let teacher = Actor::teacher("t-1");
    let ana = Actor::student("s-1");

    // Seed through the inner store so the comment write succeeds once.
    let mut seeded = load_snapshot(&service.repo().inner).unwrap();
    let task_id = create_task(&mut seeded, &teacher, request(TaskKind::Assignment), 1_000).unwrap();
    submit_task(&mut seeded, &ana, &task_id, "hecho", 2_000).unwrap();
    let seed_commit =
        commit_snapshot(&service.repo().inner, &StorageSnapshot::default(), &seeded).unwrap();
    assert!(seed_commit.is_complete());

    let (report, commit) = service
        .apply(|snapshot| delete_task(snapshot, &teacher, &task_id))
        .unwrap();
    assert_eq!(report.comments, 1);
    assert!(!commit.is_complete());
    assert_eq!(commit.failed.len(), 1);
    assert_eq!(commit.failed[0].0, "smart-student-task-comments");
    assert!(commit.written.contains(&"smart-student-tasks".to_string()));

    let snapshot = service.snapshot().unwrap();
    assert!(snapshot.task(&task_id).is_none());
    assert_eq!(snapshot.comments.len(), 1, "comment write was lost");

    let view = service.view(&teacher).unwrap();
    assert_eq!(view.total(), 0);
}

#[test]
fn commit_writes_only_changed_collections() {
    let repo = seeded_repo();
    let before = load_snapshot(&repo).unwrap();
    let teacher = Actor::teacher("t-1");
    let mut after = before.clone();
    create_task(&mut after, &teacher, request(TaskKind::Assignment), 1_000).unwrap();
    commit_snapshot(&repo, &before, &after).unwrap();

    let before = load_snapshot(&repo).unwrap();
    let mut after = before.clone();
    after.notifications[0].mark_read_by("s-1");
    let report = commit_snapshot(&repo, &before, &after).unwrap();
    assert_eq!(
        report.written,
        vec!["smart-student-task-notifications".to_string()]
    );
}

#[test]
fn sqlite_store_persists_repaired_results() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteKvRepository::try_new(&conn).unwrap();
    repo.set("smart-student-users", USERS).unwrap();
    repo.set(
        "smart-student-tasks",
        r#"[{"id": "e-1", "title": "Quiz", "course": "4A", "assignedBy": "prof",
             "taskType": "evaluation"}]"#,
    )
    .unwrap();
    repo.set(
        "userTasks_ana",
        r#"[{"taskId": "e-1", "status": "completed", "score": 90, "completedAt": 7000}]"#,
    )
    .unwrap();

    let service = NotificationService::new(repo);
    let teacher = Actor::teacher("t-1");
    let outcome = service.refresh(RefreshTrigger::Manual, &teacher).unwrap();
    assert_eq!(outcome.repair.results_synced, 1);
    assert!(outcome.commit.is_complete());
    assert!(!outcome.commit.written.contains(&"userTasks_ana".to_string()));

    let stored = service.snapshot().unwrap();
    assert_eq!(stored.task("e-1").unwrap().results["s-1"].score, Some(90.0));
    let completed = &outcome.view.as_teacher().unwrap().completed_evaluations;
    assert_eq!(completed.len(), 1);
}

#[test]
fn refresh_keeps_fields_and_elements_it_does_not_understand() {
    let repo = seeded_repo();
    repo.set(
        "smart-student-tasks",
        r#"[{"id": "e-1", "title": "Quiz", "course": "4A", "assignedBy": "prof",
             "taskType": "evaluation", "description": "Capitulo 3", "subject": "Math"},
            {"id": "x", "title": 5}]"#,
    )
    .unwrap();
    repo.set(
        "smart-student-task-notifications",
        r#"[{"id": "n-1", "type": "new_task", "taskId": "e-1", "fromUsername": "prof",
             "targetUserIds": ["s-1", "s-2"], "taskTitle": "Quiz", "timestamp": 1000},
            {"id": "n-2", "type": "mystery", "taskId": "e-1"}]"#,
    )
    .unwrap();
    repo.set(
        "userTasks_s-1",
        r#"[{"taskId": "e-1", "status": "completed", "score": 70, "completedAt": 5000,
             "answers": [1, 3]}]"#,
    )
    .unwrap();

    let service = NotificationService::new(repo);
    let outcome = service
        .refresh(RefreshTrigger::Focus, &Actor::teacher("t-1"))
        .unwrap();
    assert_eq!(outcome.repair.results_synced, 1);
    assert!(outcome
        .commit
        .written
        .contains(&"smart-student-tasks".to_string()));

    let raw = |key: &str| -> Vec<serde_json::Value> {
        let stored = service.repo().get(key).unwrap().unwrap();
        serde_json::from_str(&stored).unwrap()
    };

    let tasks = raw("smart-student-tasks");
    assert_eq!(tasks.len(), 2);
    assert_eq!(tasks[0]["description"], "Capitulo 3");
    assert_eq!(tasks[0]["subject"], "Math");
    assert_eq!(tasks[0]["evaluationResults"]["s-1"]["score"], 70.0);
    assert_eq!(tasks[1], serde_json::json!({"id": "x", "title": 5}));

    let notifications = raw("smart-student-task-notifications");
    let n1 = notifications
        .iter()
        .find(|item| item["id"] == "n-1")
        .unwrap();
    assert_eq!(n1["fromUsername"], "prof");
    assert_eq!(n1["taskTitle"], "Quiz");
    assert!(notifications
        .iter()
        .any(|item| item == &serde_json::json!({"id": "n-2", "type": "mystery", "taskId": "e-1"})));

    let copies = raw("userTasks_s-1");
    assert_eq!(copies[0]["answers"], serde_json::json!([1, 3]));
}

#[test]
fn copies_stored_under_two_keys_end_up_under_one() {
    let repo = seeded_repo();
    repo.set(
        "smart-student-tasks",
        r#"[{"id": "e-1", "title": "Quiz", "course": "4A", "assignedById": "t-1",
             "taskType": "evaluation"}]"#,
    )
    .unwrap();
    repo.set(
        "userTasks_ana",
        r#"[{"taskId": "e-1", "status": "pending", "updatedAt": 1000}]"#,
    )
    .unwrap();
    repo.set(
        "userTasks_s-1",
        r#"[{"taskId": "e-1", "status": "completed", "score": 70, "completedAt": 5000}]"#,
    )
    .unwrap();

    let snapshot = load_snapshot(&repo).unwrap();
    let copies = &snapshot.user_tasks["s-1"];
    assert_eq!(copies.len(), 1);
    assert_eq!(copies[0].status, CopyStatus::Completed);
    assert_eq!(snapshot.user_tasks_key("s-1"), "userTasks_s-1");

    let service = NotificationService::new(repo);
    let ana = Actor::student("s-1");
    let outcome = service.refresh(RefreshTrigger::Focus, &ana).unwrap();
    assert_eq!(outcome.repair.copy_keys_merged, 1);
    assert!(outcome.commit.is_complete());
    assert!(outcome.commit.written.contains(&"userTasks_ana".to_string()));
    assert_eq!(service.repo().get("userTasks_ana").unwrap(), None);

    let stored = service.snapshot().unwrap();
    assert_eq!(
        stored.user_copy("s-1", "e-1").unwrap().status,
        CopyStatus::Completed
    );
    assert!(stored.user_task_aliases.is_empty());

    let again = service.refresh(RefreshTrigger::Focus, &ana).unwrap();
    assert!(again.commit.is_noop());
}
