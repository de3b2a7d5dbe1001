//! JSON storage codec for snapshot collections.
//!
//! # Responsibility
//! - Decode loosely typed storage arrays into canonical model records.
//! - Normalize identity fields (ids, usernames, legacy aliases) at the
//!   boundary so business logic never sees the ambiguity.
//! - Encode canonical records back into the storage shape.
//!
//! # Invariants
//! - Decoding fails open: an unparseable collection decodes as empty and an
//!   undecodable element is skipped. Both are logged, never returned.
//! - Skipped elements and fields the model does not interpret are carried
//!   through and written back verbatim; decoding never loses storage data.
//! - Encoded output decodes back to the same canonical records.

use crate::model::comment::Comment;
use crate::model::notification::{Notification, NotificationKind};
use crate::model::task::{AssignmentTarget, StudentResult, Task, TaskKind};
use crate::model::user::{Role, UserDirectory, UserId, UserProfile};
use crate::model::user_task::{CopyStatus, EvaluationRecord, UserTaskCopy};
use crate::model::StorageExtras;
use chrono::{DateTime, NaiveDate};
use log::{debug, warn};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct StoredUser {
    #[serde(deserialize_with = "loose_string", skip_serializing_if = "Option::is_none")]
    id: Option<String>,
    #[serde(deserialize_with = "loose_string")]
    username: Option<String>,
    #[serde(alias = "name", skip_serializing_if = "Option::is_none")]
    display_name: Option<String>,
    role: Option<String>,
    #[serde(alias = "courses")]
    active_courses: Vec<String>,
    #[serde(flatten)]
    extra: StorageExtras,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct StoredResult {
    #[serde(deserialize_with = "loose_number")]
    score: Option<f64>,
    #[serde(deserialize_with = "loose_timestamp")]
    completed_at: Option<i64>,
    #[serde(deserialize_with = "loose_timestamp", skip_serializing_if = "Option::is_none")]
    reviewed_at: Option<i64>,
    #[serde(flatten)]
    extra: StorageExtras,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct StoredTask {
    #[serde(deserialize_with = "loose_string")]
    id: Option<String>,
    title: Option<String>,
    #[serde(alias = "courseId", alias = "section")]
    course: Option<String>,
    assigned_to: Option<String>,
    #[serde(alias = "assignedStudentIds")]
    assigned_students: Vec<String>,
    #[serde(alias = "type")]
    task_type: Option<String>,
    #[serde(deserialize_with = "loose_timestamp")]
    due_date: Option<i64>,
    #[serde(deserialize_with = "loose_timestamp")]
    created_at: Option<i64>,
    #[serde(deserialize_with = "loose_string")]
    assigned_by_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    assigned_by: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    created_by: Option<String>,
    evaluation_results: BTreeMap<String, StoredResult>,
    #[serde(flatten)]
    extra: StorageExtras,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct StoredComment {
    #[serde(deserialize_with = "loose_string")]
    id: Option<String>,
    #[serde(deserialize_with = "loose_string")]
    task_id: Option<String>,
    #[serde(deserialize_with = "loose_string")]
    author_id: Option<String>,
    #[serde(deserialize_with = "loose_string", skip_serializing_if = "Option::is_none")]
    student_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    author_username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    student_username: Option<String>,
    #[serde(alias = "userRole")]
    author_role: Option<String>,
    #[serde(alias = "text")]
    comment: Option<String>,
    #[serde(alias = "createdAt", deserialize_with = "loose_timestamp")]
    timestamp: Option<i64>,
    is_submission: bool,
    #[serde(deserialize_with = "loose_number")]
    grade: Option<f64>,
    read_by: Vec<String>,
    #[serde(flatten)]
    extra: StorageExtras,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct StoredNotification {
    #[serde(deserialize_with = "loose_string")]
    id: Option<String>,
    #[serde(rename = "type")]
    kind: Option<String>,
    #[serde(deserialize_with = "loose_string")]
    task_id: Option<String>,
    #[serde(deserialize_with = "loose_string")]
    from_user_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    from_username: Option<String>,
    target_user_ids: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    target_usernames: Vec<String>,
    #[serde(alias = "createdAt", deserialize_with = "loose_timestamp")]
    timestamp: Option<i64>,
    read_by: Vec<String>,
    read: bool,
    #[serde(flatten)]
    extra: StorageExtras,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct StoredUserTask {
    #[serde(deserialize_with = "loose_string")]
    task_id: Option<String>,
    #[serde(deserialize_with = "loose_string", skip_serializing_if = "Option::is_none")]
    id: Option<String>,
    status: Option<String>,
    #[serde(deserialize_with = "loose_number")]
    score: Option<f64>,
    #[serde(deserialize_with = "loose_timestamp")]
    completed_at: Option<i64>,
    #[serde(deserialize_with = "loose_timestamp")]
    updated_at: Option<i64>,
    #[serde(flatten)]
    extra: StorageExtras,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct StoredEvaluationRecord {
    #[serde(deserialize_with = "loose_string")]
    task_id: Option<String>,
    #[serde(deserialize_with = "loose_string")]
    student_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    student_username: Option<String>,
    #[serde(deserialize_with = "loose_number")]
    score: Option<f64>,
    correct_answers: Option<u32>,
    total_questions: Option<u32>,
    #[serde(deserialize_with = "loose_timestamp")]
    completed_at: Option<i64>,
    #[serde(flatten)]
    extra: StorageExtras,
}

/// Records decoded from one collection.
#[derive(Debug, Clone, PartialEq)]
pub struct Decoded<T> {
    pub records: Vec<T>,
    /// Raw elements that did not decode; written back unchanged on encode.
    pub skipped: Vec<Value>,
}

impl<T> Default for Decoded<T> {
    fn default() -> Self {
        Self {
            records: Vec::new(),
            skipped: Vec::new(),
        }
    }
}

/// Decodes the users collection.
pub fn decode_users(key: &str, raw: Option<&str>) -> Decoded<UserProfile> {
    decode_records(key, raw, |stored: StoredUser| {
        let username = stored.username.filter(|value| !value.trim().is_empty());
        let id = stored
            .id
            .filter(|value| !value.trim().is_empty())
            .or_else(|| username.clone())?;
        let username = username.unwrap_or_else(|| id.clone());
        Some(UserProfile {
            display_name: stored.display_name.unwrap_or_else(|| username.clone()),
            role: stored
                .role
                .as_deref()
                .and_then(Role::parse)
                .unwrap_or(Role::Student),
            courses: stored.active_courses,
            extra: stored.extra,
            id,
            username,
        })
    })
}

/// Decodes the tasks collection, normalizing creator and target identities.
pub fn decode_tasks(key: &str, raw: Option<&str>, directory: &UserDirectory) -> Decoded<Task> {
    decode_records(key, raw, |stored: StoredTask| {
        let id = non_empty(stored.id)?;
        let kind = stored
            .task_type
            .as_deref()
            .and_then(TaskKind::parse)
            .unwrap_or(TaskKind::Assignment);
        let students: Vec<UserId> = stored
            .assigned_students
            .iter()
            .map(|student| directory.resolve(&[Some(student.as_str())]))
            .collect();
        let target = match stored.assigned_to.as_deref().map(str::trim) {
            Some(mode) if mode.eq_ignore_ascii_case("course") => AssignmentTarget::Course,
            Some(_) => AssignmentTarget::Students(students),
            None if students.is_empty() => AssignmentTarget::Course,
            None => AssignmentTarget::Students(students),
        };
        let creator_id = directory.resolve(&[
            stored.assigned_by_id.as_deref(),
            stored.assigned_by.as_deref(),
            stored.created_by.as_deref(),
        ]);
        let results = stored
            .evaluation_results
            .into_iter()
            .map(|(student, result)| {
                let student_id = directory.resolve(&[Some(student.as_str())]);
                let entry = StudentResult {
                    score: result.score,
                    completed_at: result.completed_at.unwrap_or(0),
                    reviewed_at: result.reviewed_at,
                    extra: result.extra,
                };
                (student_id, entry)
            })
            .collect();

        let mut extra = stored.extra;
        retain_field(&mut extra, "assignedBy", stored.assigned_by);
        retain_field(&mut extra, "createdBy", stored.created_by);

        Some(Task {
            title: stored.title.unwrap_or_default(),
            course: stored.course.unwrap_or_default(),
            target,
            kind,
            due_at: stored.due_date,
            created_at: stored.created_at.unwrap_or(0),
            creator_id,
            results,
            extra,
            id,
        })
    })
}

/// Decodes the comments collection.
pub fn decode_comments(
    key: &str,
    raw: Option<&str>,
    directory: &UserDirectory,
) -> Decoded<Comment> {
    decode_records(key, raw, |stored: StoredComment| {
        let id = non_empty(stored.id)?;
        let task_id = non_empty(stored.task_id)?;
        let author_id = directory.resolve(&[
            stored.author_id.as_deref(),
            stored.student_id.as_deref(),
            stored.author_username.as_deref(),
            stored.student_username.as_deref(),
        ]);
        let author_role = stored
            .author_role
            .as_deref()
            .and_then(Role::parse)
            .or_else(|| directory.role_of(&author_id))
            .unwrap_or(Role::Student);

        let mut extra = stored.extra;
        retain_field(&mut extra, "studentId", stored.student_id);
        retain_field(&mut extra, "authorUsername", stored.author_username);
        retain_field(&mut extra, "studentUsername", stored.student_username);

        Some(Comment {
            text: stored.comment.unwrap_or_default(),
            created_at: stored.timestamp.unwrap_or(0),
            is_submission: stored.is_submission,
            grade: stored.grade,
            read_by: resolve_set(&stored.read_by, directory),
            extra,
            id,
            task_id,
            author_id,
            author_role,
        })
    })
}

/// Decodes the notifications collection.
///
/// `read` is recomputed from `read_by`; the stored flag is ignored.
pub fn decode_notifications(
    key: &str,
    raw: Option<&str>,
    directory: &UserDirectory,
) -> Decoded<Notification> {
    decode_records(key, raw, |stored: StoredNotification| {
        let id = non_empty(stored.id)?;
        let task_id = non_empty(stored.task_id)?;
        let Some(kind) = stored.kind.as_deref().and_then(NotificationKind::parse) else {
            debug!("event=codec_skip module=codec collection={key} reason=unknown_kind");
            return None;
        };
        let from_user_id = directory.resolve(&[
            stored.from_user_id.as_deref(),
            stored.from_username.as_deref(),
        ]);

        let mut target_ids: Vec<UserId> = Vec::new();
        for target in stored
            .target_user_ids
            .iter()
            .chain(stored.target_usernames.iter())
        {
            let resolved = directory.resolve(&[Some(target.as_str())]);
            if !target_ids.contains(&resolved) {
                target_ids.push(resolved);
            }
        }

        let mut extra = stored.extra;
        retain_field(&mut extra, "fromUsername", stored.from_username);
        if !stored.target_usernames.is_empty() {
            extra.insert(
                "targetUsernames".to_string(),
                Value::from(stored.target_usernames),
            );
        }

        let mut notification = Notification {
            created_at: stored.timestamp.unwrap_or(0),
            read_by: resolve_set(&stored.read_by, directory),
            read: stored.read,
            extra,
            id,
            kind,
            task_id,
            from_user_id,
            target_ids,
        };
        notification.sync_read_flag();
        Some(notification)
    })
}

/// Decodes one user's personal task copies.
pub fn decode_user_tasks(key: &str, raw: Option<&str>) -> Decoded<UserTaskCopy> {
    decode_records(key, raw, |stored: StoredUserTask| {
        let mut extra = stored.extra;
        let task_id = match non_empty(stored.task_id) {
            Some(task_id) => {
                retain_field(&mut extra, "id", stored.id);
                task_id
            }
            None => non_empty(stored.id)?,
        };
        let status = stored
            .status
            .as_deref()
            .and_then(CopyStatus::parse)
            .unwrap_or(CopyStatus::Pending);
        Some(UserTaskCopy {
            task_id,
            status,
            score: stored.score,
            completed_at: stored.completed_at,
            updated_at: stored.updated_at.or(stored.completed_at).unwrap_or(0),
            extra,
        })
    })
}

/// Decodes the evaluation results collection.
pub fn decode_evaluation_records(
    key: &str,
    raw: Option<&str>,
    directory: &UserDirectory,
) -> Decoded<EvaluationRecord> {
    decode_records(key, raw, |stored: StoredEvaluationRecord| {
        let task_id = non_empty(stored.task_id)?;
        let student_id = directory.resolve(&[
            stored.student_id.as_deref(),
            stored.student_username.as_deref(),
        ]);
        let mut extra = stored.extra;
        retain_field(&mut extra, "studentUsername", stored.student_username);
        Some(EvaluationRecord {
            task_id,
            student_id,
            score: stored.score,
            correct_answers: stored.correct_answers,
            total_questions: stored.total_questions,
            completed_at: stored.completed_at.unwrap_or(0),
            extra,
        })
    })
}

pub fn encode_users(users: &[UserProfile], skipped: &[Value]) -> serde_json::Result<String> {
    let stored = users.iter().map(|user| StoredUser {
        id: Some(user.id.clone()),
        username: Some(user.username.clone()),
        display_name: Some(user.display_name.clone()),
        role: Some(user.role.as_str().to_string()),
        active_courses: user.courses.clone(),
        extra: user.extra.clone(),
    });
    encode_array(stored, skipped)
}

pub fn encode_tasks(tasks: &[Task], skipped: &[Value]) -> serde_json::Result<String> {
    let stored = tasks.iter().map(|task| {
        let (assigned_to, assigned_students) = match &task.target {
            AssignmentTarget::Course => ("course", Vec::new()),
            AssignmentTarget::Students(students) => ("student", students.clone()),
        };
        StoredTask {
            id: Some(task.id.clone()),
            title: Some(task.title.clone()),
            course: Some(task.course.clone()),
            assigned_to: Some(assigned_to.to_string()),
            assigned_students,
            task_type: Some(task.kind.as_str().to_string()),
            due_date: task.due_at,
            created_at: Some(task.created_at),
            assigned_by_id: Some(task.creator_id.clone()),
            assigned_by: None,
            created_by: None,
            evaluation_results: task
                .results
                .iter()
                .map(|(student, result)| {
                    let stored = StoredResult {
                        score: result.score,
                        completed_at: Some(result.completed_at),
                        reviewed_at: result.reviewed_at,
                        extra: result.extra.clone(),
                    };
                    (student.clone(), stored)
                })
                .collect(),
            extra: task.extra.clone(),
        }
    });
    encode_array(stored, skipped)
}

pub fn encode_comments(comments: &[Comment], skipped: &[Value]) -> serde_json::Result<String> {
    let stored = comments.iter().map(|comment| StoredComment {
        id: Some(comment.id.clone()),
        task_id: Some(comment.task_id.clone()),
        author_id: Some(comment.author_id.clone()),
        student_id: None,
        author_username: None,
        student_username: None,
        author_role: Some(comment.author_role.as_str().to_string()),
        comment: Some(comment.text.clone()),
        timestamp: Some(comment.created_at),
        is_submission: comment.is_submission,
        grade: comment.grade,
        read_by: comment.read_by.iter().cloned().collect(),
        extra: comment.extra.clone(),
    });
    encode_array(stored, skipped)
}

pub fn encode_notifications(
    notifications: &[Notification],
    skipped: &[Value],
) -> serde_json::Result<String> {
    let stored = notifications.iter().map(|notification| StoredNotification {
        id: Some(notification.id.clone()),
        kind: Some(notification.kind.as_str().to_string()),
        task_id: Some(notification.task_id.clone()),
        from_user_id: Some(notification.from_user_id.clone()),
        from_username: None,
        target_user_ids: notification.target_ids.clone(),
        target_usernames: Vec::new(),
        timestamp: Some(notification.created_at),
        read_by: notification.read_by.iter().cloned().collect(),
        read: notification.read,
        extra: notification.extra.clone(),
    });
    encode_array(stored, skipped)
}

pub fn encode_user_tasks(copies: &[UserTaskCopy], skipped: &[Value]) -> serde_json::Result<String> {
    let stored = copies.iter().map(|copy| StoredUserTask {
        task_id: Some(copy.task_id.clone()),
        id: None,
        status: Some(copy.status.as_str().to_string()),
        score: copy.score,
        completed_at: copy.completed_at,
        updated_at: Some(copy.updated_at),
        extra: copy.extra.clone(),
    });
    encode_array(stored, skipped)
}

pub fn encode_evaluation_records(
    records: &[EvaluationRecord],
    skipped: &[Value],
) -> serde_json::Result<String> {
    let stored = records.iter().map(|record| StoredEvaluationRecord {
        task_id: Some(record.task_id.clone()),
        student_id: Some(record.student_id.clone()),
        student_username: None,
        score: record.score,
        correct_answers: record.correct_answers,
        total_questions: record.total_questions,
        completed_at: Some(record.completed_at),
        extra: record.extra.clone(),
    });
    encode_array(stored, skipped)
}

/// Parses a timestamp given as epoch milliseconds or an RFC 3339 / ISO date.
pub fn parse_timestamp_ms(value: &str) -> Option<i64> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return None;
    }
    if let Ok(ms) = trimmed.parse::<i64>() {
        return Some(ms);
    }
    if let Ok(parsed) = DateTime::parse_from_rfc3339(trimmed) {
        return Some(parsed.timestamp_millis());
    }
    NaiveDate::parse_from_str(trimmed, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|datetime| datetime.and_utc().timestamp_millis())
}

/// Decodes a JSON array element by element through `normalize`.
///
/// Elements that fail to deserialize or that `normalize` rejects are kept raw
/// in [`Decoded::skipped`].
fn decode_records<T, R>(
    key: &str,
    raw: Option<&str>,
    mut normalize: impl FnMut(T) -> Option<R>,
) -> Decoded<R>
where
    T: DeserializeOwned,
{
    let Some(raw) = raw.map(str::trim).filter(|value| !value.is_empty()) else {
        return Decoded::default();
    };

    let items = match serde_json::from_str::<Value>(raw) {
        Ok(Value::Array(items)) => items,
        Ok(Value::Null) => return Decoded::default(),
        Ok(other) => {
            warn!(
                "event=collection_parse module=codec status=error collection={key} error_code=not_an_array kind={}",
                json_kind(&other)
            );
            return Decoded::default();
        }
        Err(err) => {
            warn!(
                "event=collection_parse module=codec status=error collection={key} error_code=invalid_json error={err}"
            );
            return Decoded::default();
        }
    };

    let mut decoded = Decoded::default();
    for (index, item) in items.into_iter().enumerate() {
        match serde_json::from_value::<T>(item.clone()) {
            Ok(stored) => match normalize(stored) {
                Some(record) => decoded.records.push(record),
                None => {
                    debug!(
                        "event=codec_skip module=codec collection={key} index={index} reason=missing_id"
                    );
                    decoded.skipped.push(item);
                }
            },
            Err(err) => {
                warn!(
                    "event=record_parse module=codec status=error collection={key} index={index} error={err}"
                );
                decoded.skipped.push(item);
            }
        }
    }

    if !decoded.skipped.is_empty() {
        warn!(
            "event=collection_parse module=codec status=partial collection={key} kept={} skipped={}",
            decoded.records.len(),
            decoded.skipped.len()
        );
    }
    decoded
}

/// Serializes records followed by the raw elements skipped on decode.
fn encode_array<T: Serialize>(
    stored: impl Iterator<Item = T>,
    skipped: &[Value],
) -> serde_json::Result<String> {
    let mut items = Vec::with_capacity(skipped.len());
    for record in stored {
        items.push(serde_json::to_value(record)?);
    }
    items.extend(skipped.iter().cloned());
    serde_json::to_string(&items)
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|value| !value.trim().is_empty())
}

/// Keeps an identity spelling the canonical record replaces.
fn retain_field(extra: &mut StorageExtras, key: &str, value: Option<String>) {
    if let Some(value) = value {
        extra.insert(key.to_string(), Value::String(value));
    }
}

fn resolve_set(values: &[String], directory: &UserDirectory) -> BTreeSet<UserId> {
    values
        .iter()
        .filter(|value| !value.trim().is_empty())
        .map(|value| directory.resolve(&[Some(value.as_str())]))
        .collect()
}

fn loose_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::String(value) => Some(value),
        Value::Number(value) => Some(value.to_string()),
        _ => None,
    })
}

fn loose_number<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Number(value) => value.as_f64(),
        Value::String(value) => value.trim().parse::<f64>().ok(),
        _ => None,
    })
}

fn loose_timestamp<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Number(value) => value
            .as_i64()
            .or_else(|| value.as_f64().map(|ms| ms as i64)),
        Value::String(value) => parse_timestamp_ms(&value),
        _ => None,
    })
}

#[cfg(test)]
mod tests {
    use super::{
        decode_comments, decode_tasks, decode_users, encode_tasks, parse_timestamp_ms,
    };
    use crate::model::task::{AssignmentTarget, TaskKind};
    use crate::model::user::{Role, UserDirectory, UNKNOWN_ACTOR};
    use serde_json::{json, Value};

    fn directory() -> UserDirectory {
        let users = decode_users(
            "users",
            Some(
                r#"[
                    {"id": "t-1", "username": "profesor", "role": "teacher"},
                    {"id": 7, "username": "ana", "role": "student", "activeCourses": ["4A"]}
                ]"#,
            ),
        );
        UserDirectory::from_profiles(&users.records)
    }

    #[test]
    fn timestamps_accept_millis_rfc3339_and_dates() {
        assert_eq!(parse_timestamp_ms("1700000000000"), Some(1_700_000_000_000));
        assert_eq!(parse_timestamp_ms("1970-01-01T00:00:01Z"), Some(1_000));
        assert_eq!(parse_timestamp_ms("1970-01-02"), Some(86_400_000));
        assert_eq!(parse_timestamp_ms("yesterday"), None);
    }

    #[test]
    fn task_creator_falls_back_through_identity_fields() {
        let dir = directory();
        let tasks = decode_tasks(
            "tasks",
            Some(
                r#"[
                    {"id": "a", "assignedBy": "profesor", "taskType": "evaluation"},
                    {"id": "b", "assignedById": "", "createdBy": "t-1",
                     "assignedTo": "student", "assignedStudents": ["ana"]},
                    {"id": "c"}
                ]"#,
            ),
            &dir,
        )
        .records;
        assert_eq!(tasks.len(), 3);
        assert_eq!(tasks[0].creator_id, "t-1");
        assert_eq!(tasks[0].kind, TaskKind::Evaluation);
        assert_eq!(tasks[1].creator_id, "t-1");
        assert_eq!(
            tasks[1].target,
            AssignmentTarget::Students(vec!["7".to_string()])
        );
        assert_eq!(tasks[2].creator_id, UNKNOWN_ACTOR);
    }

    #[test]
    fn course_mode_ignores_case_and_padding() {
        let dir = directory();
        let tasks = decode_tasks(
            "tasks",
            Some(
                r#"[
                    {"id": "a", "assignedTo": "Course", "assignedStudents": ["ana"]},
                    {"id": "b", "assignedTo": " COURSE "}
                ]"#,
            ),
            &dir,
        )
        .records;
        assert_eq!(tasks[0].target, AssignmentTarget::Course);
        assert_eq!(tasks[1].target, AssignmentTarget::Course);
    }

    #[test]
    fn malformed_collections_fail_open() {
        let dir = directory();
        assert!(decode_tasks("tasks", Some("{not json"), &dir).records.is_empty());
        assert!(decode_tasks("tasks", Some(r#"{"id": "x"}"#), &dir).records.is_empty());

        let comments = decode_comments(
            "comments",
            Some(r#"[{"id": "c-1", "taskId": "a", "studentUsername": "ana"}, 42, {"taskId": "a"}]"#),
            &dir,
        );
        assert_eq!(comments.records.len(), 1);
        assert_eq!(comments.records[0].author_id, "7");
        assert_eq!(comments.records[0].author_role, Role::Student);
        assert_eq!(comments.skipped, vec![json!(42), json!({"taskId": "a"})]);
    }

    #[test]
    fn unknown_fields_and_skipped_elements_are_written_back() {
        let dir = directory();
        let decoded = decode_tasks(
            "tasks",
            Some(
                r#"[
                    {"id": "a", "title": "Quiz", "assignedBy": "profesor",
                     "description": "Capitulo 3", "subject": "Math"},
                    {"id": "x", "title": 5}
                ]"#,
            ),
            &dir,
        );
        assert_eq!(decoded.records.len(), 1);
        assert_eq!(decoded.skipped, vec![json!({"id": "x", "title": 5})]);

        let encoded = encode_tasks(&decoded.records, &decoded.skipped).expect("encode");
        let items: Vec<Value> = serde_json::from_str(&encoded).expect("array");
        assert_eq!(items.len(), 2);
        assert_eq!(items[0]["description"], "Capitulo 3");
        assert_eq!(items[0]["subject"], "Math");
        assert_eq!(items[0]["assignedBy"], "profesor");
        assert_eq!(items[0]["assignedById"], "t-1");
        assert_eq!(items[1], json!({"id": "x", "title": 5}));

        let again = decode_tasks("tasks", Some(&encoded), &dir);
        assert_eq!(again, decoded);
    }
}
