//! Write-on-read repair of derived state.
//!
//! # Responsibility
//! - Sync evaluation results found in personal copies or evaluation records
//!   into the global task results map.
//! - Restore collection invariants (unique ids, derived `read` flags, one
//!   personal-copies key per owner).
//! - Retire `new_task` notifications for resolved work and raise missing
//!   `evaluation_completed` notifications for creators.
//!
//! # Invariants
//! - Idempotent: a second pass over a repaired snapshot changes nothing.
//! - Generated records use deterministic ids.
//! - Only students assigned to a task contribute to or receive its results.

use super::assignment::{assigned_students, is_assigned};
use super::resolution::is_resolved;
use crate::model::notification::{Notification, NotificationKind};
use crate::model::task::{StudentResult, Task};
use crate::model::user::{Actor, Role, UserId, UNKNOWN_ACTOR};
use crate::snapshot::StorageSnapshot;
use log::info;
use std::collections::BTreeMap;
use uuid::Uuid;

/// Namespace for notification ids produced by repair.
const REPAIR_NAMESPACE: Uuid = Uuid::from_u128(0x5a1e_4c7b_93d2_4f0e_8b6a_2d9c_1e3f_7a01);

/// Counts of changes applied by one repair pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RepairReport {
    pub duplicates_removed: usize,
    pub results_synced: usize,
    pub new_task_retired: usize,
    pub notifications_created: usize,
    pub read_flags_fixed: usize,
    pub copy_keys_merged: usize,
}

impl RepairReport {
    pub fn changed(&self) -> bool {
        *self != Self::default()
    }
}

/// Which `(task, student)` pairs an actor's repair pass may touch.
#[derive(Debug, Clone, Copy)]
pub(crate) enum RepairScope<'a> {
    Student(&'a str),
    Teacher(&'a str),
    Everything,
}

impl<'a> RepairScope<'a> {
    pub(crate) fn for_actor(actor: &'a Actor) -> Self {
        match actor.role {
            Role::Student => Self::Student(&actor.id),
            Role::Teacher => Self::Teacher(&actor.id),
            Role::Admin => Self::Everything,
        }
    }

    /// Whether the pass may touch `student_id`'s state for `task`.
    fn covers(&self, snapshot: &StorageSnapshot, task: &Task, student_id: &str) -> bool {
        let in_scope = match self {
            Self::Student(id) => *id == student_id,
            Self::Teacher(id) => task.is_created_by(id),
            Self::Everything => true,
        };
        in_scope && is_assigned(snapshot, task, student_id)
    }

    /// Whether the pass may touch `owner`'s personal copies as a whole.
    fn covers_owner(&self, snapshot: &StorageSnapshot, owner: &str) -> bool {
        match self {
            Self::Student(id) => *id == owner,
            Self::Teacher(id) => snapshot.tasks.iter().any(|task| {
                task.is_created_by(id)
                    && assigned_students(snapshot, task)
                        .iter()
                        .any(|student| student == owner)
            }),
            Self::Everything => true,
        }
    }
}

pub(crate) fn repair_snapshot(snapshot: &mut StorageSnapshot, actor: &Actor) -> RepairReport {
    let scope = RepairScope::for_actor(actor);
    let mut report = RepairReport {
        duplicates_removed: remove_duplicate_ids(snapshot),
        copy_keys_merged: merge_user_task_keys(snapshot, scope),
        ..RepairReport::default()
    };

    for index in 0..snapshot.tasks.len() {
        if snapshot.tasks[index].is_evaluation() {
            report.results_synced += sync_task_results(snapshot, index, scope);
        }
    }
    report.new_task_retired = retire_resolved_new_tasks(snapshot, scope);
    report.notifications_created = raise_missing_completions(snapshot, scope);

    for notification in &mut snapshot.notifications {
        if notification.sync_read_flag() {
            report.read_flags_fixed += 1;
        }
    }

    if report.changed() {
        info!(
            "event=repair module=reconcile status=ok actor={} duplicates_removed={} results_synced={} new_task_retired={} notifications_created={} read_flags_fixed={} copy_keys_merged={}",
            actor.id,
            report.duplicates_removed,
            report.results_synced,
            report.new_task_retired,
            report.notifications_created,
            report.read_flags_fixed,
            report.copy_keys_merged
        );
    }
    report
}

/// Syncs newer completions for one evaluation task into its results map.
///
/// Returns how many result entries were inserted or replaced.
pub(crate) fn sync_task_results(
    snapshot: &mut StorageSnapshot,
    task_index: usize,
    scope: RepairScope<'_>,
) -> usize {
    let task = &snapshot.tasks[task_index];
    let mut newest: BTreeMap<UserId, (Option<f64>, i64)> = BTreeMap::new();
    let mut offer = |student: &str, score: Option<f64>, completed_at: i64| {
        let entry = newest
            .entry(student.to_string())
            .or_insert((score, completed_at));
        if completed_at > entry.1 {
            *entry = (score, completed_at);
        }
    };

    for (owner, copies) in &snapshot.user_tasks {
        if !scope.covers(snapshot, task, owner) {
            continue;
        }
        for copy in copies
            .iter()
            .filter(|copy| copy.task_id == task.id && copy.is_completed())
        {
            offer(owner, copy.score, copy.completion_time());
        }
    }
    for record in snapshot
        .evaluation_records
        .iter()
        .filter(|record| record.task_id == task.id)
    {
        if scope.covers(snapshot, task, &record.student_id) {
            offer(&record.student_id, record.score, record.completed_at);
        }
    }

    let task = &mut snapshot.tasks[task_index];
    let mut synced = 0;
    for (student, (score, completed_at)) in newest {
        match task.results.get_mut(&student) {
            Some(existing) if existing.completed_at >= completed_at => {}
            Some(existing) => {
                existing.score = score;
                existing.completed_at = completed_at;
                existing.reviewed_at = None;
                synced += 1;
            }
            None => {
                task.results
                    .insert(student, StudentResult::new(score, completed_at));
                synced += 1;
            }
        }
    }
    synced
}

fn remove_duplicate_ids(snapshot: &mut StorageSnapshot) -> usize {
    let mut removed = 0;
    removed += keep_newest_by_id(
        &mut snapshot.tasks,
        |task| task.id.clone(),
        |task| task.created_at,
        merge_task_results,
    );
    removed += keep_newest_by_id(
        &mut snapshot.comments,
        |comment| comment.id.clone(),
        |comment| comment.created_at,
        |kept, dropped| kept.read_by.extend(dropped.read_by.iter().cloned()),
    );
    removed += keep_newest_by_id(
        &mut snapshot.notifications,
        |notification| notification.id.clone(),
        |notification| notification.created_at,
        |kept, dropped| kept.read_by.extend(dropped.read_by.iter().cloned()),
    );
    removed
}

/// Keeps one record per id at the position of its first occurrence.
///
/// The newest record wins, ties go to the later record; `merge` folds the
/// losing record into the winner.
fn keep_newest_by_id<T>(
    records: &mut Vec<T>,
    id_of: impl Fn(&T) -> String,
    time_of: impl Fn(&T) -> i64,
    merge: impl Fn(&mut T, &T),
) -> usize {
    let before = records.len();
    let mut kept: Vec<T> = Vec::with_capacity(before);
    let mut positions: BTreeMap<String, usize> = BTreeMap::new();

    for record in records.drain(..) {
        let id = id_of(&record);
        match positions.get(&id) {
            Some(&position) => {
                let mut loser = record;
                if time_of(&loser) >= time_of(&kept[position]) {
                    std::mem::swap(&mut loser, &mut kept[position]);
                }
                merge(&mut kept[position], &loser);
            }
            None => {
                positions.insert(id, kept.len());
                kept.push(record);
            }
        }
    }

    *records = kept;
    before - records.len()
}

/// Folds the results of a dropped duplicate task into the kept one.
///
/// Per student the later completion wins; a review mark survives when both
/// records describe the same completion.
fn merge_task_results(kept: &mut Task, dropped: &Task) {
    for (student, result) in &dropped.results {
        match kept.results.get_mut(student) {
            Some(existing) if existing.completed_at > result.completed_at => {}
            Some(existing) if existing.completed_at == result.completed_at => {
                if existing.reviewed_at.is_none() {
                    existing.reviewed_at = result.reviewed_at;
                }
            }
            Some(existing) => *existing = result.clone(),
            None => {
                kept.results.insert(student.clone(), result.clone());
            }
        }
    }
}

/// Drops merged personal-copies keys for owners in scope; the copies already
/// live under the owner's primary key.
fn merge_user_task_keys(snapshot: &mut StorageSnapshot, scope: RepairScope<'_>) -> usize {
    let owners: Vec<UserId> = snapshot
        .user_task_aliases
        .keys()
        .filter(|owner| scope.covers_owner(snapshot, owner))
        .cloned()
        .collect();
    owners
        .iter()
        .filter_map(|owner| snapshot.user_task_aliases.remove(owner))
        .map(|aliases| aliases.len())
        .sum()
}

fn retire_resolved_new_tasks(snapshot: &mut StorageSnapshot, scope: RepairScope<'_>) -> usize {
    let mut to_mark: Vec<(usize, UserId)> = Vec::new();
    for (index, notification) in snapshot.notifications.iter().enumerate() {
        if notification.kind != NotificationKind::NewTask {
            continue;
        }
        let Some(task) = snapshot.task(&notification.task_id) else {
            continue;
        };
        for target in &notification.target_ids {
            if !notification.is_read_by(target)
                && scope.covers(snapshot, task, target)
                && is_resolved(snapshot, task, target)
            {
                to_mark.push((index, target.clone()));
            }
        }
    }

    let retired = to_mark.len();
    for (index, target) in to_mark {
        snapshot.notifications[index].mark_read_by(&target);
    }
    retired
}

fn raise_missing_completions(snapshot: &mut StorageSnapshot, scope: RepairScope<'_>) -> usize {
    let mut created: Vec<Notification> = Vec::new();
    for task in snapshot.tasks.iter().filter(|task| task.is_evaluation()) {
        if task.creator_id == UNKNOWN_ACTOR {
            continue;
        }
        for (student, result) in &task.results {
            if result.is_reviewed() || !scope.covers(snapshot, task, student) {
                continue;
            }
            let already_raised = snapshot.notifications.iter().any(|notification| {
                notification.kind == NotificationKind::EvaluationCompleted
                    && notification.task_id == task.id
                    && notification.from_user_id == *student
                    && notification.created_at >= result.completed_at
            });
            if already_raised {
                continue;
            }
            created.push(Notification::new(
                completion_notification_id(&task.id, student, result.completed_at),
                NotificationKind::EvaluationCompleted,
                task.id.clone(),
                student.clone(),
                vec![task.creator_id.clone()],
                result.completed_at,
            ));
        }
    }

    let count = created.len();
    snapshot.notifications.extend(created);
    count
}

fn completion_notification_id(task_id: &str, student_id: &str, completed_at: i64) -> String {
    let name = format!("evaluation_completed:{task_id}:{student_id}:{completed_at}");
    Uuid::new_v5(&REPAIR_NAMESPACE, name.as_bytes()).to_string()
}
