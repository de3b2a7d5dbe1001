//! Snapshot load/commit over a key/value repository.
//!
//! # Responsibility
//! - Load every known collection into a `StorageSnapshot`.
//! - Commit a patched snapshot back, touching only collections that changed.
//!
//! # Invariants
//! - Loading fails open on malformed JSON; only transport errors surface.
//! - Commits are best-effort per key: a failed key is logged and recorded,
//!   the remaining keys are still written. Nothing is rolled back.
//! - A merged personal-copies key is removed only after the owner's primary
//!   key holds the merged copies.

use crate::repo::kv_repo::{KvRepository, RepoResult};
use crate::snapshot::keys::CollectionKey;
use crate::snapshot::{StorageEntries, StorageSnapshot};
use log::{error, info};

/// Outcome of one commit.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommitReport {
    /// Keys written or removed successfully.
    pub written: Vec<String>,
    /// Keys that failed, with the error message.
    pub failed: Vec<(String, String)>,
}

impl CommitReport {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }

    pub fn is_noop(&self) -> bool {
        self.written.is_empty() && self.failed.is_empty()
    }
}

/// Loads the snapshot, ignoring keys that belong to no collection.
pub fn load_snapshot<R: KvRepository + ?Sized>(repo: &R) -> RepoResult<StorageSnapshot> {
    let entries: StorageEntries = repo
        .entries()?
        .into_iter()
        .filter(|(key, _)| CollectionKey::parse(key).is_some())
        .collect();
    Ok(StorageSnapshot::from_entries(&entries))
}

/// Writes every collection of `after` whose encoding differs from `before`.
///
/// # Errors
/// - Returns an error only when encoding fails, before anything is written.
///   Per-key write failures are reported in [`CommitReport::failed`].
pub fn commit_snapshot<R: KvRepository + ?Sized>(
    repo: &R,
    before: &StorageSnapshot,
    after: &StorageSnapshot,
) -> RepoResult<CommitReport> {
    let previous = before.to_entries()?;
    let next = after.to_entries()?;
    let mut report = CommitReport::default();

    for (key, value) in &next {
        if previous.get(key) == Some(value) {
            continue;
        }
        match repo.set(key, value) {
            Ok(()) => report.written.push(key.clone()),
            Err(err) => {
                error!("event=commit_key module=repo status=error key={key} error={err}");
                report.failed.push((key.clone(), err.to_string()));
            }
        }
    }

    for key in previous.keys().filter(|key| !next.contains_key(*key)) {
        match repo.remove(key) {
            Ok(_) => report.written.push(key.clone()),
            Err(err) => {
                error!("event=commit_key module=repo status=error key={key} error={err}");
                report.failed.push((key.clone(), err.to_string()));
            }
        }
    }

    retire_merged_user_task_keys(repo, before, after, &next, &mut report);

    if !report.is_noop() {
        info!(
            "event=commit module=repo status={} written={} failed={}",
            if report.is_complete() { "ok" } else { "partial" },
            report.written.len(),
            report.failed.len()
        );
    }
    Ok(report)
}

/// Removes personal-copies keys that repair folded into an owner's primary key.
fn retire_merged_user_task_keys<R: KvRepository + ?Sized>(
    repo: &R,
    before: &StorageSnapshot,
    after: &StorageSnapshot,
    next: &StorageEntries,
    report: &mut CommitReport,
) {
    for (owner, aliases) in &before.user_task_aliases {
        let still_merged = after.user_task_aliases.get(owner);
        let retired: Vec<&String> = aliases
            .iter()
            .filter(|key| still_merged.map_or(true, |kept| !kept.contains(*key)))
            .collect();
        if retired.is_empty() {
            continue;
        }

        let primary = after.user_tasks_key(owner);
        if report.failed.iter().any(|(key, _)| *key == primary) {
            continue;
        }
        if !report.written.contains(&primary) {
            let Some(value) = next.get(&primary) else {
                continue;
            };
            if let Err(err) = repo.set(&primary, value) {
                error!("event=commit_key module=repo status=error key={primary} error={err}");
                report.failed.push((primary, err.to_string()));
                continue;
            }
            report.written.push(primary);
        }

        for key in retired {
            match repo.remove(key) {
                Ok(_) => report.written.push(key.clone()),
                Err(err) => {
                    error!("event=commit_key module=repo status=error key={key} error={err}");
                    report.failed.push((key.clone(), err.to_string()));
                }
            }
        }
    }
}
