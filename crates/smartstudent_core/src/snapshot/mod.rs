//! In-memory snapshot of every persisted collection.
//!
//! # Responsibility
//! - Bundle the storage collections into one plain value that pure
//!   reconciliation functions can take and return.
//! - Convert between raw key/value entries and canonical records.
//!
//! # Invariants
//! - A snapshot never references a storage API; it can be built from
//!   in-memory fixtures.
//! - Personal copies are keyed by canonical user id and hold at most one copy
//!   per task; the original key suffix is remembered so commits write back
//!   to the same key.
//! - Raw elements that did not decode travel with the snapshot and are
//!   encoded back under the key they came from.

pub mod codec;
pub mod keys;

use crate::model::comment::Comment;
use crate::model::notification::Notification;
use crate::model::task::Task;
use crate::model::user::{UserDirectory, UserId, UserProfile};
use crate::model::user_task::{EvaluationRecord, UserTaskCopy};
use codec::Decoded;
use keys::{CollectionKey, USER_TASKS_PREFIX};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};

/// Raw storage entries: key to JSON string.
pub type StorageEntries = BTreeMap<String, String>;

/// Plain bundle of all storage collections.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StorageSnapshot {
    pub users: Vec<UserProfile>,
    pub tasks: Vec<Task>,
    pub comments: Vec<Comment>,
    pub notifications: Vec<Notification>,
    /// Personal task copies by canonical owner id.
    pub user_tasks: BTreeMap<UserId, Vec<UserTaskCopy>>,
    pub evaluation_records: Vec<EvaluationRecord>,
    /// Storage key suffix per owner when it differs from the canonical id.
    pub user_task_keys: BTreeMap<UserId, String>,
    /// Further storage keys whose copies were merged into an owner's copies.
    ///
    /// A commit removes a key once repair drops it from this set.
    pub user_task_aliases: BTreeMap<UserId, BTreeSet<String>>,
    /// Undecodable raw elements by storage key.
    pub skipped: BTreeMap<String, Vec<Value>>,
}

impl StorageSnapshot {
    /// Decodes a snapshot from raw entries. Never fails; see `codec`.
    pub fn from_entries(entries: &StorageEntries) -> Self {
        let raw = |key: &str| entries.get(key).map(String::as_str);

        let mut snapshot = Self::default();
        let users = codec::decode_users(keys::USERS_KEY, raw(keys::USERS_KEY));
        snapshot.users = snapshot.keep_skipped(keys::USERS_KEY, users);
        let directory = UserDirectory::from_profiles(&snapshot.users);

        let tasks = codec::decode_tasks(keys::TASKS_KEY, raw(keys::TASKS_KEY), &directory);
        snapshot.tasks = snapshot.keep_skipped(keys::TASKS_KEY, tasks);
        let comments =
            codec::decode_comments(keys::COMMENTS_KEY, raw(keys::COMMENTS_KEY), &directory);
        snapshot.comments = snapshot.keep_skipped(keys::COMMENTS_KEY, comments);
        let notifications = codec::decode_notifications(
            keys::NOTIFICATIONS_KEY,
            raw(keys::NOTIFICATIONS_KEY),
            &directory,
        );
        snapshot.notifications = snapshot.keep_skipped(keys::NOTIFICATIONS_KEY, notifications);
        let records = codec::decode_evaluation_records(
            keys::EVALUATION_RESULTS_KEY,
            raw(keys::EVALUATION_RESULTS_KEY),
            &directory,
        );
        snapshot.evaluation_records = snapshot.keep_skipped(keys::EVALUATION_RESULTS_KEY, records);

        // Every storage suffix that resolves to the same owner, in key order.
        let mut sources: BTreeMap<UserId, Vec<(String, Decoded<UserTaskCopy>)>> = BTreeMap::new();
        for (key, value) in entries {
            let Some(CollectionKey::UserTasks(suffix)) = CollectionKey::parse(key) else {
                continue;
            };
            let owner = directory.resolve(&[Some(suffix.as_str())]);
            let decoded = codec::decode_user_tasks(key, Some(value.as_str()));
            sources.entry(owner).or_default().push((suffix, decoded));
        }
        for (owner, mut owner_sources) in sources {
            // The canonical key wins when present, otherwise the first one.
            let primary = owner_sources
                .iter()
                .position(|(suffix, _)| *suffix == owner)
                .unwrap_or(0);
            let (suffix, decoded) = owner_sources.remove(primary);
            if suffix != owner {
                snapshot.user_task_keys.insert(owner.clone(), suffix);
            }
            let mut copies = Vec::new();
            let mut skipped = decoded.skipped;
            for copy in decoded.records {
                merge_copy(&mut copies, copy);
            }
            let mut aliases = BTreeSet::new();
            for (alias, decoded) in owner_sources {
                aliases.insert(keys::user_tasks_key(&alias));
                for copy in decoded.records {
                    merge_copy(&mut copies, copy);
                }
                skipped.extend(decoded.skipped);
            }

            let primary_key = snapshot.user_tasks_key(&owner);
            if !skipped.is_empty() {
                snapshot.skipped.insert(primary_key, skipped);
            }
            if !aliases.is_empty() {
                snapshot.user_task_aliases.insert(owner.clone(), aliases);
            }
            snapshot.user_tasks.insert(owner, copies);
        }

        snapshot
    }

    /// Encodes every collection into raw entries.
    pub fn to_entries(&self) -> serde_json::Result<StorageEntries> {
        let mut entries = StorageEntries::new();
        entries.insert(
            keys::USERS_KEY.to_string(),
            codec::encode_users(&self.users, self.skipped_under(keys::USERS_KEY))?,
        );
        entries.insert(
            keys::TASKS_KEY.to_string(),
            codec::encode_tasks(&self.tasks, self.skipped_under(keys::TASKS_KEY))?,
        );
        entries.insert(
            keys::COMMENTS_KEY.to_string(),
            codec::encode_comments(&self.comments, self.skipped_under(keys::COMMENTS_KEY))?,
        );
        entries.insert(
            keys::NOTIFICATIONS_KEY.to_string(),
            codec::encode_notifications(
                &self.notifications,
                self.skipped_under(keys::NOTIFICATIONS_KEY),
            )?,
        );
        entries.insert(
            keys::EVALUATION_RESULTS_KEY.to_string(),
            codec::encode_evaluation_records(
                &self.evaluation_records,
                self.skipped_under(keys::EVALUATION_RESULTS_KEY),
            )?,
        );
        for (owner, copies) in &self.user_tasks {
            let key = self.user_tasks_key(owner);
            let value = codec::encode_user_tasks(copies, self.skipped_under(&key))?;
            entries.insert(key, value);
        }
        Ok(entries)
    }

    /// Raw elements skipped on decode under `key`.
    pub fn skipped_under(&self, key: &str) -> &[Value] {
        self.skipped.get(key).map(Vec::as_slice).unwrap_or_default()
    }

    fn keep_skipped<T>(&mut self, key: &str, decoded: Decoded<T>) -> Vec<T> {
        if !decoded.skipped.is_empty() {
            self.skipped.insert(key.to_string(), decoded.skipped);
        }
        decoded.records
    }

    /// Storage key holding `owner`'s personal copies.
    pub fn user_tasks_key(&self, owner: &str) -> String {
        let suffix = self
            .user_task_keys
            .get(owner)
            .map(String::as_str)
            .unwrap_or(owner);
        format!("{USER_TASKS_PREFIX}{suffix}")
    }

    pub fn directory(&self) -> UserDirectory {
        UserDirectory::from_profiles(&self.users)
    }

    pub fn user(&self, user_id: &str) -> Option<&UserProfile> {
        self.users.iter().find(|user| user.id == user_id)
    }

    pub fn task(&self, task_id: &str) -> Option<&Task> {
        self.tasks.iter().find(|task| task.id == task_id)
    }

    pub fn task_mut(&mut self, task_id: &str) -> Option<&mut Task> {
        self.tasks.iter_mut().find(|task| task.id == task_id)
    }

    /// `owner`'s personal copy of `task_id`, if any.
    pub fn user_copy(&self, owner: &str, task_id: &str) -> Option<&UserTaskCopy> {
        self.user_tasks
            .get(owner)
            .and_then(|copies| copies.iter().find(|copy| copy.task_id == task_id))
    }

    /// Inserts or replaces `owner`'s copy of `copy.task_id`.
    ///
    /// A replacement without storage extras keeps the previous copy's extras.
    pub fn upsert_user_copy(&mut self, owner: &str, mut copy: UserTaskCopy) {
        let copies = self.user_tasks.entry(owner.to_string()).or_default();
        match copies
            .iter_mut()
            .find(|existing| existing.task_id == copy.task_id)
        {
            Some(existing) => {
                if copy.extra.is_empty() {
                    copy.extra = std::mem::take(&mut existing.extra);
                }
                *existing = copy;
            }
            None => copies.push(copy),
        }
    }

    pub fn comments_for_task<'a>(&'a self, task_id: &'a str) -> impl Iterator<Item = &'a Comment> {
        self.comments
            .iter()
            .filter(move |comment| comment.task_id == task_id)
    }
}

/// Adds `copy` unless a copy of the same task exists; the newest update wins.
fn merge_copy(copies: &mut Vec<UserTaskCopy>, copy: UserTaskCopy) {
    match copies
        .iter_mut()
        .find(|existing| existing.task_id == copy.task_id)
    {
        Some(existing) if copy.updated_at > existing.updated_at => *existing = copy,
        Some(_) => {}
        None => copies.push(copy),
    }
}

#[cfg(test)]
mod tests {
    use super::{StorageEntries, StorageSnapshot};

    #[test]
    fn personal_copies_resolve_usernames_and_keep_their_key() {
        let mut entries = StorageEntries::new();
        entries.insert(
            "smart-student-users".to_string(),
            r#"[{"id": "s-1", "username": "ana", "role": "student"}]"#.to_string(),
        );
        entries.insert(
            "userTasks_ana".to_string(),
            r#"[{"taskId": "t-1", "status": "completed", "completedAt": 5}]"#.to_string(),
        );

        let snapshot = StorageSnapshot::from_entries(&entries);
        let copy = snapshot.user_copy("s-1", "t-1").expect("copy under canonical id");
        assert!(copy.is_completed());
        assert_eq!(snapshot.user_tasks_key("s-1"), "userTasks_ana");

        let encoded = snapshot.to_entries().expect("encode");
        assert!(encoded.contains_key("userTasks_ana"));
        assert_eq!(StorageSnapshot::from_entries(&encoded), snapshot);
    }
}
