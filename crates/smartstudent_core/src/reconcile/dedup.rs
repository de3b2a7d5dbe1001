//! Collapsing of repeated notification records.
//!
//! Several listeners may emit the same event within moments of each other.
//! Records sharing `(kind, task_id, from_user_id)` whose timestamps fall
//! within the window of the first record of their cluster display once.

use crate::model::notification::{Notification, NotificationKind};
use std::collections::BTreeMap;

/// Default collapse window in milliseconds.
pub const DEFAULT_DEDUP_WINDOW_MS: i64 = 60_000;

/// Collapses duplicates; returns representatives with their cluster size.
///
/// Output is ordered oldest-first; callers re-sort for display.
pub fn collapse_duplicates<'a>(
    mut notifications: Vec<&'a Notification>,
    window_ms: i64,
) -> Vec<(&'a Notification, usize)> {
    notifications.sort_by(|left, right| {
        left.created_at
            .cmp(&right.created_at)
            .then_with(|| left.id.cmp(&right.id))
    });

    let mut kept: Vec<(&'a Notification, usize)> = Vec::with_capacity(notifications.len());
    let mut open_clusters: BTreeMap<(NotificationKind, &'a str, &'a str), usize> = BTreeMap::new();

    for notification in notifications {
        let key = (
            notification.kind,
            notification.task_id.as_str(),
            notification.from_user_id.as_str(),
        );
        if let Some(&index) = open_clusters.get(&key) {
            let (representative, count) = &mut kept[index];
            if notification
                .created_at
                .saturating_sub(representative.created_at)
                <= window_ms
            {
                *count += 1;
                continue;
            }
        }
        open_clusters.insert(key, kept.len());
        kept.push((notification, 1));
    }

    kept
}
