//! Storage key conventions.
//!
//! Shared tables live under fixed global keys; personal task copies are
//! namespaced per user as `userTasks_<user>`.

use once_cell::sync::Lazy;
use regex::Regex;

pub const USERS_KEY: &str = "smart-student-users";
pub const TASKS_KEY: &str = "smart-student-tasks";
pub const COMMENTS_KEY: &str = "smart-student-task-comments";
pub const NOTIFICATIONS_KEY: &str = "smart-student-task-notifications";
pub const EVALUATION_RESULTS_KEY: &str = "smart-student-evaluation-results";
pub const LANGUAGE_KEY: &str = "smart-student-language";
pub const USER_TASKS_PREFIX: &str = "userTasks_";

static USER_TASKS_KEY_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^userTasks_(\S+)$").expect("valid user tasks key regex"));

/// One logical collection persisted under a single key.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum CollectionKey {
    Users,
    Tasks,
    Comments,
    Notifications,
    EvaluationResults,
    /// Personal copies; holds the key suffix as stored.
    UserTasks(String),
}

impl CollectionKey {
    /// Global collections, in decode order.
    pub const SHARED: [CollectionKey; 5] = [
        Self::Users,
        Self::Tasks,
        Self::Comments,
        Self::Notifications,
        Self::EvaluationResults,
    ];

    pub fn storage_key(&self) -> String {
        match self {
            Self::Users => USERS_KEY.to_string(),
            Self::Tasks => TASKS_KEY.to_string(),
            Self::Comments => COMMENTS_KEY.to_string(),
            Self::Notifications => NOTIFICATIONS_KEY.to_string(),
            Self::EvaluationResults => EVALUATION_RESULTS_KEY.to_string(),
            Self::UserTasks(owner) => user_tasks_key(owner),
        }
    }

    /// Maps a raw storage key to its collection, ignoring unrelated keys.
    pub fn parse(key: &str) -> Option<Self> {
        match key {
            USERS_KEY => Some(Self::Users),
            TASKS_KEY => Some(Self::Tasks),
            COMMENTS_KEY => Some(Self::Comments),
            NOTIFICATIONS_KEY => Some(Self::Notifications),
            EVALUATION_RESULTS_KEY => Some(Self::EvaluationResults),
            other => parse_user_tasks_key(other).map(|owner| Self::UserTasks(owner.to_string())),
        }
    }
}

pub fn user_tasks_key(owner: &str) -> String {
    format!("{USER_TASKS_PREFIX}{owner}")
}

/// Returns the owner suffix of a personal copies key.
pub fn parse_user_tasks_key(key: &str) -> Option<&str> {
    USER_TASKS_KEY_RE
        .captures(key)
        .and_then(|caps| caps.get(1))
        .map(|owner| owner.as_str())
}
