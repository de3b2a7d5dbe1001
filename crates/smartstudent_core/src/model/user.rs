//! User profiles, roles and the acting identity.
//!
//! # Responsibility
//! - Define the canonical user identity used by every reconciliation rule.
//! - Resolve loosely recorded identities (ids, usernames) to one canonical id.
//!
//! # Invariants
//! - Business logic only ever compares canonical `UserId` values.
//! - Unresolvable identities map to [`UNKNOWN_ACTOR`], never to an error.

use crate::model::StorageExtras;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Canonical user identifier.
pub type UserId = String;

/// Sentinel id used when no identity field can be resolved.
pub const UNKNOWN_ACTOR: &str = "unknown";

/// Application role of a user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Student,
    Teacher,
    Admin,
}

impl Role {
    /// Stable storage string.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Student => "student",
            Self::Teacher => "teacher",
            Self::Admin => "admin",
        }
    }

    /// Parses a stored role string, case-insensitive.
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "student" => Some(Self::Student),
            "teacher" => Some(Self::Teacher),
            "admin" => Some(Self::Admin),
            _ => None,
        }
    }
}

/// The user a reconciliation pass is computed for.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Actor {
    pub id: UserId,
    pub role: Role,
}

impl Actor {
    pub fn new(id: impl Into<UserId>, role: Role) -> Self {
        Self {
            id: id.into(),
            role,
        }
    }

    pub fn student(id: impl Into<UserId>) -> Self {
        Self::new(id, Role::Student)
    }

    pub fn teacher(id: impl Into<UserId>) -> Self {
        Self::new(id, Role::Teacher)
    }
}

/// Canonical user profile.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserProfile {
    pub id: UserId,
    pub username: String,
    pub display_name: String,
    pub role: Role,
    /// Course/section identifiers the user belongs to.
    pub courses: Vec<String>,
    pub extra: StorageExtras,
}

impl UserProfile {
    pub fn new(id: impl Into<UserId>, username: impl Into<String>, role: Role) -> Self {
        let username = username.into();
        Self {
            id: id.into(),
            display_name: username.clone(),
            username,
            role,
            courses: Vec::new(),
            extra: StorageExtras::new(),
        }
    }

    /// Builder-style helper for course membership.
    pub fn with_courses<I, S>(mut self, courses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.courses = courses.into_iter().map(Into::into).collect();
        self
    }

    pub fn belongs_to(&self, course: &str) -> bool {
        self.courses.iter().any(|value| value == course)
    }

    pub fn actor(&self) -> Actor {
        Actor::new(self.id.clone(), self.role)
    }
}

/// Lookup table from any recorded identity spelling to the canonical id.
#[derive(Debug, Clone, Default)]
pub struct UserDirectory {
    by_id: BTreeMap<String, UserId>,
    by_username: BTreeMap<String, UserId>,
    roles: BTreeMap<UserId, Role>,
}

impl UserDirectory {
    pub fn from_profiles(profiles: &[UserProfile]) -> Self {
        let mut directory = Self::default();
        for profile in profiles {
            directory
                .by_id
                .insert(profile.id.clone(), profile.id.clone());
            directory
                .by_username
                .insert(profile.username.to_ascii_lowercase(), profile.id.clone());
            directory.roles.insert(profile.id.clone(), profile.role);
        }
        directory
    }

    /// Resolves one recorded identity value, matching ids first.
    pub fn lookup(&self, value: &str) -> Option<UserId> {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            return None;
        }
        self.by_id
            .get(trimmed)
            .or_else(|| self.by_username.get(&trimmed.to_ascii_lowercase()))
            .cloned()
    }

    /// Resolves the first candidate field that maps to a known user.
    ///
    /// When no candidate is known, the first non-empty candidate is kept
    /// verbatim so unseen users still keep a stable id; with no candidate at
    /// all the [`UNKNOWN_ACTOR`] sentinel is returned.
    pub fn resolve(&self, candidates: &[Option<&str>]) -> UserId {
        let present = candidates
            .iter()
            .flatten()
            .map(|value| value.trim())
            .filter(|value| !value.is_empty());

        let mut first_raw = None;
        for value in present {
            if let Some(id) = self.lookup(value) {
                return id;
            }
            first_raw.get_or_insert(value);
        }

        first_raw
            .map(str::to_string)
            .unwrap_or_else(|| UNKNOWN_ACTOR.to_string())
    }

    /// Role of a canonical user id, when the user is known.
    pub fn role_of(&self, user_id: &str) -> Option<Role> {
        self.roles.get(user_id).copied()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::{Role, UserDirectory, UserProfile, UNKNOWN_ACTOR};

    fn directory() -> UserDirectory {
        UserDirectory::from_profiles(&[
            UserProfile::new("u-1", "Maria", Role::Teacher),
            UserProfile::new("u-2", "felipe", Role::Student),
        ])
    }

    #[test]
    fn resolve_prefers_first_known_candidate() {
        let dir = directory();
        assert_eq!(dir.resolve(&[None, Some("maria"), Some("u-2")]), "u-1");
        assert_eq!(dir.resolve(&[Some("ghost"), Some("u-2")]), "u-2");
    }

    #[test]
    fn resolve_falls_back_to_raw_value_then_sentinel() {
        let dir = directory();
        assert_eq!(dir.resolve(&[Some(" ghost "), None]), "ghost");
        assert_eq!(dir.resolve(&[None, Some("  ")]), UNKNOWN_ACTOR);
    }

    #[test]
    fn role_parse_is_case_insensitive() {
        assert_eq!(Role::parse("Teacher"), Some(Role::Teacher));
        assert_eq!(Role::parse("guardian"), None);
    }
}
