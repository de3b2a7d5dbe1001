//! Persisted application settings.
//!
//! The display language is explicit state stored under its own key. Nothing
//! infers it from rendered output.

use crate::repo::kv_repo::{KvRepository, RepoResult};
use crate::snapshot::keys::LANGUAGE_KEY;
use log::warn;
use serde::{Deserialize, Serialize};

/// UI language.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    #[default]
    Es,
    En,
}

impl Language {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Es => "es",
            Self::En => "en",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        // Stored values are either bare (`es`) or JSON strings (`"es"`).
        match value.trim().trim_matches('"').to_ascii_lowercase().as_str() {
            "es" | "es-es" | "spanish" => Some(Self::Es),
            "en" | "en-us" | "en-gb" | "english" => Some(Self::En),
            _ => None,
        }
    }
}

/// Reads the stored language; missing or unreadable values yield the default.
pub fn load_language<R: KvRepository + ?Sized>(repo: &R) -> RepoResult<Language> {
    let Some(raw) = repo.get(LANGUAGE_KEY)? else {
        return Ok(Language::default());
    };
    Ok(Language::parse(&raw).unwrap_or_else(|| {
        warn!("event=settings_decode module=settings status=fallback key={LANGUAGE_KEY}");
        Language::default()
    }))
}

pub fn save_language<R: KvRepository + ?Sized>(repo: &R, language: Language) -> RepoResult<()> {
    repo.set(LANGUAGE_KEY, language.as_str())
}
