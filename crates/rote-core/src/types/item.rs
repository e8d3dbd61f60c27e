//! Vocabulary items under study.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A (source-term, target-term) vocabulary pair, shared across learners.
///
/// Immutable once created; lookup is by normalized source term.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Item {
    /// Unique identifier.
    pub id: Uuid,
    /// Term in the language being studied (normalized, unique).
    pub source_term: String,
    /// Translation in the learner's language.
    pub target_term: String,
    /// When this item was created.
    pub created_at: DateTime<Utc>,
}

impl Item {
    /// Create a new item, normalizing the source term.
    pub fn new(source_term: impl AsRef<str>, target_term: impl AsRef<str>) -> Self {
        Self {
            id: Uuid::new_v4(),
            source_term: Self::normalize(source_term.as_ref()),
            target_term: target_term.as_ref().trim().to_string(),
            created_at: Utc::now(),
        }
    }

    /// Normalize a source term for lookup: trimmed and lowercased.
    pub fn normalize(term: &str) -> String {
        term.trim().to_lowercase()
    }
}
