//! Per-learner mastery records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A learner's mastery record for one item.
///
/// One row exists per (learner, item) pair the learner has been exposed
/// to, created eagerly when the item enters the learner's pool. The
/// knowledge score is always within `[0, 100]` and `next_due` is always
/// set; a fresh record is due immediately.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Progress {
    /// Unique identifier.
    pub id: Uuid,
    /// Owning learner.
    pub learner_id: Uuid,
    /// Referenced item.
    pub item_id: Uuid,
    /// Knowledge score in `[0, 100]`.
    pub score: u8,
    /// Last time the item was reviewed. `None` means never shown.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_reviewed: Option<DateTime<Utc>>,
    /// Next time the item is due for review.
    pub next_due: DateTime<Utc>,
    /// Total number of graded answers.
    pub total_attempts: u32,
    /// Number of graded answers that were correct.
    pub correct_attempts: u32,
    /// When this record was created.
    pub created_at: DateTime<Utc>,
}

impl Progress {
    /// Create a fresh record for a (learner, item) pair, due immediately.
    pub fn new(learner_id: Uuid, item_id: Uuid) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            learner_id,
            item_id,
            score: 0,
            last_reviewed: None,
            next_due: now,
            total_attempts: 0,
            correct_attempts: 0,
            created_at: now,
        }
    }

    /// Whether the item has never been shown to the learner.
    pub fn is_new(&self) -> bool {
        self.last_reviewed.is_none()
    }

    /// Whether the item is due at `now`.
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.next_due <= now
    }
}

/// Aggregate mastery statistics for one learner.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LearnerStatistics {
    /// Number of items in the learner's pool.
    pub total_items: u32,
    /// Items with score >= 90.
    pub learned_items: u32,
    /// Items with 0 < score < 90.
    pub in_progress_items: u32,
    /// Items with score == 0.
    pub new_items: u32,
    /// Mean knowledge score across the pool (0.0 when the pool is empty).
    pub average_score: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fresh_progress_is_new_and_due() {
        let progress = Progress::new(Uuid::new_v4(), Uuid::new_v4());
        assert!(progress.is_new());
        assert!(progress.is_due(Utc::now()));
        assert_eq!(progress.score, 0);
        assert_eq!(progress.total_attempts, 0);
    }
}
