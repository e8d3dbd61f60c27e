//! Knowledge score update rules.
//!
//! The model is pure: `apply_outcome` maps a mastery record and a graded
//! answer to the successor record, and the caller persists the result.
//! Scores move in fixed steps (+15 correct, -10 incorrect by default),
//! clamped to `[0, 100]`, and the new score selects the next review
//! interval from the configured band table.

use chrono::{DateTime, Utc};

use crate::config::LearningConfig;
use crate::types::Progress;

/// Pure mastery update rules for a learner-item pair.
pub struct MasteryModel {
    config: LearningConfig,
}

impl MasteryModel {
    /// Create a model with the given learning constants.
    pub fn new(config: LearningConfig) -> Self {
        Self { config }
    }

    /// Get the learning constants.
    pub fn config(&self) -> &LearningConfig {
        &self.config
    }

    /// Apply a graded answer to a mastery record.
    ///
    /// Increments the attempt counters, steps the score up or down with
    /// clamping, stamps `last_reviewed`, and schedules `next_due` from the
    /// band the new score lands in. No side effects; the caller persists
    /// the returned record.
    pub fn apply_outcome(&self, progress: &Progress, was_correct: bool, now: DateTime<Utc>) -> Progress {
        let delta: i16 = if was_correct {
            i16::from(self.config.correct_boost)
        } else {
            -i16::from(self.config.incorrect_penalty)
        };
        let score = (i16::from(progress.score) + delta).clamp(0, 100) as u8;

        Progress {
            score,
            last_reviewed: Some(now),
            next_due: now + self.config.interval_for(score),
            total_attempts: progress.total_attempts + 1,
            correct_attempts: progress.correct_attempts + u32::from(was_correct),
            ..progress.clone()
        }
    }
}

impl Default for MasteryModel {
    fn default() -> Self {
        Self::new(LearningConfig::default())
    }
}
