//! Learner identity and scheduling preferences.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A learner with an independent review schedule.
///
/// `external_id` is the handle the delivery layer uses to address the
/// learner (a chat id, an account name). It is unique and how first
/// contact resolves to a learner row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Learner {
    /// Unique identifier.
    pub id: Uuid,
    /// External client handle (unique).
    pub external_id: String,
    /// Whether the per-learner scheduler is running.
    pub active: bool,
    /// Duration between scheduler ticks.
    pub interval_minutes: u32,
    /// Do-not-disturb window: ticks are silent no-ops until this time.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suppressed_until: Option<DateTime<Utc>>,
    /// When this learner was created.
    pub created_at: DateTime<Utc>,
}

impl Learner {
    /// Create a new inactive learner with the default 30 minute interval.
    pub fn new(external_id: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            external_id: external_id.into(),
            active: false,
            interval_minutes: 30,
            suppressed_until: None,
            created_at: Utc::now(),
        }
    }

    /// Tick interval as a chrono duration.
    pub fn interval(&self) -> Duration {
        Duration::minutes(self.interval_minutes as i64)
    }

    /// Whether ticks should be suppressed at `now`.
    pub fn is_suppressed(&self, now: DateTime<Utc>) -> bool {
        self.suppressed_until.is_some_and(|until| now < until)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_learner_defaults() {
        let learner = Learner::new("chat-42");
        assert!(!learner.active);
        assert_eq!(learner.interval_minutes, 30);
        assert!(learner.suppressed_until.is_none());
    }

    #[test]
    fn test_suppression_window() {
        let mut learner = Learner::new("chat-42");
        let now = Utc::now();
        assert!(!learner.is_suppressed(now));

        learner.suppressed_until = Some(now + Duration::minutes(60));
        assert!(learner.is_suppressed(now + Duration::minutes(10)));
        assert!(!learner.is_suppressed(now + Duration::minutes(70)));
    }
}
