//! Highest-priority due item selection.
//!
//! Priority is a strict lexicographic order: never-reviewed items first,
//! then lower knowledge scores (struggling items surface sooner), then
//! earlier `next_due` as a deterministic tie-break. Selection is
//! read-only and does not mark anything in flight; the single-pending-
//! task invariant in `tasks::TaskEngine` is the only in-flight guard, so
//! the same item may legitimately be selected on consecutive ticks while
//! it stays unanswered.

use chrono::{DateTime, Utc};
use std::sync::Arc;
use uuid::Uuid;

use crate::error::RoteResult;
use crate::store::Repository;
use crate::types::Progress;

/// Picks the single highest-priority due item for a learner.
pub struct ReviewSelector {
    repository: Arc<dyn Repository>,
}

impl ReviewSelector {
    /// Create a selector over the given repository.
    pub fn new(repository: Arc<dyn Repository>) -> Self {
        Self { repository }
    }

    /// The highest-priority item due for `learner_id` at `now`, or `None`
    /// when nothing is due. `None` is a normal outcome; the caller skips
    /// the cycle without issuing a question.
    pub fn select_next(&self, learner_id: Uuid, now: DateTime<Utc>) -> RoteResult<Option<Progress>> {
        let due = self.repository.due_for_review(learner_id, now, 1)?;
        Ok(due.into_iter().next())
    }
}
