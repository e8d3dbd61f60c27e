//! Storage repository trait and SQLite implementation.

mod sqlite;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::RoteResult;
use crate::types::{Item, Learner, LearnerStatistics, PendingTask, Progress};

pub use sqlite::SqliteRepository;

/// Repository for learners, items, progress, and task history.
///
/// Implementations must keep the ordered due-query efficient and provide
/// update-if-unset semantics for task outcomes (`commit_grade`), which is
/// what makes the answered-exactly-once invariant hold under races.
pub trait Repository: Send + Sync {
    // ==================== Learner ====================

    /// Get a learner by id.
    fn get_learner(&self, id: Uuid) -> RoteResult<Option<Learner>>;

    /// Get a learner by its external client handle.
    fn get_learner_by_external_id(&self, external_id: &str) -> RoteResult<Option<Learner>>;

    /// Get the learner for an external handle, creating an inactive one on
    /// first contact.
    fn get_or_create_learner(&self, external_id: &str) -> RoteResult<Learner>;

    /// Update a learner row.
    fn update_learner(&self, learner: &Learner) -> RoteResult<()>;

    /// All learners with active review schedules, for job restoration at
    /// startup.
    fn list_active_learners(&self) -> RoteResult<Vec<Learner>>;

    // ==================== Item ====================

    /// Get an item by id.
    fn get_item(&self, id: Uuid) -> RoteResult<Option<Item>>;

    /// Get an item by normalized source term, creating it if absent.
    fn get_or_create_item(&self, source_term: &str, target_term: &str) -> RoteResult<Item>;

    /// Get all items.
    fn list_items(&self) -> RoteResult<Vec<Item>>;

    // ==================== Progress ====================

    /// Get the mastery record for a (learner, item) pair.
    fn get_progress(&self, learner_id: Uuid, item_id: Uuid) -> RoteResult<Option<Progress>>;

    /// Ensure a mastery record exists for a (learner, item) pair,
    /// returning the existing or freshly created row. New rows are due
    /// immediately.
    fn ensure_progress(&self, learner_id: Uuid, item_id: Uuid) -> RoteResult<Progress>;

    /// Mastery records for `learner_id` due at or before `now`, ordered by
    /// review priority: never-reviewed first, then score ascending, then
    /// `next_due` ascending.
    fn due_for_review(
        &self,
        learner_id: Uuid,
        now: DateTime<Utc>,
        limit: usize,
    ) -> RoteResult<Vec<Progress>>;

    /// Update a mastery record.
    fn update_progress(&self, progress: &Progress) -> RoteResult<()>;

    /// Aggregate mastery statistics for a learner.
    fn statistics(&self, learner_id: Uuid) -> RoteResult<LearnerStatistics>;

    // ==================== Tasks ====================

    /// Persist a newly issued task.
    fn insert_task(&self, task: &PendingTask) -> RoteResult<()>;

    /// Get a task by id.
    fn get_task(&self, id: Uuid) -> RoteResult<Option<PendingTask>>;

    /// The learner's unanswered task, if any.
    fn find_pending_task(&self, learner_id: Uuid) -> RoteResult<Option<PendingTask>>;

    /// Atomically record a grade: set the task's answer, outcome, and
    /// feedback (only if the outcome is still unset) and persist the
    /// updated mastery record in the same transaction.
    ///
    /// Fails with `AlreadyAnswered` when the outcome was set concurrently;
    /// in that case the stored outcome is left untouched.
    fn commit_grade(
        &self,
        task_id: Uuid,
        answer: &str,
        is_correct: bool,
        feedback: &str,
        progress: &Progress,
    ) -> RoteResult<()>;
}
