//! Review engine: per-learner tick execution and answer intake.
//!
//! All mutations of a learner's Progress/PendingTask state funnel through
//! one per-learner async mutex, so a scheduler tick and a concurrently
//! arriving answer can never interleave for the same learner while
//! different learners proceed in parallel.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use rand::seq::SliceRandom;
use tokio::sync::{Mutex, RwLock};
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::{RoteError, RoteResult};
use crate::review::ReviewSelector;
use crate::store::Repository;
use crate::tasks::TaskEngine;
use crate::traits::Notifier;
use crate::types::{GradeReport, Item, LearnerStatistics, Notification, Progress, QuestionKind};

/// What a scheduler tick did for a learner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickOutcome {
    /// A question was issued.
    Issued { task_id: Uuid },
    /// Nothing is due; the learner was told they are caught up.
    CaughtUp,
    /// The learner's previous question is still unanswered.
    AwaitingAnswer,
    /// The learner is inside a do-not-disturb window; silent no-op.
    Suppressed,
    /// The learner is not active; silent no-op.
    Inactive,
    /// Question generation failed; the learner was told to expect a retry.
    GenerationFailed,
}

/// Orchestrates review selection, task issue, and grading per learner.
pub struct ReviewEngine {
    repository: Arc<dyn Repository>,
    selector: ReviewSelector,
    tasks: TaskEngine,
    notifier: Arc<dyn Notifier>,
    /// Per-learner guards: tick and grade for the same learner are
    /// mutually exclusive; learners never block one another.
    locks: RwLock<HashMap<Uuid, Arc<Mutex<()>>>>,
}

impl ReviewEngine {
    /// Create an engine over the given collaborators.
    pub fn new(
        repository: Arc<dyn Repository>,
        tasks: TaskEngine,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            selector: ReviewSelector::new(repository.clone()),
            repository,
            tasks,
            notifier,
            locks: RwLock::new(HashMap::new()),
        }
    }

    /// Run one review cycle for the learner.
    ///
    /// Checks the active flag and the suppression window, selects the
    /// highest-priority due item, and issues one question. Transient
    /// generator failures are absorbed here: the learner gets a
    /// retry-later notice and the next tick tries again.
    pub async fn tick(&self, learner_id: Uuid) -> RoteResult<TickOutcome> {
        let lock = self.learner_lock(learner_id).await;
        let _guard = lock.lock().await;

        let now = Utc::now();
        let learner = self
            .repository
            .get_learner(learner_id)?
            .ok_or_else(|| RoteError::learner_not_found(learner_id))?;

        if !learner.active {
            return Ok(TickOutcome::Inactive);
        }
        if learner.is_suppressed(now) {
            return Ok(TickOutcome::Suppressed);
        }
        if self.repository.find_pending_task(learner_id)?.is_some() {
            // The single-pending-task invariant: never issue over an
            // unanswered question.
            return Ok(TickOutcome::AwaitingAnswer);
        }

        let Some(progress) = self.selector.select_next(learner_id, now)? else {
            self.notify(learner_id, Notification::AllCaughtUp).await;
            return Ok(TickOutcome::CaughtUp);
        };

        let item = self
            .repository
            .get_item(progress.item_id)?
            .ok_or_else(|| RoteError::item_not_found(progress.item_id))?;

        let kind = QuestionKind::all()
            .choose(&mut rand::thread_rng())
            .copied()
            .unwrap_or(QuestionKind::ChoiceToTarget);

        match self.tasks.issue(learner_id, &item, kind).await {
            Ok(task) => {
                self.notify(
                    learner_id,
                    Notification::Question {
                        task_id: task.id,
                        kind: task.kind,
                        content: task.content.clone(),
                    },
                )
                .await;
                Ok(TickOutcome::Issued { task_id: task.id })
            }
            Err(e) if e.is_transient() => {
                warn!(%learner_id, error = %e, "question generation failed, retrying next tick");
                self.notify(learner_id, Notification::RetryLater).await;
                Ok(TickOutcome::GenerationFailed)
            }
            Err(e) => Err(e),
        }
    }

    /// Grade the learner's pending question against a submitted answer.
    ///
    /// Mutually exclusive with `tick` for the same learner.
    pub async fn submit_answer(&self, learner_id: Uuid, raw_answer: &str) -> RoteResult<GradeReport> {
        let lock = self.learner_lock(learner_id).await;
        let _guard = lock.lock().await;

        self.tasks.submit_answer(learner_id, raw_answer).await
    }

    /// Add an item to a learner's pool, creating the shared item and the
    /// eager mastery record as needed. The new record is due immediately.
    pub fn enroll_item(
        &self,
        learner_id: Uuid,
        source_term: &str,
        target_term: &str,
    ) -> RoteResult<(Item, Progress)> {
        let item = self.repository.get_or_create_item(source_term, target_term)?;
        let progress = self.repository.ensure_progress(learner_id, item.id)?;
        info!(%learner_id, item = %item.source_term, "item enrolled");
        Ok((item, progress))
    }

    /// Ensure the learner has a mastery record for every known item.
    pub fn enroll_all_items(&self, learner_id: Uuid) -> RoteResult<usize> {
        let items = self.repository.list_items()?;
        let count = items.len();
        for item in items {
            self.repository.ensure_progress(learner_id, item.id)?;
        }
        Ok(count)
    }

    /// Aggregate mastery statistics for the learner.
    pub fn statistics(&self, learner_id: Uuid) -> RoteResult<LearnerStatistics> {
        self.repository.statistics(learner_id)
    }

    /// The backing repository.
    pub fn repository(&self) -> &Arc<dyn Repository> {
        &self.repository
    }

    async fn learner_lock(&self, learner_id: Uuid) -> Arc<Mutex<()>> {
        if let Some(lock) = self.locks.read().await.get(&learner_id) {
            return lock.clone();
        }
        let mut locks = self.locks.write().await;
        locks
            .entry(learner_id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    async fn notify(&self, learner_id: Uuid, message: Notification) {
        // Fire-and-forget: delivery failures never escalate into
        // scheduling failures.
        if let Err(e) = self.notifier.notify(learner_id, message).await {
            warn!(%learner_id, error = %e, "notification delivery failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mastery::MasteryModel;
    use crate::store::SqliteRepository;
    use crate::traits::{AnswerClassifier, ClassifierVerdict, QuestionGenerator};
    use crate::types::QuestionContent;
    use async_trait::async_trait;
    use chrono::Duration;
    use std::sync::Mutex as StdMutex;

    struct EchoGenerator;

    #[async_trait]
    impl QuestionGenerator for EchoGenerator {
        async fn generate(&self, item: &Item, kind: QuestionKind) -> RoteResult<QuestionContent> {
            Ok(if kind.is_open_form() {
                QuestionContent::Translation {
                    sentence: format!("Sentence with {}", item.source_term),
                    correct_answer: item.target_term.clone(),
                }
            } else {
                QuestionContent::Choice {
                    question: format!("Translate '{}'", item.source_term),
                    options: vec![item.target_term.clone(), "wrong".into()],
                    correct_index: 0,
                }
            })
        }
    }

    struct FailingGenerator;

    #[async_trait]
    impl QuestionGenerator for FailingGenerator {
        async fn generate(&self, _item: &Item, _kind: QuestionKind) -> RoteResult<QuestionContent> {
            Err(RoteError::generation("provider unavailable"))
        }
    }

    struct AlwaysRight;

    #[async_trait]
    impl AnswerClassifier for AlwaysRight {
        async fn classify(
            &self,
            _content: &QuestionContent,
            _correct: &str,
            _raw: &str,
        ) -> RoteResult<ClassifierVerdict> {
            Ok(ClassifierVerdict {
                is_correct: true,
                feedback: "ok".into(),
            })
        }
    }

    /// Notifier recording everything it delivers.
    #[derive(Default)]
    struct RecordingNotifier {
        messages: StdMutex<Vec<(Uuid, Notification)>>,
    }

    impl RecordingNotifier {
        fn count(&self) -> usize {
            self.messages.lock().unwrap().len()
        }

        fn last(&self) -> Option<Notification> {
            self.messages.lock().unwrap().last().map(|(_, n)| n.clone())
        }
    }

    #[async_trait]
    impl Notifier for RecordingNotifier {
        async fn notify(&self, learner_id: Uuid, message: Notification) -> RoteResult<()> {
            self.messages.lock().unwrap().push((learner_id, message));
            Ok(())
        }
    }

    fn engine_with_generator(
        generator: Arc<dyn QuestionGenerator>,
    ) -> (ReviewEngine, Arc<SqliteRepository>, Arc<RecordingNotifier>) {
        let store = Arc::new(SqliteRepository::in_memory().unwrap());
        let notifier = Arc::new(RecordingNotifier::default());
        let tasks = TaskEngine::new(
            store.clone(),
            generator,
            Arc::new(AlwaysRight),
            MasteryModel::default(),
        );
        let engine = ReviewEngine::new(store.clone(), tasks, notifier.clone());
        (engine, store, notifier)
    }

    fn setup() -> (ReviewEngine, Arc<SqliteRepository>, Arc<RecordingNotifier>) {
        engine_with_generator(Arc::new(EchoGenerator))
    }

    fn active_learner(store: &SqliteRepository, external_id: &str) -> Uuid {
        let mut learner = store.get_or_create_learner(external_id).unwrap();
        learner.active = true;
        store.update_learner(&learner).unwrap();
        learner.id
    }

    #[tokio::test]
    async fn test_tick_issues_question_for_due_item() {
        let (engine, store, notifier) = setup();
        let learner_id = active_learner(&store, "chat-1");
        engine.enroll_item(learner_id, "cat", "кот").unwrap();

        let outcome = engine.tick(learner_id).await.unwrap();
        assert!(matches!(outcome, TickOutcome::Issued { .. }));
        assert!(matches!(notifier.last(), Some(Notification::Question { .. })));
        assert!(store.find_pending_task(learner_id).unwrap().is_some());
    }

    #[tokio::test]
    async fn test_tick_caught_up_when_nothing_due() {
        let (engine, store, notifier) = setup();
        let learner_id = active_learner(&store, "chat-1");

        let outcome = engine.tick(learner_id).await.unwrap();
        assert_eq!(outcome, TickOutcome::CaughtUp);
        assert!(matches!(notifier.last(), Some(Notification::AllCaughtUp)));
    }

    #[tokio::test]
    async fn test_tick_inactive_learner_is_silent() {
        let (engine, store, notifier) = setup();
        let learner = store.get_or_create_learner("chat-1").unwrap();

        let outcome = engine.tick(learner.id).await.unwrap();
        assert_eq!(outcome, TickOutcome::Inactive);
        assert_eq!(notifier.count(), 0);
    }

    #[tokio::test]
    async fn test_tick_suppressed_is_silent() {
        let (engine, store, notifier) = setup();
        let learner_id = active_learner(&store, "chat-1");
        engine.enroll_item(learner_id, "cat", "кот").unwrap();

        let mut learner = store.get_learner(learner_id).unwrap().unwrap();
        learner.suppressed_until = Some(Utc::now() + Duration::minutes(60));
        store.update_learner(&learner).unwrap();

        // Inside the window: no question, no notification at all
        let outcome = engine.tick(learner_id).await.unwrap();
        assert_eq!(outcome, TickOutcome::Suppressed);
        assert_eq!(notifier.count(), 0);

        // Window elapsed: back to normal
        learner.suppressed_until = Some(Utc::now() - Duration::seconds(1));
        store.update_learner(&learner).unwrap();
        let outcome = engine.tick(learner_id).await.unwrap();
        assert!(matches!(outcome, TickOutcome::Issued { .. }));
    }

    #[tokio::test]
    async fn test_tick_waits_for_unanswered_question() {
        let (engine, store, _notifier) = setup();
        let learner_id = active_learner(&store, "chat-1");
        engine.enroll_item(learner_id, "cat", "кот").unwrap();

        let first = engine.tick(learner_id).await.unwrap();
        let TickOutcome::Issued { task_id } = first else {
            panic!("expected a question, got {:?}", first);
        };

        // Next tick must not issue a second question
        let second = engine.tick(learner_id).await.unwrap();
        assert_eq!(second, TickOutcome::AwaitingAnswer);
        assert_eq!(
            store.find_pending_task(learner_id).unwrap().unwrap().id,
            task_id
        );
    }

    #[tokio::test]
    async fn test_generation_failure_notifies_and_recovers() {
        let (engine, store, notifier) = engine_with_generator(Arc::new(FailingGenerator));
        let learner_id = active_learner(&store, "chat-1");
        engine.enroll_item(learner_id, "cat", "кот").unwrap();

        let outcome = engine.tick(learner_id).await.unwrap();
        assert_eq!(outcome, TickOutcome::GenerationFailed);
        assert!(matches!(notifier.last(), Some(Notification::RetryLater)));
        assert!(store.find_pending_task(learner_id).unwrap().is_none());
    }

    #[tokio::test]
    async fn test_answer_flow_end_to_end() {
        let (engine, store, _notifier) = setup();
        let learner_id = active_learner(&store, "chat-1");
        let (item, _progress) = engine.enroll_item(learner_id, "cat", "кот").unwrap();

        let outcome = engine.tick(learner_id).await.unwrap();
        assert!(matches!(outcome, TickOutcome::Issued { .. }));

        let report = engine.submit_answer(learner_id, "кот").await.unwrap();
        assert!(report.is_correct);
        assert_eq!(report.progress.score, 15);
        assert_eq!(report.progress.total_attempts, 1);
        assert_eq!(report.progress.correct_attempts, 1);

        // 15 lands in the half-hour band
        let saved = store.get_progress(learner_id, item.id).unwrap().unwrap();
        let lead = saved.next_due - Utc::now();
        assert!(lead > Duration::minutes(29) && lead <= Duration::minutes(30));

        let stats = engine.statistics(learner_id).unwrap();
        assert_eq!(stats.total_items, 1);
        assert_eq!(stats.in_progress_items, 1);
    }

    #[tokio::test]
    async fn test_enroll_all_items() {
        let (engine, store, _notifier) = setup();
        let learner_id = active_learner(&store, "chat-1");

        store.get_or_create_item("apple", "яблоко").unwrap();
        store.get_or_create_item("book", "книга").unwrap();
        store.get_or_create_item("cat", "кот").unwrap();

        let count = engine.enroll_all_items(learner_id).unwrap();
        assert_eq!(count, 3);
        assert_eq!(engine.statistics(learner_id).unwrap().total_items, 3);

        // Idempotent
        engine.enroll_all_items(learner_id).unwrap();
        assert_eq!(engine.statistics(learner_id).unwrap().total_items, 3);
    }
}
