//! Task state machine: Unissued -> Pending -> Answered.
//!
//! One `PendingTask` instance per issued question. `issue` enforces the
//! single-pending-task invariant; `grade` routes the answer to the
//! grading path for the question kind and, on success, records the
//! outcome and advances the mastery record in one transaction. A failed
//! grade leaves the task pending so the learner can retry, never
//! silently marked wrong.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::time::timeout;
use tracing::{debug, error, warn};
use uuid::Uuid;

use crate::config::RoteConfig;
use crate::error::{RoteError, RoteResult};
use crate::mastery::MasteryModel;
use crate::store::Repository;
use crate::traits::{AnswerClassifier, ClassifierVerdict, QuestionGenerator};
use crate::types::{GradeReport, Item, PendingTask, QuestionContent, QuestionKind};

/// Issues questions and grades answers.
pub struct TaskEngine {
    repository: Arc<dyn Repository>,
    generator: Arc<dyn QuestionGenerator>,
    classifier: Arc<dyn AnswerClassifier>,
    mastery: MasteryModel,
    generation_timeout: Duration,
    grading_timeout: Duration,
}

impl TaskEngine {
    /// Create a task engine over the given collaborators.
    pub fn new(
        repository: Arc<dyn Repository>,
        generator: Arc<dyn QuestionGenerator>,
        classifier: Arc<dyn AnswerClassifier>,
        mastery: MasteryModel,
    ) -> Self {
        Self {
            repository,
            generator,
            classifier,
            mastery,
            generation_timeout: Duration::from_secs(30),
            grading_timeout: Duration::from_secs(30),
        }
    }

    /// Create a task engine with the learning constants and call bounds
    /// taken from `config`.
    pub fn from_config(
        repository: Arc<dyn Repository>,
        generator: Arc<dyn QuestionGenerator>,
        classifier: Arc<dyn AnswerClassifier>,
        config: &RoteConfig,
    ) -> Self {
        Self::new(
            repository,
            generator,
            classifier,
            MasteryModel::new(config.learning.clone()),
        )
        .with_timeouts(config.generation_timeout(), config.grading_timeout())
    }

    /// Set the bounds for external generator/classifier calls.
    pub fn with_timeouts(mut self, generation: Duration, grading: Duration) -> Self {
        self.generation_timeout = generation;
        self.grading_timeout = grading;
        self
    }

    /// Issue a question of `kind` for `item` to the learner.
    ///
    /// Fails with `Conflict` when a pending task already exists (the
    /// caller must check first) and with `Generation` when the external
    /// generator fails or times out; in both cases nothing is persisted.
    pub async fn issue(
        &self,
        learner_id: Uuid,
        item: &Item,
        kind: QuestionKind,
    ) -> RoteResult<PendingTask> {
        if self.repository.find_pending_task(learner_id)?.is_some() {
            // Indicates a logic or race bug in the caller
            error!(%learner_id, "issue called with a task still pending");
            return Err(RoteError::conflict(learner_id));
        }

        let content = match timeout(self.generation_timeout, self.generator.generate(item, kind))
            .await
        {
            Ok(result) => result?,
            Err(_) => {
                return Err(RoteError::generation_timeout(format!(
                    "question generation for item '{}' exceeded {:?}",
                    item.source_term, self.generation_timeout
                )))
            }
        };

        let task = PendingTask::new(learner_id, item.id, kind, content);
        self.repository.insert_task(&task)?;

        debug!(%learner_id, item = %item.source_term, kind = %kind, task_id = %task.id, "issued task");
        Ok(task)
    }

    /// Grade a submitted answer for the task.
    ///
    /// Fails with `NotFound` for an unknown task id, `AlreadyAnswered`
    /// for a duplicate submission, and `Grading` when the classifier
    /// fails; on a grading failure the task stays pending. On success the
    /// outcome and the mastery update are committed together.
    pub async fn grade(&self, task_id: Uuid, raw_answer: &str) -> RoteResult<GradeReport> {
        let task = self
            .repository
            .get_task(task_id)?
            .ok_or_else(|| RoteError::task_not_found(task_id))?;

        if !task.is_pending() {
            warn!(%task_id, "duplicate grade for an answered task");
            return Err(RoteError::already_answered(task_id));
        }

        let verdict = self.evaluate(&task, raw_answer).await?;

        let progress = self
            .repository
            .ensure_progress(task.learner_id, task.item_id)?;
        let updated = self
            .mastery
            .apply_outcome(&progress, verdict.is_correct, Utc::now());

        self.repository.commit_grade(
            task.id,
            raw_answer,
            verdict.is_correct,
            &verdict.feedback,
            &updated,
        )?;

        debug!(
            task_id = %task.id,
            learner_id = %task.learner_id,
            is_correct = verdict.is_correct,
            score = updated.score,
            "graded task"
        );

        Ok(GradeReport {
            task_id: task.id,
            is_correct: verdict.is_correct,
            feedback: verdict.feedback,
            progress: updated,
        })
    }

    /// Grade the learner's single pending task against `raw_answer`.
    ///
    /// Fails with `NotFound` when no task is pending for the learner.
    pub async fn submit_answer(&self, learner_id: Uuid, raw_answer: &str) -> RoteResult<GradeReport> {
        let task = self
            .repository
            .find_pending_task(learner_id)?
            .ok_or_else(|| RoteError::NotFound {
                message: format!("no pending task for learner '{}'", learner_id),
                code: crate::error::ErrorCode::TaskNotFound,
                entity_id: Some(learner_id),
            })?;
        self.grade(task.id, raw_answer).await
    }

    /// Dispatch grading by question kind.
    async fn evaluate(&self, task: &PendingTask, raw_answer: &str) -> RoteResult<ClassifierVerdict> {
        match &task.content {
            // Closed-form: exact case-insensitive match, no external call.
            QuestionContent::Choice { .. } => {
                let correct = task.content.correct_answer();
                let is_correct =
                    raw_answer.trim().to_lowercase() == correct.trim().to_lowercase();
                let feedback = if is_correct {
                    "Correct!".to_string()
                } else {
                    format!("Incorrect. The correct answer is: {}", correct)
                };
                Ok(ClassifierVerdict {
                    is_correct,
                    feedback,
                })
            }
            // Open-form: delegate to the external classifier.
            QuestionContent::Translation { correct_answer, .. } => {
                match timeout(
                    self.grading_timeout,
                    self.classifier
                        .classify(&task.content, correct_answer, raw_answer),
                )
                .await
                {
                    Ok(result) => result.map_err(|e| {
                        warn!(task_id = %task.id, error = %e, "classifier failed, task stays pending");
                        e
                    }),
                    Err(_) => Err(RoteError::grading_timeout(format!(
                        "answer classification for task '{}' exceeded {:?}",
                        task.id, self.grading_timeout
                    ))),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::SqliteRepository;
    use crate::traits::{AnswerClassifier, QuestionGenerator};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, Ordering};

    /// Generator returning a fixed translation question.
    struct FixedGenerator {
        fail: AtomicBool,
    }

    impl FixedGenerator {
        fn new() -> Self {
            Self {
                fail: AtomicBool::new(false),
            }
        }
    }

    #[async_trait]
    impl QuestionGenerator for FixedGenerator {
        async fn generate(&self, item: &Item, kind: QuestionKind) -> RoteResult<QuestionContent> {
            if self.fail.load(Ordering::SeqCst) {
                return Err(RoteError::generation("provider unavailable"));
            }
            Ok(match kind {
                QuestionKind::TranslateToSource | QuestionKind::TranslateToTarget => {
                    QuestionContent::Translation {
                        sentence: format!("Sentence with {}", item.source_term),
                        correct_answer: item.target_term.clone(),
                    }
                }
                QuestionKind::ChoiceToTarget | QuestionKind::ChoiceToSource => {
                    QuestionContent::Choice {
                        question: format!("Translate '{}'", item.source_term),
                        options: vec![item.target_term.clone(), "wrong".into()],
                        correct_index: 0,
                    }
                }
            })
        }
    }

    /// Classifier with a scripted verdict.
    struct ScriptedClassifier {
        verdict: Option<bool>,
    }

    #[async_trait]
    impl AnswerClassifier for ScriptedClassifier {
        async fn classify(
            &self,
            _content: &QuestionContent,
            _correct_answer: &str,
            _raw_answer: &str,
        ) -> RoteResult<ClassifierVerdict> {
            match self.verdict {
                Some(is_correct) => Ok(ClassifierVerdict {
                    is_correct,
                    feedback: "scripted".to_string(),
                }),
                None => Err(RoteError::grading("classifier unavailable")),
            }
        }
    }

    fn engine_with(
        verdict: Option<bool>,
    ) -> (TaskEngine, Arc<SqliteRepository>, Uuid, Item) {
        let store = Arc::new(SqliteRepository::in_memory().unwrap());
        let learner = store.get_or_create_learner("chat-1").unwrap();
        let item = store.get_or_create_item("cat", "кот").unwrap();
        store.ensure_progress(learner.id, item.id).unwrap();

        let engine = TaskEngine::new(
            store.clone(),
            Arc::new(FixedGenerator::new()),
            Arc::new(ScriptedClassifier { verdict }),
            MasteryModel::default(),
        );
        (engine, store, learner.id, item)
    }

    #[tokio::test]
    async fn test_issue_persists_pending_task() {
        let (engine, store, learner_id, item) = engine_with(Some(true));

        let task = engine
            .issue(learner_id, &item, QuestionKind::TranslateToSource)
            .await
            .unwrap();

        let pending = store.find_pending_task(learner_id).unwrap().unwrap();
        assert_eq!(pending.id, task.id);
        assert!(pending.is_pending());
    }

    #[tokio::test]
    async fn test_issue_conflicts_on_pending_task() {
        let (engine, store, learner_id, item) = engine_with(Some(true));

        let first = engine
            .issue(learner_id, &item, QuestionKind::TranslateToSource)
            .await
            .unwrap();

        let err = engine
            .issue(learner_id, &item, QuestionKind::ChoiceToTarget)
            .await
            .unwrap_err();
        assert!(matches!(err, RoteError::Conflict { .. }));

        // The existing task is never silently replaced
        let pending = store.find_pending_task(learner_id).unwrap().unwrap();
        assert_eq!(pending.id, first.id);
        assert_eq!(pending.kind, QuestionKind::TranslateToSource);
    }

    #[tokio::test]
    async fn test_issue_generator_failure_persists_nothing() {
        let (_unused, store, learner_id, item) = engine_with(Some(true));

        let generator = FixedGenerator::new();
        generator.fail.store(true, Ordering::SeqCst);
        let engine = TaskEngine::new(
            store.clone(),
            Arc::new(generator),
            Arc::new(ScriptedClassifier { verdict: Some(true) }),
            MasteryModel::default(),
        );

        let err = engine
            .issue(learner_id, &item, QuestionKind::TranslateToSource)
            .await
            .unwrap_err();
        assert!(matches!(err, RoteError::Generation { .. }));
        assert!(store.find_pending_task(learner_id).unwrap().is_none());
    }

    #[tokio::test]
    async fn test_grade_correct_answer_advances_mastery() {
        let (engine, store, learner_id, item) = engine_with(Some(true));

        let task = engine
            .issue(learner_id, &item, QuestionKind::TranslateToSource)
            .await
            .unwrap();

        let report = engine.grade(task.id, "кот").await.unwrap();
        assert!(report.is_correct);
        assert_eq!(report.progress.score, 15);
        assert_eq!(report.progress.total_attempts, 1);
        assert_eq!(report.progress.correct_attempts, 1);
        assert!(report.progress.last_reviewed.is_some());

        let saved = store.get_progress(learner_id, item.id).unwrap().unwrap();
        assert_eq!(saved.score, 15);
    }

    #[tokio::test]
    async fn test_grade_unknown_task() {
        let (engine, _store, _learner_id, _item) = engine_with(Some(true));
        let err = engine.grade(Uuid::new_v4(), "answer").await.unwrap_err();
        assert!(matches!(err, RoteError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_grade_twice_is_already_answered() {
        let (engine, store, learner_id, item) = engine_with(Some(true));

        let task = engine
            .issue(learner_id, &item, QuestionKind::TranslateToSource)
            .await
            .unwrap();
        engine.grade(task.id, "кот").await.unwrap();

        let err = engine.grade(task.id, "другое").await.unwrap_err();
        assert!(matches!(err, RoteError::AlreadyAnswered { .. }));

        // Outcome unchanged
        let stored = store.get_task(task.id).unwrap().unwrap();
        assert_eq!(stored.outcome, Some(true));
        assert_eq!(stored.answer.as_deref(), Some("кот"));
    }

    #[tokio::test]
    async fn test_closed_form_graded_without_classifier() {
        // Classifier that would fail if called
        let (engine, _store, learner_id, item) = engine_with(None);

        let task = engine
            .issue(learner_id, &item, QuestionKind::ChoiceToTarget)
            .await
            .unwrap();

        // Case-insensitive match against the correct option
        let report = engine.grade(task.id, " КОТ ").await.unwrap();
        assert!(report.is_correct);

        let task_id = report.task_id;
        let err = engine.grade(task_id, "кот").await.unwrap_err();
        assert!(matches!(err, RoteError::AlreadyAnswered { .. }));
    }

    #[tokio::test]
    async fn test_closed_form_wrong_option() {
        let (engine, _store, learner_id, item) = engine_with(None);

        let task = engine
            .issue(learner_id, &item, QuestionKind::ChoiceToSource)
            .await
            .unwrap();

        let report = engine.grade(task.id, "wrong").await.unwrap();
        assert!(!report.is_correct);
        assert!(report.feedback.contains("кот"));
        assert_eq!(report.progress.score, 0, "penalty clamps at the floor");
    }

    #[tokio::test]
    async fn test_classifier_failure_keeps_task_pending() {
        let (engine, store, learner_id, item) = engine_with(None);

        let task = engine
            .issue(learner_id, &item, QuestionKind::TranslateToTarget)
            .await
            .unwrap();

        let err = engine.grade(task.id, "my answer").await.unwrap_err();
        assert!(matches!(err, RoteError::Grading { .. }));

        // Task stays pending, progress untouched
        let stored = store.get_task(task.id).unwrap().unwrap();
        assert!(stored.is_pending());
        let progress = store.get_progress(learner_id, item.id).unwrap().unwrap();
        assert_eq!(progress.total_attempts, 0);
    }

    #[tokio::test]
    async fn test_regrade_after_classifier_failure_is_accepted() {
        let store = Arc::new(SqliteRepository::in_memory().unwrap());
        let learner = store.get_or_create_learner("chat-1").unwrap();
        let item = store.get_or_create_item("cat", "кот").unwrap();
        store.ensure_progress(learner.id, item.id).unwrap();

        let failing = TaskEngine::new(
            store.clone(),
            Arc::new(FixedGenerator::new()),
            Arc::new(ScriptedClassifier { verdict: None }),
            MasteryModel::default(),
        );
        let task = failing
            .issue(learner.id, &item, QuestionKind::TranslateToSource)
            .await
            .unwrap();
        assert!(failing.grade(task.id, "answer").await.is_err());

        // Same task id grades fine once the classifier recovers
        let recovered = TaskEngine::new(
            store.clone(),
            Arc::new(FixedGenerator::new()),
            Arc::new(ScriptedClassifier { verdict: Some(false) }),
            MasteryModel::default(),
        );
        let report = recovered.grade(task.id, "answer").await.unwrap();
        assert!(!report.is_correct);
    }

    #[tokio::test]
    async fn test_submit_answer_routes_to_pending_task() {
        let (engine, _store, learner_id, item) = engine_with(Some(true));

        let err = engine.submit_answer(learner_id, "answer").await.unwrap_err();
        assert!(matches!(err, RoteError::NotFound { .. }));

        let task = engine
            .issue(learner_id, &item, QuestionKind::TranslateToSource)
            .await
            .unwrap();
        let report = engine.submit_answer(learner_id, "кот").await.unwrap();
        assert_eq!(report.task_id, task.id);
    }

    #[tokio::test]
    async fn test_from_config_applies_learning_constants() {
        let store = Arc::new(SqliteRepository::in_memory().unwrap());
        let learner = store.get_or_create_learner("chat-1").unwrap();
        let item = store.get_or_create_item("cat", "кот").unwrap();
        store.ensure_progress(learner.id, item.id).unwrap();

        let mut config = RoteConfig::default();
        config.learning.correct_boost = 20;
        let engine = TaskEngine::from_config(
            store.clone(),
            Arc::new(FixedGenerator::new()),
            Arc::new(ScriptedClassifier { verdict: Some(true) }),
            &config,
        );

        let task = engine
            .issue(learner.id, &item, QuestionKind::TranslateToSource)
            .await
            .unwrap();
        let report = engine.grade(task.id, "кот").await.unwrap();
        assert_eq!(report.progress.score, 20);
    }

    #[tokio::test]
    async fn test_generation_timeout_converts_to_error() {
        struct StallingGenerator;

        #[async_trait]
        impl QuestionGenerator for StallingGenerator {
            async fn generate(
                &self,
                _item: &Item,
                _kind: QuestionKind,
            ) -> RoteResult<QuestionContent> {
                tokio::time::sleep(Duration::from_secs(60)).await;
                unreachable!("call must be bounded by the engine timeout")
            }
        }

        let store = Arc::new(SqliteRepository::in_memory().unwrap());
        let learner = store.get_or_create_learner("chat-1").unwrap();
        let item = store.get_or_create_item("cat", "кот").unwrap();
        store.ensure_progress(learner.id, item.id).unwrap();

        let engine = TaskEngine::new(
            store.clone(),
            Arc::new(StallingGenerator),
            Arc::new(ScriptedClassifier { verdict: Some(true) }),
            MasteryModel::default(),
        )
        .with_timeouts(Duration::from_millis(50), Duration::from_millis(50));

        let err = engine
            .issue(learner.id, &item, QuestionKind::TranslateToSource)
            .await
            .unwrap_err();
        assert!(matches!(err, RoteError::Generation { .. }));
        assert!(store.find_pending_task(learner.id).unwrap().is_none());
    }
}
