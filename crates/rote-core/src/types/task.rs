//! Issued questions and their lifecycle.
//!
//! A `PendingTask` is one issued question: created in the pending state,
//! answered exactly once, never deleted (it doubles as history). The
//! question kind is a closed enum so the grading dispatch in
//! `tasks::TaskEngine` is exhaustively matched; adding a kind is a
//! compile-time-checked change.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use uuid::Uuid;

use crate::types::Progress;

/// The kind of question issued for an item.
///
/// `Translate*` kinds are open-form (graded by the external classifier);
/// `Choice*` kinds are closed-form (graded by exact match).
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum QuestionKind {
    /// Translate a sentence into the source language.
    TranslateToSource,
    /// Translate a sentence into the target language.
    TranslateToTarget,
    /// Pick the target-language translation of a source term.
    ChoiceToTarget,
    /// Pick the source-language translation of a target term.
    ChoiceToSource,
}

impl QuestionKind {
    /// All question kinds, for random selection on a tick.
    pub fn all() -> &'static [QuestionKind] {
        &[
            QuestionKind::TranslateToSource,
            QuestionKind::TranslateToTarget,
            QuestionKind::ChoiceToTarget,
            QuestionKind::ChoiceToSource,
        ]
    }

    /// Whether grading requires the external classifier.
    pub fn is_open_form(&self) -> bool {
        matches!(
            self,
            QuestionKind::TranslateToSource | QuestionKind::TranslateToTarget
        )
    }
}

/// Generated question content: the renderable prompt plus whatever is
/// needed to grade the answer.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum QuestionContent {
    /// Open-form translation exercise.
    Translation {
        /// Sentence to translate.
        sentence: String,
        /// Canonical correct translation.
        correct_answer: String,
    },
    /// Closed-form multiple choice exercise.
    Choice {
        /// Question text.
        question: String,
        /// Answer options presented to the learner.
        options: Vec<String>,
        /// Index of the correct option.
        correct_index: usize,
    },
}

impl QuestionContent {
    /// The canonical correct answer string for this question.
    pub fn correct_answer(&self) -> &str {
        match self {
            QuestionContent::Translation { correct_answer, .. } => correct_answer,
            QuestionContent::Choice {
                options,
                correct_index,
                ..
            } => options
                .get(*correct_index)
                .map(String::as_str)
                .unwrap_or_default(),
        }
    }

    /// The renderable prompt for this question.
    pub fn prompt(&self) -> &str {
        match self {
            QuestionContent::Translation { sentence, .. } => sentence,
            QuestionContent::Choice { question, .. } => question,
        }
    }
}

/// An issued question instance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PendingTask {
    /// Unique identifier.
    pub id: Uuid,
    /// Learner the question was issued to.
    pub learner_id: Uuid,
    /// Item under test.
    pub item_id: Uuid,
    /// Question kind tag.
    pub kind: QuestionKind,
    /// Generated question payload.
    pub content: QuestionContent,
    /// The learner's raw answer, once submitted.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub answer: Option<String>,
    /// Correctness outcome. `None` while the task is pending.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outcome: Option<bool>,
    /// Grading feedback relayed to the learner.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub feedback: Option<String>,
    /// When the question was issued.
    pub issued_at: DateTime<Utc>,
}

impl PendingTask {
    /// Create a new pending task for an issued question.
    pub fn new(learner_id: Uuid, item_id: Uuid, kind: QuestionKind, content: QuestionContent) -> Self {
        Self {
            id: Uuid::new_v4(),
            learner_id,
            item_id,
            kind,
            content,
            answer: None,
            outcome: None,
            feedback: None,
            issued_at: Utc::now(),
        }
    }

    /// Whether the task is still awaiting an answer.
    pub fn is_pending(&self) -> bool {
        self.outcome.is_none()
    }
}

/// Result of grading an answer, returned for the caller to relay.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GradeReport {
    /// The graded task.
    pub task_id: Uuid,
    /// Whether the answer was correct.
    pub is_correct: bool,
    /// Feedback for the learner.
    pub feedback: String,
    /// Mastery record after the update.
    pub progress: Progress,
}

/// Renderable message delivered to a learner's client.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Notification {
    /// A newly issued question.
    Question {
        task_id: Uuid,
        kind: QuestionKind,
        content: QuestionContent,
    },
    /// Nothing is due; the learner is caught up.
    AllCaughtUp,
    /// A transient failure occurred; the learner should try again later.
    RetryLater,
}
