//! Answer classifier trait for open-form grading.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::RoteResult;
use crate::types::QuestionContent;

/// Verdict from the answer classifier.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassifierVerdict {
    /// Whether the answer is accepted as correct.
    pub is_correct: bool,
    /// Short feedback for the learner.
    pub feedback: String,
}

/// Grades free-text answers semantically.
///
/// Treated as slow, fallible, and non-deterministic: the same input may
/// yield different verdicts across calls. The engine bounds each call
/// with a timeout and converts failures to `Grading` errors, leaving the
/// task pending so grading can be retried.
#[async_trait]
pub trait AnswerClassifier: Send + Sync {
    /// Classify `raw_answer` against the question and its canonical answer.
    async fn classify(
        &self,
        content: &QuestionContent,
        correct_answer: &str,
        raw_answer: &str,
    ) -> RoteResult<ClassifierVerdict>;
}
