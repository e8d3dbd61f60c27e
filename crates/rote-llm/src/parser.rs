//! JSON parsing utilities for LLM responses.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;

use rote_core::error::{ErrorCode, RoteError, RoteResult};
use rote_core::traits::ClassifierVerdict;
use rote_core::types::{QuestionContent, QuestionKind};

static CODE_BLOCK_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"```(?:json)?\s*([\s\S]*?)\s*```").unwrap());
static THINK_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)<think>.*?</think>").unwrap());

/// Extract JSON from a potentially wrapped response (code blocks, etc.).
pub fn extract_json(text: &str) -> String {
    let text = THINK_RE.replace_all(text.trim(), "");
    let text = text.trim();

    if let Some(captures) = CODE_BLOCK_RE.captures(text) {
        if let Some(content) = captures.get(1) {
            return content.as_str().trim().to_string();
        }
    }

    text.to_string()
}

/// Raw translation payload from the generator.
#[derive(Debug, Deserialize)]
struct TranslationResponse {
    sentence: String,
    correct_answer: String,
}

/// Raw multiple-choice payload from the generator.
#[derive(Debug, Deserialize)]
struct ChoiceResponse {
    question: String,
    options: Vec<String>,
    correct_index: usize,
}

/// Raw grading payload from the classifier.
#[derive(Debug, Deserialize)]
struct VerdictResponse {
    is_correct: bool,
    #[serde(default)]
    feedback: String,
}

/// Parse generated question content for the given kind.
pub fn parse_question(kind: QuestionKind, response: &str) -> RoteResult<QuestionContent> {
    let json_str = extract_json(response);

    if kind.is_open_form() {
        let parsed: TranslationResponse =
            serde_json::from_str(&json_str).map_err(|e| invalid_question(e.to_string()))?;
        if parsed.sentence.trim().is_empty() || parsed.correct_answer.trim().is_empty() {
            return Err(invalid_question("empty sentence or answer"));
        }
        Ok(QuestionContent::Translation {
            sentence: parsed.sentence,
            correct_answer: parsed.correct_answer,
        })
    } else {
        let parsed: ChoiceResponse =
            serde_json::from_str(&json_str).map_err(|e| invalid_question(e.to_string()))?;
        if parsed.options.len() < 2 {
            return Err(invalid_question("fewer than two options"));
        }
        if parsed.correct_index >= parsed.options.len() {
            return Err(invalid_question(format!(
                "correct_index {} out of bounds for {} options",
                parsed.correct_index,
                parsed.options.len()
            )));
        }
        Ok(QuestionContent::Choice {
            question: parsed.question,
            options: parsed.options,
            correct_index: parsed.correct_index,
        })
    }
}

/// Parse a grading verdict from the classifier response.
pub fn parse_verdict(response: &str) -> RoteResult<ClassifierVerdict> {
    let json_str = extract_json(response);

    let parsed: VerdictResponse =
        serde_json::from_str(&json_str).map_err(|e| RoteError::Grading {
            message: format!("classifier returned invalid JSON: {}", e),
            code: ErrorCode::GrdInvalidResponse,
            source: None,
        })?;

    Ok(ClassifierVerdict {
        is_correct: parsed.is_correct,
        feedback: parsed.feedback,
    })
}

fn invalid_question(detail: impl Into<String>) -> RoteError {
    RoteError::Generation {
        message: format!("generator returned invalid payload: {}", detail.into()),
        code: ErrorCode::GenInvalidResponse,
        source: None,
    }
}
