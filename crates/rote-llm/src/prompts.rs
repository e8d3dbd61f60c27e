//! Prompt templates for question generation and answer grading.

use rote_core::types::{Item, QuestionContent, QuestionKind};

/// System prompt for question generation.
pub const GENERATION_SYSTEM_PROMPT: &str = "You are a language-learning assistant. \
    Respond with strict JSON only, no markdown and no extra text.";

/// System prompt for answer grading.
pub const GRADING_SYSTEM_PROMPT: &str = "You grade translations. Be lenient with minor \
    grammar and word-order differences, strict with meaning. Respond with strict JSON only.";

/// Build the generation prompt for an item tested as the given kind.
pub fn generation_prompt(item: &Item, kind: QuestionKind) -> String {
    match kind {
        QuestionKind::TranslateToSource => format!(
            r#"Create a translation exercise for the term "{source}" (translation: "{target}").

Write one simple sentence in the learner's TARGET language using "{target}".

Return strict JSON (no markdown, no ```json):
{{
  "sentence": "sentence using {target}",
  "correct_answer": "correct translation of the sentence using {source}"
}}"#,
            source = item.source_term,
            target = item.target_term,
        ),
        QuestionKind::TranslateToTarget => format!(
            r#"Create a translation exercise for the term "{source}" (translation: "{target}").

Write one simple sentence in the learner's SOURCE language using "{source}".

Return strict JSON (no markdown, no ```json):
{{
  "sentence": "sentence using {source}",
  "correct_answer": "correct translation of the sentence using {target}"
}}"#,
            source = item.source_term,
            target = item.target_term,
        ),
        QuestionKind::ChoiceToTarget => format!(
            r#"Create a multiple-choice exercise for the term "{source}".

The correct translation is "{target}". Invent 3 wrong but plausible translations.

Return strict JSON (no markdown, no ```json):
{{
  "question": "How is '{source}' translated?",
  "options": ["option1", "option2", "option3", "option4"],
  "correct_index": 0
}}

IMPORTANT: the correct answer "{target}" must sit at position correct_index in options."#,
            source = item.source_term,
            target = item.target_term,
        ),
        QuestionKind::ChoiceToSource => format!(
            r#"Create a multiple-choice exercise for the term "{target}".

The correct translation is "{source}". Invent 3 wrong but plausible translations.

Return strict JSON (no markdown, no ```json):
{{
  "question": "How is '{target}' translated?",
  "options": ["option1", "option2", "option3", "option4"],
  "correct_index": 0
}}

IMPORTANT: the correct answer "{source}" must sit at position correct_index in options."#,
            source = item.source_term,
            target = item.target_term,
        ),
    }
}

/// Build the grading prompt for an open-form answer.
pub fn grading_prompt(content: &QuestionContent, correct_answer: &str, raw_answer: &str) -> String {
    format!(
        r#"Grade this translation.

Original sentence: "{sentence}"
Reference translation: "{correct}"
Learner's answer: "{answer}"

Judge how close the learner's answer is to the reference. Accept synonyms,
different word order, and small grammatical differences.

Return strict JSON (no markdown, no ```json):
{{
  "is_correct": true or false,
  "feedback": "short comment (1-2 sentences)"
}}"#,
        sentence = content.prompt(),
        correct = correct_answer,
        answer = raw_answer,
    )
}
