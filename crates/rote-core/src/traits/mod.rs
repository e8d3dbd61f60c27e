//! Traits for external collaborators.
//!
//! The engine treats question generation, answer classification, and
//! message delivery as abstract collaborators; implementations live in
//! companion crates (`rote-llm`) or in the embedding application.

mod classifier;
mod generator;
mod notifier;

pub use classifier::{AnswerClassifier, ClassifierVerdict};
pub use generator::QuestionGenerator;
pub use notifier::{LogNotifier, Notifier};
