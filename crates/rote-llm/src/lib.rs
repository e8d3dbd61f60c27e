//! rote-llm - LLM-backed question generation and grading for rote.
//!
//! This crate implements the `QuestionGenerator` and `AnswerClassifier`
//! traits from rote-core against the OpenAI chat completions API. Any
//! OpenAI-compatible provider works through `base_url`.
//!
//! # Example
//!
//! ```ignore
//! use rote_llm::{OpenAiTaskService, TaskServiceConfig};
//! use std::sync::Arc;
//!
//! let service = Arc::new(OpenAiTaskService::new(TaskServiceConfig::default())?);
//!
//! // The same service fills both collaborator seats
//! let tasks = TaskEngine::new(store, service.clone(), service, MasteryModel::default());
//! ```

pub mod parser;
pub mod prompts;

mod openai;

pub use openai::{OpenAiTaskService, TaskServiceConfig};

// Re-export the trait seats this crate fills
pub use rote_core::traits::{AnswerClassifier, ClassifierVerdict, QuestionGenerator};
