//! rote-core - Core library for rote.
//!
//! This crate provides the spaced-repetition scheduler: mastery scoring,
//! due-item selection, the question/answer task state machine, and the
//! per-learner review scheduler.
//!
//! # Example
//!
//! ```ignore
//! use rote_core::{MasteryModel, ReviewEngine, ReviewScheduler, SqliteRepository, TaskEngine};
//! use rote_core::traits::LogNotifier;
//! use std::sync::Arc;
//!
//! let store = Arc::new(SqliteRepository::new("rote.db")?);
//! let tasks = TaskEngine::new(store.clone(), generator, classifier, MasteryModel::default());
//! let engine = Arc::new(ReviewEngine::new(store, tasks, Arc::new(LogNotifier)));
//!
//! let scheduler = ReviewScheduler::new(engine.clone()).await?;
//! scheduler.start().await?;
//! scheduler.activate(learner_id, Some(30)).await?;
//!
//! // Later, when the learner responds
//! let report = engine.submit_answer(learner_id, "кот").await?;
//! ```

pub mod config;
pub mod engine;
pub mod error;
pub mod mastery;
pub mod review;
pub mod scheduler;
pub mod store;
pub mod tasks;
pub mod traits;
pub mod types;

// Re-export commonly used types
pub use config::{LearningConfig, RoteConfig, ScoreBand};
pub use engine::{ReviewEngine, TickOutcome};
pub use error::{ErrorCode, RoteError, RoteResult};
pub use mastery::MasteryModel;
pub use review::ReviewSelector;
pub use scheduler::ReviewScheduler;
pub use store::{Repository, SqliteRepository};
pub use tasks::TaskEngine;
pub use traits::{AnswerClassifier, ClassifierVerdict, Notifier, QuestionGenerator};
pub use types::{
    GradeReport, Item, Learner, LearnerStatistics, Notification, PendingTask, Progress,
    QuestionContent, QuestionKind,
};
