//! Core types for the rote review engine.

mod item;
mod learner;
mod progress;
mod task;

pub use item::Item;
pub use learner::Learner;
pub use progress::{LearnerStatistics, Progress};
pub use task::{GradeReport, Notification, PendingTask, QuestionContent, QuestionKind};
