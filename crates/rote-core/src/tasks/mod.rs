//! Task lifecycle: issuing questions and grading answers.

mod engine;

pub use engine::TaskEngine;
