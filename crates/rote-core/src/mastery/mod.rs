//! Mastery model: pure update rules for knowledge scores and due times.

mod model;

pub use model::MasteryModel;
