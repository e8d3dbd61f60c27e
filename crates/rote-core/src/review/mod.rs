//! Review selection: which item a learner should be tested on next.

mod selector;

pub use selector::ReviewSelector;
