//! Question generator trait.

use async_trait::async_trait;

use crate::error::RoteResult;
use crate::types::{Item, QuestionContent, QuestionKind};

/// Produces question content for an item and kind.
///
/// May fail transiently; the engine bounds each call with a timeout and
/// converts failures to `Generation` errors so the scheduler can retry
/// on the next tick.
#[async_trait]
pub trait QuestionGenerator: Send + Sync {
    /// Generate question content for `item` tested as `kind`.
    ///
    /// The returned content always carries both the renderable prompt and
    /// the canonical correct answer(s).
    async fn generate(&self, item: &Item, kind: QuestionKind) -> RoteResult<QuestionContent>;
}
