pub mod openai;
pub mod verdict;

pub use openai::OpenAiProvider;
pub use verdict::{parse_reply, parse_verdict};

use async_trait::async_trait;
use subwatch_core::{CoreError, Verdict, VerdictKind};

/// Scores text against an operator-supplied rubric.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Which outcome field this deployment asks the model for.
    fn verdict_kind(&self) -> VerdictKind;

    /// Scores `text` using `system_prompt`. The returned score is always in
    /// `[1, 10]`.
    async fn analyze(&self, text: &str, system_prompt: &str) -> Result<Verdict, CoreError>;

    /// Produces a fresh reply for `text` without re-scoring it.
    async fn suggest_reply(&self, text: &str, system_prompt: &str) -> Result<String, CoreError>;
}
