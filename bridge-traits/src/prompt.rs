//! Interactive confirmation gate used before destructive operations.

use async_trait::async_trait;

use crate::error::Result;

/// Asks the operator a yes/no question.
///
/// Anything other than an explicit yes must be treated as a refusal.
#[async_trait]
pub trait ConfirmationPrompt: Send + Sync {
    async fn confirm(&self, question: &str) -> Result<bool>;
}

/// Prompt that always gives the same answer. Useful for non-interactive runs
/// and tests.
#[derive(Debug, Clone, Copy)]
pub struct FixedAnswerPrompt(pub bool);

#[async_trait]
impl ConfirmationPrompt for FixedAnswerPrompt {
    async fn confirm(&self, _question: &str) -> Result<bool> {
        Ok(self.0)
    }
}
