//! Terminal confirmation prompt

use async_trait::async_trait;
use bridge_traits::{
    error::{BridgeError, Result},
    prompt::ConfirmationPrompt,
};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::debug;

/// Writes the question to stdout and reads one line from stdin.
#[derive(Debug, Default, Clone, Copy)]
pub struct StdinConfirmationPrompt;

impl StdinConfirmationPrompt {
    pub fn new() -> Self {
        Self
    }
}

/// Only `y` and `yes` (any case) count as consent.
pub fn parse_answer(line: &str) -> bool {
    matches!(line.trim().to_ascii_lowercase().as_str(), "y" | "yes")
}

#[async_trait]
impl ConfirmationPrompt for StdinConfirmationPrompt {
    async fn confirm(&self, question: &str) -> Result<bool> {
        let mut stdout = tokio::io::stdout();
        stdout.write_all(question.as_bytes()).await?;
        stdout.write_all(b" [y/N] ").await?;
        stdout.flush().await?;

        let mut line = String::new();
        let read = BufReader::new(tokio::io::stdin())
            .read_line(&mut line)
            .await?;
        if read == 0 {
            return Err(BridgeError::NotAvailable(
                "stdin closed before an answer was given".to_string(),
            ));
        }

        let answer = parse_answer(&line);
        debug!(answer, "Confirmation prompt answered");
        Ok(answer)
    }
}
