//! Terminal implementation of the user prompt.

use async_trait::async_trait;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWriteExt, BufReader, Stdin};
use tokio::sync::Mutex;
use tracing::warn;

use ezpass_protocols::{OriginKey, UserPrompt};

/// Asks on stdout, reads answers line by line from one shared reader.
pub(crate) struct TerminalPrompt<R = BufReader<Stdin>> {
    input: Mutex<R>,
}

impl TerminalPrompt {
    pub(crate) fn stdin() -> Self {
        Self::with_input(BufReader::new(tokio::io::stdin()))
    }
}

impl<R> TerminalPrompt<R>
where
    R: AsyncBufRead + Unpin + Send,
{
    pub(crate) fn with_input(input: R) -> Self {
        Self {
            input: Mutex::new(input),
        }
    }

    async fn ask(&self, question: &str) -> Option<String> {
        let mut stdout = tokio::io::stdout();
        if stdout.write_all(question.as_bytes()).await.is_err() || stdout.flush().await.is_err() {
            return None;
        }

        let mut line = String::new();
        let mut input = self.input.lock().await;
        match input.read_line(&mut line).await {
            Ok(0) => None,
            Ok(_) => Some(line.trim().to_string()),
            Err(e) => {
                warn!("Failed to read from stdin: {}", e);
                None
            }
        }
    }
}

#[async_trait]
impl<R> UserPrompt for TerminalPrompt<R>
where
    R: AsyncBufRead + Unpin + Send,
{
    async fn confirm_save(&self, origin: &OriginKey) -> bool {
        let question = format!("Save password for {}? [y/N] ", origin);
        matches!(
            self.ask(&question).await.as_deref(),
            Some("y") | Some("Y") | Some("yes")
        )
    }

    async fn choose_account(&self, labels: &[String]) -> Option<usize> {
        println!("Multiple accounts found:");
        for (i, label) in labels.iter().enumerate() {
            println!("  {}. {}", i + 1, label);
        }
        let answer = self.ask("Account number (empty to cancel): ").await?;
        let choice: usize = answer.parse().ok()?;
        choice.checked_sub(1)
    }

    fn warn_user(&self, message: &str) {
        eprintln!("warning: {}", message);
    }
}
