use super::style;
use std::sync::Arc;

/// Interactive yes/no gate placed in front of every mutating action under
/// `--ask-confirm`.
pub trait Confirm: Send + Sync {
    fn confirm(&self, prompt: &str) -> bool;
}

impl<F> Confirm for F
where
    F: Fn(&str) -> bool + Send + Sync,
{
    fn confirm(&self, prompt: &str) -> bool {
        self(prompt)
    }
}

/// Terminal prompt. Defaults to "no"; a failed prompt counts as "no".
#[derive(Debug, Clone, Copy, Default)]
pub struct PromptConfirm;

impl Confirm for PromptConfirm {
    fn confirm(&self, prompt: &str) -> bool {
        match dialoguer::Confirm::new()
            .with_prompt(format!("  {}", style::danger(prompt)))
            .default(false)
            .interact()
        {
            Ok(answer) => answer,
            Err(error) => {
                tracing::warn!(%error, "confirmation prompt failed, treating as declined");
                false
            }
        }
    }
}

/// Runs a (possibly blocking) confirmation off the async workers.
pub async fn ask(confirm: &Arc<dyn Confirm>, prompt: String) -> bool {
    let confirm = Arc::clone(confirm);
    tokio::task::spawn_blocking(move || confirm.confirm(&prompt))
        .await
        .unwrap_or(false)
}
