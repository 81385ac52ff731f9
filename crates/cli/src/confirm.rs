//! Confirmation of new documents on the terminal.

use async_trait::async_trait;
use colored::Colorize;
use nk_core::engine::confirm::Confirmer;
use nk_core::engine::input::{project_path, validate_project_name};
use nk_protocol::update_models::{ConfirmationDecision, FilePlan};
use std::io::{BufRead, Write};
use tracing::warn;

/// Asks on stdin before a document is created.
pub struct StdinConfirmer {
    create_prefix: String,
}

impl StdinConfirmer {
    pub fn new(create_prefix: &str) -> Self {
        Self {
            create_prefix: create_prefix.to_string(),
        }
    }
}

#[async_trait]
impl Confirmer for StdinConfirmer {
    async fn confirm(&self, plan: &FilePlan, suggestions: &[String]) -> ConfirmationDecision {
        let mut prompt = format!("{} {} does not exist yet.\n", "?".yellow(), plan.target_file.bold());
        for (i, path) in suggestions.iter().enumerate() {
            prompt.push_str(&format!("  {}) {path}\n", i + 1));
        }
        prompt.push_str("Create it [Y], pick a number, type a project name, or [c]ancel: ");

        let answer = tokio::task::spawn_blocking(move || {
            print!("{prompt}");
            let _ = std::io::stdout().flush();
            let mut line = String::new();
            std::io::stdin().lock().read_line(&mut line).map(|_| line)
        })
        .await;

        match answer {
            Ok(Ok(line)) => parse_answer(&line, suggestions, &self.create_prefix),
            Ok(Err(e)) => {
                warn!(error = %e, "could not read the confirmation, cancelling");
                ConfirmationDecision::Cancel
            }
            Err(e) => {
                warn!(error = %e, "confirmation prompt failed, cancelling");
                ConfirmationDecision::Cancel
            }
        }
    }
}

/// Turn a typed answer into a decision.
///
/// Empty or `y` confirms, `c`/`n` cancels, a number picks a suggestion and
/// any other word names the project to update instead.
pub fn parse_answer(answer: &str, suggestions: &[String], create_prefix: &str) -> ConfirmationDecision {
    let answer = answer.trim();
    match answer.to_lowercase().as_str() {
        "" | "y" | "yes" => return ConfirmationDecision::Confirm,
        "c" | "n" | "no" | "cancel" => return ConfirmationDecision::Cancel,
        _ => {}
    }

    if let Ok(choice) = answer.parse::<usize>() {
        return match choice.checked_sub(1).and_then(|i| suggestions.get(i)) {
            Some(path) => ConfirmationDecision::Redirect { to: path.clone() },
            None => ConfirmationDecision::Cancel,
        };
    }

    let name = answer.trim_start_matches('/').trim_end_matches(".md");
    match validate_project_name(name) {
        Ok(()) => ConfirmationDecision::Redirect {
            to: project_path(create_prefix, name),
        },
        Err(_) => ConfirmationDecision::Cancel,
    }
}
