//! Confirmation of planned document creations.

use crate::edit::keywords;
use async_trait::async_trait;
use nk_protocol::update_models::{ConfirmationDecision, FilePlan};

/// Number of existing documents offered as redirect targets.
pub const SUGGESTION_LIMIT: usize = 5;

/// Asks the user whether a planned new document should be created.
#[async_trait]
pub trait Confirmer: Send + Sync {
    /// # Arguments
    ///
    /// * `plan` - The plan entry that would create a document
    /// * `suggestions` - Existing documents the note could go to instead,
    ///   best match first
    async fn confirm(&self, plan: &FilePlan, suggestions: &[String]) -> ConfirmationDecision;
}

/// Confirms every creation.
pub struct AutoConfirmer;

#[async_trait]
impl Confirmer for AutoConfirmer {
    async fn confirm(&self, _plan: &FilePlan, _suggestions: &[String]) -> ConfirmationDecision {
        ConfirmationDecision::Confirm
    }
}

/// Rank existing documents by keyword overlap with the note.
///
/// `candidates` pairs each path with its cached summary, if any. Documents
/// sharing no keyword with the note are left out.
pub fn rank_suggestions(note: &str, candidates: &[(String, Option<String>)], limit: usize) -> Vec<String> {
    let note_words = keywords(note);
    if note_words.is_empty() {
        return Vec::new();
    }

    let mut scored: Vec<(usize, &str)> = candidates
        .iter()
        .filter_map(|(path, summary)| {
            let mut text = path.replace(['/', '-', '_', '.'], " ");
            if let Some(summary) = summary {
                text.push(' ');
                text.push_str(summary);
            }
            let score = keywords(&text).intersection(&note_words).count();
            (score > 0).then_some((score, path.as_str()))
        })
        .collect();

    scored.sort_by(|a, b| b.0.cmp(&a.0).then_with(|| a.1.cmp(b.1)));
    scored
        .into_iter()
        .take(limit)
        .map(|(_, path)| path.to_string())
        .collect()
}
