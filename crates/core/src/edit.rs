//! Search/replace edit application.
//!
//! Pure functions, no I/O. Given the same input they always produce the same
//! output or the same error.

use nk_protocol::update_models::{DocumentUpdate, Edit};
use std::collections::HashSet;
use thiserror::Error;

/// Maximum number of near-miss lines reported for a missing search text.
const NEARBY_LINES: usize = 3;

/// Why an edit could not be applied.
///
/// `edit_number` is 1-based.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EditError {
    #[error("Edit {edit_number}: search text not found in document")]
    NotFound {
        edit_number: usize,
        search: String,
        /// Lines sharing the most words with the search text, as
        /// `(line number, line)`.
        nearby: Vec<(usize, String)>,
    },

    #[error("Edit {edit_number}: search text appears {occurrences} times, it must be unique")]
    Ambiguous {
        edit_number: usize,
        search: String,
        occurrences: usize,
    },
}

/// Compute the new content of a document.
///
/// A `full_content` body replaces the document. Otherwise the edits are
/// applied to `current` (empty when the document does not exist yet).
pub fn apply_update(current: Option<&str>, update: &DocumentUpdate) -> Result<String, EditError> {
    match &update.full_content {
        Some(body) => Ok(body.clone()),
        None => apply_edits(current.unwrap_or_default(), &update.edits),
    }
}

/// Apply edits in order, each one to the output of the previous.
///
/// # Errors
///
/// The first edit whose search text is missing or occurs more than once
/// aborts the whole sequence.
pub fn apply_edits(content: &str, edits: &[Edit]) -> Result<String, EditError> {
    let mut buffer = content.to_string();

    for (index, edit) in edits.iter().enumerate() {
        let edit_number = index + 1;

        if edit.is_append() {
            buffer.push_str(&edit.replace);
            continue;
        }

        match buffer.matches(edit.search.as_str()).count() {
            0 => {
                return Err(EditError::NotFound {
                    edit_number,
                    search: edit.search.clone(),
                    nearby: nearby_lines(&buffer, &edit.search),
                })
            }
            1 => buffer = buffer.replacen(edit.search.as_str(), &edit.replace, 1),
            occurrences => {
                return Err(EditError::Ambiguous {
                    edit_number,
                    search: edit.search.clone(),
                    occurrences,
                })
            }
        }
    }

    Ok(buffer)
}

pub(crate) fn keywords(text: &str) -> HashSet<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|w| w.chars().count() >= 3)
        .map(str::to_lowercase)
        .collect()
}

/// Lines of `content` that share the most words with `search`.
fn nearby_lines(content: &str, search: &str) -> Vec<(usize, String)> {
    let wanted = keywords(search);
    if wanted.is_empty() {
        return Vec::new();
    }

    let mut scored: Vec<(usize, usize, String)> = content
        .lines()
        .enumerate()
        .filter_map(|(i, line)| {
            let score = keywords(line).intersection(&wanted).count();
            (score > 0).then(|| (score, i + 1, line.trim().chars().take(120).collect()))
        })
        .collect();

    scored.sort_by(|a, b| b.0.cmp(&a.0).then(a.1.cmp(&b.1)));
    scored
        .into_iter()
        .take(NEARBY_LINES)
        .map(|(_, number, line)| (number, line))
        .collect()
}
