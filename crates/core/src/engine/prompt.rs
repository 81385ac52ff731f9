//! Prompt construction for pipeline agents.

use crate::engine::state::RetryContext;
use nk_protocol::update_models::{FileAction, FilePlan};
use std::collections::BTreeMap;
use std::fmt::Write;

/// Longest document excerpt included in a summary prompt.
const SUMMARY_INPUT_CHARS: usize = 8_000;

/// Turn `projects/my-garden.md` into `My Garden`.
pub fn title_from_path(path: &str) -> String {
    let stem = path
        .rsplit('/')
        .next()
        .unwrap_or(path)
        .trim_end_matches(".md");
    stem.split(['-', '_'])
        .filter(|word| !word.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Inputs of one generation call.
pub struct GenerationRequest<'a> {
    pub note: &'a str,
    pub plan: &'a FilePlan,
    /// Current content of the target, `None` for a new document.
    pub current: Option<&'a str>,
    /// Other documents loaded as context.
    pub context: &'a BTreeMap<String, String>,
    pub retry: Option<&'a RetryContext>,
}

pub fn generation_prompt(request: &GenerationRequest<'_>) -> String {
    let plan = request.plan;
    let mut prompt = String::new();

    let _ = writeln!(prompt, "Note:\n{}\n", request.note);
    let _ = writeln!(prompt, "Target file: {}", plan.target_file);
    if !plan.description.is_empty() && plan.description != request.note {
        let _ = writeln!(prompt, "Planned change: {}", plan.description);
    }

    match (request.current, plan.action) {
        (Some(current), _) => {
            let _ = writeln!(
                prompt,
                "\nCurrent content of {}:\n<<<\n{current}>>>\n",
                plan.target_file
            );
            prompt.push_str(
                "Return edits whose search text is copied verbatim from the current content \
                 and occurs exactly once.\n",
            );
        }
        (None, FileAction::Create) | (None, _) => {
            let _ = writeln!(
                prompt,
                "\n{} does not exist yet. Create it with the title \"# {}\" using full_content \
                 and set create_if_missing to true.",
                plan.target_file,
                title_from_path(&plan.target_file)
            );
        }
    }

    let others: Vec<_> = request
        .context
        .iter()
        .filter(|(path, _)| path.as_str() != plan.target_file)
        .collect();
    if !others.is_empty() {
        prompt.push_str("\nRelated documents (read only):\n");
        for (path, content) in others {
            let _ = writeln!(prompt, "--- {path}\n{content}");
        }
    }

    if let Some(retry) = request.retry {
        let _ = writeln!(
            prompt,
            "\nYour previous answer for {} could not be applied:\n{}\n\
             Choose a search text that appears exactly once in the current content.",
            retry.target_file, retry.message
        );
    }

    prompt
}

pub fn plan_prompt(note: &str, documents: &[String], summaries: &BTreeMap<String, String>) -> String {
    let mut prompt = format!("Note:\n{note}\n\nExisting documents:\n");
    if documents.is_empty() {
        prompt.push_str("(none)\n");
    }
    for path in documents {
        match summaries.get(path) {
            Some(summary) => {
                let _ = writeln!(prompt, "- {path}: {summary}");
            }
            None => {
                let _ = writeln!(prompt, "- {path}");
            }
        }
    }
    prompt
}

pub fn selector_prompt(note: &str, summaries: &BTreeMap<String, String>) -> String {
    let mut prompt = format!("Note:\n{note}\n\nDocuments:\n");
    for (path, summary) in summaries {
        let _ = writeln!(prompt, "- {path}: {summary}");
    }
    prompt
}

pub fn summary_prompt(path: &str, content: &str) -> String {
    let excerpt: String = content.chars().take(SUMMARY_INPUT_CHARS).collect();
    format!("Summarize the document {path}:\n\n{excerpt}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_title_from_path() {
        assert_eq!(title_from_path("projects/my-garden.md"), "My Garden");
        assert_eq!(title_from_path("projects/home_lab.md"), "Home Lab");
        assert_eq!(title_from_path("solo.md"), "Solo");
    }

    #[test]
    fn test_generation_prompt_for_new_document() {
        let plan = FilePlan {
            target_file: "projects/my-garden.md".to_string(),
            action: FileAction::Create,
            description: "water".to_string(),
        };
        let context = BTreeMap::new();
        let prompt = generation_prompt(&GenerationRequest {
            note: "water",
            plan: &plan,
            current: None,
            context: &context,
            retry: None,
        });

        assert!(prompt.contains("# My Garden"));
        assert!(prompt.contains("create_if_missing"));
    }

    #[test]
    fn test_generation_prompt_includes_retry_context() {
        let plan = FilePlan {
            target_file: "projects/a.md".to_string(),
            action: FileAction::Modify,
            description: String::new(),
        };
        let context = BTreeMap::from([
            ("projects/a.md".to_string(), "# A\n".to_string()),
            ("projects/b.md".to_string(), "# B\n".to_string()),
        ]);
        let retry = RetryContext {
            file_index: Some(0),
            target_file: "projects/a.md".to_string(),
            search: "# Z".to_string(),
            message: "edit 1 search text not found".to_string(),
        };
        let prompt = generation_prompt(&GenerationRequest {
            note: "add x",
            plan: &plan,
            current: Some("# A\n"),
            context: &context,
            retry: Some(&retry),
        });

        assert!(prompt.contains("Current content of projects/a.md"));
        assert!(prompt.contains("--- projects/b.md"));
        assert!(!prompt.contains("--- projects/a.md"));
        assert!(prompt.contains("could not be applied"));
    }
}
