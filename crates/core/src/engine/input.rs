//! Parsing of pipeline input.
//!
//! The pipeline accepts `/<project> <note>` and the bare `/list` command.

use crate::engine::error::PipelineError;
use crate::engine::state::CommandKind;

/// A parsed pipeline input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedInput {
    pub command: CommandKind,
    pub note: String,
}

/// Check that `name` can be used as a project document name.
pub fn validate_project_name(name: &str) -> Result<(), PipelineError> {
    let valid = !name.is_empty()
        && !name.starts_with('.')
        && name
            .chars()
            .all(|c| c.is_alphanumeric() || matches!(c, '-' | '_' | '.'));
    if valid {
        Ok(())
    } else {
        Err(PipelineError::Input(format!(
            "'{name}' is not a valid project name (letters, digits, '-', '_' and '.' only)"
        )))
    }
}

/// Path of the document of `project` below `prefix`.
pub fn project_path(prefix: &str, project: &str) -> String {
    format!("{}/{project}.md", prefix.trim_end_matches('/'))
}

pub fn parse_input(input: &str) -> Result<ParsedInput, PipelineError> {
    let input = input.trim();
    if input.is_empty() {
        return Err(PipelineError::Input("input is empty".to_string()));
    }

    let Some(command) = input.strip_prefix('/') else {
        return Err(PipelineError::Input(
            "no target project; start the note with /<project>".to_string(),
        ));
    };

    let (name, rest) = match command.split_once(char::is_whitespace) {
        Some((name, rest)) => (name, rest.trim()),
        None => (command, ""),
    };

    if name == "list" && rest.is_empty() {
        return Ok(ParsedInput {
            command: CommandKind::List,
            note: String::new(),
        });
    }

    validate_project_name(name)?;
    if rest.is_empty() {
        return Err(PipelineError::Input(format!("the note for '{name}' is empty")));
    }

    Ok(ParsedInput {
        command: CommandKind::Note {
            project: name.to_string(),
        },
        note: rest.to_string(),
    })
}
