//! Terminal output for queue events and pipeline runs.

use colored::Colorize;
use nk_core::engine::state::PipelineState;
use nk_protocol::ipc::Event;
use nk_protocol::message_models::{MessageResult, MessageStatus, QueueStatus};

/// Project name of a document path: `projects/garden.md` → `garden`.
pub fn project_name(path: &str) -> &str {
    let file = path.rsplit('/').next().unwrap_or(path);
    file.strip_suffix(".md").unwrap_or(file)
}

/// The line printed for a queue event, `None` for events that stay silent.
pub fn describe_event(event: &Event) -> Option<String> {
    match event {
        Event::MessageQueued { message_id, position } => {
            (*position > 1).then(|| format!("#{message_id} queued ({} ahead)", position - 1).dimmed().to_string())
        }
        Event::MessageStatusUpdate {
            message_id,
            status: MessageStatus::Processing,
        } => Some(format!("#{message_id} processing...").dimmed().to_string()),
        Event::MessageStatusUpdate { .. } => None,
        Event::MessageCompleted { message_id, result } => Some(describe_result(*message_id, result)),
        Event::MessageFailed { message_id, error } => {
            Some(format!("{} #{message_id} failed: {error}", "✗".red()))
        }
        Event::QueueShutdown { abandoned } if abandoned.is_empty() => None,
        Event::QueueShutdown { abandoned } => {
            let ids: Vec<String> = abandoned.iter().map(|id| format!("#{id}")).collect();
            Some(format!("Not processed: {}", ids.join(", ")).yellow().to_string())
        }
    }
}

fn describe_result(message_id: u64, result: &MessageResult) -> String {
    let mut text = format!("{} #{message_id} {}", "✓".green(), result.response);
    for doc in &result.updated_docs {
        text.push_str(&format!("\n    {}", doc.cyan()));
    }
    text
}

pub fn describe_status(status: &QueueStatus) -> String {
    let processing = status
        .processing
        .map_or_else(|| "idle".to_string(), |id| format!("#{id}"));
    format!(
        "processing: {processing} | queued: {} | completed: {} | failed: {}",
        status.queued.len(),
        status.completed_count,
        status.failed_count
    )
}

/// Summary of a finished single-note run.
pub fn describe_run(state: &PipelineState) -> String {
    let Some(commit) = &state.commit_id else {
        return "No changes were made.".to_string();
    };
    let short: String = commit.chars().take(8).collect();
    let mut text = format!("{} {} ({})", "✓".green(), state.commit_message, short.yellow());
    for path in &state.changed_files {
        text.push_str(&format!("\n    {} {}", "M".green(), path));
    }
    for path in &state.deleted_files {
        text.push_str(&format!("\n    {} {}", "D".red(), path));
    }
    if state.retry_count > 0 {
        text.push_str(&format!("\n    after {} retries", state.retry_count).dimmed().to_string());
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;
    use nk_protocol::config_models::ConfirmationMode;

    fn plain() {
        colored::control::set_override(false);
    }

    #[test]
    fn test_project_name() {
        assert_eq!(project_name("projects/garden.md"), "garden");
        assert_eq!(project_name("garden"), "garden");
    }

    #[test]
    fn test_first_in_line_is_not_announced() {
        plain();
        let first = Event::MessageQueued {
            message_id: 1,
            position: 1,
        };
        let third = Event::MessageQueued {
            message_id: 3,
            position: 3,
        };
        assert_eq!(describe_event(&first), None);
        assert_eq!(describe_event(&third).as_deref(), Some("#3 queued (2 ahead)"));
    }

    #[test]
    fn test_completed_message_lists_documents() {
        plain();
        let event = Event::MessageCompleted {
            message_id: 2,
            result: MessageResult {
                response: "Updated **garden**".to_string(),
                updated_docs: vec!["projects/garden.md".to_string()],
                update_details: None,
            },
        };
        let text = describe_event(&event).unwrap();
        assert!(text.contains("#2 Updated **garden**"));
        assert!(text.contains("projects/garden.md"));
    }

    #[test]
    fn test_describe_run_without_commit() {
        let state = PipelineState::new("/garden x", ConfirmationMode::Auto);
        assert_eq!(describe_run(&state), "No changes were made.");
    }

    #[test]
    fn test_describe_status() {
        plain();
        let status = QueueStatus {
            total: 3,
            queued: vec![3],
            processing: Some(2),
            completed_count: 1,
            failed_count: 0,
        };
        assert_eq!(
            describe_status(&status),
            "processing: #2 | queued: 1 | completed: 1 | failed: 0"
        );
    }
}
