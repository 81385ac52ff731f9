//! Claude adapter implementation using the Claude CLI subprocess.

use crate::agents::base::{Agent, AgentError, AgentEvent, AgentStream, ExecutionContext};
use crate::agents::cli_executor::CliCommand;
use async_trait::async_trait;
use serde::Deserialize;
use std::process::Stdio;
use tokio::process::Command;
use tokio_stream::StreamExt;

/// Claude adapter for executing instructions using the Claude CLI.
///
/// Runs `claude -p` in non-interactive mode with `stream-json` output and
/// turns the JSON Lines into a stream of `AgentEvent`s. Tools are disabled:
/// pipeline agents only answer, the pipeline itself writes documents.
pub struct ClaudeAdapter {
    name: String,
    model: String,
    system_prompt: String,
}

impl ClaudeAdapter {
    /// Create a new Claude adapter.
    ///
    /// # Arguments
    ///
    /// * `name` - The agent name from configuration
    /// * `model` - The Claude model to use (e.g., "claude-sonnet-4")
    /// * `system_prompt` - The system prompt for the agent
    pub fn new(name: String, model: String, system_prompt: String) -> Result<Self, AgentError> {
        if model.trim().is_empty() {
            return Err(AgentError::ExecutionError(format!(
                "Agent '{name}' has no model configured"
            )));
        }
        Ok(Self {
            name,
            model,
            system_prompt,
        })
    }

    fn build_args(&self, context: &ExecutionContext) -> Vec<String> {
        let mut system_prompt = self.system_prompt.trim().to_string();
        if let Some(extra) = &context.system_prompt {
            system_prompt.push_str("\n\n");
            system_prompt.push_str(extra);
        }

        let mut args = vec![
            "-p".to_string(),
            context.instruction.clone(),
            "--output-format".to_string(),
            "stream-json".to_string(),
            "--verbose".to_string(),
            "--model".to_string(),
            self.model.clone(),
            "--disallowedTools".to_string(),
            "Bash,Edit,Write,MultiEdit,NotebookEdit".to_string(),
        ];
        if !system_prompt.is_empty() {
            args.push("--append-system-prompt".to_string());
            args.push(system_prompt);
        }
        args
    }
}

#[async_trait]
impl Agent for ClaudeAdapter {
    async fn check_availability(&self) -> bool {
        match Command::new("claude")
            .arg("--version")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await
        {
            Ok(status) => status.success(),
            Err(_) => false,
        }
    }

    async fn execute(&self, context: &ExecutionContext) -> Result<AgentStream, AgentError> {
        let args = self.build_args(context);
        let name = self.name.clone();

        let events = CliCommand::new("claude")
            .args(args)
            .current_dir(context.project_path.clone())
            .timeout(context.timeout)
            .json_lines()
            .filter_map(move |value| match value {
                Ok(value) => convert_claude_value(&name, value),
                Err(e) => Some(Err(e)),
            });

        Ok(Box::pin(events))
    }
}

/// Claude CLI message types (stream-json output).
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ClaudeMessage {
    Assistant {
        message: AssistantMessage,
    },
    Result {
        #[serde(default)]
        is_error: bool,
        #[serde(default)]
        result: Option<String>,
    },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
struct AssistantMessage {
    #[serde(default)]
    content: Vec<ContentBlock>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentBlock {
    Text { text: String },
    Thinking { thinking: String },
    ToolUse { name: String },
    #[serde(other)]
    Other,
}

/// Convert one JSON line to an event. System and user echoes are dropped.
fn convert_claude_value(
    agent: &str,
    value: serde_json::Value,
) -> Option<Result<AgentEvent, AgentError>> {
    let message = match serde_json::from_value::<ClaudeMessage>(value) {
        Ok(message) => message,
        Err(e) => {
            return Some(Err(AgentError::StreamParseError(format!(
                "Unexpected message from '{agent}': {e}"
            ))))
        }
    };

    match message {
        ClaudeMessage::Assistant { message } => {
            let mut text = String::new();
            let mut other = None;
            for block in message.content {
                match block {
                    ContentBlock::Text { text: chunk } => text.push_str(&chunk),
                    ContentBlock::Thinking { thinking } => {
                        other.get_or_insert(AgentEvent::Thought(thinking));
                    }
                    ContentBlock::ToolUse { name } => {
                        other.get_or_insert(AgentEvent::ToolCall(name));
                    }
                    ContentBlock::Other => {}
                }
            }
            if text.is_empty() {
                other.map(Ok)
            } else {
                Some(Ok(AgentEvent::MessageChunk(text)))
            }
        }
        ClaudeMessage::Result { is_error: true, result } => Some(Err(AgentError::ApiError(
            result.unwrap_or_else(|| format!("'{agent}' reported an error")),
        ))),
        ClaudeMessage::Result { .. } => Some(Ok(AgentEvent::Completed)),
        ClaudeMessage::Other => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn adapter() -> ClaudeAdapter {
        ClaudeAdapter::new(
            "architect".to_string(),
            "claude-sonnet-4".to_string(),
            "You maintain documents.".to_string(),
        )
        .unwrap()
    }

    #[test]
    fn test_claude_adapter_requires_model() {
        let result = ClaudeAdapter::new("a".to_string(), " ".to_string(), String::new());
        assert!(result.is_err());
    }

    #[test]
    fn test_build_args_appends_context_prompt() {
        let context = ExecutionContext::new("update the doc".to_string())
            .with_system_prompt("Answer in JSON".to_string());

        let args = adapter().build_args(&context);

        assert_eq!(args[0], "-p");
        assert_eq!(args[1], "update the doc");
        assert!(args.contains(&"stream-json".to_string()));
        let prompt = args.last().unwrap();
        assert!(prompt.starts_with("You maintain documents."));
        assert!(prompt.ends_with("Answer in JSON"));
    }

    #[test]
    fn test_convert_assistant_text() {
        let value = json!({
            "type": "assistant",
            "message": { "content": [ { "type": "text", "text": "{\"a\":1}" } ] }
        });
        assert_eq!(
            convert_claude_value("a", value),
            Some(Ok(AgentEvent::MessageChunk("{\"a\":1}".to_string())))
        );
    }

    #[test]
    fn test_convert_result_and_system() {
        let done = json!({ "type": "result", "subtype": "success", "is_error": false, "result": "ok" });
        assert_eq!(convert_claude_value("a", done), Some(Ok(AgentEvent::Completed)));

        let failed = json!({ "type": "result", "is_error": true, "result": "overloaded" });
        assert_eq!(
            convert_claude_value("a", failed),
            Some(Err(AgentError::ApiError("overloaded".to_string())))
        );

        let system = json!({ "type": "system", "subtype": "init", "session_id": "s1" });
        assert_eq!(convert_claude_value("a", system), None);
    }

    #[tokio::test]
    async fn test_check_availability() {
        // Depends on the environment; only verify it does not panic
        let _ = adapter().check_availability().await;
    }
}
