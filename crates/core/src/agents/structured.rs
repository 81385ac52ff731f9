//! Structured output from agent streams.
//!
//! Agents stream free text. Pipeline stages need typed values, so the
//! message chunks are collected and the JSON payload is deserialized into
//! the requested type. A malformed answer is an `AgentError::InvalidOutput`,
//! never a panic.

use crate::agents::base::{Agent, AgentError, AgentEvent, AgentStream, ExecutionContext};
use serde::de::DeserializeOwned;
use tokio_stream::StreamExt;

/// Collect the message chunks of a stream into one string.
///
/// Thoughts and tool calls are dropped. The first stream error aborts.
pub async fn collect_text(mut stream: AgentStream) -> Result<String, AgentError> {
    let mut text = String::new();
    while let Some(event) = stream.next().await {
        match event? {
            AgentEvent::MessageChunk(chunk) => text.push_str(&chunk),
            AgentEvent::Completed => break,
            AgentEvent::Thought(_) | AgentEvent::ToolCall(_) => {}
        }
    }
    Ok(text)
}

/// Run an agent once and return its text answer.
pub async fn generate_text(agent: &dyn Agent, context: &ExecutionContext) -> Result<String, AgentError> {
    let stream = agent.execute(context).await?;
    let text = collect_text(stream).await?;
    if text.trim().is_empty() {
        return Err(AgentError::InvalidOutput("empty response".to_string()));
    }
    Ok(text.trim().to_string())
}

/// Run an agent once and deserialize its answer into `T`.
///
/// # Errors
///
/// `AgentError::InvalidOutput` when the answer holds no JSON or the JSON
/// does not match `T`. Errors of the agent itself are passed through.
pub async fn generate_structured<T>(agent: &dyn Agent, context: &ExecutionContext) -> Result<T, AgentError>
where
    T: DeserializeOwned,
{
    let text = generate_text(agent, context).await?;
    parse_structured(&text)
}

/// Deserialize the JSON payload embedded in an agent answer.
pub fn parse_structured<T>(text: &str) -> Result<T, AgentError>
where
    T: DeserializeOwned,
{
    let payload = extract_json(text)
        .ok_or_else(|| AgentError::InvalidOutput("response contains no JSON value".to_string()))?;
    serde_json::from_str(payload)
        .map_err(|e| AgentError::InvalidOutput(format!("response does not match the expected schema: {e}")))
}

/// Locate the JSON value in `text`, skipping Markdown fences and prose.
fn extract_json(text: &str) -> Option<&str> {
    let body = strip_fence(text.trim());
    let start = body.find(['{', '['])?;
    let close = if body[start..].starts_with('{') { '}' } else { ']' };
    let end = body.rfind(close)?;
    (end > start).then(|| &body[start..=end])
}

fn strip_fence(text: &str) -> &str {
    let Some(open) = text.find("```") else {
        return text;
    };
    let after_open = &text[open + 3..];
    // Skip the language tag on the fence line
    let content_start = after_open.find('\n').map_or(0, |i| i + 1);
    let content = &after_open[content_start..];
    match content.find("```") {
        Some(close) => &content[..close],
        None => content,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::adapters::MockAgent;
    use serde::Deserialize;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Answer {
        value: u32,
    }

    #[test]
    fn test_parse_plain_json() {
        let answer: Answer = parse_structured(r#"{"value": 3}"#).unwrap();
        assert_eq!(answer, Answer { value: 3 });
    }

    #[test]
    fn test_parse_fenced_json_with_prose() {
        let text = "Here is the update:\n```json\n{\"value\": 7}\n```\nDone.";
        let answer: Answer = parse_structured(text).unwrap();
        assert_eq!(answer.value, 7);
    }

    #[test]
    fn test_parse_array() {
        let files: Vec<String> = parse_structured("[\"projects/a.md\", \"projects/b.md\"]").unwrap();
        assert_eq!(files.len(), 2);
    }

    #[test]
    fn test_parse_rejects_non_json() {
        let result: Result<Answer, _> = parse_structured("I could not do that.");
        assert!(matches!(result, Err(AgentError::InvalidOutput(_))));
    }

    #[test]
    fn test_parse_rejects_schema_mismatch() {
        let result: Result<Answer, _> = parse_structured(r#"{"other": 1}"#);
        assert!(matches!(result, Err(AgentError::InvalidOutput(_))));
    }

    #[tokio::test]
    async fn test_generate_structured_from_agent() {
        let agent = MockAgent::responding(vec![r#"{"value": 9}"#]);
        let context = ExecutionContext::new("give me a value".to_string());

        let answer: Answer = generate_structured(&agent, &context).await.unwrap();
        assert_eq!(answer.value, 9);
    }

    #[tokio::test]
    async fn test_generate_text_rejects_empty_answer() {
        let agent = MockAgent::responding(vec!["   "]);
        let context = ExecutionContext::new("say something".to_string());

        let result = generate_text(&agent, &context).await;
        assert!(matches!(result, Err(AgentError::InvalidOutput(_))));
    }

    #[tokio::test]
    async fn test_stream_error_is_propagated() {
        let agent = MockAgent::failing();
        let context = ExecutionContext::new("fail".to_string());

        let result = generate_text(&agent, &context).await;
        assert!(matches!(result, Err(AgentError::ExecutionError(_))));
    }
}
