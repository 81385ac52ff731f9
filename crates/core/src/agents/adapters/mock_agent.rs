//! Mock agent implementation for testing.
//!
//! Besides fixed event lists, a mock can be scripted with one answer per
//! call, which lets tests drive a pipeline through retries.

use crate::agents::base::{Agent, AgentError, AgentEvent, AgentStream, ExecutionContext};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::Mutex;

type Events = Vec<Result<AgentEvent, AgentError>>;

#[derive(Clone)]
pub struct MockAgent {
    available: bool,
    /// Answers for the next calls, consumed front to back.
    script: Arc<Mutex<VecDeque<Events>>>,
    /// Answer used once the script is exhausted.
    events: Events,
    received: Arc<Mutex<Vec<ExecutionContext>>>,
}

impl MockAgent {
    pub fn new(available: bool, events: Events) -> Self {
        Self {
            available,
            script: Arc::new(Mutex::new(VecDeque::new())),
            events,
            received: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn success() -> Self {
        Self::new(
            true,
            vec![
                Ok(AgentEvent::Thought("Mock agent thinking".to_string())),
                Ok(AgentEvent::MessageChunk("Mock response".to_string())),
                Ok(AgentEvent::Completed),
            ],
        )
    }

    pub fn unavailable() -> Self {
        Self::new(false, vec![])
    }

    pub fn failing() -> Self {
        Self::new(
            true,
            vec![
                Ok(AgentEvent::Thought("Starting...".to_string())),
                Err(AgentError::ExecutionError("Mock failure".to_string())),
            ],
        )
    }

    /// Answer each call with the next text; the last one repeats.
    pub fn responding<S: Into<String>>(responses: Vec<S>) -> Self {
        Self::scripted(responses.into_iter().map(|r| Ok(r.into())).collect())
    }

    /// Like [`MockAgent::responding`], but a call may also fail.
    pub fn scripted(responses: Vec<Result<String, AgentError>>) -> Self {
        let mut script: VecDeque<Events> = responses.into_iter().map(Self::answer).collect();
        let events = script.pop_back().unwrap_or_default();
        let mut agent = Self::new(true, events.clone());
        script.push_back(events);
        agent.script = Arc::new(Mutex::new(script));
        agent
    }

    fn answer(response: Result<String, AgentError>) -> Events {
        match response {
            Ok(text) => vec![Ok(AgentEvent::MessageChunk(text)), Ok(AgentEvent::Completed)],
            Err(e) => vec![Err(e)],
        }
    }

    /// Number of `execute` calls so far.
    pub async fn calls(&self) -> usize {
        self.received.lock().await.len()
    }

    /// Instructions received, in call order.
    pub async fn instructions(&self) -> Vec<String> {
        self.received
            .lock()
            .await
            .iter()
            .map(|context| context.instruction.clone())
            .collect()
    }

    pub async fn contexts(&self) -> Vec<ExecutionContext> {
        self.received.lock().await.clone()
    }
}

#[async_trait]
impl Agent for MockAgent {
    async fn check_availability(&self) -> bool {
        self.available
    }

    async fn execute(&self, context: &ExecutionContext) -> Result<AgentStream, AgentError> {
        if !self.available {
            return Err(AgentError::NotAvailable("Mock agent not available".to_string()));
        }

        self.received.lock().await.push(context.clone());
        let events = self
            .script
            .lock()
            .await
            .pop_front()
            .unwrap_or_else(|| self.events.clone());
        Ok(Box::pin(tokio_stream::iter(events)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_stream::StreamExt;

    fn context() -> ExecutionContext {
        ExecutionContext::new("test".to_string())
    }

    #[tokio::test]
    async fn test_mock_agent_success() {
        let agent = MockAgent::success();
        assert!(agent.check_availability().await);

        let events: Vec<_> = agent.execute(&context()).await.unwrap().collect().await;

        assert_eq!(events.len(), 3);
        assert!(matches!(events[0], Ok(AgentEvent::Thought(_))));
        assert_eq!(events[2], Ok(AgentEvent::Completed));
    }

    #[tokio::test]
    async fn test_mock_agent_unavailable() {
        let agent = MockAgent::unavailable();
        assert!(!agent.check_availability().await);

        let result = agent.execute(&context()).await;
        assert!(matches!(result, Err(AgentError::NotAvailable(_))));
    }

    #[tokio::test]
    async fn test_mock_agent_failing() {
        let agent = MockAgent::failing();
        let events: Vec<_> = agent.execute(&context()).await.unwrap().collect().await;

        assert_eq!(events.len(), 2);
        assert!(matches!(events[1], Err(AgentError::ExecutionError(_))));
    }

    #[tokio::test]
    async fn test_mock_agent_scripted_answers_in_order() {
        let agent = MockAgent::scripted(vec![
            Ok("first".to_string()),
            Err(AgentError::ApiError("rate limited".to_string())),
            Ok("last".to_string()),
        ]);

        let mut answers = Vec::new();
        for _ in 0..4 {
            let events: Vec<_> = agent.execute(&context()).await.unwrap().collect().await;
            answers.push(events[0].clone());
        }

        assert_eq!(answers[0], Ok(AgentEvent::MessageChunk("first".to_string())));
        assert!(matches!(answers[1], Err(AgentError::ApiError(_))));
        assert_eq!(answers[2], Ok(AgentEvent::MessageChunk("last".to_string())));
        // Exhausted script repeats the last answer
        assert_eq!(answers[3], Ok(AgentEvent::MessageChunk("last".to_string())));
        assert_eq!(agent.calls().await, 4);
    }
}
