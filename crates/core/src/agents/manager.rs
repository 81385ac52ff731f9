//! Agent manager for orchestrating multiple agents.
//!
//! The `AgentManager` is responsible for:
//! - Registering agents under their pipeline role
//! - Looking up agents by role
//! - Providing fallback logic when agents are unavailable
//! - Turning agent streams into text or typed answers

use crate::agents::base::{Agent, AgentError, AgentStream, ExecutionContext};
use crate::agents::factory::AgentFactory;
use crate::agents::structured::{collect_text, parse_structured};
use nk_protocol::agent_models::AgentDefinition;
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::borrow::Cow;
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

/// Role of the agent that writes document updates.
pub const ARCHITECT: &str = "architect";
/// Role of the agent that plans multi-file updates.
pub const PLANNER: &str = "planner";
/// Role of the agent that picks relevant documents.
pub const SELECTOR: &str = "selector";
/// Role of the agent that summarizes documents and sessions.
pub const SUMMARIZER: &str = "summarizer";

/// Manages all registered agents and provides orchestration logic.
#[derive(Default)]
pub struct AgentManager {
    agents: HashMap<String, Arc<dyn Agent>>,
    fallback_agent_name: Option<String>,
    default_timeout: Option<Duration>,
}

impl AgentManager {
    /// Create a new AgentManager with the given agent definitions.
    ///
    /// Each definition is registered under its role. Definitions whose
    /// adapter cannot be created are skipped with a warning.
    pub fn new(configs: Vec<AgentDefinition>) -> Self {
        let mut agents: HashMap<String, Arc<dyn Agent>> = HashMap::new();

        for config in configs {
            match AgentFactory::create(&config) {
                Ok(agent) => {
                    agents.insert(config.role().to_string(), agent);
                }
                Err(e) => warn!(agent = %config.name, error = %e, "skipping agent"),
            }
        }

        Self {
            agents,
            fallback_agent_name: None,
            default_timeout: None,
        }
    }

    /// Register an agent instance under a role, replacing any previous one.
    pub fn with_agent(mut self, role: &str, agent: Arc<dyn Agent>) -> Self {
        self.agents.insert(role.to_string(), agent);
        self
    }

    /// Set the fallback agent to use when the requested agent is unavailable.
    pub fn with_fallback(mut self, role: String) -> Self {
        self.fallback_agent_name = Some(role);
        self
    }

    /// Time limit for calls whose context does not carry one.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.default_timeout = Some(timeout);
        self
    }

    /// Get an agent by role.
    pub fn get_agent(&self, role: &str) -> Option<Arc<dyn Agent>> {
        self.agents.get(role).cloned()
    }

    /// Execute an instruction with the agent registered for `role`.
    ///
    /// # Behavior
    ///
    /// 1. Look up the requested agent
    /// 2. Check if it's available
    /// 3. If unavailable and fallback is configured, try fallback agent
    /// 4. Execute with the selected agent
    pub async fn execute(
        &self,
        role: &str,
        context: &ExecutionContext,
    ) -> Result<AgentStream, AgentError> {
        let context = match (context.timeout, self.default_timeout) {
            (None, Some(limit)) => Cow::Owned(context.clone().with_timeout(limit)),
            _ => Cow::Borrowed(context),
        };
        let context = context.as_ref();

        let Some(agent) = self.get_agent(role) else {
            return Err(AgentError::NotAvailable(format!(
                "No agent registered for role '{role}'"
            )));
        };

        if agent.check_availability().await {
            return agent.execute(context).await;
        }

        if let Some(fallback_name) = self.fallback_agent_name.as_deref() {
            if fallback_name != role {
                if let Some(fallback_agent) = self.get_agent(fallback_name) {
                    if fallback_agent.check_availability().await {
                        warn!(role, fallback = fallback_name, "agent unavailable, using fallback");
                        return fallback_agent.execute(context).await;
                    }
                }
            }
        }

        Err(AgentError::NotAvailable(format!(
            "Agent for role '{role}' is not available and no fallback succeeded"
        )))
    }

    /// Execute and return the trimmed text answer.
    pub async fn generate_text(
        &self,
        role: &str,
        context: &ExecutionContext,
    ) -> Result<String, AgentError> {
        let text = collect_text(self.execute(role, context).await?).await?;
        if text.trim().is_empty() {
            return Err(AgentError::InvalidOutput("empty response".to_string()));
        }
        Ok(text.trim().to_string())
    }

    /// Execute and deserialize the answer into `T`.
    pub async fn generate<T>(&self, role: &str, context: &ExecutionContext) -> Result<T, AgentError>
    where
        T: DeserializeOwned,
    {
        let text = self.generate_text(role, context).await?;
        parse_structured(&text)
    }

    /// List all registered roles.
    pub fn list_agents(&self) -> Vec<String> {
        self.agents.keys().cloned().collect()
    }

    /// Check if an agent is registered for the given role.
    pub fn has_agent(&self, role: &str) -> bool {
        self.agents.contains_key(role)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::adapters::MockAgent;
    use nk_protocol::update_models::UpdatePlan;

    fn create_test_config(name: &str, role: Option<&str>, model: &str) -> AgentDefinition {
        AgentDefinition {
            name: name.to_string(),
            description: format!("Test agent {name}"),
            model: model.to_string(),
            role: role.map(str::to_string),
            system_prompt: "Test prompt".to_string(),
        }
    }

    #[test]
    fn test_agent_manager_registers_by_role() {
        let manager = AgentManager::new(vec![
            create_test_config("doc-writer", Some(ARCHITECT), "test-model"),
            create_test_config("planner", None, "test-model"),
        ]);

        assert!(manager.has_agent(ARCHITECT));
        assert!(manager.has_agent(PLANNER));
        assert!(!manager.has_agent("doc-writer"));
        assert_eq!(manager.list_agents().len(), 2);
    }

    #[tokio::test]
    async fn test_agent_manager_missing_role() {
        let manager = AgentManager::default();
        let context = ExecutionContext::new("test".to_string());

        let result = manager.execute(SELECTOR, &context).await;
        assert!(matches!(result, Err(AgentError::NotAvailable(_))));
    }

    #[tokio::test]
    async fn test_agent_manager_fallback() {
        let manager = AgentManager::default()
            .with_agent(PLANNER, Arc::new(MockAgent::unavailable()))
            .with_agent(ARCHITECT, Arc::new(MockAgent::responding(vec!["from fallback"])))
            .with_fallback(ARCHITECT.to_string());
        let context = ExecutionContext::new("test".to_string());

        let text = manager.generate_text(PLANNER, &context).await.unwrap();
        assert_eq!(text, "from fallback");
    }

    #[tokio::test]
    async fn test_agent_manager_unavailable_without_fallback() {
        let manager = AgentManager::default().with_agent(PLANNER, Arc::new(MockAgent::unavailable()));
        let context = ExecutionContext::new("test".to_string());

        let result = manager.execute(PLANNER, &context).await;
        assert!(matches!(result, Err(AgentError::NotAvailable(_))));
    }

    #[tokio::test]
    async fn test_agent_manager_timeout_is_applied() {
        let agent = Arc::new(MockAgent::responding(vec!["ok"]));
        let manager = AgentManager::default()
            .with_agent(ARCHITECT, agent.clone())
            .with_timeout(Duration::from_secs(30));

        manager
            .execute(ARCHITECT, &ExecutionContext::new("a".to_string()))
            .await
            .unwrap();
        manager
            .execute(
                ARCHITECT,
                &ExecutionContext::new("b".to_string()).with_timeout(Duration::from_secs(1)),
            )
            .await
            .unwrap();

        let timeouts: Vec<_> = agent.contexts().await.iter().map(|c| c.timeout).collect();
        assert_eq!(
            timeouts,
            vec![Some(Duration::from_secs(30)), Some(Duration::from_secs(1))]
        );
    }

    #[tokio::test]
    async fn test_agent_manager_generate_typed() {
        let plan_json = r#"{"file_plans":[{"target_file":"projects/a.md","action":"modify"}],"commit_message":"m"}"#;
        let manager = AgentManager::default().with_agent(PLANNER, Arc::new(MockAgent::responding(vec![plan_json])));
        let context = ExecutionContext::new("plan".to_string());

        let plan: UpdatePlan = manager.generate(PLANNER, &context).await.unwrap();
        assert_eq!(plan.file_plans.len(), 1);
        assert_eq!(plan.commit_message, "m");
    }
}
