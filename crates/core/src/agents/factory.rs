//! Agent factory for creating agent instances from definitions.

use crate::agents::adapters::ClaudeAdapter;
use crate::agents::adapters::MockAgent;
use crate::agents::agent_type::AgentType;
use crate::agents::base::Agent;
use anyhow::Result;
use nk_protocol::agent_models::AgentDefinition;
use std::sync::Arc;

/// Factory for creating agent instances based on their definition.
pub struct AgentFactory;

impl AgentFactory {
    /// Create an agent instance from a definition.
    ///
    /// The adapter is chosen with [`AgentType::from_model_name`]:
    /// - Claude models → `ClaudeAdapter`
    /// - `test-failure-model` → failing `MockAgent`
    /// - `test-unavailable-model` → unavailable `MockAgent`
    /// - Other models → `MockAgent` answering with a fixed text
    ///
    /// # Examples
    ///
    /// ```
    /// use nk_core::agents::AgentFactory;
    /// use nk_protocol::agent_models::AgentDefinition;
    ///
    /// let config = AgentDefinition {
    ///     name: "architect".to_string(),
    ///     description: "Turns notes into edits".to_string(),
    ///     model: "claude-sonnet-4".to_string(),
    ///     role: None,
    ///     system_prompt: "You maintain documents.".to_string(),
    /// };
    ///
    /// let agent = AgentFactory::create(&config).unwrap();
    /// ```
    pub fn create(config: &AgentDefinition) -> Result<Arc<dyn Agent>> {
        match AgentType::from_model_name(&config.model) {
            AgentType::Claude => {
                let adapter = ClaudeAdapter::new(
                    config.name.clone(),
                    config.model.clone(),
                    config.system_prompt.clone(),
                )?;
                Ok(Arc::new(adapter))
            }
            AgentType::Mock => match config.model.as_str() {
                "test-failure-model" => Ok(Arc::new(MockAgent::failing())),
                "test-unavailable-model" => Ok(Arc::new(MockAgent::unavailable())),
                _ => Ok(Arc::new(MockAgent::success())),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_config(name: &str, model: &str) -> AgentDefinition {
        AgentDefinition {
            name: name.to_string(),
            description: format!("Test agent {name}"),
            model: model.to_string(),
            role: None,
            system_prompt: "Test prompt".to_string(),
        }
    }

    #[tokio::test]
    async fn test_factory_creates_mock_variants() {
        let ok = AgentFactory::create(&create_test_config("a", "test-model")).unwrap();
        assert!(ok.check_availability().await);

        let unavailable = AgentFactory::create(&create_test_config("b", "test-unavailable-model")).unwrap();
        assert!(!unavailable.check_availability().await);
    }

    #[test]
    fn test_factory_creates_claude_adapter() {
        let result = AgentFactory::create(&create_test_config("architect", "claude-sonnet-4"));
        assert!(result.is_ok());
    }
}
