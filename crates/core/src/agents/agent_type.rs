//! Agent type enumeration for determining which adapter to use.

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AgentType {
    Claude,
    Mock,
}

impl AgentType {
    /// Infer the agent type from a model name.
    ///
    /// # Examples
    ///
    /// ```
    /// use nk_core::agents::AgentType;
    ///
    /// assert_eq!(AgentType::from_model_name("claude-sonnet-4"), AgentType::Claude);
    /// assert_eq!(AgentType::from_model_name("sonnet"), AgentType::Claude);
    /// assert_eq!(AgentType::from_model_name("test-model"), AgentType::Mock);
    /// ```
    pub fn from_model_name(model: &str) -> Self {
        let model_lower = model.to_lowercase();

        // The Claude CLI also accepts bare aliases
        if model_lower.contains("claude")
            || ["sonnet", "opus", "haiku"]
                .iter()
                .any(|alias| model_lower.starts_with(alias))
        {
            Self::Claude
        } else {
            Self::Mock
        }
    }

    /// Get a human-readable name for the agent type.
    pub fn name(self) -> &'static str {
        match self {
            Self::Claude => "Claude",
            Self::Mock => "Mock",
        }
    }
}
