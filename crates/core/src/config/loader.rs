//! Configuration file loader for `.notekit/` directory structure.
//!
//! Reads `config.toml` (global settings) and `agents/*.md` (agent
//! definitions, YAML front matter plus a system prompt body).
//!
//! Environment variables `NOTEKIT_DATA_DIR` and `NOTEKIT_MODEL` override the
//! corresponding `config.toml` values.

use crate::config::error::ConfigError;
use crate::config::error::ConfigResult;
use crate::config::models::AppConfig;
use crate::init::templates::{get_template, list_templates};
use gray_matter::engine::YAML;
use gray_matter::Matter;
use nk_protocol::agent_models::AgentDefinition;
use nk_protocol::config_models::GlobalConfig;
use std::path::{Component, Path, PathBuf};
use walkdir::WalkDir;

/// Name of the configuration directory under the project root.
pub const CONFIG_DIR: &str = ".notekit";

/// Loads all configuration from the `.notekit/` directory.
///
/// # Arguments
///
/// * `root` - Root directory containing the `.notekit/` folder
///
/// # Returns
///
/// An `AppConfig` containing all loaded configuration. Missing directories
/// or files fall back to defaults, and when no agent is defined the built-in
/// agent templates are used.
///
/// # Errors
///
/// Returns `ConfigError` if:
/// - Files exist but cannot be read
/// - Files have invalid syntax (TOML or Markdown front matter)
/// - Values are out of range (empty creation prefix, zero poll interval)
///
/// # Example
///
/// ```rust,no_run
/// use nk_core::config::loader::load_config;
/// use std::path::Path;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let config = load_config(Path::new(".")).await?;
/// println!("Loaded {} agents", config.agents.len());
/// # Ok(())
/// # }
/// ```
pub async fn load_config(root: &Path) -> ConfigResult<AppConfig> {
    let nk_dir = root.join(CONFIG_DIR);

    let (mut global, mut agents) = if nk_dir.exists() {
        (load_global_config(&nk_dir)?, load_agents(&nk_dir)?)
    } else {
        (GlobalConfig::default(), Vec::new())
    };

    apply_overrides(&mut global, |key| std::env::var(key).ok());
    validate_global_config(&nk_dir.join("config.toml"), &global)?;

    if agents.is_empty() {
        agents = builtin_agents()?;
    }

    Ok(AppConfig { global, agents })
}

/// Loads global configuration from `config.toml`.
fn load_global_config(nk_dir: &Path) -> ConfigResult<GlobalConfig> {
    let config_path = nk_dir.join("config.toml");

    if !config_path.exists() {
        return Ok(GlobalConfig::default());
    }

    let content =
        std::fs::read_to_string(&config_path).map_err(|source| ConfigError::FileRead {
            path: config_path.clone(),
            source,
        })?;

    let config: GlobalConfig =
        toml::from_str(&content).map_err(|source| ConfigError::TomlParse {
            path: config_path,
            source,
        })?;

    Ok(config)
}

/// Applies environment overrides through `lookup`.
pub(crate) fn apply_overrides<F>(global: &mut GlobalConfig, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(data_dir) = lookup("NOTEKIT_DATA_DIR").filter(|v| !v.trim().is_empty()) {
        global.data_dir = data_dir;
    }
    if let Some(model) = lookup("NOTEKIT_MODEL").filter(|v| !v.trim().is_empty()) {
        global.model = model;
    }
}

fn validate_global_config(path: &Path, global: &GlobalConfig) -> ConfigResult<()> {
    let invalid = |reason: &str| ConfigError::InvalidConfig {
        path: path.to_path_buf(),
        reason: reason.to_string(),
    };

    let prefix = Path::new(&global.create_prefix);
    if global.create_prefix.trim().is_empty() {
        return Err(invalid("create_prefix must not be empty"));
    }
    if prefix.is_absolute()
        || prefix
            .components()
            .any(|c| matches!(c, Component::ParentDir))
    {
        return Err(invalid("create_prefix must be a relative path inside the data directory"));
    }
    if global.queue_poll_ms == 0 {
        return Err(invalid("queue_poll_ms must be greater than zero"));
    }
    if global.agent_timeout_secs == 0 {
        return Err(invalid("agent_timeout_secs must be greater than zero"));
    }
    Ok(())
}

/// Loads all agent definitions from `agents/*.md`.
fn load_agents(nk_dir: &Path) -> ConfigResult<Vec<AgentDefinition>> {
    let agents_dir = nk_dir.join("agents");

    if !agents_dir.exists() {
        return Ok(Vec::new());
    }

    let mut agents = Vec::new();

    for entry in WalkDir::new(&agents_dir)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
    {
        let entry = entry.map_err(|source| ConfigError::DirectoryWalk {
            path: agents_dir.clone(),
            source,
        })?;

        let path = entry.path();

        if path.extension().and_then(|s| s.to_str()) != Some("md") {
            continue;
        }

        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::FileRead {
            path: path.to_path_buf(),
            source,
        })?;

        agents.push(parse_agent(path, &content)?);
    }

    Ok(agents)
}

/// Agent definitions shipped inside the binary.
pub fn builtin_agents() -> ConfigResult<Vec<AgentDefinition>> {
    list_templates("agents/")
        .into_iter()
        .filter_map(|template| get_template(&template).map(|content| (template, content)))
        .map(|(template, content)| parse_agent(&PathBuf::from(template), &content))
        .collect()
}

/// Parse a Markdown agent definition with YAML front matter.
fn parse_agent(path: &Path, content: &str) -> ConfigResult<AgentDefinition> {
    let matter = Matter::<YAML>::new();
    let result = matter.parse(content);

    let mut agent: AgentDefinition = result
        .data
        .ok_or_else(|| ConfigError::MarkdownParse {
            path: path.to_path_buf(),
            reason: "Missing YAML front matter".to_string(),
        })?
        .deserialize()
        .map_err(|e| ConfigError::MarkdownParse {
            path: path.to_path_buf(),
            reason: format!("Failed to deserialize front matter: {e}"),
        })?;

    // The markdown body is the system prompt
    agent.system_prompt = result.content;

    Ok(agent)
}
