//! Directory structure and file generation for notekit initialization.

use super::error::{InitError, InitResult};
use super::templates::{get_template, list_templates};
use crate::config::loader::{load_config, CONFIG_DIR};
use crate::store::GitStore;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

/// Options for initializing a notekit project.
#[derive(Debug, Clone)]
pub struct InitOptions {
    /// Target directory where `.notekit` will be created.
    pub target_dir: PathBuf,

    /// Overwrite existing `.notekit` directory if it exists.
    pub force: bool,

    /// Only write the architect agent.
    pub minimal: bool,

    /// Create the data directory and initialize its git repository.
    pub init_repository: bool,
}

impl Default for InitOptions {
    fn default() -> Self {
        Self {
            target_dir: std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
            force: false,
            minimal: false,
            init_repository: true,
        }
    }
}

/// Generate a `.notekit` directory structure and the data repository.
///
/// This function creates the following structure:
/// ```text
/// .notekit/
/// ├── config.toml
/// └── agents/
///     ├── architect.md
///     ├── planner.md    (unless minimal)
///     ├── selector.md   (unless minimal)
///     └── summarizer.md (unless minimal)
/// data/
/// ├── .git/
/// └── projects/
/// ```
///
/// # Returns
/// The resolved data directory, or an `InitError` if:
/// - The `.notekit` directory already exists (without force flag)
/// - A template file cannot be found
/// - File system or git operations fail
pub async fn generate_notekit_structure(options: InitOptions) -> InitResult<PathBuf> {
    let nk_dir = options.target_dir.join(CONFIG_DIR);

    if nk_dir.exists() && !options.force {
        return Err(InitError::DirectoryExists(nk_dir));
    }

    create_dir(&nk_dir.join("agents"))?;

    write_template_file(&nk_dir, "config.toml")?;

    if options.minimal {
        write_template_file(&nk_dir, "agents/architect.md")?;
    } else {
        for agent_path in list_templates("agents/") {
            write_template_file(&nk_dir, &agent_path)?;
        }
    }

    let config = load_config(&options.target_dir).await?;
    let data_dir = config.data_dir(&options.target_dir);

    if options.init_repository {
        create_dir(&data_dir.join(config.global.create_prefix.trim_end_matches('/')))?;
        GitStore::new(&data_dir)
            .with_author(&config.global.git_author_name, &config.global.git_author_email)
            .ensure_repository()
            .await?;
        info!(data_dir = %data_dir.display(), "initialized data repository");
    }

    Ok(data_dir)
}

fn create_dir(path: &Path) -> InitResult<()> {
    fs::create_dir_all(path).map_err(|source| InitError::DirectoryCreate {
        path: path.to_path_buf(),
        source,
    })
}

/// Write one embedded template below `nk_dir`.
fn write_template_file(nk_dir: &Path, template_path: &str) -> InitResult<()> {
    let content = get_template(template_path)
        .ok_or_else(|| InitError::TemplateNotFound(template_path.to_string()))?;

    let target_path = nk_dir.join(template_path);

    if let Some(parent) = target_path.parent() {
        create_dir(parent)?;
    }

    fs::write(&target_path, content).map_err(|source| InitError::FileWrite {
        path: target_path,
        source,
    })?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn options(dir: &Path) -> InitOptions {
        InitOptions {
            target_dir: dir.to_path_buf(),
            force: false,
            minimal: false,
            init_repository: false,
        }
    }

    #[tokio::test]
    async fn test_generate_structure_success() {
        let dir = tempdir().unwrap();

        let data_dir = generate_notekit_structure(options(dir.path()))
            .await
            .expect("init should succeed");

        let nk_dir = dir.path().join(".notekit");
        assert!(nk_dir.join("config.toml").exists(), "config.toml should exist");
        for agent in ["architect", "planner", "selector", "summarizer"] {
            assert!(
                nk_dir.join(format!("agents/{agent}.md")).exists(),
                "{agent}.md should exist"
            );
        }
        assert_eq!(data_dir, dir.path().join("data"));
    }

    #[tokio::test]
    async fn test_generate_structure_minimal() {
        let dir = tempdir().unwrap();
        let options = InitOptions {
            minimal: true,
            ..options(dir.path())
        };

        generate_notekit_structure(options).await.unwrap();

        let nk_dir = dir.path().join(".notekit");
        assert!(nk_dir.join("agents/architect.md").exists());
        assert!(!nk_dir.join("agents/planner.md").exists());
    }

    #[tokio::test]
    async fn test_generate_structure_exists_without_force() {
        let dir = tempdir().unwrap();
        fs::create_dir_all(dir.path().join(".notekit")).unwrap();

        let result = generate_notekit_structure(options(dir.path())).await;
        assert!(
            matches!(result, Err(InitError::DirectoryExists(_))),
            "Should return DirectoryExists error"
        );
    }

    #[tokio::test]
    async fn test_generate_structure_exists_with_force() {
        let dir = tempdir().unwrap();
        let nk_dir = dir.path().join(".notekit");
        fs::create_dir_all(&nk_dir).unwrap();
        fs::write(nk_dir.join("config.toml"), "broken = [").unwrap();

        let options = InitOptions {
            force: true,
            ..options(dir.path())
        };

        generate_notekit_structure(options)
            .await
            .expect("Should succeed with force flag");

        let config = fs::read_to_string(nk_dir.join("config.toml")).unwrap();
        assert!(config.contains("max_retries"), "config.toml should be rewritten");
    }

    #[tokio::test]
    async fn test_generate_structure_initializes_repository() {
        if which::which("git").is_err() {
            eprintln!("git not installed, skipping");
            return;
        }
        let dir = tempdir().unwrap();
        let options = InitOptions {
            init_repository: true,
            ..options(dir.path())
        };

        let data_dir = generate_notekit_structure(options).await.unwrap();

        assert!(data_dir.join(".git").exists(), "data repository should exist");
        assert!(data_dir.join("projects").is_dir());
    }

    #[test]
    fn test_default_init_options() {
        let options = InitOptions::default();
        assert!(!options.force);
        assert!(!options.minimal);
        assert!(options.init_repository);
    }
}
