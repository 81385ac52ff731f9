//! Files written by `notekit init`, embedded at compile time.
//!
//! The agent templates double as the built-in agents of a project that
//! defines none of its own.

use rust_embed::RustEmbed;

/// Contents of the workspace `templates/` directory.
#[derive(RustEmbed)]
#[folder = "$CARGO_MANIFEST_DIR/../../templates"]
pub struct TemplateAssets;

/// Text of the template at `path`, relative to `templates/`.
///
/// ```
/// use nk_core::init::templates::get_template;
///
/// let config = get_template("config.toml").unwrap_or_default();
/// assert!(config.contains("max_retries ="));
/// ```
pub fn get_template(path: &str) -> Option<String> {
    let file = TemplateAssets::get(path)?;
    Some(String::from_utf8_lossy(&file.data).into_owned())
}

/// Template paths starting with `prefix`, e.g. `"agents/"`.
pub fn list_templates(prefix: &str) -> Vec<String> {
    let mut paths: Vec<String> = TemplateAssets::iter()
        .filter(|path| path.starts_with(prefix))
        .map(|path| path.into_owned())
        .collect();
    paths.sort();
    paths
}
