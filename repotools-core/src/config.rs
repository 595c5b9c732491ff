// repotools-core/src/config.rs

//! Handles the optional `Repotools.toml` project configuration.

use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const CONFIG_FILENAME: &str = "Repotools.toml";
pub const DEFAULT_PROJECT_NAME: &str = "Riddle Rush Monorepo";
pub const DEFAULT_PACKAGE_SCOPE: &str = "@riddle-rush";

fn default_project_name() -> String {
    DEFAULT_PROJECT_NAME.to_string()
}

fn default_package_scope() -> String {
    DEFAULT_PACKAGE_SCOPE.to_string()
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct ToolsConfig {
    #[serde(default = "default_project_name")]
    pub project_name: String,
    /// npm scope of the workspace packages, used by `run_build`.
    #[serde(default = "default_package_scope")]
    pub package_scope: String,
    /// Per-tool timeout overrides, in seconds.
    #[serde(default)]
    pub timeouts: HashMap<String, u64>,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            project_name: default_project_name(),
            package_scope: default_package_scope(),
            timeouts: HashMap::new(),
        }
    }
}

impl ToolsConfig {
    pub fn from_toml_str(content: &str) -> Result<ToolsConfig> {
        let config: ToolsConfig = match toml::from_str(content) {
            Ok(cfg) => cfg,
            Err(e) => {
                tracing::error!(error = %e, "Failed to parse TOML content");
                return Err(anyhow!(e))
                    .context("Failed to parse configuration TOML content. Check TOML syntax.");
            }
        };

        if config.project_name.trim().is_empty() {
            return Err(anyhow!("'project_name' in config content is empty."));
        }
        if !config.package_scope.starts_with('@') || config.package_scope.len() < 2 {
            return Err(anyhow!(
                "'package_scope' must look like '@scope', got '{}'.",
                config.package_scope
            ));
        }
        for (tool, secs) in &config.timeouts {
            if *secs == 0 {
                return Err(anyhow!("Timeout for tool '{}' must be greater than zero.", tool));
            }
        }

        tracing::info!("Successfully parsed and validated tools configuration.");
        Ok(config)
    }

    /// Configured timeout overrides, sorted by tool name.
    pub fn timeout_overrides(&self) -> impl Iterator<Item = (&str, Duration)> {
        let mut overrides: Vec<(&str, Duration)> = self
            .timeouts
            .iter()
            .map(|(name, secs)| (name.as_str(), Duration::from_secs(*secs)))
            .collect();
        overrides.sort_by(|a, b| a.0.cmp(b.0));
        overrides.into_iter()
    }
}

/// Walks up from `start` to the first directory containing [`CONFIG_FILENAME`].
pub fn find_project_root(start: &Path) -> Option<PathBuf> {
    let mut current = start;
    loop {
        if current.join(CONFIG_FILENAME).is_file() {
            return Some(current.to_path_buf());
        }
        current = current.parent()?;
    }
}

/// Loads configuration for a run started in `start`.
///
/// Returns the config and the project root. Without a config file anywhere
/// above `start`, defaults apply and `start` itself is the root. The root is
/// canonical, so it matches the real paths external tools report.
pub fn load_config(start: &Path) -> Result<(ToolsConfig, PathBuf)> {
    let start = fs::canonicalize(start)
        .with_context(|| format!("Project directory {:?} is not accessible", start))?;
    let Some(root) = find_project_root(&start) else {
        tracing::info!(
            "No {} found above {:?}; using defaults with that directory as project root.",
            CONFIG_FILENAME,
            start
        );
        return Ok((ToolsConfig::default(), start));
    };
    let config_path = root.join(CONFIG_FILENAME);
    tracing::info!("Found configuration file at: {:?}", config_path);
    let content = fs::read_to_string(&config_path)
        .with_context(|| format!("Failed to read project config file: {:?}", config_path))?;
    let config = ToolsConfig::from_toml_str(&content)
        .with_context(|| format!("Invalid configuration in {:?}", config_path))?;
    Ok((config, root))
}
