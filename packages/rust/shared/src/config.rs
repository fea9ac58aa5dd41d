//! Application configuration for Graphloom.
//!
//! User config lives at `~/.graphloom/graphloom.toml`.
//! CLI flags override config file values, which override defaults.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{GraphloomError, Result};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "graphloom.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".graphloom";

// ---------------------------------------------------------------------------
// Config structs (matching graphloom.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Global defaults.
    #[serde(default)]
    pub defaults: DefaultsConfig,

    /// Graph layout settings.
    #[serde(default)]
    pub layout: LayoutConfig,

    /// Pipeline cache settings.
    #[serde(default)]
    pub cache: CacheConfig,
}

/// `[defaults]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DefaultsConfig {
    /// Default graph output directory.
    #[serde(default = "default_output_dir")]
    pub output_dir: String,

    /// Default workflow name.
    #[serde(default = "default_workflow")]
    pub workflow: String,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
            workflow: default_workflow(),
        }
    }
}

fn default_output_dir() -> String {
    "~/graphloom-graphs".into()
}
fn default_workflow() -> String {
    "index".into()
}

/// `[layout]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LayoutConfig {
    /// Whether to compute node coordinates. Disabled layouts emit (0, 0).
    #[serde(default)]
    pub enabled: bool,

    /// Radius of the circular layout.
    #[serde(default = "default_layout_radius")]
    pub radius: f64,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            radius: default_layout_radius(),
        }
    }
}

fn default_layout_radius() -> f64 {
    1.0
}

/// `[cache]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Whether intermediate results are memoized at all.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// On-disk cache directory. `None` keeps the cache in memory.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dir: Option<String>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            dir: None,
        }
    }
}

fn default_true() -> bool {
    true
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.graphloom/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| GraphloomError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.graphloom/graphloom.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| GraphloomError::io(path, e))?;

    toml::from_str(&content).map_err(|e| {
        GraphloomError::config(format!("failed to parse {}: {e}", path.display()))
    })
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| GraphloomError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| GraphloomError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| GraphloomError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_serializes() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize default config");
        assert!(toml_str.contains("output_dir"));
        assert!(toml_str.contains("radius"));
    }

    #[test]
    fn config_roundtrip() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize");
        let parsed: AppConfig = toml::from_str(&toml_str).expect("deserialize");
        assert_eq!(parsed.defaults.workflow, "index");
        assert!(!parsed.layout.enabled);
        assert_eq!(parsed.layout.radius, 1.0);
        assert!(parsed.cache.enabled);
    }

    #[test]
    fn partial_config_fills_defaults() {
        let toml_str = r#"
[layout]
enabled = true
radius = 250.0

[cache]
dir = "/tmp/graphloom-cache"
"#;
        let config: AppConfig = toml::from_str(toml_str).expect("parse");
        assert!(config.layout.enabled);
        assert_eq!(config.layout.radius, 250.0);
        assert_eq!(config.cache.dir.as_deref(), Some("/tmp/graphloom-cache"));
        // Untouched sections keep their defaults
        assert_eq!(config.defaults.workflow, "index");
        assert!(config.cache.enabled);
    }

    #[test]
    fn missing_file_yields_parse_error() {
        let result = load_config_from(Path::new("/nonexistent/graphloom.toml"));
        assert!(result.is_err());
    }
}
