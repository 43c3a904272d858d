//! TOML configuration.
//!
//! ```toml
//! [db]
//! path = "data/database/residency.db"
//!
//! [project]
//! root = "."
//!
//! [export]
//! vault_dir = "docs/vault"
//! ```
//!
//! Every section is optional. A missing config file yields
//! [`Config::default`].

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub db: DbConfig,
    #[serde(default)]
    pub project: ProjectConfig,
    #[serde(default)]
    pub export: ExportConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    #[serde(default = "default_db_path")]
    pub path: PathBuf,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

fn default_db_path() -> PathBuf {
    PathBuf::from("data/database/residency.db")
}

/// Artifact paths given relative are resolved against `root`, and stored
/// relative to it when the file lives underneath.
#[derive(Debug, Deserialize, Clone)]
pub struct ProjectConfig {
    #[serde(default = "default_root")]
    pub root: PathBuf,
}

impl Default for ProjectConfig {
    fn default() -> Self {
        Self {
            root: default_root(),
        }
    }
}

fn default_root() -> PathBuf {
    PathBuf::from(".")
}

#[derive(Debug, Deserialize, Clone)]
pub struct ExportConfig {
    #[serde(default = "default_vault_dir")]
    pub vault_dir: PathBuf,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            vault_dir: default_vault_dir(),
        }
    }
}

fn default_vault_dir() -> PathBuf {
    PathBuf::from("docs/vault")
}

pub fn load_config(path: &Path) -> Result<Config> {
    if !path.exists() {
        return Ok(Config::default());
    }

    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;

    if config.db.path.as_os_str().is_empty() {
        anyhow::bail!("db.path must not be empty");
    }

    Ok(config)
}
