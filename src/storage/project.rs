//! Project management
//!
//! Handles `.ipit/` initialization and provides access to the usage store.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use thiserror::Error;

use super::{Config, UsageStore};

#[derive(Debug, Error)]
pub enum ProjectError {
    #[error("Not in an ipit project. Run 'ipit init' first.")]
    NotInProject,
}

const DEFAULT_CONFIG: &str = r#"# IPIT configuration

[calendar]
# Years accepted in week ranges
first_year = 2014
last_year = 2019

[policy]
# Usages that clash when an element is shared in the same week
conflict_usages = [
    "Cfg aanp. + Test Uitv.",
    "Software update",
    "software update + Testen",
    "Switched off",
    "Configuratie aanpassing",
]

# Usages listed by the weekly overview filter (pwu)
important_usages = [
    "Cfg aanp. + Test Uitv.",
    "Software update",
    "software update + Testen",
    "Training",
    "Configuratie aanpassing",
]

[availability]
# Weekly hours used for the Available rows of the hours report
default_hours = 40.0

[availability.employees]
# "Hannina Robin" = 32.0
"#;

const GITIGNORE: &str = r#"# Usage database (rebuilt with 'ipit import')
usage.db
usage.db-wal
usage.db-shm
"#;

/// An IPIT project directory
pub struct Project {
    root: PathBuf,
    config: Config,
}

impl Project {
    /// Opens an existing project at the given path
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();

        if !root.join(".ipit").is_dir() {
            return Err(ProjectError::NotInProject.into());
        }

        let config = Config::for_project(&root)?;

        Ok(Self { root, config })
    }

    /// Opens the project at the current directory or a parent
    pub fn open_current() -> Result<Self> {
        let root = Config::find_project_root().ok_or(ProjectError::NotInProject)?;

        Self::open(root)
    }

    /// Initializes a new project at the given path
    pub fn init(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        let ipit_dir = root.join(".ipit");

        fs::create_dir_all(&ipit_dir).with_context(|| {
            format!("Failed to create .ipit directory: {}", ipit_dir.display())
        })?;

        let config_path = ipit_dir.join("config.toml");
        if !config_path.exists() {
            fs::write(&config_path, DEFAULT_CONFIG)
                .with_context(|| format!("Failed to write config: {}", config_path.display()))?;
        }

        let gitignore_path = ipit_dir.join(".gitignore");
        if !gitignore_path.exists() {
            fs::write(&gitignore_path, GITIGNORE).with_context(|| {
                format!("Failed to write .gitignore: {}", gitignore_path.display())
            })?;
        }

        Self::open(root)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn ipit_dir(&self) -> PathBuf {
        self.root.join(".ipit")
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Opens (creating if needed) the usage database
    pub fn store(&self) -> Result<UsageStore> {
        UsageStore::open(&self.root)
    }

    /// Opens the usage database, failing if nothing was imported yet
    pub fn existing_store(&self) -> Result<UsageStore> {
        UsageStore::open_existing(&self.root)
    }
}
