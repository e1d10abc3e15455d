//! Configuration handling for IPIT
//!
//! Configuration is stored in `.ipit/config.toml` (project) and
//! `~/.config/ipit/config.toml` (global).

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::{
    Availability, ConflictPolicy, IsoCalendar, DEFAULT_CONFLICT_USAGES, DEFAULT_IMPORTANT_USAGES,
};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("Failed to parse configuration: {0}")]
    Parse(String),
}

/// Years the planning data covers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CalendarConfig {
    pub first_year: i32,
    pub last_year: i32,
}

impl Default for CalendarConfig {
    fn default() -> Self {
        Self {
            first_year: 2014,
            last_year: 2019,
        }
    }
}

/// Usage labels for conflict detection
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PolicyConfig {
    /// Labels that clash when another usage shares the element
    pub conflict_usages: Vec<String>,

    /// Labels surfaced by the weekly overview filter
    pub important_usages: Vec<String>,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            conflict_usages: DEFAULT_CONFLICT_USAGES.iter().map(|s| s.to_string()).collect(),
            important_usages: DEFAULT_IMPORTANT_USAGES.iter().map(|s| s.to_string()).collect(),
        }
    }
}

/// Weekly hours employees can be planned for
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AvailabilityConfig {
    /// Hours of anyone not listed in `employees`
    pub default_hours: f64,

    /// Hours per employee name
    pub employees: BTreeMap<String, f64>,
}

impl Default for AvailabilityConfig {
    fn default() -> Self {
        Self {
            default_hours: 40.0,
            employees: BTreeMap::new(),
        }
    }
}

/// Project-level configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct ProjectConfig {
    pub calendar: CalendarConfig,
    pub policy: PolicyConfig,
    pub availability: AvailabilityConfig,
}

impl ProjectConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let CalendarConfig { first_year, last_year } = self.calendar;
        if first_year > last_year {
            return Err(ConfigError::Invalid(format!(
                "calendar.first_year ({}) is after calendar.last_year ({})",
                first_year, last_year
            )));
        }

        let hours = std::iter::once(("default_hours", &self.availability.default_hours))
            .chain(self.availability.employees.iter().map(|(k, v)| (k.as_str(), v)));
        for (name, &h) in hours {
            if !h.is_finite() || h < 0.0 {
                return Err(ConfigError::Invalid(format!(
                    "availability for {} must be a non-negative number of hours, got {}",
                    name, h
                )));
            }
        }
        Ok(())
    }

    pub fn calendar(&self) -> IsoCalendar {
        IsoCalendar::new(self.calendar.first_year..=self.calendar.last_year)
    }

    pub fn availability(&self) -> Availability {
        self.availability
            .employees
            .iter()
            .fold(Availability::new(self.availability.default_hours), |a, (name, &hours)| {
                a.with_employee(name.clone(), hours)
            })
    }

    pub fn policy(&self) -> ConflictPolicy {
        ConflictPolicy::new(
            self.policy.conflict_usages.iter().cloned(),
            self.policy.important_usages.iter().cloned(),
        )
    }
}

/// Global user configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct GlobalConfig {
    /// Output format used when `--format` is not given
    pub default_format: OutputFormat,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

/// Combined configuration (global + project)
#[derive(Debug, Clone)]
pub struct Config {
    pub project: ProjectConfig,
    pub global: GlobalConfig,
    pub project_root: Option<PathBuf>,
}

impl Config {
    /// Loads configuration from default locations
    pub fn load() -> Result<Self> {
        let global = Self::load_global()?;
        let (project, project_root) = Self::load_project()?;

        Ok(Self {
            project,
            global,
            project_root,
        })
    }

    /// Loads configuration for a specific project
    pub fn for_project(project_root: &Path) -> Result<Self> {
        let global = Self::load_global()?;
        let project = Self::load_project_config(project_root)?;

        Ok(Self {
            project,
            global,
            project_root: Some(project_root.to_path_buf()),
        })
    }

    /// Returns the global config directory
    pub fn global_config_dir() -> Option<PathBuf> {
        ProjectDirs::from("dev", "ipit", "ipit").map(|dirs| dirs.config_dir().to_path_buf())
    }

    /// Loads the global configuration alone
    pub fn load_global() -> Result<GlobalConfig> {
        let config_dir = match Self::global_config_dir() {
            Some(dir) => dir,
            None => return Ok(GlobalConfig::default()),
        };

        let config_path = config_dir.join("config.toml");
        if !config_path.exists() {
            return Ok(GlobalConfig::default());
        }

        let content = fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read global config: {}", config_path.display()))?;

        toml::from_str(&content)
            .map_err(|e| ConfigError::Parse(e.to_string()))
            .context("Failed to parse global config")
    }

    fn load_project() -> Result<(ProjectConfig, Option<PathBuf>)> {
        match Self::find_project_root() {
            Some(root) => {
                let config = Self::load_project_config(&root)?;
                Ok((config, Some(root)))
            }
            None => Ok((ProjectConfig::default(), None)),
        }
    }

    /// Loads and validates project configuration from a specific root
    fn load_project_config(project_root: &Path) -> Result<ProjectConfig> {
        let config_path = project_root.join(".ipit").join("config.toml");

        if !config_path.exists() {
            return Ok(ProjectConfig::default());
        }

        let content = fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read project config: {}", config_path.display()))?;

        let config: ProjectConfig = toml::from_str(&content)
            .map_err(|e| ConfigError::Parse(e.to_string()))
            .context("Failed to parse project config")?;

        config
            .validate()
            .with_context(|| format!("Invalid project config: {}", config_path.display()))?;

        Ok(config)
    }

    /// Finds the project root by looking for `.ipit/` directory
    pub fn find_project_root() -> Option<PathBuf> {
        let mut current = std::env::current_dir().ok()?;

        loop {
            if current.join(".ipit").is_dir() {
                return Some(current);
            }

            if !current.pop() {
                return None;
            }
        }
    }

    /// Returns the project root, or an error if not in a project
    pub fn require_project_root(&self) -> Result<&Path> {
        self.project_root
            .as_deref()
            .ok_or_else(|| anyhow::anyhow!("Not in an ipit project. Run 'ipit init' first."))
    }

    /// Saves the project configuration
    pub fn save_project(&self) -> Result<()> {
        let root = self.require_project_root()?;
        let config_path = root.join(".ipit").join("config.toml");

        let content =
            toml::to_string_pretty(&self.project).context("Failed to serialize project config")?;

        fs::write(&config_path, content)
            .with_context(|| format!("Failed to write project config: {}", config_path.display()))
    }
}
