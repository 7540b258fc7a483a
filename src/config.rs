//! Pipeline configuration loaded from TOML.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors returned while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file exists but could not be read.
    #[error("failed to read {path}: {source}")]
    Read {
        /// File path.
        path: PathBuf,
        /// Underlying error.
        source: std::io::Error,
    },

    /// The file is not valid TOML for this schema.
    #[error("failed to parse {path}: {source}")]
    Parse {
        /// File path.
        path: PathBuf,
        /// Underlying error.
        source: toml::de::Error,
    },

    /// A value is out of range.
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Pipeline configuration.
///
/// Missing fields take their defaults, so an empty file is valid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Minimum completeness score for a ticket to proceed.
    pub completeness_threshold: f64,
    /// Skip all external writes (comments, labels, pull requests).
    pub dry_run: bool,
    /// Label applied with a clarification comment.
    pub clarification_label: String,
    /// Target repository.
    pub repository: RepositoryConfig,
    /// Documentation lookup.
    pub docs: DocsConfig,
    /// Activity trail location.
    pub activity_log_path: PathBuf,
    /// Run history database location.
    pub database_path: PathBuf,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            completeness_threshold: 0.65,
            dry_run: false,
            clarification_label: "needs-clarification".to_owned(),
            repository: RepositoryConfig::default(),
            docs: DocsConfig::default(),
            activity_log_path: PathBuf::from("logs/activity.jsonl"),
            database_path: PathBuf::from("data/pipewright.db"),
        }
    }
}

impl PipelineConfig {
    /// Checks value ranges.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] naming the first offending key.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=1.0).contains(&self.completeness_threshold) {
            return Err(ConfigError::Invalid(
                "completeness_threshold must be within [0, 1]".to_owned(),
            ));
        }
        if self.clarification_label.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "clarification_label must not be empty".to_owned(),
            ));
        }
        if self.repository.base_branch.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "repository.base_branch must not be empty".to_owned(),
            ));
        }
        if self.repository.max_scout_files == 0 {
            return Err(ConfigError::Invalid(
                "repository.max_scout_files must be > 0".to_owned(),
            ));
        }
        if self.docs.enabled && self.docs.max_pages == 0 {
            return Err(ConfigError::Invalid("docs.max_pages must be > 0".to_owned()));
        }
        Ok(())
    }
}

/// Target repository settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RepositoryConfig {
    /// Repository owner.
    pub owner: String,
    /// Repository name.
    pub name: String,
    /// Branch pull requests target.
    pub base_branch: String,
    /// Reviewers requested on every pull request.
    pub default_reviewers: Vec<String>,
    /// Open pull requests as drafts.
    pub draft_pull_requests: bool,
    /// Upper bound on files examined while scouting.
    pub max_scout_files: usize,
}

impl Default for RepositoryConfig {
    fn default() -> Self {
        Self {
            owner: String::new(),
            name: String::new(),
            base_branch: "main".to_owned(),
            default_reviewers: Vec::new(),
            draft_pull_requests: true,
            max_scout_files: 20,
        }
    }
}

/// Documentation lookup settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DocsConfig {
    /// Query the documentation source at all.
    pub enabled: bool,
    /// Upper bound on pages fetched.
    pub max_pages: usize,
    /// Spaces to search; empty searches everywhere.
    pub space_keys: Vec<String>,
}

impl Default for DocsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_pages: 10,
            space_keys: Vec::new(),
        }
    }
}

/// Loads configuration from a TOML file.
///
/// A missing file yields [`PipelineConfig::default`].
///
/// # Errors
///
/// Returns [`ConfigError`] when the file cannot be read or parsed, or holds
/// out-of-range values.
pub fn load_config(path: &Path) -> Result<PipelineConfig, ConfigError> {
    if !path.exists() {
        let config = PipelineConfig::default();
        config.validate()?;
        return Ok(config);
    }
    let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let config: PipelineConfig = toml::from_str(&contents).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })?;
    config.validate()?;
    Ok(config)
}
