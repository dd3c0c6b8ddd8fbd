use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::sync::SyncError;

pub const DEFAULT_SOURCE_BASE_URL: &str = "https://www.toggl.com/api/v6/";
pub const DEFAULT_ISSUE_PREFIX: &str = "COT";

const ENV_SOURCE_API_KEY: &str = "TOGGL_API_KEY";
const ENV_DESTINATION_USERNAME: &str = "YOUTRACK_USERNAME";
const ENV_DESTINATION_PASSWORD: &str = "YOUTRACK_PASSWORD";

/// Raw contents of `config.toml`.
#[derive(Debug, Deserialize, Default)]
pub struct AppConfig {
    pub source_base_url: Option<String>,
    pub destination_base_url: Option<String>,
    #[serde(default)]
    pub approved_project_names: Vec<String>,
    pub issue_prefix: Option<String>,
    pub journal: Option<bool>,
    #[serde(default)]
    pub workers: Vec<WorkerCredential>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct WorkerCredential {
    #[serde(alias = "account_label")]
    pub label: String,
    pub source_api_key: String,
    pub destination_username: String,
    pub destination_password: String,
}

/// Validated configuration handed to the orchestrator.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    pub source_base_url: String,
    pub destination_base_url: String,
    pub approved_project_names: Vec<String>,
    pub issue_prefix: String,
    pub journal: bool,
    pub workers: Vec<WorkerCredential>,
}

impl SyncConfig {
    pub fn is_approved_project(&self, project_name: &str) -> bool {
        let wanted = project_name.to_lowercase();
        self.approved_project_names
            .iter()
            .any(|p| p.to_lowercase() == wanted)
    }
}

impl AppConfig {
    /// Apply defaults, the environment fallback for credentials, and reject
    /// anything that would leave a worker unable to run.
    pub fn into_sync_config(
        mut self,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<SyncConfig, SyncError> {
        if self.workers.is_empty() {
            if let Some(worker) = worker_from_env(&env) {
                self.workers.push(worker);
            }
        }

        let destination_base_url = self
            .destination_base_url
            .filter(|u| !u.trim().is_empty())
            .ok_or_else(|| SyncError::Config("destination_base_url is required".into()))?;

        if self.approved_project_names.iter().all(|p| p.trim().is_empty()) {
            return Err(SyncError::Config(
                "approved_project_names must list at least one project".into(),
            ));
        }

        if self.workers.is_empty() {
            return Err(SyncError::Config(format!(
                "no [[workers]] configured and {ENV_SOURCE_API_KEY}/{ENV_DESTINATION_USERNAME}/{ENV_DESTINATION_PASSWORD} not set"
            )));
        }

        for (i, worker) in self.workers.iter().enumerate() {
            let missing = [
                ("label", &worker.label),
                ("source_api_key", &worker.source_api_key),
                ("destination_username", &worker.destination_username),
                ("destination_password", &worker.destination_password),
            ]
            .into_iter()
            .find(|(_, v)| v.trim().is_empty());
            if let Some((field, _)) = missing {
                return Err(SyncError::Config(format!(
                    "worker #{} is missing {field}",
                    i + 1
                )));
            }
        }

        let issue_prefix = self
            .issue_prefix
            .unwrap_or_else(|| DEFAULT_ISSUE_PREFIX.to_string());
        if issue_prefix.is_empty() || !issue_prefix.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(SyncError::Config(format!(
                "issue_prefix must be alphanumeric, got {issue_prefix:?}"
            )));
        }

        Ok(SyncConfig {
            source_base_url: with_trailing_slash(
                self.source_base_url
                    .unwrap_or_else(|| DEFAULT_SOURCE_BASE_URL.to_string()),
            ),
            destination_base_url: with_trailing_slash(destination_base_url),
            approved_project_names: self
                .approved_project_names
                .into_iter()
                .filter(|p| !p.trim().is_empty())
                .collect(),
            issue_prefix,
            journal: self.journal.unwrap_or(true),
            workers: self.workers,
        })
    }
}

fn worker_from_env(env: &impl Fn(&str) -> Option<String>) -> Option<WorkerCredential> {
    Some(WorkerCredential {
        label: "default".into(),
        source_api_key: env(ENV_SOURCE_API_KEY)?,
        destination_username: env(ENV_DESTINATION_USERNAME)?,
        destination_password: env(ENV_DESTINATION_PASSWORD)?,
    })
}

fn with_trailing_slash(mut url: String) -> String {
    if !url.ends_with('/') {
        url.push('/');
    }
    url
}

pub fn data_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".toggl2youtrack")
}

fn config_path() -> PathBuf {
    data_dir().join("config.toml")
}

pub fn load_config(path: Option<&Path>) -> Result<AppConfig> {
    let path = path.map(Path::to_path_buf).unwrap_or_else(config_path);
    if !path.exists() {
        return Ok(AppConfig::default());
    }
    let contents = std::fs::read_to_string(&path)
        .with_context(|| format!("Failed to read config from {}", path.display()))?;
    let config: AppConfig = toml::from_str(&contents)
        .with_context(|| format!("Failed to parse {}", path.display()))?;
    Ok(config)
}

/// Read the config file and validate it against the process environment.
pub fn load_sync_config(path: Option<&Path>) -> Result<SyncConfig> {
    let config = load_config(path)?;
    Ok(config.into_sync_config(|key| std::env::var(key).ok())?)
}
