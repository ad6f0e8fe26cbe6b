//! Project persistence: one directory per project under the workspace
//! root, holding `product.json`, the deliverables, and the run history.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use stagegate_core::Stage;
use tokio::fs;
use tracing::{debug, warn};

use crate::error::{OrchestratorError, Result};

const CONFIG_FILE: &str = "product.json";

/// The durable product configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProductConfig {
    /// The seeded idea the pipeline elaborates.
    pub idea: String,
    /// The furthest stage a run has reached.
    #[serde(default)]
    pub stage: Stage,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectSummary {
    pub name: String,
    pub idea: String,
    pub stage: Stage,
}

/// A flat directory of projects.
#[derive(Debug, Clone)]
pub struct ProjectStore {
    root: PathBuf,
}

impl ProjectStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn project_dir(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }

    fn config_path(&self, name: &str) -> PathBuf {
        self.project_dir(name).join(CONFIG_FILE)
    }

    /// Create a new project. Fails if one with this name already has a
    /// configuration.
    pub async fn create(&self, name: &str, idea: &str) -> Result<ProductConfig> {
        let path = self.config_path(name);
        if fs::try_exists(&path).await? {
            return Err(OrchestratorError::ProjectExists(name.to_string()));
        }
        let config = ProductConfig {
            idea: idea.to_string(),
            stage: Stage::default(),
        };
        self.save(name, &config).await?;
        debug!(project = name, "project created");
        Ok(config)
    }

    pub async fn load(&self, name: &str) -> Result<ProductConfig> {
        let path = self.config_path(name);
        let raw = match fs::read_to_string(&path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(OrchestratorError::ConfigurationMissing(path));
            }
            Err(e) => return Err(e.into()),
        };
        Ok(serde_json::from_str(&raw)?)
    }

    pub async fn save(&self, name: &str, config: &ProductConfig) -> Result<()> {
        let path = self.config_path(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        fs::write(&path, serde_json::to_string_pretty(config)?).await?;
        Ok(())
    }

    pub async fn update_idea(&self, name: &str, idea: &str) -> Result<ProductConfig> {
        let mut config = self.load(name).await?;
        config.idea = idea.to_string();
        self.save(name, &config).await?;
        Ok(config)
    }

    /// All projects with a readable configuration, sorted by name.
    /// Directories without one are skipped, not errors.
    pub async fn list(&self) -> Result<Vec<ProjectSummary>> {
        let mut summaries = Vec::new();
        let mut entries = match fs::read_dir(&self.root).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(summaries),
            Err(e) => return Err(e.into()),
        };
        while let Some(entry) = entries.next_entry().await? {
            if !entry.file_type().await?.is_dir() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().into_owned();
            match self.load(&name).await {
                Ok(config) => summaries.push(ProjectSummary {
                    name,
                    idea: config.idea,
                    stage: config.stage,
                }),
                Err(error) => {
                    warn!(project = %name, %error, "skipping unreadable project");
                }
            }
        }
        summaries.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(summaries)
    }
}
