//! Run configuration for the extraction-and-load pipeline.

use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

use crate::error::{PipelineError, PipelineResult};
use crate::loading::RetryPolicy;
use crate::warehouse::DEFAULT_REGION;

use super::observability::Severity;

/// Environment variable holding the destination container id (required by [`PipelineConfig::from_env`]).
pub const ENV_CONTAINER_ID: &str = "DATASET_ID";
pub const ENV_PROJECT_ID: &str = "GCP_PROJECT_ID";
pub const ENV_REGION: &str = "DATASET_REGION";
pub const ENV_CREDENTIALS: &str = "GOOGLE_APPLICATION_CREDENTIALS";
pub const ENV_WAREHOUSE_ROOT: &str = "SHEET_WAREHOUSE_ROOT";
pub const ENV_PARALLELISM: &str = "SHEET_WAREHOUSE_PARALLELISM";
pub const ENV_ARTIFACT_DIR: &str = "SHEET_WAREHOUSE_ARTIFACT_DIR";

/// Configuration handed to [`crate::pipeline::Pipeline::new`].
///
/// `project_id` and `credential_ref` identify the warehouse account; they are carried for the
/// warehouse implementation and reports, never read or validated here.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub project_id: Option<String>,
    /// Destination container (dataset) for every table of a run.
    pub container_id: String,
    /// Region used when the container has to be created.
    pub region: String,
    pub credential_ref: Option<PathBuf>,
    /// Root directory for [`crate::warehouse::ParquetWarehouse`].
    pub warehouse_root: PathBuf,
    /// Maximum concurrent table loads. `1` loads sheets one after another.
    pub parallelism: usize,
    pub retry: RetryPolicy,
    /// Deadline for one table load, retries included.
    pub load_timeout: Option<Duration>,
    /// When set, every extracted sheet is also written to `<artifact_dir>/<table>.csv`.
    pub artifact_dir: Option<PathBuf>,
    /// Failures at or above this severity are reported through `on_alert`.
    pub alert_at_or_above: Severity,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            project_id: None,
            container_id: String::new(),
            region: DEFAULT_REGION.to_string(),
            credential_ref: None,
            warehouse_root: PathBuf::from("warehouse"),
            parallelism: default_parallelism(),
            retry: RetryPolicy::default(),
            load_timeout: None,
            artifact_dir: None,
            alert_at_or_above: Severity::Critical,
        }
    }
}

fn default_parallelism() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
        .min(4)
}

impl PipelineConfig {
    pub fn new(container_id: impl Into<String>) -> Self {
        Self {
            container_id: container_id.into(),
            ..Self::default()
        }
    }

    /// Build a config from the process environment, loading a `.env` file first if present.
    pub fn from_env() -> PipelineResult<Self> {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a config from an arbitrary key lookup. Blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> PipelineResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let container_id = get(ENV_CONTAINER_ID)
            .ok_or_else(|| PipelineError::Config(format!("{ENV_CONTAINER_ID} is not set")))?;
        let mut config = Self::new(container_id);
        config.project_id = get(ENV_PROJECT_ID);
        if let Some(region) = get(ENV_REGION) {
            config.region = region;
        }
        config.credential_ref = get(ENV_CREDENTIALS).map(PathBuf::from);
        if let Some(root) = get(ENV_WAREHOUSE_ROOT) {
            config.warehouse_root = PathBuf::from(root);
        }
        if let Some(raw) = get(ENV_PARALLELISM) {
            config.parallelism = raw.parse().map_err(|e| {
                PipelineError::Config(format!("{ENV_PARALLELISM}='{raw}' is not a positive integer: {e}"))
            })?;
        }
        config.artifact_dir = get(ENV_ARTIFACT_DIR).map(PathBuf::from);
        config.validate()?;
        Ok(config)
    }

    /// Reject configurations a run cannot start with.
    pub fn validate(&self) -> PipelineResult<()> {
        if self.container_id.is_empty() {
            return Err(PipelineError::Config("container id is empty".to_string()));
        }
        if !crate::warehouse::is_valid_identifier(&self.container_id) {
            return Err(PipelineError::Config(format!(
                "container id '{}' may only contain letters, digits and '_'",
                self.container_id
            )));
        }
        if self.region.trim().is_empty() {
            return Err(PipelineError::Config("region is empty".to_string()));
        }
        if self.parallelism == 0 {
            return Err(PipelineError::Config("parallelism must be at least 1".to_string()));
        }
        Ok(())
    }

    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.region = region.into();
        self
    }

    pub fn with_project_id(mut self, project_id: impl Into<String>) -> Self {
        self.project_id = Some(project_id.into());
        self
    }

    pub fn with_warehouse_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.warehouse_root = root.into();
        self
    }

    pub fn with_parallelism(mut self, parallelism: usize) -> Self {
        self.parallelism = parallelism;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_load_timeout(mut self, timeout: Duration) -> Self {
        self.load_timeout = Some(timeout);
        self
    }

    pub fn with_artifact_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.artifact_dir = Some(dir.into());
        self
    }

    pub fn with_alert_at_or_above(mut self, severity: Severity) -> Self {
        self.alert_at_or_above = severity;
        self
    }
}
