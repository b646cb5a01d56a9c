//! `buildline.toml` configuration.
//!
//! Every section and field is optional in the file; defaults keep a bare
//! deployment working. `workflow.require_qc_review` arbitrates between the
//! self-certified completion path and the full QC review path — see
//! [`crate::engine::Engine::complete_assembly`].

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildlineConfig {
    #[serde(default)]
    pub workflow: WorkflowConfig,
    #[serde(default)]
    pub reports: ReportConfig,
}

impl Default for BuildlineConfig {
    fn default() -> Self {
        Self {
            workflow: WorkflowConfig::default(),
            reports: ReportConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowConfig {
    /// When true, `complete_assembly` lands journeys in `completed` for a
    /// mandatory QC review instead of self-certifying straight to
    /// `ready_for_sale`.
    #[serde(default)]
    pub require_qc_review: bool,
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            require_qc_review: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportConfig {
    /// Dwell-time threshold (hours) after which the aging report flags a
    /// journey as stuck.
    #[serde(default = "default_stale_after_hours")]
    pub stale_after_hours: u64,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            stale_after_hours: default_stale_after_hours(),
        }
    }
}

const fn default_stale_after_hours() -> u64 {
    24
}

/// Load config from `path`. A missing file yields the defaults.
///
/// # Errors
///
/// Returns an error if the file exists but cannot be read or parsed.
pub fn load_config(path: &Path) -> Result<BuildlineConfig> {
    if !path.exists() {
        return Ok(BuildlineConfig::default());
    }

    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("read config {}", path.display()))?;
    toml::from_str(&raw).with_context(|| format!("parse config {}", path.display()))
}
