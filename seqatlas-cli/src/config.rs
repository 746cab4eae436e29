//! Configuration handling for the SeqAtlas CLI
//!
//! Supports loading configuration from seqatlas.toml files with CLI argument overrides.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use seqatlas_core::{ApiEndpoints, CountryTable, JobPoller, ReconcileOptions, Reconciler};
use seqatlas_render::dashboard::DashboardOptions;
use seqatlas_render::{Canvas, GeoMapOptions, RenderStyle};

pub const DEFAULT_CONFIG_FILE: &str = "seqatlas.toml";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub reconcile: ReconcileConfig,
    #[serde(default)]
    pub render: RenderConfig,
    #[serde(default)]
    pub timelapse: TimeLapseConfig,
    #[serde(default)]
    pub geo: GeoMapOptions,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Base URL of the embedding service
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Embedding model requested on submit
    #[serde(default = "default_model")]
    pub model: String,

    /// Per-request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Delay between job status checks in milliseconds
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Consecutive failed status checks before giving up
    #[serde(default = "default_max_poll_errors")]
    pub max_poll_errors: u32,

    #[serde(default)]
    pub endpoints: ApiEndpoints,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconcileConfig {
    /// Ranked candidates requested and reconciled per job
    #[serde(default = "default_candidate_pool")]
    pub candidate_pool: usize,

    /// Leading matched hits flagged as top-10
    #[serde(default = "default_top_k")]
    pub top_k: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenderConfig {
    /// Default width of every view
    #[serde(default = "default_width")]
    pub width: u32,

    /// Default height of every view
    #[serde(default = "default_height")]
    pub height: u32,

    /// Title drawn above exported views
    #[serde(default)]
    pub title: Option<String>,

    /// Embed a provenance comment (includes a timestamp)
    #[serde(default)]
    pub provenance: bool,

    #[serde(default)]
    pub style: RenderStyle,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeLapseConfig {
    /// Step interval in milliseconds
    #[serde(default = "default_speed_ms")]
    pub speed_ms: u64,

    /// Year range used when results carry no years
    #[serde(default = "default_time_min")]
    pub time_min: i32,

    #[serde(default = "default_time_max")]
    pub time_max: i32,
}

// Default value functions
fn default_base_url() -> String { "http://localhost:8000".to_string() }
fn default_model() -> String { "default".to_string() }
fn default_timeout_secs() -> u64 { 60 }
fn default_poll_interval_ms() -> u64 { 2000 }
fn default_max_poll_errors() -> u32 { 5 }
fn default_candidate_pool() -> usize { seqatlas_core::reconcile::DEFAULT_CANDIDATE_POOL }
fn default_top_k() -> usize { seqatlas_core::reconcile::DEFAULT_TOP_K }
fn default_width() -> u32 { 960 }
fn default_height() -> u32 { 600 }
fn default_speed_ms() -> u64 { 1000 }
fn default_time_min() -> i32 { 1950 }
fn default_time_max() -> i32 { 2025 }

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            model: default_model(),
            timeout_secs: default_timeout_secs(),
            poll_interval_ms: default_poll_interval_ms(),
            max_poll_errors: default_max_poll_errors(),
            endpoints: ApiEndpoints::default(),
        }
    }
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        Self {
            candidate_pool: default_candidate_pool(),
            top_k: default_top_k(),
        }
    }
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            width: default_width(),
            height: default_height(),
            title: None,
            provenance: false,
            style: RenderStyle::default(),
        }
    }
}

impl Default for TimeLapseConfig {
    fn default() -> Self {
        Self {
            speed_ms: default_speed_ms(),
            time_min: default_time_min(),
            time_max: default_time_max(),
        }
    }
}

impl ApiConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn poller(&self) -> JobPoller {
        JobPoller {
            interval: Duration::from_millis(self.poll_interval_ms),
            max_errors: self.max_poll_errors,
        }
    }
}

impl Config {
    /// Load configuration from file or use defaults
    pub fn load(config_path: Option<&Path>) -> Result<Self> {
        let config = match config_path {
            Some(path) => {
                log::info!("Loading configuration from: {}", path.display());
                Self::load_from_file(path)?
            }
            None => {
                let default_path = PathBuf::from(DEFAULT_CONFIG_FILE);
                if default_path.exists() {
                    log::info!("Loading configuration from: {}", DEFAULT_CONFIG_FILE);
                    Self::load_from_file(&default_path)?
                } else {
                    log::debug!("Using default configuration");
                    Self::default()
                }
            }
        };

        Ok(config)
    }

    /// Load configuration from a specific TOML file
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read configuration file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse configuration file: {}", path.display()))?;

        Ok(config)
    }

    /// Save configuration to a TOML file
    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self).context("Failed to serialize configuration")?;

        std::fs::write(path, content)
            .with_context(|| format!("Failed to write configuration file: {}", path.display()))?;

        Ok(())
    }

    /// Generate example configuration file content
    pub fn example_toml() -> Result<String> {
        toml::to_string_pretty(&Self::default()).context("Failed to serialize default configuration")
    }

    pub fn reconciler(&self) -> Reconciler {
        let options = ReconcileOptions {
            candidate_pool: self.reconcile.candidate_pool,
            top_k: self.reconcile.top_k,
        };
        Reconciler::new(options, CountryTable::builtin())
    }

    /// View options, with optional size overrides from the command line
    pub fn dashboard_options(&self, width: Option<u32>, height: Option<u32>) -> DashboardOptions {
        let canvas = Canvas::new(
            width.unwrap_or(self.render.width) as f64,
            height.unwrap_or(self.render.height) as f64,
        );
        DashboardOptions {
            canvas,
            style: self.render.style.clone(),
            geo: self.geo.clone(),
            time_range: (self.timelapse.time_min, self.timelapse.time_max),
            speed: Duration::from_millis(self.timelapse.speed_ms),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.api.poll_interval_ms, 2000);
        assert_eq!(config.reconcile.candidate_pool, 100);
        assert_eq!(config.reconcile.top_k, 10);
        assert_eq!(config.render.width, 960);
        assert!(!config.render.provenance);
    }

    #[test]
    fn test_config_roundtrip() -> Result<()> {
        let mut config = Config::default();
        config.api.base_url = "https://atlas.example.org".into();
        config.render.title = Some("Query 7".into());
        let temp_file = NamedTempFile::new()?;

        config.save_to_file(temp_file.path())?;
        let loaded = Config::load_from_file(temp_file.path())?;

        assert_eq!(loaded.api.base_url, "https://atlas.example.org");
        assert_eq!(loaded.render.title.as_deref(), Some("Query 7"));
        assert_eq!(loaded.api.endpoints, config.api.endpoints);
        assert_eq!(loaded.geo, config.geo);
        Ok(())
    }

    #[test]
    fn test_partial_file_fills_defaults() -> Result<()> {
        let temp_file = NamedTempFile::new()?;
        std::fs::write(
            temp_file.path(),
            "[api]\nbase_url = \"http://10.0.0.5:9000\"\n\n[reconcile]\ntop_k = 5\n",
        )?;
        let config = Config::load(Some(temp_file.path()))?;
        assert_eq!(config.api.base_url, "http://10.0.0.5:9000");
        assert_eq!(config.api.model, "default");
        assert_eq!(config.reconcile.top_k, 5);
        assert_eq!(config.reconcile.candidate_pool, 100);
        assert_eq!(config.api.endpoints.status, "/jobs/{job}");
        Ok(())
    }

    #[test]
    fn test_example_toml_generation() -> Result<()> {
        let example = Config::example_toml()?;
        assert!(example.contains("[api]"));
        assert!(example.contains("[reconcile]"));
        assert!(example.contains("[render]"));
        assert!(example.contains("[geo]"));
        Ok(())
    }

    #[test]
    fn test_dashboard_options_overrides() {
        let config = Config::default();
        let options = config.dashboard_options(Some(1200), None);
        assert_eq!(options.canvas, Canvas::new(1200.0, 600.0));
        assert_eq!(options.time_range, (1950, 2025));
        assert_eq!(options.speed, Duration::from_millis(1000));
    }
}
