//! Render command implementation - reconcile saved results offline and export every view

use anyhow::{anyhow, Context, Result};
use std::path::PathBuf;
use std::sync::Arc;

use seqatlas_core::io::read_similar_results;
use seqatlas_core::types::UserSequencePoint;
use seqatlas_core::{FileReferenceSource, ReferenceCache};

use super::{build_dashboard, build_exporter, build_provenance_comment, log_summary, write_outputs, ProjectionInput};
use crate::config::Config;

/// Arguments shared by `render` and `timelapse`
#[derive(Debug, Clone)]
pub struct OfflineInputs {
    pub reference: PathBuf,
    pub similar: PathBuf,
    pub projection: ProjectionInput,
    pub job_id: String,
    pub label: Option<String>,
}

impl OfflineInputs {
    pub fn validate(&self) -> Result<()> {
        for (what, path) in [("Reference file", &self.reference), ("Similarity results", &self.similar)] {
            if !path.exists() {
                return Err(anyhow!("{} does not exist: {}", what, path.display()));
            }
        }
        Ok(())
    }

    pub fn user(&self) -> Result<UserSequencePoint> {
        let projection = self.projection.load()?;
        let label = self.label.clone().unwrap_or_else(|| self.job_id.clone());
        Ok(UserSequencePoint::from_projection(&self.job_id, projection, label))
    }
}

#[allow(clippy::too_many_arguments)]
pub async fn execute(
    config: &Config,
    inputs: OfflineInputs,
    out: PathBuf,
    title: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
    year: Option<i32>,
    min_similarity: Option<f64>,
) -> Result<()> {
    log::info!("Starting offline render");
    log::info!("Reference: {}", inputs.reference.display());
    log::info!("Similarity results: {}", inputs.similar.display());
    log::info!("Output directory: {}", out.display());
    inputs.validate()?;

    let user = inputs.user()?;
    let ranked = read_similar_results(&inputs.similar)?;
    log::info!("Loaded {} ranked results", ranked.len());

    let cache = Arc::new(ReferenceCache::new(FileReferenceSource::new(&inputs.reference)));
    let mut dashboard = build_dashboard(config, cache, width, height)?;
    let result = dashboard
        .show(&user, &ranked)
        .await
        .context("Failed to load reference coordinates")?;
    log_summary(result);

    let provenance = config
        .render
        .provenance
        .then(|| build_provenance_comment(&inputs.reference.display().to_string(), &inputs.job_id, result));

    if let Some(year) = year {
        dashboard
            .timelapse()
            .set_year(year)
            .with_context(|| format!("Cannot filter the geo map to {}", year))?;
    }
    if let Some(pct) = min_similarity {
        dashboard
            .timelapse()
            .set_similarity(pct)
            .context("Invalid similarity threshold")?;
    }

    let exporter = build_exporter(config, title, provenance);
    let written = write_outputs(&exporter, &dashboard, &out)?;

    log::info!("Render completed successfully");
    for path in &written {
        println!("{}", path.display());
    }
    Ok(())
}
