//! Command implementations for the SeqAtlas CLI

pub mod render;
pub mod run;
pub mod inspect;
pub mod timelapse;

use anyhow::{anyhow, Context, Result};
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use seqatlas_core::api::parse_projection;
use seqatlas_core::types::{UnmatchedSequence, UserProjection};
use seqatlas_core::{ReferenceCache, ReferenceSource, Reconciliation};
use seqatlas_render::{Dashboard, ExportConfig, VectorExporter};

use crate::config::Config;

/// Where the user's own point comes from when no job is running
#[derive(Debug, Clone)]
pub enum ProjectionInput {
    File(PathBuf),
    Inline(f64, f64),
}

impl ProjectionInput {
    pub fn from_args(file: Option<PathBuf>, x: Option<f64>, y: Option<f64>) -> Result<Self> {
        match (file, x, y) {
            (Some(path), None, None) => Ok(Self::File(path)),
            (None, Some(x), Some(y)) => Ok(Self::Inline(x, y)),
            (None, None, None) => Err(anyhow!("Provide --projection or both --x and --y")),
            _ => Err(anyhow!("--projection cannot be combined with --x/--y, and --x needs --y")),
        }
    }

    pub fn load(&self) -> Result<UserProjection> {
        match self {
            Self::File(path) => {
                let text = std::fs::read_to_string(path)
                    .with_context(|| format!("Failed to read projection file: {}", path.display()))?;
                parse_projection(&text)
                    .map_err(|e| anyhow!("Invalid projection in {}: {}", path.display(), e))
            }
            Self::Inline(x, y) => Ok(UserProjection { x: *x, y: *y }),
        }
    }
}

pub fn build_dashboard<S: ReferenceSource>(
    config: &Config,
    cache: Arc<ReferenceCache<S>>,
    width: Option<u32>,
    height: Option<u32>,
) -> Result<Dashboard<S>> {
    Dashboard::new(cache, config.reconciler(), config.dashboard_options(width, height))
        .context("Invalid time-lapse settings")
}

pub fn build_exporter(config: &Config, title: Option<String>, provenance: Option<String>) -> VectorExporter {
    VectorExporter::new(ExportConfig {
        title: title.or_else(|| config.render.title.clone()),
        provenance_comment: provenance,
        font_family: config.render.style.font_family.clone(),
        font_size: config.render.style.font_size,
    })
}

/// Tab-separated detail list of hits that were not plotted
pub fn write_unmatched(path: &Path, unmatched: &[UnmatchedSequence]) -> Result<()> {
    let mut out = String::from("rank\taccession\tsimilarity\tcountry\n");
    for u in unmatched {
        // writing into a String cannot fail
        let _ = writeln!(
            out,
            "{}\t{}\t{:.4}\t{}",
            u.rank,
            u.accession,
            u.similarity,
            u.metadata.country_name().unwrap_or("")
        );
    }
    std::fs::write(path, out)
        .with_context(|| format!("Failed to write detail list: {}", path.display()))?;
    Ok(())
}

/// Provenance text embedded in exported SVGs when enabled
pub fn build_provenance_comment(source: &str, job_id: &str, result: &Reconciliation) -> String {
    let version = env!("CARGO_PKG_VERSION");
    format!(
        "SeqAtlas provenance\n \
         tool: seqatlas v{version}\n \
         job: {job_id}\n \
         reference: {source}\n \
         matched: {matched}, unmatched: {unmatched}, countries: {countries}\n \
         generated: {when}\n",
        matched = result.matched_count(),
        unmatched = result.unmatched.len(),
        countries = result.country_map_subset.len(),
        when = chrono::Utc::now().to_rfc3339(),
    )
}

/// Export every view plus `unmatched.tsv` (and `duplicates.tsv` when any) into `out_dir`
pub fn write_outputs<S: ReferenceSource>(
    exporter: &VectorExporter,
    dashboard: &Dashboard<S>,
    out_dir: &Path,
) -> Result<Vec<PathBuf>> {
    let mut written = exporter.export_dashboard(out_dir, dashboard)?;
    if let Some(result) = dashboard.result() {
        let path = out_dir.join("unmatched.tsv");
        write_unmatched(&path, &result.unmatched)?;
        written.push(path);
        if !result.duplicates.is_empty() {
            let path = out_dir.join("duplicates.tsv");
            write_unmatched(&path, &result.duplicates)?;
            written.push(path);
        }
    }
    Ok(written)
}

pub fn log_summary(result: &Reconciliation) {
    log::info!(
        "Matched {} sequences across {} countries; {} could not be placed",
        result.matched_count(),
        result.country_map_subset.len(),
        result.unmatched.len()
    );
    if !result.duplicates.is_empty() {
        log::warn!("{} repeated hits were dropped", result.duplicates.len());
    }
    if let Some((min, max)) = result.year_span() {
        log::info!("Collection years {}-{}", min, max);
    }
}
