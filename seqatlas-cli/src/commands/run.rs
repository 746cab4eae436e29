//! Run command implementation - submit a sequence, wait for the job and render its neighbourhood

use anyhow::{anyhow, Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use seqatlas_core::api::JobStatusReport;
use seqatlas_core::types::{SimilarSequenceResult, UserSequencePoint};
use seqatlas_core::{ApiClient, FileReferenceSource, HttpReferenceSource, ReferenceCache, ReferenceSource};

use super::{build_dashboard, build_exporter, build_provenance_comment, log_summary, write_outputs};
use crate::config::Config;

#[allow(clippy::too_many_arguments)]
pub async fn execute(
    config: &Config,
    fasta: PathBuf,
    out: PathBuf,
    model: Option<String>,
    reference: Option<PathBuf>,
    title: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
) -> Result<()> {
    log::info!("Submitting {} to {}", fasta.display(), config.api.base_url);

    let sequence = read_fasta(&fasta)?;
    let client = ApiClient::new(&config.api.base_url, config.api.endpoints.clone(), config.api.timeout())
        .context("Failed to build HTTP client")?;
    let model = model.unwrap_or_else(|| config.api.model.clone());

    let job_id = client
        .submit_sequence(&sequence, &model)
        .await
        .context("Failed to submit sequence")?;
    log::info!("Job {} submitted (model {})", job_id, model);

    let spinner = spinner()?;
    spinner.set_message(format!("job {} queued", job_id));
    let waited = config
        .api
        .poller()
        .wait(&client, &job_id, |report| spinner.set_message(status_line(&job_id, report)))
        .await;
    spinner.finish_and_clear();
    waited.with_context(|| format!("Job {} did not complete", job_id))?;

    let projection = client
        .projection(&job_id)
        .await
        .context("Failed to fetch the sequence projection")?;
    let ranked = client
        .similar(&job_id, config.reconcile.candidate_pool)
        .await
        .context("Failed to fetch similar sequences")?;
    log::info!("Fetched {} ranked results", ranked.len());

    let label = fasta
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| job_id.clone());
    let user = UserSequencePoint::from_projection(&job_id, projection, label);

    let params = RenderParams {
        out: &out,
        title,
        width,
        height,
    };
    match reference {
        Some(path) => {
            let source = FileReferenceSource::new(path);
            render(config, source, &user, &ranked, params).await
        }
        None => render(config, HttpReferenceSource::new(client), &user, &ranked, params).await,
    }
}

struct RenderParams<'a> {
    out: &'a Path,
    title: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
}

async fn render<S: ReferenceSource>(
    config: &Config,
    source: S,
    user: &UserSequencePoint,
    ranked: &[SimilarSequenceResult],
    params: RenderParams<'_>,
) -> Result<()> {
    let described = source.describe();
    let cache = Arc::new(ReferenceCache::new(source));
    let mut dashboard = build_dashboard(config, cache, params.width, params.height)?;
    let result = dashboard
        .show(user, ranked)
        .await
        .with_context(|| format!("Failed to load reference coordinates from {}", described))?;
    log_summary(result);
    if result.is_empty() {
        log::warn!("None of the similar sequences appear in the reference set");
    }

    let provenance = config
        .render
        .provenance
        .then(|| build_provenance_comment(&described, &user.id, result));
    let exporter = build_exporter(config, params.title, provenance);
    for path in write_outputs(&exporter, &dashboard, params.out)? {
        println!("{}", path.display());
    }
    Ok(())
}

fn spinner() -> Result<ProgressBar> {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} [{elapsed_precise}] {msg}")
            .context("Invalid progress template")?,
    );
    pb.enable_steady_tick(Duration::from_millis(100));
    Ok(pb)
}

fn status_line(job_id: &str, report: &JobStatusReport) -> String {
    let status = format!("{:?}", report.status).to_lowercase();
    let mut line = format!("job {} {}", job_id, status);
    if let Some(p) = report.progress {
        line.push_str(&format!(" {:.0}%", p * 100.0));
    }
    if let Some(msg) = &report.message {
        line.push_str(&format!(" - {}", msg));
    }
    line
}

/// Read a FASTA file and return it as submitted: header plus sequence lines
fn read_fasta(path: &Path) -> Result<String> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read FASTA file: {}", path.display()))?;
    let trimmed = text.trim();
    if !trimmed.starts_with('>') {
        return Err(anyhow!("{} is not FASTA: missing '>' header", path.display()));
    }
    let records = trimmed.lines().filter(|l| l.starts_with('>')).count();
    if records > 1 {
        log::warn!("{} holds {} records; the service embeds the whole file", path.display(), records);
    }
    let residues: usize = trimmed
        .lines()
        .filter(|l| !l.starts_with('>'))
        .map(|l| l.trim().len())
        .sum();
    if residues == 0 {
        return Err(anyhow!("{} contains no sequence data", path.display()));
    }
    Ok(trimmed.to_string())
}
