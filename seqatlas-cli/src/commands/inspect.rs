//! Inspect command implementation - load the reference cache and report what it holds

use anyhow::{Context, Result};
use std::path::PathBuf;

use seqatlas_core::{ApiClient, FileReferenceSource, HttpReferenceSource, ReferenceCache, ReferenceSource};

use crate::config::Config;

pub async fn execute(config: &Config, reference: Option<PathBuf>, sample: usize) -> Result<()> {
    let report = match reference {
        Some(path) => inspect(FileReferenceSource::new(path), sample).await?,
        None => {
            let client = ApiClient::new(&config.api.base_url, config.api.endpoints.clone(), config.api.timeout())
                .context("Failed to build HTTP client")?;
            inspect(HttpReferenceSource::new(client), sample).await?
        }
    };
    println!("{}", report);
    Ok(())
}

/// Pretty JSON describing the loaded reference set
pub async fn inspect<S: ReferenceSource>(source: S, sample: usize) -> Result<String> {
    let described = source.describe();
    log::info!("Loading reference coordinates from {}", described);
    let cache = ReferenceCache::new(source);
    cache
        .ensure_loaded()
        .await
        .with_context(|| format!("Failed to load reference coordinates from {}", described))?;
    let inspection = cache
        .inspect(sample)
        .context("Reference cache is empty after loading")?;
    serde_json::to_string_pretty(&inspection).context("Failed to serialize cache inspection")
}
