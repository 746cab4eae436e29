//! Timelapse command implementation - export one geo map frame per collection year

use anyhow::{anyhow, Context, Result};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use seqatlas_core::{FileReferenceSource, ReferenceCache, ReferenceSource};
use seqatlas_core::io::read_similar_results;
use seqatlas_render::{Dashboard, VectorExporter, ViewKind};

use super::render::OfflineInputs;
use super::{build_dashboard, build_exporter, log_summary};
use crate::config::Config;

#[allow(clippy::too_many_arguments)]
pub async fn execute(
    config: &Config,
    inputs: OfflineInputs,
    out: PathBuf,
    from: Option<i32>,
    to: Option<i32>,
    min_similarity: Option<f64>,
    width: Option<u32>,
    height: Option<u32>,
) -> Result<()> {
    log::info!("Exporting time-lapse frames to {}", out.display());
    inputs.validate()?;

    let user = inputs.user()?;
    let ranked = read_similar_results(&inputs.similar)?;
    let cache = Arc::new(ReferenceCache::new(FileReferenceSource::new(&inputs.reference)));
    let mut dashboard = build_dashboard(config, cache, width, height)?;
    let result = dashboard
        .show(&user, &ranked)
        .await
        .context("Failed to load reference coordinates")?;
    log_summary(result);

    let (span_min, span_max) = result
        .year_span()
        .ok_or_else(|| anyhow!("No matched sequence carries a collection year"))?;
    let (first, last) = (from.unwrap_or(span_min), to.unwrap_or(span_max));
    if first > last {
        return Err(anyhow!("Empty year range: {} > {}", first, last));
    }
    dashboard
        .timelapse()
        .set_time_range(first, last)
        .context("Invalid year range")?;
    if let Some(pct) = min_similarity {
        dashboard
            .timelapse()
            .set_similarity(pct)
            .context("Invalid similarity threshold")?;
    }

    let exporter = build_exporter(config, None, None);
    let written = write_frames(&exporter, &dashboard, &out, first, last)?;
    log::info!("Wrote {} frames", written.len());
    Ok(())
}

/// Step the year filter from `first` to `last`, writing `geo_map_<year>.svg` each time
pub fn write_frames<S: ReferenceSource>(
    exporter: &VectorExporter,
    dashboard: &Dashboard<S>,
    out: &Path,
    first: i32,
    last: i32,
) -> Result<Vec<PathBuf>> {
    std::fs::create_dir_all(out)
        .with_context(|| format!("Failed to create output directory: {}", out.display()))?;
    let mut written = Vec::new();
    for year in first..=last {
        dashboard.timelapse().set_year(year)?;
        let doc = dashboard.document(ViewKind::GeoMap)?;
        let path = out.join(format!("geo_map_{}.svg", year));
        exporter.export_svg(&path, doc)?;
        written.push(path);
    }
    dashboard.timelapse().reset_time();
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::ProjectionInput;
    use std::io::Write;

    #[tokio::test]
    async fn one_frame_per_year() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let reference = dir.path().join("ref.ndjson");
        let mut f = std::fs::File::create(&reference)?;
        writeln!(f, r#"{{"id": "a", "accession": "EPI_1", "coordinates": [0, 0]}}"#)?;
        writeln!(f, r#"{{"id": "b", "accession": "EPI_2", "coordinates": [1, 1]}}"#)?;
        let similar = dir.path().join("similar.json");
        std::fs::write(
            &similar,
            r#"[{"accession": "EPI_1", "similarity": 0.9, "metadata": {"first_year": "2016", "lat_lon": "10 N 20 E"}},
                {"accession": "EPI_2", "similarity": 0.8, "metadata": {"years": [2019, 2018], "lat_lon": "11.5,21"}}]"#,
        )?;
        let inputs = OfflineInputs {
            reference,
            similar,
            projection: ProjectionInput::Inline(0.0, 0.0),
            job_id: "tl".into(),
            label: None,
        };
        let out = dir.path().join("frames");

        execute(&Config::default(), inputs, out.clone(), None, None, Some(10.0), None, None).await?;

        // the listed 2019 extends the range past the earliest years
        for year in 2016..=2019 {
            let frame = std::fs::read_to_string(out.join(format!("geo_map_{}.svg", year)))?;
            assert!(frame.contains(&format!("Year: {}", year)));
        }
        assert!(!out.join("geo_map_2020.svg").exists());
        Ok(())
    }
}
