use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

use seqatlas_core::io::parse_similar_results;
use seqatlas_core::types::{UserProjection, UserSequencePoint};
use seqatlas_core::{FileReferenceSource, Reconciler, ReferenceCache, SimilarSequenceResult};
use seqatlas_render::dashboard::DashboardOptions;
use seqatlas_render::{Dashboard, ExportConfig, RenderError, VectorExporter, ViewKind};
use tempfile::NamedTempFile;

fn reference() -> NamedTempFile {
    let mut f = NamedTempFile::new().unwrap();
    for line in [
        r#"{"id": "r1", "accession": "KX000001", "coordinates": [0.5, 1.5]}"#,
        r#"{"id": "r2", "accession": "KX000002", "coordinates": [1.0, 2.0]}"#,
        r#"{"id": "r3", "accession": "PE000003", "coordinates": [-2.0, 0.0]}"#,
    ] {
        writeln!(f, "{}", line).unwrap();
    }
    f
}

fn hits() -> Vec<SimilarSequenceResult> {
    parse_similar_results(
        r#"[
            {"accession": "KX000001", "similarity": 0.97,
             "metadata": {"country": "Kenya", "first_year": 2015, "lat_lon": ["-1.29,36.82"]}},
            {"accession": "KX000002", "similarity": 0.91,
             "metadata": {"country": "Kenya", "first_year": 2018, "lat_lon": ["-0.1,34.75"]}},
            {"accession": "PE000003", "similarity": 0.85,
             "metadata": {"country": "Peru", "first_year": 2020, "lat_lon": ["-12.05,-77.04"]}},
            {"accession": "ZZ999999", "similarity": 0.80}
        ]"#,
    )
    .unwrap()
}

fn user() -> UserSequencePoint {
    UserSequencePoint::from_projection("job-7", UserProjection { x: 0.0, y: 0.0 }, "query.fa")
}

fn dashboard(path: &std::path::Path) -> Dashboard<FileReferenceSource> {
    let cache = Arc::new(ReferenceCache::new(FileReferenceSource::new(path)));
    Dashboard::new(cache, Reconciler::default(), DashboardOptions::default()).unwrap()
}

#[tokio::test]
async fn show_populates_every_view() {
    let reference = reference();
    let mut dash = dashboard(reference.path());

    let result = dash.show(&user(), &hits()).await.unwrap();
    assert_eq!(result.matched_count(), 3);
    assert_eq!(result.unmatched.len(), 1);

    assert_eq!(dash.scatter().lock().marks().len(), 4);
    assert_eq!(dash.country_map().lock().marks().len(), 2);
    assert_eq!(dash.geo_map().lock().marks().len(), 3);
    assert_eq!(dash.timelapse().time_range(), (2015, 2020));
    assert_eq!(dash.timelapse().current_year(), None);
}

#[tokio::test]
async fn hovering_a_scatter_point_highlights_its_counterparts() {
    let reference = reference();
    let mut dash = dashboard(reference.path());
    dash.show(&user(), &hits()).await.unwrap();

    let peers = dash.pointer_enter(ViewKind::Scatter, "KX000001");
    assert_eq!(peers, 2);
    assert!(dash.scatter().lock().marks().get("KX000001").unwrap().highlighted);
    assert!(dash.geo_map().lock().marks().get("KX000001").unwrap().highlighted);

    dash.pointer_leave(ViewKind::Scatter, "KX000001");
    assert!(!dash.geo_map().lock().marks().get("KX000001").unwrap().highlighted);

    let tip = dash.tooltip(ViewKind::GeoMap, "PE000003").unwrap();
    assert!(tip.contains("Peru"));
}

#[tokio::test]
async fn hovering_a_country_highlights_its_points_elsewhere() {
    let reference = reference();
    let mut dash = dashboard(reference.path());
    dash.show(&user(), &hits()).await.unwrap();

    // two Kenyan points, each lit in the scatter and the geo map
    let peers = dash.pointer_enter(ViewKind::CountryMap, "Kenya");
    assert_eq!(peers, 4);
    assert!(dash.country_map().lock().marks().get("Kenya").unwrap().highlighted);
    for id in ["KX000001", "KX000002"] {
        assert!(dash.scatter().lock().marks().get(id).unwrap().highlighted);
        assert!(dash.geo_map().lock().marks().get(id).unwrap().highlighted);
    }
    assert!(!dash.scatter().lock().marks().get("PE000003").unwrap().highlighted);
    assert!(!dash.geo_map().lock().marks().get("PE000003").unwrap().highlighted);

    dash.pointer_leave(ViewKind::CountryMap, "Kenya");
    for id in ["KX000001", "KX000002"] {
        assert!(!dash.scatter().lock().marks().get(id).unwrap().highlighted);
        assert!(!dash.geo_map().lock().marks().get(id).unwrap().highlighted);
    }
    assert!(!dash.country_map().lock().marks().get("Kenya").unwrap().highlighted);
}

#[tokio::test]
async fn time_range_reaches_the_latest_listed_year() {
    let reference = reference();
    let mut dash = dashboard(reference.path());
    let ranked = parse_similar_results(
        r#"[
            {"accession": "KX000001", "similarity": 0.97,
             "metadata": {"country": "Kenya", "years": [2012, 2021], "lat_lon": ["-1.29,36.82"]}},
            {"accession": "PE000003", "similarity": 0.85,
             "metadata": {"country": "Peru", "first_year": 2016, "lat_lon": ["-12.05,-77.04"]}}
        ]"#,
    )
    .unwrap();
    dash.show(&user(), &ranked).await.unwrap();

    assert_eq!(dash.timelapse().time_range(), (2012, 2021));
    dash.timelapse().set_year(2021).unwrap();
    assert_eq!(dash.geo_map().lock().frame().year, Some(2021));
}

#[tokio::test]
async fn export_writes_three_files_and_destroy_stops_rendering() {
    let reference = reference();
    let mut dash = dashboard(reference.path());
    dash.show(&user(), &hits()).await.unwrap();

    let out = tempfile::tempdir().unwrap();
    let exporter = VectorExporter::new(ExportConfig::default());
    let written = exporter.export_dashboard(out.path(), &dash).unwrap();
    assert_eq!(written.len(), 3);
    for path in &written {
        let text = std::fs::read_to_string(path).unwrap();
        assert!(text.starts_with("<svg"));
    }

    dash.destroy();
    assert!(dash.result().is_none());
    assert!(dash.coordinator().registered().is_empty());
    assert!(matches!(
        dash.document(ViewKind::CountryMap),
        Err(RenderError::Destroyed(ViewKind::CountryMap))
    ));
    assert!(exporter.export_dashboard(out.path(), &dash).is_err());
}

#[tokio::test]
async fn missing_reference_file_is_reported() {
    let mut dash = dashboard(std::path::Path::new("/nonexistent/reference.ndjson"));
    assert!(dash.show(&user(), &hits()).await.is_err());
    assert!(dash.result().is_none());
}

#[tokio::test(start_paused = true)]
async fn time_lapse_steps_through_result_years() {
    let reference = reference();
    let mut dash = dashboard(reference.path());
    dash.show(&user(), &hits()).await.unwrap();

    dash.timelapse().play().unwrap();
    assert_eq!(dash.geo_map().lock().frame().year, Some(2015));

    tokio::time::sleep(Duration::from_millis(3500)).await;
    assert_eq!(dash.timelapse().current_year(), Some(2018));
    assert_eq!(dash.geo_map().lock().frame().year, Some(2018));

    // a new result resets the year filter
    dash.show(&user(), &hits()).await.unwrap();
    assert!(!dash.timelapse().is_playing());
    assert_eq!(dash.geo_map().lock().frame().year, None);
}
