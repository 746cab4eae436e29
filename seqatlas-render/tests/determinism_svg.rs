use seqatlas_core::types::{ReconciledPoint, SequenceMetadata};
use seqatlas_render::{Canvas, ExportConfig, RenderStyle, ScatterView, VectorExporter, View};

fn demo_points() -> Vec<ReconciledPoint> {
    (0..12)
        .map(|i| ReconciledPoint {
            id: format!("p{i}"),
            accession: format!("ACC{i:03}"),
            rank: i,
            x: (i as f64 * 0.7).sin() * 4.0,
            y: (i as f64 * 1.3).cos() * 3.0,
            similarity: 1.0 - i as f64 * 0.02,
            is_top10: (1..=10).contains(&i),
            is_user_sequence: i == 0,
            metadata: SequenceMetadata {
                country: Some(if i % 2 == 0 { "Kenya" } else { "Peru" }.into()),
                first_year: Some(2000 + i as i32),
                ..Default::default()
            },
        })
        .collect()
}

#[test]
fn svg_export_is_deterministic() {
    let exporter = VectorExporter::new(ExportConfig {
        title: Some("Determinism Test".into()),
        provenance_comment: Some("seqatlas determinism".into()),
        ..Default::default()
    });

    let dir = tempfile::tempdir().unwrap();
    let f1 = dir.path().join("a.svg");
    let f2 = dir.path().join("b.svg");

    for path in [&f1, &f2] {
        let mut view = ScatterView::new(Canvas::new(800.0, 600.0), RenderStyle::default());
        view.update(&demo_points());
        exporter.export_view(path, &view).unwrap();
    }

    let b1 = std::fs::read(&f1).unwrap();
    let b2 = std::fs::read(&f2).unwrap();
    assert_eq!(b1, b2, "SVG bytes differ between identical renders");
}
