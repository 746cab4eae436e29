/*!
# Vector Export

Writes view documents to SVG files with an optional title and provenance
comment. Output is byte-for-byte deterministic for identical input.
*/

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use seqatlas_core::ReferenceSource;
use svg::node::element::Text;
use svg::node::Comment;
use svg::Document;

use crate::dashboard::Dashboard;
use crate::{View, ViewKind};

/// Export configuration
#[derive(Debug, Clone)]
pub struct ExportConfig {
    pub title: Option<String>,
    pub provenance_comment: Option<String>,
    pub font_family: String,
    pub font_size: u32,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            title: None,
            provenance_comment: None,
            font_family: "Arial, sans-serif".to_string(),
            font_size: 12,
        }
    }
}

/// Vector export system
pub struct VectorExporter {
    config: ExportConfig,
}

impl VectorExporter {
    pub fn new(config: ExportConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ExportConfig {
        &self.config
    }

    /// Final SVG text for a view document
    pub fn render(&self, doc: Document) -> String {
        let mut doc = doc;
        if let Some(comment) = &self.config.provenance_comment {
            doc = doc.add(Comment::new(comment.replace("--", "- -")));
        }
        if let Some(title) = &self.config.title {
            doc = doc.add(
                Text::new(title.as_str())
                    .set("x", "50%")
                    .set("y", self.config.font_size as f64 + 6.0)
                    .set("text-anchor", "middle")
                    .set("font-family", self.config.font_family.as_str())
                    .set("font-size", self.config.font_size + 4)
                    .set("font-weight", "bold"),
            );
        }
        doc.to_string()
    }

    /// Export to SVG format
    pub fn export_svg<P: AsRef<Path>>(&self, path: P, doc: Document) -> Result<()> {
        let path = path.as_ref();
        fs::write(path, self.render(doc))
            .with_context(|| format!("Failed to write SVG: {}", path.display()))?;
        log::info!("Wrote {}", path.display());
        Ok(())
    }

    pub fn export_view<V: View, P: AsRef<Path>>(&self, path: P, view: &V) -> Result<()> {
        let doc = view
            .document()
            .with_context(|| format!("Cannot export {:?} view", view.kind()))?;
        self.export_svg(path, doc)
    }

    /// Write `scatter.svg`, `country_map.svg` and `geo_map.svg` into `dir`
    pub fn export_dashboard<S: ReferenceSource>(&self, dir: &Path, dashboard: &Dashboard<S>) -> Result<Vec<PathBuf>> {
        fs::create_dir_all(dir).with_context(|| format!("Failed to create output directory: {}", dir.display()))?;
        let mut written = Vec::new();
        for kind in [ViewKind::Scatter, ViewKind::CountryMap, ViewKind::GeoMap] {
            let path = dir.join(format!("{}.svg", kind.file_stem()));
            let doc = dashboard
                .document(kind)
                .with_context(|| format!("Cannot export {:?} view", kind))?;
            self.export_svg(&path, doc)?;
            written.push(path);
        }
        Ok(written)
    }
}
