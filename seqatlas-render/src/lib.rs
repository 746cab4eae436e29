/*!
# SeqAtlas Rendering

Coordinated views over a reconciled similarity search, rendered to SVG.

## Views

1. **Scatter**: the user's sequence among its matched neighbours in embedding space
2. **Country Map**: one marker per country, sized by count and colored by average similarity
3. **Geo Map**: individual sample locations with jitter, year emphasis and time-lapse

Every view implements [`View`]: `update` joins new data onto keyed marks
(enter / update / exit), `highlight` toggles one point, `destroy` drops all
state. Views never throw on bad input; they fall back to a shared empty
state instead.
*/

use serde::{Deserialize, Serialize};
use svg::Document;
use thiserror::Error;

pub mod scale;
pub mod projection;
pub mod zoom;
pub mod scene;
pub mod scatter;
pub mod country_map;
pub mod geo_map;
pub mod highlight;
pub mod timelapse;
pub mod dashboard;
pub mod export;

pub use scene::{EmptyReason, JoinSummary, UpdateOutcome};
pub use scatter::ScatterView;
pub use country_map::CountryMapView;
pub use geo_map::{GeoMapOptions, GeoMapView};
pub use highlight::HighlightCoordinator;
pub use timelapse::{TimeFrame, TimeLapseController, TimeLapseError, TimeLapseTarget};
pub use zoom::ZoomState;
pub use dashboard::Dashboard;
pub use export::{ExportConfig, VectorExporter};

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("{0:?} view has been destroyed")]
    Destroyed(ViewKind),
}

/// Drawing surface in pixels. A zero dimension stands for a missing container.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Canvas {
    pub width: f64,
    pub height: f64,
}

impl Canvas {
    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }

    pub fn is_renderable(&self) -> bool {
        self.width > 0.0 && self.height > 0.0 && self.width.is_finite() && self.height.is_finite()
    }
}

impl Default for Canvas {
    fn default() -> Self {
        Self::new(960.0, 600.0)
    }
}

/// Colors and fonts shared by all views
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderStyle {
    pub background_color: String,
    pub user_color: String,
    pub top_color: String,
    pub remainder_color: String,
    pub faded_color: String,
    pub link_color: String,
    pub land_color: String,
    pub graticule_color: String,
    /// Sequential scale endpoints for average similarity
    pub low_similarity_color: String,
    pub high_similarity_color: String,
    pub font_family: String,
    pub font_size: u32,
    pub legend: bool,
}

impl Default for RenderStyle {
    fn default() -> Self {
        Self {
            background_color: "#ffffff".to_string(),
            user_color: "#e53935".to_string(),
            top_color: "#2a6fef".to_string(),
            remainder_color: "#9e9e9e".to_string(),
            faded_color: "#c8c8c8".to_string(),
            link_color: "#888888".to_string(),
            land_color: "#eef2f5".to_string(),
            graticule_color: "#d5dde3".to_string(),
            low_similarity_color: "#ffffb2".to_string(),
            high_similarity_color: "#bd0026".to_string(),
            font_family: "Arial, sans-serif".to_string(),
            font_size: 12,
            legend: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ViewKind {
    Scatter,
    CountryMap,
    GeoMap,
}

impl ViewKind {
    pub fn file_stem(self) -> &'static str {
        match self {
            ViewKind::Scatter => "scatter",
            ViewKind::CountryMap => "country_map",
            ViewKind::GeoMap => "geo_map",
        }
    }
}

/// Something that can emphasize one point by id
pub trait Highlight: Send {
    /// Returns true when a mark with `id` exists
    fn highlight(&mut self, id: &str, on: bool) -> bool;
}

/// Uniform contract for every view
pub trait View: Highlight {
    type Data: ?Sized;

    fn kind(&self) -> ViewKind;

    /// Replace the view's data and redraw
    fn update(&mut self, data: &Self::Data) -> UpdateOutcome;

    /// Drop all marks and callbacks; later `document` calls fail
    fn destroy(&mut self);

    /// Current rendering
    fn document(&self) -> Result<Document, RenderError>;

    /// Plain-text tooltip for the mark with `id`
    fn tooltip(&self, id: &str) -> Option<String>;

    /// Dispatch the click callback for `id`; false when nothing was clicked
    fn click(&self, id: &str) -> bool;
}

/// Callback receiving the full data behind a clicked mark
pub type ClickHandler<T> = Box<dyn Fn(&T) + Send>;

pub(crate) fn percent(similarity: f64) -> String {
    format!("{:.1}%", similarity * 100.0)
}

/// Tooltip lines shared by the point views
pub(crate) fn metadata_lines(meta: &seqatlas_core::SequenceMetadata) -> Vec<String> {
    let or_na = |v: Option<&str>| v.unwrap_or("n/a").to_string();
    vec![
        format!("Country: {}", or_na(meta.country_name())),
        format!(
            "Year: {}",
            meta.year().map(|y| y.to_string()).unwrap_or_else(|| "n/a".to_string())
        ),
        format!("Host: {}", or_na(meta.host.as_deref())),
        format!("Isolation source: {}", or_na(meta.isolation_source.as_deref())),
    ]
}

/// Root document sized to the canvas, with a background
pub(crate) fn base_document(canvas: Canvas, style: &RenderStyle) -> Document {
    let width = canvas.width.max(1.0);
    let height = canvas.height.max(1.0);
    Document::new()
        .set("viewBox", (0, 0, width, height))
        .set("width", width)
        .set("height", height)
        .add(
            svg::node::element::Rectangle::new()
                .set("width", width)
                .set("height", height)
                .set("fill", style.background_color.as_str()),
        )
}
