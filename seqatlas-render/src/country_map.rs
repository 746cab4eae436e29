//! Country-aggregated world map
//!
//! One marker per standardized country: radius on a square-root scale of the
//! sequence count, fill on a sequential scale of average similarity.

use seqatlas_core::{CountryAggregate, CountryTable, LatLon, PointId};
use svg::node::element::{Circle, Group, Rectangle, Text, Title};
use svg::Document;

use crate::projection::Equirectangular;
use crate::scale::{SequentialColor, SqrtScale};
use crate::scene::{empty_state, EmptyReason, Keyed, Layer, UpdateOutcome};
use crate::{base_document, percent, Canvas, ClickHandler, Highlight, RenderError, RenderStyle, View, ViewKind};

pub const MAX_MARKER_RADIUS: f64 = 28.0;
pub const MIN_MARKER_RADIUS: f64 = 3.0;
/// Isolation sources listed in a tooltip before "+N more"
const TOOLTIP_SOURCES: usize = 3;

#[derive(Debug, Clone)]
pub struct CountryMark {
    pub aggregate: CountryAggregate,
    pub location: LatLon,
    pub cx: f64,
    pub cy: f64,
    pub r: f64,
    pub fill: String,
    pub highlighted: bool,
}

impl Keyed for CountryMark {
    fn key(&self) -> &str {
        &self.aggregate.country
    }

    fn inherit(&mut self, previous: &Self) {
        self.highlighted = previous.highlighted;
    }
}

pub struct CountryMapView {
    canvas: Canvas,
    style: RenderStyle,
    countries: CountryTable,
    layer: Layer<CountryMark>,
    data: Vec<CountryAggregate>,
    color: Option<SequentialColor>,
    size: SqrtScale,
    empty: Option<EmptyReason>,
    on_click: Option<ClickHandler<CountryAggregate>>,
    destroyed: bool,
}

impl CountryMapView {
    pub fn new(canvas: Canvas, style: RenderStyle) -> Self {
        Self::with_countries(canvas, style, CountryTable::builtin())
    }

    pub fn with_countries(canvas: Canvas, style: RenderStyle, countries: CountryTable) -> Self {
        Self {
            canvas,
            style,
            countries,
            layer: Layer::new(),
            data: Vec::new(),
            color: None,
            size: SqrtScale::new(1.0, MAX_MARKER_RADIUS),
            empty: Some(EmptyReason::NoPoints),
            on_click: None,
            destroyed: false,
        }
    }

    pub fn on_click(&mut self, handler: impl Fn(&CountryAggregate) + Send + 'static) {
        self.on_click = Some(Box::new(handler));
    }

    pub fn marks(&self) -> &Layer<CountryMark> {
        &self.layer
    }

    /// Point ids grouped under the named country, empty when it has no marker
    pub fn member_ids(&self, country: &str) -> Vec<PointId> {
        let key = country.trim();
        self.layer
            .iter()
            .filter(|mark| mark.aggregate.country.eq_ignore_ascii_case(key))
            .flat_map(|mark| mark.aggregate.member_ids.iter().cloned())
            .collect()
    }

    pub fn resize(&mut self, canvas: Canvas) -> UpdateOutcome {
        self.canvas = canvas;
        let data = std::mem::take(&mut self.data);
        self.update(&data)
    }

    /// Table centroid first, then the group's own first location
    fn locate(&self, aggregate: &CountryAggregate) -> Option<LatLon> {
        self.countries.centroid(&aggregate.country).or(aggregate.lat_lon)
    }

    fn set_empty(&mut self, reason: EmptyReason) -> UpdateOutcome {
        self.layer.clear();
        self.color = None;
        self.empty = Some(reason);
        UpdateOutcome::Empty(reason)
    }

    fn tooltip_for(aggregate: &CountryAggregate) -> String {
        let sources = if aggregate.isolation_sources.is_empty() {
            "n/a".to_string()
        } else {
            let shown = aggregate.isolation_sources[..aggregate.isolation_sources.len().min(TOOLTIP_SOURCES)].join(", ");
            let hidden = aggregate.isolation_sources.len().saturating_sub(TOOLTIP_SOURCES);
            if hidden > 0 {
                format!("{} +{} more", shown, hidden)
            } else {
                shown
            }
        };
        [
            aggregate.country.clone(),
            format!("Sequences: {}", aggregate.count),
            format!("Average similarity: {}", percent(aggregate.avg_similarity)),
            format!("Top 10 matches: {}", aggregate.top10_count),
            format!("Isolation sources: {}", sources),
        ]
        .join("\n")
    }

    fn markers(&self) -> Group {
        let mut group = Group::new().set("class", "countries");
        for mark in self.layer.iter() {
            group = group.add(
                Group::new()
                    .set("class", "country")
                    .set("data-country", mark.aggregate.country.as_str())
                    .add(
                        Circle::new()
                            .set("cx", mark.cx)
                            .set("cy", mark.cy)
                            .set("r", mark.r)
                            .set("fill", mark.fill.as_str())
                            .set("fill-opacity", 0.8)
                            .set("stroke", if mark.highlighted { "#212121" } else { "#ffffff" })
                            .set("stroke-width", if mark.highlighted { 3.0 } else { 1.0 }),
                    )
                    .add(Title::new(Self::tooltip_for(&mark.aggregate))),
            );
        }
        group
    }

    /// Reference counts shown in the size legend, largest first
    fn legend_counts(&self) -> Vec<usize> {
        let max = self.size.max_value.round().max(1.0) as usize;
        let mut counts = vec![max, (max + 1) / 2, 1];
        counts.dedup();
        counts
    }

    fn legend(&self) -> Group {
        let counts = self.legend_counts();
        let font = self.style.font_family.as_str();
        let x = 20.0;
        let base_y = self.canvas.height - 20.0;
        let biggest = self.size.map(counts[0] as f64).max(MIN_MARKER_RADIUS);

        let mut group = Group::new().set("class", "legend").add(
            Rectangle::new()
                .set("x", x - 10.0)
                .set("y", base_y - 2.0 * biggest - 40.0)
                .set("width", 2.0 * biggest + 110.0)
                .set("height", 2.0 * biggest + 50.0)
                .set("fill", "white")
                .set("fill-opacity", 0.85)
                .set("stroke", "black")
                .set("stroke-width", 1),
        );
        group = group.add(
            Text::new("Sequences")
                .set("x", x)
                .set("y", base_y - 2.0 * biggest - 22.0)
                .set("font-family", font)
                .set("font-size", self.style.font_size)
                .set("font-weight", "bold"),
        );
        let cx = x + biggest;
        for count in counts {
            let r = self.size.map(count as f64).max(MIN_MARKER_RADIUS);
            group = group
                .add(
                    Circle::new()
                        .set("cx", cx)
                        .set("cy", base_y - r)
                        .set("r", r)
                        .set("fill", "none")
                        .set("stroke", "#555555"),
                )
                .add(
                    Text::new(count.to_string())
                        .set("x", cx + biggest + 8.0)
                        .set("y", base_y - 2.0 * r)
                        .set("dominant-baseline", "middle")
                        .set("font-family", font)
                        .set("font-size", self.style.font_size.saturating_sub(2).max(8)),
                );
        }

        if let Some(color) = &self.color {
            let lx = self.canvas.width - 150.0;
            let ly = self.canvas.height - 40.0;
            for (i, (value, label)) in [(color.domain.0, "low"), (color.domain.1, "high")].iter().enumerate() {
                let offset = i as f64 * 65.0;
                group = group
                    .add(
                        Rectangle::new()
                            .set("x", lx + offset)
                            .set("y", ly)
                            .set("width", 14)
                            .set("height", 14)
                            .set("fill", color.map(*value)),
                    )
                    .add(
                        Text::new(format!("{} {}", label, percent(*value)))
                            .set("x", lx + offset + 18.0)
                            .set("y", ly + 11.0)
                            .set("font-family", font)
                            .set("font-size", self.style.font_size.saturating_sub(2).max(8)),
                    );
            }
        }
        group
    }
}

impl Highlight for CountryMapView {
    /// `id` may be a country name or the id of any member point
    fn highlight(&mut self, id: &str, on: bool) -> bool {
        let key = id.trim();
        let mut found = false;
        for mark in self.layer.iter_mut() {
            if mark.aggregate.country.eq_ignore_ascii_case(key) || mark.aggregate.member_ids.iter().any(|m| m == id) {
                mark.highlighted = on;
                found = true;
            }
        }
        found
    }
}

impl View for CountryMapView {
    type Data = [CountryAggregate];

    fn kind(&self) -> ViewKind {
        ViewKind::CountryMap
    }

    fn update(&mut self, data: &[CountryAggregate]) -> UpdateOutcome {
        if self.destroyed {
            log::warn!("Country map update after destroy ignored");
            return UpdateOutcome::Empty(EmptyReason::MissingContainer);
        }
        self.data = data.to_vec();
        if !self.canvas.is_renderable() {
            log::warn!("Country map container has no size; showing empty state");
            return self.set_empty(EmptyReason::MissingContainer);
        }

        let placed: Vec<(&CountryAggregate, LatLon)> = data
            .iter()
            .filter_map(|agg| match self.locate(agg) {
                Some(loc) => Some((agg, loc)),
                None => {
                    log::debug!("No coordinates for country {:?}; marker skipped", agg.country);
                    None
                }
            })
            .collect();
        if placed.is_empty() {
            return self.set_empty(EmptyReason::NoPoints);
        }

        let max_count = placed.iter().map(|(a, _)| a.count).max().unwrap_or(1) as f64;
        self.size = SqrtScale::new(max_count, MAX_MARKER_RADIUS);
        let (lo, hi) = placed.iter().fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), (a, _)| {
            (lo.min(a.avg_similarity), hi.max(a.avg_similarity))
        });
        let color = SequentialColor::new(
            (lo, hi),
            &self.style.low_similarity_color,
            &self.style.high_similarity_color,
        );
        let projection = Equirectangular::fit(self.canvas);

        let mut marks: Vec<CountryMark> = placed
            .into_iter()
            .map(|(agg, location)| {
                let (cx, cy) = projection.project(location);
                CountryMark {
                    aggregate: agg.clone(),
                    location,
                    cx,
                    cy,
                    r: self.size.map(agg.count as f64).max(MIN_MARKER_RADIUS),
                    fill: color.map(agg.avg_similarity),
                    highlighted: false,
                }
            })
            .collect();
        // large markers underneath small ones
        marks.sort_by(|a, b| b.aggregate.count.cmp(&a.aggregate.count));

        self.color = Some(color);
        let summary = self.layer.join(marks);
        self.empty = None;
        log::debug!(
            "Country map: {} entered, {} updated, {} exited",
            summary.entered.len(),
            summary.updated.len(),
            summary.exited.len()
        );
        UpdateOutcome::Rendered(summary)
    }

    fn destroy(&mut self) {
        self.layer.clear();
        self.data.clear();
        self.on_click = None;
        self.destroyed = true;
    }

    fn document(&self) -> Result<Document, RenderError> {
        if self.destroyed {
            return Err(RenderError::Destroyed(ViewKind::CountryMap));
        }
        let doc = base_document(self.canvas, &self.style);
        if let Some(reason) = self.empty {
            return Ok(doc.add(empty_state(self.canvas, &self.style, reason.message())));
        }
        let mut doc = doc
            .add(Equirectangular::fit(self.canvas).backdrop(&self.style, 30))
            .add(self.markers());
        if self.style.legend {
            doc = doc.add(self.legend());
        }
        Ok(doc)
    }

    fn tooltip(&self, id: &str) -> Option<String> {
        self.layer.get(id).map(|m| Self::tooltip_for(&m.aggregate))
    }

    fn click(&self, id: &str) -> bool {
        match (&self.on_click, self.layer.get(id)) {
            (Some(handler), Some(mark)) => {
                handler(&mark.aggregate);
                true
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn aggregate(country: &str, count: usize, avg: f64, sources: &[&str]) -> CountryAggregate {
        CountryAggregate {
            country: country.to_string(),
            count,
            avg_similarity: avg,
            lat_lon: None,
            isolation_sources: sources.iter().map(|s| s.to_string()).collect(),
            member_ids: (0..count).map(|i| format!("{}-{}", country, i)).collect(),
            top10_count: count.min(2),
        }
    }

    fn view() -> CountryMapView {
        CountryMapView::new(Canvas::new(720.0, 360.0), RenderStyle::default())
    }

    #[test]
    fn markers_keyed_by_country_with_sqrt_radius() {
        let mut v = view();
        let data = vec![aggregate("Kenya", 4, 0.9, &[]), aggregate("Peru", 16, 0.7, &[])];
        v.update(&data);

        let kenya = v.marks().get("Kenya").unwrap();
        let peru = v.marks().get("Peru").unwrap();
        assert!((peru.r - MAX_MARKER_RADIUS).abs() < 1e-9);
        assert!((kenya.r - MAX_MARKER_RADIUS / 2.0).abs() < 1e-9);
        // larger marker drawn first
        assert_eq!(v.marks().keys(), vec!["Peru", "Kenya"]);
        assert_eq!(peru.fill, "#ffffb2");
        assert_eq!(kenya.fill, "#bd0026");
    }

    #[test]
    fn member_ids_are_looked_up_by_country_name() {
        let mut v = view();
        v.update(&[aggregate("Kenya", 2, 0.9, &[]), aggregate("Peru", 1, 0.7, &[])]);
        assert_eq!(v.member_ids(" kenya"), vec!["Kenya-0", "Kenya-1"]);
        assert!(v.member_ids("Chile").is_empty());
    }

    #[test]
    fn unknown_country_uses_group_location_or_is_skipped() {
        let mut v = view();
        let mut atlantis = aggregate("Atlantis", 2, 0.8, &[]);
        atlantis.lat_lon = Some(LatLon::new(10.0, -30.0));
        let nowhere = aggregate("Nowhere", 1, 0.8, &[]);
        v.update(&[atlantis, nowhere]);
        assert!(v.marks().get("Atlantis").is_some());
        assert!(v.marks().get("Nowhere").is_none());

        assert_eq!(
            v.update(&[aggregate("Nowhere", 1, 0.8, &[])]),
            UpdateOutcome::Empty(EmptyReason::NoPoints)
        );
    }

    #[test]
    fn tooltip_truncates_sources() {
        let mut v = view();
        v.update(&[aggregate("Brazil", 5, 0.75, &["soil", "water", "feces", "blood", "air"])]);
        let tip = v.tooltip("Brazil").unwrap();
        assert!(tip.contains("Sequences: 5"));
        assert!(tip.contains("Average similarity: 75.0%"));
        assert!(tip.contains("soil, water, feces +2 more"));
    }

    #[test]
    fn highlight_by_member_point_or_country() {
        let mut v = view();
        v.update(&[aggregate("Kenya", 2, 0.9, &[]), aggregate("Peru", 1, 0.8, &[])]);
        assert!(v.highlight("Peru-0", true));
        assert!(v.marks().get("Peru").unwrap().highlighted);
        assert!(!v.marks().get("Kenya").unwrap().highlighted);

        assert!(v.highlight("kenya", true));
        assert!(v.marks().get("Kenya").unwrap().highlighted);
        assert!(!v.highlight("unrelated-point", true));
    }

    #[test]
    fn legend_shows_size_scale() {
        let mut v = view();
        v.update(&[aggregate("Kenya", 9, 0.9, &[])]);
        let svg = v.document().unwrap().to_string();
        assert!(svg.contains("Sequences"));
        assert_eq!(v.legend_counts(), vec![9, 5, 1]);
    }

    #[test]
    fn click_dispatches_country_data() {
        use std::sync::{Arc, Mutex};
        let mut v = view();
        let got = Arc::new(Mutex::new(None));
        let sink = Arc::clone(&got);
        v.on_click(move |agg| *sink.lock().unwrap() = Some(agg.count));
        v.update(&[aggregate("Kenya", 3, 0.9, &[])]);
        assert!(v.click("Kenya"));
        assert_eq!(*got.lock().unwrap(), Some(3));
    }
}
