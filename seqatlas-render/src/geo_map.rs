//! Per-sequence geographic map
//!
//! Every matched hit with a parseable location is drawn individually, fanned
//! out by golden-angle jitter where samples share a site, and linked to the
//! user's point by a faint line. The user's true location is not known, so it
//! sits at a configurable placeholder.
//!
//! Point style combines three independent conditions:
//! - below the similarity threshold: heavily faded grey, whatever the rank
//! - top-10 vs remainder: color and stroke
//! - active year filter: matching points emphasized, the rest faded
//!   (a faded top-10 point stays more visible than a faded remainder point)

use seqatlas_core::{GeoPoint, JitterLayout, LatLon, UserSequencePoint};
use serde::{Deserialize, Serialize};
use svg::node::element::{Circle, Group, Line, Rectangle, Text, Title};
use svg::Document;

use crate::projection::Equirectangular;
use crate::scene::{empty_state, EmptyReason, Keyed, Layer, UpdateOutcome};
use crate::timelapse::{TimeFrame, TimeLapseTarget};
use crate::zoom::ZoomState;
use crate::{
    base_document, metadata_lines, percent, Canvas, ClickHandler, Highlight, RenderError, RenderStyle, View,
    ViewKind,
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeoMapOptions {
    /// Where the user's sequence is drawn
    pub user_location: LatLon,
    /// Decimal places that make two locations the same site
    pub jitter_precision: u32,
    /// Spiral step in degrees
    pub jitter_radius: f64,
    pub graticule_step: u32,
}

impl Default for GeoMapOptions {
    fn default() -> Self {
        let jitter = JitterLayout::default();
        Self {
            user_location: LatLon::new(0.0, 0.0),
            jitter_precision: jitter.precision,
            jitter_radius: jitter.base_radius,
            graticule_step: 30,
        }
    }
}

impl GeoMapOptions {
    pub fn jitter(&self) -> JitterLayout {
        JitterLayout {
            precision: self.jitter_precision,
            base_radius: self.jitter_radius,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PointStyle {
    pub fill: String,
    pub opacity: f64,
    pub radius: f64,
    pub below_threshold: bool,
}

/// Style for one point under the current frame
pub fn point_style(point: &GeoPoint, frame: &TimeFrame, style: &RenderStyle) -> PointStyle {
    let radius = if point.is_top10 { 6.0 } else { 4.0 };
    if point.similarity < frame.similarity_threshold {
        return PointStyle {
            fill: style.faded_color.clone(),
            opacity: 0.1,
            radius,
            below_threshold: true,
        };
    }
    let fill = if point.is_top10 { &style.top_color } else { &style.remainder_color };
    let (opacity, radius) = match frame.year {
        Some(year) if point.year == Some(year) || point.metadata.matches_year(year) => (1.0, radius * 1.5),
        Some(_) => (if point.is_top10 { 0.4 } else { 0.25 }, radius),
        None => (if point.is_top10 { 0.95 } else { 0.7 }, radius),
    };
    PointStyle {
        fill: fill.clone(),
        opacity,
        radius,
        below_threshold: false,
    }
}

#[derive(Debug, Clone)]
pub struct GeoMark {
    pub point: GeoPoint,
    /// Location after jitter
    pub location: LatLon,
    pub cx: f64,
    pub cy: f64,
    pub style: PointStyle,
    pub highlighted: bool,
}

impl Keyed for GeoMark {
    fn key(&self) -> &str {
        &self.point.id
    }

    fn inherit(&mut self, previous: &Self) {
        self.highlighted = previous.highlighted;
    }
}

pub struct GeoMapView {
    canvas: Canvas,
    style: RenderStyle,
    options: GeoMapOptions,
    layer: Layer<GeoMark>,
    user: Option<UserSequencePoint>,
    points: Vec<GeoPoint>,
    frame: TimeFrame,
    zoom: ZoomState,
    empty: Option<EmptyReason>,
    on_click: Option<ClickHandler<GeoPoint>>,
    destroyed: bool,
}

impl GeoMapView {
    pub fn new(canvas: Canvas, style: RenderStyle, options: GeoMapOptions) -> Self {
        Self {
            canvas,
            style,
            options,
            layer: Layer::new(),
            user: None,
            points: Vec::new(),
            frame: TimeFrame::default(),
            zoom: ZoomState::identity(),
            empty: Some(EmptyReason::NoPoints),
            on_click: None,
            destroyed: false,
        }
    }

    pub fn on_click(&mut self, handler: impl Fn(&GeoPoint) + Send + 'static) {
        self.on_click = Some(Box::new(handler));
    }

    pub fn marks(&self) -> &Layer<GeoMark> {
        &self.layer
    }

    pub fn frame(&self) -> TimeFrame {
        self.frame
    }

    pub fn zoom(&self) -> &ZoomState {
        &self.zoom
    }

    pub fn zoom_mut(&mut self) -> &mut ZoomState {
        &mut self.zoom
    }

    /// Replace the user point and the held subset, then redraw
    pub fn update_data(&mut self, user: &UserSequencePoint, points: &[GeoPoint]) -> UpdateOutcome {
        self.user = Some(user.clone());
        self.update(points)
    }

    /// Container resized: zoom resets and the held data is redrawn
    pub fn resize(&mut self, canvas: Canvas) -> UpdateOutcome {
        self.canvas = canvas;
        self.zoom.resize();
        self.redraw()
    }

    fn set_frame(&mut self, frame: TimeFrame) {
        self.frame = frame;
        for mark in self.layer.iter_mut() {
            mark.style = point_style(&mark.point, &self.frame, &self.style);
        }
    }

    fn redraw(&mut self) -> UpdateOutcome {
        if !self.canvas.is_renderable() {
            log::warn!("Geo map container has no size; showing empty state");
            self.layer.clear();
            self.empty = Some(EmptyReason::MissingContainer);
            return UpdateOutcome::Empty(EmptyReason::MissingContainer);
        }

        let located: Vec<(&GeoPoint, LatLon)> = self
            .points
            .iter()
            .filter_map(|p| p.location.map(|loc| (p, loc)))
            .collect();
        let skipped = self.points.len() - located.len();
        if skipped > 0 {
            log::debug!("Geo map: {} points without a location not drawn", skipped);
        }
        if located.is_empty() {
            self.layer.clear();
            self.empty = Some(EmptyReason::NoPoints);
            return UpdateOutcome::Empty(EmptyReason::NoPoints);
        }

        let raw: Vec<LatLon> = located.iter().map(|(_, loc)| *loc).collect();
        let placed = self.options.jitter().apply(&raw);
        let projection = Equirectangular::fit(self.canvas);

        let mut marks: Vec<GeoMark> = located
            .iter()
            .zip(placed)
            .map(|((point, _), location)| {
                let (cx, cy) = projection.project(location);
                GeoMark {
                    point: (*point).clone(),
                    location,
                    cx,
                    cy,
                    style: point_style(point, &self.frame, &self.style),
                    highlighted: false,
                }
            })
            .collect();
        // top-10 on top
        marks.sort_by_key(|m| m.point.is_top10);

        let summary = self.layer.join(marks);
        self.empty = None;
        log::debug!(
            "Geo map: {} entered, {} updated, {} exited",
            summary.entered.len(),
            summary.updated.len(),
            summary.exited.len()
        );
        UpdateOutcome::Rendered(summary)
    }

    fn tooltip_for(point: &GeoPoint, location: LatLon) -> String {
        let mut lines = vec![
            format!("#{} {}", point.rank, point.accession),
            format!("Similarity: {}", percent(point.similarity)),
        ];
        lines.extend(metadata_lines(&point.metadata));
        lines.push(format!("Location: {:.2}, {:.2}", location.lat, location.lon));
        lines.join("\n")
    }

    fn user_xy(&self) -> (f64, f64) {
        Equirectangular::fit(self.canvas).project(self.options.user_location)
    }

    fn links(&self) -> Group {
        let mut group = Group::new().set("class", "user-links");
        if self.user.is_none() {
            return group;
        }
        let (ux, uy) = self.user_xy();
        for mark in self.layer.iter() {
            group = group.add(
                Line::new()
                    .set("x1", ux)
                    .set("y1", uy)
                    .set("x2", mark.cx)
                    .set("y2", mark.cy)
                    .set("stroke", self.style.link_color.as_str())
                    .set("stroke-width", 0.5)
                    .set("stroke-opacity", if mark.style.below_threshold { 0.03 } else { 0.15 }),
            );
        }
        group
    }

    fn markers(&self) -> Group {
        let mut group = Group::new().set("class", "points");
        for mark in self.layer.iter() {
            let (stroke, stroke_width) = match (mark.highlighted, mark.point.is_top10) {
                (true, _) => ("#212121", 3.0),
                (false, true) => ("#0d3c8c", 1.5),
                (false, false) => ("#ffffff", 0.5),
            };
            group = group.add(
                Group::new()
                    .set("class", if mark.point.is_top10 { "point top10" } else { "point remainder" })
                    .set("data-id", mark.point.id.as_str())
                    .add(
                        Circle::new()
                            .set("cx", mark.cx)
                            .set("cy", mark.cy)
                            .set("r", mark.style.radius)
                            .set("fill", mark.style.fill.as_str())
                            .set("fill-opacity", mark.style.opacity)
                            .set("stroke", stroke)
                            .set("stroke-width", stroke_width),
                    )
                    .add(Title::new(Self::tooltip_for(&mark.point, mark.location))),
            );
        }

        if let Some(user) = &self.user {
            let (ux, uy) = self.user_xy();
            group = group.add(
                Group::new()
                    .set("class", "point user")
                    .set("data-id", user.id.as_str())
                    .add(
                        Circle::new()
                            .set("cx", ux)
                            .set("cy", uy)
                            .set("r", 8)
                            .set("fill", self.style.user_color.as_str())
                            .set("stroke", "#ffffff")
                            .set("stroke-width", 2),
                    )
                    .add(Title::new(format!("Your sequence: {} (location not tracked)", user.label))),
            );
        }
        group
    }

    fn legend(&self) -> Group {
        let font = self.style.font_family.as_str();
        let x = 12.0;
        let y = 12.0;
        let entries = [
            (self.style.user_color.as_str(), "Your sequence"),
            (self.style.top_color.as_str(), "Top 10 matches"),
            (self.style.remainder_color.as_str(), "Other matches"),
            (self.style.faded_color.as_str(), "Below threshold"),
        ];
        let mut group = Group::new().set("class", "legend").add(
            Rectangle::new()
                .set("x", x)
                .set("y", y)
                .set("width", 160)
                .set("height", 22.0 * entries.len() as f64 + 36.0)
                .set("fill", "white")
                .set("fill-opacity", 0.9)
                .set("stroke", "black")
                .set("stroke-width", 1),
        );
        for (i, (color, label)) in entries.iter().enumerate() {
            let row = y + 18.0 + 22.0 * i as f64;
            group = group
                .add(Circle::new().set("cx", x + 14.0).set("cy", row).set("r", 5).set("fill", *color))
                .add(
                    Text::new(*label)
                        .set("x", x + 28.0)
                        .set("y", row)
                        .set("dominant-baseline", "middle")
                        .set("font-family", font)
                        .set("font-size", self.style.font_size),
                );
        }
        let status = match self.frame.year {
            Some(year) => format!("Year: {}", year),
            None => "Year: all".to_string(),
        };
        let status = format!("{} | min {}", status, percent(self.frame.similarity_threshold));
        group.add(
            Text::new(status)
                .set("x", x + 10.0)
                .set("y", y + 22.0 * entries.len() as f64 + 24.0)
                .set("font-family", font)
                .set("font-size", self.style.font_size.saturating_sub(1).max(8))
                .set("class", "frame-status"),
        )
    }
}

impl TimeLapseTarget for GeoMapView {
    fn apply_frame(&mut self, frame: &TimeFrame) {
        self.set_frame(*frame);
    }
}

impl Highlight for GeoMapView {
    fn highlight(&mut self, id: &str, on: bool) -> bool {
        match self.layer.get_mut(id) {
            Some(mark) => {
                mark.highlighted = on;
                true
            }
            None => false,
        }
    }
}

impl View for GeoMapView {
    type Data = [GeoPoint];

    fn kind(&self) -> ViewKind {
        ViewKind::GeoMap
    }

    fn update(&mut self, data: &[GeoPoint]) -> UpdateOutcome {
        if self.destroyed {
            log::warn!("Geo map update after destroy ignored");
            return UpdateOutcome::Empty(EmptyReason::MissingContainer);
        }
        self.points = data.to_vec();
        self.redraw()
    }

    fn destroy(&mut self) {
        self.layer.clear();
        self.points.clear();
        self.user = None;
        self.on_click = None;
        self.zoom.resize();
        self.destroyed = true;
    }

    fn document(&self) -> Result<Document, RenderError> {
        if self.destroyed {
            return Err(RenderError::Destroyed(ViewKind::GeoMap));
        }
        let doc = base_document(self.canvas, &self.style);
        if let Some(reason) = self.empty {
            return Ok(doc.add(empty_state(self.canvas, &self.style, reason.message())));
        }
        let map = Group::new()
            .set("class", "zoom-layer")
            .set("transform", self.zoom.transform())
            .add(Equirectangular::fit(self.canvas).backdrop(&self.style, self.options.graticule_step))
            .add(self.links())
            .add(self.markers());
        let mut doc = doc.add(map);
        if self.style.legend {
            doc = doc.add(self.legend());
        }
        Ok(doc)
    }

    fn tooltip(&self, id: &str) -> Option<String> {
        self.layer.get(id).map(|m| Self::tooltip_for(&m.point, m.location))
    }

    fn click(&self, id: &str) -> bool {
        match (&self.on_click, self.layer.get(id)) {
            (Some(handler), Some(mark)) => {
                handler(&mark.point);
                true
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use seqatlas_core::{SequenceMetadata, UserProjection};

    fn geo(id: &str, rank: usize, top: bool, loc: Option<(f64, f64)>, year: i32, similarity: f64) -> GeoPoint {
        GeoPoint {
            id: id.to_string(),
            accession: id.to_uppercase(),
            rank,
            similarity,
            is_top10: top,
            location: loc.map(|(lat, lon)| LatLon::new(lat, lon)),
            year: Some(year),
            metadata: SequenceMetadata {
                first_year: Some(year),
                ..Default::default()
            },
        }
    }

    fn user() -> UserSequencePoint {
        UserSequencePoint::from_projection("j", UserProjection { x: 0.0, y: 0.0 }, "mine.fa")
    }

    fn view() -> GeoMapView {
        GeoMapView::new(Canvas::new(720.0, 360.0), RenderStyle::default(), GeoMapOptions::default())
    }

    #[test]
    fn style_conditions_compose() {
        let style = RenderStyle::default();
        let top = geo("t", 1, true, Some((0.0, 0.0)), 2010, 0.9);
        let rest = geo("r", 20, false, Some((0.0, 0.0)), 2012, 0.6);

        let all = TimeFrame::default();
        assert_eq!(point_style(&top, &all, &style).opacity, 0.95);
        assert_eq!(point_style(&rest, &all, &style).opacity, 0.7);

        let in_2010 = TimeFrame { year: Some(2010), similarity_threshold: 0.0 };
        let emphasized = point_style(&top, &in_2010, &style);
        assert_eq!(emphasized.opacity, 1.0);
        assert_eq!(emphasized.radius, 9.0);
        assert_eq!(point_style(&rest, &in_2010, &style).opacity, 0.25);

        let in_2012 = TimeFrame { year: Some(2012), similarity_threshold: 0.0 };
        // a top-10 point outside the year is faded less than a below-threshold one
        let faded_top = point_style(&top, &in_2012, &style);
        assert_eq!(faded_top.opacity, 0.4);

        let strict = TimeFrame { year: Some(2012), similarity_threshold: 0.7 };
        let below = point_style(&rest, &strict, &style);
        assert!(below.below_threshold);
        assert_eq!(below.opacity, 0.1);
        assert_eq!(below.fill, style.faded_color);
        assert!(faded_top.opacity > below.opacity);
    }

    #[test]
    fn top10_drawn_last_and_unlocated_skipped() {
        let mut v = view();
        let pts = vec![
            geo("a", 1, true, Some((10.0, 10.0)), 2000, 0.9),
            geo("b", 2, false, Some((20.0, 20.0)), 2000, 0.8),
            geo("c", 3, true, None, 2000, 0.8),
            geo("d", 4, false, Some((-5.0, 30.0)), 2000, 0.7),
        ];
        v.update_data(&user(), &pts);
        assert_eq!(v.marks().keys(), vec!["b", "d", "a"]);
    }

    #[test]
    fn coincident_points_are_jittered_deterministically() {
        let pts: Vec<GeoPoint> = (0..5)
            .map(|i| geo(&format!("p{i}"), i + 1, i < 2, Some((51.5, -0.12)), 2001, 0.9))
            .collect();
        let mut a = view();
        let mut b = view();
        a.update(&pts);
        b.update(&pts);

        let locs = |v: &GeoMapView| {
            let mut l: Vec<(String, LatLon)> = v.marks().iter().map(|m| (m.point.id.clone(), m.location)).collect();
            l.sort_by(|x, y| x.0.cmp(&y.0));
            l
        };
        assert_eq!(locs(&a), locs(&b));
        // the highest-ranked point keeps the exact site
        assert_eq!(a.marks().get("p0").unwrap().location, LatLon::new(51.5, -0.12));
        assert_ne!(a.marks().get("p1").unwrap().location, LatLon::new(51.5, -0.12));
    }

    #[test]
    fn frames_restyle_without_rejoin() {
        let mut v = view();
        v.update_data(
            &user(),
            &[geo("a", 1, true, Some((0.0, 0.0)), 2000, 0.9), geo("b", 2, false, Some((1.0, 1.0)), 2001, 0.5)],
        );
        v.apply_frame(&TimeFrame { year: Some(2001), similarity_threshold: 0.6 });
        assert_eq!(v.marks().get("a").unwrap().style.opacity, 0.4);
        assert!(v.marks().get("b").unwrap().style.below_threshold);

        let svg = v.document().unwrap().to_string();
        assert!(svg.contains("Year: 2001"));
        assert!(svg.contains("Your sequence"));
    }

    #[test]
    fn resize_resets_zoom() {
        let mut v = view();
        v.update(&[geo("a", 1, true, Some((0.0, 0.0)), 2000, 0.9)]);
        v.zoom_mut().zoom_to(4.0, 100.0, 100.0);
        assert!(v.document().unwrap().to_string().contains("scale(4.0000)"));
        v.resize(Canvas::new(500.0, 250.0));
        assert!(v.zoom().is_identity());
        assert_eq!(v.marks().get("a").unwrap().cx, 250.0);
    }

    #[test]
    fn no_located_points_shows_empty_state() {
        let mut v = view();
        let outcome = v.update(&[geo("a", 1, true, None, 2000, 0.9)]);
        assert_eq!(outcome, UpdateOutcome::Empty(EmptyReason::NoPoints));
        assert!(v.document().unwrap().to_string().contains("empty-state"));
    }

    #[test]
    fn tooltip_lists_location_and_metadata() {
        let mut v = view();
        v.update(&[geo("a", 3, true, Some((-26.2, 28.0)), 2015, 0.95)]);
        let tip = v.tooltip("a").unwrap();
        assert!(tip.starts_with("#3 A"));
        assert!(tip.contains("Similarity: 95.0%"));
        assert!(tip.contains("Year: 2015"));
        assert!(tip.contains("Location: -26.20, 28.00"));
    }
}
