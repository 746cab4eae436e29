//! Contextual scatter plot
//!
//! The user's sequence among its matched neighbours in embedding space.
//! Three visual classes: the user point (largest, own color), top-10 matches
//! (mid-size, labelled with similarity) and the remainder (small, grey).
//! Connection lines run from the user point to the top-10 only.

use seqatlas_core::ReconciledPoint;
use svg::node::element::{Circle, Group, Line, Rectangle, Text, Title};
use svg::Document;

use crate::scale::{padded_extent, LinearScale, DOMAIN_PADDING};
use crate::scene::{empty_state, EmptyReason, Keyed, Layer, UpdateOutcome};
use crate::{
    base_document, metadata_lines, percent, Canvas, ClickHandler, Highlight, RenderError, RenderStyle, View,
    ViewKind,
};

const MARGIN_TOP: f64 = 30.0;
const MARGIN_RIGHT: f64 = 170.0;
const MARGIN_BOTTOM: f64 = 45.0;
const MARGIN_LEFT: f64 = 55.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum PointClass {
    Remainder,
    Top,
    User,
}

impl PointClass {
    fn of(point: &ReconciledPoint) -> Self {
        if point.is_user_sequence {
            PointClass::User
        } else if point.is_top10 {
            PointClass::Top
        } else {
            PointClass::Remainder
        }
    }

    fn radius(self) -> f64 {
        match self {
            PointClass::User => 9.0,
            PointClass::Top => 6.0,
            PointClass::Remainder => 3.5,
        }
    }

    fn css(self) -> &'static str {
        match self {
            PointClass::User => "point user",
            PointClass::Top => "point top10",
            PointClass::Remainder => "point remainder",
        }
    }
}

#[derive(Debug, Clone)]
pub struct ScatterMark {
    pub point: ReconciledPoint,
    pub class: PointClass,
    pub cx: f64,
    pub cy: f64,
    pub highlighted: bool,
}

impl ScatterMark {
    pub fn radius(&self) -> f64 {
        self.class.radius()
    }

    pub fn stroke_width(&self) -> f64 {
        match (self.highlighted, self.class) {
            (true, _) => 3.5,
            (false, PointClass::User) => 2.0,
            (false, _) => 1.0,
        }
    }
}

impl Keyed for ScatterMark {
    fn key(&self) -> &str {
        &self.point.id
    }

    fn inherit(&mut self, previous: &Self) {
        self.highlighted = previous.highlighted;
    }
}

pub struct ScatterView {
    canvas: Canvas,
    style: RenderStyle,
    layer: Layer<ScatterMark>,
    data: Vec<ReconciledPoint>,
    x: LinearScale,
    y: LinearScale,
    empty: Option<EmptyReason>,
    on_click: Option<ClickHandler<ReconciledPoint>>,
    destroyed: bool,
}

impl ScatterView {
    pub fn new(canvas: Canvas, style: RenderStyle) -> Self {
        Self {
            canvas,
            style,
            layer: Layer::new(),
            data: Vec::new(),
            x: LinearScale::new((-1.0, 1.0), (0.0, 1.0)),
            y: LinearScale::new((-1.0, 1.0), (1.0, 0.0)),
            empty: Some(EmptyReason::NoPoints),
            on_click: None,
            destroyed: false,
        }
    }

    pub fn on_click(&mut self, handler: impl Fn(&ReconciledPoint) + Send + 'static) {
        self.on_click = Some(Box::new(handler));
    }

    pub fn marks(&self) -> &Layer<ScatterMark> {
        &self.layer
    }

    pub fn x_scale(&self) -> LinearScale {
        self.x
    }

    pub fn y_scale(&self) -> LinearScale {
        self.y
    }

    /// Container changed size; redraw the held data
    pub fn resize(&mut self, canvas: Canvas) -> UpdateOutcome {
        self.canvas = canvas;
        let data = std::mem::take(&mut self.data);
        self.update(&data)
    }

    fn set_empty(&mut self, reason: EmptyReason) -> UpdateOutcome {
        let exited = self.layer.clear();
        if !exited.is_empty() {
            log::debug!("Scatter cleared {} marks", exited.len());
        }
        self.empty = Some(reason);
        UpdateOutcome::Empty(reason)
    }

    fn tooltip_for(point: &ReconciledPoint) -> String {
        if point.is_user_sequence {
            return format!("Your sequence: {}", point.accession);
        }
        let mut lines = vec![
            format!("#{} {}", point.rank, point.accession),
            format!("Similarity: {}", percent(point.similarity)),
        ];
        lines.extend(metadata_lines(&point.metadata));
        lines.join("\n")
    }

    fn plot_bounds(&self) -> (f64, f64, f64, f64) {
        (
            MARGIN_LEFT,
            (self.canvas.width - MARGIN_RIGHT).max(MARGIN_LEFT + 1.0),
            MARGIN_TOP,
            (self.canvas.height - MARGIN_BOTTOM).max(MARGIN_TOP + 1.0),
        )
    }

    fn axes(&self) -> Group {
        let (left, right, top, bottom) = self.plot_bounds();
        let font = self.style.font_family.as_str();
        let size = self.style.font_size.saturating_sub(2).max(8);
        let axis = |x1: f64, y1: f64, x2: f64, y2: f64| {
            Line::new()
                .set("x1", x1)
                .set("y1", y1)
                .set("x2", x2)
                .set("y2", y2)
                .set("stroke", "black")
                .set("stroke-width", 1)
        };

        let mut group = Group::new()
            .set("class", "axes")
            .add(axis(left, bottom, right, bottom))
            .add(axis(left, top, left, bottom));

        for t in self.x.ticks(6) {
            let px = self.x.map(t);
            group = group.add(axis(px, bottom, px, bottom + 5.0)).add(
                Text::new(format_tick(t))
                    .set("x", px)
                    .set("y", bottom + 17.0)
                    .set("text-anchor", "middle")
                    .set("font-family", font)
                    .set("font-size", size),
            );
        }
        for t in self.y.ticks(6) {
            let py = self.y.map(t);
            group = group.add(axis(left - 5.0, py, left, py)).add(
                Text::new(format_tick(t))
                    .set("x", left - 8.0)
                    .set("y", py)
                    .set("text-anchor", "end")
                    .set("dominant-baseline", "middle")
                    .set("font-family", font)
                    .set("font-size", size),
            );
        }

        group
            .add(
                Text::new("UMAP 1")
                    .set("x", (left + right) / 2.0)
                    .set("y", self.canvas.height - 8.0)
                    .set("text-anchor", "middle")
                    .set("font-family", font)
                    .set("font-size", self.style.font_size),
            )
            .add(
                Text::new("UMAP 2")
                    .set("x", 14.0)
                    .set("y", (top + bottom) / 2.0)
                    .set("transform", format!("rotate(-90 14 {})", (top + bottom) / 2.0))
                    .set("text-anchor", "middle")
                    .set("font-family", font)
                    .set("font-size", self.style.font_size),
            )
    }

    fn links(&self) -> Group {
        let mut group = Group::new().set("class", "similarity-links");
        let Some(user) = self.layer.iter().find(|m| m.class == PointClass::User) else {
            return group;
        };
        for mark in self.layer.iter().filter(|m| m.class == PointClass::Top) {
            group = group.add(
                Line::new()
                    .set("x1", user.cx)
                    .set("y1", user.cy)
                    .set("x2", mark.cx)
                    .set("y2", mark.cy)
                    .set("stroke", self.style.link_color.as_str())
                    .set("stroke-width", 1)
                    .set("stroke-opacity", 0.6)
                    .set("stroke-dasharray", "4,3"),
            );
        }
        group
    }

    fn fill(&self, class: PointClass) -> &str {
        match class {
            PointClass::User => &self.style.user_color,
            PointClass::Top => &self.style.top_color,
            PointClass::Remainder => &self.style.remainder_color,
        }
    }

    fn points(&self) -> Group {
        let mut group = Group::new().set("class", "points");
        for mark in self.layer.iter() {
            let stroke = if mark.highlighted { "#212121" } else { "#ffffff" };
            group = group.add(
                Group::new()
                    .set("class", mark.class.css())
                    .set("data-id", mark.point.id.as_str())
                    .add(
                        Circle::new()
                            .set("cx", mark.cx)
                            .set("cy", mark.cy)
                            .set("r", mark.radius())
                            .set("fill", self.fill(mark.class))
                            .set("fill-opacity", if mark.class == PointClass::Remainder { 0.7 } else { 0.95 })
                            .set("stroke", stroke)
                            .set("stroke-width", mark.stroke_width()),
                    )
                    .add(Title::new(Self::tooltip_for(&mark.point))),
            );
        }
        group
    }

    fn labels(&self) -> Group {
        let mut group = Group::new().set("class", "labels");
        for mark in self.layer.iter().filter(|m| m.class == PointClass::Top) {
            group = group.add(
                Text::new(percent(mark.point.similarity))
                    .set("x", mark.cx + mark.radius() + 3.0)
                    .set("y", mark.cy - mark.radius())
                    .set("font-family", self.style.font_family.as_str())
                    .set("font-size", self.style.font_size.saturating_sub(2).max(8))
                    .set("fill", "#333333"),
            );
        }
        group
    }

    fn legend(&self) -> Group {
        let x = self.canvas.width - MARGIN_RIGHT + 15.0;
        let y = MARGIN_TOP;
        let entries = [
            (PointClass::User, "Your sequence"),
            (PointClass::Top, "Top 10 matches"),
            (PointClass::Remainder, "Other matches"),
        ];
        let mut group = Group::new().set("class", "legend").add(
            Rectangle::new()
                .set("x", x)
                .set("y", y)
                .set("width", 145)
                .set("height", 25.0 * entries.len() as f64 + 10.0)
                .set("fill", "white")
                .set("stroke", "black")
                .set("stroke-width", 1)
                .set("fill-opacity", 0.9),
        );
        for (i, (class, label)) in entries.iter().enumerate() {
            let row = y + 20.0 + 25.0 * i as f64;
            group = group
                .add(
                    Circle::new()
                        .set("cx", x + 15.0)
                        .set("cy", row)
                        .set("r", class.radius().min(7.0))
                        .set("fill", self.fill(*class)),
                )
                .add(
                    Text::new(*label)
                        .set("x", x + 30.0)
                        .set("y", row)
                        .set("dominant-baseline", "middle")
                        .set("font-family", self.style.font_family.as_str())
                        .set("font-size", self.style.font_size),
                );
        }
        group
    }
}

fn format_tick(v: f64) -> String {
    if v.fract().abs() < 1e-9 {
        format!("{:.0}", v)
    } else {
        format!("{:.1}", v)
    }
}

impl Highlight for ScatterView {
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

impl View for ScatterView {
    type Data = [ReconciledPoint];

    fn kind(&self) -> ViewKind {
        ViewKind::Scatter
    }

    fn update(&mut self, data: &[ReconciledPoint]) -> UpdateOutcome {
        if self.destroyed {
            log::warn!("Scatter update after destroy ignored");
            return UpdateOutcome::Empty(EmptyReason::MissingContainer);
        }
        self.data = data.to_vec();
        if !self.canvas.is_renderable() {
            log::warn!("Scatter container has no size; showing empty state");
            return self.set_empty(EmptyReason::MissingContainer);
        }

        let points: Vec<&ReconciledPoint> = data
            .iter()
            .filter(|p| p.x.is_finite() && p.y.is_finite())
            .collect();
        if points.is_empty() {
            return self.set_empty(EmptyReason::NoPoints);
        }

        let (left, right, top, bottom) = self.plot_bounds();
        self.x = LinearScale::new(padded_extent(points.iter().map(|p| p.x), DOMAIN_PADDING), (left, right));
        self.y = LinearScale::new(padded_extent(points.iter().map(|p| p.y), DOMAIN_PADDING), (bottom, top));

        let mut marks: Vec<ScatterMark> = points
            .into_iter()
            .map(|p| ScatterMark {
                class: PointClass::of(p),
                cx: self.x.map(p.x),
                cy: self.y.map(p.y),
                point: p.clone(),
                highlighted: false,
            })
            .collect();
        // grey first, user last
        marks.sort_by_key(|m| m.class);

        let summary = self.layer.join(marks);
        self.empty = None;
        log::debug!(
            "Scatter: {} entered, {} updated, {} exited",
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
            return Err(RenderError::Destroyed(ViewKind::Scatter));
        }
        let doc = base_document(self.canvas, &self.style);
        if let Some(reason) = self.empty {
            return Ok(doc.add(empty_state(self.canvas, &self.style, reason.message())));
        }
        let mut doc = doc
            .add(self.axes())
            .add(self.links())
            .add(self.points())
            .add(self.labels());
        if self.style.legend {
            doc = doc.add(self.legend());
        }
        Ok(doc)
    }

    fn tooltip(&self, id: &str) -> Option<String> {
        self.layer.get(id).map(|m| Self::tooltip_for(&m.point))
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
