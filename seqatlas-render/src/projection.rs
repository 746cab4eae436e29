//! Equirectangular world projection and graticule

use seqatlas_core::LatLon;
use svg::node::element::{Group, Line, Rectangle};

use crate::{Canvas, RenderStyle};

/// Plate carrée projection filling the canvas
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Equirectangular {
    pub width: f64,
    pub height: f64,
}

impl Equirectangular {
    pub fn fit(canvas: Canvas) -> Self {
        Self {
            width: canvas.width,
            height: canvas.height,
        }
    }

    pub fn project(&self, loc: LatLon) -> (f64, f64) {
        let x = (loc.lon + 180.0) / 360.0 * self.width;
        let y = (90.0 - loc.lat) / 180.0 * self.height;
        (x, y)
    }

    /// Sphere outline plus meridians and parallels every `step` degrees
    pub fn backdrop(&self, style: &RenderStyle, step: u32) -> Group {
        let mut group = Group::new().set("class", "graticule").add(
            Rectangle::new()
                .set("x", 0)
                .set("y", 0)
                .set("width", self.width)
                .set("height", self.height)
                .set("fill", style.land_color.as_str())
                .set("stroke", style.graticule_color.as_str()),
        );
        let step = step.max(1) as i32;
        for lon in (-180..=180).step_by(step as usize) {
            let (x, _) = self.project(LatLon::new(0.0, lon as f64));
            group = group.add(
                Line::new()
                    .set("x1", x)
                    .set("y1", 0)
                    .set("x2", x)
                    .set("y2", self.height)
                    .set("stroke", style.graticule_color.as_str())
                    .set("stroke-width", 0.5),
            );
        }
        for lat in (-90..=90).step_by(step as usize) {
            let (_, y) = self.project(LatLon::new(lat as f64, 0.0));
            group = group.add(
                Line::new()
                    .set("x1", 0)
                    .set("y1", y)
                    .set("x2", self.width)
                    .set("y2", y)
                    .set("stroke", style.graticule_color.as_str())
                    .set("stroke-width", 0.5),
            );
        }
        group
    }
}
