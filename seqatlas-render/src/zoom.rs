//! Drag / zoom / pan state for the geo map
//!
//! Scale is clamped to `[MIN_SCALE, MAX_SCALE]`. Wheel zoom is disabled;
//! zoom only changes through explicit calls. A container resize resets to identity.

pub const MIN_SCALE: f64 = 1.0;
pub const MAX_SCALE: f64 = 8.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ZoomState {
    pub scale: f64,
    pub translate_x: f64,
    pub translate_y: f64,
}

impl Default for ZoomState {
    fn default() -> Self {
        Self::identity()
    }
}

impl ZoomState {
    pub fn identity() -> Self {
        Self {
            scale: 1.0,
            translate_x: 0.0,
            translate_y: 0.0,
        }
    }

    pub fn is_identity(&self) -> bool {
        *self == Self::identity()
    }

    /// Zoom to `scale` keeping the screen point `(cx, cy)` fixed
    pub fn zoom_to(&mut self, scale: f64, cx: f64, cy: f64) {
        if !scale.is_finite() {
            return;
        }
        let next = scale.clamp(MIN_SCALE, MAX_SCALE);
        let ratio = next / self.scale;
        self.translate_x = cx - (cx - self.translate_x) * ratio;
        self.translate_y = cy - (cy - self.translate_y) * ratio;
        self.scale = next;
    }

    pub fn zoom_by(&mut self, factor: f64, cx: f64, cy: f64) {
        self.zoom_to(self.scale * factor, cx, cy);
    }

    /// Wheel events never zoom; returns whether the event was consumed
    pub fn wheel(&mut self, _delta: f64) -> bool {
        false
    }

    pub fn drag(&mut self, dx: f64, dy: f64) {
        if dx.is_finite() && dy.is_finite() {
            self.translate_x += dx;
            self.translate_y += dy;
        }
    }

    /// Container resized
    pub fn resize(&mut self) {
        *self = Self::identity();
    }

    pub fn apply(&self, (x, y): (f64, f64)) -> (f64, f64) {
        (x * self.scale + self.translate_x, y * self.scale + self.translate_y)
    }

    /// SVG `transform` attribute value
    pub fn transform(&self) -> String {
        format!(
            "translate({:.3},{:.3}) scale({:.4})",
            self.translate_x, self.translate_y, self.scale
        )
    }
}
