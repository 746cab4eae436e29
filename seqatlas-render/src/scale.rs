//! Scales mapping data values to pixels, radii and colors

/// Fraction of the data span added on each side of a scatter axis
pub const DOMAIN_PADDING: f64 = 0.1;

/// `[min, max]` of `values` widened by `pad` of the span on each side.
/// A zero-width extent widens by one unit instead; no values gives `[-1, 1]`.
pub fn padded_extent<I: IntoIterator<Item = f64>>(values: I, pad: f64) -> (f64, f64) {
    let (min, max) = values
        .into_iter()
        .filter(|v| v.is_finite())
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| (lo.min(v), hi.max(v)));
    if min > max {
        return (-1.0, 1.0);
    }
    let span = max - min;
    if span <= f64::EPSILON * max.abs().max(1.0) {
        return (min - 1.0, max + 1.0);
    }
    (min - span * pad, max + span * pad)
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LinearScale {
    pub domain: (f64, f64),
    pub range: (f64, f64),
}

impl LinearScale {
    pub fn new(domain: (f64, f64), range: (f64, f64)) -> Self {
        Self { domain, range }
    }

    pub fn map(&self, v: f64) -> f64 {
        let span = self.domain.1 - self.domain.0;
        if span == 0.0 {
            return (self.range.0 + self.range.1) * 0.5;
        }
        let t = (v - self.domain.0) / span;
        self.range.0 + t * (self.range.1 - self.range.0)
    }

    pub fn ticks(&self, desired: usize) -> Vec<f64> {
        nice_ticks(self.domain.0, self.domain.1, desired)
    }
}

/// Square-root scale from `[0, max]`, so marker area tracks the value
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SqrtScale {
    pub max_value: f64,
    pub max_radius: f64,
}

impl SqrtScale {
    pub fn new(max_value: f64, max_radius: f64) -> Self {
        Self { max_value, max_radius }
    }

    pub fn map(&self, v: f64) -> f64 {
        if self.max_value <= 0.0 {
            return self.max_radius;
        }
        self.max_radius * (v.max(0.0) / self.max_value).sqrt()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rgb(pub u8, pub u8, pub u8);

impl Rgb {
    pub fn from_hex(s: &str) -> Option<Self> {
        let s = s.trim().trim_start_matches('#');
        if s.len() != 6 {
            return None;
        }
        let r = u8::from_str_radix(&s[0..2], 16).ok()?;
        let g = u8::from_str_radix(&s[2..4], 16).ok()?;
        let b = u8::from_str_radix(&s[4..6], 16).ok()?;
        Some(Rgb(r, g, b))
    }

    pub fn hex(&self) -> String {
        format!("#{:02x}{:02x}{:02x}", self.0, self.1, self.2)
    }

    fn lerp(a: Rgb, b: Rgb, t: f64) -> Rgb {
        let mix = |x: u8, y: u8| (x as f64 + (y as f64 - x as f64) * t).round().clamp(0.0, 255.0) as u8;
        Rgb(mix(a.0, b.0), mix(a.1, b.1), mix(a.2, b.2))
    }
}

/// Two-stop sequential color scale
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SequentialColor {
    pub domain: (f64, f64),
    low: Rgb,
    high: Rgb,
}

impl SequentialColor {
    /// Unparseable colors fall back to grey endpoints
    pub fn new(domain: (f64, f64), low: &str, high: &str) -> Self {
        Self {
            domain,
            low: Rgb::from_hex(low).unwrap_or(Rgb(0xee, 0xee, 0xee)),
            high: Rgb::from_hex(high).unwrap_or(Rgb(0x33, 0x33, 0x33)),
        }
    }

    pub fn map(&self, v: f64) -> String {
        let span = self.domain.1 - self.domain.0;
        let t = if span <= 0.0 { 1.0 } else { ((v - self.domain.0) / span).clamp(0.0, 1.0) };
        Rgb::lerp(self.low, self.high, t).hex()
    }
}

fn nice_step(x: f64) -> f64 {
    if x <= 0.0 {
        return 1.0;
    }
    let exp = x.log10().floor();
    let base = 10f64.powf(exp);
    let mant = x / base;
    let nice = if mant <= 1.0 {
        1.0
    } else if mant <= 2.0 {
        2.0
    } else if mant <= 5.0 {
        5.0
    } else {
        10.0
    };
    nice * base
}

/// Round tick positions covering `[min, max]`
pub fn nice_ticks(min: f64, max: f64, desired: usize) -> Vec<f64> {
    if !(min.is_finite() && max.is_finite()) || max <= min || desired == 0 {
        return Vec::new();
    }
    let step = nice_step((max - min) / desired as f64);
    let mut ticks = Vec::new();
    let mut v = (min / step).ceil() * step;
    while v <= max + step * 1e-9 {
        // snap away float noise like 0.30000000000000004
        ticks.push((v / step).round() * step);
        v += step;
    }
    ticks
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extent_pads_ten_percent() {
        let (lo, hi) = padded_extent([0.0, 10.0, 5.0], DOMAIN_PADDING);
        assert!((lo + 1.0).abs() < 1e-12);
        assert!((hi - 11.0).abs() < 1e-12);
    }

    #[test]
    fn degenerate_extent_falls_back_to_unit_padding() {
        assert_eq!(padded_extent([3.0, 3.0, 3.0], DOMAIN_PADDING), (2.0, 4.0));
        assert_eq!(padded_extent(std::iter::empty(), DOMAIN_PADDING), (-1.0, 1.0));
    }

    #[test]
    fn sqrt_scale_area_is_proportional() {
        let s = SqrtScale::new(100.0, 20.0);
        let a1 = s.map(25.0).powi(2);
        let a2 = s.map(100.0).powi(2);
        assert!((a2 / a1 - 4.0).abs() < 1e-9);
        assert_eq!(s.map(0.0), 0.0);
    }

    #[test]
    fn sequential_color_endpoints() {
        let c = SequentialColor::new((0.5, 1.0), "#000000", "#ffffff");
        assert_eq!(c.map(0.5), "#000000");
        assert_eq!(c.map(1.0), "#ffffff");
        assert_eq!(c.map(2.0), "#ffffff");
        // single-valued domain maps to the high end
        assert_eq!(SequentialColor::new((0.8, 0.8), "#000000", "#ffffff").map(0.8), "#ffffff");
    }

    #[test]
    fn ticks_are_round_numbers() {
        assert_eq!(nice_ticks(0.0, 10.0, 5), vec![0.0, 2.0, 4.0, 6.0, 8.0, 10.0]);
        assert!(nice_ticks(5.0, 5.0, 5).is_empty());
    }
}
