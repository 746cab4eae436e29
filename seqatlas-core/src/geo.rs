//! Geographic coordinate parsing and overlap jitter
//!
//! Sample locations arrive as free text, either `"lat,lon"` in decimal degrees
//! or the INSDC `lat_lon` form `"12.34 N 56.78 W"`. Many samples share a site,
//! so [`JitterLayout`] fans coincident points out along a golden-angle spiral.

use std::collections::HashMap;
use std::f64::consts::PI;

use thiserror::Error;

use crate::types::LatLon;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum GeoError {
    #[error("unrecognized lat_lon format: {0:?}")]
    Format(String),
    #[error("latitude {0} outside [-90, 90]")]
    Latitude(f64),
    #[error("longitude {0} outside [-180, 180]")]
    Longitude(f64),
}

/// Parse a `lat_lon` string into decimal degrees
pub fn parse_lat_lon(text: &str) -> Result<LatLon, GeoError> {
    let t = text.trim();
    let parsed = if t.contains(',') {
        parse_decimal_pair(t)
    } else {
        parse_hemisphere_form(t)
    }
    .ok_or_else(|| GeoError::Format(t.to_string()))?;

    if !(-90.0..=90.0).contains(&parsed.lat) {
        return Err(GeoError::Latitude(parsed.lat));
    }
    if !(-180.0..=180.0).contains(&parsed.lon) {
        return Err(GeoError::Longitude(parsed.lon));
    }
    Ok(parsed)
}

/// First parseable location in a list of `lat_lon` strings
pub fn first_location(values: &[String]) -> Option<LatLon> {
    values.iter().find_map(|v| match parse_lat_lon(v) {
        Ok(loc) => Some(loc),
        Err(e) => {
            log::debug!("Skipping location {:?}: {}", v, e);
            None
        }
    })
}

fn parse_decimal_pair(t: &str) -> Option<LatLon> {
    let (lat, lon) = t.split_once(',')?;
    let lat: f64 = lat.trim().parse().ok()?;
    let lon: f64 = lon.trim().parse().ok()?;
    (lat.is_finite() && lon.is_finite()).then_some(LatLon { lat, lon })
}

fn parse_hemisphere_form(t: &str) -> Option<LatLon> {
    let parts: Vec<&str> = t.split_whitespace().collect();
    if parts.len() != 4 {
        return None;
    }
    let lat: f64 = parts[0].parse().ok()?;
    let lon: f64 = parts[2].parse().ok()?;
    let lat = match parts[1].to_ascii_uppercase().as_str() {
        "N" => lat,
        "S" => -lat,
        _ => return None,
    };
    let lon = match parts[3].to_ascii_uppercase().as_str() {
        "E" => lon,
        "W" => -lon,
        _ => return None,
    };
    (lat.is_finite() && lon.is_finite()).then_some(LatLon { lat, lon })
}

/// Golden angle in radians, `π(3 − √5)`
pub const GOLDEN_ANGLE: f64 = PI * (3.0 - 2.236_067_977_499_79);

/// Deterministic spiral jitter for coincident points
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct JitterLayout {
    /// Decimal places used to decide that two points share a site
    pub precision: u32,
    /// Spiral step in degrees
    pub base_radius: f64,
}

impl Default for JitterLayout {
    fn default() -> Self {
        Self {
            precision: 2,
            base_radius: 0.35,
        }
    }
}

impl JitterLayout {
    fn site_key(&self, loc: &LatLon) -> (i64, i64) {
        let scale = 10f64.powi(self.precision as i32);
        ((loc.lat * scale).round() as i64, (loc.lon * scale).round() as i64)
    }

    /// Offset for the `count`-th repeat at a site (`count` starts at 1 for the second point)
    pub fn offset(&self, count: usize) -> (f64, f64) {
        if count == 0 {
            return (0.0, 0.0);
        }
        let angle = count as f64 * GOLDEN_ANGLE;
        let radius = self.base_radius * (count as f64).sqrt();
        (radius * angle.sin(), radius * angle.cos())
    }

    /// Place every point. The first point at a site keeps its location; later ones
    /// spiral outward in input order, so the same input always yields the same layout.
    pub fn apply(&self, points: &[LatLon]) -> Vec<LatLon> {
        let mut seen: HashMap<(i64, i64), usize> = HashMap::new();
        points
            .iter()
            .map(|loc| {
                let count = seen.entry(self.site_key(loc)).or_insert(0);
                let (dlat, dlon) = self.offset(*count);
                *count += 1;
                LatLon {
                    lat: (loc.lat + dlat).clamp(-90.0, 90.0),
                    lon: (loc.lon + dlon).clamp(-180.0, 180.0),
                }
            })
            .collect()
    }
}
