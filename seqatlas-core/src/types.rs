use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Identifier shared by a point across every view (scatter, country map, geo map).
pub type PointId = String;

/// Free-text sample metadata attached to reference sequences and similarity hits.
///
/// Upstream metadata is inconsistent: years arrive as numbers or strings,
/// `lat_lon` as a single string or a list, and INSDC placeholders such as
/// `"missing"` stand in for absent values. Deserialization normalizes all of that.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SequenceMetadata {
    #[serde(deserialize_with = "lenient::opt_string")]
    pub country: Option<String>,
    #[serde(deserialize_with = "lenient::opt_string")]
    pub first_country: Option<String>,
    #[serde(deserialize_with = "lenient::opt_year")]
    pub first_year: Option<i32>,
    #[serde(deserialize_with = "lenient::years")]
    pub years: Vec<i32>,
    #[serde(deserialize_with = "lenient::opt_string")]
    pub host: Option<String>,
    #[serde(deserialize_with = "lenient::opt_string")]
    pub organism: Option<String>,
    #[serde(deserialize_with = "lenient::opt_string")]
    pub lineage: Option<String>,
    #[serde(deserialize_with = "lenient::opt_string")]
    pub isolation_source: Option<String>,
    #[serde(deserialize_with = "lenient::string_list")]
    pub lat_lon: Vec<String>,
}

impl SequenceMetadata {
    /// Country as recorded, falling back to the first country of collection.
    pub fn country_name(&self) -> Option<&str> {
        self.country
            .as_deref()
            .or(self.first_country.as_deref())
    }

    /// Collection year: `first_year` when present, else the earliest listed year.
    pub fn year(&self) -> Option<i32> {
        self.first_year.or_else(|| self.years.iter().copied().min())
    }

    /// True when the sample was collected in `year`.
    pub fn matches_year(&self, year: i32) -> bool {
        self.first_year == Some(year) || self.years.contains(&year)
    }

    /// Field-wise merge: values present on `self` win, gaps are filled from `fallback`.
    pub fn merged_with(&self, fallback: &SequenceMetadata) -> SequenceMetadata {
        fn pick(a: &Option<String>, b: &Option<String>) -> Option<String> {
            a.clone().or_else(|| b.clone())
        }
        SequenceMetadata {
            country: pick(&self.country, &fallback.country),
            first_country: pick(&self.first_country, &fallback.first_country),
            first_year: self.first_year.or(fallback.first_year),
            years: if self.years.is_empty() { fallback.years.clone() } else { self.years.clone() },
            host: pick(&self.host, &fallback.host),
            organism: pick(&self.organism, &fallback.organism),
            lineage: pick(&self.lineage, &fallback.lineage),
            isolation_source: pick(&self.isolation_source, &fallback.isolation_source),
            lat_lon: if self.lat_lon.is_empty() { fallback.lat_lon.clone() } else { self.lat_lon.clone() },
        }
    }
}

/// One reference sequence with its precomputed 2D embedding coordinate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoordinateRecord {
    pub id: String,
    pub accessions: Vec<String>,
    pub x: f64,
    pub y: f64,
    #[serde(default)]
    pub metadata: SequenceMetadata,
}

impl CoordinateRecord {
    pub fn primary_accession(&self) -> &str {
        self.accessions.first().map(String::as_str).unwrap_or(&self.id)
    }
}

/// One hit returned by the remote similarity search. Carries no coordinate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimilarSequenceResult {
    #[serde(default, deserialize_with = "lenient::string")]
    pub id: String,
    #[serde(default, deserialize_with = "lenient::string")]
    pub accession: String,
    #[serde(default, alias = "score")]
    pub similarity: f64,
    #[serde(default)]
    pub metadata: SequenceMetadata,
}

impl SimilarSequenceResult {
    /// Key used to look the hit up in the reference cache.
    pub fn lookup_key(&self) -> &str {
        if self.accession.trim().is_empty() {
            &self.id
        } else {
            &self.accession
        }
    }

    /// Identifier the hit is known by in every view.
    pub fn point_id(&self) -> PointId {
        if self.id.trim().is_empty() {
            self.accession.trim().to_string()
        } else {
            self.id.trim().to_string()
        }
    }
}

/// Projected coordinate returned for an uploaded sequence.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct UserProjection {
    pub x: f64,
    pub y: f64,
}

/// The uploaded sequence's own point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserSequencePoint {
    pub id: PointId,
    pub x: f64,
    pub y: f64,
    pub label: String,
    pub uploaded_at: DateTime<Utc>,
}

impl UserSequencePoint {
    pub fn from_projection(job_id: &str, projection: UserProjection, label: impl Into<String>) -> Self {
        Self {
            id: format!("user:{}", job_id),
            x: projection.x,
            y: projection.y,
            label: label.into(),
            uploaded_at: Utc::now(),
        }
    }
}

/// Geographic coordinate in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LatLon {
    pub lat: f64,
    pub lon: f64,
}

impl LatLon {
    pub fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }
}

/// View-ready scatter point. Coordinates always come from a real reference record.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReconciledPoint {
    pub id: PointId,
    pub accession: String,
    /// 1-based rank in the similarity results; 0 for the user's sequence.
    pub rank: usize,
    pub x: f64,
    pub y: f64,
    pub similarity: f64,
    pub is_top10: bool,
    pub is_user_sequence: bool,
    pub metadata: SequenceMetadata,
}

/// A similarity hit with no reference coordinate. Listed, never plotted.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UnmatchedSequence {
    pub rank: usize,
    pub id: PointId,
    pub accession: String,
    pub similarity: f64,
    pub metadata: SequenceMetadata,
}

/// Matched hits grouped by standardized country.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CountryAggregate {
    pub country: String,
    pub count: usize,
    pub avg_similarity: f64,
    /// First parseable location encountered in the group.
    pub lat_lon: Option<LatLon>,
    pub isolation_sources: Vec<String>,
    pub member_ids: Vec<PointId>,
    pub top10_count: usize,
}

/// A matched hit placed individually on the geo map.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GeoPoint {
    pub id: PointId,
    pub accession: String,
    pub rank: usize,
    pub similarity: f64,
    pub is_top10: bool,
    /// `None` when no `lat_lon` string could be parsed.
    pub location: Option<LatLon>,
    pub year: Option<i32>,
    pub metadata: SequenceMetadata,
}

mod lenient {
    use serde::{Deserialize, Deserializer};
    use serde_json::Value;

    const PLACEHOLDERS: &[&str] = &[
        "missing",
        "not collected",
        "not applicable",
        "not provided",
        "unknown",
        "na",
        "n/a",
        "none",
        "null",
    ];

    fn clean(s: &str) -> Option<String> {
        let t = s.trim();
        if t.is_empty() || PLACEHOLDERS.contains(&t.to_ascii_lowercase().as_str()) {
            None
        } else {
            Some(t.to_string())
        }
    }

    fn value_to_string(v: &Value) -> Option<String> {
        match v {
            Value::String(s) => clean(s),
            Value::Number(n) => Some(n.to_string()),
            Value::Array(items) => items.iter().find_map(value_to_string),
            _ => None,
        }
    }

    pub(super) fn year_from_str(s: &str) -> Option<i32> {
        let digits: String = s.trim().chars().take_while(|c| c.is_ascii_digit()).collect();
        if digits.len() == 4 {
            digits.parse().ok()
        } else {
            None
        }
    }

    fn value_to_year(v: &Value) -> Option<i32> {
        match v {
            Value::Number(n) => n.as_i64().and_then(|y| i32::try_from(y).ok()),
            Value::String(s) => year_from_str(s),
            _ => None,
        }
    }

    pub fn string<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
        let v = Option::<Value>::deserialize(d)?;
        Ok(v.as_ref().and_then(value_to_string).unwrap_or_default())
    }

    pub fn opt_string<'de, D: Deserializer<'de>>(d: D) -> Result<Option<String>, D::Error> {
        let v = Option::<Value>::deserialize(d)?;
        Ok(v.as_ref().and_then(value_to_string))
    }

    pub fn opt_year<'de, D: Deserializer<'de>>(d: D) -> Result<Option<i32>, D::Error> {
        let v = Option::<Value>::deserialize(d)?;
        Ok(v.as_ref().and_then(value_to_year))
    }

    pub fn years<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<i32>, D::Error> {
        let v = Option::<Value>::deserialize(d)?;
        let mut out: Vec<i32> = match v {
            Some(Value::Array(items)) => items.iter().filter_map(value_to_year).collect(),
            Some(Value::String(s)) => s.split([',', ';']).filter_map(year_from_str).collect(),
            Some(other) => value_to_year(&other).into_iter().collect(),
            None => Vec::new(),
        };
        out.sort_unstable();
        out.dedup();
        Ok(out)
    }

    pub fn string_list<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<String>, D::Error> {
        let v = Option::<Value>::deserialize(d)?;
        Ok(match v {
            Some(Value::Array(items)) => items
                .iter()
                .filter_map(|item| match item {
                    Value::String(s) => clean(s),
                    _ => None,
                })
                .collect(),
            Some(Value::String(s)) => clean(&s).into_iter().collect(),
            _ => Vec::new(),
        })
    }
}
