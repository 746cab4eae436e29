//! Reference coordinate stream parser
//!
//! The bulk reference endpoint streams one JSON object per line:
//! `{"id": ..., "accession": ... | "accessions": [...], "coordinates": [x, y], "metadata": {...}}`.
//! Some dumps carry `x`/`y` fields instead of `coordinates`, and a few deployments
//! serve the same records as a single JSON array; both forms are accepted.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

use crate::types::{CoordinateRecord, SequenceMetadata};

#[derive(Debug, Error)]
pub enum NdjsonError {
    #[error("line {line}: invalid JSON: {message}")]
    Json { line: usize, message: String },
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Counters collected while parsing a reference stream
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ParseStats {
    pub lines: usize,
    pub records: usize,
    pub skipped: usize,
}

#[derive(Debug, Deserialize)]
struct RawRecord {
    #[serde(default)]
    id: Option<Value>,
    #[serde(default, alias = "accessions")]
    accession: Option<Value>,
    #[serde(default, alias = "coords", alias = "umap")]
    coordinates: Option<Vec<Value>>,
    #[serde(default)]
    x: Option<Value>,
    #[serde(default)]
    y: Option<Value>,
    #[serde(default)]
    metadata: SequenceMetadata,
}

fn as_f64(v: &Value) -> Option<f64> {
    let f = match v {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }?;
    f.is_finite().then_some(f)
}

fn as_text(v: &Value) -> Option<String> {
    match v {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

impl RawRecord {
    fn into_record(self) -> Option<CoordinateRecord> {
        let (x, y) = match (&self.coordinates, &self.x, &self.y) {
            (Some(c), _, _) if c.len() >= 2 => (as_f64(&c[0])?, as_f64(&c[1])?),
            (_, Some(x), Some(y)) => (as_f64(x)?, as_f64(y)?),
            _ => return None,
        };

        let accessions: Vec<String> = match &self.accession {
            Some(Value::Array(items)) => items.iter().filter_map(as_text).collect(),
            Some(v) => as_text(v).into_iter().collect(),
            None => Vec::new(),
        };
        let id = self
            .id
            .as_ref()
            .and_then(as_text)
            .or_else(|| accessions.first().cloned())?;

        Some(CoordinateRecord {
            id,
            accessions,
            x,
            y,
            metadata: self.metadata,
        })
    }
}

/// Parser for the reference coordinate stream
pub struct NdjsonParser;

impl NdjsonParser {
    /// Parse one line. `Ok(None)` means the line was valid JSON but not a usable record.
    pub fn parse_line(line: &str, line_no: usize) -> Result<Option<CoordinateRecord>, NdjsonError> {
        let raw: RawRecord = serde_json::from_str(line).map_err(|e| NdjsonError::Json {
            line: line_no,
            message: e.to_string(),
        })?;
        Ok(raw.into_record())
    }

    /// Parse a complete stream held in memory
    pub fn parse_str(text: &str) -> Result<(Vec<CoordinateRecord>, ParseStats), NdjsonError> {
        if text.trim_start().starts_with('[') {
            return Self::parse_array(text);
        }
        Self::parse_reader(text.as_bytes())
    }

    /// Parse a stream line by line
    pub fn parse_reader<R: BufRead>(reader: R) -> Result<(Vec<CoordinateRecord>, ParseStats), NdjsonError> {
        let mut records = Vec::new();
        let mut stats = ParseStats::default();

        for (idx, line) in reader.lines().enumerate() {
            let line = line?;
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            stats.lines += 1;
            match Self::parse_line(trimmed, idx + 1)? {
                Some(record) => records.push(record),
                None => {
                    stats.skipped += 1;
                    log::warn!("Reference line {} has no usable id/coordinates, skipping", idx + 1);
                }
            }
        }

        stats.records = records.len();
        Ok((records, stats))
    }

    /// Parse a reference dump from disk
    pub fn parse_file<P: AsRef<Path>>(path: P) -> Result<(Vec<CoordinateRecord>, ParseStats), NdjsonError> {
        let file = File::open(&path)?;
        Self::parse_reader(BufReader::new(file))
    }

    fn parse_array(text: &str) -> Result<(Vec<CoordinateRecord>, ParseStats), NdjsonError> {
        let raw: Vec<RawRecord> = serde_json::from_str(text).map_err(|e| NdjsonError::Json {
            line: e.line(),
            message: e.to_string(),
        })?;
        let mut stats = ParseStats {
            lines: raw.len(),
            ..Default::default()
        };
        let records: Vec<CoordinateRecord> = raw.into_iter().filter_map(RawRecord::into_record).collect();
        stats.records = records.len();
        stats.skipped = stats.lines - stats.records;
        if stats.skipped > 0 {
            log::warn!("Skipped {} reference entries without usable id/coordinates", stats.skipped);
        }
        Ok((records, stats))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const STREAM: &str = r#"{"id": "r1", "accession": "NZ_QTIX00000000", "coordinates": [1.2, -3.4], "metadata": {"country": "South Africa"}}

{"id": "r2", "accessions": ["CP012345.1", "CP012345"], "x": "0.5", "y": 2}
{"id": "r3", "accession": "AB000001"}
{"accession": "MN908947.3", "coordinates": [7, 8]}
"#;

    #[test]
    fn parses_mixed_record_shapes() {
        let (records, stats) = NdjsonParser::parse_str(STREAM).unwrap();
        assert_eq!(stats, ParseStats { lines: 4, records: 3, skipped: 1 });

        assert_eq!(records[0].id, "r1");
        assert_eq!(records[0].accessions, vec!["NZ_QTIX00000000"]);
        assert_eq!((records[0].x, records[0].y), (1.2, -3.4));
        assert_eq!(records[0].metadata.country.as_deref(), Some("South Africa"));

        assert_eq!(records[1].accessions.len(), 2);
        assert_eq!((records[1].x, records[1].y), (0.5, 2.0));

        // id falls back to the first accession
        assert_eq!(records[2].id, "MN908947.3");
    }

    #[test]
    fn invalid_json_reports_line_number() {
        let text = "{\"id\": \"ok\", \"coordinates\": [0, 0]}\n{not json}\n";
        match NdjsonParser::parse_str(text) {
            Err(NdjsonError::Json { line, .. }) => assert_eq!(line, 2),
            other => panic!("expected JSON error, got {:?}", other),
        }
    }

    #[test]
    fn accepts_json_array_dumps() {
        let text = r#"[{"id": "a", "coordinates": [1, 2]}, {"id": "b"}]"#;
        let (records, stats) = NdjsonParser::parse_str(text).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(stats.skipped, 1);
    }

    #[test]
    fn parses_file_from_disk() {
        let mut f = NamedTempFile::new().unwrap();
        write!(f, "{}", STREAM).unwrap();
        let (records, _) = NdjsonParser::parse_file(f.path()).unwrap();
        assert_eq!(records.len(), 3);
    }
}
