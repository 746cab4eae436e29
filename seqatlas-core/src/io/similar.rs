//! Similarity-search payloads
//!
//! The search endpoint has returned both a bare array of hits and an object
//! wrapping them (`results` or `similar_sequences`). Order is preserved as
//! received: it is the ranking.

use std::path::Path;

use anyhow::Context;
use serde::Deserialize;

use crate::types::SimilarSequenceResult;

#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum SimilarPayload {
    Bare(Vec<SimilarSequenceResult>),
    Wrapped {
        #[serde(alias = "similar_sequences", alias = "matches")]
        results: Vec<SimilarSequenceResult>,
    },
}

impl SimilarPayload {
    pub fn into_results(self) -> Vec<SimilarSequenceResult> {
        match self {
            SimilarPayload::Bare(results) | SimilarPayload::Wrapped { results } => results,
        }
    }
}

/// Parse a similarity payload, keeping the API's ranking order
pub fn parse_similar_results(text: &str) -> Result<Vec<SimilarSequenceResult>, serde_json::Error> {
    let payload: SimilarPayload = serde_json::from_str(text)?;
    Ok(payload.into_results())
}

/// Read a saved similarity payload from disk
pub fn read_similar_results<P: AsRef<Path>>(path: P) -> anyhow::Result<Vec<SimilarSequenceResult>> {
    let text = std::fs::read_to_string(&path)
        .with_context(|| format!("Failed to read similarity results: {}", path.as_ref().display()))?;
    parse_similar_results(&text)
        .with_context(|| format!("Failed to parse similarity results: {}", path.as_ref().display()))
}
