//! File and wire format readers for SeqAtlas
//!
//! Converts the reference coordinate stream and similarity-search payloads
//! into the unified types in [`crate::types`].

pub mod ndjson;
pub mod similar;

pub use ndjson::{NdjsonError, NdjsonParser, ParseStats};
pub use similar::{parse_similar_results, read_similar_results, SimilarPayload};
