//! Accession matching against the reference cache
//!
//! Similarity hits carry accessions but no coordinates. Lookup order, first hit wins:
//! 1. normalized accession index (trimmed, case-insensitive, with and without `.N` version)
//! 2. record id
//! 3. substring containment in either direction (linear scan)
//!
//! Nothing is returned when all three miss; callers treat that as "coordinate unavailable".

use std::collections::HashMap;

use crate::cache::ReferenceSnapshot;
use crate::types::CoordinateRecord;

/// Shortest string allowed to take part in a containment match
pub const MIN_SUBSTRING_LEN: usize = 6;

/// Trimmed, lowercased accession
pub fn normalize_accession(accession: &str) -> String {
    accession.trim().to_lowercase()
}

/// `"cp012345.1"` → `"cp012345"`; anything without a numeric version suffix is returned as is
pub fn strip_version(accession: &str) -> &str {
    match accession.rsplit_once('.') {
        Some((base, version))
            if !base.is_empty() && !version.is_empty() && version.chars().all(|c| c.is_ascii_digit()) =>
        {
            base
        }
        _ => accession,
    }
}

/// Which strategy produced a match
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchStrategy {
    Accession,
    Id,
    Substring,
}

/// Lookup tables built once per loaded snapshot
#[derive(Debug, Clone, Default)]
pub struct AccessionIndex {
    by_accession: HashMap<String, usize>,
    by_id: HashMap<String, usize>,
}

impl AccessionIndex {
    /// Exact accessions are indexed before any version-stripped alias, so an alias
    /// never shadows another record's own accession
    pub fn build(records: &[CoordinateRecord]) -> Self {
        let mut index = Self::default();
        let normalized: Vec<Vec<String>> = records
            .iter()
            .map(|record| {
                record
                    .accessions
                    .iter()
                    .map(|a| normalize_accession(a))
                    .filter(|a| !a.is_empty())
                    .collect()
            })
            .collect();

        for (pos, (record, accessions)) in records.iter().zip(&normalized).enumerate() {
            for accession in accessions {
                index.by_accession.entry(accession.clone()).or_insert(pos);
            }
            let id = normalize_accession(&record.id);
            if !id.is_empty() {
                index.by_id.entry(id).or_insert(pos);
            }
        }
        for (pos, accessions) in normalized.iter().enumerate() {
            for accession in accessions {
                let unversioned = strip_version(accession);
                if unversioned.len() != accession.len() {
                    index.by_accession.entry(unversioned.to_string()).or_insert(pos);
                }
            }
        }
        index
    }

    /// Number of distinct accession variants indexed
    pub fn accession_variants(&self) -> usize {
        self.by_accession.len()
    }

    fn accession(&self, normalized: &str) -> Option<usize> {
        self.by_accession
            .get(normalized)
            .or_else(|| self.by_accession.get(strip_version(normalized)))
            .copied()
    }

    fn id(&self, normalized: &str) -> Option<usize> {
        self.by_id.get(normalized).copied()
    }
}

/// A resolved lookup
#[derive(Debug, Clone, Copy)]
pub struct SequenceMatch<'a> {
    pub record: &'a CoordinateRecord,
    pub strategy: MatchStrategy,
}

/// Resolve one accession or id against a loaded snapshot
pub fn find_match<'a>(query: &str, snapshot: &'a ReferenceSnapshot) -> Option<SequenceMatch<'a>> {
    let q = normalize_accession(query);
    if q.is_empty() {
        return None;
    }
    let records = snapshot.records();
    let index = snapshot.index();

    if let Some(pos) = index.accession(&q) {
        return Some(SequenceMatch { record: &records[pos], strategy: MatchStrategy::Accession });
    }
    if let Some(pos) = index.id(&q) {
        return Some(SequenceMatch { record: &records[pos], strategy: MatchStrategy::Id });
    }
    if q.len() < MIN_SUBSTRING_LEN {
        return None;
    }

    records
        .iter()
        .find(|record| {
            record.accessions.iter().any(|accession| {
                let a = normalize_accession(accession);
                a.len() >= MIN_SUBSTRING_LEN && (a.contains(&q) || q.contains(&a))
            })
        })
        .map(|record| {
            log::debug!("Substring match {} -> {}", query, record.primary_accession());
            SequenceMatch { record, strategy: MatchStrategy::Substring }
        })
}

/// Convenience wrapper returning only the record
pub fn find_record<'a>(query: &str, snapshot: &'a ReferenceSnapshot) -> Option<&'a CoordinateRecord> {
    find_match(query, snapshot).map(|m| m.record)
}

/// Resolve many queries, preserving input order
pub fn find_all<'q, 'a>(
    queries: &[&'q str],
    snapshot: &'a ReferenceSnapshot,
) -> Vec<(&'q str, Option<&'a CoordinateRecord>)> {
    queries
        .iter()
        .map(|&query| (query, find_record(query, snapshot)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::SequenceMetadata;

    fn record(id: &str, accessions: &[&str], x: f64) -> CoordinateRecord {
        CoordinateRecord {
            id: id.to_string(),
            accessions: accessions.iter().map(|a| a.to_string()).collect(),
            x,
            y: -x,
            metadata: SequenceMetadata::default(),
        }
    }

    fn snapshot() -> ReferenceSnapshot {
        ReferenceSnapshot::new(vec![
            record("ref-1", &["NZ_QTIX00000000"], 1.0),
            record("ref-2", &["CP012345.2"], 2.0),
            record("GCF_000001405", &["NC_045512"], 3.0),
            record("ref-4", &["MN908947.3", "LR991698"], 4.0),
        ])
    }

    #[test]
    fn strip_version_only_removes_numeric_suffix() {
        assert_eq!(strip_version("cp012345.2"), "cp012345");
        assert_eq!(strip_version("cp012345"), "cp012345");
        assert_eq!(strip_version("gca.abc"), "gca.abc");
        assert_eq!(strip_version(".1"), ".1");
    }

    #[test]
    fn every_cached_accession_resolves_to_its_record() {
        let snap = snapshot();
        for record in snap.records() {
            for accession in &record.accessions {
                let found = find_match(accession, &snap).expect("accession should match");
                assert_eq!(found.record, record);
                assert_eq!(found.strategy, MatchStrategy::Accession);
            }
        }
    }

    #[test]
    fn versionless_alias_never_shadows_an_exact_accession() {
        // the versioned record comes first so its alias would claim "mn908947"
        let snap = ReferenceSnapshot::new(vec![
            record("versioned", &["MN908947.3"], 1.0),
            record("bare", &["MN908947"], 2.0),
        ]);
        for record in snap.records() {
            let accession = record.primary_accession();
            let found = find_match(accession, &snap).expect("accession should match");
            assert_eq!(found.record.id, record.id, "{} resolved to the wrong record", accession);
            assert_eq!(found.strategy, MatchStrategy::Accession);
            assert_eq!(find_record(accession, &snap).map(|r| r.id.as_str()), Some(record.id.as_str()));
        }
        // a different version still falls back to the bare record
        assert_eq!(find_record("MN908947.2", &snap).unwrap().id, "bare");
    }

    #[test]
    fn accession_lookup_is_case_and_whitespace_insensitive() {
        let snap = snapshot();
        assert_eq!(find_record("  nz_qtix00000000 ", &snap).unwrap().id, "ref-1");
        // version-less query hits versioned accession and vice versa
        assert_eq!(find_record("CP012345", &snap).unwrap().id, "ref-2");
        assert_eq!(find_record("CP012345.1", &snap).unwrap().id, "ref-2");
    }

    #[test]
    fn falls_back_to_record_id() {
        let snap = snapshot();
        let m = find_match("gcf_000001405", &snap).unwrap();
        assert_eq!(m.strategy, MatchStrategy::Id);
        assert_eq!(m.record.x, 3.0);
    }

    #[test]
    fn substring_matches_partial_accessions() {
        let snap = snapshot();
        let m = find_match("LR991698_contig_7", &snap).unwrap();
        assert_eq!(m.strategy, MatchStrategy::Substring);
        assert_eq!(m.record.id, "ref-4");
    }

    #[test]
    fn absent_accessions_never_match() {
        let snap = snapshot();
        assert!(find_match("ZZ999999", &snap).is_none());
        assert!(find_match("", &snap).is_none());
        // too short to take part in containment
        assert!(find_match("NC_04", &snap).is_none());
    }

    #[test]
    fn find_all_preserves_query_order() {
        let snap = snapshot();
        let out = find_all(&["MN908947.3", "missing-acc", "ref-1"], &snap);
        assert_eq!(out.len(), 3);
        assert_eq!(out[0].1.unwrap().id, "ref-4");
        assert!(out[1].1.is_none());
        assert_eq!(out[2].1.unwrap().id, "ref-1");
    }
}
