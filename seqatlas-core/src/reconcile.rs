//! Similarity-to-coordinate reconciliation
//!
//! Turns one user projection plus the ranked similarity hits into the three
//! render subsets (contextual scatter, per-country aggregates, per-point geo).
//! Hits are joined to reference coordinates by accession; a hit with no
//! reference record is listed in `unmatched` and never plotted.

use std::collections::{HashMap, HashSet};

use serde::Serialize;

use crate::cache::{CacheError, ReferenceCache, ReferenceSnapshot, ReferenceSource};
use crate::country::CountryTable;
use crate::geo::first_location;
use crate::matcher::find_record;
use crate::types::{
    CountryAggregate, CoordinateRecord, GeoPoint, ReconciledPoint, SequenceMetadata,
    SimilarSequenceResult, UnmatchedSequence, UserSequencePoint,
};

/// Number of ranked hits considered
pub const DEFAULT_CANDIDATE_POOL: usize = 100;
/// Number of matched hits flagged as top
pub const DEFAULT_TOP_K: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconcileOptions {
    pub candidate_pool: usize,
    pub top_k: usize,
}

impl Default for ReconcileOptions {
    fn default() -> Self {
        Self {
            candidate_pool: DEFAULT_CANDIDATE_POOL,
            top_k: DEFAULT_TOP_K,
        }
    }
}

/// The three render subsets plus the detail-only list
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Reconciliation {
    /// User point first, then matched hits in rank order
    pub contextual_scatter: Vec<ReconciledPoint>,
    pub country_map_subset: Vec<CountryAggregate>,
    pub geo_subset: Vec<GeoPoint>,
    pub unmatched: Vec<UnmatchedSequence>,
    /// Later hits repeating an earlier point id; listed, never plotted
    pub duplicates: Vec<UnmatchedSequence>,
}

impl Reconciliation {
    /// True when nothing can be plotted
    pub fn is_empty(&self) -> bool {
        self.contextual_scatter.is_empty() && self.country_map_subset.is_empty() && self.geo_subset.is_empty()
    }

    pub fn matched_count(&self) -> usize {
        self.geo_subset.len()
    }

    pub fn user_point(&self) -> Option<&ReconciledPoint> {
        self.contextual_scatter.iter().find(|p| p.is_user_sequence)
    }

    /// `(min, max)` over every collection year the geo subset carries, listed years included
    pub fn year_span(&self) -> Option<(i32, i32)> {
        let years = self.geo_subset.iter().flat_map(|p| {
            p.year
                .into_iter()
                .chain(p.metadata.first_year)
                .chain(p.metadata.years.iter().copied())
        });
        years.fold(None, |acc, y| match acc {
            None => Some((y, y)),
            Some((lo, hi)) => Some((lo.min(y), hi.max(y))),
        })
    }
}

struct Matched<'a> {
    rank: usize,
    hit: &'a SimilarSequenceResult,
    record: &'a CoordinateRecord,
    metadata: SequenceMetadata,
    is_top10: bool,
}

pub struct Reconciler {
    options: ReconcileOptions,
    countries: CountryTable,
}

impl Default for Reconciler {
    fn default() -> Self {
        Self::new(ReconcileOptions::default(), CountryTable::builtin())
    }
}

impl Reconciler {
    pub fn new(options: ReconcileOptions, countries: CountryTable) -> Self {
        Self { options, countries }
    }

    pub fn options(&self) -> ReconcileOptions {
        self.options
    }

    pub fn countries(&self) -> &CountryTable {
        &self.countries
    }

    /// Load the cache if needed, then reconcile
    pub async fn reconcile_with_cache<S: ReferenceSource>(
        &self,
        user: &UserSequencePoint,
        ranked: &[SimilarSequenceResult],
        cache: &ReferenceCache<S>,
    ) -> Result<Reconciliation, CacheError> {
        let snapshot = cache.ensure_loaded().await?;
        Ok(self.reconcile(user, ranked, &snapshot))
    }

    /// Deterministic: same inputs, same output. Ranking is taken as given.
    pub fn reconcile(
        &self,
        user: &UserSequencePoint,
        ranked: &[SimilarSequenceResult],
        snapshot: &ReferenceSnapshot,
    ) -> Reconciliation {
        let mut matched: Vec<Matched> = Vec::new();
        let mut unmatched = Vec::new();
        let mut duplicates = Vec::new();
        let mut seen_ids: HashSet<String> = HashSet::new();

        for (idx, hit) in ranked.iter().take(self.options.candidate_pool).enumerate() {
            let rank = idx + 1;
            let point_id = hit.point_id();
            if !seen_ids.insert(point_id.clone()) {
                log::warn!("Duplicate hit {} at rank {}, keeping the earlier one", point_id, rank);
                duplicates.push(UnmatchedSequence {
                    rank,
                    id: point_id,
                    accession: hit.accession.clone(),
                    similarity: hit.similarity,
                    metadata: hit.metadata.clone(),
                });
                continue;
            }
            match find_record(hit.lookup_key(), snapshot) {
                Some(record) => {
                    let is_top10 = matched.len() < self.options.top_k;
                    matched.push(Matched {
                        rank,
                        hit,
                        record,
                        metadata: hit.metadata.merged_with(&record.metadata),
                        is_top10,
                    });
                }
                None => {
                    log::debug!("No reference coordinate for {} (rank {})", hit.lookup_key(), rank);
                    unmatched.push(UnmatchedSequence {
                        rank,
                        id: point_id,
                        accession: hit.accession.clone(),
                        similarity: hit.similarity,
                        metadata: hit.metadata.clone(),
                    });
                }
            }
        }

        log::info!(
            "Reconciled {} of {} candidates ({} without coordinates, {} duplicates)",
            matched.len(),
            ranked.len().min(self.options.candidate_pool),
            unmatched.len(),
            duplicates.len()
        );

        if matched.is_empty() {
            log::warn!("No similar sequence could be placed; all views will be empty");
            return Reconciliation {
                unmatched,
                duplicates,
                ..Default::default()
            };
        }

        Reconciliation {
            contextual_scatter: self.scatter_subset(user, &matched),
            country_map_subset: self.country_subset(&matched),
            geo_subset: self.geo_subset(&matched),
            unmatched,
            duplicates,
        }
    }

    fn scatter_subset(&self, user: &UserSequencePoint, matched: &[Matched]) -> Vec<ReconciledPoint> {
        let mut points = Vec::with_capacity(matched.len() + 1);
        points.push(ReconciledPoint {
            id: user.id.clone(),
            accession: user.label.clone(),
            rank: 0,
            x: user.x,
            y: user.y,
            similarity: 1.0,
            is_top10: false,
            is_user_sequence: true,
            metadata: SequenceMetadata::default(),
        });
        points.extend(matched.iter().map(|m| ReconciledPoint {
            id: m.hit.point_id(),
            accession: m.hit.lookup_key().trim().to_string(),
            rank: m.rank,
            x: m.record.x,
            y: m.record.y,
            similarity: m.hit.similarity,
            is_top10: m.is_top10,
            is_user_sequence: false,
            metadata: m.metadata.clone(),
        }));
        points
    }

    fn country_subset(&self, matched: &[Matched]) -> Vec<CountryAggregate> {
        struct Acc {
            aggregate: CountryAggregate,
            similarity_sum: f64,
        }

        let mut order: Vec<String> = Vec::new();
        let mut groups: HashMap<String, Acc> = HashMap::new();

        for m in matched {
            let raw = m.metadata.country_name().unwrap_or("");
            let country = self.countries.standardize(raw);
            let acc = groups.entry(country.clone()).or_insert_with(|| {
                order.push(country.clone());
                Acc {
                    aggregate: CountryAggregate {
                        country: country.clone(),
                        count: 0,
                        avg_similarity: 0.0,
                        lat_lon: None,
                        isolation_sources: Vec::new(),
                        member_ids: Vec::new(),
                        top10_count: 0,
                    },
                    similarity_sum: 0.0,
                }
            });

            acc.aggregate.count += 1;
            acc.similarity_sum += m.hit.similarity;
            acc.aggregate.member_ids.push(m.hit.point_id());
            if m.is_top10 {
                acc.aggregate.top10_count += 1;
            }
            if acc.aggregate.lat_lon.is_none() {
                acc.aggregate.lat_lon = first_location(&m.metadata.lat_lon);
            }
            if let Some(source) = m.metadata.isolation_source.as_deref() {
                if !acc.aggregate.isolation_sources.iter().any(|s| s == source) {
                    acc.aggregate.isolation_sources.push(source.to_string());
                }
            }
        }

        order
            .into_iter()
            .filter_map(|country| groups.remove(&country))
            .map(|mut acc| {
                acc.aggregate.avg_similarity = acc.similarity_sum / acc.aggregate.count as f64;
                acc.aggregate
            })
            .collect()
    }

    fn geo_subset(&self, matched: &[Matched]) -> Vec<GeoPoint> {
        matched
            .iter()
            .map(|m| {
                let location = first_location(&m.metadata.lat_lon);
                if location.is_none() && !m.metadata.lat_lon.is_empty() {
                    log::warn!(
                        "Unparseable lat_lon {:?} for {}; omitted from the geo map",
                        m.metadata.lat_lon,
                        m.hit.point_id()
                    );
                }
                GeoPoint {
                    id: m.hit.point_id(),
                    accession: m.hit.lookup_key().trim().to_string(),
                    rank: m.rank,
                    similarity: m.hit.similarity,
                    is_top10: m.is_top10,
                    location,
                    year: m.metadata.year(),
                    metadata: m.metadata.clone(),
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{LatLon, UserProjection};

    fn user() -> UserSequencePoint {
        UserSequencePoint::from_projection("job-1", UserProjection { x: 0.0, y: 0.0 }, "query.fa")
    }

    fn reference(n: usize) -> ReferenceSnapshot {
        ReferenceSnapshot::new(
            (0..n)
                .map(|i| CoordinateRecord {
                    id: format!("ref-{}", i),
                    accessions: vec![format!("ACC{:06}", i)],
                    x: i as f64,
                    y: -(i as f64),
                    metadata: SequenceMetadata::default(),
                })
                .collect(),
        )
    }

    fn hit(accession: &str, similarity: f64, country: &str, lat_lon: &str) -> SimilarSequenceResult {
        SimilarSequenceResult {
            id: String::new(),
            accession: accession.to_string(),
            similarity,
            metadata: SequenceMetadata {
                country: Some(country.to_string()),
                lat_lon: vec![lat_lon.to_string()],
                first_year: Some(2020),
                ..Default::default()
            },
        }
    }

    #[test]
    fn top10_are_the_first_ten_matched_in_rank_order() {
        let snap = reference(30);
        let hits: Vec<_> = (0..25)
            .map(|i| hit(&format!("ACC{:06}", i), 1.0 - i as f64 / 100.0, "Kenya", "0,37"))
            .collect();
        let out = Reconciler::default().reconcile(&user(), &hits, &snap);

        let top: Vec<_> = out.contextual_scatter.iter().filter(|p| p.is_top10).collect();
        assert_eq!(top.len(), 10);
        assert_eq!(top.iter().map(|p| p.rank).collect::<Vec<_>>(), (1..=10).collect::<Vec<_>>());
        assert_eq!(out.contextual_scatter.len(), 26);
        assert!(out.contextual_scatter[0].is_user_sequence);
    }

    #[test]
    fn unmatched_hits_do_not_consume_top_slots() {
        let snap = reference(20);
        let mut hits = vec![hit("NOT_IN_CACHE_1", 0.99, "Kenya", "0,37")];
        hits.extend((0..12).map(|i| hit(&format!("ACC{:06}", i), 0.9, "Kenya", "0,37")));
        let out = Reconciler::default().reconcile(&user(), &hits, &snap);

        assert_eq!(out.unmatched.len(), 1);
        assert_eq!(out.unmatched[0].rank, 1);
        let top: Vec<_> = out.geo_subset.iter().filter(|p| p.is_top10).map(|p| p.rank).collect();
        assert_eq!(top, (2..=11).collect::<Vec<_>>());
        assert!(out.contextual_scatter.iter().all(|p| p.id != "NOT_IN_CACHE_1"));
    }

    #[test]
    fn candidate_pool_caps_the_input() {
        let snap = reference(150);
        let hits: Vec<_> = (0..150)
            .map(|i| hit(&format!("ACC{:06}", i), 0.5, "Peru", "-9,-75"))
            .collect();
        let out = Reconciler::default().reconcile(&user(), &hits, &snap);
        assert_eq!(out.geo_subset.len(), DEFAULT_CANDIDATE_POOL);
    }

    #[test]
    fn no_matches_yields_empty_subsets() {
        let snap = reference(3);
        let hits = vec![hit("XYZ999999", 0.9, "Peru", "-9,-75")];
        let out = Reconciler::default().reconcile(&user(), &hits, &snap);
        assert!(out.is_empty());
        assert!(out.contextual_scatter.is_empty());
        assert_eq!(out.unmatched.len(), 1);
    }

    #[test]
    fn country_counts_sum_to_geo_subset() {
        let snap = reference(10);
        let countries = ["USA", "usa: Ohio", "United States", "Kenya", "", "Peru"];
        let hits: Vec<_> = countries
            .iter()
            .enumerate()
            .map(|(i, c)| hit(&format!("ACC{:06}", i), 0.8, c, "bad-location"))
            .collect();
        let out = Reconciler::default().reconcile(&user(), &hits, &snap);

        let total: usize = out.country_map_subset.iter().map(|c| c.count).sum();
        assert_eq!(total, out.geo_subset.len());
        assert_eq!(out.country_map_subset[0].country, "United States");
        assert_eq!(out.country_map_subset[0].count, 3);
        assert!(out.country_map_subset.iter().any(|c| c.country == "Unknown"));
        // unparseable locations stay in the subset, without a location
        assert!(out.geo_subset.iter().all(|p| p.location.is_none()));
    }

    #[test]
    fn country_aggregate_tracks_average_and_sources() {
        let snap = reference(5);
        let mut hits: Vec<_> = (0..5)
            .map(|i| hit(&format!("ACC{:06}", i), 0.5 + i as f64 * 0.1, "Brazil", "-14,-51"))
            .collect();
        for (i, h) in hits.iter_mut().enumerate() {
            h.metadata.isolation_source = Some(format!("source-{}", i % 4));
        }
        let out = Reconciler::default().reconcile(&user(), &hits, &snap);

        let brazil = &out.country_map_subset[0];
        assert_eq!(brazil.count, 5);
        assert!((brazil.avg_similarity - 0.7).abs() < 1e-9);
        assert_eq!(brazil.isolation_sources.len(), 4);
        assert_eq!(brazil.lat_lon, Some(LatLon::new(-14.0, -51.0)));
        assert_eq!(brazil.top10_count, 5);
    }

    #[test]
    fn metadata_gaps_are_filled_from_the_reference_record() {
        let mut records = vec![CoordinateRecord {
            id: "r".into(),
            accessions: vec!["ACC000000".into()],
            x: 1.0,
            y: 2.0,
            metadata: SequenceMetadata {
                host: Some("Gallus gallus".into()),
                lat_lon: vec!["10,10".into()],
                ..Default::default()
            },
        }];
        records[0].metadata.years = vec![2011];
        let snap = ReferenceSnapshot::new(records);
        let h = SimilarSequenceResult {
            id: String::new(),
            accession: "ACC000000".into(),
            similarity: 0.7,
            metadata: SequenceMetadata::default(),
        };
        let out = Reconciler::default().reconcile(&user(), &[h], &snap);
        let geo = &out.geo_subset[0];
        assert_eq!(geo.location, Some(LatLon::new(10.0, 10.0)));
        assert_eq!(geo.year, Some(2011));
        assert_eq!(geo.metadata.host.as_deref(), Some("Gallus gallus"));
        assert_eq!(out.year_span(), Some((2011, 2011)));
    }

    #[test]
    fn duplicate_hits_are_collapsed() {
        let snap = reference(3);
        let hits = vec![
            hit("ACC000001", 0.9, "Peru", "-9,-75"),
            hit("ACC000001", 0.8, "Peru", "-9,-75"),
        ];
        let out = Reconciler::default().reconcile(&user(), &hits, &snap);
        assert_eq!(out.geo_subset.len(), 1);
        assert!((out.geo_subset[0].similarity - 0.9).abs() < 1e-12);
        // the repeat keeps its rank in the detail list
        assert!(out.unmatched.is_empty());
        assert_eq!(out.duplicates.len(), 1);
        assert_eq!(out.duplicates[0].rank, 2);
        assert_eq!(out.duplicates[0].id, out.geo_subset[0].id);
    }

    #[test]
    fn year_span_covers_every_listed_year() {
        let snap = reference(3);
        let mut early = hit("ACC000000", 0.9, "Peru", "-9,-75");
        early.metadata.first_year = Some(2014);
        early.metadata.years = vec![2014, 2022];
        let mut listed = hit("ACC000001", 0.8, "Peru", "-9,-75");
        listed.metadata.first_year = None;
        listed.metadata.years = vec![2010, 2017];
        let out = Reconciler::default().reconcile(&user(), &[early, listed], &snap);

        assert_eq!(out.geo_subset[0].year, Some(2014));
        assert_eq!(out.year_span(), Some((2010, 2022)));
    }
}
