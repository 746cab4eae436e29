//! SeqAtlas Core Library
//!
//! Reference coordinate cache, accession matching, country and location
//! normalization, and the reconciler that turns similarity hits into the
//! data behind the scatter, country map and geo map views.

pub mod types;
pub mod io;
pub mod cache;
pub mod matcher;
pub mod country;
pub mod geo;
pub mod reconcile;
pub mod api;

// Re-export commonly used types and functions
pub use types::{
    CoordinateRecord, CountryAggregate, GeoPoint, LatLon, PointId, ReconciledPoint, SequenceMetadata,
    SimilarSequenceResult, UnmatchedSequence, UserProjection, UserSequencePoint,
};
pub use cache::{CacheError, FileReferenceSource, ReferenceCache, ReferenceSnapshot, ReferenceSource};
pub use matcher::{find_match, find_record, MatchStrategy};
pub use country::{CountryTable, UNKNOWN_COUNTRY};
pub use geo::{parse_lat_lon, GeoError, JitterLayout};
pub use reconcile::{ReconcileOptions, Reconciler, Reconciliation};
pub use api::{ApiClient, ApiEndpoints, ApiError, HttpReferenceSource, JobPoller, JobStatus};

/// Version information for the SeqAtlas core library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
