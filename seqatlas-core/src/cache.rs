//! Reference coordinate cache
//!
//! Holds the full reference dataset (tens of thousands of records) for the
//! session. The first caller of [`ReferenceCache::ensure_loaded`] starts the
//! bulk fetch; every caller that arrives while it is in flight awaits the same
//! shared future, so the bulk endpoint is hit at most once per successful load.
//! A failed load leaves the cache empty and the next call retries.
//!
//! Loaded data is published as an immutable [`ReferenceSnapshot`] behind an
//! `Arc`; it is replaced wholesale, never edited in place.

use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures::future::{BoxFuture, FutureExt, Shared};
use parking_lot::Mutex;
use thiserror::Error;

use crate::io::{NdjsonError, NdjsonParser, ParseStats};
use crate::matcher::AccessionIndex;
use crate::types::CoordinateRecord;

#[derive(Debug, Clone, Error)]
pub enum CacheError {
    #[error("reference fetch failed: {0}")]
    Fetch(String),
    #[error("reference stream line {line}: {message}")]
    Parse { line: usize, message: String },
}

impl From<NdjsonError> for CacheError {
    fn from(err: NdjsonError) -> Self {
        match err {
            NdjsonError::Json { line, message } => CacheError::Parse { line, message },
            NdjsonError::Io(e) => CacheError::Fetch(e.to_string()),
        }
    }
}

/// Where the bulk reference stream comes from
pub trait ReferenceSource: Send + Sync + 'static {
    /// Fetch the raw newline-delimited stream
    fn fetch(&self) -> impl Future<Output = Result<String, CacheError>> + Send;

    fn describe(&self) -> String;
}

/// Reference dump on local disk
#[derive(Debug, Clone)]
pub struct FileReferenceSource {
    path: PathBuf,
}

impl FileReferenceSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl ReferenceSource for FileReferenceSource {
    async fn fetch(&self) -> Result<String, CacheError> {
        tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|e| CacheError::Fetch(format!("{}: {}", self.path.display(), e)))
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}

/// Immutable loaded dataset plus its accession index
#[derive(Debug)]
pub struct ReferenceSnapshot {
    records: Vec<CoordinateRecord>,
    index: AccessionIndex,
    stats: ParseStats,
    loaded_at: DateTime<Utc>,
}

impl ReferenceSnapshot {
    pub fn new(records: Vec<CoordinateRecord>) -> Self {
        let stats = ParseStats {
            lines: records.len(),
            records: records.len(),
            skipped: 0,
        };
        Self::with_stats(records, stats)
    }

    pub fn with_stats(records: Vec<CoordinateRecord>, stats: ParseStats) -> Self {
        let index = AccessionIndex::build(&records);
        Self {
            records,
            index,
            stats,
            loaded_at: Utc::now(),
        }
    }

    pub fn records(&self) -> &[CoordinateRecord] {
        &self.records
    }

    pub fn index(&self) -> &AccessionIndex {
        &self.index
    }

    pub fn stats(&self) -> ParseStats {
        self.stats
    }

    pub fn loaded_at(&self) -> DateTime<Utc> {
        self.loaded_at
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Debug view of the cache contents
#[derive(Debug, Clone, serde::Serialize)]
pub struct CacheInspection {
    pub count: usize,
    pub accession_variants: usize,
    pub skipped: usize,
    pub loaded_at: DateTime<Utc>,
    pub sample: Vec<CoordinateRecord>,
}

type SharedLoad = Shared<BoxFuture<'static, Result<Arc<ReferenceSnapshot>, CacheError>>>;

enum LoadState {
    Empty,
    Loading(SharedLoad),
    Ready(Arc<ReferenceSnapshot>),
}

/// Session-wide reference cache with memoized, at-most-one-in-flight loading
pub struct ReferenceCache<S: ReferenceSource> {
    source: Arc<S>,
    state: Mutex<LoadState>,
}

impl<S: ReferenceSource> ReferenceCache<S> {
    pub fn new(source: S) -> Self {
        Self {
            source: Arc::new(source),
            state: Mutex::new(LoadState::Empty),
        }
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    /// Return the loaded snapshot, loading it first if needed.
    ///
    /// Concurrent callers share one in-flight load and receive the same `Arc`.
    pub async fn ensure_loaded(&self) -> Result<Arc<ReferenceSnapshot>, CacheError> {
        let pending = {
            let mut state = self.state.lock();
            match &*state {
                LoadState::Ready(snapshot) => return Ok(Arc::clone(snapshot)),
                LoadState::Loading(pending) => pending.clone(),
                LoadState::Empty => {
                    let pending = Self::start_load(Arc::clone(&self.source));
                    *state = LoadState::Loading(pending.clone());
                    pending
                }
            }
        };

        let outcome = pending.clone().await;

        let mut state = self.state.lock();
        if let LoadState::Loading(current) = &*state {
            if current.ptr_eq(&pending) {
                *state = match &outcome {
                    Ok(snapshot) => LoadState::Ready(Arc::clone(snapshot)),
                    Err(_) => LoadState::Empty,
                };
            }
        }
        outcome
    }

    fn start_load(source: Arc<S>) -> SharedLoad {
        async move {
            log::info!("Loading reference coordinates from {}", source.describe());
            let body = source.fetch().await.map_err(|e| {
                log::warn!("Reference fetch failed: {}", e);
                e
            })?;
            let (records, stats) = NdjsonParser::parse_str(&body).map_err(|e| {
                log::warn!("Reference stream rejected: {}", e);
                CacheError::from(e)
            })?;
            if records.is_empty() {
                log::warn!("Reference stream contained no usable records");
            }
            let snapshot = ReferenceSnapshot::with_stats(records, stats);
            log::info!(
                "Reference cache ready: {} records, {} accession variants indexed, {} skipped",
                snapshot.len(),
                snapshot.index().accession_variants(),
                stats.skipped
            );
            Ok::<_, CacheError>(Arc::new(snapshot))
        }
        .boxed()
        .shared()
    }

    /// Snapshot if already loaded; never triggers a fetch
    pub fn get(&self) -> Option<Arc<ReferenceSnapshot>> {
        match &*self.state.lock() {
            LoadState::Ready(snapshot) => Some(Arc::clone(snapshot)),
            _ => None,
        }
    }

    pub fn is_loading(&self) -> bool {
        matches!(&*self.state.lock(), LoadState::Loading(_))
    }

    /// Drop the loaded snapshot so the next `ensure_loaded` fetches again.
    /// An in-flight load is left to finish.
    pub fn invalidate(&self) {
        let mut state = self.state.lock();
        if let LoadState::Ready(_) = &*state {
            *state = LoadState::Empty;
        }
    }

    /// Count and leading records, for debugging
    pub fn inspect(&self, sample_size: usize) -> Option<CacheInspection> {
        self.get().map(|snapshot| CacheInspection {
            count: snapshot.len(),
            accession_variants: snapshot.index().accession_variants(),
            skipped: snapshot.stats().skipped,
            loaded_at: snapshot.loaded_at(),
            sample: snapshot.records().iter().take(sample_size).cloned().collect(),
        })
    }
}
