//! The three coordinated views behind one entry point
//!
//! A [`Dashboard`] owns the views, the highlight coordinator and the geo map's
//! time-lapse. The reference cache is injected and shared; the dashboard only
//! awaits it, never reads its internals.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use seqatlas_core::{
    CacheError, Reconciler, Reconciliation, ReferenceCache, ReferenceSource, SimilarSequenceResult,
    UserSequencePoint,
};
use svg::Document;

use crate::geo_map::GeoMapOptions;
use crate::scene::UpdateOutcome;
use crate::timelapse::{TimeLapseController, TimeLapseError, DEFAULT_SPEED};
use crate::{
    Canvas, CountryMapView, GeoMapView, Highlight, HighlightCoordinator, RenderError, RenderStyle, ScatterView,
    View, ViewKind,
};

#[derive(Debug, Clone)]
pub struct DashboardOptions {
    pub canvas: Canvas,
    pub style: RenderStyle,
    pub geo: GeoMapOptions,
    /// Year range used until results provide one
    pub time_range: (i32, i32),
    pub speed: Duration,
}

impl Default for DashboardOptions {
    fn default() -> Self {
        Self {
            canvas: Canvas::default(),
            style: RenderStyle::default(),
            geo: GeoMapOptions::default(),
            time_range: (1950, 2025),
            speed: DEFAULT_SPEED,
        }
    }
}

macro_rules! with_view {
    ($self:ident, $kind:expr, $v:ident => $body:expr) => {
        match $kind {
            ViewKind::Scatter => {
                #[allow(unused_mut)]
                let mut $v = $self.scatter.lock();
                $body
            }
            ViewKind::CountryMap => {
                #[allow(unused_mut)]
                let mut $v = $self.country_map.lock();
                $body
            }
            ViewKind::GeoMap => {
                #[allow(unused_mut)]
                let mut $v = $self.geo_map.lock();
                $body
            }
        }
    };
}

pub struct Dashboard<S: ReferenceSource> {
    cache: Arc<ReferenceCache<S>>,
    reconciler: Reconciler,
    scatter: Arc<Mutex<ScatterView>>,
    country_map: Arc<Mutex<CountryMapView>>,
    geo_map: Arc<Mutex<GeoMapView>>,
    coordinator: HighlightCoordinator,
    timelapse: TimeLapseController<GeoMapView>,
    result: Option<Reconciliation>,
}

impl<S: ReferenceSource> Dashboard<S> {
    pub fn new(
        cache: Arc<ReferenceCache<S>>,
        reconciler: Reconciler,
        options: DashboardOptions,
    ) -> Result<Self, TimeLapseError> {
        let scatter = Arc::new(Mutex::new(ScatterView::new(options.canvas, options.style.clone())));
        let country_map = Arc::new(Mutex::new(CountryMapView::with_countries(
            options.canvas,
            options.style.clone(),
            reconciler.countries().clone(),
        )));
        let geo_map = Arc::new(Mutex::new(GeoMapView::new(
            options.canvas,
            options.style,
            options.geo,
        )));

        let coordinator = HighlightCoordinator::new();
        coordinator.register(ViewKind::Scatter, scatter.clone());
        coordinator.register(ViewKind::CountryMap, country_map.clone());
        coordinator.register(ViewKind::GeoMap, geo_map.clone());

        let (min, max) = options.time_range;
        let timelapse = TimeLapseController::new(Arc::clone(&geo_map), min, max)?;
        timelapse.set_speed(options.speed)?;

        Ok(Self {
            cache,
            reconciler,
            scatter,
            country_map,
            geo_map,
            coordinator,
            timelapse,
            result: None,
        })
    }

    pub fn cache(&self) -> &Arc<ReferenceCache<S>> {
        &self.cache
    }

    pub fn scatter(&self) -> &Arc<Mutex<ScatterView>> {
        &self.scatter
    }

    pub fn country_map(&self) -> &Arc<Mutex<CountryMapView>> {
        &self.country_map
    }

    pub fn geo_map(&self) -> &Arc<Mutex<GeoMapView>> {
        &self.geo_map
    }

    pub fn timelapse(&self) -> &TimeLapseController<GeoMapView> {
        &self.timelapse
    }

    pub fn coordinator(&self) -> &HighlightCoordinator {
        &self.coordinator
    }

    pub fn result(&self) -> Option<&Reconciliation> {
        self.result.as_ref()
    }

    /// Load the reference cache if needed, reconcile and redraw every view
    pub async fn show(
        &mut self,
        user: &UserSequencePoint,
        ranked: &[SimilarSequenceResult],
    ) -> Result<&Reconciliation, CacheError> {
        let result = self
            .reconciler
            .reconcile_with_cache(user, ranked, &self.cache)
            .await?;
        Ok(self.show_reconciled(user, result))
    }

    /// Redraw every view from an existing reconciliation
    pub fn show_reconciled(&mut self, user: &UserSequencePoint, result: Reconciliation) -> &Reconciliation {
        self.timelapse.reset_time();

        let scatter = self.scatter.lock().update(&result.contextual_scatter);
        let country = self.country_map.lock().update(&result.country_map_subset);
        let geo = self.geo_map.lock().update_data(user, &result.geo_subset);
        for (kind, outcome) in [
            (ViewKind::Scatter, &scatter),
            (ViewKind::CountryMap, &country),
            (ViewKind::GeoMap, &geo),
        ] {
            if let UpdateOutcome::Empty(reason) = outcome {
                log::warn!("{:?} view is empty: {}", kind, reason.message());
            }
        }

        if let Some((min, max)) = result.year_span() {
            if let Err(e) = self.timelapse.set_time_range(min, max) {
                log::warn!("Keeping previous time range: {}", e);
            }
        }
        log::info!(
            "Dashboard showing {} points, {} countries, {} unmatched",
            result.geo_subset.len(),
            result.country_map_subset.len(),
            result.unmatched.len()
        );
        self.result.insert(result)
    }

    /// Pointer entered a mark: highlight it and its counterparts elsewhere
    pub fn pointer_enter(&self, kind: ViewKind, id: &str) -> usize {
        self.set_highlight(kind, id, true)
    }

    pub fn pointer_leave(&self, kind: ViewKind, id: &str) -> usize {
        self.set_highlight(kind, id, false)
    }

    /// Country markers are keyed by name, so their member point ids go to the peers
    fn set_highlight(&self, kind: ViewKind, id: &str, on: bool) -> usize {
        with_view!(self, kind, v => v.highlight(id, on));
        match kind {
            ViewKind::CountryMap => {
                let members = self.country_map.lock().member_ids(id);
                members
                    .iter()
                    .map(|member| self.coordinator.emit(kind, member, on))
                    .sum()
            }
            _ => self.coordinator.emit(kind, id, on),
        }
    }

    pub fn click(&self, kind: ViewKind, id: &str) -> bool {
        with_view!(self, kind, v => v.click(id))
    }

    pub fn tooltip(&self, kind: ViewKind, id: &str) -> Option<String> {
        with_view!(self, kind, v => v.tooltip(id))
    }

    pub fn document(&self, kind: ViewKind) -> Result<Document, RenderError> {
        with_view!(self, kind, v => v.document())
    }

    pub fn resize(&self, kind: ViewKind, canvas: Canvas) -> UpdateOutcome {
        with_view!(self, kind, v => v.resize(canvas))
    }

    /// Stop the time-lapse, drop registrations and tear down every view
    pub fn destroy(&mut self) {
        self.timelapse.pause();
        self.coordinator.clear();
        self.scatter.lock().destroy();
        self.country_map.lock().destroy();
        self.geo_map.lock().destroy();
        self.result = None;
    }
}
