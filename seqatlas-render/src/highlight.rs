//! Cross-view highlight fan-out
//!
//! Views register under their [`ViewKind`]. When the user points at a mark in
//! one view, [`HighlightCoordinator::emit`] forwards `highlight(id, on)` to
//! every other registered view. The subscriber list is copied out before any
//! view is locked.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::{Highlight, ViewKind};

pub type SharedHighlight = Arc<Mutex<dyn Highlight>>;

#[derive(Default)]
pub struct HighlightCoordinator {
    subscribers: Mutex<Vec<(ViewKind, SharedHighlight)>>,
}

impl HighlightCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `view`, replacing any earlier view of the same kind
    pub fn register(&self, kind: ViewKind, view: SharedHighlight) {
        let mut subs = self.subscribers.lock();
        subs.retain(|(k, _)| *k != kind);
        subs.push((kind, view));
        log::debug!("Highlight coordinator: {:?} registered ({} views)", kind, subs.len());
    }

    pub fn unregister(&self, kind: ViewKind) -> bool {
        let mut subs = self.subscribers.lock();
        let before = subs.len();
        subs.retain(|(k, _)| *k != kind);
        subs.len() != before
    }

    pub fn registered(&self) -> Vec<ViewKind> {
        self.subscribers.lock().iter().map(|(k, _)| *k).collect()
    }

    /// Forward to every view except `source`; returns how many had a matching mark
    pub fn emit(&self, source: ViewKind, id: &str, on: bool) -> usize {
        let peers: Vec<SharedHighlight> = self
            .subscribers
            .lock()
            .iter()
            .filter(|(k, _)| *k != source)
            .map(|(_, v)| Arc::clone(v))
            .collect();
        peers.iter().filter(|view| view.lock().highlight(id, on)).count()
    }

    pub fn clear(&self) {
        self.subscribers.lock().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct RecordingView {
        ids: Vec<&'static str>,
        calls: Vec<(String, bool)>,
    }

    impl Highlight for RecordingView {
        fn highlight(&mut self, id: &str, on: bool) -> bool {
            self.calls.push((id.to_string(), on));
            self.ids.iter().any(|known| *known == id)
        }
    }

    fn recording(ids: Vec<&'static str>) -> Arc<Mutex<RecordingView>> {
        Arc::new(Mutex::new(RecordingView { ids, calls: Vec::new() }))
    }

    #[test]
    fn emit_skips_the_source_view() {
        let coordinator = HighlightCoordinator::new();
        let scatter = recording(vec!["a"]);
        let country = recording(vec!["a"]);
        let geo = recording(vec![]);
        coordinator.register(ViewKind::Scatter, scatter.clone());
        coordinator.register(ViewKind::CountryMap, country.clone());
        coordinator.register(ViewKind::GeoMap, geo.clone());

        let hits = coordinator.emit(ViewKind::Scatter, "a", true);
        assert_eq!(hits, 1);
        assert!(scatter.lock().calls.is_empty());
        assert_eq!(country.lock().calls, vec![("a".to_string(), true)]);
        assert_eq!(geo.lock().calls.len(), 1);
    }

    #[test]
    fn unregistered_views_stop_receiving() {
        let coordinator = HighlightCoordinator::new();
        let geo = recording(vec!["x"]);
        coordinator.register(ViewKind::GeoMap, geo.clone());
        assert!(coordinator.unregister(ViewKind::GeoMap));
        assert!(!coordinator.unregister(ViewKind::GeoMap));
        assert_eq!(coordinator.emit(ViewKind::Scatter, "x", true), 0);
        assert!(geo.lock().calls.is_empty());
    }

    #[test]
    fn re_registering_replaces_the_view() {
        let coordinator = HighlightCoordinator::new();
        let old = recording(vec![]);
        let new = recording(vec![]);
        coordinator.register(ViewKind::CountryMap, old.clone());
        coordinator.register(ViewKind::CountryMap, new.clone());
        coordinator.emit(ViewKind::GeoMap, "id", false);
        assert!(old.lock().calls.is_empty());
        assert_eq!(new.lock().calls.len(), 1);
        assert_eq!(coordinator.registered(), vec![ViewKind::CountryMap]);
    }
}
