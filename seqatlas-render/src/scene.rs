//! Keyed mark layers and the shared empty state
//!
//! A [`Layer`] holds the marks of one view in draw order. [`Layer::join`]
//! replaces them with a new set and reports which keys entered, stayed or
//! exited, so a mark keeps its identity across updates.

use std::collections::{HashMap, HashSet};

use svg::node::element::{Group, Rectangle, Text};

use crate::{Canvas, RenderStyle};

/// A mark addressable by a stable key
pub trait Keyed {
    fn key(&self) -> &str;

    /// Carry interaction state over from the mark this one replaces
    fn inherit(&mut self, _previous: &Self) {}
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JoinSummary {
    pub entered: Vec<String>,
    pub updated: Vec<String>,
    pub exited: Vec<String>,
}

impl JoinSummary {
    pub fn is_noop(&self) -> bool {
        self.entered.is_empty() && self.exited.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmptyReason {
    NoPoints,
    MissingContainer,
}

impl EmptyReason {
    pub fn message(self) -> &'static str {
        match self {
            EmptyReason::NoPoints => "No similar sequences with coordinates to display",
            EmptyReason::MissingContainer => "Display area unavailable",
        }
    }
}

/// What an `update` call did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateOutcome {
    Rendered(JoinSummary),
    Empty(EmptyReason),
}

impl UpdateOutcome {
    pub fn is_empty(&self) -> bool {
        matches!(self, UpdateOutcome::Empty(_))
    }
}

#[derive(Debug, Clone)]
pub struct Layer<M> {
    marks: Vec<M>,
    index: HashMap<String, usize>,
}

impl<M> Default for Layer<M> {
    fn default() -> Self {
        Self {
            marks: Vec::new(),
            index: HashMap::new(),
        }
    }
}

impl<M: Keyed> Layer<M> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the marks. Later duplicates of a key are dropped.
    pub fn join(&mut self, next: Vec<M>) -> JoinSummary {
        let mut previous: HashMap<String, M> = self
            .marks
            .drain(..)
            .map(|m| (m.key().to_string(), m))
            .collect();
        let mut summary = JoinSummary::default();
        let mut seen: HashSet<String> = HashSet::new();

        for mut mark in next {
            let key = mark.key().to_string();
            if !seen.insert(key.clone()) {
                log::debug!("Dropping duplicate mark {}", key);
                continue;
            }
            match previous.remove(&key) {
                Some(old) => {
                    mark.inherit(&old);
                    summary.updated.push(key);
                }
                None => summary.entered.push(key),
            }
            self.marks.push(mark);
        }

        let mut exited: Vec<String> = previous.into_keys().collect();
        exited.sort();
        summary.exited = exited;
        self.reindex();
        summary
    }

    /// Remove every mark, returning the exited keys
    pub fn clear(&mut self) -> Vec<String> {
        let exited = self.marks.drain(..).map(|m| m.key().to_string()).collect();
        self.index.clear();
        exited
    }

    fn reindex(&mut self) {
        self.index = self
            .marks
            .iter()
            .enumerate()
            .map(|(i, m)| (m.key().to_string(), i))
            .collect();
    }

    pub fn get(&self, key: &str) -> Option<&M> {
        self.index.get(key).map(|&i| &self.marks[i])
    }

    pub fn get_mut(&mut self, key: &str) -> Option<&mut M> {
        match self.index.get(key) {
            Some(&i) => self.marks.get_mut(i),
            None => None,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &M> {
        self.marks.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut M> {
        self.marks.iter_mut()
    }

    pub fn keys(&self) -> Vec<&str> {
        self.marks.iter().map(|m| m.key()).collect()
    }

    pub fn len(&self) -> usize {
        self.marks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.marks.is_empty()
    }
}

/// Explicit empty / error state shared by every view
pub fn empty_state(canvas: Canvas, style: &RenderStyle, message: &str) -> Group {
    let width = canvas.width.max(1.0);
    let height = canvas.height.max(1.0);
    Group::new()
        .set("class", "empty-state")
        .add(
            Rectangle::new()
                .set("x", 0)
                .set("y", 0)
                .set("width", width)
                .set("height", height)
                .set("fill", style.background_color.as_str()),
        )
        .add(
            Text::new(message)
                .set("x", width / 2.0)
                .set("y", height / 2.0)
                .set("text-anchor", "middle")
                .set("dominant-baseline", "middle")
                .set("font-family", style.font_family.as_str())
                .set("font-size", style.font_size + 2)
                .set("fill", "#757575"),
        )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    struct Mark {
        id: String,
        value: i32,
        selected: bool,
    }

    impl Keyed for Mark {
        fn key(&self) -> &str {
            &self.id
        }

        fn inherit(&mut self, previous: &Self) {
            self.selected = previous.selected;
        }
    }

    fn marks(ids: &[&str]) -> Vec<Mark> {
        ids.iter()
            .enumerate()
            .map(|(i, id)| Mark {
                id: id.to_string(),
                value: i as i32,
                selected: false,
            })
            .collect()
    }

    #[test]
    fn join_reports_enter_update_exit() {
        let mut layer = Layer::new();
        let first = layer.join(marks(&["a", "b", "c"]));
        assert_eq!(first.entered, vec!["a", "b", "c"]);

        let second = layer.join(marks(&["c", "d", "a"]));
        assert_eq!(second.entered, vec!["d"]);
        assert_eq!(second.updated, vec!["c", "a"]);
        assert_eq!(second.exited, vec!["b"]);
        assert_eq!(layer.keys(), vec!["c", "d", "a"]);
    }

    #[test]
    fn updated_marks_inherit_state() {
        let mut layer = Layer::new();
        layer.join(marks(&["a", "b"]));
        layer.get_mut("b").unwrap().selected = true;

        layer.join(marks(&["b", "a"]));
        assert!(layer.get("b").unwrap().selected);
        assert_eq!(layer.get("b").unwrap().value, 0);
        assert!(!layer.get("a").unwrap().selected);
    }

    #[test]
    fn duplicate_keys_keep_the_first() {
        let mut layer = Layer::new();
        let s = layer.join(marks(&["a", "a", "b"]));
        assert_eq!(layer.len(), 2);
        assert_eq!(s.entered, vec!["a", "b"]);
        assert_eq!(layer.get("a").unwrap().value, 0);
    }

    #[test]
    fn empty_state_carries_the_message() {
        let group = empty_state(Canvas::new(200.0, 100.0), &RenderStyle::default(), "Nothing here");
        let text = group.to_string();
        assert!(text.contains("empty-state"));
        assert!(text.contains("Nothing here"));
    }
}
