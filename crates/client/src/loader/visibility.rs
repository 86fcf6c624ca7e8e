//! Threshold-based visibility tracking, the loader's IntersectionObserver.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use super::element::ElementId;

/// An axis-aligned box in page pixels.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self { x, y, width, height }
    }

    pub fn area(&self) -> f64 {
        self.width.max(0.0) * self.height.max(0.0)
    }

    /// Grow the box by `margin` on every side.
    pub fn expand(&self, margin: f64) -> Self {
        Self::new(self.x - margin, self.y - margin, self.width + 2.0 * margin, self.height + 2.0 * margin)
    }

    pub fn intersection(&self, other: &Rect) -> Option<Rect> {
        let left = self.x.max(other.x);
        let top = self.y.max(other.y);
        let right = (self.x + self.width).min(other.x + other.width);
        let bottom = (self.y + self.height).min(other.y + other.height);
        if right < left || bottom < top {
            return None;
        }
        Some(Rect::new(left, top, right - left, bottom - top))
    }
}

/// One observation delivered to the loader.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IntersectionEntry {
    pub target: ElementId,
    pub is_intersecting: bool,
    pub intersection_ratio: f64,
}

/// Tracks which elements are being watched and decides when they become visible.
#[derive(Debug, Clone)]
pub struct VisibilityWatcher {
    root_margin: f64,
    threshold: f64,
    observed: BTreeSet<ElementId>,
}

impl VisibilityWatcher {
    pub fn new(root_margin: f64, threshold: f64) -> Self {
        Self { root_margin, threshold, observed: BTreeSet::new() }
    }

    pub fn observe(&mut self, id: ElementId) {
        self.observed.insert(id);
    }

    pub fn unobserve(&mut self, id: ElementId) {
        self.observed.remove(&id);
    }

    pub fn is_observed(&self, id: ElementId) -> bool {
        self.observed.contains(&id)
    }

    pub fn observed_count(&self) -> usize {
        self.observed.len()
    }

    /// Compute an entry for `target` against the viewport, or `None` if it is not watched.
    pub fn entry(&self, viewport: &Rect, target: ElementId, bounds: &Rect) -> Option<IntersectionEntry> {
        if !self.is_observed(target) {
            return None;
        }

        let root = viewport.expand(self.root_margin);
        let (is_intersecting, intersection_ratio) = match root.intersection(bounds) {
            Some(overlap) if bounds.area() > 0.0 => (true, overlap.area() / bounds.area()),
            // zero-area targets count as fully visible when they touch the root
            Some(_) => (true, 1.0),
            None => (false, 0.0),
        };

        Some(IntersectionEntry { target, is_intersecting, intersection_ratio })
    }

    /// Whether an entry crosses the configured threshold.
    pub fn is_visible(&self, entry: &IntersectionEntry) -> bool {
        entry.is_intersecting && entry.intersection_ratio >= self.threshold
    }

    /// Entries for every watched element in `layout`, in layout order.
    pub fn evaluate(&self, viewport: &Rect, layout: &[(ElementId, Rect)]) -> Vec<IntersectionEntry> {
        layout
            .iter()
            .filter_map(|(id, bounds)| self.entry(viewport, *id, bounds))
            .collect()
    }
}
