use crate::{PreheatConfig, SlotGeometry};
use preheat_base::hashing::HashSet;
use preheat_base::Rect;

/// Result of feeding a new visible rect to the [`PreheatWindowCalculator`]
#[derive(Debug, Clone, PartialEq)]
pub struct WindowUpdate {
    // Regions that just entered the window and should start caching
    pub added: Vec<Rect>,
    // Regions that just left the window and should stop caching
    pub removed: Vec<Rect>,
    // Becomes `previous` for the next call. Equal to the old window when nothing was applied.
    pub new_window: Rect,
    pub applied: bool,
}

impl WindowUpdate {
    pub fn unchanged(previous: Rect) -> Self {
        WindowUpdate {
            added: Vec::default(),
            removed: Vec::default(),
            new_window: previous,
            applied: false,
        }
    }

    /// Translates the added/removed rects into slot indices. An index in both lists (a slot
    /// straddling both edges of a thin window) stays cached, it is dropped from `removed`.
    pub fn resolve_indices(
        &self,
        geometry: &dyn SlotGeometry,
    ) -> (Vec<usize>, Vec<usize>) {
        let mut seen = HashSet::default();
        let mut added = Vec::default();
        for rect in &self.added {
            for index in geometry.indices_in_rect(*rect) {
                if seen.insert(index) {
                    added.push(index);
                }
            }
        }

        let mut removed = Vec::default();
        for rect in &self.removed {
            for index in geometry.indices_in_rect(*rect) {
                if seen.insert(index) {
                    removed.push(index);
                }
            }
        }

        (added, removed)
    }
}

/// Computes the preheat window around the visible rect and what changed since the last window
#[derive(Debug, Clone, Copy)]
pub struct PreheatWindowCalculator {
    config: PreheatConfig,
}

impl PreheatWindowCalculator {
    pub fn new(config: PreheatConfig) -> Self {
        PreheatWindowCalculator { config }
    }

    /// The visible rect grown along the scroll axis to `window_multiplier` times its height,
    /// keeping the same center
    pub fn preheat_rect(
        &self,
        visible: Rect,
    ) -> Rect {
        let inset = -0.5 * (self.config.window_multiplier - 1.0) * visible.height;
        visible.inset_by(0.0, inset)
    }

    pub fn update_window(
        &self,
        previous: Rect,
        visible: Rect,
    ) -> WindowUpdate {
        let preheat_rect = self.preheat_rect(visible);

        // Update only if the visible area is significantly different from the last preheated area
        let delta = (preheat_rect.mid_y() - previous.mid_y()).abs();
        let threshold = visible.height * self.config.hysteresis_fraction;
        if !(delta > threshold) {
            return WindowUpdate::unchanged(previous);
        }

        let (added, removed) = differences_between_rects(previous, preheat_rect);
        WindowUpdate {
            added,
            removed,
            new_window: preheat_rect,
            applied: true,
        }
    }
}

/// Regions of `new` not covered by `old` (added) and of `old` not covered by `new` (removed).
/// Only the scroll axis is compared, every region spans the new rect horizontally.
pub fn differences_between_rects(
    old: Rect,
    new: Rect,
) -> (Vec<Rect>, Vec<Rect>) {
    if !old.intersects(&new) {
        let added = if new.is_empty() { vec![] } else { vec![new] };
        let removed = if old.is_empty() { vec![] } else { vec![old] };
        return (added, removed);
    }

    let mut added = Vec::default();
    if new.max_y() > old.max_y() {
        added.push(Rect::new(
            new.x,
            old.max_y(),
            new.width,
            new.max_y() - old.max_y(),
        ));
    }
    if old.min_y() > new.min_y() {
        added.push(Rect::new(
            new.x,
            new.min_y(),
            new.width,
            old.min_y() - new.min_y(),
        ));
    }

    let mut removed = Vec::default();
    if new.max_y() < old.max_y() {
        removed.push(Rect::new(
            new.x,
            new.max_y(),
            new.width,
            old.max_y() - new.max_y(),
        ));
    }
    if old.min_y() < new.min_y() {
        removed.push(Rect::new(
            new.x,
            old.min_y(),
            new.width,
            new.min_y() - old.min_y(),
        ));
    }

    (added, removed)
}
