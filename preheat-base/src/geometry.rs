use serde::{Deserialize, Serialize};

#[derive(Copy, Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Size {
    pub width: f32,
    pub height: f32,
}

impl Size {
    pub const fn new(
        width: f32,
        height: f32,
    ) -> Self {
        Size { width, height }
    }
}

/// Pixel-space rectangle. The scroll axis is y, growing downwards.
#[derive(Copy, Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Rect {
    pub const ZERO: Rect = Rect {
        x: 0.0,
        y: 0.0,
        width: 0.0,
        height: 0.0,
    };

    pub const fn new(
        x: f32,
        y: f32,
        width: f32,
        height: f32,
    ) -> Self {
        Rect {
            x,
            y,
            width,
            height,
        }
    }

    pub fn min_x(&self) -> f32 {
        self.x
    }

    pub fn max_x(&self) -> f32 {
        self.x + self.width
    }

    pub fn min_y(&self) -> f32 {
        self.y
    }

    pub fn max_y(&self) -> f32 {
        self.y + self.height
    }

    pub fn mid_y(&self) -> f32 {
        self.y + self.height * 0.5
    }

    pub fn is_empty(&self) -> bool {
        self.width <= 0.0 || self.height <= 0.0
    }

    /// Shrinks the rect by `dx`/`dy` on each side. Negative values grow it.
    pub fn inset_by(
        &self,
        dx: f32,
        dy: f32,
    ) -> Rect {
        Rect::new(
            self.x + dx,
            self.y + dy,
            (self.width - 2.0 * dx).max(0.0),
            (self.height - 2.0 * dy).max(0.0),
        )
    }

    /// True if the two rects share a region of non-zero area. Empty rects intersect nothing.
    pub fn intersects(
        &self,
        other: &Rect,
    ) -> bool {
        if self.is_empty() || other.is_empty() {
            return false;
        }

        self.min_x() < other.max_x()
            && other.min_x() < self.max_x()
            && self.min_y() < other.max_y()
            && other.min_y() < self.max_y()
    }
}

/// Half-open index interval `[start, end)` over the catalog ordering. `start <= end` always holds.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IndexRange {
    start: usize,
    end: usize,
}

impl IndexRange {
    pub const EMPTY: IndexRange = IndexRange { start: 0, end: 0 };

    pub fn new(
        start: usize,
        end: usize,
    ) -> Self {
        IndexRange {
            start,
            end: end.max(start),
        }
    }

    /// Smallest range covering every index in the list
    pub fn from_indices(indices: &[usize]) -> Self {
        let min = indices.iter().copied().min();
        let max = indices.iter().copied().max();
        match (min, max) {
            (Some(min), Some(max)) => IndexRange::new(min, max + 1),
            _ => IndexRange::EMPTY,
        }
    }

    pub fn start(&self) -> usize {
        self.start
    }

    pub fn end(&self) -> usize {
        self.end
    }

    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    pub fn contains(
        &self,
        index: usize,
    ) -> bool {
        index >= self.start && index < self.end
    }

    pub fn clamp_to(
        &self,
        count: usize,
    ) -> IndexRange {
        IndexRange::new(self.start.min(count), self.end.min(count))
    }

    pub fn iter(&self) -> std::ops::Range<usize> {
        self.start..self.end
    }
}
