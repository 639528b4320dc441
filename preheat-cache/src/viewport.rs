use preheat_base::{IndexRange, Rect, Size};

/// Fixed-size grid cells laid out in rows, left to right, top to bottom
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GridLayout {
    pub item_width: f32,
    pub item_height: f32,
    pub spacing: f32,
}

impl GridLayout {
    pub fn columns(
        &self,
        content_width: f32,
    ) -> usize {
        let pitch = self.item_width + self.spacing;
        if pitch <= 0.0 {
            return 1;
        }

        (((content_width + self.spacing) / pitch).floor() as usize).max(1)
    }

    pub fn row_pitch(&self) -> f32 {
        self.item_height + self.spacing
    }

    /// Number of rows that fit in a content area of the given height
    pub fn row_capacity(
        &self,
        content_height: f32,
    ) -> usize {
        let pitch = self.row_pitch();
        if pitch <= 0.0 || content_height <= 0.0 {
            return 0;
        }

        ((content_height + self.spacing) / pitch).ceil() as usize
    }

    /// The size a scroll view needs to show `item_count` items at the given width
    pub fn content_size(
        &self,
        content_width: f32,
        item_count: usize,
    ) -> Size {
        let columns = self.columns(content_width);
        let rows = (item_count + columns - 1) / columns;
        let height = if rows == 0 {
            0.0
        } else {
            rows as f32 * self.row_pitch() - self.spacing
        };
        Size::new(content_width, height)
    }

    pub fn item_rect(
        &self,
        content_width: f32,
        index: usize,
    ) -> Rect {
        let columns = self.columns(content_width);
        let row = index / columns;
        let column = index % columns;
        Rect::new(
            column as f32 * (self.item_width + self.spacing),
            row as f32 * self.row_pitch(),
            self.item_width,
            self.item_height,
        )
    }
}

/// Maps pixel rects to the slot indices they overlap. The rendering surface owns the real layout,
/// so it provides this to the coordinator.
pub trait SlotGeometry {
    fn indices_in_rect(
        &self,
        rect: Rect,
    ) -> Vec<usize>;
}

/// What the rendering surface reports whenever the scroll position or layout changes
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewportEvent {
    pub visible_rect: Rect,
    pub content_size: Size,
    // False while the surface is off screen, the coordinator ignores the event in that case
    pub is_visible: bool,
}

impl ViewportEvent {
    pub fn new(
        visible_rect: Rect,
        content_size: Size,
    ) -> Self {
        ViewportEvent {
            visible_rect,
            content_size,
            is_visible: true,
        }
    }
}

/// Converts viewport rects into index ranges for a [`GridLayout`]. Holds nothing but the layout
/// constants, so it can be called on every scroll update. Callers throttle if they need to.
#[derive(Debug, Clone, Copy)]
pub struct ViewportTracker {
    layout: GridLayout,
}

impl ViewportTracker {
    pub fn new(layout: GridLayout) -> Self {
        ViewportTracker { layout }
    }

    pub fn layout(&self) -> &GridLayout {
        &self.layout
    }

    pub fn on_viewport_changed(
        &self,
        visible_rect: Rect,
        content_size: Size,
    ) -> IndexRange {
        self.indices_in_rect(visible_rect, content_size)
    }

    /// Indices of every cell whose row overlaps the rect vertically, limited to the rows that fit
    /// in the content. Cells past the catalog end are not removed here, see [`GridGeometry`].
    pub fn indices_in_rect(
        &self,
        rect: Rect,
        content_size: Size,
    ) -> IndexRange {
        if rect.height <= 0.0 {
            return IndexRange::EMPTY;
        }

        let pitch = self.layout.row_pitch();
        if pitch <= 0.0 {
            return IndexRange::EMPTY;
        }

        let row_capacity = self.layout.row_capacity(content_size.height);
        let top = rect.min_y().max(0.0);
        let bottom = rect.max_y().min(row_capacity as f32 * pitch);
        if bottom <= top {
            return IndexRange::EMPTY;
        }

        let mut first_row = (top / pitch).floor() as usize;
        // Skip a row whose only overlap with the rect is the spacing below it
        if top - first_row as f32 * pitch >= self.layout.item_height {
            first_row += 1;
        }
        let last_row = ((bottom / pitch).ceil() as usize).min(row_capacity);
        if last_row <= first_row {
            return IndexRange::EMPTY;
        }

        let columns = self.layout.columns(content_size.width);
        IndexRange::new(first_row * columns, last_row * columns)
    }

    pub fn geometry(
        &self,
        content_size: Size,
        item_count: usize,
    ) -> GridGeometry {
        GridGeometry {
            tracker: *self,
            content_size,
            item_count,
        }
    }
}

/// A tracker bound to the current content size and item count
#[derive(Debug, Clone, Copy)]
pub struct GridGeometry {
    tracker: ViewportTracker,
    content_size: Size,
    item_count: usize,
}

impl SlotGeometry for GridGeometry {
    fn indices_in_rect(
        &self,
        rect: Rect,
    ) -> Vec<usize> {
        self.tracker
            .indices_in_rect(rect, self.content_size)
            .clamp_to(self.item_count)
            .iter()
            .collect()
    }
}
