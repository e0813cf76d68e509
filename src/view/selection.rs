//! Selection state of a view.
//!
//! [`SelectionBox`] is the set of selected elements plus the bounds enclosing
//! them; [`SelectionRect`] is the rubber band dragged out to select by area.
//!
//! # Usage
//!
//! ```rust,ignore
//! use pathweaver::view::selection::SelectionRect;
//!
//! let mut rect = SelectionRect::new(Point::new(10.0, 20.0));
//! rect.update(Point::new(100.0, 120.0));
//! assert!(rect.overlaps(&node_bounds));
//! ```

use indexmap::IndexSet;

use crate::model::{ElementId, Point, Rect};

/// Rubber bands smaller than this (view pixels, both axes) are treated as a
/// click rather than an area selection.
pub const MIN_RECT_SIZE: f64 = 3.0;

/// A rectangle used for drag-selection in view coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SelectionRect {
    pub start: Point,
    pub end: Point,
}

impl SelectionRect {
    /// Create a new selection rectangle starting at the given point.
    pub fn new(start: Point) -> Self {
        Self { start, end: start }
    }

    /// Update the end point of the selection rectangle.
    pub fn update(&mut self, end: Point) {
        self.end = end;
    }

    /// Normalized rectangle, whatever direction it was dragged in.
    pub fn rect(&self) -> Rect {
        Rect::from_corners(self.start, self.end)
    }

    pub fn contains(&self, p: Point) -> bool {
        self.rect().contains(p)
    }

    /// Check if `bounds` overlaps with this selection rectangle.
    pub fn overlaps(&self, bounds: &Rect) -> bool {
        let r = self.rect();
        bounds.left < r.right() && bounds.right() > r.left && bounds.top < r.bottom() && bounds.bottom() > r.top
    }

    pub fn width(&self) -> f64 {
        (self.end.x - self.start.x).abs()
    }

    pub fn height(&self) -> f64 {
        (self.end.y - self.start.y).abs()
    }

    /// True if the band was dragged far enough to mean an area selection.
    pub fn is_meaningful(&self) -> bool {
        self.width() >= MIN_RECT_SIZE || self.height() >= MIN_RECT_SIZE
    }
}

/// The current selection.
///
/// Members are kept in selection order. The view owns the selected flags of
/// its elements; this type only tracks membership and the derived bounds.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SelectionBox {
    members: IndexSet<ElementId>,
    bounds: Option<Rect>,
}

impl SelectionBox {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn contains(&self, id: &ElementId) -> bool {
        self.members.contains(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ElementId> {
        self.members.iter()
    }

    pub fn ids(&self) -> Vec<ElementId> {
        self.members.iter().cloned().collect()
    }

    /// Returns true if the element was not selected before.
    pub fn insert(&mut self, id: ElementId) -> bool {
        self.members.insert(id)
    }

    pub fn remove(&mut self, id: &ElementId) -> bool {
        self.members.shift_remove(id)
    }

    /// Empty the selection, returning what was selected.
    pub fn take(&mut self) -> Vec<ElementId> {
        self.bounds = None;
        self.members.drain(..).collect()
    }

    /// View-space rectangle enclosing every selected element.
    pub fn bounds(&self) -> Option<Rect> {
        self.bounds
    }

    pub(crate) fn set_bounds(&mut self, bounds: Option<Rect>) {
        self.bounds = bounds;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_selection_rect_normalized() {
        let mut rect = SelectionRect::new(Point::new(100.0, 200.0));
        rect.update(Point::new(50.0, 150.0));
        assert_eq!(rect.rect(), Rect::new(50.0, 150.0, 50.0, 50.0));
    }

    #[test]
    fn test_selection_rect_overlaps() {
        let mut rect = SelectionRect::new(Point::new(10.0, 10.0));
        rect.update(Point::new(100.0, 100.0));
        assert!(rect.overlaps(&Rect::new(50.0, 50.0, 100.0, 100.0)));
        assert!(!rect.overlaps(&Rect::new(200.0, 200.0, 100.0, 100.0)));
        assert!(rect.contains(Point::new(50.0, 50.0)));
    }

    #[test]
    fn test_tiny_rect_is_a_click() {
        let mut rect = SelectionRect::new(Point::new(100.0, 100.0));
        rect.update(Point::new(101.0, 101.0));
        assert!(!rect.is_meaningful());
    }

    #[test]
    fn test_box_keeps_selection_order() {
        let mut sel = SelectionBox::new();
        assert!(sel.insert("b".into()));
        assert!(sel.insert("a".into()));
        assert!(!sel.insert("b".into()));
        assert_eq!(sel.ids(), vec![ElementId::from("b"), ElementId::from("a")]);
        assert!(sel.remove(&"b".into()));
        assert_eq!(sel.take(), vec![ElementId::from("a")]);
        assert!(sel.is_empty());
    }
}
