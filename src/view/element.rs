//! View elements.
//!
//! A [`VElement`] mirrors the presentation-relevant state of one model
//! element (view-space bounds, routed path, label, z-order) plus the view's
//! own state (selection, highlight). Selection handles are view elements
//! too, with no model counterpart.

use std::fmt;

use crate::connector::ConnectorShape;
use crate::model::{AnchorShape, ElementId, ElementKind, GroupStyle, ObjectType, PathwayElement, Point, Rect};
use crate::pathway::PathwayModel;

/// Identity of a view element.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum VKey {
    Element(ElementId),
    Handle {
        owner: ElementId,
        position: HandlePosition,
    },
}

impl VKey {
    /// The model element this view element belongs to.
    pub fn element_id(&self) -> &ElementId {
        match self {
            VKey::Element(id) => id,
            VKey::Handle { owner, .. } => owner,
        }
    }
}

impl fmt::Display for VKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VKey::Element(id) => write!(f, "{id}"),
            VKey::Handle { owner, position } => write!(f, "{owner}#{position:?}"),
        }
    }
}

/// Natural-order tier. Lower tiers draw first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DrawTier {
    Group,
    Line,
    Shape,
    Label,
    DataNode,
    State,
    Handle,
}

impl DrawTier {
    /// Tier of a model element type, `None` for types without a drawing.
    pub fn of(object_type: ObjectType) -> Option<Self> {
        match object_type {
            ObjectType::Group => Some(DrawTier::Group),
            ObjectType::Interaction | ObjectType::GraphicalLine | ObjectType::Anchor => {
                Some(DrawTier::Line)
            }
            ObjectType::Shape => Some(DrawTier::Shape),
            ObjectType::Label => Some(DrawTier::Label),
            ObjectType::DataNode => Some(DrawTier::DataNode),
            ObjectType::State => Some(DrawTier::State),
            ObjectType::Pathway
            | ObjectType::Citation
            | ObjectType::Annotation
            | ObjectType::Evidence => None,
        }
    }
}

/// Where a handle sits on its owner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum HandlePosition {
    NorthWest,
    North,
    NorthEast,
    East,
    SouthEast,
    South,
    SouthWest,
    West,
    LineStart,
    LineEnd,
}

impl HandlePosition {
    pub const RESIZE: [HandlePosition; 8] = [
        HandlePosition::NorthWest,
        HandlePosition::North,
        HandlePosition::NorthEast,
        HandlePosition::East,
        HandlePosition::SouthEast,
        HandlePosition::South,
        HandlePosition::SouthWest,
        HandlePosition::West,
    ];

    /// Relative coordinates of a resize handle on its owner's bounds.
    pub fn relative(self) -> (f64, f64) {
        match self {
            HandlePosition::NorthWest => (-1.0, -1.0),
            HandlePosition::North => (0.0, -1.0),
            HandlePosition::NorthEast => (1.0, -1.0),
            HandlePosition::East => (1.0, 0.0),
            HandlePosition::SouthEast => (1.0, 1.0),
            HandlePosition::South => (0.0, 1.0),
            HandlePosition::SouthWest => (-1.0, 1.0),
            HandlePosition::West => (-1.0, 0.0),
            HandlePosition::LineStart | HandlePosition::LineEnd => (0.0, 0.0),
        }
    }

    /// Apply a drag of this handle by (`dx`, `dy`) to `bounds`.
    pub fn resize(self, bounds: Rect, dx: f64, dy: f64) -> Rect {
        let (rx, ry) = self.relative();
        let (mut left, mut top, mut right, mut bottom) =
            (bounds.left, bounds.top, bounds.right(), bounds.bottom());
        if rx < 0.0 {
            left += dx;
        } else if rx > 0.0 {
            right += dx;
        }
        if ry < 0.0 {
            top += dy;
        } else if ry > 0.0 {
            bottom += dy;
        }
        Rect::from_corners(Point::new(left, top), Point::new(right, bottom))
    }
}

/// What a view element draws.
#[derive(Debug, Clone, PartialEq)]
pub enum VKind {
    DataNode,
    State,
    Label,
    Shape { shape_type: String, rotation: f64 },
    Group { style: GroupStyle },
    Anchor { shape: AnchorShape },
    Line {
        /// Routed path in view space.
        shape: ConnectorShape,
        start_arrow: Option<String>,
        end_arrow: Option<String>,
    },
    Handle,
}

/// Selection state machine of a view element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum VState {
    #[default]
    Unselected,
    Selected,
    Dragging,
}

#[derive(Debug, Clone, PartialEq)]
pub struct VElement {
    key: VKey,
    kind: VKind,
    tier: DrawTier,
    z_order: i32,
    /// Creation sequence, the last natural-order tie-break.
    seq: u64,
    /// View-space bounds.
    bounds: Rect,
    text: Option<String>,
    state: VState,
    pub highlighted: bool,
}

impl VElement {
    /// Mirror a model element. Returns `None` for elements with no drawing.
    pub fn from_model(element: &PathwayElement, model: &PathwayModel, zoom: f64, seq: u64) -> Option<Self> {
        let id = element.id()?.clone();
        let tier = DrawTier::of(element.object_type())?;
        let mut v = VElement {
            key: VKey::Element(id),
            kind: VKind::DataNode,
            tier,
            z_order: element.z_order,
            seq,
            bounds: Rect::default(),
            text: None,
            state: VState::Unselected,
            highlighted: false,
        };
        v.refresh(element, model, zoom);
        Some(v)
    }

    pub(crate) fn handle(owner: &ElementId, position: HandlePosition, center: Point, size: f64, seq: u64) -> Self {
        VElement {
            key: VKey::Handle {
                owner: owner.clone(),
                position,
            },
            kind: VKind::Handle,
            tier: DrawTier::Handle,
            z_order: 0,
            seq,
            bounds: Rect::from_center(center.x, center.y, size, size),
            text: None,
            state: VState::Unselected,
            highlighted: false,
        }
    }

    /// Re-read everything derived from the model. Returns true if the
    /// natural-order key changed.
    pub(crate) fn refresh(&mut self, element: &PathwayElement, model: &PathwayModel, zoom: f64) -> bool {
        let id = self.key.element_id().clone();
        self.bounds = model
            .element_bounds(&id)
            .map(|b| b.scale(zoom))
            .unwrap_or_default();
        self.text = element
            .text_label()
            .filter(|t| !t.is_empty())
            .map(str::to_string);
        self.kind = match &element.kind {
            ElementKind::DataNode(_) => VKind::DataNode,
            ElementKind::State(_) => VKind::State,
            ElementKind::Label(_) => VKind::Label,
            ElementKind::Shape(s) => VKind::Shape {
                shape_type: s.shape_type.clone(),
                rotation: s.rotation,
            },
            ElementKind::Group(g) => VKind::Group { style: g.style },
            ElementKind::Anchor(a) => VKind::Anchor { shape: a.shape },
            ElementKind::Interaction(l) | ElementKind::GraphicalLine(l) => VKind::Line {
                shape: l.shape.scale(zoom),
                start_arrow: l.start().arrow_head.clone(),
                end_arrow: l.end().arrow_head.clone(),
            },
            _ => VKind::Handle,
        };
        let reorder = self.z_order != element.z_order;
        self.z_order = element.z_order;
        reorder
    }

    pub(crate) fn set_bounds(&mut self, bounds: Rect) {
        self.bounds = bounds;
    }

    pub fn key(&self) -> &VKey {
        &self.key
    }

    /// Model element id, `None` for handles.
    pub fn element_id(&self) -> Option<&ElementId> {
        match &self.key {
            VKey::Element(id) => Some(id),
            VKey::Handle { .. } => None,
        }
    }

    pub fn kind(&self) -> &VKind {
        &self.kind
    }

    pub fn tier(&self) -> DrawTier {
        self.tier
    }

    pub fn z_order(&self) -> i32 {
        self.z_order
    }

    pub fn bounds(&self) -> Rect {
        self.bounds
    }

    pub fn text(&self) -> Option<&str> {
        self.text.as_deref()
    }

    pub fn state(&self) -> VState {
        self.state
    }

    pub fn is_selected(&self) -> bool {
        self.state != VState::Unselected
    }

    pub fn is_handle(&self) -> bool {
        self.tier == DrawTier::Handle
    }

    /// Natural-order sort key.
    pub fn order_key(&self) -> (DrawTier, i32, u64) {
        (self.tier, self.z_order, self.seq)
    }

    pub fn select(&mut self) {
        if self.state == VState::Unselected {
            self.state = VState::Selected;
        }
    }

    pub fn deselect(&mut self) {
        self.state = VState::Unselected;
    }

    /// Only a selected element can start dragging. Returns whether it did.
    pub fn start_drag(&mut self) -> bool {
        if self.state == VState::Selected {
            self.state = VState::Dragging;
            true
        } else {
            false
        }
    }

    pub fn end_drag(&mut self) {
        if self.state == VState::Dragging {
            self.state = VState::Selected;
        }
    }

    /// Hit test in view space. Lines are hit within `tolerance` of their
    /// path, everything else inside its bounds.
    pub fn hit(&self, p: Point, tolerance: f64) -> bool {
        match &self.kind {
            VKind::Line { shape, .. } => shape.hit_test(p, tolerance),
            _ => self.bounds.expand(tolerance).contains(p),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tier_order() {
        assert!(DrawTier::Group < DrawTier::Line);
        assert!(DrawTier::Line < DrawTier::Shape);
        assert!(DrawTier::Shape < DrawTier::Label);
        assert!(DrawTier::Label < DrawTier::DataNode);
        assert!(DrawTier::DataNode < DrawTier::Handle);
        assert_eq!(DrawTier::of(ObjectType::Citation), None);
        assert_eq!(DrawTier::of(ObjectType::Anchor), Some(DrawTier::Line));
    }

    #[test]
    fn test_state_machine() {
        let mut v = VElement::handle(&"a".into(), HandlePosition::North, Point::new(0.0, 0.0), 8.0, 0);
        assert!(!v.start_drag());
        v.select();
        assert_eq!(v.state(), VState::Selected);
        assert!(v.start_drag());
        assert_eq!(v.state(), VState::Dragging);
        v.select();
        assert_eq!(v.state(), VState::Dragging);
        v.end_drag();
        assert_eq!(v.state(), VState::Selected);
        v.deselect();
        assert!(!v.is_selected());
    }

    #[test]
    fn test_handle_resize() {
        let r = Rect::new(0.0, 0.0, 100.0, 50.0);
        assert_eq!(HandlePosition::SouthEast.resize(r, 10.0, 5.0), Rect::new(0.0, 0.0, 110.0, 55.0));
        assert_eq!(HandlePosition::West.resize(r, 10.0, 99.0), Rect::new(10.0, 0.0, 90.0, 50.0));
        // dragging past the opposite edge flips instead of going negative
        assert_eq!(HandlePosition::East.resize(r, -150.0, 0.0), Rect::new(-50.0, 0.0, 50.0, 50.0));
    }
}
