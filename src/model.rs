//! Pathway element types.
//!
//! Every element of a pathway is a [`PathwayElement`]: a handful of fields
//! shared by all elements (id, z-order, group membership, literature
//! references) plus an [`ElementKind`] payload that carries the kind-specific
//! data. Capability checks ("can this be grouped", "can a line attach to
//! this") are answered by the variant rather than by a type hierarchy.
//!
//! Elements are plain values. A freshly built or copied element belongs to no
//! pathway; it only becomes part of one through
//! [`PathwayModel::add`](crate::pathway::PathwayModel::add).

use std::fmt;

use indexmap::IndexSet;
use serde::{Deserialize, Serialize};

use crate::connector::{ConnectorShape, ConnectorType};

// ────────────────────────────────────────────────────────────────────────────
// Identity
// ────────────────────────────────────────────────────────────────────────────

/// Stable identifier of an element, unique within one pathway.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ElementId(String);

impl ElementId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ElementId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ElementId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for ElementId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Geometry
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn offset(self, dx: f64, dy: f64) -> Self {
        Self::new(self.x + dx, self.y + dy)
    }

    pub fn distance(self, other: Point) -> f64 {
        ((self.x - other.x).powi(2) + (self.y - other.y).powi(2)).sqrt()
    }

    pub fn scale(self, factor: f64) -> Self {
        Self::new(self.x * factor, self.y * factor)
    }

    /// Component-wise comparison with a tolerance.
    pub fn approx_eq(self, other: Point, epsilon: f64) -> bool {
        (self.x - other.x).abs() <= epsilon && (self.y - other.y).abs() <= epsilon
    }
}

/// Axis-aligned rectangle stored as left/top/width/height.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Rect {
    pub left: f64,
    pub top: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub const fn new(left: f64, top: f64, width: f64, height: f64) -> Self {
        Self {
            left,
            top,
            width,
            height,
        }
    }

    pub fn from_center(cx: f64, cy: f64, width: f64, height: f64) -> Self {
        Self::new(cx - width / 2.0, cy - height / 2.0, width, height)
    }

    /// Normalizing constructor: the corners may be given in any order.
    pub fn from_corners(a: Point, b: Point) -> Self {
        let left = a.x.min(b.x);
        let top = a.y.min(b.y);
        Self::new(left, top, (a.x - b.x).abs(), (a.y - b.y).abs())
    }

    pub fn right(&self) -> f64 {
        self.left + self.width
    }

    pub fn bottom(&self) -> f64 {
        self.top + self.height
    }

    pub fn center_x(&self) -> f64 {
        self.left + self.width / 2.0
    }

    pub fn center_y(&self) -> f64 {
        self.top + self.height / 2.0
    }

    pub fn center(&self) -> Point {
        Point::new(self.center_x(), self.center_y())
    }

    /// Smallest rectangle enclosing both.
    pub fn union(&self, other: &Rect) -> Rect {
        let left = self.left.min(other.left);
        let top = self.top.min(other.top);
        let right = self.right().max(other.right());
        let bottom = self.bottom().max(other.bottom());
        Rect::new(left, top, right - left, bottom - top)
    }

    /// Grow outward by `margin` on every side.
    pub fn expand(&self, margin: f64) -> Rect {
        Rect::new(
            self.left - margin,
            self.top - margin,
            self.width + 2.0 * margin,
            self.height + 2.0 * margin,
        )
    }

    pub fn translate(&self, dx: f64, dy: f64) -> Rect {
        Rect::new(self.left + dx, self.top + dy, self.width, self.height)
    }

    pub fn scale(&self, factor: f64) -> Rect {
        Rect::new(
            self.left * factor,
            self.top * factor,
            self.width * factor,
            self.height * factor,
        )
    }

    pub fn contains(&self, p: Point) -> bool {
        p.x >= self.left && p.x <= self.right() && p.y >= self.top && p.y <= self.bottom()
    }

    pub fn intersects(&self, other: &Rect) -> bool {
        self.left <= other.right()
            && self.right() >= other.left
            && self.top <= other.bottom()
            && self.bottom() >= other.top
    }

    /// Point addressed by relative coordinates in [-1, 1] on both axes,
    /// where (0, 0) is the center and (1, 1) the bottom-right corner.
    pub fn relative_point(&self, rel_x: f64, rel_y: f64) -> Point {
        Point::new(
            self.center_x() + rel_x * self.width / 2.0,
            self.center_y() + rel_y * self.height / 2.0,
        )
    }

    /// Inverse of [`Rect::relative_point`], clamped to [-1, 1].
    pub fn to_relative(&self, p: Point) -> (f64, f64) {
        let rel = |v: f64, c: f64, extent: f64| {
            if extent.abs() < f64::EPSILON {
                0.0
            } else {
                ((v - c) / (extent / 2.0)).clamp(-1.0, 1.0)
            }
        };
        (
            rel(p.x, self.center_x(), self.width),
            rel(p.y, self.center_y(), self.height),
        )
    }

    /// Bounding box of a set of points, `None` when empty.
    pub fn enclosing(points: impl IntoIterator<Item = Point>) -> Option<Rect> {
        let mut it = points.into_iter();
        let first = it.next()?;
        let (mut min_x, mut min_y, mut max_x, mut max_y) = (first.x, first.y, first.x, first.y);
        for p in it {
            min_x = min_x.min(p.x);
            min_y = min_y.min(p.y);
            max_x = max_x.max(p.x);
            max_y = max_y.max(p.y);
        }
        Some(Rect::new(min_x, min_y, max_x - min_x, max_y - min_y))
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Object types
// ────────────────────────────────────────────────────────────────────────────

/// Discriminant of [`ElementKind`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ObjectType {
    Pathway,
    DataNode,
    State,
    Interaction,
    GraphicalLine,
    Label,
    Shape,
    Group,
    Anchor,
    Citation,
    Annotation,
    Evidence,
}

impl ObjectType {
    pub const ALL: [ObjectType; 12] = [
        ObjectType::Pathway,
        ObjectType::DataNode,
        ObjectType::State,
        ObjectType::Interaction,
        ObjectType::GraphicalLine,
        ObjectType::Label,
        ObjectType::Shape,
        ObjectType::Group,
        ObjectType::Anchor,
        ObjectType::Citation,
        ObjectType::Annotation,
        ObjectType::Evidence,
    ];

    /// XML element name used by the pathway document format.
    pub fn tag_name(self) -> &'static str {
        match self {
            ObjectType::Pathway => "Pathway",
            ObjectType::DataNode => "DataNode",
            ObjectType::State => "State",
            ObjectType::Interaction => "Interaction",
            ObjectType::GraphicalLine => "GraphicalLine",
            ObjectType::Label => "Label",
            ObjectType::Shape => "Shape",
            ObjectType::Group => "Group",
            ObjectType::Anchor => "Anchor",
            ObjectType::Citation => "Citation",
            ObjectType::Annotation => "Annotation",
            ObjectType::Evidence => "Evidence",
        }
    }

    pub fn from_tag_name(tag: &str) -> Option<Self> {
        ObjectType::ALL.into_iter().find(|t| t.tag_name() == tag)
    }

    /// Z-order assigned on creation.
    pub fn default_z_order(self) -> i32 {
        match self {
            ObjectType::Group => 0x1000,
            ObjectType::Interaction | ObjectType::GraphicalLine | ObjectType::Anchor => 0x3000,
            ObjectType::Shape => 0x4000,
            ObjectType::Label => 0x7000,
            ObjectType::DataNode => 0x8000,
            ObjectType::State => 0x8000 + 10,
            ObjectType::Pathway
            | ObjectType::Citation
            | ObjectType::Annotation
            | ObjectType::Evidence => 0,
        }
    }

    /// May carry a `group_ref`.
    pub fn is_groupable(self) -> bool {
        matches!(
            self,
            ObjectType::DataNode
                | ObjectType::Shape
                | ObjectType::Label
                | ObjectType::Interaction
                | ObjectType::GraphicalLine
                | ObjectType::Group
        )
    }

    /// May be the target of a line endpoint.
    pub fn is_linkable_to(self) -> bool {
        matches!(
            self,
            ObjectType::DataNode
                | ObjectType::Shape
                | ObjectType::Label
                | ObjectType::Group
                | ObjectType::Anchor
                | ObjectType::State
        )
    }

    /// May hold citation/annotation/evidence references.
    pub fn is_annotatable(self) -> bool {
        !matches!(
            self,
            ObjectType::Anchor | ObjectType::Citation | ObjectType::Annotation | ObjectType::Evidence
        )
    }

    /// Has a presence on the canvas.
    pub fn is_graphical(self) -> bool {
        !matches!(
            self,
            ObjectType::Pathway | ObjectType::Citation | ObjectType::Annotation | ObjectType::Evidence
        )
    }

    pub fn is_line(self) -> bool {
        matches!(self, ObjectType::Interaction | ObjectType::GraphicalLine)
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Kind payloads
// ────────────────────────────────────────────────────────────────────────────

/// External database reference.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Xref {
    pub identifier: String,
    pub data_source: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum DataNodeType {
    #[default]
    GeneProduct,
    Protein,
    Rna,
    Metabolite,
    Complex,
    Pathway,
    Alias,
    Unknown,
}

impl DataNodeType {
    pub fn as_str(self) -> &'static str {
        match self {
            DataNodeType::GeneProduct => "GeneProduct",
            DataNodeType::Protein => "Protein",
            DataNodeType::Rna => "Rna",
            DataNodeType::Metabolite => "Metabolite",
            DataNodeType::Complex => "Complex",
            DataNodeType::Pathway => "Pathway",
            DataNodeType::Alias => "Alias",
            DataNodeType::Unknown => "Unknown",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "GeneProduct" => DataNodeType::GeneProduct,
            "Protein" => DataNodeType::Protein,
            "Rna" | "RNA" => DataNodeType::Rna,
            "Metabolite" => DataNodeType::Metabolite,
            "Complex" => DataNodeType::Complex,
            "Pathway" => DataNodeType::Pathway,
            "Alias" => DataNodeType::Alias,
            _ => DataNodeType::Unknown,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct DataNode {
    pub text_label: String,
    pub node_type: DataNodeType,
    pub bounds: Rect,
    pub xref: Option<Xref>,
    /// Group this node stands in for, only meaningful for [`DataNodeType::Alias`].
    pub alias_ref: Option<ElementId>,
    /// States attached to this node. Maintained by the pathway.
    #[serde(default)]
    pub states: Vec<ElementId>,
}

/// A small shaped decoration glued to a data node (e.g. a modification site).
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct State {
    pub text_label: String,
    /// The data node this state belongs to.
    pub parent: Option<ElementId>,
    pub rel_x: f64,
    pub rel_y: f64,
    pub width: f64,
    pub height: f64,
}

impl State {
    /// Bounds of the state given the bounds of its parent.
    pub fn bounds_on(&self, parent: &Rect) -> Rect {
        let c = parent.relative_point(self.rel_x, self.rel_y);
        Rect::from_center(c.x, c.y, self.width, self.height)
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Label {
    pub text_label: String,
    pub bounds: Rect,
    pub href: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Shape {
    pub text_label: String,
    pub shape_type: String,
    pub bounds: Rect,
    pub rotation: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum GroupStyle {
    #[default]
    Group,
    None,
    Complex,
    Pathway,
}

impl GroupStyle {
    pub fn as_str(self) -> &'static str {
        match self {
            GroupStyle::Group => "Group",
            GroupStyle::None => "None",
            GroupStyle::Complex => "Complex",
            GroupStyle::Pathway => "Pathway",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "None" => GroupStyle::None,
            "Complex" => GroupStyle::Complex,
            "Pathway" => GroupStyle::Pathway,
            _ => GroupStyle::Group,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Group {
    pub style: GroupStyle,
    pub text_label: Option<String>,
    /// Inverse of the members' `group_ref`. Maintained by the pathway.
    #[serde(default)]
    pub members: IndexSet<ElementId>,
    /// Union of member bounds plus the style margin. Maintained by the pathway.
    #[serde(default)]
    pub bounds: Rect,
}

/// Which end of a line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum LineEnd {
    Start,
    End,
}

/// A point of a line. Only the first and last point may be attached to a
/// target; their `x`/`y` hold the last resolved absolute position.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct LinePoint {
    pub x: f64,
    pub y: f64,
    pub element_ref: Option<ElementId>,
    pub rel_x: f64,
    pub rel_y: f64,
    pub arrow_head: Option<String>,
}

impl LinePoint {
    pub fn at(x: f64, y: f64) -> Self {
        Self {
            x,
            y,
            ..Default::default()
        }
    }

    pub fn linked(target: impl Into<ElementId>, rel_x: f64, rel_y: f64) -> Self {
        Self {
            element_ref: Some(target.into()),
            rel_x,
            rel_y,
            ..Default::default()
        }
    }

    pub fn position(&self) -> Point {
        Point::new(self.x, self.y)
    }

    /// Drop the attachment, keeping the stored absolute coordinate.
    pub fn unlink(&mut self) {
        self.element_ref = None;
        self.rel_x = 0.0;
        self.rel_y = 0.0;
    }
}

/// Payload shared by interactions and graphical lines.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineElement {
    /// Start, optional waypoints, end. Always at least two entries.
    pub points: Vec<LinePoint>,
    pub connector_type: ConnectorType,
    /// Anchors hosted by this line. Maintained by the pathway.
    #[serde(default)]
    pub anchors: Vec<ElementId>,
    /// Routed path. Maintained by the pathway.
    #[serde(default)]
    pub shape: ConnectorShape,
}

impl Default for LineElement {
    fn default() -> Self {
        Self {
            points: vec![LinePoint::default(), LinePoint::default()],
            connector_type: ConnectorType::Straight,
            anchors: Vec::new(),
            shape: ConnectorShape::default(),
        }
    }
}

impl LineElement {
    pub fn new(start: LinePoint, end: LinePoint, connector_type: ConnectorType) -> Self {
        Self {
            points: vec![start, end],
            connector_type,
            ..Default::default()
        }
    }

    pub fn start(&self) -> &LinePoint {
        &self.points[0]
    }

    pub fn end(&self) -> &LinePoint {
        &self.points[self.points.len() - 1]
    }

    pub fn point(&self, end: LineEnd) -> &LinePoint {
        match end {
            LineEnd::Start => self.start(),
            LineEnd::End => self.end(),
        }
    }

    pub fn point_mut(&mut self, end: LineEnd) -> &mut LinePoint {
        let last = self.points.len() - 1;
        match end {
            LineEnd::Start => &mut self.points[0],
            LineEnd::End => &mut self.points[last],
        }
    }

    /// Waypoints between start and end.
    pub fn waypoints(&self) -> &[LinePoint] {
        &self.points[1..self.points.len() - 1]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum AnchorShape {
    #[default]
    None,
    Square,
    Circle,
}

impl AnchorShape {
    pub fn as_str(self) -> &'static str {
        match self {
            AnchorShape::None => "None",
            AnchorShape::Square => "Square",
            AnchorShape::Circle => "Circle",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "Square" => AnchorShape::Square,
            "Circle" => AnchorShape::Circle,
            _ => AnchorShape::None,
        }
    }
}

/// A named position along a line that other lines can attach to.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Anchor {
    /// Host line.
    pub line: Option<ElementId>,
    /// Fraction of the host connector's length, in [0, 1].
    pub position: f64,
    pub shape: AnchorShape,
    /// Resolved position on the host connector. Maintained by the pathway.
    #[serde(default)]
    pub point: Point,
}

/// Side length of the square used as an anchor's bounds.
pub const ANCHOR_SIZE: f64 = 6.0;

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Citation {
    pub xref: Option<Xref>,
    pub url: Option<String>,
    pub title: Option<String>,
    pub source: Option<String>,
    pub year: Option<i32>,
    #[serde(default)]
    pub authors: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Annotation {
    pub value: String,
    pub annotation_type: Option<String>,
    pub xref: Option<Xref>,
    pub url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Evidence {
    pub value: Option<String>,
    pub xref: Option<Xref>,
    pub url: Option<String>,
}

/// Pathway-level metadata. At most one per pathway.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PathwayInfo {
    pub title: String,
    pub organism: Option<String>,
    pub source: Option<String>,
    pub version: Option<String>,
    pub author: Option<String>,
}

/// Kind-specific payload of a [`PathwayElement`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ElementKind {
    Pathway(PathwayInfo),
    DataNode(DataNode),
    State(State),
    Interaction(LineElement),
    GraphicalLine(LineElement),
    Label(Label),
    Shape(Shape),
    Group(Group),
    Anchor(Anchor),
    Citation(Citation),
    Annotation(Annotation),
    Evidence(Evidence),
}

impl ElementKind {
    pub fn object_type(&self) -> ObjectType {
        match self {
            ElementKind::Pathway(_) => ObjectType::Pathway,
            ElementKind::DataNode(_) => ObjectType::DataNode,
            ElementKind::State(_) => ObjectType::State,
            ElementKind::Interaction(_) => ObjectType::Interaction,
            ElementKind::GraphicalLine(_) => ObjectType::GraphicalLine,
            ElementKind::Label(_) => ObjectType::Label,
            ElementKind::Shape(_) => ObjectType::Shape,
            ElementKind::Group(_) => ObjectType::Group,
            ElementKind::Anchor(_) => ObjectType::Anchor,
            ElementKind::Citation(_) => ObjectType::Citation,
            ElementKind::Annotation(_) => ObjectType::Annotation,
            ElementKind::Evidence(_) => ObjectType::Evidence,
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// References
// ────────────────────────────────────────────────────────────────────────────

/// The slot through which one element points at another.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum RefSlot {
    Group,
    Line(LineEnd),
    Alias,
    Citation,
    Annotation,
    Evidence,
}

// ────────────────────────────────────────────────────────────────────────────
// PathwayElement
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PathwayElement {
    /// `None` until the element is added to a pathway (or read from a file that names it).
    pub id: Option<ElementId>,
    pub z_order: i32,
    pub group_ref: Option<ElementId>,
    #[serde(default)]
    pub citation_refs: Vec<ElementId>,
    #[serde(default)]
    pub annotation_refs: Vec<ElementId>,
    #[serde(default)]
    pub evidence_refs: Vec<ElementId>,
    #[serde(default)]
    pub comments: Vec<String>,
    pub kind: ElementKind,
}

impl PathwayElement {
    pub fn new(kind: ElementKind) -> Self {
        Self {
            id: None,
            z_order: kind.object_type().default_z_order(),
            group_ref: None,
            citation_refs: Vec::new(),
            annotation_refs: Vec::new(),
            evidence_refs: Vec::new(),
            comments: Vec::new(),
            kind,
        }
    }

    /// Factory keyed by object type; every payload starts from its defaults.
    pub fn create(object_type: ObjectType) -> Self {
        let kind = match object_type {
            ObjectType::Pathway => ElementKind::Pathway(PathwayInfo::default()),
            ObjectType::DataNode => ElementKind::DataNode(DataNode {
                bounds: Rect::new(0.0, 0.0, 80.0, 20.0),
                ..Default::default()
            }),
            ObjectType::State => ElementKind::State(State {
                width: 15.0,
                height: 15.0,
                ..Default::default()
            }),
            ObjectType::Interaction => ElementKind::Interaction(LineElement::default()),
            ObjectType::GraphicalLine => ElementKind::GraphicalLine(LineElement::default()),
            ObjectType::Label => ElementKind::Label(Label {
                bounds: Rect::new(0.0, 0.0, 80.0, 20.0),
                ..Default::default()
            }),
            ObjectType::Shape => ElementKind::Shape(Shape {
                shape_type: "Rectangle".to_string(),
                bounds: Rect::new(0.0, 0.0, 80.0, 80.0),
                ..Default::default()
            }),
            ObjectType::Group => ElementKind::Group(Group::default()),
            ObjectType::Anchor => ElementKind::Anchor(Anchor {
                position: 0.5,
                ..Default::default()
            }),
            ObjectType::Citation => ElementKind::Citation(Citation::default()),
            ObjectType::Annotation => ElementKind::Annotation(Annotation::default()),
            ObjectType::Evidence => ElementKind::Evidence(Evidence::default()),
        };
        Self::new(kind)
    }

    pub fn data_node(text_label: &str, node_type: DataNodeType, bounds: Rect) -> Self {
        Self::new(ElementKind::DataNode(DataNode {
            text_label: text_label.to_string(),
            node_type,
            bounds,
            ..Default::default()
        }))
    }

    pub fn label(text_label: &str, bounds: Rect) -> Self {
        Self::new(ElementKind::Label(Label {
            text_label: text_label.to_string(),
            bounds,
            href: None,
        }))
    }

    pub fn shape(shape_type: &str, bounds: Rect) -> Self {
        Self::new(ElementKind::Shape(Shape {
            text_label: String::new(),
            shape_type: shape_type.to_string(),
            bounds,
            rotation: 0.0,
        }))
    }

    pub fn interaction(start: LinePoint, end: LinePoint, connector_type: ConnectorType) -> Self {
        Self::new(ElementKind::Interaction(LineElement::new(start, end, connector_type)))
    }

    pub fn graphical_line(start: LinePoint, end: LinePoint, connector_type: ConnectorType) -> Self {
        Self::new(ElementKind::GraphicalLine(LineElement::new(start, end, connector_type)))
    }

    pub fn group(style: GroupStyle) -> Self {
        Self::new(ElementKind::Group(Group {
            style,
            ..Default::default()
        }))
    }

    pub fn anchor(line: impl Into<ElementId>, position: f64) -> Self {
        Self::new(ElementKind::Anchor(Anchor {
            line: Some(line.into()),
            position: position.clamp(0.0, 1.0),
            ..Default::default()
        }))
    }

    pub fn state(parent: impl Into<ElementId>, text_label: &str, rel_x: f64, rel_y: f64) -> Self {
        Self::new(ElementKind::State(State {
            text_label: text_label.to_string(),
            parent: Some(parent.into()),
            rel_x,
            rel_y,
            width: 15.0,
            height: 15.0,
        }))
    }

    pub fn citation(citation: Citation) -> Self {
        Self::new(ElementKind::Citation(citation))
    }

    pub fn info(info: PathwayInfo) -> Self {
        Self::new(ElementKind::Pathway(info))
    }

    /// Builder-style id assignment.
    pub fn with_id(mut self, id: impl Into<ElementId>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_z_order(mut self, z: i32) -> Self {
        self.z_order = z;
        self
    }

    pub fn id(&self) -> Option<&ElementId> {
        self.id.as_ref()
    }

    pub fn object_type(&self) -> ObjectType {
        self.kind.object_type()
    }

    pub fn is_groupable(&self) -> bool {
        self.object_type().is_groupable()
    }

    pub fn is_linkable_to(&self) -> bool {
        self.object_type().is_linkable_to()
    }

    /// Stored model-space bounds of elements that own their geometry.
    /// Groups report their derived bounds.
    pub fn shaped_bounds(&self) -> Option<Rect> {
        match &self.kind {
            ElementKind::DataNode(n) => Some(n.bounds),
            ElementKind::Label(l) => Some(l.bounds),
            ElementKind::Shape(s) => Some(s.bounds),
            ElementKind::Group(g) => Some(g.bounds),
            _ => None,
        }
    }

    pub(crate) fn shaped_bounds_mut(&mut self) -> Option<&mut Rect> {
        match &mut self.kind {
            ElementKind::DataNode(n) => Some(&mut n.bounds),
            ElementKind::Label(l) => Some(&mut l.bounds),
            ElementKind::Shape(s) => Some(&mut s.bounds),
            _ => None,
        }
    }

    pub fn as_line(&self) -> Option<&LineElement> {
        match &self.kind {
            ElementKind::Interaction(l) | ElementKind::GraphicalLine(l) => Some(l),
            _ => None,
        }
    }

    pub fn as_line_mut(&mut self) -> Option<&mut LineElement> {
        match &mut self.kind {
            ElementKind::Interaction(l) | ElementKind::GraphicalLine(l) => Some(l),
            _ => None,
        }
    }

    pub fn as_group(&self) -> Option<&Group> {
        match &self.kind {
            ElementKind::Group(g) => Some(g),
            _ => None,
        }
    }

    pub fn as_group_mut(&mut self) -> Option<&mut Group> {
        match &mut self.kind {
            ElementKind::Group(g) => Some(g),
            _ => None,
        }
    }

    pub fn as_data_node(&self) -> Option<&DataNode> {
        match &self.kind {
            ElementKind::DataNode(n) => Some(n),
            _ => None,
        }
    }

    pub fn as_anchor(&self) -> Option<&Anchor> {
        match &self.kind {
            ElementKind::Anchor(a) => Some(a),
            _ => None,
        }
    }

    pub fn as_state(&self) -> Option<&State> {
        match &self.kind {
            ElementKind::State(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_citation(&self) -> Option<&Citation> {
        match &self.kind {
            ElementKind::Citation(c) => Some(c),
            _ => None,
        }
    }

    pub fn text_label(&self) -> Option<&str> {
        match &self.kind {
            ElementKind::DataNode(n) => Some(&n.text_label),
            ElementKind::State(s) => Some(&s.text_label),
            ElementKind::Label(l) => Some(&l.text_label),
            ElementKind::Shape(s) => Some(&s.text_label),
            ElementKind::Group(g) => g.text_label.as_deref(),
            ElementKind::Pathway(p) => Some(&p.title),
            _ => None,
        }
    }

    /// Every outgoing cross-reference, in a stable order.
    ///
    /// Structural ownership (a state's parent, an anchor's host line) is not
    /// included: those are part of the element's identity, not a link.
    pub fn references(&self) -> Vec<(RefSlot, ElementId)> {
        let mut refs = Vec::new();
        if let Some(g) = &self.group_ref {
            refs.push((RefSlot::Group, g.clone()));
        }
        if let Some(line) = self.as_line() {
            for end in [LineEnd::Start, LineEnd::End] {
                if let Some(target) = &line.point(end).element_ref {
                    refs.push((RefSlot::Line(end), target.clone()));
                }
            }
        }
        if let Some(alias) = self.as_data_node().and_then(|n| n.alias_ref.as_ref()) {
            refs.push((RefSlot::Alias, alias.clone()));
        }
        refs.extend(self.citation_refs.iter().map(|c| (RefSlot::Citation, c.clone())));
        refs.extend(self.annotation_refs.iter().map(|a| (RefSlot::Annotation, a.clone())));
        refs.extend(self.evidence_refs.iter().map(|e| (RefSlot::Evidence, e.clone())));
        refs
    }

    /// Clear the reference held in `slot` if it points at `target`.
    /// Returns true if anything changed.
    pub(crate) fn clear_reference(&mut self, slot: RefSlot, target: &ElementId) -> bool {
        match slot {
            RefSlot::Group => {
                if self.group_ref.as_ref() == Some(target) {
                    self.group_ref = None;
                    return true;
                }
                false
            }
            RefSlot::Line(end) => match self.as_line_mut() {
                Some(line) if line.point(end).element_ref.as_ref() == Some(target) => {
                    line.point_mut(end).unlink();
                    true
                }
                _ => false,
            },
            RefSlot::Alias => match &mut self.kind {
                ElementKind::DataNode(n) if n.alias_ref.as_ref() == Some(target) => {
                    n.alias_ref = None;
                    true
                }
                _ => false,
            },
            RefSlot::Citation => remove_from(&mut self.citation_refs, target),
            RefSlot::Annotation => remove_from(&mut self.annotation_refs, target),
            RefSlot::Evidence => remove_from(&mut self.evidence_refs, target),
        }
    }
}

fn remove_from(list: &mut Vec<ElementId>, target: &ElementId) -> bool {
    let before = list.len();
    list.retain(|id| id != target);
    list.len() != before
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rect_relative_point_roundtrip() {
        let r = Rect::new(10.0, 20.0, 100.0, 40.0);
        assert_eq!(r.relative_point(0.0, 0.0), Point::new(60.0, 40.0));
        assert_eq!(r.relative_point(1.0, -1.0), Point::new(110.0, 20.0));
        let (rx, ry) = r.to_relative(Point::new(35.0, 50.0));
        assert!((rx + 0.5).abs() < 1e-9);
        assert!((ry - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_rect_union_and_expand() {
        let a = Rect::new(0.0, 0.0, 10.0, 10.0);
        let b = Rect::new(20.0, 5.0, 10.0, 10.0);
        let u = a.union(&b);
        assert_eq!(u, Rect::new(0.0, 0.0, 30.0, 15.0));
        assert_eq!(u.expand(8.0), Rect::new(-8.0, -8.0, 46.0, 31.0));
    }

    #[test]
    fn test_factory_sets_default_z_order() {
        for t in ObjectType::ALL {
            let e = PathwayElement::create(t);
            assert_eq!(e.object_type(), t);
            assert_eq!(e.z_order, t.default_z_order());
            assert!(e.id().is_none());
        }
    }

    #[test]
    fn test_capabilities() {
        assert!(ObjectType::Group.is_groupable());
        assert!(ObjectType::Group.is_linkable_to());
        assert!(ObjectType::Anchor.is_linkable_to());
        assert!(!ObjectType::Anchor.is_groupable());
        assert!(!ObjectType::Citation.is_graphical());
        assert!(ObjectType::Interaction.is_line());
    }

    #[test]
    fn test_references_and_clear() {
        let mut line = PathwayElement::interaction(
            LinePoint::linked("a", 1.0, 0.0),
            LinePoint::linked("b", -1.0, 0.0),
            ConnectorType::Straight,
        );
        line.group_ref = Some("g".into());
        line.citation_refs.push("c1".into());
        let refs = line.references();
        assert_eq!(refs.len(), 4);
        assert!(refs.contains(&(RefSlot::Line(LineEnd::End), "b".into())));

        assert!(line.clear_reference(RefSlot::Line(LineEnd::End), &"b".into()));
        assert!(line.as_line().unwrap().end().element_ref.is_none());
        assert!(!line.clear_reference(RefSlot::Line(LineEnd::End), &"b".into()));
        assert!(line.clear_reference(RefSlot::Citation, &"c1".into()));
        assert!(line.citation_refs.is_empty());
    }

    #[test]
    fn test_tag_name_roundtrip() {
        for t in ObjectType::ALL {
            assert_eq!(ObjectType::from_tag_name(t.tag_name()), Some(t));
        }
    }
}
