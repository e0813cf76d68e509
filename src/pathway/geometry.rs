//! Geometry mutators and derived-geometry propagation.
//!
//! Stored geometry lives on data nodes, labels and shapes (their bounds), on
//! states (position relative to their data node) and on line points. Group
//! bounds, connector shapes and anchor positions are derived. When stored
//! geometry changes, [`PathwayModel::propagate`] walks the dependents and
//! re-derives each one, emitting [`ModelEvent::GeometryChanged`] for every
//! element whose geometry actually moved.

use std::collections::{HashMap, HashSet, VecDeque};

use indexmap::IndexSet;
use tracing::{trace, warn};

use crate::connector::{self, ConnectorShape, ConnectorType, ResolvedEnd};
use crate::error::{ModelError, Result};
use crate::model::{
    ANCHOR_SIZE, ElementId, ElementKind, LineEnd, LinePoint, ObjectType, Point, Rect, RefSlot,
};

use super::refs::slot_accepts;
use super::{ModelEvent, PathwayModel};

/// Upper bound on how often one element is re-derived during a single
/// propagation. Only reached by attachment cycles (two lines attached to each
/// other's anchors, for instance).
const MAX_VISITS: u32 = 16;

impl PathwayModel {
    // ──────────────────────────────────────────────────────────────────────
    // Derived queries
    // ──────────────────────────────────────────────────────────────────────

    /// Model-space bounds of any graphical element.
    pub fn element_bounds(&self, id: &ElementId) -> Option<Rect> {
        let element = self.elements.get(id)?;
        match &element.kind {
            ElementKind::DataNode(_) | ElementKind::Label(_) | ElementKind::Shape(_) | ElementKind::Group(_) => {
                element.shaped_bounds()
            }
            ElementKind::State(state) => {
                let parent = state.parent.as_ref()?;
                let parent_bounds = self.elements.get(parent)?.shaped_bounds()?;
                Some(state.bounds_on(&parent_bounds))
            }
            ElementKind::Anchor(anchor) => Some(Rect::from_center(
                anchor.point.x,
                anchor.point.y,
                ANCHOR_SIZE,
                ANCHOR_SIZE,
            )),
            ElementKind::Interaction(line) | ElementKind::GraphicalLine(line) => line
                .shape
                .bounds()
                .or_else(|| Rect::enclosing(line.points.iter().map(|p| p.position()))),
            ElementKind::Pathway(_)
            | ElementKind::Citation(_)
            | ElementKind::Annotation(_)
            | ElementKind::Evidence(_) => None,
        }
    }

    /// Routed path of a line.
    pub fn connector_shape(&self, line: &ElementId) -> Option<&ConnectorShape> {
        self.elements.get(line)?.as_line().map(|l| &l.shape)
    }

    /// Current absolute position of one end of a line.
    pub fn line_end_position(&self, line: &ElementId, end: LineEnd) -> Option<Point> {
        let l = self.elements.get(line)?.as_line()?;
        Some(self.resolve_end(l.point(end)).point)
    }

    /// Resolve a line point against its target's current geometry.
    ///
    /// A target that is gone (or has no geometry) degrades to the point's
    /// stored coordinate.
    pub(crate) fn resolve_end(&self, point: &LinePoint) -> ResolvedEnd {
        let Some(target) = &point.element_ref else {
            return ResolvedEnd::free(point.position());
        };
        match self.elements.get(target).map(|e| &e.kind) {
            Some(ElementKind::Anchor(anchor)) => ResolvedEnd::free(anchor.point),
            Some(_) => match self.element_bounds(target) {
                Some(bounds) => ResolvedEnd::on_bounds(&bounds, point.rel_x, point.rel_y),
                None => {
                    warn!(target = %target, "line endpoint target has no geometry, keeping last position");
                    ResolvedEnd::free(point.position())
                }
            },
            None => {
                warn!(target = %target, "line endpoint target is gone, keeping last position");
                ResolvedEnd::free(point.position())
            }
        }
    }

    // ──────────────────────────────────────────────────────────────────────
    // Geometry mutators
    // ──────────────────────────────────────────────────────────────────────

    /// Replace the bounds of a data node, label or shape.
    pub fn set_bounds(&mut self, id: &ElementId, bounds: Rect) -> Result<()> {
        let element = self.require(id)?;
        let object_type = element.object_type();
        let bounds = if bounds.width < 0.0 || bounds.height < 0.0 {
            Rect::from_corners(
                Point::new(bounds.left, bounds.top),
                Point::new(bounds.right(), bounds.bottom()),
            )
        } else {
            bounds
        };
        let Some(slot) = self.elements.get_mut(id).and_then(|e| e.shaped_bounds_mut()) else {
            return Err(ModelError::capability(id, object_type, "have its bounds set"));
        };
        if *slot == bounds {
            return Ok(());
        }
        *slot = bounds;
        self.revision += 1;
        self.propagate(vec![id.clone()]);
        Ok(())
    }

    pub fn move_by(&mut self, id: &ElementId, dx: f64, dy: f64) -> Result<()> {
        self.move_elements(std::slice::from_ref(id), dx, dy)
    }

    /// Translate elements by the same delta.
    ///
    /// Groups move by moving their members. Line points attached to a target
    /// follow the target; free line points are translated. States and
    /// anchors are positioned relative to their parent and move with it.
    pub fn move_elements(&mut self, ids: &[ElementId], dx: f64, dy: f64) -> Result<()> {
        for id in ids {
            self.require(id)?;
        }
        let mut moved: IndexSet<ElementId> = IndexSet::new();
        for id in ids {
            moved.insert(id.clone());
            if self.elements.get(id).is_some_and(|e| e.object_type() == ObjectType::Group) {
                moved.extend(self.descendants(id));
            }
        }
        if dx == 0.0 && dy == 0.0 {
            return Ok(());
        }

        let mut roots = Vec::new();
        for id in &moved {
            let Some(element) = self.elements.get_mut(id) else {
                continue;
            };
            if let Some(line) = element.as_line_mut() {
                for p in line.points.iter_mut().filter(|p| p.element_ref.is_none()) {
                    p.x += dx;
                    p.y += dy;
                }
                roots.push(id.clone());
            } else if let Some(b) = element.shaped_bounds_mut() {
                *b = b.translate(dx, dy);
                roots.push(id.clone());
            }
        }
        self.revision += 1;
        self.propagate(roots);
        Ok(())
    }

    /// Replace every point of a line.
    ///
    /// Only the first and last point may be attached; references held by
    /// waypoints are dropped. Endpoint targets must exist, accept line
    /// attachments and not be anchors of this very line.
    pub fn set_line_points(&mut self, id: &ElementId, points: Vec<LinePoint>) -> Result<()> {
        let element = self.require(id)?;
        let Some(line) = element.as_line() else {
            return Err(ModelError::capability(id, element.object_type(), "hold line points"));
        };
        if points.len() < 2 {
            return Err(ModelError::TooFewPoints);
        }
        let mut points = points;
        let last = points.len() - 1;
        for p in &mut points[1..last] {
            p.element_ref = None;
        }
        for end in [LineEnd::Start, LineEnd::End] {
            let point = if end == LineEnd::Start { &points[0] } else { &points[last] };
            if let Some(target) = &point.element_ref {
                self.check_attachable(id, end, target)?;
            }
        }

        let old_refs: Vec<(RefSlot, ElementId)> = [LineEnd::Start, LineEnd::End]
            .into_iter()
            .filter_map(|end| line.point(end).element_ref.clone().map(|t| (RefSlot::Line(end), t)))
            .collect();
        self.refs.remove_all(id, &old_refs);
        for (end, point) in [(LineEnd::Start, &points[0]), (LineEnd::End, &points[last])] {
            if let Some(target) = &point.element_ref {
                self.refs.insert(id, RefSlot::Line(end), target);
            }
        }
        if let Some(line) = self.elements.get_mut(id).and_then(|e| e.as_line_mut()) {
            line.points = points;
        }
        self.events.push(ModelEvent::ElementChanged(id.clone()));
        self.revision += 1;
        self.propagate(vec![id.clone()]);
        Ok(())
    }

    /// Attach one end of a line to `target` at relative coordinates, or
    /// detach it with `None`. A detached end stays where it currently is.
    pub fn link_line_end(
        &mut self,
        id: &ElementId,
        end: LineEnd,
        target: Option<&ElementId>,
        rel_x: f64,
        rel_y: f64,
    ) -> Result<()> {
        let element = self.require(id)?;
        let Some(line) = element.as_line() else {
            return Err(ModelError::capability(id, element.object_type(), "attach to elements"));
        };
        let current = self.resolve_end(line.point(end)).point;
        let mut points = line.points.clone();
        let index = match end {
            LineEnd::Start => 0,
            LineEnd::End => points.len() - 1,
        };
        let p = &mut points[index];
        p.x = current.x;
        p.y = current.y;
        match target {
            Some(t) => {
                p.element_ref = Some(t.clone());
                p.rel_x = rel_x.clamp(-1.0, 1.0);
                p.rel_y = rel_y.clamp(-1.0, 1.0);
            }
            None => p.unlink(),
        }
        self.set_line_points(id, points)
    }

    /// Move a free line point to an absolute position.
    pub fn set_line_point_position(&mut self, id: &ElementId, index: usize, position: Point) -> Result<()> {
        let element = self.require(id)?;
        let object_type = element.object_type();
        let Some(line) = element.as_line() else {
            return Err(ModelError::capability(id, object_type, "hold line points"));
        };
        let mut points = line.points.clone();
        let Some(p) = points.get_mut(index) else {
            return Err(ModelError::capability(id, object_type, "address a point past its last one"));
        };
        p.unlink();
        p.x = position.x;
        p.y = position.y;
        self.set_line_points(id, points)
    }

    pub fn set_connector_type(&mut self, id: &ElementId, connector_type: ConnectorType) -> Result<()> {
        let element = self.require(id)?;
        let object_type = element.object_type();
        let Some(line) = self.elements.get_mut(id).and_then(|e| e.as_line_mut()) else {
            return Err(ModelError::capability(id, object_type, "have a connector type"));
        };
        if line.connector_type == connector_type {
            return Ok(());
        }
        line.connector_type = connector_type;
        self.events.push(ModelEvent::ElementChanged(id.clone()));
        self.revision += 1;
        self.propagate(vec![id.clone()]);
        Ok(())
    }

    /// Move an anchor along its host line; `position` is clamped to [0, 1].
    pub fn set_anchor_position(&mut self, id: &ElementId, position: f64) -> Result<()> {
        let element = self.require(id)?;
        let object_type = element.object_type();
        match self.elements.get_mut(id).map(|e| &mut e.kind) {
            Some(ElementKind::Anchor(anchor)) => anchor.position = position.clamp(0.0, 1.0),
            _ => return Err(ModelError::capability(id, object_type, "slide along a line")),
        }
        self.events.push(ModelEvent::ElementChanged(id.clone()));
        self.revision += 1;
        self.propagate(vec![id.clone()]);
        Ok(())
    }

    /// Reposition a state on its data node.
    pub fn set_state_position(&mut self, id: &ElementId, rel_x: f64, rel_y: f64) -> Result<()> {
        let element = self.require(id)?;
        let object_type = element.object_type();
        match self.elements.get_mut(id).map(|e| &mut e.kind) {
            Some(ElementKind::State(state)) => {
                state.rel_x = rel_x;
                state.rel_y = rel_y;
            }
            _ => return Err(ModelError::capability(id, object_type, "be placed on a data node")),
        }
        self.revision += 1;
        self.propagate(vec![id.clone()]);
        Ok(())
    }

    fn check_attachable(&self, line: &ElementId, end: LineEnd, target: &ElementId) -> Result<()> {
        let t = self.require(target)?;
        if target == line || !slot_accepts(RefSlot::Line(end), t.object_type()) {
            return Err(ModelError::capability(target, t.object_type(), "be a line endpoint target"));
        }
        if self.is_own_anchor(line, RefSlot::Line(end), target) {
            return Err(ModelError::SelfAnchor {
                line: line.clone(),
                anchor: target.clone(),
            });
        }
        Ok(())
    }

    /// Detach every line endpoint attached to `target`, pinning it at the
    /// position it currently resolves to. Returns the affected lines.
    pub(super) fn freeze_endpoints_at(&mut self, target: &ElementId) -> Vec<ElementId> {
        let attached: Vec<_> = self
            .refs
            .referrers(target)
            .filter(|r| matches!(r.slot, RefSlot::Line(_)))
            .cloned()
            .collect();
        let mut lines = Vec::new();
        for r in attached {
            let RefSlot::Line(end) = r.slot else {
                continue;
            };
            let Some(frozen) = self
                .elements
                .get(&r.source)
                .and_then(|e| e.as_line())
                .map(|l| self.resolve_end(l.point(end)).point)
            else {
                continue;
            };
            if let Some(line) = self.elements.get_mut(&r.source).and_then(|e| e.as_line_mut()) {
                let p = line.point_mut(end);
                p.unlink();
                p.x = frozen.x;
                p.y = frozen.y;
            }
            self.refs.remove(&r.source, r.slot, target);
            trace!(line = %r.source, x = frozen.x, y = frozen.y, "froze endpoint");
            self.events.push(ModelEvent::ElementChanged(r.source.clone()));
            lines.push(r.source);
        }
        lines
    }

    // ──────────────────────────────────────────────────────────────────────
    // Propagation
    // ──────────────────────────────────────────────────────────────────────

    /// Re-derive the geometry of `roots` and of everything depending on them.
    ///
    /// Roots whose stored geometry was just changed always report a
    /// geometry change; derived elements only do when their value moved.
    pub(crate) fn propagate(&mut self, roots: Vec<ElementId>) {
        let mut roots: Vec<ElementId> = roots
            .into_iter()
            .collect::<IndexSet<_>>()
            .into_iter()
            .collect();
        roots.sort_by_key(|id| self.derive_rank(id));

        let mut forced: HashSet<ElementId> = roots.iter().cloned().collect();
        let mut pending: HashSet<ElementId> = forced.clone();
        let mut queue: VecDeque<ElementId> = roots.into();
        let mut visits: HashMap<ElementId, u32> = HashMap::new();

        while let Some(id) = queue.pop_front() {
            pending.remove(&id);
            if !self.elements.contains_key(&id) {
                continue;
            }
            let n = visits.entry(id.clone()).or_default();
            *n += 1;
            if *n > MAX_VISITS {
                warn!(element = %id, "geometry did not settle, giving up on further updates");
                continue;
            }

            let is_root = forced.remove(&id);
            let changed = self.rederive(&id, is_root);
            if !changed {
                continue;
            }
            self.events.push(ModelEvent::GeometryChanged(id.clone()));
            for dep in self.geometry_dependents(&id) {
                if pending.insert(dep.clone()) {
                    queue.push_back(dep);
                }
            }
        }
    }

    /// Processing order for a batch of roots: stored geometry first, then
    /// groups innermost first, then lines, then anchors.
    fn derive_rank(&self, id: &ElementId) -> (u8, std::cmp::Reverse<usize>) {
        let Some(t) = self.elements.get(id).map(|e| e.object_type()) else {
            return (9, std::cmp::Reverse(0));
        };
        match t {
            ObjectType::DataNode | ObjectType::Label | ObjectType::Shape => (0, std::cmp::Reverse(0)),
            ObjectType::State => (1, std::cmp::Reverse(0)),
            ObjectType::Group => (2, std::cmp::Reverse(self.ancestors(id).len())),
            ObjectType::Interaction | ObjectType::GraphicalLine => (3, std::cmp::Reverse(0)),
            ObjectType::Anchor => (4, std::cmp::Reverse(0)),
            _ => (5, std::cmp::Reverse(0)),
        }
    }

    /// Recompute the derived geometry of one element. Returns true if its
    /// geometry changed.
    fn rederive(&mut self, id: &ElementId, is_root: bool) -> bool {
        let Some(t) = self.elements.get(id).map(|e| e.object_type()) else {
            return false;
        };
        match t {
            ObjectType::Group => {
                let bounds = self.compute_group_bounds(id);
                match self.elements.get_mut(id).and_then(|e| e.as_group_mut()) {
                    Some(g) if g.bounds != bounds => {
                        g.bounds = bounds;
                        true
                    }
                    _ => false,
                }
            }
            ObjectType::Interaction | ObjectType::GraphicalLine => self.reroute(id) || is_root,
            ObjectType::Anchor => self.place_anchor(id) || is_root,
            // positioned on the parent; reached only when the parent moved
            ObjectType::State => true,
            _ => is_root,
        }
    }

    /// Route a line against the current geometry of its targets and write
    /// the resolved endpoint coordinates back to its points.
    fn reroute(&mut self, id: &ElementId) -> bool {
        let Some(line) = self.elements.get(id).and_then(|e| e.as_line()) else {
            return false;
        };
        let start = self.resolve_end(line.start());
        let end = self.resolve_end(line.end());
        let waypoints: Vec<Point> = line.waypoints().iter().map(|p| p.position()).collect();
        let shape = connector::route(line.connector_type, start, end, &waypoints);

        let Some(line) = self.elements.get_mut(id).and_then(|e| e.as_line_mut()) else {
            return false;
        };
        let mut changed = line.shape != shape;
        for (which, resolved) in [(LineEnd::Start, start), (LineEnd::End, end)] {
            let p = line.point_mut(which);
            if p.position() != resolved.point {
                p.x = resolved.point.x;
                p.y = resolved.point.y;
                changed = true;
            }
        }
        line.shape = shape;
        changed
    }

    fn place_anchor(&mut self, id: &ElementId) -> bool {
        let Some(anchor) = self.elements.get(id).and_then(|e| e.as_anchor()) else {
            return false;
        };
        let Some(point) = anchor
            .line
            .as_ref()
            .and_then(|l| self.connector_shape(l))
            .and_then(|shape| shape.point_at_fraction(anchor.position))
        else {
            return false;
        };
        match self.elements.get_mut(id).map(|e| &mut e.kind) {
            Some(ElementKind::Anchor(a)) if a.point != point => {
                a.point = point;
                true
            }
            _ => false,
        }
    }

    /// Elements whose derived geometry reads the geometry of `id`.
    fn geometry_dependents(&self, id: &ElementId) -> Vec<ElementId> {
        let Some(element) = self.elements.get(id) else {
            return Vec::new();
        };
        let mut deps = Vec::new();
        match &element.kind {
            ElementKind::DataNode(node) => deps.extend(node.states.iter().cloned()),
            ElementKind::Interaction(line) | ElementKind::GraphicalLine(line) => {
                deps.extend(line.anchors.iter().cloned())
            }
            _ => {}
        }
        deps.extend(
            self.refs
                .referrers(id)
                .filter(|r| matches!(r.slot, RefSlot::Line(_)))
                .map(|r| r.source.clone()),
        );
        if let Some(g) = &element.group_ref {
            deps.push(g.clone());
        }
        deps
    }
}
