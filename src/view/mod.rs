//! View layer.
//!
//! A [`VPathway`] mirrors a [`PathwayModel`] as a list of [`VElement`]s in
//! natural order. It never mutates element data behind the pathway's back:
//! edits go through pathway mutators, and the view catches up by draining
//! the pathway's events in [`VPathway::sync`] once per turn of the UI loop.
//!
//! Natural order is (tier, z-order, creation sequence): groups, then lines
//! and anchors, shapes, labels, data nodes, states and finally selection
//! handles. Selection never changes it.

pub mod element;
pub mod render;
pub mod selection;

use std::collections::HashMap;

use indexmap::IndexSet;
use tracing::{debug, trace};

use crate::config::EditorConfig;
use crate::error::{ModelError, Result};
use crate::model::{ElementId, LineEnd, ObjectType, Point, Rect};
use crate::pathway::{ModelEvent, PathwayModel};

pub use element::{DrawTier, HandlePosition, VElement, VKey, VKind, VState};
pub use render::{DisplayList, DrawCommand, GraphicsContext};
pub use selection::{SelectionBox, SelectionRect};

/// Hit tolerance for lines, in view pixels.
const HIT_TOLERANCE: f64 = 3.0;

#[derive(Debug, Clone)]
pub struct VPathway {
    elements: HashMap<VKey, VElement>,
    order: Vec<VKey>,
    order_dirty: bool,
    /// Model elements added since the last batch materialization.
    scheduled: IndexSet<ElementId>,
    selection: SelectionBox,
    rubber_band: Option<SelectionRect>,
    dragging: bool,
    zoom: f64,
    handle_size: f64,
    next_seq: u64,
}

impl VPathway {
    /// Build a view of every graphical element of `model`.
    pub fn from_model(model: &PathwayModel, config: &EditorConfig) -> Self {
        let mut view = VPathway {
            elements: HashMap::with_capacity(model.len()),
            order: Vec::with_capacity(model.len()),
            order_dirty: true,
            scheduled: IndexSet::new(),
            selection: SelectionBox::new(),
            rubber_band: None,
            dragging: false,
            zoom: if config.zoom > 0.0 { config.zoom } else { 1.0 },
            handle_size: config.handle_size,
            next_seq: 0,
        };
        view.materialize(model, model.ids().cloned().collect::<Vec<_>>());
        view
    }

    fn materialize(&mut self, model: &PathwayModel, ids: Vec<ElementId>) {
        for id in ids {
            let key = VKey::Element(id.clone());
            if self.elements.contains_key(&key) {
                continue;
            }
            let Some(element) = model.get_element(&id) else {
                continue;
            };
            if let Some(v) = VElement::from_model(element, model, self.zoom, self.next_seq) {
                self.next_seq += 1;
                self.elements.insert(key.clone(), v);
                self.order.push(key);
                self.order_dirty = true;
            }
        }
        self.sort();
    }

    fn sort(&mut self) {
        if !self.order_dirty {
            return;
        }
        let elements = &self.elements;
        self.order
            .sort_by_key(|k| elements.get(k).map(|v| v.order_key()));
        self.order_dirty = false;
    }

    // ──────────────────────────────────────────────────────────────────────
    // Model synchronization
    // ──────────────────────────────────────────────────────────────────────

    /// Drain the pathway's pending events and bring the view up to date.
    pub fn sync(&mut self, model: &mut PathwayModel) {
        let events = model.drain_events();
        self.apply_events(model, &events);
    }

    /// Mirror a batch of model events. Added elements are scheduled and
    /// materialized together at the end of the batch.
    pub fn apply_events(&mut self, model: &PathwayModel, events: &[ModelEvent]) {
        for event in events {
            match event {
                ModelEvent::ElementAdded(id) => {
                    self.scheduled.insert(id.clone());
                }
                ModelEvent::ElementRemoved { id, .. } => {
                    self.scheduled.shift_remove(id);
                    self.drop_element(id);
                }
                ModelEvent::ElementChanged(id)
                | ModelEvent::GeometryChanged(id)
                | ModelEvent::MembershipChanged { group: id } => {
                    self.refresh(model, id);
                }
                ModelEvent::Resync => {
                    debug!("rebuilding view after event overflow");
                    self.rebuild(model);
                    return;
                }
            }
        }
        self.add_scheduled(model);
        self.update_selection_decorations();
    }

    /// Materialize every scheduled element in one batch.
    pub fn add_scheduled(&mut self, model: &PathwayModel) {
        if self.scheduled.is_empty() {
            return;
        }
        let ids: Vec<ElementId> = self.scheduled.drain(..).collect();
        trace!(count = ids.len(), "materializing scheduled elements");
        self.materialize(model, ids);
    }

    fn refresh(&mut self, model: &PathwayModel, id: &ElementId) {
        let Some(element) = model.get_element(id) else {
            return;
        };
        if let Some(v) = self.elements.get_mut(&VKey::Element(id.clone())) {
            if v.refresh(element, model, self.zoom) {
                self.order_dirty = true;
            }
        }
        self.sort();
    }

    /// Throw away every view element and rebuild from the pathway, keeping
    /// the selection where its elements still exist.
    pub fn rebuild(&mut self, model: &PathwayModel) {
        let selected = self.selection.take();
        self.elements.clear();
        self.order.clear();
        self.scheduled.clear();
        self.materialize(model, model.ids().cloned().collect());
        for id in selected {
            self.add_to_selection(&id);
        }
    }

    fn drop_element(&mut self, id: &ElementId) {
        self.remove_handles(id);
        self.selection.remove(id);
        let key = VKey::Element(id.clone());
        if self.elements.remove(&key).is_some() {
            self.order.retain(|k| k != &key);
        }
    }

    /// Remove the view of one element. With `also_delete_model` the model
    /// element is removed too (with its cascade); otherwise it survives and
    /// reappears on the next rebuild.
    pub fn remove_drawing_object(
        &mut self,
        model: &mut PathwayModel,
        id: &ElementId,
        also_delete_model: bool,
    ) -> Result<()> {
        self.remove_drawing_objects(model, std::slice::from_ref(id), also_delete_model)
    }

    pub fn remove_drawing_objects(
        &mut self,
        model: &mut PathwayModel,
        ids: &[ElementId],
        also_delete_model: bool,
    ) -> Result<()> {
        for id in ids {
            if !model.contains(id) {
                return Err(ModelError::UnknownElement(id.clone()));
            }
        }
        for id in ids {
            self.drop_element(id);
        }
        if also_delete_model {
            model.remove_all(ids);
            self.sync(model);
        }
        self.update_selection_decorations();
        Ok(())
    }

    // ──────────────────────────────────────────────────────────────────────
    // Queries
    // ──────────────────────────────────────────────────────────────────────

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    pub fn zoom(&self) -> f64 {
        self.zoom
    }

    pub fn get(&self, id: &ElementId) -> Option<&VElement> {
        self.elements.get(&VKey::Element(id.clone()))
    }

    pub fn get_key(&self, key: &VKey) -> Option<&VElement> {
        self.elements.get(key)
    }

    /// Whether `id` is waiting to be materialized.
    pub fn is_scheduled(&self, id: &ElementId) -> bool {
        self.scheduled.contains(id)
    }

    /// View elements in natural (draw) order.
    pub fn natural_order(&self) -> impl Iterator<Item = &VElement> {
        self.order.iter().filter_map(|k| self.elements.get(k))
    }

    /// Model ids in natural order, handles skipped.
    pub fn ordered_ids(&self) -> Vec<ElementId> {
        self.natural_order()
            .filter_map(|v| v.element_id().cloned())
            .collect()
    }

    /// Topmost view element under a view-space point.
    pub fn element_at(&self, p: Point) -> Option<&VElement> {
        self.order
            .iter()
            .rev()
            .filter_map(|k| self.elements.get(k))
            .find(|v| v.hit(p, HIT_TOLERANCE))
    }

    pub fn to_view(&self, p: Point) -> Point {
        p.scale(self.zoom)
    }

    pub fn to_model(&self, p: Point) -> Point {
        p.scale(1.0 / self.zoom)
    }

    /// Change the zoom factor and re-derive every view-space value.
    pub fn set_zoom(&mut self, model: &PathwayModel, zoom: f64) {
        if zoom <= 0.0 || zoom == self.zoom {
            return;
        }
        self.zoom = zoom;
        for (key, v) in self.elements.iter_mut() {
            let VKey::Element(id) = key else {
                continue;
            };
            if let Some(element) = model.get_element(id) {
                v.refresh(element, model, zoom);
            }
        }
        self.update_selection_decorations();
    }

    /// Draw every element in natural order.
    pub fn render(&self, ctx: &mut dyn GraphicsContext) {
        for v in self.natural_order() {
            v.render(ctx);
        }
    }

    // ──────────────────────────────────────────────────────────────────────
    // Selection
    // ──────────────────────────────────────────────────────────────────────

    pub fn selection(&self) -> &SelectionBox {
        &self.selection
    }

    pub fn selected_ids(&self) -> Vec<ElementId> {
        self.selection.ids()
    }

    /// Select exactly `id`.
    pub fn select_only(&mut self, id: &ElementId) {
        self.clear_selection();
        self.add_to_selection(id);
    }

    pub fn add_to_selection(&mut self, id: &ElementId) {
        let Some(v) = self.elements.get_mut(&VKey::Element(id.clone())) else {
            return;
        };
        v.select();
        if self.selection.insert(id.clone()) {
            self.add_handles(id);
            self.update_selection_decorations();
        }
    }

    pub fn deselect(&mut self, id: &ElementId) {
        if let Some(v) = self.elements.get_mut(&VKey::Element(id.clone())) {
            v.deselect();
        }
        if self.selection.remove(id) {
            self.remove_handles(id);
            self.update_selection_decorations();
        }
    }

    pub fn toggle_selection(&mut self, id: &ElementId) {
        if self.selection.contains(id) {
            self.deselect(id);
        } else {
            self.add_to_selection(id);
        }
    }

    /// Deselect everything and drop every handle.
    pub fn clear_selection(&mut self) {
        for id in self.selection.take() {
            if let Some(v) = self.elements.get_mut(&VKey::Element(id.clone())) {
                v.deselect();
            }
            self.remove_handles(&id);
        }
        self.dragging = false;
    }

    pub fn select_all(&mut self) {
        let ids = self.ordered_ids();
        for id in ids {
            self.add_to_selection(&id);
        }
    }

    /// Begin a rubber-band selection at a view-space point.
    pub fn start_rect(&mut self, p: Point) {
        self.rubber_band = Some(SelectionRect::new(p));
    }

    pub fn update_rect(&mut self, p: Point) {
        if let Some(r) = &mut self.rubber_band {
            r.update(p);
        }
    }

    pub fn rubber_band(&self) -> Option<&SelectionRect> {
        self.rubber_band.as_ref()
    }

    /// Finish the rubber band: select every element it overlaps, promoted to
    /// its outermost group. Tiny bands are ignored.
    pub fn finish_rect(&mut self, model: &PathwayModel) {
        let Some(rect) = self.rubber_band.take() else {
            return;
        };
        if !rect.is_meaningful() {
            return;
        }
        self.clear_selection();
        let hits: IndexSet<ElementId> = self
            .natural_order()
            .filter(|v| !v.is_handle() && rect.overlaps(&v.bounds()))
            .filter_map(|v| v.element_id())
            .map(|id| model.top_level(id))
            .collect();
        for id in hits {
            self.add_to_selection(&id);
        }
    }

    fn add_handles(&mut self, id: &ElementId) {
        let Some(v) = self.elements.get(&VKey::Element(id.clone())) else {
            return;
        };
        let positions: Vec<(HandlePosition, Point)> = match v.kind() {
            VKind::DataNode | VKind::Label | VKind::Shape { .. } => HandlePosition::RESIZE
                .iter()
                .map(|h| {
                    let (rx, ry) = h.relative();
                    (*h, v.bounds().relative_point(rx, ry))
                })
                .collect(),
            VKind::Line { shape, .. } => match (shape.start(), shape.end()) {
                (Some(s), Some(e)) => vec![(HandlePosition::LineStart, s), (HandlePosition::LineEnd, e)],
                _ => Vec::new(),
            },
            _ => Vec::new(),
        };
        for (position, center) in positions {
            let handle = VElement::handle(id, position, center, self.handle_size, self.next_seq);
            self.next_seq += 1;
            let key = handle.key().clone();
            self.elements.insert(key.clone(), handle);
            self.order.push(key);
            self.order_dirty = true;
        }
        self.sort();
    }

    fn remove_handles(&mut self, id: &ElementId) {
        let before = self.order.len();
        self.order
            .retain(|k| !matches!(k, VKey::Handle { owner, .. } if owner == id));
        if self.order.len() != before {
            self.elements
                .retain(|k, _| !matches!(k, VKey::Handle { owner, .. } if owner == id));
        }
    }

    /// Re-place handles on their owners and recompute the selection bounds.
    fn update_selection_decorations(&mut self) {
        let selected = self.selection.ids();
        let mut bounds: Option<Rect> = None;
        for id in &selected {
            let Some(owner) = self.elements.get(&VKey::Element(id.clone())) else {
                continue;
            };
            let b = owner.bounds();
            bounds = Some(bounds.map_or(b, |acc| acc.union(&b)));
            let owner_bounds = owner.bounds();
            let line_ends = match owner.kind() {
                VKind::Line { shape, .. } => (shape.start(), shape.end()),
                _ => (None, None),
            };
            let size = self.handle_size;
            for (key, handle) in self.elements.iter_mut() {
                let VKey::Handle { owner, position } = key else {
                    continue;
                };
                if owner != id {
                    continue;
                }
                let center = match position {
                    HandlePosition::LineStart => line_ends.0,
                    HandlePosition::LineEnd => line_ends.1,
                    other => {
                        let (rx, ry) = other.relative();
                        Some(owner_bounds.relative_point(rx, ry))
                    }
                };
                if let Some(c) = center {
                    handle.set_bounds(Rect::from_center(c.x, c.y, size, size));
                }
            }
        }
        self.selection.set_bounds(bounds);
    }

    // ──────────────────────────────────────────────────────────────────────
    // Dragging
    // ──────────────────────────────────────────────────────────────────────

    pub fn is_dragging(&self) -> bool {
        self.dragging
    }

    /// Put every selected element into the dragging state.
    pub fn start_drag(&mut self) -> bool {
        if self.selection.is_empty() {
            return false;
        }
        for id in self.selection.ids() {
            if let Some(v) = self.elements.get_mut(&VKey::Element(id)) {
                v.start_drag();
            }
        }
        self.dragging = true;
        true
    }

    /// Move the selection by a view-space delta. Each moved element's
    /// geometry event reroutes its connectors, so the view is live for the
    /// whole gesture.
    pub fn drag_by(&mut self, model: &mut PathwayModel, dx: f64, dy: f64) -> Result<()> {
        if !self.dragging {
            return Ok(());
        }
        let ids = self.selection.ids();
        model.move_elements(&ids, dx / self.zoom, dy / self.zoom)?;
        self.sync(model);
        Ok(())
    }

    pub fn end_drag(&mut self) {
        for id in self.selection.ids() {
            if let Some(v) = self.elements.get_mut(&VKey::Element(id)) {
                v.end_drag();
            }
        }
        self.dragging = false;
    }

    /// Drag a selection handle by a view-space delta: resize its owner or
    /// move the line end it sits on.
    pub fn drag_handle(
        &mut self,
        model: &mut PathwayModel,
        owner: &ElementId,
        position: HandlePosition,
        dx: f64,
        dy: f64,
    ) -> Result<()> {
        let (mdx, mdy) = (dx / self.zoom, dy / self.zoom);
        match position {
            HandlePosition::LineStart | HandlePosition::LineEnd => {
                let end = if position == HandlePosition::LineStart {
                    LineEnd::Start
                } else {
                    LineEnd::End
                };
                let Some(current) = model.line_end_position(owner, end) else {
                    return Err(ModelError::UnknownElement(owner.clone()));
                };
                let index = match end {
                    LineEnd::Start => 0,
                    LineEnd::End => model
                        .get_element(owner)
                        .and_then(|e| e.as_line())
                        .map_or(1, |l| l.points.len() - 1),
                };
                model.set_line_point_position(owner, index, current.offset(mdx, mdy))?;
            }
            _ => {
                let element = model
                    .get_element(owner)
                    .ok_or_else(|| ModelError::UnknownElement(owner.clone()))?;
                let object_type = element.object_type();
                let Some(bounds) = element.shaped_bounds().filter(|_| {
                    matches!(object_type, ObjectType::DataNode | ObjectType::Label | ObjectType::Shape)
                }) else {
                    return Err(ModelError::capability(owner, object_type, "be resized"));
                };
                model.set_bounds(owner, position.resize(bounds, mdx, mdy))?;
            }
        }
        self.sync(model);
        Ok(())
    }
}
