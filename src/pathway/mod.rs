//! The pathway aggregate.
//!
//! [`PathwayModel`] owns every element of one pathway in insertion order and
//! is the only place element data is mutated. Each mutator validates first,
//! then updates the element, its indices and every derived value (group
//! bounds, connector shapes, anchor positions) and queues [`ModelEvent`]s
//! describing what changed.

mod events;
mod geometry;
mod group;
mod refs;
mod snapshot;

use std::collections::{BTreeMap, HashMap, HashSet};

use indexmap::{IndexMap, IndexSet};
use tracing::{debug, warn};

use crate::config::EditorConfig;
use crate::error::{ModelError, Result};
use crate::model::{
    Citation, DataNodeType, ElementId, ElementKind, ObjectType, PathwayElement, PathwayInfo,
    RefSlot,
};

pub use events::{EventQueue, ModelEvent};
pub use refs::Referrer;
pub use snapshot::{PathwayDoc, PathwaySnapshot};

use refs::{RefIndex, slot_accepts};

#[derive(Debug, Clone)]
pub struct PathwayModel {
    elements: IndexMap<ElementId, PathwayElement>,
    by_type: BTreeMap<ObjectType, IndexSet<ElementId>>,
    refs: RefIndex,
    next_id: u64,
    revision: u64,
    events: EventQueue,
    config: EditorConfig,
}

impl Default for PathwayModel {
    fn default() -> Self {
        Self::new()
    }
}

impl PathwayModel {
    pub fn new() -> Self {
        Self::with_config(EditorConfig::default())
    }

    pub fn with_config(config: EditorConfig) -> Self {
        Self {
            elements: IndexMap::new(),
            by_type: BTreeMap::new(),
            refs: RefIndex::default(),
            next_id: 1,
            revision: 0,
            events: EventQueue::new(config.event_capacity),
            config,
        }
    }

    // ──────────────────────────────────────────────────────────────────────
    // Queries
    // ──────────────────────────────────────────────────────────────────────

    pub fn config(&self) -> &EditorConfig {
        &self.config
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    /// Incremented by every mutation. Used to detect edits made outside the
    /// undo history.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn get_element(&self, id: &ElementId) -> Option<&PathwayElement> {
        self.elements.get(id)
    }

    pub fn contains(&self, id: &ElementId) -> bool {
        self.elements.contains_key(id)
    }

    /// Elements in insertion order.
    pub fn elements(&self) -> impl Iterator<Item = &PathwayElement> {
        self.elements.values()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&ElementId, &PathwayElement)> {
        self.elements.iter()
    }

    pub fn ids(&self) -> impl Iterator<Item = &ElementId> {
        self.elements.keys()
    }

    /// Insertion position of an element.
    pub fn index_of(&self, id: &ElementId) -> Option<usize> {
        self.elements.get_index_of(id)
    }

    pub fn of_type(&self, object_type: ObjectType) -> impl Iterator<Item = &PathwayElement> {
        self.by_type
            .get(&object_type)
            .into_iter()
            .flatten()
            .filter_map(|id| self.elements.get(id))
    }

    pub fn count(&self, object_type: ObjectType) -> usize {
        self.by_type.get(&object_type).map_or(0, |ids| ids.len())
    }

    /// Per-type element counts, skipping empty types.
    pub fn type_counts(&self) -> BTreeMap<ObjectType, usize> {
        self.by_type
            .iter()
            .filter(|(_, ids)| !ids.is_empty())
            .map(|(t, ids)| (*t, ids.len()))
            .collect()
    }

    /// The pathway info element, if present.
    pub fn info(&self) -> Option<&PathwayInfo> {
        self.of_type(ObjectType::Pathway).find_map(|e| match &e.kind {
            ElementKind::Pathway(info) => Some(info),
            _ => None,
        })
    }

    /// Elements holding a line, alias or literature reference to `target`.
    pub fn referrers(&self, target: &ElementId) -> Vec<Referrer> {
        self.refs.referrers(target).cloned().collect()
    }

    pub fn drain_events(&mut self) -> Vec<ModelEvent> {
        self.events.drain()
    }

    pub fn has_pending_events(&self) -> bool {
        !self.events.is_empty()
    }

    fn require(&self, id: &ElementId) -> Result<&PathwayElement> {
        self.elements
            .get(id)
            .ok_or_else(|| ModelError::UnknownElement(id.clone()))
    }

    // ──────────────────────────────────────────────────────────────────────
    // Identity
    // ──────────────────────────────────────────────────────────────────────

    /// Generate an id that is neither used in this pathway nor in `reserved`,
    /// advancing `counter`.
    pub fn unused_id(&self, counter: &mut u64, reserved: &HashSet<ElementId>) -> ElementId {
        loop {
            let id = ElementId::new(format!("id{:x}", *counter));
            *counter += 1;
            if !self.elements.contains_key(&id) && !reserved.contains(&id) {
                return id;
            }
        }
    }

    /// Counter value the next generated id starts from.
    pub fn id_counter(&self) -> u64 {
        self.next_id
    }

    fn generate_id(&mut self, reserved: &HashSet<ElementId>) -> ElementId {
        let mut counter = self.next_id;
        let id = self.unused_id(&mut counter, reserved);
        self.next_id = counter;
        id
    }

    // ──────────────────────────────────────────────────────────────────────
    // Add
    // ──────────────────────────────────────────────────────────────────────

    /// Add one element; see [`PathwayModel::add_all`].
    pub fn add(&mut self, element: PathwayElement) -> Result<ElementId> {
        self.add_all(vec![element]).map(|mut ids| ids.remove(0))
    }

    /// Add a batch of elements.
    ///
    /// Elements without an id get a fresh one. The batch is all-or-nothing:
    /// a duplicate id, a second pathway info element, a line with fewer than
    /// two points or a state/anchor without its parent rejects the whole
    /// batch and leaves the pathway untouched.
    ///
    /// References may point at elements added in the same batch. References
    /// that resolve to nothing (or to an element of the wrong kind) are
    /// dropped with a warning. Derived values are computed once after every
    /// element is linked, so a line is never routed against a half-added
    /// target.
    pub fn add_all(&mut self, elements: Vec<PathwayElement>) -> Result<Vec<ElementId>> {
        let mut claimed: HashSet<ElementId> = HashSet::new();
        let mut infos = self.count(ObjectType::Pathway);
        for e in &elements {
            if let Some(id) = e.id() {
                if self.elements.contains_key(id) || !claimed.insert(id.clone()) {
                    return Err(ModelError::DuplicateId(id.clone()));
                }
            }
            if e.object_type() == ObjectType::Pathway {
                infos += 1;
                if infos > 1 {
                    return Err(ModelError::DuplicatePathwayInfo);
                }
            }
            if e.as_line().is_some_and(|l| l.points.len() < 2) {
                return Err(ModelError::TooFewPoints);
            }
        }

        let batch_types: HashMap<&ElementId, ObjectType> = elements
            .iter()
            .filter_map(|e| e.id().map(|id| (id, e.object_type())))
            .collect();
        let type_of = |id: &ElementId| {
            batch_types
                .get(id)
                .copied()
                .or_else(|| self.elements.get(id).map(|e| e.object_type()))
        };
        for e in &elements {
            match &e.kind {
                ElementKind::State(s)
                    if s.parent.as_ref().and_then(type_of) != Some(ObjectType::DataNode) =>
                {
                    return Err(ModelError::MissingParent {
                        child: ObjectType::State,
                    });
                }
                ElementKind::Anchor(a)
                    if !a.line.as_ref().and_then(type_of).is_some_and(|t| t.is_line()) =>
                {
                    return Err(ModelError::MissingParent {
                        child: ObjectType::Anchor,
                    });
                }
                _ => {}
            }
        }

        // validated: from here on nothing fails
        let mut ids = Vec::with_capacity(elements.len());
        for mut element in elements {
            let id = match element.id.clone() {
                Some(id) => id,
                None => {
                    let id = self.generate_id(&claimed);
                    claimed.insert(id.clone());
                    element.id = Some(id.clone());
                    id
                }
            };
            clear_derived(&mut element);
            self.by_type
                .entry(element.object_type())
                .or_default()
                .insert(id.clone());
            self.elements.insert(id.clone(), element);
            ids.push(id);
        }

        self.break_group_cycles(&ids);
        for id in &ids {
            self.link(id);
        }
        for id in &ids {
            self.events.push(ModelEvent::ElementAdded(id.clone()));
        }
        debug!(count = ids.len(), "added elements");
        self.revision += 1;
        self.propagate(ids.clone());
        Ok(ids)
    }

    /// Resolve and index the outgoing references of a freshly inserted
    /// element, and register it with its group, parent node or host line.
    fn link(&mut self, id: &ElementId) {
        let Some(element) = self.elements.get(id) else {
            return;
        };
        let mut dangling = Vec::new();
        for (slot, target) in element.references() {
            let ok = match self.elements.get(&target) {
                Some(t) => {
                    slot_accepts(slot, t.object_type())
                        && &target != id
                        && !self.is_own_anchor(id, slot, &target)
                }
                None => false,
            };
            if !ok {
                dangling.push((slot, target));
            }
        }
        if let Some(element) = self.elements.get_mut(id) {
            for (slot, target) in &dangling {
                warn!(element = %id, target = %target, ?slot, "dropping unresolvable reference");
                element.clear_reference(*slot, target);
            }
        }

        let Some(element) = self.elements.get(id) else {
            return;
        };
        let refs = element.references();
        self.refs.insert_all(id, &refs);

        let group = element.group_ref.clone();
        let parent = match &element.kind {
            ElementKind::State(s) => s.parent.clone(),
            ElementKind::Anchor(a) => a.line.clone(),
            _ => None,
        };

        if let Some(g) = group {
            if let Some(group) = self.elements.get_mut(&g).and_then(|e| e.as_group_mut()) {
                group.members.insert(id.clone());
                self.events.push(ModelEvent::MembershipChanged { group: g });
            }
        }
        if let Some(p) = parent {
            match self.elements.get_mut(&p).map(|e| &mut e.kind) {
                Some(ElementKind::DataNode(node)) if !node.states.contains(id) => {
                    node.states.push(id.clone())
                }
                Some(ElementKind::Interaction(line) | ElementKind::GraphicalLine(line))
                    if !line.anchors.contains(id) =>
                {
                    line.anchors.push(id.clone())
                }
                _ => {}
            }
        }
    }

    /// True if `target` is an anchor hosted by the line `line` itself.
    fn is_own_anchor(&self, line: &ElementId, slot: RefSlot, target: &ElementId) -> bool {
        matches!(slot, RefSlot::Line(_))
            && self
                .elements
                .get(target)
                .and_then(|e| e.as_anchor())
                .is_some_and(|a| a.line.as_ref() == Some(line))
    }

    // ──────────────────────────────────────────────────────────────────────
    // Remove
    // ──────────────────────────────────────────────────────────────────────

    /// Remove an element and return it, detached.
    ///
    /// States of a data node and anchors of a line are removed first.
    /// Removing a group moves its members up to the group's own parent and
    /// freezes every line endpoint attached to it at its current position.
    /// Any other reference to the removed element is cleared.
    pub fn remove(&mut self, id: &ElementId) -> Result<PathwayElement> {
        let element = self.require(id)?;
        let object_type = element.object_type();
        let children: Vec<ElementId> = match &element.kind {
            ElementKind::DataNode(node) => node.states.clone(),
            ElementKind::Interaction(line) | ElementKind::GraphicalLine(line) => {
                line.anchors.clone()
            }
            _ => Vec::new(),
        };
        for child in &children {
            self.remove(child)?;
        }

        let mut roots = Vec::new();
        if object_type == ObjectType::Group {
            roots.extend(self.freeze_endpoints_at(id));
            roots.extend(self.dissolve_group(id));
        }

        for referrer in self.refs.take(id) {
            if let Some(source) = self.elements.get_mut(&referrer.source) {
                if source.clear_reference(referrer.slot, id) {
                    debug!(source = %referrer.source, target = %id, slot = ?referrer.slot, "cleared reference to removed element");
                    self.events.push(ModelEvent::ElementChanged(referrer.source.clone()));
                    if matches!(referrer.slot, RefSlot::Line(_)) {
                        roots.push(referrer.source);
                    }
                }
            }
        }

        let Some(removed) = self.elements.shift_remove(id) else {
            return Err(ModelError::UnknownElement(id.clone()));
        };
        self.refs.remove_all(id, &removed.references());
        if let Some(ids) = self.by_type.get_mut(&object_type) {
            ids.shift_remove(id);
        }

        if let Some(g) = &removed.group_ref {
            if let Some(group) = self.elements.get_mut(g).and_then(|e| e.as_group_mut()) {
                group.members.shift_remove(id);
                self.events
                    .push(ModelEvent::MembershipChanged { group: g.clone() });
                roots.push(g.clone());
            }
        }
        let parent = match &removed.kind {
            ElementKind::State(s) => s.parent.clone(),
            ElementKind::Anchor(a) => a.line.clone(),
            _ => None,
        };
        if let Some(p) = parent {
            match self.elements.get_mut(&p).map(|e| &mut e.kind) {
                Some(ElementKind::DataNode(node)) => node.states.retain(|s| s != id),
                Some(ElementKind::Interaction(line) | ElementKind::GraphicalLine(line)) => {
                    line.anchors.retain(|a| a != id)
                }
                _ => {}
            }
        }

        self.events.push(ModelEvent::ElementRemoved {
            id: id.clone(),
            object_type,
        });
        debug!(element = %id, ?object_type, "removed element");
        self.revision += 1;
        self.propagate(roots);
        Ok(removed)
    }

    /// Remove several elements. Ids already gone (for instance states removed
    /// with their data node) are skipped.
    pub fn remove_all(&mut self, ids: &[ElementId]) -> Vec<PathwayElement> {
        let mut removed = Vec::with_capacity(ids.len());
        for id in ids {
            if let Ok(element) = self.remove(id) {
                removed.push(element);
            }
        }
        removed
    }

    // ──────────────────────────────────────────────────────────────────────
    // Properties
    // ──────────────────────────────────────────────────────────────────────

    fn changed(&mut self, id: &ElementId) {
        self.events.push(ModelEvent::ElementChanged(id.clone()));
        self.revision += 1;
    }

    pub fn set_z_order(&mut self, id: &ElementId, z_order: i32) -> Result<()> {
        let element = self.require(id)?;
        if element.z_order == z_order {
            return Ok(());
        }
        if let Some(e) = self.elements.get_mut(id) {
            e.z_order = z_order;
        }
        self.changed(id);
        Ok(())
    }

    pub fn set_text_label(&mut self, id: &ElementId, text: &str) -> Result<()> {
        let element = self.require(id)?;
        let object_type = element.object_type();
        let Some(e) = self.elements.get_mut(id) else {
            return Err(ModelError::UnknownElement(id.clone()));
        };
        match &mut e.kind {
            ElementKind::DataNode(n) => n.text_label = text.to_string(),
            ElementKind::State(s) => s.text_label = text.to_string(),
            ElementKind::Label(l) => l.text_label = text.to_string(),
            ElementKind::Shape(s) => s.text_label = text.to_string(),
            ElementKind::Group(g) => g.text_label = Some(text.to_string()),
            ElementKind::Pathway(p) => p.title = text.to_string(),
            _ => return Err(ModelError::capability(id, object_type, "carry a text label")),
        }
        self.changed(id);
        Ok(())
    }

    /// Change a data node's type. Leaving [`DataNodeType::Alias`] drops the
    /// alias reference.
    pub fn set_data_node_type(&mut self, id: &ElementId, node_type: DataNodeType) -> Result<()> {
        let element = self.require(id)?;
        let Some(node) = element.as_data_node() else {
            return Err(ModelError::capability(id, element.object_type(), "have a data node type"));
        };
        let dropped_alias = match &node.alias_ref {
            Some(alias) if node_type != DataNodeType::Alias => Some(alias.clone()),
            _ => None,
        };
        if let Some(alias) = &dropped_alias {
            self.refs.remove(id, RefSlot::Alias, alias);
        }
        if let Some(ElementKind::DataNode(node)) = self.elements.get_mut(id).map(|e| &mut e.kind) {
            node.node_type = node_type;
            if dropped_alias.is_some() {
                node.alias_ref = None;
            }
        }
        self.changed(id);
        Ok(())
    }

    /// Point an alias data node at the group it stands in for.
    pub fn set_alias_ref(&mut self, node: &ElementId, group: Option<&ElementId>) -> Result<()> {
        let element = self.require(node)?;
        let Some(data) = element.as_data_node() else {
            return Err(ModelError::capability(node, element.object_type(), "alias a group"));
        };
        if group.is_some() && data.node_type != DataNodeType::Alias {
            return Err(ModelError::capability(node, ObjectType::DataNode, "alias a group unless it is an alias node"));
        }
        let old = data.alias_ref.clone();
        if let Some(g) = group {
            let target = self.require(g)?;
            if target.object_type() != ObjectType::Group {
                return Err(ModelError::capability(g, target.object_type(), "be aliased"));
            }
        }
        if old.as_ref() == group {
            return Ok(());
        }
        if let Some(old) = &old {
            self.refs.remove(node, RefSlot::Alias, old);
        }
        if let Some(g) = group {
            self.refs.insert(node, RefSlot::Alias, g);
        }
        if let Some(ElementKind::DataNode(n)) = self.elements.get_mut(node).map(|e| &mut e.kind) {
            n.alias_ref = group.cloned();
        }
        self.changed(node);
        Ok(())
    }

    pub fn add_citation_ref(&mut self, id: &ElementId, citation: &ElementId) -> Result<()> {
        self.add_literature_ref(id, RefSlot::Citation, citation)
    }

    pub fn add_annotation_ref(&mut self, id: &ElementId, annotation: &ElementId) -> Result<()> {
        self.add_literature_ref(id, RefSlot::Annotation, annotation)
    }

    pub fn add_evidence_ref(&mut self, id: &ElementId, evidence: &ElementId) -> Result<()> {
        self.add_literature_ref(id, RefSlot::Evidence, evidence)
    }

    fn add_literature_ref(&mut self, id: &ElementId, slot: RefSlot, target: &ElementId) -> Result<()> {
        let element = self.require(id)?;
        if !element.object_type().is_annotatable() {
            return Err(ModelError::capability(id, element.object_type(), "hold literature references"));
        }
        let target_type = self.require(target)?.object_type();
        if !slot_accepts(slot, target_type) {
            return Err(ModelError::capability(target, target_type, "be referenced this way"));
        }
        let Some(e) = self.elements.get_mut(id) else {
            return Err(ModelError::UnknownElement(id.clone()));
        };
        let list = match slot {
            RefSlot::Citation => &mut e.citation_refs,
            RefSlot::Annotation => &mut e.annotation_refs,
            _ => &mut e.evidence_refs,
        };
        if list.contains(target) {
            return Ok(());
        }
        list.push(target.clone());
        self.refs.insert(id, slot, target);
        self.changed(id);
        Ok(())
    }

    /// Drop a citation, annotation or evidence reference. Returns whether
    /// anything was removed.
    pub fn remove_literature_ref(&mut self, id: &ElementId, target: &ElementId) -> Result<bool> {
        self.require(id)?;
        let mut removed = false;
        for slot in [RefSlot::Citation, RefSlot::Annotation, RefSlot::Evidence] {
            if let Some(e) = self.elements.get_mut(id) {
                if e.clear_reference(slot, target) {
                    removed = true;
                    self.refs.remove(id, slot, target);
                }
            }
        }
        if removed {
            self.changed(id);
        }
        Ok(removed)
    }

    /// Replace the bibliographic data of a citation element.
    pub fn update_citation(&mut self, id: &ElementId, citation: Citation) -> Result<()> {
        let element = self.require(id)?;
        let object_type = element.object_type();
        match self.elements.get_mut(id).map(|e| &mut e.kind) {
            Some(ElementKind::Citation(c)) => *c = citation,
            _ => return Err(ModelError::capability(id, object_type, "hold citation data")),
        }
        self.changed(id);
        Ok(())
    }

    /// Set the pathway metadata, creating the info element if needed.
    pub fn set_info(&mut self, info: PathwayInfo) -> Result<ElementId> {
        let existing = self
            .by_type
            .get(&ObjectType::Pathway)
            .and_then(|ids| ids.first())
            .cloned();
        match existing {
            Some(id) => {
                if let Some(ElementKind::Pathway(p)) = self.elements.get_mut(&id).map(|e| &mut e.kind) {
                    *p = info;
                }
                self.changed(&id);
                Ok(id)
            }
            None => self.add(PathwayElement::info(info)),
        }
    }

    pub fn set_comments(&mut self, id: &ElementId, comments: Vec<String>) -> Result<()> {
        self.require(id)?;
        if let Some(e) = self.elements.get_mut(id) {
            e.comments = comments;
        }
        self.changed(id);
        Ok(())
    }

    // ──────────────────────────────────────────────────────────────────────
    // Indices
    // ──────────────────────────────────────────────────────────────────────

    /// Rebuild the type and reference indices from the element map.
    fn rebuild_indices(&mut self) {
        self.by_type.clear();
        self.refs.clear();
        for (id, element) in &self.elements {
            self.by_type
                .entry(element.object_type())
                .or_default()
                .insert(id.clone());
            self.refs.insert_all(id, &element.references());
        }
    }
}

/// Reset the values the pathway maintains itself, so that an element coming
/// from a file, a clipboard or a previous removal is re-derived from scratch.
fn clear_derived(element: &mut PathwayElement) {
    match &mut element.kind {
        ElementKind::Group(g) => g.members.clear(),
        ElementKind::DataNode(n) => n.states.clear(),
        ElementKind::Interaction(l) | ElementKind::GraphicalLine(l) => l.anchors.clear(),
        _ => {}
    }
}
