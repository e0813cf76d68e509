//! Copy and paste of pathway fragments.
//!
//! Copying expands the selection to everything the copied elements cannot
//! live without (the content of groups, the states of data nodes, the
//! anchors of lines, referenced citations/annotations/evidence), deep-copies
//! it under fresh ids and rewrites every internal reference through an
//! [`IdMap`]. References leaving the copied set are dropped. The copy is
//! therefore a closed, self-consistent fragment that can be pasted any
//! number of times, into the same pathway or another one.

use std::collections::{HashMap, HashSet};

use anyhow::{Context, Result};
use indexmap::IndexSet;
use tracing::debug;

use crate::config::EditorConfig;
use crate::model::{ElementId, ElementKind, LineEnd, ObjectType, PathwayElement, PathwayInfo};
use crate::pathway::PathwayModel;
use crate::{generator, parser};

/// Source marker of the pathway info element wrapped around a copied
/// fragment when it is written as XML.
pub const COPIED_SOURCE: &str = "___COPIED";

// ────────────────────────────────────────────────────────────────────────────
// IdMap
// ────────────────────────────────────────────────────────────────────────────

/// Bidirectional map between original ids and the ids of their copies.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IdMap {
    forward: HashMap<ElementId, ElementId>,
    backward: HashMap<ElementId, ElementId>,
}

impl IdMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, original: ElementId, copy: ElementId) {
        self.backward.insert(copy.clone(), original.clone());
        self.forward.insert(original, copy);
    }

    /// Id of the copy of `original`.
    pub fn get(&self, original: &ElementId) -> Option<&ElementId> {
        self.forward.get(original)
    }

    /// Id of the original `copy` was made from.
    pub fn original(&self, copy: &ElementId) -> Option<&ElementId> {
        self.backward.get(copy)
    }

    pub fn len(&self) -> usize {
        self.forward.len()
    }

    pub fn is_empty(&self) -> bool {
        self.forward.is_empty()
    }
}

/// Rewrite every reference of `element` through `map`. References to ids
/// the map does not know are dropped; line ends keep their last absolute
/// position.
pub fn remap_references(element: &mut PathwayElement, map: &IdMap) {
    let remap_list = |list: &mut Vec<ElementId>| {
        *list = list.iter().filter_map(|id| map.get(id).cloned()).collect();
    };

    element.group_ref = element.group_ref.as_ref().and_then(|g| map.get(g).cloned());
    remap_list(&mut element.citation_refs);
    remap_list(&mut element.annotation_refs);
    remap_list(&mut element.evidence_refs);

    match &mut element.kind {
        ElementKind::DataNode(n) => {
            n.alias_ref = n.alias_ref.as_ref().and_then(|a| map.get(a).cloned());
            remap_list(&mut n.states);
        }
        ElementKind::State(s) => {
            s.parent = s.parent.as_ref().and_then(|p| map.get(p).cloned());
        }
        ElementKind::Interaction(l) | ElementKind::GraphicalLine(l) => {
            for end in [LineEnd::Start, LineEnd::End] {
                let point = l.point_mut(end);
                match point.element_ref.as_ref().map(|t| map.get(t).cloned()) {
                    Some(Some(target)) => point.element_ref = Some(target),
                    Some(None) => point.unlink(),
                    None => {}
                }
            }
            remap_list(&mut l.anchors);
        }
        ElementKind::Group(g) => {
            g.members = g.members.iter().filter_map(|m| map.get(m).cloned()).collect();
        }
        ElementKind::Anchor(a) => {
            a.line = a.line.as_ref().and_then(|l| map.get(l).cloned());
        }
        _ => {}
    }
}

fn translate(element: &mut PathwayElement, dx: f64, dy: f64) {
    if let Some(line) = element.as_line_mut() {
        for p in &mut line.points {
            p.x += dx;
            p.y += dy;
        }
        line.shape = line.shape.translate(dx, dy);
    } else if let Some(bounds) = element.shaped_bounds_mut() {
        *bounds = bounds.translate(dx, dy);
    } else if let Some(group) = element.as_group_mut() {
        group.bounds = group.bounds.translate(dx, dy);
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Copy
// ────────────────────────────────────────────────────────────────────────────

/// Everything a copy of `ids` has to contain, in pathway order.
pub fn expand_selection(model: &PathwayModel, ids: &[ElementId]) -> IndexSet<ElementId> {
    let mut set: IndexSet<ElementId> = ids.iter().filter(|id| model.contains(id)).cloned().collect();

    let mut i = 0;
    while let Some(id) = set.get_index(i).cloned() {
        i += 1;
        let Some(element) = model.get_element(&id) else {
            continue;
        };
        match &element.kind {
            ElementKind::Group(_) => set.extend(model.descendants(&id)),
            ElementKind::DataNode(n) => set.extend(n.states.iter().cloned()),
            ElementKind::Interaction(l) | ElementKind::GraphicalLine(l) => {
                set.extend(l.anchors.iter().cloned())
            }
            _ => {}
        }
    }

    // States and anchors cannot exist without their parent.
    let parents: Vec<(ElementId, Option<ElementId>)> = set
        .iter()
        .filter_map(|id| {
            let element = model.get_element(id)?;
            let parent = match &element.kind {
                ElementKind::State(s) => s.parent.clone(),
                ElementKind::Anchor(a) => a.line.clone(),
                _ => return None,
            };
            Some((id.clone(), parent))
        })
        .collect();
    for (id, parent) in parents {
        if !parent.is_some_and(|p| set.contains(&p)) {
            set.shift_remove(&id);
        }
    }

    let literature: Vec<ElementId> = set
        .iter()
        .filter_map(|id| model.get_element(id))
        .flat_map(|e| {
            e.citation_refs
                .iter()
                .chain(&e.annotation_refs)
                .chain(&e.evidence_refs)
                .cloned()
        })
        .filter(|id| model.contains(id))
        .collect();
    set.extend(literature);

    set.sort_by_cached_key(|id| model.index_of(id));
    set
}

/// A closed fragment of a pathway.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ClipboardContent {
    /// Deep copies under fresh ids, references rewritten.
    pub elements: Vec<PathwayElement>,
    /// Original id of each copy.
    pub map: IdMap,
}

impl ClipboardContent {
    /// Deep-copy `ids` and everything they depend on out of `model`.
    pub fn copy_from(model: &PathwayModel, ids: &[ElementId]) -> Self {
        let set = expand_selection(model, ids);
        let mut counter = model.id_counter();
        let mut reserved = HashSet::new();
        let mut map = IdMap::new();
        for id in &set {
            let fresh = model.unused_id(&mut counter, &reserved);
            reserved.insert(fresh.clone());
            map.insert(id.clone(), fresh);
        }

        let elements = set
            .iter()
            .filter_map(|id| {
                let mut copy = model.get_element(id)?.clone();
                copy.id = map.get(id).cloned();
                remap_references(&mut copy, &map);
                Some(copy)
            })
            .collect();
        ClipboardContent { elements, map }
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    /// Pairs of (copy, id of the original it was made from).
    pub fn pairs(&self) -> impl Iterator<Item = (&PathwayElement, Option<&ElementId>)> {
        self.elements
            .iter()
            .map(|e| (e, e.id().and_then(|id| self.map.original(id))))
    }

    /// Elements ready to be added to `model`: ids that collide with the
    /// pathway are replaced, references follow, and everything is shifted
    /// by (`dx`, `dy`). A pathway info element is dropped if `model` has one.
    pub fn prepare_paste(&self, model: &PathwayModel, dx: f64, dy: f64) -> Vec<PathwayElement> {
        let has_info = model.info().is_some();
        let mut counter = model.id_counter();
        let mut reserved: HashSet<ElementId> = HashSet::new();
        let mut map = IdMap::new();
        let elements: Vec<&PathwayElement> = self
            .elements
            .iter()
            .filter(|e| !(has_info && e.object_type() == ObjectType::Pathway))
            .collect();

        for e in &elements {
            let Some(id) = e.id() else {
                continue;
            };
            let target = if model.contains(id) || reserved.contains(id) {
                model.unused_id(&mut counter, &reserved)
            } else {
                id.clone()
            };
            reserved.insert(target.clone());
            map.insert(id.clone(), target);
        }

        elements
            .into_iter()
            .map(|e| {
                let mut copy = e.clone();
                copy.id = copy.id.as_ref().and_then(|id| map.get(id).cloned());
                remap_references(&mut copy, &map);
                translate(&mut copy, dx, dy);
                copy
            })
            .collect()
    }

    /// Transferable text form: the fragment as a pathway document, wrapped
    /// in a marked pathway info element when it carries none of its own.
    pub fn to_xml(&self) -> Result<String> {
        let mut elements = self.elements.clone();
        if !elements.iter().any(|e| e.object_type() == ObjectType::Pathway) {
            elements.insert(
                0,
                PathwayElement::info(PathwayInfo {
                    title: "Copied fragment".to_string(),
                    source: Some(COPIED_SOURCE.to_string()),
                    ..Default::default()
                }),
            );
        }
        let mut model = PathwayModel::new();
        model
            .add_all(elements)
            .context("Clipboard content is not a consistent pathway fragment")?;
        generator::write_to_xml(&model)
    }

    /// Parse text produced by [`ClipboardContent::to_xml`] (or any pathway
    /// document). A marked wrapper info element is discarded.
    pub fn from_xml(text: &str) -> Result<Self> {
        let model = parser::read_from_xml(text, &EditorConfig::default())
            .context("Failed to read clipboard text")?;
        let elements = model
            .elements()
            .filter(|e| {
                !matches!(&e.kind, ElementKind::Pathway(info)
                    if info.source.as_deref() == Some(COPIED_SOURCE))
            })
            .cloned()
            .collect();
        Ok(ClipboardContent {
            elements,
            map: IdMap::new(),
        })
    }
}

// ────────────────────────────────────────────────────────────────────────────
// EditorClipboard
// ────────────────────────────────────────────────────────────────────────────

/// Clipboard of one editing session.
#[derive(Debug, Clone)]
pub struct EditorClipboard {
    content: Option<ClipboardContent>,
    /// Offset applied by the next paste.
    pub paste_offset: f64,
    step: f64,
}

impl Default for EditorClipboard {
    fn default() -> Self {
        Self::new(20.0)
    }
}

impl EditorClipboard {
    /// `step` is the offset of the first paste and the increment of every
    /// paste after it.
    pub fn new(step: f64) -> Self {
        Self {
            content: None,
            paste_offset: step,
            step,
        }
    }

    /// Copy `ids` out of `model`. Returns the number of copied elements.
    pub fn copy(&mut self, model: &PathwayModel, ids: &[ElementId]) -> usize {
        let content = ClipboardContent::copy_from(model, ids);
        let n = content.len();
        debug!(selected = ids.len(), copied = n, "copied selection");
        self.set_content(content);
        n
    }

    /// Replace the content, e.g. with a fragment read from text.
    pub fn set_content(&mut self, content: ClipboardContent) {
        self.content = if content.is_empty() { None } else { Some(content) };
        self.paste_offset = self.step;
    }

    pub fn content(&self) -> Option<&ClipboardContent> {
        self.content.as_ref()
    }

    /// Returns true if the clipboard has content.
    pub fn has_content(&self) -> bool {
        self.content.is_some()
    }

    /// Paste into `model`, returning the ids of the pasted elements. Each
    /// paste of the same content lands one step further away.
    pub fn paste(&mut self, model: &mut PathwayModel) -> crate::error::Result<Vec<ElementId>> {
        let Some(content) = &self.content else {
            return Ok(Vec::new());
        };
        let elements = content.prepare_paste(model, self.paste_offset, self.paste_offset);
        let ids = model.add_all(elements)?;
        self.paste_offset += self.step;
        Ok(ids)
    }

    pub fn clear(&mut self) {
        self.content = None;
        self.paste_offset = self.step;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connector::ConnectorType;
    use crate::model::{Citation, DataNodeType, LinePoint, Rect};

    /// Group {a, b} with a line a -> b inside, plus an outside node c that
    /// the line's anchor is wired to.
    fn sample() -> PathwayModel {
        let mut p = PathwayModel::new();
        let cit = p.add(PathwayElement::citation(Citation::default()).with_id("cit")).unwrap();
        p.add(PathwayElement::data_node("A", DataNodeType::Protein, Rect::new(0.0, 0.0, 80.0, 20.0)).with_id("a"))
            .unwrap();
        p.add(PathwayElement::data_node("B", DataNodeType::Protein, Rect::new(200.0, 0.0, 80.0, 20.0)).with_id("b"))
            .unwrap();
        p.add(PathwayElement::data_node("C", DataNodeType::Protein, Rect::new(100.0, 100.0, 80.0, 20.0)).with_id("c"))
            .unwrap();
        p.add(
            PathwayElement::interaction(
                LinePoint::linked("a", 1.0, 0.0),
                LinePoint::linked("b", -1.0, 0.0),
                ConnectorType::Straight,
            )
            .with_id("l"),
        )
        .unwrap();
        p.add(PathwayElement::anchor("l", 0.5).with_id("anc")).unwrap();
        p.add(
            PathwayElement::interaction(
                LinePoint::linked("c", 0.0, -1.0),
                LinePoint::linked("anc", 0.0, 0.0),
                ConnectorType::Straight,
            )
            .with_id("l2"),
        )
        .unwrap();
        p.add(PathwayElement::group(crate::model::GroupStyle::Group).with_id("g")).unwrap();
        for m in ["a", "b", "l"] {
            p.set_group_ref(&m.into(), Some(&"g".into())).unwrap();
        }
        p.add_citation_ref(&"a".into(), &cit).unwrap();
        p.drain_events();
        p
    }

    #[test]
    fn test_expand_selection_pulls_in_dependencies() {
        let p = sample();
        let set = expand_selection(&p, &["g".into()]);
        for id in ["cit", "a", "b", "l", "anc", "g"] {
            assert!(set.contains(&ElementId::from(id)), "missing {id}");
        }
        assert!(!set.contains(&ElementId::from("c")));
        assert!(!set.contains(&ElementId::from("l2")));
    }

    #[test]
    fn test_orphan_state_is_not_copied() {
        let mut p = sample();
        let s = p.add(PathwayElement::state("a", "P", 1.0, 1.0)).unwrap();
        assert!(expand_selection(&p, &[s.clone()]).is_empty());
        assert!(expand_selection(&p, &["a".into()]).contains(&s));
    }

    #[test]
    fn test_copy_remaps_inside_and_drops_outside() {
        let p = sample();
        let content = ClipboardContent::copy_from(&p, &["g".into(), "l2".into()]);
        let new_a = content.map.get(&"a".into()).unwrap().clone();
        let new_g = content.map.get(&"g".into()).unwrap().clone();
        assert_eq!(content.map.original(&new_a), Some(&"a".into()));

        let line = content
            .elements
            .iter()
            .find(|e| content.map.original(e.id().unwrap()) == Some(&"l".into()))
            .unwrap();
        assert_eq!(line.as_line().unwrap().start().element_ref.as_ref(), Some(&new_a));
        assert_eq!(line.group_ref.as_ref(), Some(&new_g));

        // l2 starts on c, which was not copied
        let l2 = content
            .elements
            .iter()
            .find(|e| content.map.original(e.id().unwrap()) == Some(&"l2".into()))
            .unwrap()
            .as_line()
            .unwrap();
        assert!(l2.start().element_ref.is_none());
        assert_eq!(l2.start().position(), p.line_end_position(&"l2".into(), LineEnd::Start).unwrap());
        assert!(l2.end().element_ref.is_some());
    }

    #[test]
    fn test_paste_twice_offsets_and_stays_consistent() {
        let mut p = sample();
        let mut clip = EditorClipboard::new(20.0);
        assert_eq!(clip.copy(&p, &["g".into()]), 6);

        let first = clip.paste(&mut p).unwrap();
        let second = clip.paste(&mut p).unwrap();
        assert_eq!(first.len(), 6);
        assert!(first.iter().all(|id| !second.contains(id)));
        assert_eq!(clip.paste_offset, 60.0);
        assert!(p.validate().is_empty());

        let pasted_nodes: Vec<Rect> = second
            .iter()
            .filter_map(|id| p.get_element(id))
            .filter(|e| e.text_label() == Some("A"))
            .filter_map(|e| e.shaped_bounds())
            .collect();
        assert_eq!(pasted_nodes, vec![Rect::new(40.0, 40.0, 80.0, 20.0)]);
    }

    #[test]
    fn test_pasted_copy_is_isolated() {
        let mut p = sample();
        let before = p.get_element(&"a".into()).unwrap().clone();
        let mut clip = EditorClipboard::default();
        clip.copy(&p, &["a".into()]);
        let ids = clip.paste(&mut p).unwrap();
        let pasted = ids
            .iter()
            .find(|id| p.get_element(id).unwrap().object_type() == ObjectType::DataNode)
            .unwrap()
            .clone();
        p.set_text_label(&pasted, "changed").unwrap();
        p.move_by(&pasted, 500.0, 0.0).unwrap();
        assert_eq!(p.get_element(&"a".into()).unwrap(), &before);
    }

    #[test]
    fn test_xml_wrapper_is_discarded() {
        let p = sample();
        let content = ClipboardContent::copy_from(&p, &["a".into(), "b".into()]);
        let xml = content.to_xml().unwrap();
        assert!(xml.contains(COPIED_SOURCE));

        let back = ClipboardContent::from_xml(&xml).unwrap();
        assert!(back.elements.iter().all(|e| e.object_type() != ObjectType::Pathway));
        assert_eq!(back.len(), content.len());
    }
}
