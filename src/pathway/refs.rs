//! Reverse index of cross-references and the pathway's consistency check.
//!
//! Every outgoing reference an element holds (line endpoint, alias, literature
//! reference) is mirrored here as `target -> {(source, slot)}` so that
//! removing a target can heal its referrers without scanning the pathway.
//! Group membership is not indexed here: the group's own member set already is
//! the reverse side of `group_ref`.

use std::collections::{BTreeSet, HashMap};

use serde::Serialize;

use crate::model::{ElementId, ObjectType, RefSlot};

use super::PathwayModel;

/// One element pointing at another through `slot`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct Referrer {
    pub source: ElementId,
    pub slot: RefSlot,
}

#[derive(Debug, Clone, Default)]
pub(crate) struct RefIndex {
    incoming: HashMap<ElementId, BTreeSet<Referrer>>,
}

impl RefIndex {
    pub(crate) fn insert(&mut self, source: &ElementId, slot: RefSlot, target: &ElementId) {
        if slot == RefSlot::Group {
            return;
        }
        self.incoming.entry(target.clone()).or_default().insert(Referrer {
            source: source.clone(),
            slot,
        });
    }

    pub(crate) fn remove(&mut self, source: &ElementId, slot: RefSlot, target: &ElementId) {
        if let Some(set) = self.incoming.get_mut(target) {
            set.remove(&Referrer {
                source: source.clone(),
                slot,
            });
            if set.is_empty() {
                self.incoming.remove(target);
            }
        }
    }

    pub(crate) fn insert_all(&mut self, source: &ElementId, refs: &[(RefSlot, ElementId)]) {
        for (slot, target) in refs {
            self.insert(source, *slot, target);
        }
    }

    pub(crate) fn remove_all(&mut self, source: &ElementId, refs: &[(RefSlot, ElementId)]) {
        for (slot, target) in refs {
            self.remove(source, *slot, target);
        }
    }

    /// Detach and return every referrer of `target`.
    pub(crate) fn take(&mut self, target: &ElementId) -> Vec<Referrer> {
        self.incoming
            .remove(target)
            .map(|set| set.into_iter().collect())
            .unwrap_or_default()
    }

    pub(crate) fn referrers(&self, target: &ElementId) -> impl Iterator<Item = &Referrer> {
        self.incoming.get(target).into_iter().flatten()
    }

    pub(crate) fn clear(&mut self) {
        self.incoming.clear();
    }
}

/// Object type a reference in `slot` must point at, if restricted beyond
/// "linkable".
pub(crate) fn slot_accepts(slot: RefSlot, target: ObjectType) -> bool {
    match slot {
        RefSlot::Group | RefSlot::Alias => target == ObjectType::Group,
        RefSlot::Line(_) => target.is_linkable_to(),
        RefSlot::Citation => target == ObjectType::Citation,
        RefSlot::Annotation => target == ObjectType::Annotation,
        RefSlot::Evidence => target == ObjectType::Evidence,
    }
}

impl PathwayModel {
    /// Check every structural invariant of the pathway.
    ///
    /// Returns one message per violation; an empty list means the pathway is
    /// consistent. Mutators keep these invariants, so a non-empty result
    /// points at a bug rather than at bad input.
    pub fn validate(&self) -> Vec<String> {
        let mut problems = Vec::new();

        for (id, element) in &self.elements {
            if element.id() != Some(id) {
                problems.push(format!("element stored under {id} carries id {:?}", element.id()));
            }

            for (slot, target) in element.references() {
                match self.elements.get(&target) {
                    None => problems.push(format!("{id} references missing element {target} via {slot:?}")),
                    Some(t) if !slot_accepts(slot, t.object_type()) => problems.push(format!(
                        "{id} references {target} ({:?}) via {slot:?}",
                        t.object_type()
                    )),
                    Some(_) => {
                        if slot != RefSlot::Group
                            && !self.refs.referrers(&target).any(|r| &r.source == id && r.slot == slot)
                        {
                            problems.push(format!("reference {id} -> {target} is missing from the index"));
                        }
                    }
                }
            }

            // m.group_ref == g  <=>  m in g.members
            if let Some(g) = &element.group_ref {
                let listed = self
                    .elements
                    .get(g)
                    .and_then(|e| e.as_group())
                    .is_some_and(|group| group.members.contains(id));
                if !listed {
                    problems.push(format!("{id} points at group {g} which does not list it"));
                }
            }
            if let Some(group) = element.as_group() {
                for m in &group.members {
                    let back = self.elements.get(m).and_then(|e| e.group_ref.as_ref());
                    if back != Some(id) {
                        problems.push(format!("group {id} lists {m} whose group_ref is {back:?}"));
                    }
                }
            }

            if let Some(state) = element.as_state() {
                let ok = state
                    .parent
                    .as_ref()
                    .and_then(|p| self.elements.get(p))
                    .and_then(|p| p.as_data_node())
                    .is_some_and(|node| node.states.contains(id));
                if !ok {
                    problems.push(format!("state {id} is not attached to a data node"));
                }
            }
            if let Some(anchor) = element.as_anchor() {
                let ok = anchor
                    .line
                    .as_ref()
                    .and_then(|l| self.elements.get(l))
                    .and_then(|l| l.as_line())
                    .is_some_and(|line| line.anchors.contains(id));
                if !ok {
                    problems.push(format!("anchor {id} is not hosted by a line"));
                }
            }
            if let Some(line) = element.as_line() {
                if line.points.len() < 2 {
                    problems.push(format!("line {id} has fewer than two points"));
                }
            }
        }

        for (t, ids) in &self.by_type {
            for id in ids {
                if self.elements.get(id).map(|e| e.object_type()) != Some(*t) {
                    problems.push(format!("type index lists {id} as {t:?}"));
                }
            }
        }

        if self.by_type.get(&ObjectType::Pathway).map_or(0, |s| s.len()) > 1 {
            problems.push("more than one pathway info element".to_string());
        }

        problems
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_index_insert_take() {
        let mut idx = RefIndex::default();
        let line: ElementId = "l1".into();
        let refs = vec![
            (RefSlot::Line(crate::model::LineEnd::Start), ElementId::from("a")),
            (RefSlot::Group, ElementId::from("g")),
            (RefSlot::Citation, ElementId::from("c")),
        ];
        idx.insert_all(&line, &refs);
        assert_eq!(idx.referrers(&"a".into()).count(), 1);
        // group slot is carried by the member set, not the index
        assert_eq!(idx.referrers(&"g".into()).count(), 0);

        let taken = idx.take(&"c".into());
        assert_eq!(taken.len(), 1);
        assert_eq!(taken[0].slot, RefSlot::Citation);
        assert_eq!(idx.referrers(&"c".into()).count(), 0);

        idx.remove_all(&line, &refs);
        assert_eq!(idx.referrers(&"a".into()).count(), 0);
    }

    #[test]
    fn test_slot_accepts() {
        assert!(slot_accepts(RefSlot::Alias, ObjectType::Group));
        assert!(!slot_accepts(RefSlot::Alias, ObjectType::DataNode));
        assert!(slot_accepts(RefSlot::Line(crate::model::LineEnd::End), ObjectType::Anchor));
        assert!(!slot_accepts(RefSlot::Line(crate::model::LineEnd::End), ObjectType::Citation));
    }
}
