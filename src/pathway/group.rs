//! Group membership and group bounds.

use std::collections::HashSet;

use indexmap::IndexSet;
use tracing::warn;

use crate::error::{ModelError, Result};
use crate::model::{ElementId, GroupStyle, ObjectType, Rect};

use super::{ModelEvent, PathwayModel};

impl PathwayModel {
    /// Direct members of a group, in membership order.
    pub fn group_members(&self, group: &ElementId) -> Option<&IndexSet<ElementId>> {
        self.elements
            .get(group)
            .and_then(|e| e.as_group())
            .map(|g| &g.members)
    }

    /// Enclosing groups of an element, innermost first.
    pub fn ancestors(&self, id: &ElementId) -> Vec<ElementId> {
        let mut out = Vec::new();
        let mut current = self.elements.get(id).and_then(|e| e.group_ref.clone());
        while let Some(g) = current {
            if out.contains(&g) || out.len() > self.elements.len() {
                break;
            }
            current = self.elements.get(&g).and_then(|e| e.group_ref.clone());
            out.push(g);
        }
        out
    }

    /// All members of a group and, transitively, of its nested groups,
    /// depth-first in membership order. The group itself is not included.
    pub fn descendants(&self, group: &ElementId) -> Vec<ElementId> {
        let mut out = Vec::new();
        let mut seen = HashSet::new();
        self.collect_descendants(group, &mut out, &mut seen);
        out
    }

    fn collect_descendants(
        &self,
        group: &ElementId,
        out: &mut Vec<ElementId>,
        seen: &mut HashSet<ElementId>,
    ) {
        let Some(members) = self.group_members(group) else {
            return;
        };
        for m in members {
            if !seen.insert(m.clone()) {
                continue;
            }
            out.push(m.clone());
            self.collect_descendants(m, out, seen);
        }
    }

    /// Outermost group containing `id`, or `id` itself when ungrouped.
    pub fn top_level(&self, id: &ElementId) -> ElementId {
        self.ancestors(id).pop().unwrap_or_else(|| id.clone())
    }

    /// Move `member` into `group`, or out of any group with `None`.
    ///
    /// Validation happens before anything is touched; the member's pointer
    /// is written first, then the old and new member sets.
    pub fn set_group_ref(&mut self, member: &ElementId, group: Option<&ElementId>) -> Result<()> {
        let element = self.require(member)?;
        let object_type = element.object_type();
        if !object_type.is_groupable() {
            return Err(ModelError::capability(member, object_type, "be a group member"));
        }
        if let Some(g) = group {
            let target = self.require(g)?;
            if target.object_type() != ObjectType::Group {
                return Err(ModelError::capability(g, target.object_type(), "hold members"));
            }
            if g == member || self.ancestors(g).contains(member) {
                return Err(ModelError::CyclicGroup {
                    member: member.clone(),
                    group: g.clone(),
                });
            }
        }
        let old = element.group_ref.clone();
        if old.as_ref() == group {
            return Ok(());
        }

        if let Some(e) = self.elements.get_mut(member) {
            e.group_ref = group.cloned();
        }
        if let Some(old) = &old {
            if let Some(g) = self.elements.get_mut(old).and_then(|e| e.as_group_mut()) {
                g.members.shift_remove(member);
            }
            self.events
                .push(ModelEvent::MembershipChanged { group: old.clone() });
        }
        if let Some(new) = group {
            if let Some(g) = self.elements.get_mut(new).and_then(|e| e.as_group_mut()) {
                g.members.insert(member.clone());
            }
            self.events
                .push(ModelEvent::MembershipChanged { group: new.clone() });
        }
        self.events
            .push(ModelEvent::ElementChanged(member.clone()));
        self.revision += 1;
        self.propagate(old.into_iter().chain(group.cloned()).collect());
        Ok(())
    }

    pub fn add_to_group(&mut self, group: &ElementId, member: &ElementId) -> Result<()> {
        self.set_group_ref(member, Some(group))
    }

    pub fn set_group_style(&mut self, group: &ElementId, style: GroupStyle) -> Result<()> {
        let element = self.require(group)?;
        let object_type = element.object_type();
        let Some(g) = self.elements.get_mut(group).and_then(|e| e.as_group_mut()) else {
            return Err(ModelError::capability(group, object_type, "have a group style"));
        };
        if g.style == style {
            return Ok(());
        }
        g.style = style;
        self.events
            .push(ModelEvent::ElementChanged(group.clone()));
        self.revision += 1;
        self.propagate(vec![group.clone()]);
        Ok(())
    }

    /// Union of member bounds padded by the style margin.
    ///
    /// Member lines attached to this group or to one of its ancestors are
    /// left out: their ends sit on the group's outline, so including them
    /// would grow the group on every recompute.
    pub(crate) fn compute_group_bounds(&self, group_id: &ElementId) -> Rect {
        let Some(group) = self.elements.get(group_id).and_then(|e| e.as_group()) else {
            return Rect::default();
        };
        let mut outline: HashSet<ElementId> = self.ancestors(group_id).into_iter().collect();
        outline.insert(group_id.clone());

        let mut acc: Option<Rect> = None;
        for m in &group.members {
            let Some(member) = self.elements.get(m) else {
                continue;
            };
            if member.as_group().is_some_and(|g| g.members.is_empty()) {
                continue;
            }
            if let Some(line) = member.as_line() {
                let on_outline = [line.start(), line.end()].iter().any(|p| {
                    p.element_ref
                        .as_ref()
                        .is_some_and(|t| outline.contains(t))
                });
                if on_outline {
                    continue;
                }
            }
            if let Some(b) = self.element_bounds(m) {
                acc = Some(acc.map_or(b, |a| a.union(&b)));
            }
        }
        acc.map(|r| r.expand(self.config.margin_for(group.style)))
            .unwrap_or_default()
    }

    /// Hand the members of a group that is about to be removed over to the
    /// group's own parent (or to no group). Returns the groups whose bounds
    /// need recomputing.
    pub(super) fn dissolve_group(&mut self, group: &ElementId) -> Vec<ElementId> {
        let Some(element) = self.elements.get(group) else {
            return Vec::new();
        };
        let parent = element.group_ref.clone();
        let members: Vec<ElementId> = element
            .as_group()
            .map(|g| g.members.iter().cloned().collect())
            .unwrap_or_default();

        for m in &members {
            if let Some(e) = self.elements.get_mut(m) {
                e.group_ref = parent.clone();
            }
            self.events.push(ModelEvent::ElementChanged(m.clone()));
        }
        if let Some(g) = self.elements.get_mut(group).and_then(|e| e.as_group_mut()) {
            g.members.clear();
        }
        match parent {
            Some(p) => {
                if let Some(pg) = self.elements.get_mut(&p).and_then(|e| e.as_group_mut()) {
                    pg.members.extend(members);
                }
                self.events
                    .push(ModelEvent::MembershipChanged { group: p.clone() });
                vec![p]
            }
            None => Vec::new(),
        }
    }

    /// Clear `group_ref` on freshly added groups that would otherwise
    /// contain themselves.
    pub(super) fn break_group_cycles(&mut self, ids: &[ElementId]) {
        for id in ids {
            let is_group = self
                .elements
                .get(id)
                .is_some_and(|e| e.object_type() == ObjectType::Group);
            if !is_group {
                continue;
            }
            let mut seen = HashSet::new();
            let mut current = self.elements.get(id).and_then(|e| e.group_ref.clone());
            let mut cyclic = false;
            while let Some(g) = current {
                if &g == id {
                    cyclic = true;
                    break;
                }
                if !seen.insert(g.clone()) {
                    break;
                }
                current = self.elements.get(&g).and_then(|e| e.group_ref.clone());
            }
            if cyclic {
                warn!(group = %id, "group nesting forms a cycle, detaching group from its parent");
                if let Some(e) = self.elements.get_mut(id) {
                    e.group_ref = None;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{DataNodeType, PathwayElement};

    fn node(id: &str, x: f64, y: f64) -> PathwayElement {
        PathwayElement::data_node(id, DataNodeType::Protein, Rect::new(x, y, 80.0, 20.0)).with_id(id)
    }

    #[test]
    fn test_membership_is_bidirectional() {
        let mut p = PathwayModel::new();
        p.add(node("a", 0.0, 0.0)).unwrap();
        let g = p.add(PathwayElement::group(GroupStyle::Group)).unwrap();
        p.add_to_group(&g, &"a".into()).unwrap();
        assert_eq!(p.get_element(&"a".into()).unwrap().group_ref.as_ref(), Some(&g));
        assert!(p.group_members(&g).unwrap().contains(&ElementId::from("a")));

        p.set_group_ref(&"a".into(), None).unwrap();
        assert!(p.group_members(&g).unwrap().is_empty());
        assert!(p.validate().is_empty());
    }

    #[test]
    fn test_group_bounds_follow_members() {
        let mut p = PathwayModel::new();
        p.add(node("a", 0.0, 0.0)).unwrap();
        p.add(node("b", 100.0, 50.0)).unwrap();
        let g = p.add(PathwayElement::group(GroupStyle::Group)).unwrap();
        p.add_to_group(&g, &"a".into()).unwrap();
        p.add_to_group(&g, &"b".into()).unwrap();
        assert_eq!(p.element_bounds(&g), Some(Rect::new(-8.0, -8.0, 196.0, 86.0)));

        p.set_group_style(&g, GroupStyle::Complex).unwrap();
        assert_eq!(p.element_bounds(&g), Some(Rect::new(-12.0, -12.0, 204.0, 94.0)));

        p.move_by(&"b".into(), 10.0, 0.0).unwrap();
        assert_eq!(p.element_bounds(&g).unwrap().right(), 202.0);
    }

    #[test]
    fn test_nested_group_bounds() {
        let mut p = PathwayModel::new();
        p.add(node("a", 0.0, 0.0)).unwrap();
        let inner = p.add(PathwayElement::group(GroupStyle::Group)).unwrap();
        let outer = p.add(PathwayElement::group(GroupStyle::Group)).unwrap();
        p.add_to_group(&inner, &"a".into()).unwrap();
        p.add_to_group(&outer, &inner).unwrap();
        assert_eq!(p.element_bounds(&outer), Some(Rect::new(-16.0, -16.0, 112.0, 52.0)));
        assert_eq!(p.ancestors(&"a".into()), vec![inner.clone(), outer.clone()]);
        assert_eq!(p.top_level(&"a".into()), outer);
        assert_eq!(p.descendants(&outer), vec![inner, "a".into()]);
    }

    #[test]
    fn test_cycle_rejected() {
        let mut p = PathwayModel::new();
        let g1 = p.add(PathwayElement::group(GroupStyle::Group)).unwrap();
        let g2 = p.add(PathwayElement::group(GroupStyle::Group)).unwrap();
        p.add_to_group(&g1, &g2).unwrap();
        assert!(matches!(p.add_to_group(&g2, &g1), Err(ModelError::CyclicGroup { .. })));
        assert!(matches!(p.add_to_group(&g1, &g1), Err(ModelError::CyclicGroup { .. })));
        assert!(p.validate().is_empty());
    }

    #[test]
    fn test_non_groupable_rejected() {
        let mut p = PathwayModel::new();
        p.add(node("a", 0.0, 0.0)).unwrap();
        let s = p.add(PathwayElement::state("a", "P", 1.0, 1.0)).unwrap();
        let g = p.add(PathwayElement::group(GroupStyle::Group)).unwrap();
        assert!(matches!(p.add_to_group(&g, &s), Err(ModelError::Capability { .. })));
        assert!(matches!(p.add_to_group(&s, &"a".into()), Err(ModelError::Capability { .. })));
    }

    #[test]
    fn test_removing_nested_group_reparents_members() {
        let mut p = PathwayModel::new();
        p.add(node("a", 0.0, 0.0)).unwrap();
        let inner = p.add(PathwayElement::group(GroupStyle::Group)).unwrap();
        let outer = p.add(PathwayElement::group(GroupStyle::Group)).unwrap();
        p.add_to_group(&inner, &"a".into()).unwrap();
        p.add_to_group(&outer, &inner).unwrap();

        p.remove(&inner).unwrap();
        assert_eq!(p.get_element(&"a".into()).unwrap().group_ref.as_ref(), Some(&outer));
        assert!(p.group_members(&outer).unwrap().contains(&ElementId::from("a")));
        assert!(!p.group_members(&outer).unwrap().contains(&inner));
        assert!(p.validate().is_empty());
    }

    #[test]
    fn test_membership_change_emits_events() {
        let mut p = PathwayModel::new();
        p.add(node("a", 0.0, 0.0)).unwrap();
        let g = p.add(PathwayElement::group(GroupStyle::Group)).unwrap();
        p.drain_events();
        p.add_to_group(&g, &"a".into()).unwrap();
        let events = p.drain_events();
        assert!(events.contains(&ModelEvent::MembershipChanged { group: g.clone() }));
        assert!(events.contains(&ModelEvent::GeometryChanged(g)));
    }
}
