//! Editing operations on a pathway.
//!
//! Each operation is a function that mutates a [`PathwayModel`] through its
//! public mutators, so every invariant is kept and every change is announced
//! to views. None of them touch the undo history: callers wrap them in a
//! transaction (see [`super::EditorState`]).

use indexmap::IndexSet;
use tracing::debug;

use crate::error::{ModelError, Result};
use crate::model::{ElementId, GroupStyle, ObjectType, PathwayElement, Rect};
use crate::pathway::PathwayModel;
use crate::view::DrawTier;

// ────────────────────────────────────────────────────────────────────────────
// Grouping
// ────────────────────────────────────────────────────────────────────────────

/// Result of [`toggle_group`].
#[derive(Debug, Clone, PartialEq)]
pub enum GroupToggle {
    /// A new group was created around the selection.
    Grouped(ElementId),
    /// The selected group was dissolved; these were its members.
    Ungrouped(Vec<ElementId>),
}

/// Drop every id whose enclosing group is itself in `ids`: it travels with
/// that group.
pub fn outermost(model: &PathwayModel, ids: &[ElementId]) -> Vec<ElementId> {
    let set: IndexSet<&ElementId> = ids.iter().collect();
    let mut out: IndexSet<ElementId> = IndexSet::new();
    for id in ids {
        if model.ancestors(id).iter().any(|a| set.contains(a)) {
            continue;
        }
        out.insert(id.clone());
    }
    out.into_iter().collect()
}

/// Ungroup a selection made of a single group, group anything else.
pub fn toggle_group(model: &mut PathwayModel, selection: &[ElementId]) -> Result<GroupToggle> {
    if let [single] = selection {
        if model.get_element(single).map(|e| e.object_type()) == Some(ObjectType::Group) {
            return ungroup(model, single).map(GroupToggle::Ungrouped);
        }
    }
    group_elements(model, selection, GroupStyle::Group).map(GroupToggle::Grouped)
}

/// Put the groupable elements of `ids` into a new group.
///
/// If every grouped element sits in the same parent group, the new group is
/// nested in that parent so nothing leaves it.
pub fn group_elements(model: &mut PathwayModel, ids: &[ElementId], style: GroupStyle) -> Result<ElementId> {
    for id in ids {
        if !model.contains(id) {
            return Err(ModelError::UnknownElement(id.clone()));
        }
    }
    let members: Vec<ElementId> = outermost(model, ids)
        .into_iter()
        .filter(|id| model.get_element(id).is_some_and(|e| e.is_groupable()))
        .collect();
    let Some(first) = members.first() else {
        return Err(match ids.first() {
            Some(id) => {
                let object_type = model
                    .get_element(id)
                    .map_or(ObjectType::Pathway, |e| e.object_type());
                ModelError::capability(id, object_type, "be grouped")
            }
            None => ModelError::EmptySelection,
        });
    };

    let parent = model.get_element(first).and_then(|e| e.group_ref.clone());
    let shared_parent = members
        .iter()
        .all(|m| model.get_element(m).and_then(|e| e.group_ref.as_ref()) == parent.as_ref());

    let mut group = PathwayElement::group(style);
    if shared_parent {
        group.group_ref = parent;
    }
    let group_id = model.add(group)?;
    for m in &members {
        model.set_group_ref(m, Some(&group_id))?;
    }
    debug!(group = %group_id, members = members.len(), "grouped selection");
    Ok(group_id)
}

/// Dissolve a group. Its members move into the group's own parent group, or
/// become ungrouped if it had none. Returns the former members.
pub fn ungroup(model: &mut PathwayModel, group: &ElementId) -> Result<Vec<ElementId>> {
    let members: Vec<ElementId> = match model.group_members(group) {
        Some(m) => m.iter().cloned().collect(),
        None => {
            let object_type = model
                .get_element(group)
                .ok_or_else(|| ModelError::UnknownElement(group.clone()))?
                .object_type();
            return Err(ModelError::capability(group, object_type, "be ungrouped"));
        }
    };
    model.remove(group)?;
    Ok(members)
}

// ────────────────────────────────────────────────────────────────────────────
// Deletion and z-order
// ────────────────────────────────────────────────────────────────────────────

/// Delete elements. Deleting a group deletes its content too; lines attached
/// to a deleted group keep their endpoint where the group was.
pub fn delete_elements(model: &mut PathwayModel, ids: &[ElementId]) -> Vec<PathwayElement> {
    let mut order: IndexSet<ElementId> = IndexSet::new();
    for id in outermost(model, ids) {
        let is_group = model.get_element(&id).and_then(|e| e.as_group()).is_some();
        let inner = if is_group { model.descendants(&id) } else { Vec::new() };
        order.insert(id);
        order.extend(inner);
    }
    let order: Vec<ElementId> = order.into_iter().collect();
    model.remove_all(&order)
}

fn tier_of(model: &PathwayModel, id: &ElementId) -> Option<DrawTier> {
    model.get_element(id).and_then(|e| DrawTier::of(e.object_type()))
}

fn tier_z_range(model: &PathwayModel, tier: DrawTier) -> Option<(i32, i32)> {
    model
        .elements()
        .filter(|e| DrawTier::of(e.object_type()) == Some(tier))
        .map(|e| e.z_order)
        .fold(None, |acc, z| match acc {
            None => Some((z, z)),
            Some((lo, hi)) => Some((lo.min(z), hi.max(z))),
        })
}

/// Raise elements above everything else in their draw tier, keeping their
/// relative order.
pub fn bring_to_front(model: &mut PathwayModel, ids: &[ElementId]) -> Result<()> {
    let mut sorted = ids.to_vec();
    sorted.sort_by_key(|id| model.get_element(id).map(|e| e.z_order));
    for id in sorted {
        let Some(tier) = tier_of(model, &id) else {
            continue;
        };
        if let Some((_, hi)) = tier_z_range(model, tier) {
            model.set_z_order(&id, hi.saturating_add(1))?;
        }
    }
    Ok(())
}

/// Lower elements below everything else in their draw tier, keeping their
/// relative order.
pub fn send_to_back(model: &mut PathwayModel, ids: &[ElementId]) -> Result<()> {
    let mut sorted = ids.to_vec();
    sorted.sort_by_key(|id| std::cmp::Reverse(model.get_element(id).map(|e| e.z_order)));
    for id in sorted {
        let Some(tier) = tier_of(model, &id) else {
            continue;
        };
        if let Some((lo, _)) = tier_z_range(model, tier) {
            model.set_z_order(&id, lo.saturating_sub(1))?;
        }
    }
    Ok(())
}

// ────────────────────────────────────────────────────────────────────────────
// Layout
// ────────────────────────────────────────────────────────────────────────────

/// Layout actions on the bounds of selected elements.
///
/// Stack actions keep the current order along the stacking axis and butt
/// each element against the previous one. The vertical stacks (`StackLeft`,
/// `StackRight`, `StackCenterX`) align x like the matching align action; the
/// horizontal ones (`StackTop`, `StackBottom`, `StackCenterY`) align y.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LayoutType {
    AlignLeft,
    AlignRight,
    AlignTop,
    AlignBottom,
    AlignCenterX,
    AlignCenterY,
    CommonWidth,
    CommonHeight,
    StackLeft,
    StackRight,
    StackCenterX,
    StackTop,
    StackBottom,
    StackCenterY,
}

impl LayoutType {
    pub const ALL: [LayoutType; 14] = [
        LayoutType::AlignLeft,
        LayoutType::AlignRight,
        LayoutType::AlignTop,
        LayoutType::AlignBottom,
        LayoutType::AlignCenterX,
        LayoutType::AlignCenterY,
        LayoutType::CommonWidth,
        LayoutType::CommonHeight,
        LayoutType::StackLeft,
        LayoutType::StackRight,
        LayoutType::StackCenterX,
        LayoutType::StackTop,
        LayoutType::StackBottom,
        LayoutType::StackCenterY,
    ];

    pub fn label(self) -> &'static str {
        match self {
            LayoutType::AlignLeft => "Align left",
            LayoutType::AlignRight => "Align right",
            LayoutType::AlignTop => "Align top",
            LayoutType::AlignBottom => "Align bottom",
            LayoutType::AlignCenterX => "Align horizontal centers",
            LayoutType::AlignCenterY => "Align vertical centers",
            LayoutType::CommonWidth => "Common width",
            LayoutType::CommonHeight => "Common height",
            LayoutType::StackLeft => "Stack vertically, align left",
            LayoutType::StackRight => "Stack vertically, align right",
            LayoutType::StackCenterX => "Stack vertically, align centers",
            LayoutType::StackTop => "Stack horizontally, align top",
            LayoutType::StackBottom => "Stack horizontally, align bottom",
            LayoutType::StackCenterY => "Stack horizontally, align centers",
        }
    }
}

/// Apply a layout action to the shaped elements and groups among `ids`.
///
/// Lines, anchors and states are ignored: they follow what they are
/// attached to. Moving a group moves its content; moving a member of a
/// group moves only that member, which stays in its group. Selections of
/// fewer than two elements are left alone.
pub fn layout(model: &mut PathwayModel, ids: &[ElementId], layout: LayoutType) -> Result<()> {
    let items: Vec<(ElementId, Rect, bool)> = outermost(model, ids)
        .into_iter()
        .filter_map(|id| {
            let element = model.get_element(&id)?;
            let resizable = match element.object_type() {
                ObjectType::DataNode | ObjectType::Label | ObjectType::Shape => true,
                ObjectType::Group => false,
                _ => return None,
            };
            let bounds = model.element_bounds(&id)?;
            Some((id, bounds, resizable))
        })
        .collect();
    if items.len() < 2 {
        return Ok(());
    }

    let lefts = items.iter().map(|(_, b, _)| b.left);
    let min_left = lefts.fold(f64::INFINITY, f64::min);
    let max_right = items.iter().map(|(_, b, _)| b.right()).fold(f64::NEG_INFINITY, f64::max);
    let min_top = items.iter().map(|(_, b, _)| b.top).fold(f64::INFINITY, f64::min);
    let max_bottom = items.iter().map(|(_, b, _)| b.bottom()).fold(f64::NEG_INFINITY, f64::max);
    let n = items.len() as f64;
    let mean_cx = items.iter().map(|(_, b, _)| b.center_x()).sum::<f64>() / n;
    let mean_cy = items.iter().map(|(_, b, _)| b.center_y()).sum::<f64>() / n;

    let align_x = |b: &Rect, kind: LayoutType| match kind {
        LayoutType::AlignLeft | LayoutType::StackLeft => min_left - b.left,
        LayoutType::AlignRight | LayoutType::StackRight => max_right - b.right(),
        LayoutType::AlignCenterX | LayoutType::StackCenterX => mean_cx - b.center_x(),
        _ => 0.0,
    };
    let align_y = |b: &Rect, kind: LayoutType| match kind {
        LayoutType::AlignTop | LayoutType::StackTop => min_top - b.top,
        LayoutType::AlignBottom | LayoutType::StackBottom => max_bottom - b.bottom(),
        LayoutType::AlignCenterY | LayoutType::StackCenterY => mean_cy - b.center_y(),
        _ => 0.0,
    };

    match layout {
        LayoutType::AlignLeft
        | LayoutType::AlignRight
        | LayoutType::AlignCenterX
        | LayoutType::AlignTop
        | LayoutType::AlignBottom
        | LayoutType::AlignCenterY => {
            for (id, b, _) in &items {
                move_if_needed(model, id, align_x(b, layout), align_y(b, layout))?;
            }
        }
        LayoutType::CommonWidth | LayoutType::CommonHeight => {
            let max_w = items.iter().map(|(_, b, _)| b.width).fold(0.0, f64::max);
            let max_h = items.iter().map(|(_, b, _)| b.height).fold(0.0, f64::max);
            for (id, b, resizable) in &items {
                if !resizable {
                    continue;
                }
                let mut resized = *b;
                if layout == LayoutType::CommonWidth {
                    resized.width = max_w;
                } else {
                    resized.height = max_h;
                }
                if resized != *b {
                    model.set_bounds(id, resized)?;
                }
            }
        }
        LayoutType::StackLeft | LayoutType::StackRight | LayoutType::StackCenterX => {
            let mut sorted = items.clone();
            sorted.sort_by(|a, b| a.1.top.total_cmp(&b.1.top));
            let mut next_top = min_top;
            for (id, b, _) in &sorted {
                move_if_needed(model, id, align_x(b, layout), next_top - b.top)?;
                next_top += b.height;
            }
        }
        LayoutType::StackTop | LayoutType::StackBottom | LayoutType::StackCenterY => {
            let mut sorted = items.clone();
            sorted.sort_by(|a, b| a.1.left.total_cmp(&b.1.left));
            let mut next_left = min_left;
            for (id, b, _) in &sorted {
                move_if_needed(model, id, next_left - b.left, align_y(b, layout))?;
                next_left += b.width;
            }
        }
    }
    Ok(())
}

fn move_if_needed(model: &mut PathwayModel, id: &ElementId, dx: f64, dy: f64) -> Result<()> {
    if dx.abs() < f64::EPSILON && dy.abs() < f64::EPSILON {
        return Ok(());
    }
    model.move_elements(std::slice::from_ref(id), dx, dy)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connector::ConnectorType;
    use crate::model::{DataNodeType, LinePoint};

    fn node(p: &mut PathwayModel, id: &str, x: f64, y: f64, w: f64) -> ElementId {
        p.add(PathwayElement::data_node(id, DataNodeType::Protein, Rect::new(x, y, w, 20.0)).with_id(id))
            .unwrap()
    }

    fn bounds(p: &PathwayModel, id: &str) -> Rect {
        p.element_bounds(&id.into()).unwrap()
    }

    #[test]
    fn test_toggle_group_creates_and_dissolves() {
        let mut p = PathwayModel::new();
        let a = node(&mut p, "a", 0.0, 0.0, 80.0);
        let b = node(&mut p, "b", 100.0, 50.0, 80.0);

        let GroupToggle::Grouped(g) = toggle_group(&mut p, &[a.clone(), b.clone()]).unwrap() else {
            panic!("expected a new group");
        };
        assert_eq!(p.get_element(&a).unwrap().group_ref.as_ref(), Some(&g));
        assert_eq!(bounds(&p, g.as_str()), Rect::new(-8.0, -8.0, 196.0, 86.0));

        let GroupToggle::Ungrouped(members) = toggle_group(&mut p, &[g.clone()]).unwrap() else {
            panic!("expected an ungroup");
        };
        assert_eq!(members, vec![a.clone(), b.clone()]);
        assert!(!p.contains(&g));
        assert!(p.get_element(&a).unwrap().group_ref.is_none());
        assert!(p.validate().is_empty());
    }

    #[test]
    fn test_ungroup_nested_reparents_to_outer() {
        let mut p = PathwayModel::new();
        let a = node(&mut p, "a", 0.0, 0.0, 80.0);
        let b = node(&mut p, "b", 100.0, 0.0, 80.0);
        let c = node(&mut p, "c", 0.0, 100.0, 80.0);
        let inner = group_elements(&mut p, &[a.clone(), b.clone()], GroupStyle::Group).unwrap();
        let outer = group_elements(&mut p, &[inner.clone(), c.clone()], GroupStyle::Group).unwrap();

        ungroup(&mut p, &inner).unwrap();
        for m in [&a, &b, &c] {
            assert_eq!(p.get_element(m).unwrap().group_ref.as_ref(), Some(&outer));
        }
        assert!(p.group_members(&outer).unwrap().contains(&a));
        assert!(p.validate().is_empty());
    }

    #[test]
    fn test_group_inside_shared_parent_stays_nested() {
        let mut p = PathwayModel::new();
        let a = node(&mut p, "a", 0.0, 0.0, 80.0);
        let b = node(&mut p, "b", 100.0, 0.0, 80.0);
        let c = node(&mut p, "c", 0.0, 100.0, 80.0);
        let outer = group_elements(&mut p, &[a.clone(), b.clone(), c], GroupStyle::Group).unwrap();
        let inner = group_elements(&mut p, &[a, b], GroupStyle::Complex).unwrap();
        assert_eq!(p.get_element(&inner).unwrap().group_ref.as_ref(), Some(&outer));
    }

    #[test]
    fn test_grouping_nothing_groupable_fails() {
        let mut p = PathwayModel::new();
        let a = node(&mut p, "a", 0.0, 0.0, 80.0);
        let s = p.add(PathwayElement::state(a, "P", 1.0, 1.0)).unwrap();
        assert!(matches!(
            group_elements(&mut p, &[s], GroupStyle::Group),
            Err(ModelError::Capability { .. })
        ));
    }

    #[test]
    fn test_delete_group_deletes_content_and_freezes_lines() {
        let mut p = PathwayModel::new();
        let a = node(&mut p, "a", 0.0, 0.0, 80.0);
        let b = node(&mut p, "b", 0.0, 50.0, 80.0);
        let g = group_elements(&mut p, &[a.clone(), b.clone()], GroupStyle::Group).unwrap();
        let l = p
            .add(PathwayElement::interaction(
                LinePoint::at(300.0, 0.0),
                LinePoint::linked(g.clone(), 1.0, 0.0),
                ConnectorType::Straight,
            ))
            .unwrap();
        let end_before = p.line_end_position(&l, crate::model::LineEnd::End).unwrap();

        let removed = delete_elements(&mut p, &[g.clone(), a.clone()]);
        assert_eq!(removed.len(), 3);
        assert!(!p.contains(&a) && !p.contains(&b) && !p.contains(&g));
        let line = p.get_element(&l).unwrap().as_line().unwrap();
        assert!(line.end().element_ref.is_none());
        assert!(line.end().position().approx_eq(end_before, 1e-9));
        assert!(p.validate().is_empty());
    }

    #[test]
    fn test_front_and_back_stay_in_tier() {
        let mut p = PathwayModel::new();
        let a = node(&mut p, "a", 0.0, 0.0, 80.0);
        let b = node(&mut p, "b", 0.0, 0.0, 80.0);
        let label = p.add(PathwayElement::label("x", Rect::new(0.0, 0.0, 10.0, 10.0))).unwrap();
        bring_to_front(&mut p, &[a.clone()]).unwrap();
        let za = p.get_element(&a).unwrap().z_order;
        assert!(za > p.get_element(&b).unwrap().z_order);
        send_to_back(&mut p, &[a.clone()]).unwrap();
        assert!(p.get_element(&a).unwrap().z_order < p.get_element(&b).unwrap().z_order);
        // the label's tier range did not matter
        assert!(p.get_element(&a).unwrap().z_order > p.get_element(&label).unwrap().z_order);
    }

    #[test]
    fn test_align_and_common_size() {
        let mut p = PathwayModel::new();
        node(&mut p, "a", 10.0, 0.0, 80.0);
        node(&mut p, "b", 50.0, 40.0, 40.0);
        let ids: Vec<ElementId> = vec!["a".into(), "b".into()];

        layout(&mut p, &ids, LayoutType::AlignLeft).unwrap();
        assert_eq!(bounds(&p, "b").left, 10.0);

        layout(&mut p, &ids, LayoutType::AlignRight).unwrap();
        assert_eq!(bounds(&p, "b").right(), 90.0);

        layout(&mut p, &ids, LayoutType::CommonWidth).unwrap();
        assert_eq!(bounds(&p, "b").width, 80.0);
        assert_eq!(bounds(&p, "b").left, 50.0);
    }

    #[test]
    fn test_stack_vertically() {
        let mut p = PathwayModel::new();
        node(&mut p, "a", 0.0, 0.0, 80.0);
        node(&mut p, "b", 30.0, 100.0, 40.0);
        node(&mut p, "c", 60.0, 50.0, 60.0);
        let ids: Vec<ElementId> = vec!["a".into(), "b".into(), "c".into()];
        layout(&mut p, &ids, LayoutType::StackLeft).unwrap();
        assert_eq!(bounds(&p, "a"), Rect::new(0.0, 0.0, 80.0, 20.0));
        assert_eq!(bounds(&p, "c"), Rect::new(0.0, 20.0, 60.0, 20.0));
        assert_eq!(bounds(&p, "b"), Rect::new(0.0, 40.0, 40.0, 20.0));
    }

    #[test]
    fn test_align_member_keeps_membership() {
        let mut p = PathwayModel::new();
        let a = node(&mut p, "a", 0.0, 0.0, 80.0);
        let b = node(&mut p, "b", 100.0, 0.0, 80.0);
        let g = group_elements(&mut p, &[a.clone(), b.clone()], GroupStyle::Group).unwrap();
        let c = node(&mut p, "c", 0.0, 200.0, 80.0);
        layout(&mut p, &[b.clone(), c], LayoutType::AlignBottom).unwrap();
        assert_eq!(p.get_element(&b).unwrap().group_ref.as_ref(), Some(&g));
        assert_eq!(bounds(&p, "b").top, 200.0);
        assert_eq!(bounds(&p, "a").top, 0.0);
        assert!(p.validate().is_empty());
    }
}
