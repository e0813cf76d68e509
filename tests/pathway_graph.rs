use pathweaver::connector::ConnectorType;
use pathweaver::editor::operations;
use pathweaver::model::{
    DataNodeType, ElementId, GroupStyle, LineEnd, LinePoint, ObjectType, PathwayElement, Point,
    Rect,
};
use pathweaver::pathway::{ModelEvent, PathwayModel};

fn node(id: &str, x: f64, y: f64) -> PathwayElement {
    PathwayElement::data_node(id, DataNodeType::Protein, Rect::new(x, y, 80.0, 20.0)).with_id(id)
}

fn assert_consistent(model: &PathwayModel) {
    let problems = model.validate();
    assert!(problems.is_empty(), "{problems:#?}");
}

/// Three nodes, a line a -> b and an anchor on it with a line from c.
fn network() -> PathwayModel {
    let mut model = PathwayModel::new();
    model.add(node("a", 0.0, 0.0)).unwrap();
    model.add(node("b", 300.0, 0.0)).unwrap();
    model.add(node("c", 150.0, 200.0)).unwrap();
    model
        .add(
            PathwayElement::interaction(
                LinePoint::linked("a", 1.0, 0.0),
                LinePoint::linked("b", -1.0, 0.0),
                ConnectorType::Straight,
            )
            .with_id("ab"),
        )
        .unwrap();
    model.add(PathwayElement::anchor("ab", 0.5).with_id("mid")).unwrap();
    model
        .add(
            PathwayElement::interaction(
                LinePoint::linked("c", 0.0, -1.0),
                LinePoint::linked("mid", 0.0, 0.0),
                ConnectorType::Elbow,
            )
            .with_id("cm"),
        )
        .unwrap();
    model
}

#[test]
fn membership_stays_bidirectional_through_edits() {
    let mut model = network();
    let ids: Vec<ElementId> = vec!["a".into(), "b".into()];
    let g = operations::group_elements(&mut model, &ids, GroupStyle::Complex).unwrap();
    assert_consistent(&model);

    let outer = operations::group_elements(&mut model, &[g.clone(), "c".into()], GroupStyle::Group).unwrap();
    assert_consistent(&model);
    assert_eq!(model.ancestors(&"a".into()), vec![g.clone(), outer.clone()]);
    assert_eq!(model.top_level(&"a".into()), outer);

    // moving a member out of the nested group
    model.set_group_ref(&"b".into(), Some(&outer)).unwrap();
    assert_consistent(&model);
    assert!(!model.group_members(&g).unwrap().contains(&ElementId::from("b")));

    // a group cannot end up inside itself
    assert!(model.set_group_ref(&outer, Some(&g)).is_err());
    assert_consistent(&model);

    operations::ungroup(&mut model, &outer).unwrap();
    assert_consistent(&model);
    assert_eq!(model.get_element(&g).unwrap().group_ref, None);

    model.remove(&"a".into()).unwrap();
    assert_consistent(&model);
    assert!(model.group_members(&g).unwrap().is_empty());
}

#[test]
fn removal_leaves_no_dangling_references() {
    let mut model = network();
    let citation = model
        .add(PathwayElement::citation(Default::default()).with_id("cite"))
        .unwrap();
    model.add_citation_ref(&"a".into(), &citation).unwrap();
    let last_start = model.line_end_position(&"ab".into(), LineEnd::Start).unwrap();

    model.remove(&"a".into()).unwrap();
    assert_consistent(&model);
    let line = model.get_element(&"ab".into()).unwrap().as_line().unwrap();
    assert!(line.start().element_ref.is_none());
    assert_eq!(line.start().position(), last_start);

    // removing the host line takes its anchor along and unlinks cm
    model.remove(&"ab".into()).unwrap();
    assert_consistent(&model);
    assert!(!model.contains(&"mid".into()));
    let cm = model.get_element(&"cm".into()).unwrap().as_line().unwrap();
    assert!(cm.end().element_ref.is_none());

    model.remove(&citation).unwrap();
    assert_consistent(&model);
    for element in model.elements() {
        for (_, target) in element.references() {
            assert!(model.contains(&target), "{target} dangles");
        }
    }
}

#[test]
fn connectors_follow_moving_targets() {
    let mut model = network();
    assert_eq!(
        model.line_end_position(&"ab".into(), LineEnd::End),
        Some(Point::new(300.0, 10.0))
    );
    let mid = model.get_element(&"mid".into()).unwrap().as_anchor().unwrap().point;
    assert_eq!(mid, Point::new(190.0, 10.0));

    model.drain_events();
    model.move_by(&"b".into(), 100.0, 40.0).unwrap();

    assert_eq!(
        model.line_end_position(&"ab".into(), LineEnd::End),
        Some(Point::new(400.0, 50.0))
    );
    let mid = model.get_element(&"mid".into()).unwrap().as_anchor().unwrap().point;
    assert_eq!(mid, Point::new(240.0, 30.0));
    assert_eq!(model.line_end_position(&"cm".into(), LineEnd::End), Some(mid));

    let shape = model.connector_shape(&"cm".into()).unwrap();
    assert_eq!(shape.end(), Some(mid));

    // every dependent reported a geometry change
    let events = model.drain_events();
    for id in ["b", "ab", "mid", "cm"] {
        let id = ElementId::from(id);
        assert!(
            events.contains(&ModelEvent::GeometryChanged(id.clone())),
            "no geometry event for {id}: {events:?}"
        );
    }
}

#[test]
fn removing_a_group_freezes_attached_endpoints() {
    let mut model = network();
    let g = operations::group_elements(&mut model, &["a".into(), "b".into()], GroupStyle::Group).unwrap();
    let l = model
        .add(PathwayElement::graphical_line(
            LinePoint::linked(g.clone(), 0.0, 1.0),
            LinePoint::at(150.0, 400.0),
            ConnectorType::Straight,
        ))
        .unwrap();
    let attached = model.line_end_position(&l, LineEnd::Start).unwrap();

    model.remove(&g).unwrap();
    assert_consistent(&model);
    let line = model.get_element(&l).unwrap().as_line().unwrap();
    assert!(line.start().element_ref.is_none());
    assert!(line.start().position().approx_eq(attached, 1e-9));
    // members survive the group
    assert!(model.contains(&"a".into()) && model.contains(&"b".into()));
    assert_eq!(model.count(ObjectType::Group), 0);
}

#[test]
fn generated_ids_skip_taken_ones() {
    let mut model = PathwayModel::new();
    model.add(node("id0", 0.0, 0.0)).unwrap();
    let fresh = model
        .add(PathwayElement::label("note", Rect::new(0.0, 50.0, 40.0, 20.0)))
        .unwrap();
    assert_ne!(fresh, ElementId::from("id0"));
    assert!(fresh.as_str().starts_with("id"));
    assert!(model.add(node("id0", 10.0, 10.0)).is_err());
    assert_eq!(model.len(), 2);
}
