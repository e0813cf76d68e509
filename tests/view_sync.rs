use pathweaver::config::EditorConfig;
use pathweaver::connector::ConnectorType;
use pathweaver::model::{DataNodeType, ElementId, LinePoint, PathwayElement, Point, Rect};
use pathweaver::pathway::PathwayModel;
use pathweaver::view::{DrawTier, VPathway};

/// Line, shape, label and data node with z-orders in descending order, so
/// natural order has to come from the tiers.
fn mixed() -> PathwayModel {
    let mut model = PathwayModel::new();
    model
        .add(
            PathwayElement::data_node("n", DataNodeType::GeneProduct, Rect::new(0.0, 0.0, 80.0, 20.0))
                .with_id("node")
                .with_z_order(1),
        )
        .unwrap();
    model
        .add(
            PathwayElement::label("l", Rect::new(100.0, 0.0, 40.0, 20.0))
                .with_id("label")
                .with_z_order(2),
        )
        .unwrap();
    model
        .add(
            PathwayElement::shape("Oval", Rect::new(200.0, 0.0, 60.0, 60.0))
                .with_id("shape")
                .with_z_order(3),
        )
        .unwrap();
    model
        .add(
            PathwayElement::graphical_line(LinePoint::at(0.0, 100.0), LinePoint::at(300.0, 100.0), ConnectorType::Straight)
                .with_id("line")
                .with_z_order(4),
        )
        .unwrap();
    model
}

fn ids(names: &[&str]) -> Vec<ElementId> {
    names.iter().map(|n| ElementId::from(*n)).collect()
}

#[test]
fn natural_order_ignores_descending_z_and_selection() {
    let model = mixed();
    let mut view = VPathway::from_model(&model, &EditorConfig::default());
    let expected = ids(&["line", "shape", "label", "node"]);
    assert_eq!(view.ordered_ids(), expected);

    view.select_all();
    assert_eq!(view.ordered_ids(), expected);
    // handles draw above everything
    let last = view.natural_order().last().unwrap();
    assert_eq!(last.tier(), DrawTier::Handle);

    view.toggle_selection(&"shape".into());
    view.toggle_selection(&"node".into());
    assert_eq!(view.ordered_ids(), expected);
    view.clear_selection();
    assert_eq!(view.ordered_ids(), expected);
    assert!(view.natural_order().all(|v| !v.is_handle()));
}

#[test]
fn view_follows_model_edits_after_sync() {
    let mut model = mixed();
    model.drain_events();
    let mut view = VPathway::from_model(&model, &EditorConfig::default());

    model
        .add(PathwayElement::data_node("m", DataNodeType::Metabolite, Rect::new(0.0, 40.0, 80.0, 20.0)).with_id("m"))
        .unwrap();
    model.move_by(&"node".into(), 10.0, 0.0).unwrap();
    model.remove(&"label".into()).unwrap();
    assert!(view.get(&"m".into()).is_none());

    view.sync(&mut model);
    assert!(view.get(&"label".into()).is_none());
    assert_eq!(view.get(&"m".into()).unwrap().bounds(), Rect::new(0.0, 40.0, 80.0, 20.0));
    assert_eq!(view.get(&"node".into()).unwrap().bounds(), Rect::new(10.0, 0.0, 80.0, 20.0));
    assert_eq!(view.ordered_ids(), ids(&["line", "shape", "node", "m"]));
}

#[test]
fn event_overflow_rebuilds_the_view() {
    let config = EditorConfig {
        event_capacity: 4,
        ..EditorConfig::default()
    };
    let mut model = PathwayModel::with_config(config.clone());
    let mut view = VPathway::from_model(&model, &config);
    for i in 0..20 {
        model
            .add(PathwayElement::label(&format!("n{i}"), Rect::new(i as f64 * 50.0, 0.0, 40.0, 20.0)))
            .unwrap();
    }
    view.sync(&mut model);
    assert_eq!(view.len(), 20);
    assert!(!model.has_pending_events());
}

#[test]
fn zoom_maps_hits_back_to_model() {
    let model = mixed();
    let mut view = VPathway::from_model(&model, &EditorConfig::default());
    view.set_zoom(&model, 2.0);
    let hit = view.element_at(Point::new(50.0, 20.0)).unwrap();
    assert_eq!(hit.element_id(), Some(&ElementId::from("node")));
    assert_eq!(view.to_model(Point::new(50.0, 20.0)), Point::new(25.0, 10.0));
}
