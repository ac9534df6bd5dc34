use std::cell::RefCell;
use std::rc::Rc;

use diagram_core::event::UndoDirection;
use diagram_core::layer::LayerId;
use diagram_core::{
    Bounds, Diagram, DiagramConfig, Edge, EdgeProps, ElementId, ElementRef, Endpoint, Node, NodeDefinitionRegistry,
    NodeProps, Transform, UndoEvent, UnitOfWork,
};
use egui::Pos2;
use proptest::prelude::*;

fn init() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn rect(layer: LayerId, x: f32, y: f32) -> Node {
    Node::new("rect", Bounds::new(x, y, 100.0, 100.0), NodeProps::default(), layer)
}

fn move_node(diagram: &mut Diagram, id: ElementId, dx: f32, dy: f32) {
    UnitOfWork::execute(diagram, "Move", |d, uow| {
        d.transform_nodes(&[id], &[Transform::translate(dx, dy)], uow)
    })
    .unwrap();
}

fn position(diagram: &Diagram, id: ElementId) -> Pos2 {
    diagram.node(id).unwrap().bounds().pos
}

#[test]
fn test_add_is_undone_and_redone() {
    init();
    let mut diagram = Diagram::new("add");
    let layer = diagram.layers().active().unwrap();

    let id = UnitOfWork::execute(&mut diagram, "Add", |d, uow| d.add_node(layer, rect(layer, 0.0, 0.0), uow)).unwrap();
    assert!(diagram.undo_manager().can_undo());

    assert!(diagram.undo());
    assert!(!diagram.contains(ElementRef::Node(id)));
    assert!(diagram.layer(layer).unwrap().elements().is_empty());

    assert!(diagram.redo());
    assert!(diagram.contains(ElementRef::Node(id)));
    assert_eq!(diagram.layer(layer).unwrap().elements(), &[ElementRef::Node(id)]);
    assert!(diagram.check_consistency().is_empty());
}

#[test]
fn test_remove_with_edges_is_undone() {
    init();
    let mut diagram = Diagram::new("remove");
    let layer = diagram.layers().active().unwrap();
    let (a, b, e) = UnitOfWork::immediate(&mut diagram, |d, uow| {
        let a = d.add_node(layer, rect(layer, 0.0, 0.0), uow).unwrap();
        let b = d.add_node(layer, rect(layer, 300.0, 0.0), uow).unwrap();
        let edge = Edge::new(Endpoint::connected(a, 0), Endpoint::connected(b, 0), EdgeProps::default(), layer);
        (a, b, d.add_edge(layer, edge, uow).unwrap())
    });

    UnitOfWork::execute(&mut diagram, "Delete", |d, uow| {
        d.remove_element(ElementRef::Node(b), uow)?;
        d.remove_element(ElementRef::Edge(e), uow)
    })
    .unwrap();
    assert_eq!(diagram.nodes().count(), 1);
    assert_eq!(diagram.edges().count(), 0);
    assert_eq!(diagram.node(a).unwrap().connected_edges().len(), 0);

    assert!(diagram.undo());
    assert_eq!(diagram.edge(e).unwrap().end(), Endpoint::connected(b, 0));
    assert_eq!(diagram.node(b).unwrap().edges_at(0).collect::<Vec<_>>(), vec![e]);
    assert_eq!(
        diagram.layer(layer).unwrap().elements(),
        &[ElementRef::Node(a), ElementRef::Node(b), ElementRef::Edge(e)]
    );
    assert!(diagram.check_consistency().is_empty());

    assert!(diagram.redo());
    assert!(!diagram.contains(ElementRef::Edge(e)));
    assert!(diagram.check_consistency().is_empty());
}

#[test]
fn test_history_is_bounded() {
    init();
    let config = DiagramConfig {
        max_history: 3,
        ..Default::default()
    };
    let mut diagram = Diagram::with_config("bounded", config, NodeDefinitionRegistry::default());
    let layer = diagram.layers().active().unwrap();
    let id = UnitOfWork::immediate(&mut diagram, |d, uow| d.add_node(layer, rect(layer, 0.0, 0.0), uow)).unwrap();

    for _ in 0..5 {
        move_node(&mut diagram, id, 10.0, 0.0);
    }
    assert_eq!(diagram.undo_manager().undo_depth(), 3);

    while diagram.undo() {}
    // The two oldest moves were evicted
    assert_eq!(position(&diagram, id), Pos2::new(20.0, 0.0));
    assert_eq!(diagram.undo_manager().redo_depth(), 3);
}

#[test]
fn test_coalescing_moves_merge_into_one_step() {
    init();
    let config = DiagramConfig {
        merge_window_ms: 60_000,
        ..Default::default()
    };
    let mut diagram = Diagram::with_config("drag", config, NodeDefinitionRegistry::default());
    let layer = diagram.layers().active().unwrap();
    let id = UnitOfWork::immediate(&mut diagram, |d, uow| d.add_node(layer, rect(layer, 0.0, 0.0), uow)).unwrap();

    for _ in 0..3 {
        UnitOfWork::execute_coalescing(&mut diagram, "Drag", |d, uow| {
            d.transform_nodes(&[id], &[Transform::translate(5.0, 5.0)], uow)
        })
        .unwrap();
    }
    assert_eq!(diagram.undo_manager().undo_depth(), 1);
    assert_eq!(position(&diagram, id), Pos2::new(15.0, 15.0));

    assert!(diagram.undo());
    assert_eq!(position(&diagram, id), Pos2::new(0.0, 0.0));
    assert!(diagram.redo());
    assert_eq!(position(&diagram, id), Pos2::new(15.0, 15.0));
}

#[test]
fn test_plain_steps_do_not_merge() {
    init();
    let config = DiagramConfig {
        merge_window_ms: 60_000,
        ..Default::default()
    };
    let mut diagram = Diagram::with_config("steps", config, NodeDefinitionRegistry::default());
    let layer = diagram.layers().active().unwrap();
    let id = UnitOfWork::immediate(&mut diagram, |d, uow| d.add_node(layer, rect(layer, 0.0, 0.0), uow)).unwrap();

    move_node(&mut diagram, id, 5.0, 0.0);
    move_node(&mut diagram, id, 5.0, 0.0);

    assert_eq!(diagram.undo_manager().undo_depth(), 2);
}

#[test]
fn test_new_step_clears_redo() {
    init();
    let mut diagram = Diagram::new("redo");
    let layer = diagram.layers().active().unwrap();
    let id = UnitOfWork::immediate(&mut diagram, |d, uow| d.add_node(layer, rect(layer, 0.0, 0.0), uow)).unwrap();

    move_node(&mut diagram, id, 10.0, 0.0);
    assert!(diagram.undo());
    assert!(diagram.undo_manager().can_redo());

    move_node(&mut diagram, id, 0.0, 10.0);
    assert!(!diagram.undo_manager().can_redo());
    assert!(!diagram.redo());
    assert_eq!(position(&diagram, id), Pos2::new(0.0, 10.0));
}

#[test]
fn test_undo_and_redo_emit_events() {
    init();
    let mut diagram = Diagram::new("events");
    let layer = diagram.layers().active().unwrap();
    let id = UnitOfWork::immediate(&mut diagram, |d, uow| d.add_node(layer, rect(layer, 0.0, 0.0), uow)).unwrap();
    move_node(&mut diagram, id, 10.0, 0.0);

    let events = Rc::new(RefCell::new(Vec::new()));
    let sink = events.clone();
    diagram
        .undo_manager()
        .events()
        .subscribe(move |event: &UndoEvent| sink.borrow_mut().push(event.clone()));

    assert!(diagram.undo());
    assert!(diagram.redo());

    assert_eq!(
        *events.borrow(),
        vec![
            UndoEvent::Execute {
                direction: UndoDirection::Undo,
                description: "Move".to_string(),
            },
            UndoEvent::Change,
            UndoEvent::Execute {
                direction: UndoDirection::Redo,
                description: "Move".to_string(),
            },
            UndoEvent::Change,
        ]
    );
}

#[test]
fn test_undo_on_empty_history_does_nothing() {
    init();
    let mut diagram = Diagram::new("empty");
    assert!(!diagram.undo());
    assert!(!diagram.redo());
}

#[test]
fn test_property_change_is_undone() {
    init();
    let mut diagram = Diagram::new("props");
    let layer = diagram.layers().active().unwrap();
    let id = UnitOfWork::immediate(&mut diagram, |d, uow| d.add_node(layer, rect(layer, 0.0, 0.0), uow)).unwrap();

    UnitOfWork::execute(&mut diagram, "Rename", |d, uow| {
        d.update_node_props(id, uow, |props, _| props.text = Some("Hello".to_string()))
    })
    .unwrap();
    assert_eq!(diagram.node(id).unwrap().props().text.as_deref(), Some("Hello"));

    assert!(diagram.undo());
    assert_eq!(diagram.node(id).unwrap().props().text, None);
}

proptest! {
    #[test]
    fn prop_undo_then_redo_restores_each_state(
        moves in prop::collection::vec((0usize..2, 1.0f32..50.0, 1.0f32..50.0), 1..8)
    ) {
        let mut diagram = Diagram::new("prop");
        let layer = diagram.layers().active().unwrap();
        let nodes = UnitOfWork::immediate(&mut diagram, |d, uow| {
            let a = d.add_node(layer, rect(layer, 0.0, 0.0), uow).unwrap();
            let b = d.add_node(layer, rect(layer, 300.0, 0.0), uow).unwrap();
            let edge = Edge::new(Endpoint::connected(a, 2), Endpoint::connected(b, 4), EdgeProps::default(), layer);
            d.add_edge(layer, edge, uow).unwrap();
            [a, b]
        });

        let mut states = vec![diagram.serialize_layers()];
        for (which, dx, dy) in &moves {
            move_node(&mut diagram, nodes[*which], *dx, *dy);
            states.push(diagram.serialize_layers());
        }

        for expected in states.iter().rev().skip(1) {
            prop_assert!(diagram.undo());
            prop_assert_eq!(&diagram.serialize_layers(), expected);
        }
        prop_assert!(!diagram.undo());

        for expected in states.iter().skip(1) {
            prop_assert!(diagram.redo());
            prop_assert_eq!(&diagram.serialize_layers(), expected);
        }
        prop_assert!(diagram.check_consistency().is_empty());
    }
}
