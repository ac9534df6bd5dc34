use diagram_core::element::{IntersectionKind, LabelPlacement, LineHops};
use diagram_core::layer::LayerId;
use diagram_core::{
    Bounds, Diagram, DiagramError, Edge, EdgeProps, ElementId, ElementRef, ElementReference, Endpoint, Node,
    NodeProps, Relation, Transform, UnitOfWork,
};
use egui::{Pos2, Vec2};

fn init() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn node(node_type: &str, layer: LayerId, x: f32, y: f32, w: f32, h: f32) -> Node {
    Node::new(node_type, Bounds::new(x, y, w, h), NodeProps::default(), layer)
}

fn edge(layer: LayerId, start: Endpoint, end: Endpoint) -> Edge {
    Edge::new(start, end, EdgeProps::default(), layer)
}

fn approx(a: Pos2, b: Pos2) -> bool {
    a.distance(b) < 1e-3
}

#[test]
fn test_edge_index_follows_endpoint_changes() {
    init();
    let mut diagram = Diagram::new("index");
    let layer = diagram.layers().active().unwrap();

    let (b, c, e) = UnitOfWork::immediate(&mut diagram, |d, uow| {
        let a = d.add_node(layer, node("rect", layer, 0.0, 0.0, 100.0, 100.0), uow).unwrap();
        let b = d.add_node(layer, node("rect", layer, 200.0, 0.0, 100.0, 100.0), uow).unwrap();
        let c = d.add_node(layer, node("rect", layer, 400.0, 0.0, 100.0, 100.0), uow).unwrap();
        let e = d
            .add_edge(layer, edge(layer, Endpoint::connected(a, 1), Endpoint::connected(b, 3)), uow)
            .unwrap();
        (b, c, e)
    });
    assert_eq!(diagram.node(b).unwrap().edges_at(3).collect::<Vec<_>>(), vec![e]);

    UnitOfWork::immediate(&mut diagram, |d, uow| d.set_edge_end(e, Endpoint::connected(c, 2), uow)).unwrap();

    assert_eq!(diagram.node(b).unwrap().edges_at(3).count(), 0);
    assert_eq!(diagram.node(c).unwrap().edges_at(2).collect::<Vec<_>>(), vec![e]);
    assert!(diagram.check_consistency().is_empty());
}

#[test]
fn test_invalid_anchor_is_rejected() {
    init();
    let mut diagram = Diagram::new("anchors");
    let layer = diagram.layers().active().unwrap();

    let result = UnitOfWork::immediate(&mut diagram, |d, uow| {
        let a = d.add_node(layer, node("rect", layer, 0.0, 0.0, 100.0, 100.0), uow)?;
        d.add_edge(layer, edge(layer, Endpoint::connected(a, 42), Endpoint::free(0.0, 0.0)), uow)
    });

    assert!(matches!(result, Err(DiagramError::InvalidAnchor { anchor: 42, .. })));
    assert_eq!(diagram.edges().count(), 0);
}

#[test]
fn test_loop_edge_keeps_shared_anchor_listed() {
    init();
    let mut diagram = Diagram::new("loop");
    let layer = diagram.layers().active().unwrap();

    let (a, e) = UnitOfWork::immediate(&mut diagram, |d, uow| {
        let a = d.add_node(layer, node("rect", layer, 0.0, 0.0, 100.0, 100.0), uow).unwrap();
        let e = d
            .add_edge(layer, edge(layer, Endpoint::connected(a, 1), Endpoint::connected(a, 1)), uow)
            .unwrap();
        (a, e)
    });

    UnitOfWork::immediate(&mut diagram, |d, uow| d.set_edge_start(e, Endpoint::connected(a, 2), uow)).unwrap();

    let a_node = diagram.node(a).unwrap();
    assert_eq!(a_node.edges_at(1).collect::<Vec<_>>(), vec![e]);
    assert_eq!(a_node.edges_at(2).collect::<Vec<_>>(), vec![e]);
    assert!(diagram.check_consistency().is_empty());
}

#[test]
fn test_removing_node_frees_its_edges() {
    init();
    let mut diagram = Diagram::new("remove");
    let layer = diagram.layers().active().unwrap();

    let (a, b, e) = UnitOfWork::immediate(&mut diagram, |d, uow| {
        let a = d.add_node(layer, node("rect", layer, 0.0, 0.0, 100.0, 100.0), uow).unwrap();
        let b = d.add_node(layer, node("rect", layer, 300.0, 0.0, 100.0, 100.0), uow).unwrap();
        let e = d
            .add_edge(layer, edge(layer, Endpoint::connected(a, 2), Endpoint::connected(b, 4)), uow)
            .unwrap();
        (a, b, e)
    });

    UnitOfWork::execute(&mut diagram, "Delete", |d, uow| d.remove_element(ElementRef::Node(a), uow)).unwrap();

    assert!(!diagram.contains(ElementRef::Node(a)));
    assert_eq!(diagram.edge(e).unwrap().start(), Endpoint::free(100.0, 50.0));
    assert_eq!(diagram.node(b).unwrap().edges_at(4).collect::<Vec<_>>(), vec![e]);
    assert!(diagram.check_consistency().is_empty());

    assert!(diagram.undo());
    assert_eq!(diagram.edge(e).unwrap().start(), Endpoint::connected(a, 2));
    assert_eq!(diagram.node(a).unwrap().edges_at(2).collect::<Vec<_>>(), vec![e]);
    assert!(diagram.check_consistency().is_empty());
}

#[test]
fn test_removing_group_with_edge_attached_to_itself() {
    init();
    let mut diagram = Diagram::new("remove group");
    let layer = diagram.layers().active().unwrap();

    let (g, a, e) = UnitOfWork::immediate(&mut diagram, |d, uow| {
        let g = d.add_node(layer, node("group", layer, 0.0, 0.0, 200.0, 200.0), uow).unwrap();
        let a = d.add_child_node(g, node("rect", layer, 50.0, 50.0, 100.0, 100.0), uow).unwrap();
        let e = d
            .add_edge(layer, edge(layer, Endpoint::connected(a, 0), Endpoint::connected(g, 1)), uow)
            .unwrap();
        let on_group = ElementReference::new(ElementRef::Node(g), Relation::On);
        d.move_elements(&[ElementRef::Edge(e)], uow, layer, Some(on_group)).unwrap();
        (g, a, e)
    });
    assert_eq!(diagram.parent_of(ElementRef::Edge(e)), Some(g));
    assert!(diagram.check_consistency().is_empty());

    UnitOfWork::execute(&mut diagram, "Delete", |d, uow| d.remove_element(ElementRef::Node(g), uow)).unwrap();

    for element in [ElementRef::Node(g), ElementRef::Node(a), ElementRef::Edge(e)] {
        assert!(!diagram.contains(element));
    }
    assert!(diagram.layer(layer).unwrap().elements().is_empty());
    assert!(diagram.check_consistency().is_empty());

    assert!(diagram.undo());
    assert_eq!(diagram.node(g).unwrap().children(), &[ElementRef::Node(a), ElementRef::Edge(e)]);
    assert_eq!(diagram.edge(e).unwrap().end(), Endpoint::connected(g, 1));
    assert_eq!(diagram.node(g).unwrap().edges_at(1).collect::<Vec<_>>(), vec![e]);
    assert!(diagram.check_consistency().is_empty());
}

#[test]
fn test_removing_edge_removes_its_labels() {
    init();
    let mut diagram = Diagram::new("labels");
    let layer = diagram.layers().active().unwrap();

    let (e, label) = UnitOfWork::immediate(&mut diagram, |d, uow| {
        let e = d
            .add_edge(layer, edge(layer, Endpoint::free(0.0, 0.0), Endpoint::free(200.0, 0.0)), uow)
            .unwrap();
        let label = d
            .attach_label_node(e, node("text", layer, 0.0, 0.0, 20.0, 10.0), 0.5, LabelPlacement::Horizontal, uow)
            .unwrap();
        (e, label)
    });
    assert_eq!(diagram.node(label).unwrap().label_for(), Some(e));

    UnitOfWork::immediate(&mut diagram, |d, uow| d.remove_element(ElementRef::Edge(e), uow)).unwrap();

    assert!(!diagram.contains(ElementRef::Node(label)));
    assert!(diagram.check_consistency().is_empty());
}

#[test]
fn test_label_node_offset_is_derived_and_clamped() {
    init();
    let mut diagram = Diagram::new("label offset");
    let layer = diagram.layers().active().unwrap();

    let (e, label) = UnitOfWork::immediate(&mut diagram, |d, uow| {
        let e = d
            .add_edge(layer, edge(layer, Endpoint::free(0.0, 0.0), Endpoint::free(200.0, 0.0)), uow)
            .unwrap();
        let label = d
            .attach_label_node(e, node("text", layer, 0.0, 0.0, 20.0, 10.0), 0.5, LabelPlacement::Horizontal, uow)
            .unwrap();
        (e, label)
    });
    assert!(approx(diagram.node(label).unwrap().bounds().center(), Pos2::new(100.0, 0.0)));

    UnitOfWork::execute(&mut diagram, "Move label", |d, uow| {
        d.transform_nodes(&[label], &[Transform::translate(0.0, 30.0)], uow)
    })
    .unwrap();
    let offset = diagram.edge(e).unwrap().label_node(label).unwrap().offset;
    assert!((offset - Vec2::new(0.0, 30.0)).length() < 1e-3);
    assert!(approx(diagram.node(label).unwrap().bounds().center(), Pos2::new(100.0, 30.0)));

    UnitOfWork::execute(&mut diagram, "Move label", |d, uow| {
        d.transform_nodes(&[label], &[Transform::translate(0.0, 100.0)], uow)
    })
    .unwrap();
    let offset = diagram.edge(e).unwrap().label_node(label).unwrap().offset;
    assert!((offset.length() - diagram.config().max_label_offset).abs() < 1e-3);
    assert!(approx(diagram.node(label).unwrap().bounds().center(), Pos2::new(100.0, 50.0)));
    assert!(diagram.check_consistency().is_empty());
}

#[test]
fn test_label_follows_edge_geometry() {
    init();
    let mut diagram = Diagram::new("label layout");
    let layer = diagram.layers().active().unwrap();

    let (e, label) = UnitOfWork::immediate(&mut diagram, |d, uow| {
        let e = d
            .add_edge(layer, edge(layer, Endpoint::free(0.0, 0.0), Endpoint::free(0.0, 200.0)), uow)
            .unwrap();
        let label = d
            .attach_label_node(e, node("text", layer, 0.0, 0.0, 40.0, 10.0), 0.25, LabelPlacement::Parallel, uow)
            .unwrap();
        (e, label)
    });

    let bounds = diagram.node(label).unwrap().bounds();
    assert!(approx(bounds.center(), Pos2::new(0.0, 50.0)));
    assert!((bounds.rotation - std::f32::consts::FRAC_PI_2).abs() < 1e-4);

    UnitOfWork::immediate(&mut diagram, |d, uow| d.set_edge_end(e, Endpoint::free(0.0, 400.0), uow)).unwrap();
    assert!(approx(diagram.node(label).unwrap().bounds().center(), Pos2::new(0.0, 100.0)));
}

#[test]
fn test_label_moved_with_endpoint_node_keeps_offset_in_sync() {
    init();
    for order in [true, false] {
        let mut diagram = Diagram::new("label with node");
        let layer = diagram.layers().active().unwrap();
        let (a, e, label) = UnitOfWork::immediate(&mut diagram, |d, uow| {
            let a = d.add_node(layer, node("rect", layer, 0.0, 0.0, 100.0, 100.0), uow).unwrap();
            let e = d
                .add_edge(layer, edge(layer, Endpoint::connected(a, 2), Endpoint::free(300.0, 50.0)), uow)
                .unwrap();
            let label = d
                .attach_label_node(e, node("text", layer, 0.0, 0.0, 20.0, 10.0), 0.5, LabelPlacement::Parallel, uow)
                .unwrap();
            (a, e, label)
        });
        assert!(approx(diagram.node(label).unwrap().bounds().center(), Pos2::new(200.0, 50.0)));

        let ids = if order { [a, label] } else { [label, a] };
        UnitOfWork::execute(&mut diagram, "Move", |d, uow| {
            d.transform_nodes(&ids, &[Transform::translate(50.0, 0.0)], uow)
        })
        .unwrap();

        // Midpoint of (150,50)-(300,50) plus the dragged distance
        let offset = diagram.edge(e).unwrap().label_node(label).unwrap().offset;
        assert!((offset - Vec2::new(50.0, 0.0)).length() < 1e-3);
        assert!(approx(diagram.node(label).unwrap().bounds().center(), Pos2::new(275.0, 50.0)));

        // Relaying the edge later must not make the label jump
        UnitOfWork::immediate(&mut diagram, |d, uow| d.set_edge_end(e, Endpoint::free(400.0, 50.0), uow)).unwrap();
        assert!(approx(diagram.node(label).unwrap().bounds().center(), Pos2::new(325.0, 50.0)));
        assert!(diagram.check_consistency().is_empty());
    }
}

#[test]
fn test_label_attached_to_edge_between_its_own_edges_terminates() {
    init();
    let mut diagram = Diagram::new("label cycle");
    let layer = diagram.layers().active().unwrap();

    let (a, e2) = UnitOfWork::immediate(&mut diagram, |d, uow| {
        let a = d.add_node(layer, node("rect", layer, 0.0, 0.0, 100.0, 100.0), uow).unwrap();
        let e1 = d
            .add_edge(layer, edge(layer, Endpoint::connected(a, 2), Endpoint::free(300.0, 50.0)), uow)
            .unwrap();
        let label = d
            .attach_label_node(e1, node("text", layer, 0.0, 0.0, 20.0, 10.0), 0.5, LabelPlacement::Horizontal, uow)
            .unwrap();
        // Edge from the label back to the node that drives the first edge
        let e2 = d
            .add_edge(layer, edge(layer, Endpoint::connected(label, 1), Endpoint::connected(a, 3)), uow)
            .unwrap();
        (a, e2)
    });

    UnitOfWork::execute(&mut diagram, "Move", |d, uow| {
        d.transform_nodes(&[a], &[Transform::translate(0.0, 40.0)], uow)
    })
    .unwrap();

    assert!(diagram.edge(e2).is_ok());
    assert!(diagram.check_consistency().is_empty());
}

#[test]
fn test_edges_follow_anchor_when_outline_changes() {
    init();
    let mut diagram = Diagram::new("remap");
    let layer = diagram.layers().active().unwrap();

    let (n, right, top) = UnitOfWork::immediate(&mut diagram, |d, uow| {
        let n = d
            .add_node(layer, node("rounded-rect", layer, 0.0, 0.0, 100.0, 50.0), uow)
            .unwrap();
        let right = d
            .add_edge(layer, edge(layer, Endpoint::connected(n, 2), Endpoint::free(200.0, 25.0)), uow)
            .unwrap();
        let top = d
            .add_edge(layer, edge(layer, Endpoint::free(50.0, -100.0), Endpoint::connected(n, 1)), uow)
            .unwrap();
        (n, right, top)
    });
    assert_eq!(diagram.node(n).unwrap().anchors().len(), 5);

    UnitOfWork::execute(&mut diagram, "Round corners", |d, uow| {
        d.update_node_props(n, uow, |props, _| {
            props.custom.insert("radius".to_string(), serde_json::json!(10));
        })
    })
    .unwrap();

    assert_eq!(diagram.node(n).unwrap().anchors().len(), 9);
    assert_eq!(diagram.edge(right).unwrap().start(), Endpoint::connected(n, 3));
    assert_eq!(diagram.edge(top).unwrap().end(), Endpoint::connected(n, 1));
    assert!(approx(diagram.edge_start_position(right).unwrap(), Pos2::new(100.0, 25.0)));
    assert!(diagram.check_consistency().is_empty());

    assert!(diagram.undo());
    assert_eq!(diagram.node(n).unwrap().anchors().len(), 5);
    assert_eq!(diagram.edge(right).unwrap().start(), Endpoint::connected(n, 2));
    assert!(diagram.check_consistency().is_empty());
}

#[test]
fn test_invalid_properties_are_rejected() {
    init();
    let mut diagram = Diagram::new("props");
    let layer = diagram.layers().active().unwrap();

    let (rounded, plain) = UnitOfWork::immediate(&mut diagram, |d, uow| {
        let rounded = d
            .add_node(layer, node("rounded-rect", layer, 0.0, 0.0, 100.0, 50.0), uow)
            .unwrap();
        let plain = d.add_node(layer, node("rect", layer, 0.0, 0.0, 100.0, 50.0), uow).unwrap();
        (rounded, plain)
    });

    let result = UnitOfWork::execute(&mut diagram, "Radius", |d, uow| {
        d.update_node_props(rounded, uow, |props, _| {
            props.custom.insert("radius".to_string(), serde_json::json!("large"));
        })
    });
    assert!(matches!(result, Err(DiagramError::InvalidProperty { .. })));
    assert!(diagram.node(rounded).unwrap().props().custom.is_empty());

    let result = UnitOfWork::execute(&mut diagram, "Radius", |d, uow| {
        d.update_node_props(plain, uow, |props, _| {
            props.custom.insert("radius".to_string(), serde_json::json!(4));
        })
    });
    assert!(matches!(result, Err(DiagramError::InvalidProperty { .. })));
    assert!(!diagram.undo_manager().can_undo());
}

#[test]
fn test_unknown_node_type_is_rejected() {
    init();
    let mut diagram = Diagram::new("types");
    let layer = diagram.layers().active().unwrap();

    let result = UnitOfWork::immediate(&mut diagram, |d, uow| {
        d.add_node(layer, node("hexagon", layer, 0.0, 0.0, 10.0, 10.0), uow)
    });
    assert!(matches!(result, Err(DiagramError::UnknownNodeType(t)) if t == "hexagon"));
}

#[test]
fn test_group_refits_to_children() {
    init();
    let mut diagram = Diagram::new("group");
    let layer = diagram.layers().active().unwrap();

    let (group, second) = UnitOfWork::immediate(&mut diagram, |d, uow| {
        let group = d.add_node(layer, node("group", layer, 0.0, 0.0, 10.0, 10.0), uow).unwrap();
        d.add_child_node(group, node("rect", layer, 0.0, 0.0, 50.0, 50.0), uow).unwrap();
        let second = d
            .add_child_node(group, node("rect", layer, 100.0, 100.0, 50.0, 50.0), uow)
            .unwrap();
        (group, second)
    });
    assert_eq!(diagram.node(group).unwrap().bounds(), Bounds::new(0.0, 0.0, 150.0, 150.0));

    UnitOfWork::execute(&mut diagram, "Move", |d, uow| {
        d.transform_nodes(&[second], &[Transform::translate(50.0, 0.0)], uow)
    })
    .unwrap();
    assert_eq!(diagram.node(group).unwrap().bounds(), Bounds::new(0.0, 0.0, 200.0, 150.0));

    UnitOfWork::execute(&mut diagram, "Move group", |d, uow| {
        d.transform_nodes(&[group], &[Transform::translate(10.0, 10.0)], uow)
    })
    .unwrap();
    assert_eq!(diagram.node(second).unwrap().bounds().pos, Pos2::new(160.0, 110.0));
    assert_eq!(diagram.node(group).unwrap().bounds(), Bounds::new(10.0, 10.0, 200.0, 150.0));
}

#[test]
fn test_container_children_follow_uniform_transforms_only() {
    init();
    let mut diagram = Diagram::new("container");
    let layer = diagram.layers().active().unwrap();

    let (container, child) = UnitOfWork::immediate(&mut diagram, |d, uow| {
        let container = d
            .add_node(layer, node("container", layer, 0.0, 0.0, 200.0, 200.0), uow)
            .unwrap();
        let child = d
            .add_child_node(container, node("rect", layer, 10.0, 10.0, 20.0, 20.0), uow)
            .unwrap();
        (container, child)
    });

    UnitOfWork::immediate(&mut diagram, |d, uow| {
        d.transform_nodes(&[container], &[Transform::translate(5.0, 5.0)], uow)
    })
    .unwrap();
    assert_eq!(diagram.node(child).unwrap().bounds().pos, Pos2::new(15.0, 15.0));

    UnitOfWork::immediate(&mut diagram, |d, uow| {
        d.set_node_bounds(container, Bounds::new(5.0, 5.0, 400.0, 200.0), uow)
    })
    .unwrap();
    assert_eq!(diagram.node(child).unwrap().bounds(), Bounds::new(15.0, 15.0, 20.0, 20.0));

    // Containers grow to fit children moved past their edge
    UnitOfWork::immediate(&mut diagram, |d, uow| {
        d.transform_nodes(&[child], &[Transform::translate(485.0, 0.0)], uow)
    })
    .unwrap();
    assert_eq!(diagram.node(container).unwrap().bounds(), Bounds::new(5.0, 5.0, 515.0, 200.0));
}

#[test]
fn test_children_cannot_be_added_to_leaf_nodes() {
    init();
    let mut diagram = Diagram::new("leaf");
    let layer = diagram.layers().active().unwrap();

    let result = UnitOfWork::immediate(&mut diagram, |d, uow| {
        let leaf = d.add_node(layer, node("rect", layer, 0.0, 0.0, 10.0, 10.0), uow)?;
        d.add_child_node(leaf, node("rect", layer, 0.0, 0.0, 5.0, 5.0), uow)
    });
    assert!(matches!(result, Err(DiagramError::NotAContainer(_))));
}

#[test]
fn test_waypoints_are_inserted_along_the_path() {
    init();
    let mut diagram = Diagram::new("waypoints");
    let layer = diagram.layers().active().unwrap();

    let e = UnitOfWork::immediate(&mut diagram, |d, uow| {
        d.add_edge(layer, edge(layer, Endpoint::free(0.0, 0.0), Endpoint::free(100.0, 0.0)), uow)
    })
    .unwrap();

    let indices: Vec<usize> = [Pos2::new(50.0, 10.0), Pos2::new(20.0, 5.0), Pos2::new(80.0, 5.0)]
        .into_iter()
        .map(|p| UnitOfWork::immediate(&mut diagram, |d, uow| d.add_waypoint(e, p, uow)).unwrap())
        .collect();
    assert_eq!(indices, vec![0, 0, 2]);

    let points: Vec<Pos2> = diagram.edge(e).unwrap().waypoints().iter().map(|w| w.point).collect();
    assert_eq!(points, vec![Pos2::new(20.0, 5.0), Pos2::new(50.0, 10.0), Pos2::new(80.0, 5.0)]);

    let result = UnitOfWork::immediate(&mut diagram, |d, uow| d.move_waypoint(e, 9, Pos2::ZERO, uow));
    assert!(matches!(result, Err(DiagramError::InvalidWaypoint { index: 9, .. })));

    UnitOfWork::immediate(&mut diagram, |d, uow| d.remove_waypoint(e, 0, uow)).unwrap();
    assert_eq!(diagram.edge(e).unwrap().waypoints().len(), 2);
}

#[test]
fn test_transform_edges_moves_free_points_only() {
    init();
    let mut diagram = Diagram::new("edge transform");
    let layer = diagram.layers().active().unwrap();

    let (a, e) = UnitOfWork::immediate(&mut diagram, |d, uow| {
        let a = d.add_node(layer, node("rect", layer, 0.0, 0.0, 100.0, 100.0), uow).unwrap();
        let e = d
            .add_edge(layer, edge(layer, Endpoint::connected(a, 2), Endpoint::free(200.0, 50.0)), uow)
            .unwrap();
        (a, e)
    });

    UnitOfWork::immediate(&mut diagram, |d, uow| {
        d.transform_edges(&[e], &[Transform::translate(0.0, 20.0)], uow)
    })
    .unwrap();

    let moved = diagram.edge(e).unwrap();
    assert_eq!(moved.start(), Endpoint::connected(a, 2));
    assert_eq!(moved.end(), Endpoint::free(200.0, 70.0));
}

#[test]
fn test_line_hops_track_crossings() {
    init();
    let mut diagram = Diagram::new("hops");
    let layer = diagram.layers().active().unwrap();

    let (horizontal, vertical) = UnitOfWork::immediate(&mut diagram, |d, uow| {
        let props = EdgeProps {
            line_hops: LineHops::Arc,
            ..Default::default()
        };
        let hops = Edge::new(Endpoint::free(0.0, 50.0), Endpoint::free(100.0, 50.0), props, layer);
        let horizontal = d.add_edge(layer, hops, uow).unwrap();
        let vertical = d
            .add_edge(layer, edge(layer, Endpoint::free(50.0, 0.0), Endpoint::free(50.0, 100.0)), uow)
            .unwrap();
        (horizontal, vertical)
    });
    assert!(diagram.must_calculate_intersections());

    let below = diagram.edge(horizontal).unwrap().intersections();
    assert_eq!(below.len(), 1);
    assert!(approx(below[0].point, Pos2::new(50.0, 50.0)));
    assert_eq!(below[0].kind, IntersectionKind::Below);
    assert_eq!(diagram.edge(vertical).unwrap().intersections()[0].kind, IntersectionKind::Above);

    UnitOfWork::immediate(&mut diagram, |d, uow| {
        d.update_edge_props(horizontal, uow, |props, _| props.line_hops = LineHops::None)
    })
    .unwrap();
    assert!(!diagram.must_calculate_intersections());
    assert!(diagram.edge(horizontal).unwrap().intersections().is_empty());
    assert!(diagram.edge(vertical).unwrap().intersections().is_empty());
}

#[test]
fn test_selection_moves_active_layer() {
    init();
    let mut diagram = Diagram::new("selection");
    let first = diagram.layers().active().unwrap();
    let second = UnitOfWork::immediate(&mut diagram, |d, uow| d.add_layer("Second", uow));
    let id = UnitOfWork::immediate(&mut diagram, |d, uow| {
        d.add_node(first, node("rect", first, 0.0, 0.0, 10.0, 10.0), uow)
    })
    .unwrap();
    assert_eq!(diagram.layers().active(), Some(second));

    diagram.select(&[ElementRef::Node(id)]).unwrap();
    assert_eq!(diagram.layers().active(), Some(first));
    assert!(diagram.selection().contains(ElementRef::Node(id)));

    UnitOfWork::immediate(&mut diagram, |d, uow| d.remove_element(ElementRef::Node(id), uow)).unwrap();
    assert!(diagram.selection().is_empty());

    assert!(diagram.select(&[ElementRef::Node(ElementId(usize::MAX))]).is_err());
}
