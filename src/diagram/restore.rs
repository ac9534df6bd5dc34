use log::trace;

use super::Diagram;
use crate::element::{Edge, ElementRef, Endpoint, Node};
use crate::id_generator::ElementId;
use crate::layer::{Layer, LayerId};
use crate::uow::{
    DiagramSnapshot, EdgeSnapshot, Entity, LayerSnapshot, NodeSnapshot, Snapshot, SnapshotMap, UnitOfWork,
};

impl Diagram {
    /// Copies the persisted state of `entity`; `None` when it does not exist
    pub fn capture(&self, entity: Entity) -> Option<Snapshot> {
        match entity {
            Entity::Diagram => Some(Snapshot::Diagram(DiagramSnapshot {
                canvas: self.canvas,
                layer_order: self.layers.layers.iter().map(|l| l.id).collect(),
                visible: self.layers.visible.iter().copied().collect(),
                active: self.layers.active,
            })),
            Entity::Layer(id) => self.layers.get(id).map(|l| {
                Snapshot::Layer(LayerSnapshot {
                    id: l.id,
                    name: l.name.clone(),
                    locked: l.locked,
                    layer_type: l.layer_type,
                    elements: l.elements.clone(),
                })
            }),
            Entity::Node(id) => self.nodes.get(&id).map(|n| {
                Snapshot::Node(NodeSnapshot {
                    id: n.id,
                    node_type: n.node_type.clone(),
                    bounds: n.bounds,
                    props: n.props.clone(),
                    parent: n.parent,
                    children: n.children.clone(),
                    layer: n.layer,
                    anchors: n.anchors.clone(),
                })
            }),
            Entity::Edge(id) => self.edges.get(&id).map(|e| {
                Snapshot::Edge(EdgeSnapshot {
                    id: e.id,
                    start: e.start,
                    end: e.end,
                    waypoints: e.waypoints.clone(),
                    label_nodes: e.label_nodes.clone(),
                    props: e.props.clone(),
                    parent: e.parent,
                    layer: e.layer,
                })
            }),
        }
    }

    /// Brings every entity in `snapshots` to the recorded state. Entities
    /// recorded as absent are removed, missing ones are recreated.
    ///
    /// Removals run first (edges, nodes, layers), then restores (nodes,
    /// edges, layers, diagram), so edges always find their nodes.
    pub fn apply_snapshots(&mut self, snapshots: &SnapshotMap, uow: &mut UnitOfWork) {
        for (entity, snapshot) in snapshots {
            if let (Entity::Edge(id), None) = (entity, snapshot) {
                self.purge_edge(*id, uow);
            }
        }
        for (entity, snapshot) in snapshots {
            if let (Entity::Node(id), None) = (entity, snapshot) {
                self.purge_node(*id, uow);
            }
        }
        for (entity, snapshot) in snapshots {
            if let (Entity::Layer(id), None) = (entity, snapshot) {
                self.purge_layer(*id, uow);
            }
        }

        for snapshot in snapshots.values() {
            if let Some(Snapshot::Node(s)) = snapshot {
                self.restore_node(s, uow);
            }
        }
        for snapshot in snapshots.values() {
            if let Some(Snapshot::Edge(s)) = snapshot {
                self.restore_edge(s, uow);
            }
        }
        for snapshot in snapshots.values() {
            if let Some(Snapshot::Layer(s)) = snapshot {
                self.restore_layer(s, uow);
            }
        }
        for snapshot in snapshots.values() {
            if let Some(Snapshot::Diagram(s)) = snapshot {
                self.restore_diagram(s, uow);
            }
        }
    }

    fn purge_edge(&mut self, id: ElementId, uow: &mut UnitOfWork) {
        let Some(edge) = self.edges.get(&id) else {
            return;
        };
        trace!("Restore: removing edge {id}");
        uow.snapshot(self, Entity::Edge(id));
        for endpoint in [edge.start, edge.end] {
            self.force_unlink_endpoint(id, endpoint, uow);
        }
        self.detach_from_container(ElementRef::Edge(id), uow);
        self.edges.shift_remove(&id);
        self.selection.remove(ElementRef::Edge(id));
        uow.remove_element(ElementRef::Edge(id));
    }

    fn purge_node(&mut self, id: ElementId, uow: &mut UnitOfWork) {
        let Some(node) = self.nodes.get(&id) else {
            return;
        };
        trace!("Restore: removing node {id}");
        uow.snapshot(self, Entity::Node(id));
        let attached: Vec<(usize, ElementId)> = node
            .edges
            .iter()
            .flat_map(|(anchor, edges)| edges.iter().map(move |e| (*anchor, *e)))
            .collect();
        let label_for = node.props.label_for_edge_id;

        // Edges that survive must not point at the removed node
        for (anchor, edge) in attached {
            let position = self.endpoint_position(&Endpoint::connected(id, anchor)).unwrap_or_default();
            uow.snapshot(self, Entity::Edge(edge));
            if let Some(e) = self.edges.get_mut(&edge) {
                for endpoint in [&mut e.start, &mut e.end] {
                    if endpoint.references(id, anchor) {
                        *endpoint = Endpoint::Free { position };
                    }
                }
                uow.update_element(ElementRef::Edge(edge));
            }
        }
        match label_for {
            Some(edge) => {
                if let Some(e) = self.edges.get_mut(&edge) {
                    e.label_nodes.retain(|l| l.node != id);
                }
            }
            None => self.detach_from_container(ElementRef::Node(id), uow),
        }
        self.nodes.shift_remove(&id);
        self.selection.remove(ElementRef::Node(id));
        uow.remove_element(ElementRef::Node(id));
    }

    fn purge_layer(&mut self, id: LayerId, uow: &mut UnitOfWork) {
        if !self.layers.contains(id) {
            return;
        }
        trace!("Restore: removing layer {id}");
        uow.snapshot(self, Entity::Layer(id));
        self.layers.layers.retain(|l| l.id != id);
        self.layers.visible.shift_remove(&id);
        if self.layers.active == Some(id) {
            self.layers.active = None;
        }
        uow.structure_changed();
    }

    fn restore_node(&mut self, s: &NodeSnapshot, uow: &mut UnitOfWork) {
        uow.snapshot(self, Entity::Node(s.id));
        let element = ElementRef::Node(s.id);
        match self.nodes.get_mut(&s.id) {
            Some(node) => {
                node.node_type = s.node_type.clone();
                node.bounds = s.bounds;
                node.props = s.props.clone();
                node.parent = s.parent;
                node.children = s.children.clone();
                node.layer = s.layer;
                node.anchors = s.anchors.clone();
                uow.update_element(element);
            }
            None => {
                let mut node = Node::with_id(s.id, s.node_type.clone(), s.bounds, s.props.clone(), s.layer);
                node.parent = s.parent;
                node.children = s.children.clone();
                node.anchors = s.anchors.clone();
                self.nodes.insert(s.id, node);
                uow.add_element(element);
            }
        }

        self.queue_anchor_recompute(s.id, uow);
        let connected = self.nodes.get(&s.id).map(|n| n.connected_edges()).unwrap_or_default();
        for edge in connected {
            self.queue_edge_invalidation(edge, uow);
        }
    }

    fn restore_edge(&mut self, s: &EdgeSnapshot, uow: &mut UnitOfWork) {
        uow.snapshot(self, Entity::Edge(s.id));
        let element = ElementRef::Edge(s.id);
        match self.edges.get(&s.id).map(|e| [e.start, e.end]) {
            Some(endpoints) => {
                for endpoint in endpoints {
                    self.force_unlink_endpoint(s.id, endpoint, uow);
                }
                if let Some(edge) = self.edges.get_mut(&s.id) {
                    edge.start = s.start;
                    edge.end = s.end;
                    edge.waypoints = s.waypoints.clone();
                    edge.label_nodes = s.label_nodes.clone();
                    edge.props = s.props.clone();
                    edge.parent = s.parent;
                    edge.layer = s.layer;
                }
                uow.update_element(element);
            }
            None => {
                let mut edge = Edge::with_id(s.id, s.start, s.end, s.props.clone(), s.layer)
                    .with_waypoints(s.waypoints.clone());
                edge.label_nodes = s.label_nodes.clone();
                edge.parent = s.parent;
                self.edges.insert(s.id, edge);
                uow.add_element(element);
            }
        }

        self.link_endpoint(s.id, s.start, uow);
        self.link_endpoint(s.id, s.end, uow);
        self.queue_edge_invalidation(s.id, uow);
    }

    fn restore_layer(&mut self, s: &LayerSnapshot, uow: &mut UnitOfWork) {
        uow.snapshot(self, Entity::Layer(s.id));
        if !self.layers.contains(s.id) {
            self.layers.push(Layer::with_id(s.id, &s.name));
        }
        if let Some(layer) = self.layers.get_mut(s.id) {
            layer.name = s.name.clone();
            layer.locked = s.locked;
            layer.layer_type = s.layer_type;
            layer.elements = s.elements.clone();
        }
        uow.structure_changed();
    }

    fn restore_diagram(&mut self, s: &DiagramSnapshot, uow: &mut UnitOfWork) {
        uow.snapshot(self, Entity::Diagram);
        self.canvas = s.canvas;

        let mut layers = std::mem::take(&mut self.layers.layers);
        let mut ordered: Vec<Layer> = Vec::with_capacity(layers.len());
        for id in &s.layer_order {
            if let Some(index) = layers.iter().position(|l| l.id == *id) {
                ordered.push(layers.remove(index));
            }
        }
        ordered.extend(layers);
        self.layers.layers = ordered;
        self.layers.visible = s.visible.iter().copied().collect();
        self.layers.active = s.active;

        uow.structure_changed();
        if self.must_calculate_intersections() {
            self.queue_intersection_refresh(uow);
        }
    }
}
