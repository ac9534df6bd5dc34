use log::debug;

use super::Diagram;
use crate::element::{ChildPolicy, Edge, EdgeEnd, ElementRef, Endpoint, Node};
use crate::error::{DiagramError, DiagramResult};
use crate::id_generator::ElementId;
use crate::layer::LayerId;
use crate::uow::{Entity, UnitOfWork};

impl Diagram {
    /// Adds `node` on top of `layer`
    pub fn add_node(&mut self, layer: LayerId, node: Node, uow: &mut UnitOfWork) -> DiagramResult<ElementId> {
        self.element_layer(layer)?;
        let id = self.register_node(node, layer, None, uow)?;
        uow.snapshot(self, Entity::Layer(layer));
        if let Some(l) = self.layers.get_mut(layer) {
            l.elements.push(ElementRef::Node(id));
        }
        Ok(id)
    }

    /// Adds `node` as the last child of `parent`
    pub fn add_child_node(&mut self, parent: ElementId, node: Node, uow: &mut UnitOfWork) -> DiagramResult<ElementId> {
        let parent_node = self.node(parent)?;
        let layer = parent_node.layer;
        if self.registry().get(&parent_node.node_type)?.child_policy() == ChildPolicy::Leaf {
            return Err(DiagramError::NotAContainer(parent));
        }
        uow.snapshot(self, Entity::Node(parent));
        let id = self.register_node(node, layer, Some(parent), uow)?;
        self.node_mut(parent)?.children.push(ElementRef::Node(id));
        uow.update_element(ElementRef::Node(parent));
        self.queue_notify_parent(parent, uow);
        Ok(id)
    }

    /// Puts a node into the lookup; the caller places it in a layer, parent or edge
    pub(crate) fn register_node(
        &mut self,
        mut node: Node,
        layer: LayerId,
        parent: Option<ElementId>,
        uow: &mut UnitOfWork,
    ) -> DiagramResult<ElementId> {
        let definition = self.registry().get(&node.node_type)?;
        node.props.validate(definition.schema())?;
        assert!(
            !self.nodes.contains_key(&node.id) && !self.edges.contains_key(&node.id),
            "element {} registered twice",
            node.id
        );

        let id = node.id;
        uow.snapshot(self, Entity::Node(id));
        node.layer = layer;
        node.parent = parent;
        node.children.clear();
        node.edges.clear();
        node.anchors = definition.anchors(&node.bounds, &node.props, self.config().anchor_precision);
        self.nodes.insert(id, node);
        uow.add_element(ElementRef::Node(id));
        debug!("Added node {id} to layer {layer}");
        Ok(id)
    }

    /// Adds `edge` on top of `layer` and attaches its connected endpoints
    pub fn add_edge(&mut self, layer: LayerId, mut edge: Edge, uow: &mut UnitOfWork) -> DiagramResult<ElementId> {
        self.element_layer(layer)?;
        edge.props.validate(self.registry().edge_schema())?;
        self.validate_endpoint(&edge.start)?;
        self.validate_endpoint(&edge.end)?;
        assert!(
            !self.nodes.contains_key(&edge.id) && !self.edges.contains_key(&edge.id),
            "element {} registered twice",
            edge.id
        );

        let id = edge.id;
        uow.snapshot(self, Entity::Edge(id));
        uow.snapshot(self, Entity::Layer(layer));
        edge.layer = layer;
        edge.parent = None;
        edge.label_nodes.clear();
        edge.intersections.clear();
        let (start, end) = (edge.start, edge.end);
        self.edges.insert(id, edge);
        self.link_endpoint(id, start, uow);
        self.link_endpoint(id, end, uow);
        if let Some(l) = self.layers.get_mut(layer) {
            l.elements.push(ElementRef::Edge(id));
        }
        uow.add_element(ElementRef::Edge(id));
        self.queue_edge_invalidation(id, uow);
        debug!("Added edge {id} to layer {layer}");
        Ok(id)
    }

    /// Removes an element and everything that only exists through it: the
    /// children of a node, the label nodes of an edge. Edges attached to a
    /// removed node keep their current position as a free endpoint.
    pub fn remove_element(&mut self, element: ElementRef, uow: &mut UnitOfWork) -> DiagramResult<()> {
        self.ensure_exists(element)?;
        match element {
            ElementRef::Node(id) => self.remove_node(id, uow),
            ElementRef::Edge(id) => self.remove_edge(id, uow),
        }
    }

    fn remove_node(&mut self, id: ElementId, uow: &mut UnitOfWork) -> DiagramResult<()> {
        uow.snapshot(self, Entity::Node(id));
        let node = self.node(id)?;
        let children = node.children.clone();
        let label_for = node.props.label_for_edge_id;

        for child in children {
            self.remove_element(child, uow)?;
        }

        // Read after the children are gone: edges among them may have been attached here
        let attached: Vec<(usize, ElementId)> = self
            .node(id)?
            .edges
            .iter()
            .flat_map(|(anchor, edges)| edges.iter().map(move |e| (*anchor, *e)))
            .collect();
        for (anchor, edge) in attached {
            let position = self.node(id)?.anchor_position(anchor).unwrap_or_default();
            for end in [EdgeEnd::Start, EdgeEnd::End] {
                if self.endpoint_of(edge, end)?.references(id, anchor) {
                    self.set_endpoint(edge, end, Endpoint::Free { position }, uow)?;
                }
            }
        }

        if let Some(edge) = label_for {
            if self.edges.contains_key(&edge) {
                uow.snapshot(self, Entity::Edge(edge));
                self.edge_mut(edge)?.label_nodes.retain(|l| l.node != id);
                uow.update_element(ElementRef::Edge(edge));
            }
        } else {
            self.detach_from_container(ElementRef::Node(id), uow);
        }

        self.nodes.shift_remove(&id);
        self.selection.remove(ElementRef::Node(id));
        uow.remove_element(ElementRef::Node(id));
        debug!("Removed node {id}");
        Ok(())
    }

    fn remove_edge(&mut self, id: ElementId, uow: &mut UnitOfWork) -> DiagramResult<()> {
        uow.snapshot(self, Entity::Edge(id));
        for label in self.label_nodes_of(id) {
            self.remove_node(label, uow)?;
        }

        let edge = self.edge(id)?;
        for endpoint in [edge.start, edge.end] {
            self.force_unlink_endpoint(id, endpoint, uow);
        }

        self.detach_from_container(ElementRef::Edge(id), uow);
        self.edges.shift_remove(&id);
        self.selection.remove(ElementRef::Edge(id));
        uow.remove_element(ElementRef::Edge(id));
        if self.must_calculate_intersections() {
            self.queue_intersection_refresh(uow);
        }
        debug!("Removed edge {id}");
        Ok(())
    }

    /// Takes an element out of its parent's children or its layer
    pub(crate) fn detach_from_container(&mut self, element: ElementRef, uow: &mut UnitOfWork) {
        if let Some(parent) = self.parent_of(element) {
            uow.snapshot(self, Entity::Node(parent));
            if let Some(p) = self.nodes.get_mut(&parent) {
                p.children.retain(|c| *c != element);
            }
            uow.update_element(ElementRef::Node(parent));
            self.queue_notify_parent(parent, uow);
        } else if let Some(layer) = self.layer_of(element) {
            uow.snapshot(self, Entity::Layer(layer));
            if let Some(l) = self.layers.get_mut(layer) {
                l.elements.retain(|e| *e != element);
            }
            uow.structure_changed();
        }
    }

    pub(crate) fn validate_endpoint(&self, endpoint: &Endpoint) -> DiagramResult<()> {
        if let Endpoint::Connected { node, anchor } = *endpoint {
            if self.node(node)?.anchor(anchor).is_none() {
                return Err(DiagramError::InvalidAnchor { node, anchor });
            }
        }
        Ok(())
    }

    /// Lists `edge` in the edge index of the endpoint's node
    pub(crate) fn link_endpoint(&mut self, edge: ElementId, endpoint: Endpoint, uow: &mut UnitOfWork) {
        let Endpoint::Connected { node, anchor } = endpoint else {
            return;
        };
        uow.snapshot(self, Entity::Node(node));
        let n = self
            .nodes
            .get_mut(&node)
            .unwrap_or_else(|| panic!("edge {edge} attached to missing node {node}"));
        n.link_edge(anchor, edge);
        uow.update_element(ElementRef::Node(node));
    }

    /// Removes `edge` from the edge index of the endpoint's node, unless the
    /// edge's other end still uses the same anchor
    pub(crate) fn unlink_endpoint(
        &mut self,
        edge: ElementId,
        endpoint: Endpoint,
        other: Endpoint,
        uow: &mut UnitOfWork,
    ) {
        if let Endpoint::Connected { node, anchor } = endpoint {
            if !other.references(node, anchor) {
                self.force_unlink_endpoint(edge, endpoint, uow);
            }
        }
    }

    pub(crate) fn force_unlink_endpoint(&mut self, edge: ElementId, endpoint: Endpoint, uow: &mut UnitOfWork) {
        let Endpoint::Connected { node, anchor } = endpoint else {
            return;
        };
        if !self.nodes.contains_key(&node) {
            return;
        }
        uow.snapshot(self, Entity::Node(node));
        if let Some(n) = self.nodes.get_mut(&node) {
            n.unlink_edge(anchor, edge);
        }
        uow.update_element(ElementRef::Node(node));
    }
}
