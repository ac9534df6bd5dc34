//! The diagram aggregate.
//!
//! A [`Diagram`] owns every node, edge and layer in flat id-keyed tables.
//! Relationships (parent, children, layer, edge endpoints, label nodes)
//! are ids into these tables, so entities never own each other.
//!
//! Mutating operations live next to the data they touch:
//! - `structure`: adding and removing elements
//! - `node_ops`: bounds, properties and anchors of nodes
//! - `edge_ops`: endpoints, waypoints, labels and intersections of edges
//! - `layer_ops`: moving elements between layers, stacking order, layer stack
//! - `restore`: capturing and re-applying snapshots

mod edge_ops;
mod layer_ops;
mod node_ops;
mod restore;
mod structure;

use egui::Pos2;
use indexmap::IndexMap;
use log::info;
use uuid::Uuid;

use crate::command::UndoManager;
use crate::config::DiagramConfig;
use crate::element::{Edge, EdgeEnd, ElementRef, Endpoint, Node, NodeDefinitionRegistry};
use crate::error::{DiagramError, DiagramResult};
use crate::event::{DiagramEvent, EventBus, UndoDirection, UndoEvent};
use crate::geometry::{Bounds, Path};
use crate::id_generator::ElementId;
use crate::layer::{Layer, LayerId, LayerManager, LayerType};
use crate::selection::Selection;

pub use layer_ops::{ElementReference, Relation};

pub struct Diagram {
    id: Uuid,
    name: String,
    pub(crate) canvas: Bounds,
    pub(crate) nodes: IndexMap<ElementId, Node>,
    pub(crate) edges: IndexMap<ElementId, Edge>,
    pub(crate) layers: LayerManager,
    pub(crate) selection: Selection,
    undo_manager: UndoManager,
    registry: NodeDefinitionRegistry,
    events: EventBus<DiagramEvent>,
    config: DiagramConfig,
}

impl std::fmt::Debug for Diagram {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Diagram")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("nodes", &self.nodes.len())
            .field("edges", &self.edges.len())
            .field("layers", &self.layers.len())
            .finish()
    }
}

impl Diagram {
    /// Creates a diagram with the built-in node types and one empty layer
    pub fn new(name: &str) -> Self {
        Self::with_config(name, DiagramConfig::default(), NodeDefinitionRegistry::default())
    }

    pub fn with_config(name: &str, config: DiagramConfig, registry: NodeDefinitionRegistry) -> Self {
        let mut diagram = Self::empty(name, config, registry);
        diagram.layers.push(Layer::new("Default"));
        diagram
    }

    /// Diagram without any layer
    pub(crate) fn empty(name: &str, config: DiagramConfig, registry: NodeDefinitionRegistry) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.to_string(),
            canvas: Bounds::new(0.0, 0.0, 640.0, 640.0),
            nodes: IndexMap::new(),
            edges: IndexMap::new(),
            layers: LayerManager::default(),
            selection: Selection::default(),
            undo_manager: UndoManager::new(config.max_history, config.merge_window_ms),
            registry,
            events: EventBus::new(),
            config,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn canvas(&self) -> Bounds {
        self.canvas
    }

    pub fn config(&self) -> &DiagramConfig {
        &self.config
    }

    pub fn registry(&self) -> &NodeDefinitionRegistry {
        &self.registry
    }

    pub fn events(&self) -> &EventBus<DiagramEvent> {
        &self.events
    }

    pub fn layers(&self) -> &LayerManager {
        &self.layers
    }

    pub fn layer(&self, id: LayerId) -> DiagramResult<&Layer> {
        self.layers.get(id).ok_or(DiagramError::UnknownLayer(id))
    }

    /// A layer elements can be placed in
    pub(crate) fn element_layer(&self, id: LayerId) -> DiagramResult<&Layer> {
        let layer = self.layer(id)?;
        match layer.layer_type {
            LayerType::Regular => Ok(layer),
            LayerType::Reference => Err(DiagramError::ReferenceLayer(id)),
        }
    }

    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    pub fn undo_manager(&self) -> &UndoManager {
        &self.undo_manager
    }

    pub fn undo_manager_mut(&mut self) -> &mut UndoManager {
        &mut self.undo_manager
    }

    // ------------------------------------------------------------------------
    // Lookups
    // ------------------------------------------------------------------------

    pub fn node(&self, id: ElementId) -> DiagramResult<&Node> {
        self.nodes.get(&id).ok_or(DiagramError::UnknownNode(id))
    }

    pub fn edge(&self, id: ElementId) -> DiagramResult<&Edge> {
        self.edges.get(&id).ok_or(DiagramError::UnknownEdge(id))
    }

    pub(crate) fn node_mut(&mut self, id: ElementId) -> DiagramResult<&mut Node> {
        self.nodes.get_mut(&id).ok_or(DiagramError::UnknownNode(id))
    }

    pub(crate) fn edge_mut(&mut self, id: ElementId) -> DiagramResult<&mut Edge> {
        self.edges.get_mut(&id).ok_or(DiagramError::UnknownEdge(id))
    }

    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values()
    }

    pub fn edges(&self) -> impl Iterator<Item = &Edge> {
        self.edges.values()
    }

    pub fn contains(&self, element: ElementRef) -> bool {
        match element {
            ElementRef::Node(id) => self.nodes.contains_key(&id),
            ElementRef::Edge(id) => self.edges.contains_key(&id),
        }
    }

    pub(crate) fn ensure_exists(&self, element: ElementRef) -> DiagramResult<()> {
        match element {
            ElementRef::Node(id) => self.node(id).map(|_| ()),
            ElementRef::Edge(id) => self.edge(id).map(|_| ()),
        }
    }

    pub fn parent_of(&self, element: ElementRef) -> Option<ElementId> {
        match element {
            ElementRef::Node(id) => self.nodes.get(&id).and_then(|n| n.parent),
            ElementRef::Edge(id) => self.edges.get(&id).and_then(|e| e.parent),
        }
    }

    pub fn layer_of(&self, element: ElementRef) -> Option<LayerId> {
        match element {
            ElementRef::Node(id) => self.nodes.get(&id).map(|n| n.layer),
            ElementRef::Edge(id) => self.edges.get(&id).map(|e| e.layer),
        }
    }

    /// True if `ancestor` is a (transitive) parent of `element`
    pub fn is_ancestor(&self, ancestor: ElementRef, element: ElementRef) -> bool {
        let ElementRef::Node(ancestor_id) = ancestor else {
            return false;
        };
        let mut current = self.parent_of(element);
        let mut depth = 0;
        while let Some(parent) = current {
            if parent == ancestor_id {
                return true;
            }
            depth += 1;
            assert!(depth <= self.nodes.len(), "parent cycle through node {parent}");
            current = self.nodes.get(&parent).and_then(|n| n.parent);
        }
        false
    }

    /// Bounds of any element; for edges derived from the endpoints and waypoints
    pub fn element_bounds(&self, element: ElementRef) -> DiagramResult<Bounds> {
        match element {
            ElementRef::Node(id) => Ok(self.node(id)?.bounds),
            ElementRef::Edge(id) => self.edge_bounds(id),
        }
    }

    pub(crate) fn label_nodes_of(&self, edge: ElementId) -> Vec<ElementId> {
        self.edges
            .get(&edge)
            .map(|e| e.label_nodes.iter().map(|l| l.node).collect())
            .unwrap_or_default()
    }

    // ------------------------------------------------------------------------
    // Edge geometry
    // ------------------------------------------------------------------------

    /// Position of an endpoint: the anchor position for connected endpoints
    pub fn endpoint_position(&self, endpoint: &Endpoint) -> DiagramResult<Pos2> {
        match *endpoint {
            Endpoint::Free { position } => Ok(position),
            Endpoint::Connected { node, anchor } => self
                .node(node)?
                .anchor_position(anchor)
                .ok_or(DiagramError::InvalidAnchor { node, anchor }),
        }
    }

    pub fn edge_start_position(&self, id: ElementId) -> DiagramResult<Pos2> {
        self.endpoint_position(&self.edge(id)?.start)
    }

    pub fn edge_end_position(&self, id: ElementId) -> DiagramResult<Pos2> {
        self.endpoint_position(&self.edge(id)?.end)
    }

    /// Rendered path of an edge. Endpoints attached to clipping anchors end
    /// on the node outline rather than at the anchor.
    pub fn edge_path(&self, id: ElementId) -> DiagramResult<Path> {
        let edge = self.edge(id)?;
        let start = self.endpoint_position(&edge.start)?;
        let end = self.endpoint_position(&edge.end)?;

        let next_after_start = edge.waypoints.first().map(|w| w.point).unwrap_or(end);
        let prev_before_end = edge.waypoints.last().map(|w| w.point).unwrap_or(start);
        let start = self.clip_endpoint(&edge.start, start, next_after_start);
        let end = self.clip_endpoint(&edge.end, end, prev_before_end);

        let mut path = Path::new(vec![start]);
        let mut prev_cp: Option<Pos2> = None;
        for w in &edge.waypoints {
            match (prev_cp, w.control_points) {
                (None, None) => path.line_to(w.point),
                (cp_out, cps) => {
                    let last = path.points().last().copied().unwrap_or(start);
                    let cp1 = cp_out.unwrap_or(last);
                    let cp2 = cps.map(|c| w.point + c.cp1).unwrap_or(w.point);
                    path.cubic_to(cp1, cp2, w.point);
                }
            }
            prev_cp = w.control_points.map(|c| w.point + c.cp2);
        }
        match prev_cp {
            Some(cp1) => path.cubic_to(cp1, end, end),
            None => path.line_to(end),
        }
        Ok(path)
    }

    fn clip_endpoint(&self, endpoint: &Endpoint, position: Pos2, towards: Pos2) -> Pos2 {
        let Endpoint::Connected { node, anchor } = *endpoint else {
            return position;
        };
        let Some(node) = self.nodes.get(&node) else {
            return position;
        };
        if !node.anchor(anchor).is_some_and(|a| a.clip) {
            return position;
        }
        let Ok(definition) = self.registry.get(&node.node_type) else {
            return position;
        };
        let outline = definition.world_outline(&node.bounds, &node.props);
        Path::clip_to_outline(position, towards, &outline).unwrap_or(position)
    }

    pub fn edge_bounds(&self, id: ElementId) -> DiagramResult<Bounds> {
        let edge = self.edge(id)?;
        let mut points = vec![
            self.endpoint_position(&edge.start)?,
            self.endpoint_position(&edge.end)?,
        ];
        points.extend(edge.waypoints.iter().map(|w| w.point));
        Ok(Bounds::from_points(&points))
    }

    pub(crate) fn endpoint_of(&self, edge: ElementId, end: EdgeEnd) -> DiagramResult<Endpoint> {
        Ok(self.edge(edge)?.endpoint(end))
    }

    // ------------------------------------------------------------------------
    // Ordering
    // ------------------------------------------------------------------------

    /// Visible elements from bottom to top: layer by layer, each element
    /// followed by its children
    pub fn z_order(&self) -> Vec<ElementRef> {
        let mut order = Vec::new();
        for layer in self.layers.visible_layers() {
            for element in &layer.elements {
                self.push_with_children(*element, &mut order);
            }
        }
        order
    }

    fn push_with_children(&self, element: ElementRef, order: &mut Vec<ElementRef>) {
        order.push(element);
        if let ElementRef::Node(id) = element {
            if let Some(node) = self.nodes.get(&id) {
                for child in &node.children {
                    self.push_with_children(*child, order);
                }
            }
        }
    }

    /// Index of `element` within its parent or layer
    pub fn position_of(&self, element: ElementRef) -> Option<usize> {
        match self.parent_of(element) {
            Some(parent) => self.nodes.get(&parent)?.children.iter().position(|c| *c == element),
            None => self.layers.get(self.layer_of(element)?)?.position_of(element),
        }
    }

    // ------------------------------------------------------------------------
    // Selection
    // ------------------------------------------------------------------------

    /// Replaces the selection; the active layer follows the first selected element
    pub fn select(&mut self, elements: &[ElementRef]) -> DiagramResult<()> {
        for element in elements {
            self.ensure_exists(*element)?;
        }
        self.selection.elements = elements.to_vec();
        if let Some(layer) = elements.first().and_then(|e| self.layer_of(*e)) {
            self.layers.active = Some(layer);
        }
        Ok(())
    }

    pub fn clear_selection(&mut self) {
        self.selection.elements.clear();
    }

    // ------------------------------------------------------------------------
    // Undo / redo
    // ------------------------------------------------------------------------

    /// Undoes the most recent undoable action. Returns false if there was none.
    pub fn undo(&mut self) -> bool {
        let Some(mut action) = self.undo_manager.take_undoable() else {
            return false;
        };
        let description = action.description().to_string();
        info!("Undo: {description}");
        action.undo(self);
        self.undo_manager.push_redoable(action);
        self.undo_manager.notify(UndoEvent::Execute {
            direction: UndoDirection::Undo,
            description,
        });
        self.undo_manager.notify(UndoEvent::Change);
        true
    }

    /// Redoes the most recently undone action. Returns false if there was none.
    pub fn redo(&mut self) -> bool {
        let Some(mut action) = self.undo_manager.take_redoable() else {
            return false;
        };
        let description = action.description().to_string();
        info!("Redo: {description}");
        action.redo(self);
        self.undo_manager.push_undoable(action);
        self.undo_manager.notify(UndoEvent::Execute {
            direction: UndoDirection::Redo,
            description,
        });
        self.undo_manager.notify(UndoEvent::Change);
        true
    }

    // ------------------------------------------------------------------------
    // Consistency
    // ------------------------------------------------------------------------

    /// Checks the cross-entity invariants and describes every violation found
    pub fn check_consistency(&self) -> Vec<String> {
        let mut problems = Vec::new();

        for edge in self.edges.values() {
            for endpoint in [edge.start, edge.end] {
                if let Endpoint::Connected { node, anchor } = endpoint {
                    match self.nodes.get(&node) {
                        None => problems.push(format!("edge {} is attached to missing node {node}", edge.id)),
                        Some(n) => {
                            if !n.edges_at(anchor).any(|e| e == edge.id) {
                                problems.push(format!(
                                    "node {node} does not list edge {} at anchor {anchor}",
                                    edge.id
                                ));
                            }
                            if anchor >= n.anchors.len() {
                                problems.push(format!("edge {} uses missing anchor {anchor} of {node}", edge.id));
                            }
                        }
                    }
                }
            }
            for label in &edge.label_nodes {
                match self.nodes.get(&label.node) {
                    Some(n) if n.props.label_for_edge_id == Some(edge.id) => {}
                    _ => problems.push(format!("label {} of edge {} is not linked back", label.node, edge.id)),
                }
            }
        }

        for node in self.nodes.values() {
            for (anchor, edges) in &node.edges {
                for edge in edges {
                    let linked = self.edges.get(edge).is_some_and(|e| {
                        e.start.references(node.id, *anchor) || e.end.references(node.id, *anchor)
                    });
                    if !linked {
                        problems.push(format!(
                            "node {} lists edge {edge} at anchor {anchor} but the edge is not attached there",
                            node.id
                        ));
                    }
                }
            }
            for child in &node.children {
                if self.parent_of(*child) != Some(node.id) {
                    problems.push(format!("child {child:?} of {} has a different parent", node.id));
                }
            }
            if let Some(edge) = node.props.label_for_edge_id {
                if self.edges.get(&edge).and_then(|e| e.label_node(node.id)).is_none() {
                    problems.push(format!("label node {} is not listed by edge {edge}", node.id));
                }
            }
        }

        let mut placed: Vec<ElementRef> = Vec::new();
        for layer in self.layers.all() {
            for element in &layer.elements {
                if !self.contains(*element) {
                    problems.push(format!("layer {} lists missing element {element:?}", layer.id));
                }
                if self.parent_of(*element).is_some() {
                    problems.push(format!("layer {} lists child element {element:?}", layer.id));
                }
                placed.push(*element);
            }
        }
        for node in self.nodes.values() {
            placed.extend(node.children.iter().copied());
        }
        let all = self
            .nodes
            .values()
            .filter(|n| n.props.label_for_edge_id.is_none())
            .map(|n| ElementRef::Node(n.id))
            .chain(self.edges.keys().map(|id| ElementRef::Edge(*id)));
        for element in all {
            let count = placed.iter().filter(|p| **p == element).count();
            if count != 1 {
                problems.push(format!("element {element:?} is placed {count} times"));
            }
        }

        problems
    }
}
