//! Serialized shape of a diagram.
//!
//! Layers nest their top-level elements, nodes nest their children and
//! edges nest their label nodes, so the document reads top-down the way
//! the diagram is stacked. Derived state (edge index, intersections, label
//! placement) is not stored; it is rebuilt on load.

use egui::{Pos2, Vec2};
use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::config::DiagramConfig;
use crate::diagram::Diagram;
use crate::element::{
    Anchor, Edge, EdgeProps, ElementRef, Endpoint, LabelNode, LabelPlacement, Node, NodeDefinitionRegistry,
    NodeProps, Waypoint,
};
use crate::error::{DiagramError, DiagramResult};
use crate::geometry::Bounds;
use crate::id_generator::ElementId;
use crate::layer::{Layer, LayerId, LayerType};
use crate::uow::UnitOfWork;
use crate::util::time::timestamp_millis;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum SerializedElement {
    Node(SerializedNode),
    Edge(SerializedEdge),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SerializedNode {
    pub id: ElementId,
    pub node_type: String,
    pub bounds: Bounds,
    #[serde(default)]
    pub anchors: Vec<Anchor>,
    #[serde(default)]
    pub children: Vec<SerializedElement>,
    #[serde(default)]
    pub properties: NodeProps,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SerializedNodeRef {
    pub id: ElementId,
}

/// Connected endpoints also carry their position at the time of saving
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SerializedEndpoint {
    Connected {
        anchor: usize,
        node: SerializedNodeRef,
        position: Pos2,
    },
    Free {
        position: Pos2,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SerializedLabelNode {
    pub id: ElementId,
    pub time_offset: f32,
    #[serde(default)]
    pub offset: Vec2,
    #[serde(default)]
    pub placement: LabelPlacement,
    #[serde(default = "default_readable")]
    pub readable: bool,
    pub node: SerializedNode,
}

fn default_readable() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SerializedEdge {
    pub id: ElementId,
    pub start: SerializedEndpoint,
    pub end: SerializedEndpoint,
    #[serde(default)]
    pub waypoints: Vec<Waypoint>,
    #[serde(default)]
    pub label_nodes: Vec<SerializedLabelNode>,
    #[serde(default)]
    pub properties: EdgeProps,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SerializedLayer {
    pub id: LayerId,
    pub name: String,
    #[serde(rename = "type", default = "layer_tag")]
    pub kind: String,
    #[serde(default)]
    pub layer_type: LayerType,
    #[serde(default)]
    pub locked: bool,
    #[serde(default = "default_visible")]
    pub visible: bool,
    #[serde(default)]
    pub elements: Vec<SerializedElement>,
}

fn layer_tag() -> String {
    "layer".to_string()
}

fn default_visible() -> bool {
    true
}

/// A whole diagram document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SerializedDiagram {
    pub name: String,
    pub canvas: Bounds,
    /// Bottom-most first
    pub layers: Vec<SerializedLayer>,
    #[serde(default)]
    pub active_layer: Option<LayerId>,
    /// Crate version that wrote the document
    pub version: String,
    /// Milliseconds since the UNIX epoch
    pub timestamp: u64,
}

/// Edge waiting for all nodes to be loaded
struct PendingEdge {
    edge: SerializedEdge,
    layer: LayerId,
    parent: Option<ElementId>,
}

impl Diagram {
    /// All layers, bottom-most first, with their elements nested
    pub fn serialize_layers(&self) -> Vec<SerializedLayer> {
        self.layers
            .all()
            .iter()
            .map(|layer| SerializedLayer {
                id: layer.id(),
                name: layer.name().to_string(),
                kind: layer_tag(),
                layer_type: layer.layer_type(),
                locked: layer.is_locked(),
                visible: self.layers.is_visible(layer.id()),
                elements: layer
                    .elements()
                    .iter()
                    .filter_map(|e| self.serialize_element(*e))
                    .collect(),
            })
            .collect()
    }

    pub fn to_serialized(&self) -> SerializedDiagram {
        SerializedDiagram {
            name: self.name().to_string(),
            canvas: self.canvas,
            layers: self.serialize_layers(),
            active_layer: self.layers.active,
            version: env!("CARGO_PKG_VERSION").to_string(),
            timestamp: timestamp_millis(),
        }
    }

    pub fn to_json(&self) -> DiagramResult<String> {
        Ok(serde_json::to_string_pretty(&self.to_serialized())?)
    }

    /// Loads a diagram with the default configuration and node types
    pub fn from_json(json: &str) -> DiagramResult<Diagram> {
        let data: SerializedDiagram = serde_json::from_str(json)?;
        Self::from_serialized(data, DiagramConfig::default(), NodeDefinitionRegistry::default())
    }

    fn serialize_element(&self, element: ElementRef) -> Option<SerializedElement> {
        match element {
            ElementRef::Node(id) => self.serialize_node(id).map(SerializedElement::Node),
            ElementRef::Edge(id) => {
                let edge = self.edges.get(&id)?;
                Some(SerializedElement::Edge(SerializedEdge {
                    id,
                    start: self.serialize_endpoint(&edge.start),
                    end: self.serialize_endpoint(&edge.end),
                    waypoints: edge.waypoints.clone(),
                    label_nodes: edge
                        .label_nodes
                        .iter()
                        .filter_map(|l| {
                            Some(SerializedLabelNode {
                                id: l.node,
                                time_offset: l.time_offset,
                                offset: l.offset,
                                placement: l.placement,
                                readable: l.readable,
                                node: self.serialize_node(l.node)?,
                            })
                        })
                        .collect(),
                    properties: edge.props.clone(),
                }))
            }
        }
    }

    fn serialize_node(&self, id: ElementId) -> Option<SerializedNode> {
        let node = self.nodes.get(&id)?;
        Some(SerializedNode {
            id,
            node_type: node.node_type.clone(),
            bounds: node.bounds,
            anchors: node.anchors.clone(),
            children: node
                .children
                .iter()
                .filter_map(|c| self.serialize_element(*c))
                .collect(),
            properties: node.props.clone(),
        })
    }

    fn serialize_endpoint(&self, endpoint: &Endpoint) -> SerializedEndpoint {
        let position = self.endpoint_position(endpoint).unwrap_or_default();
        match *endpoint {
            Endpoint::Connected { node, anchor } => SerializedEndpoint::Connected {
                anchor,
                node: SerializedNodeRef { id: node },
                position,
            },
            Endpoint::Free { .. } => SerializedEndpoint::Free { position },
        }
    }

    /// Rebuilds a diagram from its serialized shape.
    ///
    /// Node types and properties are validated against `registry`; anchors
    /// are recomputed from the node definitions.
    pub fn from_serialized(
        data: SerializedDiagram,
        config: DiagramConfig,
        registry: NodeDefinitionRegistry,
    ) -> DiagramResult<Diagram> {
        if data.version != env!("CARGO_PKG_VERSION") {
            warn!(
                "Diagram was written by version {}, loading with {}",
                data.version,
                env!("CARGO_PKG_VERSION")
            );
        }

        let mut diagram = Diagram::empty(&data.name, config, registry);
        diagram.canvas = data.canvas;

        let mut pending = Vec::new();
        for serialized in data.layers {
            let mut layer = Layer::with_id(serialized.id, &serialized.name);
            layer.locked = serialized.locked;
            layer.layer_type = serialized.layer_type;
            if layer.layer_type == LayerType::Reference && !serialized.elements.is_empty() {
                return Err(DiagramError::ReferenceLayer(serialized.id));
            }
            for element in serialized.elements {
                let loaded = diagram.load_element(element, serialized.id, None, &mut pending)?;
                layer.elements.push(loaded);
            }
            diagram.layers.layers.push(layer);
            if serialized.visible {
                diagram.layers.visible.insert(serialized.id);
            }
        }
        if diagram.layers.is_empty() {
            diagram.layers.push(Layer::new("Default"));
        }
        diagram.layers.active = data.active_layer.filter(|id| diagram.layers.contains(*id));

        // Label nodes first, edges may be attached to them
        let mut edges = Vec::with_capacity(pending.len());
        for mut edge in pending {
            let labels = std::mem::take(&mut edge.edge.label_nodes);
            let mut attachments = Vec::with_capacity(labels.len());
            for label in labels {
                attachments.push(diagram.load_label(label, edge.edge.id, edge.layer)?);
            }
            edges.push((edge, attachments));
        }
        for (edge, labels) in edges {
            diagram.load_edge(edge, labels)?;
        }

        // Rebuild label placement and intersections
        let mut uow = UnitOfWork::throwaway();
        let edges: Vec<ElementId> = diagram.edges.keys().copied().collect();
        for id in edges {
            diagram.queue_edge_invalidation(id, &mut uow);
        }
        uow.commit(&mut diagram);

        let problems = diagram.check_consistency();
        if let Some(problem) = problems.into_iter().next() {
            return Err(DiagramError::Inconsistent(problem));
        }
        info!(
            "Loaded diagram {} with {} nodes and {} edges",
            diagram.name(),
            diagram.nodes.len(),
            diagram.edges.len()
        );
        Ok(diagram)
    }

    fn load_element(
        &mut self,
        element: SerializedElement,
        layer: LayerId,
        parent: Option<ElementId>,
        pending: &mut Vec<PendingEdge>,
    ) -> DiagramResult<ElementRef> {
        match element {
            SerializedElement::Node(node) => self.load_node(node, layer, parent, pending).map(ElementRef::Node),
            SerializedElement::Edge(edge) => {
                self.claim_id(edge.id)?;
                let id = edge.id;
                pending.push(PendingEdge { edge, layer, parent });
                Ok(ElementRef::Edge(id))
            }
        }
    }

    fn load_node(
        &mut self,
        serialized: SerializedNode,
        layer: LayerId,
        parent: Option<ElementId>,
        pending: &mut Vec<PendingEdge>,
    ) -> DiagramResult<ElementId> {
        let definition = self.registry().get(&serialized.node_type)?;
        serialized.properties.validate(definition.schema())?;
        self.claim_id(serialized.id)?;

        let id = serialized.id;
        let mut node = Node::with_id(id, serialized.node_type, serialized.bounds, serialized.properties, layer);
        node.parent = parent;
        node.anchors = definition.anchors(&node.bounds, &node.props, self.config().anchor_precision);
        // Placeholder so children loaded below see their parent
        self.nodes.insert(id, node);

        let mut children = Vec::with_capacity(serialized.children.len());
        for child in serialized.children {
            children.push(self.load_element(child, layer, Some(id), pending)?);
        }
        self.node_mut(id)?.children = children;
        Ok(id)
    }

    fn load_label(&mut self, label: SerializedLabelNode, edge: ElementId, layer: LayerId) -> DiagramResult<LabelNode> {
        let mut node = label.node;
        node.properties.label_for_edge_id = Some(edge);
        let mut nested = Vec::new();
        let node = self.load_node(node, layer, None, &mut nested)?;
        if !nested.is_empty() {
            warn!("Ignoring {} edges nested in label node {node}", nested.len());
        }
        Ok(LabelNode {
            node,
            time_offset: label.time_offset.clamp(0.0, 1.0),
            offset: label.offset,
            placement: label.placement,
            readable: label.readable,
        })
    }

    fn load_edge(&mut self, pending: PendingEdge, labels: Vec<LabelNode>) -> DiagramResult<()> {
        let PendingEdge { edge: serialized, layer, parent } = pending;
        serialized.properties.validate(self.registry().edge_schema())?;
        let start = self.load_endpoint(serialized.start)?;
        let end = self.load_endpoint(serialized.end)?;

        let id = serialized.id;
        let mut edge = Edge::with_id(id, start, end, serialized.properties, layer).with_waypoints(serialized.waypoints);
        edge.parent = parent;
        edge.label_nodes = labels;
        self.edges.insert(id, edge);
        for endpoint in [start, end] {
            if let Endpoint::Connected { node, anchor } = endpoint {
                self.node_mut(node)?.link_edge(anchor, id);
            }
        }
        Ok(())
    }

    fn load_endpoint(&self, endpoint: SerializedEndpoint) -> DiagramResult<Endpoint> {
        let endpoint = match endpoint {
            SerializedEndpoint::Connected { anchor, node, .. } => Endpoint::Connected { node: node.id, anchor },
            SerializedEndpoint::Free { position } => Endpoint::Free { position },
        };
        self.validate_endpoint(&endpoint)?;
        Ok(endpoint)
    }

    fn claim_id(&self, id: ElementId) -> DiagramResult<()> {
        if self.nodes.contains_key(&id) || self.edges.contains_key(&id) {
            return Err(DiagramError::DuplicateElement(id));
        }
        ElementId::reserve(id);
        Ok(())
    }
}
