use std::collections::BTreeMap;

use egui::Pos2;
use indexmap::IndexSet;
use serde::{Deserialize, Serialize};

use super::ElementRef;
use super::props::NodeProps;
use crate::geometry::Bounds;
use crate::id_generator::ElementId;
use crate::layer::LayerId;

/// Attachment point on a node outline
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Anchor {
    /// Position relative to the node bounds (0..1 on both axes)
    pub point: Pos2,
    /// Edges attached here clip to the node outline instead of ending at `point`
    #[serde(default)]
    pub clip: bool,
}

/// A shape in the diagram.
///
/// Nodes live in the diagram's node lookup; relationships to other
/// elements are expressed by id.
#[derive(Debug, Clone)]
pub struct Node {
    pub(crate) id: ElementId,
    pub(crate) node_type: String,
    pub(crate) bounds: Bounds,
    pub(crate) props: NodeProps,
    pub(crate) parent: Option<ElementId>,
    pub(crate) children: Vec<ElementRef>,
    pub(crate) layer: LayerId,
    pub(crate) anchors: Vec<Anchor>,
    /// Anchor index to the edges attached there, derived from the edges' endpoints
    pub(crate) edges: BTreeMap<usize, IndexSet<ElementId>>,
}

impl Node {
    /// Creates a node for `layer`. It becomes part of a diagram once added to it.
    pub fn new(node_type: impl Into<String>, bounds: Bounds, props: NodeProps, layer: LayerId) -> Self {
        Self::with_id(ElementId::generate(), node_type, bounds, props, layer)
    }

    pub fn with_id(
        id: ElementId,
        node_type: impl Into<String>,
        bounds: Bounds,
        props: NodeProps,
        layer: LayerId,
    ) -> Self {
        Self {
            id,
            node_type: node_type.into(),
            bounds,
            props,
            parent: None,
            children: Vec::new(),
            layer,
            anchors: Vec::new(),
            edges: BTreeMap::new(),
        }
    }

    pub fn id(&self) -> ElementId {
        self.id
    }

    pub fn node_type(&self) -> &str {
        &self.node_type
    }

    pub fn bounds(&self) -> Bounds {
        self.bounds
    }

    pub fn props(&self) -> &NodeProps {
        &self.props
    }

    pub fn parent(&self) -> Option<ElementId> {
        self.parent
    }

    pub fn children(&self) -> &[ElementRef] {
        &self.children
    }

    pub fn layer(&self) -> LayerId {
        self.layer
    }

    pub fn anchors(&self) -> &[Anchor] {
        &self.anchors
    }

    pub fn anchor(&self, index: usize) -> Option<&Anchor> {
        self.anchors.get(index)
    }

    /// World position of an anchor
    pub fn anchor_position(&self, index: usize) -> Option<Pos2> {
        self.anchors
            .get(index)
            .map(|a| self.bounds.local_to_world(a.point))
    }

    /// The edge this node labels, if it is a label node
    pub fn label_for(&self) -> Option<ElementId> {
        self.props.label_for_edge_id
    }

    pub fn edges(&self) -> &BTreeMap<usize, IndexSet<ElementId>> {
        &self.edges
    }

    pub fn edges_at(&self, anchor: usize) -> impl Iterator<Item = ElementId> + '_ {
        self.edges.get(&anchor).into_iter().flatten().copied()
    }

    /// All edges attached at any anchor
    pub fn connected_edges(&self) -> IndexSet<ElementId> {
        self.edges.values().flatten().copied().collect()
    }

    pub(crate) fn link_edge(&mut self, anchor: usize, edge: ElementId) -> bool {
        self.edges.entry(anchor).or_default().insert(edge)
    }

    pub(crate) fn unlink_edge(&mut self, anchor: usize, edge: ElementId) -> bool {
        let Some(set) = self.edges.get_mut(&anchor) else {
            return false;
        };
        let removed = set.shift_remove(&edge);
        if set.is_empty() {
            self.edges.remove(&anchor);
        }
        removed
    }
}
