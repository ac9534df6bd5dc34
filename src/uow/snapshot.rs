use indexmap::IndexMap;

use crate::element::{
    Anchor, EdgeProps, ElementRef, Endpoint, LabelNode, NodeProps, Waypoint,
};
use crate::geometry::Bounds;
use crate::id_generator::ElementId;
use crate::layer::{LayerId, LayerType};

/// Anything a unit of work can snapshot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Entity {
    /// Diagram-wide state: canvas and layer stack
    Diagram,
    Layer(LayerId),
    Node(ElementId),
    Edge(ElementId),
}

impl From<ElementRef> for Entity {
    fn from(element: ElementRef) -> Self {
        match element {
            ElementRef::Node(id) => Entity::Node(id),
            ElementRef::Edge(id) => Entity::Edge(id),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct NodeSnapshot {
    pub id: ElementId,
    pub node_type: String,
    pub bounds: Bounds,
    pub props: NodeProps,
    pub parent: Option<ElementId>,
    pub children: Vec<ElementRef>,
    pub layer: LayerId,
    pub anchors: Vec<Anchor>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EdgeSnapshot {
    pub id: ElementId,
    pub start: Endpoint,
    pub end: Endpoint,
    pub waypoints: Vec<Waypoint>,
    pub label_nodes: Vec<LabelNode>,
    pub props: EdgeProps,
    pub parent: Option<ElementId>,
    pub layer: LayerId,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LayerSnapshot {
    pub id: LayerId,
    pub name: String,
    pub locked: bool,
    pub layer_type: LayerType,
    pub elements: Vec<ElementRef>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DiagramSnapshot {
    pub canvas: Bounds,
    pub layer_order: Vec<LayerId>,
    pub visible: Vec<LayerId>,
    pub active: Option<LayerId>,
}

/// Immutable copy of the persisted fields of one entity
#[derive(Debug, Clone, PartialEq)]
pub enum Snapshot {
    Diagram(DiagramSnapshot),
    Layer(LayerSnapshot),
    Node(NodeSnapshot),
    Edge(EdgeSnapshot),
}

/// Entity to its state; `None` means the entity did not exist
pub type SnapshotMap = IndexMap<Entity, Option<Snapshot>>;

/// State of every entity touched by a transaction, before and after it
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SnapshotDiff {
    pub before: SnapshotMap,
    pub after: SnapshotMap,
}

impl SnapshotDiff {
    pub fn is_empty(&self) -> bool {
        self.before.is_empty()
    }

    /// Entities whose state actually differs
    pub fn changed(&self) -> impl Iterator<Item = Entity> + '_ {
        self.before
            .iter()
            .filter(|(entity, before)| self.after.get(*entity) != Some(*before))
            .map(|(entity, _)| *entity)
    }

    pub fn has_changes(&self) -> bool {
        self.changed().next().is_some()
    }
}
