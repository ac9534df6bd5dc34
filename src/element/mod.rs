use serde::{Deserialize, Serialize};

use crate::id_generator::ElementId;

mod definition;
mod edge;
mod node;
mod props;

pub use definition::{ChildPolicy, NodeDefinition, NodeDefinitionBuilder, NodeDefinitionRegistry, OutlineFn};
pub use edge::{
    ControlPoints, Edge, EdgeEnd, Endpoint, Intersection, IntersectionKind, LabelNode, LabelPlacement,
    Waypoint,
};
pub use node::{Anchor, Node};
pub use props::{EdgeProps, LineHops, NodeProps, NodeStyle, PropertyKind, PropertySchema};

/// Reference to an element of either kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ElementRef {
    Node(ElementId),
    Edge(ElementId),
}

impl ElementRef {
    pub fn id(&self) -> ElementId {
        match self {
            ElementRef::Node(id) | ElementRef::Edge(id) => *id,
        }
    }

    pub fn element_type(&self) -> &'static str {
        match self {
            ElementRef::Node(_) => "node",
            ElementRef::Edge(_) => "edge",
        }
    }
}
