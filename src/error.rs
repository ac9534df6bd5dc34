use thiserror::Error;

use crate::id_generator::ElementId;
use crate::layer::LayerId;

/// Errors returned to callers of the diagram operations.
///
/// Broken internal invariants (asymmetric edge index, double registration,
/// parent cycles) are not represented here; they panic.
#[derive(Debug, Error)]
pub enum DiagramError {
    #[error("Unknown node: {0}")]
    UnknownNode(ElementId),

    #[error("Unknown edge: {0}")]
    UnknownEdge(ElementId),

    #[error("Unknown layer: {0}")]
    UnknownLayer(LayerId),

    #[error("Unknown node type: {0}")]
    UnknownNodeType(String),

    #[error("Node {node} has no anchor {anchor}")]
    InvalidAnchor { node: ElementId, anchor: usize },

    #[error("Invalid property `{key}`: {reason}")]
    InvalidProperty { key: String, reason: String },

    #[error("Layer {0} shows another diagram and holds no elements")]
    ReferenceLayer(LayerId),

    #[error("Element {0} does not accept children")]
    NotAContainer(ElementId),

    #[error("Edge {edge} has no waypoint {index}")]
    InvalidWaypoint { edge: ElementId, index: usize },

    #[error("Node {0} is not a label of edge {1}")]
    NotALabel(ElementId, ElementId),

    #[error("Element {0} appears more than once")]
    DuplicateElement(ElementId),

    #[error("Inconsistent diagram data: {0}")]
    Inconsistent(String),

    #[error("Failed to (de)serialize diagram: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type for diagram operations
pub type DiagramResult<T> = Result<T, DiagramError>;
