use egui::{Pos2, Vec2};
use serde::{Deserialize, Serialize};

use super::props::EdgeProps;
use crate::id_generator::ElementId;
use crate::layer::LayerId;

/// One end of an edge
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Endpoint {
    /// Attached to an anchor of a node; the position follows the node
    Connected { node: ElementId, anchor: usize },
    /// Literal position
    Free { position: Pos2 },
}

impl Endpoint {
    pub fn free(x: f32, y: f32) -> Self {
        Endpoint::Free {
            position: Pos2::new(x, y),
        }
    }

    pub fn connected(node: ElementId, anchor: usize) -> Self {
        Endpoint::Connected { node, anchor }
    }

    pub fn node(&self) -> Option<ElementId> {
        match self {
            Endpoint::Connected { node, .. } => Some(*node),
            Endpoint::Free { .. } => None,
        }
    }

    pub fn is_connected(&self) -> bool {
        matches!(self, Endpoint::Connected { .. })
    }

    /// True when this endpoint is attached to `node` at `anchor`
    pub fn references(&self, node: ElementId, anchor: usize) -> bool {
        matches!(self, Endpoint::Connected { node: n, anchor: a } if *n == node && *a == anchor)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EdgeEnd {
    Start,
    End,
}

/// Control points of a waypoint, relative to the waypoint position
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ControlPoints {
    /// Incoming control point
    pub cp1: Vec2,
    /// Outgoing control point
    pub cp2: Vec2,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Waypoint {
    pub point: Pos2,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub control_points: Option<ControlPoints>,
}

impl Waypoint {
    pub fn new(point: Pos2) -> Self {
        Self {
            point,
            control_points: None,
        }
    }
}

/// Orientation of a label relative to its edge
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LabelPlacement {
    Parallel,
    Perpendicular,
    #[default]
    Horizontal,
    Vertical,
}

/// Attachment of a label node to an edge
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LabelNode {
    pub node: ElementId,
    /// Position along the path as a fraction of its length
    pub time_offset: f32,
    /// Displacement from the path point, in the label's own frame
    pub offset: Vec2,
    pub placement: LabelPlacement,
    /// Flip labels that would otherwise render upside down
    pub readable: bool,
}

impl LabelNode {
    pub fn new(node: ElementId, time_offset: f32) -> Self {
        Self {
            node,
            time_offset,
            offset: Vec2::ZERO,
            placement: LabelPlacement::default(),
            readable: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IntersectionKind {
    /// This edge is stacked above the other one
    Above,
    Below,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Intersection {
    pub point: Pos2,
    pub kind: IntersectionKind,
}

/// A connection between two endpoints
#[derive(Debug, Clone)]
pub struct Edge {
    pub(crate) id: ElementId,
    pub(crate) start: Endpoint,
    pub(crate) end: Endpoint,
    pub(crate) waypoints: Vec<Waypoint>,
    pub(crate) label_nodes: Vec<LabelNode>,
    pub(crate) props: EdgeProps,
    pub(crate) parent: Option<ElementId>,
    pub(crate) layer: LayerId,
    pub(crate) intersections: Vec<Intersection>,
}

impl Edge {
    /// Creates an edge for `layer`. Connections are registered once the edge is added to a diagram.
    pub fn new(start: Endpoint, end: Endpoint, props: EdgeProps, layer: LayerId) -> Self {
        Self::with_id(ElementId::generate(), start, end, props, layer)
    }

    pub fn with_id(id: ElementId, start: Endpoint, end: Endpoint, props: EdgeProps, layer: LayerId) -> Self {
        Self {
            id,
            start,
            end,
            waypoints: Vec::new(),
            label_nodes: Vec::new(),
            props,
            parent: None,
            layer,
            intersections: Vec::new(),
        }
    }

    pub fn with_waypoints(mut self, waypoints: Vec<Waypoint>) -> Self {
        self.waypoints = waypoints;
        self
    }

    pub fn id(&self) -> ElementId {
        self.id
    }

    pub fn start(&self) -> Endpoint {
        self.start
    }

    pub fn end(&self) -> Endpoint {
        self.end
    }

    pub fn endpoint(&self, end: EdgeEnd) -> Endpoint {
        match end {
            EdgeEnd::Start => self.start,
            EdgeEnd::End => self.end,
        }
    }

    pub(crate) fn endpoint_mut(&mut self, end: EdgeEnd) -> &mut Endpoint {
        match end {
            EdgeEnd::Start => &mut self.start,
            EdgeEnd::End => &mut self.end,
        }
    }

    pub fn waypoints(&self) -> &[Waypoint] {
        &self.waypoints
    }

    pub fn label_nodes(&self) -> &[LabelNode] {
        &self.label_nodes
    }

    pub fn label_node(&self, node: ElementId) -> Option<&LabelNode> {
        self.label_nodes.iter().find(|l| l.node == node)
    }

    pub fn props(&self) -> &EdgeProps {
        &self.props
    }

    pub fn parent(&self) -> Option<ElementId> {
        self.parent
    }

    pub fn layer(&self) -> LayerId {
        self.layer
    }

    /// Cached crossings with other edges; only maintained while the
    /// diagram needs intersections
    pub fn intersections(&self) -> &[Intersection] {
        &self.intersections
    }

    /// Nodes this edge is attached to
    pub fn connected_nodes(&self) -> impl Iterator<Item = ElementId> {
        self.start.node().into_iter().chain(self.end.node())
    }
}
