use std::rc::Rc;

use egui::{Pos2, pos2};
use indexmap::IndexMap;

use super::node::Anchor;
use super::props::{NodeProps, PropertyKind, PropertySchema};
use crate::error::{DiagramError, DiagramResult};
use crate::geometry::Bounds;

/// Closed outline of a node type, in coordinates relative to the node bounds
pub type OutlineFn = Rc<dyn Fn(&Bounds, &NodeProps) -> Vec<Pos2>>;

/// How a node reacts to its children
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChildPolicy {
    Leaf,
    /// Children follow every transform; bounds shrink-wrap the children
    Group,
    /// Children follow transforms except non-uniform scales; bounds grow to hold the children
    Container,
}

/// Behavior shared by all nodes of one `node_type`
#[derive(Clone)]
pub struct NodeDefinition {
    node_type: String,
    child_policy: ChildPolicy,
    outline: OutlineFn,
    schema: PropertySchema,
}

impl std::fmt::Debug for NodeDefinition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NodeDefinition")
            .field("node_type", &self.node_type)
            .field("child_policy", &self.child_policy)
            .field("schema", &self.schema)
            .finish()
    }
}

impl NodeDefinition {
    pub fn node_type(&self) -> &str {
        &self.node_type
    }

    pub fn child_policy(&self) -> ChildPolicy {
        self.child_policy
    }

    pub fn schema(&self) -> &PropertySchema {
        &self.schema
    }

    pub fn outline(&self, bounds: &Bounds, props: &NodeProps) -> Vec<Pos2> {
        (self.outline)(bounds, props)
    }

    /// Outline mapped into world space
    pub fn world_outline(&self, bounds: &Bounds, props: &NodeProps) -> Vec<Pos2> {
        self.outline(bounds, props)
            .into_iter()
            .map(|p| bounds.local_to_world(p))
            .collect()
    }

    /// Anchors of a node: the clipping centroid first, then one anchor per
    /// outline segment at its midpoint
    pub fn anchors(&self, bounds: &Bounds, props: &NodeProps, precision: f32) -> Vec<Anchor> {
        let round = |v: f32| (v * precision).round() / precision;
        let outline = self.outline(bounds, props);
        let mut anchors = vec![Anchor {
            point: pos2(0.5, 0.5),
            clip: true,
        }];
        let n = outline.len();
        for i in 0..n {
            let (a, b) = (outline[i], outline[(i + 1) % n]);
            if a.distance(b) < f32::EPSILON {
                continue;
            }
            anchors.push(Anchor {
                point: pos2(round((a.x + b.x) / 2.0), round((a.y + b.y) / 2.0)),
                clip: false,
            });
        }
        anchors
    }
}

/// Builder for registering a node type
pub struct NodeDefinitionBuilder {
    node_type: String,
    child_policy: ChildPolicy,
    outline: OutlineFn,
    schema: PropertySchema,
}

impl NodeDefinitionBuilder {
    pub fn new(node_type: impl Into<String>) -> Self {
        Self {
            node_type: node_type.into(),
            child_policy: ChildPolicy::Leaf,
            outline: Rc::new(|_, _| rect_outline()),
            schema: PropertySchema::new(),
        }
    }

    pub fn child_policy(mut self, policy: ChildPolicy) -> Self {
        self.child_policy = policy;
        self
    }

    pub fn outline(mut self, outline: impl Fn(&Bounds, &NodeProps) -> Vec<Pos2> + 'static) -> Self {
        self.outline = Rc::new(outline);
        self
    }

    pub fn property(mut self, key: impl Into<String>, kind: PropertyKind) -> Self {
        self.schema = self.schema.with(key, kind);
        self
    }

    pub fn build(self) -> NodeDefinition {
        NodeDefinition {
            node_type: self.node_type,
            child_policy: self.child_policy,
            outline: self.outline,
            schema: self.schema,
        }
    }
}

/// Node types known to a diagram, plus the schema for edge custom properties
#[derive(Debug, Clone)]
pub struct NodeDefinitionRegistry {
    definitions: IndexMap<String, Rc<NodeDefinition>>,
    edge_schema: PropertySchema,
}

impl Default for NodeDefinitionRegistry {
    fn default() -> Self {
        let mut registry = Self::empty();
        registry.register(NodeDefinitionBuilder::new("rect").build());
        registry.register(NodeDefinitionBuilder::new("text").build());
        registry.register(
            NodeDefinitionBuilder::new("diamond")
                .outline(|_, _| {
                    vec![pos2(0.5, 0.0), pos2(1.0, 0.5), pos2(0.5, 1.0), pos2(0.0, 0.5)]
                })
                .build(),
        );
        registry.register(
            NodeDefinitionBuilder::new("rounded-rect")
                .property("radius", PropertyKind::Number)
                .outline(rounded_rect_outline)
                .build(),
        );
        registry.register(
            NodeDefinitionBuilder::new("group")
                .child_policy(ChildPolicy::Group)
                .build(),
        );
        registry.register(
            NodeDefinitionBuilder::new("container")
                .child_policy(ChildPolicy::Container)
                .build(),
        );
        registry
    }
}

impl NodeDefinitionRegistry {
    /// Registry without any node type
    pub fn empty() -> Self {
        Self {
            definitions: IndexMap::new(),
            edge_schema: PropertySchema::new(),
        }
    }

    /// Adds or replaces a node type
    pub fn register(&mut self, definition: NodeDefinition) {
        self.definitions
            .insert(definition.node_type.clone(), Rc::new(definition));
    }

    pub fn get(&self, node_type: &str) -> DiagramResult<Rc<NodeDefinition>> {
        self.definitions
            .get(node_type)
            .cloned()
            .ok_or_else(|| DiagramError::UnknownNodeType(node_type.to_string()))
    }

    pub fn node_types(&self) -> impl Iterator<Item = &str> {
        self.definitions.keys().map(String::as_str)
    }

    pub fn edge_schema(&self) -> &PropertySchema {
        &self.edge_schema
    }

    pub fn set_edge_schema(&mut self, schema: PropertySchema) {
        self.edge_schema = schema;
    }
}

fn rect_outline() -> Vec<Pos2> {
    vec![pos2(0.0, 0.0), pos2(1.0, 0.0), pos2(1.0, 1.0), pos2(0.0, 1.0)]
}

/// Rectangle with chamfered corners approximating the rounding
fn rounded_rect_outline(bounds: &Bounds, props: &NodeProps) -> Vec<Pos2> {
    let radius = props.number("radius").unwrap_or(0.0).max(0.0);
    if radius == 0.0 || bounds.size.x == 0.0 || bounds.size.y == 0.0 {
        return rect_outline();
    }
    let rx = (radius / bounds.size.x).min(0.5);
    let ry = (radius / bounds.size.y).min(0.5);
    vec![
        pos2(rx, 0.0),
        pos2(1.0 - rx, 0.0),
        pos2(1.0, ry),
        pos2(1.0, 1.0 - ry),
        pos2(1.0 - rx, 1.0),
        pos2(rx, 1.0),
        pos2(0.0, 1.0 - ry),
        pos2(0.0, ry),
    ]
}
