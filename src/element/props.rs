use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{DiagramError, DiagramResult};
use crate::id_generator::ElementId;

/// Value type accepted by a custom property
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PropertyKind {
    Bool,
    Number,
    Text,
    Any,
}

impl PropertyKind {
    fn accepts(&self, value: &Value) -> bool {
        match self {
            PropertyKind::Bool => value.is_boolean(),
            PropertyKind::Number => value.is_number(),
            PropertyKind::Text => value.is_string(),
            PropertyKind::Any => true,
        }
    }
}

/// Custom properties an element kind accepts on top of its fixed fields
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PropertySchema {
    fields: BTreeMap<String, PropertyKind>,
}

impl PropertySchema {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: impl Into<String>, kind: PropertyKind) -> Self {
        self.fields.insert(key.into(), kind);
        self
    }

    pub fn validate(&self, custom: &BTreeMap<String, Value>) -> DiagramResult<()> {
        for (key, value) in custom {
            match self.fields.get(key) {
                None => {
                    return Err(DiagramError::InvalidProperty {
                        key: key.clone(),
                        reason: "not declared for this element type".to_string(),
                    });
                }
                Some(kind) if !kind.accepts(value) => {
                    return Err(DiagramError::InvalidProperty {
                        key: key.clone(),
                        reason: format!("expected {kind:?}, got {value}"),
                    });
                }
                Some(_) => {}
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NodeStyle {
    pub fill: Option<String>,
    pub stroke: Option<String>,
    pub stroke_width: Option<f32>,
}

/// Properties of a node
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NodeProps {
    pub style: NodeStyle,
    pub text: Option<String>,
    /// Set on label nodes, the edge the label belongs to
    pub label_for_edge_id: Option<ElementId>,
    pub custom: BTreeMap<String, Value>,
}

impl NodeProps {
    pub fn number(&self, key: &str) -> Option<f32> {
        self.custom.get(key).and_then(Value::as_f64).map(|v| v as f32)
    }

    pub(crate) fn validate(&self, schema: &PropertySchema) -> DiagramResult<()> {
        validate_stroke_width(self.style.stroke_width)?;
        schema.validate(&self.custom)
    }
}

/// How an edge renders crossings with edges below it
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LineHops {
    #[default]
    None,
    Gap,
    Arc,
}

/// Properties of an edge
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EdgeProps {
    pub stroke: Option<String>,
    pub stroke_width: Option<f32>,
    pub line_hops: LineHops,
    pub custom: BTreeMap<String, Value>,
}

impl EdgeProps {
    pub(crate) fn validate(&self, schema: &PropertySchema) -> DiagramResult<()> {
        validate_stroke_width(self.stroke_width)?;
        schema.validate(&self.custom)
    }
}

fn validate_stroke_width(width: Option<f32>) -> DiagramResult<()> {
    match width {
        Some(w) if !w.is_finite() || w < 0.0 => Err(DiagramError::InvalidProperty {
            key: "strokeWidth".to_string(),
            reason: format!("must be a non-negative number, got {w}"),
        }),
        _ => Ok(()),
    }
}
