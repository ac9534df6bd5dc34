use indexmap::IndexSet;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::element::ElementRef;

/// A unique identifier for a layer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LayerId(pub Uuid);

impl LayerId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for LayerId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for LayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LayerType {
    #[default]
    Regular,
    /// Shows the content of another diagram; never holds elements of its own
    Reference,
}

/// Ordered container of the top-level elements (elements without a parent)
#[derive(Debug, Clone, PartialEq)]
pub struct Layer {
    pub(crate) id: LayerId,
    pub(crate) name: String,
    pub(crate) locked: bool,
    pub(crate) layer_type: LayerType,
    /// Bottom-most first
    pub(crate) elements: Vec<ElementRef>,
}

impl Layer {
    pub fn new(name: &str) -> Self {
        Self::with_id(LayerId::new(), name)
    }

    pub fn with_id(id: LayerId, name: &str) -> Self {
        Self {
            id,
            name: name.to_string(),
            locked: false,
            layer_type: LayerType::Regular,
            elements: Vec::new(),
        }
    }

    pub fn id(&self) -> LayerId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_locked(&self) -> bool {
        self.locked
    }

    pub fn layer_type(&self) -> LayerType {
        self.layer_type
    }

    pub fn elements(&self) -> &[ElementRef] {
        &self.elements
    }

    pub fn position_of(&self, element: ElementRef) -> Option<usize> {
        self.elements.iter().position(|e| *e == element)
    }
}

/// The layer stack of a diagram
#[derive(Debug, Clone, Default)]
pub struct LayerManager {
    /// Bottom-most first
    pub(crate) layers: Vec<Layer>,
    pub(crate) visible: IndexSet<LayerId>,
    pub(crate) active: Option<LayerId>,
}

impl LayerManager {
    pub fn all(&self) -> &[Layer] {
        &self.layers
    }

    pub fn get(&self, id: LayerId) -> Option<&Layer> {
        self.layers.iter().find(|l| l.id == id)
    }

    pub(crate) fn get_mut(&mut self, id: LayerId) -> Option<&mut Layer> {
        self.layers.iter_mut().find(|l| l.id == id)
    }

    pub fn index_of(&self, id: LayerId) -> Option<usize> {
        self.layers.iter().position(|l| l.id == id)
    }

    pub fn contains(&self, id: LayerId) -> bool {
        self.index_of(id).is_some()
    }

    pub fn len(&self) -> usize {
        self.layers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    pub fn is_visible(&self, id: LayerId) -> bool {
        self.visible.contains(&id)
    }

    /// Visible layers, bottom-most first
    pub fn visible_layers(&self) -> impl Iterator<Item = &Layer> {
        self.layers.iter().filter(|l| self.visible.contains(&l.id))
    }

    /// The layer new elements go to; follows the selection
    pub fn active(&self) -> Option<LayerId> {
        self.active.or_else(|| self.layers.last().map(|l| l.id))
    }

    pub(crate) fn push(&mut self, layer: Layer) {
        self.visible.insert(layer.id);
        self.layers.push(layer);
    }
}
