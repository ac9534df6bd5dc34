use serde::{Deserialize, Serialize};

/// Tunables of a diagram, usually loaded by the host application
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiagramConfig {
    /// Maximum number of entries kept on each of the undo and redo stacks
    pub max_history: usize,
    /// Actions added within this window of the previous one may be merged into it
    pub merge_window_ms: u64,
    /// Upper bound for the magnitude of a label node's offset from its edge
    pub max_label_offset: f32,
    /// Anchor coordinates are rounded to `1 / anchor_precision`
    pub anchor_precision: f32,
}

impl Default for DiagramConfig {
    fn default() -> Self {
        Self {
            max_history: 100,
            merge_window_ms: 1000,
            max_label_offset: 50.0,
            anchor_precision: 1000.0,
        }
    }
}
