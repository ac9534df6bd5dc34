use crate::element::ElementRef;

/// Change notifications of a diagram, emitted when a unit of work commits
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiagramEvent {
    ElementChange(ElementRef),
    ElementAdd(ElementRef),
    ElementRemove(ElementRef),
    /// Coarse change: canvas, layers or stacking order
    Change,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UndoDirection {
    Undo,
    Redo,
}

/// Notifications of the undo manager
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UndoEvent {
    Execute {
        direction: UndoDirection,
        description: String,
    },
    Change,
}
