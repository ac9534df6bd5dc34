mod commands;
mod history;

use std::any::Any;

use crate::diagram::Diagram;

pub use commands::{SnapshotUndoableAction, StackUndoableAction};
pub use history::UndoManager;

/// A step in the undo history.
///
/// Actions are executed before they are recorded; `undo` and `redo` move
/// the diagram between the states before and after the step.
pub trait UndoableAction {
    fn undo(&mut self, diagram: &mut Diagram);

    fn redo(&mut self, diagram: &mut Diagram);

    fn description(&self) -> &str;

    /// Milliseconds since the UNIX epoch at which the action was recorded
    fn timestamp(&self) -> u64;

    fn set_timestamp(&mut self, timestamp: u64);

    /// Folds `next` into this action. Returns false if the two cannot be combined.
    fn merge(&mut self, _next: &dyn UndoableAction) -> bool {
        false
    }

    fn as_any(&self) -> &dyn Any;
}
