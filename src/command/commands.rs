use std::any::Any;

use indexmap::IndexSet;
use log::warn;

use super::UndoableAction;
use crate::diagram::Diagram;
use crate::element::ElementRef;
use crate::error::DiagramResult;
use crate::uow::{Entity, SnapshotDiff, UnitOfWork};

/// Undo step holding the before and after state of every entity a
/// transaction touched.
///
/// Undo and redo re-apply one side inside a fresh unit of work, so derived
/// state is recalculated and listeners see the change like any other.
#[derive(Debug, Clone)]
pub struct SnapshotUndoableAction {
    description: String,
    diff: SnapshotDiff,
    timestamp: u64,
    coalescing: bool,
}

impl SnapshotUndoableAction {
    pub fn new(description: &str, diff: SnapshotDiff) -> Self {
        Self {
            description: description.to_string(),
            diff,
            timestamp: 0,
            coalescing: false,
        }
    }

    /// Allows merging with a following coalescing action of the same
    /// description over the same entities
    pub fn coalescing(mut self, coalescing: bool) -> Self {
        self.coalescing = coalescing;
        self
    }

    pub fn diff(&self) -> &SnapshotDiff {
        &self.diff
    }

    fn entities(&self) -> IndexSet<Entity> {
        self.diff.before.keys().copied().collect()
    }
}

impl UndoableAction for SnapshotUndoableAction {
    fn undo(&mut self, diagram: &mut Diagram) {
        let mut uow = UnitOfWork::new();
        diagram.apply_snapshots(&self.diff.before, &mut uow);
        uow.commit(diagram);
    }

    fn redo(&mut self, diagram: &mut Diagram) {
        let mut uow = UnitOfWork::new();
        diagram.apply_snapshots(&self.diff.after, &mut uow);
        uow.commit(diagram);
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn timestamp(&self) -> u64 {
        self.timestamp
    }

    fn set_timestamp(&mut self, timestamp: u64) {
        self.timestamp = timestamp;
    }

    /// Keeps this action's before state and takes over the after state of `next`
    fn merge(&mut self, next: &dyn UndoableAction) -> bool {
        let Some(next) = next.as_any().downcast_ref::<SnapshotUndoableAction>() else {
            return false;
        };
        if !self.coalescing || !next.coalescing || next.description != self.description {
            return false;
        }
        if next.entities() != self.entities() {
            return false;
        }
        self.diff.after = next.diff.after.clone();
        true
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Undo step for a change of stacking order, stored as element positions
#[derive(Debug, Clone)]
pub struct StackUndoableAction {
    description: String,
    before: Vec<(ElementRef, usize)>,
    after: Vec<(ElementRef, usize)>,
    timestamp: u64,
}

impl StackUndoableAction {
    pub fn new(description: &str, before: Vec<(ElementRef, usize)>, after: Vec<(ElementRef, usize)>) -> Self {
        Self {
            description: description.to_string(),
            before,
            after,
            timestamp: 0,
        }
    }

    /// Shifts `elements` by `delta` in their containers and records the undo step
    pub fn apply(diagram: &mut Diagram, description: &str, elements: &[ElementRef], delta: isize) -> DiagramResult<()> {
        let mut uow = UnitOfWork::new();
        let before = match diagram.stack_modify(elements, delta, &mut uow) {
            Ok(before) => before,
            Err(err) => {
                uow.abort(diagram);
                return Err(err);
            }
        };
        uow.commit(diagram);

        let after: Vec<(ElementRef, usize)> = before
            .iter()
            .filter_map(|(e, _)| Some((*e, diagram.position_of(*e)?)))
            .collect();
        if before != after {
            diagram
                .undo_manager_mut()
                .add(Box::new(StackUndoableAction::new(description, before, after)));
        }
        Ok(())
    }

    fn restore(diagram: &mut Diagram, positions: &[(ElementRef, usize)]) {
        let result = UnitOfWork::immediate(diagram, |d, uow| d.stack_set(positions, uow));
        if let Err(err) = result {
            warn!("Failed to restore stacking order: {err}");
        }
    }
}

impl UndoableAction for StackUndoableAction {
    fn undo(&mut self, diagram: &mut Diagram) {
        Self::restore(diagram, &self.before);
    }

    fn redo(&mut self, diagram: &mut Diagram) {
        Self::restore(diagram, &self.after);
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn timestamp(&self) -> u64 {
        self.timestamp
    }

    fn set_timestamp(&mut self, timestamp: u64) {
        self.timestamp = timestamp;
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
