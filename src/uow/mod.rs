//! Transactions over a [`Diagram`].
//!
//! Every mutating diagram operation takes a [`UnitOfWork`]. Mutations are
//! applied to the live entities right away; the unit of work records the
//! state of each touched entity before its first mutation, collects the
//! derived-state recalculations the mutations request, and publishes the
//! changes when it commits.
//!
//! ```text
//! open ──► mutate (snapshot + update_element + push_action) ──► commit
//!                                                               │
//!          drain actions to a fixed point ◄─────────────────────┘
//!          capture after-snapshots
//!          emit one event per touched element, then Change
//! ```
//!
//! `commit` and `abort` consume the unit of work, so recording into a
//! finished transaction cannot be expressed.

mod snapshot;

use std::collections::HashSet;

use indexmap::{IndexMap, IndexSet};
use log::debug;

use crate::command::SnapshotUndoableAction;
use crate::diagram::Diagram;
use crate::element::ElementRef;
use crate::error::DiagramResult;
use crate::event::DiagramEvent;

pub use snapshot::{
    DiagramSnapshot, EdgeSnapshot, Entity, LayerSnapshot, NodeSnapshot, Snapshot, SnapshotDiff,
    SnapshotMap,
};

/// Names the kind of deferred recalculation; together with the entity it
/// identifies a queued action
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActionKey {
    RecomputeAnchors,
    NotifyParent,
    LabelOffset,
    InvalidateEdge,
    RecalculateIntersections,
    Named(&'static str),
}

/// Deferred recalculation run during commit
pub type Action = Box<dyn FnOnce(&mut Diagram, &mut UnitOfWork)>;

pub struct UnitOfWork {
    track_snapshots: bool,
    emit_events: bool,
    snapshots: SnapshotMap,
    updated: IndexSet<ElementRef>,
    added: IndexSet<ElementRef>,
    removed: IndexSet<ElementRef>,
    structure_changed: bool,
    actions: IndexMap<(ActionKey, Entity), Action>,
    executed: HashSet<(ActionKey, Entity)>,
    invalidated: HashSet<Entity>,
    committing: bool,
}

impl std::fmt::Debug for UnitOfWork {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UnitOfWork")
            .field("snapshots", &self.snapshots.len())
            .field("updated", &self.updated)
            .field("added", &self.added)
            .field("removed", &self.removed)
            .field("pending_actions", &self.actions.len())
            .finish()
    }
}

impl Default for UnitOfWork {
    fn default() -> Self {
        Self::new()
    }
}

impl UnitOfWork {
    /// Opens a transaction that records snapshots and emits events on commit
    pub fn new() -> Self {
        Self {
            track_snapshots: true,
            emit_events: true,
            snapshots: IndexMap::new(),
            updated: IndexSet::new(),
            added: IndexSet::new(),
            removed: IndexSet::new(),
            structure_changed: false,
            actions: IndexMap::new(),
            executed: HashSet::new(),
            invalidated: HashSet::new(),
            committing: false,
        }
    }

    /// Opens a transaction that records no snapshots and emits no events.
    /// Derived state is still recalculated on commit.
    pub fn throwaway() -> Self {
        Self {
            track_snapshots: false,
            emit_events: false,
            ..Self::new()
        }
    }

    /// Runs `f` in a transaction and commits it without recording undo history
    pub fn immediate<R>(diagram: &mut Diagram, f: impl FnOnce(&mut Diagram, &mut UnitOfWork) -> R) -> R {
        let mut uow = UnitOfWork::new();
        let result = f(diagram, &mut uow);
        uow.commit(diagram);
        result
    }

    /// Runs `f` in a transaction, commits it and records the change as one undo step.
    ///
    /// When `f` fails the transaction is aborted and its mutations rolled back.
    pub fn execute<R>(
        diagram: &mut Diagram,
        description: &str,
        f: impl FnOnce(&mut Diagram, &mut UnitOfWork) -> DiagramResult<R>,
    ) -> DiagramResult<R> {
        Self::execute_inner(diagram, description, false, f)
    }

    /// Like [`UnitOfWork::execute`], but the undo step merges with an
    /// immediately preceding step of the same description touching the same
    /// entities (e.g. consecutive drag updates)
    pub fn execute_coalescing<R>(
        diagram: &mut Diagram,
        description: &str,
        f: impl FnOnce(&mut Diagram, &mut UnitOfWork) -> DiagramResult<R>,
    ) -> DiagramResult<R> {
        Self::execute_inner(diagram, description, true, f)
    }

    fn execute_inner<R>(
        diagram: &mut Diagram,
        description: &str,
        coalescing: bool,
        f: impl FnOnce(&mut Diagram, &mut UnitOfWork) -> DiagramResult<R>,
    ) -> DiagramResult<R> {
        let mut uow = UnitOfWork::new();
        match f(diagram, &mut uow) {
            Ok(result) => {
                let diff = uow.commit(diagram);
                if diff.has_changes() {
                    let action = SnapshotUndoableAction::new(description, diff).coalescing(coalescing);
                    diagram.undo_manager_mut().add(Box::new(action));
                }
                Ok(result)
            }
            Err(err) => {
                uow.abort(diagram);
                Err(err)
            }
        }
    }

    /// Records the state of `entity` unless it was already recorded in this transaction
    pub fn snapshot(&mut self, diagram: &Diagram, entity: Entity) {
        assert!(!self.committing, "snapshot of {entity:?} after the unit of work was committed");
        if !self.track_snapshots || self.snapshots.contains_key(&entity) {
            return;
        }
        self.snapshots.insert(entity, diagram.capture(entity));
    }

    pub fn has_snapshot(&self, entity: Entity) -> bool {
        self.snapshots.contains_key(&entity)
    }

    /// Marks an element as changed; one change event is emitted per element on commit
    pub fn update_element(&mut self, element: ElementRef) {
        assert!(!self.committing, "update of {element:?} after the unit of work was committed");
        self.updated.insert(element);
    }

    pub(crate) fn add_element(&mut self, element: ElementRef) {
        if !self.removed.shift_remove(&element) {
            self.added.insert(element);
        } else {
            self.updated.insert(element);
        }
        self.structure_changed = true;
    }

    pub(crate) fn remove_element(&mut self, element: ElementRef) {
        self.updated.shift_remove(&element);
        if !self.added.shift_remove(&element) {
            self.removed.insert(element);
        }
        self.structure_changed = true;
    }

    /// Requests a diagram level `Change` event (layers, stacking, canvas)
    pub fn structure_changed(&mut self) {
        self.structure_changed = true;
    }

    /// True when the element was changed or added in this transaction
    pub fn is_updated(&self, element: ElementRef) -> bool {
        self.updated.contains(&element) || self.added.contains(&element)
    }

    /// Queues `action` to run on commit.
    ///
    /// The action runs at most once per `(key, entity)` and transaction;
    /// further requests while it is pending, or after it ran, are dropped.
    pub fn push_action(
        &mut self,
        key: ActionKey,
        entity: Entity,
        action: impl FnOnce(&mut Diagram, &mut UnitOfWork) + 'static,
    ) {
        let slot = (key, entity);
        if self.executed.contains(&slot) || self.actions.contains_key(&slot) {
            return;
        }
        self.actions.insert(slot, Box::new(action));
    }

    pub fn has_pending_action(&self, key: ActionKey, entity: Entity) -> bool {
        self.actions.contains_key(&(key, entity))
    }

    /// Marks `entity` as invalidated in this transaction.
    /// Returns false when it already was, in which case the caller must stop.
    pub fn begin_invalidation(&mut self, entity: Entity) -> bool {
        self.invalidated.insert(entity)
    }

    pub fn has_been_invalidated(&self, entity: Entity) -> bool {
        self.invalidated.contains(&entity)
    }

    /// Runs the queued actions to a fixed point, publishes the changes and
    /// returns the before/after state of every snapshotted entity
    pub fn commit(mut self, diagram: &mut Diagram) -> SnapshotDiff {
        let mut runs = 0;
        while let Some((slot, action)) = self.actions.shift_remove_index(0) {
            self.executed.insert(slot);
            action(diagram, &mut self);
            runs += 1;
        }
        self.committing = true;

        let after: SnapshotMap = self
            .snapshots
            .keys()
            .map(|entity| (*entity, diagram.capture(*entity)))
            .collect();

        debug!(
            "Commit: {} snapshots, {} updated, {} added, {} removed, {} actions run",
            self.snapshots.len(),
            self.updated.len(),
            self.added.len(),
            self.removed.len(),
            runs
        );

        if self.emit_events {
            self.emit(diagram);
        }

        SnapshotDiff {
            before: std::mem::take(&mut self.snapshots),
            after,
        }
    }

    fn emit(&self, diagram: &Diagram) {
        let events = diagram.events();
        for element in &self.added {
            events.emit(DiagramEvent::ElementAdd(*element));
        }
        for element in &self.updated {
            if !self.added.contains(element) && !self.removed.contains(element) {
                events.emit(DiagramEvent::ElementChange(*element));
            }
        }
        for element in &self.removed {
            events.emit(DiagramEvent::ElementRemove(*element));
        }
        if self.structure_changed {
            events.emit(DiagramEvent::Change);
        }
    }

    /// Drops queued actions and dirty marks without emitting events, and
    /// restores every snapshotted entity to its state before the transaction
    pub fn abort(mut self, diagram: &mut Diagram) {
        debug!(
            "Abort: discarding {} actions, rolling back {} snapshots",
            self.actions.len(),
            self.snapshots.len()
        );
        self.actions.clear();
        if self.snapshots.is_empty() {
            return;
        }
        let before = std::mem::take(&mut self.snapshots);
        let mut rollback = UnitOfWork::throwaway();
        diagram.apply_snapshots(&before, &mut rollback);
        rollback.commit(diagram);
    }
}
