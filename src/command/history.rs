use std::collections::VecDeque;

use log::{debug, trace};

use super::UndoableAction;
use crate::event::{EventBus, UndoEvent};
use crate::util::time::timestamp_millis;

/// Undo and redo stacks of a diagram.
///
/// Both stacks hold at most `max_history` actions; the oldest is dropped
/// first. Recording a new action clears the redo stack.
pub struct UndoManager {
    /// Oldest first
    undoable: VecDeque<Box<dyn UndoableAction>>,
    /// Oldest first
    redoable: VecDeque<Box<dyn UndoableAction>>,
    max_history: usize,
    merge_window_ms: u64,
    events: EventBus<UndoEvent>,
}

impl std::fmt::Debug for UndoManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UndoManager")
            .field("undoable", &self.undo_descriptions())
            .field("redoable", &self.redoable.len())
            .field("max_history", &self.max_history)
            .finish()
    }
}

impl UndoManager {
    pub fn new(max_history: usize, merge_window_ms: u64) -> Self {
        Self {
            undoable: VecDeque::new(),
            redoable: VecDeque::new(),
            max_history: max_history.max(1),
            merge_window_ms,
            events: EventBus::new(),
        }
    }

    /// Records an action that has already been executed.
    ///
    /// The action is merged into the latest undoable action when that one
    /// was recorded within the merge window and accepts it.
    pub fn add(&mut self, mut action: Box<dyn UndoableAction>) {
        let now = timestamp_millis();
        if let Some(last) = self.undoable.back_mut() {
            let within_window = now.saturating_sub(last.timestamp()) <= self.merge_window_ms;
            if within_window && last.merge(action.as_ref()) {
                trace!("Merged '{}' into the previous undo step", action.description());
                last.set_timestamp(now);
                self.redoable.clear();
                self.events.emit(UndoEvent::Change);
                return;
            }
        }

        debug!("Recorded undo step '{}'", action.description());
        action.set_timestamp(now);
        self.undoable.push_back(action);
        Self::evict(&mut self.undoable, self.max_history);
        self.redoable.clear();
        self.events.emit(UndoEvent::Change);
    }

    pub(crate) fn take_undoable(&mut self) -> Option<Box<dyn UndoableAction>> {
        self.undoable.pop_back()
    }

    pub(crate) fn take_redoable(&mut self) -> Option<Box<dyn UndoableAction>> {
        self.redoable.pop_back()
    }

    pub(crate) fn push_undoable(&mut self, action: Box<dyn UndoableAction>) {
        self.undoable.push_back(action);
        Self::evict(&mut self.undoable, self.max_history);
    }

    pub(crate) fn push_redoable(&mut self, action: Box<dyn UndoableAction>) {
        self.redoable.push_back(action);
        Self::evict(&mut self.redoable, self.max_history);
    }

    pub(crate) fn notify(&self, event: UndoEvent) {
        self.events.emit(event);
    }

    fn evict(stack: &mut VecDeque<Box<dyn UndoableAction>>, max: usize) {
        while stack.len() > max {
            if let Some(dropped) = stack.pop_front() {
                trace!("Evicted undo step '{}'", dropped.description());
            }
        }
    }

    pub fn events(&self) -> &EventBus<UndoEvent> {
        &self.events
    }

    pub fn can_undo(&self) -> bool {
        !self.undoable.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redoable.is_empty()
    }

    pub fn undo_depth(&self) -> usize {
        self.undoable.len()
    }

    pub fn redo_depth(&self) -> usize {
        self.redoable.len()
    }

    pub fn max_history(&self) -> usize {
        self.max_history
    }

    /// Descriptions of the undoable actions, most recent first
    pub fn undo_descriptions(&self) -> Vec<&str> {
        self.undoable.iter().rev().map(|a| a.description()).collect()
    }

    pub fn redo_descriptions(&self) -> Vec<&str> {
        self.redoable.iter().rev().map(|a| a.description()).collect()
    }

    pub fn clear(&mut self) {
        self.undoable.clear();
        self.redoable.clear();
        self.events.emit(UndoEvent::Change);
    }
}
