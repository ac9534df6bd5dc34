use std::cell::RefCell;

use super::EventHandler;

/// A simple event bus for broadcasting events to registered handlers
pub struct EventBus<E> {
    handlers: RefCell<Vec<Box<dyn EventHandler<E>>>>,
}

impl<E> std::fmt::Debug for EventBus<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("handlers", &format!("<{} handlers>", self.handlers.borrow().len()))
            .finish()
    }
}

impl<E> Default for EventBus<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> EventBus<E> {
    /// Creates a new event bus
    pub fn new() -> Self {
        Self {
            handlers: RefCell::new(Vec::new()),
        }
    }

    /// Subscribe a handler to receive events
    pub fn subscribe(&self, handler: impl EventHandler<E> + 'static) {
        self.handlers.borrow_mut().push(Box::new(handler));
    }

    /// Emit an event to all registered handlers.
    ///
    /// Handlers must not subscribe to the same bus while handling an event.
    pub fn emit(&self, event: E) {
        for handler in &mut *self.handlers.borrow_mut() {
            handler.handle_event(&event);
        }
    }
}
