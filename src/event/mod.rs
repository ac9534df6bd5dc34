mod bus;
mod events;

pub use bus::EventBus;
pub use events::{DiagramEvent, UndoDirection, UndoEvent};

pub trait EventHandler<E> {
    fn handle_event(&mut self, event: &E);
}

impl<E, F> EventHandler<E> for F
where
    F: FnMut(&E),
{
    fn handle_event(&mut self, event: &E) {
        self(event)
    }
}
