#![warn(clippy::all, rust_2018_idioms)]

pub mod command;
pub mod config;
pub mod diagram;
pub mod element;
pub mod error;
pub mod event;
pub mod geometry;
pub mod id_generator;
pub mod layer;
pub mod selection;
pub mod serialization;
pub mod uow;
pub mod util;

pub use command::{SnapshotUndoableAction, StackUndoableAction, UndoManager, UndoableAction};
pub use config::DiagramConfig;
pub use diagram::{Diagram, ElementReference, Relation};
pub use element::{Edge, EdgeProps, ElementRef, Endpoint, Node, NodeDefinitionRegistry, NodeProps};
pub use error::{DiagramError, DiagramResult};
pub use event::{DiagramEvent, EventBus, UndoEvent};
pub use geometry::{Bounds, Transform};
pub use id_generator::ElementId;
pub use layer::{Layer, LayerId};
pub use uow::UnitOfWork;
