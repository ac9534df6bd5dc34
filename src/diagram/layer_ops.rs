use indexmap::{IndexMap, IndexSet};
use log::{debug, info, warn};

use super::Diagram;
use crate::element::{ChildPolicy, ElementRef};
use crate::error::{DiagramError, DiagramResult};
use crate::geometry::Bounds;
use crate::id_generator::ElementId;
use crate::layer::{Layer, LayerId, LayerType};
use crate::uow::{Entity, UnitOfWork};

/// Where moved elements go relative to a reference element
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Relation {
    /// Directly above the reference, in the same container
    Above,
    /// Directly below the reference, in the same container
    Below,
    /// Into the reference node, as its top-most children
    On,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ElementReference {
    pub element: ElementRef,
    pub relation: Relation,
}

impl ElementReference {
    pub fn new(element: ElementRef, relation: Relation) -> Self {
        Self { element, relation }
    }
}

/// The ordered list an element is stacked in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Container {
    Layer(LayerId),
    Node(ElementId),
}

impl Diagram {
    /// Moves elements to `target`, or next to / into `reference`.
    ///
    /// Without a reference, elements moving to a layer above all of their
    /// source layers land at the bottom of it, otherwise at the top. With a
    /// reference the elements end up in the reference's layer.
    pub fn move_elements(
        &mut self,
        elements: &[ElementRef],
        uow: &mut UnitOfWork,
        target: LayerId,
        reference: Option<ElementReference>,
    ) -> DiagramResult<()> {
        self.layer(target)?;
        let mut moved: IndexSet<ElementRef> = IndexSet::new();
        for element in elements {
            self.ensure_exists(*element)?;
            if self.nodes.get(&element.id()).is_some_and(|n| n.props.label_for_edge_id.is_some()) {
                debug!("Skipping label node {element:?}, it moves with its edge");
                continue;
            }
            moved.insert(*element);
        }

        if let Some(reference) = reference {
            self.ensure_exists(reference.element)?;
            if moved
                .iter()
                .any(|e| *e == reference.element || self.is_ancestor(*e, reference.element))
            {
                warn!("Cannot move elements relative to {:?}, it is part of the move", reference.element);
                return Ok(());
            }
            if reference.relation == Relation::On {
                let accepts = match reference.element {
                    ElementRef::Node(id) => {
                        self.registry().get(&self.node(id)?.node_type)?.child_policy() != ChildPolicy::Leaf
                    }
                    ElementRef::Edge(_) => false,
                };
                if !accepts {
                    return Err(DiagramError::NotAContainer(reference.element.id()));
                }
            }
        }

        let layer = match reference {
            Some(r) => self.layer_of(r.element).unwrap_or(target),
            None => target,
        };
        if self.element_layer(layer)?.locked {
            warn!("Layer {layer} is locked, not moving elements into it");
            return Ok(());
        }

        // Descendants of moved elements travel with their ancestor
        let all: Vec<ElementRef> = moved.iter().copied().collect();
        moved.retain(|e| !all.iter().any(|a| a != e && self.is_ancestor(*a, *e)));
        if moved.is_empty() {
            return Ok(());
        }

        let topmost = moved
            .iter()
            .filter_map(|e| self.layer_of(*e))
            .filter_map(|l| self.layers.index_of(l))
            .max();

        for element in &moved {
            uow.snapshot(self, (*element).into());
            self.detach_from_container(*element, uow);
        }

        let parent = match reference {
            Some(r) if r.relation == Relation::On => Some(r.element.id()),
            Some(r) => self.parent_of(r.element),
            None => None,
        };
        let container = match parent {
            Some(p) => Container::Node(p),
            None => Container::Layer(layer),
        };

        for element in &moved {
            self.assign_layer(*element, layer, uow);
            match *element {
                ElementRef::Node(id) => {
                    if let Some(n) = self.nodes.get_mut(&id) {
                        n.parent = parent;
                    }
                }
                ElementRef::Edge(id) => {
                    if let Some(e) = self.edges.get_mut(&id) {
                        e.parent = parent;
                    }
                }
            }
            uow.update_element(*element);
        }

        self.snapshot_container(container, uow);
        let target_index = self.layers.index_of(layer);
        let Some(list) = self.container_elements_mut(container) else {
            return Ok(());
        };
        let insert_at = match reference {
            Some(r) if r.relation != Relation::On => {
                let at = list.iter().position(|e| *e == r.element).unwrap_or(list.len());
                if r.relation == Relation::Above { at + 1 } else { at }
            }
            Some(_) => list.len(),
            None if target_index > topmost => 0,
            None => list.len(),
        };
        list.splice(insert_at..insert_at, moved.iter().copied());

        if let Some(parent) = parent {
            self.queue_notify_parent(parent, uow);
        }
        uow.structure_changed();
        if self.must_calculate_intersections() {
            self.queue_intersection_refresh(uow);
        }
        debug!("Moved {} elements to layer {layer} at {insert_at}", moved.len());
        Ok(())
    }

    /// Sets the layer of an element and everything that belongs to it
    fn assign_layer(&mut self, element: ElementRef, layer: LayerId, uow: &mut UnitOfWork) {
        uow.snapshot(self, element.into());
        let dependents: Vec<ElementRef> = match element {
            ElementRef::Node(id) => match self.nodes.get_mut(&id) {
                Some(node) => {
                    node.layer = layer;
                    node.children.clone()
                }
                None => return,
            },
            ElementRef::Edge(id) => match self.edges.get_mut(&id) {
                Some(edge) => {
                    edge.layer = layer;
                    edge.label_nodes.iter().map(|l| ElementRef::Node(l.node)).collect()
                }
                None => return,
            },
        };
        uow.update_element(element);
        for dependent in dependents {
            self.assign_layer(dependent, layer, uow);
        }
    }

    /// Shifts each element `delta` places up (positive) or down within its
    /// container. Returns the previous positions.
    pub fn stack_modify(
        &mut self,
        elements: &[ElementRef],
        delta: isize,
        uow: &mut UnitOfWork,
    ) -> DiagramResult<Vec<(ElementRef, usize)>> {
        let groups = self.group_by_container(elements)?;
        let mut previous = Vec::new();
        let shift = delta as f32 + 0.5 * delta.signum() as f32;

        for (container, members) in groups {
            self.snapshot_container(container, uow);
            let Some(list) = self.container_elements_mut(container) else {
                continue;
            };
            let mut keyed: Vec<(f32, ElementRef)> = list
                .iter()
                .enumerate()
                .map(|(i, e)| {
                    if members.contains(e) {
                        previous.push((*e, i));
                        (i as f32 + shift, *e)
                    } else {
                        (i as f32, *e)
                    }
                })
                .collect();
            keyed.sort_by(|a, b| a.0.total_cmp(&b.0));
            *list = keyed.into_iter().map(|(_, e)| e).collect();
        }

        self.finish_restack(elements, uow);
        Ok(previous)
    }

    /// Puts elements at explicit positions within their containers.
    /// Returns the previous positions.
    pub fn stack_set(
        &mut self,
        positions: &[(ElementRef, usize)],
        uow: &mut UnitOfWork,
    ) -> DiagramResult<Vec<(ElementRef, usize)>> {
        let elements: Vec<ElementRef> = positions.iter().map(|(e, _)| *e).collect();
        let groups = self.group_by_container(&elements)?;
        let mut previous = Vec::new();

        for (container, members) in groups {
            self.snapshot_container(container, uow);
            let Some(list) = self.container_elements_mut(container) else {
                continue;
            };
            for (i, e) in list.iter().enumerate() {
                if members.contains(e) {
                    previous.push((*e, i));
                }
            }
            list.retain(|e| !members.contains(e));
            let mut placed: Vec<(ElementRef, usize)> = positions
                .iter()
                .filter(|(e, _)| members.contains(e))
                .copied()
                .collect();
            placed.sort_by_key(|(_, index)| *index);
            for (e, index) in placed {
                let at = index.min(list.len());
                list.insert(at, e);
            }
        }

        self.finish_restack(&elements, uow);
        Ok(previous)
    }

    fn finish_restack(&mut self, elements: &[ElementRef], uow: &mut UnitOfWork) {
        for element in elements {
            uow.update_element(*element);
        }
        uow.structure_changed();
        if self.must_calculate_intersections() {
            self.queue_intersection_refresh(uow);
        }
    }

    fn group_by_container(&self, elements: &[ElementRef]) -> DiagramResult<IndexMap<Container, IndexSet<ElementRef>>> {
        let mut groups: IndexMap<Container, IndexSet<ElementRef>> = IndexMap::new();
        for element in elements {
            self.ensure_exists(*element)?;
            if let Some(container) = self.container_of(*element) {
                groups.entry(container).or_default().insert(*element);
            }
        }
        Ok(groups)
    }

    fn container_of(&self, element: ElementRef) -> Option<Container> {
        if let Some(parent) = self.parent_of(element) {
            return Some(Container::Node(parent));
        }
        let layer = self.layer_of(element)?;
        self.layers.get(layer)?.position_of(element).map(|_| Container::Layer(layer))
    }

    fn container_elements_mut(&mut self, container: Container) -> Option<&mut Vec<ElementRef>> {
        match container {
            Container::Layer(id) => self.layers.get_mut(id).map(|l| &mut l.elements),
            Container::Node(id) => self.nodes.get_mut(&id).map(|n| &mut n.children),
        }
    }

    fn snapshot_container(&mut self, container: Container, uow: &mut UnitOfWork) {
        match container {
            Container::Layer(id) => uow.snapshot(self, Entity::Layer(id)),
            Container::Node(id) => {
                uow.snapshot(self, Entity::Node(id));
                uow.update_element(ElementRef::Node(id));
            }
        }
    }

    // ------------------------------------------------------------------------
    // Layer stack
    // ------------------------------------------------------------------------

    /// Adds an empty, visible layer on top of the stack
    pub fn add_layer(&mut self, name: &str, uow: &mut UnitOfWork) -> LayerId {
        self.push_layer(Layer::new(name), uow)
    }

    /// Adds a layer showing another diagram. Elements cannot be placed in it.
    pub fn add_reference_layer(&mut self, name: &str, uow: &mut UnitOfWork) -> LayerId {
        let mut layer = Layer::new(name);
        layer.layer_type = LayerType::Reference;
        self.push_layer(layer, uow)
    }

    fn push_layer(&mut self, layer: Layer, uow: &mut UnitOfWork) -> LayerId {
        uow.snapshot(self, Entity::Diagram);
        let name = layer.name.clone();
        let id = layer.id;
        uow.snapshot(self, Entity::Layer(id));
        self.layers.push(layer);
        uow.structure_changed();
        info!("Added layer {name} ({id})");
        id
    }

    /// Removes a layer and all of its elements. The last remaining layer is kept.
    pub fn remove_layer(&mut self, id: LayerId, uow: &mut UnitOfWork) -> DiagramResult<()> {
        let elements = self.layer(id)?.elements.clone();
        if self.layers.len() <= 1 {
            warn!("Not removing {id}, a diagram keeps at least one layer");
            return Ok(());
        }

        uow.snapshot(self, Entity::Diagram);
        uow.snapshot(self, Entity::Layer(id));
        for element in elements {
            if self.contains(element) {
                self.remove_element(element, uow)?;
            }
        }
        self.layers.layers.retain(|l| l.id != id);
        self.layers.visible.shift_remove(&id);
        if self.layers.active == Some(id) {
            self.layers.active = None;
        }
        uow.structure_changed();
        info!("Removed layer {id}");
        Ok(())
    }

    /// Moves a layer to `index` in the stack (0 is the bottom)
    pub fn reorder_layer(&mut self, id: LayerId, index: usize, uow: &mut UnitOfWork) -> DiagramResult<()> {
        let Some(from) = self.layers.index_of(id) else {
            return Err(DiagramError::UnknownLayer(id));
        };
        uow.snapshot(self, Entity::Diagram);
        let layer = self.layers.layers.remove(from);
        let to = index.min(self.layers.layers.len());
        self.layers.layers.insert(to, layer);
        uow.structure_changed();
        if self.must_calculate_intersections() {
            self.queue_intersection_refresh(uow);
        }
        Ok(())
    }

    pub fn set_layer_visible(&mut self, id: LayerId, visible: bool, uow: &mut UnitOfWork) -> DiagramResult<()> {
        self.layer(id)?;
        if self.layers.is_visible(id) == visible {
            return Ok(());
        }
        uow.snapshot(self, Entity::Diagram);
        if visible {
            self.layers.visible.insert(id);
        } else {
            self.layers.visible.shift_remove(&id);
        }
        uow.structure_changed();
        if self.must_calculate_intersections() {
            self.queue_intersection_refresh(uow);
        }
        Ok(())
    }

    /// Flips the visibility of a layer and returns the new state
    pub fn toggle_layer_visibility(&mut self, id: LayerId, uow: &mut UnitOfWork) -> DiagramResult<bool> {
        let visible = !self.layers.is_visible(id);
        self.set_layer_visible(id, visible, uow)?;
        Ok(visible)
    }

    pub fn set_layer_locked(&mut self, id: LayerId, locked: bool, uow: &mut UnitOfWork) -> DiagramResult<()> {
        self.layer(id)?;
        uow.snapshot(self, Entity::Layer(id));
        if let Some(layer) = self.layers.get_mut(id) {
            layer.locked = locked;
        }
        uow.structure_changed();
        Ok(())
    }

    pub fn rename_layer(&mut self, id: LayerId, name: &str, uow: &mut UnitOfWork) -> DiagramResult<()> {
        self.layer(id)?;
        uow.snapshot(self, Entity::Layer(id));
        if let Some(layer) = self.layers.get_mut(id) {
            layer.name = name.to_string();
        }
        uow.structure_changed();
        Ok(())
    }

    pub fn set_active_layer(&mut self, id: LayerId) -> DiagramResult<()> {
        self.layer(id)?;
        self.layers.active = Some(id);
        Ok(())
    }

    pub fn set_canvas(&mut self, canvas: Bounds, uow: &mut UnitOfWork) {
        uow.snapshot(self, Entity::Diagram);
        self.canvas = canvas;
        uow.structure_changed();
    }
}
