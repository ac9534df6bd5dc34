use egui::{Pos2, emath::Rot2};
use log::{debug, trace};

use super::Diagram;
use super::node_ops::{BoundsChange, label_frame_angle, label_rotation};
use crate::element::{
    EdgeEnd, EdgeProps, ElementRef, Endpoint, Intersection, IntersectionKind, LabelNode, LabelPlacement, LineHops,
    Node, Waypoint,
};
use crate::error::{DiagramError, DiagramResult};
use crate::geometry::{Bounds, Path, Transform, apply_all_to_point};
use crate::id_generator::ElementId;
use crate::uow::{ActionKey, Entity, UnitOfWork};

impl Diagram {
    pub fn set_edge_start(&mut self, id: ElementId, endpoint: Endpoint, uow: &mut UnitOfWork) -> DiagramResult<()> {
        self.set_endpoint(id, EdgeEnd::Start, endpoint, uow)
    }

    pub fn set_edge_end(&mut self, id: ElementId, endpoint: Endpoint, uow: &mut UnitOfWork) -> DiagramResult<()> {
        self.set_endpoint(id, EdgeEnd::End, endpoint, uow)
    }

    /// Replaces one endpoint and keeps the edge index of the old and new
    /// node in sync with it
    pub(crate) fn set_endpoint(
        &mut self,
        id: ElementId,
        end: EdgeEnd,
        endpoint: Endpoint,
        uow: &mut UnitOfWork,
    ) -> DiagramResult<()> {
        self.validate_endpoint(&endpoint)?;
        let edge = self.edge(id)?;
        let old = edge.endpoint(end);
        let other = edge.endpoint(match end {
            EdgeEnd::Start => EdgeEnd::End,
            EdgeEnd::End => EdgeEnd::Start,
        });

        uow.snapshot(self, Entity::Edge(id));
        if old != endpoint {
            self.unlink_endpoint(id, old, other, uow);
            self.link_endpoint(id, endpoint, uow);
        }
        *self.edge_mut(id)?.endpoint_mut(end) = endpoint;
        uow.update_element(ElementRef::Edge(id));
        self.queue_edge_invalidation(id, uow);
        Ok(())
    }

    /// Applies `transforms` to the free endpoints and waypoints of every edge in `ids`
    pub fn transform_edges(
        &mut self,
        ids: &[ElementId],
        transforms: &[Transform],
        uow: &mut UnitOfWork,
    ) -> DiagramResult<()> {
        for id in ids {
            self.edge(*id)?;
        }
        for id in ids {
            self.transform_edge(*id, transforms, uow, BoundsChange::Direct)?;
        }
        Ok(())
    }

    pub(crate) fn transform_edge(
        &mut self,
        id: ElementId,
        transforms: &[Transform],
        uow: &mut UnitOfWork,
        change: BoundsChange,
    ) -> DiagramResult<()> {
        uow.snapshot(self, Entity::Edge(id));
        let edge = self.edge_mut(id)?;
        for end in [EdgeEnd::Start, EdgeEnd::End] {
            if let Endpoint::Free { position } = edge.endpoint_mut(end) {
                *position = apply_all_to_point(transforms, *position);
            }
        }
        for waypoint in &mut edge.waypoints {
            let point = apply_all_to_point(transforms, waypoint.point);
            if let Some(cps) = &mut waypoint.control_points {
                cps.cp1 = apply_all_to_point(transforms, waypoint.point + cps.cp1) - point;
                cps.cp2 = apply_all_to_point(transforms, waypoint.point + cps.cp2) - point;
            }
            waypoint.point = point;
        }
        let parent = edge.parent;

        if let Some(parent) = parent {
            if change != BoundsChange::FromParent {
                self.queue_notify_parent(parent, uow);
            }
        }
        uow.update_element(ElementRef::Edge(id));
        self.queue_edge_invalidation(id, uow);
        Ok(())
    }

    /// Changes the properties of an edge through a validated draft
    pub fn update_edge_props(
        &mut self,
        id: ElementId,
        uow: &mut UnitOfWork,
        f: impl FnOnce(&mut EdgeProps, &mut UnitOfWork),
    ) -> DiagramResult<()> {
        let mut draft = self.edge(id)?.props.clone();
        f(&mut draft, uow);
        draft.validate(self.registry().edge_schema())?;

        uow.snapshot(self, Entity::Edge(id));
        let edge = self.edge_mut(id)?;
        let hops_changed = edge.props.line_hops != draft.line_hops;
        edge.props = draft;
        uow.update_element(ElementRef::Edge(id));
        self.queue_edge_invalidation(id, uow);
        if hops_changed {
            self.queue_intersection_refresh(uow);
        }
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Waypoints
    // ------------------------------------------------------------------------

    /// Inserts a waypoint where `point` projects onto the path.
    /// Returns its index.
    pub fn add_waypoint(&mut self, id: ElementId, point: Pos2, uow: &mut UnitOfWork) -> DiagramResult<usize> {
        let path = self.edge_path(id)?;
        let offset = path.project(point).offset;
        let index = self
            .edge(id)?
            .waypoints
            .iter()
            .filter(|w| path.project(w.point).offset < offset)
            .count();

        uow.snapshot(self, Entity::Edge(id));
        self.edge_mut(id)?.waypoints.insert(index, Waypoint::new(point));
        uow.update_element(ElementRef::Edge(id));
        self.queue_edge_invalidation(id, uow);
        Ok(index)
    }

    pub fn move_waypoint(&mut self, id: ElementId, index: usize, point: Pos2, uow: &mut UnitOfWork) -> DiagramResult<()> {
        if index >= self.edge(id)?.waypoints.len() {
            return Err(DiagramError::InvalidWaypoint { edge: id, index });
        }
        uow.snapshot(self, Entity::Edge(id));
        self.edge_mut(id)?.waypoints[index].point = point;
        uow.update_element(ElementRef::Edge(id));
        self.queue_edge_invalidation(id, uow);
        Ok(())
    }

    pub fn remove_waypoint(&mut self, id: ElementId, index: usize, uow: &mut UnitOfWork) -> DiagramResult<()> {
        if index >= self.edge(id)?.waypoints.len() {
            return Err(DiagramError::InvalidWaypoint { edge: id, index });
        }
        uow.snapshot(self, Entity::Edge(id));
        self.edge_mut(id)?.waypoints.remove(index);
        uow.update_element(ElementRef::Edge(id));
        self.queue_edge_invalidation(id, uow);
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Labels
    // ------------------------------------------------------------------------

    /// Adds `node` as a label of `edge`, placed at `time_offset` along the path
    pub fn attach_label_node(
        &mut self,
        edge: ElementId,
        mut node: Node,
        time_offset: f32,
        placement: LabelPlacement,
        uow: &mut UnitOfWork,
    ) -> DiagramResult<ElementId> {
        let layer = self.edge(edge)?.layer;
        node.props.label_for_edge_id = Some(edge);
        let id = self.register_node(node, layer, None, uow)?;

        uow.snapshot(self, Entity::Edge(edge));
        let mut label = LabelNode::new(id, time_offset.clamp(0.0, 1.0));
        label.placement = placement;
        self.edge_mut(edge)?.label_nodes.push(label);
        uow.update_element(ElementRef::Edge(edge));
        self.queue_edge_invalidation(edge, uow);
        Ok(id)
    }

    /// Changes how a label node is attached to its edge
    pub fn update_label(
        &mut self,
        edge: ElementId,
        node: ElementId,
        uow: &mut UnitOfWork,
        f: impl FnOnce(&mut LabelNode),
    ) -> DiagramResult<()> {
        let mut draft = *self
            .edge(edge)?
            .label_node(node)
            .ok_or(DiagramError::NotALabel(node, edge))?;
        f(&mut draft);
        draft.node = node;
        draft.time_offset = draft.time_offset.clamp(0.0, 1.0);
        let max = self.config().max_label_offset;
        if draft.offset.length() > max {
            draft.offset = draft.offset.normalized() * max;
        }

        uow.snapshot(self, Entity::Edge(edge));
        if let Some(label) = self.edge_mut(edge)?.label_nodes.iter_mut().find(|l| l.node == node) {
            *label = draft;
        }
        uow.update_element(ElementRef::Edge(edge));
        self.queue_edge_invalidation(edge, uow);
        Ok(())
    }

    pub fn set_label_placement(
        &mut self,
        edge: ElementId,
        node: ElementId,
        placement: LabelPlacement,
        uow: &mut UnitOfWork,
    ) -> DiagramResult<()> {
        self.update_label(edge, node, uow, |label| label.placement = placement)
    }

    // ------------------------------------------------------------------------
    // Invalidation
    // ------------------------------------------------------------------------

    pub(crate) fn queue_edge_invalidation(&mut self, id: ElementId, uow: &mut UnitOfWork) {
        uow.push_action(ActionKey::InvalidateEdge, Entity::Edge(id), move |d, uow| {
            d.invalidate_edge(id, uow)
        });
    }

    /// Recomputes what derives from the edge geometry: label placement and
    /// intersections. Runs at most once per edge and transaction.
    pub fn invalidate_edge(&mut self, id: ElementId, uow: &mut UnitOfWork) {
        if !self.edges.contains_key(&id) || !uow.begin_invalidation(Entity::Edge(id)) {
            return;
        }
        trace!("Invalidating edge {id}");
        uow.update_element(ElementRef::Edge(id));
        self.layout_labels(id, uow);
        if self.must_calculate_intersections() {
            self.recalculate_intersections(id, uow);
            self.queue_intersection_refresh(uow);
        }
    }

    fn layout_labels(&mut self, id: ElementId, uow: &mut UnitOfWork) {
        let Ok(path) = self.edge_path(id) else {
            return;
        };
        let labels = self.edges.get(&id).map(|e| e.label_nodes.clone()).unwrap_or_default();
        for label in labels {
            // Placed by its own offset update once that has run
            if uow.has_pending_action(ActionKey::LabelOffset, Entity::Node(label.node)) {
                continue;
            }
            self.place_label(id, &label, &path, uow);
        }
    }

    /// Moves one label node to where its attachment puts it on `path`
    pub(crate) fn place_label(&mut self, edge: ElementId, label: &LabelNode, path: &Path, uow: &mut UnitOfWork) {
        let Some(node) = self.nodes.get(&label.node) else {
            return;
        };
        let (point, tangent) = path.point_and_tangent_at_time(label.time_offset);
        let center = point + Rot2::from_angle(label_frame_angle(label.placement, tangent)) * label.offset;
        let size = node.bounds.size;
        let bounds = Bounds {
            pos: center - size / 2.0,
            size,
            rotation: label_rotation(label.placement, tangent, label.readable),
        };
        if bounds != node.bounds {
            if let Err(err) = self.apply_node_bounds(label.node, bounds, None, uow, BoundsChange::LabelLayout) {
                log::warn!("Failed to place label {} of edge {edge}: {err}", label.node);
            }
        }
    }

    /// True while any edge draws line hops, which need intersections
    pub fn must_calculate_intersections(&self) -> bool {
        self.edges.values().any(|e| e.props.line_hops != LineHops::None)
    }

    pub(crate) fn queue_intersection_refresh(&mut self, uow: &mut UnitOfWork) {
        uow.push_action(ActionKey::RecalculateIntersections, Entity::Diagram, |d, uow| {
            d.refresh_intersections(uow)
        });
    }

    fn refresh_intersections(&mut self, uow: &mut UnitOfWork) {
        let ids: Vec<ElementId> = self.edges.keys().copied().collect();
        if self.must_calculate_intersections() {
            debug!("Recalculating intersections of {} edges", ids.len());
            for id in ids {
                self.recalculate_intersections(id, uow);
            }
        } else {
            for id in ids {
                if let Some(edge) = self.edges.get_mut(&id) {
                    if !edge.intersections.is_empty() {
                        edge.intersections.clear();
                        uow.update_element(ElementRef::Edge(id));
                    }
                }
            }
        }
    }

    /// Updates the cached crossings of one edge; the edge is only marked
    /// changed when the crossings differ
    fn recalculate_intersections(&mut self, id: ElementId, uow: &mut UnitOfWork) {
        let Some(edge) = self.edges.get(&id) else {
            return;
        };
        let mut found = Vec::new();
        if self.layers.is_visible(edge.layer) {
            let order = self.z_order();
            let own_z = order.iter().position(|e| *e == ElementRef::Edge(id));
            if let Ok(path) = self.edge_path(id) {
                for other in self.edges.values() {
                    if other.id == id || !self.layers.is_visible(other.layer) {
                        continue;
                    }
                    let Ok(other_path) = self.edge_path(other.id) else {
                        continue;
                    };
                    let other_z = order.iter().position(|e| *e == ElementRef::Edge(other.id));
                    let kind = if own_z > other_z {
                        IntersectionKind::Above
                    } else {
                        IntersectionKind::Below
                    };
                    found.extend(
                        path.intersections(&other_path)
                            .into_iter()
                            .map(|point| Intersection { point, kind }),
                    );
                }
            }
        }

        if let Some(edge) = self.edges.get_mut(&id) {
            if edge.intersections != found {
                edge.intersections = found;
                uow.update_element(ElementRef::Edge(id));
            }
        }
    }
}
