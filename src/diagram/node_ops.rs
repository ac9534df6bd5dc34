use std::f32::consts::FRAC_PI_2;

use egui::{Pos2, Vec2, emath::Rot2};
use log::{debug, trace};

use super::Diagram;
use crate::element::{Anchor, ChildPolicy, EdgeEnd, ElementRef, Endpoint, LabelPlacement, NodeProps};
use crate::error::{DiagramError, DiagramResult};
use crate::geometry::{Bounds, Transform, apply_all_to_bounds};
use crate::id_generator::ElementId;
use crate::uow::{ActionKey, Entity, UnitOfWork};

/// What caused a bounds change; decides which reactions follow it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum BoundsChange {
    /// Requested by a caller
    Direct,
    /// The parent moved and took its children along
    FromParent,
    /// A group or container refitted itself around its children
    FromChildren,
    /// The owning edge placed its label
    LabelLayout,
}

impl Diagram {
    /// Applies `transforms` in order to every node in `ids`, including
    /// children that follow their parent
    pub fn transform_nodes(
        &mut self,
        ids: &[ElementId],
        transforms: &[Transform],
        uow: &mut UnitOfWork,
    ) -> DiagramResult<()> {
        for id in ids {
            self.node(*id)?;
        }
        for id in ids {
            self.transform_node(*id, transforms, uow, BoundsChange::Direct)?;
        }
        Ok(())
    }

    /// Moves and resizes a node to exactly `bounds`
    pub fn set_node_bounds(&mut self, id: ElementId, bounds: Bounds, uow: &mut UnitOfWork) -> DiagramResult<()> {
        let from = self.node(id)?.bounds;
        let transforms = Transform::between(&from, &bounds);
        self.apply_node_bounds(id, bounds, Some(&transforms), uow, BoundsChange::Direct)
    }

    pub(crate) fn transform_node(
        &mut self,
        id: ElementId,
        transforms: &[Transform],
        uow: &mut UnitOfWork,
        change: BoundsChange,
    ) -> DiagramResult<()> {
        let bounds = apply_all_to_bounds(transforms, &self.node(id)?.bounds);
        self.apply_node_bounds(id, bounds, Some(transforms), uow, change)
    }

    /// Sets the bounds of a node and requests every reaction to it.
    ///
    /// `child_transforms` are forwarded to the children when the node type
    /// lets children follow; `None` leaves the children in place.
    pub(crate) fn apply_node_bounds(
        &mut self,
        id: ElementId,
        bounds: Bounds,
        child_transforms: Option<&[Transform]>,
        uow: &mut UnitOfWork,
        change: BoundsChange,
    ) -> DiagramResult<()> {
        uow.snapshot(self, Entity::Node(id));
        let node = self.node_mut(id)?;
        let old = node.bounds;
        node.bounds = bounds;
        let node_type = node.node_type.clone();
        let parent = node.parent;
        let children = node.children.clone();
        let label_for = node.props.label_for_edge_id;
        let connected = node.connected_edges();
        trace!("Node {id} bounds {:?} -> {:?} ({change:?})", old.pos, bounds.pos);

        if let Some(transforms) = child_transforms.filter(|t| !t.is_empty()) {
            let follow = match self.registry().get(&node_type)?.child_policy() {
                ChildPolicy::Leaf => false,
                ChildPolicy::Group => true,
                ChildPolicy::Container => !transforms.iter().any(Transform::is_non_uniform_scale),
            };
            if follow {
                for child in children {
                    match child {
                        ElementRef::Node(c) => self.transform_node(c, transforms, uow, BoundsChange::FromParent)?,
                        ElementRef::Edge(e) => self.transform_edge(e, transforms, uow, BoundsChange::FromParent)?,
                    }
                }
            }
        }

        if let Some(parent) = parent {
            if change != BoundsChange::FromParent {
                self.queue_notify_parent(parent, uow);
            }
        }

        // The edge layout leaves the label alone while this action is pending,
        // so the live center minus `origin` is only what the label was moved by
        if let Some(edge) = label_for {
            if change != BoundsChange::LabelLayout {
                let origin = old.center();
                let derive = !uow.is_updated(ElementRef::Edge(edge));
                uow.push_action(ActionKey::LabelOffset, Entity::Node(id), move |d, uow| {
                    d.update_label_offset(edge, id, derive.then_some(origin), uow)
                });
            }
        }

        self.queue_anchor_recompute(id, uow);
        for edge in connected {
            self.queue_edge_invalidation(edge, uow);
        }
        uow.update_element(ElementRef::Node(id));
        Ok(())
    }

    /// Changes the properties of a node. `f` edits a draft which is
    /// validated against the node type's schema before it is applied.
    pub fn update_node_props(
        &mut self,
        id: ElementId,
        uow: &mut UnitOfWork,
        f: impl FnOnce(&mut NodeProps, &mut UnitOfWork),
    ) -> DiagramResult<()> {
        let node = self.node(id)?;
        let mut draft = node.props.clone();
        let label_for = node.props.label_for_edge_id;
        let definition = self.registry().get(&node.node_type)?;
        f(&mut draft, uow);
        draft.validate(definition.schema())?;
        if draft.label_for_edge_id != label_for {
            return Err(DiagramError::InvalidProperty {
                key: "labelForEdgeId".to_string(),
                reason: "label links are changed through attach_label_node".to_string(),
            });
        }

        uow.snapshot(self, Entity::Node(id));
        let node = self.node_mut(id)?;
        node.props = draft;
        let connected = node.connected_edges();
        uow.update_element(ElementRef::Node(id));
        self.queue_anchor_recompute(id, uow);
        for edge in connected {
            self.queue_edge_invalidation(edge, uow);
        }
        Ok(())
    }

    pub(crate) fn queue_anchor_recompute(&mut self, id: ElementId, uow: &mut UnitOfWork) {
        uow.push_action(ActionKey::RecomputeAnchors, Entity::Node(id), move |d, uow| {
            d.recompute_anchors(id, uow)
        });
    }

    pub(crate) fn queue_notify_parent(&mut self, parent: ElementId, uow: &mut UnitOfWork) {
        uow.push_action(ActionKey::NotifyParent, Entity::Node(parent), move |d, uow| {
            d.on_child_changed(parent, uow)
        });
    }

    /// Rebuilds the anchor list of a node. Edges attached to an anchor that
    /// moved or disappeared are reattached to the closest new anchor.
    fn recompute_anchors(&mut self, id: ElementId, uow: &mut UnitOfWork) {
        let Some(node) = self.nodes.get(&id) else {
            return;
        };
        let Ok(definition) = self.registry().get(&node.node_type) else {
            return;
        };
        let anchors = definition.anchors(&node.bounds, &node.props, self.config().anchor_precision);
        if anchors == node.anchors {
            return;
        }

        let previous = node.anchors.clone();
        let attached: Vec<(usize, Vec<ElementId>)> = node
            .edges
            .iter()
            .map(|(anchor, edges)| (*anchor, edges.iter().copied().collect()))
            .collect();

        uow.snapshot(self, Entity::Node(id));
        if let Some(node) = self.nodes.get_mut(&id) {
            node.anchors = anchors.clone();
        }
        uow.update_element(ElementRef::Node(id));

        for (old_index, edges) in attached {
            let target = previous
                .get(old_index)
                .and_then(|a| closest_anchor(&anchors, a))
                .unwrap_or(0);
            if target == old_index {
                continue;
            }
            debug!("Node {id}: reattaching edges from anchor {old_index} to {target}");
            for edge in edges {
                for end in [EdgeEnd::Start, EdgeEnd::End] {
                    let attached_here = self
                        .edges
                        .get(&edge)
                        .is_some_and(|e| e.endpoint(end).references(id, old_index));
                    if attached_here {
                        let endpoint = Endpoint::connected(id, target);
                        if let Err(err) = self.set_endpoint(edge, end, endpoint, uow) {
                            log::warn!("Failed to reattach edge {edge}: {err}");
                        }
                    }
                }
            }
        }
    }

    /// Lets a group or container react to a change of one of its children
    fn on_child_changed(&mut self, parent: ElementId, uow: &mut UnitOfWork) {
        let Some(node) = self.nodes.get(&parent) else {
            return;
        };
        let Ok(definition) = self.registry().get(&node.node_type) else {
            return;
        };
        let policy = definition.child_policy();
        if policy == ChildPolicy::Leaf || node.bounds.rotation != 0.0 {
            return;
        }

        let mut child_bounds: Vec<Bounds> = node
            .children
            .iter()
            .filter_map(|c| self.element_bounds(*c).ok())
            .map(|b| Bounds::from_rect(b.aabb()))
            .collect();
        let current = node.bounds;
        if policy == ChildPolicy::Container {
            child_bounds.push(current);
        }
        let Some(fitted) = Bounds::union(&child_bounds) else {
            return;
        };

        if fitted != current {
            debug!("Refitting {parent} to its children");
            if let Err(err) = self.apply_node_bounds(parent, fitted, None, uow, BoundsChange::FromChildren) {
                log::warn!("Failed to refit {parent}: {err}");
            }
        }
    }

    /// Turns a direct move of a label node into a new offset on its edge,
    /// then places the label for that offset.
    ///
    /// With `origin` unset the edge itself was changed first and the label
    /// is only placed back onto it.
    fn update_label_offset(
        &mut self,
        edge: ElementId,
        label: ElementId,
        origin: Option<Pos2>,
        uow: &mut UnitOfWork,
    ) {
        let Some(mut attachment) = self.edges.get(&edge).and_then(|e| e.label_node(label)).copied() else {
            return;
        };
        let Ok(path) = self.edge_path(edge) else {
            return;
        };
        let delta = match (origin, self.nodes.get(&label)) {
            (Some(origin), Some(node)) => node.bounds.center() - origin,
            _ => Vec2::ZERO,
        };

        if delta != Vec2::ZERO {
            let (_, tangent) = path.point_and_tangent_at_time(attachment.time_offset);
            let frame = label_frame_angle(attachment.placement, tangent);
            let mut offset = attachment.offset + Rot2::from_angle(-frame) * delta;
            let max = self.config().max_label_offset;
            if offset.length() > max {
                offset = offset.normalized() * max;
            }

            uow.snapshot(self, Entity::Edge(edge));
            if let Some(l) = self
                .edges
                .get_mut(&edge)
                .and_then(|e| e.label_nodes.iter_mut().find(|l| l.node == label))
            {
                l.offset = offset;
            }
            uow.update_element(ElementRef::Edge(edge));
            attachment.offset = offset;
        }
        self.place_label(edge, &attachment, &path, uow);
    }
}

/// Angle of the frame a label offset is expressed in
pub(crate) fn label_frame_angle(placement: LabelPlacement, tangent: Vec2) -> f32 {
    match placement {
        LabelPlacement::Parallel | LabelPlacement::Perpendicular => tangent.angle(),
        LabelPlacement::Horizontal | LabelPlacement::Vertical => 0.0,
    }
}

/// Rotation of a label node for its placement
pub(crate) fn label_rotation(placement: LabelPlacement, tangent: Vec2, readable: bool) -> f32 {
    let rotation = match placement {
        LabelPlacement::Parallel => tangent.angle(),
        LabelPlacement::Perpendicular => tangent.angle() + FRAC_PI_2,
        LabelPlacement::Horizontal => 0.0,
        LabelPlacement::Vertical => -FRAC_PI_2,
    };
    let rotation = normalize_angle(rotation);
    if readable && (rotation > FRAC_PI_2 + 1e-4 || rotation < -FRAC_PI_2 - 1e-4) {
        normalize_angle(rotation + std::f32::consts::PI)
    } else {
        rotation
    }
}

/// Maps an angle into `(-PI, PI]`
fn normalize_angle(angle: f32) -> f32 {
    use std::f32::consts::{PI, TAU};
    let a = angle.rem_euclid(TAU);
    if a > PI { a - TAU } else { a }
}

/// Index of the anchor in `anchors` closest to `anchor`, preferring the same clip mode
fn closest_anchor(anchors: &[Anchor], anchor: &Anchor) -> Option<usize> {
    anchors
        .iter()
        .enumerate()
        .map(|(i, a)| {
            let penalty = if a.clip == anchor.clip { 0.0 } else { 10.0 };
            (i, a.point.distance(anchor.point) + penalty)
        })
        .min_by(|a, b| a.1.total_cmp(&b.1))
        .map(|(i, _)| i)
}
