use egui::{Pos2, Rect, Vec2, emath::Rot2, pos2};
use serde::{Deserialize, Serialize};

/// Box with a rotation around its own center.
///
/// `pos` is the top-left corner of the unrotated box.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub pos: Pos2,
    pub size: Vec2,
    /// Rotation in radians
    #[serde(default)]
    pub rotation: f32,
}

impl Default for Bounds {
    fn default() -> Self {
        Self {
            pos: Pos2::ZERO,
            size: Vec2::ZERO,
            rotation: 0.0,
        }
    }
}

impl Bounds {
    pub fn new(x: f32, y: f32, w: f32, h: f32) -> Self {
        Self {
            pos: pos2(x, y),
            size: Vec2::new(w, h),
            rotation: 0.0,
        }
    }

    pub fn with_rotation(mut self, rotation: f32) -> Self {
        self.rotation = rotation;
        self
    }

    pub fn center(&self) -> Pos2 {
        self.pos + self.size / 2.0
    }

    /// The box ignoring rotation
    pub fn unrotated_rect(&self) -> Rect {
        Rect::from_min_size(self.pos, self.size)
    }

    /// Maps a point given relative to the box (0..1 on both axes) into world space
    pub fn local_to_world(&self, relative: Pos2) -> Pos2 {
        let p = self.pos + Vec2::new(relative.x * self.size.x, relative.y * self.size.y);
        if self.rotation == 0.0 {
            return p;
        }
        let c = self.center();
        c + Rot2::from_angle(self.rotation) * (p - c)
    }

    /// Inverse of [`Bounds::local_to_world`]
    pub fn world_to_local(&self, point: Pos2) -> Pos2 {
        let c = self.center();
        let p = if self.rotation == 0.0 {
            point
        } else {
            c + Rot2::from_angle(-self.rotation) * (point - c)
        };
        let rel = p - self.pos;
        pos2(
            if self.size.x == 0.0 { 0.0 } else { rel.x / self.size.x },
            if self.size.y == 0.0 { 0.0 } else { rel.y / self.size.y },
        )
    }

    /// Corners in world space, clockwise from the top-left
    pub fn corners(&self) -> [Pos2; 4] {
        [
            self.local_to_world(pos2(0.0, 0.0)),
            self.local_to_world(pos2(1.0, 0.0)),
            self.local_to_world(pos2(1.0, 1.0)),
            self.local_to_world(pos2(0.0, 1.0)),
        ]
    }

    /// Axis aligned rectangle enclosing the rotated box
    pub fn aabb(&self) -> Rect {
        Rect::from_points(&self.corners())
    }

    /// Axis aligned union of several boxes, `None` for an empty input
    pub fn union<'a>(bounds: impl IntoIterator<Item = &'a Bounds>) -> Option<Bounds> {
        let mut acc: Option<Rect> = None;
        for b in bounds {
            let r = b.aabb();
            acc = Some(match acc {
                Some(a) => a.union(r),
                None => r,
            });
        }
        acc.map(Bounds::from_rect)
    }

    pub fn from_rect(rect: Rect) -> Self {
        Self {
            pos: rect.min,
            size: rect.size(),
            rotation: 0.0,
        }
    }

    pub fn from_points(points: &[Pos2]) -> Self {
        if points.is_empty() {
            return Self::default();
        }
        Self::from_rect(Rect::from_points(points))
    }

    pub fn contains(&self, other: &Bounds) -> bool {
        self.aabb().contains_rect(other.aabb())
    }

    pub fn translated(&self, delta: Vec2) -> Self {
        Self {
            pos: self.pos + delta,
            ..*self
        }
    }
}
