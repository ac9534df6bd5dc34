use egui::{Pos2, Vec2, pos2};
use serde::{Deserialize, Serialize};

use super::Bounds;

/// A single geometric transform applied to element bounds and points
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Transform {
    Translation(Vec2),
    /// Scale factors relative to `origin`
    Scale { origin: Pos2, x: f32, y: f32 },
    /// Rotation in radians around `center`
    Rotation { center: Pos2, angle: f32 },
}

impl Transform {
    pub fn translate(x: f32, y: f32) -> Self {
        Transform::Translation(Vec2::new(x, y))
    }

    pub fn is_non_uniform_scale(&self) -> bool {
        matches!(self, Transform::Scale { x, y, .. } if (x - y).abs() > f32::EPSILON)
    }

    /// Homogeneous 3x3 matrix of the transform.
    ///
    /// In screen space y points down, so the rotation matrix keeps the
    /// usual signs to rotate clockwise for positive angles.
    pub fn to_matrix(&self) -> [[f32; 3]; 3] {
        match *self {
            Transform::Translation(d) => [[1.0, 0.0, d.x], [0.0, 1.0, d.y], [0.0, 0.0, 1.0]],
            Transform::Scale { origin, x, y } => multiply_matrices(
                &[
                    [1.0, 0.0, origin.x],
                    [0.0, 1.0, origin.y],
                    [0.0, 0.0, 1.0],
                ],
                &multiply_matrices(
                    &[[x, 0.0, 0.0], [0.0, y, 0.0], [0.0, 0.0, 1.0]],
                    &[
                        [1.0, 0.0, -origin.x],
                        [0.0, 1.0, -origin.y],
                        [0.0, 0.0, 1.0],
                    ],
                ),
            ),
            Transform::Rotation { center, angle } => {
                let (sin, cos) = angle.sin_cos();
                multiply_matrices(
                    &[
                        [1.0, 0.0, center.x],
                        [0.0, 1.0, center.y],
                        [0.0, 0.0, 1.0],
                    ],
                    &multiply_matrices(
                        &[[cos, -sin, 0.0], [sin, cos, 0.0], [0.0, 0.0, 1.0]],
                        &[
                            [1.0, 0.0, -center.x],
                            [0.0, 1.0, -center.y],
                            [0.0, 0.0, 1.0],
                        ],
                    ),
                )
            }
        }
    }

    pub fn apply_to_point(&self, p: Pos2) -> Pos2 {
        let m = self.to_matrix();
        pos2(
            m[0][0] * p.x + m[0][1] * p.y + m[0][2],
            m[1][0] * p.x + m[1][1] * p.y + m[1][2],
        )
    }

    pub fn apply_to_bounds(&self, b: &Bounds) -> Bounds {
        match *self {
            Transform::Translation(d) => b.translated(d),
            Transform::Scale { origin, x, y } => Bounds {
                pos: origin + Vec2::new((b.pos.x - origin.x) * x, (b.pos.y - origin.y) * y),
                size: Vec2::new(b.size.x * x.abs(), b.size.y * y.abs()),
                rotation: b.rotation,
            },
            Transform::Rotation { angle, .. } => {
                let center = self.apply_to_point(b.center());
                Bounds {
                    pos: center - b.size / 2.0,
                    size: b.size,
                    rotation: b.rotation + angle,
                }
            }
        }
    }

    /// Transforms that take `from` to `to`: scale around the origin of `from`,
    /// then translate, then rotate around the resulting center
    pub fn between(from: &Bounds, to: &Bounds) -> Vec<Transform> {
        let mut transforms = Vec::new();
        if from.size != to.size && from.size.x != 0.0 && from.size.y != 0.0 {
            transforms.push(Transform::Scale {
                origin: from.pos,
                x: to.size.x / from.size.x,
                y: to.size.y / from.size.y,
            });
        }
        if from.pos != to.pos {
            transforms.push(Transform::Translation(to.pos - from.pos));
        }
        if from.rotation != to.rotation {
            transforms.push(Transform::Rotation {
                center: to.center(),
                angle: to.rotation - from.rotation,
            });
        }
        transforms
    }
}

/// Applies every transform in order
pub fn apply_all_to_bounds(transforms: &[Transform], b: &Bounds) -> Bounds {
    transforms.iter().fold(*b, |acc, t| t.apply_to_bounds(&acc))
}

pub fn apply_all_to_point(transforms: &[Transform], p: Pos2) -> Pos2 {
    transforms.iter().fold(p, |acc, t| t.apply_to_point(acc))
}

fn multiply_matrices(a: &[[f32; 3]; 3], b: &[[f32; 3]; 3]) -> [[f32; 3]; 3] {
    let mut result = [[0.0; 3]; 3];
    for (i, row) in result.iter_mut().enumerate() {
        for (j, cell) in row.iter_mut().enumerate() {
            *cell = (0..3).map(|k| a[i][k] * b[k][j]).sum();
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::FRAC_PI_2;

    #[test]
    fn test_scale_bounds() {
        let b = Bounds::new(10.0, 10.0, 20.0, 20.0);
        let t = Transform::Scale {
            origin: pos2(10.0, 10.0),
            x: 2.0,
            y: 3.0,
        };
        assert!(t.is_non_uniform_scale());
        assert_eq!(t.apply_to_bounds(&b), Bounds::new(10.0, 10.0, 40.0, 60.0));
    }

    #[test]
    fn test_rotate_point() {
        let t = Transform::Rotation {
            center: Pos2::ZERO,
            angle: FRAC_PI_2,
        };
        let p = t.apply_to_point(pos2(1.0, 0.0));
        assert!(p.x.abs() < 1e-5);
        assert!((p.y - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_between_reproduces_target() {
        let from = Bounds::new(0.0, 0.0, 10.0, 10.0);
        let to = Bounds::new(5.0, 7.0, 20.0, 30.0).with_rotation(0.5);
        let b = apply_all_to_bounds(&Transform::between(&from, &to), &from);
        assert!((b.pos - to.pos).length() < 1e-3);
        assert!((b.size - to.size).length() < 1e-3);
        assert!((b.rotation - to.rotation).abs() < 1e-5);
    }
}
