use egui::{Pos2, Vec2};

/// Number of line segments a cubic curve is flattened into
const CURVE_SEGMENTS: usize = 16;

/// Polyline path through a sequence of points
#[derive(Debug, Clone, PartialEq)]
pub struct Path {
    points: Vec<Pos2>,
}

/// Nearest position on a path to some point
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PathProjection {
    /// Path-length offset of the projected point
    pub offset: f32,
    pub point: Pos2,
    pub distance: f32,
}

impl Path {
    pub fn new(points: Vec<Pos2>) -> Self {
        Self { points }
    }

    pub fn points(&self) -> &[Pos2] {
        &self.points
    }

    /// Appends a cubic bezier from the current end point, flattened into segments
    pub fn cubic_to(&mut self, cp1: Pos2, cp2: Pos2, end: Pos2) {
        let Some(&start) = self.points.last() else {
            self.points.push(end);
            return;
        };
        for i in 1..=CURVE_SEGMENTS {
            let t = i as f32 / CURVE_SEGMENTS as f32;
            let mt = 1.0 - t;
            let p = start.to_vec2() * (mt * mt * mt)
                + cp1.to_vec2() * (3.0 * mt * mt * t)
                + cp2.to_vec2() * (3.0 * mt * t * t)
                + end.to_vec2() * (t * t * t);
            self.points.push(p.to_pos2());
        }
    }

    pub fn line_to(&mut self, p: Pos2) {
        self.points.push(p);
    }

    pub fn length(&self) -> f32 {
        self.points.windows(2).map(|w| w[0].distance(w[1])).sum()
    }

    /// Point and unit tangent at a path-length offset, clamped to the path
    pub fn point_and_tangent_at(&self, offset: f32) -> (Pos2, Vec2) {
        match self.points.len() {
            0 => return (Pos2::ZERO, Vec2::X),
            1 => return (self.points[0], Vec2::X),
            _ => {}
        }
        let mut remaining = offset.max(0.0);
        for w in self.points.windows(2) {
            let len = w[0].distance(w[1]);
            if remaining <= len && len > 0.0 {
                let dir = (w[1] - w[0]) / len;
                return (w[0] + dir * remaining, dir);
            }
            remaining -= len;
        }
        let n = self.points.len();
        let last = self.points[n - 1];
        let dir = (last - self.points[n - 2]).normalized();
        (last, if dir.is_finite() { dir } else { Vec2::X })
    }

    /// Point and tangent at a path-time (fraction of the total length)
    pub fn point_and_tangent_at_time(&self, t: f32) -> (Pos2, Vec2) {
        self.point_and_tangent_at(t.clamp(0.0, 1.0) * self.length())
    }

    pub fn project(&self, point: Pos2) -> PathProjection {
        let mut best = PathProjection {
            offset: 0.0,
            point: self.points.first().copied().unwrap_or(Pos2::ZERO),
            distance: f32::INFINITY,
        };
        let mut walked = 0.0;
        for w in self.points.windows(2) {
            let (p, t) = closest_point_on_segment(point, w[0], w[1]);
            let d = p.distance(point);
            let len = w[0].distance(w[1]);
            if d < best.distance {
                best = PathProjection {
                    offset: walked + t * len,
                    point: p,
                    distance: d,
                };
            }
            walked += len;
        }
        if best.distance.is_infinite() {
            best.distance = best.point.distance(point);
        }
        best
    }

    /// All crossings between this path and `other`
    pub fn intersections(&self, other: &Path) -> Vec<Pos2> {
        let mut result: Vec<Pos2> = Vec::new();
        for a in self.points.windows(2) {
            for b in other.points.windows(2) {
                if let Some(p) = segment_intersection(a[0], a[1], b[0], b[1]) {
                    // Crossings at a shared vertex show up on both adjacent segments
                    if !result.iter().any(|q| q.distance(p) < 1e-3) {
                        result.push(p);
                    }
                }
            }
        }
        result
    }

    /// First crossing of the segment `from -> to` with the closed polygon `outline`,
    /// i.e. the crossing nearest to `to`
    pub fn clip_to_outline(from: Pos2, to: Pos2, outline: &[Pos2]) -> Option<Pos2> {
        let n = outline.len();
        (0..n)
            .filter_map(|i| segment_intersection(from, to, outline[i], outline[(i + 1) % n]))
            .min_by(|a, b| a.distance(to).total_cmp(&b.distance(to)))
    }
}

/// Closest point on the segment and its parameter in `[0, 1]`
pub fn closest_point_on_segment(point: Pos2, start: Pos2, end: Pos2) -> (Pos2, f32) {
    let line_vec = end - start;
    let len_sq = line_vec.length_sq();
    if len_sq == 0.0 {
        return (start, 0.0);
    }
    let t = ((point - start).dot(line_vec) / len_sq).clamp(0.0, 1.0);
    (start + line_vec * t, t)
}

pub fn segment_intersection(a0: Pos2, a1: Pos2, b0: Pos2, b1: Pos2) -> Option<Pos2> {
    let r = a1 - a0;
    let s = b1 - b0;
    let denom = r.x * s.y - r.y * s.x;
    if denom.abs() < f32::EPSILON {
        return None;
    }
    let qp = b0 - a0;
    let t = (qp.x * s.y - qp.y * s.x) / denom;
    let u = (qp.x * r.y - qp.y * r.x) / denom;
    if (0.0..=1.0).contains(&t) && (0.0..=1.0).contains(&u) {
        Some(a0 + r * t)
    } else {
        None
    }
}
