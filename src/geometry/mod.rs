//! Geometry values consumed by the element graph: boxes with rotation,
//! transforms and polyline paths.

mod bounds;
mod path;
mod transform;

pub use bounds::Bounds;
pub use path::{Path, PathProjection, closest_point_on_segment, segment_intersection};
pub use transform::{Transform, apply_all_to_bounds, apply_all_to_point};
