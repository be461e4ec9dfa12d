//! Planar geometry helpers.
//!
//! World space is z-up. Navigation and steering mostly work on the (x, y)
//! projection, so these helpers drop or ignore the z component.

use glam::{Vec2, Vec3};

/// Tolerance used by the planar predicates.
pub const GEOMETRY_EPSILON: f32 = 1e-4;

/// Projects a world position onto the horizontal plane.
#[must_use]
pub fn planar(v: Vec3) -> Vec2 {
    Vec2::new(v.x, v.y)
}

/// Returns the vector with its z component zeroed.
#[must_use]
pub fn flatten(v: Vec3) -> Vec3 {
    Vec3::new(v.x, v.y, 0.0)
}

/// Horizontal length of a vector.
#[must_use]
pub fn planar_length(v: Vec3) -> f32 {
    planar(v).length()
}

/// Horizontal distance between two points.
#[must_use]
pub fn planar_distance(a: Vec3, b: Vec3) -> f32 {
    planar(a).distance(planar(b))
}

/// Squared horizontal distance between two points.
#[must_use]
pub fn planar_distance_squared(a: Vec3, b: Vec3) -> f32 {
    planar(a).distance_squared(planar(b))
}

/// Normalized horizontal direction, or `None` for a (near) vertical or zero vector.
#[must_use]
pub fn planar_direction(v: Vec3) -> Option<Vec3> {
    let flat = flatten(v);
    let len = flat.length();
    (len > GEOMETRY_EPSILON).then(|| flat / len)
}

/// Horizontal perpendicular (rotated +90 degrees about z).
#[must_use]
pub fn perpendicular(v: Vec3) -> Vec3 {
    Vec3::new(-v.y, v.x, 0.0)
}

/// Rotates a vector about the z axis.
#[must_use]
pub fn rotate_z(v: Vec3, angle: f32) -> Vec3 {
    let (sin, cos) = angle.sin_cos();
    Vec3::new(v.x * cos - v.y * sin, v.x * sin + v.y * cos, v.z)
}

/// Unsigned horizontal angle between two directions, in radians.
#[must_use]
pub fn planar_angle_between(a: Vec3, b: Vec3) -> f32 {
    match (planar_direction(a), planar_direction(b)) {
        (Some(a), Some(b)) => a.dot(b).clamp(-1.0, 1.0).acos(),
        _ => 0.0,
    }
}

/// 2D cross product (z of the 3D cross product).
#[must_use]
pub fn cross2(a: Vec2, b: Vec2) -> f32 {
    a.x * b.y - a.y * b.x
}

/// Intersects segment `p0..p1` with segment `q0..q1`.
///
/// Returns the parameters `(t, u)` along each segment, both within
/// `[0, 1]` (with a small tolerance). Parallel segments never intersect.
#[must_use]
pub fn segment_intersection(p0: Vec2, p1: Vec2, q0: Vec2, q1: Vec2) -> Option<(f32, f32)> {
    let r = p1 - p0;
    let s = q1 - q0;
    let denom = cross2(r, s);
    if denom.abs() < GEOMETRY_EPSILON * GEOMETRY_EPSILON {
        return None;
    }
    let qp = q0 - p0;
    let t = cross2(qp, s) / denom;
    let u = cross2(qp, r) / denom;
    let range = -GEOMETRY_EPSILON..=1.0 + GEOMETRY_EPSILON;
    (range.contains(&t) && range.contains(&u)).then_some((t.clamp(0.0, 1.0), u.clamp(0.0, 1.0)))
}

/// Closest point to `p` on segment `a..b`.
#[must_use]
pub fn closest_point_on_segment(p: Vec2, a: Vec2, b: Vec2) -> Vec2 {
    let ab = b - a;
    let len_sq = ab.length_squared();
    if len_sq <= f32::EPSILON {
        return a;
    }
    let t = ((p - a).dot(ab) / len_sq).clamp(0.0, 1.0);
    a + ab * t
}
