/*
 * Geometry Module
 *
 * Collision and steering primitives shared by every anchor interaction:
 * - Swept segment/circle intersection (earliest hit along a tick's motion)
 * - Boundary-layer steering around a circular obstacle
 * - Small vector helpers that guard against near-zero lengths
 */

use nannou::prelude::{vec2, Vec2};
use rand::Rng;

// Squared-length threshold below which a vector has no usable direction
pub const DIRECTION_EPSILON: f32 = 1e-6;

/// A circular obstacle; the anchor is the only one the simulation models.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CircleObstacle {
    pub centre: Vec2,
    pub radius: f32,
}

impl CircleObstacle {
    pub fn new(centre: Vec2, radius: f32) -> Self {
        Self { centre, radius }
    }
}

/// Where a segment first meets a circle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SegmentHit {
    /// Parametric position along the segment, in [0, 1].
    pub t: f32,
    pub point: Vec2,
}

/// Earliest intersection of the segment `p0 -> p1` with the circle.
///
/// Solves `|p0 + t(p1 - p0) - c|^2 = r^2` and keeps the smallest root in [0, 1].
/// Degenerate segments and misses report `None`.
pub fn segment_circle_hit(p0: Vec2, p1: Vec2, centre: Vec2, radius: f32) -> Option<SegmentHit> {
    let d = p1 - p0;
    let f = p0 - centre;

    let a = d.dot(d);
    let b = 2.0 * f.dot(d);
    let c = f.dot(f) - radius * radius;

    let discriminant = b * b - 4.0 * a * c;
    if discriminant < 0.0 || a < 1e-12 {
        return None;
    }

    let root = discriminant.sqrt();
    let t1 = (-b - root) / (2.0 * a);
    let t2 = (-b + root) / (2.0 * a);

    let in_range = |t: f32| (0.0..=1.0).contains(&t);
    let t = match (in_range(t1), in_range(t2)) {
        (true, true) => t1.min(t2),
        (true, false) => t1,
        (false, true) => t2,
        (false, false) => return None,
    };

    Some(SegmentHit { t, point: p0 + d * t })
}

/// Avoidance acceleration inside a band just outside the obstacle rim.
///
/// The outward push and the tangential slide both ramp up with a smoothstep of the
/// depth into the band: zero at the band's outer edge, full strength at the rim.
/// The slide keeps the sign of the current velocity along the tangent.
pub fn boundary_layer_steering(
    obstacle: CircleObstacle,
    position: Vec2,
    velocity: Vec2,
    band: f32,
    k_normal: f32,
    k_tangent: f32,
) -> Vec2 {
    if band <= 0.0 {
        return Vec2::ZERO;
    }

    let to = position - obstacle.centre;
    let dist = to.length();
    if dist <= 1e-6 {
        return Vec2::ZERO;
    }

    let outer_edge = obstacle.radius + band;
    if dist >= outer_edge {
        return Vec2::ZERO;
    }

    let normal = to / dist;
    let depth = outer_edge - dist;
    let w = smoothstep((depth / band).clamp(0.0, 1.0));

    let push = normal * (k_normal * w);

    let tangent = perp(normal);
    let slide = tangent * (k_tangent * w * sign_or_positive(tangent.dot(velocity)));

    push + slide
}

// Cubic Hermite ramp on an already clamped input
#[inline]
pub fn smoothstep(x: f32) -> f32 {
    x * x * (3.0 - 2.0 * x)
}

// Counter-clockwise perpendicular
#[inline]
pub fn perp(v: Vec2) -> Vec2 {
    vec2(-v.y, v.x)
}

// Sign that never returns zero, so a stalled agent still picks a slide direction
#[inline]
pub fn sign_or_positive(x: f32) -> f32 {
    if x < 0.0 {
        -1.0
    } else {
        1.0
    }
}

/// Rotate `v` counter-clockwise by `radians`.
pub fn rotate(v: Vec2, radians: f32) -> Vec2 {
    let (s, c) = radians.sin_cos();
    vec2(v.x * c - v.y * s, v.x * s + v.y * c)
}

/// Signed angle in radians that takes `from` onto `to`, in (-PI, PI].
pub fn signed_angle(from: Vec2, to: Vec2) -> f32 {
    let cross = from.x * to.y - from.y * to.x;
    cross.atan2(from.dot(to))
}

/// Unit vector along `v`, or `fallback` when `v` is too short to have a direction.
pub fn normalize_or(v: Vec2, fallback: Vec2) -> Vec2 {
    let len_sq = v.length_squared();
    if len_sq > DIRECTION_EPSILON * DIRECTION_EPSILON {
        v / len_sq.sqrt()
    } else {
        fallback
    }
}

/// Uniform sample from the unit disc.
pub fn random_in_unit_circle<R: Rng + ?Sized>(rng: &mut R) -> Vec2 {
    loop {
        let p = vec2(rng.gen_range(-1.0..=1.0), rng.gen_range(-1.0..=1.0));
        if p.length_squared() <= 1.0 {
            return p;
        }
    }
}

/// Random angle in radians within `[-half_range_deg, half_range_deg]`.
pub fn random_angle<R: Rng + ?Sized>(rng: &mut R, half_range_deg: f32) -> f32 {
    let half = half_range_deg.abs().to_radians();
    rng.gen_range(-half..=half)
}
