/*
 * Anchor Module
 *
 * The circular home structure. Agents forage around it, are kept out of it by
 * swept collision, and deposit carried bits when they touch its rim.
 */

use nannou::prelude::Vec2;

use crate::geometry::CircleObstacle;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Anchor {
    pub position: Vec2,
    // World-space radius to the outer edge of the ring
    pub outer_radius: f32,
}

impl Anchor {
    pub fn new(position: Vec2, outer_radius: f32) -> Self {
        Self {
            position,
            outer_radius,
        }
    }

    pub fn obstacle(&self) -> CircleObstacle {
        CircleObstacle::new(self.position, self.outer_radius)
    }

    pub fn distance_to(&self, point: Vec2) -> f32 {
        (point - self.position).length()
    }
}
