/*
 * Perception Module
 *
 * Throttled sight for one agent. Every tick_interval seconds it scans the targets
 * within sight_radius and caches the nearest one that is available, fits the
 * agent's inventory, and lies inside the field of view. Between scans the cached
 * handle is returned unchanged, even if the target has since gone away; the agent
 * re-checks availability itself.
 */

use nannou::prelude::Vec2;

use crate::geometry::normalize_or;
use crate::inventory::Inventory;
use crate::resources::{TargetId, TargetQuery};
use crate::settings::PerceptionSettings;

// Lower bound on the rescan period
const MIN_TICK_INTERVAL: f32 = 0.02;

#[derive(Debug, Clone)]
pub struct Perception {
    pub sight_radius: f32,
    pub fov_half_angle_deg: f32,
    pub tick_interval: f32,
    timer: f32,
    nearest: Option<TargetId>,
    scratch: Vec<TargetId>,
}

impl Default for Perception {
    fn default() -> Self {
        Self::new(&PerceptionSettings::default())
    }
}

impl Perception {
    pub fn new(settings: &PerceptionSettings) -> Self {
        Self {
            sight_radius: settings.sight_radius,
            fov_half_angle_deg: settings.fov_half_angle_deg,
            tick_interval: settings.tick_interval,
            timer: 0.0,
            nearest: None,
            scratch: Vec::new(),
        }
    }

    pub fn nearest(&self) -> Option<TargetId> {
        self.nearest
    }

    pub fn reset(&mut self) {
        self.timer = 0.0;
        self.nearest = None;
    }

    // Count down and rescan when due; `forward` is the agent's facing
    pub fn update(
        &mut self,
        dt: f32,
        position: Vec2,
        forward: Vec2,
        inventory: &Inventory,
        targets: &dyn TargetQuery,
    ) {
        self.timer -= dt;
        if self.timer > 0.0 {
            return;
        }
        self.timer = self.tick_interval.max(MIN_TICK_INTERVAL);
        self.nearest = self.scan(position, forward, inventory, targets);
    }

    /// Nearest acceptable target right now, ignoring the scan cadence.
    pub fn scan(
        &mut self,
        position: Vec2,
        forward: Vec2,
        inventory: &Inventory,
        targets: &dyn TargetQuery,
    ) -> Option<TargetId> {
        self.scratch.clear();
        targets.targets_within(position, self.sight_radius, &mut self.scratch);

        let use_fov = self.fov_half_angle_deg < 180.0 && forward.length_squared() > 1e-6;
        let cos_half = self.fov_half_angle_deg.to_radians().cos();
        let forward = normalize_or(forward, Vec2::ZERO);

        let mut best = None;
        let mut best_d2 = f32::INFINITY;

        for &id in &self.scratch {
            let Some(target) = targets.target(id) else {
                continue;
            };
            if !target.is_available() || !inventory.can_accept(&target.spec()) {
                continue;
            }

            let to = target.position() - position;
            let d2 = to.length_squared();

            if use_fov && d2 > 1e-6 {
                // Outside the cone when the angle to the target exceeds the half angle
                let cos_angle = forward.dot(to) / d2.sqrt();
                if cos_angle < cos_half {
                    continue;
                }
            }

            if d2 < best_d2 {
                best_d2 = d2;
                best = Some(id);
            }
        }

        best
    }
}
