/*
 * Phospher Module
 *
 * One foraging agent: a four-state behaviour machine on top of a steering
 * integrator.
 * - Forage: wander and flock, slide along the anchor rim on contact
 * - Seek: steer at a perceived bit with damped flocking
 * - Return: head home and deposit on touching the rim
 * - Recover: failsafe that pushes an agent found inside the anchor back out
 *
 * Each tick the steering terms are summed into an acceleration, clamped, turned
 * at a bounded rate, and integrated. The anchor is handled by swept collision
 * along the tick's whole motion segment, so fast agents can't tunnel through it.
 */

use std::f32::consts::PI;
use std::fmt;
use std::sync::Arc;

use nannou::prelude::{vec2, Vec2};
use rand::rngs::SmallRng;
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::anchor::Anchor;
use crate::events::SimEvent;
use crate::field::VectorField;
use crate::geometry::{
    boundary_layer_steering, normalize_or, perp, random_angle, random_in_unit_circle, rotate,
    segment_circle_hit, sign_or_positive, signed_angle, SegmentHit,
};
use crate::inventory::Inventory;
use crate::ledger::ResourceLedger;
use crate::perception::Perception;
use crate::resources::{BitSpec, TargetId, TargetQuery};
use crate::settings::{ReturnExitPolicy, SimulationSettings};
use crate::swarm::{AgentId, Neighbour, NeighbourQuery};

// Cool-off applied after a deposit that sends the agent back to Forage
const POST_DEPOSIT_SUPPRESS_SECONDS: f32 = 0.15;
// Floor on the speed an agent leaves a rim contact with
const MIN_EXIT_SPEED: f32 = 0.01;
// Recover scales its push-out velocity from this fraction of max speed
const RECOVER_MIN_SPEED_FRACTION: f32 = 0.6;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum AgentState {
    #[default]
    Forage,
    Seek,
    Return,
    Recover,
}

impl fmt::Display for AgentState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AgentState::Forage => "Forage",
            AgentState::Seek => "Seek",
            AgentState::Return => "Return",
            AgentState::Recover => "Recover",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    Alive,
    /// Lifetime ran out; the owner removes the agent.
    Expired,
}

/// Collaborators an agent reads (and the ledger/event queue it writes) for one tick.
pub struct StepContext<'a> {
    pub anchor: Option<&'a Anchor>,
    pub field: Option<&'a dyn VectorField>,
    pub neighbours: &'a dyn NeighbourQuery,
    pub targets: &'a dyn TargetQuery,
    pub ledger: &'a mut dyn ResourceLedger,
    pub events: &'a mut Vec<SimEvent>,
}

pub struct Phospher {
    id: AgentId,
    settings: Arc<SimulationSettings>,

    position: Vec2,
    velocity: Vec2,
    // Radians, follows velocity
    heading: f32,

    state: AgentState,
    resume_state: AgentState,

    lifetime_remaining: Option<f32>,
    recover_timer: f32,
    suppress_steering_timer: f32,

    inventory: Inventory,
    perception: Perception,
    seek_target: Option<TargetId>,

    rng: SmallRng,
    neighbours: Vec<Neighbour>,
}

impl Phospher {
    pub fn new(id: AgentId, settings: Arc<SimulationSettings>, position: Vec2, mut rng: SmallRng) -> Self {
        let p = &settings.phospher;

        let lifetime_remaining = if p.use_lifetime {
            let (lo, hi) = p.lifetime_seconds_range;
            Some(if hi > lo { rng.gen_range(lo..=hi) } else { lo })
        } else {
            None
        };

        // Start slow in a random direction
        let direction = rotate(vec2(1.0, 0.0), rng.gen_range(-PI..PI));
        let velocity = direction * (0.5 * p.max_speed.min(1.0));

        let inventory = Inventory::new(settings.inventory.max_weight, settings.inventory.max_count_per_type);
        let perception = Perception::new(&settings.perception);

        Self {
            id,
            position,
            velocity,
            heading: velocity.y.atan2(velocity.x),
            state: AgentState::Forage,
            resume_state: AgentState::Forage,
            lifetime_remaining,
            recover_timer: 0.0,
            suppress_steering_timer: 0.0,
            inventory,
            perception,
            seek_target: None,
            rng,
            neighbours: Vec::new(),
            settings,
        }
    }

    pub fn id(&self) -> AgentId {
        self.id
    }

    pub fn settings(&self) -> &SimulationSettings {
        &self.settings
    }

    pub fn position(&self) -> Vec2 {
        self.position
    }

    pub fn velocity(&self) -> Vec2 {
        self.velocity
    }

    pub fn heading(&self) -> f32 {
        self.heading
    }

    pub fn state(&self) -> AgentState {
        self.state
    }

    pub fn resume_state(&self) -> AgentState {
        self.resume_state
    }

    pub fn inventory(&self) -> &Inventory {
        &self.inventory
    }

    pub fn perception(&self) -> &Perception {
        &self.perception
    }

    pub fn seek_target(&self) -> Option<TargetId> {
        self.seek_target
    }

    pub fn lifetime_remaining(&self) -> Option<f32> {
        self.lifetime_remaining
    }

    pub fn recover_timer(&self) -> f32 {
        self.recover_timer
    }

    pub fn suppress_steering_timer(&self) -> f32 {
        self.suppress_steering_timer
    }

    // Teleport; used by spawn placement and tests
    pub fn set_position(&mut self, position: Vec2) {
        self.position = position;
    }

    /// Override the remaining lifetime; `None` makes the agent immortal.
    pub fn set_lifetime_remaining(&mut self, remaining: Option<f32>) {
        self.lifetime_remaining = remaining;
    }

    pub fn set_velocity(&mut self, velocity: Vec2) {
        self.velocity = velocity;
        self.update_heading();
    }

    /// Advance the agent by `dt` seconds.
    pub fn step(&mut self, dt: f32, ctx: &mut StepContext<'_>) -> StepOutcome {
        if let Some(remaining) = self.lifetime_remaining.as_mut() {
            *remaining -= dt;
            if *remaining <= 0.0 {
                return StepOutcome::Expired;
            }
        }

        self.suppress_steering_timer = (self.suppress_steering_timer - dt).max(0.0);

        let forward = vec2(self.heading.cos(), self.heading.sin());
        self.perception
            .update(dt, self.position, forward, &self.inventory, ctx.targets);

        if self.state != AgentState::Recover && self.state != AgentState::Return {
            self.update_targeting(ctx);
        }

        self.step_kinematics(dt, ctx);
        StepOutcome::Alive
    }

    // Perception-driven Forage <-> Seek transitions
    fn update_targeting(&mut self, ctx: &mut StepContext<'_>) {
        // A stale handle counts as nothing seen
        let seen = self
            .perception
            .nearest()
            .filter(|&id| ctx.targets.is_available(id));

        if self.state == AgentState::Forage && !self.inventory.is_full_for(&BitSpec::GENERIC) {
            if let Some(target) = seen {
                self.seek_target = Some(target);
                self.transition(AgentState::Seek, ctx.events);
                ctx.events.push(SimEvent::BitSeen {
                    agent: self.id,
                    target,
                });
            }
        }

        if self.state == AgentState::Seek {
            let lost = self
                .seek_target
                .map_or(true, |id| !ctx.targets.is_available(id));
            if lost {
                self.seek_target = None;
                self.transition(AgentState::Forage, ctx.events);
            }
        }
    }

    fn step_kinematics(&mut self, dt: f32, ctx: &mut StepContext<'_>) {
        // Found inside the anchor: hand over to the failsafe
        if let Some(anchor) = ctx.anchor {
            let inside = anchor.outer_radius - self.settings.phospher.recover_inside_slack;
            if self.state != AgentState::Recover && anchor.distance_to(self.position) < inside {
                self.enter_recover(ctx.events);
            }
        }

        if self.state == AgentState::Recover {
            self.step_recover(dt, ctx);
            return;
        }

        let settings = Arc::clone(&self.settings);
        let p = &settings.phospher;

        let suppress_steering = self.suppress_steering_timer > 0.0;

        self.neighbours.clear();
        if !suppress_steering {
            ctx.neighbours
                .neighbours_within(self.id, self.position, p.neighbour_radius, &mut self.neighbours);
        }

        let mut accel = Vec2::ZERO;

        // Flocking is damped while chasing a target
        let flock_scale = if self.state == AgentState::Seek {
            p.seek_flock_dampen
        } else {
            1.0
        };

        if !self.neighbours.is_empty() {
            accel += self.separation() * p.weight_separation;
            accel += self.cohesion() * (p.weight_cohesion * flock_scale);
            accel += self.alignment() * (p.weight_alignment * flock_scale);
        }

        // Signal field
        if !suppress_steering {
            if let Some(field) = ctx.field {
                accel += field.sample(self.position) * p.weight_signal;
            }
        }

        // Return home, active even while suppressed
        if self.state == AgentState::Return {
            if let Some(anchor) = ctx.anchor {
                accel += self.steer_towards(anchor.position, 1e-5) * p.weight_return;
            }
        }

        // Seek the locked target
        if self.state == AgentState::Seek {
            let target = self
                .seek_target
                .and_then(|id| ctx.targets.target(id))
                .filter(|t| t.is_available());
            if let Some(target) = target {
                accel += self.steer_towards(target.position(), 1e-4) * p.seek_steer_weight;
            }
        }

        // Boundary layer keeps foragers off the rim; never suppressed so a freshly
        // recovered agent doesn't dive straight back in
        if self.state == AgentState::Forage {
            if let Some(anchor) = ctx.anchor {
                accel += boundary_layer_steering(
                    anchor.obstacle(),
                    self.position,
                    self.velocity,
                    p.anchor_avoid_band,
                    p.anchor_avoid_normal_k,
                    p.anchor_avoid_tangent_k,
                );
            }
        }

        // Wander
        if p.weight_noise > 0.0 && p.noise_jitter_per_sec > 0.0 {
            let jitter = random_in_unit_circle(&mut self.rng) * p.noise_jitter_per_sec;
            accel += jitter * p.weight_noise;
        }

        // Caps: acceleration, turn rate, speed
        let accel_mag = accel.length();
        if accel_mag > p.max_accel {
            accel *= p.max_accel / accel_mag;
        }

        let mut new_vel = self.velocity + accel * dt;

        if self.velocity.length_squared() > 1e-6 && new_vel.length_squared() > 1e-6 {
            let max_turn = p.max_turn_rate_deg.to_radians() * dt;
            let angle = signed_angle(self.velocity, new_vel).clamp(-max_turn, max_turn);
            let speed = new_vel.length();
            new_vel = normalize_or(rotate(self.velocity, angle), Vec2::ZERO) * speed;
        }

        let speed = new_vel.length();
        if speed > p.max_speed {
            new_vel *= p.max_speed / speed;
        }

        let prev_pos = self.position;
        let next_pos = prev_pos + new_vel * dt;
        let mut handled = false;

        if self.state == AgentState::Return {
            if let Some(anchor) = ctx.anchor {
                handled = self.resolve_return_contact(anchor, prev_pos, next_pos, new_vel, dt, ctx);
            }
        }

        if !handled && self.state == AgentState::Forage {
            if let Some(anchor) = ctx.anchor {
                handled = self.resolve_forage_contact(anchor, prev_pos, next_pos, new_vel, dt);
            }
        }

        // Still returning and already touching the rim: deposit without a crossing
        if !handled && self.state == AgentState::Return {
            if let Some(anchor) = ctx.anchor {
                let reach = anchor.outer_radius + p.anchor_collision_epsilon;
                if anchor.distance_to(self.position) <= reach
                    && self.try_deposit(Some(anchor), ctx.ledger, ctx.events)
                    && self.may_leave_return()
                {
                    self.transition(AgentState::Forage, ctx.events);
                }
            }
        }

        if !handled {
            self.position = next_pos;
            self.velocity = new_vel;
        }

        self.update_heading();
    }

    // Deposit rim first, then the slightly larger snap rim that stops penetration.
    // Returns true when a contact was resolved and position/velocity are final.
    fn resolve_return_contact(
        &mut self,
        anchor: &Anchor,
        prev_pos: Vec2,
        next_pos: Vec2,
        new_vel: Vec2,
        dt: f32,
        ctx: &mut StepContext<'_>,
    ) -> bool {
        let p = &self.settings.phospher;
        let deposit_rim = anchor.outer_radius;
        let snap_rim = anchor.outer_radius + p.anchor_edge_snap_margin;
        let epsilon = p.anchor_collision_epsilon;

        if let Some(hit) = rim_contact(prev_pos, next_pos, anchor.position, deposit_rim) {
            let normal = normalize_or(hit.point - anchor.position, vec2(1.0, 0.0));
            let on_rim = anchor.position + normal * (deposit_rim + epsilon);
            let dt_left = (dt * (1.0 - hit.t.clamp(0.0, 1.0))).max(0.0);

            let deposited = self.try_deposit(Some(anchor), ctx.ledger, ctx.events);

            let v_out = self.exit_velocity(new_vel, normal);
            self.position = on_rim + v_out * dt_left;
            self.velocity = v_out;

            if deposited && self.may_leave_return() {
                self.transition(AgentState::Forage, ctx.events);
                self.suppress_steering_timer = self.suppress_steering_timer.max(POST_DEPOSIT_SUPPRESS_SECONDS);
            }
            return true;
        }

        if let Some(hit) = rim_contact(prev_pos, next_pos, anchor.position, snap_rim) {
            let normal = normalize_or(hit.point - anchor.position, vec2(1.0, 0.0));
            let on_rim = anchor.position + normal * (snap_rim + epsilon);
            let dt_left = (dt * (1.0 - hit.t.clamp(0.0, 1.0))).max(0.0);

            // Grazing the snap rim counts as touching the deposit rim
            self.try_deposit(Some(anchor), ctx.ledger, ctx.events);

            let v_out = self.exit_velocity(new_vel, normal);
            self.position = on_rim + v_out * dt_left;
            self.velocity = v_out;

            if self.inventory.is_empty() {
                self.transition(AgentState::Forage, ctx.events);
            }
            return true;
        }

        false
    }

    // Slide along the rim in the direction the agent was already turning
    fn resolve_forage_contact(
        &mut self,
        anchor: &Anchor,
        prev_pos: Vec2,
        next_pos: Vec2,
        new_vel: Vec2,
        dt: f32,
    ) -> bool {
        let p = &self.settings.phospher;
        let rim = anchor.outer_radius;

        let Some(hit) = rim_contact(prev_pos, next_pos, anchor.position, rim) else {
            return false;
        };

        let normal = normalize_or(hit.point - anchor.position, vec2(1.0, 0.0));
        let tangent = perp(normal);
        let tangent = tangent * sign_or_positive(tangent.dot(new_vel));

        let speed = new_vel.length() * p.forage_slide_speed_factor;
        let on_rim = anchor.position + normal * (rim + p.forage_collision_epsilon);
        let dt_left = (dt * (1.0 - hit.t.clamp(0.0, 1.0))).max(0.0);
        let v_out = tangent * speed.max(MIN_EXIT_SPEED);

        self.position = on_rim + v_out * dt_left;
        self.velocity = v_out;
        true
    }

    // Bounce back the way we came, jittered, a little slower
    fn exit_velocity(&mut self, new_vel: Vec2, normal: Vec2) -> Vec2 {
        let p = &self.settings.phospher;
        let v_in_dir = if new_vel.length_squared() > 1e-8 {
            normalize_or(new_vel, -normal)
        } else {
            -normal
        };

        let angle = random_angle(&mut self.rng, p.anchor_exit_jitter_deg);
        let v_out_dir = normalize_or(rotate(-v_in_dir, angle), normal);
        let speed = new_vel.length().min(p.max_speed) * p.anchor_exit_speed_factor;
        v_out_dir * speed.max(MIN_EXIT_SPEED)
    }

    fn may_leave_return(&self) -> bool {
        match self.settings.phospher.return_exit_policy {
            ReturnExitPolicy::AfterEachDeposit => true,
            ReturnExitPolicy::WhenEmpty => self.inventory.is_empty(),
        }
    }

    fn enter_recover(&mut self, events: &mut Vec<SimEvent>) {
        self.resume_state = self.state;
        self.recover_timer = 0.0;
        self.transition(AgentState::Recover, events);
    }

    // Push straight out to just past the rim, ignoring every steering term
    fn step_recover(&mut self, dt: f32, ctx: &mut StepContext<'_>) {
        let Some(anchor) = ctx.anchor else {
            let resume = self.resume_state;
            self.transition(resume, ctx.events);
            return;
        };

        let p = &self.settings.phospher;
        let offset = self.position - anchor.position;
        let dist = offset.length();
        let normal = if dist < 1e-6 {
            vec2(1.0, 0.0)
        } else {
            offset / dist
        };

        let target_r = anchor.outer_radius + p.recover_exit_buffer;
        let move_out = (target_r - dist).max(0.0);
        let step = p.recover_step_out_speed * dt;
        let new_pos = self.position + normal * move_out.min(step);

        let angle = random_angle(&mut self.rng, p.recover_jitter_deg);
        let direction = rotate(normal, angle);
        let base_speed = self
            .velocity
            .length()
            .max(p.max_speed * RECOVER_MIN_SPEED_FRACTION);
        self.velocity = direction * base_speed.min(p.max_speed);
        self.position = new_pos;

        self.recover_timer += dt;
        let outside = anchor.distance_to(new_pos) >= target_r - 1e-4;
        if outside || self.recover_timer >= p.recover_timeout_seconds {
            let hold = p.recover_hold_seconds;
            let resume = self.resume_state;
            self.transition(resume, ctx.events);
            self.suppress_steering_timer = hold;
        }

        self.update_heading();
    }

    /// Offer an item to the agent; `true` means it was taken and the target should
    /// be removed from the world.
    pub fn try_pickup(&mut self, spec: BitSpec, events: &mut Vec<SimEvent>) -> bool {
        if !self.inventory.can_accept(&spec) {
            return false;
        }
        if let Err(err) = self.inventory.try_add(spec) {
            debug!(agent = ?self.id, %err, "pickup rejected");
            return false;
        }

        self.seek_target = None;
        self.transition(AgentState::Return, events);
        events.push(SimEvent::PickedUp { agent: self.id, spec });
        true
    }

    /// Hand the most recently picked item to the ledger. Needs an anchor and a
    /// non-empty inventory.
    pub fn try_deposit(
        &mut self,
        anchor: Option<&Anchor>,
        ledger: &mut dyn ResourceLedger,
        events: &mut Vec<SimEvent>,
    ) -> bool {
        let Some(anchor) = anchor else {
            return false;
        };
        let Some(spec) = self.inventory.take_one() else {
            return false;
        };

        ledger.on_deposit(anchor, self.id, spec);
        events.push(SimEvent::Deposited { agent: self.id, spec });
        true
    }

    // Debug action: flip between Forage and Return
    pub fn toggle_return(&mut self, events: &mut Vec<SimEvent>) {
        let next = if self.state == AgentState::Forage {
            AgentState::Return
        } else {
            AgentState::Forage
        };
        self.transition(next, events);
    }

    fn transition(&mut self, to: AgentState, events: &mut Vec<SimEvent>) {
        let from = self.state;
        if from == to {
            return;
        }
        self.state = to;
        debug!(agent = ?self.id, %from, %to, "state change");
        events.push(SimEvent::StateChanged {
            agent: self.id,
            from,
            to,
        });
    }

    fn update_heading(&mut self) {
        if self.velocity.length_squared() > 1e-6 {
            self.heading = self.velocity.y.atan2(self.velocity.x);
        }
    }

    // Desired-minus-current toward `point`; zero once closer than `min_dist`
    fn steer_towards(&self, point: Vec2, min_dist: f32) -> Vec2 {
        let to = point - self.position;
        let dist = to.length();
        if dist <= min_dist {
            return Vec2::ZERO;
        }
        to / dist * self.settings.phospher.max_speed - self.velocity
    }

    // Push away from close neighbours, inverse-square with distance
    fn separation(&self) -> Vec2 {
        let r2 = self.settings.phospher.separation_radius.powi(2);
        let mut steering = Vec2::ZERO;

        for other in &self.neighbours {
            let diff = self.position - other.position;
            let d2 = diff.length_squared();
            // Coincident agents have no usable direction
            if d2 < 1e-4 {
                continue;
            }
            if d2 <= r2 {
                steering += diff / d2;
            }
        }

        steering
    }

    // Steer towards the centroid of neighbours
    fn cohesion(&self) -> Vec2 {
        let count = self.neighbours.len() as f32;
        let centroid = self
            .neighbours
            .iter()
            .fold(Vec2::ZERO, |acc, n| acc + n.position)
            / count;

        let desired = normalize_or(centroid - self.position, Vec2::ZERO) * self.settings.phospher.max_speed;
        desired - self.velocity
    }

    // Match the average neighbour velocity
    fn alignment(&self) -> Vec2 {
        let count = self.neighbours.len() as f32;
        let avg_vel = self
            .neighbours
            .iter()
            .fold(Vec2::ZERO, |acc, n| acc + n.velocity)
            / count;

        if avg_vel.length_squared() <= 1e-6 {
            return Vec2::ZERO;
        }
        normalize_or(avg_vel, Vec2::ZERO) * self.settings.phospher.max_speed - self.velocity
    }
}

// Where a move first pushes into a rim. Leaving the circle is not a contact, and
// a move that starts on or just inside the rim and heads further in touches it
// immediately.
fn rim_contact(prev_pos: Vec2, next_pos: Vec2, centre: Vec2, radius: f32) -> Option<SegmentHit> {
    let motion = next_pos - prev_pos;
    let offset = prev_pos - centre;
    if offset.length_squared() <= radius * radius && motion.dot(offset) < 0.0 {
        return Some(SegmentHit {
            t: 0.0,
            point: prev_pos,
        });
    }
    segment_circle_hit(prev_pos, next_pos, centre, radius).filter(|hit| motion.dot(hit.point - centre) < 0.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::DepositLog;
    use crate::resources::{BitField, BitType, NoTargets};
    use crate::settings::PhospherSettings;
    use crate::swarm::NoNeighbours;
    use rand::SeedableRng;

    fn quiet_settings() -> SimulationSettings {
        SimulationSettings {
            phospher: PhospherSettings {
                weight_noise: 0.0,
                ..PhospherSettings::default()
            },
            ..SimulationSettings::default()
        }
    }

    fn agent_at(settings: SimulationSettings, position: Vec2) -> Phospher {
        Phospher::new(
            AgentId::default(),
            Arc::new(settings),
            position,
            SmallRng::seed_from_u64(11),
        )
    }

    struct Harness {
        anchor: Anchor,
        bits: BitField,
        ledger: DepositLog,
        events: Vec<SimEvent>,
    }

    impl Harness {
        fn new() -> Self {
            Self {
                anchor: Anchor::new(Vec2::ZERO, 0.8),
                bits: BitField::new(1.0, None),
                ledger: DepositLog::default(),
                events: Vec::new(),
            }
        }

        fn step(&mut self, agent: &mut Phospher, dt: f32) -> StepOutcome {
            let mut ctx = StepContext {
                anchor: Some(&self.anchor),
                field: None,
                neighbours: &NoNeighbours,
                targets: &self.bits,
                ledger: &mut self.ledger,
                events: &mut self.events,
            };
            agent.step(dt, &mut ctx)
        }
    }

    #[test]
    fn initial_velocity_is_slow_and_random() {
        let agent = agent_at(SimulationSettings::default(), vec2(3.0, 0.0));
        assert!((agent.velocity().length() - 0.5).abs() < 1e-5);
        assert_eq!(agent.state(), AgentState::Forage);
        assert!(agent.lifetime_remaining().is_none());
    }

    #[test]
    fn pickup_switches_to_return_and_respects_capacity() {
        let mut agent = agent_at(quiet_settings(), vec2(3.0, 0.0));
        let mut events = Vec::new();

        assert!(agent.try_pickup(BitSpec::GENERIC, &mut events));
        assert_eq!(agent.state(), AgentState::Return);
        assert!(!agent.try_pickup(BitSpec::GENERIC, &mut events));
        assert_eq!(agent.inventory().len(), 1);
        assert!(events.contains(&SimEvent::PickedUp {
            agent: agent.id(),
            spec: BitSpec::GENERIC
        }));
    }

    #[test]
    fn deposit_pops_last_item_and_notifies_once() {
        let mut settings = quiet_settings();
        settings.inventory.max_weight = 5.0;
        settings.inventory.max_count_per_type = 5;
        let mut agent = agent_at(settings, vec2(3.0, 0.0));
        let mut h = Harness::new();

        let rare = BitSpec::new(BitType::Rare, 4, 0.5);
        agent.try_pickup(BitSpec::GENERIC, &mut h.events);
        agent.try_pickup(rare, &mut h.events);

        assert!(!agent.try_deposit(None, &mut h.ledger, &mut h.events));
        assert!(agent.try_deposit(Some(&h.anchor), &mut h.ledger, &mut h.events));
        assert_eq!(h.ledger.deposits, vec![(agent.id(), rare)]);
        assert_eq!(agent.inventory().items(), &[BitSpec::GENERIC]);
    }

    #[test]
    fn seek_locks_on_and_releases_when_target_vanishes() {
        let mut agent = agent_at(quiet_settings(), vec2(3.0, 0.0));
        let mut h = Harness::new();
        let id = h.bits.spawn(BitSpec::GENERIC, vec2(4.0, 0.0)).unwrap();

        h.step(&mut agent, 0.016);
        assert_eq!(agent.state(), AgentState::Seek);
        assert_eq!(agent.seek_target(), Some(id));
        assert!(h.events.iter().any(|e| matches!(e, SimEvent::BitSeen { target, .. } if *target == id)));

        h.bits.despawn(id);
        h.step(&mut agent, 0.016);
        assert_eq!(agent.state(), AgentState::Forage);
        assert_eq!(agent.seek_target(), None);
    }

    #[test]
    fn full_agent_does_not_seek() {
        let mut agent = agent_at(quiet_settings(), vec2(3.0, 0.0));
        let mut h = Harness::new();
        h.bits.spawn(BitSpec::GENERIC, vec2(4.0, 0.0));

        agent.try_pickup(BitSpec::GENERIC, &mut h.events);
        agent.toggle_return(&mut h.events);
        assert_eq!(agent.state(), AgentState::Forage);

        h.step(&mut agent, 0.016);
        assert_eq!(agent.state(), AgentState::Forage);
    }

    #[test]
    fn toggle_return_flips_between_forage_and_return() {
        let mut agent = agent_at(quiet_settings(), vec2(3.0, 0.0));
        let mut events = Vec::new();
        agent.toggle_return(&mut events);
        assert_eq!(agent.state(), AgentState::Return);
        agent.toggle_return(&mut events);
        assert_eq!(agent.state(), AgentState::Forage);
        assert_eq!(events.len(), 2);
    }

    #[test]
    fn agent_inside_anchor_recovers_and_suppresses_steering() {
        let mut agent = agent_at(quiet_settings(), vec2(0.3, 0.0));
        let mut h = Harness::new();

        h.step(&mut agent, 0.016);
        assert_eq!(agent.state(), AgentState::Recover);
        assert_eq!(agent.resume_state(), AgentState::Forage);

        let mut ticks = 0;
        while agent.state() == AgentState::Recover {
            h.step(&mut agent, 0.016);
            ticks += 1;
            assert!(ticks < 40, "recover never finished");
        }
        assert_eq!(agent.state(), AgentState::Forage);
        assert!(agent.position().length() >= 0.8 + 0.04 - 1e-3);
        assert!(agent.suppress_steering_timer() > 0.0);

        // The hold counts down
        let hold = agent.suppress_steering_timer();
        h.step(&mut agent, 0.016);
        assert!(agent.suppress_steering_timer() < hold);
    }

    #[test]
    fn recover_is_capped_by_timeout() {
        let mut settings = quiet_settings();
        // Too slow to get out before the timeout
        settings.phospher.recover_step_out_speed = 0.1;
        let mut agent = agent_at(settings, Vec2::ZERO);
        let mut h = Harness::new();

        let dt = 0.02;
        h.step(&mut agent, dt);
        let mut elapsed = dt;
        while agent.state() == AgentState::Recover {
            h.step(&mut agent, dt);
            elapsed += dt;
        }
        assert!(elapsed <= 0.25 + 2.0 * dt);
    }

    #[test]
    fn recover_without_anchor_resumes_immediately() {
        let mut agent = agent_at(quiet_settings(), Vec2::ZERO);
        let mut h = Harness::new();
        h.step(&mut agent, 0.016);
        assert_eq!(agent.state(), AgentState::Recover);

        let mut ledger = DepositLog::default();
        let mut events = Vec::new();
        let mut ctx = StepContext {
            anchor: None,
            field: None,
            neighbours: &NoNeighbours,
            targets: &NoTargets,
            ledger: &mut ledger,
            events: &mut events,
        };
        agent.step(0.016, &mut ctx);
        assert_eq!(agent.state(), AgentState::Forage);
    }

    #[test]
    fn lifetime_expires() {
        let mut settings = quiet_settings();
        settings.phospher.use_lifetime = true;
        settings.phospher.lifetime_seconds_range = (0.05, 0.05);
        let mut agent = agent_at(settings, vec2(3.0, 0.0));
        let mut h = Harness::new();

        assert_eq!(h.step(&mut agent, 0.02), StepOutcome::Alive);
        assert_eq!(h.step(&mut agent, 0.02), StepOutcome::Alive);
        assert_eq!(h.step(&mut agent, 0.02), StepOutcome::Expired);
    }

    #[test]
    fn forager_slides_along_rim_instead_of_entering() {
        let mut settings = quiet_settings();
        settings.phospher.max_turn_rate_deg = 0.0;
        let mut agent = agent_at(settings, vec2(0.9, 0.1));
        agent.set_velocity(vec2(-3.5, 0.0));
        let mut h = Harness::new();

        h.step(&mut agent, 0.05);
        let dist = agent.position().length();
        assert!(dist >= 0.8, "agent entered the anchor: {dist}");
        // Moving along the tangent, not into the rim
        let radial = agent.velocity().dot(agent.position() / dist);
        assert!(radial.abs() < 0.5);
    }

    #[test]
    fn returner_leaving_the_snap_rim_is_not_bounced_back_in() {
        let mut settings = quiet_settings();
        settings.phospher.max_turn_rate_deg = 0.0;
        settings.phospher.weight_return = 0.0;
        // Between the deposit rim and the snap rim, heading straight out
        let mut agent = agent_at(settings, vec2(0.81, 0.0));
        agent.set_velocity(vec2(3.5, 0.0));
        let mut h = Harness::new();
        agent.toggle_return(&mut h.events);

        h.step(&mut agent, 1.0 / 30.0);
        assert!(agent.position().x > 0.81, "pushed inward to {:?}", agent.position());
        assert!(agent.velocity().x > 0.0);
    }

    #[test]
    fn forager_pressing_into_rim_from_just_inside_is_put_back_on_it() {
        let mut settings = quiet_settings();
        settings.phospher.max_turn_rate_deg = 0.0;
        // Within the recover slack, so no Recover, but heading further in
        let mut agent = agent_at(settings, vec2(0.79, 0.0));
        agent.set_velocity(vec2(-3.0, 0.5));
        let mut h = Harness::new();

        h.step(&mut agent, 1.0 / 30.0);
        assert_eq!(agent.state(), AgentState::Forage);
        assert!(agent.position().length() >= 0.8, "ended at {:?}", agent.position());
    }

    #[test]
    fn speed_never_exceeds_max() {
        let mut agent = agent_at(SimulationSettings::default(), vec2(5.0, 5.0));
        let mut h = Harness::new();
        let field = |_p: Vec2| vec2(100.0, 0.0);
        for _ in 0..200 {
            let mut ctx = StepContext {
                anchor: Some(&h.anchor),
                field: Some(&field),
                neighbours: &NoNeighbours,
                targets: &h.bits,
                ledger: &mut h.ledger,
                events: &mut h.events,
            };
            agent.step(0.016, &mut ctx);
            assert!(agent.velocity().length() <= 3.5 + 1e-4);
        }
    }
}
