/*
 * World Module
 *
 * The host that owns one run: anchor, agents, bits, score, stats, and the signal
 * layer. It drives the swarm at a fixed timestep and does the jobs agents can't
 * do for themselves:
 * - Scheduling agent spawns around the anchor
 * - Detecting agent/bit overlap and offering the bit (pickup)
 * - Painting and fading the trail field
 * - Charging the player's juice for drawing into the trail
 * - Feeding resource events into the run stats
 */

use std::sync::Arc;
use std::time::Duration;

use nannou::prelude::Vec2;
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use slotmap::SecondaryMap;
use tracing::{debug, info};

use crate::anchor::Anchor;
use crate::events::SimEvent;
use crate::field::{TrailField, TrailPainter, VectorField};
use crate::juice::TrailJuice;
use crate::ledger::ResourceSystem;
use crate::resources::{BitField, BitSpec, TargetId, TargetQuery};
use crate::settings::{SettingsError, SimulationSettings, SpawnSettings};
use crate::stats::{RunSnapshot, RunStats};
use crate::swarm::{AgentId, Swarm};

/// The vector field agents feel this run.
pub enum SignalLayer {
    None,
    Trail(TrailField),
    Custom(Box<dyn VectorField>),
}

impl SignalLayer {
    pub fn as_field(&self) -> Option<&dyn VectorField> {
        match self {
            SignalLayer::None => None,
            SignalLayer::Trail(trail) => Some(trail),
            SignalLayer::Custom(field) => Some(field.as_ref()),
        }
    }

    pub fn trail(&self) -> Option<&TrailField> {
        match self {
            SignalLayer::Trail(trail) => Some(trail),
            _ => None,
        }
    }
}

const MIN_DRAW_INTERVAL: f32 = 0.01;

// Releases agents either all at once or one per interval (plus jitter)
#[derive(Debug, Clone)]
struct SpawnScheduler {
    remaining: usize,
    timer: f32,
}

impl SpawnScheduler {
    fn new(spawn: &SpawnSettings) -> Self {
        Self {
            remaining: spawn.count,
            timer: 0.0,
        }
    }

    // How many agents are due this tick
    fn due(&mut self, dt: f32, spawn: &SpawnSettings, rng: &mut SmallRng) -> usize {
        if self.remaining == 0 {
            return 0;
        }
        if !spawn.spawn_over_time {
            return std::mem::take(&mut self.remaining);
        }

        self.timer -= dt;
        let mut due = 0;
        while self.remaining > 0 && self.timer <= 0.0 {
            due += 1;
            self.remaining -= 1;

            let (below, above) = spawn.interval_jitter;
            let jitter = if above > -below {
                rng.gen_range(-below..=above)
            } else {
                0.0
            };
            self.timer += (spawn.interval + jitter).max(0.01);
        }
        due
    }
}

pub struct World {
    settings: Arc<SimulationSettings>,
    anchor: Anchor,
    swarm: Swarm,
    bits: BitField,
    resources: ResourceSystem,
    stats: RunStats,
    signal: SignalLayer,
    painters: SecondaryMap<AgentId, TrailPainter>,
    spawner: SpawnScheduler,
    juice: TrailJuice,
    // Counts down between player brush strokes
    draw_timer: f32,
    events: Vec<SimEvent>,
    rng: SmallRng,

    // Fixed timestep
    accumulator: Duration,
    step: Duration,

    nearby: Vec<TargetId>,
}

impl World {
    pub fn new(settings: SimulationSettings) -> Result<Self, SettingsError> {
        settings.validate()?;

        let mut rng = match settings.seed {
            Some(seed) => SmallRng::seed_from_u64(seed),
            None => SmallRng::from_entropy(),
        };

        let settings = Arc::new(settings);
        let swarm = Swarm::new(Arc::clone(&settings), SmallRng::seed_from_u64(rng.gen()));
        let signal = if settings.trail.enabled {
            SignalLayer::Trail(TrailField::new(&settings.trail))
        } else {
            SignalLayer::None
        };

        info!(
            seed = ?settings.seed,
            agents = settings.spawn.count,
            anchor_radius = settings.anchor_radius,
            "starting run"
        );

        Ok(Self {
            anchor: Anchor::new(Vec2::ZERO, settings.anchor_radius),
            swarm,
            bits: BitField::new(settings.bit_grid_cell_size, settings.max_active_bits),
            resources: ResourceSystem::new(),
            stats: RunStats::new(),
            signal,
            painters: SecondaryMap::new(),
            spawner: SpawnScheduler::new(&settings.spawn),
            juice: TrailJuice::from_settings(&settings.draw),
            draw_timer: 0.0,
            events: Vec::new(),
            rng,
            accumulator: Duration::ZERO,
            step: Duration::from_secs_f32(settings.physics_step_seconds()),
            nearby: Vec::new(),
            settings,
        })
    }

    // Replace the signal layer, e.g. with a scripted field
    pub fn with_signal(mut self, signal: SignalLayer) -> Self {
        self.signal = signal;
        self
    }

    pub fn settings(&self) -> &SimulationSettings {
        &self.settings
    }

    pub fn anchor(&self) -> &Anchor {
        &self.anchor
    }

    pub fn swarm(&self) -> &Swarm {
        &self.swarm
    }

    pub fn swarm_mut(&mut self) -> &mut Swarm {
        &mut self.swarm
    }

    pub fn bits(&self) -> &BitField {
        &self.bits
    }

    pub fn score(&self) -> i32 {
        self.resources.score()
    }

    pub fn stats(&self) -> RunSnapshot {
        self.stats.snapshot()
    }

    pub fn signal(&self) -> &SignalLayer {
        &self.signal
    }

    pub fn trail(&self) -> Option<&TrailField> {
        self.signal.trail()
    }

    pub fn pending_spawns(&self) -> usize {
        self.spawner.remaining
    }

    pub fn juice(&self) -> &TrailJuice {
        &self.juice
    }

    pub fn drain_events(&mut self) -> std::vec::Drain<'_, SimEvent> {
        self.events.drain(..)
    }

    /// Run as many fixed steps as the accumulated frame time allows, up to
    /// `max_steps_per_frame`. Returns the number of ticks run.
    pub fn advance(&mut self, frame_time: Duration) -> usize {
        self.accumulator += frame_time;

        let dt = self.step.as_secs_f32();
        let mut steps = 0;
        while self.accumulator >= self.step && steps < self.settings.max_steps_per_frame {
            self.tick(dt);
            self.accumulator -= self.step;
            steps += 1;
        }

        // Too far behind to catch up; drop the backlog rather than spiral
        if self.accumulator >= self.step {
            debug!(backlog = ?self.accumulator, "dropping physics backlog");
            self.accumulator = Duration::ZERO;
        }
        steps
    }

    // Fraction of a step left in the accumulator, for render interpolation
    pub fn step_alpha(&self) -> f32 {
        (self.accumulator.as_secs_f32() / self.step.as_secs_f32()).clamp(0.0, 1.0)
    }

    /// One simulation tick of `dt` seconds.
    pub fn tick(&mut self, dt: f32) {
        self.spawn_due(dt);

        let first_new = self.events.len();
        self.swarm.step(
            dt,
            Some(&self.anchor),
            self.signal.as_field(),
            &self.bits,
            &mut self.resources,
            &mut self.events,
        );
        for event in &self.events[first_new..] {
            if let SimEvent::Expired { agent } = event {
                self.painters.remove(*agent);
            }
        }

        self.pickup_pass();
        self.paint_trails(dt);

        for event in self.resources.drain_events() {
            self.stats.observe(&event);
        }
        self.stats.advance(dt);
    }

    fn spawn_due(&mut self, dt: f32) {
        let due = self.spawner.due(dt, &self.settings.spawn, &mut self.rng);
        for _ in 0..due {
            let position = self.swarm.find_spawn_point(&self.anchor);
            self.spawn_agent(position);
        }
    }

    pub fn spawn_agent(&mut self, position: Vec2) -> AgentId {
        let id = self.swarm.spawn(position);
        self.painters.insert(id, TrailPainter::default());
        self.events.push(SimEvent::Spawned { agent: id });
        id
    }

    pub fn despawn_agent(&mut self, id: AgentId) -> bool {
        self.painters.remove(id);
        self.swarm.despawn(id).is_some()
    }

    // Offer each agent the nearest available bit it overlaps
    fn pickup_pass(&mut self) {
        let radius = self.settings.pickup_radius;

        for (_, agent) in self.swarm.iter_mut() {
            let position = agent.position();
            self.nearby.clear();
            self.bits.targets_within(position, radius, &mut self.nearby);

            let bits = &self.bits;
            self.nearby.sort_by(|a, b| {
                let da = bits.get(*a).map_or(f32::INFINITY, |bit| (bit.position - position).length_squared());
                let db = bits.get(*b).map_or(f32::INFINITY, |bit| (bit.position - position).length_squared());
                da.total_cmp(&db)
            });

            for &target in &self.nearby {
                let Some(bit) = self.bits.get(target).filter(|bit| bit.available) else {
                    continue;
                };
                if agent.try_pickup(bit.spec, &mut self.events) {
                    self.bits.despawn(target);
                    self.resources.record_despawned(target);
                    break;
                }
            }
        }
    }

    fn paint_trails(&mut self, dt: f32) {
        let SignalLayer::Trail(trail) = &mut self.signal else {
            return;
        };
        let t = &self.settings.trail;

        for (id, agent) in self.swarm.iter() {
            if let Some(painter) = self.painters.get_mut(id) {
                if painter.tick(dt, t.paint_interval) {
                    trail.paint(agent.position(), t.paint_radius, t.paint_strength);
                }
            }
        }
        trail.decay(dt);
    }

    /// Player brush held at `position` for `dt` seconds. Paints the trail every
    /// draw interval while juice lasts; returns whether it painted this call.
    pub fn draw_trail(&mut self, position: Vec2, dt: f32) -> bool {
        let SignalLayer::Trail(trail) = &mut self.signal else {
            return false;
        };
        if self.juice.is_empty() {
            return false;
        }

        self.draw_timer -= dt;
        if self.draw_timer > 0.0 {
            return false;
        }
        let d = &self.settings.draw;
        self.draw_timer = d.interval.max(MIN_DRAW_INTERVAL);

        if !self.juice.try_consume(d.juice_per_second * self.draw_timer) {
            return false;
        }
        trail.paint(position, d.radius, d.strength);
        true
    }

    // Brush released; the next press paints straight away
    pub fn stop_drawing(&mut self) {
        self.draw_timer = 0.0;
    }

    pub fn drop_bit(&mut self, spec: BitSpec, position: Vec2) -> Option<TargetId> {
        let id = self.bits.spawn(spec, position)?;
        self.resources.record_spawned(id);
        Some(id)
    }

    pub fn remove_bit(&mut self, id: TargetId) -> bool {
        if self.bits.despawn(id).is_some() {
            self.resources.record_despawned(id);
            true
        } else {
            false
        }
    }

    // Developer action on a single agent
    pub fn toggle_return(&mut self, id: AgentId) -> bool {
        match self.swarm.get_mut(id) {
            Some(agent) => {
                agent.toggle_return(&mut self.events);
                true
            }
            None => false,
        }
    }

    /// Nearest live agent to `point` within `radius`.
    pub fn agent_near(&self, point: Vec2, radius: f32) -> Option<AgentId> {
        let r2 = radius * radius;
        self.swarm
            .iter()
            .map(|(id, agent)| (id, (agent.position() - point).length_squared()))
            .filter(|(_, d2)| *d2 <= r2)
            .min_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(id, _)| id)
    }

    /// Clear the run and start spawning again with the same settings.
    pub fn reset(&mut self) {
        let agents = self.swarm.despawn_all();
        let bits = self.bits.despawn_all();
        self.painters.clear();
        self.resources.reset_score();
        self.resources.drain_events().for_each(drop);
        self.stats.reset();
        if let SignalLayer::Trail(trail) = &mut self.signal {
            trail.clear();
        }
        self.spawner = SpawnScheduler::new(&self.settings.spawn);
        self.juice.reset();
        self.draw_timer = 0.0;
        self.events.clear();
        self.accumulator = Duration::ZERO;
        info!(agents, bits, "run reset");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::phospher::AgentState;
    use nannou::prelude::vec2;

    fn seeded(settings: SimulationSettings) -> World {
        World::new(SimulationSettings {
            seed: Some(17),
            ..settings
        })
        .expect("valid settings")
    }

    #[test]
    fn spawns_over_time_until_count_reached() {
        let mut settings = SimulationSettings::default();
        settings.spawn.count = 4;
        settings.spawn.interval = 0.1;
        settings.spawn.interval_jitter = (0.0, 0.0);
        let mut world = seeded(settings);

        world.tick(0.05);
        assert_eq!(world.swarm().len(), 1);
        for _ in 0..20 {
            world.tick(0.05);
        }
        assert_eq!(world.swarm().len(), 4);
        assert_eq!(world.pending_spawns(), 0);
    }

    #[test]
    fn instant_spawn_releases_everyone_at_once() {
        let mut settings = SimulationSettings::default();
        settings.spawn.count = 6;
        settings.spawn.spawn_over_time = false;
        let mut world = seeded(settings);
        world.tick(0.016);
        assert_eq!(world.swarm().len(), 6);
        let spawned = world
            .drain_events()
            .filter(|e| matches!(e, SimEvent::Spawned { .. }))
            .count();
        assert_eq!(spawned, 6);
    }

    #[test]
    fn advance_runs_fixed_steps_and_caps_backlog() {
        let mut settings = SimulationSettings::default();
        settings.physics_fps = 50.0;
        settings.max_steps_per_frame = 3;
        let mut world = seeded(settings);

        assert_eq!(world.advance(Duration::from_millis(10)), 0);
        assert_eq!(world.advance(Duration::from_millis(10)), 1);
        assert_eq!(world.advance(Duration::from_secs(1)), 3);
        // Backlog was dropped
        assert_eq!(world.advance(Duration::ZERO), 0);
    }

    #[test]
    fn overlapping_bit_is_picked_up_and_counted() {
        let mut settings = SimulationSettings::default();
        settings.spawn.count = 0;
        let mut world = seeded(settings);

        let agent = world.spawn_agent(vec2(3.0, 0.0));
        world.drop_bit(BitSpec::GENERIC, vec2(3.0, 0.0)).expect("pool has room");

        world.tick(0.016);
        assert!(world.bits().is_empty());
        let snapshot = world.stats();
        assert_eq!(snapshot.bits_spawned, 1);
        assert_eq!(snapshot.bits_picked_up, 1);
        assert_eq!(world.swarm().get(agent).map(|a| a.state()), Some(AgentState::Return));
    }

    #[test]
    fn full_agent_leaves_bit_in_place() {
        let mut settings = SimulationSettings::default();
        settings.spawn.count = 0;
        let mut world = seeded(settings);

        let agent = world.spawn_agent(vec2(3.0, 0.0));
        if let Some(a) = world.swarm_mut().get_mut(agent) {
            assert!(a.try_pickup(BitSpec::GENERIC, &mut Vec::new()));
        }
        world.drop_bit(BitSpec::GENERIC, vec2(3.0, 0.0));

        world.tick(0.016);
        assert_eq!(world.bits().len(), 1);
    }

    #[test]
    fn trail_is_painted_where_agents_walk() {
        let mut settings = SimulationSettings::default();
        settings.spawn.count = 0;
        let mut world = seeded(settings);
        world.spawn_agent(vec2(5.0, 5.0));

        world.tick(0.016);
        let trail = world.trail().expect("trail enabled by default");
        assert!(trail.intensities().iter().any(|v| *v > 0.0));
    }

    #[test]
    fn reset_clears_the_run() {
        let mut settings = SimulationSettings::default();
        settings.spawn.count = 3;
        settings.spawn.spawn_over_time = false;
        let mut world = seeded(settings);
        world.tick(0.016);
        world.drop_bit(BitSpec::GENERIC, vec2(8.0, 8.0));

        world.reset();
        assert!(world.swarm().is_empty());
        assert!(world.bits().is_empty());
        assert_eq!(world.score(), 0);
        assert_eq!(world.stats(), RunSnapshot::default());
        assert_eq!(world.pending_spawns(), 3);
    }

    fn brush_world() -> World {
        let mut settings = SimulationSettings::default();
        settings.spawn.count = 0;
        settings.draw.max_juice = 1.0;
        settings.draw.starting_juice = 1.0;
        settings.draw.juice_per_second = 6.0;
        settings.draw.interval = 0.02;
        seeded(settings)
    }

    #[test]
    fn drawing_stops_when_juice_runs_out() {
        let mut world = brush_world();
        let spot = vec2(-4.0, 2.0);

        // Each stroke costs 6/s * 0.02 s = 0.12 of the 1.0 budget
        let strokes = (0..20).filter(|_| world.draw_trail(spot, 0.02)).count();
        assert_eq!(strokes, 8);
        assert!(world.juice().current() < 0.12);
        assert!(!world.draw_trail(spot, 0.02));

        let trail = world.trail().expect("trail enabled by default");
        assert!(trail.intensity_at(spot) > 0.0);
    }

    #[test]
    fn brush_waits_for_its_interval() {
        let mut world = brush_world();
        assert!(world.draw_trail(Vec2::ZERO, 0.005));
        assert!(!world.draw_trail(Vec2::ZERO, 0.005));
        world.stop_drawing();
        assert!(world.draw_trail(Vec2::ZERO, 0.005));
    }

    #[test]
    fn reset_refills_juice() {
        let mut world = brush_world();
        while world.draw_trail(Vec2::ZERO, 0.02) {}
        assert!(world.juice().current() < 0.12);

        world.reset();
        assert_eq!(world.juice().current(), 1.0);
        assert!(world.draw_trail(Vec2::ZERO, 0.02));
    }

    #[test]
    fn drawing_without_a_trail_costs_nothing() {
        let mut settings = SimulationSettings::default();
        settings.trail.enabled = false;
        let mut world = seeded(settings);
        assert!(!world.draw_trail(Vec2::ZERO, 0.1));
        assert_eq!(world.juice().current(), world.juice().max());
    }

    #[test]
    fn despawned_agent_loses_its_painter() {
        let mut settings = SimulationSettings::default();
        settings.spawn.count = 0;
        let mut world = seeded(settings);
        let agent = world.spawn_agent(vec2(5.0, 5.0));
        assert!(world.painters.contains_key(agent));

        assert!(world.despawn_agent(agent));
        assert!(world.swarm().get(agent).is_none());
        assert!(!world.painters.contains_key(agent));
        assert!(!world.despawn_agent(agent));

        // Nothing left to paint the trail
        world.tick(0.016);
        let trail = world.trail().expect("trail enabled by default");
        assert!(trail.intensities().iter().all(|v| *v == 0.0));
    }

    #[test]
    fn removed_bit_is_gone_and_counted() {
        let mut settings = SimulationSettings::default();
        settings.spawn.count = 0;
        let mut world = seeded(settings);
        let bit = world.drop_bit(BitSpec::GENERIC, vec2(6.0, 0.0)).expect("pool has room");

        assert!(world.remove_bit(bit));
        assert!(!world.remove_bit(bit));
        world.tick(0.016);
        assert!(world.bits().is_empty());
        assert_eq!(world.stats().bits_spawned, 1);
        assert_eq!(world.stats().bits_picked_up, 1);
    }

    #[test]
    fn invalid_settings_are_rejected() {
        let mut settings = SimulationSettings::default();
        settings.physics_fps = 0.0;
        assert!(matches!(World::new(settings), Err(SettingsError::Invalid { .. })));
    }
}
