/*
 * Swarm Module
 *
 * Registry of live agents and the per-tick driver that steps them.
 *
 * Agents live in a slot map; removing an agent from it is its deregistration, and
 * its AgentId never resolves again. At the start of every tick the swarm captures
 * a snapshot of every agent's position and velocity, and agents read their
 * neighbours from that snapshot while being stepped one after another.
 */

use std::f32::consts::PI;
use std::sync::Arc;

use nannou::prelude::{vec2, Vec2};
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use slotmap::{new_key_type, SlotMap};
use tracing::{debug, info};

use crate::anchor::Anchor;
use crate::events::SimEvent;
use crate::field::VectorField;
use crate::ledger::ResourceLedger;
use crate::phospher::{Phospher, StepContext, StepOutcome};
use crate::resources::TargetQuery;
use crate::settings::SimulationSettings;

new_key_type! {
    /// Stable handle for a live agent.
    pub struct AgentId;
}

/// What an agent can see of another agent.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Neighbour {
    pub id: AgentId,
    pub position: Vec2,
    pub velocity: Vec2,
}

pub trait NeighbourQuery {
    /// Push every agent other than `requester` within `radius` of `centre` into `out`.
    fn neighbours_within(&self, requester: AgentId, centre: Vec2, radius: f32, out: &mut Vec<Neighbour>);
}

/// An agent alone in the world.
pub struct NoNeighbours;

impl NeighbourQuery for NoNeighbours {
    fn neighbours_within(&self, _requester: AgentId, _centre: Vec2, _radius: f32, _out: &mut Vec<Neighbour>) {}
}

/// Positions and velocities of every live agent, frozen at tick start.
#[derive(Debug, Default)]
pub struct NeighbourSnapshot {
    entries: Vec<Neighbour>,
}

impl NeighbourSnapshot {
    pub fn capture(&mut self, agents: &SlotMap<AgentId, Phospher>) {
        self.entries.clear();
        self.entries.extend(agents.iter().map(|(id, agent)| Neighbour {
            id,
            position: agent.position(),
            velocity: agent.velocity(),
        }));
    }

    /// Drop an agent that left the world mid-tick.
    pub fn forget(&mut self, id: AgentId) {
        self.entries.retain(|n| n.id != id);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl NeighbourQuery for NeighbourSnapshot {
    fn neighbours_within(&self, requester: AgentId, centre: Vec2, radius: f32, out: &mut Vec<Neighbour>) {
        let r2 = radius * radius;
        out.extend(
            self.entries
                .iter()
                .filter(|n| n.id != requester && (n.position - centre).length_squared() <= r2)
                .copied(),
        );
    }
}

pub struct Swarm {
    settings: Arc<SimulationSettings>,
    agents: SlotMap<AgentId, Phospher>,
    snapshot: NeighbourSnapshot,
    rng: SmallRng,
    expired: Vec<AgentId>,
}

impl Swarm {
    pub fn new(settings: Arc<SimulationSettings>, rng: SmallRng) -> Self {
        Self {
            settings,
            agents: SlotMap::with_key(),
            snapshot: NeighbourSnapshot::default(),
            rng,
            expired: Vec::new(),
        }
    }

    pub fn settings(&self) -> &Arc<SimulationSettings> {
        &self.settings
    }

    pub fn spawn(&mut self, position: Vec2) -> AgentId {
        // Each agent gets its own stream so stepping order can't perturb the others
        let agent_rng = SmallRng::seed_from_u64(self.rng.gen());
        let settings = Arc::clone(&self.settings);
        let id = self
            .agents
            .insert_with_key(|id| Phospher::new(id, settings, position, agent_rng));
        debug!(?id, x = position.x, y = position.y, live = self.agents.len(), "spawned agent");
        id
    }

    pub fn despawn(&mut self, id: AgentId) -> Option<Phospher> {
        self.agents.remove(id)
    }

    pub fn despawn_all(&mut self) -> usize {
        let count = self.agents.len();
        self.agents.clear();
        count
    }

    pub fn get(&self, id: AgentId) -> Option<&Phospher> {
        self.agents.get(id)
    }

    pub fn get_mut(&mut self, id: AgentId) -> Option<&mut Phospher> {
        self.agents.get_mut(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = (AgentId, &Phospher)> {
        self.agents.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (AgentId, &mut Phospher)> {
        self.agents.iter_mut()
    }

    pub fn len(&self) -> usize {
        self.agents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }

    /// Every other live agent within `radius` of `requester`, by current position.
    pub fn get_neighbours(&self, requester: AgentId, radius: f32) -> Vec<AgentId> {
        let Some(origin) = self.agents.get(requester).map(Phospher::position) else {
            return Vec::new();
        };
        let r2 = radius * radius;
        self.agents
            .iter()
            .filter(|(id, agent)| *id != requester && (agent.position() - origin).length_squared() <= r2)
            .map(|(id, _)| id)
            .collect()
    }

    /// Pick a spawn position in the configured annulus (and sector) around the
    /// anchor, keeping clear of live agents when possible.
    pub fn find_spawn_point(&mut self, anchor: &Anchor) -> Vec2 {
        let spawn = &self.settings.spawn;
        let min_r = (anchor.outer_radius + spawn.margin_from_anchor).max(spawn.annulus_min);
        let max_r = (min_r + 0.01).max(spawn.annulus_max);
        let spacing2 = spawn.spacing * spawn.spacing;

        for _ in 0..spawn.max_attempts {
            let r = self.rng.gen_range(min_r..=max_r);
            let angle_deg = if spawn.use_sector {
                let lo = spawn.sector_centre_deg - spawn.sector_half_angle_deg;
                let hi = spawn.sector_centre_deg + spawn.sector_half_angle_deg;
                self.rng.gen_range(lo..=hi)
            } else {
                self.rng.gen_range(-180.0..=180.0)
            };
            let angle = angle_deg.to_radians();
            let candidate = anchor.position + vec2(angle.cos(), angle.sin()) * r;

            let clear = self
                .agents
                .values()
                .all(|a| (candidate - a.position()).length_squared() >= spacing2);
            if clear {
                return candidate;
            }
        }

        // Crowded: anywhere on the inner edge
        let angle = self.rng.gen_range(-PI..=PI);
        anchor.position + vec2(angle.cos(), angle.sin()) * min_r
    }

    /// Step every live agent once. Expired agents are removed and reported.
    ///
    /// Returns the number of agents that expired this tick.
    pub fn step(
        &mut self,
        dt: f32,
        anchor: Option<&Anchor>,
        field: Option<&dyn VectorField>,
        targets: &dyn TargetQuery,
        ledger: &mut dyn ResourceLedger,
        events: &mut Vec<SimEvent>,
    ) -> usize {
        self.snapshot.capture(&self.agents);
        self.expired.clear();

        for (id, agent) in self.agents.iter_mut() {
            let mut ctx = StepContext {
                anchor,
                field,
                neighbours: &self.snapshot,
                targets,
                ledger: &mut *ledger,
                events: &mut *events,
            };
            if agent.step(dt, &mut ctx) == StepOutcome::Expired {
                // Agents stepped after this one must not see it
                self.snapshot.forget(id);
                self.expired.push(id);
            }
        }

        for &id in &self.expired {
            self.agents.remove(id);
            events.push(SimEvent::Expired { agent: id });
        }
        if !self.expired.is_empty() {
            info!(expired = self.expired.len(), live = self.agents.len(), "agents expired");
        }
        self.expired.len()
    }
}
