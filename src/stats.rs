/*
 * Run Stats Module
 *
 * Per-run counters fed from the resource event queue. A bit leaving the world is
 * counted as a pickup, since collection is the only way bits are despawned during
 * a run.
 */

use serde::Serialize;

use crate::ledger::ResourceEvent;

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct RunSnapshot {
    pub score: i32,
    pub elapsed: f32,
    pub bits_spawned: u32,
    pub bits_picked_up: u32,
    pub bits_deposited: u32,
}

#[derive(Debug, Clone, Default)]
pub struct RunStats {
    bits_spawned: u32,
    bits_picked_up: u32,
    bits_deposited: u32,
    score: i32,
    elapsed: f32,
}

impl RunStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn observe(&mut self, event: &ResourceEvent) {
        match event {
            ResourceEvent::ScoreChanged(score) => self.score = *score,
            ResourceEvent::BitSpawned(_) => self.bits_spawned += 1,
            ResourceEvent::BitDespawned(_) => self.bits_picked_up += 1,
            ResourceEvent::BitDeposited { .. } => self.bits_deposited += 1,
        }
    }

    pub fn advance(&mut self, dt: f32) {
        self.elapsed += dt;
    }

    pub fn elapsed(&self) -> f32 {
        self.elapsed
    }

    pub fn snapshot(&self) -> RunSnapshot {
        RunSnapshot {
            score: self.score,
            elapsed: self.elapsed,
            bits_spawned: self.bits_spawned,
            bits_picked_up: self.bits_picked_up,
            bits_deposited: self.bits_deposited,
        }
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resources::{BitSpec, TargetId};
    use crate::swarm::AgentId;

    #[test]
    fn counters_follow_events() {
        let mut stats = RunStats::new();
        let id = TargetId::default();
        for event in [
            ResourceEvent::BitSpawned(id),
            ResourceEvent::BitSpawned(id),
            ResourceEvent::BitDespawned(id),
            ResourceEvent::BitDeposited { agent: AgentId::default(), spec: BitSpec::GENERIC },
            ResourceEvent::ScoreChanged(1),
        ] {
            stats.observe(&event);
        }
        stats.advance(0.5);
        stats.advance(0.25);

        assert_eq!(
            stats.snapshot(),
            RunSnapshot {
                score: 1,
                elapsed: 0.75,
                bits_spawned: 2,
                bits_picked_up: 1,
                bits_deposited: 1,
            }
        );

        stats.reset();
        assert_eq!(stats.snapshot(), RunSnapshot::default());
    }
}
