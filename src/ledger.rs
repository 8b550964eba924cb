/*
 * Resource Ledger Module
 *
 * Score keeping for deposits. Agents report deposits through the ResourceLedger
 * trait; the ResourceSystem implementation accumulates score and queues events
 * that the host drains once per tick.
 */

use tracing::info;

use crate::anchor::Anchor;
use crate::resources::{BitSpec, TargetId};
use crate::swarm::AgentId;

pub trait ResourceLedger {
    fn on_deposit(&mut self, anchor: &Anchor, agent: AgentId, spec: BitSpec);
}

#[derive(Debug, Clone, PartialEq)]
pub enum ResourceEvent {
    ScoreChanged(i32),
    BitSpawned(TargetId),
    // Emitted on pickup as well; a bit only leaves the world by being collected or reset
    BitDespawned(TargetId),
    BitDeposited { agent: AgentId, spec: BitSpec },
}

#[derive(Debug, Default)]
pub struct ResourceSystem {
    score: i32,
    events: Vec<ResourceEvent>,
}

impl ResourceSystem {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn score(&self) -> i32 {
        self.score
    }

    pub fn reset_score(&mut self) {
        self.score = 0;
        self.events.push(ResourceEvent::ScoreChanged(0));
    }

    pub fn record_spawned(&mut self, id: TargetId) {
        self.events.push(ResourceEvent::BitSpawned(id));
    }

    pub fn record_despawned(&mut self, id: TargetId) {
        self.events.push(ResourceEvent::BitDespawned(id));
    }

    pub fn drain_events(&mut self) -> std::vec::Drain<'_, ResourceEvent> {
        self.events.drain(..)
    }

    pub fn pending_events(&self) -> usize {
        self.events.len()
    }
}

impl ResourceLedger for ResourceSystem {
    fn on_deposit(&mut self, _anchor: &Anchor, agent: AgentId, spec: BitSpec) {
        self.score += spec.value;
        self.events.push(ResourceEvent::ScoreChanged(self.score));
        self.events.push(ResourceEvent::BitDeposited { agent, spec });
        info!(?agent, value = spec.value, score = self.score, "deposit");
    }
}

/// Ledger that records deposits in order and nothing else; handy for tests and
/// headless tools.
#[derive(Debug, Default)]
pub struct DepositLog {
    pub deposits: Vec<(AgentId, BitSpec)>,
}

impl ResourceLedger for DepositLog {
    fn on_deposit(&mut self, _anchor: &Anchor, agent: AgentId, spec: BitSpec) {
        self.deposits.push((agent, spec));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resources::BitType;
    use nannou::prelude::Vec2;

    #[test]
    fn deposit_adds_value_and_queues_events() {
        let anchor = Anchor::new(Vec2::ZERO, 0.8);
        let agent = AgentId::default();
        let mut ledger = ResourceSystem::new();

        ledger.on_deposit(&anchor, agent, BitSpec::GENERIC);
        ledger.on_deposit(&anchor, agent, BitSpec::new(BitType::Rare, 5, 0.5));
        assert_eq!(ledger.score(), 6);

        let events: Vec<_> = ledger.drain_events().collect();
        assert_eq!(
            events,
            vec![
                ResourceEvent::ScoreChanged(1),
                ResourceEvent::BitDeposited { agent, spec: BitSpec::GENERIC },
                ResourceEvent::ScoreChanged(6),
                ResourceEvent::BitDeposited {
                    agent,
                    spec: BitSpec::new(BitType::Rare, 5, 0.5)
                },
            ]
        );
        assert_eq!(ledger.pending_events(), 0);
    }

    #[test]
    fn reset_score_notifies() {
        let mut ledger = ResourceSystem::new();
        ledger.on_deposit(&Anchor::new(Vec2::ZERO, 1.0), AgentId::default(), BitSpec::GENERIC);
        ledger.drain_events().for_each(drop);

        ledger.reset_score();
        assert_eq!(ledger.score(), 0);
        assert_eq!(ledger.drain_events().collect::<Vec<_>>(), vec![ResourceEvent::ScoreChanged(0)]);
    }
}
