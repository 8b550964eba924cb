/*
 * Simulation Events
 *
 * Notifications produced while stepping agents. Agents push them into the queue
 * they are handed for the tick; the owner drains the queue afterwards.
 */

use crate::phospher::AgentState;
use crate::resources::{BitSpec, TargetId};
use crate::swarm::AgentId;

#[derive(Debug, Clone, PartialEq)]
pub enum SimEvent {
    Spawned { agent: AgentId },
    BitSeen { agent: AgentId, target: TargetId },
    PickedUp { agent: AgentId, spec: BitSpec },
    Deposited { agent: AgentId, spec: BitSpec },
    StateChanged { agent: AgentId, from: AgentState, to: AgentState },
    Expired { agent: AgentId },
}
