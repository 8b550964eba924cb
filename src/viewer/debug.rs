/*
 * Frame Stats Module
 *
 * Per-frame numbers for the debug overlay and the control panel.
 */

use std::time::Duration;

use crate::events::SimEvent;

#[derive(Debug, Default, Clone)]
pub struct FrameStats {
    pub fps: f32,
    pub frame_time: Duration,
    pub physics_steps: usize,
    pub step_alpha: f32,
    // Running totals since the last restart
    pub deposits: u32,
    pub pickups: u32,
    pub expired: u32,
    pub recoveries: u32,
}

impl FrameStats {
    pub fn record(&mut self, event: &SimEvent) {
        match event {
            SimEvent::Deposited { .. } => self.deposits += 1,
            SimEvent::PickedUp { .. } => self.pickups += 1,
            SimEvent::Expired { .. } => self.expired += 1,
            SimEvent::StateChanged { to, .. } if *to == crate::phospher::AgentState::Recover => {
                self.recoveries += 1
            }
            _ => {}
        }
    }

    pub fn clear_totals(&mut self) {
        self.deposits = 0;
        self.pickups = 0;
        self.expired = 0;
        self.recoveries = 0;
    }
}
