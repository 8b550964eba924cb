/*
 * Trail Juice Module
 *
 * The budget the player spends drawing into the trail field. It starts each run
 * at `starting_juice` (clamped to `max_juice`) and only ever goes down until the
 * run is reset.
 */

use crate::settings::TrailDrawSettings;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrailJuice {
    current: f32,
    max: f32,
    starting: f32,
}

impl TrailJuice {
    pub fn new(max: f32, starting: f32) -> Self {
        let max = max.max(0.0);
        Self {
            current: starting.clamp(0.0, max),
            max,
            starting,
        }
    }

    pub fn from_settings(settings: &TrailDrawSettings) -> Self {
        Self::new(settings.max_juice, settings.starting_juice)
    }

    pub fn current(&self) -> f32 {
        self.current
    }

    pub fn max(&self) -> f32 {
        self.max
    }

    // 0 when there is no budget at all
    pub fn fraction(&self) -> f32 {
        if self.max > 0.0 {
            self.current / self.max
        } else {
            0.0
        }
    }

    pub fn is_empty(&self) -> bool {
        self.current <= 0.0
    }

    /// Spend `amount` if all of it is available. Free actions always succeed.
    pub fn try_consume(&mut self, amount: f32) -> bool {
        if amount <= 0.0 {
            return true;
        }
        if self.is_empty() || amount > self.current {
            return false;
        }
        self.current -= amount;
        true
    }

    pub fn reset(&mut self) {
        self.current = self.starting.clamp(0.0, self.max);
    }
}
