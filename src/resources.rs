/*
 * Resources Module
 *
 * Collectible bits and the registry that holds them while they sit in the world.
 *
 * Agents never own a bit. They see it through the `ResourceTarget` capability and
 * remember it by `TargetId`, a generation-checked handle: once a bit is despawned,
 * its id resolves to nothing and any agent still holding it treats the target as
 * unavailable.
 */

use std::fmt;

use nannou::prelude::Vec2;
use serde::{Deserialize, Serialize};
use slotmap::{new_key_type, SlotMap};
use tracing::{debug, warn};

use crate::spatial_grid::SpatialGrid;

new_key_type! {
    /// Stable handle for a bit in the world.
    pub struct TargetId;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum BitType {
    #[default]
    Generic,
    Rare,
    Heavy,
}

impl fmt::Display for BitType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            BitType::Generic => "generic",
            BitType::Rare => "rare",
            BitType::Heavy => "heavy",
        };
        f.write_str(name)
    }
}

/// Immutable description of a carried item: what it is, what it scores, what it weighs.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BitSpec {
    pub kind: BitType,
    pub value: i32,
    pub weight: f32,
}

impl BitSpec {
    pub const GENERIC: BitSpec = BitSpec {
        kind: BitType::Generic,
        value: 1,
        weight: 1.0,
    };

    pub const fn new(kind: BitType, value: i32, weight: f32) -> Self {
        Self {
            kind,
            value,
            weight,
        }
    }
}

impl Default for BitSpec {
    fn default() -> Self {
        Self::GENERIC
    }
}

/// Anything an agent can perceive and pick up.
pub trait ResourceTarget {
    fn position(&self) -> Vec2;
    fn spec(&self) -> BitSpec;
    /// True while the target is in the world and collectable.
    fn is_available(&self) -> bool;
}

/// Read access to the live resource targets.
pub trait TargetQuery {
    fn target(&self, id: TargetId) -> Option<&dyn ResourceTarget>;

    /// Push the ids of all targets within `radius` of `centre` into `out`.
    fn targets_within(&self, centre: Vec2, radius: f32, out: &mut Vec<TargetId>);

    fn is_available(&self, id: TargetId) -> bool {
        self.target(id).map_or(false, |t| t.is_available())
    }
}

/// A world with nothing to collect.
pub struct NoTargets;

impl TargetQuery for NoTargets {
    fn target(&self, _id: TargetId) -> Option<&dyn ResourceTarget> {
        None
    }

    fn targets_within(&self, _centre: Vec2, _radius: f32, _out: &mut Vec<TargetId>) {}
}

#[derive(Debug, Clone, PartialEq)]
pub struct Bit {
    pub position: Vec2,
    pub spec: BitSpec,
    pub available: bool,
}

impl ResourceTarget for Bit {
    fn position(&self) -> Vec2 {
        self.position
    }

    fn spec(&self) -> BitSpec {
        self.spec
    }

    fn is_available(&self) -> bool {
        self.available
    }
}

/// Registry of bits currently in the world.
pub struct BitField {
    bits: SlotMap<TargetId, Bit>,
    grid: SpatialGrid<TargetId>,
    // None means unbounded
    max_active: Option<usize>,
}

impl BitField {
    pub fn new(cell_size: f32, max_active: Option<usize>) -> Self {
        Self {
            bits: SlotMap::with_key(),
            grid: SpatialGrid::new(cell_size),
            max_active,
        }
    }

    // Returns None when the active cap is reached; callers skip the spawn
    pub fn spawn(&mut self, spec: BitSpec, position: Vec2) -> Option<TargetId> {
        if let Some(cap) = self.max_active {
            if self.bits.len() >= cap {
                warn!(cap, "bit pool exhausted; skipping spawn");
                return None;
            }
        }

        let id = self.bits.insert(Bit {
            position,
            spec,
            available: true,
        });
        self.grid.insert(id, position);
        debug!(?id, x = position.x, y = position.y, active = self.bits.len(), "spawned bit");
        Some(id)
    }

    pub fn despawn(&mut self, id: TargetId) -> Option<Bit> {
        let bit = self.bits.remove(id)?;
        self.grid.remove(id, bit.position);
        debug!(?id, active = self.bits.len(), "despawned bit");
        Some(bit)
    }

    pub fn despawn_all(&mut self) -> usize {
        let count = self.bits.len();
        self.bits.clear();
        self.grid.clear();
        count
    }

    pub fn set_available(&mut self, id: TargetId, available: bool) {
        if let Some(bit) = self.bits.get_mut(id) {
            bit.available = available;
        }
    }

    pub fn get(&self, id: TargetId) -> Option<&Bit> {
        self.bits.get(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = (TargetId, &Bit)> {
        self.bits.iter()
    }

    pub fn len(&self) -> usize {
        self.bits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bits.is_empty()
    }
}

impl TargetQuery for BitField {
    fn target(&self, id: TargetId) -> Option<&dyn ResourceTarget> {
        self.bits.get(id).map(|bit| bit as &dyn ResourceTarget)
    }

    fn targets_within(&self, centre: Vec2, radius: f32, out: &mut Vec<TargetId>) {
        let start = out.len();
        self.grid.candidates_within(centre, radius, out);

        // Exact filter on the candidates this call appended
        let r2 = radius * radius;
        let mut keep = start;
        for i in start..out.len() {
            let id = out[i];
            let inside = self
                .bits
                .get(id)
                .map_or(false, |bit| (bit.position - centre).length_squared() <= r2);
            if inside {
                out[keep] = id;
                keep += 1;
            }
        }
        out.truncate(keep);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nannou::prelude::vec2;

    #[test]
    fn despawned_ids_no_longer_resolve() {
        let mut field = BitField::new(1.0, None);
        let id = field.spawn(BitSpec::GENERIC, vec2(1.0, 1.0)).expect("uncapped");
        assert!(field.is_available(id));

        field.despawn(id);
        assert!(field.target(id).is_none());
        assert!(!field.is_available(id));

        // The recycled slot gets a new generation
        let other = field.spawn(BitSpec::GENERIC, vec2(2.0, 2.0)).expect("uncapped");
        assert_ne!(id, other);
        assert!(field.target(id).is_none());
    }

    #[test]
    fn radius_query_filters_exactly() {
        let mut field = BitField::new(2.0, None);
        let near = field.spawn(BitSpec::GENERIC, vec2(0.5, 0.0)).expect("uncapped");
        let _corner = field.spawn(BitSpec::GENERIC, vec2(0.9, 0.9)).expect("uncapped");
        let _far = field.spawn(BitSpec::GENERIC, vec2(5.0, 0.0)).expect("uncapped");

        let mut out = Vec::new();
        field.targets_within(Vec2::ZERO, 1.0, &mut out);
        assert_eq!(out, vec![near]);
    }

    #[test]
    fn spawn_respects_active_cap() {
        let mut field = BitField::new(1.0, Some(1));
        assert!(field.spawn(BitSpec::GENERIC, Vec2::ZERO).is_some());
        assert!(field.spawn(BitSpec::GENERIC, Vec2::ZERO).is_none());
        assert_eq!(field.len(), 1);
    }

    #[test]
    fn availability_flag_is_visible_through_the_capability() {
        let mut field = BitField::new(1.0, None);
        let id = field.spawn(BitSpec::new(BitType::Rare, 5, 0.5), Vec2::ZERO).expect("uncapped");
        field.set_available(id, false);
        let target = field.target(id).expect("still registered");
        assert!(!target.is_available());
        assert_eq!(target.spec().value, 5);
    }
}
