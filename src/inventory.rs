/*
 * Inventory Module
 *
 * The bounded set of bits an agent carries. Items are kept as a stack so deposits
 * come out last-in first-out; weight and per-type counts are tracked alongside
 * and always agree with the stack.
 */

use std::collections::HashMap;

use thiserror::Error;

use crate::resources::{BitSpec, BitType};

#[derive(Debug, Error, PartialEq)]
pub enum InventoryError {
    #[error("adding {weight} would exceed max weight {max_weight} (carrying {current})")]
    OverWeight {
        weight: f32,
        current: f32,
        max_weight: f32,
    },
    #[error("already carrying {count} {kind} bits (limit {limit})")]
    TypeLimit {
        kind: BitType,
        count: u32,
        limit: u32,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Inventory {
    max_weight: f32,
    max_count_per_type: u32,
    current_weight: f32,
    counts: HashMap<BitType, u32>,
    items: Vec<BitSpec>,
}

impl Default for Inventory {
    fn default() -> Self {
        // One generic bit
        Self::new(1.0, 1)
    }
}

impl Inventory {
    pub fn new(max_weight: f32, max_count_per_type: u32) -> Self {
        Self {
            max_weight,
            max_count_per_type,
            current_weight: 0.0,
            counts: HashMap::new(),
            items: Vec::new(),
        }
    }

    pub fn max_weight(&self) -> f32 {
        self.max_weight
    }

    pub fn max_count_per_type(&self) -> u32 {
        self.max_count_per_type
    }

    pub fn current_weight(&self) -> f32 {
        self.current_weight
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn count_of(&self, kind: BitType) -> u32 {
        self.counts.get(&kind).copied().unwrap_or(0)
    }

    // Bottom of the stack first
    pub fn items(&self) -> &[BitSpec] {
        &self.items
    }

    fn check(&self, spec: &BitSpec) -> Result<(), InventoryError> {
        if self.current_weight + spec.weight > self.max_weight {
            return Err(InventoryError::OverWeight {
                weight: spec.weight,
                current: self.current_weight,
                max_weight: self.max_weight,
            });
        }
        let count = self.count_of(spec.kind);
        if count >= self.max_count_per_type {
            return Err(InventoryError::TypeLimit {
                kind: spec.kind,
                count,
                limit: self.max_count_per_type,
            });
        }
        Ok(())
    }

    pub fn can_accept(&self, spec: &BitSpec) -> bool {
        self.check(spec).is_ok()
    }

    pub fn is_full_for(&self, spec: &BitSpec) -> bool {
        !self.can_accept(spec)
    }

    pub fn try_add(&mut self, spec: BitSpec) -> Result<(), InventoryError> {
        self.check(&spec)?;
        self.current_weight += spec.weight;
        *self.counts.entry(spec.kind).or_insert(0) += 1;
        self.items.push(spec);
        Ok(())
    }

    /// Pop the most recently added item.
    pub fn take_one(&mut self) -> Option<BitSpec> {
        let spec = self.items.pop()?;
        self.forget(&spec);
        Some(spec)
    }

    /// Remove the most recently added item of `kind`.
    pub fn remove(&mut self, kind: BitType) -> Option<BitSpec> {
        let idx = self.items.iter().rposition(|b| b.kind == kind)?;
        let spec = self.items.remove(idx);
        self.forget(&spec);
        Some(spec)
    }

    pub fn clear(&mut self) {
        self.current_weight = 0.0;
        self.counts.clear();
        self.items.clear();
    }

    // Drop the bookkeeping for an item that has already left the stack
    fn forget(&mut self, spec: &BitSpec) {
        self.current_weight = if self.items.is_empty() {
            // Re-zero so float drift can't leave a phantom weight behind
            0.0
        } else {
            (self.current_weight - spec.weight).max(0.0)
        };

        if let Some(n) = self.counts.get_mut(&spec.kind) {
            *n = n.saturating_sub(1);
            if *n == 0 {
                self.counts.remove(&spec.kind);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::SmallRng;
    use rand::{Rng, SeedableRng};

    const RARE: BitSpec = BitSpec::new(BitType::Rare, 3, 0.5);
    const HEAVY: BitSpec = BitSpec::new(BitType::Heavy, 2, 2.0);

    #[test]
    fn default_holds_a_single_generic_bit() {
        let mut inv = Inventory::default();
        assert!(inv.can_accept(&BitSpec::GENERIC));
        inv.try_add(BitSpec::GENERIC).expect("room for one");
        assert!(inv.is_full_for(&BitSpec::GENERIC));
        assert!(matches!(
            inv.try_add(BitSpec::GENERIC),
            Err(InventoryError::OverWeight { .. })
        ));
    }

    #[test]
    fn per_type_limit_rejects_second_of_kind() {
        let mut inv = Inventory::new(10.0, 1);
        inv.try_add(RARE).expect("first rare fits");
        assert_eq!(
            inv.try_add(RARE),
            Err(InventoryError::TypeLimit {
                kind: BitType::Rare,
                count: 1,
                limit: 1
            })
        );
        inv.try_add(BitSpec::GENERIC).expect("different type fits");
    }

    #[test]
    fn take_one_is_lifo() {
        let mut inv = Inventory::new(10.0, 5);
        inv.try_add(BitSpec::GENERIC).unwrap();
        inv.try_add(RARE).unwrap();
        inv.try_add(HEAVY).unwrap();

        assert_eq!(inv.take_one(), Some(HEAVY));
        assert_eq!(inv.take_one(), Some(RARE));
        assert_eq!(inv.take_one(), Some(BitSpec::GENERIC));
        assert_eq!(inv.take_one(), None);
        assert_eq!(inv.current_weight(), 0.0);
    }

    #[test]
    fn remove_takes_last_of_type() {
        let mut inv = Inventory::new(10.0, 5);
        let first = BitSpec::new(BitType::Generic, 1, 1.0);
        let second = BitSpec::new(BitType::Generic, 7, 1.0);
        inv.try_add(first).unwrap();
        inv.try_add(RARE).unwrap();
        inv.try_add(second).unwrap();

        assert_eq!(inv.remove(BitType::Generic), Some(second));
        assert_eq!(inv.count_of(BitType::Generic), 1);
        assert_eq!(inv.remove(BitType::Heavy), None);
        assert_eq!(inv.items(), &[first, RARE]);
    }

    #[test]
    fn bookkeeping_matches_items_for_random_sequences() {
        let mut rng = SmallRng::seed_from_u64(42);
        let specs = [BitSpec::GENERIC, RARE, HEAVY];
        let mut inv = Inventory::new(4.0, 2);

        for _ in 0..2_000 {
            match rng.gen_range(0..4) {
                0 | 1 => {
                    let _ = inv.try_add(specs[rng.gen_range(0..specs.len())]);
                }
                2 => {
                    inv.take_one();
                }
                _ => {
                    inv.remove(specs[rng.gen_range(0..specs.len())].kind);
                }
            }

            let sum: f32 = inv.items().iter().map(|s| s.weight).sum();
            assert!((inv.current_weight() - sum).abs() < 1e-4);
            assert!(inv.current_weight() <= inv.max_weight() + 1e-4);
            for spec in &specs {
                let counted = inv.items().iter().filter(|s| s.kind == spec.kind).count() as u32;
                assert_eq!(inv.count_of(spec.kind), counted);
                assert!(counted <= inv.max_count_per_type());
            }
        }
    }

    #[test]
    fn clear_resets_everything() {
        let mut inv = Inventory::new(10.0, 5);
        inv.try_add(HEAVY).unwrap();
        inv.clear();
        assert!(inv.is_empty());
        assert_eq!(inv.current_weight(), 0.0);
        assert_eq!(inv.count_of(BitType::Heavy), 0);
    }
}
