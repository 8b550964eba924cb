/*
 * Spatial Grid Module
 *
 * Uniform hash grid used for radius queries over world objects that rarely move
 * (bits waiting to be picked up). The world is unbounded, so cells live in a map
 * keyed by integer cell coordinates instead of a fixed-size array.
 *
 * Queries return candidates from every cell overlapping the query circle's bounding
 * box; callers do the exact distance test.
 */

use std::collections::HashMap;

use nannou::prelude::Vec2;

pub struct SpatialGrid<K> {
    cell_size: f32,
    cells: HashMap<(i32, i32), Vec<K>>,
}

impl<K: Copy + PartialEq> SpatialGrid<K> {
    pub fn new(cell_size: f32) -> Self {
        Self {
            // A zero or negative cell size would put everything in one degenerate cell
            cell_size: cell_size.max(1e-3),
            cells: HashMap::new(),
        }
    }

    pub fn cell_size(&self) -> f32 {
        self.cell_size
    }

    // Convert world coordinates to integer cell coordinates
    #[inline]
    fn cell_of(&self, pos: Vec2) -> (i32, i32) {
        (
            (pos.x / self.cell_size).floor() as i32,
            (pos.y / self.cell_size).floor() as i32,
        )
    }

    pub fn clear(&mut self) {
        self.cells.clear();
    }

    #[inline]
    pub fn insert(&mut self, key: K, position: Vec2) {
        let cell = self.cell_of(position);
        self.cells.entry(cell).or_default().push(key);
    }

    // Remove a key previously inserted at `position`; unknown keys are ignored
    pub fn remove(&mut self, key: K, position: Vec2) {
        let cell = self.cell_of(position);
        if let Some(bucket) = self.cells.get_mut(&cell) {
            if let Some(idx) = bucket.iter().position(|k| *k == key) {
                bucket.swap_remove(idx);
            }
            if bucket.is_empty() {
                self.cells.remove(&cell);
            }
        }
    }

    // Push every key whose cell overlaps the circle's bounding box into `out`
    pub fn candidates_within(&self, centre: Vec2, radius: f32, out: &mut Vec<K>) {
        let r = radius.max(0.0);
        let (min_x, min_y) = self.cell_of(centre - Vec2::splat(r));
        let (max_x, max_y) = self.cell_of(centre + Vec2::splat(r));

        for y in min_y..=max_y {
            for x in min_x..=max_x {
                if let Some(bucket) = self.cells.get(&(x, y)) {
                    out.extend_from_slice(bucket);
                }
            }
        }
    }

    pub fn len(&self) -> usize {
        self.cells.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nannou::prelude::vec2;

    #[test]
    fn candidates_cover_neighbouring_cells() {
        let mut grid = SpatialGrid::new(1.0);
        grid.insert(1u32, vec2(0.5, 0.5));
        grid.insert(2u32, vec2(1.5, 0.5));
        grid.insert(3u32, vec2(10.0, 10.0));

        let mut out = Vec::new();
        grid.candidates_within(vec2(0.9, 0.5), 0.5, &mut out);
        out.sort_unstable();
        assert_eq!(out, vec![1, 2]);
    }

    #[test]
    fn negative_coordinates_land_in_their_own_cells() {
        let mut grid = SpatialGrid::new(2.0);
        grid.insert(7u32, vec2(-0.5, -0.5));
        let mut out = Vec::new();
        grid.candidates_within(vec2(-1.0, -1.0), 0.1, &mut out);
        assert_eq!(out, vec![7]);
    }

    #[test]
    fn remove_drops_the_key_and_empty_cells() {
        let mut grid = SpatialGrid::new(1.0);
        grid.insert(1u32, vec2(0.2, 0.2));
        grid.insert(2u32, vec2(0.3, 0.3));
        grid.remove(1, vec2(0.2, 0.2));
        assert_eq!(grid.len(), 1);
        grid.remove(2, vec2(0.3, 0.3));
        assert!(grid.is_empty());
        // Removing again is a no-op
        grid.remove(2, vec2(0.3, 0.3));
    }
}
