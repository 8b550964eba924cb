/*
 * Signal Field Module
 *
 * Vector fields that bias agent steering. A field is sampled once per agent per
 * tick and must not change as a side effect of sampling.
 *
 * TrailField is the one stateful implementation: a bounded intensity grid that
 * agents paint into and that fades over time. Its sample is the normalized
 * intensity gradient, so agents drift up-trail.
 */

use nannou::prelude::{vec2, Vec2};

use crate::geometry::smoothstep;
use crate::settings::TrailSettings;

pub trait VectorField {
    fn sample(&self, position: Vec2) -> Vec2;
}

/// A field with no influence anywhere.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullField;

impl VectorField for NullField {
    fn sample(&self, _position: Vec2) -> Vec2 {
        Vec2::ZERO
    }
}

impl<F> VectorField for F
where
    F: Fn(Vec2) -> Vec2,
{
    fn sample(&self, position: Vec2) -> Vec2 {
        self(position)
    }
}

#[derive(Debug, Clone)]
pub struct TrailField {
    min: Vec2,
    max: Vec2,
    width: usize,
    height: usize,
    cell: Vec2,
    intensity: Vec<f32>,

    decay_per_second: f32,
    min_intensity: f32,
    gradient_strength: f32,
    intensity_threshold: f32,
    scale_by_intensity: bool,
}

impl TrailField {
    pub fn new(settings: &TrailSettings) -> Self {
        let min = vec2(settings.world_min.0, settings.world_min.1);
        let max = vec2(settings.world_max.0, settings.world_max.1);
        let width = settings.resolution.0.max(1);
        let height = settings.resolution.1.max(1);
        let size = max - min;

        Self {
            min,
            max,
            width,
            height,
            cell: vec2(size.x / width as f32, size.y / height as f32),
            intensity: vec![0.0; width * height],
            decay_per_second: settings.decay_per_second,
            min_intensity: settings.min_intensity,
            gradient_strength: settings.gradient_strength,
            intensity_threshold: settings.intensity_threshold,
            scale_by_intensity: settings.scale_by_intensity,
        }
    }

    pub fn bounds(&self) -> (Vec2, Vec2) {
        (self.min, self.max)
    }

    pub fn dimensions(&self) -> (usize, usize) {
        (self.width, self.height)
    }

    pub fn cell_size(&self) -> Vec2 {
        self.cell
    }

    // Row-major, row 0 at world_min.y
    pub fn intensities(&self) -> &[f32] {
        &self.intensity
    }

    pub fn cell_centre(&self, x: usize, y: usize) -> Vec2 {
        self.min + vec2((x as f32 + 0.5) * self.cell.x, (y as f32 + 0.5) * self.cell.y)
    }

    pub fn intensity_at(&self, position: Vec2) -> f32 {
        self.cell_of(position)
            .map_or(0.0, |(x, y)| self.intensity[y * self.width + x])
    }

    fn cell_of(&self, position: Vec2) -> Option<(usize, usize)> {
        let x = ((position.x - self.min.x) / self.cell.x).floor();
        let y = ((position.y - self.min.y) / self.cell.y).floor();
        if x < 0.0 || y < 0.0 || x >= self.width as f32 || y >= self.height as f32 {
            return None;
        }
        Some((x as usize, y as usize))
    }

    // Neighbour lookup for the gradient; out-of-range indices clamp to the edge
    fn clamped(&self, x: i64, y: i64) -> f32 {
        let x = x.clamp(0, self.width as i64 - 1) as usize;
        let y = y.clamp(0, self.height as i64 - 1) as usize;
        self.intensity[y * self.width + x]
    }

    pub fn clear(&mut self) {
        self.intensity.iter_mut().for_each(|v| *v = 0.0);
    }

    /// Add a soft disc of intensity centred on `position`.
    ///
    /// Each cell whose centre lies within `radius` gains `smoothstep(1 - d/r)` times
    /// the clamped strength; cells saturate at 1.
    pub fn paint(&mut self, position: Vec2, radius: f32, strength: f32) {
        let r = radius.max(1e-4);
        let strength = strength.clamp(0.0, 1.0);
        if strength <= 0.0 {
            return;
        }

        let last_x = self.width as i64 - 1;
        let last_y = self.height as i64 - 1;
        let min_x = (((position.x - r - self.min.x) / self.cell.x).floor() as i64).clamp(0, last_x);
        let min_y = (((position.y - r - self.min.y) / self.cell.y).floor() as i64).clamp(0, last_y);
        let max_x = (((position.x + r - self.min.x) / self.cell.x).ceil() as i64).clamp(0, last_x);
        let max_y = (((position.y + r - self.min.y) / self.cell.y).ceil() as i64).clamp(0, last_y);

        for y in min_y as usize..=max_y as usize {
            for x in min_x as usize..=max_x as usize {
                let d = (self.cell_centre(x, y) - position).length();
                if d > r {
                    continue;
                }
                let w = smoothstep((1.0 - d / r).clamp(0.0, 1.0));
                let cell = &mut self.intensity[y * self.width + x];
                *cell = (*cell + w * strength).min(1.0);
            }
        }
    }

    // Linear fade; anything left at or below min_intensity is zeroed
    pub fn decay(&mut self, dt: f32) {
        let amount = self.decay_per_second * dt;
        if amount <= 0.0 {
            return;
        }
        let floor = self.min_intensity;
        for v in self.intensity.iter_mut().filter(|v| **v > 0.0) {
            let next = (*v - amount).max(0.0);
            *v = if next <= floor { 0.0 } else { next };
        }
    }
}

impl VectorField for TrailField {
    fn sample(&self, position: Vec2) -> Vec2 {
        let Some((x, y)) = self.cell_of(position) else {
            return Vec2::ZERO;
        };

        let centre = self.intensity[y * self.width + x];
        if centre < self.intensity_threshold {
            return Vec2::ZERO;
        }

        let (xi, yi) = (x as i64, y as i64);
        let gradient = vec2(
            self.clamped(xi + 1, yi) - self.clamped(xi - 1, yi),
            self.clamped(xi, yi + 1) - self.clamped(xi, yi - 1),
        );
        let magnitude = gradient.length();
        if magnitude < 1e-5 {
            return Vec2::ZERO;
        }

        let scale = if self.scale_by_intensity { centre } else { 1.0 };
        gradient / magnitude * (self.gradient_strength * scale)
    }
}

/// Per-agent countdown between trail paints.
#[derive(Debug, Clone, Copy, Default)]
pub struct TrailPainter {
    timer: f32,
}

impl TrailPainter {
    // True when the agent should paint this tick
    pub fn tick(&mut self, dt: f32, interval: f32) -> bool {
        self.timer -= dt;
        if self.timer > 0.0 {
            return false;
        }
        self.timer = interval.max(0.01);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_field() -> TrailField {
        TrailField::new(&TrailSettings {
            world_min: (-5.0, -5.0),
            world_max: (5.0, 5.0),
            resolution: (20, 20),
            ..TrailSettings::default()
        })
    }

    #[test]
    fn null_and_closure_fields() {
        assert_eq!(NullField.sample(vec2(3.0, 4.0)), Vec2::ZERO);
        let east = |_p: Vec2| vec2(1.0, 0.0);
        assert_eq!(east.sample(Vec2::ZERO), vec2(1.0, 0.0));
    }

    #[test]
    fn gradient_points_toward_painted_spot() {
        let mut field = small_field();
        field.paint(vec2(1.0, 0.0), 1.5, 1.0);

        let v = field.sample(vec2(0.2, 0.0));
        assert!(v.x > 0.0, "expected an eastward pull, got {v:?}");
        assert!(v.length() <= 1.0 + 1e-5);
    }

    #[test]
    fn paint_saturates_at_one() {
        let mut field = small_field();
        for _ in 0..20 {
            field.paint(Vec2::ZERO, 1.0, 1.0);
        }
        assert!(field.intensities().iter().all(|v| (0.0..=1.0).contains(v)));
        assert!(field.intensity_at(vec2(0.1, 0.1)) > 0.9);
    }

    #[test]
    fn faint_or_outside_samples_are_zero() {
        let field = small_field();
        assert_eq!(field.sample(Vec2::ZERO), Vec2::ZERO);

        let mut painted = small_field();
        painted.paint(Vec2::ZERO, 1.0, 1.0);
        assert_eq!(painted.sample(vec2(50.0, 0.0)), Vec2::ZERO);
    }

    #[test]
    fn decay_fades_and_snaps_to_zero() {
        let mut field = small_field();
        field.paint(vec2(0.25, 0.25), 1.0, 0.3);
        let before = field.intensity_at(vec2(0.25, 0.25));
        assert!(before > 0.0);

        field.decay(0.5);
        let after = field.intensity_at(vec2(0.25, 0.25));
        assert!(after < before);

        field.decay(10.0);
        assert!(field.intensities().iter().all(|v| *v == 0.0));
    }

    #[test]
    fn painter_fires_then_waits_for_interval() {
        let mut painter = TrailPainter::default();
        assert!(painter.tick(0.016, 0.05));
        assert!(!painter.tick(0.016, 0.05));
        assert!(!painter.tick(0.016, 0.05));
        assert!(painter.tick(0.02, 0.05));
    }
}
