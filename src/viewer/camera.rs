/*
 * Camera Module
 *
 * Pan and zoom for the viewer. The simulation works in small world units (the
 * anchor is under one unit across), so zoom is expressed in pixels per world unit.
 */

use nannou::geom::Rect;
use nannou::prelude::Vec2;

pub struct Camera {
    // World point at the window centre
    pub position: Vec2,
    // Pixels per world unit
    pub zoom: f32,
    pub min_zoom: f32,
    pub max_zoom: f32,
    pub is_dragging: bool,
    last_cursor_pos: Vec2,
}

impl Default for Camera {
    fn default() -> Self {
        Self {
            position: Vec2::ZERO,
            zoom: 60.0,
            min_zoom: 5.0,
            max_zoom: 600.0,
            is_dragging: false,
            last_cursor_pos: Vec2::ZERO,
        }
    }
}

impl Camera {
    pub fn world_to_screen(&self, point: Vec2, window_rect: Rect) -> Vec2 {
        (point - self.position) * self.zoom + window_rect.xy()
    }

    pub fn screen_to_world(&self, point: Vec2, window_rect: Rect) -> Vec2 {
        (point - window_rect.xy()) / self.zoom + self.position
    }

    // World-space rectangle currently on screen
    pub fn visible_world(&self, window_rect: Rect) -> Rect {
        let bottom_left = self.screen_to_world(window_rect.bottom_left().into(), window_rect);
        let top_right = self.screen_to_world(window_rect.top_right().into(), window_rect);
        Rect::from_corners(bottom_left.into(), top_right.into())
    }

    // Zoom about the cursor so the point under it stays put
    pub fn zoom_at(&mut self, scroll: f32, cursor: Vec2, window_rect: Rect) {
        let before = self.screen_to_world(cursor, window_rect);
        self.zoom = (self.zoom * (1.0 + scroll * 0.1)).clamp(self.min_zoom, self.max_zoom);
        let after = self.screen_to_world(cursor, window_rect);
        self.position += before - after;
    }

    pub fn start_drag(&mut self, cursor: Vec2) {
        self.last_cursor_pos = cursor;
        self.is_dragging = true;
    }

    pub fn drag(&mut self, cursor: Vec2) {
        if !self.is_dragging {
            return;
        }
        let delta = cursor - self.last_cursor_pos;
        if delta.length_squared() > 0.0 {
            self.position -= delta / self.zoom;
            self.last_cursor_pos = cursor;
        }
    }

    pub fn end_drag(&mut self) {
        self.is_dragging = false;
    }

    pub fn reset(&mut self) {
        let (min_zoom, max_zoom) = (self.min_zoom, self.max_zoom);
        *self = Self {
            min_zoom,
            max_zoom,
            ..Self::default()
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nannou::prelude::vec2;

    fn window() -> Rect {
        Rect::from_w_h(800.0, 600.0)
    }

    #[test]
    fn screen_and_world_round_trip() {
        let camera = Camera {
            position: vec2(2.0, -1.0),
            ..Camera::default()
        };
        let p = vec2(3.5, 0.25);
        let back = camera.screen_to_world(camera.world_to_screen(p, window()), window());
        assert!((back - p).length() < 1e-4);
    }

    #[test]
    fn zoom_keeps_cursor_point_fixed() {
        let mut camera = Camera::default();
        let cursor = vec2(120.0, -40.0);
        let before = camera.screen_to_world(cursor, window());
        camera.zoom_at(3.0, cursor, window());
        let after = camera.screen_to_world(cursor, window());
        assert!((before - after).length() < 1e-4);
        assert!(camera.zoom > 60.0);
    }

    #[test]
    fn drag_moves_against_cursor() {
        let mut camera = Camera::default();
        camera.start_drag(vec2(0.0, 0.0));
        camera.drag(vec2(60.0, 0.0));
        camera.end_drag();
        assert!((camera.position.x + 1.0).abs() < 1e-5);
        camera.drag(vec2(500.0, 0.0));
        assert!((camera.position.x + 1.0).abs() < 1e-5);
    }
}
