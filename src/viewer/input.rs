/*
 * Input Module
 *
 * Mouse and keyboard handlers for the viewer window.
 * - Left click: select the agent under the cursor, or start panning
 * - Shift + left drag: paint the trail, spending juice
 * - Right click: drop a bit at the cursor
 * - Wheel: zoom about the cursor
 * - Space pauses, T toggles Return on the selected agent, R resets the run,
 *   D toggles the debug overlay
 */

use nannou::prelude::*;
use nannou::winit::event::{MouseButton, MouseScrollDelta, TouchPhase, WindowEvent};
use tracing::debug;

use super::Model;

// Screen-space pick radius for agent selection
const PICK_RADIUS_PX: f32 = 12.0;

pub fn mouse_moved(_app: &App, model: &mut Model, pos: Point2) {
    model.camera.drag(pos);
    model.mouse_position = pos;
}

pub fn mouse_pressed(app: &App, model: &mut Model, button: MouseButton) {
    if model.egui.ctx().is_pointer_over_area() {
        return;
    }

    let window_rect = app.window_rect();
    let world_pos = model.camera.screen_to_world(model.mouse_position, window_rect);

    match button {
        MouseButton::Left if app.keys.mods.shift() => {
            model.drawing = true;
        }
        MouseButton::Left => {
            let radius = PICK_RADIUS_PX / model.camera.zoom;
            match model.world.agent_near(world_pos, radius) {
                Some(id) => {
                    model.selected = Some(id);
                    debug!(?id, "selected agent");
                }
                None => {
                    model.selected = None;
                    model.camera.start_drag(model.mouse_position);
                }
            }
        }
        MouseButton::Right => {
            let spec = model.world.settings().default_bit;
            model.world.drop_bit(spec, world_pos);
        }
        _ => {}
    }
}

pub fn mouse_released(_app: &App, model: &mut Model, button: MouseButton) {
    if button == MouseButton::Left {
        model.camera.end_drag();
        if model.drawing {
            model.drawing = false;
            model.world.stop_drawing();
        }
    }
}

pub fn mouse_wheel(app: &App, model: &mut Model, delta: MouseScrollDelta, _phase: TouchPhase) {
    let scroll = match delta {
        MouseScrollDelta::LineDelta(_, y) => y,
        MouseScrollDelta::PixelDelta(pos) => pos.y as f32 * 0.01,
    };
    model.camera.zoom_at(scroll, model.mouse_position, app.window_rect());
}

pub fn key_pressed(_app: &App, model: &mut Model, key: Key) {
    if model.egui.ctx().wants_keyboard_input() {
        return;
    }

    match key {
        Key::Space => model.paused = !model.paused,
        Key::T => {
            if let Some(id) = model.selected {
                model.world.toggle_return(id);
            }
        }
        Key::R => {
            model.world.reset();
            model.selected = None;
            model.frame_stats.clear_totals();
        }
        Key::D => model.show_debug = !model.show_debug,
        _ => {}
    }
}

pub fn raw_window_event(_app: &App, model: &mut Model, event: &WindowEvent) {
    model.egui.handle_raw_event(event);
}
