/*
 * Renderer Module
 *
 * Draws one frame: the trail heat map, the anchor ring, bits, and agents as
 * triangles tinted by state. Anything outside the visible world rectangle is
 * skipped.
 */

use nannou::prelude::*;
use tracing::warn;

use super::camera::Camera;
use super::Model;
use crate::field::TrailField;
use crate::phospher::{AgentState, Phospher};
use crate::resources::BitType;

// Agent triangle length in world units
const AGENT_SIZE: f32 = 0.18;
const BIT_RADIUS: f32 = 0.08;
// Cells fainter than this aren't drawn
const TRAIL_DRAW_THRESHOLD: f32 = 0.02;

fn state_color(state: AgentState) -> Rgba {
    match state {
        AgentState::Forage => rgba(0.55, 0.85, 1.0, 1.0),
        AgentState::Seek => rgba(1.0, 0.85, 0.3, 1.0),
        AgentState::Return => rgba(0.5, 1.0, 0.55, 1.0),
        AgentState::Recover => rgba(1.0, 0.35, 0.35, 1.0),
    }
}

fn bit_color(kind: BitType) -> Rgba {
    match kind {
        BitType::Generic => rgba(0.95, 0.95, 0.8, 1.0),
        BitType::Rare => rgba(0.85, 0.45, 1.0, 1.0),
        BitType::Heavy => rgba(1.0, 0.6, 0.25, 1.0),
    }
}

pub fn view(app: &App, model: &Model, frame: Frame) {
    let draw = app.draw();
    draw.background().color(rgb(0.03, 0.03, 0.06));

    let window_rect = app.window_rect();
    let camera = &model.camera;
    let visible = camera.visible_world(window_rect).pad(-1.0);

    if model.show_trail {
        if let Some(trail) = model.world.trail() {
            draw_trail(&draw, trail, camera, window_rect, visible);
        }
    }

    let anchor = model.world.anchor();
    let centre = camera.world_to_screen(anchor.position, window_rect);
    draw.ellipse()
        .xy(centre)
        .radius(anchor.outer_radius * camera.zoom)
        .color(rgba(0.25, 0.2, 0.45, 0.6))
        .stroke(rgba(0.7, 0.6, 1.0, 1.0))
        .stroke_weight(2.0);

    for (_, bit) in model.world.bits().iter() {
        if !visible.contains(bit.position) {
            continue;
        }
        let alpha = if bit.available { 1.0 } else { 0.3 };
        let mut color = bit_color(bit.spec.kind);
        color.alpha = alpha;
        draw.ellipse()
            .xy(camera.world_to_screen(bit.position, window_rect))
            .radius((BIT_RADIUS * camera.zoom).max(2.0))
            .color(color);
    }

    for (id, agent) in model.world.swarm().iter() {
        if !visible.contains(agent.position()) {
            continue;
        }
        draw_agent(&draw, agent, camera, window_rect, Some(id) == model.selected);
    }

    if let Some(agent) = model.selected.and_then(|id| model.world.swarm().get(id)) {
        draw_selection(&draw, agent, model, window_rect);
    }

    if model.show_debug {
        draw_debug_info(&draw, model, window_rect);
    }

    if let Err(err) = draw.to_frame(app, &frame) {
        warn!(?err, "failed to draw frame");
    }
    if let Err(err) = model.egui.draw_to_frame(&frame) {
        warn!(?err, "failed to draw ui");
    }
}

fn draw_trail(draw: &Draw, trail: &TrailField, camera: &Camera, window_rect: Rect, visible: Rect) {
    let (width, height) = trail.dimensions();
    let cell = trail.cell_size() * camera.zoom;
    let intensities = trail.intensities();

    for y in 0..height {
        for x in 0..width {
            let value = intensities[y * width + x];
            if value < TRAIL_DRAW_THRESHOLD {
                continue;
            }
            let centre = trail.cell_centre(x, y);
            if !visible.contains(centre) {
                continue;
            }
            draw.rect()
                .xy(camera.world_to_screen(centre, window_rect))
                .wh(cell)
                .color(rgba(0.2, 0.75, 1.0, value * 0.45));
        }
    }
}

fn draw_agent(draw: &Draw, agent: &Phospher, camera: &Camera, window_rect: Rect, selected: bool) {
    let size = (AGENT_SIZE * camera.zoom).max(4.0);
    let points = [
        pt2(size, 0.0),
        pt2(-size * 0.6, size * 0.45),
        pt2(-size * 0.6, -size * 0.45),
    ];

    let mut color = state_color(agent.state());
    if !agent.inventory().is_empty() {
        // Carriers glow brighter
        color.red = (color.red + 0.2).min(1.0);
        color.green = (color.green + 0.2).min(1.0);
        color.blue = (color.blue + 0.2).min(1.0);
    }

    let screen = camera.world_to_screen(agent.position(), window_rect);
    draw.polygon()
        .color(color)
        .points(points)
        .xy(screen)
        .rotate(agent.heading());

    if selected {
        draw.ellipse()
            .xy(screen)
            .radius(size * 1.6)
            .no_fill()
            .stroke(WHITE)
            .stroke_weight(1.5);
    }
}

fn draw_selection(draw: &Draw, agent: &Phospher, model: &Model, window_rect: Rect) {
    let camera = &model.camera;
    let screen = camera.world_to_screen(agent.position(), window_rect);
    let settings = agent.settings();

    // Sight and neighbourhood rings
    draw.ellipse()
        .xy(screen)
        .radius(agent.perception().sight_radius * camera.zoom)
        .no_fill()
        .stroke(rgba(0.3, 1.0, 0.6, 0.35))
        .stroke_weight(1.0);
    draw.ellipse()
        .xy(screen)
        .radius(settings.phospher.neighbour_radius * camera.zoom)
        .no_fill()
        .stroke(rgba(1.0, 1.0, 1.0, 0.15))
        .stroke_weight(1.0);

    // Line to the locked target
    if let Some(bit) = agent.seek_target().and_then(|id| model.world.bits().get(id)) {
        draw.line()
            .start(screen)
            .end(camera.world_to_screen(bit.position, window_rect))
            .color(rgba(1.0, 0.85, 0.3, 0.6))
            .weight(1.0);
    }

    // Velocity
    draw.arrow()
        .start(screen)
        .end(screen + agent.velocity() * camera.zoom * 0.3)
        .color(rgba(1.0, 1.0, 1.0, 0.6))
        .weight(1.5);
}

fn draw_debug_info(draw: &Draw, model: &Model, window_rect: Rect) {
    let stats = &model.frame_stats;
    let lines = [
        format!("FPS: {:.1}", stats.fps),
        format!("Frame time: {:.2} ms", stats.frame_time.as_secs_f64() * 1000.0),
        format!("Physics steps: {} (alpha {:.2})", stats.physics_steps, stats.step_alpha),
        format!("Agents: {}", model.world.swarm().len()),
        format!("Pickups: {}  Deposits: {}", stats.pickups, stats.deposits),
        format!("Recoveries: {}  Expired: {}", stats.recoveries, stats.expired),
        format!("Paused: {}", model.paused),
    ];

    let margin = 20.0;
    let line_height = 18.0;
    let panel_w = 260.0;
    let panel_h = line_height * lines.len() as f32 + margin;
    draw.rect()
        .x_y(window_rect.right() - panel_w / 2.0, window_rect.top() - panel_h / 2.0)
        .w_h(panel_w, panel_h)
        .color(rgba(0.0, 0.0, 0.0, 0.7));

    for (i, text) in lines.iter().enumerate() {
        draw.text(text)
            .x_y(
                window_rect.right() - panel_w / 2.0,
                window_rect.top() - margin - i as f32 * line_height,
            )
            .w(panel_w - margin)
            .left_justify()
            .color(WHITE)
            .font_size(13);
    }
}
