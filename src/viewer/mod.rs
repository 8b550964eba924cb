/*
 * Viewer Module
 *
 * Interactive nannou front end for a run. It owns the World and advances it from
 * the frame clock; everything it shows is read back from the world after the
 * physics steps for the frame have run.
 *
 * Settings edited in the panel go into a pending copy and only take effect when
 * the run is restarted, so a run never sees its settings change mid-flight.
 */

pub mod camera;
pub mod debug;
pub mod input;
pub mod renderer;
pub mod ui;

use std::path::PathBuf;

use nannou::prelude::*;
use nannou_egui::Egui;
use tracing::{info, warn};

use crate::events::SimEvent;
use crate::settings::SimulationSettings;
use crate::swarm::AgentId;
use crate::world::World;

use self::camera::Camera;
use self::debug::FrameStats;

pub struct Model {
    pub world: World,
    // Edited by the panel, applied on restart
    pub pending: SimulationSettings,
    pub egui: Egui,
    pub camera: Camera,
    pub mouse_position: Vec2,
    pub selected: Option<AgentId>,
    pub paused: bool,
    // Shift + left drag paints the trail
    pub drawing: bool,
    pub show_trail: bool,
    pub show_debug: bool,
    pub frame_stats: FrameStats,
    // Last restart error, shown in the panel
    pub status: Option<String>,
}

pub fn run() {
    nannou::app(model).update(update).run();
}

// nannou's model fn can't take arguments; the settings path comes from argv
fn settings_path() -> Option<PathBuf> {
    std::env::args_os().nth(1).map(PathBuf::from)
}

fn load_settings() -> SimulationSettings {
    let Some(path) = settings_path() else {
        return SimulationSettings::default();
    };
    match SimulationSettings::load(&path) {
        Ok(settings) => {
            info!(path = %path.display(), "loaded settings");
            settings
        }
        Err(err) => {
            warn!(path = %path.display(), %err, "falling back to default settings");
            SimulationSettings::default()
        }
    }
}

// Start a world, falling back to defaults if the requested settings are rejected
fn start_world(settings: SimulationSettings) -> (World, SimulationSettings) {
    match World::new(settings.clone()) {
        Ok(world) => (world, settings),
        Err(err) => {
            warn!(%err, "settings rejected; using defaults");
            let defaults = SimulationSettings::default();
            let world = World::new(defaults.clone()).expect("default settings validate");
            (world, defaults)
        }
    }
}

fn model(app: &App) -> Model {
    let window_id = app
        .new_window()
        .title("Phosphers")
        .size(1280, 800)
        .view(renderer::view)
        .mouse_moved(input::mouse_moved)
        .mouse_pressed(input::mouse_pressed)
        .mouse_released(input::mouse_released)
        .mouse_wheel(input::mouse_wheel)
        .key_pressed(input::key_pressed)
        .raw_event(input::raw_window_event)
        .build()
        .expect("failed to create window");

    let window = app.window(window_id).expect("window was just created");
    let egui = Egui::from_window(&window);

    let (world, pending) = start_world(load_settings());

    Model {
        world,
        pending,
        egui,
        camera: Camera::default(),
        mouse_position: Vec2::ZERO,
        selected: None,
        paused: false,
        drawing: false,
        show_trail: true,
        show_debug: false,
        frame_stats: FrameStats::default(),
        status: None,
    }
}

fn update(app: &App, model: &mut Model, update: Update) {
    model.frame_stats.fps = app.fps();
    model.frame_stats.frame_time = update.since_last;

    model.egui.set_elapsed_time(update.since_start);
    let actions = ui::update_ui(model);

    if actions.reset_camera {
        model.camera.reset();
    }
    if actions.restart {
        restart(model);
    }

    if model.drawing && !model.paused {
        let brush = model.camera.screen_to_world(model.mouse_position, app.window_rect());
        model.world.draw_trail(brush, update.since_last.as_secs_f32());
    }

    if model.paused {
        model.frame_stats.physics_steps = 0;
    } else {
        model.frame_stats.physics_steps = model.world.advance(update.since_last);
    }
    model.frame_stats.step_alpha = model.world.step_alpha();

    let selected = model.selected;
    let mut lost_selection = false;
    for event in model.world.drain_events() {
        model.frame_stats.record(&event);
        if let SimEvent::Expired { agent } = event {
            lost_selection |= Some(agent) == selected;
        }
    }
    if lost_selection {
        model.selected = None;
    }
}

fn restart(model: &mut Model) {
    match World::new(model.pending.clone()) {
        Ok(world) => {
            model.world = world;
            model.selected = None;
            model.drawing = false;
            model.status = None;
            model.frame_stats.clear_totals();
        }
        Err(err) => {
            warn!(%err, "restart rejected");
            model.status = Some(err.to_string());
        }
    }
}
