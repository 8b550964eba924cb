/*
 * UI Module
 *
 * The egui control panel: run stats, the selected agent, and sliders that edit
 * the pending settings for the next restart.
 */

use nannou_egui::egui;

use super::Model;
use crate::settings::{ReturnExitPolicy, SimulationSettings};

#[derive(Debug, Default, Clone, Copy)]
pub struct UiActions {
    pub restart: bool,
    pub reset_camera: bool,
}

pub fn update_ui(model: &mut Model) -> UiActions {
    let mut actions = UiActions::default();

    let Model {
        world,
        pending,
        egui,
        camera,
        selected,
        paused,
        show_trail,
        show_debug,
        frame_stats,
        status,
        ..
    } = model;

    let ctx = egui.begin_frame();
    let run = world.stats();

    egui::Window::new("Phosphers")
        .default_pos([10.0, 10.0])
        .show(&ctx, |ui| {
            ui.collapsing("Run", |ui| {
                ui.label(format!("Score: {}", run.score));
                ui.label(format!("Elapsed: {:.1} s", run.elapsed));
                ui.label(format!("Agents: {} ({} to spawn)", world.swarm().len(), world.pending_spawns()));
                ui.label(format!("Bits in world: {}", world.bits().len()));
                let juice = world.juice();
                ui.add(
                    egui::ProgressBar::new(juice.fraction())
                        .text(format!("Trail juice {:.0} / {:.0}", juice.current(), juice.max())),
                );
                ui.label("Shift + drag to draw trail");
                ui.label(format!(
                    "Bits spawned / picked / deposited: {} / {} / {}",
                    run.bits_spawned, run.bits_picked_up, run.bits_deposited
                ));
                ui.horizontal(|ui| {
                    ui.checkbox(paused, "Pause");
                    if ui.button("Reset run").clicked() {
                        world.reset();
                        *selected = None;
                        frame_stats.clear_totals();
                    }
                });
            });

            ui.collapsing("Selected agent", |ui| match selected.and_then(|id| world.swarm().get(id)) {
                Some(agent) => {
                    ui.label(format!("State: {}", agent.state()));
                    ui.label(format!("Speed: {:.2}", agent.velocity().length()));
                    ui.label(format!(
                        "Carrying: {} ({:.2} / {:.2})",
                        agent.inventory().len(),
                        agent.inventory().current_weight(),
                        agent.inventory().max_weight()
                    ));
                    if let Some(remaining) = agent.lifetime_remaining() {
                        ui.label(format!("Lifetime: {remaining:.1} s"));
                    }
                    ui.label("T toggles Return");
                }
                None => {
                    ui.label("Click an agent to select it");
                }
            });

            ui.collapsing("Next run", |ui| {
                let p = &mut pending.phospher;
                ui.add(egui::Slider::new(&mut pending.spawn.count, SimulationSettings::agent_count_range()).text("Agents"));
                ui.add(egui::Slider::new(&mut p.max_speed, SimulationSettings::max_speed_range()).text("Max speed"));
                ui.separator();
                ui.add(egui::Slider::new(&mut p.weight_separation, SimulationSettings::weight_range()).text("Separation"));
                ui.add(egui::Slider::new(&mut p.weight_alignment, SimulationSettings::weight_range()).text("Alignment"));
                ui.add(egui::Slider::new(&mut p.weight_cohesion, SimulationSettings::weight_range()).text("Cohesion"));
                ui.add(egui::Slider::new(&mut p.weight_signal, SimulationSettings::weight_range()).text("Signal"));
                ui.add(egui::Slider::new(&mut p.weight_return, SimulationSettings::weight_range()).text("Return"));
                ui.add(egui::Slider::new(&mut p.weight_noise, SimulationSettings::weight_range()).text("Noise"));
                ui.separator();
                ui.add(egui::Slider::new(&mut p.neighbour_radius, SimulationSettings::radius_range()).text("Neighbour radius"));
                ui.add(egui::Slider::new(&mut p.separation_radius, SimulationSettings::radius_range()).text("Separation radius"));
                ui.add(
                    egui::Slider::new(&mut pending.perception.sight_radius, SimulationSettings::radius_range())
                        .text("Sight radius"),
                );
                ui.separator();
                ui.label("Leave Return");
                ui.radio_value(&mut p.return_exit_policy, ReturnExitPolicy::AfterEachDeposit, "after each deposit");
                ui.radio_value(&mut p.return_exit_policy, ReturnExitPolicy::WhenEmpty, "when empty");
                ui.checkbox(&mut pending.trail.enabled, "Trail field");
                if ui
                    .add(egui::Slider::new(&mut pending.draw.max_juice, 0.0..=500.0).text("Max juice"))
                    .changed()
                {
                    // Runs start full
                    pending.draw.starting_juice = pending.draw.max_juice;
                }
                ui.add(egui::Slider::new(&mut pending.draw.juice_per_second, 0.0..=50.0).text("Juice per second"));

                if ui.button("Restart run").clicked() {
                    actions.restart = true;
                }
                if let Some(message) = status.as_deref() {
                    ui.colored_label(egui::Color32::LIGHT_RED, message);
                }
            });

            ui.collapsing("View", |ui| {
                ui.checkbox(show_trail, "Show trail");
                ui.checkbox(show_debug, "Debug overlay");
                ui.label(format!("Zoom: {:.0} px/unit", camera.zoom));
                if ui.button("Reset camera").clicked() {
                    actions.reset_camera = true;
                }
                ui.label(format!("FPS: {:.1}", frame_stats.fps));
                ui.label(format!("Physics steps this frame: {}", frame_stats.physics_steps));
            });
        });

    actions
}
