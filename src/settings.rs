/*
 * Settings Module
 *
 * The immutable configuration record for a run. Every weight, radius, and speed
 * the agents use lives here; a run shares one copy through an `Arc` and never
 * mutates it. Settings load from TOML (missing keys take their defaults) and are
 * validated before a run starts.
 *
 * Slider ranges for the viewer's control panel are kept next to the fields they
 * bound.
 */

use std::ops::RangeInclusive;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::resources::BitSpec;

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("failed to read settings from {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse settings: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid setting `{field}`: {reason}")]
    Invalid { field: &'static str, reason: String },
}

/// What a returning agent does after a successful deposit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ReturnExitPolicy {
    /// Go back to foraging after any single deposit, even with items left.
    #[default]
    AfterEachDeposit,
    /// Stay in Return until the inventory is empty.
    WhenEmpty,
}

// Per-agent steering, collision, and recovery parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PhospherSettings {
    // Kinematics
    pub max_speed: f32,
    pub max_accel: f32,
    pub max_turn_rate_deg: f32,

    // Neighbourhood radii
    pub neighbour_radius: f32,
    pub separation_radius: f32,

    // Anchor contact
    pub anchor_edge_snap_margin: f32,
    pub anchor_exit_speed_factor: f32,
    pub anchor_exit_jitter_deg: f32,
    pub anchor_collision_epsilon: f32,

    // Boundary layer around the anchor while foraging
    pub anchor_avoid_band: f32,
    pub anchor_avoid_normal_k: f32,
    pub anchor_avoid_tangent_k: f32,

    // Forage rim slide
    pub forage_slide_speed_factor: f32,
    pub forage_collision_epsilon: f32,

    // Inside-anchor failsafe
    pub recover_inside_slack: f32,
    pub recover_exit_buffer: f32,
    pub recover_step_out_speed: f32,
    pub recover_hold_seconds: f32,
    pub recover_jitter_deg: f32,
    pub recover_timeout_seconds: f32,

    // Seek
    pub seek_steer_weight: f32,
    pub seek_flock_dampen: f32,

    // Weights
    pub weight_cohesion: f32,
    pub weight_alignment: f32,
    pub weight_separation: f32,
    pub weight_signal: f32,
    pub weight_return: f32,
    pub weight_noise: f32,
    pub noise_jitter_per_sec: f32,

    pub return_exit_policy: ReturnExitPolicy,

    // Optional lifetime, picked uniformly from the range at spawn
    pub use_lifetime: bool,
    pub lifetime_seconds_range: (f32, f32),
}

impl Default for PhospherSettings {
    fn default() -> Self {
        Self {
            max_speed: 3.5,
            max_accel: 10.0,
            max_turn_rate_deg: 720.0,
            neighbour_radius: 3.0,
            separation_radius: 1.0,
            anchor_edge_snap_margin: 0.02,
            anchor_exit_speed_factor: 0.9,
            anchor_exit_jitter_deg: 12.0,
            anchor_collision_epsilon: 0.01,
            anchor_avoid_band: 0.25,
            anchor_avoid_normal_k: 10.0,
            anchor_avoid_tangent_k: 8.0,
            forage_slide_speed_factor: 0.9,
            forage_collision_epsilon: 0.01,
            recover_inside_slack: 0.02,
            recover_exit_buffer: 0.04,
            recover_step_out_speed: 8.0,
            recover_hold_seconds: 0.12,
            recover_jitter_deg: 10.0,
            recover_timeout_seconds: 0.25,
            seek_steer_weight: 3.0,
            seek_flock_dampen: 0.25,
            weight_cohesion: 0.8,
            weight_alignment: 1.0,
            weight_separation: 1.5,
            weight_signal: 1.0,
            weight_return: 2.0,
            weight_noise: 0.25,
            noise_jitter_per_sec: 1.0,
            return_exit_policy: ReturnExitPolicy::AfterEachDeposit,
            use_lifetime: false,
            lifetime_seconds_range: (30.0, 45.0),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InventorySettings {
    pub max_weight: f32,
    pub max_count_per_type: u32,
}

impl Default for InventorySettings {
    fn default() -> Self {
        Self {
            max_weight: 1.0,
            max_count_per_type: 1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PerceptionSettings {
    pub sight_radius: f32,
    // 180 means all around
    pub fov_half_angle_deg: f32,
    pub tick_interval: f32,
}

impl Default for PerceptionSettings {
    fn default() -> Self {
        Self {
            sight_radius: 4.0,
            fov_half_angle_deg: 180.0,
            tick_interval: 0.08,
        }
    }
}

// Where and how fast new agents appear around the anchor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpawnSettings {
    pub count: usize,
    pub spawn_over_time: bool,
    pub interval: f32,
    pub interval_jitter: (f32, f32),
    pub margin_from_anchor: f32,
    pub annulus_min: f32,
    pub annulus_max: f32,
    pub use_sector: bool,
    pub sector_centre_deg: f32,
    pub sector_half_angle_deg: f32,
    pub spacing: f32,
    pub max_attempts: usize,
}

impl Default for SpawnSettings {
    fn default() -> Self {
        Self {
            count: 12,
            spawn_over_time: true,
            interval: 0.15,
            interval_jitter: (0.0, 0.10),
            margin_from_anchor: 0.2,
            annulus_min: 1.5,
            annulus_max: 3.0,
            use_sector: true,
            sector_centre_deg: 0.0,
            sector_half_angle_deg: 45.0,
            spacing: 0.8,
            max_attempts: 20,
        }
    }
}

// Trail signal grid and how agents paint into it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrailSettings {
    pub enabled: bool,
    pub world_min: (f32, f32),
    pub world_max: (f32, f32),
    pub resolution: (usize, usize),
    pub decay_per_second: f32,
    pub min_intensity: f32,
    pub gradient_strength: f32,
    pub intensity_threshold: f32,
    pub scale_by_intensity: bool,
    pub paint_radius: f32,
    pub paint_strength: f32,
    pub paint_interval: f32,
}

impl Default for TrailSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            world_min: (-20.0, -20.0),
            world_max: (20.0, 20.0),
            resolution: (128, 128),
            decay_per_second: 0.2,
            min_intensity: 0.01,
            gradient_strength: 1.0,
            intensity_threshold: 0.02,
            scale_by_intensity: true,
            paint_radius: 0.6,
            paint_strength: 0.25,
            paint_interval: 0.05,
        }
    }
}

// Player drawing into the trail field, paid for from the juice budget
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrailDrawSettings {
    pub radius: f32,
    pub strength: f32,
    pub interval: f32,
    pub juice_per_second: f32,
    pub max_juice: f32,
    pub starting_juice: f32,
}

impl Default for TrailDrawSettings {
    fn default() -> Self {
        Self {
            radius: 0.8,
            strength: 0.6,
            interval: 0.02,
            juice_per_second: 6.0,
            max_juice: 100.0,
            starting_juice: 100.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationSettings {
    // Fixed seed for reproducible runs; None seeds from entropy
    pub seed: Option<u64>,
    pub physics_fps: f32,
    pub max_steps_per_frame: usize,
    pub anchor_radius: f32,
    // Radius of an agent's body for pickup overlap
    pub pickup_radius: f32,
    pub bit_grid_cell_size: f32,
    pub max_active_bits: Option<usize>,
    pub default_bit: BitSpec,
    pub phospher: PhospherSettings,
    pub inventory: InventorySettings,
    pub perception: PerceptionSettings,
    pub spawn: SpawnSettings,
    pub trail: TrailSettings,
    pub draw: TrailDrawSettings,
}

impl Default for SimulationSettings {
    fn default() -> Self {
        Self {
            seed: None,
            physics_fps: 60.0,
            max_steps_per_frame: 8,
            anchor_radius: 0.8,
            pickup_radius: 0.25,
            bit_grid_cell_size: 2.0,
            max_active_bits: Some(64),
            default_bit: BitSpec::GENERIC,
            phospher: PhospherSettings::default(),
            inventory: InventorySettings::default(),
            perception: PerceptionSettings::default(),
            spawn: SpawnSettings::default(),
            trail: TrailSettings::default(),
            draw: TrailDrawSettings::default(),
        }
    }
}

fn non_negative(field: &'static str, value: f32) -> Result<(), SettingsError> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(SettingsError::Invalid {
            field,
            reason: format!("must be a finite non-negative number, got {value}"),
        })
    }
}

fn positive(field: &'static str, value: f32) -> Result<(), SettingsError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(SettingsError::Invalid {
            field,
            reason: format!("must be a finite positive number, got {value}"),
        })
    }
}

fn ordered(field: &'static str, range: (f32, f32)) -> Result<(), SettingsError> {
    if range.0 <= range.1 {
        Ok(())
    } else {
        Err(SettingsError::Invalid {
            field,
            reason: format!("lower bound {} exceeds upper bound {}", range.0, range.1),
        })
    }
}

impl SimulationSettings {
    pub fn from_toml_str(text: &str) -> Result<Self, SettingsError> {
        let settings: SimulationSettings = toml::from_str(text)?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, SettingsError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| SettingsError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    pub fn to_toml_string(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }

    pub fn physics_step_seconds(&self) -> f32 {
        1.0 / self.physics_fps
    }

    // Reject values that would make the kinematics divide by zero or run backwards
    pub fn validate(&self) -> Result<(), SettingsError> {
        positive("physics_fps", self.physics_fps)?;
        positive("anchor_radius", self.anchor_radius)?;
        non_negative("pickup_radius", self.pickup_radius)?;
        positive("bit_grid_cell_size", self.bit_grid_cell_size)?;
        non_negative("default_bit.weight", self.default_bit.weight)?;

        let p = &self.phospher;
        positive("phospher.max_speed", p.max_speed)?;
        non_negative("phospher.max_accel", p.max_accel)?;
        non_negative("phospher.max_turn_rate_deg", p.max_turn_rate_deg)?;
        non_negative("phospher.neighbour_radius", p.neighbour_radius)?;
        non_negative("phospher.separation_radius", p.separation_radius)?;
        non_negative("phospher.anchor_edge_snap_margin", p.anchor_edge_snap_margin)?;
        non_negative("phospher.anchor_exit_jitter_deg", p.anchor_exit_jitter_deg)?;
        non_negative("phospher.anchor_collision_epsilon", p.anchor_collision_epsilon)?;
        non_negative("phospher.forage_collision_epsilon", p.forage_collision_epsilon)?;
        non_negative("phospher.recover_inside_slack", p.recover_inside_slack)?;
        non_negative("phospher.recover_exit_buffer", p.recover_exit_buffer)?;
        positive("phospher.recover_step_out_speed", p.recover_step_out_speed)?;
        non_negative("phospher.recover_hold_seconds", p.recover_hold_seconds)?;
        non_negative("phospher.recover_jitter_deg", p.recover_jitter_deg)?;
        positive("phospher.recover_timeout_seconds", p.recover_timeout_seconds)?;
        non_negative("phospher.noise_jitter_per_sec", p.noise_jitter_per_sec)?;
        if !(0.0..=1.0).contains(&p.seek_flock_dampen) {
            return Err(SettingsError::Invalid {
                field: "phospher.seek_flock_dampen",
                reason: format!("must be within [0, 1], got {}", p.seek_flock_dampen),
            });
        }
        if p.use_lifetime {
            positive("phospher.lifetime_seconds_range", p.lifetime_seconds_range.0)?;
            ordered("phospher.lifetime_seconds_range", p.lifetime_seconds_range)?;
        }

        non_negative("inventory.max_weight", self.inventory.max_weight)?;

        non_negative("perception.sight_radius", self.perception.sight_radius)?;
        positive("perception.tick_interval", self.perception.tick_interval)?;
        if !(0.0..=180.0).contains(&self.perception.fov_half_angle_deg) {
            return Err(SettingsError::Invalid {
                field: "perception.fov_half_angle_deg",
                reason: format!("must be within [0, 180], got {}", self.perception.fov_half_angle_deg),
            });
        }

        let s = &self.spawn;
        non_negative("spawn.interval", s.interval)?;
        non_negative("spawn.margin_from_anchor", s.margin_from_anchor)?;
        non_negative("spawn.annulus_min", s.annulus_min)?;
        non_negative("spawn.annulus_max", s.annulus_max)?;
        non_negative("spawn.spacing", s.spacing)?;
        non_negative("spawn.sector_half_angle_deg", s.sector_half_angle_deg)?;
        ordered("spawn.interval_jitter", (-s.interval_jitter.0, s.interval_jitter.1))?;

        let t = &self.trail;
        if t.enabled {
            if t.resolution.0 == 0 || t.resolution.1 == 0 {
                return Err(SettingsError::Invalid {
                    field: "trail.resolution",
                    reason: "grid dimensions must be non-zero".to_string(),
                });
            }
            if t.world_min.0 >= t.world_max.0 || t.world_min.1 >= t.world_max.1 {
                return Err(SettingsError::Invalid {
                    field: "trail.world_min",
                    reason: "bounds must have positive extent".to_string(),
                });
            }
            non_negative("trail.decay_per_second", t.decay_per_second)?;
            positive("trail.paint_radius", t.paint_radius)?;
            positive("trail.paint_interval", t.paint_interval)?;
        }

        let d = &self.draw;
        positive("draw.radius", d.radius)?;
        non_negative("draw.strength", d.strength)?;
        positive("draw.interval", d.interval)?;
        non_negative("draw.juice_per_second", d.juice_per_second)?;
        non_negative("draw.max_juice", d.max_juice)?;
        non_negative("draw.starting_juice", d.starting_juice)?;

        Ok(())
    }

    // Slider ranges for the control panel
    pub fn max_speed_range() -> RangeInclusive<f32> {
        0.5..=10.0
    }

    pub fn weight_range() -> RangeInclusive<f32> {
        0.0..=5.0
    }

    pub fn radius_range() -> RangeInclusive<f32> {
        0.1..=8.0
    }

    pub fn agent_count_range() -> RangeInclusive<usize> {
        1..=400
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        SimulationSettings::default().validate().expect("defaults validate");
    }

    #[test]
    fn partial_toml_keeps_defaults_for_missing_keys() {
        let text = r#"
            seed = 99
            anchor_radius = 1.5

            [phospher]
            max_speed = 5.0
            return_exit_policy = "when_empty"

            [inventory]
            max_weight = 3.0
            max_count_per_type = 3
        "#;
        let settings = SimulationSettings::from_toml_str(text).expect("valid toml");
        assert_eq!(settings.seed, Some(99));
        assert_eq!(settings.anchor_radius, 1.5);
        assert_eq!(settings.phospher.max_speed, 5.0);
        assert_eq!(settings.phospher.return_exit_policy, ReturnExitPolicy::WhenEmpty);
        assert_eq!(settings.phospher.max_accel, PhospherSettings::default().max_accel);
        assert_eq!(settings.inventory.max_count_per_type, 3);
        assert_eq!(settings.perception, PerceptionSettings::default());
    }

    #[test]
    fn serialized_settings_parse_back() {
        let mut settings = SimulationSettings::default();
        settings.seed = Some(5);
        settings.phospher.weight_signal = 0.0;
        let text = settings.to_toml_string().expect("serializable");
        let parsed = SimulationSettings::from_toml_str(&text).expect("parses");
        assert_eq!(parsed, settings);
    }

    #[test]
    fn invalid_values_name_the_field() {
        let err = SimulationSettings::from_toml_str("[phospher]\nmax_speed = -1.0\n").unwrap_err();
        match err {
            SettingsError::Invalid { field, .. } => assert_eq!(field, "phospher.max_speed"),
            other => panic!("unexpected error: {other}"),
        }

        let err = SimulationSettings::from_toml_str("[perception]\nfov_half_angle_deg = 270.0\n").unwrap_err();
        assert!(matches!(err, SettingsError::Invalid { field: "perception.fov_half_angle_deg", .. }));
    }

    #[test]
    fn draw_budget_loads_from_its_table() {
        let text = "[draw]\nmax_juice = 20.0\njuice_per_second = 2.5\n";
        let settings = SimulationSettings::from_toml_str(text).expect("valid toml");
        assert_eq!(settings.draw.max_juice, 20.0);
        assert_eq!(settings.draw.juice_per_second, 2.5);
        assert_eq!(settings.draw.radius, TrailDrawSettings::default().radius);

        let err = SimulationSettings::from_toml_str("[draw]\ninterval = 0.0\n").unwrap_err();
        assert!(matches!(err, SettingsError::Invalid { field: "draw.interval", .. }));
    }

    #[test]
    fn malformed_toml_is_a_parse_error() {
        let err = SimulationSettings::from_toml_str("physics_fps = \"fast\"").unwrap_err();
        assert!(matches!(err, SettingsError::Parse(_)));
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let err = SimulationSettings::load("/definitely/not/here.toml").unwrap_err();
        assert!(matches!(err, SettingsError::Io { .. }));
    }
}
