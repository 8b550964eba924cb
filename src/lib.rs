/*
 * Phosphers - Module Definitions
 *
 * A swarm of foraging agents around a circular anchor. The simulation core is
 * independent of the viewer; the viewer module only reads it back for drawing.
 */

// Re-export key components for easier access
pub use anchor::Anchor;
pub use events::SimEvent;
pub use field::{NullField, TrailField, VectorField};
pub use inventory::{Inventory, InventoryError};
pub use juice::TrailJuice;
pub use ledger::{ResourceEvent, ResourceLedger, ResourceSystem};
pub use phospher::{AgentState, Phospher, StepContext, StepOutcome};
pub use resources::{BitField, BitSpec, BitType, ResourceTarget, TargetId, TargetQuery};
pub use settings::{ReturnExitPolicy, SettingsError, SimulationSettings};
pub use stats::{RunSnapshot, RunStats};
pub use swarm::{AgentId, NeighbourQuery, Swarm};
pub use world::{SignalLayer, World};

// Define modules
pub mod anchor;
pub mod events;
pub mod field;
pub mod geometry;
pub mod inventory;
pub mod juice;
pub mod ledger;
pub mod perception;
pub mod phospher;
pub mod resources;
pub mod settings;
pub mod spatial_grid;
pub mod stats;
pub mod swarm;
pub mod viewer;
pub mod world;
