//! Sky Siege - fixed-timestep arcade combat core
//!
//! Core modules:
//! - `scheduler`: Fixed-timestep update cadence and layered render pass
//! - `render`: Draw surface trait and the headless draw list
//! - `sim`: Deterministic combat simulation (pool, events, collisions, encounters, bosses)
//! - `tuning`: Data-driven game balance
//! - `settings`: Player-facing preferences (difficulty, seed)
//! - `error`: Error taxonomy shared by the core

pub mod error;
pub mod render;
pub mod scheduler;
pub mod settings;
pub mod sim;
pub mod tuning;

pub use error::{SimError, SimResult};
pub use render::{DrawList, Surface};
pub use scheduler::{Layer, RenderObject, Scheduler, SchedulerState};
pub use settings::{Difficulty, Settings};
pub use tuning::Tuning;

use glam::Vec2;

/// Game configuration constants
pub mod consts {
    /// Fixed simulation step in microseconds (~60 Hz)
    pub const FIXED_STEP_US: u64 = 16_667;
    /// Fixed simulation step in milliseconds
    pub const FIXED_STEP_MS: f64 = FIXED_STEP_US as f64 / 1000.0;
    /// Fixed simulation step in seconds, as handed to `RenderObject::update`
    pub const SIM_DT: f32 = FIXED_STEP_US as f32 / 1_000_000.0;
    /// Largest frame delta fed into the accumulator (stall guard)
    pub const MAX_FRAME_DELTA_MS: f64 = 250.0;

    /// Default playfield dimensions (origin top-left, +y down)
    pub const FIELD_WIDTH: f32 = 480.0;
    pub const FIELD_HEIGHT: f32 = 720.0;
    /// Entities this far outside the field are culled
    pub const FIELD_MARGIN: f32 = 48.0;
}

/// Unit direction for an angle measured from +x (radians, +y down)
#[inline]
pub fn dir_from_angle(theta: f32) -> Vec2 {
    Vec2::new(theta.cos(), theta.sin())
}

/// True if `pos` lies inside the field expanded by `margin` on every side
#[inline]
pub fn in_field(pos: Vec2, width: f32, height: f32, margin: f32) -> bool {
    pos.x >= -margin && pos.x <= width + margin && pos.y >= -margin && pos.y <= height + margin
}
