//! Deterministic combat simulation
//!
//! All gameplay logic lives here and follows a few rules:
//! - Fixed timestep only; every delay is a deadline on the sim clock
//! - Seeded RNG only
//! - Stable iteration order (active sets are ordered handle lists)
//! - No platform dependencies; drawing goes through [`crate::render::Surface`]

pub mod boss;
pub mod collision;
pub mod drops;
pub mod encounter;
pub mod entity;
pub mod events;
pub mod game;
pub mod player;
pub mod pool;
pub mod state;
pub mod view;

pub use boss::{AttackMode, BossDirector, SkillId};
pub use collision::{CollisionResolver, HitSet, Outcome};
pub use encounter::EncounterManager;
pub use entity::{Entity, EntityKind, Handle, PickupPayload};
pub use events::{EventChannel, GameEvent, Topic};
pub use game::{Command, Game, TickInput};
pub use pool::{EntityPool, PoolOptions};
pub use state::{GamePhase, World};
pub use view::LayerView;
