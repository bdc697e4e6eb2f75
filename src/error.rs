//! Error taxonomy for the combat core
//!
//! Nothing here is ever thrown across the simulation boundary: callers log
//! the error and treat the operation as a no-op.

use thiserror::Error;

use crate::sim::entity::EntityKind;

#[derive(Debug, Error)]
pub enum SimError {
    /// Pool kind was never registered
    #[error("entity kind {0:?} is not registered with the pool")]
    UnknownKind(EntityKind),

    /// Spawn data does not describe the requested kind
    #[error("spawn data for {got:?} handed to a {expected:?} slot")]
    InitMismatch { expected: EntityKind, got: EntityKind },

    /// A name (skill, boss, drop, command) that does not parse
    #[error("unknown {what} '{name}'")]
    UnknownName { what: &'static str, name: String },

    /// Skill exists but the active boss does not carry it
    #[error("skill {0} is not in the active boss's kit")]
    SkillNotInKit(String),

    #[error("no boss is active")]
    NoActiveBoss,

    #[error("a boss is already active")]
    BossActive,

    #[error("no boss definition for {0}")]
    UnknownBoss(String),

    #[error("render object failed: {0}")]
    Render(String),

    #[error("invalid configuration: {0}")]
    Config(#[from] serde_json::Error),

    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

pub type SimResult<T> = Result<T, SimError>;
