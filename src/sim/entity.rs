//! Pooled entity types
//!
//! Every pooled object is one variant of [`Entity`]. The pool owns the
//! storage; active sets in [`super::state::World`] only hold [`Handle`]s.

use std::collections::{HashMap, HashSet};

use glam::Vec2;
use serde::{Deserialize, Serialize};

use super::boss::{AttackMode, BuffKind, SkillId};
use crate::error::{SimError, SimResult};

/// Discriminant of a pooled entity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EntityKind {
    Projectile,
    Enemy,
    Boss,
    Pickup,
}

/// Non-owning reference to a pool slot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Handle {
    pub kind: EntityKind,
    pub index: u32,
}

/// Shared physical shape. `pos` is the box center.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Body {
    pub pos: Vec2,
    pub vel: Vec2,
    pub size: Vec2,
    pub active: bool,
}

impl Body {
    pub fn new(pos: Vec2, vel: Vec2, size: Vec2) -> Self {
        Self {
            pos,
            vel,
            size,
            active: true,
        }
    }

    #[inline]
    pub fn half_extents(&self) -> Vec2 {
        self.size * 0.5
    }

    /// Integrate velocity over `dt` seconds
    #[inline]
    pub fn step(&mut self, dt: f32) {
        self.pos += self.vel * dt;
    }
}

/// Who fired a projectile
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Owner {
    Player,
    Enemy,
    Boss,
}

impl Owner {
    pub fn is_hostile(&self) -> bool {
        !matches!(self, Owner::Player)
    }
}

#[derive(Debug, Clone, Default)]
pub struct Projectile {
    pub body: Body,
    pub damage: f32,
    pub owner: Option<Owner>,
    pub penetrating: bool,
    /// Enemies a penetrating shot already damaged (cleared on reuse)
    pub pierced: Vec<Handle>,
}

impl Projectile {
    pub fn owner(&self) -> Owner {
        self.owner.unwrap_or(Owner::Enemy)
    }
}

/// Enemy archetypes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum EnemyKind {
    #[default]
    Basic,
    Fast,
    Splitter,
    /// Fragment spawned by a dying splitter
    Mini,
    /// Summoned by a boss skill
    Minion,
}

/// Movement pattern
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Behavior {
    #[default]
    Straight,
    Zigzag,
    FastDiagonal,
    Drift,
}

#[derive(Debug, Clone, Default)]
pub struct Enemy {
    pub body: Body,
    pub kind: EnemyKind,
    pub behavior: Behavior,
    pub health: f32,
    pub max_health: f32,
    pub score_value: u32,
    pub split_count: u8,
    pub summoned: bool,
    /// Death latch: set exactly once on the killing blow
    pub is_dead: bool,
    pub spawned_at: f64,
    /// Centerline for zigzag movement
    pub origin_x: f32,
    /// 0 = never fires
    pub fire_interval_ms: f64,
    pub next_fire_at: f64,
}

impl Enemy {
    /// Apply damage; returns true only on the killing blow
    pub fn apply_damage(&mut self, amount: f32) -> bool {
        if self.is_dead || amount <= 0.0 {
            return false;
        }
        self.health = (self.health - amount).clamp(0.0, self.max_health);
        if self.health <= 0.0 {
            self.is_dead = true;
            return true;
        }
        false
    }
}

/// Boss archetypes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum BossKind {
    #[default]
    Golem,
    Wraith,
    Hydra,
}

impl BossKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            BossKind::Golem => "golem",
            BossKind::Wraith => "wraith",
            BossKind::Hydra => "hydra",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "golem" => Some(BossKind::Golem),
            "wraith" => Some(BossKind::Wraith),
            "hydra" => Some(BossKind::Hydra),
            _ => None,
        }
    }
}

/// Health thresholds are stored in permille so they can live in a hash set
pub type ThresholdKey = u16;

#[inline]
pub fn threshold_key(ratio: f32) -> ThresholdKey {
    (ratio.clamp(0.0, 1.0) * 1000.0).round() as ThresholdKey
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ActiveBuff {
    pub kind: BuffKind,
    pub until: f64,
    pub magnitude: f32,
}

#[derive(Debug, Clone, Default)]
pub struct Boss {
    pub body: Body,
    pub boss_kind: BossKind,
    pub health: f32,
    pub max_health: f32,
    pub score_value: u32,
    pub attack_mode: AttackMode,
    /// Skill id -> time the skill becomes ready again
    pub skill_cooldowns: HashMap<SkillId, f64>,
    pub triggered_thresholds: HashSet<(SkillId, ThresholdKey)>,
    /// Horizontal patrol bounds (center x)
    pub move_range: (f32, f32),
    pub buffs: Vec<ActiveBuff>,
    pub is_dead: bool,
    pub spawned_at: f64,
}

impl Boss {
    pub fn health_ratio(&self) -> f32 {
        if self.max_health <= 0.0 {
            return 0.0;
        }
        self.health / self.max_health
    }

    pub fn buff(&self, kind: BuffKind, now: f64) -> Option<&ActiveBuff> {
        self.buffs.iter().find(|b| b.kind == kind && b.until > now)
    }

    pub fn has_buff(&self, kind: BuffKind, now: f64) -> bool {
        self.buff(kind, now).is_some()
    }

    /// Apply damage (after barrier reduction). Returns the damage actually
    /// dealt and whether this call was the killing blow.
    pub fn apply_damage(&mut self, amount: f32, now: f64) -> (f32, bool) {
        if self.is_dead || amount <= 0.0 {
            return (0.0, false);
        }
        let scale = self
            .buff(BuffKind::Barrier, now)
            .map(|b| (1.0 - b.magnitude).clamp(0.0, 1.0))
            .unwrap_or(1.0);
        let dealt = (amount * scale).min(self.health);
        self.health = (self.health - dealt).max(0.0);
        if self.health <= 0.0 {
            self.is_dead = true;
            return (dealt, true);
        }
        (dealt, false)
    }

    pub fn heal(&mut self, amount: f32) {
        if self.is_dead {
            return;
        }
        self.health = (self.health + amount.max(0.0)).min(self.max_health);
    }

    /// Drop expired buffs
    pub fn expire_buffs(&mut self, now: f64) {
        self.buffs.retain(|b| b.until > now);
    }
}

/// What a pickup grants
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PickupPayload {
    Score(u32),
    Life,
    SkillShard,
    Shield,
    RapidFire,
}

impl Default for PickupPayload {
    fn default() -> Self {
        PickupPayload::Score(0)
    }
}

impl PickupPayload {
    pub fn from_str(s: &str) -> Option<Self> {
        let s = s.to_lowercase();
        match s.as_str() {
            "life" => Some(PickupPayload::Life),
            "shard" | "skill_shard" => Some(PickupPayload::SkillShard),
            "shield" => Some(PickupPayload::Shield),
            "rapid" | "rapid_fire" => Some(PickupPayload::RapidFire),
            "score" => Some(PickupPayload::Score(100)),
            _ => s
                .strip_prefix("score:")
                .and_then(|n| n.parse().ok())
                .map(PickupPayload::Score),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Pickup {
    pub body: Body,
    pub payload: PickupPayload,
    pub expires_at: f64,
}

// ---------------------------------------------------------------------------
// Spawn data
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct ProjectileInit {
    pub pos: Vec2,
    pub vel: Vec2,
    pub size: Vec2,
    pub damage: f32,
    pub owner: Owner,
    pub penetrating: bool,
}

#[derive(Debug, Clone)]
pub struct EnemyInit {
    pub kind: EnemyKind,
    pub behavior: Behavior,
    pub pos: Vec2,
    pub vel: Vec2,
    pub size: Vec2,
    pub health: f32,
    pub score_value: u32,
    pub split_count: u8,
    pub summoned: bool,
    pub fire_interval_ms: f64,
    pub now: f64,
}

#[derive(Debug, Clone)]
pub struct BossInit {
    pub boss_kind: BossKind,
    pub pos: Vec2,
    pub vel: Vec2,
    pub size: Vec2,
    pub max_health: f32,
    pub score_value: u32,
    pub move_range: (f32, f32),
    pub now: f64,
}

#[derive(Debug, Clone)]
pub struct PickupInit {
    pub pos: Vec2,
    pub vel: Vec2,
    pub payload: PickupPayload,
    pub expires_at: f64,
}

/// Data handed to a pool's reset function on acquire
#[derive(Debug, Clone)]
pub enum SpawnInit {
    Projectile(ProjectileInit),
    Enemy(EnemyInit),
    Boss(BossInit),
    Pickup(PickupInit),
}

impl SpawnInit {
    pub fn kind(&self) -> EntityKind {
        match self {
            SpawnInit::Projectile(_) => EntityKind::Projectile,
            SpawnInit::Enemy(_) => EntityKind::Enemy,
            SpawnInit::Boss(_) => EntityKind::Boss,
            SpawnInit::Pickup(_) => EntityKind::Pickup,
        }
    }
}

// ---------------------------------------------------------------------------
// Tagged union
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub enum Entity {
    Projectile(Projectile),
    Enemy(Enemy),
    Boss(Boss),
    Pickup(Pickup),
}

impl Entity {
    /// Fresh, inactive instance of a kind (the default pool factory)
    pub fn blank(kind: EntityKind) -> Self {
        match kind {
            EntityKind::Projectile => Entity::Projectile(Projectile::default()),
            EntityKind::Enemy => Entity::Enemy(Enemy::default()),
            EntityKind::Boss => Entity::Boss(Boss::default()),
            EntityKind::Pickup => Entity::Pickup(Pickup::default()),
        }
    }

    pub fn kind(&self) -> EntityKind {
        match self {
            Entity::Projectile(_) => EntityKind::Projectile,
            Entity::Enemy(_) => EntityKind::Enemy,
            Entity::Boss(_) => EntityKind::Boss,
            Entity::Pickup(_) => EntityKind::Pickup,
        }
    }

    pub fn body(&self) -> &Body {
        match self {
            Entity::Projectile(p) => &p.body,
            Entity::Enemy(e) => &e.body,
            Entity::Boss(b) => &b.body,
            Entity::Pickup(d) => &d.body,
        }
    }

    pub fn body_mut(&mut self) -> &mut Body {
        match self {
            Entity::Projectile(p) => &mut p.body,
            Entity::Enemy(e) => &mut e.body,
            Entity::Boss(b) => &mut b.body,
            Entity::Pickup(d) => &mut d.body,
        }
    }

    pub fn is_active(&self) -> bool {
        self.body().active
    }

    /// Default reset function: overwrite every field from `init`, keeping
    /// heap capacity (pierced lists, cooldown maps) for reuse.
    pub fn reset(&mut self, init: &SpawnInit) -> SimResult<()> {
        match (self, init) {
            (Entity::Projectile(p), SpawnInit::Projectile(i)) => {
                p.body = Body::new(i.pos, i.vel, i.size);
                p.damage = i.damage;
                p.owner = Some(i.owner);
                p.penetrating = i.penetrating;
                p.pierced.clear();
            }
            (Entity::Enemy(e), SpawnInit::Enemy(i)) => {
                e.body = Body::new(i.pos, i.vel, i.size);
                e.kind = i.kind;
                e.behavior = i.behavior;
                e.health = i.health.max(1.0);
                e.max_health = e.health;
                e.score_value = i.score_value;
                e.split_count = i.split_count;
                e.summoned = i.summoned;
                e.is_dead = false;
                e.spawned_at = i.now;
                e.origin_x = i.pos.x;
                e.fire_interval_ms = i.fire_interval_ms;
                e.next_fire_at = i.now + i.fire_interval_ms;
            }
            (Entity::Boss(b), SpawnInit::Boss(i)) => {
                b.body = Body::new(i.pos, i.vel, i.size);
                b.boss_kind = i.boss_kind;
                b.health = i.max_health.max(1.0);
                b.max_health = b.health;
                b.score_value = i.score_value;
                b.attack_mode = AttackMode::Single;
                b.skill_cooldowns.clear();
                b.triggered_thresholds.clear();
                b.move_range = i.move_range;
                b.buffs.clear();
                b.is_dead = false;
                b.spawned_at = i.now;
            }
            (Entity::Pickup(d), SpawnInit::Pickup(i)) => {
                d.body = Body::new(i.pos, i.vel, Vec2::splat(PICKUP_SIZE));
                d.payload = i.payload;
                d.expires_at = i.expires_at;
            }
            (this, init) => {
                return Err(SimError::InitMismatch {
                    expected: this.kind(),
                    got: init.kind(),
                });
            }
        }
        Ok(())
    }

    pub fn as_projectile(&self) -> Option<&Projectile> {
        match self {
            Entity::Projectile(p) => Some(p),
            _ => None,
        }
    }

    pub fn as_projectile_mut(&mut self) -> Option<&mut Projectile> {
        match self {
            Entity::Projectile(p) => Some(p),
            _ => None,
        }
    }

    pub fn as_enemy(&self) -> Option<&Enemy> {
        match self {
            Entity::Enemy(e) => Some(e),
            _ => None,
        }
    }

    pub fn as_enemy_mut(&mut self) -> Option<&mut Enemy> {
        match self {
            Entity::Enemy(e) => Some(e),
            _ => None,
        }
    }

    pub fn as_boss(&self) -> Option<&Boss> {
        match self {
            Entity::Boss(b) => Some(b),
            _ => None,
        }
    }

    pub fn as_boss_mut(&mut self) -> Option<&mut Boss> {
        match self {
            Entity::Boss(b) => Some(b),
            _ => None,
        }
    }

    pub fn as_pickup(&self) -> Option<&Pickup> {
        match self {
            Entity::Pickup(d) => Some(d),
            _ => None,
        }
    }

    pub fn as_pickup_mut(&mut self) -> Option<&mut Pickup> {
        match self {
            Entity::Pickup(d) => Some(d),
            _ => None,
        }
    }
}

/// Pickup box edge length
pub const PICKUP_SIZE: f32 = 14.0;
