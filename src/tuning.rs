//! Data-driven game balance
//!
//! Everything here deserializes with `#[serde(default)]`, so a tuning file
//! only needs the fields it overrides.

use std::collections::BTreeMap;
use std::path::Path;

use glam::Vec2;
use serde::{Deserialize, Serialize};

use crate::consts::*;
use crate::error::SimResult;
use crate::sim::boss::{AttackMode, BuffKind, SkillId};
use crate::sim::entity::{Behavior, BossKind, EnemyInit, EnemyKind, EntityKind, PickupPayload};
use crate::sim::pool::PoolOptions;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FieldTuning {
    pub width: f32,
    pub height: f32,
    /// Cull distance outside the visible field
    pub margin: f32,
}

impl Default for FieldTuning {
    fn default() -> Self {
        Self {
            width: FIELD_WIDTH,
            height: FIELD_HEIGHT,
            margin: FIELD_MARGIN,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PlayerTuning {
    pub size: Vec2,
    /// Pixels per second
    pub speed: f32,
    pub lives: u8,
    pub max_lives: u8,
    pub fire_interval_ms: f64,
    /// Fire interval multiplier while rapid fire is active
    pub rapid_fire_factor: f64,
    pub bullet_speed: f32,
    pub bullet_damage: f32,
    pub bullet_size: Vec2,
    /// Post-hit invulnerability
    pub invincible_ms: f64,
    pub shield_ms: f64,
    pub rapid_ms: f64,
    /// Exp needed for level n -> n+1 is `exp_per_level * n`
    pub exp_per_level: u32,
    pub damage_per_level: f32,
    pub shards_per_bomb: u32,
    pub bomb_damage: f32,
}

impl Default for PlayerTuning {
    fn default() -> Self {
        Self {
            size: Vec2::new(28.0, 32.0),
            speed: 260.0,
            lives: 3,
            max_lives: 5,
            fire_interval_ms: 140.0,
            rapid_fire_factor: 0.5,
            bullet_speed: 620.0,
            bullet_damage: 1.0,
            bullet_size: Vec2::new(4.0, 12.0),
            invincible_ms: 1500.0,
            shield_ms: 6000.0,
            rapid_ms: 5000.0,
            exp_per_level: 20,
            damage_per_level: 0.25,
            shards_per_bomb: 3,
            bomb_damage: 25.0,
        }
    }
}

/// One spawnable enemy type and its selection weight
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnemyArchetype {
    pub kind: EnemyKind,
    pub behavior: Behavior,
    pub weight: u32,
    pub size: Vec2,
    pub speed: f32,
    pub health: f32,
    pub score: u32,
    #[serde(default)]
    pub split_count: u8,
    /// 0 = never fires
    #[serde(default)]
    pub fire_interval_ms: f64,
}

impl EnemyArchetype {
    pub fn basic() -> Self {
        Self {
            kind: EnemyKind::Basic,
            behavior: Behavior::Straight,
            weight: 60,
            size: Vec2::new(28.0, 24.0),
            speed: 90.0,
            health: 3.0,
            score: 10,
            split_count: 0,
            fire_interval_ms: 2400.0,
        }
    }

    pub fn fast() -> Self {
        Self {
            kind: EnemyKind::Fast,
            behavior: Behavior::FastDiagonal,
            weight: 30,
            size: Vec2::new(20.0, 20.0),
            speed: 180.0,
            health: 2.0,
            score: 15,
            split_count: 0,
            fire_interval_ms: 0.0,
        }
    }

    pub fn splitter() -> Self {
        Self {
            kind: EnemyKind::Splitter,
            behavior: Behavior::Zigzag,
            weight: 10,
            size: Vec2::new(34.0, 30.0),
            speed: 70.0,
            health: 6.0,
            score: 25,
            split_count: 2,
            fire_interval_ms: 0.0,
        }
    }

    /// Fragment left behind by a splitter
    pub fn mini() -> Self {
        Self {
            kind: EnemyKind::Mini,
            behavior: Behavior::FastDiagonal,
            weight: 0,
            size: Vec2::new(14.0, 14.0),
            speed: 150.0,
            health: 1.0,
            score: 5,
            split_count: 0,
            fire_interval_ms: 0.0,
        }
    }

    /// Boss summon
    pub fn minion() -> Self {
        Self {
            kind: EnemyKind::Minion,
            behavior: Behavior::Drift,
            weight: 0,
            size: Vec2::new(18.0, 18.0),
            speed: 80.0,
            health: 2.0,
            score: 5,
            split_count: 0,
            fire_interval_ms: 3000.0,
        }
    }
}

impl EnemyArchetype {
    /// Spawn data moving along `dir`, with health and speed scaled
    pub fn init(&self, pos: Vec2, dir: Vec2, health_mult: f32, speed_mult: f32, summoned: bool, now: f64) -> EnemyInit {
        EnemyInit {
            kind: self.kind,
            behavior: self.behavior,
            pos,
            vel: dir.normalize_or(Vec2::Y) * self.speed * speed_mult,
            size: self.size,
            health: self.health * health_mult,
            score_value: self.score,
            split_count: self.split_count,
            summoned,
            fire_interval_ms: self.fire_interval_ms,
            now,
        }
    }
}

/// When the next boss appears
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum BossTrigger {
    /// Every `step` points of score
    Score { step: u64 },
    /// Every `ms` of play since the last boss ended (or game start)
    Elapsed { ms: f64 },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EncounterTuning {
    pub enemy_per_wave: u32,
    pub max_active_enemies: usize,
    pub spawn_interval_ms: f64,
    pub min_spawn_interval_ms: f64,
    /// Spawn interval multiplier applied per wave past the first
    pub spawn_interval_decay: f64,
    /// Extra enemy health per wave (fraction of base)
    pub health_scale_per_wave: f32,
    pub speed_scale_per_wave: f32,
    /// Extra enemy health per player level (fraction of base)
    pub health_scale_per_level: f32,
    /// Quota growth per wave
    pub extra_enemies_per_wave: u32,
    pub inter_wave_delay_ms: f64,
    pub archetypes: Vec<EnemyArchetype>,
    pub mini: EnemyArchetype,
    pub minion: EnemyArchetype,
    pub enemy_bullet_speed: f32,
    pub enemy_bullet_size: Vec2,
    pub boss_trigger: BossTrigger,
    /// Minimum gap between one boss's death and the next spawn
    pub boss_cooldown_ms: f64,
    /// Bosses cycle through this list
    pub boss_rotation: Vec<BossKind>,
}

impl Default for EncounterTuning {
    fn default() -> Self {
        Self {
            enemy_per_wave: 8,
            max_active_enemies: 12,
            spawn_interval_ms: 900.0,
            min_spawn_interval_ms: 300.0,
            spawn_interval_decay: 0.92,
            health_scale_per_wave: 0.15,
            speed_scale_per_wave: 0.05,
            health_scale_per_level: 0.05,
            extra_enemies_per_wave: 2,
            inter_wave_delay_ms: 2000.0,
            archetypes: vec![
                EnemyArchetype::basic(),
                EnemyArchetype::fast(),
                EnemyArchetype::splitter(),
            ],
            mini: EnemyArchetype::mini(),
            minion: EnemyArchetype::minion(),
            enemy_bullet_speed: 220.0,
            enemy_bullet_size: Vec2::new(8.0, 8.0),
            boss_trigger: BossTrigger::Score { step: 1500 },
            boss_cooldown_ms: 20_000.0,
            boss_rotation: vec![BossKind::Golem, BossKind::Wraith, BossKind::Hydra],
        }
    }
}

/// Health ratio at or below which a mode becomes available
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ModeThreshold {
    pub ratio: f32,
    pub mode: AttackMode,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AttackTuning {
    pub attack_interval_ms: f64,
    /// Telegraph duration before an attack lands
    pub warning_ms: f64,
    /// Dwell in Cooldown before returning to Idle
    pub post_fire_ms: f64,
    pub bullet_speed: f32,
    pub bullet_damage: f32,
    pub bullet_size: Vec2,
    pub spread_count: u32,
    pub spread_arc_deg: f32,
    pub laser_duration_ms: f64,
    pub laser_width: f32,
    pub mode_thresholds: Vec<ModeThreshold>,
    /// Hysteresis between mode switches
    pub min_mode_switch_ms: f64,
}

impl Default for AttackTuning {
    fn default() -> Self {
        Self {
            attack_interval_ms: 2000.0,
            warning_ms: 600.0,
            post_fire_ms: 100.0,
            bullet_speed: 240.0,
            bullet_damage: 1.0,
            bullet_size: Vec2::new(10.0, 10.0),
            spread_count: 5,
            spread_arc_deg: 60.0,
            laser_duration_ms: 1200.0,
            laser_width: 26.0,
            mode_thresholds: vec![
                ModeThreshold {
                    ratio: 0.7,
                    mode: AttackMode::Spread,
                },
                ModeThreshold {
                    ratio: 0.4,
                    mode: AttackMode::Laser,
                },
            ],
            min_mode_switch_ms: 1000.0,
        }
    }
}

/// What a skill does when it lands
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum SkillEffect {
    /// Damages the player if within `effect_radius` of the boss
    Shockwave,
    /// Radial burst of projectiles
    BulletRing { count: u32, speed: f32 },
    /// Spawn minions, up to `cap` alive at once
    Summon { count: u32, cap: u32 },
    Buff {
        buff: BuffKind,
        duration_ms: f64,
        magnitude: f32,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SkillDef {
    pub id: SkillId,
    pub cooldown_ms: f64,
    /// Health ratios that force the skill once each, descending
    #[serde(default)]
    pub thresholds: Vec<f32>,
    /// 0 = immediate
    #[serde(default)]
    pub warning_ms: f64,
    #[serde(default)]
    pub effect_radius: f32,
    pub effect: SkillEffect,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BossDef {
    pub kind: BossKind,
    pub max_health: f32,
    pub size: Vec2,
    /// Horizontal patrol speed
    pub speed: f32,
    pub hover_y: f32,
    /// Patrol bounds for the boss center x
    pub move_range: (f32, f32),
    pub score_value: u32,
    #[serde(default)]
    pub attack: AttackTuning,
    #[serde(default)]
    pub skills: Vec<SkillDef>,
    /// How often the skill selector runs
    #[serde(default = "default_skill_check_ms")]
    pub skill_check_ms: f64,
    /// Pickups dropped on death
    #[serde(default)]
    pub drops: Vec<PickupPayload>,
}

fn default_skill_check_ms() -> f64 {
    500.0
}

impl BossDef {
    pub fn skill(&self, id: SkillId) -> Option<&SkillDef> {
        self.skills.iter().find(|s| s.id == id)
    }

    pub fn golem() -> Self {
        Self {
            kind: BossKind::Golem,
            max_health: 400.0,
            size: Vec2::new(120.0, 90.0),
            speed: 60.0,
            hover_y: 120.0,
            move_range: (90.0, FIELD_WIDTH - 90.0),
            score_value: 1000,
            attack: AttackTuning::default(),
            skills: vec![
                SkillDef {
                    id: SkillId::Shockwave,
                    cooldown_ms: 7000.0,
                    thresholds: vec![0.5],
                    warning_ms: 800.0,
                    effect_radius: 160.0,
                    effect: SkillEffect::Shockwave,
                },
                SkillDef {
                    id: SkillId::SummonMinions,
                    cooldown_ms: 9000.0,
                    thresholds: vec![],
                    warning_ms: 0.0,
                    effect_radius: 0.0,
                    effect: SkillEffect::Summon { count: 3, cap: 6 },
                },
                SkillDef {
                    id: SkillId::Barrier,
                    cooldown_ms: 15_000.0,
                    thresholds: vec![0.3],
                    warning_ms: 0.0,
                    effect_radius: 0.0,
                    effect: SkillEffect::Buff {
                        buff: BuffKind::Barrier,
                        duration_ms: 4000.0,
                        magnitude: 0.6,
                    },
                },
            ],
            skill_check_ms: default_skill_check_ms(),
            drops: vec![
                PickupPayload::Score(500),
                PickupPayload::SkillShard,
                PickupPayload::Life,
            ],
        }
    }

    pub fn wraith() -> Self {
        Self {
            kind: BossKind::Wraith,
            max_health: 320.0,
            size: Vec2::new(90.0, 80.0),
            speed: 110.0,
            hover_y: 140.0,
            move_range: (70.0, FIELD_WIDTH - 70.0),
            score_value: 1200,
            attack: AttackTuning {
                attack_interval_ms: 1600.0,
                spread_count: 7,
                ..AttackTuning::default()
            },
            skills: vec![
                SkillDef {
                    id: SkillId::BulletRing,
                    cooldown_ms: 5000.0,
                    thresholds: vec![0.7, 0.4],
                    warning_ms: 500.0,
                    effect_radius: 320.0,
                    effect: SkillEffect::BulletRing {
                        count: 16,
                        speed: 180.0,
                    },
                },
                SkillDef {
                    id: SkillId::Enrage,
                    cooldown_ms: 12_000.0,
                    thresholds: vec![0.25],
                    warning_ms: 0.0,
                    effect_radius: 0.0,
                    effect: SkillEffect::Buff {
                        buff: BuffKind::Enrage,
                        duration_ms: 5000.0,
                        magnitude: 0.5,
                    },
                },
                SkillDef {
                    id: SkillId::SummonMinions,
                    cooldown_ms: 10_000.0,
                    thresholds: vec![],
                    warning_ms: 0.0,
                    effect_radius: 0.0,
                    effect: SkillEffect::Summon { count: 2, cap: 4 },
                },
            ],
            skill_check_ms: default_skill_check_ms(),
            drops: vec![PickupPayload::Score(600), PickupPayload::SkillShard, PickupPayload::RapidFire],
        }
    }

    pub fn hydra() -> Self {
        Self {
            kind: BossKind::Hydra,
            max_health: 520.0,
            size: Vec2::new(140.0, 100.0),
            speed: 45.0,
            hover_y: 130.0,
            move_range: (100.0, FIELD_WIDTH - 100.0),
            score_value: 1500,
            attack: AttackTuning {
                attack_interval_ms: 1800.0,
                laser_duration_ms: 1600.0,
                ..AttackTuning::default()
            },
            skills: vec![
                SkillDef {
                    id: SkillId::BulletRing,
                    cooldown_ms: 6000.0,
                    thresholds: vec![0.5],
                    warning_ms: 400.0,
                    effect_radius: 280.0,
                    effect: SkillEffect::BulletRing {
                        count: 12,
                        speed: 200.0,
                    },
                },
                SkillDef {
                    id: SkillId::SummonMinions,
                    cooldown_ms: 8000.0,
                    thresholds: vec![0.6],
                    warning_ms: 0.0,
                    effect_radius: 0.0,
                    effect: SkillEffect::Summon { count: 4, cap: 6 },
                },
                SkillDef {
                    id: SkillId::Regenerate,
                    cooldown_ms: 20_000.0,
                    thresholds: vec![0.2],
                    warning_ms: 1000.0,
                    effect_radius: 0.0,
                    effect: SkillEffect::Buff {
                        buff: BuffKind::Regenerate,
                        duration_ms: 4000.0,
                        magnitude: 12.0,
                    },
                },
            ],
            skill_check_ms: default_skill_check_ms(),
            drops: vec![
                PickupPayload::Score(800),
                PickupPayload::SkillShard,
                PickupPayload::SkillShard,
                PickupPayload::Shield,
            ],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DropTuning {
    /// Chance an ordinary enemy drops something
    pub chance: f32,
    pub ttl_ms: f64,
    pub fall_speed: f32,
    pub weights: Vec<(PickupPayload, u32)>,
}

impl Default for DropTuning {
    fn default() -> Self {
        Self {
            chance: 0.12,
            ttl_ms: 8000.0,
            fall_speed: 70.0,
            weights: vec![
                (PickupPayload::Score(50), 50),
                (PickupPayload::SkillShard, 20),
                (PickupPayload::RapidFire, 12),
                (PickupPayload::Shield, 10),
                (PickupPayload::Life, 8),
            ],
        }
    }
}

/// Pool sizing per entity kind
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolTuning {
    pub projectile: PoolOptions,
    pub enemy: PoolOptions,
    pub boss: PoolOptions,
    pub pickup: PoolOptions,
}

impl Default for PoolTuning {
    fn default() -> Self {
        Self {
            projectile: PoolOptions {
                initial_size: 256,
                max_size: 1024,
            },
            enemy: PoolOptions {
                initial_size: 32,
                max_size: 128,
            },
            boss: PoolOptions {
                initial_size: 1,
                max_size: 2,
            },
            pickup: PoolOptions {
                initial_size: 16,
                max_size: 64,
            },
        }
    }
}

impl PoolTuning {
    pub fn as_map(&self) -> BTreeMap<EntityKind, PoolOptions> {
        BTreeMap::from([
            (EntityKind::Projectile, self.projectile),
            (EntityKind::Enemy, self.enemy),
            (EntityKind::Boss, self.boss),
            (EntityKind::Pickup, self.pickup),
        ])
    }
}

/// Complete balance sheet
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Tuning {
    pub field: FieldTuning,
    pub player: PlayerTuning,
    pub encounter: EncounterTuning,
    pub bosses: Vec<BossDef>,
    pub drops: DropTuning,
    pub pools: PoolTuning,
}

impl Default for Tuning {
    fn default() -> Self {
        Self {
            field: FieldTuning::default(),
            player: PlayerTuning::default(),
            encounter: EncounterTuning::default(),
            bosses: vec![BossDef::golem(), BossDef::wraith(), BossDef::hydra()],
            drops: DropTuning::default(),
            pools: PoolTuning::default(),
        }
    }
}

impl Tuning {
    pub fn boss(&self, kind: BossKind) -> Option<&BossDef> {
        self.bosses.iter().find(|b| b.kind == kind)
    }

    pub fn from_json(json: &str) -> SimResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_json(&self) -> SimResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn load(path: impl AsRef<Path>) -> SimResult<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        let tuning = Self::from_json(&text)?;
        log::info!("Loaded tuning from {}", path.as_ref().display());
        Ok(tuning)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_json_keeps_defaults() {
        let json = r#"{ "encounter": { "enemy_per_wave": 4 } }"#;
        let tuning = Tuning::from_json(json).unwrap();
        assert_eq!(tuning.encounter.enemy_per_wave, 4);
        assert_eq!(tuning.encounter.max_active_enemies, 12);
        assert_eq!(tuning.bosses.len(), 3);
    }

    #[test]
    fn test_default_round_trips_through_json() {
        let json = Tuning::default().to_json().unwrap();
        let back = Tuning::from_json(&json).unwrap();
        assert_eq!(back.bosses.len(), 3);
        assert_eq!(back.pools.as_map().len(), 4);
    }

    #[test]
    fn test_bad_json_is_a_config_error() {
        let err = Tuning::from_json("{ nope").unwrap_err();
        assert!(matches!(err, crate::SimError::Config(_)));
    }

    #[test]
    fn test_boss_lookup() {
        let tuning = Tuning::default();
        let golem = tuning.boss(BossKind::Golem).unwrap();
        assert!(golem.skill(SkillId::Shockwave).is_some());
        assert!(golem.skill(SkillId::Enrage).is_none());
    }
}
