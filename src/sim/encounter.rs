//! Enemy waves and the boss lifecycle
//!
//! Waves spawn a quota of enemies on an interval, chosen by weight from the
//! archetype table and scaled by wave number and player level. A wave ends
//! once its quota has spawned and nothing is left alive. Bosses appear on a
//! score or elapsed-time trigger, one at a time, and suspend the waves until
//! they die.

use glam::Vec2;
use rand::Rng;
use rand::distr::Distribution;
use rand::distr::weighted::WeightedIndex;

use super::boss::BossDirector;
use super::collision::Kill;
use super::drops::DropTable;
use super::entity::{Behavior, BossInit, BossKind, Entity, EntityKind, Handle, Owner, SpawnInit};
use super::events::GameEvent;
use super::state::{hostile_shot, release_where, Ctx};
use crate::error::{SimError, SimResult};
use crate::in_field;
use crate::tuning::{BossTrigger, EncounterTuning, Tuning};

/// Zigzag sway amplitude (px) and angular speed (rad/s)
const ZIGZAG_AMPLITUDE: f32 = 48.0;
const ZIGZAG_FREQ: f32 = 3.0;

#[derive(Debug, Clone)]
pub struct EncounterManager {
    wave: u32,
    spawned_in_wave: u32,
    next_spawn_at: f64,
    /// Set while a boss is up
    suspended: bool,
    dist: Option<WeightedIndex<u32>>,
    drops: DropTable,
    boss_rotation: usize,
    next_boss_score: u64,
    /// Elapsed-trigger origin: game start or the last boss's death
    boss_clock_from: f64,
    last_boss_spawn: f64,
    bosses_defeated: u32,
}

impl EncounterManager {
    pub fn new(tuning: &Tuning, now: f64) -> Self {
        let dist = match WeightedIndex::new(tuning.encounter.archetypes.iter().map(|a| a.weight)) {
            Ok(d) => Some(d),
            Err(e) => {
                log::warn!("enemy archetype table unusable ({}); waves will not spawn", e);
                None
            }
        };
        let next_boss_score = match tuning.encounter.boss_trigger {
            BossTrigger::Score { step } => step,
            BossTrigger::Elapsed { .. } => u64::MAX,
        };
        Self {
            wave: 1,
            spawned_in_wave: 0,
            next_spawn_at: now + tuning.encounter.spawn_interval_ms,
            suspended: false,
            dist,
            drops: DropTable::new(&tuning.drops),
            boss_rotation: 0,
            next_boss_score,
            boss_clock_from: now,
            last_boss_spawn: f64::NEG_INFINITY,
            bosses_defeated: 0,
        }
    }

    pub fn wave(&self) -> u32 {
        self.wave
    }

    pub fn spawned_in_wave(&self) -> u32 {
        self.spawned_in_wave
    }

    pub fn next_spawn_at(&self) -> f64 {
        self.next_spawn_at
    }

    pub fn is_suspended(&self) -> bool {
        self.suspended
    }

    pub fn bosses_defeated(&self) -> u32 {
        self.bosses_defeated
    }

    pub fn drops(&self) -> &DropTable {
        &self.drops
    }

    /// Enemies this wave must spawn before it can end
    pub fn quota(&self, cfg: &EncounterTuning) -> u32 {
        cfg.enemy_per_wave + cfg.extra_enemies_per_wave * (self.wave - 1)
    }

    pub fn spawn_interval(&self, cfg: &EncounterTuning) -> f64 {
        let decayed = cfg.spawn_interval_ms * cfg.spawn_interval_decay.powi(self.wave as i32 - 1);
        decayed.max(cfg.min_spawn_interval_ms)
    }

    fn health_mult(&self, cfg: &EncounterTuning, level: u32) -> f32 {
        1.0 + cfg.health_scale_per_wave * (self.wave - 1) as f32
            + cfg.health_scale_per_level * level.saturating_sub(1) as f32
    }

    fn speed_mult(&self, cfg: &EncounterTuning) -> f32 {
        1.0 + cfg.speed_scale_per_wave * (self.wave - 1) as f32
    }

    /// One fixed step: movement, enemy fire, boss trigger, spawning, wave end
    pub fn update(&mut self, ctx: &mut Ctx, tuning: &Tuning, director: &mut BossDirector, rng: &mut impl Rng, dt: f32) {
        let cfg = &tuning.encounter;
        self.move_enemies(ctx, dt);
        self.enemy_fire(ctx, cfg);
        self.move_boss(ctx, tuning, dt);

        if ctx.world.boss.is_none() && self.boss_due(ctx.world.score, ctx.now, cfg) {
            let kind = cfg
                .boss_rotation
                .get(self.boss_rotation % cfg.boss_rotation.len().max(1))
                .copied()
                .unwrap_or_default();
            match self.spawn_boss(ctx, tuning, director, kind) {
                Ok(_) => self.boss_rotation += 1,
                Err(e) => {
                    log::warn!("boss trigger skipped: {}", e);
                    // Do not retry every tick
                    self.last_boss_spawn = ctx.now;
                }
            }
        }

        if self.suspended {
            return;
        }

        let quota = self.quota(cfg);
        if self.spawned_in_wave < quota && ctx.now >= self.next_spawn_at {
            if ctx.world.enemies.len() < cfg.max_active_enemies {
                if self.spawn_enemy(ctx, cfg, rng).is_some() {
                    self.spawned_in_wave += 1;
                }
                self.next_spawn_at = ctx.now + self.spawn_interval(cfg);
            }
        }

        if self.spawned_in_wave >= quota && ctx.world.enemies.is_empty() {
            self.wave += 1;
            self.spawned_in_wave = 0;
            self.next_spawn_at = ctx.now + cfg.inter_wave_delay_ms;
            log::info!("wave {} begins in {} ms", self.wave, cfg.inter_wave_delay_ms);
            ctx.events.emit(GameEvent::WaveAdvanced { wave: self.wave });
        }
    }

    fn boss_due(&self, score: u64, now: f64, cfg: &EncounterTuning) -> bool {
        if now - self.last_boss_spawn < cfg.boss_cooldown_ms {
            return false;
        }
        match cfg.boss_trigger {
            BossTrigger::Score { .. } => score >= self.next_boss_score,
            BossTrigger::Elapsed { ms } => now - self.boss_clock_from >= ms,
        }
    }

    /// Spawn one wave enemy at the top edge
    pub fn spawn_enemy(&self, ctx: &mut Ctx, cfg: &EncounterTuning, rng: &mut impl Rng) -> Option<Handle> {
        let dist = self.dist.as_ref()?;
        let arch = cfg.archetypes.get(dist.sample(rng))?;
        let half = arch.size * 0.5;
        let width = ctx.world.field.width;
        let x = if width > arch.size.x {
            rng.random_range(half.x..=width - half.x)
        } else {
            width * 0.5
        };
        let dir = match arch.behavior {
            Behavior::FastDiagonal => {
                let side = if rng.random_bool(0.5) { 1.0 } else { -1.0 };
                Vec2::new(0.6 * side, 1.0)
            }
            _ => Vec2::Y,
        };
        let level = ctx.world.player.level;
        let init = arch.init(
            Vec2::new(x, -half.y),
            dir,
            self.health_mult(cfg, level),
            self.speed_mult(cfg),
            false,
            ctx.now,
        );
        ctx.world.spawn_enemy(ctx.pool, ctx.events, init)
    }

    fn move_enemies(&mut self, ctx: &mut Ctx, dt: f32) {
        let now = ctx.now;
        let width = ctx.world.field.width;
        let player_x = ctx.world.player.body.pos.x;
        for &h in &ctx.world.enemies {
            let Some(e) = ctx.pool.get_mut(h).and_then(Entity::as_enemy_mut) else {
                continue;
            };
            match e.behavior {
                Behavior::Straight => e.body.step(dt),
                Behavior::Zigzag => {
                    e.body.pos.y += e.body.vel.y * dt;
                    let t = ((now - e.spawned_at) / 1000.0) as f32;
                    e.body.pos.x = e.origin_x + ZIGZAG_AMPLITUDE * (t * ZIGZAG_FREQ).sin();
                }
                Behavior::FastDiagonal => {
                    e.body.step(dt);
                    let half = e.body.size.x * 0.5;
                    if (e.body.pos.x < half && e.body.vel.x < 0.0) || (e.body.pos.x > width - half && e.body.vel.x > 0.0) {
                        e.body.vel.x = -e.body.vel.x;
                    }
                }
                Behavior::Drift => {
                    let speed = e.body.vel.length();
                    let sway = (player_x - e.body.pos.x).clamp(-1.0, 1.0) * speed * 0.3;
                    e.body.pos += Vec2::new(sway, speed) * dt;
                }
            }
        }
        // Enemies that leave the field escape without a death event
        let field = ctx.world.field.clone();
        release_where(&mut ctx.world.enemies, ctx.pool, |e| {
            !in_field(e.body().pos, field.width, field.height, field.margin)
        });
    }

    fn enemy_fire(&mut self, ctx: &mut Ctx, cfg: &EncounterTuning) {
        let now = ctx.now;
        let target = ctx.world.player.body.pos;
        let height = ctx.world.field.height;
        let mut muzzles = Vec::new();
        for &h in &ctx.world.enemies {
            let Some(e) = ctx.pool.get_mut(h).and_then(Entity::as_enemy_mut) else {
                continue;
            };
            if e.is_dead || e.fire_interval_ms <= 0.0 || now < e.next_fire_at {
                continue;
            }
            e.next_fire_at = now + e.fire_interval_ms;
            // Only shoot from the visible upper part of the field
            if e.body.pos.y > 0.0 && e.body.pos.y < height * 0.6 {
                muzzles.push(e.body.pos + Vec2::new(0.0, e.body.size.y * 0.5));
            }
        }
        for origin in muzzles {
            let vel = (target - origin).normalize_or(Vec2::Y) * cfg.enemy_bullet_speed;
            let init = hostile_shot(Owner::Enemy, origin, vel, cfg.enemy_bullet_size, 1.0);
            ctx.world.spawn_projectile(ctx.pool, init);
        }
    }

    fn move_boss(&mut self, ctx: &mut Ctx, tuning: &Tuning, dt: f32) {
        let Some(h) = ctx.world.boss else {
            return;
        };
        let Some(boss) = ctx.pool.get_mut(h).and_then(Entity::as_boss_mut) else {
            return;
        };
        if boss.is_dead {
            return;
        }
        let Some(def) = tuning.boss(boss.boss_kind) else {
            return;
        };
        let (lo, hi) = boss.move_range;
        if boss.body.pos.y < def.hover_y {
            // Entrance
            boss.body.vel = Vec2::new(0.0, def.speed);
            boss.body.step(dt);
            if boss.body.pos.y >= def.hover_y {
                boss.body.pos.y = def.hover_y;
                boss.body.vel = Vec2::new(def.speed, 0.0);
            }
            return;
        }
        if boss.body.vel.x == 0.0 {
            boss.body.vel = Vec2::new(def.speed, 0.0);
        }
        boss.body.step(dt);
        if boss.body.pos.x <= lo {
            boss.body.pos.x = lo;
            boss.body.vel.x = boss.body.vel.x.abs();
        } else if boss.body.pos.x >= hi {
            boss.body.pos.x = hi;
            boss.body.vel.x = -boss.body.vel.x.abs();
        }
    }

    /// Bring in a boss: clear ordinary enemies, suspend waves, hand the boss
    /// to the director. Score/time gating is the caller's concern.
    pub fn spawn_boss(&mut self, ctx: &mut Ctx, tuning: &Tuning, director: &mut BossDirector, kind: BossKind) -> SimResult<Handle> {
        if ctx.world.boss.is_some() {
            return Err(SimError::BossActive);
        }
        let def = tuning
            .boss(kind)
            .ok_or_else(|| SimError::UnknownBoss(kind.as_str().to_string()))?;

        let init = SpawnInit::Boss(BossInit {
            boss_kind: kind,
            pos: Vec2::new(ctx.world.field.width * 0.5, -def.size.y * 0.5),
            vel: Vec2::new(0.0, def.speed),
            size: def.size,
            max_health: def.max_health,
            score_value: def.score_value,
            move_range: def.move_range,
            now: ctx.now,
        });
        // Acquire before clearing the field
        let handle = ctx.pool.try_acquire(EntityKind::Boss, &init)?;
        let cleared = ctx.world.enemies.len();
        release_where(&mut ctx.world.enemies, ctx.pool, |_| true);
        ctx.world.boss = Some(handle);
        director.attach(handle, def.clone(), ctx.now);

        self.suspended = true;
        self.last_boss_spawn = ctx.now;
        if let BossTrigger::Score { step } = tuning.encounter.boss_trigger {
            let step = step.max(1);
            self.next_boss_score = (ctx.world.score / step + 1).saturating_mul(step);
        }
        log::info!("boss {} spawned ({} enemies cleared)", kind.as_str(), cleared);
        ctx.events.emit(GameEvent::BossSpawn {
            kind,
            max_health: def.max_health,
        });
        Ok(handle)
    }

    /// Boss death: announce, drop its bundle, release it, resume waves.
    /// Returns the score it was worth.
    pub fn on_boss_killed(&mut self, ctx: &mut Ctx, tuning: &Tuning, director: &mut BossDirector) -> u64 {
        director.detach();
        let Some(h) = ctx.world.boss.take() else {
            return 0;
        };
        let Some(boss) = ctx.pool.get(h).and_then(Entity::as_boss) else {
            ctx.pool.release(h);
            return 0;
        };
        let (kind, pos, score) = (boss.boss_kind, boss.body.pos, boss.score_value);
        ctx.pool.release(h);

        if let Some(def) = tuning.boss(kind) {
            self.drops.spawn_bundle(ctx.world, ctx.pool, &def.drops, pos, ctx.now);
        }
        self.bosses_defeated += 1;
        self.suspended = false;
        self.boss_clock_from = ctx.now;
        self.next_spawn_at = ctx.now + tuning.encounter.inter_wave_delay_ms;
        log::info!("boss {} defeated", kind.as_str());
        ctx.events.emit(GameEvent::BossDeath { kind, pos, score });
        score as u64
    }

    /// Follow-ups for dead enemies: splitter fragments and drop rolls
    pub fn on_kills(&mut self, ctx: &mut Ctx, cfg: &EncounterTuning, kills: &[Kill], rng: &mut impl Rng) {
        for kill in kills {
            let n = kill.split_count as u32;
            for i in 0..n {
                let spread = if n == 1 { 0.0 } else { (i as f32 / (n - 1) as f32) * 2.0 - 1.0 };
                let init = cfg.mini.init(kill.pos, Vec2::new(spread * 0.8, 1.0), 1.0, self.speed_mult(cfg), false, ctx.now);
                ctx.world.spawn_enemy(ctx.pool, ctx.events, init);
            }
            if let Some(payload) = self.drops.roll(rng) {
                self.drops.spawn(ctx.world, ctx.pool, payload, kill.pos, ctx.now);
            }
        }
    }

    /// Back to wave 1 with no boss history
    pub fn reset(&mut self, tuning: &Tuning, now: f64) {
        *self = Self::new(tuning, now);
    }
}
