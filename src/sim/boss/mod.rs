//! Boss behavior: attack pattern escalation and special skills
//!
//! The [`BossDirector`] drives the one active boss. Each tick it expires
//! buffs, retries deferred mode escalation, steps the skill FSM and then the
//! attack FSM, executes whatever they ask for, and hit-tests a live laser.

pub mod attack;
pub mod skill;

use std::f32::consts::TAU;
use std::fmt;

use glam::Vec2;
use serde::{Deserialize, Serialize};

use self::attack::{AttackAction, AttackFsm, AttackState};
use self::skill::{CastView, PendingSkill, SkillFsm, SkillTrigger};
use super::entity::{ActiveBuff, Boss, Handle, Owner};
use super::events::{BossSkillEvent, GameEvent, HitSource};
use super::state::{hostile_shot, Ctx};
use crate::consts::SIM_DT;
use crate::error::{SimError, SimResult};
use crate::tuning::{BossDef, SkillDef, SkillEffect, Tuning};
use crate::dir_from_angle;

/// Attack patterns, ordered from least to most aggressive
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub enum AttackMode {
    /// One aimed shot
    #[default]
    Single,
    /// Fan of shots centred on the player
    Spread,
    /// Vertical beam
    Laser,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum SkillId {
    Shockwave,
    BulletRing,
    SummonMinions,
    Enrage,
    Barrier,
    Regenerate,
}

impl SkillId {
    pub fn as_str(&self) -> &'static str {
        match self {
            SkillId::Shockwave => "shockwave",
            SkillId::BulletRing => "bullet_ring",
            SkillId::SummonMinions => "summon_minions",
            SkillId::Enrage => "enrage",
            SkillId::Barrier => "barrier",
            SkillId::Regenerate => "regenerate",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "shockwave" => Some(SkillId::Shockwave),
            "bullet_ring" | "ring" => Some(SkillId::BulletRing),
            "summon_minions" | "summon" => Some(SkillId::SummonMinions),
            "enrage" => Some(SkillId::Enrage),
            "barrier" => Some(SkillId::Barrier),
            "regenerate" | "regen" => Some(SkillId::Regenerate),
            _ => None,
        }
    }

    pub fn skill_type(&self) -> SkillType {
        match self {
            SkillId::Shockwave | SkillId::BulletRing => SkillType::Attack,
            SkillId::SummonMinions => SkillType::Summon,
            SkillId::Enrage | SkillId::Barrier | SkillId::Regenerate => SkillType::Buff,
        }
    }
}

impl fmt::Display for SkillId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Skill category, which decides cast condition and selection priority
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SkillType {
    Attack,
    Summon,
    Buff,
}

impl SkillType {
    /// Higher wins when several skills are ready
    pub fn priority(&self) -> u8 {
        match self {
            SkillType::Attack => 3,
            SkillType::Summon => 2,
            SkillType::Buff => 1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BuffKind {
    /// Shortens the attack interval by `magnitude` (fraction)
    Enrage,
    /// Reduces incoming damage by `magnitude` (fraction)
    Barrier,
    /// Heals `magnitude` health per second
    Regenerate,
}

/// A live laser: a vertical strip from the boss down to the field floor
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Beam {
    pub x: f32,
    pub top: f32,
    pub width: f32,
    pub until: f64,
}

impl Beam {
    pub fn hits(&self, pos: Vec2, half: Vec2) -> bool {
        (pos.x - self.x).abs() <= self.width * 0.5 + half.x && pos.y + half.y >= self.top
    }
}

#[derive(Debug, Clone)]
struct Engaged {
    handle: Handle,
    def: BossDef,
    attack: AttackFsm,
    skills: SkillFsm,
    beam: Option<Beam>,
}

#[derive(Debug, Clone, Default)]
pub struct BossDirector {
    engaged: Option<Engaged>,
}

impl BossDirector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take control of a freshly spawned boss
    pub fn attach(&mut self, handle: Handle, def: BossDef, now: f64) {
        if let Some(prev) = &self.engaged {
            log::warn!("director re-attached while {:?} was engaged", prev.handle);
        }
        self.engaged = Some(Engaged {
            handle,
            def,
            attack: AttackFsm::new(now),
            skills: SkillFsm::new(now),
            beam: None,
        });
    }

    /// Stop driving the current boss
    pub fn detach(&mut self) -> Option<Handle> {
        self.engaged.take().map(|e| e.handle)
    }

    pub fn is_engaged(&self) -> bool {
        self.engaged.is_some()
    }

    pub fn handle(&self) -> Option<Handle> {
        self.engaged.as_ref().map(|e| e.handle)
    }

    pub fn beam(&self) -> Option<Beam> {
        self.engaged.as_ref().and_then(|e| e.beam)
    }

    pub fn attack_state(&self) -> Option<AttackState> {
        self.engaged.as_ref().map(|e| e.attack.state())
    }

    pub fn attacks_fired(&self) -> u32 {
        self.engaged.as_ref().map_or(0, |e| e.attack.attacks_fired())
    }

    /// Skills currently telegraphing
    pub fn pending_skills(&self) -> &[PendingSkill] {
        self.engaged.as_ref().map_or(&[], |e| e.skills.pending())
    }

    /// Escalate after the boss took damage
    pub fn on_boss_hit(&mut self, ctx: &mut Ctx) {
        let Some(eng) = self.engaged.as_mut() else {
            return;
        };
        let Some(boss) = ctx.pool.get_mut(eng.handle).and_then(|e| e.as_boss_mut()) else {
            return;
        };
        if let Some((from, to)) = eng.attack.on_boss_hit(boss, &eng.def.attack, ctx.now) {
            ctx.events
                .emit(GameEvent::BossSkill(BossSkillEvent::ModeChanged { from, to }));
        }
    }

    /// Advance the engaged boss by one fixed step
    pub fn update(&mut self, ctx: &mut Ctx, tuning: &Tuning) {
        let Some(eng) = self.engaged.as_mut() else {
            return;
        };
        let now = ctx.now;
        let view = CastView {
            player_pos: ctx.world.player.body.pos,
            summons: ctx.world.summon_count(ctx.pool),
        };

        let Some(boss) = ctx.pool.get_mut(eng.handle).and_then(|e| e.as_boss_mut()) else {
            log::warn!("engaged boss {:?} vanished from the pool", eng.handle);
            self.engaged = None;
            return;
        };
        if boss.is_dead {
            return;
        }

        boss.expire_buffs(now);
        if let Some(per_sec) = boss.buff(BuffKind::Regenerate, now).map(|b| b.magnitude) {
            boss.heal(per_sec * SIM_DT);
        }

        let mode_change = eng.attack.retry_escalation(boss, &eng.def.attack, now);
        let triggers = eng.skills.step(boss, &eng.def, view, now);
        let interval_scale = boss
            .buff(BuffKind::Enrage, now)
            .map_or(1.0, |b| (1.0 - b.magnitude as f64).max(0.1));
        let action = eng.attack.step(boss.attack_mode, &eng.def.attack, now, interval_scale);
        let snapshot = boss.clone();

        if let Some((from, to)) = mode_change {
            ctx.events
                .emit(GameEvent::BossSkill(BossSkillEvent::ModeChanged { from, to }));
        }

        for trigger in triggers {
            match trigger {
                SkillTrigger::Warned { id, .. } => {
                    ctx.events
                        .emit(GameEvent::BossSkill(BossSkillEvent::SkillWarning { skill: id }));
                }
                SkillTrigger::Cast { id, forced } => {
                    if let Some(def) = eng.def.skill(id) {
                        cast_skill(ctx, tuning, eng.handle, &snapshot, def);
                    }
                    ctx.events
                        .emit(GameEvent::BossSkill(BossSkillEvent::SkillCast { skill: id, forced }));
                }
            }
        }

        match action {
            Some(AttackAction::Telegraph(mode)) => {
                ctx.events
                    .emit(GameEvent::BossSkill(BossSkillEvent::AttackWarning { mode }));
            }
            Some(AttackAction::Fire(mode)) => {
                if let Some(beam) = fire_attack(ctx, &eng.def, &snapshot, mode) {
                    eng.beam = Some(beam);
                }
                ctx.events
                    .emit(GameEvent::BossSkill(BossSkillEvent::AttackFired { mode }));
            }
            None => {}
        }

        if let Some(beam) = eng.beam {
            if now >= beam.until {
                eng.beam = None;
            } else {
                let player = &mut ctx.world.player;
                if beam.hits(player.body.pos, player.body.half_extents()) {
                    if let Some(lives_left) = player.take_hit(now, tuning.player.invincible_ms) {
                        ctx.events.emit(GameEvent::PlayerHit {
                            source: HitSource::Laser,
                            lives_left,
                        });
                    }
                }
            }
        }
    }

    /// Trigger a skill immediately, ignoring cooldown and cast condition
    pub fn force_skill(&mut self, ctx: &mut Ctx, tuning: &Tuning, id: SkillId) -> SimResult<()> {
        let eng = self.engaged.as_mut().ok_or(SimError::NoActiveBoss)?;
        let def = eng
            .def
            .skill(id)
            .cloned()
            .ok_or_else(|| SimError::SkillNotInKit(id.to_string()))?;
        let boss = ctx
            .pool
            .get_mut(eng.handle)
            .and_then(|e| e.as_boss_mut())
            .ok_or(SimError::NoActiveBoss)?;
        match eng.skills.force(boss, &def, ctx.now) {
            SkillTrigger::Warned { id, .. } => {
                ctx.events
                    .emit(GameEvent::BossSkill(BossSkillEvent::SkillWarning { skill: id }));
            }
            SkillTrigger::Cast { id, forced } => {
                let snapshot = boss.clone();
                cast_skill(ctx, tuning, eng.handle, &snapshot, &def);
                ctx.events
                    .emit(GameEvent::BossSkill(BossSkillEvent::SkillCast { skill: id, forced }));
            }
        }
        Ok(())
    }
}

/// Muzzle point under the boss
fn muzzle(boss: &Boss) -> Vec2 {
    boss.body.pos + Vec2::new(0.0, boss.body.size.y * 0.5)
}

fn fire_attack(ctx: &mut Ctx, def: &BossDef, boss: &Boss, mode: AttackMode) -> Option<Beam> {
    let cfg = &def.attack;
    let origin = muzzle(boss);
    let aim = (ctx.world.player.body.pos - origin).normalize_or(Vec2::Y);
    match mode {
        AttackMode::Single => {
            let init = hostile_shot(Owner::Boss, origin, aim * cfg.bullet_speed, cfg.bullet_size, cfg.bullet_damage);
            ctx.world.spawn_projectile(ctx.pool, init);
            None
        }
        AttackMode::Spread => {
            let n = cfg.spread_count.max(1);
            let arc = cfg.spread_arc_deg.to_radians();
            let center = aim.y.atan2(aim.x);
            for i in 0..n {
                let theta = if n == 1 {
                    center
                } else {
                    center - arc * 0.5 + arc * i as f32 / (n - 1) as f32
                };
                let vel = dir_from_angle(theta) * cfg.bullet_speed;
                let init = hostile_shot(Owner::Boss, origin, vel, cfg.bullet_size, cfg.bullet_damage);
                ctx.world.spawn_projectile(ctx.pool, init);
            }
            None
        }
        AttackMode::Laser => Some(Beam {
            x: boss.body.pos.x,
            top: origin.y,
            width: cfg.laser_width,
            until: ctx.now + cfg.laser_duration_ms,
        }),
    }
}

fn cast_skill(ctx: &mut Ctx, tuning: &Tuning, handle: Handle, boss: &Boss, skill: &SkillDef) {
    let now = ctx.now;
    match skill.effect {
        SkillEffect::Shockwave => {
            let player = &mut ctx.world.player;
            if player.body.pos.distance(boss.body.pos) <= skill.effect_radius {
                if let Some(lives_left) = player.take_hit(now, tuning.player.invincible_ms) {
                    ctx.events.emit(GameEvent::PlayerHit {
                        source: HitSource::Skill(skill.id),
                        lives_left,
                    });
                }
            }
        }
        SkillEffect::BulletRing { count, speed } => {
            let cfg = &tuning.encounter;
            let n = count.max(1);
            for i in 0..n {
                let vel = dir_from_angle(TAU * i as f32 / n as f32) * speed;
                let init = hostile_shot(Owner::Boss, boss.body.pos, vel, cfg.enemy_bullet_size, 1.0);
                ctx.world.spawn_projectile(ctx.pool, init);
            }
        }
        SkillEffect::Summon { count, cap } => {
            let alive = ctx.world.summon_count(ctx.pool) as u32;
            let n = count.min(cap.saturating_sub(alive));
            let arch = &tuning.encounter.minion;
            let base = muzzle(boss);
            for i in 0..n {
                let offset = (i as f32 - (n as f32 - 1.0) * 0.5) * arch.size.x * 2.0;
                let init = arch.init(base + Vec2::new(offset, 0.0), Vec2::Y, 1.0, 1.0, true, now);
                ctx.world.spawn_enemy(ctx.pool, ctx.events, init);
            }
            log::debug!("summoned {} minions ({} already alive)", n, alive);
        }
        SkillEffect::Buff {
            buff,
            duration_ms,
            magnitude,
        } => {
            if let Some(b) = ctx.pool.get_mut(handle).and_then(|e| e.as_boss_mut()) {
                b.buffs.retain(|x| x.kind != buff);
                b.buffs.push(ActiveBuff {
                    kind: buff,
                    until: now + duration_ms,
                    magnitude,
                });
            }
        }
    }
}
