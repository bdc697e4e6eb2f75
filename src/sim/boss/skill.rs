//! Skill FSM: threshold-forced and cooldown-gated special abilities
//!
//! Each tick, newly crossed `(skill, threshold)` pairs force their skill
//! (once per boss lifetime, bypassing cooldown). Otherwise, every
//! `skill_check_ms` the highest-priority ready skill whose cast condition
//! holds is triggered. Skills with a warning are parked until it elapses.

use glam::Vec2;

use super::{SkillId, SkillType};
use crate::sim::entity::{threshold_key, Boss};
use crate::tuning::{BossDef, SkillDef, SkillEffect};

/// A triggered skill waiting out its telegraph
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PendingSkill {
    pub id: SkillId,
    pub fire_at: f64,
    pub forced: bool,
}

/// Outcome of a trigger
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SkillTrigger {
    /// Effect lands now
    Cast { id: SkillId, forced: bool },
    /// Telegraph started; effect lands at `fire_at`
    Warned { id: SkillId, fire_at: f64 },
}

/// Snapshot of the world the cast conditions look at
#[derive(Debug, Clone, Copy)]
pub struct CastView {
    pub player_pos: Vec2,
    pub summons: usize,
}

#[derive(Debug, Clone, Default)]
pub struct SkillFsm {
    pending: Vec<PendingSkill>,
    next_check_at: f64,
}

impl SkillFsm {
    pub fn new(now: f64) -> Self {
        Self {
            pending: Vec::new(),
            next_check_at: now,
        }
    }

    pub fn pending(&self) -> &[PendingSkill] {
        &self.pending
    }

    /// Advance one tick. Returns triggers (warnings started and casts landing).
    pub fn step(&mut self, boss: &mut Boss, def: &BossDef, view: CastView, now: f64) -> Vec<SkillTrigger> {
        let mut out = Vec::new();

        // Warnings that elapsed
        let mut i = 0;
        while i < self.pending.len() {
            if self.pending[i].fire_at <= now {
                let p = self.pending.remove(i);
                out.push(SkillTrigger::Cast {
                    id: p.id,
                    forced: p.forced,
                });
            } else {
                i += 1;
            }
        }

        // (a) thresholds
        let ratio = boss.health_ratio();
        let mut forced_any = false;
        for skill in &def.skills {
            // One forced cast per threshold, even when a single hit crosses several
            for &t in &skill.thresholds {
                let key = (skill.id, threshold_key(t));
                if ratio <= t && boss.triggered_thresholds.insert(key) {
                    log::info!("{:?} forced by health threshold {:.2} ({:.2})", skill.id, t, ratio);
                    out.push(self.trigger(boss, skill, true, now));
                    forced_any = true;
                }
            }
        }
        if forced_any {
            return out;
        }

        // (b) periodic priority selection
        if now >= self.next_check_at {
            self.next_check_at = now + def.skill_check_ms;
            let pick = def
                .skills
                .iter()
                .filter(|s| self.is_ready(boss, s, now))
                .filter(|s| can_cast(boss, s, view, now))
                .max_by_key(|s| (s.id.skill_type().priority(), std::cmp::Reverse(index_of(def, s.id))));
            if let Some(skill) = pick {
                out.push(self.trigger(boss, skill, false, now));
            }
        }
        out
    }

    /// Force a skill regardless of cooldown (command surface)
    pub fn force(&mut self, boss: &mut Boss, skill: &SkillDef, now: f64) -> SkillTrigger {
        self.trigger(boss, skill, true, now)
    }

    fn is_ready(&self, boss: &Boss, skill: &SkillDef, now: f64) -> bool {
        let cooled = boss.skill_cooldowns.get(&skill.id).is_none_or(|&t| now >= t);
        cooled && !self.pending.iter().any(|p| p.id == skill.id)
    }

    fn trigger(&mut self, boss: &mut Boss, skill: &SkillDef, forced: bool, now: f64) -> SkillTrigger {
        boss.skill_cooldowns.insert(skill.id, now + skill.cooldown_ms);
        if skill.warning_ms > 0.0 {
            let fire_at = now + skill.warning_ms;
            self.pending.push(PendingSkill {
                id: skill.id,
                fire_at,
                forced,
            });
            SkillTrigger::Warned { id: skill.id, fire_at }
        } else {
            SkillTrigger::Cast { id: skill.id, forced }
        }
    }
}

fn index_of(def: &BossDef, id: SkillId) -> usize {
    def.skills.iter().position(|s| s.id == id).unwrap_or(usize::MAX)
}

/// Type-specific cast condition
pub fn can_cast(boss: &Boss, skill: &SkillDef, view: CastView, now: f64) -> bool {
    match (skill.id.skill_type(), skill.effect) {
        (SkillType::Attack, _) => {
            let center = boss.body.pos;
            view.player_pos.distance(center) <= skill.effect_radius * 2.0
        }
        (SkillType::Summon, SkillEffect::Summon { cap, .. }) => view.summons < cap as usize,
        (SkillType::Buff, SkillEffect::Buff { buff, .. }) => !boss.has_buff(buff, now),
        // Effect does not match the id's declared type
        _ => false,
    }
}
