//! The player's avatar, leveling and skill progression

use glam::Vec2;
use serde::{Deserialize, Serialize};

use super::entity::{Body, PickupPayload};
use crate::tuning::{FieldTuning, PlayerTuning};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Player {
    pub body: Body,
    pub lives: u8,
    pub max_lives: u8,
    /// Post-hit invulnerability deadline
    pub invincible_until: f64,
    pub shield_until: f64,
    pub rapid_until: f64,
    pub next_fire_at: f64,
    pub level: u32,
    /// Exp toward the next level
    pub exp: u32,
    pub shards: u32,
    pub bombs: u32,
}

impl Player {
    pub fn new(t: &PlayerTuning, field: &FieldTuning) -> Self {
        Self {
            body: Body::new(
                Vec2::new(field.width * 0.5, field.height - t.size.y * 2.0),
                Vec2::ZERO,
                t.size,
            ),
            lives: t.lives,
            max_lives: t.max_lives,
            invincible_until: 0.0,
            shield_until: 0.0,
            rapid_until: 0.0,
            next_fire_at: 0.0,
            level: 1,
            exp: 0,
            shards: 0,
            bombs: 0,
        }
    }

    pub fn is_alive(&self) -> bool {
        self.lives > 0
    }

    pub fn is_shielded(&self, now: f64) -> bool {
        now < self.shield_until
    }

    pub fn is_vulnerable(&self, now: f64) -> bool {
        self.is_alive() && now >= self.invincible_until && !self.is_shielded(now)
    }

    /// Lose a life unless shielded or invincible. Returns lives left when the
    /// hit landed.
    pub fn take_hit(&mut self, now: f64, invincible_ms: f64) -> Option<u8> {
        if !self.is_vulnerable(now) {
            return None;
        }
        self.lives = self.lives.saturating_sub(1);
        self.invincible_until = now + invincible_ms;
        Some(self.lives)
    }

    /// Move by a (not necessarily normalized) direction, clamped to the field
    pub fn steer(&mut self, dir: Vec2, dt: f32, speed: f32, field: &FieldTuning) {
        let dir = dir.clamp_length_max(1.0);
        self.body.vel = dir * speed;
        self.body.step(dt);
        let half = self.body.half_extents();
        self.body.pos = self
            .body
            .pos
            .clamp(half, Vec2::new(field.width, field.height) - half);
    }

    /// Damage per shot at the current level
    pub fn shot_damage(&self, t: &PlayerTuning) -> f32 {
        t.bullet_damage + t.damage_per_level * (self.level.saturating_sub(1)) as f32
    }

    /// Parallel shot streams: one more at levels 3 and 5
    pub fn streams(&self) -> u32 {
        match self.level {
            0..=2 => 1,
            3..=4 => 2,
            _ => 3,
        }
    }

    pub fn fire_interval(&self, now: f64, t: &PlayerTuning) -> f64 {
        if now < self.rapid_until {
            t.fire_interval_ms * t.rapid_fire_factor
        } else {
            t.fire_interval_ms
        }
    }

    /// Add exp; returns the new level if at least one level was gained
    pub fn gain_exp(&mut self, amount: u32, t: &PlayerTuning) -> Option<u32> {
        let start = self.level;
        self.exp += amount;
        loop {
            let need = t.exp_per_level.max(1) * self.level;
            if self.exp < need {
                break;
            }
            self.exp -= need;
            self.level += 1;
        }
        (self.level != start).then_some(self.level)
    }

    /// Apply a pickup. Returns score awarded by it.
    pub fn apply_pickup(&mut self, payload: PickupPayload, now: f64, t: &PlayerTuning) -> u64 {
        match payload {
            PickupPayload::Score(points) => return points as u64,
            PickupPayload::Life => self.lives = (self.lives + 1).min(self.max_lives),
            PickupPayload::SkillShard => {
                self.shards += 1;
                if self.shards >= t.shards_per_bomb.max(1) {
                    self.shards = 0;
                    self.bombs += 1;
                }
            }
            PickupPayload::Shield => self.shield_until = self.shield_until.max(now) + t.shield_ms,
            PickupPayload::RapidFire => self.rapid_until = self.rapid_until.max(now) + t.rapid_ms,
        }
        0
    }
}
