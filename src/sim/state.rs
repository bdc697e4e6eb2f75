//! Game state: phase, player, and the active sets
//!
//! Active sets hold pool handles only. Anything removed from a set is
//! released to the pool in the same call.

use serde::{Deserialize, Serialize};

use super::entity::{EnemyInit, Entity, EntityKind, Handle, Owner, ProjectileInit, SpawnInit};
use super::events::{EventChannel, GameEvent};
use super::player::Player;
use super::pool::EntityPool;
use crate::in_field;
use crate::tuning::{FieldTuning, Tuning};

/// Current phase of gameplay
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GamePhase {
    /// Waiting for GAME_START
    Ready,
    Playing,
    Paused,
    GameOver,
}

#[derive(Debug, Clone)]
pub struct World {
    pub field: FieldTuning,
    pub player: Player,
    pub player_shots: Vec<Handle>,
    /// Enemy and boss projectiles
    pub hostile_shots: Vec<Handle>,
    pub enemies: Vec<Handle>,
    pub boss: Option<Handle>,
    pub pickups: Vec<Handle>,
    pub score: u64,
}

impl World {
    pub fn new(tuning: &Tuning) -> Self {
        Self {
            field: tuning.field.clone(),
            player: Player::new(&tuning.player, &tuning.field),
            player_shots: Vec::new(),
            hostile_shots: Vec::new(),
            enemies: Vec::new(),
            boss: None,
            pickups: Vec::new(),
            score: 0,
        }
    }

    /// Acquire a projectile and file it under the owner's set
    pub fn spawn_projectile(&mut self, pool: &mut EntityPool, init: ProjectileInit) -> Option<Handle> {
        let hostile = init.owner.is_hostile();
        let handle = pool.acquire(EntityKind::Projectile, &SpawnInit::Projectile(init))?;
        if hostile {
            self.hostile_shots.push(handle);
        } else {
            self.player_shots.push(handle);
        }
        Some(handle)
    }

    /// Acquire an enemy, track it, and announce it
    pub fn spawn_enemy(&mut self, pool: &mut EntityPool, events: &mut EventChannel, init: EnemyInit) -> Option<Handle> {
        let (kind, pos) = (init.kind, init.pos);
        let handle = pool.acquire(EntityKind::Enemy, &SpawnInit::Enemy(init))?;
        self.enemies.push(handle);
        events.emit(GameEvent::EnemySpawn { handle, kind, pos });
        Some(handle)
    }

    /// Living boss summons
    pub fn summon_count(&self, pool: &EntityPool) -> usize {
        self.enemies
            .iter()
            .filter_map(|&h| pool.get(h).and_then(Entity::as_enemy))
            .filter(|e| e.summoned && !e.is_dead)
            .count()
    }

    /// Every handle currently held, in set order
    pub fn handles(&self) -> impl Iterator<Item = Handle> + '_ {
        self.player_shots
            .iter()
            .chain(&self.hostile_shots)
            .chain(&self.enemies)
            .chain(&self.pickups)
            .chain(self.boss.iter())
            .copied()
    }

    /// Release everything back to the pool and empty the sets
    pub fn release_all(&mut self, pool: &mut EntityPool) {
        for set in [
            &mut self.player_shots,
            &mut self.hostile_shots,
            &mut self.enemies,
            &mut self.pickups,
        ] {
            for h in set.drain(..) {
                pool.release(h);
            }
        }
        if let Some(h) = self.boss.take() {
            pool.release(h);
        }
    }

    /// Release and forget projectiles that left the field
    pub fn cull_projectiles(&mut self, pool: &mut EntityPool) {
        let field = &self.field;
        for set in [&mut self.player_shots, &mut self.hostile_shots] {
            release_where(set, pool, |e| {
                let pos = e.body().pos;
                !in_field(pos, field.width, field.height, field.margin)
            });
        }
    }
}

/// Mutable borrow of everything a per-tick system touches
pub struct Ctx<'a> {
    pub world: &'a mut World,
    pub pool: &'a mut EntityPool,
    pub events: &'a mut EventChannel,
    /// Simulation clock, ms
    pub now: f64,
}

/// Remove handles matching `pred` (or already inactive) and release them
pub fn release_where(set: &mut Vec<Handle>, pool: &mut EntityPool, mut pred: impl FnMut(&Entity) -> bool) {
    set.retain(|&h| {
        let drop_it = match pool.get(h) {
            Some(e) => !e.is_active() || pred(e),
            None => true,
        };
        if drop_it {
            pool.release(h);
        }
        !drop_it
    });
}

/// Hostile projectile spawn data
pub fn hostile_shot(owner: Owner, pos: glam::Vec2, vel: glam::Vec2, size: glam::Vec2, damage: f32) -> ProjectileInit {
    ProjectileInit {
        pos,
        vel,
        size,
        damage,
        owner,
        penetrating: false,
    }
}

#[cfg(test)]
mod tests {
    use glam::Vec2;

    use super::*;

    fn setup() -> (World, EntityPool) {
        let tuning = Tuning::default();
        (World::new(&tuning), EntityPool::with_defaults(&tuning.pools.as_map()))
    }

    #[test]
    fn test_spawn_projectile_files_by_owner() {
        let (mut world, mut pool) = setup();
        let size = Vec2::splat(6.0);
        world
            .spawn_projectile(&mut pool, hostile_shot(Owner::Boss, Vec2::new(50.0, 50.0), Vec2::Y, size, 1.0))
            .unwrap();
        world
            .spawn_projectile(
                &mut pool,
                ProjectileInit {
                    owner: Owner::Player,
                    ..hostile_shot(Owner::Player, Vec2::new(50.0, 50.0), -Vec2::Y, size, 1.0)
                },
            )
            .unwrap();
        assert_eq!(world.hostile_shots.len(), 1);
        assert_eq!(world.player_shots.len(), 1);
    }

    #[test]
    fn test_cull_releases_out_of_field_shots() {
        let (mut world, mut pool) = setup();
        let size = Vec2::splat(6.0);
        world
            .spawn_projectile(&mut pool, hostile_shot(Owner::Enemy, Vec2::new(50.0, 50.0), Vec2::Y, size, 1.0))
            .unwrap();
        world
            .spawn_projectile(&mut pool, hostile_shot(Owner::Enemy, Vec2::new(50.0, 5000.0), Vec2::Y, size, 1.0))
            .unwrap();
        let before = pool.free_len(EntityKind::Projectile);
        world.cull_projectiles(&mut pool);
        assert_eq!(world.hostile_shots.len(), 1);
        assert_eq!(pool.free_len(EntityKind::Projectile), before + 1);
    }

    #[test]
    fn test_release_all_returns_everything() {
        let (mut world, mut pool) = setup();
        for i in 0..10 {
            world.spawn_projectile(
                &mut pool,
                hostile_shot(Owner::Enemy, Vec2::new(i as f32, 50.0), Vec2::Y, Vec2::ONE, 1.0),
            );
        }
        world.release_all(&mut pool);
        assert_eq!(world.handles().count(), 0);
        assert_eq!(
            pool.free_len(EntityKind::Projectile),
            pool.allocated(EntityKind::Projectile)
        );
    }
}
