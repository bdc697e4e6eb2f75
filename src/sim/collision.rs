//! Per-tick collision pass
//!
//! Split in two: [`detect`] reads a snapshot and produces a [`HitSet`]
//! without touching anything, [`CollisionResolver::apply`] mutates health,
//! emits events and releases consumed entities. Categories run in a fixed
//! order so a bullet spent on the boss is never counted against an enemy.

use std::collections::{HashMap, HashSet};

use glam::Vec2;

use super::entity::{Body, EnemyKind, Entity, Handle};
use super::events::{DeathCause, GameEvent, HitSource};
use super::pool::EntityPool;
use super::state::{Ctx, World};
use crate::tuning::PlayerTuning;

/// Center-based AABB overlap (touching edges count)
#[inline]
pub fn aabb_overlap(a_pos: Vec2, a_size: Vec2, b_pos: Vec2, b_size: Vec2) -> bool {
    let d = (a_pos - b_pos).abs();
    let reach = (a_size + b_size) * 0.5;
    d.x <= reach.x && d.y <= reach.y
}

#[inline]
pub fn bodies_overlap(a: &Body, b: &Body) -> bool {
    a.active && b.active && aabb_overlap(a.pos, a.size, b.pos, b.size)
}

/// Everything that overlapped this tick, in check order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HitSet {
    /// (1) player shot -> boss
    pub boss_hits: Vec<(Handle, f32)>,
    /// (2) player shot -> enemy
    pub enemy_hits: Vec<(Handle, Handle, f32)>,
    /// Player shots spent in (1) or (2)
    pub spent_shots: Vec<Handle>,
    /// (3) hostile shots touching the player
    pub player_shot_hits: Vec<Handle>,
    /// (4) enemy bodies touching the player
    pub contacts: Vec<Handle>,
    /// (5) pickups the player touched
    pub pickups: Vec<Handle>,
}

impl HitSet {
    pub fn is_empty(&self) -> bool {
        self.boss_hits.is_empty()
            && self.enemy_hits.is_empty()
            && self.player_shot_hits.is_empty()
            && self.contacts.is_empty()
            && self.pickups.is_empty()
    }
}

/// Snapshot of a dead enemy, taken before its slot is released
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Kill {
    pub kind: EnemyKind,
    pub pos: Vec2,
    pub score: u32,
    pub split_count: u8,
    pub summoned: bool,
    pub cause: DeathCause,
}

/// What the resolver changed, for the systems downstream
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Outcome {
    pub kills: Vec<Kill>,
    pub boss_damaged: bool,
    pub boss_killed: bool,
    /// Score granted by pickups
    pub pickup_score: u64,
}

/// Pure detection pass over the current snapshot
pub fn detect(world: &World, pool: &EntityPool) -> HitSet {
    let mut hits = HitSet::default();
    let mut spent: HashSet<Handle> = HashSet::new();

    // (1) player shots vs boss
    let boss = world.boss.and_then(|bh| {
        pool.get(bh)
            .and_then(Entity::as_boss)
            .filter(|b| b.body.active && !b.is_dead)
            .map(|b| (bh, b))
    });
    if let Some((bh, boss)) = boss {
        let mut health = boss.health;
        for &h in &world.player_shots {
            if health <= 0.0 {
                break;
            }
            let Some(shot) = pool.get(h).and_then(Entity::as_projectile) else {
                continue;
            };
            if shot.pierced.contains(&bh) || !bodies_overlap(&shot.body, &boss.body) {
                continue;
            }
            hits.boss_hits.push((h, shot.damage));
            health -= shot.damage;
            // A shot that struck the boss sits out (2) this tick, piercing or not
            spent.insert(h);
            if !shot.penetrating {
                hits.spent_shots.push(h);
            }
        }
    }

    // (2) player shots vs enemies
    let mut tally: HashMap<Handle, f32> = HashMap::new();
    for &h in &world.player_shots {
        if spent.contains(&h) {
            continue;
        }
        let Some(shot) = pool.get(h).and_then(Entity::as_projectile) else {
            continue;
        };
        if !shot.body.active {
            continue;
        }
        for &eh in &world.enemies {
            let Some(enemy) = pool.get(eh).and_then(Entity::as_enemy) else {
                continue;
            };
            let health = tally.entry(eh).or_insert(enemy.health);
            if enemy.is_dead || *health <= 0.0 || !bodies_overlap(&shot.body, &enemy.body) {
                continue;
            }
            if shot.penetrating {
                if shot.pierced.contains(&eh) {
                    continue;
                }
                *health -= shot.damage;
                hits.enemy_hits.push((h, eh, shot.damage));
            } else {
                *health -= shot.damage;
                hits.enemy_hits.push((h, eh, shot.damage));
                hits.spent_shots.push(h);
                break;
            }
        }
    }

    let player = &world.player;
    if player.is_alive() {
        // (3) hostile shots vs player
        for &h in &world.hostile_shots {
            let Some(shot) = pool.get(h).and_then(Entity::as_projectile) else {
                continue;
            };
            if bodies_overlap(&shot.body, &player.body) {
                hits.player_shot_hits.push(h);
            }
        }

        // (4) enemy bodies vs player
        for &eh in &world.enemies {
            let Some(enemy) = pool.get(eh).and_then(Entity::as_enemy) else {
                continue;
            };
            let alive = !enemy.is_dead && tally.get(&eh).is_none_or(|&hp| hp > 0.0);
            if alive && bodies_overlap(&enemy.body, &player.body) {
                hits.contacts.push(eh);
            }
        }

        // (5) pickups
        for &dh in &world.pickups {
            let Some(pickup) = pool.get(dh).and_then(Entity::as_pickup) else {
                continue;
            };
            if bodies_overlap(&pickup.body, &player.body) {
                hits.pickups.push(dh);
            }
        }
    }

    hits
}

#[derive(Debug, Clone, Default)]
pub struct CollisionResolver {
    resolved: u64,
}

impl CollisionResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ticks resolved so far
    pub fn resolved(&self) -> u64 {
        self.resolved
    }

    /// Detect and apply in one go
    pub fn resolve(&mut self, ctx: &mut Ctx, player_tuning: &PlayerTuning) -> Outcome {
        let hits = detect(ctx.world, ctx.pool);
        self.apply(&hits, ctx, player_tuning)
    }

    pub fn apply(&mut self, hits: &HitSet, ctx: &mut Ctx, player_tuning: &PlayerTuning) -> Outcome {
        self.resolved += 1;
        let mut out = Outcome::default();
        let now = ctx.now;

        // (1)
        if let Some(bh) = ctx.world.boss {
            for &(shot, damage) in &hits.boss_hits {
                if let Some(p) = ctx.pool.get_mut(shot).and_then(Entity::as_projectile_mut) {
                    if p.penetrating {
                        p.pierced.push(bh);
                    }
                }
                let Some(boss) = ctx.pool.get_mut(bh).and_then(Entity::as_boss_mut) else {
                    break;
                };
                let (dealt, killed) = boss.apply_damage(damage, now);
                if dealt <= 0.0 && !killed {
                    continue;
                }
                out.boss_damaged = true;
                let (health, max_health) = (boss.health, boss.max_health);
                ctx.events.emit(GameEvent::BossHit {
                    damage: dealt,
                    health,
                    max_health,
                });
                if killed {
                    out.boss_killed = true;
                    break;
                }
            }
        }

        // (2)
        let mut dead: Vec<(Handle, DeathCause)> = Vec::new();
        for &(shot, eh, damage) in &hits.enemy_hits {
            let Some(enemy) = ctx.pool.get_mut(eh).and_then(Entity::as_enemy_mut) else {
                continue;
            };
            if enemy.apply_damage(damage) {
                dead.push((eh, DeathCause::Shot));
            }
            if let Some(p) = ctx.pool.get_mut(shot).and_then(Entity::as_projectile_mut) {
                if p.penetrating {
                    p.pierced.push(eh);
                }
            }
        }
        release_listed(&mut ctx.world.player_shots, ctx.pool, &hits.spent_shots);

        // (3)
        for _ in &hits.player_shot_hits {
            let player = &mut ctx.world.player;
            if let Some(lives_left) = player.take_hit(now, player_tuning.invincible_ms) {
                ctx.events.emit(GameEvent::PlayerHit {
                    source: HitSource::Projectile,
                    lives_left,
                });
            }
        }
        release_listed(&mut ctx.world.hostile_shots, ctx.pool, &hits.player_shot_hits);

        // (4) the enemy is destroyed whether or not the player was vulnerable
        for &eh in &hits.contacts {
            let Some(enemy) = ctx.pool.get_mut(eh).and_then(Entity::as_enemy_mut) else {
                continue;
            };
            if enemy.is_dead {
                continue;
            }
            enemy.is_dead = true;
            enemy.health = 0.0;
            dead.push((eh, DeathCause::Contact));
            let player = &mut ctx.world.player;
            if let Some(lives_left) = player.take_hit(now, player_tuning.invincible_ms) {
                ctx.events.emit(GameEvent::PlayerHit {
                    source: HitSource::Contact,
                    lives_left,
                });
            }
        }

        // (5)
        for &dh in &hits.pickups {
            let Some(pickup) = ctx.pool.get(dh).and_then(Entity::as_pickup) else {
                continue;
            };
            let (payload, pos) = (pickup.payload, pickup.body.pos);
            out.pickup_score += ctx.world.player.apply_pickup(payload, now, player_tuning);
            ctx.events.emit(GameEvent::ItemPickup { payload, pos });
        }
        release_listed(&mut ctx.world.pickups, ctx.pool, &hits.pickups);

        for (eh, cause) in dead {
            if let Some(kill) = kill_enemy(ctx, eh, cause) {
                out.kills.push(kill);
            }
        }
        out
    }
}

/// Record, announce and release a dead enemy
pub fn kill_enemy(ctx: &mut Ctx, handle: Handle, cause: DeathCause) -> Option<Kill> {
    let enemy = ctx.pool.get(handle).and_then(Entity::as_enemy)?;
    // Contact kills are not worth points
    let score = match cause {
        DeathCause::Contact => 0,
        _ => enemy.score_value,
    };
    let kill = Kill {
        kind: enemy.kind,
        pos: enemy.body.pos,
        score,
        split_count: enemy.split_count,
        summoned: enemy.summoned,
        cause,
    };
    ctx.events.emit(GameEvent::EnemyDeath {
        handle,
        kind: kill.kind,
        pos: kill.pos,
        score,
        cause,
    });
    release_listed(&mut ctx.world.enemies, ctx.pool, &[handle]);
    Some(kill)
}

fn release_listed(set: &mut Vec<Handle>, pool: &mut EntityPool, gone: &[Handle]) {
    if gone.is_empty() {
        return;
    }
    set.retain(|h| {
        let remove = gone.contains(h);
        if remove {
            pool.release(*h);
        }
        !remove
    });
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use super::*;
    use crate::sim::entity::{Behavior, BossInit, BossKind, EnemyInit, EntityKind, Owner, ProjectileInit, SpawnInit};
    use crate::sim::events::{EventChannel, Topic};
    use crate::tuning::Tuning;

    struct Rig {
        tuning: Tuning,
        world: World,
        pool: EntityPool,
        events: EventChannel,
    }

    impl Rig {
        fn new() -> Self {
            let tuning = Tuning::default();
            let mut world = World::new(&tuning);
            world.player.body.pos = Vec2::new(240.0, 600.0);
            Self {
                world,
                pool: EntityPool::with_defaults(&tuning.pools.as_map()),
                events: EventChannel::new(),
                tuning,
            }
        }

        fn enemy(&mut self, pos: Vec2, health: f32) -> Handle {
            let init = EnemyInit {
                kind: EnemyKind::Basic,
                behavior: Behavior::Straight,
                pos,
                vel: Vec2::ZERO,
                size: Vec2::splat(20.0),
                health,
                score_value: 10,
                split_count: 0,
                summoned: false,
                fire_interval_ms: 0.0,
                now: 0.0,
            };
            self.world
                .spawn_enemy(&mut self.pool, &mut self.events, init)
                .unwrap()
        }

        fn shot(&mut self, owner: Owner, pos: Vec2, damage: f32, penetrating: bool) -> Handle {
            let init = ProjectileInit {
                pos,
                vel: Vec2::ZERO,
                size: Vec2::new(4.0, 10.0),
                damage,
                owner,
                penetrating,
            };
            self.world.spawn_projectile(&mut self.pool, init).unwrap()
        }

        fn boss(&mut self, pos: Vec2, health: f32) -> Handle {
            let init = SpawnInit::Boss(BossInit {
                boss_kind: BossKind::Golem,
                pos,
                vel: Vec2::ZERO,
                size: Vec2::new(100.0, 80.0),
                max_health: health,
                score_value: 100,
                move_range: (0.0, 480.0),
                now: 0.0,
            });
            let h = self.pool.acquire(EntityKind::Boss, &init).unwrap();
            self.world.boss = Some(h);
            h
        }

        fn resolve(&mut self, now: f64) -> Outcome {
            let mut ctx = Ctx {
                world: &mut self.world,
                pool: &mut self.pool,
                events: &mut self.events,
                now,
            };
            CollisionResolver::new().resolve(&mut ctx, &self.tuning.player)
        }
    }

    #[test]
    fn test_aabb_overlap() {
        let s = Vec2::splat(10.0);
        assert!(aabb_overlap(Vec2::ZERO, s, Vec2::new(10.0, 0.0), s));
        assert!(!aabb_overlap(Vec2::ZERO, s, Vec2::new(10.1, 0.0), s));
        assert!(aabb_overlap(Vec2::ZERO, s, Vec2::new(5.0, -9.0), s));
    }

    #[test]
    fn test_detect_is_deterministic() {
        let mut rig = Rig::new();
        rig.boss(Vec2::new(100.0, 100.0), 50.0);
        for i in 0..6 {
            let x = 200.0 + i as f32 * 15.0;
            rig.enemy(Vec2::new(x, 300.0), 2.0);
            rig.shot(Owner::Player, Vec2::new(x, 300.0), 1.0, i % 2 == 0);
        }
        rig.shot(Owner::Player, Vec2::new(100.0, 100.0), 3.0, false);
        rig.shot(Owner::Boss, rig.world.player.body.pos, 1.0, false);

        let a = detect(&rig.world, &rig.pool);
        let b = detect(&rig.world, &rig.pool);
        assert_eq!(a, b);
        assert!(!a.is_empty());
        assert_eq!(a.boss_hits.len(), 1);
        assert_eq!(a.player_shot_hits.len(), 1);
    }

    #[test]
    fn test_shot_spent_on_boss_is_not_reused_on_enemy() {
        let mut rig = Rig::new();
        rig.boss(Vec2::new(200.0, 200.0), 50.0);
        // Enemy inside the boss box
        let e = rig.enemy(Vec2::new(200.0, 200.0), 1.0);
        rig.shot(Owner::Player, Vec2::new(200.0, 200.0), 1.0, false);
        let hits = detect(&rig.world, &rig.pool);
        assert_eq!(hits.boss_hits.len(), 1);
        assert!(hits.enemy_hits.is_empty());
        rig.resolve(0.0);
        assert!(rig.world.player_shots.is_empty());
        assert!(rig.pool.is_active(e));
    }

    #[test]
    fn test_non_penetrating_hits_first_enemy_only() {
        let mut rig = Rig::new();
        let a = rig.enemy(Vec2::new(100.0, 100.0), 1.0);
        let b = rig.enemy(Vec2::new(105.0, 100.0), 1.0);
        rig.shot(Owner::Player, Vec2::new(102.0, 100.0), 5.0, false);
        let out = rig.resolve(0.0);
        assert_eq!(out.kills.len(), 1);
        assert!(!rig.pool.is_active(a));
        assert!(rig.pool.is_active(b));
        assert!(rig.world.player_shots.is_empty());
    }

    #[test]
    fn test_penetrating_shot_pierces_and_survives() {
        let mut rig = Rig::new();
        rig.enemy(Vec2::new(100.0, 100.0), 3.0);
        rig.enemy(Vec2::new(105.0, 100.0), 3.0);
        let s = rig.shot(Owner::Player, Vec2::new(102.0, 100.0), 1.0, true);
        let out = rig.resolve(0.0);
        assert!(out.kills.is_empty());
        assert_eq!(rig.world.player_shots, vec![s]);
        // Already-pierced enemies are not hit again
        let hits = detect(&rig.world, &rig.pool);
        assert!(hits.enemy_hits.is_empty());
    }

    #[test]
    fn test_penetrating_shot_hits_boss_once_and_skips_enemies_that_tick() {
        let mut rig = Rig::new();
        rig.boss(Vec2::new(200.0, 200.0), 1.0);
        let e = rig.enemy(Vec2::new(200.0, 200.0), 1.0);
        let s = rig.shot(Owner::Player, Vec2::new(200.0, 200.0), 5.0, true);
        let hits = detect(&rig.world, &rig.pool);
        assert_eq!(hits.boss_hits, vec![(s, 5.0)]);
        assert!(hits.enemy_hits.is_empty());

        let out = rig.resolve(0.0);
        assert!(out.boss_killed);
        assert!(out.kills.is_empty());
        assert!(rig.pool.is_active(e));
        assert_eq!(rig.world.player_shots, vec![s]);
    }

    #[test]
    fn test_penetrating_shot_does_not_rehit_the_boss() {
        let mut rig = Rig::new();
        let b = rig.boss(Vec2::new(200.0, 200.0), 10.0);
        rig.shot(Owner::Player, Vec2::new(200.0, 200.0), 1.0, true);
        rig.resolve(0.0);
        rig.resolve(16.0);
        rig.resolve(32.0);
        let boss = rig.pool.get(b).and_then(Entity::as_boss).unwrap();
        assert_eq!(boss.health, 9.0);
        assert!(detect(&rig.world, &rig.pool).boss_hits.is_empty());
    }

    #[test]
    fn test_two_shots_one_death() {
        let mut rig = Rig::new();
        let deaths = Rc::new(RefCell::new(0));
        let d = deaths.clone();
        rig.events.subscribe(Topic::EnemyDeath, move |_| *d.borrow_mut() += 1);
        rig.enemy(Vec2::new(100.0, 100.0), 1.0);
        rig.shot(Owner::Player, Vec2::new(100.0, 100.0), 1.0, false);
        let second = rig.shot(Owner::Player, Vec2::new(100.0, 100.0), 1.0, false);
        rig.resolve(0.0);
        assert_eq!(*deaths.borrow(), 1);
        // The second shot found nothing alive and keeps flying
        assert_eq!(rig.world.player_shots, vec![second]);
    }

    #[test]
    fn test_hostile_shot_hits_player_once_then_invincible() {
        let mut rig = Rig::new();
        let pos = rig.world.player.body.pos;
        rig.shot(Owner::Enemy, pos, 1.0, false);
        rig.shot(Owner::Boss, pos, 1.0, false);
        rig.resolve(0.0);
        assert_eq!(rig.world.player.lives, 2);
        assert!(rig.world.hostile_shots.is_empty());
        assert_eq!(
            rig.pool.free_len(EntityKind::Projectile),
            rig.pool.allocated(EntityKind::Projectile)
        );
    }

    #[test]
    fn test_contact_destroys_enemy_even_when_shielded() {
        let mut rig = Rig::new();
        rig.world.player.shield_until = 10_000.0;
        let pos = rig.world.player.body.pos;
        let e = rig.enemy(pos, 5.0);
        let out = rig.resolve(0.0);
        assert_eq!(out.kills.len(), 1);
        assert_eq!(out.kills[0].cause, DeathCause::Contact);
        assert_eq!(out.kills[0].score, 0);
        assert!(!rig.pool.is_active(e));
        assert_eq!(rig.world.player.lives, 3);
    }

    #[test]
    fn test_boss_kill_is_reported_once() {
        let mut rig = Rig::new();
        rig.boss(Vec2::new(100.0, 100.0), 2.0);
        for _ in 0..4 {
            rig.shot(Owner::Player, Vec2::new(100.0, 100.0), 1.0, false);
        }
        let hits = Rc::new(RefCell::new(0));
        let h = hits.clone();
        rig.events.subscribe(Topic::BossHit, move |_| *h.borrow_mut() += 1);
        let out = rig.resolve(0.0);
        assert!(out.boss_killed);
        assert_eq!(*hits.borrow(), 2);
        // Shots beyond the lethal two were not spent
        assert_eq!(rig.world.player_shots.len(), 2);
    }

    #[test]
    fn test_pickup_collected() {
        let mut rig = Rig::new();
        let pos = rig.world.player.body.pos;
        let init = SpawnInit::Pickup(crate::sim::entity::PickupInit {
            pos,
            vel: Vec2::ZERO,
            payload: crate::sim::entity::PickupPayload::Score(70),
            expires_at: 1000.0,
        });
        let h = rig.pool.acquire(EntityKind::Pickup, &init).unwrap();
        rig.world.pickups.push(h);
        let out = rig.resolve(0.0);
        assert_eq!(out.pickup_score, 70);
        assert!(rig.world.pickups.is_empty());
    }
}
