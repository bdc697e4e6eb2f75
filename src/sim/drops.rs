//! Pickup drops: rolls on enemy death, bundles on boss death, and the
//! falling/expiry pass

use glam::Vec2;
use rand::Rng;
use rand::distr::Distribution;
use rand::distr::weighted::WeightedIndex;

use super::entity::{Entity, EntityKind, Handle, PickupInit, PickupPayload, SpawnInit};
use super::pool::EntityPool;
use super::state::{release_where, World};
use crate::in_field;
use crate::tuning::DropTuning;

#[derive(Debug, Clone)]
pub struct DropTable {
    payloads: Vec<PickupPayload>,
    dist: Option<WeightedIndex<u32>>,
    chance: f32,
    ttl_ms: f64,
    fall_speed: f32,
}

impl DropTable {
    pub fn new(t: &DropTuning) -> Self {
        let payloads: Vec<PickupPayload> = t.weights.iter().map(|(p, _)| *p).collect();
        let dist = match WeightedIndex::new(t.weights.iter().map(|(_, w)| *w)) {
            Ok(d) => Some(d),
            Err(e) => {
                log::warn!("drop table disabled: {}", e);
                None
            }
        };
        Self {
            payloads,
            dist,
            chance: t.chance.clamp(0.0, 1.0),
            ttl_ms: t.ttl_ms,
            fall_speed: t.fall_speed,
        }
    }

    /// Roll for an ordinary enemy's drop
    pub fn roll(&self, rng: &mut impl Rng) -> Option<PickupPayload> {
        let dist = self.dist.as_ref()?;
        if !rng.random_bool(self.chance as f64) {
            return None;
        }
        self.payloads.get(dist.sample(rng)).copied()
    }

    pub fn spawn(&self, world: &mut World, pool: &mut EntityPool, payload: PickupPayload, pos: Vec2, now: f64) -> Option<Handle> {
        let init = PickupInit {
            pos,
            vel: Vec2::new(0.0, self.fall_speed),
            payload,
            expires_at: now + self.ttl_ms,
        };
        let handle = pool.acquire(EntityKind::Pickup, &SpawnInit::Pickup(init))?;
        world.pickups.push(handle);
        Some(handle)
    }

    /// Fan a list of payloads out horizontally around `pos`
    pub fn spawn_bundle(&self, world: &mut World, pool: &mut EntityPool, payloads: &[PickupPayload], pos: Vec2, now: f64) -> usize {
        let n = payloads.len();
        let mut spawned = 0;
        for (i, &payload) in payloads.iter().enumerate() {
            let dx = (i as f32 - (n as f32 - 1.0) * 0.5) * 24.0;
            if self.spawn(world, pool, payload, pos + Vec2::new(dx, 0.0), now).is_some() {
                spawned += 1;
            }
        }
        spawned
    }
}

/// Let pickups fall; release expired ones and those past the field
pub fn update_pickups(world: &mut World, pool: &mut EntityPool, dt: f32, now: f64) {
    for &h in &world.pickups {
        if let Some(p) = pool.get_mut(h).and_then(Entity::as_pickup_mut) {
            p.body.step(dt);
        }
    }
    let field = world.field.clone();
    release_where(&mut world.pickups, pool, |e| match e.as_pickup() {
        Some(p) => now >= p.expires_at || !in_field(p.body.pos, field.width, field.height, field.margin),
        None => true,
    });
}
