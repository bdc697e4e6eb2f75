//! Per-kind object reuse registry
//!
//! Each [`EntityKind`] is registered with a factory and a reset function.
//! `acquire` recycles a free slot (running the reset function) or grows the
//! pool through the factory; `release` deactivates the slot and returns it to
//! the free list. A slot is either active or on the free list, never both.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use super::entity::{Entity, EntityKind, Handle, SpawnInit};
use crate::error::{SimError, SimResult};

pub type Factory = Box<dyn Fn() -> Entity>;
pub type ResetFn = Box<dyn Fn(&mut Entity, &SpawnInit) -> SimResult<()>>;

/// Sizing hints for one kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolOptions {
    /// Instances pre-allocated at registration
    pub initial_size: usize,
    /// Advisory cap; exceeding it is logged, never refused
    pub max_size: usize,
}

impl Default for PoolOptions {
    fn default() -> Self {
        Self {
            initial_size: 16,
            max_size: 256,
        }
    }
}

struct KindPool {
    slots: Vec<Entity>,
    free: Vec<u32>,
    factory: Factory,
    reset: ResetFn,
    opts: PoolOptions,
    over_cap_logged: bool,
}

impl KindPool {
    fn allocate(&mut self, kind: EntityKind) -> u32 {
        if self.slots.len() >= self.opts.max_size && !self.over_cap_logged {
            log::warn!(
                "{:?} pool grew past advisory max {} - allocating anyway",
                kind,
                self.opts.max_size
            );
            self.over_cap_logged = true;
        }
        let mut entity = (self.factory)();
        entity.body_mut().active = false;
        self.slots.push(entity);
        (self.slots.len() - 1) as u32
    }
}

/// Registry of pooled entity storage, one free list per kind
#[derive(Default)]
pub struct EntityPool {
    kinds: BTreeMap<EntityKind, KindPool>,
}

impl fmt::Debug for EntityPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut map = f.debug_map();
        for (kind, pool) in &self.kinds {
            map.entry(kind, &(pool.slots.len(), pool.free.len()));
        }
        map.finish()
    }
}

impl EntityPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pool with every kind registered using [`Entity::blank`] / [`Entity::reset`]
    pub fn with_defaults(opts: &BTreeMap<EntityKind, PoolOptions>) -> Self {
        let mut pool = Self::new();
        for kind in [
            EntityKind::Projectile,
            EntityKind::Enemy,
            EntityKind::Boss,
            EntityKind::Pickup,
        ] {
            let o = opts.get(&kind).copied().unwrap_or_default();
            pool.register_type(
                kind,
                move || Entity::blank(kind),
                |e: &mut Entity, init: &SpawnInit| e.reset(init),
                o,
            );
        }
        pool
    }

    /// Register (or re-register) a kind and pre-warm `initial_size` instances
    pub fn register_type(
        &mut self,
        kind: EntityKind,
        factory: impl Fn() -> Entity + 'static,
        reset: impl Fn(&mut Entity, &SpawnInit) -> SimResult<()> + 'static,
        opts: PoolOptions,
    ) {
        if self.kinds.contains_key(&kind) {
            log::warn!("{:?} pool re-registered; previous instances dropped", kind);
        }
        let mut pool = KindPool {
            slots: Vec::with_capacity(opts.initial_size),
            free: Vec::with_capacity(opts.initial_size),
            factory: Box::new(factory),
            reset: Box::new(reset),
            opts,
            over_cap_logged: false,
        };
        for _ in 0..opts.initial_size {
            let idx = pool.allocate(kind);
            pool.free.push(idx);
        }
        // Pop lowest indices first
        pool.free.reverse();
        self.kinds.insert(kind, pool);
    }

    pub fn is_registered(&self, kind: EntityKind) -> bool {
        self.kinds.contains_key(&kind)
    }

    /// Take an instance of `kind`, reset from `init`
    pub fn try_acquire(&mut self, kind: EntityKind, init: &SpawnInit) -> SimResult<Handle> {
        let pool = self.kinds.get_mut(&kind).ok_or(SimError::UnknownKind(kind))?;
        if init.kind() != kind {
            return Err(SimError::InitMismatch {
                expected: kind,
                got: init.kind(),
            });
        }

        let index = match pool.free.pop() {
            Some(idx) => idx,
            None => pool.allocate(kind),
        };

        let slot = &mut pool.slots[index as usize];
        if let Err(e) = (pool.reset)(slot, init) {
            slot.body_mut().active = false;
            pool.free.push(index);
            return Err(e);
        }
        slot.body_mut().active = true;

        Ok(Handle { kind, index })
    }

    /// Like [`Self::try_acquire`], logging configuration errors instead of returning them
    pub fn acquire(&mut self, kind: EntityKind, init: &SpawnInit) -> Option<Handle> {
        match self.try_acquire(kind, init) {
            Ok(h) => Some(h),
            Err(e) => {
                log::warn!("acquire skipped: {}", e);
                None
            }
        }
    }

    /// Return an instance to its free list. Releasing an inactive instance is
    /// a no-op; returns whether the slot actually changed state.
    pub fn release(&mut self, handle: Handle) -> bool {
        let Some(pool) = self.kinds.get_mut(&handle.kind) else {
            log::warn!("release skipped: {}", SimError::UnknownKind(handle.kind));
            return false;
        };
        let Some(slot) = pool.slots.get_mut(handle.index as usize) else {
            log::warn!("release skipped: {:?} is out of range", handle);
            return false;
        };
        if !slot.is_active() {
            return false;
        }
        slot.body_mut().active = false;
        pool.free.push(handle.index);
        true
    }

    pub fn get(&self, handle: Handle) -> Option<&Entity> {
        self.kinds
            .get(&handle.kind)
            .and_then(|p| p.slots.get(handle.index as usize))
    }

    pub fn get_mut(&mut self, handle: Handle) -> Option<&mut Entity> {
        self.kinds
            .get_mut(&handle.kind)
            .and_then(|p| p.slots.get_mut(handle.index as usize))
    }

    pub fn is_active(&self, handle: Handle) -> bool {
        self.get(handle).is_some_and(|e| e.is_active())
    }

    /// Instances ever allocated for a kind
    pub fn allocated(&self, kind: EntityKind) -> usize {
        self.kinds.get(&kind).map(|p| p.slots.len()).unwrap_or(0)
    }

    pub fn free_len(&self, kind: EntityKind) -> usize {
        self.kinds.get(&kind).map(|p| p.free.len()).unwrap_or(0)
    }

    pub fn active_len(&self, kind: EntityKind) -> usize {
        self.allocated(kind) - self.free_len(kind)
    }

    /// True if `handle`'s slot index is currently on the free list
    pub fn is_free(&self, handle: Handle) -> bool {
        self.kinds
            .get(&handle.kind)
            .is_some_and(|p| p.free.contains(&handle.index))
    }
}
