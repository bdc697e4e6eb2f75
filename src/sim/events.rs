//! Typed publish/subscribe hub
//!
//! Topics are a closed set ([`Topic`]). `emit` delivers synchronously to
//! every handler of the event's topic in registration order; one-shot
//! handlers are dropped after their first delivery. Collaborators that need
//! to talk back into the core (pause, reset, ...) `post` into a deferred
//! inbox which the game drains at the top of the next tick.

use std::cell::RefCell;
use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::rc::Rc;

use glam::Vec2;

use super::boss::{AttackMode, SkillId};
use super::entity::{BossKind, EnemyKind, Handle, PickupPayload};

/// Event topic identifiers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Topic {
    // Emitted by the core
    EnemySpawn,
    EnemyDeath,
    BossSpawn,
    BossHit,
    BossSkill,
    BossDeath,
    PlayerHit,
    ItemPickup,
    WaveAdvanced,
    PlayerLevelUp,
    BombUsed,
    // Consumed by the core
    GameStart,
    GamePause,
    GameResume,
    GameReset,
    GameOver,
}

impl Topic {
    pub fn as_str(&self) -> &'static str {
        match self {
            Topic::EnemySpawn => "ENEMY_SPAWN",
            Topic::EnemyDeath => "ENEMY_DEATH",
            Topic::BossSpawn => "BOSS_SPAWN",
            Topic::BossHit => "BOSS_HIT",
            Topic::BossSkill => "BOSS_SKILL",
            Topic::BossDeath => "BOSS_DEATH",
            Topic::PlayerHit => "PLAYER_HIT",
            Topic::ItemPickup => "ITEM_PICKUP",
            Topic::WaveAdvanced => "WAVE_ADVANCED",
            Topic::PlayerLevelUp => "PLAYER_LEVEL_UP",
            Topic::BombUsed => "BOMB_USED",
            Topic::GameStart => "GAME_START",
            Topic::GamePause => "GAME_PAUSE",
            Topic::GameResume => "GAME_RESUME",
            Topic::GameReset => "GAME_RESET",
            Topic::GameOver => "GAME_OVER",
        }
    }

    /// Topics issued by collaborators into the core
    pub fn is_inbound(&self) -> bool {
        matches!(
            self,
            Topic::GameStart | Topic::GamePause | Topic::GameResume | Topic::GameReset | Topic::GameOver
        )
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How an enemy left play
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeathCause {
    Shot,
    Contact,
    Bomb,
}

/// What hurt the player
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HitSource {
    Projectile,
    Contact,
    Laser,
    Skill(SkillId),
}

/// Boss state reports carried on [`Topic::BossSkill`]
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BossSkillEvent {
    ModeChanged { from: AttackMode, to: AttackMode },
    AttackWarning { mode: AttackMode },
    AttackFired { mode: AttackMode },
    SkillWarning { skill: SkillId },
    SkillCast { skill: SkillId, forced: bool },
}

#[derive(Debug, Clone, PartialEq)]
pub enum GameEvent {
    EnemySpawn {
        handle: Handle,
        kind: EnemyKind,
        pos: Vec2,
    },
    EnemyDeath {
        handle: Handle,
        kind: EnemyKind,
        pos: Vec2,
        score: u32,
        cause: DeathCause,
    },
    BossSpawn {
        kind: BossKind,
        max_health: f32,
    },
    BossHit {
        damage: f32,
        health: f32,
        max_health: f32,
    },
    BossSkill(BossSkillEvent),
    BossDeath {
        kind: BossKind,
        pos: Vec2,
        score: u32,
    },
    PlayerHit {
        source: HitSource,
        lives_left: u8,
    },
    ItemPickup {
        payload: PickupPayload,
        pos: Vec2,
    },
    WaveAdvanced {
        wave: u32,
    },
    PlayerLevelUp {
        level: u32,
    },
    BombUsed {
        bombs_left: u32,
    },
    GameStart,
    GamePause,
    GameResume,
    GameReset,
    GameOver,
}

impl GameEvent {
    pub fn topic(&self) -> Topic {
        match self {
            GameEvent::EnemySpawn { .. } => Topic::EnemySpawn,
            GameEvent::EnemyDeath { .. } => Topic::EnemyDeath,
            GameEvent::BossSpawn { .. } => Topic::BossSpawn,
            GameEvent::BossHit { .. } => Topic::BossHit,
            GameEvent::BossSkill(_) => Topic::BossSkill,
            GameEvent::BossDeath { .. } => Topic::BossDeath,
            GameEvent::PlayerHit { .. } => Topic::PlayerHit,
            GameEvent::ItemPickup { .. } => Topic::ItemPickup,
            GameEvent::WaveAdvanced { .. } => Topic::WaveAdvanced,
            GameEvent::PlayerLevelUp { .. } => Topic::PlayerLevelUp,
            GameEvent::BombUsed { .. } => Topic::BombUsed,
            GameEvent::GameStart => Topic::GameStart,
            GameEvent::GamePause => Topic::GamePause,
            GameEvent::GameResume => Topic::GameResume,
            GameEvent::GameReset => Topic::GameReset,
            GameEvent::GameOver => Topic::GameOver,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

pub type Handler = Box<dyn FnMut(&GameEvent)>;

struct Subscriber {
    id: SubscriptionId,
    once: bool,
    handler: Handler,
}

/// Clonable handle for posting inbound events from inside handlers
#[derive(Clone, Default)]
pub struct Poster {
    inbox: Rc<RefCell<VecDeque<GameEvent>>>,
}

impl Poster {
    pub fn post(&self, event: GameEvent) {
        self.inbox.borrow_mut().push_back(event);
    }
}

#[derive(Default)]
pub struct EventChannel {
    subscribers: HashMap<Topic, Vec<Subscriber>>,
    next_id: u64,
    inbox: Rc<RefCell<VecDeque<GameEvent>>>,
}

impl fmt::Debug for EventChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventChannel")
            .field("topics", &self.subscribers.len())
            .field("pending", &self.inbox.borrow().len())
            .finish()
    }
}

impl EventChannel {
    pub fn new() -> Self {
        Self::default()
    }

    fn add(&mut self, topic: Topic, once: bool, handler: Handler) -> SubscriptionId {
        self.next_id += 1;
        let id = SubscriptionId(self.next_id);
        self.subscribers.entry(topic).or_default().push(Subscriber { id, once, handler });
        id
    }

    /// Persistent handler
    pub fn subscribe(&mut self, topic: Topic, handler: impl FnMut(&GameEvent) + 'static) -> SubscriptionId {
        self.add(topic, false, Box::new(handler))
    }

    /// Handler removed after its first delivery
    pub fn once(&mut self, topic: Topic, handler: impl FnMut(&GameEvent) + 'static) -> SubscriptionId {
        self.add(topic, true, Box::new(handler))
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        for list in self.subscribers.values_mut() {
            if let Some(pos) = list.iter().position(|s| s.id == id) {
                list.remove(pos);
                return true;
            }
        }
        false
    }

    pub fn subscriber_count(&self, topic: Topic) -> usize {
        self.subscribers.get(&topic).map(Vec::len).unwrap_or(0)
    }

    /// Deliver `event` now, in registration order
    pub fn emit(&mut self, event: GameEvent) {
        let topic = event.topic();
        log::trace!("emit {}", topic);
        if let Some(list) = self.subscribers.get_mut(&topic) {
            list.retain_mut(|s| {
                (s.handler)(&event);
                !s.once
            });
        }
    }

    /// Queue an inbound event for the next tick
    pub fn post(&self, event: GameEvent) {
        self.inbox.borrow_mut().push_back(event);
    }

    pub fn poster(&self) -> Poster {
        Poster {
            inbox: self.inbox.clone(),
        }
    }

    /// Take every posted event, oldest first
    pub fn drain_inbox(&mut self) -> Vec<GameEvent> {
        self.inbox.borrow_mut().drain(..).collect()
    }
}
