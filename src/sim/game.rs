//! The composition root
//!
//! [`Game`] owns every service (pool, event channel, collision resolver,
//! encounter manager, boss director) and lends them out by `&mut` for each
//! fixed step. It is the simulation object the scheduler updates.

use std::collections::VecDeque;

use glam::Vec2;
use rand::SeedableRng;
use rand_pcg::Pcg32;

use super::boss::{BossDirector, SkillId};
use super::collision::{kill_enemy, CollisionResolver, Outcome};
use super::encounter::EncounterManager;
use super::entity::{BossKind, Entity, Owner, PickupPayload, ProjectileInit};
use super::events::{DeathCause, EventChannel, GameEvent, Poster};
use super::pool::EntityPool;
use super::state::{release_where, Ctx, GamePhase, World};
use crate::consts::{FIXED_STEP_MS, SIM_DT};
use crate::error::{SimError, SimResult};
use crate::scheduler::RenderObject;
use crate::settings::Settings;
use crate::tuning::Tuning;

/// Horizontal spacing between parallel player shot streams
const STREAM_SPACING: f32 = 10.0;

/// Player input for one tick
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct TickInput {
    /// Desired movement; clamped to unit length
    pub move_dir: Vec2,
    /// Held fire
    pub fire: bool,
    /// Edge-triggered: consumed by the next tick
    pub bomb: bool,
}

/// Debug/scripting commands accepted by the core
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    SpawnBoss(BossKind),
    TriggerSkill(SkillId),
    ForceDrop(Vec<PickupPayload>),
}

impl Command {
    /// Parse `boss <kind>`, `skill <id>` or `drop <payload>...`
    pub fn parse(line: &str) -> SimResult<Self> {
        let mut words = line.split_whitespace();
        let verb = words.next().unwrap_or_default().to_lowercase();
        let unknown = |what: &'static str, name: &str| SimError::UnknownName {
            what,
            name: name.to_string(),
        };
        match verb.as_str() {
            "boss" => {
                let name = words.next().unwrap_or_default();
                BossKind::from_str(name)
                    .map(Command::SpawnBoss)
                    .ok_or_else(|| unknown("boss", name))
            }
            "skill" => {
                let name = words.next().unwrap_or_default();
                SkillId::from_str(name)
                    .map(Command::TriggerSkill)
                    .ok_or_else(|| unknown("skill", name))
            }
            "drop" => {
                let payloads = words
                    .map(|w| PickupPayload::from_str(w).ok_or_else(|| unknown("drop", w)))
                    .collect::<SimResult<Vec<_>>>()?;
                if payloads.is_empty() {
                    return Err(unknown("drop", ""));
                }
                Ok(Command::ForceDrop(payloads))
            }
            _ => Err(unknown("command", verb.as_str())),
        }
    }
}

pub struct Game {
    tuning: Tuning,
    phase: GamePhase,
    world: World,
    pool: EntityPool,
    events: EventChannel,
    encounter: EncounterManager,
    director: BossDirector,
    collisions: CollisionResolver,
    rng: Pcg32,
    seed: u64,
    /// Fixed steps simulated since the last reset
    ticks: u64,
    input: TickInput,
    commands: VecDeque<Command>,
}

impl std::fmt::Debug for Game {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Game")
            .field("phase", &self.phase)
            .field("ticks", &self.ticks)
            .field("score", &self.world.score)
            .field("wave", &self.encounter.wave())
            .finish()
    }
}

impl Game {
    pub fn new(tuning: Tuning, seed: u64) -> Self {
        let pool = EntityPool::with_defaults(&tuning.pools.as_map());
        Self {
            world: World::new(&tuning),
            encounter: EncounterManager::new(&tuning, 0.0),
            pool,
            events: EventChannel::new(),
            director: BossDirector::new(),
            collisions: CollisionResolver::new(),
            rng: Pcg32::seed_from_u64(seed),
            seed,
            phase: GamePhase::Ready,
            ticks: 0,
            input: TickInput::default(),
            commands: VecDeque::new(),
            tuning,
        }
    }

    /// Fold the player's settings into `tuning` and seed from them
    pub fn with_settings(mut tuning: Tuning, settings: &Settings) -> Self {
        settings.apply(&mut tuning);
        log::info!(
            "new game: difficulty {}, seed {:#x}",
            settings.difficulty.as_str(),
            settings.seed
        );
        Self::new(tuning, settings.seed)
    }

    pub fn phase(&self) -> GamePhase {
        self.phase
    }

    pub fn tuning(&self) -> &Tuning {
        &self.tuning
    }

    pub fn world(&self) -> &World {
        &self.world
    }

    pub fn pool(&self) -> &EntityPool {
        &self.pool
    }

    pub fn encounter(&self) -> &EncounterManager {
        &self.encounter
    }

    pub fn director(&self) -> &BossDirector {
        &self.director
    }

    pub fn collisions(&self) -> &CollisionResolver {
        &self.collisions
    }

    /// For subscribing collaborators
    pub fn events_mut(&mut self) -> &mut EventChannel {
        &mut self.events
    }

    /// Handle for posting inbound topics from outside the core
    pub fn poster(&self) -> Poster {
        self.events.poster()
    }

    pub fn post(&self, event: GameEvent) {
        self.events.post(event);
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    /// Simulation clock, ms
    pub fn now(&self) -> f64 {
        self.ticks as f64 * FIXED_STEP_MS
    }

    pub fn set_input(&mut self, input: TickInput) {
        self.input = input;
    }

    /// Queue a command for the next playing tick
    pub fn queue(&mut self, command: Command) {
        self.commands.push_back(command);
    }

    /// Parse and queue; unparseable lines are logged and dropped
    pub fn command(&mut self, line: &str) -> SimResult<()> {
        match Command::parse(line) {
            Ok(cmd) => {
                log::debug!("queued {:?}", cmd);
                self.queue(cmd);
                Ok(())
            }
            Err(e) => {
                log::warn!("command '{}' ignored: {}", line, e);
                Err(e)
            }
        }
    }

    /// Release everything and return to `Ready`
    pub fn reset(&mut self) {
        self.world.release_all(&mut self.pool);
        self.world = World::new(&self.tuning);
        self.encounter.reset(&self.tuning, 0.0);
        self.director.detach();
        self.rng = Pcg32::seed_from_u64(self.seed);
        self.ticks = 0;
        self.input = TickInput::default();
        self.commands.clear();
        self.phase = GamePhase::Ready;
        log::info!("game reset");
    }

    fn handle_inbound(&mut self, event: GameEvent) {
        let before = self.phase;
        match (event, self.phase) {
            (GameEvent::GameStart, GamePhase::Ready) => self.phase = GamePhase::Playing,
            (GameEvent::GameStart, GamePhase::GameOver) => {
                self.reset();
                self.phase = GamePhase::Playing;
            }
            (GameEvent::GamePause, GamePhase::Playing) => self.phase = GamePhase::Paused,
            (GameEvent::GameResume, GamePhase::Paused) => self.phase = GamePhase::Playing,
            (GameEvent::GameReset, _) => self.reset(),
            (GameEvent::GameOver, GamePhase::Playing | GamePhase::Paused) => {
                self.phase = GamePhase::GameOver;
            }
            (event, phase) => {
                log::debug!("{} ignored while {:?}", event.topic(), phase);
            }
        }
        if self.phase != before {
            log::info!("phase {:?} -> {:?}", before, self.phase);
        }
    }

    /// Advance the simulation by one fixed step
    pub fn step(&mut self) {
        for event in self.events.drain_inbox() {
            self.handle_inbound(event);
        }
        if self.phase != GamePhase::Playing {
            return;
        }

        let now = self.now();
        let input = self.input;
        self.input.bomb = false;
        let commands: Vec<Command> = self.commands.drain(..).collect();

        let Game {
            tuning,
            world,
            pool,
            events,
            encounter,
            director,
            collisions,
            rng,
            ..
        } = self;
        let mut ctx = Ctx {
            world,
            pool,
            events,
            now,
        };

        for cmd in commands {
            if let Err(e) = run_command(&mut ctx, tuning, encounter, director, cmd) {
                log::warn!("command failed: {}", e);
            }
        }

        steer_and_fire(&mut ctx, tuning, &input);
        if input.bomb {
            let out = detonate_bomb(&mut ctx, tuning);
            settle(&mut ctx, tuning, encounter, director, rng, out);
        }

        move_projectiles(&mut ctx, SIM_DT);
        encounter.update(&mut ctx, tuning, director, rng, SIM_DT);
        director.update(&mut ctx, tuning);
        super::drops::update_pickups(ctx.world, ctx.pool, SIM_DT, now);

        let out = collisions.resolve(&mut ctx, &tuning.player);
        settle(&mut ctx, tuning, encounter, director, rng, out);

        let dead = !ctx.world.player.is_alive();
        if dead {
            log::info!(
                "game over: score {}, wave {}, level {}",
                ctx.world.score,
                encounter.wave(),
                ctx.world.player.level
            );
            ctx.events.emit(GameEvent::GameOver);
            self.phase = GamePhase::GameOver;
        }
        self.ticks += 1;
    }
}

impl RenderObject for Game {
    fn update(&mut self, _fixed_dt: f32) -> SimResult<()> {
        self.step();
        Ok(())
    }

    fn label(&self) -> &str {
        "game"
    }
}

fn run_command(
    ctx: &mut Ctx,
    tuning: &Tuning,
    encounter: &mut EncounterManager,
    director: &mut BossDirector,
    cmd: Command,
) -> SimResult<()> {
    match cmd {
        Command::SpawnBoss(kind) => encounter.spawn_boss(ctx, tuning, director, kind).map(|_| ()),
        Command::TriggerSkill(id) => director.force_skill(ctx, tuning, id),
        Command::ForceDrop(payloads) => {
            let pos = Vec2::new(ctx.world.player.body.pos.x, ctx.world.field.height * 0.3);
            let n = encounter
                .drops()
                .spawn_bundle(ctx.world, ctx.pool, &payloads, pos, ctx.now);
            log::debug!("forced {} drops", n);
            Ok(())
        }
    }
}

fn steer_and_fire(ctx: &mut Ctx, tuning: &Tuning, input: &TickInput) {
    let pt = &tuning.player;
    let now = ctx.now;
    let player = &mut ctx.world.player;
    player.steer(input.move_dir, SIM_DT, pt.speed, &ctx.world.field);

    if !input.fire || now < player.next_fire_at {
        return;
    }
    player.next_fire_at = now + player.fire_interval(now, pt);
    let streams = player.streams();
    let damage = player.shot_damage(pt);
    let origin = player.body.pos - Vec2::new(0.0, player.body.size.y * 0.5);
    for i in 0..streams {
        let dx = (i as f32 - (streams - 1) as f32 * 0.5) * STREAM_SPACING;
        let init = ProjectileInit {
            pos: origin + Vec2::new(dx, 0.0),
            vel: Vec2::new(0.0, -pt.bullet_speed),
            size: pt.bullet_size,
            damage,
            owner: Owner::Player,
            penetrating: false,
        };
        ctx.world.spawn_projectile(ctx.pool, init);
    }
}

/// Spend a bomb: clear hostile fire, hit every enemy and the boss
fn detonate_bomb(ctx: &mut Ctx, tuning: &Tuning) -> Outcome {
    let mut out = Outcome::default();
    let player = &mut ctx.world.player;
    if player.bombs == 0 {
        return out;
    }
    player.bombs -= 1;
    let bombs_left = player.bombs;
    let damage = tuning.player.bomb_damage;

    release_where(&mut ctx.world.hostile_shots, ctx.pool, |_| true);

    let targets: Vec<_> = ctx.world.enemies.clone();
    for h in targets {
        let killed = ctx
            .pool
            .get_mut(h)
            .and_then(Entity::as_enemy_mut)
            .is_some_and(|e| e.apply_damage(damage));
        if killed {
            if let Some(kill) = kill_enemy(ctx, h, DeathCause::Bomb) {
                out.kills.push(kill);
            }
        }
    }

    if let Some(bh) = ctx.world.boss {
        if let Some(boss) = ctx.pool.get_mut(bh).and_then(Entity::as_boss_mut) {
            let (dealt, killed) = boss.apply_damage(damage, ctx.now);
            if dealt > 0.0 || killed {
                out.boss_damaged = true;
                out.boss_killed = killed;
                let (health, max_health) = (boss.health, boss.max_health);
                ctx.events.emit(GameEvent::BossHit {
                    damage: dealt,
                    health,
                    max_health,
                });
            }
        }
    }

    log::debug!("bomb: {} kills, {} left", out.kills.len(), bombs_left);
    ctx.events.emit(GameEvent::BombUsed { bombs_left });
    out
}

fn move_projectiles(ctx: &mut Ctx, dt: f32) {
    for &h in ctx.world.player_shots.iter().chain(&ctx.world.hostile_shots) {
        if let Some(p) = ctx.pool.get_mut(h).and_then(Entity::as_projectile_mut) {
            p.body.step(dt);
        }
    }
    ctx.world.cull_projectiles(ctx.pool);
}

/// Exp granted for points scored
fn exp_for(score: u64) -> u32 {
    (score / 5).max(1).min(u32::MAX as u64) as u32
}

/// Fold a resolver or bomb outcome into score, exp, splits, drops and the
/// boss lifecycle
fn settle(
    ctx: &mut Ctx,
    tuning: &Tuning,
    encounter: &mut EncounterManager,
    director: &mut BossDirector,
    rng: &mut Pcg32,
    out: Outcome,
) {
    let mut gained = out.pickup_score;
    let mut exp = 0u32;
    for kill in &out.kills {
        gained += kill.score as u64;
        if kill.cause != DeathCause::Contact {
            exp = exp.saturating_add(exp_for(kill.score as u64));
        }
    }
    encounter.on_kills(ctx, &tuning.encounter, &out.kills, rng);

    if out.boss_killed {
        let worth = encounter.on_boss_killed(ctx, tuning, director);
        gained += worth;
        exp = exp.saturating_add(exp_for(worth));
    } else if out.boss_damaged {
        director.on_boss_hit(ctx);
    }

    ctx.world.score += gained;
    if exp > 0 {
        if let Some(level) = ctx.world.player.gain_exp(exp, &tuning.player) {
            log::info!("player reached level {}", level);
            ctx.events.emit(GameEvent::PlayerLevelUp { level });
        }
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use super::*;
    use crate::sim::boss::AttackMode;
    use crate::sim::entity::EntityKind;
    use crate::sim::events::{BossSkillEvent, Topic};
    use crate::tuning::{BossTrigger, ModeThreshold, SkillDef, SkillEffect};

    /// Quiet tuning: no wave spawns, no score-triggered bosses
    fn quiet() -> Tuning {
        let mut t = Tuning::default();
        t.encounter.spawn_interval_ms = 1e12;
        t.encounter.min_spawn_interval_ms = 1e12;
        t.encounter.boss_trigger = BossTrigger::Score { step: u64::MAX };
        t
    }

    fn started(tuning: Tuning) -> Game {
        let mut game = Game::new(tuning, 42);
        game.post(GameEvent::GameStart);
        game.step();
        assert_eq!(game.phase(), GamePhase::Playing);
        game
    }

    fn boss_health(game: &Game) -> f32 {
        let h = game.world().boss.unwrap();
        game.pool().get(h).and_then(Entity::as_boss).unwrap().health
    }

    fn boss_mode(game: &Game) -> AttackMode {
        let h = game.world().boss.unwrap();
        game.pool().get(h).and_then(Entity::as_boss).unwrap().attack_mode
    }

    #[test]
    fn test_command_parse() {
        assert_eq!(Command::parse("boss Hydra").unwrap(), Command::SpawnBoss(BossKind::Hydra));
        assert_eq!(
            Command::parse("skill regen").unwrap(),
            Command::TriggerSkill(SkillId::Regenerate)
        );
        assert_eq!(
            Command::parse("drop life shield score:200").unwrap(),
            Command::ForceDrop(vec![
                PickupPayload::Life,
                PickupPayload::Shield,
                PickupPayload::Score(200)
            ])
        );
        assert!(matches!(
            Command::parse("boss dragon"),
            Err(SimError::UnknownName { what: "boss", .. })
        ));
        assert!(matches!(
            Command::parse("drop life gold"),
            Err(SimError::UnknownName { what: "drop", .. })
        ));
        assert!(matches!(
            Command::parse("dance"),
            Err(SimError::UnknownName { what: "command", .. })
        ));
    }

    #[test]
    fn test_phase_follows_inbound_topics() {
        let mut game = Game::new(quiet(), 1);
        game.step();
        assert_eq!(game.phase(), GamePhase::Ready);
        assert_eq!(game.ticks(), 0);

        let poster = game.poster();
        poster.post(GameEvent::GameStart);
        game.step();
        assert_eq!(game.phase(), GamePhase::Playing);
        assert_eq!(game.ticks(), 1);

        poster.post(GameEvent::GamePause);
        game.step();
        assert_eq!(game.phase(), GamePhase::Paused);
        assert_eq!(game.ticks(), 1);

        // Resume is ignored unless paused; start is ignored while paused
        poster.post(GameEvent::GameStart);
        poster.post(GameEvent::GameResume);
        game.step();
        assert_eq!(game.phase(), GamePhase::Playing);

        poster.post(GameEvent::GameOver);
        game.step();
        assert_eq!(game.phase(), GamePhase::GameOver);

        // Starting again from game over resets first
        poster.post(GameEvent::GameStart);
        game.step();
        assert_eq!(game.phase(), GamePhase::Playing);
        assert_eq!(game.ticks(), 1);
    }

    #[test]
    fn test_reset_returns_every_entity() {
        let mut t = Tuning::default();
        t.encounter.spawn_interval_ms = 50.0;
        let mut game = started(t);
        game.set_input(TickInput {
            fire: true,
            ..TickInput::default()
        });
        for _ in 0..180 {
            game.step();
        }
        assert!(game.world().handles().count() > 0);

        game.post(GameEvent::GameReset);
        game.step();
        assert_eq!(game.phase(), GamePhase::Ready);
        assert_eq!(game.world().handles().count(), 0);
        for kind in [EntityKind::Projectile, EntityKind::Enemy, EntityKind::Boss, EntityKind::Pickup] {
            assert_eq!(game.pool().active_len(kind), 0, "{:?} still active", kind);
        }
        assert_eq!(game.world().score, 0);
        assert_eq!(game.encounter().wave(), 1);
    }

    #[test]
    fn test_pool_reuse_keeps_allocation_flat() {
        let tuning = quiet();
        let initial = tuning.pools.projectile.initial_size;
        let mut game = started(tuning);
        game.set_input(TickInput {
            fire: true,
            ..TickInput::default()
        });
        for _ in 0..600 {
            game.step();
        }
        let pool = game.pool();
        assert_eq!(pool.allocated(EntityKind::Projectile), initial);
        // Shots leave the field and come back to the free list
        assert_eq!(pool.active_len(EntityKind::Projectile), game.world().player_shots.len());
        assert!(pool.free_len(EntityKind::Projectile) > initial / 2);
    }

    #[test]
    fn test_boss_mode_escalation_scenario() {
        let mut t = quiet();
        for boss in &mut t.bosses {
            boss.max_health = 100.0;
            boss.skills.clear();
            boss.attack.mode_thresholds = vec![
                ModeThreshold {
                    ratio: 0.7,
                    mode: AttackMode::Spread,
                },
                ModeThreshold {
                    ratio: 0.4,
                    mode: AttackMode::Laser,
                },
            ];
            boss.attack.min_mode_switch_ms = 1000.0;
        }
        t.player.bomb_damage = 35.0;
        let mut game = started(t);

        let changes = Rc::new(RefCell::new(Vec::new()));
        let sink = changes.clone();
        game.events_mut().subscribe(Topic::BossSkill, move |e| {
            if let GameEvent::BossSkill(BossSkillEvent::ModeChanged { from, to }) = e {
                sink.borrow_mut().push((*from, *to));
            }
        });

        game.queue(Command::SpawnBoss(BossKind::Golem));
        game.step();
        assert_eq!(boss_mode(&game), AttackMode::Single);
        game.world.player.bombs = 2;

        game.set_input(TickInput {
            bomb: true,
            ..TickInput::default()
        });
        game.step();
        assert!((boss_health(&game) - 65.0).abs() < 1e-3);
        assert_eq!(boss_mode(&game), AttackMode::Spread);

        // Second hit lands inside the hysteresis window: deferred
        game.tuning.player.bomb_damage = 30.0;
        game.set_input(TickInput {
            bomb: true,
            ..TickInput::default()
        });
        game.step();
        assert!((boss_health(&game) - 35.0).abs() < 1e-3);
        assert_eq!(boss_mode(&game), AttackMode::Spread);

        // ...and applied once the window has passed
        for _ in 0..70 {
            game.step();
        }
        assert_eq!(boss_mode(&game), AttackMode::Laser);

        // Healing never walks the mode back
        let h = game.world.boss.unwrap();
        game.pool
            .get_mut(h)
            .and_then(Entity::as_boss_mut)
            .unwrap()
            .heal(100.0);
        game.step();
        assert_eq!(boss_mode(&game), AttackMode::Laser);

        assert_eq!(
            *changes.borrow(),
            vec![
                (AttackMode::Single, AttackMode::Spread),
                (AttackMode::Spread, AttackMode::Laser)
            ]
        );
    }

    #[test]
    fn test_bomb_clears_fire_and_kills_boss() {
        let mut t = quiet();
        t.player.bomb_damage = 10_000.0;
        for boss in &mut t.bosses {
            boss.skills.clear();
        }
        let mut game = started(t);
        let deaths = Rc::new(RefCell::new(0));
        let d = deaths.clone();
        game.events_mut().subscribe(Topic::BossDeath, move |_| *d.borrow_mut() += 1);

        game.queue(Command::SpawnBoss(BossKind::Wraith));
        game.step();
        assert!(game.director().is_engaged());
        let worth = game.tuning().boss(BossKind::Wraith).unwrap().score_value as u64;

        // Without a bomb in stock the input does nothing
        game.set_input(TickInput {
            bomb: true,
            ..TickInput::default()
        });
        game.step();
        assert!(game.world().boss.is_some());

        game.world.player.bombs = 1;
        game.set_input(TickInput {
            bomb: true,
            ..TickInput::default()
        });
        game.step();
        assert!(game.world().boss.is_none());
        assert!(!game.director().is_engaged());
        assert!(game.world().hostile_shots.is_empty());
        assert_eq!(game.world().score, worth);
        assert_eq!(*deaths.borrow(), 1);
        assert_eq!(game.world().player.bombs, 0);
        assert!(game.world().player.level > 1);
        assert!(!game.encounter().is_suspended());
    }

    #[test]
    fn test_bomb_through_two_thresholds_casts_both() {
        let mut t = quiet();
        for boss in &mut t.bosses {
            boss.max_health = 100.0;
            boss.skills = vec![SkillDef {
                id: SkillId::Shockwave,
                cooldown_ms: 1e9,
                thresholds: vec![0.7, 0.4],
                warning_ms: 0.0,
                effect_radius: 1.0,
                effect: SkillEffect::Shockwave,
            }];
        }
        t.player.bomb_damage = 65.0;
        let mut game = started(t);

        let casts = Rc::new(RefCell::new(Vec::new()));
        let sink = casts.clone();
        game.events_mut().subscribe(Topic::BossSkill, move |e| {
            if let GameEvent::BossSkill(BossSkillEvent::SkillCast { skill, forced }) = e {
                sink.borrow_mut().push((*skill, *forced));
            }
        });
        game.queue(Command::SpawnBoss(BossKind::Golem));
        game.step();
        assert!(casts.borrow().is_empty());

        game.world.player.bombs = 1;
        game.set_input(TickInput {
            bomb: true,
            ..TickInput::default()
        });
        game.step();
        assert!((boss_health(&game) - 35.0).abs() < 1e-3);
        assert_eq!(
            *casts.borrow(),
            vec![(SkillId::Shockwave, true), (SkillId::Shockwave, true)]
        );

        for _ in 0..30 {
            game.step();
        }
        assert_eq!(casts.borrow().len(), 2);
    }

    #[test]
    fn test_commands_need_a_boss_and_a_kit() {
        let mut game = started(quiet());
        game.queue(Command::TriggerSkill(SkillId::Enrage));
        game.step();
        assert!(game.world().boss.is_none());

        let casts = Rc::new(RefCell::new(Vec::new()));
        let sink = casts.clone();
        game.events_mut().subscribe(Topic::BossSkill, move |e| {
            if let GameEvent::BossSkill(BossSkillEvent::SkillCast { skill, forced }) = e {
                sink.borrow_mut().push((*skill, *forced));
            }
        });
        game.queue(Command::SpawnBoss(BossKind::Golem));
        // Golem carries no enrage: logged and skipped
        game.queue(Command::TriggerSkill(SkillId::Enrage));
        game.queue(Command::TriggerSkill(SkillId::Barrier));
        game.step();
        assert!(casts.borrow().contains(&(SkillId::Barrier, true)));
        assert!(!casts.borrow().iter().any(|(s, _)| *s == SkillId::Enrage));
    }

    #[test]
    fn test_forced_drops_can_be_collected() {
        let mut game = started(quiet());
        assert!(game.command("drop score:300 life").is_ok());
        assert!(game.command("drop treasure").is_err());
        game.step();
        assert_eq!(game.world().pickups.len(), 2);

        // Park the player under the drops and let them fall in
        let x = game.world().player.body.pos.x;
        for _ in 0..900 {
            let dx = x - game.world().player.body.pos.x;
            game.set_input(TickInput {
                move_dir: Vec2::new(dx.clamp(-1.0, 1.0), 0.0),
                ..TickInput::default()
            });
            game.step();
            if game.world().pickups.is_empty() {
                break;
            }
        }
        assert_eq!(game.world().score, 300);
        assert_eq!(game.world().player.lives, game.tuning().player.lives + 1);
    }

    #[test]
    fn test_same_seed_same_run() {
        let run = || {
            let mut t = Tuning::default();
            t.encounter.spawn_interval_ms = 200.0;
            let mut game = started(t);
            let mut trace = Vec::new();
            for i in 0..900u32 {
                game.set_input(TickInput {
                    move_dir: Vec2::new(if (i / 60) % 2 == 0 { 1.0 } else { -1.0 }, 0.0),
                    fire: true,
                    bomb: false,
                });
                game.step();
                trace.push((game.world().score, game.world().enemies.len(), game.world().player.lives));
            }
            trace
        };
        assert_eq!(run(), run());
    }
}
