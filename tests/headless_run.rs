//! End-to-end: scheduler driving the game and its layer views

use std::cell::RefCell;
use std::rc::Rc;

use glam::Vec2;
use sky_siege::consts::FIXED_STEP_US;
use sky_siege::sim::{Game, GameEvent, GamePhase, LayerView, TickInput, Topic};
use sky_siege::{DrawList, Layer, Scheduler, SchedulerState, Tuning};

fn wire(seed: u64) -> (Scheduler, Rc<RefCell<Game>>) {
    let mut tuning = Tuning::default();
    // The first hit leaves the player untouchable, so runs never end early
    tuning.player.invincible_ms = 1e9;
    let game = Rc::new(RefCell::new(Game::new(tuning, seed)));
    let mut scheduler = Scheduler::new();
    scheduler.register_render_obj(Layer::Background, game.clone());
    for layer in Layer::ALL {
        scheduler.register_render_obj(layer, Rc::new(RefCell::new(LayerView::new(game.clone(), layer))));
    }
    game.borrow().post(GameEvent::GameStart);
    game.borrow_mut().set_input(TickInput {
        move_dir: Vec2::ZERO,
        fire: true,
        bomb: false,
    });
    (scheduler, game)
}

/// Feed `deltas` (ms) through the scheduler after a baseline frame at t = 0
fn drive(scheduler: &mut Scheduler, surface: &mut DrawList, deltas: &[f64]) {
    let mut now = 0.0;
    scheduler.start();
    scheduler.frame(now, surface);
    for d in deltas {
        now += d;
        surface.clear();
        scheduler.frame(now, surface);
    }
}

#[test]
fn ten_seconds_of_play_render_every_layer() {
    let (mut scheduler, game) = wire(11);
    let mut surface = DrawList::new();
    drive(&mut scheduler, &mut surface, &[1000.0 / 60.0; 600]);

    assert_eq!(scheduler.failures(), 0);
    let g = game.borrow();
    assert_eq!(g.phase(), GamePhase::Playing);
    assert_eq!(g.ticks(), scheduler.steps());
    assert!(g.ticks() >= 598);
    assert!(surface.texts().any(|t| t.starts_with("SCORE")));
    assert!(surface.texts().any(|t| t == "WAVE 1" || t == "WAVE 2"));
    // Background, player and HUD at the very least
    assert!(surface.len() > 5);
}

#[test]
fn frame_chunking_does_not_change_the_run() {
    let fine = {
        let (mut scheduler, game) = wire(5);
        drive(&mut scheduler, &mut DrawList::new(), &[5.0; 400]);
        let g = game.borrow();
        (g.ticks(), g.world().score, g.world().enemies.clone(), g.world().player.body.pos)
    };
    let coarse = {
        let (mut scheduler, game) = wire(5);
        drive(&mut scheduler, &mut DrawList::new(), &[100.0; 20]);
        let g = game.borrow();
        (g.ticks(), g.world().score, g.world().enemies.clone(), g.world().player.body.pos)
    };
    assert_eq!(fine, coarse);
    assert_eq!(fine.0, 2_000_000 / FIXED_STEP_US);
}

#[test]
fn scheduler_pause_freezes_the_simulation() {
    let (mut scheduler, game) = wire(2);
    let mut surface = DrawList::new();
    drive(&mut scheduler, &mut surface, &[50.0; 10]);
    let ticks = game.borrow().ticks();

    scheduler.pause();
    assert_eq!(scheduler.state(), SchedulerState::Paused);
    surface.clear();
    scheduler.frame(10_000.0, &mut surface);
    assert!(surface.is_empty());
    assert_eq!(game.borrow().ticks(), ticks);

    // Resuming re-baselines the clock; only time after it counts
    scheduler.resume();
    scheduler.frame(20_000.0, &mut surface);
    assert_eq!(game.borrow().ticks(), ticks);
    let carried = scheduler.accumulator_us();
    scheduler.frame(20_100.0, &mut surface);
    assert_eq!(game.borrow().ticks(), ticks + (carried + 100_000) / FIXED_STEP_US);
}

#[test]
fn scripted_boss_fight_reports_through_events() {
    let (mut scheduler, game) = wire(9);
    let spawned = Rc::new(RefCell::new(Vec::new()));
    {
        let sink = spawned.clone();
        let mut g = game.borrow_mut();
        g.events_mut().subscribe(Topic::BossSpawn, move |e| {
            if let GameEvent::BossSpawn { kind, .. } = e {
                sink.borrow_mut().push(*kind);
            }
        });
        g.command("boss wraith").unwrap();
        assert!(g.command("boss kraken").is_err());
    }
    let mut surface = DrawList::new();
    drive(&mut scheduler, &mut surface, &[1000.0 / 60.0; 240]);

    assert_eq!(spawned.borrow().len(), 1);
    let g = game.borrow();
    assert!(g.director().is_engaged() || g.encounter().bosses_defeated() == 1);
    assert!(g.encounter().is_suspended() || g.encounter().bosses_defeated() == 1);
}
