//! Sky Siege headless runner
//!
//! Drives the scheduler from a synthetic clock with a simple autopilot,
//! renders every layer into a draw list, and logs a run summary.

#[cfg(not(target_arch = "wasm32"))]
mod native {
    use std::cell::RefCell;
    use std::path::PathBuf;
    use std::rc::Rc;

    use clap::Parser;
    use glam::Vec2;
    use sky_siege::sim::{Game, GameEvent, GamePhase, LayerView, TickInput, Topic};
    use sky_siege::{DrawList, Layer, Scheduler, SimResult, Settings, Tuning};

    /// Hostile shots on screen before the autopilot spends a bomb
    const BOMB_PANIC: usize = 12;

    #[derive(Debug, Parser)]
    #[command(author, version, about, long_about = None)]
    pub struct Args {
        /// Settings JSON (difficulty, seed, boss trigger)
        #[arg(long, value_name = "PATH")]
        settings: Option<PathBuf>,

        /// Tuning JSON; omitted fields keep their defaults
        #[arg(long, value_name = "PATH")]
        tuning: Option<PathBuf>,

        /// Simulated seconds to run
        #[arg(long, default_value_t = 60.0)]
        seconds: f64,

        /// Synthetic frame rate
        #[arg(long, default_value_t = 60.0)]
        fps: f64,

        /// Override the settings seed
        #[arg(long)]
        seed: Option<u64>,

        /// Command issued on the first tick, e.g. "boss golem" (repeatable)
        #[arg(long = "cmd", value_name = "COMMAND")]
        commands: Vec<String>,
    }

    #[derive(Debug, Default)]
    struct Stats {
        kills: u32,
        bosses: u32,
        hits: u32,
        pickups: u32,
        waves: u32,
    }

    pub fn run(args: Args) -> SimResult<()> {
        let mut settings = args
            .settings
            .as_deref()
            .map(Settings::load)
            .unwrap_or_default();
        if let Some(seed) = args.seed {
            settings.seed = seed;
        }
        let tuning = match &args.tuning {
            Some(path) => Tuning::load(path)?,
            None => Tuning::default(),
        };

        let game = Rc::new(RefCell::new(Game::with_settings(tuning, &settings)));
        let stats = Rc::new(RefCell::new(Stats::default()));
        {
            let mut g = game.borrow_mut();
            let events = g.events_mut();
            for topic in [
                Topic::EnemyDeath,
                Topic::BossDeath,
                Topic::PlayerHit,
                Topic::ItemPickup,
                Topic::WaveAdvanced,
            ] {
                let stats = stats.clone();
                events.subscribe(topic, move |e| {
                    let mut s = stats.borrow_mut();
                    match e {
                        GameEvent::EnemyDeath { .. } => s.kills += 1,
                        GameEvent::BossDeath { .. } => s.bosses += 1,
                        GameEvent::PlayerHit { .. } => s.hits += 1,
                        GameEvent::ItemPickup { .. } => s.pickups += 1,
                        GameEvent::WaveAdvanced { .. } => s.waves += 1,
                        _ => {}
                    }
                });
            }
            for line in &args.commands {
                // Bad lines are logged by the game
                let _ = g.command(line);
            }
            g.post(GameEvent::GameStart);
        }

        let mut scheduler = Scheduler::new();
        scheduler.register_render_obj(Layer::Background, game.clone());
        for layer in Layer::ALL {
            scheduler.register_render_obj(layer, Rc::new(RefCell::new(LayerView::new(game.clone(), layer))));
        }

        let fps = args.fps.clamp(1.0, 1000.0);
        let frame_ms = 1000.0 / fps;
        let frames = (args.seconds.max(0.0) * fps).ceil() as u64;
        let mut surface = DrawList::new();
        scheduler.start();
        for i in 0..=frames {
            let input = autopilot(&game.borrow());
            game.borrow_mut().set_input(input);
            surface.clear();
            scheduler.frame(i as f64 * frame_ms, &mut surface);
            if game.borrow().phase() == GamePhase::GameOver {
                break;
            }
        }
        scheduler.stop();

        let g = game.borrow();
        let s = stats.borrow();
        log::info!(
            "{:.1}s simulated ({} steps, {} frames, {} failures), phase {:?}",
            g.now() / 1000.0,
            scheduler.steps(),
            scheduler.frames(),
            scheduler.failures(),
            g.phase()
        );
        log::info!(
            "score {}, wave {}, level {}, lives {}",
            g.world().score,
            g.encounter().wave(),
            g.world().player.level,
            g.world().player.lives
        );
        log::info!(
            "{} kills, {} bosses, {} hits taken, {} pickups, {} waves cleared; last frame {} draw commands",
            s.kills,
            s.bosses,
            s.hits,
            s.pickups,
            s.waves,
            surface.len()
        );
        Ok(())
    }

    /// Chase the boss (or the lowest enemy), sidestep the nearest incoming
    /// shot, always fire
    fn autopilot(game: &Game) -> TickInput {
        let world = game.world();
        let pool = game.pool();
        let me = world.player.body.pos;

        let target_x = world
            .boss
            .and_then(|h| pool.get(h))
            .map(|e| e.body().pos.x)
            .or_else(|| {
                world
                    .enemies
                    .iter()
                    .filter_map(|&h| pool.get(h))
                    .map(|e| e.body().pos)
                    .max_by(|a, b| a.y.total_cmp(&b.y))
                    .map(|p| p.x)
            })
            .unwrap_or(world.field.width * 0.5);

        let threat = world
            .hostile_shots
            .iter()
            .filter_map(|&h| pool.get(h))
            .map(|e| e.body().pos)
            .filter(|p| p.y < me.y && me.y - p.y < 120.0 && (p.x - me.x).abs() < 30.0)
            .min_by(|a, b| b.y.total_cmp(&a.y));

        let dx = match threat {
            Some(p) if p.x >= me.x => -1.0,
            Some(_) => 1.0,
            None => ((target_x - me.x) / 40.0).clamp(-1.0, 1.0),
        };
        TickInput {
            move_dir: Vec2::new(dx, 0.0),
            fire: true,
            bomb: world.player.bombs > 0 && world.hostile_shots.len() > BOMB_PANIC,
        }
    }
}

#[cfg(not(target_arch = "wasm32"))]
fn main() {
    use clap::Parser;

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    log::info!("Sky Siege (headless) starting...");

    if let Err(e) = native::run(native::Args::parse()) {
        log::error!("run aborted: {}", e);
        std::process::exit(1);
    }
}

#[cfg(target_arch = "wasm32")]
fn main() {
    // Browser builds embed the library; there is no standalone entry point
}
