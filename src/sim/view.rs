//! Per-layer render objects over a shared [`Game`]

use std::cell::RefCell;
use std::rc::Rc;

use glam::Vec2;

use super::boss::attack::AttackState;
use super::entity::{Entity, Handle, Owner};
use super::game::Game;
use super::state::GamePhase;
use crate::error::{SimError, SimResult};
use crate::render::{health_color, palette, with_alpha, Surface};
use crate::scheduler::{Layer, RenderObject};

const HUD_LINE: f32 = 18.0;
const BOSS_BAR_HEIGHT: f32 = 6.0;
/// Invincibility blink period, ms
const BLINK_MS: f64 = 120.0;

/// Draws one layer's share of the game
pub struct LayerView {
    game: Rc<RefCell<Game>>,
    layer: Layer,
}

impl LayerView {
    pub fn new(game: Rc<RefCell<Game>>, layer: Layer) -> Self {
        Self { game, layer }
    }

    pub fn layer(&self) -> Layer {
        self.layer
    }
}

impl RenderObject for LayerView {
    fn render(&mut self, surface: &mut dyn Surface, _frame_dt: f32) -> SimResult<()> {
        let game = self
            .game
            .try_borrow()
            .map_err(|e| SimError::Render(format!("{} view: {}", self.layer.as_str(), e)))?;
        match self.layer {
            Layer::Background => draw_background(&game, surface),
            Layer::Enemy => draw_enemies(&game, surface),
            Layer::Bullet => draw_bullets(&game, surface),
            Layer::Player => draw_player(&game, surface),
            Layer::Particle => draw_pickups(&game, surface),
            Layer::Ui => draw_hud(&game, surface),
        }
        Ok(())
    }

    fn label(&self) -> &str {
        self.layer.as_str()
    }
}

fn draw_background(game: &Game, surface: &mut dyn Surface) {
    let field = &game.world().field;
    let size = Vec2::new(field.width, field.height);
    surface.rect(size * 0.5, size, palette::BACKGROUND);
}

fn entities<'a>(game: &'a Game, set: &'a [Handle]) -> impl Iterator<Item = &'a Entity> + 'a {
    set.iter().filter_map(move |&h| game.pool().get(h))
}

fn draw_enemies(game: &Game, surface: &mut dyn Surface) {
    let world = game.world();
    for e in entities(game, &world.enemies).filter_map(Entity::as_enemy) {
        let color = if e.summoned { palette::SUMMON } else { palette::ENEMY };
        surface.rect(e.body.pos, e.body.size, color);
    }

    let Some(boss) = world.boss.and_then(|h| game.pool().get(h)).and_then(Entity::as_boss) else {
        return;
    };
    surface.rect(boss.body.pos, boss.body.size, palette::BOSS);
    let director = game.director();
    if let Some(AttackState::Warning { .. }) = director.attack_state() {
        surface.outline(boss.body.pos, boss.body.size + Vec2::splat(8.0), palette::WARNING);
    }
    for pending in director.pending_skills() {
        let left = (pending.fire_at - game.now()).max(0.0) as f32;
        let grow = 8.0 + left * 0.02;
        surface.outline(boss.body.pos, boss.body.size + Vec2::splat(grow), palette::WARNING);
    }
}

fn draw_bullets(game: &Game, surface: &mut dyn Surface) {
    let world = game.world();
    for set in [&world.player_shots, &world.hostile_shots] {
        for p in entities(game, set).filter_map(Entity::as_projectile) {
            let color = match p.owner() {
                Owner::Player => palette::PLAYER_SHOT,
                Owner::Enemy | Owner::Boss => palette::HOSTILE_SHOT,
            };
            surface.rect(p.body.pos, p.body.size, color);
        }
    }
    if let Some(beam) = game.director().beam() {
        let height = world.field.height - beam.top;
        surface.rect(
            Vec2::new(beam.x, beam.top + height * 0.5),
            Vec2::new(beam.width, height),
            palette::LASER,
        );
    }
}

fn draw_player(game: &Game, surface: &mut dyn Surface) {
    let player = &game.world().player;
    if !player.is_alive() {
        return;
    }
    let now = game.now();
    let blink = now < player.invincible_until && ((now / BLINK_MS) as u64) % 2 == 1;
    let alpha = if blink { 0.35 } else { 1.0 };
    surface.rect(player.body.pos, player.body.size, with_alpha(palette::PLAYER, alpha));
    if player.is_shielded(now) {
        surface.outline(player.body.pos, player.body.size + Vec2::splat(10.0), palette::PICKUP);
    }
}

fn draw_pickups(game: &Game, surface: &mut dyn Surface) {
    let now = game.now();
    for d in entities(game, &game.world().pickups).filter_map(Entity::as_pickup) {
        // Fade over the last second
        let fade = ((d.expires_at - now) / 1000.0).clamp(0.2, 1.0) as f32;
        surface.rect(d.body.pos, d.body.size, with_alpha(palette::PICKUP, fade));
    }
}

fn draw_hud(game: &Game, surface: &mut dyn Surface) {
    let world = game.world();
    let player = &world.player;
    let lines = [
        format!("SCORE {}", world.score),
        format!("WAVE {}", game.encounter().wave()),
        format!("LIVES {}", player.lives),
        format!("LV {}  BOMBS {}", player.level, player.bombs),
    ];
    for (i, line) in lines.iter().enumerate() {
        surface.text(Vec2::new(8.0, 8.0 + HUD_LINE * i as f32), line, palette::TEXT);
    }

    if let Some(boss) = world.boss.and_then(|h| game.pool().get(h)).and_then(Entity::as_boss) {
        let ratio = boss.health_ratio();
        let full = world.field.width - 16.0;
        let center = Vec2::new(8.0 + full * ratio * 0.5, world.field.height - 12.0);
        surface.rect(center, Vec2::new(full * ratio, BOSS_BAR_HEIGHT), health_color(ratio));
    }

    let banner = match game.phase() {
        GamePhase::Ready => Some("PRESS START"),
        GamePhase::Paused => Some("PAUSED"),
        GamePhase::GameOver => Some("GAME OVER"),
        GamePhase::Playing => None,
    };
    if let Some(text) = banner {
        let center = Vec2::new(world.field.width * 0.5, world.field.height * 0.5);
        surface.text(center, text, palette::TEXT);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::{DrawCmd, DrawList};
    use crate::sim::entity::BossKind;
    use crate::sim::events::GameEvent;
    use crate::sim::game::Command;
    use crate::tuning::Tuning;

    fn render(view: &mut LayerView) -> DrawList {
        let mut list = DrawList::new();
        view.render(&mut list, 0.016).unwrap();
        list
    }

    #[test]
    fn test_hud_shows_banner_until_started() {
        let game = Rc::new(RefCell::new(Game::new(Tuning::default(), 3)));
        let mut hud = LayerView::new(game.clone(), Layer::Ui);
        let list = render(&mut hud);
        assert!(list.texts().any(|t| t == "PRESS START"));
        assert!(list.texts().any(|t| t == "SCORE 0"));

        game.borrow().post(GameEvent::GameStart);
        game.borrow_mut().step();
        let list = render(&mut hud);
        assert!(!list.texts().any(|t| t == "PRESS START"));
        assert!(list.texts().any(|t| t == "WAVE 1"));
    }

    #[test]
    fn test_boss_appears_on_enemy_layer() {
        let game = Rc::new(RefCell::new(Game::new(Tuning::default(), 3)));
        let mut enemies = LayerView::new(game.clone(), Layer::Enemy);
        assert!(render(&mut enemies).is_empty());
        {
            let mut g = game.borrow_mut();
            g.post(GameEvent::GameStart);
            g.queue(Command::SpawnBoss(BossKind::Hydra));
            g.step();
        }
        let list = render(&mut enemies);
        assert!(list
            .commands()
            .iter()
            .any(|c| matches!(c, DrawCmd::Rect { color, .. } if *color == palette::BOSS)));
    }

    #[test]
    fn test_view_reports_borrowed_game() {
        let game = Rc::new(RefCell::new(Game::new(Tuning::default(), 3)));
        let mut bg = LayerView::new(game.clone(), Layer::Background);
        let _held = game.borrow_mut();
        let mut list = DrawList::new();
        assert!(matches!(bg.render(&mut list, 0.016), Err(SimError::Render(_))));
    }
}
