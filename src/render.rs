//! Draw surface abstraction
//!
//! Render objects draw through [`Surface`]. The crate ships a headless
//! [`DrawList`] that records commands, used by the runner and tests; a GPU
//! backend would implement the same trait.

use glam::Vec2;

pub type Color = [f32; 4];

pub mod palette {
    use super::Color;

    pub const BACKGROUND: Color = [0.04, 0.05, 0.10, 1.0];
    pub const PLAYER: Color = [0.35, 0.85, 1.0, 1.0];
    pub const PLAYER_SHOT: Color = [0.9, 0.95, 1.0, 1.0];
    pub const HOSTILE_SHOT: Color = [1.0, 0.45, 0.25, 1.0];
    pub const ENEMY: Color = [0.95, 0.3, 0.4, 1.0];
    pub const SUMMON: Color = [0.7, 0.35, 0.95, 1.0];
    pub const BOSS: Color = [0.85, 0.2, 0.2, 1.0];
    pub const WARNING: Color = [1.0, 0.85, 0.2, 0.5];
    pub const LASER: Color = [1.0, 0.2, 0.6, 0.85];
    pub const PICKUP: Color = [0.3, 1.0, 0.5, 1.0];
    pub const TEXT: Color = [1.0, 1.0, 1.0, 1.0];
}

/// Fade a color's alpha
#[inline]
pub fn with_alpha(c: Color, alpha: f32) -> Color {
    [c[0], c[1], c[2], c[3] * alpha.clamp(0.0, 1.0)]
}

/// Interpolate from `full` (ratio 1) to `empty` (ratio 0), e.g. for health bars
pub fn health_color(ratio: f32) -> Color {
    let t = ratio.clamp(0.0, 1.0);
    [1.0 - 0.7 * t, 0.25 + 0.65 * t, 0.3, 1.0]
}

pub trait Surface {
    /// Filled axis-aligned rectangle, `center`-anchored
    fn rect(&mut self, center: Vec2, size: Vec2, color: Color);
    /// Rectangle outline
    fn outline(&mut self, center: Vec2, size: Vec2, color: Color);
    fn text(&mut self, pos: Vec2, text: &str, color: Color);
}

#[derive(Debug, Clone, PartialEq)]
pub enum DrawCmd {
    Rect { center: Vec2, size: Vec2, color: Color },
    Outline { center: Vec2, size: Vec2, color: Color },
    Text { pos: Vec2, text: String, color: Color },
}

/// In-memory surface: records every command of a frame
#[derive(Debug, Clone, Default)]
pub struct DrawList {
    cmds: Vec<DrawCmd>,
}

impl DrawList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn commands(&self) -> &[DrawCmd] {
        &self.cmds
    }

    pub fn len(&self) -> usize {
        self.cmds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cmds.is_empty()
    }

    /// Start a new frame
    pub fn clear(&mut self) {
        self.cmds.clear();
    }

    pub fn texts(&self) -> impl Iterator<Item = &str> {
        self.cmds.iter().filter_map(|c| match c {
            DrawCmd::Text { text, .. } => Some(text.as_str()),
            _ => None,
        })
    }
}

impl Surface for DrawList {
    fn rect(&mut self, center: Vec2, size: Vec2, color: Color) {
        self.cmds.push(DrawCmd::Rect { center, size, color });
    }

    fn outline(&mut self, center: Vec2, size: Vec2, color: Color) {
        self.cmds.push(DrawCmd::Outline { center, size, color });
    }

    fn text(&mut self, pos: Vec2, text: &str, color: Color) {
        self.cmds.push(DrawCmd::Text {
            pos,
            text: text.to_string(),
            color,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_draw_list_records_in_order() {
        let mut list = DrawList::new();
        list.rect(Vec2::ZERO, Vec2::ONE, palette::BOSS);
        list.text(Vec2::new(4.0, 4.0), "WAVE 1", palette::TEXT);
        assert_eq!(list.len(), 2);
        assert!(matches!(list.commands()[0], DrawCmd::Rect { .. }));
        assert_eq!(list.texts().collect::<Vec<_>>(), vec!["WAVE 1"]);
        list.clear();
        assert!(list.is_empty());
    }

    #[test]
    fn test_health_color_endpoints() {
        let full = health_color(1.0);
        assert!(full[1] > full[0]);
        let empty = health_color(0.0);
        assert!(empty[0] > empty[1]);
        assert_eq!(health_color(-1.0), health_color(0.0));
        assert_eq!(with_alpha(palette::TEXT, 0.5)[3], 0.5);
    }
}
