//! Player-facing preferences
//!
//! Persisted separately from the balance sheet; applied on top of [`Tuning`].

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::tuning::{BossTrigger, Tuning};

/// Difficulty preset levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum Difficulty {
    Easy,
    #[default]
    Normal,
    Hard,
}

impl Difficulty {
    pub fn as_str(&self) -> &'static str {
        match self {
            Difficulty::Easy => "Easy",
            Difficulty::Normal => "Normal",
            Difficulty::Hard => "Hard",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "easy" => Some(Difficulty::Easy),
            "normal" | "norm" => Some(Difficulty::Normal),
            "hard" => Some(Difficulty::Hard),
            _ => None,
        }
    }

    /// Enemy and boss health multiplier
    pub fn health_mult(&self) -> f32 {
        match self {
            Difficulty::Easy => 0.75,
            Difficulty::Normal => 1.0,
            Difficulty::Hard => 1.4,
        }
    }

    /// Spawn interval multiplier (lower = denser waves)
    pub fn spawn_interval_mult(&self) -> f64 {
        match self {
            Difficulty::Easy => 1.25,
            Difficulty::Normal => 1.0,
            Difficulty::Hard => 0.8,
        }
    }

    /// Starting lives
    pub fn lives(&self) -> u8 {
        match self {
            Difficulty::Easy => 5,
            Difficulty::Normal => 3,
            Difficulty::Hard => 2,
        }
    }
}

/// Game settings/preferences
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub difficulty: Difficulty,
    /// Run seed for spawn selection and drop rolls
    pub seed: u64,
    /// Overrides the tuning's boss trigger when set
    pub boss_trigger: Option<BossTrigger>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            difficulty: Difficulty::Normal,
            seed: 0x5eed_cafe,
            boss_trigger: None,
        }
    }
}

impl Settings {
    pub fn from_difficulty(difficulty: Difficulty) -> Self {
        Self {
            difficulty,
            ..Self::default()
        }
    }

    /// Fold these preferences into a balance sheet
    pub fn apply(&self, tuning: &mut Tuning) {
        let d = self.difficulty;
        tuning.player.lives = d.lives().min(tuning.player.max_lives);
        tuning.encounter.spawn_interval_ms *= d.spawn_interval_mult();
        tuning.encounter.min_spawn_interval_ms *= d.spawn_interval_mult();
        for arch in tuning
            .encounter
            .archetypes
            .iter_mut()
            .chain([&mut tuning.encounter.mini, &mut tuning.encounter.minion])
        {
            arch.health *= d.health_mult();
        }
        for boss in &mut tuning.bosses {
            boss.max_health *= d.health_mult();
        }
        if let Some(trigger) = self.boss_trigger {
            tuning.encounter.boss_trigger = trigger;
        }
    }

    /// Load settings from a JSON file, falling back to defaults
    pub fn load(path: impl AsRef<Path>) -> Self {
        match std::fs::read_to_string(path.as_ref()) {
            Ok(json) => match serde_json::from_str(&json) {
                Ok(settings) => {
                    log::info!("Loaded settings from {}", path.as_ref().display());
                    return settings;
                }
                Err(e) => log::warn!("Ignoring malformed settings: {}", e),
            },
            Err(e) => log::info!("No settings at {} ({})", path.as_ref().display(), e),
        }

        log::info!("Using default settings");
        Self::default()
    }

    /// Save settings as JSON
    pub fn save(&self, path: impl AsRef<Path>) {
        match serde_json::to_string_pretty(self) {
            Ok(json) => match std::fs::write(path.as_ref(), json) {
                Ok(()) => log::info!("Settings saved"),
                Err(e) => log::warn!("Settings not saved: {}", e),
            },
            Err(e) => log::warn!("Settings not serialized: {}", e),
        }
    }
}
