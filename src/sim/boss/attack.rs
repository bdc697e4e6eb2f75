//! Attack FSM: Idle -> Warning -> Firing -> Cooldown -> Idle
//!
//! All delays are deadlines compared against the simulation clock. Firing is
//! transient: the attack pattern executes and the machine moves to Cooldown
//! in the same tick.

use serde::{Deserialize, Serialize};

use super::AttackMode;
use crate::sim::entity::Boss;
use crate::tuning::{AttackTuning, ModeThreshold};

/// Discriminant-only view of [`AttackState`], for transition logs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AttackPhase {
    Idle,
    Warning,
    Firing,
    Cooldown,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AttackState {
    Idle,
    Warning { until: f64 },
    Firing,
    Cooldown { until: f64 },
}

impl AttackState {
    pub fn phase(&self) -> AttackPhase {
        match self {
            AttackState::Idle => AttackPhase::Idle,
            AttackState::Warning { .. } => AttackPhase::Warning,
            AttackState::Firing => AttackPhase::Firing,
            AttackState::Cooldown { .. } => AttackPhase::Cooldown,
        }
    }
}

/// What the machine asks the director to do this tick
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AttackAction {
    Telegraph(AttackMode),
    Fire(AttackMode),
}

#[derive(Debug, Clone)]
pub struct AttackFsm {
    state: AttackState,
    /// Set when an attack is decided (entering Warning)
    last_attack: f64,
    last_mode_switch: f64,
    /// A threshold was crossed while hysteresis blocked the switch
    escalation_pending: bool,
    attacks_fired: u32,
    /// Transitions taken during the last `step`
    transitions: Vec<(AttackPhase, AttackPhase)>,
}

impl AttackFsm {
    pub fn new(now: f64) -> Self {
        Self {
            state: AttackState::Idle,
            last_attack: now,
            last_mode_switch: f64::NEG_INFINITY,
            escalation_pending: false,
            attacks_fired: 0,
            transitions: Vec::new(),
        }
    }

    pub fn state(&self) -> AttackState {
        self.state
    }

    pub fn attacks_fired(&self) -> u32 {
        self.attacks_fired
    }

    pub fn transitions(&self) -> &[(AttackPhase, AttackPhase)] {
        &self.transitions
    }

    fn go(&mut self, next: AttackState) {
        let from = self.state.phase();
        let to = next.phase();
        log::debug!("boss attack {:?} -> {:?}", from, to);
        self.transitions.push((from, to));
        self.state = next;
    }

    /// Advance one tick. `interval_scale` shortens the attack interval
    /// (enrage).
    pub fn step(&mut self, mode: AttackMode, cfg: &AttackTuning, now: f64, interval_scale: f64) -> Option<AttackAction> {
        self.transitions.clear();
        match self.state {
            AttackState::Idle => {
                if now - self.last_attack >= cfg.attack_interval_ms * interval_scale {
                    self.last_attack = now;
                    self.go(AttackState::Warning {
                        until: now + cfg.warning_ms,
                    });
                    return Some(AttackAction::Telegraph(mode));
                }
                None
            }
            AttackState::Warning { until } => {
                if now < until {
                    return None;
                }
                self.go(AttackState::Firing);
                self.attacks_fired += 1;
                self.go(AttackState::Cooldown {
                    until: now + cfg.post_fire_ms,
                });
                Some(AttackAction::Fire(mode))
            }
            // Firing never survives a step; treat a stray one as done
            AttackState::Firing => {
                self.go(AttackState::Cooldown {
                    until: now + cfg.post_fire_ms,
                });
                None
            }
            AttackState::Cooldown { until } => {
                if now >= until {
                    self.go(AttackState::Idle);
                }
                None
            }
        }
    }

    /// Escalate the boss's mode after a hit. Returns `(from, to)` when the
    /// mode changed.
    pub fn on_boss_hit(&mut self, boss: &mut Boss, cfg: &AttackTuning, now: f64) -> Option<(AttackMode, AttackMode)> {
        let target = target_mode(boss.health_ratio(), &cfg.mode_thresholds);
        if target <= boss.attack_mode {
            self.escalation_pending = false;
            return None;
        }
        if now - self.last_mode_switch < cfg.min_mode_switch_ms {
            self.escalation_pending = true;
            return None;
        }
        let from = boss.attack_mode;
        boss.attack_mode = target;
        self.last_mode_switch = now;
        self.escalation_pending = false;
        log::info!("boss mode {:?} -> {:?}", from, target);
        Some((from, target))
    }

    /// Retry a switch that hysteresis deferred
    pub fn retry_escalation(&mut self, boss: &mut Boss, cfg: &AttackTuning, now: f64) -> Option<(AttackMode, AttackMode)> {
        if !self.escalation_pending {
            return None;
        }
        self.on_boss_hit(boss, cfg, now)
    }
}

/// Most aggressive mode whose threshold the ratio has reached
pub fn target_mode(ratio: f32, thresholds: &[ModeThreshold]) -> AttackMode {
    thresholds
        .iter()
        .filter(|t| ratio <= t.ratio)
        .map(|t| t.mode)
        .max()
        .unwrap_or(AttackMode::Single)
}
