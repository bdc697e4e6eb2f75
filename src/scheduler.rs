//! Fixed-timestep update cadence and the layered render pass
//!
//! The platform calls [`Scheduler::frame`] once per display frame. Elapsed
//! time (clamped against stalls) is accumulated in integer microseconds;
//! every whole [`FIXED_STEP_US`] runs one `update` on every registered
//! object, then everything renders once in ascending [`Layer`] order.

use std::any::Any;
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::panic::{self, AssertUnwindSafe};
use std::rc::Rc;

use serde::{Deserialize, Serialize};

use crate::consts::{FIXED_STEP_US, MAX_FRAME_DELTA_MS, SIM_DT};
use crate::error::{SimError, SimResult};
use crate::render::Surface;

/// Draw layers, back to front
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Layer {
    Background,
    Enemy,
    Bullet,
    Player,
    Particle,
    Ui,
}

impl Layer {
    pub const ALL: [Layer; 6] = [
        Layer::Background,
        Layer::Enemy,
        Layer::Bullet,
        Layer::Player,
        Layer::Particle,
        Layer::Ui,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Layer::Background => "background",
            Layer::Enemy => "enemy",
            Layer::Bullet => "bullet",
            Layer::Player => "player",
            Layer::Particle => "particle",
            Layer::Ui => "ui",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        Layer::ALL
            .into_iter()
            .find(|l| l.as_str().eq_ignore_ascii_case(s))
    }
}

/// Anything the scheduler drives. Both hooks default to doing nothing, so
/// simulation-only objects skip `render` and views skip `update`.
pub trait RenderObject {
    fn update(&mut self, _fixed_dt: f32) -> SimResult<()> {
        Ok(())
    }

    fn render(&mut self, _surface: &mut dyn Surface, _frame_dt: f32) -> SimResult<()> {
        Ok(())
    }

    /// Used in failure logs
    fn label(&self) -> &str {
        "render object"
    }
}

pub type SharedObject = Rc<RefCell<dyn RenderObject>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SchedulerState {
    Stopped,
    Running,
    Paused,
}

pub struct Scheduler {
    state: SchedulerState,
    layers: BTreeMap<Layer, Vec<SharedObject>>,
    acc_us: u64,
    /// Baseline for the next frame delta; `None` after start/resume
    last_ms: Option<f64>,
    steps: u64,
    frames: u64,
    failures: u64,
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scheduler")
            .field("state", &self.state)
            .field("objects", &self.object_count())
            .field("acc_us", &self.acc_us)
            .field("steps", &self.steps)
            .finish()
    }
}

impl Scheduler {
    pub fn new() -> Self {
        Self {
            state: SchedulerState::Stopped,
            layers: BTreeMap::new(),
            acc_us: 0,
            last_ms: None,
            steps: 0,
            frames: 0,
            failures: 0,
        }
    }

    pub fn state(&self) -> SchedulerState {
        self.state
    }

    /// Fixed steps run since construction
    pub fn steps(&self) -> u64 {
        self.steps
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }

    /// Update/render calls that failed or panicked
    pub fn failures(&self) -> u64 {
        self.failures
    }

    /// Fractional time carried to the next frame
    pub fn accumulator_us(&self) -> u64 {
        self.acc_us
    }

    pub fn object_count(&self) -> usize {
        self.layers.values().map(Vec::len).sum()
    }

    pub fn start(&mut self) {
        if self.state == SchedulerState::Running {
            return;
        }
        log::info!("scheduler started");
        self.state = SchedulerState::Running;
        self.acc_us = 0;
        self.last_ms = None;
    }

    pub fn pause(&mut self) {
        if self.state == SchedulerState::Running {
            log::debug!("scheduler paused");
            self.state = SchedulerState::Paused;
        }
    }

    /// Resume from pause; the next frame only re-baselines the clock
    pub fn resume(&mut self) {
        if self.state == SchedulerState::Paused {
            log::debug!("scheduler resumed");
            self.state = SchedulerState::Running;
            self.last_ms = None;
        }
    }

    pub fn stop(&mut self) {
        if self.state != SchedulerState::Stopped {
            log::info!("scheduler stopped after {} steps", self.steps);
        }
        self.state = SchedulerState::Stopped;
        self.acc_us = 0;
        self.last_ms = None;
    }

    pub fn register_render_obj(&mut self, layer: Layer, obj: SharedObject) {
        self.layers.entry(layer).or_default().push(obj);
    }

    /// Register by layer name; unknown names are logged and ignored
    pub fn register_named(&mut self, layer: &str, obj: SharedObject) -> SimResult<()> {
        let Some(layer) = Layer::from_str(layer) else {
            let err = SimError::UnknownName {
                what: "layer",
                name: layer.to_string(),
            };
            log::warn!("{}", err);
            return Err(err);
        };
        self.register_render_obj(layer, obj);
        Ok(())
    }

    pub fn unregister_render_obj(&mut self, layer: Layer, obj: &SharedObject) -> bool {
        let Some(list) = self.layers.get_mut(&layer) else {
            return false;
        };
        let before = list.len();
        list.retain(|o| !Rc::ptr_eq(o, obj));
        before != list.len()
    }

    /// Platform frame callback. Returns the number of fixed steps run.
    pub fn frame(&mut self, now_ms: f64, surface: &mut dyn Surface) -> u32 {
        if self.state != SchedulerState::Running {
            return 0;
        }
        let delta_ms = match self.last_ms {
            Some(last) => (now_ms - last).clamp(0.0, MAX_FRAME_DELTA_MS),
            None => 0.0,
        };
        self.last_ms = Some(now_ms);
        self.frames += 1;

        self.acc_us += (delta_ms * 1000.0).round() as u64;
        let mut steps = 0;
        while self.acc_us >= FIXED_STEP_US {
            for obj in self.layers.values().flatten() {
                if !run_guarded(obj, "update", |o| o.update(SIM_DT)) {
                    self.failures += 1;
                }
            }
            self.acc_us -= FIXED_STEP_US;
            self.steps += 1;
            steps += 1;
        }

        let frame_dt = (delta_ms / 1000.0) as f32;
        for obj in self.layers.values().flatten() {
            if !run_guarded(obj, "render", |o| o.render(surface, frame_dt)) {
                self.failures += 1;
            }
        }
        steps
    }
}

/// Call one object's hook, containing errors and panics. Returns false if
/// the call failed.
fn run_guarded(obj: &SharedObject, hook: &str, f: impl FnOnce(&mut dyn RenderObject) -> SimResult<()>) -> bool {
    let Ok(mut o) = obj.try_borrow_mut() else {
        log::error!("{} skipped: object is already borrowed", hook);
        return false;
    };
    match panic::catch_unwind(AssertUnwindSafe(|| f(&mut *o))) {
        Ok(Ok(())) => true,
        Ok(Err(e)) => {
            log::error!("{} {} failed: {}", o.label(), hook, e);
            false
        }
        Err(payload) => {
            log::error!("{} {} panicked: {}", o.label(), hook, panic_message(payload.as_ref()));
            false
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("non-string panic")
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;
    use crate::render::DrawList;

    #[derive(Default)]
    struct Counter {
        updates: u32,
        renders: u32,
    }

    impl RenderObject for Counter {
        fn update(&mut self, _dt: f32) -> SimResult<()> {
            self.updates += 1;
            Ok(())
        }

        fn render(&mut self, _s: &mut dyn Surface, _dt: f32) -> SimResult<()> {
            self.renders += 1;
            Ok(())
        }
    }

    struct Panicky;

    impl RenderObject for Panicky {
        fn update(&mut self, _dt: f32) -> SimResult<()> {
            panic!("boom");
        }

        fn render(&mut self, _s: &mut dyn Surface, _dt: f32) -> SimResult<()> {
            Err(SimError::Render("no texture".into()))
        }
    }

    /// Records its layer on render, to check ordering
    struct Tagger {
        layer: Layer,
        seen: Rc<RefCell<Vec<Layer>>>,
    }

    impl RenderObject for Tagger {
        fn render(&mut self, _s: &mut dyn Surface, _dt: f32) -> SimResult<()> {
            self.seen.borrow_mut().push(self.layer);
            Ok(())
        }
    }

    fn run(deltas: &[f64]) -> (u64, u64, u32) {
        let mut sched = Scheduler::new();
        let counter = Rc::new(RefCell::new(Counter::default()));
        sched.register_render_obj(Layer::Enemy, counter.clone());
        sched.start();
        let mut surface = DrawList::new();
        let mut now = 0.0;
        sched.frame(now, &mut surface);
        for d in deltas {
            now += d;
            sched.frame(now, &mut surface);
        }
        let updates = counter.borrow().updates;
        (sched.steps(), sched.accumulator_us(), updates)
    }

    #[test]
    fn test_small_and_large_frames_step_alike() {
        let fine = run(&[5.0; 100]);
        let coarse = run(&[100.0; 5]);
        assert_eq!(fine, coarse);
        // 500ms / 16.667ms
        assert_eq!(fine.0, 29);
        assert_eq!(fine.2, 29);
    }

    #[test]
    fn test_stall_is_clamped() {
        let (steps, _, _) = run(&[10_000.0]);
        assert_eq!(steps, (MAX_FRAME_DELTA_MS as u64 * 1000) / FIXED_STEP_US);
    }

    #[test]
    fn test_pause_stops_everything_and_resume_rebaselines() {
        let mut sched = Scheduler::new();
        let counter = Rc::new(RefCell::new(Counter::default()));
        sched.register_render_obj(Layer::Player, counter.clone());
        let mut surface = DrawList::new();
        sched.start();
        sched.frame(0.0, &mut surface);
        sched.frame(100.0, &mut surface);
        let steps = sched.steps();
        let renders = counter.borrow().renders;

        sched.pause();
        assert_eq!(sched.frame(200.0, &mut surface), 0);
        assert_eq!(counter.borrow().renders, renders);

        sched.resume();
        // A long pause does not turn into catch-up steps
        assert_eq!(sched.frame(5_000.0, &mut surface), 0);
        assert_eq!(sched.steps(), steps);
        assert_eq!(sched.frame(5_050.0, &mut surface), 3);
    }

    #[test]
    fn test_panicking_object_does_not_stop_others() {
        let mut sched = Scheduler::new();
        let counter = Rc::new(RefCell::new(Counter::default()));
        sched.register_render_obj(Layer::Background, Rc::new(RefCell::new(Panicky)));
        sched.register_render_obj(Layer::Ui, counter.clone());
        let mut surface = DrawList::new();
        sched.start();
        sched.frame(0.0, &mut surface);
        let steps = sched.frame(50.0, &mut surface);
        assert_eq!(steps, 2);
        assert_eq!(counter.borrow().updates, 2);
        assert_eq!(counter.borrow().renders, 2);
        // Two update panics plus two render errors
        assert_eq!(sched.failures(), 4);
    }

    #[test]
    fn test_render_runs_in_layer_order() {
        let mut sched = Scheduler::new();
        let seen = Rc::new(RefCell::new(Vec::new()));
        for layer in [Layer::Ui, Layer::Background, Layer::Player, Layer::Enemy] {
            let obj = Rc::new(RefCell::new(Tagger {
                layer,
                seen: seen.clone(),
            }));
            sched.register_render_obj(layer, obj);
        }
        sched.start();
        sched.frame(0.0, &mut DrawList::new());
        assert_eq!(
            *seen.borrow(),
            vec![Layer::Background, Layer::Enemy, Layer::Player, Layer::Ui]
        );
    }

    #[test]
    fn test_unregister_and_unknown_layer() {
        let mut sched = Scheduler::new();
        let obj: SharedObject = Rc::new(RefCell::new(Counter::default()));
        sched.register_render_obj(Layer::Bullet, obj.clone());
        assert_eq!(sched.object_count(), 1);
        assert!(!sched.unregister_render_obj(Layer::Ui, &obj));
        assert!(sched.unregister_render_obj(Layer::Bullet, &obj));
        assert_eq!(sched.object_count(), 0);

        assert!(sched.register_named("PARTICLE", obj.clone()).is_ok());
        assert!(matches!(
            sched.register_named("foreground", obj),
            Err(SimError::UnknownName { what: "layer", .. })
        ));
        assert_eq!(sched.object_count(), 1);
    }

    #[test]
    fn test_stopped_scheduler_ignores_frames() {
        let mut sched = Scheduler::new();
        assert_eq!(sched.frame(100.0, &mut DrawList::new()), 0);
        sched.start();
        sched.stop();
        assert_eq!(sched.state(), SchedulerState::Stopped);
        assert_eq!(sched.frame(200.0, &mut DrawList::new()), 0);
        assert_eq!(sched.frames(), 0);
    }

    proptest! {
        /// Step count depends only on total elapsed time, never on chunking
        #[test]
        fn prop_steps_depend_only_on_total(deltas in proptest::collection::vec(1u16..=250, 1..120)) {
            let deltas: Vec<f64> = deltas.into_iter().map(f64::from).collect();
            let total_us: u64 = deltas.iter().map(|d| *d as u64 * 1000).sum();
            let (steps, acc, updates) = run(&deltas);
            prop_assert_eq!(steps, total_us / FIXED_STEP_US);
            prop_assert_eq!(acc, total_us % FIXED_STEP_US);
            prop_assert_eq!(updates as u64, steps);
        }
    }
}
