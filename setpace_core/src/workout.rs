//! Guided workout host: the engine wired to a clock, cues, persistence and
//! an optional secondary surface.
//!
//! [`GuidedWorkout`] is a cheap clonable handle. Every command runs the
//! engine transition with the engine borrowed, reconciles the clock
//! subscription, releases the borrow and only then dispatches events to the
//! cue port, the [`WorkoutListener`], the [`SessionSink`] and the surface.
//! Listener callbacks can therefore call back into the workout.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::{Rc, Weak};
use std::time::Duration;

use crate::clock::{CancelHandle, Scheduler};
use crate::config::Config;
use crate::cue::{self, CuePort, NoopCuePort};
use crate::engine::TimingEngine;
use crate::reward::SetReward;
use crate::surface::{
    CloseReason, SurfaceAction, SurfaceCallbacks, SurfaceMode, SurfaceSynchronizer,
};
use crate::wal::SessionSink;
use crate::{
    EngineEvent, EnginePhase, EngineSnapshot, Error, ExerciseProgress, SessionRecord,
    SetPerformance, SetRecord,
};

/// Host callbacks. Every method defaults to doing nothing.
#[allow(unused_variables)]
pub trait WorkoutListener {
    /// Every engine event, ticks included, before the specific callbacks
    fn on_event(&self, event: &EngineEvent) {}

    fn on_set_complete(&self, exercise_index: usize, record: &SetRecord, reward: &SetReward) {}

    fn on_exercise_complete(&self, exercise_id: &str) {}

    fn on_workout_complete(&self, session: &SessionRecord) {}

    fn on_workout_abandoned(&self, session: &SessionRecord) {}

    fn on_weight_change(&self, exercise_index: usize, weight: f64) {}

    /// The host closed the workout
    fn on_close(&self) {}

    /// A finished session could not be handed to the sink
    fn on_persist_error(&self, error: &Error) {}
}

struct NoopListener;

impl WorkoutListener for NoopListener {}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct WorkoutOptions {
    pub tick_interval: Duration,
    pub cues_enabled: bool,
}

impl Default for WorkoutOptions {
    fn default() -> Self {
        Self {
            tick_interval: Duration::from_secs(1),
            cues_enabled: true,
        }
    }
}

impl WorkoutOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            tick_interval: Duration::from_millis(config.timer.tick_interval_ms),
            cues_enabled: config.timer.cues_enabled,
        }
    }
}

struct Core {
    engine: TimingEngine,
    scheduler: Rc<dyn Scheduler>,
    tick_interval: Duration,
    clock: Option<CancelHandle>,
    /// Phase the current subscription was started for
    clock_phase: Option<EnginePhase>,
    closed: bool,
}

struct Hooks {
    listener: Box<dyn WorkoutListener>,
    cues: RefCell<Box<dyn CuePort>>,
    cues_enabled: bool,
    sink: RefCell<Option<Box<dyn SessionSink>>>,
    surface: RefCell<Option<SurfaceSynchronizer>>,
}

pub struct GuidedWorkoutBuilder {
    engine: TimingEngine,
    scheduler: Rc<dyn Scheduler>,
    options: WorkoutOptions,
    listener: Box<dyn WorkoutListener>,
    cues: Box<dyn CuePort>,
    sink: Option<Box<dyn SessionSink>>,
}

impl GuidedWorkoutBuilder {
    pub fn options(mut self, options: WorkoutOptions) -> Self {
        self.options = options;
        self
    }

    pub fn listener(mut self, listener: impl WorkoutListener + 'static) -> Self {
        self.listener = Box::new(listener);
        self
    }

    pub fn cues(mut self, cues: impl CuePort + 'static) -> Self {
        self.cues = Box::new(cues);
        self
    }

    pub fn sink(mut self, sink: impl SessionSink + 'static) -> Self {
        self.sink = Some(Box::new(sink));
        self
    }

    pub fn build(self) -> GuidedWorkout {
        GuidedWorkout {
            core: Rc::new(RefCell::new(Core {
                engine: self.engine,
                scheduler: self.scheduler,
                tick_interval: self.options.tick_interval,
                clock: None,
                clock_phase: None,
                closed: false,
            })),
            hooks: Rc::new(Hooks {
                listener: self.listener,
                cues: RefCell::new(self.cues),
                cues_enabled: self.options.cues_enabled,
                sink: RefCell::new(self.sink),
                surface: RefCell::new(None),
            }),
        }
    }
}

/// Shared handle to a running guided workout
#[derive(Clone)]
pub struct GuidedWorkout {
    core: Rc<RefCell<Core>>,
    hooks: Rc<Hooks>,
}

#[derive(Clone)]
struct WeakWorkout {
    core: Weak<RefCell<Core>>,
    hooks: Weak<Hooks>,
}

impl WeakWorkout {
    fn upgrade(&self) -> Option<GuidedWorkout> {
        Some(GuidedWorkout {
            core: self.core.upgrade()?,
            hooks: self.hooks.upgrade()?,
        })
    }
}

impl GuidedWorkout {
    pub fn builder(engine: TimingEngine, scheduler: Rc<dyn Scheduler>) -> GuidedWorkoutBuilder {
        GuidedWorkoutBuilder {
            engine,
            scheduler,
            options: WorkoutOptions::default(),
            listener: Box::new(NoopListener),
            cues: Box::new(NoopCuePort),
            sink: None,
        }
    }

    fn downgrade(&self) -> WeakWorkout {
        WeakWorkout {
            core: Rc::downgrade(&self.core),
            hooks: Rc::downgrade(&self.hooks),
        }
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn phase(&self) -> EnginePhase {
        self.core.borrow().engine.phase()
    }

    pub fn snapshot(&self) -> EngineSnapshot {
        self.core.borrow().engine.snapshot()
    }

    pub fn checkpoint(&self) -> SessionRecord {
        self.core.borrow().engine.checkpoint()
    }

    pub fn exercises(&self) -> Vec<ExerciseProgress> {
        self.core.borrow().engine.exercises().to_vec()
    }

    pub fn personal_bests(&self) -> HashMap<String, f64> {
        self.core.borrow().engine.personal_bests().clone()
    }

    pub fn xp(&self) -> u32 {
        self.core.borrow().engine.xp()
    }

    pub fn is_finished(&self) -> bool {
        self.core.borrow().engine.is_finished()
    }

    pub fn is_closed(&self) -> bool {
        self.core.borrow().closed
    }

    /// True while a clock subscription is held
    pub fn is_ticking(&self) -> bool {
        self.core.borrow().clock.is_some()
    }

    // ── Commands ─────────────────────────────────────────────────────

    pub fn start_set(&self) -> Vec<EngineEvent> {
        self.apply(|engine| engine.start_set())
    }

    pub fn complete_set(&self, performance: SetPerformance) -> Vec<EngineEvent> {
        self.apply(|engine| engine.complete_set(performance))
    }

    pub fn skip_rest(&self) -> Vec<EngineEvent> {
        self.apply(|engine| engine.skip_rest())
    }

    pub fn pause(&self) -> Vec<EngineEvent> {
        self.apply(|engine| engine.pause())
    }

    pub fn resume(&self) -> Vec<EngineEvent> {
        self.apply(|engine| engine.resume())
    }

    pub fn navigate_to(&self, exercise_index: usize, set_number: u32) -> Vec<EngineEvent> {
        self.apply(|engine| engine.navigate_to(exercise_index, set_number))
    }

    pub fn adjust_weight(&self, exercise_index: usize, weight: f64) -> Vec<EngineEvent> {
        self.apply(|engine| engine.adjust_weight(exercise_index, weight))
    }

    /// Adjust the weight of the exercise currently shown
    pub fn adjust_current_weight(&self, weight: f64) -> Vec<EngineEvent> {
        self.apply(|engine| {
            let index = engine.exercise_index();
            engine.adjust_weight(index, weight)
        })
    }

    pub fn correct_set(
        &self,
        exercise_index: usize,
        set_number: u32,
        performance: SetPerformance,
    ) -> Vec<EngineEvent> {
        self.apply(|engine| engine.correct_set(exercise_index, set_number, performance))
    }

    pub fn abandon(&self) -> Vec<EngineEvent> {
        self.apply(|engine| engine.abandon())
    }

    /// Advance the engine by one tick; normally called by the clock
    pub fn tick(&self) -> Vec<EngineEvent> {
        self.apply(|engine| engine.tick())
    }

    /// Show the workout on a secondary surface, replacing any open one
    pub fn open_surface(&self, surface: SurfaceSynchronizer) -> SurfaceMode {
        let snapshot = self.snapshot();
        let previous = self.hooks.surface.borrow_mut().replace(surface.clone());
        if let Some(previous) = previous.filter(|p| !p.same_as(&surface)) {
            previous.close(CloseReason::Replaced);
        }
        surface.open(
            &snapshot,
            Box::new(SurfaceRelay {
                workout: self.downgrade(),
            }),
        )
    }

    /// Relay pending surface input into the workout
    pub fn pump_surface(&self) {
        let surface = self.hooks.surface.borrow().clone();
        if let Some(surface) = surface {
            surface.pump();
        }
    }

    /// Tear down the workout: stop the clock, close the surface and notify
    /// the listener. The session is not finished; call
    /// [`abandon`](GuidedWorkout::abandon) first for that.
    pub fn close(&self) {
        {
            let mut core = self.core.borrow_mut();
            if core.closed {
                return;
            }
            core.closed = true;
            core.clock = None;
            core.clock_phase = None;
        }

        let surface = self.hooks.surface.borrow_mut().take();
        if let Some(surface) = surface {
            surface.close(CloseReason::Requested);
        }
        tracing::info!("Guided workout closed");
        self.hooks.listener.on_close();
    }

    // ── Internals ────────────────────────────────────────────────────

    fn apply<F>(&self, op: F) -> Vec<EngineEvent>
    where
        F: FnOnce(&mut TimingEngine) -> Vec<EngineEvent>,
    {
        let (events, snapshot) = {
            let mut core = self.core.borrow_mut();
            if core.closed {
                return vec![];
            }
            let events = op(&mut core.engine);
            self.sync_clock(&mut core);
            (events, core.engine.snapshot())
        };

        if !events.is_empty() {
            self.dispatch(&events, &snapshot);
        }
        events
    }

    /// Hold a clock subscription exactly while the phase needs one.
    ///
    /// Entering a ticking phase always starts a fresh subscription, so the
    /// first tick of a rest lands one full interval after the set ended.
    fn sync_clock(&self, core: &mut Core) {
        let phase = core.engine.phase();
        if !phase.needs_clock() {
            if core.clock.take().is_some() {
                tracing::debug!("Clock released");
            }
            core.clock_phase = None;
            return;
        }
        if core.clock.is_some() && core.clock_phase == Some(phase) {
            return;
        }

        // Cancel the old grid before scheduling the new one
        core.clock = None;
        let workout = self.downgrade();
        let handle = core.scheduler.schedule_repeating(
            core.tick_interval,
            Box::new(move || {
                if let Some(workout) = workout.upgrade() {
                    workout.tick();
                }
            }),
        );
        core.clock = Some(handle);
        core.clock_phase = Some(phase);
        tracing::debug!("Clock subscribed for {:?}", phase);
    }

    fn dispatch(&self, events: &[EngineEvent], snapshot: &EngineSnapshot) {
        let listener = &self.hooks.listener;
        let mut finished = false;

        for event in events {
            if self.hooks.cues_enabled {
                cue::deliver(&mut **self.hooks.cues.borrow_mut(), event);
            }
            listener.on_event(event);

            match event {
                EngineEvent::SetCompleted {
                    exercise_index,
                    record,
                    reward,
                } => listener.on_set_complete(*exercise_index, record, reward),
                EngineEvent::ExerciseCompleted { exercise_id, .. } => {
                    listener.on_exercise_complete(exercise_id)
                }
                EngineEvent::WeightChanged {
                    exercise_index,
                    weight,
                } => listener.on_weight_change(*exercise_index, *weight),
                EngineEvent::WorkoutCompleted { session } => {
                    finished = true;
                    self.persist(session);
                    listener.on_workout_complete(session);
                }
                EngineEvent::WorkoutAbandoned { session } => {
                    finished = true;
                    self.persist(session);
                    listener.on_workout_abandoned(session);
                }
                _ => {}
            }
        }

        let surface = self.hooks.surface.borrow().clone();
        if let Some(surface) = surface {
            surface.mirror(snapshot);
            if finished {
                surface.close(CloseReason::WorkoutFinished);
            }
        }
    }

    fn persist(&self, session: &SessionRecord) {
        let result = match self.hooks.sink.borrow_mut().as_mut() {
            Some(sink) => sink.append(session),
            None => return,
        };
        if let Err(e) = result {
            tracing::warn!("Failed to persist session {}: {}", session.id, e);
            self.hooks.listener.on_persist_error(&e);
        }
    }
}

/// Feeds surface input back into the workout without keeping it alive
struct SurfaceRelay {
    workout: WeakWorkout,
}

impl SurfaceCallbacks for SurfaceRelay {
    fn on_action(&mut self, action: SurfaceAction) {
        let Some(workout) = self.workout.upgrade() else {
            return;
        };
        match action {
            SurfaceAction::StartSet => workout.start_set(),
            SurfaceAction::CompleteSet(performance) => workout.complete_set(performance),
            SurfaceAction::AdjustWeight { weight } => workout.adjust_current_weight(weight),
            SurfaceAction::Pause => workout.pause(),
            SurfaceAction::Resume => workout.resume(),
            SurfaceAction::SkipRest => workout.skip_rest(),
            SurfaceAction::Close => vec![],
        };
    }

    fn on_close(&mut self, reason: CloseReason) {
        tracing::debug!("Workout surface closed: {:?}", reason);
    }
}
