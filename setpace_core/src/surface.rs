//! Secondary rendering surface (companion window, overlay, watch face...).
//!
//! A [`SurfaceSynchronizer`] owns at most one active surface at a time. It
//! prefers a detached surface from the [`SurfaceFactory`] and falls back to
//! the factory's inline overlay when a detached one is refused. Detached
//! surfaces get a keep-alive task that periodically calls
//! [`RenderSurface::focus`].
//!
//! User input on the surface is collected by [`SurfaceSynchronizer::pump`]
//! and relayed to the host through [`SurfaceCallbacks`]. No borrow is held
//! while callbacks run, so they may call back into the synchronizer (mirror,
//! close, even reopen).

use std::cell::RefCell;
use std::rc::{Rc, Weak};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::clock::{CancelHandle, Scheduler};
use crate::{EngineSnapshot, Result, SetPerformance};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SurfaceMode {
    Detached,
    InlineOverlay,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CloseReason {
    /// The host or the user asked for it
    Requested,
    /// The surface went away on its own (window closed, device gone)
    SurfaceClosed,
    WorkoutFinished,
    /// A newer surface took its place
    Replaced,
}

/// User input coming from a surface
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum SurfaceAction {
    StartSet,
    CompleteSet(SetPerformance),
    AdjustWeight { weight: f64 },
    Pause,
    Resume,
    SkipRest,
    /// Close the surface itself; handled by the synchronizer
    Close,
}

pub trait RenderSurface {
    /// Replace whatever is shown with `snapshot`
    fn render(&mut self, snapshot: &EngineSnapshot) -> Result<()>;

    fn focus(&mut self) -> Result<()> {
        Ok(())
    }

    /// Input received since the last call
    fn take_actions(&mut self) -> Vec<SurfaceAction> {
        Vec::new()
    }

    /// True once the surface was closed outside our control
    fn is_closed(&self) -> bool {
        false
    }

    fn release(&mut self) {}
}

pub trait SurfaceFactory {
    /// A detached surface, or `None` if the platform refuses one
    fn create_detached(&mut self) -> Option<Box<dyn RenderSurface>>;

    fn create_inline(&mut self) -> Box<dyn RenderSurface>;
}

pub trait SurfaceCallbacks {
    fn on_action(&mut self, action: SurfaceAction);
    fn on_close(&mut self, reason: CloseReason);
}

struct ActiveSurface {
    surface: Box<dyn RenderSurface>,
    mode: SurfaceMode,
    /// Taken out while [`SurfaceSynchronizer::pump`] relays actions
    callbacks: Option<Box<dyn SurfaceCallbacks>>,
    keep_alive: Option<CancelHandle>,
    generation: u64,
}

struct SyncInner {
    factory: Box<dyn SurfaceFactory>,
    active: Option<ActiveSurface>,
    generation: u64,
    /// Close that happened while its callbacks were lent out to `pump`
    orphaned_close: Option<(u64, CloseReason)>,
}

/// Owned handle to the single secondary surface
#[derive(Clone)]
pub struct SurfaceSynchronizer {
    inner: Rc<RefCell<SyncInner>>,
    scheduler: Rc<dyn Scheduler>,
    keep_alive: Duration,
}

impl SurfaceSynchronizer {
    pub fn new(
        factory: Box<dyn SurfaceFactory>,
        scheduler: Rc<dyn Scheduler>,
        keep_alive: Duration,
    ) -> Self {
        Self {
            inner: Rc::new(RefCell::new(SyncInner {
                factory,
                active: None,
                generation: 0,
                orphaned_close: None,
            })),
            scheduler,
            keep_alive,
        }
    }

    /// Whether both handles refer to the same synchronizer
    pub fn same_as(&self, other: &SurfaceSynchronizer) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    pub fn is_open(&self) -> bool {
        self.inner.borrow().active.is_some()
    }

    pub fn mode(&self) -> Option<SurfaceMode> {
        self.inner.borrow().active.as_ref().map(|a| a.mode)
    }

    /// Open a surface showing `initial`, replacing any open one.
    pub fn open(
        &self,
        initial: &EngineSnapshot,
        callbacks: Box<dyn SurfaceCallbacks>,
    ) -> SurfaceMode {
        self.close(CloseReason::Replaced);

        let mut inner = self.inner.borrow_mut();
        let (mut surface, mode) = match inner.factory.create_detached() {
            Some(surface) => (surface, SurfaceMode::Detached),
            None => {
                tracing::info!("Detached surface refused, using inline overlay");
                (inner.factory.create_inline(), SurfaceMode::InlineOverlay)
            }
        };
        if let Err(e) = surface.render(initial) {
            tracing::warn!("Initial surface render failed: {}", e);
        }

        inner.generation += 1;
        let generation = inner.generation;

        let keep_alive = (mode == SurfaceMode::Detached).then(|| {
            let weak = Rc::downgrade(&self.inner);
            self.scheduler.schedule_repeating(
                self.keep_alive,
                Box::new(move || keep_alive_tick(&weak, generation)),
            )
        });

        inner.active = Some(ActiveSurface {
            surface,
            mode,
            callbacks: Some(callbacks),
            keep_alive,
            generation,
        });

        tracing::info!("Opened {:?} surface #{}", mode, generation);
        mode
    }

    /// Re-render the open surface from scratch
    pub fn mirror(&self, snapshot: &EngineSnapshot) {
        let mut inner = self.inner.borrow_mut();
        if let Some(active) = inner.active.as_mut() {
            if let Err(e) = active.surface.render(snapshot) {
                tracing::warn!("Surface render failed: {}", e);
            }
        }
    }

    /// Close the open surface. Returns false if none was open.
    pub fn close(&self, reason: CloseReason) -> bool {
        let active = {
            let mut inner = self.inner.borrow_mut();
            let active = inner.active.take();
            if let Some(active) = active.as_ref().filter(|a| a.callbacks.is_none()) {
                inner.orphaned_close = Some((active.generation, reason));
            }
            active
        };
        let Some(mut active) = active else {
            return false;
        };

        if let Some(handle) = active.keep_alive.take() {
            handle.cancel();
        }
        active.surface.release();
        tracing::info!("Closed surface #{} ({:?})", active.generation, reason);

        if let Some(mut callbacks) = active.callbacks.take() {
            callbacks.on_close(reason);
        }
        true
    }

    /// Relay pending input and notice surfaces closed from outside.
    pub fn pump(&self) {
        let (generation, actions, closed, callbacks) = {
            let mut inner = self.inner.borrow_mut();
            let Some(active) = inner.active.as_mut() else {
                return;
            };
            (
                active.generation,
                active.surface.take_actions(),
                active.surface.is_closed(),
                active.callbacks.take(),
            )
        };
        let Some(mut callbacks) = callbacks else {
            return;
        };

        let mut close_requested = false;
        for action in actions {
            if !self.is_current(generation) {
                break;
            }
            match action {
                SurfaceAction::Close => close_requested = true,
                action => {
                    tracing::debug!("Surface action {:?}", action);
                    callbacks.on_action(action);
                }
            }
        }

        // Hand the callbacks back, or deliver the close that happened meanwhile
        let orphaned = {
            let mut inner = self.inner.borrow_mut();
            match inner.active.as_mut().filter(|a| a.generation == generation) {
                Some(active) => {
                    active.callbacks = Some(callbacks);
                    None
                }
                None => match inner.orphaned_close.take() {
                    Some((g, reason)) if g == generation => Some((callbacks, reason)),
                    _ => None,
                },
            }
        };
        if let Some((mut callbacks, reason)) = orphaned {
            callbacks.on_close(reason);
            return;
        }

        if closed {
            self.close(CloseReason::SurfaceClosed);
        } else if close_requested {
            self.close(CloseReason::Requested);
        }
    }

    fn is_current(&self, generation: u64) -> bool {
        self.inner
            .borrow()
            .active
            .as_ref()
            .is_some_and(|a| a.generation == generation)
    }
}

fn keep_alive_tick(inner: &Weak<RefCell<SyncInner>>, generation: u64) {
    let Some(inner) = inner.upgrade() else {
        return;
    };
    let Ok(mut inner) = inner.try_borrow_mut() else {
        return;
    };
    if let Some(active) = inner.active.as_mut().filter(|a| a.generation == generation) {
        if let Err(e) = active.surface.focus() {
            tracing::debug!("Surface keep-alive focus failed: {}", e);
        }
    }
}
