//! Frame-scheduling render managers
//!
//! A manager owns the scene world and the registered display collections
//! and drives the per-frame contract:
//!
//! 1. the frame observer's update phase runs exactly once,
//! 2. its mutation batch is applied and the graphs are flushed at the
//!    frame's synchronization point,
//! 3. every registered display collection's pipelines cull, sort, and
//!    output exactly once.
//!
//! Scheduling is at-most-this-often: with a minimum frame interval set, an
//! attempt that arrives early is skipped, never queued. `render_once`
//! bypasses pacing and the enabled flag to produce exactly one frame; it
//! does not modify the enabled flag. Shutdown is terminal, idempotent, and
//! observable from any thread through the cloneable [`ManagerHandle`].
//!
//! [`single::SingleThreadRenderManager`] drives all displays sequentially
//! on the calling thread; [`multi::MultiThreadRenderManager`] fans each
//! display out to its own scoped thread per frame, for surfaces that must
//! not share a drive thread.

pub mod multi;
pub mod mutation;
pub mod single;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use thiserror::Error;

use crate::display::{DisplayCollection, DisplayStats};
use crate::foundation::time::FrameTimer;
use crate::pipeline::PipelineError;
use crate::scene::SceneWorld;

pub use mutation::{Mutation, MutationBatch, NodeTemplate};

/// Manager errors
#[derive(Error, Debug)]
pub enum ManagerError {
    /// The manager was shut down; no further frames are possible
    #[error("render manager has been shut down")]
    ShutDown,

    /// A pipeline is incompletely composed
    #[error(transparent)]
    Pipeline(#[from] PipelineError),
}

/// What a scheduling attempt did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameOutcome {
    /// A full frame was produced
    Rendered,
    /// The minimum frame interval had not elapsed
    Skipped,
    /// The manager is disabled
    Disabled,
}

/// Cumulative manager counters, visible to the observer each frame
#[derive(Debug, Clone, Copy, Default)]
pub struct FrameStats {
    /// Frames fully produced
    pub frames_rendered: u64,
    /// Scheduling attempts skipped by pacing
    pub frames_skipped: u64,
    /// Device failures across all frames
    pub device_errors: u64,
    /// Items drawn in the most recent frame
    pub last_items_drawn: usize,
}

impl FrameStats {
    pub(crate) fn absorb(&mut self, display: DisplayStats) {
        self.device_errors += display.device_errors as u64;
        self.last_items_drawn += display.items_drawn;
    }
}

/// Read-only view of the world handed to the update phase
pub struct FrameContext<'a> {
    /// The scene world as the coming frame will see it
    pub world: &'a SceneWorld,
    /// Number of the frame about to render (0-based)
    pub frame: u64,
    /// Counters up to the previous frame
    pub stats: &'a FrameStats,
}

/// The application side of the two-phase frame protocol
///
/// `update_scene` runs exactly once per frame before any cull, sort, or
/// output work, and returns the mutations to apply at the synchronization
/// point. `shutdown` runs exactly once when the manager tears down.
pub trait FrameObserver: Send {
    /// Update phase: inspect the world, return pending mutations
    fn update_scene(&mut self, ctx: &FrameContext<'_>) -> MutationBatch;

    /// Called once at manager teardown
    fn shutdown(&mut self) {}
}

#[derive(Debug, Default)]
struct ControlFlags {
    enabled: AtomicBool,
    shut_down: AtomicBool,
}

/// Cloneable cross-thread control surface for a running manager
///
/// `shutdown` and `set_enabled` may be called from any thread; an in-flight
/// frame loop observes them before starting its next frame, so no frame
/// touches a device after the shutdown request is honored.
#[derive(Debug, Clone, Default)]
pub struct ManagerHandle {
    flags: Arc<ControlFlags>,
}

impl ManagerHandle {
    /// Pause or resume the paced frame loop
    pub fn set_enabled(&self, enabled: bool) {
        self.flags.enabled.store(enabled, Ordering::Release);
    }

    /// Whether the paced loop is currently enabled
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.flags.enabled.load(Ordering::Acquire)
    }

    /// Request terminal shutdown
    pub fn shutdown(&self) {
        self.flags.shut_down.store(true, Ordering::Release);
    }

    /// Whether shutdown has been requested
    #[must_use]
    pub fn is_shut_down(&self) -> bool {
        self.flags.shut_down.load(Ordering::Acquire)
    }
}

/// Shared per-frame bookkeeping for both manager variants
pub(crate) struct ManagerCore {
    pub world: SceneWorld,
    pub observer: Option<Box<dyn FrameObserver>>,
    pub displays: Vec<DisplayCollection>,
    pub stats: FrameStats,
    pub timer: FrameTimer,
    pub handle: ManagerHandle,
    finalized: bool,
}

impl ManagerCore {
    pub fn new() -> Self {
        Self {
            world: SceneWorld::new(),
            observer: None,
            displays: Vec::new(),
            stats: FrameStats::default(),
            timer: FrameTimer::new(),
            handle: ManagerHandle::default(),
            finalized: false,
        }
    }

    /// Phase one and two: observer update, then mutation apply plus flush
    pub fn update_phase(&mut self) {
        if let Some(observer) = self.observer.as_mut() {
            let ctx = FrameContext {
                world: &self.world,
                frame: self.stats.frames_rendered,
                stats: &self.stats,
            };
            let batch = observer.update_scene(&ctx);
            mutation::apply_batch(&mut self.world, batch);
        }
        self.world.flush_all();
    }

    /// Tear down once: observer callback, then device release
    pub fn finalize(&mut self) {
        if self.finalized {
            return;
        }
        self.finalized = true;
        log::info!(
            "render manager shutting down after {} frames ({:.1} avg fps)",
            self.stats.frames_rendered,
            self.timer.average_fps()
        );
        if let Some(observer) = self.observer.as_mut() {
            observer.shutdown();
        }
        for display in &mut self.displays {
            display.shutdown();
        }
    }

    /// Observe a shutdown request, finalizing on the first sighting
    pub fn check_shut_down(&mut self) -> bool {
        if self.handle.is_shut_down() {
            self.finalize();
            true
        } else {
            false
        }
    }
}
