//! Single-threaded render manager
//!
//! All registered displays are driven sequentially on the calling thread.
//! Nothing inside a frame needs locking; the update phase, mutation apply,
//! and every pipeline's cull/sort/output run back to back.

use std::time::{Duration, Instant};

use crate::display::DisplayCollection;
use crate::foundation::time::{FramePacer, FrameTimer};
use crate::manager::{
    FrameObserver, FrameOutcome, FrameStats, ManagerCore, ManagerError, ManagerHandle,
};
use crate::scene::SceneWorld;

/// Default minimum frame interval (roughly 60 Hz)
pub const DEFAULT_FRAME_INTERVAL: Duration = Duration::from_millis(16);

/// Drives all displays on one thread with paced frames
pub struct SingleThreadRenderManager {
    core: ManagerCore,
    pacer: FramePacer,
}

impl Default for SingleThreadRenderManager {
    fn default() -> Self {
        Self::new()
    }
}

impl SingleThreadRenderManager {
    /// Create a disabled manager with the default frame interval
    #[must_use]
    pub fn new() -> Self {
        Self {
            core: ManagerCore::new(),
            pacer: FramePacer::new(DEFAULT_FRAME_INTERVAL),
        }
    }

    /// Change the minimum interval between frame starts
    pub fn set_minimum_frame_interval(&mut self, interval: Duration) {
        self.pacer.set_minimum_interval(interval);
    }

    /// Arm or pause the paced frame loop
    pub fn set_enabled(&mut self, enabled: bool) {
        self.core.handle.set_enabled(enabled);
    }

    /// Whether the paced loop is enabled
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.core.handle.is_enabled()
    }

    /// Cross-thread control handle
    #[must_use]
    pub fn handle(&self) -> ManagerHandle {
        self.core.handle.clone()
    }

    /// Install the frame observer
    pub fn set_observer(&mut self, observer: Box<dyn FrameObserver>) {
        self.core.observer = Some(observer);
    }

    /// Register a display collection; registration is append-only
    pub fn add_display(&mut self, display: DisplayCollection) {
        self.core.displays.push(display);
    }

    /// The scene world
    ///
    /// Mutable access is for setup code; once frames are being produced,
    /// changes belong in the observer's mutation batch.
    #[must_use]
    pub fn world(&self) -> &SceneWorld {
        &self.core.world
    }

    /// Mutable access to the scene world
    pub fn world_mut(&mut self) -> &mut SceneWorld {
        &mut self.core.world
    }

    /// Cumulative frame counters
    #[must_use]
    pub fn stats(&self) -> FrameStats {
        self.core.stats
    }

    /// Wall-clock timing of rendered frames
    #[must_use]
    pub fn frame_timer(&self) -> &FrameTimer {
        &self.core.timer
    }

    fn frame(&mut self) -> Result<(), ManagerError> {
        self.core.update_phase();

        self.core.stats.last_items_drawn = 0;
        for display in &mut self.core.displays {
            let display_stats = display.render(&self.core.world)?;
            self.core.stats.absorb(display_stats);
        }
        self.core.stats.frames_rendered += 1;
        self.core.timer.update();
        Ok(())
    }

    /// Produce exactly one frame, regardless of the enabled flag
    ///
    /// Bypasses pacing and leaves the enabled flag untouched. Fails after
    /// shutdown.
    pub fn render_once(&mut self) -> Result<(), ManagerError> {
        if self.core.check_shut_down() {
            return Err(ManagerError::ShutDown);
        }
        self.frame()
    }

    /// One scheduling attempt at time `now`
    ///
    /// Renders a frame when the manager is enabled and the minimum interval
    /// has elapsed; otherwise reports why nothing happened. Fails after
    /// shutdown.
    pub fn tick_at(&mut self, now: Instant) -> Result<FrameOutcome, ManagerError> {
        if self.core.check_shut_down() {
            return Err(ManagerError::ShutDown);
        }
        if !self.core.handle.is_enabled() {
            return Ok(FrameOutcome::Disabled);
        }
        if !self.pacer.try_admit(now) {
            self.core.stats.frames_skipped += 1;
            return Ok(FrameOutcome::Skipped);
        }
        self.frame()?;
        Ok(FrameOutcome::Rendered)
    }

    /// One scheduling attempt at the current time
    pub fn tick(&mut self) -> Result<FrameOutcome, ManagerError> {
        self.tick_at(Instant::now())
    }

    /// Block and drive paced frames until shutdown is requested
    ///
    /// Returns `Ok` on orderly shutdown; a composition error (incompletely
    /// built pipeline) finalizes the manager and propagates.
    pub fn run(&mut self) -> Result<(), ManagerError> {
        log::info!("render manager entering frame loop");
        loop {
            match self.tick() {
                Ok(FrameOutcome::Rendered) => {}
                Ok(FrameOutcome::Skipped) => {
                    let wait = self.pacer.time_until_next(Instant::now());
                    if !wait.is_zero() {
                        std::thread::sleep(wait);
                    }
                }
                Ok(FrameOutcome::Disabled) => {
                    // Parked; poll the control flags at a coarse cadence.
                    std::thread::sleep(Duration::from_millis(5));
                }
                Err(ManagerError::ShutDown) => return Ok(()),
                Err(e) => {
                    self.core.finalize();
                    return Err(e);
                }
            }
        }
    }

    /// Terminal, idempotent shutdown
    ///
    /// Runs the observer's shutdown callback and releases every display's
    /// devices. Further `tick`/`render_once` calls fail.
    pub fn shutdown(&mut self) {
        self.core.handle.shutdown();
        self.core.finalize();
    }
}
