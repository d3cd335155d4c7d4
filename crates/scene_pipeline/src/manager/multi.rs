//! Multi-threaded render manager
//!
//! Each display collection is driven on its own scoped thread per frame,
//! for device setups that must not share a drive thread (mirrored surfaces
//! with shared context state, or a window whose driver serializes per
//! thread). The frame boundary is the scope join: no frame N+1 work starts
//! until every display has finished frame N.
//!
//! The update phase and mutation apply run on the manager thread strictly
//! before the fan-out, so render threads only ever read settled world
//! state.

use std::time::{Duration, Instant};

use crate::display::{DisplayCollection, DisplayStats};
use crate::foundation::time::{FramePacer, FrameTimer};
use crate::manager::{
    FrameObserver, FrameOutcome, FrameStats, ManagerCore, ManagerError, ManagerHandle,
};
use crate::pipeline::PipelineError;
use crate::scene::SceneWorld;

/// Drives each display collection on its own thread per frame
pub struct MultiThreadRenderManager {
    core: ManagerCore,
    pacer: FramePacer,
}

impl Default for MultiThreadRenderManager {
    fn default() -> Self {
        Self::new()
    }
}

impl MultiThreadRenderManager {
    /// Create a disabled manager with the default frame interval
    #[must_use]
    pub fn new() -> Self {
        Self {
            core: ManagerCore::new(),
            pacer: FramePacer::new(super::single::DEFAULT_FRAME_INTERVAL),
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
    #[must_use]
    pub fn world(&self) -> &SceneWorld {
        &self.core.world
    }

    /// Mutable access to the scene world (setup time only)
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
        // Mutations settle before any render thread exists.
        self.core.update_phase();

        let world: &SceneWorld = &self.core.world;
        let results: Vec<Result<DisplayStats, PipelineError>> = std::thread::scope(|scope| {
            let handles: Vec<_> = self
                .core
                .displays
                .iter_mut()
                .map(|display| scope.spawn(move || display.render(world)))
                .collect();

            handles
                .into_iter()
                .map(|handle| match handle.join() {
                    Ok(result) => result,
                    Err(_) => {
                        log::error!("display render thread panicked, frame dropped");
                        Ok(DisplayStats {
                            pipelines_completed: 0,
                            device_errors: 1,
                            items_drawn: 0,
                        })
                    }
                })
                .collect()
        });

        self.core.stats.last_items_drawn = 0;
        for result in results {
            let display_stats = result?;
            self.core.stats.absorb(display_stats);
        }
        self.core.stats.frames_rendered += 1;
        self.core.timer.update();
        Ok(())
    }

    /// Produce exactly one frame, regardless of the enabled flag
    pub fn render_once(&mut self) -> Result<(), ManagerError> {
        if self.core.check_shut_down() {
            return Err(ManagerError::ShutDown);
        }
        self.frame()
    }

    /// One scheduling attempt at time `now`
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
    pub fn run(&mut self) -> Result<(), ManagerError> {
        log::info!("multi-threaded render manager entering frame loop");
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
    pub fn shutdown(&mut self) {
        self.core.handle.shutdown();
        self.core.finalize();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::{CullStage, GraphicsPipeline, HeadlessDevice, HeadlessRecording, SortStage};
    use crate::scene::camera::Projection;
    use crate::scene::layer::{Layer, Viewport};

    fn display_for(
        manager: &mut MultiThreadRenderManager,
    ) -> (DisplayCollection, HeadlessRecording) {
        let scene = manager.world_mut().create_scene();
        {
            let s = manager.world_mut().scene_mut(scene).unwrap();
            let root = s.graph().root();
            s.add_active_viewpoint(root, Projection::default()).unwrap();
        }
        let device = HeadlessDevice::new();
        let recording = device.recording();
        let mut display = DisplayCollection::new();
        display.set_layers(vec![Layer::new(scene, Viewport::new(0, 0, 64, 64))]);
        display.add_pipeline(GraphicsPipeline::with_stages(
            CullStage::Frustum,
            SortStage::default(),
            Box::new(device),
        ));
        (display, recording)
    }

    #[test]
    fn test_all_displays_driven_every_frame() {
        let mut manager = MultiThreadRenderManager::new();
        let (d1, r1) = display_for(&mut manager);
        let (d2, r2) = display_for(&mut manager);
        manager.add_display(d1);
        manager.add_display(d2);

        manager.render_once().unwrap();
        manager.render_once().unwrap();

        assert_eq!(r1.frame_count(), 2);
        assert_eq!(r2.frame_count(), 2);
        assert_eq!(manager.stats().frames_rendered, 2);
        assert_eq!(manager.frame_timer().frame_count(), 2);
    }

    #[test]
    fn test_device_failure_confined_to_one_display() {
        let mut manager = MultiThreadRenderManager::new();
        let (d1, r1) = display_for(&mut manager);
        let (d2, r2) = display_for(&mut manager);
        manager.add_display(d1);
        manager.add_display(d2);

        r1.inject_begin_failure();
        manager.render_once().unwrap();

        assert_eq!(r1.frame_count(), 0);
        assert_eq!(r2.frame_count(), 1);
        assert_eq!(manager.stats().device_errors, 1);
    }

    #[test]
    fn test_shutdown_from_handle_stops_frames() {
        let mut manager = MultiThreadRenderManager::new();
        let (d1, r1) = display_for(&mut manager);
        manager.add_display(d1);

        manager.handle().shutdown();
        assert!(matches!(manager.render_once(), Err(ManagerError::ShutDown)));
        assert_eq!(r1.frame_count(), 0);
    }
}
