//! Frame protocol integration tests
//!
//! Exercises the per-frame contract across the public surface: the observer
//! update runs exactly once before any output work, every registered
//! pipeline is driven exactly once per frame, `render_once` ignores the
//! enabled flag, and shutdown is terminal from any thread.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use scene_pipeline::prelude::*;

struct CountingObserver {
    updates: Arc<AtomicU64>,
    shutdowns: Arc<AtomicU64>,
    batch_for_first_frame: Option<MutationBatch>,
}

impl FrameObserver for CountingObserver {
    fn update_scene(&mut self, ctx: &FrameContext<'_>) -> MutationBatch {
        self.updates.fetch_add(1, Ordering::SeqCst);
        if ctx.frame == 0 {
            if let Some(batch) = self.batch_for_first_frame.take() {
                return batch;
            }
        }
        MutationBatch::new()
    }

    fn shutdown(&mut self) {
        self.shutdowns.fetch_add(1, Ordering::SeqCst);
    }
}

struct Fixture {
    manager: SingleThreadRenderManager,
    scene: SceneId,
    recordings: Vec<HeadlessRecording>,
    updates: Arc<AtomicU64>,
    shutdowns: Arc<AtomicU64>,
}

/// Manager with one display, `pipelines` headless pipelines, and a camera
/// looking down -Z at the origin.
fn fixture(pipelines: usize, first_frame_batch: Option<MutationBatch>) -> Fixture {
    let _ = env_logger::builder().is_test(true).try_init();

    let mut manager = SingleThreadRenderManager::new();
    let updates = Arc::new(AtomicU64::new(0));
    let shutdowns = Arc::new(AtomicU64::new(0));
    manager.set_observer(Box::new(CountingObserver {
        updates: updates.clone(),
        shutdowns: shutdowns.clone(),
        batch_for_first_frame: first_frame_batch,
    }));

    let scene = manager.world_mut().create_scene();
    {
        let s = manager.world_mut().scene_mut(scene).unwrap();
        let root = s.graph().root();
        let mount = s
            .graph_mut()
            .add_transform(root, Mat4::new_translation(&Vec3::new(0.0, 0.0, 5.0)))
            .unwrap();
        s.add_active_viewpoint(mount, Projection::default()).unwrap();
    }

    let mut display = DisplayCollection::new();
    display.set_layers(vec![Layer::new(scene, Viewport::new(0, 0, 640, 480))]);
    let mut recordings = Vec::new();
    for _ in 0..pipelines {
        let device = HeadlessDevice::new();
        recordings.push(device.recording());
        display.add_pipeline(GraphicsPipeline::with_stages(
            CullStage::Frustum,
            SortStage::StateAndTransparencyDepth,
            Box::new(device),
        ));
    }
    manager.add_display(display);

    Fixture {
        manager,
        scene,
        recordings,
        updates,
        shutdowns,
    }
}

#[test]
fn update_runs_exactly_once_per_frame() {
    let mut fx = fixture(1, None);

    for _ in 0..3 {
        fx.manager.render_once().unwrap();
    }

    assert_eq!(fx.updates.load(Ordering::SeqCst), 3);
    assert_eq!(fx.recordings[0].frame_count(), 3);
}

#[test]
fn mutations_apply_before_the_same_frame_culls() {
    // The observer attaches a shape during frame 0's update phase; that
    // shape must already be in frame 0's output.
    let mut fx = fixture(1, None);
    let scene = fx.scene;
    let root = fx.manager.world().scene(scene).unwrap().graph().root();

    let mut batch = MutationBatch::new();
    batch.push(Mutation::Attach {
        scene,
        parent: root,
        template: NodeTemplate::Shape {
            appearance: Appearance::opaque(MaterialId(1)),
            local_bounds: AABB::from_center_extents(Vec3::zeros(), Vec3::new(1.0, 1.0, 1.0)),
        },
    });
    fx.manager.set_observer(Box::new(CountingObserver {
        updates: fx.updates.clone(),
        shutdowns: fx.shutdowns.clone(),
        batch_for_first_frame: Some(batch),
    }));

    fx.manager.render_once().unwrap();

    let frame = fx.recordings[0].last_frame().unwrap();
    assert_eq!(frame.layers[0].items.len(), 1);
    assert_eq!(frame.layers[0].items[0].material, MaterialId(1));
}

#[test]
fn every_pipeline_driven_once_per_frame() {
    let mut fx = fixture(3, None);

    fx.manager.render_once().unwrap();
    for recording in &fx.recordings {
        assert_eq!(recording.frame_count(), 1);
    }

    fx.manager.render_once().unwrap();
    for recording in &fx.recordings {
        assert_eq!(recording.frame_count(), 2);
    }
}

#[test]
fn render_once_ignores_enabled_state_and_leaves_it_alone() {
    let mut fx = fixture(1, None);

    assert!(!fx.manager.is_enabled());
    fx.manager.render_once().unwrap();
    assert_eq!(fx.recordings[0].frame_count(), 1);
    assert!(!fx.manager.is_enabled());

    fx.manager.set_enabled(true);
    fx.manager.render_once().unwrap();
    assert!(fx.manager.is_enabled());
}

#[test]
fn no_frames_or_callbacks_after_shutdown() {
    let mut fx = fixture(1, None);
    fx.manager.render_once().unwrap();

    fx.manager.shutdown();
    assert_eq!(fx.shutdowns.load(Ordering::SeqCst), 1);

    assert!(matches!(fx.manager.render_once(), Err(ManagerError::ShutDown)));
    assert!(matches!(fx.manager.tick(), Err(ManagerError::ShutDown)));
    assert_eq!(fx.updates.load(Ordering::SeqCst), 1);
    assert_eq!(fx.recordings[0].frame_count(), 1);

    // Shutdown stays idempotent.
    fx.manager.shutdown();
    assert_eq!(fx.shutdowns.load(Ordering::SeqCst), 1);
}

#[test]
fn run_loop_stops_on_handle_shutdown_from_another_thread() {
    let mut fx = fixture(1, None);
    fx.manager.set_minimum_frame_interval(Duration::from_millis(1));
    fx.manager.set_enabled(true);
    let handle = fx.manager.handle();
    let recordings = fx.recordings;

    let mut manager = fx.manager;
    let worker = std::thread::spawn(move || manager.run());

    // Let a few frames through, then cancel from this thread.
    while recordings[0].frame_count() < 3 {
        std::thread::yield_now();
    }
    handle.shutdown();

    let result = worker.join().expect("frame loop thread panicked");
    assert!(result.is_ok());
    let frames_at_shutdown = recordings[0].frame_count();
    std::thread::sleep(Duration::from_millis(10));
    assert_eq!(recordings[0].frame_count(), frames_at_shutdown);
}

#[test]
fn multi_thread_manager_honors_the_same_contract() {
    let updates = Arc::new(AtomicU64::new(0));
    let shutdowns = Arc::new(AtomicU64::new(0));

    let mut manager = MultiThreadRenderManager::new();
    manager.set_observer(Box::new(CountingObserver {
        updates: updates.clone(),
        shutdowns: shutdowns.clone(),
        batch_for_first_frame: None,
    }));

    // Two displays with one pipeline each, both showing the same scene.
    let scene = manager.world_mut().create_scene();
    {
        let s = manager.world_mut().scene_mut(scene).unwrap();
        let root = s.graph().root();
        s.add_active_viewpoint(root, Projection::default()).unwrap();
        s.graph_mut()
            .add_shape(
                root,
                Appearance::opaque(MaterialId(0)),
                AABB::from_center_extents(Vec3::new(0.0, 0.0, -5.0), Vec3::new(1.0, 1.0, 1.0)),
            )
            .unwrap();
    }

    let mut recordings = Vec::new();
    for _ in 0..2 {
        let device = HeadlessDevice::new();
        recordings.push(device.recording());
        let mut display = DisplayCollection::new();
        display.set_layers(vec![Layer::new(scene, Viewport::new(0, 0, 320, 240))]);
        display.add_pipeline(GraphicsPipeline::with_stages(
            CullStage::Frustum,
            SortStage::StateAndTransparencyDepth,
            Box::new(device),
        ));
        manager.add_display(display);
    }

    manager.render_once().unwrap();
    manager.render_once().unwrap();

    assert_eq!(updates.load(Ordering::SeqCst), 2);
    for recording in &recordings {
        assert_eq!(recording.frame_count(), 2);
        assert_eq!(recording.last_frame().unwrap().layers[0].items.len(), 1);
    }

    manager.shutdown();
    assert_eq!(shutdowns.load(Ordering::SeqCst), 1);
    assert!(matches!(manager.render_once(), Err(ManagerError::ShutDown)));
}
