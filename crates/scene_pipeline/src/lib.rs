//! # Scene Pipeline
//!
//! A retained-mode scene graph with staged render pipelines: cull stage →
//! sort stage → output device, composed into display collections and driven
//! by single- or multi-threaded render managers.
//!
//! ## Architecture
//!
//! - **Scene graph**: arena-backed node hierarchy (groups, transform
//!   groups, shapes, lights, viewpoints, sound emitters) with cached world
//!   matrices and bounds.
//! - **Cull stage**: filters the flushed graph down to potentially visible
//!   items for the active viewpoint.
//! - **Sort stage**: orders the culled list for blending correctness and
//!   state-change efficiency.
//! - **Output device**: owns the drawing surface and consumes the ordered
//!   list; headless and logging devices ship in-crate, real surfaces live
//!   behind the same trait downstream.
//! - **Render manager**: paces frames, runs the two-phase update protocol
//!   (observer update, then mutation apply at the sync point), and drives
//!   every registered display collection once per frame.
//!
//! ## Quick Start
//!
//! ```rust
//! use scene_pipeline::prelude::*;
//!
//! let mut manager = SingleThreadRenderManager::new();
//!
//! let scene = manager.world_mut().create_scene();
//! {
//!     let s = manager.world_mut().scene_mut(scene).unwrap();
//!     let root = s.graph().root();
//!     s.add_active_viewpoint(root, Projection::default()).unwrap();
//!     s.graph_mut()
//!         .add_shape(
//!             root,
//!             Appearance::opaque(MaterialId(0)),
//!             AABB::from_center_extents(Vec3::new(0.0, 0.0, -5.0), Vec3::new(1.0, 1.0, 1.0)),
//!         )
//!         .unwrap();
//! }
//!
//! let mut display = DisplayCollection::new();
//! display.set_layers(vec![Layer::new(scene, Viewport::new(0, 0, 800, 600))]);
//! display.add_pipeline(GraphicsPipeline::with_stages(
//!     CullStage::Frustum,
//!     SortStage::StateAndTransparencyDepth,
//!     Box::new(HeadlessDevice::new()),
//! ));
//! manager.add_display(display);
//!
//! manager.render_once().unwrap();
//! manager.shutdown();
//! ```

#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions, clippy::similar_names, clippy::too_many_arguments)]

pub mod config;
pub mod display;
pub mod foundation;
pub mod manager;
pub mod pipeline;
pub mod scene;

pub use config::{Config, ConfigError, RenderConfig};
pub use display::DisplayCollection;
pub use manager::multi::MultiThreadRenderManager;
pub use manager::single::SingleThreadRenderManager;
pub use manager::{FrameObserver, ManagerError, ManagerHandle};

/// Common imports for pipeline users
pub mod prelude {
    pub use crate::{
        config::{Config, ConfigError, DeviceKind, RenderConfig},
        display::DisplayCollection,
        foundation::math::{Color, Mat4, Vec3},
        foundation::time::{FramePacer, FrameTimer},
        manager::{
            multi::MultiThreadRenderManager, single::SingleThreadRenderManager, FrameContext,
            FrameObserver, FrameOutcome, FrameStats, ManagerError, ManagerHandle, Mutation,
            MutationBatch, NodeTemplate,
        },
        pipeline::{
            AudioCullStage, AudioDevice, AudioPipeline, AudioSortStage, CullStage, DeviceError,
            GraphicsDevice, GraphicsPipeline, HeadlessAudioDevice, HeadlessDevice,
            HeadlessRecording, LayerEnvironment, LogDevice, PipelineError, RenderItem, SortStage,
            SurfaceInfo,
        },
        scene::{
            camera::Projection,
            graph::{Appearance, LightData, LightInstance, MaterialId, NodeId, SceneGraph, SoundData},
            Fog, Layer, Scene, SceneId, SceneWorld, Viewport, AABB,
        },
    };
}
