//! Staged render pipelines
//!
//! A graphics pipeline composes exactly one cull stage, one sort stage, and
//! one output device; an audio pipeline composes the analogous audio chain.
//! All three slots must be filled before a pipeline is driven; a missing
//! stage fails fast on the first drive. Stage variants are closed sum types
//! selected at construction time.

pub mod audio;
pub mod cull;
pub mod device;
pub mod graphics;
pub mod item;
pub mod sort;

use thiserror::Error;

pub use audio::{AudioCullStage, AudioDevice, AudioItem, AudioPipeline, AudioSortStage, HeadlessAudioDevice};
pub use cull::CullStage;
pub use device::{
    DeviceError, FrameCapture, GraphicsDevice, HeadlessDevice, HeadlessRecording, LayerCapture,
    LayerEnvironment, LogDevice, SurfaceInfo,
};
pub use graphics::{GraphicsPipeline, PassStats};
pub use item::RenderItem;
pub use sort::SortStage;

/// Pipeline composition and drive errors
#[derive(Error, Debug)]
pub enum PipelineError {
    /// Pipeline driven before a cull stage was set
    #[error("pipeline has no cull stage")]
    MissingCuller,

    /// Pipeline driven before a sort stage was set
    #[error("pipeline has no sort stage")]
    MissingSorter,

    /// Pipeline driven before an output device was set
    #[error("pipeline has no output device")]
    MissingDevice,

    /// The output device failed mid-frame
    #[error("output device error: {0}")]
    Device(#[from] DeviceError),
}
