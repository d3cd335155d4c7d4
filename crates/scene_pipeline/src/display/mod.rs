//! Display collections: pipelines sharing one frame boundary
//!
//! A collection aggregates the pipelines that must present together, e.g. a
//! main view plus a mirrored secondary view, or a graphics and audio pair
//! for one window. Driving the collection for frame N runs every registered
//! pipeline exactly once against the current scene world.
//!
//! Device failures inside one pipeline are reported and counted but do not
//! stop the collection's other pipelines; a lost surface must not take the
//! whole frame loop down. Missing-stage errors do abort the frame, since
//! they are composition bugs rather than runtime conditions.

use crate::pipeline::graphics::PassStats;
use crate::pipeline::{AudioPipeline, GraphicsPipeline, PipelineError};
use crate::scene::layer::Layer;
use crate::scene::SceneWorld;

/// Counters from driving one display collection for one frame
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DisplayStats {
    /// Graphics pipelines that completed their frame
    pub pipelines_completed: usize,
    /// Pipelines whose device failed this frame
    pub device_errors: usize,
    /// Items drawn across all completed pipelines
    pub items_drawn: usize,
}

/// Ordered layers plus the pipelines that render them each frame
#[derive(Default)]
pub struct DisplayCollection {
    layers: Vec<Layer>,
    pipelines: Vec<GraphicsPipeline>,
    audio_pipelines: Vec<AudioPipeline>,
}

impl DisplayCollection {
    /// Create an empty collection
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the layer array; paint order is array order
    pub fn set_layers(&mut self, layers: Vec<Layer>) {
        self.layers = layers;
    }

    /// The current layer array
    #[must_use]
    pub fn layers(&self) -> &[Layer] {
        &self.layers
    }

    /// Register a graphics pipeline; registration is append-only
    pub fn add_pipeline(&mut self, pipeline: GraphicsPipeline) {
        self.pipelines.push(pipeline);
    }

    /// Register an audio pipeline; registration is append-only
    pub fn add_audio_pipeline(&mut self, pipeline: AudioPipeline) {
        self.audio_pipelines.push(pipeline);
    }

    /// Number of registered graphics pipelines
    #[must_use]
    pub fn pipeline_count(&self) -> usize {
        self.pipelines.len()
    }

    /// Drive every registered pipeline once for this frame
    ///
    /// Returns `Err` only for composition errors (a pipeline with a missing
    /// stage); device failures are logged and tallied in the stats.
    pub fn render(&mut self, world: &SceneWorld) -> Result<DisplayStats, PipelineError> {
        let mut stats = DisplayStats::default();

        for pipeline in &mut self.pipelines {
            match pipeline.render(world, &self.layers) {
                Ok(PassStats { items_drawn, .. }) => {
                    stats.pipelines_completed += 1;
                    stats.items_drawn += items_drawn;
                }
                Err(PipelineError::Device(e)) => {
                    log::error!("graphics device failed, frame dropped for this pipeline: {e}");
                    stats.device_errors += 1;
                }
                Err(e) => return Err(e),
            }
        }

        for pipeline in &mut self.audio_pipelines {
            match pipeline.render(world, &self.layers) {
                Ok(()) => {}
                Err(PipelineError::Device(e)) => {
                    log::error!("audio device failed for this frame: {e}");
                    stats.device_errors += 1;
                }
                Err(e) => return Err(e),
            }
        }

        Ok(stats)
    }

    /// Release every pipeline's device
    pub fn shutdown(&mut self) {
        for pipeline in &mut self.pipelines {
            pipeline.shutdown();
        }
        for pipeline in &mut self.audio_pipelines {
            pipeline.shutdown();
        }
    }
}
