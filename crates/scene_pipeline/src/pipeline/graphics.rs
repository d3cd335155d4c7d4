//! Graphics pipeline: cull stage + sort stage + output device
//!
//! Driving a pipeline renders every layer of its display collection in
//! paint order: cull the layer's scene against its active viewpoint, order
//! the result, hand it to the device. Layers whose scene or viewpoint has
//! gone away are skipped with a warning; that is content state, not a
//! configuration bug, and must not take the frame loop down.

use crate::pipeline::cull::CullStage;
use crate::pipeline::device::{GraphicsDevice, LayerEnvironment, SurfaceInfo};
use crate::pipeline::sort::SortStage;
use crate::pipeline::PipelineError;
use crate::scene::layer::Layer;
use crate::scene::SceneWorld;

/// Counters from one pipeline drive
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PassStats {
    /// Layers actually drawn
    pub layers_drawn: usize,
    /// Layers skipped for missing scene or viewpoint
    pub layers_skipped: usize,
    /// Items handed to the device across all layers
    pub items_drawn: usize,
}

/// One cull stage, one sort stage, one output device
///
/// All three slots must be set before the pipeline is driven; the first
/// drive with a missing slot fails fast.
pub struct GraphicsPipeline {
    culler: Option<CullStage>,
    sorter: Option<SortStage>,
    device: Option<Box<dyn GraphicsDevice>>,
}

impl Default for GraphicsPipeline {
    fn default() -> Self {
        Self::new()
    }
}

impl GraphicsPipeline {
    /// Create a pipeline with no stages set
    #[must_use]
    pub fn new() -> Self {
        Self {
            culler: None,
            sorter: None,
            device: None,
        }
    }

    /// Create a fully composed pipeline
    #[must_use]
    pub fn with_stages(
        culler: CullStage,
        sorter: SortStage,
        device: Box<dyn GraphicsDevice>,
    ) -> Self {
        Self {
            culler: Some(culler),
            sorter: Some(sorter),
            device: Some(device),
        }
    }

    /// Set the cull stage
    pub fn set_culler(&mut self, culler: CullStage) {
        self.culler = Some(culler);
    }

    /// Set the sort stage
    pub fn set_sorter(&mut self, sorter: SortStage) {
        self.sorter = Some(sorter);
    }

    /// Set the output device
    pub fn set_graphics_output_device(&mut self, device: Box<dyn GraphicsDevice>) {
        self.device = Some(device);
    }

    /// Surface info of the attached device, if one is set
    #[must_use]
    pub fn surface_info(&self) -> Option<&SurfaceInfo> {
        self.device.as_deref().map(GraphicsDevice::surface_info)
    }

    /// Drive the full cull, sort, output sequence for one frame
    pub fn render(&mut self, world: &SceneWorld, layers: &[Layer]) -> Result<PassStats, PipelineError> {
        let culler = self.culler.ok_or(PipelineError::MissingCuller)?;
        let sorter = self.sorter.ok_or(PipelineError::MissingSorter)?;
        let device = self.device.as_mut().ok_or(PipelineError::MissingDevice)?;

        // The first layer's scene background, when present, overrides the
        // device clear color for the whole frame.
        let clear = layers
            .first()
            .and_then(|l| world.scene(l.scene))
            .and_then(crate::scene::Scene::background);

        let mut stats = PassStats::default();
        device.begin_frame(clear)?;

        for layer in layers {
            let Some(scene) = world.scene(layer.scene) else {
                log::warn!("layer references a removed scene, skipping");
                stats.layers_skipped += 1;
                continue;
            };
            let Some(view) = scene.view_context(layer.viewport.aspect_ratio()) else {
                log::warn!("layer's scene has no active viewpoint, skipping");
                stats.layers_skipped += 1;
                continue;
            };

            let mut items = culler.cull(scene, &view);
            sorter.sort(&mut items);

            let mut lights = scene.graph().visible_lights();
            lights.truncate(device.surface_info().max_lights as usize);
            let environment = LayerEnvironment {
                lights,
                fog: scene.fog(),
            };
            device.draw_layer(layer.viewport, &environment, &items)?;

            stats.layers_drawn += 1;
            stats.items_drawn += items.len();
        }

        device.end_frame()?;
        Ok(stats)
    }

    /// Release the device surface
    pub fn shutdown(&mut self) {
        if let Some(device) = self.device.as_mut() {
            device.shutdown();
        }
    }
}
