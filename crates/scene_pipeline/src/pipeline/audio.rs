//! Audio pipeline: the aural counterpart of the graphics chain
//!
//! Sound emitters are culled by audibility around the listener (the scene's
//! active viewpoint), ordered by scheduling priority, and handed to an
//! audio output device. Deliberately compact; spatialization and mixing
//! belong to the device implementation.

use serde::{Deserialize, Serialize};

use crate::foundation::math::Vec3;
use crate::pipeline::device::DeviceError;
use crate::pipeline::PipelineError;
use crate::scene::graph::NodeId;
use crate::scene::layer::Layer;
use crate::scene::{Scene, SceneWorld};

/// One audible emitter resolved against the listener
#[derive(Debug, Clone, PartialEq)]
pub struct AudioItem {
    /// Source sound node
    pub node: NodeId,
    /// Emitter gain
    pub gain: f32,
    /// Scheduling priority; higher wins
    pub priority: u8,
    /// Distance from the listener in world units
    pub distance: f32,
}

/// Audibility filtering policy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AudioCullStage {
    /// Keep every active emitter
    None,
    /// Reject emitters farther from the listener than their audible radius
    #[default]
    Distance,
}

impl AudioCullStage {
    /// Run the stage for one scene against a listener position
    #[must_use]
    pub fn cull(&self, scene: &Scene, listener: Vec3) -> Vec<AudioItem> {
        scene
            .graph()
            .active_sounds()
            .into_iter()
            .filter_map(|sound| {
                let distance = (sound.position - listener).magnitude();
                match self {
                    Self::Distance if distance > sound.data.max_distance => None,
                    _ => Some(AudioItem {
                        node: sound.node,
                        gain: sound.data.gain,
                        priority: sound.data.priority,
                        distance,
                    }),
                }
            })
            .collect()
    }
}

/// Emitter ordering policy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AudioSortStage {
    /// Pass emitters through in cull order
    None,
    /// Highest priority first, nearest first within a priority
    #[default]
    Priority,
}

impl AudioSortStage {
    /// Reorder `items` in place according to the policy
    pub fn sort(&self, items: &mut [AudioItem]) {
        match self {
            Self::None => {}
            Self::Priority => {
                items.sort_by(|a, b| {
                    b.priority
                        .cmp(&a.priority)
                        .then(a.distance.total_cmp(&b.distance))
                });
            }
        }
    }
}

/// Sink for the ordered emitter list
pub trait AudioDevice: Send {
    /// Accept one frame's emitters, best (highest priority) first
    fn play(&mut self, items: &[AudioItem]) -> Result<(), DeviceError>;

    /// Release the audio context
    fn shutdown(&mut self) {}
}

/// Audio device that records what it was asked to play
#[derive(Debug, Default)]
pub struct HeadlessAudioDevice {
    frames: std::sync::Arc<std::sync::Mutex<Vec<Vec<AudioItem>>>>,
}

impl HeadlessAudioDevice {
    /// Create a recording audio device
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Shared handle onto the recorded frames
    #[must_use]
    pub fn frames(&self) -> std::sync::Arc<std::sync::Mutex<Vec<Vec<AudioItem>>>> {
        self.frames.clone()
    }
}

impl AudioDevice for HeadlessAudioDevice {
    fn play(&mut self, items: &[AudioItem]) -> Result<(), DeviceError> {
        if let Ok(mut frames) = self.frames.lock() {
            frames.push(items.to_vec());
        }
        Ok(())
    }
}

/// One audio cull stage, one audio sort stage, one audio device
pub struct AudioPipeline {
    culler: Option<AudioCullStage>,
    sorter: Option<AudioSortStage>,
    device: Option<Box<dyn AudioDevice>>,
}

impl Default for AudioPipeline {
    fn default() -> Self {
        Self::new()
    }
}

impl AudioPipeline {
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
        culler: AudioCullStage,
        sorter: AudioSortStage,
        device: Box<dyn AudioDevice>,
    ) -> Self {
        Self {
            culler: Some(culler),
            sorter: Some(sorter),
            device: Some(device),
        }
    }

    /// Set the cull stage
    pub fn set_culler(&mut self, culler: AudioCullStage) {
        self.culler = Some(culler);
    }

    /// Set the sort stage
    pub fn set_sorter(&mut self, sorter: AudioSortStage) {
        self.sorter = Some(sorter);
    }

    /// Set the output device
    pub fn set_audio_output_device(&mut self, device: Box<dyn AudioDevice>) {
        self.device = Some(device);
    }

    /// Drive the cull, sort, play sequence for one frame
    ///
    /// The listener is each layer scene's active viewpoint; scenes without
    /// one are skipped.
    pub fn render(&mut self, world: &SceneWorld, layers: &[Layer]) -> Result<(), PipelineError> {
        let culler = self.culler.ok_or(PipelineError::MissingCuller)?;
        let sorter = self.sorter.ok_or(PipelineError::MissingSorter)?;
        let device = self.device.as_mut().ok_or(PipelineError::MissingDevice)?;

        for layer in layers {
            let Some(scene) = world.scene(layer.scene) else {
                continue;
            };
            let Some(view) = scene.view_context(layer.viewport.aspect_ratio()) else {
                continue;
            };

            let mut items = culler.cull(scene, view.eye);
            sorter.sort(&mut items);
            device.play(&items)?;
        }

        Ok(())
    }

    /// Release the audio context
    pub fn shutdown(&mut self) {
        if let Some(device) = self.device.as_mut() {
            device.shutdown();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::math::Mat4;
    use crate::scene::camera::Projection;
    use crate::scene::graph::SoundData;

    fn scene_with_sounds() -> Scene {
        let mut scene = Scene::new();
        let root = scene.graph().root();
        scene
            .add_active_viewpoint(root, Projection::default())
            .unwrap();
        // Near, quiet emitter.
        scene
            .graph_mut()
            .add_sound(
                root,
                SoundData {
                    gain: 0.5,
                    priority: 1,
                    max_distance: 100.0,
                },
            )
            .unwrap();
        // Distant emitter outside its own audible radius.
        let far = scene
            .graph_mut()
            .add_transform(root, Mat4::new_translation(&Vec3::new(0.0, 0.0, -500.0)))
            .unwrap();
        scene
            .graph_mut()
            .add_sound(
                far,
                SoundData {
                    gain: 1.0,
                    priority: 9,
                    max_distance: 50.0,
                },
            )
            .unwrap();
        scene.graph_mut().flush();
        scene
    }

    #[test]
    fn test_distance_cull_drops_out_of_range_emitters() {
        let scene = scene_with_sounds();
        let items = AudioCullStage::Distance.cull(&scene, Vec3::zeros());
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].priority, 1);
    }

    #[test]
    fn test_null_audio_cull_keeps_everything_active() {
        let scene = scene_with_sounds();
        let items = AudioCullStage::None.cull(&scene, Vec3::zeros());
        assert_eq!(items.len(), 2);
    }

    #[test]
    fn test_priority_sort_orders_best_first() {
        let mut items = vec![
            AudioItem {
                node: NodeId::from(slotmap::KeyData::from_ffi(1)),
                gain: 1.0,
                priority: 2,
                distance: 10.0,
            },
            AudioItem {
                node: NodeId::from(slotmap::KeyData::from_ffi(2)),
                gain: 1.0,
                priority: 7,
                distance: 40.0,
            },
            AudioItem {
                node: NodeId::from(slotmap::KeyData::from_ffi(3)),
                gain: 1.0,
                priority: 7,
                distance: 5.0,
            },
        ];
        AudioSortStage::Priority.sort(&mut items);

        assert_eq!(items[0].priority, 7);
        assert!(items[0].distance < items[1].distance);
        assert_eq!(items[2].priority, 2);
    }

    #[test]
    fn test_audio_pipeline_plays_through_device() {
        let mut world = SceneWorld::new();
        let id = world.create_scene();
        *world.scene_mut(id).unwrap() = scene_with_sounds();

        let device = HeadlessAudioDevice::new();
        let frames = device.frames();
        let mut pipeline = AudioPipeline::with_stages(
            AudioCullStage::Distance,
            AudioSortStage::Priority,
            Box::new(device),
        );

        let layers = [Layer::new(id, crate::scene::layer::Viewport::new(0, 0, 100, 100))];
        pipeline.render(&world, &layers).unwrap();

        let frames = frames.lock().unwrap();
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].len(), 1);
    }

    #[test]
    fn test_audio_pipeline_missing_device_fails_fast() {
        let world = SceneWorld::new();
        let mut pipeline = AudioPipeline::new();
        pipeline.set_culler(AudioCullStage::Distance);
        pipeline.set_sorter(AudioSortStage::Priority);
        assert!(matches!(
            pipeline.render(&world, &[]),
            Err(PipelineError::MissingDevice)
        ));
    }
}
