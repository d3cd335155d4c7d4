//! Output devices: the surface-owning end of a pipeline
//!
//! The device owns the drawing surface and consumes the sorted item list.
//! Real GPU surfaces live behind this trait in downstream crates; this
//! module ships a headless device that records frames for inspection and a
//! logging device that traces draw traffic.
//!
//! Surface capabilities are available from construction via
//! [`GraphicsDevice::surface_info`]; device failures during a frame are
//! returned to the display collection, which reports them without tearing
//! down the frame loop.

use std::sync::{Arc, Mutex};

use thiserror::Error;

use crate::foundation::math::Color;
use crate::pipeline::item::RenderItem;
use crate::scene::graph::LightInstance;
use crate::scene::layer::Viewport;
use crate::scene::Fog;

/// Capabilities and identity of a drawing surface
#[derive(Debug, Clone)]
pub struct SurfaceInfo {
    /// Renderer implementation name
    pub renderer: String,
    /// Driver or library vendor
    pub vendor: String,
    /// Driver or library version string
    pub version: String,
    /// Maximum simultaneous lights
    pub max_lights: u32,
    /// Maximum texture edge length in texels
    pub max_texture_size: u32,
}

/// Output device errors
#[derive(Error, Debug, Clone)]
pub enum DeviceError {
    /// The drawing surface is gone (window destroyed, context lost)
    #[error("drawing surface lost: {0}")]
    SurfaceLost(String),

    /// The device was shut down and cannot accept frames
    #[error("device already shut down")]
    ShutDown,
}

/// Per-layer lighting and atmosphere, resolved at draw time
///
/// The pipeline truncates the light list to the device's
/// [`SurfaceInfo::max_lights`] before handing it over.
#[derive(Debug, Clone, Default)]
pub struct LayerEnvironment {
    /// Visible lights in world space
    pub lights: Vec<LightInstance>,
    /// Scene fog, if any
    pub fog: Option<Fog>,
}

/// Surface-owning sink for sorted item lists
///
/// `Send` so the multi-threaded manager can drive each display's devices on
/// its own thread.
pub trait GraphicsDevice: Send {
    /// Surface identity and limits, fixed at construction
    fn surface_info(&self) -> &SurfaceInfo;

    /// Default clear color used when a scene has no background
    fn set_clear_color(&mut self, color: Color);

    /// Start a frame; `clear` overrides the device clear color when set
    fn begin_frame(&mut self, clear: Option<Color>) -> Result<(), DeviceError>;

    /// Draw one layer's ordered items into a viewport region
    fn draw_layer(
        &mut self,
        viewport: Viewport,
        environment: &LayerEnvironment,
        items: &[RenderItem],
    ) -> Result<(), DeviceError>;

    /// Finish and present the frame
    fn end_frame(&mut self) -> Result<(), DeviceError>;

    /// Release the surface; subsequent frames must fail with
    /// [`DeviceError::ShutDown`]
    fn shutdown(&mut self) {}
}

/// One layer's draw traffic as recorded by the headless device
#[derive(Debug, Clone)]
pub struct LayerCapture {
    /// Target viewport
    pub viewport: Viewport,
    /// Lighting and fog in effect for the layer
    pub environment: LayerEnvironment,
    /// Items in the exact order the device received them
    pub items: Vec<RenderItem>,
}

/// One full frame as recorded by the headless device
#[derive(Debug, Clone)]
pub struct FrameCapture {
    /// Clear color in effect for the frame
    pub clear_color: Color,
    /// Layers in paint order
    pub layers: Vec<LayerCapture>,
}

#[derive(Debug, Default)]
struct RecordingInner {
    frames: Vec<FrameCapture>,
    fail_next_begin: bool,
}

/// Shared handle onto a [`HeadlessDevice`]'s recorded frames
///
/// The device moves into the pipeline when registered; tests and tools keep
/// this handle to inspect what was drawn.
#[derive(Debug, Clone, Default)]
pub struct HeadlessRecording(Arc<Mutex<RecordingInner>>);

impl HeadlessRecording {
    /// Number of completed frames
    #[must_use]
    pub fn frame_count(&self) -> usize {
        self.0.lock().map(|r| r.frames.len()).unwrap_or(0)
    }

    /// Clone of the most recently completed frame
    #[must_use]
    pub fn last_frame(&self) -> Option<FrameCapture> {
        self.0.lock().ok().and_then(|r| r.frames.last().cloned())
    }

    /// Clones of all completed frames
    #[must_use]
    pub fn frames(&self) -> Vec<FrameCapture> {
        self.0.lock().map(|r| r.frames.clone()).unwrap_or_default()
    }

    /// Make the next `begin_frame` fail with a lost surface
    ///
    /// Lets tests exercise the managers' device-failure policy.
    pub fn inject_begin_failure(&self) {
        if let Ok(mut r) = self.0.lock() {
            r.fail_next_begin = true;
        }
    }
}

/// Device that records frames instead of drawing them
///
/// The headless analog of an offscreen surface: frames complete with full
/// ordering information but never touch a window system.
pub struct HeadlessDevice {
    info: SurfaceInfo,
    clear_color: Color,
    recording: HeadlessRecording,
    current: Option<FrameCapture>,
    shut_down: bool,
}

impl Default for HeadlessDevice {
    fn default() -> Self {
        Self::new()
    }
}

impl HeadlessDevice {
    /// Create a headless device with default capabilities
    #[must_use]
    pub fn new() -> Self {
        Self {
            info: SurfaceInfo {
                renderer: "headless".to_string(),
                vendor: "scene_pipeline".to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
                max_lights: 8,
                max_texture_size: 16384,
            },
            clear_color: Color::BLACK,
            recording: HeadlessRecording::default(),
            current: None,
            shut_down: false,
        }
    }

    /// Handle for inspecting recorded frames after the device moves into a
    /// pipeline
    #[must_use]
    pub fn recording(&self) -> HeadlessRecording {
        self.recording.clone()
    }
}

impl GraphicsDevice for HeadlessDevice {
    fn surface_info(&self) -> &SurfaceInfo {
        &self.info
    }

    fn set_clear_color(&mut self, color: Color) {
        self.clear_color = color;
    }

    fn begin_frame(&mut self, clear: Option<Color>) -> Result<(), DeviceError> {
        if self.shut_down {
            return Err(DeviceError::ShutDown);
        }
        if let Ok(mut r) = self.recording.0.lock() {
            if r.fail_next_begin {
                r.fail_next_begin = false;
                return Err(DeviceError::SurfaceLost("injected failure".to_string()));
            }
        }
        self.current = Some(FrameCapture {
            clear_color: clear.unwrap_or(self.clear_color),
            layers: Vec::new(),
        });
        Ok(())
    }

    fn draw_layer(
        &mut self,
        viewport: Viewport,
        environment: &LayerEnvironment,
        items: &[RenderItem],
    ) -> Result<(), DeviceError> {
        let frame = self
            .current
            .as_mut()
            .ok_or_else(|| DeviceError::SurfaceLost("draw outside begin/end".to_string()))?;
        frame.layers.push(LayerCapture {
            viewport,
            environment: environment.clone(),
            items: items.to_vec(),
        });
        Ok(())
    }

    fn end_frame(&mut self) -> Result<(), DeviceError> {
        let frame = self
            .current
            .take()
            .ok_or_else(|| DeviceError::SurfaceLost("end without begin".to_string()))?;
        if let Ok(mut r) = self.recording.0.lock() {
            r.frames.push(frame);
        }
        Ok(())
    }

    fn shutdown(&mut self) {
        self.shut_down = true;
        self.current = None;
    }
}

/// Device that traces draw traffic through the `log` crate
///
/// Useful while bringing up scene content without a real surface; frame
/// structure lands at `debug` level, per-item traffic at `trace`.
pub struct LogDevice {
    info: SurfaceInfo,
    clear_color: Color,
    frame: u64,
    shut_down: bool,
}

impl Default for LogDevice {
    fn default() -> Self {
        Self::new()
    }
}

impl LogDevice {
    /// Create a logging device
    #[must_use]
    pub fn new() -> Self {
        Self {
            info: SurfaceInfo {
                renderer: "log".to_string(),
                vendor: "scene_pipeline".to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
                max_lights: 8,
                max_texture_size: 16384,
            },
            clear_color: Color::BLACK,
            frame: 0,
            shut_down: false,
        }
    }
}

impl GraphicsDevice for LogDevice {
    fn surface_info(&self) -> &SurfaceInfo {
        &self.info
    }

    fn set_clear_color(&mut self, color: Color) {
        self.clear_color = color;
    }

    fn begin_frame(&mut self, clear: Option<Color>) -> Result<(), DeviceError> {
        if self.shut_down {
            return Err(DeviceError::ShutDown);
        }
        self.frame += 1;
        log::debug!(
            "frame {} begin, clear {:?}",
            self.frame,
            clear.unwrap_or(self.clear_color)
        );
        Ok(())
    }

    fn draw_layer(
        &mut self,
        viewport: Viewport,
        environment: &LayerEnvironment,
        items: &[RenderItem],
    ) -> Result<(), DeviceError> {
        log::debug!(
            "frame {} layer {}x{}+{}+{}: {} items, {} lights, fog {}",
            self.frame,
            viewport.width,
            viewport.height,
            viewport.x,
            viewport.y,
            items.len(),
            environment.lights.len(),
            if environment.fog.is_some() { "on" } else { "off" }
        );
        for item in items {
            log::trace!(
                "  node {:?} material {:?} transparent {} depth {:.3}",
                item.node,
                item.material,
                item.transparent,
                item.depth
            );
        }
        Ok(())
    }

    fn end_frame(&mut self) -> Result<(), DeviceError> {
        log::debug!("frame {} end", self.frame);
        Ok(())
    }

    fn shutdown(&mut self) {
        log::debug!("log device shut down after {} frames", self.frame);
        self.shut_down = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::math::{Mat4, Vec3};
    use crate::scene::graph::{LightData, MaterialId, NodeId};
    use slotmap::KeyData;

    fn item() -> RenderItem {
        RenderItem {
            node: NodeId::from(KeyData::from_ffi(1)),
            material: MaterialId(0),
            transparent: false,
            world_matrix: Mat4::identity(),
            depth: 1.0,
        }
    }

    fn lit_environment() -> LayerEnvironment {
        LayerEnvironment {
            lights: vec![LightInstance {
                node: NodeId::from(KeyData::from_ffi(2)),
                data: LightData {
                    color: Color::WHITE,
                    intensity: 1.0,
                },
                position: Vec3::zeros(),
            }],
            fog: Some(Fog {
                color: Color::BLACK,
                start: 10.0,
                end: 100.0,
            }),
        }
    }

    #[test]
    fn test_headless_records_frames() {
        let mut device = HeadlessDevice::new();
        let recording = device.recording();

        device.begin_frame(Some(Color::rgb(1.0, 0.0, 0.0))).unwrap();
        device
            .draw_layer(Viewport::new(0, 0, 100, 100), &lit_environment(), &[item(), item()])
            .unwrap();
        device.end_frame().unwrap();

        assert_eq!(recording.frame_count(), 1);
        let frame = recording.last_frame().unwrap();
        assert_eq!(frame.clear_color, Color::rgb(1.0, 0.0, 0.0));
        assert_eq!(frame.layers.len(), 1);
        assert_eq!(frame.layers[0].items.len(), 2);
        assert_eq!(frame.layers[0].environment.lights.len(), 1);
        assert!(frame.layers[0].environment.fog.is_some());
    }

    #[test]
    fn test_headless_uses_device_clear_when_frame_has_none() {
        let mut device = HeadlessDevice::new();
        let recording = device.recording();
        device.set_clear_color(Color::WHITE);

        device.begin_frame(None).unwrap();
        device.end_frame().unwrap();

        assert_eq!(recording.last_frame().unwrap().clear_color, Color::WHITE);
    }

    #[test]
    fn test_headless_refuses_frames_after_shutdown() {
        let mut device = HeadlessDevice::new();
        device.shutdown();
        assert!(matches!(
            device.begin_frame(None),
            Err(DeviceError::ShutDown)
        ));
    }

    #[test]
    fn test_injected_failure_fails_one_frame() {
        let mut device = HeadlessDevice::new();
        let recording = device.recording();
        recording.inject_begin_failure();

        assert!(matches!(
            device.begin_frame(None),
            Err(DeviceError::SurfaceLost(_))
        ));
        // The failure is one-shot.
        assert!(device.begin_frame(None).is_ok());
    }
}
