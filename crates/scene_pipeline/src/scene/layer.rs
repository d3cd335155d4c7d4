//! Layers map scenes onto regions of an output device
//!
//! A display collection holds an ordered layer array; paint order is array
//! order, so later layers composite over earlier ones.

use crate::scene::SceneId;

/// Rectangular region of an output device, in pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Viewport {
    /// Left edge
    pub x: u32,
    /// Bottom edge
    pub y: u32,
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
}

impl Viewport {
    /// Create a viewport from origin and size
    #[must_use]
    pub const fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Width-over-height aspect ratio; `1.0` for degenerate sizes
    #[must_use]
    pub fn aspect_ratio(&self) -> f32 {
        if self.height == 0 || self.width == 0 {
            1.0
        } else {
            self.width as f32 / self.height as f32
        }
    }
}

/// One scene rendered into one viewport region
#[derive(Debug, Clone, Copy)]
pub struct Layer {
    /// The scene to render
    pub scene: SceneId,
    /// Where on the device it lands
    pub viewport: Viewport,
}

impl Layer {
    /// Create a layer binding a scene to a viewport
    #[must_use]
    pub const fn new(scene: SceneId, viewport: Viewport) -> Self {
        Self { scene, viewport }
    }
}
