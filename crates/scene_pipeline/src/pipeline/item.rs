//! The unit of work flowing between pipeline stages

use crate::foundation::math::Mat4;
use crate::scene::graph::{MaterialId, NodeId};

/// One culled, transform-resolved renderable
///
/// Produced by the cull stage, reordered by the sort stage, consumed by the
/// output device.
#[derive(Debug, Clone)]
pub struct RenderItem {
    /// Source shape node
    pub node: NodeId,
    /// Material state key
    pub material: MaterialId,
    /// Whether the item blends
    pub transparent: bool,
    /// World matrix resolved at cull time
    pub world_matrix: Mat4,
    /// View-space depth of the item's bounds center
    pub depth: f32,
}
