//! Cull stage: scene graph in, potentially-visible item list out
//!
//! The cull stage walks the flushed scene graph and the active viewpoint and
//! produces an unordered, transform-resolved item list. Variants form a
//! closed set chosen at pipeline construction.

use serde::{Deserialize, Serialize};

use crate::pipeline::item::RenderItem;
use crate::scene::camera::ViewContext;
use crate::scene::Scene;

/// Visibility filtering policy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CullStage {
    /// Collect every visible shape without spatial rejection
    None,
    /// Reject shapes whose world bounds fall outside the view frustum
    #[default]
    Frustum,
}

impl CullStage {
    /// Run the stage for one layer
    ///
    /// Expects the scene graph to be flushed. Output order is traversal
    /// order and carries no rendering guarantees; ordering is the sort
    /// stage's job.
    #[must_use]
    pub fn cull(&self, scene: &Scene, view: &ViewContext) -> Vec<RenderItem> {
        scene
            .graph()
            .visible_shapes()
            .into_iter()
            .filter(|shape| match self {
                Self::None => true,
                Self::Frustum => view.frustum.intersects_aabb(&shape.world_bounds),
            })
            .map(|shape| RenderItem {
                node: shape.node,
                material: shape.appearance.material,
                transparent: shape.appearance.transparent,
                world_matrix: shape.world_matrix,
                depth: view.depth_of(shape.world_bounds.center()),
            })
            .collect()
    }
}
