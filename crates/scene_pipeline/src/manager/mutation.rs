//! Pending scene mutations and their application
//!
//! Application code never touches the scene world while a frame may be in
//! flight. Instead, the frame observer's update phase returns a
//! [`MutationBatch`], and the manager applies it at the frame's
//! synchronization point, after the observer returns and before any cull
//! work starts. A mutation whose target has vanished (detached earlier in
//! the same batch, or in a previous frame) is a logged no-op, not an error:
//! content churn must not take the frame loop down.

use crate::foundation::math::{Color, Mat4};
use crate::scene::bounds::AABB;
use crate::scene::camera::Projection;
use crate::scene::graph::{Appearance, LightData, NodeId, SoundData};
use crate::scene::{SceneId, SceneWorld};

/// Blueprint for a node created by an [`Mutation::Attach`]
#[derive(Debug, Clone)]
pub enum NodeTemplate {
    /// A grouping node
    Group,
    /// A transform group with its local matrix
    Transform(Mat4),
    /// A shape with appearance and local geometry bounds
    Shape {
        /// Render state of the new shape
        appearance: Appearance,
        /// Local-space geometry bounds
        local_bounds: AABB,
    },
    /// A light source
    Light(LightData),
    /// A viewpoint
    Viewpoint(Projection),
    /// A sound emitter
    Sound(SoundData),
}

/// One pending scene change
#[derive(Debug, Clone)]
pub enum Mutation {
    /// Replace a transform group's local matrix
    SetMatrix {
        /// Target scene
        scene: SceneId,
        /// Target transform node
        node: NodeId,
        /// New local matrix
        matrix: Mat4,
    },
    /// Replace a shape's local geometry bounds
    SetLocalBounds {
        /// Target scene
        scene: SceneId,
        /// Target shape node
        node: NodeId,
        /// New local bounds
        bounds: AABB,
    },
    /// Replace a shape's appearance
    SetAppearance {
        /// Target scene
        scene: SceneId,
        /// Target shape node
        node: NodeId,
        /// New appearance
        appearance: Appearance,
    },
    /// Show or hide a subtree
    SetVisible {
        /// Target scene
        scene: SceneId,
        /// Subtree root
        node: NodeId,
        /// New visibility
        visible: bool,
    },
    /// Create a node under a parent
    Attach {
        /// Target scene
        scene: SceneId,
        /// Parent group or transform
        parent: NodeId,
        /// What to create
        template: NodeTemplate,
    },
    /// Detach a node and destroy its subtree
    Detach {
        /// Target scene
        scene: SceneId,
        /// Subtree root
        node: NodeId,
    },
    /// Switch the scene's active viewpoint
    SetActiveViewpoint {
        /// Target scene
        scene: SceneId,
        /// Viewpoint node
        node: NodeId,
    },
    /// Set or clear the scene background color
    SetBackground {
        /// Target scene
        scene: SceneId,
        /// New background; `None` clears it
        color: Option<Color>,
    },
}

/// The update phase's output: mutations applied at the next sync point
#[derive(Debug, Clone, Default)]
pub struct MutationBatch {
    mutations: Vec<Mutation>,
}

impl MutationBatch {
    /// Empty batch
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue an arbitrary mutation
    pub fn push(&mut self, mutation: Mutation) -> &mut Self {
        self.mutations.push(mutation);
        self
    }

    /// Queue a transform matrix change
    pub fn set_matrix(&mut self, scene: SceneId, node: NodeId, matrix: Mat4) -> &mut Self {
        self.push(Mutation::SetMatrix {
            scene,
            node,
            matrix,
        })
    }

    /// Queue a shape bounds change
    pub fn set_local_bounds(&mut self, scene: SceneId, node: NodeId, bounds: AABB) -> &mut Self {
        self.push(Mutation::SetLocalBounds {
            scene,
            node,
            bounds,
        })
    }

    /// Queue an appearance change
    pub fn set_appearance(
        &mut self,
        scene: SceneId,
        node: NodeId,
        appearance: Appearance,
    ) -> &mut Self {
        self.push(Mutation::SetAppearance {
            scene,
            node,
            appearance,
        })
    }

    /// Queue a visibility change
    pub fn set_visible(&mut self, scene: SceneId, node: NodeId, visible: bool) -> &mut Self {
        self.push(Mutation::SetVisible {
            scene,
            node,
            visible,
        })
    }

    /// Queue a subtree detach
    pub fn detach(&mut self, scene: SceneId, node: NodeId) -> &mut Self {
        self.push(Mutation::Detach { scene, node })
    }

    /// Number of queued mutations
    #[must_use]
    pub fn len(&self) -> usize {
        self.mutations.len()
    }

    /// Whether the batch is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.mutations.is_empty()
    }
}

/// Apply a batch to the world; stale targets are skipped with a debug log
pub(crate) fn apply_batch(world: &mut SceneWorld, batch: MutationBatch) {
    for mutation in batch.mutations {
        apply_one(world, mutation);
    }
}

fn apply_one(world: &mut SceneWorld, mutation: Mutation) {
    let scene_id = match &mutation {
        Mutation::SetMatrix { scene, .. }
        | Mutation::SetLocalBounds { scene, .. }
        | Mutation::SetAppearance { scene, .. }
        | Mutation::SetVisible { scene, .. }
        | Mutation::Attach { scene, .. }
        | Mutation::Detach { scene, .. }
        | Mutation::SetActiveViewpoint { scene, .. }
        | Mutation::SetBackground { scene, .. } => *scene,
    };
    let Some(scene) = world.scene_mut(scene_id) else {
        log::debug!("mutation targets a removed scene, skipped");
        return;
    };

    let result = match mutation {
        Mutation::SetMatrix { node, matrix, .. } => scene.graph_mut().set_matrix(node, matrix),
        Mutation::SetLocalBounds { node, bounds, .. } => {
            scene.graph_mut().set_local_bounds(node, bounds)
        }
        Mutation::SetAppearance {
            node, appearance, ..
        } => scene.graph_mut().set_appearance(node, appearance),
        Mutation::SetVisible { node, visible, .. } => scene.graph_mut().set_visible(node, visible),
        Mutation::Attach {
            parent, template, ..
        } => {
            let graph = scene.graph_mut();
            match template {
                NodeTemplate::Group => graph.add_group(parent).map(|_| ()),
                NodeTemplate::Transform(m) => graph.add_transform(parent, m).map(|_| ()),
                NodeTemplate::Shape {
                    appearance,
                    local_bounds,
                } => graph.add_shape(parent, appearance, local_bounds).map(|_| ()),
                NodeTemplate::Light(l) => graph.add_light(parent, l).map(|_| ()),
                NodeTemplate::Viewpoint(p) => graph.add_viewpoint(parent, p).map(|_| ()),
                NodeTemplate::Sound(s) => graph.add_sound(parent, s).map(|_| ()),
            }
        }
        Mutation::Detach { node, .. } => scene.graph_mut().detach(node),
        Mutation::SetActiveViewpoint { node, .. } => scene.set_active_viewpoint(node),
        Mutation::SetBackground { color, .. } => {
            scene.set_background(color);
            Ok(())
        }
    };

    if let Err(e) = result {
        log::debug!("mutation skipped: {e}");
    }
}
