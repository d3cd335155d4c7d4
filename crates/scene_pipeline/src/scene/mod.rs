//! Scene graph, cameras, and the scene world
//!
//! A [`Scene`] pairs one node hierarchy with an active viewpoint plus
//! optional background and fog. The [`SceneWorld`] is the arena of scenes a
//! render manager owns; layers reference scenes by [`SceneId`] so several
//! layers (or displays) can show the same scene.

pub mod bounds;
pub mod camera;
pub mod graph;
pub mod layer;

use slotmap::SlotMap;

use crate::foundation::math::Color;
use crate::scene::camera::{Projection, ViewContext};
use crate::scene::graph::{GraphError, NodeId, NodeKind, SceneGraph};

pub use bounds::AABB;
pub use camera::Frustum;
pub use graph::{Appearance, LightData, LightInstance, MaterialId, SoundData};
pub use layer::{Layer, Viewport};

slotmap::new_key_type! {
    /// Stable key for a scene inside a [`SceneWorld`]
    pub struct SceneId;
}

/// Linear fog parameters
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Fog {
    /// Fog color blended toward with distance
    pub color: Color,
    /// Distance where fog starts
    pub start: f32,
    /// Distance of full fog saturation
    pub end: f32,
}

/// One renderable world: a node hierarchy plus its active viewpoint
#[derive(Debug)]
pub struct Scene {
    graph: SceneGraph,
    active_viewpoint: Option<NodeId>,
    background: Option<Color>,
    fog: Option<Fog>,
}

impl Default for Scene {
    fn default() -> Self {
        Self::new()
    }
}

impl Scene {
    /// Create an empty scene with a root group and no viewpoint
    #[must_use]
    pub fn new() -> Self {
        Self {
            graph: SceneGraph::new(),
            active_viewpoint: None,
            background: None,
            fog: None,
        }
    }

    /// The scene's node hierarchy
    #[must_use]
    pub fn graph(&self) -> &SceneGraph {
        &self.graph
    }

    /// Mutable access to the node hierarchy
    ///
    /// While a manager drives this scene, mutations must flow through the
    /// per-frame mutation batch instead; direct access is for setup code
    /// that runs before the manager is enabled.
    pub fn graph_mut(&mut self) -> &mut SceneGraph {
        &mut self.graph
    }

    /// Designate the active viewpoint node
    ///
    /// The node must be a live viewpoint in this scene's graph.
    pub fn set_active_viewpoint(&mut self, node: NodeId) -> Result<(), GraphError> {
        match self.graph.kind(node) {
            Some(NodeKind::Viewpoint(_)) => {
                self.active_viewpoint = Some(node);
                Ok(())
            }
            Some(_) => Err(GraphError::WrongKind),
            None => Err(GraphError::NodeNotFound),
        }
    }

    /// The active viewpoint, if one is designated and still alive
    #[must_use]
    pub fn active_viewpoint(&self) -> Option<NodeId> {
        self.active_viewpoint
            .filter(|n| self.graph.contains(*n))
    }

    /// Background clear color; `None` lets the device default apply
    #[must_use]
    pub fn background(&self) -> Option<Color> {
        self.background
    }

    /// Set or clear the background color
    pub fn set_background(&mut self, color: Option<Color>) {
        self.background = color;
    }

    /// Fog parameters, if any
    #[must_use]
    pub fn fog(&self) -> Option<Fog> {
        self.fog
    }

    /// Set or clear fog
    pub fn set_fog(&mut self, fog: Option<Fog>) {
        self.fog = fog;
    }

    /// Resolve the active viewpoint into a view context for a viewport
    ///
    /// Returns `None` when no live viewpoint is designated. Uses the world
    /// matrix cached by the last graph flush.
    #[must_use]
    pub fn view_context(&self, aspect: f32) -> Option<ViewContext> {
        let node = self.active_viewpoint()?;
        let projection = match self.graph.kind(node)? {
            NodeKind::Viewpoint(p) => *p,
            _ => return None,
        };
        let world = self.graph.world_matrix(node)?;
        Some(ViewContext::new(world, &projection, aspect))
    }

    /// Convenience: add a viewpoint under `parent` and make it active
    pub fn add_active_viewpoint(
        &mut self,
        parent: NodeId,
        projection: Projection,
    ) -> Result<NodeId, GraphError> {
        let node = self.graph.add_viewpoint(parent, projection)?;
        self.active_viewpoint = Some(node);
        Ok(node)
    }
}

/// Arena of scenes owned by a render manager
#[derive(Debug, Default)]
pub struct SceneWorld {
    scenes: SlotMap<SceneId, Scene>,
}

impl SceneWorld {
    /// Create an empty world
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a new empty scene, returning its key
    pub fn create_scene(&mut self) -> SceneId {
        self.scenes.insert(Scene::new())
    }

    /// Scene accessor
    #[must_use]
    pub fn scene(&self, id: SceneId) -> Option<&Scene> {
        self.scenes.get(id)
    }

    /// Mutable scene accessor
    pub fn scene_mut(&mut self, id: SceneId) -> Option<&mut Scene> {
        self.scenes.get_mut(id)
    }

    /// Remove a scene; layers still referencing it render nothing
    pub fn remove_scene(&mut self, id: SceneId) -> Option<Scene> {
        self.scenes.remove(id)
    }

    /// Number of live scenes
    #[must_use]
    pub fn scene_count(&self) -> usize {
        self.scenes.len()
    }

    /// Flush every scene graph that has pending mutations
    pub fn flush_all(&mut self) {
        for scene in self.scenes.values_mut() {
            scene.graph.flush();
        }
    }
}
