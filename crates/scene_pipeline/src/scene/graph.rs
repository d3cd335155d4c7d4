//! Retained-mode scene graph
//!
//! Nodes live in a slotmap arena and form a tree below a root group. A node
//! owns its children; parents are back references by key. Mutations mark
//! nodes dirty, and [`SceneGraph::flush`] propagates world matrices top-down
//! and re-fits world bounds bottom-up in a single pass. The render managers
//! call `flush` at the frame synchronization point, after the pending
//! mutation batch has been applied and before any cull work starts, so the
//! cull stage only ever sees settled world state.

use bitflags::bitflags;
use slotmap::SlotMap;
use thiserror::Error;

use crate::foundation::math::{Color, Mat4};
use crate::scene::bounds::AABB;
use crate::scene::camera::Projection;

slotmap::new_key_type! {
    /// Stable key for a scene graph node
    pub struct NodeId;
}

/// Opaque material identity used as the state sort key
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MaterialId(pub u32);

/// Render state carried by a shape node
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Appearance {
    /// Material identity; items sharing a material can be drawn back to back
    pub material: MaterialId,
    /// Whether the material blends, which forces back-to-front ordering
    pub transparent: bool,
}

impl Appearance {
    /// Opaque appearance with the given material
    #[must_use]
    pub const fn opaque(material: MaterialId) -> Self {
        Self {
            material,
            transparent: false,
        }
    }

    /// Transparent appearance with the given material
    #[must_use]
    pub const fn transparent(material: MaterialId) -> Self {
        Self {
            material,
            transparent: true,
        }
    }
}

/// Light parameters carried by a light node
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LightData {
    /// Light color
    pub color: Color,
    /// Linear intensity multiplier
    pub intensity: f32,
}

/// Sound emitter parameters carried by a sound node
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SoundData {
    /// Linear gain in `[0, 1]`; zero mutes the emitter
    pub gain: f32,
    /// Scheduling priority; higher wins when the device runs out of voices
    pub priority: u8,
    /// Audible radius around the emitter in world units
    pub max_distance: f32,
}

/// What a node contributes to the scene
#[derive(Debug, Clone)]
pub enum NodeKind {
    /// Pure grouping node
    Group,
    /// Grouping node that applies a local transform to its subtree
    Transform(Mat4),
    /// Leaf carrying renderable geometry state
    Shape(Appearance),
    /// Leaf light source
    Light(LightData),
    /// Leaf camera; a scene designates one viewpoint as active
    Viewpoint(Projection),
    /// Leaf sound emitter feeding the audio pipeline
    Sound(SoundData),
}

impl NodeKind {
    /// Whether this kind may have children attached
    #[must_use]
    pub const fn is_grouping(&self) -> bool {
        matches!(self, Self::Group | Self::Transform(_))
    }
}

bitflags! {
    /// Per-node state bits
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct NodeFlags: u8 {
        /// Node and its subtree take part in culling
        const VISIBLE = 1;
        /// World matrix is stale and must be recomputed on flush
        const DIRTY_TRANSFORM = 1 << 1;
        /// World bounds are stale and must be re-fit on flush
        const DIRTY_BOUNDS = 1 << 2;
    }
}

/// Scene graph errors
#[derive(Error, Debug, PartialEq, Eq)]
pub enum GraphError {
    /// Node key is stale or belongs to another graph
    #[error("node not found in graph")]
    NodeNotFound,

    /// Children can only hang off group or transform nodes
    #[error("node kind cannot take children")]
    NotAGroup,

    /// The operation applies to a different node kind
    #[error("operation does not apply to this node kind")]
    WrongKind,

    /// The root group cannot be detached
    #[error("cannot detach the root node")]
    DetachRoot,
}

#[derive(Debug)]
struct Node {
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    kind: NodeKind,
    /// Local-space geometry bounds; meaningful for shapes only
    local_bounds: AABB,
    world_matrix: Mat4,
    world_bounds: Option<AABB>,
    flags: NodeFlags,
}

/// A visible shape resolved to world space, as handed to the cull stage
#[derive(Debug, Clone)]
pub struct ShapeInstance {
    /// The shape node
    pub node: NodeId,
    /// Shape appearance at flush time
    pub appearance: Appearance,
    /// World matrix at flush time
    pub world_matrix: Mat4,
    /// World-space bounds at flush time
    pub world_bounds: AABB,
}

/// A light resolved to world space, as handed to the output device
#[derive(Debug, Clone)]
pub struct LightInstance {
    /// The light node
    pub node: NodeId,
    /// Light parameters at flush time
    pub data: LightData,
    /// Light position in world space
    pub position: crate::foundation::math::Vec3,
}

/// An audible sound emitter resolved to world space
#[derive(Debug, Clone)]
pub struct SoundInstance {
    /// The sound node
    pub node: NodeId,
    /// Emitter parameters at flush time
    pub data: SoundData,
    /// Emitter position in world space
    pub position: crate::foundation::math::Vec3,
}

/// Arena-backed node hierarchy with cached world state
#[derive(Debug)]
pub struct SceneGraph {
    nodes: SlotMap<NodeId, Node>,
    root: NodeId,
    dirty: bool,
}

impl Default for SceneGraph {
    fn default() -> Self {
        Self::new()
    }
}

impl SceneGraph {
    /// Create a graph containing only a root group
    #[must_use]
    pub fn new() -> Self {
        let mut nodes = SlotMap::with_key();
        let root = nodes.insert(Node {
            parent: None,
            children: Vec::new(),
            kind: NodeKind::Group,
            local_bounds: AABB::default(),
            world_matrix: Mat4::identity(),
            world_bounds: None,
            flags: NodeFlags::VISIBLE,
        });

        Self {
            nodes,
            root,
            dirty: false,
        }
    }

    /// The root group node
    #[must_use]
    pub fn root(&self) -> NodeId {
        self.root
    }

    /// Total node count including the root
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the given key refers to a live node in this graph
    #[must_use]
    pub fn contains(&self, node: NodeId) -> bool {
        self.nodes.contains_key(node)
    }

    fn insert_child(&mut self, parent: NodeId, kind: NodeKind, local_bounds: AABB) -> Result<NodeId, GraphError> {
        let parent_node = self.nodes.get(parent).ok_or(GraphError::NodeNotFound)?;
        if !parent_node.kind.is_grouping() {
            return Err(GraphError::NotAGroup);
        }

        let id = self.nodes.insert(Node {
            parent: Some(parent),
            children: Vec::new(),
            kind,
            local_bounds,
            world_matrix: Mat4::identity(),
            world_bounds: None,
            flags: NodeFlags::VISIBLE | NodeFlags::DIRTY_TRANSFORM | NodeFlags::DIRTY_BOUNDS,
        });
        self.nodes[parent].children.push(id);
        self.dirty = true;

        Ok(id)
    }

    /// Attach a new group under `parent`
    pub fn add_group(&mut self, parent: NodeId) -> Result<NodeId, GraphError> {
        self.insert_child(parent, NodeKind::Group, AABB::default())
    }

    /// Attach a new transform group under `parent`
    pub fn add_transform(&mut self, parent: NodeId, matrix: Mat4) -> Result<NodeId, GraphError> {
        self.insert_child(parent, NodeKind::Transform(matrix), AABB::default())
    }

    /// Attach a new shape under `parent` with local geometry bounds
    pub fn add_shape(
        &mut self,
        parent: NodeId,
        appearance: Appearance,
        local_bounds: AABB,
    ) -> Result<NodeId, GraphError> {
        self.insert_child(parent, NodeKind::Shape(appearance), local_bounds)
    }

    /// Attach a new light under `parent`
    pub fn add_light(&mut self, parent: NodeId, light: LightData) -> Result<NodeId, GraphError> {
        self.insert_child(parent, NodeKind::Light(light), AABB::default())
    }

    /// Attach a new viewpoint under `parent`
    pub fn add_viewpoint(
        &mut self,
        parent: NodeId,
        projection: Projection,
    ) -> Result<NodeId, GraphError> {
        self.insert_child(parent, NodeKind::Viewpoint(projection), AABB::default())
    }

    /// Attach a new sound emitter under `parent`
    pub fn add_sound(&mut self, parent: NodeId, sound: SoundData) -> Result<NodeId, GraphError> {
        self.insert_child(parent, NodeKind::Sound(sound), AABB::default())
    }

    /// Detach a node and destroy its entire subtree
    ///
    /// The keys of all removed nodes become stale. The root cannot be
    /// detached.
    pub fn detach(&mut self, node: NodeId) -> Result<(), GraphError> {
        if node == self.root {
            return Err(GraphError::DetachRoot);
        }
        let parent = self
            .nodes
            .get(node)
            .ok_or(GraphError::NodeNotFound)?
            .parent;

        if let Some(parent) = parent {
            self.nodes[parent].children.retain(|c| *c != node);
            // Parent's cached bounds no longer cover the removed subtree.
            self.nodes[parent].flags.insert(NodeFlags::DIRTY_BOUNDS);
        }

        let mut stack = vec![node];
        while let Some(id) = stack.pop() {
            if let Some(removed) = self.nodes.remove(id) {
                stack.extend(removed.children);
            }
        }
        self.dirty = true;

        Ok(())
    }

    /// Replace the local matrix of a transform group
    pub fn set_matrix(&mut self, node: NodeId, matrix: Mat4) -> Result<(), GraphError> {
        let n = self.nodes.get_mut(node).ok_or(GraphError::NodeNotFound)?;
        match &mut n.kind {
            NodeKind::Transform(m) => {
                *m = matrix;
                n.flags.insert(NodeFlags::DIRTY_TRANSFORM);
                self.dirty = true;
                Ok(())
            }
            _ => Err(GraphError::WrongKind),
        }
    }

    /// Replace the local geometry bounds of a shape
    pub fn set_local_bounds(&mut self, node: NodeId, bounds: AABB) -> Result<(), GraphError> {
        let n = self.nodes.get_mut(node).ok_or(GraphError::NodeNotFound)?;
        match n.kind {
            NodeKind::Shape(_) => {
                n.local_bounds = bounds;
                n.flags.insert(NodeFlags::DIRTY_BOUNDS);
                self.dirty = true;
                Ok(())
            }
            _ => Err(GraphError::WrongKind),
        }
    }

    /// Replace the appearance of a shape
    pub fn set_appearance(&mut self, node: NodeId, appearance: Appearance) -> Result<(), GraphError> {
        let n = self.nodes.get_mut(node).ok_or(GraphError::NodeNotFound)?;
        match &mut n.kind {
            NodeKind::Shape(a) => {
                *a = appearance;
                Ok(())
            }
            _ => Err(GraphError::WrongKind),
        }
    }

    /// Show or hide a node and its whole subtree
    pub fn set_visible(&mut self, node: NodeId, visible: bool) -> Result<(), GraphError> {
        let n = self.nodes.get_mut(node).ok_or(GraphError::NodeNotFound)?;
        n.flags.set(NodeFlags::VISIBLE, visible);
        Ok(())
    }

    /// Node kind accessor
    #[must_use]
    pub fn kind(&self, node: NodeId) -> Option<&NodeKind> {
        self.nodes.get(node).map(|n| &n.kind)
    }

    /// Parent accessor; `None` for the root or a stale key
    #[must_use]
    pub fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.nodes.get(node).and_then(|n| n.parent)
    }

    /// Child list accessor
    #[must_use]
    pub fn children(&self, node: NodeId) -> &[NodeId] {
        self.nodes
            .get(node)
            .map_or(&[], |n| n.children.as_slice())
    }

    /// Cached world matrix; valid after the last [`flush`](Self::flush)
    #[must_use]
    pub fn world_matrix(&self, node: NodeId) -> Option<&Mat4> {
        self.nodes.get(node).map(|n| &n.world_matrix)
    }

    /// Cached world bounds; `None` for nodes with no spatial extent
    #[must_use]
    pub fn world_bounds(&self, node: NodeId) -> Option<AABB> {
        self.nodes.get(node).and_then(|n| n.world_bounds)
    }

    /// Whether any mutation since the last flush is still pending
    #[must_use]
    pub fn needs_flush(&self) -> bool {
        self.dirty
    }

    /// Settle all cached world state
    ///
    /// Propagates world matrices top-down (only into subtrees whose
    /// transforms changed) and re-fits world bounds bottom-up. No-op when
    /// nothing is dirty.
    pub fn flush(&mut self) {
        if !self.dirty {
            return;
        }
        self.flush_node(self.root, Mat4::identity(), false);
        self.dirty = false;
    }

    fn flush_node(&mut self, id: NodeId, parent_world: Mat4, parent_moved: bool) -> Option<AABB> {
        let (recompute, world, refit_shape, children) = {
            let n = &self.nodes[id];
            let recompute = parent_moved || n.flags.contains(NodeFlags::DIRTY_TRANSFORM);
            let world = if recompute {
                match n.kind {
                    NodeKind::Transform(local) => parent_world * local,
                    _ => parent_world,
                }
            } else {
                n.world_matrix
            };
            let refit_shape = recompute || n.flags.contains(NodeFlags::DIRTY_BOUNDS);
            (recompute, world, refit_shape, n.children.clone())
        };

        let mut bounds: Option<AABB> = None;
        for child in children {
            if let Some(child_bounds) = self.flush_node(child, world, recompute) {
                bounds = Some(match bounds {
                    Some(b) => b.union(&child_bounds),
                    None => child_bounds,
                });
            }
        }

        let n = &mut self.nodes[id];
        if let NodeKind::Shape(_) = n.kind {
            if refit_shape || n.world_bounds.is_none() {
                bounds = Some(n.local_bounds.transformed(&world));
            } else {
                bounds = n.world_bounds;
            }
        }
        n.world_matrix = world;
        n.world_bounds = bounds;
        n.flags
            .remove(NodeFlags::DIRTY_TRANSFORM | NodeFlags::DIRTY_BOUNDS);

        bounds
    }

    /// Collect all shapes below visible nodes, resolved to world space
    ///
    /// Expects a prior [`flush`](Self::flush); stale cached state yields
    /// stale instances, never a panic.
    #[must_use]
    pub fn visible_shapes(&self) -> Vec<ShapeInstance> {
        let mut out = Vec::new();
        let mut stack = vec![self.root];
        while let Some(id) = stack.pop() {
            let Some(n) = self.nodes.get(id) else {
                continue;
            };
            if !n.flags.contains(NodeFlags::VISIBLE) {
                continue;
            }
            if let NodeKind::Shape(appearance) = n.kind {
                if let Some(world_bounds) = n.world_bounds {
                    out.push(ShapeInstance {
                        node: id,
                        appearance,
                        world_matrix: n.world_matrix,
                        world_bounds,
                    });
                }
            }
            stack.extend_from_slice(&n.children);
        }
        out
    }

    /// Collect all lights below visible nodes, resolved to world space
    #[must_use]
    pub fn visible_lights(&self) -> Vec<LightInstance> {
        let mut out = Vec::new();
        let mut stack = vec![self.root];
        while let Some(id) = stack.pop() {
            let Some(n) = self.nodes.get(id) else {
                continue;
            };
            if !n.flags.contains(NodeFlags::VISIBLE) {
                continue;
            }
            if let NodeKind::Light(data) = n.kind {
                let m = &n.world_matrix;
                out.push(LightInstance {
                    node: id,
                    data,
                    position: crate::foundation::math::Vec3::new(
                        m[(0, 3)],
                        m[(1, 3)],
                        m[(2, 3)],
                    ),
                });
            }
            stack.extend_from_slice(&n.children);
        }
        out
    }

    /// Collect all sound emitters below visible nodes with nonzero gain
    #[must_use]
    pub fn active_sounds(&self) -> Vec<SoundInstance> {
        let mut out = Vec::new();
        let mut stack = vec![self.root];
        while let Some(id) = stack.pop() {
            let Some(n) = self.nodes.get(id) else {
                continue;
            };
            if !n.flags.contains(NodeFlags::VISIBLE) {
                continue;
            }
            if let NodeKind::Sound(data) = n.kind {
                if data.gain > 0.0 {
                    let m = &n.world_matrix;
                    out.push(SoundInstance {
                        node: id,
                        data,
                        position: crate::foundation::math::Vec3::new(
                            m[(0, 3)],
                            m[(1, 3)],
                            m[(2, 3)],
                        ),
                    });
                }
            }
            stack.extend_from_slice(&n.children);
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::math::Vec3;
    use approx::assert_relative_eq;

    fn unit_bounds() -> AABB {
        AABB::from_center_extents(Vec3::zeros(), Vec3::new(1.0, 1.0, 1.0))
    }

    #[test]
    fn test_add_and_detach_subtree() {
        let mut graph = SceneGraph::new();
        let group = graph.add_group(graph.root()).unwrap();
        let shape = graph
            .add_shape(group, Appearance::opaque(MaterialId(0)), unit_bounds())
            .unwrap();
        assert_eq!(graph.node_count(), 3);

        graph.detach(group).unwrap();
        assert_eq!(graph.node_count(), 1);
        assert!(!graph.contains(group));
        assert!(!graph.contains(shape));
    }

    #[test]
    fn test_detach_root_refused() {
        let mut graph = SceneGraph::new();
        assert_eq!(graph.detach(graph.root()), Err(GraphError::DetachRoot));
    }

    #[test]
    fn test_shapes_cannot_take_children() {
        let mut graph = SceneGraph::new();
        let shape = graph
            .add_shape(graph.root(), Appearance::opaque(MaterialId(0)), unit_bounds())
            .unwrap();
        assert_eq!(graph.add_group(shape), Err(GraphError::NotAGroup));
    }

    #[test]
    fn test_set_matrix_rejects_non_transform() {
        let mut graph = SceneGraph::new();
        let group = graph.add_group(graph.root()).unwrap();
        assert_eq!(
            graph.set_matrix(group, Mat4::identity()),
            Err(GraphError::WrongKind)
        );
    }

    #[test]
    fn test_flush_propagates_nested_transforms() {
        let mut graph = SceneGraph::new();
        let outer = graph
            .add_transform(graph.root(), Mat4::new_translation(&Vec3::new(1.0, 0.0, 0.0)))
            .unwrap();
        let inner = graph
            .add_transform(outer, Mat4::new_translation(&Vec3::new(0.0, 2.0, 0.0)))
            .unwrap();
        let shape = graph
            .add_shape(inner, Appearance::opaque(MaterialId(0)), unit_bounds())
            .unwrap();

        graph.flush();

        let bounds = graph.world_bounds(shape).unwrap();
        assert_relative_eq!(bounds.center().x, 1.0);
        assert_relative_eq!(bounds.center().y, 2.0);
    }

    #[test]
    fn test_group_bounds_union_children() {
        let mut graph = SceneGraph::new();
        let left = graph
            .add_transform(graph.root(), Mat4::new_translation(&Vec3::new(-5.0, 0.0, 0.0)))
            .unwrap();
        let right = graph
            .add_transform(graph.root(), Mat4::new_translation(&Vec3::new(5.0, 0.0, 0.0)))
            .unwrap();
        graph
            .add_shape(left, Appearance::opaque(MaterialId(0)), unit_bounds())
            .unwrap();
        graph
            .add_shape(right, Appearance::opaque(MaterialId(1)), unit_bounds())
            .unwrap();

        graph.flush();

        let root_bounds = graph.world_bounds(graph.root()).unwrap();
        assert_relative_eq!(root_bounds.min.x, -6.0);
        assert_relative_eq!(root_bounds.max.x, 6.0);
    }

    #[test]
    fn test_set_matrix_marks_and_flush_settles() {
        let mut graph = SceneGraph::new();
        let xform = graph.add_transform(graph.root(), Mat4::identity()).unwrap();
        let shape = graph
            .add_shape(xform, Appearance::opaque(MaterialId(0)), unit_bounds())
            .unwrap();
        graph.flush();
        assert!(!graph.needs_flush());

        graph
            .set_matrix(xform, Mat4::new_translation(&Vec3::new(0.0, 0.0, -3.0)))
            .unwrap();
        assert!(graph.needs_flush());
        graph.flush();

        let bounds = graph.world_bounds(shape).unwrap();
        assert_relative_eq!(bounds.center().z, -3.0);
    }

    #[test]
    fn test_hidden_subtree_excluded_from_visible_shapes() {
        let mut graph = SceneGraph::new();
        let group = graph.add_group(graph.root()).unwrap();
        graph
            .add_shape(group, Appearance::opaque(MaterialId(0)), unit_bounds())
            .unwrap();
        graph
            .add_shape(graph.root(), Appearance::opaque(MaterialId(1)), unit_bounds())
            .unwrap();
        graph.flush();
        assert_eq!(graph.visible_shapes().len(), 2);

        graph.set_visible(group, false).unwrap();
        assert_eq!(graph.visible_shapes().len(), 1);
    }

    #[test]
    fn test_visible_lights_resolved_to_world() {
        let mut graph = SceneGraph::new();
        let mount = graph
            .add_transform(graph.root(), Mat4::new_translation(&Vec3::new(0.0, 4.0, 0.0)))
            .unwrap();
        graph
            .add_light(
                mount,
                LightData {
                    color: Color::WHITE,
                    intensity: 2.0,
                },
            )
            .unwrap();
        let hidden = graph.add_group(graph.root()).unwrap();
        graph
            .add_light(
                hidden,
                LightData {
                    color: Color::WHITE,
                    intensity: 1.0,
                },
            )
            .unwrap();
        graph.set_visible(hidden, false).unwrap();
        graph.flush();

        let lights = graph.visible_lights();
        assert_eq!(lights.len(), 1);
        assert_relative_eq!(lights[0].position.y, 4.0);
        assert_relative_eq!(lights[0].data.intensity, 2.0);
    }

    #[test]
    fn test_active_sounds_skip_muted() {
        let mut graph = SceneGraph::new();
        graph
            .add_sound(
                graph.root(),
                SoundData {
                    gain: 0.8,
                    priority: 1,
                    max_distance: 50.0,
                },
            )
            .unwrap();
        graph
            .add_sound(
                graph.root(),
                SoundData {
                    gain: 0.0,
                    priority: 5,
                    max_distance: 50.0,
                },
            )
            .unwrap();
        graph.flush();

        assert_eq!(graph.active_sounds().len(), 1);
    }
}
