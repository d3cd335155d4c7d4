//! Viewpoints, projections, and frustum extraction
//!
//! A viewpoint node designates the active camera for a scene. Its world
//! matrix (camera-local to world) comes from graph flushing; the view matrix
//! is its inverse. The cull stage extracts a [`Frustum`] from the combined
//! view-projection matrix using the Gribb-Hartmann method.

use serde::{Deserialize, Serialize};

use crate::foundation::math::{Mat4, Vec3, Vec4};
use crate::scene::bounds::AABB;

/// Projection parameters carried by a viewpoint node
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Projection {
    /// Perspective projection; aspect ratio is supplied per-viewport
    Perspective {
        /// Vertical field of view in radians
        fov_y: f32,
        /// Near clip distance
        near: f32,
        /// Far clip distance
        far: f32,
    },
    /// Orthographic projection with explicit clip volume
    Orthographic {
        /// Left clip plane
        left: f32,
        /// Right clip plane
        right: f32,
        /// Bottom clip plane
        bottom: f32,
        /// Top clip plane
        top: f32,
        /// Near clip distance
        near: f32,
        /// Far clip distance
        far: f32,
    },
}

impl Default for Projection {
    fn default() -> Self {
        Self::Perspective {
            fov_y: std::f32::consts::FRAC_PI_4,
            near: 0.1,
            far: 1000.0,
        }
    }
}

impl Projection {
    /// Build the projection matrix for a viewport with the given aspect ratio
    #[must_use]
    pub fn matrix(&self, aspect: f32) -> Mat4 {
        match *self {
            Self::Perspective { fov_y, near, far } => {
                nalgebra::Perspective3::new(aspect, fov_y, near, far).to_homogeneous()
            }
            Self::Orthographic {
                left,
                right,
                bottom,
                top,
                near,
                far,
            } => nalgebra::Orthographic3::new(left, right, bottom, top, near, far)
                .to_homogeneous(),
        }
    }
}

/// Plane defined by normal and distance from origin
#[derive(Debug, Clone, Copy)]
pub struct Plane {
    /// Normal vector (normalized)
    pub normal: Vec3,
    /// Distance from origin along the normal
    pub distance: f32,
}

impl Plane {
    /// Create a plane from the raw coefficients `(a, b, c, d)` of
    /// `ax + by + cz + d = 0`, normalizing them
    #[must_use]
    pub fn from_coefficients(coeffs: Vec4) -> Self {
        let normal = Vec3::new(coeffs.x, coeffs.y, coeffs.z);
        let length = normal.magnitude();
        if length > f32::EPSILON {
            Self {
                normal: normal / length,
                distance: coeffs.w / length,
            }
        } else {
            // Degenerate plane rejects nothing.
            Self {
                normal: Vec3::zeros(),
                distance: 0.0,
            }
        }
    }

    /// Calculate signed distance from plane to point
    #[must_use]
    pub fn distance_to_point(&self, point: Vec3) -> f32 {
        self.normal.dot(&point) + self.distance
    }
}

/// Frustum for visibility culling
#[derive(Debug, Clone)]
pub struct Frustum {
    /// Six planes defining the frustum (left, right, bottom, top, near, far)
    pub planes: [Plane; 6],
}

impl Frustum {
    /// Extract frustum planes from a view-projection matrix
    ///
    /// Gribb-Hartmann extraction: each clip plane is a sum or difference of
    /// the matrix's fourth row with one of the other rows.
    #[must_use]
    pub fn from_matrix(vp: &Mat4) -> Self {
        let row = |i: usize| Vec4::new(vp[(i, 0)], vp[(i, 1)], vp[(i, 2)], vp[(i, 3)]);
        let r0 = row(0);
        let r1 = row(1);
        let r2 = row(2);
        let r3 = row(3);

        Self {
            planes: [
                Plane::from_coefficients(r3 + r0), // left
                Plane::from_coefficients(r3 - r0), // right
                Plane::from_coefficients(r3 + r1), // bottom
                Plane::from_coefficients(r3 - r1), // top
                Plane::from_coefficients(r3 + r2), // near
                Plane::from_coefficients(r3 - r2), // far
            ],
        }
    }

    /// Check if an AABB is inside or intersects the frustum
    #[must_use]
    pub fn intersects_aabb(&self, aabb: &AABB) -> bool {
        // Positive-vertex test: if the AABB corner farthest along the plane
        // normal is behind the plane, the whole box is outside.
        for plane in &self.planes {
            let mut p = aabb.min;
            if plane.normal.x >= 0.0 {
                p.x = aabb.max.x;
            }
            if plane.normal.y >= 0.0 {
                p.y = aabb.max.y;
            }
            if plane.normal.z >= 0.0 {
                p.z = aabb.max.z;
            }

            if plane.distance_to_point(p) < 0.0 {
                return false;
            }
        }

        true
    }
}

/// Resolved view state for one layer's cull pass
#[derive(Debug, Clone)]
pub struct ViewContext {
    /// World-to-view matrix
    pub view: Mat4,
    /// Camera position in world space
    pub eye: Vec3,
    /// Frustum extracted from the view-projection matrix
    pub frustum: Frustum,
}

impl ViewContext {
    /// Build a view context from a viewpoint's world matrix and projection
    #[must_use]
    pub fn new(viewpoint_world: &Mat4, projection: &Projection, aspect: f32) -> Self {
        let view = viewpoint_world
            .try_inverse()
            .unwrap_or_else(Mat4::identity);
        let eye = Vec3::new(
            viewpoint_world[(0, 3)],
            viewpoint_world[(1, 3)],
            viewpoint_world[(2, 3)],
        );
        let vp = projection.matrix(aspect) * view;

        Self {
            view,
            eye,
            frustum: Frustum::from_matrix(&vp),
        }
    }

    /// View-space depth of a world-space point (positive in front of the eye)
    #[must_use]
    pub fn depth_of(&self, world_point: Vec3) -> f32 {
        let v = self.view * Vec4::new(world_point.x, world_point.y, world_point.z, 1.0);
        -v.z
    }
}
