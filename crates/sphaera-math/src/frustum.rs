//! View frustum extracted from a view-projection matrix, used to decide
//! whether an attached patch entity is on screen.

use glam::{DMat4, DVec3, DVec4};

use crate::Aabb;

const LEFT: usize = 0;
const RIGHT: usize = 1;
const BOTTOM: usize = 2;
const TOP: usize = 3;
const NEAR: usize = 4;
const FAR: usize = 5;

/// Six inward-facing planes: left, right, bottom, top, near, far.
#[derive(Clone, Debug)]
pub struct Frustum {
    planes: [DVec4; 6],
}

impl Frustum {
    /// Gribb-Hartmann plane extraction for a projection with a `[0, 1]`
    /// depth range (the wgpu convention, e.g. `DMat4::perspective_rh`).
    pub fn from_view_projection(vp: &DMat4) -> Self {
        let rows = [vp.row(0), vp.row(1), vp.row(2), vp.row(3)];

        let mut planes = [DVec4::ZERO; 6];
        planes[LEFT] = rows[3] + rows[0];
        planes[RIGHT] = rows[3] - rows[0];
        planes[BOTTOM] = rows[3] + rows[1];
        planes[TOP] = rows[3] - rows[1];
        planes[NEAR] = rows[2];
        planes[FAR] = rows[3] - rows[2];

        for plane in &mut planes {
            let len = plane.truncate().length();
            if len > 0.0 {
                *plane /= len;
            }
        }

        Self { planes }
    }

    /// Conservative p-vertex test: `false` only when the box is entirely
    /// behind at least one plane.
    pub fn intersects(&self, aabb: &Aabb) -> bool {
        self.planes.iter().all(|plane| {
            let n = plane.truncate();
            let p = DVec3::new(
                if n.x >= 0.0 { aabb.max.x } else { aabb.min.x },
                if n.y >= 0.0 { aabb.max.y } else { aabb.min.y },
                if n.z >= 0.0 { aabb.max.z } else { aabb.min.z },
            );
            n.dot(p) + plane.w >= 0.0
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn looking_down_neg_z() -> Frustum {
        let proj = DMat4::perspective_rh(std::f64::consts::FRAC_PI_2, 1.0, 0.1, 1000.0);
        let view = DMat4::look_at_rh(DVec3::ZERO, DVec3::NEG_Z, DVec3::Y);
        Frustum::from_view_projection(&(proj * view))
    }

    #[test]
    fn test_box_in_front_is_visible() {
        let f = looking_down_neg_z();
        let b = Aabb::new(DVec3::new(-1.0, -1.0, -12.0), DVec3::new(1.0, 1.0, -10.0));
        assert!(f.intersects(&b), "box straight ahead must be visible");
    }

    #[test]
    fn test_box_behind_is_culled() {
        let f = looking_down_neg_z();
        let b = Aabb::new(DVec3::new(-1.0, -1.0, 10.0), DVec3::new(1.0, 1.0, 12.0));
        assert!(!f.intersects(&b), "box behind the camera must be culled");
    }

    #[test]
    fn test_box_beyond_far_plane_is_culled() {
        let f = looking_down_neg_z();
        let b = Aabb::new(DVec3::new(-1.0, -1.0, -3000.0), DVec3::new(1.0, 1.0, -2000.0));
        assert!(!f.intersects(&b));
    }

    #[test]
    fn test_box_straddling_side_plane_is_visible() {
        let f = looking_down_neg_z();
        // 90 degree fov: x = -z is the right plane at z = -10.
        let b = Aabb::new(DVec3::new(9.0, -1.0, -11.0), DVec3::new(20.0, 1.0, -10.0));
        assert!(f.intersects(&b));
    }
}
