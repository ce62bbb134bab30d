//! Horizon occlusion for patches on a spherical planet.
//!
//! Seen from the camera, the planet hides a cone whose apex is the camera
//! and whose surface touches the planet along the horizon circle. Anything
//! inside that cone and further away than the plane of the horizon circle
//! is behind the planet. Patches are tested by their bounding sphere.

use glam::DVec3;
use sphaera_math::Aabb;

#[derive(Clone, Debug)]
pub struct HorizonCuller {
    camera: DVec3,
    /// Unit vector from the camera towards the planet centre.
    planet_dir: DVec3,
    /// Half-angle of the occlusion cone.
    cone_angle: f64,
    /// Distance from the camera to the horizon plane along `planet_dir`.
    plane_distance: f64,
    inside: bool,
}

impl HorizonCuller {
    pub fn new(camera: DVec3, planet_center: DVec3, radius: f64) -> Self {
        let to_planet = planet_center - camera;
        let d2 = to_planet.length_squared();
        let r2 = radius * radius;
        if d2 <= r2 {
            return Self {
                camera,
                planet_dir: DVec3::ZERO,
                cone_angle: 0.0,
                plane_distance: 0.0,
                inside: true,
            };
        }
        let d = d2.sqrt();
        let tangent = (d2 - r2).sqrt();
        let cos_cone = tangent / d;
        Self {
            camera,
            planet_dir: to_planet / d,
            cone_angle: cos_cone.clamp(-1.0, 1.0).acos(),
            plane_distance: tangent * cos_cone,
            inside: false,
        }
    }

    /// Whether a sphere is entirely behind the planet.
    pub fn is_sphere_occluded(&self, center: DVec3, radius: f64) -> bool {
        if self.inside {
            return false;
        }
        let rel = center - self.camera;
        let dist2 = rel.length_squared();
        if dist2 <= radius * radius {
            return false;
        }
        let dist = dist2.sqrt();
        let behind_plane = rel.dot(self.planet_dir) - radius > self.plane_distance;
        if !behind_plane {
            return false;
        }
        let angular_radius = ((dist2 - radius * radius).sqrt() / dist).clamp(-1.0, 1.0).acos();
        let angle = self.planet_dir.angle_between(rel / dist);
        angle + angular_radius < self.cone_angle
    }

    /// Whether a patch bounding box is entirely behind the planet.
    pub fn is_occluded(&self, bounds: &Aabb) -> bool {
        self.is_sphere_occluded(bounds.center(), bounds.half_size().length())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const R: f64 = 100.0;

    fn culler() -> HorizonCuller {
        HorizonCuller::new(DVec3::new(0.0, 0.0, 2.0 * R), DVec3::ZERO, R)
    }

    #[test]
    fn test_far_side_is_occluded() {
        assert!(culler().is_sphere_occluded(DVec3::new(0.0, 0.0, -R), 1.0));
    }

    #[test]
    fn test_near_side_is_visible() {
        assert!(!culler().is_sphere_occluded(DVec3::new(0.0, 0.0, R), 1.0));
    }

    #[test]
    fn test_point_beyond_horizon_circle_is_occluded() {
        // From twice the radius the horizon is 60 degrees around the planet.
        assert!(culler().is_sphere_occluded(DVec3::new(R, 0.0, 0.0), 0.5));
        let visible = DVec3::new((50f64).to_radians().sin(), 0.0, (50f64).to_radians().cos()) * R;
        assert!(!culler().is_sphere_occluded(visible, 0.5));
    }

    #[test]
    fn test_large_patch_straddling_horizon_is_visible() {
        assert!(!culler().is_sphere_occluded(DVec3::new(R, 0.0, 0.0), 40.0));
    }

    #[test]
    fn test_camera_inside_planet_sees_everything() {
        let c = HorizonCuller::new(DVec3::new(0.0, 0.0, 0.5 * R), DVec3::ZERO, R);
        assert!(!c.is_sphere_occluded(DVec3::new(0.0, 0.0, -R), 1.0));
    }

    #[test]
    fn test_aabb_uses_bounding_sphere() {
        let c = culler();
        let hidden = Aabb::new(DVec3::new(-1.0, -1.0, -R - 1.0), DVec3::new(1.0, 1.0, -R + 1.0));
        assert!(c.is_occluded(&hidden));
        let huge = Aabb::new(DVec3::splat(-R), DVec3::splat(R));
        assert!(!c.is_occluded(&huge));
    }
}
