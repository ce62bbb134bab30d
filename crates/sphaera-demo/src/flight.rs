use glam::DVec3;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use sphaera_config::CameraConfig;

/// A straight descent towards one point of the surface, slowing down
/// exponentially as it approaches.
#[derive(Clone, Debug)]
pub struct Descent {
    target: DVec3,
    base_radius: f64,
    start_altitude: f64,
    min_altitude: f64,
    approach_speed: f64,
}

impl Descent {
    pub fn new(target: DVec3, base_radius: f64, camera: &CameraConfig) -> Self {
        Self {
            target: target.normalize(),
            base_radius,
            start_altitude: camera.start_altitude,
            min_altitude: camera.min_altitude,
            approach_speed: camera.approach_speed.clamp(0.0, 1.0),
        }
    }

    /// Uniformly distributed landing point for `seed`.
    pub fn random_target(seed: u32) -> DVec3 {
        let mut rng = ChaCha8Rng::seed_from_u64(u64::from(seed));
        let z: f64 = rng.random_range(-1.0..=1.0);
        let phi: f64 = rng.random_range(0.0..std::f64::consts::TAU);
        let r = (1.0 - z * z).sqrt();
        DVec3::new(r * phi.cos(), r * phi.sin(), z)
    }

    pub fn altitude(&self, frame: u32) -> f64 {
        let remaining = (1.0 - self.approach_speed).powf(f64::from(frame));
        (self.start_altitude * remaining).max(self.min_altitude)
    }

    pub fn position(&self, frame: u32) -> DVec3 {
        self.target * (self.base_radius + self.altitude(frame))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn camera() -> CameraConfig {
        CameraConfig {
            start_altitude: 1000.0,
            min_altitude: 5.0,
            approach_speed: 0.1,
            frames: 100,
        }
    }

    #[test]
    fn test_descent_is_monotonic_and_clamped() {
        let d = Descent::new(DVec3::Z, 100.0, &camera());
        assert_eq!(d.altitude(0), 1000.0);
        let mut last = f64::INFINITY;
        for frame in 0..200 {
            let a = d.altitude(frame);
            assert!(a <= last, "altitude rose at frame {frame}");
            assert!(a >= 5.0);
            last = a;
        }
        assert_eq!(d.altitude(199), 5.0);
        assert!((d.position(0) - DVec3::new(0.0, 0.0, 1100.0)).length() < 1e-9);
    }

    #[test]
    fn test_random_target_is_unit_and_seeded() {
        let a = Descent::random_target(3);
        assert!((a.length() - 1.0).abs() < 1e-12);
        assert_eq!(a, Descent::random_target(3));
        assert_ne!(a, Descent::random_target(4));
    }
}
