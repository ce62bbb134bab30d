use glam::DVec3;

/// Axis-aligned bounding box in planet space (f64).
///
/// Invariant: `min <= max` on every axis. [`Aabb::new`] sorts the corners.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Aabb {
    pub min: DVec3,
    pub max: DVec3,
}

impl Aabb {
    /// Create an AABB from two arbitrary corners.
    pub fn new(a: DVec3, b: DVec3) -> Self {
        Self {
            min: a.min(b),
            max: a.max(b),
        }
    }

    /// Smallest box containing every point. `None` for an empty iterator.
    pub fn from_points<I: IntoIterator<Item = DVec3>>(points: I) -> Option<Self> {
        let mut iter = points.into_iter();
        let first = iter.next()?;
        let (min, max) = iter.fold((first, first), |(lo, hi), p| (lo.min(p), hi.max(p)));
        Some(Self { min, max })
    }

    #[must_use]
    pub fn center(&self) -> DVec3 {
        (self.min + self.max) * 0.5
    }

    /// Half the size along each axis.
    #[must_use]
    pub fn half_size(&self) -> DVec3 {
        (self.max - self.min) * 0.5
    }

    /// Length of the box diagonal.
    #[must_use]
    pub fn diagonal(&self) -> f64 {
        (self.max - self.min).length()
    }

    pub fn contains_point(&self, p: DVec3) -> bool {
        p.cmpge(self.min).all() && p.cmple(self.max).all()
    }

    /// Squared distance from `p` to the closest point of the box.
    /// Zero when `p` is inside.
    #[must_use]
    pub fn squared_distance_to_point(&self, p: DVec3) -> f64 {
        let closest = p.clamp(self.min, self.max);
        (p - closest).length_squared()
    }

    /// The same box moved by `offset`.
    #[must_use]
    pub fn translated(&self, offset: DVec3) -> Self {
        Self {
            min: self.min + offset,
            max: self.max + offset,
        }
    }

    /// Smallest box enclosing both.
    #[must_use]
    pub fn union(&self, other: &Aabb) -> Aabb {
        Aabb {
            min: self.min.min(other.min),
            max: self.max.max(other.max),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_sorts_corners() {
        let b = Aabb::new(DVec3::new(1.0, -2.0, 3.0), DVec3::new(-1.0, 2.0, -3.0));
        assert_eq!(b.min, DVec3::new(-1.0, -2.0, -3.0));
        assert_eq!(b.max, DVec3::new(1.0, 2.0, 3.0));
    }

    #[test]
    fn test_distance_is_zero_inside() {
        let b = Aabb::new(DVec3::splat(-1.0), DVec3::splat(1.0));
        assert_eq!(b.squared_distance_to_point(DVec3::new(0.5, -0.5, 0.0)), 0.0);
    }

    #[test]
    fn test_distance_to_face_edge_and_corner() {
        let b = Aabb::new(DVec3::ZERO, DVec3::splat(1.0));
        assert_eq!(b.squared_distance_to_point(DVec3::new(3.0, 0.5, 0.5)), 4.0);
        assert_eq!(b.squared_distance_to_point(DVec3::new(2.0, 2.0, 0.5)), 2.0);
        assert_eq!(b.squared_distance_to_point(DVec3::new(-1.0, -1.0, -1.0)), 3.0);
    }

    #[test]
    fn test_from_points_and_diagonal() {
        let pts = [
            DVec3::new(0.0, 0.0, 0.0),
            DVec3::new(3.0, 0.0, 0.0),
            DVec3::new(0.0, 4.0, 0.0),
        ];
        let b = Aabb::from_points(pts).unwrap();
        assert_eq!(b.diagonal(), 5.0);
        assert_eq!(b.center(), DVec3::new(1.5, 2.0, 0.0));
        assert!(Aabb::from_points(std::iter::empty()).is_none());
    }

    #[test]
    fn test_translated_keeps_size() {
        let b = Aabb::new(DVec3::ZERO, DVec3::ONE).translated(DVec3::new(10.0, 0.0, 0.0));
        assert_eq!(b.half_size(), DVec3::splat(0.5));
        assert!(b.contains_point(DVec3::new(10.5, 0.5, 0.5)));
    }
}
