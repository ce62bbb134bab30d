//! Quadrilateral patch footprints on the unit cube.

use glam::DVec3;

use crate::{CubeFace, Quadrant};

/// Corners that do not lie on a common cube face.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum FootprintError {
    #[error("footprint corners {start} and {end} do not share a pinned cube axis")]
    NotOnFace { start: DVec3, end: DVec3 },
    #[error("footprint corners {start} and {end} are degenerate")]
    Degenerate { start: DVec3, end: DVec3 },
}

/// A rectangle in face coordinates `(u, v)`, running from `start` (grid
/// `0, 0`) to `end` (grid `quads, quads`).
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Footprint {
    face: CubeFace,
    u0: f64,
    v0: f64,
    u1: f64,
    v1: f64,
}

impl Footprint {
    /// The whole face.
    #[must_use]
    pub fn root(face: CubeFace) -> Self {
        Self {
            face,
            u0: -1.0,
            v0: -1.0,
            u1: 1.0,
            v1: 1.0,
        }
    }

    /// Build a footprint from its two cube-space corners. Exactly one axis
    /// must be pinned to `+1` or `-1` in both corners.
    pub fn from_corners(start: DVec3, end: DVec3) -> Result<Self, FootprintError> {
        let pinned: Vec<CubeFace> = CubeFace::ALL
            .into_iter()
            .filter(|f| start.dot(f.normal()) == 1.0 && end.dot(f.normal()) == 1.0)
            .collect();
        let face = match pinned.as_slice() {
            [face] => *face,
            [] => return Err(FootprintError::NotOnFace { start, end }),
            _ => return Err(FootprintError::Degenerate { start, end }),
        };
        let (t, b) = (face.tangent(), face.bitangent());
        let fp = Self {
            face,
            u0: start.dot(t),
            v0: start.dot(b),
            u1: end.dot(t),
            v1: end.dot(b),
        };
        if fp.u0 == fp.u1 || fp.v0 == fp.v1 {
            return Err(FootprintError::Degenerate { start, end });
        }
        Ok(fp)
    }

    #[must_use]
    pub fn face(&self) -> CubeFace {
        self.face
    }

    /// Cube-space corner at grid `(0, 0)`.
    #[must_use]
    pub fn start(&self) -> DVec3 {
        self.face.point(self.u0, self.v0)
    }

    /// Cube-space corner at grid `(quads, quads)`.
    #[must_use]
    pub fn end(&self) -> DVec3 {
        self.face.point(self.u1, self.v1)
    }

    /// The four cube-space corners, in grid order (0,0), (q,0), (0,q), (q,q).
    #[must_use]
    pub fn corners(&self) -> [DVec3; 4] {
        [
            self.face.point(self.u0, self.v0),
            self.face.point(self.u1, self.v0),
            self.face.point(self.u0, self.v1),
            self.face.point(self.u1, self.v1),
        ]
    }

    /// Cube point for grid sample `(x, y)` of a `quads`-wide grid. Samples
    /// outside `[0, quads]` extend the plane for padding.
    #[must_use]
    pub fn cube_point(&self, x: i32, y: i32, quads: u32) -> DVec3 {
        let q = f64::from(quads);
        let u = self.u0 + (self.u1 - self.u0) * f64::from(x) / q;
        let v = self.v0 + (self.v1 - self.v0) * f64::from(y) / q;
        self.face.point(u, v)
    }

    /// [`Footprint::cube_point`] projected onto the unit sphere.
    #[must_use]
    pub fn sphere_direction(&self, x: i32, y: i32, quads: u32) -> DVec3 {
        self.cube_point(x, y, quads).normalize()
    }

    /// The quarter of this footprint covered by child `quadrant`.
    #[must_use]
    pub fn child(&self, quadrant: Quadrant) -> Footprint {
        let um = (self.u0 + self.u1) * 0.5;
        let vm = (self.v0 + self.v1) * 0.5;
        let (u0, u1) = if quadrant.is_east() { (um, self.u1) } else { (self.u0, um) };
        let (v0, v1) = if quadrant.is_south() { (vm, self.v1) } else { (self.v0, vm) };
        Footprint {
            face: self.face,
            u0,
            v0,
            u1,
            v1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_root_roundtrips_through_corners() {
        for face in CubeFace::ALL {
            let root = Footprint::root(face);
            let again = Footprint::from_corners(root.start(), root.end()).unwrap();
            assert_eq!(root, again, "{face:?}");
        }
    }

    #[test]
    fn test_corners_off_cube_are_rejected() {
        let err = Footprint::from_corners(DVec3::new(0.5, 0.5, 0.5), DVec3::new(1.0, -1.0, -1.0));
        assert!(matches!(err, Err(FootprintError::NotOnFace { .. })));
    }

    #[test]
    fn test_cube_edge_is_degenerate() {
        // Both x and y are pinned along this edge.
        let err = Footprint::from_corners(DVec3::new(1.0, 1.0, 1.0), DVec3::new(1.0, 1.0, -1.0));
        assert!(matches!(err, Err(FootprintError::Degenerate { .. })));
    }

    #[test]
    fn test_children_tile_parent() {
        let parent = Footprint::root(CubeFace::Front);
        let nw = parent.child(Quadrant::NorthWest);
        let se = parent.child(Quadrant::SouthEast);
        assert_eq!(nw.start(), parent.start());
        assert_eq!(se.end(), parent.end());
        assert_eq!(nw.end(), se.start(), "children meet at the parent centre");
        assert_eq!(nw.end(), DVec3::Z);
    }

    #[test]
    fn test_child_grid_maps_to_parent_grid() {
        let q = 8;
        let parent = Footprint::root(CubeFace::Left).child(Quadrant::NorthEast);
        for quadrant in Quadrant::ALL {
            let child = parent.child(quadrant);
            let (ox, oy) = quadrant.grid_offset(q);
            for y in (0..=q as i32).step_by(2) {
                for x in (0..=q as i32).step_by(2) {
                    let c = child.cube_point(x, y, q);
                    let p = parent.cube_point(x / 2 + ox, y / 2 + oy, q);
                    assert!((c - p).length() < 1e-12, "{quadrant:?} ({x},{y})");
                }
            }
        }
    }

    #[test]
    fn test_padding_extends_plane() {
        let fp = Footprint::root(CubeFace::Top);
        let p = fp.cube_point(-2, 0, 4);
        assert_eq!(p, DVec3::new(-2.0, 1.0, -1.0));
    }
}
