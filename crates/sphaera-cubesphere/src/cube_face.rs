//! The six cube faces and their fixed (normal, U, V) frames.

use glam::DVec3;

/// One face of the unit cube.
///
/// Grid `x` runs along [`CubeFace::tangent`] (U) and grid `y` along
/// [`CubeFace::bitangent`] (V). Row `y = 0` is the "up" edge of a patch.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum CubeFace {
    /// +X
    Right = 0,
    /// -X
    Left = 1,
    /// +Y
    Top = 2,
    /// -Y
    Bottom = 3,
    /// +Z
    Front = 4,
    /// -Z
    Back = 5,
}

impl CubeFace {
    pub const ALL: [CubeFace; 6] = [
        CubeFace::Right,
        CubeFace::Left,
        CubeFace::Top,
        CubeFace::Bottom,
        CubeFace::Front,
        CubeFace::Back,
    ];

    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            CubeFace::Right => "Right",
            CubeFace::Left => "Left",
            CubeFace::Top => "Top",
            CubeFace::Bottom => "Bottom",
            CubeFace::Front => "Front",
            CubeFace::Back => "Back",
        }
    }

    /// Outward unit normal; the pinned axis of every footprint on this face.
    #[must_use]
    pub fn normal(self) -> DVec3 {
        match self {
            CubeFace::Right => DVec3::X,
            CubeFace::Left => DVec3::NEG_X,
            CubeFace::Top => DVec3::Y,
            CubeFace::Bottom => DVec3::NEG_Y,
            CubeFace::Front => DVec3::Z,
            CubeFace::Back => DVec3::NEG_Z,
        }
    }

    /// Direction of increasing U (grid `x`).
    #[must_use]
    pub fn tangent(self) -> DVec3 {
        match self {
            CubeFace::Right => DVec3::NEG_Z,
            CubeFace::Left => DVec3::Z,
            CubeFace::Top | CubeFace::Bottom | CubeFace::Front => DVec3::X,
            CubeFace::Back => DVec3::NEG_X,
        }
    }

    /// Direction of increasing V (grid `y`).
    #[must_use]
    pub fn bitangent(self) -> DVec3 {
        match self {
            CubeFace::Top => DVec3::Z,
            CubeFace::Bottom => DVec3::NEG_Z,
            CubeFace::Right | CubeFace::Left | CubeFace::Front | CubeFace::Back => DVec3::NEG_Y,
        }
    }

    /// Point on the face plane for face coordinates `u, v` in `[-1, 1]`.
    #[must_use]
    pub fn point(self, u: f64, v: f64) -> DVec3 {
        self.normal() + self.tangent() * u + self.bitangent() * v
    }

    /// Face whose normal is the dominant axis of `p`.
    #[must_use]
    pub fn from_direction(p: DVec3) -> CubeFace {
        let a = p.abs();
        if a.x >= a.y && a.x >= a.z {
            if p.x >= 0.0 { CubeFace::Right } else { CubeFace::Left }
        } else if a.y >= a.z {
            if p.y >= 0.0 { CubeFace::Top } else { CubeFace::Bottom }
        } else if p.z >= 0.0 {
            CubeFace::Front
        } else {
            CubeFace::Back
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frames_are_orthonormal() {
        for face in CubeFace::ALL {
            let (n, t, b) = (face.normal(), face.tangent(), face.bitangent());
            assert_eq!(n.dot(t), 0.0, "{face:?}: normal and tangent");
            assert_eq!(n.dot(b), 0.0, "{face:?}: normal and bitangent");
            assert_eq!(t.dot(b), 0.0, "{face:?}: tangent and bitangent");
        }
    }

    #[test]
    fn test_face_corners() {
        let expected = [
            (CubeFace::Right, DVec3::new(1.0, 1.0, 1.0), DVec3::new(1.0, -1.0, -1.0)),
            (CubeFace::Left, DVec3::new(-1.0, 1.0, -1.0), DVec3::new(-1.0, -1.0, 1.0)),
            (CubeFace::Top, DVec3::new(-1.0, 1.0, -1.0), DVec3::new(1.0, 1.0, 1.0)),
            (CubeFace::Bottom, DVec3::new(-1.0, -1.0, 1.0), DVec3::new(1.0, -1.0, -1.0)),
            (CubeFace::Front, DVec3::new(-1.0, 1.0, 1.0), DVec3::new(1.0, -1.0, 1.0)),
            (CubeFace::Back, DVec3::new(1.0, 1.0, -1.0), DVec3::new(-1.0, -1.0, -1.0)),
        ];
        for (face, start, end) in expected {
            assert_eq!(face.point(-1.0, -1.0), start, "{face:?} start corner");
            assert_eq!(face.point(1.0, 1.0), end, "{face:?} end corner");
        }
    }

    #[test]
    fn test_from_direction_roundtrip() {
        for face in CubeFace::ALL {
            assert_eq!(CubeFace::from_direction(face.point(0.3, -0.7)), face);
        }
    }
}
