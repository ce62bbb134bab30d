//! Quadtree paths and the neighbour transforms over them.
//!
//! A [`PatchPath`] is a face plus the quadrants chosen on the way down from
//! the face root. Its textual form is the face name followed by one digit per
//! quadrant, e.g. `Front012`. Neighbours are computed purely from the path:
//! flip the last quadrant along the requested axis and carry to the parent
//! while the step leaves the parent. A carry past the root moves to the
//! adjacent face, whose frame is rotated relative to ours, so every digit is
//! then rotated to line the frames up.

use std::fmt;
use std::str::FromStr;

use crate::CubeFace;

/// Deepest path representable (two bits per level in a `u64`).
pub const MAX_DEPTH: u8 = 31;

/// Child position within a parent. Bit 0 selects the high-U (east) half,
/// bit 1 the high-V (south) half.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum Quadrant {
    NorthWest = 0,
    NorthEast = 1,
    SouthWest = 2,
    SouthEast = 3,
}

impl Quadrant {
    pub const ALL: [Quadrant; 4] = [
        Quadrant::NorthWest,
        Quadrant::NorthEast,
        Quadrant::SouthWest,
        Quadrant::SouthEast,
    ];

    #[must_use]
    pub fn from_index(index: u8) -> Quadrant {
        Self::ALL[usize::from(index & 3)]
    }

    #[must_use]
    pub fn index(self) -> u8 {
        self as u8
    }

    #[must_use]
    pub fn is_east(self) -> bool {
        self.index() & 1 != 0
    }

    #[must_use]
    pub fn is_south(self) -> bool {
        self.index() & 2 != 0
    }

    /// Offset of this quadrant's origin within the parent's `quads` grid.
    #[must_use]
    pub fn grid_offset(self, quads: u32) -> (i32, i32) {
        let half = (quads / 2) as i32;
        (
            if self.is_east() { half } else { 0 },
            if self.is_south() { half } else { 0 },
        )
    }

    /// Rotate the quadrant a quarter turn (or half turn) in the face plane.
    #[must_use]
    pub fn rotated(self, rotation: Rotation) -> Quadrant {
        use Quadrant::*;
        match (rotation, self) {
            (Rotation::None, q) => q,
            (Rotation::Clockwise, NorthWest) => NorthEast,
            (Rotation::Clockwise, NorthEast) => SouthEast,
            (Rotation::Clockwise, SouthWest) => NorthWest,
            (Rotation::Clockwise, SouthEast) => SouthWest,
            (Rotation::CounterClockwise, NorthWest) => SouthWest,
            (Rotation::CounterClockwise, NorthEast) => NorthWest,
            (Rotation::CounterClockwise, SouthWest) => SouthEast,
            (Rotation::CounterClockwise, SouthEast) => NorthEast,
            (Rotation::Half, q) => Quadrant::from_index(3 - q.index()),
        }
    }
}

/// Edge of a patch. West is low U, north is low V (grid row 0).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Direction {
    West,
    North,
    East,
    South,
}

impl Direction {
    pub const ALL: [Direction; 4] = [
        Direction::West,
        Direction::North,
        Direction::East,
        Direction::South,
    ];

    #[must_use]
    pub fn opposite(self) -> Direction {
        match self {
            Direction::West => Direction::East,
            Direction::North => Direction::South,
            Direction::East => Direction::West,
            Direction::South => Direction::North,
        }
    }

    /// Step from `quadrant` towards this edge: the resulting quadrant and
    /// whether the step left the parent.
    fn step(self, quadrant: Quadrant) -> (Quadrant, bool) {
        let (flip, leaves) = match self {
            Direction::West => (1, !quadrant.is_east()),
            Direction::East => (1, quadrant.is_east()),
            Direction::North => (2, !quadrant.is_south()),
            Direction::South => (2, quadrant.is_south()),
        };
        (Quadrant::from_index(quadrant.index() ^ flip), leaves)
    }
}

/// Relative orientation between two adjacent face frames.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Rotation {
    None,
    Clockwise,
    CounterClockwise,
    Half,
}

impl Rotation {
    #[must_use]
    pub fn inverse(self) -> Rotation {
        match self {
            Rotation::Clockwise => Rotation::CounterClockwise,
            Rotation::CounterClockwise => Rotation::Clockwise,
            r => r,
        }
    }
}

/// Face reached by leaving `face` through edge `dir`, and the rotation that
/// maps our quadrants onto that face's frame.
fn face_across(face: CubeFace, dir: Direction) -> (CubeFace, Rotation) {
    use CubeFace::*;
    use Direction::*;
    match (face, dir) {
        (Front, West) => (Left, Rotation::None),
        (Front, East) => (Right, Rotation::None),
        (Front, North) => (Top, Rotation::None),
        (Front, South) => (Bottom, Rotation::None),

        (Back, West) => (Right, Rotation::None),
        (Back, East) => (Left, Rotation::None),
        (Back, North) => (Top, Rotation::Half),
        (Back, South) => (Bottom, Rotation::Half),

        (Left, West) => (Back, Rotation::None),
        (Left, East) => (Front, Rotation::None),
        (Left, North) => (Top, Rotation::Clockwise),
        (Left, South) => (Bottom, Rotation::CounterClockwise),

        (Right, West) => (Front, Rotation::None),
        (Right, East) => (Back, Rotation::None),
        (Right, North) => (Top, Rotation::CounterClockwise),
        (Right, South) => (Bottom, Rotation::Clockwise),

        (Top, West) => (Left, Rotation::CounterClockwise),
        (Top, East) => (Right, Rotation::Clockwise),
        (Top, North) => (Back, Rotation::Half),
        (Top, South) => (Front, Rotation::None),

        (Bottom, West) => (Left, Rotation::Clockwise),
        (Bottom, East) => (Right, Rotation::CounterClockwise),
        (Bottom, North) => (Front, Rotation::None),
        (Bottom, South) => (Back, Rotation::Half),
    }
}

/// A textual patch name that does not parse.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PathParseError {
    #[error("unknown cube face in patch name {0:?}")]
    UnknownFace(String),
    #[error("invalid quadrant digit {digit:?} in patch name {name:?}")]
    InvalidQuadrant { name: String, digit: char },
    #[error("patch name {0:?} is deeper than the supported maximum")]
    TooDeep(String),
}

/// Address of a patch: a face and the quadrants chosen from its root.
///
/// Quadrants are packed two bits per level, first quadrant most significant.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct PatchPath {
    face: CubeFace,
    depth: u8,
    bits: u64,
}

impl PatchPath {
    #[must_use]
    pub fn root(face: CubeFace) -> Self {
        Self {
            face,
            depth: 0,
            bits: 0,
        }
    }

    #[must_use]
    pub fn face(&self) -> CubeFace {
        self.face
    }

    #[must_use]
    pub fn depth(&self) -> u8 {
        self.depth
    }

    #[must_use]
    pub fn is_root(&self) -> bool {
        self.depth == 0
    }

    /// # Panics
    /// When the path is already [`MAX_DEPTH`] deep.
    #[must_use]
    pub fn child(&self, quadrant: Quadrant) -> Self {
        assert!(self.depth < MAX_DEPTH, "patch path {self} cannot be subdivided further");
        Self {
            face: self.face,
            depth: self.depth + 1,
            bits: (self.bits << 2) | u64::from(quadrant.index()),
        }
    }

    #[must_use]
    pub fn parent(&self) -> Option<Self> {
        (self.depth > 0).then(|| Self {
            face: self.face,
            depth: self.depth - 1,
            bits: self.bits >> 2,
        })
    }

    /// The quadrant this patch occupies within its parent.
    #[must_use]
    pub fn quadrant(&self) -> Option<Quadrant> {
        (self.depth > 0).then(|| Quadrant::from_index((self.bits & 3) as u8))
    }

    /// Quadrants from the root down.
    pub fn quadrants(&self) -> impl Iterator<Item = Quadrant> + '_ {
        (0..self.depth)
            .rev()
            .map(move |level| Quadrant::from_index(((self.bits >> (2 * level)) & 3) as u8))
    }

    fn with_quadrants(face: CubeFace, quadrants: impl IntoIterator<Item = Quadrant>) -> Self {
        quadrants
            .into_iter()
            .fold(Self::root(face), |path, q| path.child(q))
    }

    /// Same path with every quadrant rotated.
    #[must_use]
    pub fn rotated(&self, rotation: Rotation) -> Self {
        Self::with_quadrants(self.face, self.quadrants().map(|q| q.rotated(rotation)))
    }

    /// Same-depth neighbour across edge `dir`. For a face root this is the
    /// root of the adjacent face.
    #[must_use]
    pub fn neighbour(&self, dir: Direction) -> Self {
        let mut quadrants: Vec<Quadrant> = self.quadrants().collect();
        let mut carry = true;
        for q in quadrants.iter_mut().rev() {
            let (stepped, leaves) = dir.step(*q);
            *q = stepped;
            if !leaves {
                carry = false;
                break;
            }
        }
        if !carry {
            return Self::with_quadrants(self.face, quadrants);
        }
        let (face, rotation) = face_across(self.face, dir);
        Self::with_quadrants(face, quadrants.into_iter().map(|q| q.rotated(rotation)))
    }

    /// Neighbours in [`Direction::ALL`] order.
    #[must_use]
    pub fn neighbours(&self) -> [Self; 4] {
        Direction::ALL.map(|d| self.neighbour(d))
    }
}

impl fmt::Display for PatchPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.face.name())?;
        for q in self.quadrants() {
            write!(f, "{}", q.index())?;
        }
        Ok(())
    }
}

impl fmt::Debug for PatchPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PatchPath({self})")
    }
}

impl FromStr for PatchPath {
    type Err = PathParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let face = CubeFace::ALL
            .into_iter()
            .find(|f| s.starts_with(f.name()))
            .ok_or_else(|| PathParseError::UnknownFace(s.to_owned()))?;
        let digits = &s[face.name().len()..];
        if digits.len() > usize::from(MAX_DEPTH) {
            return Err(PathParseError::TooDeep(s.to_owned()));
        }
        let mut path = Self::root(face);
        for c in digits.chars() {
            let index = c
                .to_digit(10)
                .filter(|d| *d < 4)
                .ok_or_else(|| PathParseError::InvalidQuadrant {
                    name: s.to_owned(),
                    digit: c,
                })?;
            path = path.child(Quadrant::from_index(index as u8));
        }
        Ok(path)
    }
}
