//! Shared index buffers that stitch a patch to coarser neighbours.
//!
//! A patch whose neighbour on some edge has no same-depth counterpart is
//! bordered by a coarser patch there. That neighbour has only the even
//! vertices of our edge, so our odd edge vertices would form T-junctions.
//! For every flagged edge the two quads touching each coarse edge segment
//! are retriangulated into three triangles that skip the odd vertex.
//!
//! One buffer exists per combination of flagged edges, sixteen in all,
//! built once for the grid resolution and shared by every patch.

use std::fmt;

use sphaera_cubesphere::Direction;

/// Edges whose same-depth neighbour is absent.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct StitchMask(u8);

impl StitchMask {
    pub const NONE: StitchMask = StitchMask(0);
    pub const WEST: StitchMask = StitchMask(1);
    pub const NORTH: StitchMask = StitchMask(2);
    pub const EAST: StitchMask = StitchMask(4);
    pub const SOUTH: StitchMask = StitchMask(8);
    pub const ALL: StitchMask = StitchMask(15);

    pub fn from_bits(bits: u8) -> StitchMask {
        StitchMask(bits & 15)
    }

    pub fn bits(self) -> u8 {
        self.0
    }

    pub fn edge(dir: Direction) -> StitchMask {
        match dir {
            Direction::West => Self::WEST,
            Direction::North => Self::NORTH,
            Direction::East => Self::EAST,
            Direction::South => Self::SOUTH,
        }
    }

    pub fn contains(self, dir: Direction) -> bool {
        self.0 & Self::edge(dir).0 != 0
    }

    pub fn with(self, dir: Direction) -> StitchMask {
        StitchMask(self.0 | Self::edge(dir).0)
    }

    pub fn count(self) -> u32 {
        self.0.count_ones()
    }

    /// `[west, north, east, south]` as 0/1 floats, for the shader.
    pub fn as_vec4(self) -> [f32; 4] {
        Direction::ALL.map(|d| if self.contains(d) { 1.0 } else { 0.0 })
    }
}

impl fmt::Debug for StitchMask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "StitchMask(")?;
        for (d, c) in Direction::ALL.into_iter().zip(['W', 'N', 'E', 'S']) {
            write!(f, "{}", if self.contains(d) { c } else { '-' })?;
        }
        write!(f, ")")
    }
}

/// How one grid quad is triangulated under a given mask.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum QuadCase {
    Full,
    West { even: bool },
    North { even: bool },
    East { even: bool },
    South { even: bool },
    NorthWestCorner,
    NorthEastCorner,
    SouthWestCorner,
    SouthEastCorner,
}

fn classify(x: u32, y: u32, quads: u32, mask: StitchMask) -> QuadCase {
    let w = mask.contains(Direction::West) && x == 0;
    let n = mask.contains(Direction::North) && y == 0;
    let e = mask.contains(Direction::East) && x == quads - 1;
    let s = mask.contains(Direction::South) && y == quads - 1;
    match (w, n, e, s) {
        (true, true, _, _) => QuadCase::NorthWestCorner,
        (_, true, true, _) => QuadCase::NorthEastCorner,
        (true, _, _, true) => QuadCase::SouthWestCorner,
        (_, _, true, true) => QuadCase::SouthEastCorner,
        (true, ..) => QuadCase::West { even: y % 2 == 0 },
        (_, true, ..) => QuadCase::North { even: x % 2 == 0 },
        (_, _, true, _) => QuadCase::East { even: y % 2 == 0 },
        (.., true) => QuadCase::South { even: x % 2 == 0 },
        _ => QuadCase::Full,
    }
}

/// Emits triangles for quad `(x, y)` with clockwise grid winding.
struct Emitter<'a> {
    stride: u32,
    out: &'a mut Vec<u16>,
}

impl Emitter<'_> {
    fn tri(&mut self, a: (u32, u32), b: (u32, u32), c: (u32, u32)) {
        for (x, y) in [a, b, c] {
            // Fits: the table rejects grids with more than u16::MAX vertices.
            self.out.push((y * self.stride + x) as u16);
        }
    }

    fn quad(&mut self, x: u32, y: u32, case: QuadCase) {
        match case {
            QuadCase::Full => {
                self.tri((x, y), (x, y + 1), (x + 1, y));
                self.tri((x, y + 1), (x + 1, y + 1), (x + 1, y));
            }
            QuadCase::West { even: true } => {
                self.tri((x, y), (x, y + 2), (x + 1, y + 1));
                self.tri((x, y), (x + 1, y + 1), (x + 1, y));
            }
            QuadCase::West { even: false } => {
                self.tri((x, y + 1), (x + 1, y + 1), (x + 1, y));
            }
            QuadCase::North { even: true } => {
                self.tri((x, y), (x, y + 1), (x + 1, y + 1));
                self.tri((x, y), (x + 1, y + 1), (x + 2, y));
            }
            QuadCase::North { even: false } => {
                self.tri((x, y + 1), (x + 1, y + 1), (x + 1, y));
            }
            QuadCase::East { even: true } => {
                self.tri((x, y), (x, y + 1), (x + 1, y));
                self.tri((x + 1, y), (x, y + 1), (x + 1, y + 2));
            }
            QuadCase::East { even: false } => {
                self.tri((x, y), (x, y + 1), (x + 1, y + 1));
            }
            QuadCase::South { even: true } => {
                self.tri((x, y), (x, y + 1), (x + 1, y));
                self.tri((x + 1, y), (x, y + 1), (x + 2, y + 1));
            }
            QuadCase::South { even: false } => {
                self.tri((x, y), (x + 1, y + 1), (x + 1, y));
            }
            // The west fan's first triangle and the north fan's second.
            QuadCase::NorthWestCorner => {
                self.tri((x, y), (x, y + 2), (x + 1, y + 1));
                self.tri((x, y), (x + 1, y + 1), (x + 2, y));
            }
            // Only the east fan's long triangle; the north side is covered
            // by the even quad to the west.
            QuadCase::NorthEastCorner => {
                self.tri((x + 1, y), (x, y + 1), (x + 1, y + 2));
            }
            QuadCase::SouthWestCorner => {
                self.tri((x + 1, y), (x, y + 1), (x + 2, y + 1));
            }
            // Fully covered by the fans of its west and north neighbours.
            QuadCase::SouthEastCorner => {}
        }
    }
}

/// The sixteen stitched index buffers for one grid resolution.
#[derive(Clone, Debug)]
pub struct StitchingTable {
    quads: u32,
    buffers: [Vec<u16>; 16],
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StitchingError {
    #[error("stitching needs an even quad count of at least 2, got {0}")]
    InvalidQuads(u32),
    #[error("a {0}x{0} grid has too many vertices for 16-bit indices")]
    TooLarge(u32),
}

impl StitchingTable {
    pub fn new(quads: u32) -> Result<Self, StitchingError> {
        if quads < 2 || quads % 2 != 0 {
            return Err(StitchingError::InvalidQuads(quads));
        }
        if (quads + 1) * (quads + 1) > u32::from(u16::MAX) + 1 {
            return Err(StitchingError::TooLarge(quads));
        }
        let buffers = std::array::from_fn(|bits| {
            let mask = StitchMask::from_bits(bits as u8);
            let mut out = Vec::with_capacity((2 * quads * quads * 3) as usize);
            let mut emit = Emitter {
                stride: quads + 1,
                out: &mut out,
            };
            for y in 0..quads {
                for x in 0..quads {
                    emit.quad(x, y, classify(x, y, quads, mask));
                }
            }
            out
        });
        Ok(Self { quads, buffers })
    }

    pub fn quads(&self) -> u32 {
        self.quads
    }

    /// Triangle list for `mask`.
    pub fn indices(&self, mask: StitchMask) -> &[u16] {
        &self.buffers[usize::from(mask.bits())]
    }

    /// Triangles in the buffer for `mask`: each flagged edge loses one
    /// triangle per coarse segment.
    pub fn expected_triangles(&self, mask: StitchMask) -> usize {
        (2 * self.quads * self.quads - mask.count() * (self.quads / 2)) as usize
    }
}
