//! Cube-sphere addressing for the patch quadtree.
//!
//! A patch lives on one of six cube faces and is addressed by the sequence
//! of quadrants taken from the face root. This crate owns the fixed face
//! frames, patch footprints on the unit cube, and the pure transforms from a
//! patch path to its same-depth neighbours (including across face edges).

mod cube_face;
mod footprint;
mod path;

pub use cube_face::CubeFace;
pub use footprint::{Footprint, FootprintError};
pub use path::{Direction, PatchPath, PathParseError, Quadrant, Rotation, MAX_DEPTH};
