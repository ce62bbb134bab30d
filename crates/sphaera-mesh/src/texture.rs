use sphaera_cubesphere::Quadrant;

/// Texture coordinates spanned by a patch, grid `(0, 0)` to `(quads, quads)`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TextureRange {
    pub u0: f64,
    pub v0: f64,
    pub u1: f64,
    pub v1: f64,
}

impl TextureRange {
    /// `[0, extent]` on both axes.
    pub fn square(extent: f64) -> Self {
        Self {
            u0: 0.0,
            v0: 0.0,
            u1: extent,
            v1: extent,
        }
    }

    /// Range of the child in `quadrant` of a patch at `depth`.
    ///
    /// While more than `tiling_depth` levels remain below the parent, the
    /// child restarts at `[0, 2^(max_depth - depth - 1)]` so coordinates stay
    /// small enough for f32. Deeper children take half the parent's range.
    #[must_use]
    pub fn child(&self, quadrant: Quadrant, depth: u8, max_depth: u8, tiling_depth: u8) -> Self {
        if u32::from(depth) + u32::from(tiling_depth) < u32::from(max_depth) {
            let extent = f64::from(1u32 << (max_depth - depth - 1).min(31));
            return Self::square(extent);
        }
        let um = (self.u0 + self.u1) * 0.5;
        let vm = (self.v0 + self.v1) * 0.5;
        let (u0, u1) = if quadrant.is_east() { (um, self.u1) } else { (self.u0, um) };
        let (v0, v1) = if quadrant.is_south() { (vm, self.v1) } else { (self.v0, vm) };
        Self { u0, v0, u1, v1 }
    }

    /// Coordinates at grid position `(x, y)` of a `quads` grid.
    pub fn at(&self, x: u32, y: u32, quads: u32) -> (f64, f64) {
        let q = f64::from(quads);
        (
            self.u0 + (self.u1 - self.u0) * f64::from(x) / q,
            self.v0 + (self.v1 - self.v0) * f64::from(y) / q,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shallow_children_restart_tiling() {
        let root = TextureRange::square(1.0);
        let child = root.child(Quadrant::SouthEast, 2, 15, 9);
        assert_eq!(child, TextureRange::square(4096.0));
    }

    #[test]
    fn test_deep_children_split_parent() {
        let parent = TextureRange::square(8.0);
        let child = parent.child(Quadrant::NorthEast, 10, 15, 9);
        assert_eq!(
            child,
            TextureRange {
                u0: 4.0,
                v0: 0.0,
                u1: 8.0,
                v1: 4.0
            }
        );
    }

    #[test]
    fn test_at_interpolates() {
        let r = TextureRange::square(2.0);
        assert_eq!(r.at(0, 0, 4), (0.0, 0.0));
        assert_eq!(r.at(2, 4, 4), (1.0, 2.0));
    }
}
