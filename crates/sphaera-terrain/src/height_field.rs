//! Padded elevation grids over a patch footprint.
//!
//! A grid covers sample coordinates `[-padding, quads + padding]` on both
//! axes. The border exists only so the mesh builder can estimate normals at
//! the patch edge. When a parent field is supplied, every sample with even
//! coordinates coincides with a parent sample and is copied from it, so the
//! vertices a child shares with its parent have bit-identical elevation.

use glam::DVec3;
use sphaera_cubesphere::{Footprint, Quadrant};

use crate::{DataSource, DataSourceError};

#[derive(Clone, Debug)]
pub struct HeightField {
    quads: u32,
    padding: u32,
    heights: Vec<f64>,
    directions: Vec<DVec3>,
}

impl HeightField {
    #[must_use]
    pub fn quads(&self) -> u32 {
        self.quads
    }

    #[must_use]
    pub fn padding(&self) -> u32 {
        self.padding
    }

    /// Samples per row, padding included.
    #[must_use]
    pub fn side(&self) -> usize {
        (self.quads + 2 * self.padding + 1) as usize
    }

    fn index(&self, x: i32, y: i32) -> usize {
        let p = self.padding as i32;
        let lo = -p;
        let hi = self.quads as i32 + p;
        assert!(
            (lo..=hi).contains(&x) && (lo..=hi).contains(&y),
            "sample ({x}, {y}) outside [{lo}, {hi}]"
        );
        (y + p) as usize * self.side() + (x + p) as usize
    }

    /// Elevation at grid coordinate `(x, y)`.
    #[must_use]
    pub fn height(&self, x: i32, y: i32) -> f64 {
        self.heights[self.index(x, y)]
    }

    /// Unit-sphere direction at grid coordinate `(x, y)`.
    #[must_use]
    pub fn direction(&self, x: i32, y: i32) -> DVec3 {
        self.directions[self.index(x, y)]
    }

    /// Row-major elevations, padding included.
    pub fn heights(&self) -> &[f64] {
        &self.heights
    }
}

/// A parent field and the quadrant of it the new field covers.
#[derive(Clone, Copy)]
pub struct ParentSamples<'a> {
    pub field: &'a HeightField,
    pub quadrant: Quadrant,
}

impl ParentSamples<'_> {
    /// Parent sample for even child coordinate `(x, y)`.
    fn height(&self, x: i32, y: i32, quads: u32) -> f64 {
        let (ox, oy) = self.quadrant.grid_offset(quads);
        self.field.height(x / 2 + ox, y / 2 + oy)
    }
}

#[derive(Clone, Copy, Debug)]
pub struct HeightFieldBuilder {
    quads: u32,
    padding: u32,
}

impl HeightFieldBuilder {
    /// # Panics
    /// If `quads` is odd or below 2; a child grid must map onto half its
    /// parent.
    pub fn new(quads: u32, padding: u32) -> Self {
        assert!(quads >= 2 && quads % 2 == 0, "quads must be even and >= 2, got {quads}");
        Self { quads, padding }
    }

    pub fn quads(&self) -> u32 {
        self.quads
    }

    pub fn padding(&self) -> u32 {
        self.padding
    }

    /// Sample `source` over `footprint`.
    ///
    /// Any source error fails the whole field; no partial grid is returned.
    pub fn build(
        &self,
        source: &dyn DataSource,
        footprint: &Footprint,
        parent: Option<ParentSamples<'_>>,
    ) -> Result<HeightField, DataSourceError> {
        if let Some(parent) = &parent {
            assert_eq!(
                (parent.field.quads, parent.field.padding),
                (self.quads, self.padding),
                "parent height field has a different layout"
            );
        }

        let q = self.quads;
        let p = self.padding as i32;
        let range = -p..=q as i32 + p;
        let side = (q + 2 * self.padding + 1) as usize;

        let mut directions = Vec::with_capacity(side * side);
        for y in range.clone() {
            for x in range.clone() {
                directions.push(footprint.sphere_direction(x, y, q));
            }
        }

        let mut heights = if source.supports_bulk() {
            let bulk = source.bulk_heights(q, self.padding, footprint)?;
            if bulk.len() != side * side {
                return Err(DataSourceError::BulkSize {
                    expected: side * side,
                    actual: bulk.len(),
                });
            }
            bulk
        } else {
            let mut heights = Vec::with_capacity(side * side);
            for y in range.clone() {
                for x in range.clone() {
                    let h = match &parent {
                        Some(parent) if x % 2 == 0 && y % 2 == 0 => parent.height(x, y, q),
                        _ => source.height(directions[heights.len()])?,
                    };
                    heights.push(h);
                }
            }
            heights
        };

        // Bulk samples are overwritten too so shared vertices match on both paths.
        if let Some(parent) = &parent
            && source.supports_bulk()
        {
            for y in range.clone().filter(|y| y % 2 == 0) {
                for x in range.clone().filter(|x| x % 2 == 0) {
                    let i = (y + p) as usize * side + (x + p) as usize;
                    heights[i] = parent.height(x, y, q);
                }
            }
        }

        Ok(HeightField {
            quads: q,
            padding: self.padding,
            heights,
            directions,
        })
    }
}
