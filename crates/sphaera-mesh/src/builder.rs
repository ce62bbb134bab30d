//! Turns a height field into a renderable patch mesh.
//!
//! Positions are `direction * (base_radius + height * scaling)`, recentred on
//! the centre of the unpadded bounding box so they stay precise in f32.
//! Normals sum the six triangle cross products around each vertex; the
//! padded border provides the neighbours for edge vertices.
//!
//! Each vertex also carries where it would sit in the parent LOD. Even
//! vertices exist in the parent and keep their position. Odd ones do not,
//! so they take the average of the even neighbours along the edge (or
//! diagonal) they split. A shader blending towards these targets makes
//! the split and merge transitions seamless.

use glam::DVec3;
use sphaera_math::Aabb;
use sphaera_terrain::HeightField;

use crate::{PatchVertex, TextureRange};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MeshError {
    #[error("height field padding {padding} is too small to estimate border normals")]
    InsufficientPadding { padding: u32 },
}

/// A prepared patch mesh, ready for upload.
#[derive(Clone, Debug)]
pub struct PatchMesh {
    /// `(quads + 1)^2` vertices, row-major.
    pub vertices: Vec<PatchVertex>,
    /// Planet-space bounds of the unpadded vertices.
    pub bounds: Aabb,
    /// Planet-space origin of the vertex positions.
    pub center: DVec3,
    pub quads: u32,
}

#[derive(Clone, Copy, Debug)]
pub struct MeshBuilder {
    pub base_radius: f64,
    pub scaling_factor: f64,
    pub texture: TextureRange,
}

/// Planet-space positions over the padded grid.
struct Surface {
    quads: i32,
    padding: i32,
    side: usize,
    points: Vec<DVec3>,
}

impl Surface {
    fn at(&self, x: i32, y: i32) -> DVec3 {
        self.points[(y + self.padding) as usize * self.side + (x + self.padding) as usize]
    }

    /// Six-triangle fan normal at `(x, y)` using neighbours `stride` apart.
    fn normal(&self, x: i32, y: i32, stride: i32) -> DVec3 {
        let c = self.at(x, y);
        let next_x = self.at(x + stride, y) - c;
        let prev_x = self.at(x - stride, y) - c;
        let next_y = self.at(x, y + stride) - c;
        let prev_y = self.at(x, y - stride) - c;
        let next_x_prev_y = self.at(x + stride, y - stride) - c;
        let prev_x_next_y = self.at(x - stride, y + stride) - c;

        let n = next_x.cross(next_x_prev_y)
            + next_x_prev_y.cross(prev_y)
            + prev_y.cross(prev_x)
            + prev_x.cross(prev_x_next_y)
            + prev_x_next_y.cross(next_y)
            + next_y.cross(next_x);
        n.normalize_or_zero()
    }

    /// Position this vertex would have one LOD coarser.
    fn coarse_position(&self, x: i32, y: i32) -> DVec3 {
        match (x % 2 != 0, y % 2 != 0) {
            (true, true) => (self.at(x + 1, y - 1) + self.at(x - 1, y + 1)) * 0.5,
            (true, false) => (self.at(x - 1, y) + self.at(x + 1, y)) * 0.5,
            (false, true) => (self.at(x, y - 1) + self.at(x, y + 1)) * 0.5,
            (false, false) => self.at(x, y),
        }
    }

    /// Normal this vertex would have one LOD coarser.
    fn coarse_normal(&self, x: i32, y: i32) -> DVec3 {
        // Parent-resolution neighbours are two samples apart. Where the
        // padding is too thin for that, fall back to direct neighbours.
        let (lo, hi) = (-self.padding, self.quads + self.padding);
        let even = |x: i32, y: i32| {
            let fits = x - 2 >= lo && x + 2 <= hi && y - 2 >= lo && y + 2 <= hi;
            self.normal(x, y, if fits { 2 } else { 1 })
        };
        match (x % 2 != 0, y % 2 != 0) {
            (true, true) => (even(x + 1, y - 1) + even(x - 1, y + 1)).normalize_or_zero(),
            (true, false) => (even(x - 1, y) + even(x + 1, y)).normalize_or_zero(),
            (false, true) => (even(x, y - 1) + even(x, y + 1)).normalize_or_zero(),
            (false, false) => even(x, y),
        }
    }
}

fn morph_marker(i: u32, quads: u32) -> f32 {
    if i == 0 {
        0.0
    } else if i == quads {
        1.0
    } else {
        0.5
    }
}

fn to_f32(v: DVec3) -> [f32; 3] {
    v.as_vec3().to_array()
}

impl MeshBuilder {
    pub fn new(base_radius: f64, scaling_factor: f64, texture: TextureRange) -> Self {
        Self {
            base_radius,
            scaling_factor,
            texture,
        }
    }

    /// Build the mesh for `field`.
    pub fn build(&self, field: &HeightField) -> Result<PatchMesh, MeshError> {
        if field.padding() < 1 {
            return Err(MeshError::InsufficientPadding {
                padding: field.padding(),
            });
        }
        let q = field.quads() as i32;
        let p = field.padding() as i32;

        let mut points = Vec::with_capacity(field.side() * field.side());
        for y in -p..=q + p {
            for x in -p..=q + p {
                let h = field.height(x, y);
                points.push(field.direction(x, y) * (self.base_radius + h * self.scaling_factor));
            }
        }
        let surface = Surface {
            quads: q,
            padding: p,
            side: field.side(),
            points,
        };

        let interior = (0..=q).flat_map(|y| (0..=q).map(move |x| (x, y)));
        let bounds = Aabb::from_points(interior.clone().map(|(x, y)| surface.at(x, y)))
            .unwrap_or(Aabb::new(DVec3::ZERO, DVec3::ZERO));
        let center = bounds.center();

        let quads = field.quads();
        let vertices = interior
            .map(|(x, y)| {
                let (u, v) = self.texture.at(x as u32, y as u32, quads);
                PatchVertex {
                    position: to_f32(surface.at(x, y) - center),
                    normal: to_f32(surface.normal(x, y, 1)),
                    texcoord: [
                        u as f32,
                        v as f32,
                        morph_marker(x as u32, quads),
                        morph_marker(y as u32, quads),
                    ],
                    interpolated_position: to_f32(surface.coarse_position(x, y) - center),
                    interpolated_normal: to_f32(surface.coarse_normal(x, y)),
                }
            })
            .collect();

        Ok(PatchMesh {
            vertices,
            bounds,
            center,
            quads,
        })
    }
}
