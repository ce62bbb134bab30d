//! Patch geometry: vertex format, mesh construction from height fields, and
//! the shared stitching index buffers.

mod builder;
mod stitching;
mod texture;
mod vertex;

pub use builder::{MeshBuilder, MeshError, PatchMesh};
pub use stitching::{StitchMask, StitchingError, StitchingTable};
pub use texture::TextureRange;
pub use vertex::{PATCH_VERTEX_ATTRIBUTES, PATCH_VERTEX_LAYOUT, PatchVertex, patch_vertex_buffer_layout};
