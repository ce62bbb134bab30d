//! GPU vertex format for patch meshes.
//!
//! | Location | Offset | Format    | Field                               |
//! |----------|--------|-----------|-------------------------------------|
//! | 0        | 0      | Float32x3 | position (patch-centre relative)    |
//! | 1        | 12     | Float32x3 | normal                              |
//! | 2        | 24     | Float32x4 | u, v, morph x, morph y              |
//! | 3        | 40     | Float32x3 | position at the coarser LOD         |
//! | 4        | 52     | Float32x3 | normal at the coarser LOD           |

use std::mem;

use bytemuck::{Pod, Zeroable};
use static_assertions::const_assert_eq;
use wgpu::{VertexAttribute, VertexBufferLayout, VertexFormat, VertexStepMode};

#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct PatchVertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
    /// Texture coordinates followed by the edge morph markers: 0 on the low
    /// edge, 1 on the high edge, 0.5 inside.
    pub texcoord: [f32; 4],
    pub interpolated_position: [f32; 3],
    pub interpolated_normal: [f32; 3],
}

const_assert_eq!(mem::size_of::<PatchVertex>(), 64);

pub const PATCH_VERTEX_ATTRIBUTES: [VertexAttribute; 5] = [
    VertexAttribute {
        format: VertexFormat::Float32x3,
        offset: 0,
        shader_location: 0,
    },
    VertexAttribute {
        format: VertexFormat::Float32x3,
        offset: 12,
        shader_location: 1,
    },
    VertexAttribute {
        format: VertexFormat::Float32x4,
        offset: 24,
        shader_location: 2,
    },
    VertexAttribute {
        format: VertexFormat::Float32x3,
        offset: 40,
        shader_location: 3,
    },
    VertexAttribute {
        format: VertexFormat::Float32x3,
        offset: 52,
        shader_location: 4,
    },
];

pub const PATCH_VERTEX_LAYOUT: VertexBufferLayout<'static> = VertexBufferLayout {
    array_stride: mem::size_of::<PatchVertex>() as u64,
    step_mode: VertexStepMode::Vertex,
    attributes: &PATCH_VERTEX_ATTRIBUTES,
};

pub fn patch_vertex_buffer_layout() -> VertexBufferLayout<'static> {
    PATCH_VERTEX_LAYOUT
}

const _: () = assert!(PATCH_VERTEX_ATTRIBUTES[1].offset == mem::offset_of!(PatchVertex, normal) as u64);
const _: () = assert!(PATCH_VERTEX_ATTRIBUTES[2].offset == mem::offset_of!(PatchVertex, texcoord) as u64);
const _: () = assert!(
    PATCH_VERTEX_ATTRIBUTES[3].offset == mem::offset_of!(PatchVertex, interpolated_position) as u64
);
const _: () = assert!(
    PATCH_VERTEX_ATTRIBUTES[4].offset == mem::offset_of!(PatchVertex, interpolated_normal) as u64
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout_stride_matches_vertex_size() {
        assert_eq!(PATCH_VERTEX_LAYOUT.array_stride, 64);
        assert_eq!(patch_vertex_buffer_layout().attributes.len(), 5);
    }

    #[test]
    fn test_attributes_fit_in_stride() {
        for (i, attr) in PATCH_VERTEX_ATTRIBUTES.iter().enumerate() {
            assert!(
                attr.offset + attr.format.size() <= PATCH_VERTEX_LAYOUT.array_stride,
                "attribute {i} overruns the vertex"
            );
            assert_eq!(attr.shader_location as usize, i);
        }
    }

    #[test]
    fn test_vertex_casts_to_bytes() {
        let v = [PatchVertex::default(); 3];
        assert_eq!(bytemuck::cast_slice::<PatchVertex, u8>(&v).len(), 192);
    }
}
