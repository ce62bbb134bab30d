//! Double-precision geometry shared by the planet crates: bounding boxes in
//! planet space and a view frustum that tests them.

mod aabb;
mod frustum;

pub use aabb::Aabb;
pub use frustum::Frustum;

pub use glam::{DMat4, DVec3, DVec4};
