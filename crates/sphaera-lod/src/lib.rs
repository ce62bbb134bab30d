//! Chunked LOD for a cube-sphere planet layer.
//!
//! [`PatchTree`] owns six face quadtrees and decides every frame which
//! patches to show. Mesh preparation runs on the [`PrepareQueue`] worker;
//! everything else, including the [`VisibleRegistry`] used for crack
//! avoidance and stitching, stays on the render thread. Rendering itself
//! goes through the [`SceneBackend`] seam.

mod horizon;
mod queue;
mod registry;
mod scene;
mod tree;

pub use horizon::HorizonCuller;
pub use queue::{
    JobId, PrepareError, PrepareHandle, PrepareQueue, PrepareRequest, PrepareResult, PreparedPatch,
    QueueConfig, QueueStats, prepare,
};
pub use registry::VisibleRegistry;
pub use scene::{EntityHandle, HeadlessScene, MeshHandle, RenderQueue, SceneBackend};
pub use tree::{PatchTree, TreeSettings, TreeStats};
