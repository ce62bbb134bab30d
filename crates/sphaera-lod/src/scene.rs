//! The render-side seam: what the LOD tree needs from a scene graph.

use glam::DVec3;
use rustc_hash::{FxHashMap, FxHashSet};
use sphaera_cubesphere::PatchPath;
use sphaera_mesh::{PatchMesh, StitchMask};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct MeshHandle(pub u64);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct EntityHandle(pub u64);

/// Render-queue group an entity is drawn in.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum RenderQueue {
    Main,
    Ocean,
    Sky,
}

/// Scene-graph operations the tree performs, all on the render thread.
pub trait SceneBackend {
    /// Upload a prepared vertex buffer.
    fn upload_mesh(&mut self, path: PatchPath, mesh: &PatchMesh) -> MeshHandle;

    fn release_mesh(&mut self, mesh: MeshHandle);

    /// Create a detached entity drawing `mesh` at planet-space `origin`.
    fn create_entity(
        &mut self,
        mesh: MeshHandle,
        queue: RenderQueue,
        priority: u8,
        origin: DVec3,
    ) -> EntityHandle;

    fn destroy_entity(&mut self, entity: EntityHandle);

    fn attach(&mut self, entity: EntityHandle);

    fn detach(&mut self, entity: EntityHandle);

    /// Replace the entity's index buffer. `mask` is also handed to the
    /// shader so it can pin morphing on stitched edges.
    fn set_indices(&mut self, entity: EntityHandle, mask: StitchMask, indices: &[u16]);
}

#[derive(Clone, Debug)]
struct HeadlessEntity {
    mesh: MeshHandle,
    queue: RenderQueue,
    priority: u8,
    attached: bool,
    mask: Option<StitchMask>,
}

/// A scene that keeps bookkeeping only. Used by the demo and by tests; it
/// panics on any operation against a handle that is not live, so lifecycle
/// bugs surface immediately.
#[derive(Debug, Default)]
pub struct HeadlessScene {
    next_id: u64,
    meshes: FxHashMap<MeshHandle, (PatchPath, usize)>,
    entities: FxHashMap<EntityHandle, HeadlessEntity>,
    mesh_users: FxHashSet<MeshHandle>,
    uploaded_vertices: usize,
}

impl HeadlessScene {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn live_meshes(&self) -> usize {
        self.meshes.len()
    }

    pub fn live_entities(&self) -> usize {
        self.entities.len()
    }

    pub fn attached_entities(&self) -> usize {
        self.entities.values().filter(|e| e.attached).count()
    }

    /// Attached entities per render queue.
    pub fn attached_in(&self, queue: RenderQueue) -> usize {
        self.entities
            .values()
            .filter(|e| e.attached && e.queue == queue)
            .count()
    }

    /// Total vertices ever uploaded.
    pub fn uploaded_vertices(&self) -> usize {
        self.uploaded_vertices
    }

    /// Mask of the index buffer last set on `entity`.
    pub fn mask_of(&self, entity: EntityHandle) -> Option<StitchMask> {
        self.entities.get(&entity).and_then(|e| e.mask)
    }

    pub fn priority_of(&self, entity: EntityHandle) -> Option<u8> {
        self.entities.get(&entity).map(|e| e.priority)
    }

    /// Path of the patch whose mesh `entity` draws.
    pub fn path_of(&self, entity: EntityHandle) -> Option<PatchPath> {
        let e = self.entities.get(&entity)?;
        self.meshes.get(&e.mesh).map(|(path, _)| *path)
    }

    fn entity_mut(&mut self, entity: EntityHandle) -> &mut HeadlessEntity {
        match self.entities.get_mut(&entity) {
            Some(e) => e,
            None => panic!("{entity:?} is not a live entity"),
        }
    }
}

impl SceneBackend for HeadlessScene {
    fn upload_mesh(&mut self, path: PatchPath, mesh: &PatchMesh) -> MeshHandle {
        self.next_id += 1;
        let handle = MeshHandle(self.next_id);
        self.uploaded_vertices += mesh.vertices.len();
        self.meshes.insert(handle, (path, mesh.vertices.len()));
        handle
    }

    fn release_mesh(&mut self, mesh: MeshHandle) {
        assert!(!self.mesh_users.contains(&mesh), "{mesh:?} released while an entity uses it");
        assert!(self.meshes.remove(&mesh).is_some(), "{mesh:?} released twice");
    }

    fn create_entity(
        &mut self,
        mesh: MeshHandle,
        queue: RenderQueue,
        priority: u8,
        _origin: DVec3,
    ) -> EntityHandle {
        assert!(self.meshes.contains_key(&mesh), "{mesh:?} is not a live mesh");
        self.next_id += 1;
        let handle = EntityHandle(self.next_id);
        self.mesh_users.insert(mesh);
        self.entities.insert(
            handle,
            HeadlessEntity {
                mesh,
                queue,
                priority,
                attached: false,
                mask: None,
            },
        );
        handle
    }

    fn destroy_entity(&mut self, entity: EntityHandle) {
        match self.entities.remove(&entity) {
            Some(e) => {
                self.mesh_users.remove(&e.mesh);
            }
            None => panic!("{entity:?} destroyed twice"),
        }
    }

    fn attach(&mut self, entity: EntityHandle) {
        self.entity_mut(entity).attached = true;
    }

    fn detach(&mut self, entity: EntityHandle) {
        self.entity_mut(entity).attached = false;
    }

    fn set_indices(&mut self, entity: EntityHandle, mask: StitchMask, _indices: &[u16]) {
        self.entity_mut(entity).mask = Some(mask);
    }
}
