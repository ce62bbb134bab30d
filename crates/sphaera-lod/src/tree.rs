//! Six face quadtrees for one planet layer.
//!
//! Patches live in an arena and refer to each other by [`PatchId`]. Every
//! frame [`PatchTree::set_camera_position`] walks the trees, children before
//! parents, and decides per patch whether to split or merge:
//!
//! * A patch splits once its four children are prepared and its four
//!   same-depth neighbours are in the [`VisibleRegistry`]. Until then it
//!   keeps showing itself.
//! * A patch merges once none of its children have children of their own.
//!   Children are reclaimed only when their preparation job is not
//!   running; a running job is left to finish and the child is reclaimed
//!   on a later frame.
//!
//! The registry holds every patch that was shown and not yet reclaimed.
//! Stitching masks are recomputed from it after each walk.

use std::sync::Arc;

use crossbeam_channel::{Receiver, Sender};
use glam::DVec3;
use rustc_hash::FxHashMap;
use sphaera_cubesphere::{CubeFace, Direction, Footprint, PatchPath, Quadrant};
use sphaera_math::{Aabb, Frustum};
use sphaera_mesh::{MeshBuilder, StitchMask, StitchingTable, TextureRange};
use sphaera_terrain::{DataSource, HeightField, HeightFieldBuilder};

use crate::queue::{
    JobId, PrepareError, PrepareHandle, PrepareRequest, PrepareResult, PreparedPatch, prepare,
};
use crate::scene::{EntityHandle, MeshHandle, RenderQueue, SceneBackend};
use crate::{HorizonCuller, VisibleRegistry};

/// Parameters of one layer.
#[derive(Clone, Debug)]
pub struct TreeSettings {
    /// Prefix for patch names in logs, e.g. `Surface`.
    pub name: String,
    pub base_radius: f64,
    /// Heights are multiplied by this before being added to the radius.
    pub scaling_factor: f64,
    pub quads: u32,
    pub padding: u32,
    pub min_depth: u8,
    pub max_depth: u8,
    /// Number of deepest levels that share one texture tile.
    pub texture_tiling_depth: u8,
    pub render_queue: RenderQueue,
    /// Radius of the sphere that occludes patches behind the horizon.
    pub horizon_radius: f64,
}

impl TreeSettings {
    /// Texture extent of a root patch. Each level halves it.
    fn root_texture_extent(&self) -> f64 {
        f64::from(1u32 << self.max_depth.min(31))
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TreeStats {
    pub patches: usize,
    pub shown: usize,
    pub attached: usize,
    pub preparing: usize,
    pub failed: usize,
    pub deepest_shown: u8,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
struct PatchId(usize);

#[derive(Debug)]
struct ReadyPatch {
    heights: Arc<HeightField>,
    bounds: Aabb,
    mesh: MeshHandle,
    entity: EntityHandle,
}

#[derive(Debug)]
enum PatchState {
    Preparing(JobId),
    /// Preparation failed; the parent keeps waiting until it merges.
    Failed,
    Ready(ReadyPatch),
}

#[derive(Debug)]
struct Patch {
    path: PatchPath,
    footprint: Footprint,
    texture: TextureRange,
    children: [Option<PatchId>; 4],
    state: PatchState,
    /// Drawn as part of the surface (not replaced by its children).
    shown: bool,
    /// Entity is attached to the scene. Only shown patches are attached,
    /// and horizon culling may detach them.
    attached: bool,
    /// Children are shown in place of this patch.
    split: bool,
    mask: StitchMask,
}

impl Patch {
    fn ready(&self) -> Option<&ReadyPatch> {
        match &self.state {
            PatchState::Ready(ready) => Some(ready),
            _ => None,
        }
    }

    fn has_children(&self) -> bool {
        self.children.iter().any(Option::is_some)
    }
}

#[derive(Debug, Default)]
struct Arena {
    slots: Vec<Option<Patch>>,
    free: Vec<usize>,
}

impl Arena {
    fn insert(&mut self, patch: Patch) -> PatchId {
        match self.free.pop() {
            Some(index) => {
                self.slots[index] = Some(patch);
                PatchId(index)
            }
            None => {
                self.slots.push(Some(patch));
                PatchId(self.slots.len() - 1)
            }
        }
    }

    fn remove(&mut self, id: PatchId) -> Patch {
        match self.slots[id.0].take() {
            Some(patch) => {
                self.free.push(id.0);
                patch
            }
            None => panic!("patch {id:?} reclaimed twice"),
        }
    }

    fn len(&self) -> usize {
        self.slots.len() - self.free.len()
    }

    fn iter(&self) -> impl Iterator<Item = (PatchId, &Patch)> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(i, slot)| slot.as_ref().map(|p| (PatchId(i), p)))
    }
}

impl std::ops::Index<PatchId> for Arena {
    type Output = Patch;

    fn index(&self, id: PatchId) -> &Patch {
        match &self.slots[id.0] {
            Some(patch) => patch,
            None => panic!("stale patch id {id:?}"),
        }
    }
}

impl std::ops::IndexMut<PatchId> for Arena {
    fn index_mut(&mut self, id: PatchId) -> &mut Patch {
        match &mut self.slots[id.0] {
            Some(patch) => patch,
            None => panic!("stale patch id {id:?}"),
        }
    }
}

/// One layer of the planet: six root patches and everything below them.
pub struct PatchTree {
    settings: TreeSettings,
    source: Arc<dyn DataSource>,
    queue: PrepareHandle,
    stitching: Arc<StitchingTable>,
    arena: Arena,
    roots: Vec<PatchId>,
    jobs: FxHashMap<JobId, PatchId>,
    results_tx: Sender<PrepareResult>,
    results_rx: Receiver<PrepareResult>,
    registry: VisibleRegistry,
    camera: DVec3,
    geometry_updated: bool,
}

impl PatchTree {
    /// Build the six roots synchronously and show them.
    ///
    /// # Panics
    /// If the settings are inconsistent with each other or with `stitching`.
    pub fn new(
        settings: TreeSettings,
        source: Arc<dyn DataSource>,
        queue: PrepareHandle,
        stitching: Arc<StitchingTable>,
        scene: &mut dyn SceneBackend,
    ) -> Result<Self, PrepareError> {
        assert_eq!(
            settings.quads,
            stitching.quads(),
            "stitching table built for a different resolution"
        );
        assert!(
            settings.min_depth <= settings.max_depth,
            "min depth {} exceeds max depth {}",
            settings.min_depth,
            settings.max_depth
        );
        assert!(
            settings.max_depth < sphaera_cubesphere::MAX_DEPTH,
            "max depth {} is too deep",
            settings.max_depth
        );

        let (results_tx, results_rx) = crossbeam_channel::unbounded();
        let mut tree = Self {
            settings,
            source,
            queue,
            stitching,
            arena: Arena::default(),
            roots: Vec::with_capacity(6),
            jobs: FxHashMap::default(),
            results_tx,
            results_rx,
            registry: VisibleRegistry::new(),
            camera: DVec3::ZERO,
            geometry_updated: false,
        };

        let texture = TextureRange::square(tree.settings.root_texture_extent());
        for face in CubeFace::ALL {
            let footprint = Footprint::root(face);
            let prepared = prepare(&tree.request(&footprint, texture, None))?;
            let id = tree.arena.insert(Patch {
                path: PatchPath::root(face),
                footprint,
                texture,
                children: [None; 4],
                state: PatchState::Failed,
                shown: false,
                attached: false,
                split: false,
                mask: StitchMask::NONE,
            });
            tree.finish(id, prepared, scene);
            tree.show(id, scene);
            tree.roots.push(id);
        }
        tracing::debug!(layer = %tree.settings.name, "root patches prepared");
        Ok(tree)
    }

    pub fn settings(&self) -> &TreeSettings {
        &self.settings
    }

    pub fn registry(&self) -> &VisibleRegistry {
        &self.registry
    }

    /// Direct registry access, for tools and tests that need to stage
    /// neighbour configurations.
    pub fn registry_mut(&mut self) -> &mut VisibleRegistry {
        &mut self.registry
    }

    /// Human-readable name of a patch, e.g. `SurfaceRight012`.
    pub fn patch_name(&self, path: &PatchPath) -> String {
        format!("{}{path}", self.settings.name)
    }

    fn request(
        &self,
        footprint: &Footprint,
        texture: TextureRange,
        parent: Option<(Arc<HeightField>, Quadrant)>,
    ) -> PrepareRequest {
        let s = &self.settings;
        PrepareRequest {
            source: Arc::clone(&self.source),
            footprint: *footprint,
            parent,
            heights: HeightFieldBuilder::new(s.quads, s.padding),
            mesh: MeshBuilder::new(s.base_radius, s.scaling_factor, texture),
            priority_bounds: PrepareRequest::footprint_bounds(footprint, s.base_radius),
        }
    }

    /// Upload a prepared patch and create its (detached) entity.
    fn finish(&mut self, id: PatchId, prepared: PreparedPatch, scene: &mut dyn SceneBackend) {
        let path = self.arena[id].path;
        let mesh = scene.upload_mesh(path, &prepared.mesh);
        let priority = self.settings.max_depth.saturating_sub(path.depth());
        let entity = scene.create_entity(
            mesh,
            self.settings.render_queue,
            priority,
            prepared.mesh.center,
        );
        scene.set_indices(
            entity,
            StitchMask::NONE,
            self.stitching.indices(StitchMask::NONE),
        );
        let patch = &mut self.arena[id];
        patch.mask = StitchMask::NONE;
        patch.state = PatchState::Ready(ReadyPatch {
            heights: prepared.height_field,
            bounds: prepared.mesh.bounds,
            mesh,
            entity,
        });
    }

    fn show(&mut self, id: PatchId, scene: &mut dyn SceneBackend) {
        let patch = &mut self.arena[id];
        patch.shown = true;
        if !patch.attached
            && let Some(ready) = patch.ready()
        {
            scene.attach(ready.entity);
            patch.attached = true;
        }
        self.registry.insert(patch.path);
        self.geometry_updated = true;
    }

    /// Stop drawing a patch. It stays registered until reclaimed.
    fn hide(&mut self, id: PatchId, scene: &mut dyn SceneBackend) {
        let patch = &mut self.arena[id];
        patch.shown = false;
        if patch.attached
            && let Some(ready) = patch.ready()
        {
            scene.detach(ready.entity);
            patch.attached = false;
        }
        self.geometry_updated = true;
    }

    /// Upload finished preparations. Never blocks.
    fn collect_results(&mut self, scene: &mut dyn SceneBackend) {
        while let Ok(result) = self.results_rx.try_recv() {
            let Some(id) = self.jobs.remove(&result.id) else {
                continue;
            };
            match result.outcome {
                Ok(prepared) => self.finish(id, prepared, scene),
                Err(err) => {
                    tracing::warn!(
                        patch = %self.patch_name(&self.arena[id].path),
                        %err,
                        "patch preparation failed, keeping coarser level"
                    );
                    self.arena[id].state = PatchState::Failed;
                }
            }
        }
    }

    /// Run one LOD pass for a new camera position in planet space.
    pub fn set_camera_position(&mut self, camera: DVec3, scene: &mut dyn SceneBackend) {
        self.camera = camera;
        self.collect_results(scene);
        self.queue.set_camera_position(camera);
        for root in self.roots.clone() {
            self.update(root, scene);
        }
        self.update_stitching(scene);
    }

    fn update(&mut self, id: PatchId, scene: &mut dyn SceneBackend) {
        for child in self.arena[id].children.into_iter().flatten() {
            self.update(child, scene);
        }

        let patch = &self.arena[id];
        let Some(ready) = patch.ready() else {
            return;
        };
        if !patch.shown && !patch.split {
            return;
        }
        let depth = patch.path.depth();
        let diagonal = ready.bounds.diagonal();
        let near = ready.bounds.squared_distance_to_point(self.camera) < diagonal * diagonal;
        let s = &self.settings;
        if depth < s.min_depth || (depth < s.max_depth && near) {
            self.split(id, scene);
        } else {
            self.merge(id, scene);
        }
    }

    fn split(&mut self, id: PatchId, scene: &mut dyn SceneBackend) {
        let patch = &self.arena[id];
        if patch.split {
            return;
        }
        let children = patch.children;
        let all_ready = children
            .iter()
            .all(|c| c.is_some_and(|c| self.arena[c].ready().is_some()));

        if all_ready {
            let path = patch.path;
            if !path.neighbours().iter().all(|n| self.registry.contains(n)) {
                tracing::trace!(patch = %self.patch_name(&path), "split waiting for neighbours");
                return;
            }
            for child in children.into_iter().flatten() {
                self.show(child, scene);
            }
            self.hide(id, scene);
            self.arena[id].split = true;
            tracing::debug!(patch = %self.patch_name(&path), "split");
        } else if children.iter().any(Option::is_none) {
            self.create_children(id);
        }
    }

    fn create_children(&mut self, id: PatchId) {
        let patch = &self.arena[id];
        let Some(ready) = patch.ready() else {
            return;
        };
        let heights = Arc::clone(&ready.heights);
        let (path, footprint, texture) = (patch.path, patch.footprint, patch.texture);
        let missing: Vec<Quadrant> = Quadrant::ALL
            .into_iter()
            .filter(|q| patch.children[q.index() as usize].is_none())
            .collect();

        for quadrant in missing {
            let child_footprint = footprint.child(quadrant);
            let child_texture = texture.child(
                quadrant,
                path.depth(),
                self.settings.max_depth,
                self.settings.texture_tiling_depth,
            );
            let request = self.request(
                &child_footprint,
                child_texture,
                Some((Arc::clone(&heights), quadrant)),
            );
            let job = self.queue.submit(request, self.results_tx.clone());
            let child = self.arena.insert(Patch {
                path: path.child(quadrant),
                footprint: child_footprint,
                texture: child_texture,
                children: [None; 4],
                state: PatchState::Preparing(job),
                shown: false,
                attached: false,
                split: false,
                mask: StitchMask::NONE,
            });
            self.jobs.insert(job, child);
            self.arena[id].children[quadrant.index() as usize] = Some(child);
        }
    }

    fn merge(&mut self, id: PatchId, scene: &mut dyn SceneBackend) {
        let children = self.arena[id].children;
        if children.iter().all(Option::is_none) {
            return;
        }
        if children
            .iter()
            .flatten()
            .any(|&c| self.arena[c].has_children())
        {
            return;
        }

        if self.arena[id].split {
            self.show(id, scene);
            for child in children.into_iter().flatten() {
                self.hide(child, scene);
            }
            self.arena[id].split = false;
            tracing::debug!(patch = %self.patch_name(&self.arena[id].path), "merge");
        }

        for (slot, child) in children.into_iter().enumerate() {
            if let Some(child) = child
                && self.reclaim(child, scene)
            {
                self.arena[id].children[slot] = None;
            }
        }
    }

    /// Free a leaf patch and its scene resources unless its preparation is
    /// running. Returns whether it was freed.
    fn reclaim(&mut self, id: PatchId, scene: &mut dyn SceneBackend) -> bool {
        if let PatchState::Preparing(job) = self.arena[id].state {
            if !self.queue.cancel(job) {
                return false;
            }
            self.jobs.remove(&job);
        }
        if self.arena[id].shown {
            self.hide(id, scene);
        }
        let patch = self.arena.remove(id);
        self.registry.remove(&patch.path);
        if let PatchState::Ready(ready) = patch.state {
            scene.destroy_entity(ready.entity);
            scene.release_mesh(ready.mesh);
        }
        tracing::trace!(patch = %self.patch_name(&patch.path), "reclaimed");
        true
    }

    /// Point every shown patch at the index buffer matching which of its
    /// neighbours are missing at its depth.
    fn update_stitching(&mut self, scene: &mut dyn SceneBackend) {
        let changes: Vec<(PatchId, StitchMask)> = self
            .arena
            .iter()
            .filter(|(_, p)| p.shown && !p.path.is_root())
            .filter_map(|(id, p)| {
                let mask = Direction::ALL
                    .into_iter()
                    .filter(|&dir| !self.registry.contains(&p.path.neighbour(dir)))
                    .fold(StitchMask::NONE, StitchMask::with);
                (mask != p.mask).then_some((id, mask))
            })
            .collect();

        for (id, mask) in changes {
            let patch = &mut self.arena[id];
            if let Some(ready) = patch.ready() {
                scene.set_indices(ready.entity, mask, self.stitching.indices(mask));
                patch.mask = mask;
                self.geometry_updated = true;
            }
        }
    }

    /// Detach shown patches that are behind the horizon and reattach the
    /// ones that came back into view.
    pub fn pre_render(&mut self, scene: &mut dyn SceneBackend) {
        let culler = HorizonCuller::new(self.camera, DVec3::ZERO, self.settings.horizon_radius);
        for slot in &mut self.arena.slots {
            let Some(patch) = slot else { continue };
            if !patch.shown {
                continue;
            }
            let Some(ready) = patch.ready() else { continue };
            let occluded = culler.is_occluded(&ready.bounds);
            if occluded && patch.attached {
                scene.detach(ready.entity);
                patch.attached = false;
            } else if !occluded && !patch.attached {
                scene.attach(ready.entity);
                patch.attached = true;
            }
        }
    }

    /// Clears the geometry-updated flag. Always asks to keep rendering.
    pub fn post_render(&mut self) -> bool {
        self.geometry_updated = false;
        true
    }

    /// Whether any patch was shown, hidden, or restitched since the last
    /// [`PatchTree::post_render`].
    pub fn geometry_updated(&self) -> bool {
        self.geometry_updated
    }

    /// Preparations submitted and not yet collected.
    pub fn pending_jobs(&self) -> usize {
        self.jobs.len()
    }

    pub fn patch_count(&self) -> usize {
        self.arena.len()
    }

    pub fn stats(&self) -> TreeStats {
        let mut stats = TreeStats {
            patches: self.arena.len(),
            ..TreeStats::default()
        };
        for (_, patch) in self.arena.iter() {
            match patch.state {
                PatchState::Preparing(_) => stats.preparing += 1,
                PatchState::Failed => stats.failed += 1,
                PatchState::Ready(_) => {}
            }
            if patch.shown {
                stats.shown += 1;
                stats.deepest_shown = stats.deepest_shown.max(patch.path.depth());
            }
            if patch.attached {
                stats.attached += 1;
            }
        }
        stats
    }

    fn find(&self, path: &PatchPath) -> Option<PatchId> {
        let root = self
            .roots
            .iter()
            .copied()
            .find(|&r| self.arena[r].path.face() == path.face())?;
        path.quadrants().try_fold(root, |id, q| {
            self.arena[id].children[q.index() as usize]
        })
    }

    /// Paths of all shown patches, sorted.
    pub fn shown_paths(&self) -> Vec<PatchPath> {
        let mut paths: Vec<PatchPath> = self
            .arena
            .iter()
            .filter(|(_, p)| p.shown)
            .map(|(_, p)| p.path)
            .collect();
        paths.sort_by_key(|p| (p.face() as u8, p.depth(), p.to_string()));
        paths
    }

    pub fn contains(&self, path: &PatchPath) -> bool {
        self.find(path).is_some()
    }

    /// Whether the patch exists and has a prepared mesh.
    pub fn is_ready(&self, path: &PatchPath) -> bool {
        self.find(path)
            .is_some_and(|id| self.arena[id].ready().is_some())
    }

    pub fn is_split(&self, path: &PatchPath) -> bool {
        self.find(path).is_some_and(|id| self.arena[id].split)
    }

    pub fn is_shown(&self, path: &PatchPath) -> bool {
        self.find(path).is_some_and(|id| self.arena[id].shown)
    }

    pub fn is_attached(&self, path: &PatchPath) -> bool {
        self.find(path).is_some_and(|id| self.arena[id].attached)
    }

    /// Stitch mask currently applied to a patch.
    pub fn stitch_mask(&self, path: &PatchPath) -> Option<StitchMask> {
        self.find(path).map(|id| self.arena[id].mask)
    }

    /// Entity of a prepared patch.
    pub fn entity(&self, path: &PatchPath) -> Option<EntityHandle> {
        let id = self.find(path)?;
        self.arena[id].ready().map(|r| r.entity)
    }

    /// Bounds of a prepared patch in planet space.
    pub fn bounds(&self, path: &PatchPath) -> Option<Aabb> {
        let id = self.find(path)?;
        self.arena[id].ready().map(|r| r.bounds)
    }

    /// A patch is visible if any descendant is, or if it is attached and
    /// its bounds intersect `frustum`.
    pub fn is_visible(&self, path: &PatchPath, frustum: &Frustum) -> bool {
        self.find(path)
            .is_some_and(|id| self.visible(id, frustum))
    }

    fn visible(&self, id: PatchId, frustum: &Frustum) -> bool {
        let patch = &self.arena[id];
        if patch
            .children
            .iter()
            .flatten()
            .any(|&c| self.visible(c, frustum))
        {
            return true;
        }
        patch.attached && patch.ready().is_some_and(|r| frustum.intersects(&r.bounds))
    }

    /// Shown, attached patches inside `frustum`.
    pub fn visible_patches(&self, frustum: &Frustum) -> Vec<PatchPath> {
        self.arena
            .iter()
            .filter(|(_, p)| p.attached && p.ready().is_some_and(|r| frustum.intersects(&r.bounds)))
            .map(|(_, p)| p.path)
            .collect()
    }

    /// Tear the layer down: cancel queued work and free every scene
    /// resource. Running jobs finish and their results are discarded.
    pub fn release(mut self, scene: &mut dyn SceneBackend) {
        for job in self.jobs.keys() {
            self.queue.cancel(*job);
        }
        let ids: Vec<PatchId> = self.arena.iter().map(|(id, _)| id).collect();
        for id in ids {
            let patch = self.arena.remove(id);
            if let PatchState::Ready(ready) = patch.state {
                if patch.attached {
                    scene.detach(ready.entity);
                }
                scene.destroy_entity(ready.entity);
                scene.release_mesh(ready.mesh);
            }
        }
        self.registry = VisibleRegistry::new();
        tracing::debug!(layer = %self.settings.name, "layer released");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{HeadlessScene, PrepareQueue, QueueConfig};
    use sphaera_terrain::{ConstantSource, DataSourceError};
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::{Duration, Instant};

    const R: f64 = 6371.0;

    fn settings(min_depth: u8, max_depth: u8) -> TreeSettings {
        TreeSettings {
            name: "Surface".to_owned(),
            base_radius: R,
            scaling_factor: 1.0,
            quads: 4,
            padding: 2,
            min_depth,
            max_depth,
            texture_tiling_depth: 9,
            render_queue: RenderQueue::Main,
            horizon_radius: R,
        }
    }

    struct Harness {
        queue: PrepareQueue,
        scene: HeadlessScene,
        tree: PatchTree,
    }

    impl Harness {
        fn new(settings: TreeSettings, source: Arc<dyn DataSource>) -> Self {
            let queue = PrepareQueue::new(QueueConfig::default()).unwrap();
            let mut scene = HeadlessScene::new();
            let stitching = Arc::new(StitchingTable::new(settings.quads).unwrap());
            let tree =
                PatchTree::new(settings, source, queue.handle(), stitching, &mut scene).unwrap();
            Self { queue, scene, tree }
        }

        fn frame(&mut self, camera: DVec3) {
            self.tree.pre_render(&mut self.scene);
            self.tree.set_camera_position(camera, &mut self.scene);
            assert!(self.tree.post_render());
        }

        /// Run frames until no work is pending and the tree stops changing.
        fn converge(&mut self, camera: DVec3) {
            let deadline = Instant::now() + Duration::from_secs(20);
            let mut quiet = 0;
            while quiet < 3 {
                assert!(Instant::now() < deadline, "tree did not settle");
                let before = self.tree.stats();
                self.frame(camera);
                if self.tree.pending_jobs() == 0 && self.tree.stats() == before {
                    quiet += 1;
                } else {
                    quiet = 0;
                    std::thread::sleep(Duration::from_millis(2));
                }
            }
        }
    }

    fn constant() -> Arc<dyn DataSource> {
        Arc::new(ConstantSource::new(0.0))
    }

    fn front() -> PatchPath {
        PatchPath::root(CubeFace::Front)
    }

    #[test]
    fn test_roots_are_shown_after_construction() {
        let h = Harness::new(settings(0, 2), constant());
        assert_eq!(h.tree.patch_count(), 6);
        assert_eq!(h.tree.registry().len(), 6);
        assert_eq!(h.scene.attached_entities(), 6);
        assert!(h.tree.geometry_updated());
        assert_eq!(h.tree.patch_name(&front()), "SurfaceFront");
    }

    #[test]
    fn test_far_camera_keeps_only_roots() {
        let mut h = Harness::new(settings(0, 2), constant());
        h.converge(DVec3::new(0.0, 0.0, 10.0 * R));
        assert_eq!(h.tree.patch_count(), 6, "no children should be constructed");
        assert_eq!(h.tree.shown_paths().len(), 6);
    }

    #[test]
    fn test_camera_near_face_splits_only_that_face() {
        let mut h = Harness::new(settings(0, 2), constant());
        // 12000 above the Front centre: inside the Front root's diagonal
        // (about 13000), outside its children's (about 6900) and further
        // than that from every other root.
        h.converge(DVec3::new(0.0, 0.0, R + 12_000.0));

        assert!(h.tree.is_split(&front()));
        assert!(!h.tree.is_shown(&front()));
        for face in CubeFace::ALL.into_iter().filter(|&f| f != CubeFace::Front) {
            let root = PatchPath::root(face);
            assert!(h.tree.is_shown(&root), "{root} should stay a shown leaf");
            assert!(!h.tree.is_split(&root));
        }
        assert_eq!(h.tree.patch_count(), 10);
        let stats = h.tree.stats();
        assert_eq!(stats.shown, 9);
        assert_eq!(stats.deepest_shown, 1);
        for q in Quadrant::ALL {
            assert!(!h.tree.is_split(&front().child(q)), "children must not split");
        }
        // Front is still registered, hidden behind its children.
        assert!(h.tree.registry().contains(&front()));
    }

    #[test]
    fn test_children_stitch_against_coarser_faces() {
        let mut h = Harness::new(settings(0, 2), constant());
        h.converge(DVec3::new(0.0, 0.0, R + 12_000.0));

        let nw = front().child(Quadrant::NorthWest);
        let expected = StitchMask::WEST.with(Direction::North);
        assert_eq!(h.tree.stitch_mask(&nw), Some(expected));
        let entity = h.tree.entity(&nw).unwrap();
        assert_eq!(h.scene.mask_of(entity), Some(expected));

        let se = front().child(Quadrant::SouthEast);
        assert_eq!(
            h.tree.stitch_mask(&se),
            Some(StitchMask::EAST.with(Direction::South))
        );
        assert_eq!(h.tree.stitch_mask(&front()), Some(StitchMask::NONE));
    }

    #[test]
    fn test_split_then_merge_reclaims_children() {
        let mut h = Harness::new(settings(0, 2), constant());
        h.converge(DVec3::new(0.0, 0.0, R + 12_000.0));
        assert_eq!(h.tree.patch_count(), 10);

        h.converge(DVec3::new(0.0, 0.0, 10.0 * R));
        assert!(h.tree.is_shown(&front()));
        assert!(!h.tree.is_split(&front()));
        assert_eq!(h.tree.patch_count(), 6);
        assert_eq!(h.tree.registry().len(), 6);
        assert_eq!(h.scene.live_entities(), 6);
        assert_eq!(h.scene.live_meshes(), 6);
    }

    #[test]
    fn test_min_depth_forces_split_everywhere() {
        let mut h = Harness::new(settings(1, 1), constant());
        h.converge(DVec3::new(0.0, 0.0, 10.0 * R));
        assert_eq!(h.tree.patch_count(), 30);
        assert_eq!(h.tree.stats().shown, 24);
        assert!(h.tree.shown_paths().iter().all(|p| p.depth() == 1));
        // Everything at depth one, so nothing needs stitching.
        for path in h.tree.shown_paths() {
            assert_eq!(h.tree.stitch_mask(&path), Some(StitchMask::NONE));
        }
    }

    #[test]
    fn test_split_waits_for_missing_neighbour() {
        let mut h = Harness::new(settings(1, 2), constant());
        h.converge(DVec3::new(0.0, 0.0, 10.0 * R));

        let nw = front().child(Quadrant::NorthWest);
        let west = nw.neighbour(Direction::West);
        assert_eq!(west.face(), CubeFace::Left);
        assert!(h.tree.registry_mut().remove(&west));

        let camera = DVec3::new(-0.5, 0.5, 1.0).normalize() * (R + 100.0);
        h.converge(camera);
        for q in Quadrant::ALL {
            assert!(h.tree.is_ready(&nw.child(q)), "children are prepared");
        }
        assert!(!h.tree.is_split(&nw), "must not split next to an absent neighbour");
        assert!(h.tree.is_shown(&nw));

        h.tree.registry_mut().insert(west);
        h.frame(camera);
        assert!(h.tree.is_split(&nw));
        assert!(h.tree.is_shown(&nw.child(Quadrant::SouthEast)));
    }

    /// Source whose sampling can be held up or made to fail after the
    /// roots are built.
    #[derive(Default)]
    struct Switchable {
        blocked: AtomicBool,
        broken: AtomicBool,
    }

    impl DataSource for Switchable {
        fn height(&self, position: DVec3) -> Result<f64, DataSourceError> {
            while self.blocked.load(Ordering::Acquire) {
                std::thread::sleep(Duration::from_millis(1));
            }
            if self.broken.load(Ordering::Acquire) {
                return Err(DataSourceError::Sample {
                    position,
                    reason: "switched off".into(),
                });
            }
            Ok(0.0)
        }
    }

    #[test]
    fn test_running_preparation_delays_reclamation() {
        let source = Arc::new(Switchable::default());
        let mut h = Harness::new(settings(0, 1), source.clone());
        source.blocked.store(true, Ordering::Release);

        h.frame(DVec3::new(0.0, 0.0, R + 12_000.0));
        assert_eq!(h.tree.patch_count(), 10);
        let handle = h.queue.handle();
        let deadline = Instant::now() + Duration::from_secs(10);
        while handle.stats().in_flight != 1 {
            assert!(Instant::now() < deadline, "worker never started");
            std::thread::sleep(Duration::from_millis(1));
        }

        let far = DVec3::new(0.0, 0.0, 10.0 * R);
        h.frame(far);
        assert_eq!(h.tree.patch_count(), 7, "the running child must survive");
        assert_eq!(handle.stats().cancelled, 3);

        source.blocked.store(false, Ordering::Release);
        h.converge(far);
        assert_eq!(h.tree.patch_count(), 6);
        assert_eq!(h.scene.live_entities(), 6);
        assert_eq!(h.scene.live_meshes(), 6);
        assert_eq!(h.tree.pending_jobs(), 0);
    }

    #[test]
    fn test_failed_children_freeze_parent_level() {
        let source = Arc::new(Switchable::default());
        let mut h = Harness::new(settings(0, 1), source.clone());
        source.broken.store(true, Ordering::Release);

        let near = DVec3::new(0.0, 0.0, R + 12_000.0);
        h.converge(near);
        assert!(h.tree.is_shown(&front()));
        assert!(!h.tree.is_split(&front()));
        assert_eq!(h.tree.stats().failed, 4);

        h.converge(DVec3::new(0.0, 0.0, 10.0 * R));
        assert_eq!(h.tree.patch_count(), 6, "failed children are reclaimed on merge");
    }

    #[test]
    fn test_horizon_culling_detaches_far_side() {
        let mut h = Harness::new(settings(0, 0), constant());
        let back = PatchPath::root(CubeFace::Back);

        h.frame(DVec3::new(0.0, 0.0, 2.0 * R));
        h.tree.pre_render(&mut h.scene);
        assert!(!h.tree.is_attached(&back));
        assert!(h.tree.is_shown(&back), "culling does not hide patches");
        assert!(h.tree.is_attached(&front()));

        h.frame(DVec3::new(0.0, 0.0, -2.0 * R));
        h.tree.pre_render(&mut h.scene);
        assert!(h.tree.is_attached(&back));
        assert!(!h.tree.is_attached(&front()));
        assert_eq!(h.scene.attached_entities(), 5);
    }

    #[test]
    fn test_visibility_follows_frustum_and_descendants() {
        let mut h = Harness::new(settings(0, 2), constant());
        let camera = DVec3::new(0.0, 0.0, R + 12_000.0);
        h.converge(camera);

        let view = glam::DMat4::look_at_rh(camera, DVec3::ZERO, DVec3::Y);
        let proj = glam::DMat4::perspective_rh(60f64.to_radians(), 1.0, 1.0, 1e6);
        let frustum = Frustum::from_view_projection(&(proj * view));

        assert!(h.tree.is_visible(&front(), &frustum), "visible through its children");
        assert!(!h.tree.is_visible(&PatchPath::root(CubeFace::Back), &frustum));
        let visible = h.tree.visible_patches(&frustum);
        assert!(visible.iter().all(|p| p.face() != CubeFace::Back));
        assert!(visible.contains(&front().child(Quadrant::NorthEast)));
    }

    #[test]
    fn test_entity_priority_and_texture_tiling() {
        let mut h = Harness::new(settings(0, 2), constant());
        h.converge(DVec3::new(0.0, 0.0, R + 12_000.0));
        let root_entity = h.tree.entity(&front()).unwrap();
        let child_entity = h.tree.entity(&front().child(Quadrant::NorthWest)).unwrap();
        assert_eq!(h.scene.priority_of(root_entity), Some(2));
        assert_eq!(h.scene.priority_of(child_entity), Some(1));
    }

    #[test]
    fn test_post_render_clears_geometry_flag() {
        let mut h = Harness::new(settings(0, 0), constant());
        assert!(h.tree.geometry_updated());
        assert!(h.tree.post_render());
        assert!(!h.tree.geometry_updated());
        h.tree.set_camera_position(DVec3::new(0.0, 0.0, 5.0 * R), &mut h.scene);
        assert!(!h.tree.geometry_updated(), "nothing changed");
    }

    #[test]
    fn test_release_frees_scene_resources() {
        let mut h = Harness::new(settings(0, 2), constant());
        h.converge(DVec3::new(0.0, 0.0, R + 12_000.0));
        let Harness { queue, mut scene, tree } = h;
        tree.release(&mut scene);
        assert_eq!(scene.live_entities(), 0);
        assert_eq!(scene.live_meshes(), 0);
        drop(queue);
    }
}
