//! Background patch preparation.
//!
//! One named worker thread samples height fields and builds meshes. Requests
//! arrive over a channel, so submitting never blocks the render thread. The
//! worker moves them into its own active queue, which it re-sorts by
//! squared distance to the last published camera position at most once per
//! resort interval, nearest first. Between resorts new work is served in
//! arrival order.
//!
//! Every job has a status entry while it is queued or running. Cancelling
//! removes a `Queued` entry; the worker skips jobs whose entry is gone. A
//! job that has started cannot be cancelled and always reports a result.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, Sender, select};
use dashmap::DashMap;
use glam::DVec3;
use sphaera_cubesphere::{Footprint, Quadrant};
use sphaera_math::Aabb;
use sphaera_mesh::{MeshBuilder, MeshError, PatchMesh};
use sphaera_terrain::{
    DataSource, DataSourceError, HeightField, HeightFieldBuilder, ParentSamples,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct JobId(pub u64);

#[derive(Debug, thiserror::Error)]
pub enum PrepareError {
    #[error("height sampling failed: {0}")]
    Source(#[from] DataSourceError),
    #[error("mesh construction failed: {0}")]
    Mesh(#[from] MeshError),
}

/// Everything needed to prepare one patch, owned so it can cross threads.
pub struct PrepareRequest {
    pub source: Arc<dyn DataSource>,
    pub footprint: Footprint,
    /// Parent height field and the quadrant of it this patch covers.
    pub parent: Option<(Arc<HeightField>, Quadrant)>,
    pub heights: HeightFieldBuilder,
    pub mesh: MeshBuilder,
    /// Rough bounds used only for prioritising.
    pub priority_bounds: Aabb,
}

impl PrepareRequest {
    /// Priority bounds for a footprint on a sphere of `radius`: the box
    /// around its corners and centre projected onto the sphere.
    pub fn footprint_bounds(footprint: &Footprint, radius: f64) -> Aabb {
        let corners = footprint.corners();
        let center = (corners[0] + corners[3]) * 0.5;
        let points = corners.into_iter().chain([center]).map(|p| p.normalize() * radius);
        Aabb::from_points(points).unwrap_or(Aabb::new(DVec3::ZERO, DVec3::ZERO))
    }
}

#[derive(Debug)]
pub struct PreparedPatch {
    pub height_field: Arc<HeightField>,
    pub mesh: PatchMesh,
}

#[derive(Debug)]
pub struct PrepareResult {
    pub id: JobId,
    pub outcome: Result<PreparedPatch, PrepareError>,
}

/// Sample and mesh one patch on the calling thread.
pub fn prepare(request: &PrepareRequest) -> Result<PreparedPatch, PrepareError> {
    let parent = request.parent.as_ref().map(|(field, quadrant)| ParentSamples {
        field: field.as_ref(),
        quadrant: *quadrant,
    });
    let field = request
        .heights
        .build(request.source.as_ref(), &request.footprint, parent)?;
    let mesh = request.mesh.build(&field)?;
    Ok(PreparedPatch {
        height_field: Arc::new(field),
        mesh,
    })
}

#[derive(Clone, Debug)]
pub struct QueueConfig {
    pub resort_interval: Duration,
    pub thread_name: String,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            resort_interval: Duration::from_secs(1),
            thread_name: "patch-prepare".to_owned(),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct QueueStats {
    /// Submitted and neither started nor cancelled.
    pub queued: usize,
    pub in_flight: usize,
    pub completed: usize,
    pub failed: usize,
    pub cancelled: usize,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum JobState {
    Queued,
    InFlight,
}

struct QueuedJob {
    id: JobId,
    request: PrepareRequest,
    reply: Sender<PrepareResult>,
}

struct Shared {
    camera: Mutex<DVec3>,
    status: DashMap<JobId, JobState>,
    abort: AtomicBool,
    next_id: AtomicU64,
    in_flight: AtomicUsize,
    completed: AtomicUsize,
    failed: AtomicUsize,
    cancelled: AtomicUsize,
}

impl Shared {
    fn camera(&self) -> DVec3 {
        *self.camera.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Cloneable submission side of a [`PrepareQueue`].
#[derive(Clone)]
pub struct PrepareHandle {
    jobs: Sender<QueuedJob>,
    shared: Arc<Shared>,
}

impl PrepareHandle {
    /// Queue `request`; the result is sent to `reply` when done.
    pub fn submit(&self, request: PrepareRequest, reply: Sender<PrepareResult>) -> JobId {
        let id = JobId(self.shared.next_id.fetch_add(1, Ordering::Relaxed));
        self.shared.status.insert(id, JobState::Queued);
        if self.jobs.send(QueuedJob { id, request, reply }).is_err() {
            // Worker is gone (shutdown); the job will never run.
            self.shared.status.remove(&id);
            tracing::warn!(?id, "prepare queue closed, request dropped");
        } else {
            tracing::trace!(?id, "patch preparation queued");
        }
        id
    }

    /// Remove a job that has not started. Returns `false` if it is running,
    /// finished, or unknown.
    pub fn cancel(&self, id: JobId) -> bool {
        let removed = self
            .shared
            .status
            .remove_if(&id, |_, state| *state == JobState::Queued)
            .is_some();
        if removed {
            self.shared.cancelled.fetch_add(1, Ordering::Relaxed);
        }
        removed
    }

    /// Whether `id` is queued or running.
    pub fn is_pending(&self, id: JobId) -> bool {
        self.shared.status.contains_key(&id)
    }

    /// Publish the camera position used for prioritising.
    pub fn set_camera_position(&self, position: DVec3) {
        *self.shared.camera.lock().unwrap_or_else(PoisonError::into_inner) = position;
    }

    pub fn stats(&self) -> QueueStats {
        let in_flight = self.shared.in_flight.load(Ordering::Relaxed);
        QueueStats {
            queued: self.shared.status.len().saturating_sub(in_flight),
            in_flight,
            completed: self.shared.completed.load(Ordering::Relaxed),
            failed: self.shared.failed.load(Ordering::Relaxed),
            cancelled: self.shared.cancelled.load(Ordering::Relaxed),
        }
    }
}

/// Owns the preparation worker. Dropping it aborts and joins the worker.
pub struct PrepareQueue {
    handle: PrepareHandle,
    shutdown: Option<Sender<()>>,
    worker: Option<JoinHandle<()>>,
}

impl PrepareQueue {
    pub fn new(config: QueueConfig) -> std::io::Result<Self> {
        let (job_tx, job_rx) = crossbeam_channel::unbounded();
        let (shutdown_tx, shutdown_rx) = crossbeam_channel::bounded(0);
        let shared = Arc::new(Shared {
            camera: Mutex::new(DVec3::ZERO),
            status: DashMap::new(),
            abort: AtomicBool::new(false),
            next_id: AtomicU64::new(1),
            in_flight: AtomicUsize::new(0),
            completed: AtomicUsize::new(0),
            failed: AtomicUsize::new(0),
            cancelled: AtomicUsize::new(0),
        });

        let worker_shared = Arc::clone(&shared);
        let interval = config.resort_interval;
        let worker = std::thread::Builder::new()
            .name(config.thread_name)
            .spawn(move || worker_loop(&worker_shared, &job_rx, &shutdown_rx, interval))?;

        Ok(Self {
            handle: PrepareHandle {
                jobs: job_tx,
                shared,
            },
            shutdown: Some(shutdown_tx),
            worker: Some(worker),
        })
    }

    pub fn handle(&self) -> PrepareHandle {
        self.handle.clone()
    }

    /// Signal the worker to stop after its current job and wait for it.
    pub fn shutdown(&mut self) {
        self.handle.shared.abort.store(true, Ordering::Release);
        // Disconnecting wakes a worker blocked waiting for work.
        self.shutdown.take();
        if let Some(worker) = self.worker.take()
            && worker.join().is_err()
        {
            tracing::error!("patch preparation worker panicked");
        }
    }
}

impl Drop for PrepareQueue {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn worker_loop(
    shared: &Shared,
    jobs: &Receiver<QueuedJob>,
    shutdown: &Receiver<()>,
    interval: Duration,
) {
    let mut active: VecDeque<QueuedJob> = VecDeque::new();
    let mut last_sort = Instant::now();

    while !shared.abort.load(Ordering::Acquire) {
        if active.is_empty() {
            select! {
                recv(jobs) -> job => match job {
                    Ok(job) => active.push_back(job),
                    Err(_) => break,
                },
                recv(shutdown) -> _ => break,
            }
        }
        active.extend(jobs.try_iter());

        if last_sort.elapsed() >= interval {
            let camera = shared.camera();
            active.make_contiguous().sort_by(|a, b| {
                let da = a.request.priority_bounds.squared_distance_to_point(camera);
                let db = b.request.priority_bounds.squared_distance_to_point(camera);
                da.total_cmp(&db)
            });
            last_sort = Instant::now();
            tracing::debug!(queued = active.len(), "preparation queue resorted");
        }

        let Some(job) = active.pop_front() else {
            continue;
        };
        // Claim the job unless it was cancelled while queued.
        match shared.status.get_mut(&job.id) {
            Some(mut state) => *state = JobState::InFlight,
            None => continue,
        }
        shared.in_flight.fetch_add(1, Ordering::Relaxed);

        let started = Instant::now();
        let outcome = prepare(&job.request);
        match &outcome {
            Ok(_) => {
                shared.completed.fetch_add(1, Ordering::Relaxed);
                tracing::trace!(id = ?job.id, micros = started.elapsed().as_micros() as u64, "patch prepared");
            }
            Err(err) => {
                shared.failed.fetch_add(1, Ordering::Relaxed);
                tracing::warn!(id = ?job.id, %err, "patch preparation failed");
            }
        }
        shared.status.remove(&job.id);
        shared.in_flight.fetch_sub(1, Ordering::Relaxed);
        // The tree may have been dropped; nothing else to do then.
        let _ = job.reply.send(PrepareResult {
            id: job.id,
            outcome,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sphaera_cubesphere::CubeFace;
    use sphaera_mesh::TextureRange;
    use sphaera_terrain::ConstantSource;

    /// Point source that spins while `blocked` is set.
    struct Gate {
        blocked: AtomicBool,
    }

    impl DataSource for Gate {
        fn height(&self, _position: DVec3) -> Result<f64, DataSourceError> {
            while self.blocked.load(Ordering::Acquire) {
                std::thread::sleep(Duration::from_millis(1));
            }
            Ok(0.0)
        }
    }

    struct Broken;

    impl DataSource for Broken {
        fn height(&self, position: DVec3) -> Result<f64, DataSourceError> {
            Err(DataSourceError::Sample {
                position,
                reason: "broken".into(),
            })
        }
    }

    fn request(source: Arc<dyn DataSource>, footprint: Footprint) -> PrepareRequest {
        PrepareRequest {
            source,
            footprint,
            parent: None,
            heights: HeightFieldBuilder::new(4, 2),
            mesh: MeshBuilder::new(100.0, 1.0, TextureRange::square(1.0)),
            priority_bounds: PrepareRequest::footprint_bounds(&footprint, 100.0),
        }
    }

    fn wait_for(mut done: impl FnMut() -> bool) {
        let start = Instant::now();
        while !done() {
            assert!(start.elapsed() < Duration::from_secs(10), "timed out");
            std::thread::sleep(Duration::from_millis(1));
        }
    }

    fn collect(rx: &Receiver<PrepareResult>, n: usize) -> Vec<PrepareResult> {
        (0..n)
            .map(|_| rx.recv_timeout(Duration::from_secs(10)).expect("result"))
            .collect()
    }

    #[test]
    fn test_prepare_synchronously() {
        let src: Arc<dyn DataSource> = Arc::new(ConstantSource::new(0.0));
        let prepared = prepare(&request(src, Footprint::root(CubeFace::Front))).unwrap();
        assert_eq!(prepared.mesh.vertices.len(), 25);
        assert_eq!(prepared.height_field.quads(), 4);
    }

    #[test]
    fn test_submitted_job_produces_result() {
        let queue = PrepareQueue::new(QueueConfig::default()).unwrap();
        let handle = queue.handle();
        let (tx, rx) = crossbeam_channel::unbounded();
        let src: Arc<dyn DataSource> = Arc::new(ConstantSource::new(1.0));
        let id = handle.submit(request(src, Footprint::root(CubeFace::Top)), tx);
        let results = collect(&rx, 1);
        assert_eq!(results[0].id, id);
        assert!(results[0].outcome.is_ok());
        wait_for(|| !handle.is_pending(id));
        assert_eq!(handle.stats().completed, 1);
    }

    #[test]
    fn test_failures_are_isolated_per_job() {
        let queue = PrepareQueue::new(QueueConfig::default()).unwrap();
        let handle = queue.handle();
        let (tx, rx) = crossbeam_channel::unbounded();
        let bad = handle.submit(request(Arc::new(Broken), Footprint::root(CubeFace::Left)), tx.clone());
        let good = handle.submit(
            request(Arc::new(ConstantSource::new(0.0)), Footprint::root(CubeFace::Right)),
            tx,
        );
        let results = collect(&rx, 2);
        let outcome = |id| results.iter().find(|r| r.id == id).map(|r| r.outcome.is_ok());
        assert_eq!(outcome(bad), Some(false));
        assert_eq!(outcome(good), Some(true));
        wait_for(|| handle.stats().completed + handle.stats().failed == 2);
        assert_eq!(handle.stats().failed, 1);
    }

    #[test]
    fn test_queued_jobs_cancel_but_running_jobs_do_not() {
        let queue = PrepareQueue::new(QueueConfig::default()).unwrap();
        let handle = queue.handle();
        let gate = Arc::new(Gate { blocked: AtomicBool::new(true) });
        let (tx, rx) = crossbeam_channel::unbounded();

        let running = handle.submit(request(gate.clone(), Footprint::root(CubeFace::Front)), tx.clone());
        wait_for(|| handle.stats().in_flight == 1);
        let waiting = handle.submit(request(gate.clone(), Footprint::root(CubeFace::Back)), tx);

        assert!(!handle.cancel(running), "a running job cannot be cancelled");
        assert!(handle.cancel(waiting));
        assert!(!handle.cancel(waiting), "cancelling twice fails");
        assert!(!handle.is_pending(waiting));

        gate.blocked.store(false, Ordering::Release);
        let results = collect(&rx, 1);
        assert_eq!(results[0].id, running);
        assert!(rx.recv_timeout(Duration::from_millis(200)).is_err(), "cancelled job must not report");
        assert_eq!(handle.stats().cancelled, 1);
    }

    #[test]
    fn test_resort_prefers_jobs_near_the_camera() {
        let queue = PrepareQueue::new(QueueConfig {
            resort_interval: Duration::ZERO,
            ..Default::default()
        })
        .unwrap();
        let handle = queue.handle();
        let gate = Arc::new(Gate { blocked: AtomicBool::new(true) });
        let src: Arc<dyn DataSource> = Arc::new(ConstantSource::new(0.0));
        let (tx, rx) = crossbeam_channel::unbounded();

        handle.submit(request(gate.clone(), Footprint::root(CubeFace::Top)), tx.clone());
        wait_for(|| handle.stats().in_flight == 1);

        handle.set_camera_position(DVec3::new(0.0, 0.0, -500.0));
        let far = handle.submit(request(src.clone(), Footprint::root(CubeFace::Front)), tx.clone());
        let near = handle.submit(request(src, Footprint::root(CubeFace::Back)), tx);
        gate.blocked.store(false, Ordering::Release);

        let order: Vec<JobId> = collect(&rx, 3).into_iter().skip(1).map(|r| r.id).collect();
        assert_eq!(order, vec![near, far], "the patch facing the camera goes first");
    }

    #[test]
    fn test_shutdown_with_idle_handles_outstanding() {
        let mut queue = PrepareQueue::new(QueueConfig::default()).unwrap();
        let handle = queue.handle();
        queue.shutdown();
        let (tx, _rx) = crossbeam_channel::unbounded();
        let src: Arc<dyn DataSource> = Arc::new(ConstantSource::new(0.0));
        let id = handle.submit(request(src, Footprint::root(CubeFace::Top)), tx);
        assert!(!handle.is_pending(id), "no worker is left to run it");
        assert_eq!(handle.stats().completed, 0);
    }
}
