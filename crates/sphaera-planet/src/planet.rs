use std::sync::Arc;
use std::time::Duration;

use glam::DVec3;
use sphaera_lod::{
    PatchTree, PrepareError, PrepareQueue, QueueConfig, QueueStats, RenderQueue, SceneBackend,
    TreeSettings, TreeStats,
};
use sphaera_mesh::{StitchingError, StitchingTable};
use sphaera_terrain::{ConstantSource, DataSource};
use tracing::info;

#[derive(Debug, thiserror::Error)]
pub enum PlanetError {
    #[error("failed to start the preparation worker: {0}")]
    Worker(#[source] std::io::Error),
    #[error("invalid patch resolution: {0}")]
    Stitching(#[from] StitchingError),
    #[error("failed to prepare root patches: {0}")]
    Prepare(#[from] PrepareError),
}

/// The three shells a planet is drawn with, innermost first.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Layer {
    Surface,
    Ocean,
    Sky,
}

impl Layer {
    pub const ALL: [Layer; 3] = [Layer::Surface, Layer::Ocean, Layer::Sky];

    pub fn name(self) -> &'static str {
        match self {
            Layer::Surface => "Surface",
            Layer::Ocean => "Ocean",
            Layer::Sky => "Sky",
        }
    }

    pub fn render_queue(self) -> RenderQueue {
        match self {
            Layer::Surface => RenderQueue::Main,
            Layer::Ocean => RenderQueue::Ocean,
            Layer::Sky => RenderQueue::Sky,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LayerSettings {
    pub enabled: bool,
    pub min_depth: u8,
    pub max_depth: u8,
}

#[derive(Clone, Debug, PartialEq)]
pub struct PlanetSettings {
    pub base_radius: f64,
    /// Surface height multiplier. Ocean and sky are never displaced.
    pub scaling_factor: f64,
    /// Height of the sky shell above `base_radius`.
    pub sky_altitude: f64,
    pub quads: u32,
    pub padding: u32,
    pub texture_tiling_depth: u8,
    pub resort_interval: Duration,
    pub surface: LayerSettings,
    pub ocean: LayerSettings,
    pub sky: LayerSettings,
}

impl Default for PlanetSettings {
    fn default() -> Self {
        Self {
            base_radius: 6371.0,
            scaling_factor: 1.0,
            sky_altitude: 20.0,
            quads: 32,
            padding: 2,
            texture_tiling_depth: 9,
            resort_interval: Duration::from_secs(1),
            surface: LayerSettings {
                enabled: true,
                min_depth: 4,
                max_depth: 15,
            },
            ocean: LayerSettings {
                enabled: true,
                min_depth: 4,
                max_depth: 15,
            },
            sky: LayerSettings {
                enabled: true,
                min_depth: 0,
                max_depth: 7,
            },
        }
    }
}

impl PlanetSettings {
    pub fn layer(&self, layer: Layer) -> LayerSettings {
        match layer {
            Layer::Surface => self.surface,
            Layer::Ocean => self.ocean,
            Layer::Sky => self.sky,
        }
    }

    fn tree_settings(&self, layer: Layer) -> TreeSettings {
        let depths = self.layer(layer);
        let (base_radius, scaling_factor) = match layer {
            Layer::Surface => (self.base_radius, self.scaling_factor),
            Layer::Ocean => (self.base_radius, 0.0),
            Layer::Sky => (self.base_radius + self.sky_altitude, 0.0),
        };
        TreeSettings {
            name: layer.name().to_owned(),
            base_radius,
            scaling_factor,
            quads: self.quads,
            padding: self.padding,
            min_depth: depths.min_depth,
            max_depth: depths.max_depth,
            texture_tiling_depth: self.texture_tiling_depth,
            render_queue: layer.render_queue(),
            horizon_radius: self.base_radius,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct PlanetStats {
    pub layers: Vec<(Layer, TreeStats)>,
    pub queue: QueueStats,
}

impl PlanetStats {
    pub fn total_patches(&self) -> usize {
        self.layers.iter().map(|(_, s)| s.patches).sum()
    }

    pub fn total_shown(&self) -> usize {
        self.layers.iter().map(|(_, s)| s.shown).sum()
    }
}

/// The frame driver for one planet centred on the origin.
///
/// Call [`Planet::notify_pre_render`], [`Planet::set_camera_position`] and
/// [`Planet::notify_post_render`] once per frame, in that order.
pub struct Planet {
    settings: PlanetSettings,
    layers: Vec<(Layer, PatchTree)>,
    // Declared after the layers so it is dropped after them.
    queue: PrepareQueue,
}

impl Planet {
    pub fn new(
        settings: PlanetSettings,
        surface: Arc<dyn DataSource>,
        scene: &mut dyn SceneBackend,
    ) -> Result<Self, PlanetError> {
        let queue = PrepareQueue::new(QueueConfig {
            resort_interval: settings.resort_interval,
            ..QueueConfig::default()
        })
        .map_err(PlanetError::Worker)?;
        let stitching = Arc::new(StitchingTable::new(settings.quads)?);
        let shell: Arc<dyn DataSource> = Arc::new(ConstantSource::new(0.0));

        let mut layers = Vec::with_capacity(Layer::ALL.len());
        for layer in Layer::ALL {
            if !settings.layer(layer).enabled {
                continue;
            }
            let source = match layer {
                Layer::Surface => Arc::clone(&surface),
                Layer::Ocean | Layer::Sky => Arc::clone(&shell),
            };
            let tree = PatchTree::new(
                settings.tree_settings(layer),
                source,
                queue.handle(),
                Arc::clone(&stitching),
                scene,
            )?;
            layers.push((layer, tree));
        }

        info!(
            "Planet initialized: radius {}, {} layers, {} quads per patch",
            settings.base_radius,
            layers.len(),
            settings.quads
        );
        Ok(Self {
            settings,
            layers,
            queue,
        })
    }

    pub fn settings(&self) -> &PlanetSettings {
        &self.settings
    }

    pub fn layer(&self, layer: Layer) -> Option<&PatchTree> {
        self.layers.iter().find(|(l, _)| *l == layer).map(|(_, t)| t)
    }

    pub fn layer_mut(&mut self, layer: Layer) -> Option<&mut PatchTree> {
        self.layers
            .iter_mut()
            .find(|(l, _)| *l == layer)
            .map(|(_, t)| t)
    }

    /// Horizon culling for every layer, using last frame's camera.
    pub fn notify_pre_render(&mut self, scene: &mut dyn SceneBackend) {
        for (_, tree) in &mut self.layers {
            tree.pre_render(scene);
        }
    }

    /// Camera position in planet space. Runs one LOD pass per layer.
    pub fn set_camera_position(&mut self, camera: DVec3, scene: &mut dyn SceneBackend) {
        for (_, tree) in &mut self.layers {
            tree.set_camera_position(camera, scene);
        }
    }

    /// End of frame. Returns whether rendering should continue.
    pub fn notify_post_render(&mut self) -> bool {
        self.layers
            .iter_mut()
            .fold(true, |keep_going, (_, tree)| tree.post_render() && keep_going)
    }

    /// Whether any layer changed its drawn geometry this frame.
    pub fn geometry_updated(&self) -> bool {
        self.layers.iter().any(|(_, t)| t.geometry_updated())
    }

    pub fn pending_jobs(&self) -> usize {
        self.layers.iter().map(|(_, t)| t.pending_jobs()).sum()
    }

    pub fn stats(&self) -> PlanetStats {
        PlanetStats {
            layers: self.layers.iter().map(|(l, t)| (*l, t.stats())).collect(),
            queue: self.queue.handle().stats(),
        }
    }

    /// Free every scene resource and stop the worker.
    pub fn release(self, scene: &mut dyn SceneBackend) {
        let Self { layers, mut queue, .. } = self;
        for (_, tree) in layers {
            tree.release(scene);
        }
        queue.shutdown();
    }
}
