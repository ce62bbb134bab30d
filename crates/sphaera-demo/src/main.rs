//! Headless demo: builds a planet from the config and flies a camera down to
//! the surface, logging LOD statistics along the way.
//!
//! Run with `cargo run -p sphaera-demo -- --source continents --frames 300`.

mod flight;
mod source;

use std::process::ExitCode;
use std::time::{Duration, Instant};

use clap::Parser;
use sphaera_config::{CliArgs, Config, ConfigError};
use sphaera_lod::{HeadlessScene, RenderQueue};
use sphaera_planet::{Layer, Planet, PlanetError};
use sphaera_terrain::DataSourceError;
use tracing::info;

use crate::flight::Descent;

const FRAME_TIME: Duration = Duration::from_millis(16);
const REPORT_EVERY: u32 = 60;

#[derive(Debug, thiserror::Error)]
enum DemoError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("failed to set up logging: {0}")]
    Logging(#[from] tracing_subscriber::util::TryInitError),
    #[error("failed to open terrain source: {0}")]
    Source(#[from] DataSourceError),
    #[error(transparent)]
    Planet(#[from] PlanetError),
}

fn main() -> ExitCode {
    let args = CliArgs::parse();
    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("sphaera: {err}");
            ExitCode::FAILURE
        }
    }
}

fn run(args: &CliArgs) -> Result<(), DemoError> {
    let config_dir = match &args.config {
        Some(dir) => dir.clone(),
        None => Config::default_dir()?,
    };
    let mut config = Config::load_or_create(&config_dir)?;
    config.apply_cli_overrides(args);
    config.validate()?;

    sphaera_log::init_logging(
        config.debug.log_dir.as_deref(),
        cfg!(debug_assertions),
        Some(&config),
    )?;
    info!("Config directory: {}", config_dir.display());

    let surface = source::build_source(&config.terrain)?;
    let mut scene = HeadlessScene::new();
    let started = Instant::now();
    let mut planet = Planet::new(source::planet_settings(&config), surface, &mut scene)?;
    info!("Root patches ready in {:.1?}", started.elapsed());

    let descent = Descent::new(
        Descent::random_target(config.terrain.seed),
        config.planet.base_radius,
        &config.camera,
    );
    fly(&mut planet, &mut scene, &descent, config.camera.frames);

    let stats = planet.stats();
    info!(
        "Finished: {} patches, {} shown, {} prepared, {} failed, {} cancelled, {} vertices uploaded",
        stats.total_patches(),
        stats.total_shown(),
        stats.queue.completed,
        stats.queue.failed,
        stats.queue.cancelled,
        scene.uploaded_vertices()
    );
    planet.release(&mut scene);
    Ok(())
}

fn fly(planet: &mut Planet, scene: &mut HeadlessScene, descent: &Descent, frames: u32) {
    for frame in 0..frames {
        let frame_start = Instant::now();
        planet.notify_pre_render(scene);
        planet.set_camera_position(descent.position(frame), scene);
        if planet.geometry_updated() {
            tracing::trace!(frame, "geometry updated");
        }
        if !planet.notify_post_render() {
            break;
        }

        if frame % REPORT_EVERY == 0 {
            let stats = planet.stats();
            let deepest = stats
                .layers
                .iter()
                .find(|(layer, _)| *layer == Layer::Surface)
                .map_or(0, |(_, s)| s.deepest_shown);
            info!(
                "frame {frame}: altitude {:.1}, {} patches, {} shown, deepest {deepest}, {} queued, {} surface entities drawn",
                descent.altitude(frame),
                stats.total_patches(),
                stats.total_shown(),
                stats.queue.queued,
                scene.attached_in(RenderQueue::Main),
            );
        }

        if let Some(rest) = FRAME_TIME.checked_sub(frame_start.elapsed()) {
            std::thread::sleep(rest);
        }
    }
}
