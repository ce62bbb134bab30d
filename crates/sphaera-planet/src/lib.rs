//! A whole planet: six cube faces times three layers.
//!
//! The surface layer samples the configured `DataSource`; the ocean and
//! sky layers are constant shells. All layers share one preparation worker
//! and one stitching table, but each keeps its own visible registry.

mod planet;

pub use planet::{Layer, LayerSettings, Planet, PlanetError, PlanetSettings, PlanetStats};
