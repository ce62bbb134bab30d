//! Elevation sources and height-field sampling for planet patches.

mod continents;
mod equirect;
mod fbm;
mod height_field;
mod source;

pub use continents::{ContinentParams, ContinentSource};
pub use equirect::EquirectSource;
pub use fbm::{FbmParams, FbmSource};
pub use height_field::{HeightField, HeightFieldBuilder, ParentSamples};
pub use source::{ConstantSource, DataSource, DataSourceError};
