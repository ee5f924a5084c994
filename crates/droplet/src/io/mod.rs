pub mod json;
pub mod raster;

pub use json::*;
pub use raster::*;
