pub mod attack;
pub mod config;
pub mod diff;
pub mod gateway;
pub mod raster;
pub mod resources;
pub mod session;
