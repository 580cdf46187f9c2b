//! geoview
//!
//! A native viewer for geometry served over HTTP: queries a backend for the
//! objects in a view region, fetches and parses them as OBJ, and renders
//! them with wgpu behind an orbit camera.

pub mod app;
pub mod config;
pub mod error;
pub mod gfx;
pub mod loader;
pub mod viewer;
pub mod wgpu_utils;

pub use app::ViewerApp;
pub use config::{SceneSettings, ViewerConfig};
pub use error::{LoadError, ViewerError};
pub use viewer::{LoadStatus, Viewer};
