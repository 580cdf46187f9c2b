//! # Graphics Module
//!
//! - **Camera** ([`camera`]) - orbit camera and its input controller
//! - **Rendering** ([`rendering`]) - surface, pipelines and the frame pass
//! - **Scene** ([`scene`]) - scene graph, meshes and lights
//! - **Resources** ([`resources`]) - uniform buffers and the depth texture

pub mod camera;
pub mod rendering;
pub mod resources;
pub mod scene;

pub use camera::orbit_camera::OrbitCamera;
pub use rendering::render_engine::RenderEngine;
