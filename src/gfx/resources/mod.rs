//! GPU resources shared across the frame.

pub mod global_bindings;
pub mod texture_resource;

pub use global_bindings::{GlobalBindings, GlobalUBO, GlobalUBOContent};
pub use texture_resource::TextureResource;
