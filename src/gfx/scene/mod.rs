//! Scene graph: loaded objects, their meshes, and the lights.

pub mod lights;
pub mod object;
pub mod scene;
pub mod vertex;

pub use lights::{AmbientLight, Headlight};
pub use object::{DrawObject, Mesh, SceneObject};
pub use scene::SceneGraph;
pub use vertex::Vertex3D;
