//! Payload decoding: base64 transport encoding and OBJ parsing.

use std::path::Path;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;

use crate::{
    error::LoadError,
    gfx::scene::{Mesh, SceneObject},
};

/// Decodes a base64 `geometryData` payload into OBJ text
pub fn decode_payload(payload: &str) -> Result<String, LoadError> {
    let bytes = BASE64.decode(payload.trim())?;
    Ok(String::from_utf8(bytes)?)
}

/// Encodes OBJ text the way the backend stores it
pub fn encode_payload(text: &str) -> String {
    BASE64.encode(text)
}

/// Parses Wavefront OBJ text into a scene object.
///
/// Faces are triangulated and re-indexed so every vertex has a single
/// index. Material libraries referenced by the text are not fetched; the
/// object renders with the viewer's default shading. Text without any
/// faces is rejected.
pub fn parse_object(id: &str, text: &str) -> Result<SceneObject, LoadError> {
    let mut reader = text.as_bytes();
    let (models, _materials) = tobj::load_obj_buf(
        &mut reader,
        &tobj::LoadOptions {
            triangulate: true,
            single_index: true,
            ..Default::default()
        },
        |_: &Path| Err(tobj::LoadError::OpenFileFailed),
    )?;

    let meshes: Vec<Mesh> = models
        .iter()
        .filter(|model| !model.mesh.indices.is_empty())
        .map(|model| {
            let mesh = &model.mesh;
            // Use normals from OBJ if available, otherwise calculate them
            let normals = if mesh.normals.len() == mesh.positions.len() {
                mesh.normals.clone()
            } else {
                Mesh::calculate_face_normals(&mesh.positions, &mesh.indices)
            };
            Mesh::new(mesh.positions.clone(), normals, mesh.indices.clone())
        })
        .collect();

    if meshes.is_empty() {
        return Err(LoadError::EmptyGeometry(id.to_string()));
    }

    let mut object = SceneObject::new(id, meshes);
    if let Some(name) = models
        .iter()
        .map(|m| &m.name)
        .find(|n| !n.is_empty() && n.as_str() != "unnamed_object")
    {
        object.set_name(name.clone());
    }
    Ok(object)
}
