use std::collections::HashSet;

use wgpu::Device;

use crate::gfx::camera::camera_utils::CameraManager;

use super::{
    lights::{AmbientLight, Headlight},
    object::SceneObject,
};

/// Everything that is drawn: loaded objects, the camera and the lights.
///
/// Objects are only ever appended. An identifier can be inserted once.
pub struct SceneGraph {
    pub camera_manager: CameraManager,
    pub ambient: AmbientLight,
    pub headlight: Headlight,
    objects: Vec<SceneObject>,
    ids: HashSet<String>,
}

impl SceneGraph {
    pub fn new(camera_manager: CameraManager, ambient: AmbientLight, headlight: Headlight) -> Self {
        Self {
            camera_manager,
            ambient,
            headlight,
            objects: Vec::new(),
            ids: HashSet::new(),
        }
    }

    /// Adds `object` unless one with the same id is already present.
    ///
    /// Returns whether the scene changed.
    pub fn insert(&mut self, object: SceneObject) -> bool {
        if !self.ids.insert(object.id().to_string()) {
            log::warn!("Ignoring duplicate geometry '{}'", object.id());
            return false;
        }
        self.objects.push(object);
        true
    }

    pub fn contains(&self, id: &str) -> bool {
        self.ids.contains(id)
    }

    pub fn objects(&self) -> &[SceneObject] {
        &self.objects
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// Moves the headlight to the eye and refreshes the camera uniform
    pub fn update(&mut self) {
        let camera = &mut self.camera_manager.camera;
        self.headlight.follow(camera.eye, camera.target);
        camera.update_view_proj();
    }

    /// Uploads buffers for objects inserted since the last call
    pub fn init_gpu_resources(&mut self, device: &Device) {
        for object in self.objects.iter_mut().filter(|o| !o.is_uploaded()) {
            object.init_gpu_resources(device);
        }
    }

    pub fn triangle_count(&self) -> u32 {
        self.objects.iter().map(SceneObject::triangle_count).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::SceneSettings,
        gfx::{camera::{CameraController, OrbitCamera}, scene::object::Mesh},
    };
    use cgmath::{Vector3, Zero};

    fn scene() -> SceneGraph {
        let settings = SceneSettings::default();
        let camera = OrbitCamera::new(
            settings.fovy,
            1.5,
            settings.znear,
            settings.zfar,
            Vector3::new(0.0, 0.0, 5.0),
            Vector3::zero(),
        );
        let controller = CameraController::new(1.0, 1.2, 0.8);
        SceneGraph::new(
            CameraManager::new(camera, controller),
            AmbientLight::from_hex(settings.ambient_color),
            Headlight::from_hex(settings.headlight_color, settings.headlight_intensity),
        )
    }

    fn object(id: &str) -> SceneObject {
        SceneObject::new(id, vec![Mesh::new(vec![0.0; 9], vec![0.0; 9], vec![0, 1, 2])])
    }

    #[test]
    fn test_duplicate_ids_are_rejected() {
        let mut scene = scene();
        assert!(scene.insert(object("a")));
        assert!(scene.insert(object("b")));
        assert!(!scene.insert(object("a")));

        assert_eq!(scene.len(), 2);
        assert!(scene.contains("b"));
        assert_eq!(scene.triangle_count(), 2);
    }

    #[test]
    fn test_update_moves_headlight_to_eye() {
        let mut scene = scene();
        scene.camera_manager.camera.look_from(Vector3::new(1.0, 2.0, 3.0), Vector3::zero());
        scene.update();
        assert_eq!(scene.headlight.position, Vector3::new(1.0, 2.0, 3.0));
        assert_eq!(scene.camera_manager.camera.uniform.view_position, [1.0, 2.0, 3.0, 1.0]);
    }
}
