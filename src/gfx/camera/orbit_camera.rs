use super::camera_utils::{Camera, CameraUniform};
use cgmath::*;

#[rustfmt::skip]
pub const OPENGL_TO_WGPU_MATRIX: cgmath::Matrix4<f32> = cgmath::Matrix4::new(
    1.0, 0.0, 0.0, 0.0,
    0.0, 1.0, 0.0, 0.0,
    0.0, 0.0, 0.5, 0.5,
    0.0, 0.0, 0.0, 1.0,
);

/// Perspective camera orbiting a target point, Y up.
///
/// `distance`, `pitch` and `yaw` describe the eye relative to `target`;
/// `eye` is kept in sync with them.
#[derive(Debug, Clone, Copy)]
pub struct OrbitCamera {
    pub distance: f32,
    pub pitch: f32,
    pub yaw: f32,
    pub eye: Vector3<f32>,
    pub target: Vector3<f32>,
    pub up: Vector3<f32>,
    pub bounds: OrbitCameraBounds,
    pub aspect: f32,
    pub fovy: Rad<f32>,
    pub znear: f32,
    pub zfar: f32,
    pub uniform: CameraUniform,
    home: Option<(Vector3<f32>, Vector3<f32>)>,
}

impl Camera for OrbitCamera {
    fn build_view_projection_matrix(&self) -> Matrix4<f32> {
        let eye = Point3::from_vec(self.eye);
        let target = Point3::from_vec(self.target);
        let view = Matrix4::look_at_rh(eye, target, self.up);
        let proj =
            OPENGL_TO_WGPU_MATRIX * perspective(self.fovy, self.aspect, self.znear, self.zfar);
        proj * view
    }
}

impl OrbitCamera {
    pub fn new(
        fovy: impl Into<Rad<f32>>,
        aspect: f32,
        znear: f32,
        zfar: f32,
        eye: Vector3<f32>,
        target: Vector3<f32>,
    ) -> Self {
        let mut camera = Self {
            distance: 1.0,
            pitch: 0.0,
            yaw: 0.0,
            eye,
            target,
            up: Vector3::unit_y(),
            bounds: OrbitCameraBounds {
                max_distance: Some(zfar * 0.5),
                ..Default::default()
            },
            aspect,
            fovy: fovy.into(),
            znear,
            zfar,
            uniform: CameraUniform::default(),
            home: None,
        };
        camera.look_from(eye, target);
        camera.home = None;
        camera
    }

    /// Places the eye at `eye` and aims at `target`.
    ///
    /// The eye is stored exactly as given unless it lies beyond the pitch
    /// bounds (straight above or below the target), in which case it is
    /// tilted back onto the nearest allowed pitch at the same distance. The
    /// pose becomes the home view restored by [`reset_to_home`].
    ///
    /// [`reset_to_home`]: OrbitCamera::reset_to_home
    pub fn look_from(&mut self, eye: Vector3<f32>, target: Vector3<f32>) {
        let offset = eye - target;
        let distance = offset.magnitude();

        self.target = target;
        if distance > f32::EPSILON {
            let pitch = (offset.y / distance).clamp(-1.0, 1.0).asin();
            self.distance = distance;
            self.pitch = pitch.clamp(self.bounds.min_pitch, self.bounds.max_pitch);
            self.yaw = offset.x.atan2(offset.z);
            if self.pitch == pitch {
                self.eye = eye;
            } else {
                self.update();
            }
        } else {
            // Eye on the target: keep the current orientation and step back along it
            self.update();
        }
        self.home = Some((self.eye, self.target));
    }

    pub fn reset_to_home(&mut self) -> bool {
        match self.home {
            Some((eye, target)) => {
                self.look_from(eye, target);
                true
            }
            None => false,
        }
    }

    pub fn set_distance(&mut self, distance: f32) {
        self.distance = distance.clamp(
            self.bounds.min_distance.unwrap_or(f32::EPSILON),
            self.bounds.max_distance.unwrap_or(f32::MAX),
        );
        self.update();
    }

    /// Scales the orbit radius; factors below 1 move closer
    pub fn zoom(&mut self, factor: f32) {
        if factor.is_finite() && factor > 0.0 {
            self.set_distance(self.distance * factor);
        }
    }

    pub fn set_pitch(&mut self, pitch: f32) {
        self.pitch = pitch.clamp(self.bounds.min_pitch, self.bounds.max_pitch);
        self.update();
    }

    pub fn add_pitch(&mut self, delta: f32) {
        self.set_pitch(self.pitch + delta);
    }

    pub fn set_yaw(&mut self, yaw: f32) {
        let mut bounded_yaw = yaw;
        if let Some(min_yaw) = self.bounds.min_yaw {
            bounded_yaw = bounded_yaw.max(min_yaw);
        }
        if let Some(max_yaw) = self.bounds.max_yaw {
            bounded_yaw = bounded_yaw.min(max_yaw);
        }
        self.yaw = bounded_yaw;
        self.update();
    }

    pub fn add_yaw(&mut self, delta: f32) {
        self.set_yaw(self.yaw + delta);
    }

    /// Pans the camera relative to the current view direction
    /// delta.0 = horizontal pan (left/right relative to camera view)
    /// delta.1 = vertical pan (up/down relative to camera view)
    pub fn pan(&mut self, delta: (f32, f32)) {
        let forward = (self.target - self.eye).normalize();
        let right = forward.cross(self.up).normalize();
        let up = right.cross(forward).normalize();

        // Scale pan movement by distance for consistent feel at all zoom levels
        let movement = (right * delta.0 + up * delta.1) * self.distance;

        // Move both eye and target to maintain the view direction
        self.eye += movement;
        self.target += movement;
    }

    /// Recomputes `eye` after changing `distance`, `pitch` or `yaw`.
    fn update(&mut self) {
        self.eye =
            calculate_cartesian_eye_position(self.pitch, self.yaw, self.distance, self.target);
    }

    pub fn resize_projection(&mut self, width: u32, height: u32) {
        if width > 0 && height > 0 {
            self.aspect = width as f32 / height as f32;
        }
    }

    pub fn update_view_proj(&mut self) {
        self.uniform.view_position = [self.eye.x, self.eye.y, self.eye.z, 1.0];
        self.uniform.view_proj = self.build_view_projection_matrix().into();
    }
}

#[derive(Debug, Clone, Copy)]
pub struct OrbitCameraBounds {
    pub min_distance: Option<f32>,
    pub max_distance: Option<f32>,
    pub min_pitch: f32,
    pub max_pitch: f32,
    pub min_yaw: Option<f32>,
    pub max_yaw: Option<f32>,
}

impl Default for OrbitCameraBounds {
    fn default() -> Self {
        Self {
            min_distance: Some(0.1),
            max_distance: None,
            // Stay clear of the poles so look_at never sees eye-target parallel to up
            min_pitch: -std::f32::consts::FRAC_PI_2 + 0.01,
            max_pitch: std::f32::consts::FRAC_PI_2 - 0.01,
            min_yaw: None,
            max_yaw: None,
        }
    }
}

fn calculate_cartesian_eye_position(
    pitch: f32,
    yaw: f32,
    distance: f32,
    target: Vector3<f32>,
) -> Vector3<f32> {
    Vector3::new(
        distance * yaw.sin() * pitch.cos(),
        distance * pitch.sin(),
        distance * yaw.cos() * pitch.cos(),
    ) + target
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_near(a: Vector3<f32>, b: Vector3<f32>) {
        assert!((a - b).magnitude() < 1e-4, "{a:?} != {b:?}");
    }

    fn camera() -> OrbitCamera {
        OrbitCamera::new(
            Deg(75.0),
            1.5,
            1.0,
            1000.0,
            Vector3::new(0.0, 0.0, 10.0),
            Vector3::zero(),
        )
    }

    #[test]
    fn test_look_from_keeps_exact_eye() {
        let mut cam = camera();
        let eye = Vector3::new(10.0, -9.0, 28.0);
        let target = Vector3::new(20.0, -5.0, 35.0);
        cam.look_from(eye, target);

        assert_eq!(cam.eye, eye);
        assert_eq!(cam.target, target);
        // The derived orbit parameters describe the same eye
        assert_near(
            calculate_cartesian_eye_position(cam.pitch, cam.yaw, cam.distance, cam.target),
            eye,
        );
    }

    #[test]
    fn test_eye_straight_above_target_stays_finite() {
        let mut cam = OrbitCamera::new(
            Deg(75.0),
            1.0,
            1.0,
            1000.0,
            Vector3::new(0.0, 10.0, 0.0),
            Vector3::zero(),
        );
        assert!(cam.pitch < std::f32::consts::FRAC_PI_2);
        assert!((cam.distance - 10.0).abs() < 1e-4);
        assert!(((cam.eye - cam.target).magnitude() - 10.0).abs() < 1e-3);

        cam.update_view_proj();
        let view_proj: [[f32; 4]; 4] = cam.uniform.view_proj;
        assert!(view_proj.iter().flatten().all(|v| v.is_finite()));

        cam.pan((0.1, 0.0));
        assert!(cam.eye.x.is_finite() && cam.target.x.is_finite());

        cam.look_from(Vector3::new(1.0, -20.0, 1.0), Vector3::new(1.0, 0.0, 1.0));
        assert!(cam.pitch > -std::f32::consts::FRAC_PI_2);
        cam.update_view_proj();
        assert!(cam.uniform.view_proj.iter().flatten().all(|v| v.is_finite()));
    }

    #[test]
    fn test_orbiting_keeps_distance() {
        let mut cam = camera();
        cam.add_yaw(0.5);
        cam.add_pitch(0.3);
        assert!(((cam.eye - cam.target).magnitude() - 10.0).abs() < 1e-4);
    }

    #[test]
    fn test_pitch_is_clamped_short_of_the_pole() {
        let mut cam = camera();
        cam.add_pitch(10.0);
        assert!(cam.pitch < std::f32::consts::FRAC_PI_2);
    }

    #[test]
    fn test_zoom_and_pan() {
        let mut cam = camera();
        cam.zoom(0.5);
        assert!((cam.distance - 5.0).abs() < 1e-5);
        cam.zoom(-1.0);
        assert!((cam.distance - 5.0).abs() < 1e-5);

        let view_dir = (cam.target - cam.eye).normalize();
        cam.pan((0.1, 0.0));
        assert_near((cam.target - cam.eye).normalize(), view_dir);
        assert_near(cam.target, Vector3::new(0.5, 0.0, 0.0));
    }

    #[test]
    fn test_reset_to_home() {
        let mut cam = camera();
        assert!(!cam.reset_to_home());

        cam.look_from(Vector3::new(1.0, 2.0, 3.0), Vector3::zero());
        cam.add_yaw(1.0);
        cam.pan((0.2, 0.2));
        assert!(cam.reset_to_home());
        assert_eq!(cam.eye, Vector3::new(1.0, 2.0, 3.0));
        assert_eq!(cam.target, Vector3::zero());
    }

    #[test]
    fn test_projection_uses_aspect() {
        let mut cam = camera();
        cam.resize_projection(800, 400);
        assert_eq!(cam.aspect, 2.0);
        cam.resize_projection(0, 400);
        assert_eq!(cam.aspect, 2.0);

        cam.update_view_proj();
        assert_eq!(cam.uniform.view_position, [0.0, 0.0, 10.0, 1.0]);
    }
}
