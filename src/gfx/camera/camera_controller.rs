use cgmath::Vector3;
use winit::{
    dpi::PhysicalPosition,
    event::{DeviceEvent, ElementState, KeyEvent, MouseButton, MouseScrollDelta, WindowEvent},
    keyboard::{KeyCode, PhysicalKey},
};

use super::orbit_camera::OrbitCamera;

/// Radians of orbit per pixel of mouse motion at rotate speed 1
const ROTATE_PER_PIXEL: f32 = 0.005;
/// Fraction of the orbit radius moved per pixel of drag at pan speed 1
const PAN_PER_PIXEL: f32 = 0.001;
/// Relative zoom per wheel line at zoom speed 1
const ZOOM_PER_LINE: f32 = 0.1;
const PIXELS_PER_LINE: f32 = 40.0;
/// Pending motion below this is treated as settled
const SETTLE_EPSILON: f32 = 1e-4;

/// What a mouse drag does
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DragMode {
    Rotate,
    Zoom,
    Pan,
}

/// Orbit controller that accumulates input between frames.
///
/// Input handlers only record motion; [`CameraController::update`] applies it
/// to the camera once per tick and reports whether anything moved, including
/// pose changes made to the camera directly since the previous update. With
/// `static_moving` the motion stops as soon as input stops, otherwise it
/// decays by `damping_factor` each update.
#[derive(Debug, Clone)]
pub struct CameraController {
    pub rotate_speed: f32,
    pub zoom_speed: f32,
    pub pan_speed: f32,
    pub damping_factor: f32,
    pub static_moving: bool,
    left_pressed: bool,
    right_pressed: bool,
    is_shift_held: bool,
    key_mode: Option<DragMode>,
    pending_rotate: (f32, f32),
    pending_pan: (f32, f32),
    pending_zoom: f32,
    last_pose: Option<(Vector3<f32>, Vector3<f32>)>,
}

impl CameraController {
    pub fn new(rotate_speed: f32, zoom_speed: f32, pan_speed: f32) -> Self {
        Self {
            rotate_speed,
            zoom_speed,
            pan_speed,
            damping_factor: 0.3,
            static_moving: true,
            left_pressed: false,
            right_pressed: false,
            is_shift_held: false,
            key_mode: None,
            pending_rotate: (0.0, 0.0),
            pending_pan: (0.0, 0.0),
            pending_zoom: 0.0,
            last_pose: None,
        }
    }

    pub fn with_damping(mut self, damping_factor: f32, static_moving: bool) -> Self {
        self.damping_factor = damping_factor.clamp(0.0, 1.0);
        self.static_moving = static_moving;
        self
    }

    /// Handles buttons, wheel and modifier keys.
    ///
    /// Returns true only when the camera was changed on the spot (the
    /// Shift+C home reset); everything else is applied by `update`.
    pub fn process_window_event(&mut self, event: &WindowEvent, camera: &mut OrbitCamera) -> bool {
        match event {
            WindowEvent::MouseInput { state, button, .. } => {
                self.on_mouse_button(*button, *state == ElementState::Pressed);
                false
            }
            WindowEvent::MouseWheel { delta, .. } => {
                let lines = match delta {
                    MouseScrollDelta::LineDelta(_, y) => *y,
                    MouseScrollDelta::PixelDelta(PhysicalPosition { y, .. }) => {
                        *y as f32 / PIXELS_PER_LINE
                    }
                };
                self.on_scroll(lines);
                false
            }
            WindowEvent::ModifiersChanged(modifiers) => {
                self.is_shift_held = modifiers.state().shift_key();
                false
            }
            WindowEvent::Focused(false) => {
                self.release_all();
                false
            }
            WindowEvent::KeyboardInput { event, .. } => self.process_key(event, camera),
            _ => false,
        }
    }

    pub fn process_device_event(&mut self, event: &DeviceEvent) {
        if let DeviceEvent::MouseMotion { delta } = event {
            self.on_mouse_motion(delta.0 as f32, delta.1 as f32);
        }
    }

    fn process_key(&mut self, event: &KeyEvent, camera: &mut OrbitCamera) -> bool {
        let PhysicalKey::Code(code) = event.physical_key else {
            return false;
        };
        let pressed = event.state == ElementState::Pressed;

        let mode = match code {
            KeyCode::KeyA => DragMode::Rotate,
            KeyCode::KeyS => DragMode::Zoom,
            KeyCode::KeyD => DragMode::Pan,
            KeyCode::KeyC if pressed && self.is_shift_held => {
                log::info!("Resetting camera to home view");
                let moved = camera.reset_to_home();
                self.sync_pose(camera);
                return moved;
            }
            _ => return false,
        };
        self.set_key_mode(mode, pressed);
        false
    }

    pub fn on_mouse_button(&mut self, button: MouseButton, pressed: bool) {
        match button {
            MouseButton::Left => self.left_pressed = pressed,
            MouseButton::Right => self.right_pressed = pressed,
            _ => {}
        }
    }

    /// Positive lines zoom in
    pub fn on_scroll(&mut self, lines: f32) {
        self.pending_zoom += lines * self.zoom_speed;
    }

    pub fn on_mouse_motion(&mut self, dx: f32, dy: f32) {
        let Some(mode) = self.drag_mode() else {
            return;
        };
        match mode {
            DragMode::Rotate => {
                self.pending_rotate.0 -= dx * ROTATE_PER_PIXEL * self.rotate_speed;
                self.pending_rotate.1 += dy * ROTATE_PER_PIXEL * self.rotate_speed;
            }
            DragMode::Zoom => {
                // Dragging up zooms in
                self.pending_zoom -= dy / PIXELS_PER_LINE * self.zoom_speed;
            }
            DragMode::Pan => {
                self.pending_pan.0 -= dx * PAN_PER_PIXEL * self.pan_speed;
                self.pending_pan.1 += dy * PAN_PER_PIXEL * self.pan_speed;
            }
        }
    }

    pub fn set_shift(&mut self, held: bool) {
        self.is_shift_held = held;
    }

    /// A held A/S/D key forces its mode; releasing it returns to normal drags
    pub fn set_key_mode(&mut self, mode: DragMode, pressed: bool) {
        if pressed {
            self.key_mode = Some(mode);
        } else if self.key_mode == Some(mode) {
            self.key_mode = None;
        }
    }

    /// Current drag action, if a button is held
    pub fn drag_mode(&self) -> Option<DragMode> {
        if !self.left_pressed && !self.right_pressed {
            return None;
        }
        if let Some(mode) = self.key_mode {
            return Some(mode);
        }
        if self.right_pressed || self.is_shift_held {
            Some(DragMode::Pan)
        } else {
            Some(DragMode::Rotate)
        }
    }

    fn release_all(&mut self) {
        self.left_pressed = false;
        self.right_pressed = false;
        self.is_shift_held = false;
        self.key_mode = None;
    }

    pub fn is_settled(&self) -> bool {
        self.pending_rotate.0.abs() < SETTLE_EPSILON
            && self.pending_rotate.1.abs() < SETTLE_EPSILON
            && self.pending_pan.0.abs() < SETTLE_EPSILON
            && self.pending_pan.1.abs() < SETTLE_EPSILON
            && self.pending_zoom.abs() < SETTLE_EPSILON
    }

    /// Takes the camera's current pose as seen, so `update` does not report it
    pub fn sync_pose(&mut self, camera: &OrbitCamera) {
        self.last_pose = Some((camera.eye, camera.target));
    }

    /// Applies accumulated input to `camera`; true if it moved since the
    /// last update, whether by input or by a direct `look_from`
    pub fn update(&mut self, camera: &mut OrbitCamera) -> bool {
        let applied = !self.is_settled();
        if applied {
            camera.add_yaw(self.pending_rotate.0);
            camera.add_pitch(self.pending_rotate.1);
            camera.pan(self.pending_pan);
            camera.zoom((1.0 - ZOOM_PER_LINE).powf(self.pending_zoom));
        }

        if self.static_moving || !applied {
            self.clear_pending();
        } else {
            let keep = 1.0 - self.damping_factor;
            self.pending_rotate = (self.pending_rotate.0 * keep, self.pending_rotate.1 * keep);
            self.pending_pan = (self.pending_pan.0 * keep, self.pending_pan.1 * keep);
            self.pending_zoom *= keep;
        }

        let pose = (camera.eye, camera.target);
        let repositioned = self.last_pose.is_some_and(|last| last != pose);
        self.last_pose = Some(pose);
        applied || repositioned
    }

    fn clear_pending(&mut self) {
        self.pending_rotate = (0.0, 0.0);
        self.pending_pan = (0.0, 0.0);
        self.pending_zoom = 0.0;
    }
}
