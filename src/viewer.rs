//! The viewer context: scene state shared by the loader continuation and
//! the render loop.
//!
//! Everything here runs on the event-loop thread and is independent of the
//! GPU, so the whole load-and-redraw behaviour can be driven from tests.

use std::fmt;

use cgmath::Vector3;
use log::{error, info, warn};
use winit::event::{DeviceEvent, WindowEvent};

use crate::{
    config::SceneSettings,
    gfx::{
        camera::{CameraController, CameraManager, OrbitCamera},
        scene::{AmbientLight, Headlight, SceneGraph},
    },
    loader::LoadEvent,
};

/// Where the current region load stands
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadStatus {
    Idle,
    /// Region query sent, no answer yet
    Querying,
    Loading {
        total: usize,
        done: usize,
        failed: usize,
    },
    Loaded {
        loaded: usize,
        failed: usize,
    },
    Failed(String),
}

impl fmt::Display for LoadStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoadStatus::Idle => write!(f, "idle"),
            LoadStatus::Querying => write!(f, "querying region"),
            LoadStatus::Loading {
                total,
                done,
                failed,
            } => {
                write!(f, "loading {}/{}", done + failed, total)?;
                if *failed > 0 {
                    write!(f, " ({failed} failed)")?;
                }
                Ok(())
            }
            LoadStatus::Loaded { loaded, failed } => {
                write!(f, "{loaded} objects")?;
                if *failed > 0 {
                    write!(f, ", {failed} failed")?;
                }
                Ok(())
            }
            LoadStatus::Failed(message) => write!(f, "load failed: {message} (press R to retry)"),
        }
    }
}

/// Why a redraw was requested
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RedrawCause {
    Controller,
    Insertion,
    Resize,
}

/// Number of redraw requests by cause, plus frames actually prepared
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RedrawCounters {
    pub controller: usize,
    pub insertion: usize,
    pub resize: usize,
    pub frames: usize,
}

impl RedrawCounters {
    pub fn requests(&self) -> usize {
        self.controller + self.insertion + self.resize
    }
}

pub struct Viewer {
    scene: SceneGraph,
    status: LoadStatus,
    dirty: bool,
    counters: RedrawCounters,
    failed_entries: usize,
    disposed: bool,
}

impl Viewer {
    /// Scene setup: camera, controller and lights, with the camera at
    /// `eye` aimed at `target` until the region query moves it.
    pub fn new(
        settings: &SceneSettings,
        aspect: f32,
        eye: Vector3<f32>,
        target: Vector3<f32>,
    ) -> Self {
        let camera = OrbitCamera::new(
            settings.fovy,
            aspect,
            settings.znear,
            settings.zfar,
            eye,
            target,
        );
        let controller =
            CameraController::new(settings.rotate_speed, settings.zoom_speed, settings.pan_speed)
                .with_damping(settings.damping_factor, settings.static_moving);
        let scene = SceneGraph::new(
            CameraManager::new(camera, controller),
            AmbientLight::from_hex(settings.ambient_color),
            Headlight::from_hex(settings.headlight_color, settings.headlight_intensity),
        );

        Self {
            scene,
            status: LoadStatus::Idle,
            // The first frame always draws
            dirty: true,
            counters: RedrawCounters::default(),
            failed_entries: 0,
            disposed: false,
        }
    }

    pub fn scene(&self) -> &SceneGraph {
        &self.scene
    }

    pub fn scene_mut(&mut self) -> &mut SceneGraph {
        &mut self.scene
    }

    pub fn camera(&self) -> &OrbitCamera {
        &self.scene.camera_manager.camera
    }

    pub fn status(&self) -> &LoadStatus {
        &self.status
    }

    pub fn counters(&self) -> RedrawCounters {
        self.counters
    }

    pub fn failed_entries(&self) -> usize {
        self.failed_entries
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed
    }

    pub fn status_title(&self) -> String {
        format!("geoview - {}", self.status)
    }

    /// Marks the scene as needing a frame; repeated calls before the next
    /// frame still produce a single draw.
    pub fn request_redraw(&mut self, cause: RedrawCause) {
        match cause {
            RedrawCause::Controller => self.counters.controller += 1,
            RedrawCause::Insertion => self.counters.insertion += 1,
            RedrawCause::Resize => self.counters.resize += 1,
        }
        self.dirty = true;
    }

    pub fn needs_redraw(&self) -> bool {
        self.dirty
    }

    /// Clears the dirty flag, returning whether a frame is due
    pub fn take_redraw(&mut self) -> bool {
        std::mem::take(&mut self.dirty)
    }

    /// Per-refresh update task. Applies accumulated controller input and
    /// requests a redraw only if the camera moved, which includes the move
    /// made when a region query repositions it.
    pub fn tick(&mut self) -> bool {
        let moved = self.scene.camera_manager.update();
        if moved {
            self.request_redraw(RedrawCause::Controller);
        }
        moved
    }

    pub fn handle_window_event(&mut self, event: &WindowEvent) {
        if self.scene.camera_manager.process_window_event(event) {
            self.request_redraw(RedrawCause::Controller);
        }
    }

    pub fn handle_device_event(&mut self, event: &DeviceEvent) {
        self.scene.camera_manager.process_device_event(event);
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        self.scene
            .camera_manager
            .camera
            .resize_projection(width, height);
        self.request_redraw(RedrawCause::Resize);
    }

    /// Syncs the headlight and camera uniform for the frame about to be drawn
    pub fn prepare_frame(&mut self) {
        self.scene.update();
        self.counters.frames += 1;
    }

    /// A new region load is starting
    pub fn begin_load(&mut self) {
        self.status = LoadStatus::Querying;
    }

    pub fn can_retry(&self) -> bool {
        !self.disposed && matches!(self.status, LoadStatus::Failed(_))
    }

    /// Continuation for everything the loader reports
    pub fn apply(&mut self, event: LoadEvent) {
        if self.disposed {
            return;
        }

        match event {
            LoadEvent::RegionResolved { eye, target, ids } => {
                // The next tick sees the new pose and draws it
                info!("Placing camera at {eye:?} looking at {target:?}");
                self.scene.camera_manager.camera.look_from(eye, target);
                self.status = LoadStatus::Loading {
                    total: ids.len(),
                    done: 0,
                    failed: 0,
                };
            }
            LoadEvent::ObjectLoaded(object) => {
                if self.scene.insert(object) {
                    if let LoadStatus::Loading { done, .. } = &mut self.status {
                        *done += 1;
                    }
                    self.request_redraw(RedrawCause::Insertion);
                }
            }
            LoadEvent::EntryFailed { id, error } => {
                warn!("Geometry '{id}' not shown: {error}");
                self.failed_entries += 1;
                if let LoadStatus::Loading { failed, .. } = &mut self.status {
                    *failed += 1;
                }
            }
            LoadEvent::RegionFailed(err) => {
                error!("Could not load region: {err}");
                self.status = LoadStatus::Failed(err.to_string());
            }
            LoadEvent::Finished { loaded, failed } => {
                info!(
                    "Scene holds {} objects ({} triangles)",
                    self.scene.len(),
                    self.scene.triangle_count()
                );
                self.status = LoadStatus::Loaded { loaded, failed };
            }
        }
    }

    /// Stops accepting loader results; later events are dropped
    pub fn dispose(&mut self) {
        self.disposed = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        error::LoadError,
        loader::tests::{demo_target, run_load, MockSource},
    };
    use cgmath::{InnerSpace, Zero};

    fn viewer() -> Viewer {
        Viewer::new(
            &SceneSettings::default(),
            1.5,
            Vector3::new(0.0, 0.0, 50.0),
            Vector3::zero(),
        )
    }

    fn assert_near(a: Vector3<f32>, b: Vector3<f32>) {
        assert!((a - b).magnitude() < 1e-4, "{a:?} != {b:?}");
    }

    fn load_into(viewer: &mut Viewer, source: &MockSource) {
        let (_, events) = run_load(source, 8);
        for event in events {
            viewer.apply(event);
        }
    }

    #[test]
    fn test_two_ids_load_and_reposition_camera() {
        let mut viewer = viewer();
        viewer.take_redraw();
        let source = MockSource::with_ids(&["a", "b"]);
        load_into(&mut viewer, &source);

        let mut fetched = source.fetched.borrow().clone();
        fetched.sort();
        assert_eq!(fetched, vec!["a", "b"]);

        assert_eq!(viewer.scene().len(), 2);
        assert!(viewer.scene().contains("a") && viewer.scene().contains("b"));
        assert_eq!(viewer.counters().insertion, 2);
        assert_eq!(viewer.counters().requests(), 2);
        assert_near(viewer.camera().eye, Vector3::new(10.0, -9.0, 28.0));
        assert_near(viewer.camera().target, demo_target());
        assert_eq!(
            viewer.status(),
            &LoadStatus::Loaded {
                loaded: 2,
                failed: 0
            }
        );

        // Many requests, one frame
        assert!(viewer.take_redraw());
        assert!(!viewer.take_redraw());

        // The update task picks up the moved camera once
        assert!(viewer.tick());
        assert!(!viewer.tick());
        assert_eq!(viewer.counters().controller, 1);
    }

    #[test]
    fn test_empty_region_still_moves_camera() {
        let mut viewer = viewer();
        viewer.take_redraw();
        let source = MockSource::with_ids(&[]);
        load_into(&mut viewer, &source);

        assert!(source.fetched.borrow().is_empty());
        assert!(viewer.scene().is_empty());
        assert_eq!(viewer.counters().requests(), 0);
        assert!(!viewer.needs_redraw());
        assert_near(viewer.camera().eye, Vector3::new(10.0, -9.0, 28.0));

        assert!(viewer.tick());
        assert_eq!(viewer.counters().controller, 1);
        assert!(viewer.needs_redraw());
    }

    #[test]
    fn test_region_failure_leaves_camera_and_reports() {
        let mut viewer = viewer();
        load_into(&mut viewer, &MockSource::failing_region());

        assert_eq!(viewer.camera().eye, Vector3::new(0.0, 0.0, 50.0));
        assert_eq!(viewer.counters().requests(), 0);
        assert!(viewer.can_retry());
        assert!(viewer.status_title().contains("database unavailable"));

        viewer.begin_load();
        assert_eq!(viewer.status(), &LoadStatus::Querying);
        assert!(!viewer.can_retry());
    }

    #[test]
    fn test_failed_entry_is_skipped_without_redraw() {
        let mut viewer = viewer();
        let mut source = MockSource::with_ids(&["good", "bad"]);
        source.entries.insert("bad".to_string(), "%%%".to_string());
        load_into(&mut viewer, &source);

        assert_eq!(viewer.scene().len(), 1);
        assert_eq!(viewer.failed_entries(), 1);
        assert_eq!(viewer.counters().insertion, 1);
        assert_eq!(viewer.status_title(), "geoview - 1 objects, 1 failed");
    }

    #[test]
    fn test_duplicate_object_is_not_redrawn() {
        let mut viewer = viewer();
        let source = MockSource::with_ids(&["a"]);
        load_into(&mut viewer, &source);
        load_into(&mut viewer, &source);

        assert_eq!(viewer.scene().len(), 1);
        assert_eq!(viewer.counters().insertion, 1);
    }

    #[test]
    fn test_duplicate_object_is_not_counted_as_done() {
        let mut viewer = viewer();
        let source = MockSource::with_ids(&["a"]);
        load_into(&mut viewer, &source);

        let (_, events) = run_load(&source, 8);
        for event in events {
            if matches!(event, LoadEvent::Finished { .. }) {
                break;
            }
            viewer.apply(event);
        }
        assert_eq!(
            viewer.status(),
            &LoadStatus::Loading {
                total: 1,
                done: 0,
                failed: 0
            }
        );
    }

    #[test]
    fn test_tick_without_input_requests_nothing() {
        let mut viewer = viewer();
        viewer.take_redraw();
        for _ in 0..10 {
            assert!(!viewer.tick());
        }
        assert!(!viewer.needs_redraw());
        assert_eq!(viewer.counters().requests(), 0);
    }

    #[test]
    fn test_frame_follows_camera_with_headlight() {
        let mut viewer = viewer();
        viewer.resize(800, 400);
        assert_eq!(viewer.counters().resize, 1);

        viewer.prepare_frame();
        assert_eq!(viewer.scene().headlight.position, Vector3::new(0.0, 0.0, 50.0));
        assert_eq!(viewer.counters().frames, 1);
    }

    #[test]
    fn test_events_after_dispose_are_dropped() {
        let mut viewer = viewer();
        viewer.dispose();
        viewer.apply(LoadEvent::RegionFailed(LoadError::EmptyGeometry("x".into())));
        assert_eq!(viewer.status(), &LoadStatus::Idle);
        assert!(!viewer.can_retry());
    }
}
