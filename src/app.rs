use std::{
    sync::Arc,
    time::{Duration, Instant},
};

use log::{debug, error, info, warn};
use winit::{
    application::ApplicationHandler,
    dpi::{LogicalSize, PhysicalSize},
    event::{DeviceEvent, DeviceId, ElementState, KeyEvent, WindowEvent},
    event_loop::{ActiveEventLoop, ControlFlow, EventLoop, EventLoopProxy},
    keyboard::{KeyCode, PhysicalKey},
    window::{Window, WindowAttributes, WindowId},
};

use crate::{
    config::{to_vector, SceneSettings, ViewerConfig},
    error::{LoadError, ViewerError},
    gfx::RenderEngine,
    loader::{HttpGeometrySource, LoadEvent, LoaderTask},
    viewer::{RedrawCause, Viewer},
};

/// Interval of the update task between input events
const TICK: Duration = Duration::from_millis(16);

/// Window, renderer and loader around a [`Viewer`].
///
/// Loader results arrive as user events through an [`EventLoopProxy`], so
/// the viewer is only ever touched from the event-loop thread.
pub struct ViewerApp {
    event_loop: EventLoop<LoadEvent>,
    state: AppState,
}

struct AppState {
    config: ViewerConfig,
    settings: SceneSettings,
    proxy: EventLoopProxy<LoadEvent>,
    viewer: Viewer,
    window: Option<Arc<Window>>,
    render_engine: Option<RenderEngine>,
    loader: Option<LoaderTask>,
    title: String,
    fatal: Option<ViewerError>,
}

impl ViewerApp {
    pub fn new(config: ViewerConfig) -> Result<Self, ViewerError> {
        Self::with_settings(config, SceneSettings::default())
    }

    pub fn with_settings(config: ViewerConfig, settings: SceneSettings) -> Result<Self, ViewerError> {
        let event_loop = EventLoop::<LoadEvent>::with_user_event().build()?;
        let proxy = event_loop.create_proxy();

        let aspect = config.width.max(1) as f32 / config.height.max(1) as f32;
        let viewer = Viewer::new(&settings, aspect, to_vector(config.eye), config.target());

        Ok(Self {
            event_loop,
            state: AppState {
                config,
                settings,
                proxy,
                viewer,
                window: None,
                render_engine: None,
                loader: None,
                title: String::new(),
                fatal: None,
            },
        })
    }

    /// Runs until the window is closed
    pub fn run(self) -> Result<(), ViewerError> {
        let Self {
            event_loop,
            mut state,
        } = self;
        event_loop.set_control_flow(ControlFlow::WaitUntil(Instant::now() + TICK));
        event_loop.run_app(&mut state)?;

        match state.fatal.take() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

impl AppState {
    fn init_window(&mut self, event_loop: &ActiveEventLoop) -> Result<(), ViewerError> {
        let window = Arc::new(
            event_loop.create_window(
                WindowAttributes::default()
                    .with_title(self.viewer.status_title())
                    .with_inner_size(LogicalSize::new(self.config.width, self.config.height)),
            )?,
        );

        let PhysicalSize { width, height } = window.inner_size();
        let render_engine = pollster::block_on(RenderEngine::new(
            window.clone(),
            width,
            height,
            self.settings.clear_color,
        ))?;
        info!(
            "Render surface {}x{} ({:?})",
            width,
            height,
            render_engine.surface_format()
        );

        self.viewer.resize(width, height);
        self.window = Some(window);
        self.render_engine = Some(render_engine);
        Ok(())
    }

    /// Starts a region load, replacing any load still running
    fn start_load(&mut self) {
        if let Some(previous) = self.loader.take() {
            previous.dispose();
        }
        self.viewer.begin_load();

        match self.spawn_loader() {
            Ok(task) => self.loader = Some(task),
            Err(err) => self.viewer.apply(LoadEvent::RegionFailed(err)),
        }
        self.sync_title();
    }

    fn spawn_loader(&self) -> Result<LoaderTask, LoadError> {
        let region = self.config.region()?;
        let source = HttpGeometrySource::new(&self.config.server, self.config.timeout())?;
        info!("Querying {} for region {:?}", self.config.server, region.bounds());

        let proxy = self.proxy.clone();
        LoaderTask::spawn(
            source,
            region,
            self.config.target(),
            self.config.max_in_flight,
            move |event| {
                if proxy.send_event(event).is_err() {
                    debug!("Event loop closed, dropping load event");
                }
            },
        )
    }

    fn shutdown(&mut self, event_loop: &ActiveEventLoop) {
        self.viewer.dispose();
        if let Some(loader) = self.loader.take() {
            loader.dispose();
        }
        event_loop.exit();
    }

    fn sync_title(&mut self) {
        let title = self.viewer.status_title();
        if title != self.title {
            if let Some(window) = &self.window {
                window.set_title(&title);
            }
            self.title = title;
        }
    }

    fn request_frame_if_dirty(&self) {
        if self.viewer.needs_redraw() {
            if let Some(window) = &self.window {
                window.request_redraw();
            }
        }
    }

    fn redraw(&mut self, event_loop: &ActiveEventLoop) {
        let Some(render_engine) = self.render_engine.as_mut() else {
            return;
        };

        self.viewer.take_redraw();
        self.viewer.prepare_frame();
        render_engine.update(self.viewer.scene_mut());

        match render_engine.render_frame(self.viewer.scene()) {
            Ok(()) => {}
            Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                self.viewer.request_redraw(RedrawCause::Resize);
            }
            Err(wgpu::SurfaceError::OutOfMemory) => {
                error!("GPU out of memory");
                self.fatal = Some(ViewerError::Graphics("out of memory".to_string()));
                self.shutdown(event_loop);
            }
            Err(err) => warn!("Frame skipped: {err}"),
        }
    }
}

impl ApplicationHandler<LoadEvent> for AppState {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }

        if let Err(err) = self.init_window(event_loop) {
            error!("Viewer setup failed: {err}");
            self.fatal = Some(err);
            self.shutdown(event_loop);
            return;
        }
        self.start_load();
    }

    fn user_event(&mut self, _event_loop: &ActiveEventLoop, event: LoadEvent) {
        self.viewer.apply(event);
        self.sync_title();
        self.request_frame_if_dirty();
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _window_id: WindowId, event: WindowEvent) {
        self.viewer.handle_window_event(&event);

        match event {
            WindowEvent::CloseRequested => self.shutdown(event_loop),
            WindowEvent::KeyboardInput {
                event:
                    KeyEvent {
                        physical_key: PhysicalKey::Code(code),
                        state: ElementState::Pressed,
                        repeat: false,
                        ..
                    },
                ..
            } => match code {
                KeyCode::Escape => self.shutdown(event_loop),
                KeyCode::KeyR if self.viewer.can_retry() => {
                    info!("Retrying region query");
                    self.start_load();
                }
                _ => {}
            },
            WindowEvent::Resized(PhysicalSize { width, height }) => {
                if let Some(render_engine) = self.render_engine.as_mut() {
                    render_engine.resize(width, height);
                }
                self.viewer.resize(width, height);
            }
            WindowEvent::RedrawRequested => self.redraw(event_loop),
            _ => {}
        }

        self.request_frame_if_dirty();
    }

    fn device_event(&mut self, _event_loop: &ActiveEventLoop, _device_id: DeviceId, event: DeviceEvent) {
        self.viewer.handle_device_event(&event);
    }

    fn about_to_wait(&mut self, event_loop: &ActiveEventLoop) {
        // Update task: runs every tick whether or not anything is loading
        self.viewer.tick();
        self.request_frame_if_dirty();
        event_loop.set_control_flow(ControlFlow::WaitUntil(Instant::now() + TICK));
    }

    fn exiting(&mut self, _event_loop: &ActiveEventLoop) {
        self.viewer.dispose();
        if let Some(loader) = self.loader.take() {
            loader.dispose();
        }
    }
}
