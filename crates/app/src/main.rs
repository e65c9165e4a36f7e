//! Batch engine demo.
//!
//! Draws a rotating field of cubes large enough to need several batches per
//! frame under the default policy, and logs frame rate and batch statistics
//! once per second.
//!
//! Batch sizes and the fence timeout can be overridden through the
//! `BATCHER_*` environment variables (see `batcher_core::config`).

use anyhow::Result;
use glam::Vec3;
use tracing::{error, info};
use winit::application::ApplicationHandler;
use winit::event::WindowEvent;
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::window::WindowId;

use batcher_core::{EngineConfig, FrameTimer};
use batcher_platform::Window;
use batcher_renderer::{CameraViewData, Renderer, RendererConfig, RendererResult, VulkanBackend};
use batcher_scene::{Camera, Mesh, Transform};

/// Cubes per side of the grid.
const GRID_SIZE: i32 = 20;
const GRID_SPACING: f32 = 1.6;

struct App {
    config: EngineConfig,
    window: Option<Window>,
    renderer: Option<Renderer<VulkanBackend>>,
    camera: Camera,
    cube: Mesh,
    timer: FrameTimer,
}

impl App {
    fn new(config: EngineConfig) -> Self {
        Self {
            config,
            window: None,
            renderer: None,
            camera: Camera::new(),
            cube: Mesh::cube(),
            timer: FrameTimer::new(),
        }
    }

    fn init(&mut self, event_loop: &ActiveEventLoop) -> Result<()> {
        let window = Window::new(
            event_loop,
            self.config.window_width,
            self.config.window_height,
            &self.config.window_title,
        )?;

        let renderer_config = RendererConfig::from(&self.config);
        let backend = VulkanBackend::new(&window, &renderer_config)?;
        let renderer = Renderer::new(backend, &renderer_config)?;

        self.camera.set_viewport_size(window.width(), window.height());
        self.renderer = Some(renderer);
        self.window = Some(window);
        Ok(())
    }

    fn draw_frame(&mut self) -> RendererResult<()> {
        let Some(renderer) = self.renderer.as_mut() else {
            return Ok(());
        };
        if self.window.as_ref().is_some_and(Window::is_minimized) {
            return Ok(());
        }

        let time = self.timer.elapsed_secs();
        let extent = GRID_SIZE as f32 * GRID_SPACING;
        self.camera.orbit(time * 0.2, extent, extent * 0.6);

        renderer.begin_frame(&CameraViewData::from_camera(&self.camera))?;

        let half = (GRID_SIZE - 1) as f32 * 0.5;
        for x in 0..GRID_SIZE {
            for z in 0..GRID_SIZE {
                let phase = (x + z) as f32 * 0.25;
                let transform = Transform::new()
                    .with_translate(Vec3::new(
                        (x as f32 - half) * GRID_SPACING,
                        (time * 2.0 + phase).sin() * 0.5,
                        (z as f32 - half) * GRID_SPACING,
                    ))
                    .with_rotate(Vec3::new(0.0, time + phase, time * 0.5));
                renderer.draw_mesh(&self.cube, &transform)?;
            }
        }

        renderer.end_frame()?;

        let (_, report) = self.timer.tick();
        if let Some(report) = report {
            let stats = renderer.stats();
            info!(
                "{:.1} fps | {} draw calls, {} vertices, {} triangles",
                report.fps,
                stats.draw_calls,
                stats.vertex_count,
                stats.triangle_count()
            );
        }
        Ok(())
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }
        match self.init(event_loop) {
            Ok(()) => info!("Initialization complete, entering main loop"),
            Err(e) => {
                error!("Failed to initialize: {:#}", e);
                event_loop.exit();
            }
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        match event {
            WindowEvent::CloseRequested => {
                info!("Close requested, shutting down");
                // Release GPU resources while the window is still alive.
                self.renderer = None;
                event_loop.exit();
            }
            WindowEvent::Resized(size) => {
                if let Some(window) = self.window.as_mut() {
                    window.resize(size.width, size.height);
                }
                self.camera.set_viewport_size(size.width, size.height);
                if let Some(renderer) = self.renderer.as_mut()
                    && let Err(e) = renderer.resize(size.width, size.height)
                {
                    error!("Resize failed: {}", e);
                    event_loop.exit();
                }
            }
            WindowEvent::RedrawRequested => {
                if let Err(e) = self.draw_frame() {
                    error!("Frame failed: {}", e);
                    self.renderer = None;
                    event_loop.exit();
                }
            }
            _ => {}
        }
    }

    fn about_to_wait(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(window) = self.window.as_ref() {
            window.request_redraw();
        }
    }
}

fn main() -> Result<()> {
    batcher_core::init_logging();

    let config = EngineConfig::from_env()?;
    info!(
        "Starting batcher: {} triangles / {} objects per batch",
        config.max_triangles_per_batch, config.max_objects_per_batch
    );

    let event_loop = EventLoop::new()?;
    event_loop.set_control_flow(ControlFlow::Poll);

    let mut app = App::new(config);
    event_loop.run_app(&mut app)?;

    Ok(())
}
