//! # Ember Demo
//!
//! Opens a window, brackets every redraw with `pre_draw`/`post_draw` and keeps
//! the textures given on the command line resident in the view table.
//!
//! Run with: cargo run -p ember_demo -- path/to/a.png path/to/b.jpg
//!
//! Logs go to `logs/` next to the working directory.

use ember_gpu::ember::descriptor::ViewTable;
use ember_gpu::ember::frame::FrameCore;
use ember_gpu::ember::log::{FileLogger, LogSeverity};
use ember_gpu::ember::render::Buffer;
use ember_gpu::ember::texture::TextureManager;
use ember_gpu::ember::{Config, Engine, Result};
use ember_gpu::{engine_error, engine_info, engine_warn};
use ember_gpu_vulkan::ember::VulkanGraphicsDevice;
use std::sync::Arc;
use winit::application::ApplicationHandler;
use winit::event::WindowEvent;
use winit::event_loop::{ActiveEventLoop, EventLoop};
use winit::window::{Window, WindowId};

/// Per-instance data published to shaders through a structured buffer view
#[repr(C)]
#[derive(Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
struct InstanceData {
    tint: [f32; 4],
    texture_slot: u32,
    _pad: [u32; 3],
}

/// Everything that lives as long as the GPU device
struct Gpu {
    frame: FrameCore,
    views: ViewTable,
    textures: TextureManager,
    /// Backs the structured view; must outlive every frame that binds it
    instances: Option<Arc<dyn Buffer>>,
    frame_count: u64,
}

impl Gpu {
    fn new(window: &Window, config: &Config, paths: &[String]) -> Result<Self> {
        let device = Arc::new(VulkanGraphicsDevice::new(window, config)?);
        let mut frame = FrameCore::new(device.clone(), config)?;
        let mut views = ViewTable::new(device, config.view_table_capacity, config.reserved_view_slots)?;
        let mut textures = TextureManager::new();

        for path in paths {
            // A missing texture is logged where it fails; the demo keeps going
            if textures.load_texture(&mut frame, &mut views, path).is_ok() {
                engine_info!("ember::Demo", "Loaded {} into view slot {}", path, textures.view_index(path)?);
            }
        }

        let instances: Vec<InstanceData> = paths
            .iter()
            .filter_map(|path| textures.view_index(path).ok())
            .map(|slot| InstanceData { tint: [1.0; 4], texture_slot: slot, _pad: [0; 3] })
            .collect();
        let mut instance_buffer = None;
        if !instances.is_empty() {
            let bytes: &[u8] = bytemuck::cast_slice(&instances);
            let buffer = frame.factory().create_buffer(bytes.len() as u64)?;
            buffer.write(0, bytes)?;
            let slot = views.allocate()?;
            views.create_structured_buffer_view(
                slot,
                buffer.as_ref(),
                instances.len() as u32,
                std::mem::size_of::<InstanceData>() as u32,
            )?;
            engine_info!("ember::Demo", "{} instances published at view slot {}", instances.len(), slot);
            instance_buffer = Some(buffer);
        }

        Ok(Self { frame, views, textures, instances: instance_buffer, frame_count: 0 })
    }

    fn render(&mut self) -> Result<()> {
        self.frame.pre_draw()?;
        self.views.bind(self.frame.command_list())?;
        self.frame.post_draw()?;
        self.textures.release_intermediate_resources();

        self.frame_count += 1;
        if self.frame_count % 600 == 0 {
            engine_info!(
                "ember::Demo",
                "{} frames, fence at {}",
                self.frame_count,
                self.frame.frame_state().completed_value
            );
        }
        Ok(())
    }

    fn shutdown(&mut self) {
        if let Err(e) = self.frame.flush() {
            engine_warn!("ember::Demo", "Flush on shutdown failed: {}", e);
        }
        self.textures.finalize(&mut self.frame);
        self.instances = None;
    }
}

struct App {
    config: Config,
    paths: Vec<String>,
    // Declared before the window so the surface goes first
    gpu: Option<Gpu>,
    window: Option<Window>,
    failed: bool,
}

impl App {
    fn fail(&mut self, event_loop: &ActiveEventLoop, what: &str, e: impl std::fmt::Display) {
        engine_error!("ember::Demo", "{}: {}", what, e);
        self.failed = true;
        event_loop.exit();
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }

        let attributes = Window::default_attributes()
            .with_title(self.config.app_name.clone())
            .with_inner_size(winit::dpi::PhysicalSize::new(self.config.width, self.config.height))
            .with_resizable(false);
        let window = match event_loop.create_window(attributes) {
            Ok(window) => window,
            Err(e) => return self.fail(event_loop, "Failed to create window", e),
        };

        match Gpu::new(&window, &self.config, &self.paths) {
            Ok(gpu) => self.gpu = Some(gpu),
            Err(e) => return self.fail(event_loop, "Failed to initialize the GPU", e),
        }
        window.request_redraw();
        self.window = Some(window);
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        match event {
            WindowEvent::CloseRequested => {
                engine_info!("ember::Demo", "Close requested, exiting...");
                if let Some(gpu) = self.gpu.as_mut() {
                    gpu.shutdown();
                }
                event_loop.exit();
            }
            WindowEvent::RedrawRequested => {
                let Some(gpu) = self.gpu.as_mut() else { return };
                if let Err(e) = gpu.render() {
                    return self.fail(event_loop, "Frame failed", e);
                }
                if let Some(window) = &self.window {
                    window.request_redraw();
                }
            }
            _ => {}
        }
    }
}

fn main() {
    match FileLogger::new("logs", LogSeverity::Info) {
        Ok(logger) => Engine::set_logger(logger),
        Err(e) => eprintln!("File logging unavailable ({}), logging to the console", e),
    }

    let config = Config {
        app_name: "Ember Demo".to_string(),
        ..Config::default()
    };
    let mut app = App {
        config,
        paths: std::env::args().skip(1).collect(),
        gpu: None,
        window: None,
        failed: false,
    };

    let event_loop = match EventLoop::new() {
        Ok(event_loop) => event_loop,
        Err(e) => {
            engine_error!("ember::Demo", "Failed to create event loop: {}", e);
            std::process::exit(1);
        }
    };
    if let Err(e) = event_loop.run_app(&mut app) {
        engine_error!("ember::Demo", "Event loop error: {}", e);
        app.failed = true;
    }

    let failed = app.failed;
    drop(app);
    Engine::reset_logger();
    if failed {
        std::process::exit(1);
    }
}
