use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use wgpu::SurfaceError;
use winit::application::ApplicationHandler;
use winit::dpi::{PhysicalPosition, PhysicalSize};
use winit::event::{ElementState, MouseButton, MouseScrollDelta, WindowEvent};
use winit::event_loop::{ActiveEventLoop, EventLoop};
use winit::keyboard::{KeyCode, PhysicalKey};
use winit::window::{Window, WindowAttributes, WindowId};

use crate::config::Configuration;
use crate::events::{PhotoEvent, ViewerCommand};
use crate::render::stages::dust::DustStage;
use crate::render::stages::foliage::FoliageStage;
use crate::render::stages::panels::PanelStage;
use crate::render::stages::rigid::RigidStage;
use crate::render::stages::{DEPTH_FORMAT, SharedCamera};
use crate::scene::SceneEngine;
use crate::scene::camera::OrbitCamera;
use crate::scene::palette;
use crate::scene::progress::Formation;

#[derive(Debug)]
enum ViewerEvent {
    Cancelled,
}

/// Cursor drag in progress; `moved` decides click vs. orbit on release.
struct Drag {
    last: PhysicalPosition<f64>,
    moved: f64,
}

const CLICK_SLOP_PX: f64 = 6.0;
/// Frame delta clamp so a stall does not teleport the morph.
const MAX_FRAME_DT: f32 = 0.25;

struct GpuState {
    surface: wgpu::Surface<'static>,
    surface_config: wgpu::SurfaceConfiguration,
    device: wgpu::Device,
    queue: wgpu::Queue,
    depth_view: wgpu::TextureView,
    camera: SharedCamera,
    foliage: FoliageStage,
    rigid: RigidStage,
    panels: PanelStage,
    dust: DustStage,
}

impl GpuState {
    fn aspect(&self) -> f32 {
        self.surface_config.width as f32 / self.surface_config.height.max(1) as f32
    }
}

struct ViewerApp {
    cancel: CancellationToken,
    engine: SceneEngine,
    orbit: OrbitCamera,
    photo_rx: mpsc::Receiver<PhotoEvent>,
    control_rx: mpsc::Receiver<ViewerCommand>,
    window: Option<Arc<Window>>,
    gpu: Option<GpuState>,
    last_frame: Option<Instant>,
    cursor: Option<PhysicalPosition<f64>>,
    drag: Option<Drag>,
    clear_color: wgpu::Color,
}

impl ViewerApp {
    fn new(
        engine: SceneEngine,
        cancel: CancellationToken,
        photo_rx: mpsc::Receiver<PhotoEvent>,
        control_rx: mpsc::Receiver<ViewerCommand>,
    ) -> Self {
        let [r, g, b, a] = palette::linear_rgba(palette::BACKDROP);
        Self {
            cancel,
            engine,
            orbit: OrbitCamera::default(),
            photo_rx,
            control_rx,
            window: None,
            gpu: None,
            last_frame: None,
            cursor: None,
            drag: None,
            clear_color: wgpu::Color {
                r: r as f64,
                g: g as f64,
                b: b as f64,
                a: a as f64,
            },
        }
    }

    fn ensure_window(&mut self, event_loop: &ActiveEventLoop) -> Option<Arc<Window>> {
        if let Some(window) = self.window.as_ref() {
            return Some(window.clone());
        }
        let attrs = WindowAttributes::default().with_title("Memory Tree");
        match event_loop.create_window(attrs) {
            Ok(window) => {
                let window = Arc::new(window);
                self.window = Some(window.clone());
                Some(window)
            }
            Err(err) => {
                error!(error = %err, "failed to create viewer window");
                None
            }
        }
    }

    fn init_gpu(&mut self, window: Arc<Window>) -> Result<()> {
        let instance = wgpu::Instance::default();
        let surface = instance
            .create_surface(window.clone())
            .context("failed to create surface")?;
        let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::HighPerformance,
            compatible_surface: Some(&surface),
            force_fallback_adapter: false,
        }))
        .context("failed to acquire GPU adapter")?;

        let caps = surface.get_capabilities(&adapter);
        let format = caps
            .formats
            .iter()
            .copied()
            .find(|fmt| fmt.is_srgb())
            .unwrap_or(caps.formats[0]);

        let limits = adapter.limits();
        let (device, queue) = pollster::block_on(adapter.request_device(&wgpu::DeviceDescriptor {
            label: Some("viewer-device"),
            required_features: wgpu::Features::empty(),
            experimental_features: wgpu::ExperimentalFeatures::default(),
            required_limits: limits,
            memory_hints: wgpu::MemoryHints::default(),
            trace: wgpu::Trace::default(),
        }))
        .context("failed to acquire GPU device")?;

        let size = window.inner_size();
        let surface_config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format,
            width: size.width.max(1),
            height: size.height.max(1),
            present_mode: wgpu::PresentMode::AutoVsync,
            alpha_mode: caps.alpha_modes[0],
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&device, &surface_config);
        info!(
            width = surface_config.width,
            height = surface_config.height,
            format = ?surface_config.format,
            "viewer surface configured",
        );

        let depth_view = create_depth_view(&device, &surface_config);
        let camera = SharedCamera::new(&device);
        let foliage = FoliageStage::new(&device, format, &camera, self.engine.foliage());
        let rigid = RigidStage::new(&device, format, &camera);
        let panels = PanelStage::new(&device, format, &camera);
        let dust = DustStage::new(&device, format, &camera);

        self.gpu = Some(GpuState {
            surface,
            surface_config,
            device,
            queue,
            depth_view,
            camera,
            foliage,
            rigid,
            panels,
            dust,
        });
        Ok(())
    }

    fn handle_resize(&mut self, new_size: PhysicalSize<u32>) {
        let Some(gpu) = self.gpu.as_mut() else {
            return;
        };
        gpu.surface_config.width = new_size.width.max(1);
        gpu.surface_config.height = new_size.height.max(1);
        gpu.surface.configure(&gpu.device, &gpu.surface_config);
        gpu.depth_view = create_depth_view(&gpu.device, &gpu.surface_config);
        debug!(
            width = gpu.surface_config.width,
            height = gpu.surface_config.height,
            "viewer surface resized",
        );
    }

    /// Applies the queued control and library events, then ticks the scene.
    /// Pool mutation happens here, strictly between engine ticks.
    fn drain_events(&mut self) {
        while let Ok(command) = self.control_rx.try_recv() {
            match command {
                ViewerCommand::ToggleFormation => {
                    let formation = self.engine.toggle_formation();
                    info!(?formation, "formation toggled");
                }
            }
        }
        while let Ok(event) = self.photo_rx.try_recv() {
            match event {
                PhotoEvent::Added(photo) => {
                    let aspect = photo.aspect();
                    let key = self.engine.add_photo(photo.path.clone(), aspect);
                    if let Some(gpu) = self.gpu.as_mut() {
                        gpu.panels.add_texture(&gpu.device, &gpu.queue, key, &photo);
                    }
                    info!(path = %photo.path.display(), aspect, "photo frame added");
                }
                PhotoEvent::Removed(path) => {
                    if let Some(key) = self.engine.remove_photo(&path) {
                        if let Some(gpu) = self.gpu.as_mut() {
                            gpu.panels.remove_texture(key);
                        }
                        info!(path = %path.display(), "photo frame removed");
                    }
                }
            }
        }
    }

    fn draw(&mut self, event_loop: &ActiveEventLoop) {
        self.drain_events();

        let now = Instant::now();
        let dt = self
            .last_frame
            .map(|last| (now - last).as_secs_f32().min(MAX_FRAME_DT))
            .unwrap_or(0.0);
        self.last_frame = Some(now);

        self.orbit
            .tick(dt, self.engine.formation() == Formation::Tree);
        let pose = self.orbit.pose();
        self.engine.tick(dt, &pose);

        let Some(gpu) = self.gpu.as_mut() else {
            return;
        };
        let Some(window) = self.window.as_ref() else {
            return;
        };

        gpu.camera.write(&gpu.queue, &pose, gpu.aspect());
        gpu.rigid.upload(&gpu.device, &gpu.queue, self.engine.rigid());
        gpu.foliage
            .upload_globals(&gpu.queue, self.engine.foliage().globals());
        gpu.panels
            .prepare(&gpu.device, &gpu.queue, self.engine.album());
        gpu.dust
            .upload(&gpu.queue, self.engine.album().dust(), &pose);

        let frame = match gpu.surface.get_current_texture() {
            Ok(frame) => frame,
            Err(SurfaceError::Outdated) | Err(SurfaceError::Lost) => {
                info!("viewer surface lost; reconfiguring");
                let size = window.inner_size();
                self.handle_resize(size);
                return;
            }
            Err(SurfaceError::OutOfMemory) => {
                error!("viewer surface out of memory; exiting event loop");
                event_loop.exit();
                return;
            }
            Err(SurfaceError::Timeout) => {
                warn!("viewer surface acquisition timed out");
                return;
            }
            Err(SurfaceError::Other) => {
                warn!("viewer surface reported an unknown error; retrying");
                let size = window.inner_size();
                self.handle_resize(size);
                return;
            }
        };

        let view = frame
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());
        let mut encoder = gpu
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("viewer-encoder"),
            });
        {
            let mut rpass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("scene-pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &view,
                    resolve_target: None,
                    depth_slice: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(self.clear_color),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &gpu.depth_view,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(1.0),
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                occlusion_query_set: None,
                timestamp_writes: None,
            });
            gpu.rigid.draw(&mut rpass, &gpu.camera);
            gpu.foliage.draw(&mut rpass, &gpu.camera);
            gpu.panels.draw(&mut rpass, &gpu.camera);
            gpu.dust.draw(&mut rpass, &gpu.camera);
        }
        gpu.queue.submit(std::iter::once(encoder.finish()));
        frame.present();

        // The scene animates continuously.
        window.request_redraw();
    }

    fn handle_click(&mut self, position: PhysicalPosition<f64>) {
        let Some(gpu) = self.gpu.as_ref() else {
            return;
        };
        let width = gpu.surface_config.width.max(1) as f64;
        let height = gpu.surface_config.height.max(1) as f64;
        let ndc_x = (position.x / width * 2.0 - 1.0) as f32;
        let ndc_y = (1.0 - position.y / height * 2.0) as f32;
        let ray = self.orbit.pose().picking_ray(ndc_x, ndc_y, gpu.aspect());
        match self.engine.pick_photo(&ray) {
            Some(key) => {
                if let Some(change) = self.engine.select_photo(key) {
                    debug!(?change, "photo selection");
                }
            }
            None => {
                if let Some(change) = self.engine.clear_focus() {
                    debug!(?change, "background deselect");
                }
            }
        }
    }
}

fn create_depth_view(
    device: &wgpu::Device,
    config: &wgpu::SurfaceConfiguration,
) -> wgpu::TextureView {
    let texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some("viewer-depth"),
        size: wgpu::Extent3d {
            width: config.width.max(1),
            height: config.height.max(1),
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: DEPTH_FORMAT,
        usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
        view_formats: &[],
    });
    texture.create_view(&wgpu::TextureViewDescriptor::default())
}

impl ApplicationHandler<ViewerEvent> for ViewerApp {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.cancel.is_cancelled() {
            event_loop.exit();
            return;
        }
        let Some(window) = self.ensure_window(event_loop) else {
            event_loop.exit();
            return;
        };
        if self.gpu.is_none() {
            if let Err(err) = self.init_gpu(window) {
                error!(error = ?err, "failed to initialize GPU state");
                event_loop.exit();
                return;
            }
        }
        if let Some(window) = self.window.as_ref() {
            window.request_redraw();
        }
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        window_id: WindowId,
        event: WindowEvent,
    ) {
        let Some(window) = self.window.as_ref() else {
            return;
        };
        if window.id() != window_id {
            return;
        }

        match event {
            WindowEvent::CloseRequested => {
                info!("viewer window close requested");
                event_loop.exit();
            }
            WindowEvent::Resized(new_size) => {
                self.handle_resize(new_size);
            }
            WindowEvent::ScaleFactorChanged {
                mut inner_size_writer,
                ..
            } => {
                let size = window.inner_size();
                let _ = inner_size_writer.request_inner_size(size);
                self.handle_resize(size);
            }
            WindowEvent::KeyboardInput { event, .. } => {
                if event.physical_key == PhysicalKey::Code(KeyCode::Space)
                    && event.state == ElementState::Pressed
                    && !event.repeat
                {
                    let formation = self.engine.toggle_formation();
                    info!(?formation, "formation toggled");
                }
            }
            WindowEvent::CursorMoved { position, .. } => {
                if let Some(drag) = self.drag.as_mut() {
                    let dx = position.x - drag.last.x;
                    let dy = position.y - drag.last.y;
                    drag.moved += dx.abs() + dy.abs();
                    drag.last = position;
                    self.orbit.rotate(dx as f32, dy as f32);
                }
                self.cursor = Some(position);
            }
            WindowEvent::MouseInput {
                state,
                button: MouseButton::Left,
                ..
            } => match state {
                ElementState::Pressed => {
                    if let Some(cursor) = self.cursor {
                        self.drag = Some(Drag {
                            last: cursor,
                            moved: 0.0,
                        });
                    }
                }
                ElementState::Released => {
                    let was_click = self
                        .drag
                        .take()
                        .is_some_and(|drag| drag.moved < CLICK_SLOP_PX);
                    if was_click {
                        if let Some(cursor) = self.cursor {
                            self.handle_click(cursor);
                        }
                    }
                }
            },
            WindowEvent::MouseWheel { delta, .. } => {
                let steps = match delta {
                    MouseScrollDelta::LineDelta(_, y) => y,
                    MouseScrollDelta::PixelDelta(pos) => (pos.y / 40.0) as f32,
                };
                self.orbit.zoom(steps);
            }
            WindowEvent::RedrawRequested => {
                self.draw(event_loop);
            }
            _ => {}
        }
    }

    fn user_event(&mut self, event_loop: &ActiveEventLoop, event: ViewerEvent) {
        match event {
            ViewerEvent::Cancelled => {
                info!("viewer received cancellation event");
                event_loop.exit();
            }
        }
    }
}

/// Runs the windowed scene on the calling thread until the window closes or
/// `cancel` fires. Library photo events and out-of-band commands arrive on
/// the two channels and are applied between frames.
pub fn run_windowed(
    config: &Configuration,
    cancel: CancellationToken,
    photo_rx: mpsc::Receiver<PhotoEvent>,
    control_rx: mpsc::Receiver<ViewerCommand>,
) -> Result<()> {
    let engine = SceneEngine::new(config).context("failed to build scene")?;

    let event_loop = EventLoop::<ViewerEvent>::with_user_event()
        .build()
        .context("failed to build viewer event loop")?;
    let proxy = event_loop.create_proxy();

    let cancel_task = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            cancel.cancelled().await;
            let _ = proxy.send_event(ViewerEvent::Cancelled);
        })
    };

    let mut app = ViewerApp::new(engine, cancel, photo_rx, control_rx);
    let run_result = event_loop.run_app(&mut app);
    cancel_task.abort();

    run_result.context("viewer event loop failed")
}
