//! The viewer state: scene, camera, asset pipelines, and the per-frame loop.
//!
//! Frame order is fixed: drain finished pipeline work, advance the damped
//! orbit rig, upload frame data, then record one render pass. The static
//! scene is composed before the first frame; decoded assets pop in whenever
//! their worker finishes.

use std::{
    path::PathBuf,
    sync::{Arc, mpsc},
};

use anyhow::Context as _;
use winit::{
    event::{ElementState, MouseButton, MouseScrollDelta, WindowEvent},
    window::Window,
};

use crate::assets::{self, PipelineEvent};
use crate::camera::{DEFAULT_EYE, OrbitControls, PerspectiveCamera};
use crate::font::{FontSystem, label::LabelStyle};
use crate::render::{app::AppState, gpu::Gpu, mesh_renderer::MeshRenderer, util::FrameClock};
use crate::scene::{Scene, compose};
use crate::viewport::Viewport;

/// Wheel lines per pixel for trackpad-style scroll deltas.
const PIXELS_PER_SCROLL_LINE: f64 = 50.0;

#[derive(Debug, Clone)]
pub struct ViewerConfig {
    pub title: String,
    /// Directory holding `models/` and `matcaps/`.
    pub assets_dir: PathBuf,
    /// Matcap image path, relative to `assets_dir`.
    pub matcap_path: PathBuf,
    pub label_style: LabelStyle,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            title: "vitrine".to_string(),
            assets_dir: PathBuf::from("assets"),
            matcap_path: PathBuf::from("matcaps/4.png"),
            label_style: LabelStyle::default(),
        }
    }
}

pub struct Viewer {
    window: Arc<Window>,
    gpu: Gpu,
    viewport: Viewport,
    renderer: MeshRenderer,

    scene: Scene,
    camera: PerspectiveCamera,
    controls: OrbitControls,
    clock: FrameClock,

    events: mpsc::Receiver<PipelineEvent>,
    pipelines_done: bool,
}

impl Viewer {
    pub async fn new(window: Arc<Window>, config: ViewerConfig) -> anyhow::Result<Self> {
        let mut gpu = Gpu::new(window.clone()).await?;
        let viewport = Viewport::new(window.inner_size(), window.scale_factor());
        // Apply the pixel-ratio cap from the very first frame.
        gpu.resize(viewport.surface_size());

        let matcap = load_matcap(&config.assets_dir.join(&config.matcap_path));
        let renderer =
            MeshRenderer::new(&gpu, &matcap).context("renderer: pipeline creation failed")?;

        let mut scene = Scene::new();
        compose::compose_static_scene(&mut scene);

        // A dead font system only costs the labels, never the meshes.
        let fonts = match FontSystem::new() {
            Ok(fonts) => Some(Arc::new(fonts)),
            Err(err) => {
                log::warn!("fonts unavailable, labels will be skipped: {err}");
                None
            }
        };

        let (tx, rx) = mpsc::channel();
        let specs = assets::default_pipelines(&config.assets_dir);
        assets::spawn_pipelines(&specs, fonts, &config.label_style, tx);

        let camera = PerspectiveCamera::new(viewport.aspect());
        let controls = OrbitControls::from_eye_target(DEFAULT_EYE, glam::Vec3::ZERO);

        Ok(Self {
            window,
            gpu,
            viewport,
            renderer,
            scene,
            camera,
            controls,
            clock: FrameClock::new(),
            events: rx,
            pipelines_done: false,
        })
    }
}

impl AppState for Viewer {
    fn resize(&mut self, new_size: winit::dpi::PhysicalSize<u32>) {
        self.viewport.on_resize(new_size);
        self.gpu.resize(self.viewport.surface_size());
        self.camera.aspect = self.viewport.aspect();
    }

    fn input(&mut self, event: &WindowEvent) {
        match event {
            WindowEvent::CursorMoved { position, .. } => {
                self.controls.on_cursor(position.x, position.y);
            }
            WindowEvent::MouseInput { state, button, .. } => match (state, button) {
                (ElementState::Pressed, MouseButton::Left) => self.controls.begin_rotate(),
                (ElementState::Pressed, MouseButton::Right | MouseButton::Middle) => {
                    self.controls.begin_pan()
                }
                (ElementState::Released, _) => self.controls.end_drag(),
                _ => {}
            },
            WindowEvent::MouseWheel { delta, .. } => {
                let lines = match delta {
                    MouseScrollDelta::LineDelta(_, y) => *y,
                    MouseScrollDelta::PixelDelta(pos) => (pos.y / PIXELS_PER_SCROLL_LINE) as f32,
                };
                self.controls.on_scroll(lines);
            }
            WindowEvent::ScaleFactorChanged { scale_factor, .. } => {
                self.viewport.set_scale_factor(*scale_factor);
                self.gpu.resize(self.viewport.surface_size());
            }
            _ => {}
        }
    }

    fn render(&mut self) -> anyhow::Result<()> {
        if !self.pipelines_done && assets::drain_events(&mut self.scene, &self.events) {
            self.pipelines_done = true;
            log::info!(
                "all asset pipelines finished after {:.2}s",
                self.clock.elapsed_s()
            );
        }

        self.controls.update();

        // Acquire frame (handle recoverable surface errors).
        let (surface_texture, view) = match self.gpu.acquire_frame() {
            Ok(v) => v,
            Err(wgpu::SurfaceError::Outdated) | Err(wgpu::SurfaceError::Lost) => {
                self.gpu.resize(self.gpu.size);
                self.request_redraw();
                return Ok(());
            }
            Err(wgpu::SurfaceError::Timeout) => {
                self.request_redraw();
                return Ok(());
            }
            Err(wgpu::SurfaceError::OutOfMemory) => {
                return Err(anyhow::anyhow!("wgpu SurfaceError::OutOfMemory"));
            }
            Err(wgpu::SurfaceError::Other) => {
                self.gpu.resize(self.gpu.size);
                self.request_redraw();
                return Ok(());
            }
        };

        let frame = self.scene.flatten();
        self.renderer.prepare(
            &self.gpu,
            self.controls.view(),
            self.camera.projection(),
            self.controls.eye(),
            &frame,
        );

        let mut encoder = self
            .gpu
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Main Encoder"),
            });

        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Main Render Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &view,
                    depth_slice: None,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color {
                            r: 0.05,
                            g: 0.06,
                            b: 0.08,
                            a: 1.0,
                        }),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &self.gpu.depth_view,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(1.0),
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                timestamp_writes: None,
                occlusion_query_set: None,
            });

            self.renderer.draw(&mut pass, &frame);
        }

        self.gpu.queue.submit(Some(encoder.finish()));
        self.window.pre_present_notify();
        surface_texture.present();

        // Continuous redraw keeps the damped controls animating.
        self.request_redraw();
        Ok(())
    }

    fn request_redraw(&self) {
        self.window.request_redraw();
    }
}

/// Load the matcap image, falling back to a procedural sphere gradient so a
/// missing file never blocks startup.
fn load_matcap(path: &std::path::Path) -> image::RgbaImage {
    match image::open(path) {
        Ok(img) => img.to_rgba8(),
        Err(err) => {
            log::warn!(
                "matcap {} unavailable ({err}), using procedural fallback",
                path.display()
            );
            procedural_matcap(256)
        }
    }
}

/// A soft radial highlight, upper-left biased like a studio matcap.
fn procedural_matcap(size: u32) -> image::RgbaImage {
    image::RgbaImage::from_fn(size, size, |x, y| {
        let u = (x as f32 + 0.5) / size as f32 * 2.0 - 1.0;
        let v = (y as f32 + 0.5) / size as f32 * 2.0 - 1.0;
        let d = ((u + 0.4).powi(2) + (v + 0.4).powi(2)).sqrt();
        let lum = (1.0 - d * 0.6).clamp(0.05, 1.0);
        let c = (lum * 255.0) as u8;
        image::Rgba([c, c, (c as f32 * 1.05).min(255.0) as u8, 255])
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_points_at_the_assets_tree() {
        let cfg = ViewerConfig::default();
        assert_eq!(cfg.assets_dir, PathBuf::from("assets"));
        assert_eq!(cfg.matcap_path, PathBuf::from("matcaps/4.png"));
        assert_eq!(cfg.label_style.size, 0.25);
    }

    #[test]
    fn procedural_matcap_is_brightest_toward_the_highlight() {
        let img = procedural_matcap(64);
        let highlight = img.get_pixel(16, 16).0[0];
        let corner = img.get_pixel(63, 63).0[0];
        assert!(highlight > corner);
    }
}
