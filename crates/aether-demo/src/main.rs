//! Interactive sky viewer built on the precomputed atmosphere tables.
//!
//! Opens a window, precomputes the scattering tables once at startup, and
//! renders the sky with a controllable sun and camera:
//!
//! - `W`/`S`: pitch the view up/down
//! - `A`/`D`: yaw the view left/right
//! - Arrow keys: move the sun
//! - `PageUp`/`PageDown`: change camera altitude
//! - `+`/`-`: adjust exposure

mod sky;

use std::sync::Arc;
use std::time::Instant;

use clap::Parser;
use tracing::{error, info};
use winit::application::ApplicationHandler;
use winit::event::{ElementState, WindowEvent};
use winit::event_loop::{ActiveEventLoop, EventLoop};
use winit::keyboard::{KeyCode, PhysicalKey};
use winit::window::{Window, WindowAttributes, WindowId};

use aether_atmosphere::{ModelParameters, SkyModel};
use aether_config::{CliArgs, Config};
use aether_render::RenderContext;
use sky::{SkyRenderer, SkyUniforms};

/// Vertical field of view in degrees.
const FOV_Y_DEG: f32 = 50.0;
/// Angular step per key press, in degrees.
const ANGLE_STEP_DEG: f64 = 2.0;

/// View and sun state driven by the keyboard.
struct Controls {
    /// View yaw in radians, 0 = looking toward -Z.
    yaw: f64,
    /// View pitch in radians above the horizon.
    pitch: f64,
    sun_zenith: f64,
    sun_azimuth: f64,
    exposure: f32,
    /// Camera altitude above the surface, meters.
    altitude_m: f64,
}

impl Controls {
    fn from_config(config: &Config) -> Self {
        Self {
            yaw: 0.0,
            pitch: 0.15,
            sun_zenith: (config.sky.sun_zenith_deg as f64).to_radians(),
            sun_azimuth: (config.sky.sun_azimuth_deg as f64).to_radians(),
            exposure: config.render.exposure,
            altitude_m: config.sky.start_altitude_m,
        }
    }

    /// Returns true if the key changed anything.
    fn handle_key(&mut self, key: KeyCode) -> bool {
        let step = ANGLE_STEP_DEG.to_radians();
        match key {
            KeyCode::KeyW => self.pitch = (self.pitch + step).min(1.53),
            KeyCode::KeyS => self.pitch = (self.pitch - step).max(-1.53),
            KeyCode::KeyA => self.yaw -= step,
            KeyCode::KeyD => self.yaw += step,
            KeyCode::ArrowUp => self.sun_zenith = (self.sun_zenith - step).max(0.0),
            KeyCode::ArrowDown => {
                self.sun_zenith = (self.sun_zenith + step).min(std::f64::consts::PI)
            }
            KeyCode::ArrowLeft => self.sun_azimuth -= step,
            KeyCode::ArrowRight => self.sun_azimuth += step,
            KeyCode::PageUp => self.altitude_m = (self.altitude_m * 1.2).min(9_000_000.0),
            KeyCode::PageDown => self.altitude_m = (self.altitude_m / 1.2).max(2.0),
            KeyCode::Equal | KeyCode::NumpadAdd => self.exposure *= 1.2,
            KeyCode::Minus | KeyCode::NumpadSubtract => self.exposure /= 1.2,
            _ => return false,
        }
        true
    }

    fn view_direction(&self) -> glam::Vec3 {
        let (sy, cy) = self.yaw.sin_cos();
        let (sp, cp) = self.pitch.sin_cos();
        glam::Vec3::new((cp * sy) as f32, sp as f32, (-cp * cy) as f32)
    }

    fn sun_direction(&self) -> [f32; 3] {
        let (sz, cz) = self.sun_zenith.sin_cos();
        let (sa, ca) = self.sun_azimuth.sin_cos();
        [(sz * sa) as f32, cz as f32, (-sz * ca) as f32]
    }
}

struct App {
    config: Config,
    window: Option<Arc<Window>>,
    gpu: Option<RenderContext>,
    sky: Option<SkyRenderer>,
    controls: Controls,
    length_unit_in_meters: f64,
    bottom_radius_m: f64,
    frame_count: u64,
    fps_timer: Instant,
}

impl App {
    fn new(config: Config) -> Self {
        let controls = Controls::from_config(&config);
        Self {
            config,
            window: None,
            gpu: None,
            sky: None,
            controls,
            length_unit_in_meters: 1.0,
            bottom_radius_m: 0.0,
            frame_count: 0,
            fps_timer: Instant::now(),
        }
    }

    fn uniforms(&self, width: u32, height: u32) -> SkyUniforms {
        let radius_units =
            (self.bottom_radius_m + self.controls.altitude_m) / self.length_unit_in_meters;
        let camera = glam::Vec3::new(0.0, radius_units as f32, 0.0);

        let aspect = width.max(1) as f32 / height.max(1) as f32;
        let proj =
            glam::Mat4::perspective_rh(FOV_Y_DEG.to_radians(), aspect, 0.1, 1.0e5);
        let view = glam::Mat4::look_to_rh(camera, self.controls.view_direction(), glam::Vec3::Y);
        let inv_view_proj = (proj * view).inverse();

        SkyUniforms {
            inv_view_proj: inv_view_proj.to_cols_array_2d(),
            camera_position: camera.to_array(),
            exposure: self.controls.exposure,
            sun_direction: self.controls.sun_direction(),
            _pad0: 0.0,
        }
    }

    fn redraw(&mut self) {
        let (Some(gpu), Some(sky), Some(window)) = (&self.gpu, &self.sky, &self.window) else {
            return;
        };

        let uniforms = self.uniforms(gpu.surface_config.width, gpu.surface_config.height);
        sky.update(&gpu.queue, &uniforms);

        let frame = match gpu.get_current_texture() {
            Ok(frame) => frame,
            Err(e) => {
                error!("Failed to acquire frame: {e}");
                return;
            }
        };
        let view = frame
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        let mut encoder = gpu
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("frame-encoder"),
            });
        sky.render(&mut encoder, &view);
        gpu.queue.submit(Some(encoder.finish()));

        window.pre_present_notify();
        frame.present();

        self.frame_count += 1;
        if self.config.debug.show_fps && self.fps_timer.elapsed().as_secs_f64() >= 1.0 {
            let fps = self.frame_count as f64 / self.fps_timer.elapsed().as_secs_f64();
            window.set_title(&format!("{} [{fps:.0} fps]", self.config.window.title));
            self.frame_count = 0;
            self.fps_timer = Instant::now();
        }

        window.request_redraw();
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }

        let attrs = WindowAttributes::default()
            .with_title(self.config.window.title.clone())
            .with_inner_size(winit::dpi::LogicalSize::new(
                self.config.window.width as f64,
                self.config.window.height as f64,
            ));
        let window = match event_loop.create_window(attrs) {
            Ok(window) => Arc::new(window),
            Err(e) => {
                error!("Failed to create window: {e}");
                event_loop.exit();
                return;
            }
        };

        let gpu = match RenderContext::new(window.clone(), SkyModel::REQUIRED_FEATURES) {
            Ok(gpu) => gpu,
            Err(e) => {
                error!("GPU initialization failed: {e}");
                event_loop.exit();
                return;
            }
        };

        let mut params = ModelParameters::earth();
        params.combine_scattering_textures = self.config.sky.combine_scattering_textures;
        self.length_unit_in_meters = params.length_unit_in_meters;
        self.bottom_radius_m = params.bottom_radius;

        let sky = match SkyRenderer::new(
            &gpu.device,
            &gpu.queue,
            gpu.surface_format,
            &params,
            self.config.sky.num_scattering_orders,
        ) {
            Ok(sky) => sky,
            Err(e) => {
                error!("Sky initialization failed: {e}");
                event_loop.exit();
                return;
            }
        };

        window.request_redraw();
        self.gpu = Some(gpu);
        self.sky = Some(sky);
        self.window = Some(window);
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        _window_id: WindowId,
        event: WindowEvent,
    ) {
        match event {
            WindowEvent::CloseRequested => {
                info!("Close requested, shutting down");
                event_loop.exit();
            }
            WindowEvent::Resized(new_size) => {
                if let Some(gpu) = &mut self.gpu {
                    gpu.resize(new_size.width, new_size.height);
                }
            }
            WindowEvent::KeyboardInput { event, .. } => {
                if event.state == ElementState::Pressed {
                    match event.physical_key {
                        PhysicalKey::Code(KeyCode::Escape) => event_loop.exit(),
                        PhysicalKey::Code(key) => {
                            self.controls.handle_key(key);
                        }
                        PhysicalKey::Unidentified(_) => {}
                    }
                }
            }
            WindowEvent::RedrawRequested => {
                self.redraw();
            }
            _ => {}
        }
    }
}

fn main() {
    let args = CliArgs::parse();

    // Resolve config directory
    let config_dir = args
        .config
        .clone()
        .unwrap_or_else(aether_config::default_config_dir);

    // Load or create config, then apply CLI overrides
    let mut config = Config::load_or_create(&config_dir).unwrap_or_else(|e| {
        eprintln!("Failed to load config: {e}, using defaults");
        Config::default()
    });
    config.apply_cli_overrides(&args);

    // Initialize logging with config and debug settings
    let log_dir = config_dir.join("logs");
    aether_log::init_logging(Some(&log_dir), cfg!(debug_assertions), Some(&config));

    let event_loop = EventLoop::new().expect("Failed to create event loop");
    let mut app = App::new(config);
    event_loop.run_app(&mut app).expect("Event loop failed");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sun_direction_noon_points_up() {
        let mut controls = Controls::from_config(&Config::default());
        controls.sun_zenith = 0.0;
        let [x, y, z] = controls.sun_direction();
        assert!(y > 0.999);
        assert!(x.abs() < 1e-6 && z.abs() < 1e-6);
    }

    #[test]
    fn test_sun_direction_is_unit_length() {
        let controls = Controls::from_config(&Config::default());
        let [x, y, z] = controls.sun_direction();
        let len = (x * x + y * y + z * z).sqrt();
        assert!((len - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_zenith_key_clamps_at_zero() {
        let mut controls = Controls::from_config(&Config::default());
        controls.sun_zenith = 0.001;
        assert!(controls.handle_key(KeyCode::ArrowUp));
        assert_eq!(controls.sun_zenith, 0.0);
    }

    #[test]
    fn test_unbound_key_ignored() {
        let mut controls = Controls::from_config(&Config::default());
        let before_exposure = controls.exposure;
        assert!(!controls.handle_key(KeyCode::KeyQ));
        assert_eq!(controls.exposure, before_exposure);
    }
}
