// SPDX-License-Identifier: CEPL-1.0
#![deny(unsafe_op_in_unsafe_fn)]
use anyhow::{Context, Result};
use boturi_core::{fatal, init_tracing, GameConfig, RenderCfg};
use boturi_render::{FrameStatus, RenderSettings, RenderSize, Renderer};
use boturi_render_vk::VkRenderer;
use clap::Parser;
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tracing::info;

use boturi_platform::winit::{
    application::ApplicationHandler,
    event::WindowEvent,
    event_loop::{ActiveEventLoop, ControlFlow, EventLoop},
    window::{Window, WindowId},
};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Configuration file; missing means defaults
    #[arg(long, default_value = "boturi.toml")]
    config: PathBuf,
    /// Initial window width, overrides [window] width
    #[arg(long)]
    width: Option<u32>,
    /// Initial window height, overrides [window] height
    #[arg(long)]
    height: Option<u32>,
    /// Enable the Vulkan validation layer
    #[arg(long)]
    debug: bool,
}

impl Args {
    fn apply(&self, cfg: &mut GameConfig) {
        if let Some(width) = self.width {
            cfg.window.width = width;
        }
        if let Some(height) = self.height {
            cfg.window.height = height;
        }
        if self.debug {
            cfg.render.debug_mode = true;
        }
    }
}

fn render_settings(cfg: &RenderCfg) -> RenderSettings {
    RenderSettings {
        debug_mode: cfg.debug_mode,
        vsync: cfg.vsync,
        max_msaa_samples: cfg.msaa_samples,
        clear_color: cfg.clear_color,
        idle_timeout: (cfg.idle_timeout_ms > 0)
            .then(|| Duration::from_millis(cfg.idle_timeout_ms)),
    }
}

struct App {
    cfg: GameConfig,
    window: Option<Window>,
    renderer: Option<VkRenderer>,
    render_size: RenderSize,

    exiting: bool,
    paused: bool,
    frames: u32,
    last_fps_instant: Instant,
}

impl App {
    fn new(cfg: GameConfig) -> Self {
        App {
            render_size: RenderSize::new(cfg.window.width, cfg.window.height),
            cfg,
            window: None,
            renderer: None,
            exiting: false,
            paused: false,
            frames: 0,
            last_fps_instant: Instant::now(),
        }
    }

    /// Releases the GPU, then reports and exits.
    fn fail(&mut self, err: anyhow::Error) -> ! {
        self.renderer = None;
        self.window = None;
        fatal(&err)
    }

    fn set_paused(&mut self, paused: bool) {
        if self.paused != paused {
            self.paused = paused;
            info!(
                "{}x{} → paused={}",
                self.render_size.width, self.render_size.height, self.paused
            );
        }
    }

    fn create_renderer(&mut self, event_loop: &ActiveEventLoop) -> Result<()> {
        let window = event_loop
            .create_window(boturi_platform::window_attributes(
                &self.cfg.window.title,
                self.cfg.window.width,
                self.cfg.window.height,
            ))
            .context("create window")?;
        self.render_size = boturi_platform::render_size(&window);

        let settings = render_settings(&self.cfg.render);
        let renderer = VkRenderer::new(&window, &window, self.render_size, &settings)
            .context("initialize Vulkan renderer")?;
        info!(
            "vk renderer up: {}x{}, vsync={}, debug={}",
            self.render_size.width, self.render_size.height, settings.vsync, settings.debug_mode
        );

        self.window = Some(window);
        self.renderer = Some(renderer);
        Ok(())
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_none() {
            if let Err(e) = self.create_renderer(event_loop) {
                self.fail(e);
            }
        }

        event_loop.set_control_flow(if self.cfg.render.vsync {
            ControlFlow::Wait
        } else {
            ControlFlow::Poll
        });
        self.set_paused(self.render_size.is_zero());
        if !self.paused {
            if let Some(w) = &self.window {
                w.request_redraw();
            }
        }
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        window_id: WindowId,
        event: WindowEvent,
    ) {
        if let Some(window) = &self.window {
            if window_id != window.id() {
                return;
            }
        }

        match event {
            WindowEvent::CloseRequested => {
                info!("CloseRequested");
                self.exiting = true;
                // Renderer before window: the surface belongs to it.
                self.renderer = None;
                self.window = None;
                event_loop.exit();
            }

            WindowEvent::Resized(new_size) => {
                self.render_size = RenderSize::new(new_size.width, new_size.height);
                if let Some(renderer) = &mut self.renderer {
                    if let Err(e) = renderer.resize(self.render_size) {
                        self.fail(e);
                    }
                }
                self.set_paused(self.render_size.is_zero());
                if !self.paused {
                    if let Some(w) = &self.window {
                        w.request_redraw();
                    }
                }
            }

            WindowEvent::RedrawRequested => {
                if self.exiting || self.paused {
                    return;
                }
                let Some(renderer) = &mut self.renderer else {
                    return;
                };
                match renderer.render() {
                    Ok(FrameStatus::Presented) => {
                        self.frames = self.frames.saturating_add(1);
                    }
                    Ok(FrameStatus::Suspended) => {
                        // Surface has no area yet; the next Resized wakes us.
                        self.set_paused(true);
                        event_loop.set_control_flow(ControlFlow::Wait);
                    }
                    Ok(FrameStatus::Skipped) => {
                        if let Some(w) = &self.window {
                            w.request_redraw();
                        }
                    }
                    Err(e) => self.fail(e),
                }
            }

            _ => {}
        }
    }

    fn about_to_wait(&mut self, event_loop: &ActiveEventLoop) {
        if self.exiting {
            return;
        }
        if self.paused {
            event_loop.set_control_flow(ControlFlow::Wait);
            self.frames = 0;
            return;
        }

        event_loop.set_control_flow(if self.cfg.render.vsync {
            ControlFlow::Wait
        } else {
            ControlFlow::Poll
        });
        if let Some(w) = &self.window {
            w.request_redraw();
        }

        let now = Instant::now();
        if now.duration_since(self.last_fps_instant).as_secs_f32() >= 1.0 {
            info!("fps ~ {}", self.frames);
            self.frames = 0;
            self.last_fps_instant = now;
        }
    }
}

fn run() -> Result<()> {
    let args = Args::parse();
    let mut cfg = GameConfig::load(&args.config).context("load configuration")?;
    args.apply(&mut cfg);

    let event_loop: EventLoop<()> = EventLoop::new().context("create event loop")?;
    let mut app = App::new(cfg);
    event_loop.run_app(&mut app)?;
    Ok(())
}

fn main() {
    init_tracing();
    if let Err(e) = run() {
        fatal(&e);
    }
}
