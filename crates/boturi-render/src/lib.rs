// SPDX-License-Identifier: CEPL-1.0
use anyhow::Result;
use raw_window_handle::{HasDisplayHandle, HasWindowHandle};
use std::time::Duration;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RenderSize {
    pub width: u32,
    pub height: u32,
}

impl RenderSize {
    pub const fn new(width: u32, height: u32) -> Self {
        RenderSize { width, height }
    }

    /// True while the window is minimized or has collapsed to a line.
    pub fn is_zero(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

/// Startup choices handed to a backend. Fixed for the renderer's lifetime.
#[derive(Clone, Debug, PartialEq)]
pub struct RenderSettings {
    pub debug_mode: bool,
    pub vsync: bool,
    pub max_msaa_samples: u32,
    pub clear_color: [f32; 4],
    /// `None` waits for the device without a bound.
    pub idle_timeout: Option<Duration>,
}

impl Default for RenderSettings {
    fn default() -> Self {
        RenderSettings {
            debug_mode: false,
            vsync: true,
            max_msaa_samples: 8,
            clear_color: [0.02, 0.02, 0.04, 1.0],
            idle_timeout: None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FrameStatus {
    Presented,
    /// Nothing was drawn; the surface has no area. Wait for the next window event.
    Suspended,
    /// The frame was dropped because the swapchain is being replaced.
    Skipped,
}

/// The window-system side of a blocking resize wait.
pub trait WindowEvents {
    fn framebuffer_size(&self) -> RenderSize;
    /// Blocks until the window system delivers at least one event.
    fn wait_events(&mut self);
}

pub trait Renderer {
    fn new(
        window: &dyn HasWindowHandle,
        display: &dyn HasDisplayHandle,
        size: RenderSize,
        settings: &RenderSettings,
    ) -> Result<Self>
    where
        Self: Sized;

    fn resize(&mut self, size: RenderSize) -> Result<()>;
    fn render(&mut self) -> Result<FrameStatus>;
    fn set_clear_color(&mut self, rgba: [f32; 4]);
}
