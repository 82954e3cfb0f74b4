// SPDX-License-Identifier: CEPL-1.0
pub use winit;

use boturi_render::RenderSize;
use winit::dpi::PhysicalSize;
use winit::window::{Window, WindowAttributes};

pub fn window_attributes(title: &str, width: u32, height: u32) -> WindowAttributes {
    Window::default_attributes()
        .with_title(title)
        .with_inner_size(PhysicalSize::new(width.max(1), height.max(1)))
}

/// Framebuffer size of `window` in physical pixels.
pub fn render_size(window: &Window) -> RenderSize {
    let size = window.inner_size();
    RenderSize::new(size.width, size.height)
}
