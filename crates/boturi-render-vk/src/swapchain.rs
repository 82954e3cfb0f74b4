// SPDX-License-Identifier: CEPL-1.0
use crate::binding::{BindTracker, Binding};
use crate::context::GraphicsContext;
use crate::device::{DeviceOps, SwapchainRequest};
use crate::error::{GfxError, Result};
use ash::vk;
use boturi_render::RenderSize;
use tracing::{error, info};

/// The swapchain and one color view per image, for one window size.
pub struct SwapchainBundle {
    swapchain: vk::SwapchainKHR,
    // Owned by the swapchain; never destroyed individually.
    images: Vec<vk::Image>,
    views: Vec<vk::ImageView>,
    surface_format: vk::SurfaceFormatKHR,
    extent: vk::Extent2D,
    present_mode: vk::PresentModeKHR,
    bindings: BindTracker,
}

pub fn choose_surface_format(formats: &[vk::SurfaceFormatKHR]) -> Option<vk::SurfaceFormatKHR> {
    formats
        .iter()
        .copied()
        .find(|f| {
            f.format == vk::Format::B8G8R8A8_SRGB
                && f.color_space == vk::ColorSpaceKHR::SRGB_NONLINEAR
        })
        .or_else(|| formats.first().copied())
}

pub fn choose_present_mode(modes: &[vk::PresentModeKHR], vsync: bool) -> vk::PresentModeKHR {
    let preference: &[vk::PresentModeKHR] = if vsync {
        &[vk::PresentModeKHR::MAILBOX]
    } else {
        &[vk::PresentModeKHR::IMMEDIATE, vk::PresentModeKHR::MAILBOX]
    };
    preference
        .iter()
        .copied()
        .find(|m| modes.contains(m))
        .unwrap_or(vk::PresentModeKHR::FIFO)
}

/// The surface's own extent, or `want` clamped when the surface leaves it to us.
pub fn choose_extent(caps: &vk::SurfaceCapabilitiesKHR, want: RenderSize) -> vk::Extent2D {
    if caps.current_extent.width != u32::MAX {
        caps.current_extent
    } else {
        vk::Extent2D {
            width: want
                .width
                .clamp(caps.min_image_extent.width, caps.max_image_extent.width),
            height: want
                .height
                .clamp(caps.min_image_extent.height, caps.max_image_extent.height),
        }
    }
}

/// One more than the minimum, capped by the maximum when there is one.
pub fn choose_image_count(caps: &vk::SurfaceCapabilitiesKHR) -> u32 {
    if caps.max_image_count == 0 {
        caps.min_image_count + 1
    } else {
        (caps.min_image_count + 1).min(caps.max_image_count)
    }
}

fn create_views<D: DeviceOps>(
    device: &D,
    images: &[vk::Image],
    format: vk::Format,
) -> Result<Vec<vk::ImageView>> {
    let mut views = Vec::with_capacity(images.len());
    for &image in images {
        match device.create_image_view(image, format, vk::ImageAspectFlags::COLOR) {
            Ok(view) => views.push(view),
            Err(e) => {
                for &view in &views {
                    device.destroy_image_view(view);
                }
                return Err(e);
            }
        }
    }
    Ok(views)
}

impl SwapchainBundle {
    /// Builds a bundle for the current surface.
    ///
    /// `previous` is destroyed before the surface is queried, so the old and
    /// new generations never coexist.
    pub fn create<D: DeviceOps>(
        ctx: &GraphicsContext<D>,
        previous: Option<SwapchainBundle>,
        extent_hint: RenderSize,
    ) -> Result<Self> {
        if let Some(previous) = previous {
            previous.destroy(ctx)?;
        }

        let device = ctx.device();
        let support = device.surface_support()?;
        if support.formats.is_empty() {
            return Err(GfxError::NoSurfaceFormats);
        }
        if support.present_modes.is_empty() {
            return Err(GfxError::NoPresentModes);
        }

        let caps = &support.capabilities;
        let surface_format =
            choose_surface_format(&support.formats).ok_or(GfxError::NoSurfaceFormats)?;
        let present_mode = choose_present_mode(&support.present_modes, ctx.vsync());
        let extent = choose_extent(caps, extent_hint);
        if extent.width == 0 || extent.height == 0 {
            return Err(GfxError::ZeroExtent);
        }

        let swapchain = device.create_swapchain(&SwapchainRequest {
            min_image_count: choose_image_count(caps),
            surface_format,
            extent,
            present_mode,
            pre_transform: caps.current_transform,
        })?;

        let images = match device.swapchain_images(swapchain) {
            Ok(images) => images,
            Err(e) => {
                device.destroy_swapchain(swapchain);
                return Err(e);
            }
        };
        let views = match create_views(device, &images, surface_format.format) {
            Ok(views) => views,
            Err(e) => {
                device.destroy_swapchain(swapchain);
                return Err(e);
            }
        };

        info!(
            "swapchain ready ({}x{}, {} images, {:?}, {:?})",
            extent.width,
            extent.height,
            images.len(),
            surface_format.format,
            present_mode
        );

        Ok(SwapchainBundle {
            swapchain,
            images,
            views,
            surface_format,
            extent,
            present_mode,
            bindings: BindTracker::default(),
        })
    }

    /// The extent a bundle created now would get, without creating anything.
    pub fn resolve_extent<D: DeviceOps>(
        ctx: &GraphicsContext<D>,
        extent_hint: RenderSize,
    ) -> Result<vk::Extent2D> {
        let support = ctx.device().surface_support()?;
        Ok(choose_extent(&support.capabilities, extent_hint))
    }

    /// Destroys the views, then the swapchain.
    ///
    /// Refused while framebuffers still bind the views; the handles are
    /// leaked rather than freed under a live framebuffer.
    pub fn destroy<D: DeviceOps>(self, ctx: &GraphicsContext<D>) -> Result<()> {
        let users = self.bindings.users();
        if users > 0 {
            error!("swapchain destroyed while {users} render pass(es) still use its views");
            return Err(GfxError::StillBound {
                resource: "swapchain bundle",
                users,
            });
        }
        let device = ctx.device();
        for &view in &self.views {
            device.destroy_image_view(view);
        }
        device.destroy_swapchain(self.swapchain);
        Ok(())
    }

    pub(crate) fn bind(&self) -> Binding {
        self.bindings.bind()
    }

    pub fn handle(&self) -> vk::SwapchainKHR {
        self.swapchain
    }

    pub fn images(&self) -> &[vk::Image] {
        &self.images
    }

    pub fn views(&self) -> &[vk::ImageView] {
        &self.views
    }

    pub fn image_count(&self) -> usize {
        self.images.len()
    }

    pub fn format(&self) -> vk::Format {
        self.surface_format.format
    }

    pub fn surface_format(&self) -> vk::SurfaceFormatKHR {
        self.surface_format
    }

    pub fn extent(&self) -> vk::Extent2D {
        self.extent
    }

    pub fn present_mode(&self) -> vk::PresentModeKHR {
        self.present_mode
    }
}
