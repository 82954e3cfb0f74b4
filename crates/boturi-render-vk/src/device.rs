// SPDX-License-Identifier: CEPL-1.0
//! What the swapchain lifecycle needs from the device layer.
//!
//! [`crate::AshDevice`] implements this over a live Vulkan device. Every
//! `destroy_*` call requires that the GPU no longer uses the handle; the
//! lifecycle types guarantee that by draining the device first.

use crate::error::Result;
use ash::vk;

/// Result of the three surface queries, taken together.
#[derive(Clone, Debug, Default)]
pub struct SurfaceSupport {
    pub capabilities: vk::SurfaceCapabilitiesKHR,
    pub formats: Vec<vk::SurfaceFormatKHR>,
    pub present_modes: Vec<vk::PresentModeKHR>,
}

#[derive(Clone, Copy, Debug)]
pub struct SwapchainRequest {
    pub min_image_count: u32,
    pub surface_format: vk::SurfaceFormatKHR,
    pub extent: vk::Extent2D,
    pub present_mode: vk::PresentModeKHR,
    pub pre_transform: vk::SurfaceTransformFlagsKHR,
}

#[derive(Clone, Copy, Debug)]
pub struct AttachmentRequest {
    pub extent: vk::Extent2D,
    pub format: vk::Format,
    pub samples: vk::SampleCountFlags,
    pub usage: vk::ImageUsageFlags,
}

/// Plain-data description of a single-subpass render pass.
#[derive(Clone, Copy, Debug)]
pub struct RenderPassBlueprint {
    pub attachments: [vk::AttachmentDescription; 3],
    pub color_ref: vk::AttachmentReference,
    pub depth_ref: vk::AttachmentReference,
    pub resolve_ref: vk::AttachmentReference,
    pub dependency: vk::SubpassDependency,
}

pub trait DeviceOps {
    fn surface_support(&self) -> Result<SurfaceSupport>;

    fn create_swapchain(&self, request: &SwapchainRequest) -> Result<vk::SwapchainKHR>;
    fn swapchain_images(&self, swapchain: vk::SwapchainKHR) -> Result<Vec<vk::Image>>;
    fn destroy_swapchain(&self, swapchain: vk::SwapchainKHR);

    fn create_image_view(
        &self,
        image: vk::Image,
        format: vk::Format,
        aspect: vk::ImageAspectFlags,
    ) -> Result<vk::ImageView>;
    fn destroy_image_view(&self, view: vk::ImageView);

    /// Creates an optimal-tiling 2D image bound to fresh device-local memory.
    fn create_attachment_image(
        &self,
        request: &AttachmentRequest,
    ) -> Result<(vk::Image, vk::DeviceMemory)>;
    fn destroy_attachment_image(&self, image: vk::Image, memory: vk::DeviceMemory);

    fn create_render_pass(&self, blueprint: &RenderPassBlueprint) -> Result<vk::RenderPass>;
    fn destroy_render_pass(&self, render_pass: vk::RenderPass);

    fn create_framebuffer(
        &self,
        render_pass: vk::RenderPass,
        attachments: &[vk::ImageView],
        extent: vk::Extent2D,
    ) -> Result<vk::Framebuffer>;
    fn destroy_framebuffer(&self, framebuffer: vk::Framebuffer);

    /// Linear, repeating sampler covering mip levels `0..=max_lod`.
    fn create_sampler(&self, max_lod: f32) -> Result<vk::Sampler>;
    fn destroy_sampler(&self, sampler: vk::Sampler);

    fn create_command_pool(&self) -> Result<vk::CommandPool>;
    fn destroy_command_pool(&self, pool: vk::CommandPool);

    fn create_semaphore(&self) -> Result<vk::Semaphore>;
    fn destroy_semaphore(&self, semaphore: vk::Semaphore);
    fn create_fence(&self, signaled: bool) -> Result<vk::Fence>;
    fn destroy_fence(&self, fence: vk::Fence);

    /// Waits for every fence. Returns `Ok(false)` when `timeout_ns` elapsed first.
    fn wait_for_fences(&self, fences: &[vk::Fence], timeout_ns: u64) -> Result<bool>;
    fn wait_idle(&self) -> Result<()>;

    /// Optimal-tiling support for use as a depth/stencil attachment.
    fn supports_depth_attachment(&self, format: vk::Format) -> bool;
    /// Sample counts usable for both color and depth framebuffer attachments.
    fn framebuffer_sample_counts(&self) -> vk::SampleCountFlags;

    /// Destroys the logical device and everything the device layer created
    /// for it (surface, instance). All child objects must already be gone.
    fn destroy(self)
    where
        Self: Sized;
}
