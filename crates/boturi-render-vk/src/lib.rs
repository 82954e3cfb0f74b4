// SPDX-License-Identifier: CEPL-1.0
//! Vulkan backend: swapchain lifecycle and frame-resource management.
//!
//! [`GraphicsContext`] holds everything that survives a resize. The size
//! dependent objects live in a [`DynamicGeneration`] that the
//! [`ResizeCoordinator`] replaces as a whole when the window changes or the
//! swapchain goes out of date. Everything below [`VkRenderer`] talks to the
//! GPU only through [`DeviceOps`].

#![deny(unsafe_op_in_unsafe_fn)]

mod ash_device;
mod attachments;
mod binding;
mod context;
mod coordinator;
mod device;
mod error;
mod generation;
mod render_pass;
mod renderer;
mod swapchain;

#[cfg(test)]
mod mock;

pub use ash_device::AshDevice;
pub use attachments::{AttachmentImage, FrameAttachments};
pub use context::{
    pick_depth_format, pick_sample_count, FrameSync, GraphicsContext, DEPTH_FORMAT_PRIORITY,
    MAX_FRAMES_IN_FLIGHT,
};
pub use coordinator::{LifecycleState, PresentOutcome, RebuildReason, ResizeCoordinator};
pub use device::{
    AttachmentRequest, DeviceOps, RenderPassBlueprint, SurfaceSupport, SwapchainRequest,
};
pub use error::{GfxError, Result};
pub use generation::DynamicGeneration;
pub use render_pass::RenderPassResources;
pub use renderer::VkRenderer;
pub use swapchain::SwapchainBundle;
