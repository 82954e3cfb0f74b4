// SPDX-License-Identifier: CEPL-1.0
use crate::ash_device::AshDevice;
use crate::context::{GraphicsContext, MAX_FRAMES_IN_FLIGHT};
use crate::coordinator::{LifecycleState, PresentOutcome, RebuildReason, ResizeCoordinator};
use crate::error::{GfxError, VkResultExt};
use anyhow::{Context, Result};
use ash::vk;
use boturi_math::{aspect_ratio, MvpMatrix};
use boturi_render::{FrameStatus, RenderSettings, RenderSize, Renderer};
use raw_window_handle::{HasDisplayHandle, HasWindowHandle};
use tracing::{error, info, warn};

/// Per in-flight slot, next to the slot's `FrameSync`.
struct SlotResources {
    cmd: vk::CommandBuffer,
    ubo: vk::Buffer,
    ubo_memory: vk::DeviceMemory,
}

pub struct VkRenderer {
    ctx: Option<GraphicsContext<AshDevice>>,
    coordinator: Option<ResizeCoordinator>,
    slots: Vec<SlotResources>,
    window_size: RenderSize,
    current_frame: usize,
    clear: [f32; 4],
}

// STRICT TEARDOWN ORDER:
// - Drain the GPU
// - Dynamic generation (framebuffers, render pass, attachments, swapchain)
// - Per-slot buffers, then command buffers before their pool
// - Context last (samplers, sync, pool, device, surface, instance)
impl Drop for VkRenderer {
    fn drop(&mut self) {
        let Some(ctx) = self.ctx.take() else {
            return;
        };
        if let Some(coordinator) = self.coordinator.take() {
            if let Err(e) = coordinator.shutdown(&ctx) {
                error!("vk: swapchain teardown failed: {e}");
            }
        } else if let Err(e) = ctx.wait_idle() {
            warn!("vk: wait_idle before teardown: {e}");
        }

        let device = ctx.device();
        let cmds: Vec<_> = self.slots.iter().map(|s| s.cmd).collect();
        for slot in self.slots.drain(..) {
            device.destroy_host_buffer(slot.ubo, slot.ubo_memory);
        }
        device.free_command_buffers(ctx.command_pool(), &cmds);

        ctx.shutdown();
    }
}

impl VkRenderer {
    /// Cached texture sampler covering `mip_levels` levels.
    pub fn texture_sampler(&self, mip_levels: u32) -> Result<vk::Sampler> {
        let ctx = self.ctx.as_ref().context("renderer already shut down")?;
        Ok(ctx.acquire_sampler(mip_levels)?)
    }

    pub fn lifecycle_state(&self) -> Option<LifecycleState> {
        self.coordinator.as_ref().map(ResizeCoordinator::state)
    }

    fn allocate_slots(&mut self) -> Result<()> {
        let ctx = self.ctx.as_ref().context("renderer already shut down")?;
        let device = ctx.device();
        let cmds = device
            .allocate_command_buffers(ctx.command_pool(), MAX_FRAMES_IN_FLIGHT as u32)
            .context("allocate per-frame command buffers")?;
        let ubo_size = std::mem::size_of::<MvpMatrix>() as vk::DeviceSize;
        for (i, &cmd) in cmds.iter().enumerate() {
            match device.create_host_buffer(ubo_size, vk::BufferUsageFlags::UNIFORM_BUFFER) {
                Ok((ubo, ubo_memory)) => self.slots.push(SlotResources {
                    cmd,
                    ubo,
                    ubo_memory,
                }),
                Err(e) => {
                    // Command buffers not yet owned by a slot.
                    device.free_command_buffers(ctx.command_pool(), &cmds[i..]);
                    return Err(e).context("create per-frame uniform buffer");
                }
            }
        }
        Ok(())
    }

    fn record(
        device: &ash::Device,
        cmd: vk::CommandBuffer,
        render_pass: vk::RenderPass,
        framebuffer: vk::Framebuffer,
        extent: vk::Extent2D,
        clear: [f32; 4],
    ) -> crate::Result<()> {
        // Color and depth clear; the resolve target is DONT_CARE on load.
        let clear_values = [
            vk::ClearValue {
                color: vk::ClearColorValue { float32: clear },
            },
            vk::ClearValue {
                depth_stencil: vk::ClearDepthStencilValue {
                    depth: 1.0,
                    stencil: 0,
                },
            },
        ];
        let begin = vk::CommandBufferBeginInfo {
            flags: vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT,
            ..Default::default()
        };
        let rp_begin = vk::RenderPassBeginInfo {
            render_pass,
            framebuffer,
            render_area: vk::Rect2D {
                offset: vk::Offset2D { x: 0, y: 0 },
                extent,
            },
            clear_value_count: clear_values.len() as u32,
            p_clear_values: clear_values.as_ptr(),
            ..Default::default()
        };
        unsafe {
            device
                .reset_command_buffer(cmd, vk::CommandBufferResetFlags::empty())
                .vk_op("reset_command_buffer")?;
            device
                .begin_command_buffer(cmd, &begin)
                .vk_op("begin_command_buffer")?;
            device.cmd_begin_render_pass(cmd, &rp_begin, vk::SubpassContents::INLINE);
            device.cmd_end_render_pass(cmd);
            device.end_command_buffer(cmd).vk_op("end_command_buffer")
        }
    }
}

impl Renderer for VkRenderer {
    fn new(
        window: &dyn HasWindowHandle,
        display: &dyn HasDisplayHandle,
        size: RenderSize,
        settings: &RenderSettings,
    ) -> Result<Self> {
        let device = AshDevice::new(window, display, settings).context("open Vulkan device")?;
        let ctx = GraphicsContext::new(device, settings).context("create graphics context")?;

        // From here on Drop unwinds whatever was built.
        let mut renderer = VkRenderer {
            ctx: Some(ctx),
            coordinator: None,
            slots: Vec::with_capacity(MAX_FRAMES_IN_FLIGHT),
            window_size: size,
            current_frame: 0,
            clear: settings.clear_color,
        };
        renderer.allocate_slots()?;
        let ctx = renderer.ctx.as_ref().context("renderer already shut down")?;
        renderer.coordinator =
            Some(ResizeCoordinator::start(ctx, size).context("build swapchain resources")?);
        info!("vk: renderer ready");
        Ok(renderer)
    }

    fn resize(&mut self, size: RenderSize) -> Result<()> {
        let Some(coordinator) = self.coordinator.as_mut() else {
            return Ok(());
        };
        if size == self.window_size && coordinator.is_ready() {
            return Ok(());
        }
        if size.is_zero() && !self.window_size.is_zero() {
            info!("vk: resize to {}x{}, suspending", size.width, size.height);
        }
        self.window_size = size;
        coordinator.request_rebuild(RebuildReason::RESIZED);
        Ok(())
    }

    fn set_clear_color(&mut self, rgba: [f32; 4]) {
        self.clear = rgba;
    }

    // STRICT PER-FRAME ORDER:
    // 1) wait this slot's fence
    // 2) acquire_next_image (signals image_available)
    // 3) reset fence, record, write the slot's UBO
    // 4) queue_submit (waits image_available, signals render_finished + fence)
    // 5) queue_present (waits render_finished)
    fn render(&mut self) -> Result<FrameStatus> {
        let (Some(ctx), Some(coordinator)) = (self.ctx.as_ref(), self.coordinator.as_mut()) else {
            return Ok(FrameStatus::Skipped);
        };

        if !coordinator.is_ready() {
            let state = coordinator
                .pump(ctx, self.window_size)
                .context("rebuild swapchain resources")?;
            if state == LifecycleState::Suspended {
                return Ok(FrameStatus::Suspended);
            }
        }
        let Some(generation) = coordinator.generation() else {
            return Ok(FrameStatus::Suspended);
        };
        let swapchain = generation.swapchain().handle();
        let render_pass = generation.render_pass().render_pass();
        let extent = generation.extent();

        let device = ctx.device();
        let raw = device.raw();
        let sync = *ctx.frame(self.current_frame);
        let slot = &self.slots[self.current_frame % self.slots.len()];

        unsafe { raw.wait_for_fences(&[sync.in_flight], true, u64::MAX) }
            .vk_op("wait_for_fences")?;

        let acquired = unsafe {
            device.swapchain_loader().acquire_next_image(
                swapchain,
                u64::MAX,
                sync.image_available,
                vk::Fence::null(),
            )
        };
        let (image_index, mut suboptimal) = match acquired {
            Ok(pair) => pair,
            Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => {
                coordinator.report_present(PresentOutcome::OutOfDate);
                return Ok(FrameStatus::Skipped);
            }
            Err(result) => {
                return Err(GfxError::Vulkan {
                    op: "acquire_next_image",
                    result,
                })
                .context("acquire swapchain image")
            }
        };
        let framebuffer = generation.render_pass().framebuffer(image_index as usize);

        // Only reset once an image is guaranteed to be submitted against it.
        unsafe { raw.reset_fences(&[sync.in_flight]) }.vk_op("reset_fences")?;
        Self::record(raw, slot.cmd, render_pass, framebuffer, extent, self.clear)?;

        // No pipeline binds this yet; the block is kept current for the first one that does.
        let mvp = MvpMatrix::looking_at_origin(aspect_ratio(extent.width, extent.height));
        device.write_host_memory(slot.ubo_memory, mvp.as_bytes())?;

        let wait_stages = [vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT];
        let submit = vk::SubmitInfo {
            wait_semaphore_count: 1,
            p_wait_semaphores: &sync.image_available,
            p_wait_dst_stage_mask: wait_stages.as_ptr(),
            command_buffer_count: 1,
            p_command_buffers: &slot.cmd,
            signal_semaphore_count: 1,
            p_signal_semaphores: &sync.render_finished,
            ..Default::default()
        };
        unsafe {
            raw.queue_submit(
                device.graphics_queue(),
                std::slice::from_ref(&submit),
                sync.in_flight,
            )
        }
        .vk_op("queue_submit")?;

        let present = vk::PresentInfoKHR {
            wait_semaphore_count: 1,
            p_wait_semaphores: &sync.render_finished,
            swapchain_count: 1,
            p_swapchains: &swapchain,
            p_image_indices: &image_index,
            ..Default::default()
        };
        let presented =
            unsafe { device.swapchain_loader().queue_present(device.present_queue(), &present) };
        let status = match presented {
            Ok(flag) => {
                suboptimal |= flag;
                FrameStatus::Presented
            }
            Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => {
                coordinator.report_present(PresentOutcome::OutOfDate);
                FrameStatus::Skipped
            }
            Err(result) => {
                return Err(GfxError::Vulkan {
                    op: "queue_present",
                    result,
                })
                .context("present swapchain image")
            }
        };
        if suboptimal {
            coordinator.report_present(PresentOutcome::Suboptimal);
        }

        self.current_frame = (self.current_frame + 1) % MAX_FRAMES_IN_FLIGHT;
        Ok(status)
    }
}
