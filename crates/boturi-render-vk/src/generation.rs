// SPDX-License-Identifier: CEPL-1.0
use crate::attachments::FrameAttachments;
use crate::context::GraphicsContext;
use crate::device::DeviceOps;
use crate::error::Result;
use crate::render_pass::RenderPassResources;
use crate::swapchain::SwapchainBundle;
use ash::vk;
use boturi_render::RenderSize;

/// Everything that depends on the window size, replaced as one unit.
///
/// Created swapchain → attachments → render pass, destroyed in reverse.
/// The fields are private so nothing can tear down one part alone.
pub struct DynamicGeneration {
    render_pass: RenderPassResources,
    attachments: FrameAttachments,
    swapchain: SwapchainBundle,
}

impl DynamicGeneration {
    pub fn create<D: DeviceOps>(ctx: &GraphicsContext<D>, extent_hint: RenderSize) -> Result<Self> {
        let swapchain = SwapchainBundle::create(ctx, None, extent_hint)?;
        Self::build_on(ctx, swapchain)
    }

    /// Tears this generation down and builds its replacement.
    ///
    /// The caller must have drained the GPU first.
    pub fn rebuild<D: DeviceOps>(
        self,
        ctx: &GraphicsContext<D>,
        extent_hint: RenderSize,
    ) -> Result<Self> {
        let DynamicGeneration {
            render_pass,
            attachments,
            swapchain,
        } = self;
        render_pass.destroy(ctx);
        attachments.destroy(ctx)?;
        let swapchain = SwapchainBundle::create(ctx, Some(swapchain), extent_hint)?;
        Self::build_on(ctx, swapchain)
    }

    fn build_on<D: DeviceOps>(ctx: &GraphicsContext<D>, swapchain: SwapchainBundle) -> Result<Self> {
        let attachments = match FrameAttachments::create(
            ctx,
            swapchain.extent(),
            swapchain.format(),
            ctx.depth_format(),
            ctx.samples(),
        ) {
            Ok(attachments) => attachments,
            Err(e) => {
                swapchain.destroy(ctx)?;
                return Err(e);
            }
        };
        let render_pass = match RenderPassResources::create(ctx, &swapchain, &attachments) {
            Ok(render_pass) => render_pass,
            Err(e) => {
                attachments.destroy(ctx)?;
                swapchain.destroy(ctx)?;
                return Err(e);
            }
        };
        Ok(DynamicGeneration {
            render_pass,
            attachments,
            swapchain,
        })
    }

    pub fn destroy<D: DeviceOps>(self, ctx: &GraphicsContext<D>) -> Result<()> {
        self.render_pass.destroy(ctx);
        self.attachments.destroy(ctx)?;
        self.swapchain.destroy(ctx)
    }

    pub fn swapchain(&self) -> &SwapchainBundle {
        &self.swapchain
    }

    pub fn attachments(&self) -> &FrameAttachments {
        &self.attachments
    }

    pub fn render_pass(&self) -> &RenderPassResources {
        &self.render_pass
    }

    pub fn extent(&self) -> vk::Extent2D {
        self.swapchain.extent()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockDevice;
    use boturi_render::RenderSettings;

    #[test]
    fn same_extent_rebuild_is_idempotent() {
        let device = MockDevice::new();
        let ctx = GraphicsContext::new(device.clone(), &RenderSettings::default()).unwrap();
        let size = RenderSize::new(800, 600);

        let before = DynamicGeneration::create(&ctx, size).unwrap();
        let (count, format, extent) = (
            before.swapchain().image_count(),
            before.swapchain().format(),
            before.extent(),
        );
        let old_handle = before.swapchain().handle();

        let after = before.rebuild(&ctx, size).unwrap();

        assert_eq!(after.swapchain().image_count(), count);
        assert_eq!(after.swapchain().format(), format);
        assert_eq!(after.extent(), extent);
        assert_ne!(after.swapchain().handle(), old_handle);
        assert_eq!(device.live_swapchains(), 1);

        after.destroy(&ctx).unwrap();
        ctx.shutdown();
        assert!(device.violations().is_empty());
        assert_eq!(device.live_objects(), 0);
    }

    #[test]
    fn teardown_runs_in_reverse_dependency_order() {
        let device = MockDevice::new();
        let ctx = GraphicsContext::new(device.clone(), &RenderSettings::default()).unwrap();
        let generation = DynamicGeneration::create(&ctx, RenderSize::new(640, 480)).unwrap();

        device.clear_log();
        generation.destroy(&ctx).unwrap();

        let log = device.log();
        let first = |kind: &str| log.iter().position(|e| e.starts_with(kind)).unwrap();
        let last = |kind: &str| log.iter().rposition(|e| e.starts_with(kind)).unwrap();
        assert!(last("destroy_framebuffer") < first("destroy_render_pass"));
        assert!(first("destroy_render_pass") < first("destroy_attachment_image"));
        assert!(last("destroy_attachment_image") < first("destroy_swapchain"));
        ctx.shutdown();
        assert!(device.violations().is_empty());
    }

    #[test]
    fn failed_render_pass_unwinds_the_partial_generation() {
        let device = MockDevice::new();
        let ctx = GraphicsContext::new(device.clone(), &RenderSettings::default()).unwrap();
        device.fail_framebuffer_creation(true);

        assert!(DynamicGeneration::create(&ctx, RenderSize::new(640, 480)).is_err());

        ctx.shutdown();
        assert!(device.violations().is_empty());
        assert_eq!(device.live_objects(), 0);
    }
}
