// SPDX-License-Identifier: CEPL-1.0
use crate::attachments::FrameAttachments;
use crate::binding::Binding;
use crate::context::GraphicsContext;
use crate::device::{DeviceOps, RenderPassBlueprint};
use crate::error::Result;
use crate::swapchain::SwapchainBundle;
use ash::vk;
use tracing::debug;

pub const COLOR_ATTACHMENT: u32 = 0;
pub const DEPTH_ATTACHMENT: u32 = 1;
pub const RESOLVE_ATTACHMENT: u32 = 2;

/// MSAA color + depth, resolved into the single-sample swapchain image.
pub fn blueprint(
    color_format: vk::Format,
    depth_format: vk::Format,
    samples: vk::SampleCountFlags,
) -> RenderPassBlueprint {
    let color = vk::AttachmentDescription {
        format: color_format,
        samples,
        load_op: vk::AttachmentLoadOp::CLEAR,
        store_op: vk::AttachmentStoreOp::DONT_CARE,
        stencil_load_op: vk::AttachmentLoadOp::DONT_CARE,
        stencil_store_op: vk::AttachmentStoreOp::DONT_CARE,
        initial_layout: vk::ImageLayout::UNDEFINED,
        final_layout: vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
        ..Default::default()
    };
    let depth = vk::AttachmentDescription {
        format: depth_format,
        samples,
        load_op: vk::AttachmentLoadOp::CLEAR,
        store_op: vk::AttachmentStoreOp::DONT_CARE,
        stencil_load_op: vk::AttachmentLoadOp::DONT_CARE,
        stencil_store_op: vk::AttachmentStoreOp::DONT_CARE,
        initial_layout: vk::ImageLayout::UNDEFINED,
        final_layout: vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL,
        ..Default::default()
    };
    let resolve = vk::AttachmentDescription {
        format: color_format,
        samples: vk::SampleCountFlags::TYPE_1,
        load_op: vk::AttachmentLoadOp::DONT_CARE,
        store_op: vk::AttachmentStoreOp::STORE,
        stencil_load_op: vk::AttachmentLoadOp::DONT_CARE,
        stencil_store_op: vk::AttachmentStoreOp::DONT_CARE,
        initial_layout: vk::ImageLayout::UNDEFINED,
        final_layout: vk::ImageLayout::PRESENT_SRC_KHR,
        ..Default::default()
    };

    // The MSAA color and depth images are shared by every in-flight frame, so
    // the previous frame's attachment writes must finish before this one clears.
    let attachment_writes =
        vk::AccessFlags::COLOR_ATTACHMENT_WRITE | vk::AccessFlags::DEPTH_STENCIL_ATTACHMENT_WRITE;
    let dependency = vk::SubpassDependency {
        src_subpass: vk::SUBPASS_EXTERNAL,
        dst_subpass: 0,
        src_stage_mask: vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT
            | vk::PipelineStageFlags::LATE_FRAGMENT_TESTS,
        src_access_mask: attachment_writes,
        dst_stage_mask: vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT
            | vk::PipelineStageFlags::EARLY_FRAGMENT_TESTS,
        dst_access_mask: attachment_writes,
        ..Default::default()
    };

    RenderPassBlueprint {
        attachments: [color, depth, resolve],
        color_ref: vk::AttachmentReference {
            attachment: COLOR_ATTACHMENT,
            layout: vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
        },
        depth_ref: vk::AttachmentReference {
            attachment: DEPTH_ATTACHMENT,
            layout: vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL,
        },
        resolve_ref: vk::AttachmentReference {
            attachment: RESOLVE_ATTACHMENT,
            layout: vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
        },
        dependency,
    }
}

/// The render pass and one framebuffer per swapchain image.
pub struct RenderPassResources {
    render_pass: vk::RenderPass,
    framebuffers: Vec<vk::Framebuffer>,
    extent: vk::Extent2D,
    // Released only after the framebuffers are gone.
    _swapchain: Binding,
    _attachments: Binding,
}

impl RenderPassResources {
    pub fn create<D: DeviceOps>(
        ctx: &GraphicsContext<D>,
        swapchain: &SwapchainBundle,
        attachments: &FrameAttachments,
    ) -> Result<Self> {
        let device = ctx.device();
        let render_pass = device.create_render_pass(&blueprint(
            swapchain.format(),
            ctx.depth_format(),
            attachments.samples(),
        ))?;

        let extent = swapchain.extent();
        let mut framebuffers = Vec::with_capacity(swapchain.views().len());
        for &view in swapchain.views() {
            // Order matches COLOR_ATTACHMENT, DEPTH_ATTACHMENT, RESOLVE_ATTACHMENT.
            let bound = [attachments.color().view(), attachments.depth().view(), view];
            match device.create_framebuffer(render_pass, &bound, extent) {
                Ok(fb) => framebuffers.push(fb),
                Err(e) => {
                    for &fb in &framebuffers {
                        device.destroy_framebuffer(fb);
                    }
                    device.destroy_render_pass(render_pass);
                    return Err(e);
                }
            }
        }
        debug!("render pass with {} framebuffers", framebuffers.len());

        Ok(RenderPassResources {
            render_pass,
            framebuffers,
            extent,
            _swapchain: swapchain.bind(),
            _attachments: attachments.bind(),
        })
    }

    /// Framebuffers first: they reference the render pass.
    pub fn destroy<D: DeviceOps>(self, ctx: &GraphicsContext<D>) {
        let device = ctx.device();
        for &fb in &self.framebuffers {
            device.destroy_framebuffer(fb);
        }
        device.destroy_render_pass(self.render_pass);
    }

    pub fn render_pass(&self) -> vk::RenderPass {
        self.render_pass
    }

    pub fn framebuffers(&self) -> &[vk::Framebuffer] {
        &self.framebuffers
    }

    pub fn framebuffer(&self, image_index: usize) -> vk::Framebuffer {
        self.framebuffers[image_index]
    }

    pub fn extent(&self) -> vk::Extent2D {
        self.extent
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::GfxError;
    use crate::mock::MockDevice;
    use boturi_render::{RenderSettings, RenderSize};

    struct Fixture {
        device: MockDevice,
        ctx: GraphicsContext<MockDevice>,
    }

    impl Fixture {
        fn new() -> Self {
            let device = MockDevice::new();
            let ctx = GraphicsContext::new(device.clone(), &RenderSettings::default()).unwrap();
            Fixture { device, ctx }
        }

        fn dynamic(&self, size: RenderSize) -> (SwapchainBundle, FrameAttachments) {
            let swapchain = SwapchainBundle::create(&self.ctx, None, size).unwrap();
            let attachments = FrameAttachments::create(
                &self.ctx,
                swapchain.extent(),
                swapchain.format(),
                self.ctx.depth_format(),
                self.ctx.samples(),
            )
            .unwrap();
            (swapchain, attachments)
        }
    }

    #[test]
    fn load_and_store_ops_match_the_resolve_layout() {
        let bp = blueprint(
            vk::Format::B8G8R8A8_SRGB,
            vk::Format::D32_SFLOAT,
            vk::SampleCountFlags::TYPE_4,
        );
        let [color, depth, resolve] = bp.attachments;

        assert_eq!(color.load_op, vk::AttachmentLoadOp::CLEAR);
        assert_eq!(color.samples, vk::SampleCountFlags::TYPE_4);
        assert_eq!(depth.load_op, vk::AttachmentLoadOp::CLEAR);
        assert_eq!(depth.store_op, vk::AttachmentStoreOp::DONT_CARE);
        assert_eq!(resolve.store_op, vk::AttachmentStoreOp::STORE);
        assert_eq!(resolve.samples, vk::SampleCountFlags::TYPE_1);
        assert_eq!(resolve.final_layout, vk::ImageLayout::PRESENT_SRC_KHR);
        assert_eq!(bp.resolve_ref.attachment, RESOLVE_ATTACHMENT);
        assert_eq!(bp.dependency.src_subpass, vk::SUBPASS_EXTERNAL);
    }

    #[test]
    fn shared_attachments_wait_for_the_previous_frames_writes() {
        let bp = blueprint(
            vk::Format::B8G8R8A8_SRGB,
            vk::Format::D32_SFLOAT,
            vk::SampleCountFlags::TYPE_4,
        );
        let dep = bp.dependency;
        let writes = vk::AccessFlags::COLOR_ATTACHMENT_WRITE
            | vk::AccessFlags::DEPTH_STENCIL_ATTACHMENT_WRITE;

        assert!(dep.src_stage_mask.contains(vk::PipelineStageFlags::LATE_FRAGMENT_TESTS));
        assert!(dep.src_stage_mask.contains(vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT));
        assert_eq!(dep.src_access_mask, writes);
        assert!(dep.dst_stage_mask.contains(vk::PipelineStageFlags::EARLY_FRAGMENT_TESTS));
        assert_eq!(dep.dst_access_mask, writes);
    }

    #[test]
    fn one_framebuffer_per_swapchain_image() {
        for (w, h) in [(1, 1), (800, 600), (1920, 1080), (4096, 2048)] {
            let f = Fixture::new();
            let (swapchain, attachments) = f.dynamic(RenderSize::new(w, h));
            let rp = RenderPassResources::create(&f.ctx, &swapchain, &attachments).unwrap();

            assert_eq!(rp.framebuffers().len(), swapchain.image_count());
            for (fb, &view) in rp.framebuffers().iter().zip(swapchain.views()) {
                assert_eq!(
                    f.device.framebuffer_views(*fb),
                    vec![attachments.color().view(), attachments.depth().view(), view]
                );
            }

            rp.destroy(&f.ctx);
            attachments.destroy(&f.ctx).unwrap();
            swapchain.destroy(&f.ctx).unwrap();
            f.ctx.shutdown();
            assert!(f.device.violations().is_empty());
        }
    }

    #[test]
    fn attachments_cannot_be_destroyed_under_a_live_render_pass() {
        let f = Fixture::new();
        let (swapchain, attachments) = f.dynamic(RenderSize::new(800, 600));
        let rp = RenderPassResources::create(&f.ctx, &swapchain, &attachments).unwrap();
        let images_before = f.device.live_attachment_images();

        let err = attachments.destroy(&f.ctx).unwrap_err();

        assert!(matches!(
            err,
            GfxError::StillBound {
                resource: "frame attachments",
                users: 1
            }
        ));
        assert_eq!(f.device.live_attachment_images(), images_before);
        assert!(f.device.violations().is_empty());

        let err = swapchain.destroy(&f.ctx).unwrap_err();
        assert!(matches!(err, GfxError::StillBound { .. }));
        rp.destroy(&f.ctx);
    }

    #[test]
    fn render_pass_releases_its_bindings_on_destroy() {
        let f = Fixture::new();
        let (swapchain, attachments) = f.dynamic(RenderSize::new(800, 600));
        let rp = RenderPassResources::create(&f.ctx, &swapchain, &attachments).unwrap();
        rp.destroy(&f.ctx);

        attachments.destroy(&f.ctx).unwrap();
        swapchain.destroy(&f.ctx).unwrap();
        f.ctx.shutdown();
        assert!(f.device.violations().is_empty());
        assert_eq!(f.device.live_objects(), 0);
    }
}
