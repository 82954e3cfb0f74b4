// SPDX-License-Identifier: CEPL-1.0
use crate::binding::{BindTracker, Binding};
use crate::context::GraphicsContext;
use crate::device::{AttachmentRequest, DeviceOps};
use crate::error::{GfxError, Result};
use ash::vk;
use tracing::{debug, error};

/// One image with its memory and full-range view.
#[derive(Debug)]
pub struct AttachmentImage {
    image: vk::Image,
    memory: vk::DeviceMemory,
    view: vk::ImageView,
}

impl AttachmentImage {
    fn create<D: DeviceOps>(
        device: &D,
        request: &AttachmentRequest,
        aspect: vk::ImageAspectFlags,
    ) -> Result<Self> {
        let (image, memory) = device.create_attachment_image(request)?;
        match device.create_image_view(image, request.format, aspect) {
            Ok(view) => Ok(AttachmentImage {
                image,
                memory,
                view,
            }),
            Err(e) => {
                device.destroy_attachment_image(image, memory);
                Err(e)
            }
        }
    }

    fn destroy<D: DeviceOps>(self, device: &D) {
        device.destroy_image_view(self.view);
        device.destroy_attachment_image(self.image, self.memory);
    }

    pub fn image(&self) -> vk::Image {
        self.image
    }

    pub fn view(&self) -> vk::ImageView {
        self.view
    }
}

/// Multisampled color and depth targets sized to the swapchain extent.
pub struct FrameAttachments {
    color: AttachmentImage,
    depth: AttachmentImage,
    extent: vk::Extent2D,
    samples: vk::SampleCountFlags,
    bindings: BindTracker,
}

impl FrameAttachments {
    pub fn create<D: DeviceOps>(
        ctx: &GraphicsContext<D>,
        extent: vk::Extent2D,
        color_format: vk::Format,
        depth_format: vk::Format,
        samples: vk::SampleCountFlags,
    ) -> Result<Self> {
        let device = ctx.device();
        let color = AttachmentImage::create(
            device,
            &AttachmentRequest {
                extent,
                format: color_format,
                samples,
                usage: vk::ImageUsageFlags::TRANSIENT_ATTACHMENT
                    | vk::ImageUsageFlags::COLOR_ATTACHMENT,
            },
            vk::ImageAspectFlags::COLOR,
        )?;
        let depth = match AttachmentImage::create(
            device,
            &AttachmentRequest {
                extent,
                format: depth_format,
                samples,
                usage: vk::ImageUsageFlags::DEPTH_STENCIL_ATTACHMENT,
            },
            vk::ImageAspectFlags::DEPTH,
        ) {
            Ok(depth) => depth,
            Err(e) => {
                color.destroy(device);
                return Err(e);
            }
        };

        debug!(
            "frame attachments {}x{} x{} ({:?} / {:?})",
            extent.width,
            extent.height,
            samples.as_raw(),
            color_format,
            depth_format
        );

        Ok(FrameAttachments {
            color,
            depth,
            extent,
            samples,
            bindings: BindTracker::default(),
        })
    }

    /// Frees both images. Refused while a render pass still binds the views.
    pub fn destroy<D: DeviceOps>(self, ctx: &GraphicsContext<D>) -> Result<()> {
        let users = self.bindings.users();
        if users > 0 {
            error!("frame attachments destroyed while {users} render pass(es) still bind them");
            return Err(GfxError::StillBound {
                resource: "frame attachments",
                users,
            });
        }
        let device = ctx.device();
        self.color.destroy(device);
        self.depth.destroy(device);
        Ok(())
    }

    pub(crate) fn bind(&self) -> Binding {
        self.bindings.bind()
    }

    pub fn color(&self) -> &AttachmentImage {
        &self.color
    }

    pub fn depth(&self) -> &AttachmentImage {
        &self.depth
    }

    pub fn extent(&self) -> vk::Extent2D {
        self.extent
    }

    pub fn samples(&self) -> vk::SampleCountFlags {
        self.samples
    }
}
