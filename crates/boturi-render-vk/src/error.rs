// SPDX-License-Identifier: CEPL-1.0
use ash::vk;
use std::time::Duration;
use thiserror::Error;

/// Unrecoverable backend failures.
///
/// Out-of-date and suboptimal swapchains are not errors; they are reported
/// as [`crate::PresentOutcome`] and handled by the resize coordinator.
#[derive(Debug, Error)]
pub enum GfxError {
    #[error("{op}: {result:?}")]
    Vulkan {
        op: &'static str,
        result: vk::Result,
    },
    #[error("surface reports no supported formats")]
    NoSurfaceFormats,
    #[error("surface reports no present modes")]
    NoPresentModes,
    #[error("no depth format supports depth/stencil attachments")]
    NoDepthFormat,
    #[error("device supports no multisampled color+depth attachments")]
    NoMultisampling,
    #[error("no device-local memory type for {0}")]
    NoMemoryType(&'static str),
    #[error("surface extent is zero")]
    ZeroExtent,
    #[error("no physical device with graphics, present and swapchain support")]
    NoSuitableDevice,
    #[error("in-flight frames still busy after {0:?}")]
    IdleTimeout(Duration),
    #[error("{resource} destroyed while {users} dependent object(s) still bind it")]
    StillBound {
        resource: &'static str,
        users: usize,
    },
    #[error("window handle: {0}")]
    WindowHandle(#[from] raw_window_handle::HandleError),
}

pub type Result<T, E = GfxError> = std::result::Result<T, E>;

pub(crate) trait VkResultExt<T> {
    fn vk_op(self, op: &'static str) -> Result<T>;
}

impl<T> VkResultExt<T> for std::result::Result<T, vk::Result> {
    fn vk_op(self, op: &'static str) -> Result<T> {
        self.map_err(|result| GfxError::Vulkan { op, result })
    }
}
