// SPDX-License-Identifier: CEPL-1.0
use crate::device::DeviceOps;
use crate::error::{GfxError, Result};
use ash::vk;
use boturi_render::RenderSettings;
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;
use tracing::{debug, info, warn};

pub const MAX_FRAMES_IN_FLIGHT: usize = 2;

/// Tried in order; the first with optimal-tiling depth attachment support wins.
pub const DEPTH_FORMAT_PRIORITY: [vk::Format; 3] = [
    vk::Format::D32_SFLOAT,
    vk::Format::D32_SFLOAT_S8_UINT,
    vk::Format::D24_UNORM_S8_UINT,
];

const SAMPLE_COUNTS_DESC: [vk::SampleCountFlags; 6] = [
    vk::SampleCountFlags::TYPE_64,
    vk::SampleCountFlags::TYPE_32,
    vk::SampleCountFlags::TYPE_16,
    vk::SampleCountFlags::TYPE_8,
    vk::SampleCountFlags::TYPE_4,
    vk::SampleCountFlags::TYPE_2,
];

/// Per in-flight slot. Independent of the swapchain; survives every resize.
#[derive(Clone, Copy, Debug)]
pub struct FrameSync {
    pub image_available: vk::Semaphore,
    pub render_finished: vk::Semaphore,
    pub in_flight: vk::Fence,
}

/// Resize-independent device state: one per process.
pub struct GraphicsContext<D: DeviceOps> {
    device: D,
    command_pool: vk::CommandPool,
    frames: Vec<FrameSync>,
    samplers: Mutex<HashMap<u32, vk::Sampler>>,
    depth_format: vk::Format,
    samples: vk::SampleCountFlags,
    vsync: bool,
    idle_timeout: Option<Duration>,
}

/// Highest sample count in `supported` that does not exceed `cap` (at least 2).
pub fn pick_sample_count(
    supported: vk::SampleCountFlags,
    cap: u32,
) -> Option<vk::SampleCountFlags> {
    let cap = cap.max(2);
    SAMPLE_COUNTS_DESC
        .into_iter()
        .find(|&count| count.as_raw() <= cap && supported.contains(count))
}

pub fn pick_depth_format<D: DeviceOps>(device: &D) -> Result<vk::Format> {
    DEPTH_FORMAT_PRIORITY
        .into_iter()
        .find(|&fmt| device.supports_depth_attachment(fmt))
        .ok_or(GfxError::NoDepthFormat)
}

fn create_frame_sync<D: DeviceOps>(device: &D) -> Result<FrameSync> {
    let image_available = device.create_semaphore()?;
    let render_finished = match device.create_semaphore() {
        Ok(s) => s,
        Err(e) => {
            device.destroy_semaphore(image_available);
            return Err(e);
        }
    };
    // Signaled so the first wait on an unused slot returns at once.
    match device.create_fence(true) {
        Ok(in_flight) => Ok(FrameSync {
            image_available,
            render_finished,
            in_flight,
        }),
        Err(e) => {
            device.destroy_semaphore(render_finished);
            device.destroy_semaphore(image_available);
            Err(e)
        }
    }
}

fn destroy_frame_sync<D: DeviceOps>(device: &D, sync: &FrameSync) {
    device.destroy_semaphore(sync.render_finished);
    device.destroy_semaphore(sync.image_available);
    device.destroy_fence(sync.in_flight);
}

struct Parts {
    command_pool: vk::CommandPool,
    frames: Vec<FrameSync>,
    depth_format: vk::Format,
    samples: vk::SampleCountFlags,
}

fn build_parts<D: DeviceOps>(device: &D, settings: &RenderSettings) -> Result<Parts> {
    let depth_format = pick_depth_format(device)?;
    let samples = pick_sample_count(device.framebuffer_sample_counts(), settings.max_msaa_samples)
        .ok_or(GfxError::NoMultisampling)?;

    let command_pool = device.create_command_pool()?;
    let mut frames = Vec::with_capacity(MAX_FRAMES_IN_FLIGHT);
    for _ in 0..MAX_FRAMES_IN_FLIGHT {
        match create_frame_sync(device) {
            Ok(sync) => frames.push(sync),
            Err(e) => {
                for sync in &frames {
                    destroy_frame_sync(device, sync);
                }
                device.destroy_command_pool(command_pool);
                return Err(e);
            }
        }
    }

    Ok(Parts {
        command_pool,
        frames,
        depth_format,
        samples,
    })
}

impl<D: DeviceOps> GraphicsContext<D> {
    /// Takes ownership of `device`. On failure the device is destroyed too.
    pub fn new(device: D, settings: &RenderSettings) -> Result<Self> {
        let parts = match build_parts(&device, settings) {
            Ok(parts) => parts,
            Err(e) => {
                device.destroy();
                return Err(e);
            }
        };
        info!(
            "graphics context ready (depth {:?}, msaa x{}, {} frames in flight)",
            parts.depth_format,
            parts.samples.as_raw(),
            MAX_FRAMES_IN_FLIGHT
        );
        Ok(GraphicsContext {
            device,
            command_pool: parts.command_pool,
            frames: parts.frames,
            samplers: Mutex::new(HashMap::new()),
            depth_format: parts.depth_format,
            samples: parts.samples,
            vsync: settings.vsync,
            idle_timeout: settings.idle_timeout,
        })
    }

    pub fn device(&self) -> &D {
        &self.device
    }

    pub fn command_pool(&self) -> vk::CommandPool {
        self.command_pool
    }

    pub fn frame(&self, slot: usize) -> &FrameSync {
        &self.frames[slot % MAX_FRAMES_IN_FLIGHT]
    }

    pub fn depth_format(&self) -> vk::Format {
        self.depth_format
    }

    pub fn samples(&self) -> vk::SampleCountFlags {
        self.samples
    }

    pub fn vsync(&self) -> bool {
        self.vsync
    }

    /// Cached texture sampler for `mip_level`, created on first request.
    pub fn acquire_sampler(&self, mip_level: u32) -> Result<vk::Sampler> {
        let mut cache = self.samplers.lock().unwrap_or_else(PoisonError::into_inner);
        match cache.entry(mip_level) {
            Entry::Occupied(e) => Ok(*e.get()),
            Entry::Vacant(e) => {
                let sampler = self.device.create_sampler(mip_level as f32)?;
                debug!(mip_level, "created texture sampler");
                Ok(*e.insert(sampler))
            }
        }
    }

    pub fn cached_samplers(&self) -> usize {
        self.samplers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Blocks until the GPU has finished all submitted work.
    ///
    /// With an idle timeout configured, the in-flight fences are waited on
    /// first and expiry is fatal.
    pub fn wait_idle(&self) -> Result<()> {
        if let Some(timeout) = self.idle_timeout {
            let fences: Vec<_> = self.frames.iter().map(|f| f.in_flight).collect();
            let timeout_ns = u64::try_from(timeout.as_nanos()).unwrap_or(u64::MAX);
            if !self.device.wait_for_fences(&fences, timeout_ns)? {
                return Err(GfxError::IdleTimeout(timeout));
            }
        }
        self.device.wait_idle()
    }

    /// Releases samplers, sync objects and the command pool, then the device.
    ///
    /// The dynamic generation must already be destroyed.
    pub fn shutdown(self) {
        let GraphicsContext {
            device,
            command_pool,
            frames,
            samplers,
            ..
        } = self;

        if let Err(e) = device.wait_idle() {
            warn!("device_wait_idle during shutdown: {e}");
        }

        let samplers = samplers.into_inner().unwrap_or_else(PoisonError::into_inner);
        for (_, sampler) in samplers {
            device.destroy_sampler(sampler);
        }
        for sync in &frames {
            destroy_frame_sync(&device, sync);
        }
        device.destroy_command_pool(command_pool);
        device.destroy();
        info!("graphics context shut down");
    }
}
