// SPDX-License-Identifier: CEPL-1.0
//! In-memory `DeviceOps` for tests.
//!
//! Hands out fresh handles, tracks which objects are alive and what they
//! reference, and records every call plus any destroy-order violation a
//! validation layer would report.

use crate::device::{
    AttachmentRequest, DeviceOps, RenderPassBlueprint, SurfaceSupport, SwapchainRequest,
};
use crate::error::{GfxError, Result};
use ash::vk::{self, Handle};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

#[derive(Clone)]
pub struct MockDevice(Arc<Mutex<State>>);

struct State {
    next_handle: u64,
    current_extent: Option<(u32, u32)>,
    formats: Vec<vk::SurfaceFormatKHR>,
    present_modes: Vec<vk::PresentModeKHR>,
    depth_formats: Vec<vk::Format>,

    swapchains: HashMap<u64, Vec<u64>>,
    views: HashMap<u64, u64>,
    images: HashMap<u64, u64>,
    render_passes: HashSet<u64>,
    framebuffers: HashMap<u64, (u64, Vec<u64>)>,
    samplers: HashSet<u64>,
    pools: HashSet<u64>,
    semaphores: HashSet<u64>,
    fences: HashSet<u64>,

    swapchains_created: usize,
    samplers_created: usize,
    wait_idle_calls: usize,
    attachment_requests: Vec<AttachmentRequest>,

    fail_samplers: bool,
    fail_framebuffers: bool,
    image_budget: Option<usize>,
    hang_fences: bool,
    empty_on_wait_idle: bool,
    empty_after_queries: Option<usize>,

    log: Vec<String>,
    violations: Vec<String>,
    destroyed: bool,
}

impl State {
    fn handle(&mut self) -> u64 {
        self.next_handle += 1;
        self.next_handle
    }

    fn record(&mut self, op: &str) {
        if self.destroyed {
            self.violations.push(format!("{op} after device destroy"));
        }
        self.log.push(op.to_owned());
    }

    fn violation(&mut self, msg: String) {
        self.violations.push(msg);
    }

    fn live_objects(&self) -> usize {
        self.swapchains.len()
            + self.views.len()
            + self.images.len()
            + self.render_passes.len()
            + self.framebuffers.len()
            + self.samplers.len()
            + self.pools.len()
            + self.semaphores.len()
            + self.fences.len()
    }
}

fn release(set: &mut HashSet<u64>, raw: u64) -> bool {
    set.remove(&raw)
}

impl MockDevice {
    pub fn new() -> Self {
        MockDevice(Arc::new(Mutex::new(State {
            next_handle: 0,
            current_extent: None,
            formats: vec![
                vk::SurfaceFormatKHR {
                    format: vk::Format::B8G8R8A8_UNORM,
                    color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
                },
                vk::SurfaceFormatKHR {
                    format: vk::Format::B8G8R8A8_SRGB,
                    color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
                },
            ],
            present_modes: vec![vk::PresentModeKHR::FIFO, vk::PresentModeKHR::MAILBOX],
            depth_formats: vec![
                vk::Format::D32_SFLOAT,
                vk::Format::D32_SFLOAT_S8_UINT,
                vk::Format::D24_UNORM_S8_UINT,
            ],
            swapchains: HashMap::new(),
            views: HashMap::new(),
            images: HashMap::new(),
            render_passes: HashSet::new(),
            framebuffers: HashMap::new(),
            samplers: HashSet::new(),
            pools: HashSet::new(),
            semaphores: HashSet::new(),
            fences: HashSet::new(),
            swapchains_created: 0,
            samplers_created: 0,
            wait_idle_calls: 0,
            attachment_requests: Vec::new(),
            fail_samplers: false,
            fail_framebuffers: false,
            image_budget: None,
            hang_fences: false,
            empty_on_wait_idle: false,
            empty_after_queries: None,
            log: Vec::new(),
            violations: Vec::new(),
            destroyed: false,
        })))
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// `None` lets the application pick the extent (`u32::MAX` current extent).
    pub fn set_current_extent(&self, extent: Option<(u32, u32)>) {
        self.state().current_extent = extent;
    }

    pub fn set_surface_formats(&self, formats: &[vk::SurfaceFormatKHR]) {
        self.state().formats = formats.to_vec();
    }

    pub fn set_present_modes(&self, modes: &[vk::PresentModeKHR]) {
        self.state().present_modes = modes.to_vec();
    }

    pub fn set_depth_formats(&self, formats: &[vk::Format]) {
        self.state().depth_formats = formats.to_vec();
    }

    pub fn fail_sampler_creation(&self, fail: bool) {
        self.state().fail_samplers = fail;
    }

    pub fn fail_framebuffer_creation(&self, fail: bool) {
        self.state().fail_framebuffers = fail;
    }

    /// Lets `n` more attachment images succeed, then fails the rest.
    pub fn fail_image_creation_after(&self, n: usize) {
        self.state().image_budget = Some(n);
    }

    pub fn hang_fences(&self, hang: bool) {
        self.state().hang_fences = hang;
    }

    /// The surface reports a 0x0 extent from the next `wait_idle` on.
    pub fn empty_surface_on_wait_idle(&self, empty: bool) {
        self.state().empty_on_wait_idle = empty;
    }

    /// Lets `n` more surface queries see the current extent, then reports 0x0.
    pub fn empty_surface_after_queries(&self, n: usize) {
        self.state().empty_after_queries = Some(n);
    }

    pub fn clear_log(&self) {
        self.state().log.clear();
    }

    pub fn log(&self) -> Vec<String> {
        self.state().log.clone()
    }

    pub fn violations(&self) -> Vec<String> {
        self.state().violations.clone()
    }

    pub fn live_objects(&self) -> usize {
        self.state().live_objects()
    }

    pub fn live_swapchains(&self) -> usize {
        self.state().swapchains.len()
    }

    pub fn live_attachment_images(&self) -> usize {
        self.state().images.len()
    }

    pub fn swapchains_created(&self) -> usize {
        self.state().swapchains_created
    }

    pub fn samplers_created(&self) -> usize {
        self.state().samplers_created
    }

    pub fn wait_idle_calls(&self) -> usize {
        self.state().wait_idle_calls
    }

    pub fn attachment_requests(&self) -> Vec<AttachmentRequest> {
        self.state().attachment_requests.clone()
    }

    pub fn framebuffer_views(&self, fb: vk::Framebuffer) -> Vec<vk::ImageView> {
        self.state()
            .framebuffers
            .get(&fb.as_raw())
            .map(|(_, views)| views.iter().map(|&v| vk::ImageView::from_raw(v)).collect())
            .unwrap_or_default()
    }

    pub fn is_destroyed(&self) -> bool {
        self.state().destroyed
    }
}

impl DeviceOps for MockDevice {
    fn surface_support(&self) -> Result<SurfaceSupport> {
        let mut s = self.state();
        s.record("surface_support");
        match s.empty_after_queries {
            Some(0) => {
                s.current_extent = Some((0, 0));
                s.empty_after_queries = None;
            }
            Some(n) => s.empty_after_queries = Some(n - 1),
            None => {}
        }
        let current_extent = match s.current_extent {
            Some((width, height)) => vk::Extent2D { width, height },
            None => vk::Extent2D {
                width: u32::MAX,
                height: u32::MAX,
            },
        };
        Ok(SurfaceSupport {
            capabilities: vk::SurfaceCapabilitiesKHR {
                min_image_count: 2,
                max_image_count: 3,
                current_extent,
                min_image_extent: vk::Extent2D {
                    width: 1,
                    height: 1,
                },
                max_image_extent: vk::Extent2D {
                    width: 8192,
                    height: 8192,
                },
                ..Default::default()
            },
            formats: s.formats.clone(),
            present_modes: s.present_modes.clone(),
        })
    }

    fn create_swapchain(&self, request: &SwapchainRequest) -> Result<vk::SwapchainKHR> {
        let mut s = self.state();
        s.record("create_swapchain");
        let raw = s.handle();
        let images = (0..request.min_image_count).map(|_| s.handle()).collect();
        s.swapchains.insert(raw, images);
        s.swapchains_created += 1;
        Ok(vk::SwapchainKHR::from_raw(raw))
    }

    fn swapchain_images(&self, swapchain: vk::SwapchainKHR) -> Result<Vec<vk::Image>> {
        let s = self.state();
        Ok(s.swapchains
            .get(&swapchain.as_raw())
            .map(|images| images.iter().map(|&i| vk::Image::from_raw(i)).collect())
            .unwrap_or_default())
    }

    fn destroy_swapchain(&self, swapchain: vk::SwapchainKHR) {
        let mut s = self.state();
        s.record("destroy_swapchain");
        match s.swapchains.remove(&swapchain.as_raw()) {
            Some(images) => {
                let views = s.views.values().filter(|i| images.contains(i)).count();
                if views > 0 {
                    s.violation(format!("swapchain destroyed with {views} live view(s)"));
                }
            }
            None => s.violation("swapchain destroyed twice".to_owned()),
        }
    }

    fn create_image_view(
        &self,
        image: vk::Image,
        _format: vk::Format,
        _aspect: vk::ImageAspectFlags,
    ) -> Result<vk::ImageView> {
        let mut s = self.state();
        s.record("create_image_view");
        let raw = s.handle();
        s.views.insert(raw, image.as_raw());
        Ok(vk::ImageView::from_raw(raw))
    }

    fn destroy_image_view(&self, view: vk::ImageView) {
        let mut s = self.state();
        s.record("destroy_image_view");
        let raw = view.as_raw();
        if s.views.remove(&raw).is_none() {
            s.violation("image view destroyed twice".to_owned());
        }
        if s.framebuffers.values().any(|(_, views)| views.contains(&raw)) {
            s.violation("image view destroyed while a framebuffer binds it".to_owned());
        }
    }

    fn create_attachment_image(
        &self,
        request: &AttachmentRequest,
    ) -> Result<(vk::Image, vk::DeviceMemory)> {
        let mut s = self.state();
        if let Some(budget) = s.image_budget {
            if budget == 0 {
                return Err(GfxError::Vulkan {
                    op: "create_image",
                    result: vk::Result::ERROR_OUT_OF_DEVICE_MEMORY,
                });
            }
            s.image_budget = Some(budget - 1);
        }
        s.record("create_attachment_image");
        s.attachment_requests.push(*request);
        let image = s.handle();
        let memory = s.handle();
        s.images.insert(image, memory);
        Ok((vk::Image::from_raw(image), vk::DeviceMemory::from_raw(memory)))
    }

    fn destroy_attachment_image(&self, image: vk::Image, memory: vk::DeviceMemory) {
        let mut s = self.state();
        s.record("destroy_attachment_image");
        let raw = image.as_raw();
        match s.images.remove(&raw) {
            Some(m) if m == memory.as_raw() => {}
            Some(_) => s.violation("attachment freed with the wrong memory".to_owned()),
            None => s.violation("attachment image destroyed twice".to_owned()),
        }
        if s.views.values().any(|&i| i == raw) {
            s.violation("attachment image destroyed before its view".to_owned());
        }
    }

    fn create_render_pass(&self, _blueprint: &RenderPassBlueprint) -> Result<vk::RenderPass> {
        let mut s = self.state();
        s.record("create_render_pass");
        let raw = s.handle();
        s.render_passes.insert(raw);
        Ok(vk::RenderPass::from_raw(raw))
    }

    fn destroy_render_pass(&self, render_pass: vk::RenderPass) {
        let mut s = self.state();
        s.record("destroy_render_pass");
        let raw = render_pass.as_raw();
        if !release(&mut s.render_passes, raw) {
            s.violation("render pass destroyed twice".to_owned());
        }
        if s.framebuffers.values().any(|(rp, _)| *rp == raw) {
            s.violation("render pass destroyed before its framebuffers".to_owned());
        }
    }

    fn create_framebuffer(
        &self,
        render_pass: vk::RenderPass,
        attachments: &[vk::ImageView],
        _extent: vk::Extent2D,
    ) -> Result<vk::Framebuffer> {
        let mut s = self.state();
        if s.fail_framebuffers {
            return Err(GfxError::Vulkan {
                op: "create_framebuffer",
                result: vk::Result::ERROR_OUT_OF_HOST_MEMORY,
            });
        }
        s.record("create_framebuffer");
        let rp = render_pass.as_raw();
        if !s.render_passes.contains(&rp) {
            s.violation("framebuffer created for a dead render pass".to_owned());
        }
        let views: Vec<u64> = attachments.iter().map(|v| v.as_raw()).collect();
        if views.iter().any(|v| !s.views.contains_key(v)) {
            s.violation("framebuffer created over a dead image view".to_owned());
        }
        let raw = s.handle();
        s.framebuffers.insert(raw, (rp, views));
        Ok(vk::Framebuffer::from_raw(raw))
    }

    fn destroy_framebuffer(&self, framebuffer: vk::Framebuffer) {
        let mut s = self.state();
        s.record("destroy_framebuffer");
        if s.framebuffers.remove(&framebuffer.as_raw()).is_none() {
            s.violation("framebuffer destroyed twice".to_owned());
        }
    }

    fn create_sampler(&self, _max_lod: f32) -> Result<vk::Sampler> {
        let mut s = self.state();
        if s.fail_samplers {
            return Err(GfxError::Vulkan {
                op: "create_sampler",
                result: vk::Result::ERROR_OUT_OF_HOST_MEMORY,
            });
        }
        s.record("create_sampler");
        let raw = s.handle();
        s.samplers.insert(raw);
        s.samplers_created += 1;
        Ok(vk::Sampler::from_raw(raw))
    }

    fn destroy_sampler(&self, sampler: vk::Sampler) {
        let mut s = self.state();
        s.record("destroy_sampler");
        if !release(&mut s.samplers, sampler.as_raw()) {
            s.violation("sampler destroyed twice".to_owned());
        }
    }

    fn create_command_pool(&self) -> Result<vk::CommandPool> {
        let mut s = self.state();
        s.record("create_command_pool");
        let raw = s.handle();
        s.pools.insert(raw);
        Ok(vk::CommandPool::from_raw(raw))
    }

    fn destroy_command_pool(&self, pool: vk::CommandPool) {
        let mut s = self.state();
        s.record("destroy_command_pool");
        if !release(&mut s.pools, pool.as_raw()) {
            s.violation("command pool destroyed twice".to_owned());
        }
    }

    fn create_semaphore(&self) -> Result<vk::Semaphore> {
        let mut s = self.state();
        s.record("create_semaphore");
        let raw = s.handle();
        s.semaphores.insert(raw);
        Ok(vk::Semaphore::from_raw(raw))
    }

    fn destroy_semaphore(&self, semaphore: vk::Semaphore) {
        let mut s = self.state();
        s.record("destroy_semaphore");
        if !release(&mut s.semaphores, semaphore.as_raw()) {
            s.violation("semaphore destroyed twice".to_owned());
        }
    }

    fn create_fence(&self, _signaled: bool) -> Result<vk::Fence> {
        let mut s = self.state();
        s.record("create_fence");
        let raw = s.handle();
        s.fences.insert(raw);
        Ok(vk::Fence::from_raw(raw))
    }

    fn destroy_fence(&self, fence: vk::Fence) {
        let mut s = self.state();
        s.record("destroy_fence");
        if !release(&mut s.fences, fence.as_raw()) {
            s.violation("fence destroyed twice".to_owned());
        }
    }

    fn wait_for_fences(&self, fences: &[vk::Fence], _timeout_ns: u64) -> Result<bool> {
        let mut s = self.state();
        s.record("wait_for_fences");
        if fences.iter().any(|f| !s.fences.contains(&f.as_raw())) {
            s.violation("waited on a dead fence".to_owned());
        }
        Ok(!s.hang_fences)
    }

    fn wait_idle(&self) -> Result<()> {
        let mut s = self.state();
        s.record("wait_idle");
        s.wait_idle_calls += 1;
        if s.empty_on_wait_idle {
            s.current_extent = Some((0, 0));
        }
        Ok(())
    }

    fn supports_depth_attachment(&self, format: vk::Format) -> bool {
        self.state().depth_formats.contains(&format)
    }

    fn framebuffer_sample_counts(&self) -> vk::SampleCountFlags {
        vk::SampleCountFlags::TYPE_1
            | vk::SampleCountFlags::TYPE_2
            | vk::SampleCountFlags::TYPE_4
            | vk::SampleCountFlags::TYPE_8
    }

    fn destroy(self) {
        let mut s = self.state();
        s.record("destroy_device");
        let live = s.live_objects();
        if live > 0 {
            s.violation(format!("device destroyed with {live} live object(s)"));
        }
        s.destroyed = true;
    }
}
