// SPDX-License-Identifier: CEPL-1.0
use crate::device::{
    AttachmentRequest, DeviceOps, RenderPassBlueprint, SurfaceSupport, SwapchainRequest,
};
use crate::error::{GfxError, Result, VkResultExt};
use ash::ext::debug_utils;
use ash::khr::{surface, swapchain};
use ash::{vk, Entry, Instance};
use boturi_render::RenderSettings;
use raw_window_handle::{HasDisplayHandle, HasWindowHandle, RawDisplayHandle};
use std::ffi::{c_char, c_void, CStr};
use tracing::{debug, error, info, warn};

const VALIDATION_LAYER: &CStr = c"VK_LAYER_KHRONOS_validation";
const APP_NAME: &CStr = c"Boturi";
const MAX_ANISOTROPY: f32 = 16.0;

#[derive(Clone, Copy, Debug)]
struct QueueFamilies {
    graphics: u32,
    present: u32,
}

struct Candidate {
    phys: vk::PhysicalDevice,
    families: QueueFamilies,
    discrete: bool,
}

/// Instance, surface and logical device for one window.
pub struct AshDevice {
    _entry: Entry,
    instance: Instance,
    debug: Option<(debug_utils::Instance, vk::DebugUtilsMessengerEXT)>,
    surface_loader: surface::Instance,
    surface: vk::SurfaceKHR,

    phys: vk::PhysicalDevice,
    memory_properties: vk::PhysicalDeviceMemoryProperties,
    anisotropy: Option<f32>,
    device: ash::Device,
    families: QueueFamilies,
    graphics_queue: vk::Queue,
    present_queue: vk::Queue,
    swapchain_loader: swapchain::Device,
}

unsafe extern "system" fn debug_callback(
    severity: vk::DebugUtilsMessageSeverityFlagsEXT,
    _types: vk::DebugUtilsMessageTypeFlagsEXT,
    data: *const vk::DebugUtilsMessengerCallbackDataEXT<'_>,
    _user: *mut c_void,
) -> vk::Bool32 {
    if data.is_null() {
        return vk::FALSE;
    }
    // SAFETY: the loader passes a valid callback data struct for this call.
    let p_message = unsafe { (*data).p_message };
    if p_message.is_null() {
        return vk::FALSE;
    }
    // SAFETY: the loader hands us a non-null, NUL-terminated message.
    let msg = unsafe { CStr::from_ptr(p_message) }.to_string_lossy();
    if severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::ERROR) {
        error!(target: "vulkan", "{msg}");
    } else if severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::WARNING) {
        warn!(target: "vulkan", "{msg}");
    } else {
        debug!(target: "vulkan", "{msg}");
    }
    vk::FALSE
}

fn has_validation_layer(entry: &Entry) -> bool {
    // SAFETY: plain enumeration, no handles involved.
    let layers = unsafe { entry.enumerate_instance_layer_properties() }.unwrap_or_default();
    layers
        .iter()
        .any(|l| l.layer_name_as_c_str().is_ok_and(|name| name == VALIDATION_LAYER))
}

unsafe fn create_instance(
    entry: &Entry,
    display: RawDisplayHandle,
    validation: bool,
) -> Result<Instance> {
    let app_info = vk::ApplicationInfo {
        p_application_name: APP_NAME.as_ptr(),
        application_version: 0,
        p_engine_name: APP_NAME.as_ptr(),
        engine_version: 0,
        api_version: vk::API_VERSION_1_0,
        ..Default::default()
    };

    let mut extensions = ash_window::enumerate_required_extensions(display)
        .vk_op("enumerate_required_extensions")?
        .to_vec();
    let layers: Vec<*const c_char> = if validation {
        extensions.push(debug_utils::NAME.as_ptr());
        vec![VALIDATION_LAYER.as_ptr()]
    } else {
        Vec::new()
    };

    let create_info = vk::InstanceCreateInfo {
        p_application_info: &app_info,
        enabled_extension_count: extensions.len() as u32,
        pp_enabled_extension_names: extensions.as_ptr(),
        enabled_layer_count: layers.len() as u32,
        pp_enabled_layer_names: layers.as_ptr(),
        ..Default::default()
    };
    unsafe { entry.create_instance(&create_info, None) }.vk_op("create_instance")
}

unsafe fn create_debug_messenger(
    entry: &Entry,
    instance: &Instance,
) -> Result<(debug_utils::Instance, vk::DebugUtilsMessengerEXT)> {
    let loader = debug_utils::Instance::new(entry, instance);
    let create_info = vk::DebugUtilsMessengerCreateInfoEXT {
        message_severity: vk::DebugUtilsMessageSeverityFlagsEXT::VERBOSE
            | vk::DebugUtilsMessageSeverityFlagsEXT::WARNING
            | vk::DebugUtilsMessageSeverityFlagsEXT::ERROR,
        message_type: vk::DebugUtilsMessageTypeFlagsEXT::GENERAL
            | vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION
            | vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE,
        pfn_user_callback: Some(debug_callback),
        ..Default::default()
    };
    let messenger = unsafe { loader.create_debug_utils_messenger(&create_info, None) }
        .vk_op("create_debug_utils_messenger")?;
    Ok((loader, messenger))
}

unsafe fn supports_swapchain(instance: &Instance, phys: vk::PhysicalDevice) -> Result<bool> {
    let extensions = unsafe { instance.enumerate_device_extension_properties(phys) }
        .vk_op("enumerate_device_extension_properties")?;
    Ok(extensions
        .iter()
        .any(|e| e.extension_name_as_c_str().is_ok_and(|name| name == swapchain::NAME)))
}

/// `None` when the device cannot render and present to `surface`.
unsafe fn evaluate_device(
    instance: &Instance,
    surface_loader: &surface::Instance,
    surface: vk::SurfaceKHR,
    phys: vk::PhysicalDevice,
) -> Result<Option<Candidate>> {
    let queue_families = unsafe { instance.get_physical_device_queue_family_properties(phys) };
    let mut graphics = None;
    let mut present = None;
    for (index, family) in queue_families.iter().enumerate() {
        let index = index as u32;
        let can_present = unsafe {
            surface_loader.get_physical_device_surface_support(phys, index, surface)
        }
        .unwrap_or(false);
        let can_draw = family.queue_flags.contains(vk::QueueFlags::GRAPHICS);
        if can_draw && can_present {
            graphics = Some(index);
            present = Some(index);
            break;
        }
        if can_draw && graphics.is_none() {
            graphics = Some(index);
        }
        if can_present && present.is_none() {
            present = Some(index);
        }
    }
    let (Some(graphics), Some(present)) = (graphics, present) else {
        return Ok(None);
    };
    if !unsafe { supports_swapchain(instance, phys) }? {
        return Ok(None);
    }

    let formats = unsafe { surface_loader.get_physical_device_surface_formats(phys, surface) }
        .vk_op("get_physical_device_surface_formats")?;
    let modes = unsafe { surface_loader.get_physical_device_surface_present_modes(phys, surface) }
        .vk_op("get_physical_device_surface_present_modes")?;
    if formats.is_empty() || modes.is_empty() {
        return Ok(None);
    }

    let props = unsafe { instance.get_physical_device_properties(phys) };
    Ok(Some(Candidate {
        phys,
        families: QueueFamilies { graphics, present },
        discrete: props.device_type == vk::PhysicalDeviceType::DISCRETE_GPU,
    }))
}

unsafe fn pick_physical_device(
    instance: &Instance,
    surface_loader: &surface::Instance,
    surface: vk::SurfaceKHR,
) -> Result<Candidate> {
    let devices =
        unsafe { instance.enumerate_physical_devices() }.vk_op("enumerate_physical_devices")?;
    let mut best: Option<Candidate> = None;
    for phys in devices {
        let Some(candidate) = (unsafe { evaluate_device(instance, surface_loader, surface, phys) })?
        else {
            continue;
        };
        let better = match &best {
            None => true,
            Some(current) => candidate.discrete && !current.discrete,
        };
        if better {
            best = Some(candidate);
        }
    }
    best.ok_or(GfxError::NoSuitableDevice)
}

unsafe fn create_logical_device(
    instance: &Instance,
    phys: vk::PhysicalDevice,
    families: QueueFamilies,
    anisotropy: bool,
) -> Result<ash::Device> {
    let priorities = [1.0_f32];
    let mut unique = vec![families.graphics];
    if families.present != families.graphics {
        unique.push(families.present);
    }
    let queue_infos: Vec<vk::DeviceQueueCreateInfo> = unique
        .iter()
        .map(|&family| vk::DeviceQueueCreateInfo {
            queue_family_index: family,
            queue_count: 1,
            p_queue_priorities: priorities.as_ptr(),
            ..Default::default()
        })
        .collect();

    let features = vk::PhysicalDeviceFeatures {
        sampler_anisotropy: if anisotropy { vk::TRUE } else { vk::FALSE },
        ..Default::default()
    };
    let device_exts = [swapchain::NAME.as_ptr()];
    let create_info = vk::DeviceCreateInfo {
        queue_create_info_count: queue_infos.len() as u32,
        p_queue_create_infos: queue_infos.as_ptr(),
        enabled_extension_count: device_exts.len() as u32,
        pp_enabled_extension_names: device_exts.as_ptr(),
        p_enabled_features: &features,
        ..Default::default()
    };
    unsafe { instance.create_device(phys, &create_info, None) }.vk_op("create_device")
}

fn find_memory_type(
    props: &vk::PhysicalDeviceMemoryProperties,
    type_bits: u32,
    wanted: vk::MemoryPropertyFlags,
) -> Option<u32> {
    (0..props.memory_type_count).find(|&i| {
        (type_bits & (1 << i)) != 0
            && props.memory_types[i as usize].property_flags.contains(wanted)
    })
}

impl AshDevice {
    pub fn new(
        window: &dyn HasWindowHandle,
        display: &dyn HasDisplayHandle,
        settings: &RenderSettings,
    ) -> Result<Self> {
        // STRICT ORDER: instance, then surface, then a device that can present to it.
        let dh = display.display_handle()?.as_raw();
        let wh = window.window_handle()?.as_raw();

        let entry = Entry::linked();
        let validation = settings.debug_mode && has_validation_layer(&entry);
        if settings.debug_mode && !validation {
            warn!("debug mode requested but VK_LAYER_KHRONOS_validation is not installed");
        }
        let instance = unsafe { create_instance(&entry, dh, validation) }?;

        let debug = if validation {
            match unsafe { create_debug_messenger(&entry, &instance) } {
                Ok(debug) => Some(debug),
                Err(e) => {
                    warn!("validation messages unavailable: {e}");
                    None
                }
            }
        } else {
            None
        };

        let surface_loader = surface::Instance::new(&entry, &instance);
        let surface = match unsafe { ash_window::create_surface(&entry, &instance, dh, wh, None) }
        {
            Ok(surface) => surface,
            Err(result) => {
                unsafe { destroy_instance(&instance, debug) };
                return Err(GfxError::Vulkan {
                    op: "create_surface",
                    result,
                });
            }
        };

        let opened = unsafe { pick_physical_device(&instance, &surface_loader, surface) }.and_then(
            |candidate| {
                let features = unsafe { instance.get_physical_device_features(candidate.phys) };
                let anisotropy = features.sampler_anisotropy == vk::TRUE;
                let device = unsafe {
                    create_logical_device(&instance, candidate.phys, candidate.families, anisotropy)
                }?;
                Ok((candidate, anisotropy, device))
            },
        );
        let (candidate, anisotropy, device) = match opened {
            Ok(opened) => opened,
            Err(e) => {
                unsafe {
                    surface_loader.destroy_surface(surface, None);
                    destroy_instance(&instance, debug);
                }
                return Err(e);
            }
        };

        let phys = candidate.phys;
        let families = candidate.families;
        let props = unsafe { instance.get_physical_device_properties(phys) };
        let memory_properties = unsafe { instance.get_physical_device_memory_properties(phys) };
        let name = props
            .device_name_as_c_str()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        info!(
            "vk: using {name} (graphics family {}, present family {})",
            families.graphics, families.present
        );

        let graphics_queue = unsafe { device.get_device_queue(families.graphics, 0) };
        let present_queue = unsafe { device.get_device_queue(families.present, 0) };
        let swapchain_loader = swapchain::Device::new(&instance, &device);

        Ok(AshDevice {
            _entry: entry,
            instance,
            debug,
            surface_loader,
            surface,
            phys,
            memory_properties,
            anisotropy: anisotropy
                .then(|| props.limits.max_sampler_anisotropy.min(MAX_ANISOTROPY)),
            device,
            families,
            graphics_queue,
            present_queue,
            swapchain_loader,
        })
    }

    pub fn raw(&self) -> &ash::Device {
        &self.device
    }

    pub fn swapchain_loader(&self) -> &swapchain::Device {
        &self.swapchain_loader
    }

    pub fn graphics_queue(&self) -> vk::Queue {
        self.graphics_queue
    }

    pub fn present_queue(&self) -> vk::Queue {
        self.present_queue
    }

    /// Host-visible, coherent buffer for per-frame uploads.
    pub fn create_host_buffer(
        &self,
        size: vk::DeviceSize,
        usage: vk::BufferUsageFlags,
    ) -> Result<(vk::Buffer, vk::DeviceMemory)> {
        let create_info = vk::BufferCreateInfo {
            size,
            usage,
            sharing_mode: vk::SharingMode::EXCLUSIVE,
            ..Default::default()
        };
        let buffer =
            unsafe { self.device.create_buffer(&create_info, None) }.vk_op("create_buffer")?;
        let req = unsafe { self.device.get_buffer_memory_requirements(buffer) };
        let memory = self.allocate(
            req,
            vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT,
            "host buffer",
        );
        let memory = match memory {
            Ok(memory) => memory,
            Err(e) => {
                unsafe { self.device.destroy_buffer(buffer, None) };
                return Err(e);
            }
        };
        if let Err(result) = unsafe { self.device.bind_buffer_memory(buffer, memory, 0) } {
            unsafe {
                self.device.destroy_buffer(buffer, None);
                self.device.free_memory(memory, None);
            }
            return Err(GfxError::Vulkan {
                op: "bind_buffer_memory",
                result,
            });
        }
        Ok((buffer, memory))
    }

    pub fn destroy_host_buffer(&self, buffer: vk::Buffer, memory: vk::DeviceMemory) {
        unsafe {
            self.device.destroy_buffer(buffer, None);
            self.device.free_memory(memory, None);
        }
    }

    /// Copies `bytes` to the start of a host-visible allocation.
    pub fn write_host_memory(&self, memory: vk::DeviceMemory, bytes: &[u8]) -> Result<()> {
        unsafe {
            let ptr = self
                .device
                .map_memory(memory, 0, bytes.len() as u64, vk::MemoryMapFlags::empty())
                .vk_op("map_memory")?;
            std::ptr::copy_nonoverlapping(bytes.as_ptr(), ptr.cast::<u8>(), bytes.len());
            self.device.unmap_memory(memory);
        }
        Ok(())
    }

    pub fn allocate_command_buffers(
        &self,
        pool: vk::CommandPool,
        count: u32,
    ) -> Result<Vec<vk::CommandBuffer>> {
        let alloc_info = vk::CommandBufferAllocateInfo {
            command_pool: pool,
            level: vk::CommandBufferLevel::PRIMARY,
            command_buffer_count: count,
            ..Default::default()
        };
        unsafe { self.device.allocate_command_buffers(&alloc_info) }
            .vk_op("allocate_command_buffers")
    }

    pub fn free_command_buffers(&self, pool: vk::CommandPool, buffers: &[vk::CommandBuffer]) {
        if !buffers.is_empty() {
            unsafe { self.device.free_command_buffers(pool, buffers) };
        }
    }

    fn allocate(
        &self,
        req: vk::MemoryRequirements,
        wanted: vk::MemoryPropertyFlags,
        what: &'static str,
    ) -> Result<vk::DeviceMemory> {
        let memory_type_index =
            find_memory_type(&self.memory_properties, req.memory_type_bits, wanted)
                .ok_or(GfxError::NoMemoryType(what))?;
        let alloc = vk::MemoryAllocateInfo {
            allocation_size: req.size,
            memory_type_index,
            ..Default::default()
        };
        unsafe { self.device.allocate_memory(&alloc, None) }.vk_op("allocate_memory")
    }
}

unsafe fn destroy_instance(
    instance: &Instance,
    debug: Option<(debug_utils::Instance, vk::DebugUtilsMessengerEXT)>,
) {
    unsafe {
        if let Some((loader, messenger)) = debug {
            loader.destroy_debug_utils_messenger(messenger, None);
        }
        instance.destroy_instance(None);
    }
}

impl DeviceOps for AshDevice {
    fn surface_support(&self) -> Result<SurfaceSupport> {
        unsafe {
            Ok(SurfaceSupport {
                capabilities: self
                    .surface_loader
                    .get_physical_device_surface_capabilities(self.phys, self.surface)
                    .vk_op("get_physical_device_surface_capabilities")?,
                formats: self
                    .surface_loader
                    .get_physical_device_surface_formats(self.phys, self.surface)
                    .vk_op("get_physical_device_surface_formats")?,
                present_modes: self
                    .surface_loader
                    .get_physical_device_surface_present_modes(self.phys, self.surface)
                    .vk_op("get_physical_device_surface_present_modes")?,
            })
        }
    }

    fn create_swapchain(&self, request: &SwapchainRequest) -> Result<vk::SwapchainKHR> {
        let families = [self.families.graphics, self.families.present];
        let (sharing_mode, family_count) = if self.families.graphics != self.families.present {
            (vk::SharingMode::CONCURRENT, families.len() as u32)
        } else {
            (vk::SharingMode::EXCLUSIVE, 0)
        };
        let create_info = vk::SwapchainCreateInfoKHR {
            surface: self.surface,
            min_image_count: request.min_image_count,
            image_format: request.surface_format.format,
            image_color_space: request.surface_format.color_space,
            image_extent: request.extent,
            image_array_layers: 1,
            image_usage: vk::ImageUsageFlags::COLOR_ATTACHMENT,
            image_sharing_mode: sharing_mode,
            queue_family_index_count: family_count,
            p_queue_family_indices: families.as_ptr(),
            pre_transform: request.pre_transform,
            composite_alpha: vk::CompositeAlphaFlagsKHR::OPAQUE,
            present_mode: request.present_mode,
            clipped: vk::TRUE,
            ..Default::default()
        };
        unsafe { self.swapchain_loader.create_swapchain(&create_info, None) }
            .vk_op("create_swapchain")
    }

    fn swapchain_images(&self, swapchain: vk::SwapchainKHR) -> Result<Vec<vk::Image>> {
        unsafe { self.swapchain_loader.get_swapchain_images(swapchain) }
            .vk_op("get_swapchain_images")
    }

    fn destroy_swapchain(&self, swapchain: vk::SwapchainKHR) {
        unsafe { self.swapchain_loader.destroy_swapchain(swapchain, None) };
    }

    fn create_image_view(
        &self,
        image: vk::Image,
        format: vk::Format,
        aspect: vk::ImageAspectFlags,
    ) -> Result<vk::ImageView> {
        let create_info = vk::ImageViewCreateInfo {
            image,
            view_type: vk::ImageViewType::TYPE_2D,
            format,
            subresource_range: vk::ImageSubresourceRange {
                aspect_mask: aspect,
                base_mip_level: 0,
                level_count: 1,
                base_array_layer: 0,
                layer_count: 1,
            },
            ..Default::default()
        };
        unsafe { self.device.create_image_view(&create_info, None) }.vk_op("create_image_view")
    }

    fn destroy_image_view(&self, view: vk::ImageView) {
        unsafe { self.device.destroy_image_view(view, None) };
    }

    fn create_attachment_image(
        &self,
        request: &AttachmentRequest,
    ) -> Result<(vk::Image, vk::DeviceMemory)> {
        let create_info = vk::ImageCreateInfo {
            image_type: vk::ImageType::TYPE_2D,
            format: request.format,
            extent: vk::Extent3D {
                width: request.extent.width,
                height: request.extent.height,
                depth: 1,
            },
            mip_levels: 1,
            array_layers: 1,
            samples: request.samples,
            tiling: vk::ImageTiling::OPTIMAL,
            usage: request.usage,
            sharing_mode: vk::SharingMode::EXCLUSIVE,
            initial_layout: vk::ImageLayout::UNDEFINED,
            ..Default::default()
        };
        let image = unsafe { self.device.create_image(&create_info, None) }.vk_op("create_image")?;
        let req = unsafe { self.device.get_image_memory_requirements(image) };
        let memory = match self.allocate(req, vk::MemoryPropertyFlags::DEVICE_LOCAL, "attachment image")
        {
            Ok(memory) => memory,
            Err(e) => {
                unsafe { self.device.destroy_image(image, None) };
                return Err(e);
            }
        };
        if let Err(result) = unsafe { self.device.bind_image_memory(image, memory, 0) } {
            self.destroy_attachment_image(image, memory);
            return Err(GfxError::Vulkan {
                op: "bind_image_memory",
                result,
            });
        }
        Ok((image, memory))
    }

    fn destroy_attachment_image(&self, image: vk::Image, memory: vk::DeviceMemory) {
        unsafe {
            self.device.destroy_image(image, None);
            self.device.free_memory(memory, None);
        }
    }

    fn create_render_pass(&self, blueprint: &RenderPassBlueprint) -> Result<vk::RenderPass> {
        let subpass = vk::SubpassDescription {
            pipeline_bind_point: vk::PipelineBindPoint::GRAPHICS,
            color_attachment_count: 1,
            p_color_attachments: &blueprint.color_ref,
            p_resolve_attachments: &blueprint.resolve_ref,
            p_depth_stencil_attachment: &blueprint.depth_ref,
            ..Default::default()
        };
        let create_info = vk::RenderPassCreateInfo {
            attachment_count: blueprint.attachments.len() as u32,
            p_attachments: blueprint.attachments.as_ptr(),
            subpass_count: 1,
            p_subpasses: &subpass,
            dependency_count: 1,
            p_dependencies: &blueprint.dependency,
            ..Default::default()
        };
        unsafe { self.device.create_render_pass(&create_info, None) }.vk_op("create_render_pass")
    }

    fn destroy_render_pass(&self, render_pass: vk::RenderPass) {
        unsafe { self.device.destroy_render_pass(render_pass, None) };
    }

    fn create_framebuffer(
        &self,
        render_pass: vk::RenderPass,
        attachments: &[vk::ImageView],
        extent: vk::Extent2D,
    ) -> Result<vk::Framebuffer> {
        let create_info = vk::FramebufferCreateInfo {
            render_pass,
            attachment_count: attachments.len() as u32,
            p_attachments: attachments.as_ptr(),
            width: extent.width,
            height: extent.height,
            layers: 1,
            ..Default::default()
        };
        unsafe { self.device.create_framebuffer(&create_info, None) }.vk_op("create_framebuffer")
    }

    fn destroy_framebuffer(&self, framebuffer: vk::Framebuffer) {
        unsafe { self.device.destroy_framebuffer(framebuffer, None) };
    }

    fn create_sampler(&self, max_lod: f32) -> Result<vk::Sampler> {
        let create_info = vk::SamplerCreateInfo {
            mag_filter: vk::Filter::LINEAR,
            min_filter: vk::Filter::LINEAR,
            mipmap_mode: vk::SamplerMipmapMode::LINEAR,
            address_mode_u: vk::SamplerAddressMode::REPEAT,
            address_mode_v: vk::SamplerAddressMode::REPEAT,
            address_mode_w: vk::SamplerAddressMode::REPEAT,
            anisotropy_enable: if self.anisotropy.is_some() { vk::TRUE } else { vk::FALSE },
            max_anisotropy: self.anisotropy.unwrap_or(1.0),
            compare_enable: vk::FALSE,
            compare_op: vk::CompareOp::ALWAYS,
            min_lod: 0.0,
            max_lod,
            border_color: vk::BorderColor::INT_OPAQUE_BLACK,
            unnormalized_coordinates: vk::FALSE,
            ..Default::default()
        };
        unsafe { self.device.create_sampler(&create_info, None) }.vk_op("create_sampler")
    }

    fn destroy_sampler(&self, sampler: vk::Sampler) {
        unsafe { self.device.destroy_sampler(sampler, None) };
    }

    fn create_command_pool(&self) -> Result<vk::CommandPool> {
        let create_info = vk::CommandPoolCreateInfo {
            queue_family_index: self.families.graphics,
            flags: vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER,
            ..Default::default()
        };
        unsafe { self.device.create_command_pool(&create_info, None) }
            .vk_op("create_command_pool")
    }

    fn destroy_command_pool(&self, pool: vk::CommandPool) {
        unsafe { self.device.destroy_command_pool(pool, None) };
    }

    fn create_semaphore(&self) -> Result<vk::Semaphore> {
        unsafe {
            self.device
                .create_semaphore(&vk::SemaphoreCreateInfo::default(), None)
        }
        .vk_op("create_semaphore")
    }

    fn destroy_semaphore(&self, semaphore: vk::Semaphore) {
        unsafe { self.device.destroy_semaphore(semaphore, None) };
    }

    fn create_fence(&self, signaled: bool) -> Result<vk::Fence> {
        let create_info = vk::FenceCreateInfo {
            flags: if signaled {
                vk::FenceCreateFlags::SIGNALED
            } else {
                vk::FenceCreateFlags::empty()
            },
            ..Default::default()
        };
        unsafe { self.device.create_fence(&create_info, None) }.vk_op("create_fence")
    }

    fn destroy_fence(&self, fence: vk::Fence) {
        unsafe { self.device.destroy_fence(fence, None) };
    }

    fn wait_for_fences(&self, fences: &[vk::Fence], timeout_ns: u64) -> Result<bool> {
        match unsafe { self.device.wait_for_fences(fences, true, timeout_ns) } {
            Ok(()) => Ok(true),
            Err(vk::Result::TIMEOUT) => Ok(false),
            Err(result) => Err(GfxError::Vulkan {
                op: "wait_for_fences",
                result,
            }),
        }
    }

    fn wait_idle(&self) -> Result<()> {
        unsafe { self.device.device_wait_idle() }.vk_op("device_wait_idle")
    }

    fn supports_depth_attachment(&self, format: vk::Format) -> bool {
        let props = unsafe {
            self.instance
                .get_physical_device_format_properties(self.phys, format)
        };
        props
            .optimal_tiling_features
            .contains(vk::FormatFeatureFlags::DEPTH_STENCIL_ATTACHMENT)
    }

    fn framebuffer_sample_counts(&self) -> vk::SampleCountFlags {
        let limits = unsafe { self.instance.get_physical_device_properties(self.phys) }.limits;
        limits.framebuffer_color_sample_counts & limits.framebuffer_depth_sample_counts
    }

    fn destroy(self) {
        // STRICT ORDER: device, then debug messenger and surface, then instance.
        unsafe {
            self.device.destroy_device(None);
            self.surface_loader.destroy_surface(self.surface, None);
            destroy_instance(&self.instance, self.debug);
        }
        info!("vk: device and instance destroyed");
    }
}
