use {
    super::{
        device::Device,
        render_pass::{AttachmentInfo, RenderPass},
        DeviceApi, DriverError,
    },
    ash::vk,
    derive_builder::{Builder, UninitializedFieldError},
    log::{info, trace, warn},
    std::{
        fmt::{Debug, Formatter},
        slice::from_ref,
        sync::Arc,
        thread::panicking,
    },
};

/// The number of frames which may be recorded while earlier frames are still executing.
pub const MAX_FRAMES_IN_FLIGHT: usize = 2;

const CLEAR_COLOR: [f32; 4] = [0.0, 0.0, 0.0, 1.0];

/// A sized, presentable target which graphic pipelines draw into.
pub trait RenderTarget {
    /// Records, submits and presents one frame which draws a single triangle with `pipeline`.
    fn draw(&mut self, pipeline: vk::Pipeline) -> Result<(), DriverError>;

    /// Height of the target images, in pixels.
    fn height(&self) -> u32;

    /// The render pass pipelines must be created against.
    fn render_pass(&self) -> vk::RenderPass;

    /// Width of the target images, in pixels.
    fn width(&self) -> u32;
}

/// Provides the ability to present rendering results to a window surface.
///
/// Owns the swapchain images and views, the render pass and one framebuffer per image, plus the
/// command buffers and synchronization objects used to record and submit frames.
pub struct Swapchain {
    command_buffers: Vec<vk::CommandBuffer>,
    command_pool: vk::CommandPool,
    current_frame: usize,
    device: Arc<Device>,
    extent: vk::Extent2D,
    framebuffers: Vec<vk::Framebuffer>,
    image_available: Vec<vk::Semaphore>,
    image_views: Vec<vk::ImageView>,
    in_flight: Vec<vk::Fence>,

    /// Information used to create this object.
    pub info: SwapchainInfo,

    render_finished: Vec<vk::Semaphore>,
    render_pass: Option<RenderPass>,

    /// The format and color space of the swapchain images.
    pub surface_format: vk::SurfaceFormatKHR,

    swapchain: vk::SwapchainKHR,
}

impl Swapchain {
    /// Creates a swapchain on the surface owned by `device`.
    ///
    /// Prefers `B8G8R8A8_SRGB` with the sRGB non-linear color space and uses FIFO presentation.
    /// Any object created before a failure is destroyed before the error is returned.
    #[profiling::function]
    pub fn create(
        device: &Arc<Device>,
        info: impl Into<SwapchainInfo>,
    ) -> Result<Self, DriverError> {
        let device = Arc::clone(device);
        let info = info.into();

        trace!("create {:?}", info);

        let (capabilities, surface_formats) = unsafe {
            let capabilities = device
                .surface_ext
                .get_physical_device_surface_capabilities(device.physical_device, device.surface)
                .map_err(|err| {
                    warn!("{err}");

                    DriverError::from_vk(err)
                })?;
            let surface_formats = device
                .surface_ext
                .get_physical_device_surface_formats(device.physical_device, device.surface)
                .map_err(|err| {
                    warn!("{err}");

                    DriverError::from_vk(err)
                })?;

            (capabilities, surface_formats)
        };

        let surface_format = Self::select_surface_format(&surface_formats).ok_or_else(|| {
            warn!("surface reports no formats");

            DriverError::Unsupported
        })?;
        let extent = Self::select_extent(&capabilities, info.width, info.height);

        if extent.width == 0 || extent.height == 0 {
            warn!("empty surface extent");

            return Err(DriverError::Unsupported);
        }

        let image_count = Self::select_image_count(&capabilities, info.desired_image_count);

        info!(
            "Swapchain {}x{} {:?} with {image_count} images",
            extent.width, extent.height, surface_format.format
        );

        // Filled in step by step; Drop destroys whatever was created if a step fails
        let mut this = Self {
            command_buffers: vec![],
            command_pool: vk::CommandPool::null(),
            current_frame: 0,
            device,
            extent,
            framebuffers: vec![],
            image_available: vec![],
            image_views: vec![],
            in_flight: vec![],
            info,
            render_finished: vec![],
            render_pass: None,
            surface_format,
            swapchain: vk::SwapchainKHR::null(),
        };

        let pre_transform = if capabilities
            .supported_transforms
            .contains(vk::SurfaceTransformFlagsKHR::IDENTITY)
        {
            vk::SurfaceTransformFlagsKHR::IDENTITY
        } else {
            capabilities.current_transform
        };
        let swapchain_info = vk::SwapchainCreateInfoKHR::default()
            .surface(this.device.surface)
            .min_image_count(image_count)
            .image_color_space(surface_format.color_space)
            .image_format(surface_format.format)
            .image_extent(extent)
            .image_usage(vk::ImageUsageFlags::COLOR_ATTACHMENT)
            .image_sharing_mode(vk::SharingMode::EXCLUSIVE)
            .pre_transform(pre_transform)
            .composite_alpha(vk::CompositeAlphaFlagsKHR::OPAQUE)
            .present_mode(vk::PresentModeKHR::FIFO)
            .clipped(true)
            .image_array_layers(1);

        unsafe {
            this.swapchain = this
                .device
                .swapchain_ext
                .create_swapchain(&swapchain_info, None)
                .map_err(|err| {
                    warn!("unable to create swapchain: {err}");

                    DriverError::from_vk(err)
                })?;

            let images = this
                .device
                .swapchain_ext
                .get_swapchain_images(this.swapchain)
                .map_err(DriverError::from_vk)?;

            for image in images {
                let image_view_info = vk::ImageViewCreateInfo::default()
                    .image(image)
                    .view_type(vk::ImageViewType::TYPE_2D)
                    .format(surface_format.format)
                    .subresource_range(vk::ImageSubresourceRange {
                        aspect_mask: vk::ImageAspectFlags::COLOR,
                        base_mip_level: 0,
                        level_count: 1,
                        base_array_layer: 0,
                        layer_count: 1,
                    });
                let image_view = this
                    .device
                    .create_image_view(&image_view_info, None)
                    .map_err(DriverError::from_vk)?;

                this.image_views.push(image_view);
            }

            this.render_pass = Some(RenderPass::create(
                &this.device,
                AttachmentInfo::present(surface_format.format),
            )?);

            let render_pass = RenderTarget::render_pass(&this);

            for image_view in &this.image_views {
                let framebuffer_info = vk::FramebufferCreateInfo::default()
                    .render_pass(render_pass)
                    .attachments(from_ref(image_view))
                    .width(extent.width)
                    .height(extent.height)
                    .layers(1);
                let framebuffer = this
                    .device
                    .create_framebuffer(&framebuffer_info, None)
                    .map_err(DriverError::from_vk)?;

                this.framebuffers.push(framebuffer);
            }

            this.command_pool = this
                .device
                .create_command_pool(
                    &vk::CommandPoolCreateInfo::default()
                        .flags(vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER)
                        .queue_family_index(this.device.queue_family_index),
                    None,
                )
                .map_err(DriverError::from_vk)?;
            this.command_buffers = this
                .device
                .allocate_command_buffers(
                    &vk::CommandBufferAllocateInfo::default()
                        .command_pool(this.command_pool)
                        .level(vk::CommandBufferLevel::PRIMARY)
                        .command_buffer_count(MAX_FRAMES_IN_FLIGHT as _),
                )
                .map_err(DriverError::from_vk)?;

            for _ in 0..MAX_FRAMES_IN_FLIGHT {
                let semaphore = this
                    .device
                    .create_semaphore(&vk::SemaphoreCreateInfo::default(), None)
                    .map_err(DriverError::from_vk)?;
                this.image_available.push(semaphore);

                // Signaled so the first wait on each frame returns immediately
                let fence = this
                    .device
                    .create_fence(
                        &vk::FenceCreateInfo::default().flags(vk::FenceCreateFlags::SIGNALED),
                        None,
                    )
                    .map_err(DriverError::from_vk)?;
                this.in_flight.push(fence);
            }

            // One per image: a semaphore may only be reused once its presentation has finished
            for _ in 0..this.image_views.len() {
                let semaphore = this
                    .device
                    .create_semaphore(&vk::SemaphoreCreateInfo::default(), None)
                    .map_err(DriverError::from_vk)?;
                this.render_finished.push(semaphore);
            }
        }

        Ok(this)
    }

    /// The number of images in the swapchain.
    pub fn image_count(this: &Self) -> usize {
        this.image_views.len()
    }

    unsafe fn record(
        &self,
        cmd_buf: vk::CommandBuffer,
        image_index: u32,
        pipeline: vk::Pipeline,
    ) -> Result<(), vk::Result> {
        let render_pass = RenderTarget::render_pass(self);
        let clear_value = vk::ClearValue {
            color: vk::ClearColorValue {
                float32: CLEAR_COLOR,
            },
        };
        let render_pass_begin = vk::RenderPassBeginInfo::default()
            .render_pass(render_pass)
            .framebuffer(self.framebuffers[image_index as usize])
            .render_area(vk::Rect2D {
                offset: vk::Offset2D::default(),
                extent: self.extent,
            })
            .clear_values(from_ref(&clear_value));

        self.device
            .begin_command_buffer(cmd_buf, &vk::CommandBufferBeginInfo::default())?;
        self.device
            .cmd_begin_render_pass(cmd_buf, &render_pass_begin, vk::SubpassContents::INLINE);
        self.device
            .cmd_bind_pipeline(cmd_buf, vk::PipelineBindPoint::GRAPHICS, pipeline);

        // Vertex positions are generated by the vertex shader
        self.device.cmd_draw(cmd_buf, 3, 1, 0, 0);
        self.device.cmd_end_render_pass(cmd_buf);
        self.device.end_command_buffer(cmd_buf)
    }

    fn select_extent(
        capabilities: &vk::SurfaceCapabilitiesKHR,
        width: u32,
        height: u32,
    ) -> vk::Extent2D {
        match capabilities.current_extent.width {
            u32::MAX => vk::Extent2D {
                width: width.clamp(
                    capabilities.min_image_extent.width,
                    capabilities.max_image_extent.width,
                ),
                height: height.clamp(
                    capabilities.min_image_extent.height,
                    capabilities.max_image_extent.height,
                ),
            },
            _ => capabilities.current_extent,
        }
    }

    fn select_image_count(capabilities: &vk::SurfaceCapabilitiesKHR, desired: u32) -> u32 {
        let mut image_count = desired.max(capabilities.min_image_count);

        if capabilities.max_image_count != 0 {
            image_count = image_count.min(capabilities.max_image_count);
        }

        image_count
    }

    fn select_surface_format(formats: &[vk::SurfaceFormatKHR]) -> Option<vk::SurfaceFormatKHR> {
        formats
            .iter()
            .find(|format| {
                format.format == vk::Format::B8G8R8A8_SRGB
                    && format.color_space == vk::ColorSpaceKHR::SRGB_NONLINEAR
            })
            .or_else(|| formats.first())
            .copied()
    }
}

impl Debug for Swapchain {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Swapchain")
            .field("extent", &self.extent)
            .field("info", &self.info)
            .field("surface_format", &self.surface_format)
            .field("swapchain", &self.swapchain)
            .finish()
    }
}

impl Drop for Swapchain {
    #[profiling::function]
    fn drop(&mut self) {
        if panicking() {
            return;
        }

        trace!("drop");

        self.device.wait_idle();

        unsafe {
            for semaphore in self
                .image_available
                .drain(..)
                .chain(self.render_finished.drain(..))
            {
                self.device.destroy_semaphore(semaphore, None);
            }

            for fence in self.in_flight.drain(..) {
                self.device.destroy_fence(fence, None);
            }

            // Frees the command buffers too
            self.device.destroy_command_pool(self.command_pool, None);

            for framebuffer in self.framebuffers.drain(..) {
                self.device.destroy_framebuffer(framebuffer, None);
            }
        }

        self.render_pass = None;

        unsafe {
            for image_view in self.image_views.drain(..) {
                self.device.destroy_image_view(image_view, None);
            }

            self.device
                .swapchain_ext
                .destroy_swapchain(self.swapchain, None);
        }
    }
}

impl RenderTarget for Swapchain {
    #[profiling::function]
    fn draw(&mut self, pipeline: vk::Pipeline) -> Result<(), DriverError> {
        let frame = self.current_frame;
        let fence = self.in_flight[frame];
        let image_available = self.image_available[frame];
        let cmd_buf = self.command_buffers[frame];

        unsafe {
            self.device
                .wait_for_fences(from_ref(&fence), true, u64::MAX)
                .map_err(|err| {
                    warn!("{err}");

                    DriverError::from_vk(err)
                })?;

            let image_index = match self.device.swapchain_ext.acquire_next_image(
                self.swapchain,
                u64::MAX,
                image_available,
                vk::Fence::null(),
            ) {
                Ok((image_index, suboptimal)) => {
                    if suboptimal {
                        trace!("suboptimal swapchain image");
                    }

                    image_index
                }
                Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => {
                    warn!("swapchain out of date, skipping frame");

                    return Ok(());
                }
                Err(err) => {
                    warn!("unable to acquire swapchain image: {err}");

                    return Err(DriverError::from_vk(err));
                }
            };
            let render_finished = self.render_finished[image_index as usize];

            self.device
                .reset_fences(from_ref(&fence))
                .map_err(DriverError::from_vk)?;
            self.device
                .reset_command_buffer(cmd_buf, vk::CommandBufferResetFlags::empty())
                .map_err(DriverError::from_vk)?;
            self.record(cmd_buf, image_index, pipeline)
                .map_err(DriverError::from_vk)?;

            let wait_stage = vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT;
            let submit_info = vk::SubmitInfo::default()
                .wait_semaphores(from_ref(&image_available))
                .wait_dst_stage_mask(from_ref(&wait_stage))
                .command_buffers(from_ref(&cmd_buf))
                .signal_semaphores(from_ref(&render_finished));

            self.device
                .queue_submit(self.device.queue, from_ref(&submit_info), fence)
                .map_err(|err| {
                    warn!("unable to submit frame: {err}");

                    DriverError::from_vk(err)
                })?;

            let present_info = vk::PresentInfoKHR::default()
                .wait_semaphores(from_ref(&render_finished))
                .swapchains(from_ref(&self.swapchain))
                .image_indices(from_ref(&image_index));

            match self
                .device
                .swapchain_ext
                .queue_present(self.device.queue, &present_info)
            {
                Ok(false) => (),
                Ok(true) | Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => {
                    warn!("swapchain out of date after present");
                }
                Err(err) => {
                    warn!("unable to present swapchain image: {err}");

                    return Err(DriverError::from_vk(err));
                }
            }
        }

        self.current_frame = (frame + 1) % MAX_FRAMES_IN_FLIGHT;

        Ok(())
    }

    fn height(&self) -> u32 {
        self.extent.height
    }

    fn render_pass(&self) -> vk::RenderPass {
        self.render_pass.as_deref().copied().unwrap_or_default()
    }

    fn width(&self) -> u32 {
        self.extent.width
    }
}

/// Information used to create a [`Swapchain`] instance.
#[derive(Builder, Clone, Copy, Debug, Eq, Hash, PartialEq)]
#[builder(
    build_fn(private, name = "fallible_build", error = "SwapchainInfoBuilderError"),
    derive(Clone, Copy, Debug),
    pattern = "owned"
)]
#[non_exhaustive]
pub struct SwapchainInfo {
    /// The desired, but not guaranteed, number of images that will be in the created swapchain.
    ///
    /// The default value is `3`.
    #[builder(default = "3")]
    pub desired_image_count: u32,

    /// The initial height of the surface, used when the surface does not report its own extent.
    pub height: u32,

    /// The initial width of the surface, used when the surface does not report its own extent.
    pub width: u32,
}

impl SwapchainInfo {
    /// Specifies a default swapchain with the given `width` and `height` values.
    #[inline(always)]
    #[allow(clippy::new_ret_no_self)]
    pub fn new(width: u32, height: u32) -> SwapchainInfoBuilder {
        SwapchainInfoBuilder::default().width(width).height(height)
    }

    /// Converts a `SwapchainInfo` into a `SwapchainInfoBuilder`.
    #[inline(always)]
    pub fn to_builder(self) -> SwapchainInfoBuilder {
        SwapchainInfoBuilder {
            desired_image_count: Some(self.desired_image_count),
            height: Some(self.height),
            width: Some(self.width),
        }
    }
}

impl From<SwapchainInfoBuilder> for SwapchainInfo {
    fn from(info: SwapchainInfoBuilder) -> Self {
        info.build()
    }
}

// HACK: https://github.com/colin-kiegel/rust-derive-builder/issues/56
impl SwapchainInfoBuilder {
    /// Builds a new `SwapchainInfo`.
    ///
    /// # Panics
    ///
    /// If any of the following values have not been set this function will panic:
    ///
    /// * `width`
    /// * `height`
    #[inline(always)]
    pub fn build(self) -> SwapchainInfo {
        match self.fallible_build() {
            Err(SwapchainInfoBuilderError(err)) => panic!("{err}"),
            Ok(info) => info,
        }
    }
}

#[derive(Debug)]
struct SwapchainInfoBuilderError(UninitializedFieldError);

impl From<UninitializedFieldError> for SwapchainInfoBuilderError {
    fn from(err: UninitializedFieldError) -> Self {
        Self(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    type Info = SwapchainInfo;
    type Builder = SwapchainInfoBuilder;

    #[test]
    pub fn swapchain_info() {
        let info = Info::new(800, 600).build();
        let builder = info.to_builder().build();

        assert_eq!(info, builder);
        assert_eq!(info.desired_image_count, 3);
    }

    #[test]
    pub fn swapchain_info_builder() {
        let info = Info {
            desired_image_count: 2,
            height: 20,
            width: 10,
        };
        let builder = Builder::default()
            .desired_image_count(2)
            .width(10)
            .height(20)
            .build();

        assert_eq!(info, builder);
    }

    #[test]
    #[should_panic(expected = "Field not initialized: height")]
    pub fn swapchain_info_builder_uninit_height() {
        Builder::default().width(42).build();
    }

    #[test]
    #[should_panic(expected = "Field not initialized: width")]
    pub fn swapchain_info_builder_uninit_width() {
        Builder::default().height(42).build();
    }

    fn capabilities(min: u32, max: u32) -> vk::SurfaceCapabilitiesKHR {
        vk::SurfaceCapabilitiesKHR {
            min_image_count: min,
            max_image_count: max,
            current_extent: vk::Extent2D {
                width: u32::MAX,
                height: u32::MAX,
            },
            min_image_extent: vk::Extent2D {
                width: 1,
                height: 1,
            },
            max_image_extent: vk::Extent2D {
                width: 1024,
                height: 1024,
            },
            ..Default::default()
        }
    }

    #[test]
    pub fn swapchain_image_count() {
        assert_eq!(Swapchain::select_image_count(&capabilities(2, 8), 3), 3);
        assert_eq!(Swapchain::select_image_count(&capabilities(4, 8), 3), 4);
        assert_eq!(Swapchain::select_image_count(&capabilities(1, 2), 3), 2);
        assert_eq!(Swapchain::select_image_count(&capabilities(2, 0), 5), 5);
    }

    #[test]
    pub fn swapchain_extent() {
        let mut caps = capabilities(2, 3);

        assert_eq!(
            Swapchain::select_extent(&caps, 800, 2000),
            vk::Extent2D {
                width: 800,
                height: 1024
            }
        );

        caps.current_extent = vk::Extent2D {
            width: 640,
            height: 480,
        };

        assert_eq!(
            Swapchain::select_extent(&caps, 800, 600),
            vk::Extent2D {
                width: 640,
                height: 480
            }
        );
    }

    #[test]
    pub fn swapchain_surface_format() {
        let unorm = vk::SurfaceFormatKHR {
            format: vk::Format::B8G8R8A8_UNORM,
            color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
        };
        let srgb = vk::SurfaceFormatKHR {
            format: vk::Format::B8G8R8A8_SRGB,
            color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
        };

        assert_eq!(
            Swapchain::select_surface_format(&[unorm, srgb]).map(|format| format.format),
            Some(vk::Format::B8G8R8A8_SRGB)
        );
        assert_eq!(
            Swapchain::select_surface_format(&[unorm]).map(|format| format.format),
            Some(vk::Format::B8G8R8A8_UNORM)
        );
        assert!(Swapchain::select_surface_format(&[]).is_none());
    }
}
