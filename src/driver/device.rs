use {
    super::{DeviceApi, DriverError, Instance},
    ash::{khr, prelude::VkResult, vk},
    derive_builder::{Builder, UninitializedFieldError},
    log::{debug, info, trace, warn},
    raw_window_handle::{HasDisplayHandle, HasWindowHandle},
    std::{
        fmt::{Debug, Formatter},
        ops::Deref,
        slice::from_ref,
        thread::panicking,
    },
};

/// Opaque handle to a device object.
///
/// A device owns the Vulkan instance, the presentation surface of one window and the single
/// graphics queue all work is submitted to. Dropping it waits for the queue to finish and then
/// destroys the device, the surface and the instance, in that order.
pub struct Device {
    device: ash::Device,

    /// Information used to create this object.
    pub info: DeviceInfo,

    instance: Instance,

    /// The physical device all work runs on.
    pub physical_device: vk::PhysicalDevice,

    /// Properties of `physical_device`, such as its name and type.
    pub physical_device_properties: vk::PhysicalDeviceProperties,

    /// The queue used for both rendering and presentation.
    pub queue: vk::Queue,

    /// The family index of `queue`.
    pub queue_family_index: u32,

    pub(super) surface: vk::SurfaceKHR,
    pub(super) surface_ext: khr::surface::Instance,
    pub(super) swapchain_ext: khr::swapchain::Device,
}

impl Device {
    /// Creates a device able to present to the given window.
    ///
    /// Prefers discrete, then integrated, then virtual GPUs; only devices with a queue family
    /// which supports both graphics and presentation to the window surface are considered.
    #[profiling::function]
    pub fn create(
        window: &(impl HasDisplayHandle + HasWindowHandle),
        info: impl Into<DeviceInfo>,
    ) -> Result<Self, DriverError> {
        let info = info.into();

        trace!("create {:?}", info);

        let display_handle = window.display_handle().map_err(|err| {
            warn!("{err}");

            DriverError::Unsupported
        })?;
        let window_handle = window.window_handle().map_err(|err| {
            warn!("{err}");

            DriverError::Unsupported
        })?;
        let raw_display_handle = display_handle.as_raw();
        let required_extensions = ash_window::enumerate_required_extensions(raw_display_handle)
            .map_err(|err| {
                warn!("{err}");

                DriverError::Unsupported
            })?;
        let instance = Instance::create(info.debug, required_extensions)?;

        if info.debug && !Instance::is_debug(&instance) {
            warn!("validation messages unavailable");
        }

        let surface_ext = khr::surface::Instance::new(Instance::entry(&instance), &instance);
        let surface = unsafe {
            ash_window::create_surface(
                Instance::entry(&instance),
                &instance,
                raw_display_handle,
                window_handle.as_raw(),
                None,
            )
        }
        .map_err(|err| {
            warn!("unable to create surface: {err}");

            DriverError::from_vk(err)
        })?;

        let selected = Self::select_physical_device(&instance, &surface_ext, surface);
        let (physical_device, queue_family_index) = match selected {
            Ok(res) => res,
            Err(err) => {
                unsafe {
                    surface_ext.destroy_surface(surface, None);
                }

                return Err(err);
            }
        };
        let physical_device_properties =
            unsafe { instance.get_physical_device_properties(physical_device) };

        if let Ok(name) = physical_device_properties.device_name_as_c_str() {
            let device_type = physical_device_properties.device_type;

            info!("Using {name:?} ({device_type:?})");
        }

        let priorities = [1.0];
        let queue_info = vk::DeviceQueueCreateInfo::default()
            .queue_family_index(queue_family_index)
            .queue_priorities(&priorities);
        let extension_names = [khr::swapchain::NAME.as_ptr()];
        let device_info = vk::DeviceCreateInfo::default()
            .queue_create_infos(from_ref(&queue_info))
            .enabled_extension_names(&extension_names);
        let device = unsafe { instance.create_device(physical_device, &device_info, None) };
        let device = match device {
            Ok(device) => device,
            Err(err) => {
                warn!("unable to create device: {err}");

                unsafe {
                    surface_ext.destroy_surface(surface, None);
                }

                return Err(DriverError::from_vk(err));
            }
        };
        let queue = unsafe { device.get_device_queue(queue_family_index, 0) };
        let swapchain_ext = khr::swapchain::Device::new(&instance, &device);

        Ok(Self {
            device,
            info,
            instance,
            physical_device,
            physical_device_properties,
            queue,
            queue_family_index,
            surface,
            surface_ext,
            swapchain_ext,
        })
    }

    fn score_device_type(properties: &vk::PhysicalDeviceProperties) -> usize {
        match properties.device_type {
            vk::PhysicalDeviceType::DISCRETE_GPU => 1000,
            vk::PhysicalDeviceType::INTEGRATED_GPU => 200,
            vk::PhysicalDeviceType::VIRTUAL_GPU => 1,
            _ => 0,
        }
    }

    fn select_physical_device(
        instance: &Instance,
        surface_ext: &khr::surface::Instance,
        surface: vk::SurfaceKHR,
    ) -> Result<(vk::PhysicalDevice, u32), DriverError> {
        let physical_devices = unsafe { instance.enumerate_physical_devices() }.map_err(|err| {
            warn!("unable to enumerate physical devices: {err}");

            DriverError::from_vk(err)
        })?;

        physical_devices
            .into_iter()
            .filter_map(|physical_device| {
                let properties =
                    unsafe { instance.get_physical_device_properties(physical_device) };
                let name = properties.device_name_as_c_str().unwrap_or_default();
                let device_type = properties.device_type;

                debug!("physical device {name:?} ({device_type:?})");

                if !Self::supports_swapchain(instance, physical_device) {
                    debug!("no swapchain support");

                    return None;
                }

                let queue_families = unsafe {
                    instance.get_physical_device_queue_family_properties(physical_device)
                };
                let queue_family_index = (0..queue_families.len() as u32).find(|&idx| {
                    let queue_flags = queue_families[idx as usize].queue_flags;

                    queue_flags.contains(vk::QueueFlags::GRAPHICS)
                        && Self::supports_present(surface_ext, physical_device, idx, surface)
                })?;

                Some((physical_device, queue_family_index, properties))
            })
            .collect::<Vec<_>>()
            .into_iter()
            // With equal scores `max_by_key` picks the last device, so reverse to keep the order
            // reported by `enumerate_physical_devices`
            .rev()
            .max_by_key(|(_, _, properties)| Self::score_device_type(properties))
            .map(|(physical_device, queue_family_index, _)| (physical_device, queue_family_index))
            .ok_or_else(|| {
                warn!("no suitable physical device found");

                DriverError::Unsupported
            })
    }

    fn supports_present(
        surface_ext: &khr::surface::Instance,
        physical_device: vk::PhysicalDevice,
        queue_family_index: u32,
        surface: vk::SurfaceKHR,
    ) -> bool {
        let supported = unsafe {
            surface_ext.get_physical_device_surface_support(
                physical_device,
                queue_family_index,
                surface,
            )
        };

        supported.unwrap_or_default()
    }

    fn supports_swapchain(instance: &Instance, physical_device: vk::PhysicalDevice) -> bool {
        unsafe { instance.enumerate_device_extension_properties(physical_device) }
            .map(|extensions| {
                extensions.iter().any(|extension| {
                    extension
                        .extension_name_as_c_str()
                        .is_ok_and(|name| name == khr::swapchain::NAME)
                })
            })
            .unwrap_or_default()
    }
}

impl Debug for Device {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Device")
            .field("info", &self.info)
            .field("physical_device", &self.physical_device)
            .field("queue_family_index", &self.queue_family_index)
            .finish()
    }
}

impl Deref for Device {
    type Target = ash::Device;

    fn deref(&self) -> &Self::Target {
        &self.device
    }
}

impl DeviceApi for Device {
    unsafe fn create_shader_module(
        &self,
        info: &vk::ShaderModuleCreateInfo<'_>,
    ) -> VkResult<vk::ShaderModule> {
        DeviceApi::create_shader_module(&self.device, info)
    }

    unsafe fn destroy_shader_module(&self, shader_module: vk::ShaderModule) {
        DeviceApi::destroy_shader_module(&self.device, shader_module);
    }

    unsafe fn create_pipeline_layout(
        &self,
        info: &vk::PipelineLayoutCreateInfo<'_>,
    ) -> VkResult<vk::PipelineLayout> {
        DeviceApi::create_pipeline_layout(&self.device, info)
    }

    unsafe fn destroy_pipeline_layout(&self, layout: vk::PipelineLayout) {
        DeviceApi::destroy_pipeline_layout(&self.device, layout);
    }

    unsafe fn create_graphic_pipeline(
        &self,
        info: &vk::GraphicsPipelineCreateInfo<'_>,
    ) -> VkResult<vk::Pipeline> {
        DeviceApi::create_graphic_pipeline(&self.device, info)
    }

    unsafe fn destroy_pipeline(&self, pipeline: vk::Pipeline) {
        DeviceApi::destroy_pipeline(&self.device, pipeline);
    }

    fn wait_idle(&self) {
        DeviceApi::wait_idle(&self.device);
    }
}

impl Drop for Device {
    #[profiling::function]
    fn drop(&mut self) {
        if panicking() {
            return;
        }

        trace!("drop");

        DeviceApi::wait_idle(&self.device);

        unsafe {
            self.device.destroy_device(None);
            self.surface_ext.destroy_surface(self.surface, None);
        }

        // The instance is destroyed when its field drops
    }
}

/// Information used to create a [`Device`] instance.
#[derive(Builder, Clone, Copy, Debug, Default, Eq, Hash, PartialEq)]
#[builder(
    build_fn(private, name = "fallible_build", error = "DeviceInfoBuilderError"),
    derive(Clone, Copy, Debug),
    pattern = "owned"
)]
#[non_exhaustive]
pub struct DeviceInfo {
    /// Enables Vulkan validation layers.
    ///
    /// This requires a Vulkan SDK installation and will cause validation errors to introduce
    /// panics as they happen.
    ///
    /// _NOTE:_ Validation messages are written to the log at a level matching their severity.
    #[builder(default)]
    pub debug: bool,
}

impl DeviceInfo {
    /// Specifies default device information.
    #[allow(clippy::new_ret_no_self)]
    pub fn new() -> DeviceInfoBuilder {
        Default::default()
    }
}

impl From<DeviceInfoBuilder> for DeviceInfo {
    fn from(info: DeviceInfoBuilder) -> Self {
        info.build()
    }
}

// HACK: https://github.com/colin-kiegel/rust-derive-builder/issues/56
impl DeviceInfoBuilder {
    /// Builds a new `DeviceInfo`.
    pub fn build(self) -> DeviceInfo {
        self.fallible_build()
            .expect("All required fields set at initialization")
    }
}

#[derive(Debug)]
struct DeviceInfoBuilderError;

impl From<UninitializedFieldError> for DeviceInfoBuilderError {
    fn from(_: UninitializedFieldError) -> Self {
        Self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    type Info = DeviceInfo;
    type Builder = DeviceInfoBuilder;

    #[test]
    pub fn device_info() {
        let info = Info { debug: true };
        let builder = Builder::default().debug(true).build();

        assert_eq!(info, builder);
    }

    #[test]
    pub fn device_info_default() {
        let info = Info::default();
        let builder = Builder::default().build();

        assert_eq!(info, builder);
        assert!(!info.debug);
    }

    #[test]
    pub fn device_score_prefers_discrete() {
        let score = |device_type| {
            Device::score_device_type(&vk::PhysicalDeviceProperties {
                device_type,
                ..Default::default()
            })
        };

        let discrete = score(vk::PhysicalDeviceType::DISCRETE_GPU);
        let integrated = score(vk::PhysicalDeviceType::INTEGRATED_GPU);
        let virtual_gpu = score(vk::PhysicalDeviceType::VIRTUAL_GPU);

        assert!(discrete > integrated);
        assert!(integrated > virtual_gpu);
        assert!(virtual_gpu > score(vk::PhysicalDeviceType::CPU));
    }
}
