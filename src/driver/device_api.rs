//! The narrow set of device calls issued by the pipeline builders.

use {
    ash::{prelude::VkResult, vk},
    log::warn,
    std::slice::from_ref,
};

/// Creation and destruction entry points of a logical device.
///
/// Every builder in this crate (shader modules, pipeline layouts and graphic pipelines) talks to
/// the device only through this trait, so the same construction protocol runs against a real
/// Vulkan device or against the recording device used by tests.
///
/// # Safety
///
/// The `create_*` functions hand out raw handles which must be passed back to the matching
/// `destroy_*` function exactly once, and every handle referenced by a create info structure must
/// be alive for the duration of the call.
pub trait DeviceApi {
    /// See [vkCreateShaderModule](https://registry.khronos.org/vulkan/specs/1.3-extensions/man/html/vkCreateShaderModule.html).
    ///
    /// # Safety
    ///
    /// `info` must describe valid, aligned SPIR-V code.
    unsafe fn create_shader_module(
        &self,
        info: &vk::ShaderModuleCreateInfo<'_>,
    ) -> VkResult<vk::ShaderModule>;

    /// # Safety
    ///
    /// `shader_module` must have been created by this device and must not be used afterwards.
    unsafe fn destroy_shader_module(&self, shader_module: vk::ShaderModule);

    /// See [vkCreatePipelineLayout](https://registry.khronos.org/vulkan/specs/1.3-extensions/man/html/vkCreatePipelineLayout.html).
    ///
    /// # Safety
    ///
    /// All descriptor set layouts referenced by `info` must be valid.
    unsafe fn create_pipeline_layout(
        &self,
        info: &vk::PipelineLayoutCreateInfo<'_>,
    ) -> VkResult<vk::PipelineLayout>;

    /// # Safety
    ///
    /// No pipeline created with `layout` may outlive this call.
    unsafe fn destroy_pipeline_layout(&self, layout: vk::PipelineLayout);

    /// Creates exactly one graphics pipeline without a pipeline cache.
    ///
    /// # Safety
    ///
    /// Every pointer and handle reachable from `info` must be valid for the duration of the call.
    unsafe fn create_graphic_pipeline(
        &self,
        info: &vk::GraphicsPipelineCreateInfo<'_>,
    ) -> VkResult<vk::Pipeline>;

    /// # Safety
    ///
    /// `pipeline` must not be in use by any pending command buffer.
    unsafe fn destroy_pipeline(&self, pipeline: vk::Pipeline);

    /// Blocks until all outstanding work on the device has finished.
    fn wait_idle(&self);
}

impl DeviceApi for ash::Device {
    unsafe fn create_shader_module(
        &self,
        info: &vk::ShaderModuleCreateInfo<'_>,
    ) -> VkResult<vk::ShaderModule> {
        ash::Device::create_shader_module(self, info, None)
    }

    unsafe fn destroy_shader_module(&self, shader_module: vk::ShaderModule) {
        ash::Device::destroy_shader_module(self, shader_module, None);
    }

    unsafe fn create_pipeline_layout(
        &self,
        info: &vk::PipelineLayoutCreateInfo<'_>,
    ) -> VkResult<vk::PipelineLayout> {
        ash::Device::create_pipeline_layout(self, info, None)
    }

    unsafe fn destroy_pipeline_layout(&self, layout: vk::PipelineLayout) {
        ash::Device::destroy_pipeline_layout(self, layout, None);
    }

    unsafe fn create_graphic_pipeline(
        &self,
        info: &vk::GraphicsPipelineCreateInfo<'_>,
    ) -> VkResult<vk::Pipeline> {
        match self.create_graphics_pipelines(vk::PipelineCache::null(), from_ref(info), None) {
            Ok(pipelines) => Ok(pipelines[0]),
            Err((pipelines, err)) => {
                // Some implementations hand back handles for the entries which did succeed
                for pipeline in pipelines {
                    if pipeline != vk::Pipeline::null() {
                        ash::Device::destroy_pipeline(self, pipeline, None);
                    }
                }

                Err(err)
            }
        }
    }

    unsafe fn destroy_pipeline(&self, pipeline: vk::Pipeline) {
        ash::Device::destroy_pipeline(self, pipeline, None);
    }

    fn wait_idle(&self) {
        if let Err(err) = unsafe { self.device_wait_idle() } {
            warn!("device_wait_idle() failed: {err}");
        }
    }
}
