//! Thin Vulkan driver layer: device ownership, the swapchain presentation target and the one
//! graphics pipeline built on top of them.

mod device;
mod device_api;
mod graphic;
mod instance;
mod pipeline_layout;
mod render_pass;
mod shader;
mod swapchain;

pub use {
    self::{
        device::{Device, DeviceInfo, DeviceInfoBuilder},
        device_api::DeviceApi,
        graphic::{
            create_default_config, BlendMode, BlendModeBuilder, DepthBias, DepthStencilMode,
            DepthStencilModeBuilder, GraphicPipeline, InputAssemblyMode, MultisampleMode,
            MultisampleModeBuilder, PipelineStateConfig, RasterizationMode,
            RasterizationModeBuilder, SampleCount, Scissor, StencilMode, Viewport,
        },
        instance::Instance,
        pipeline_layout::{PipelineLayout, PipelineLayoutInfo},
        render_pass::{AttachmentInfo, RenderPass},
        shader::{ShaderModule, ShaderStage},
        swapchain::{
            RenderTarget, Swapchain, SwapchainInfo, SwapchainInfoBuilder, MAX_FRAMES_IN_FLIGHT,
        },
    },
    ash::{self, vk},
};

use std::{
    error::Error,
    fmt::{Display, Formatter},
};

/// Describes the general category of all driver failures.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum DriverError {
    /// The input data, or referenced data, is not valid for the current state.
    InvalidData,

    /// Shader code was empty or not a whole number of 32-bit words; nothing was allocated.
    InvalidShaderCode {
        /// Length of the rejected code, in bytes.
        len: usize,
    },

    /// The requested feature, or input configuration, is not supported for the current state.
    Unsupported,

    /// The device has run out of physical memory.
    ///
    /// Many drivers return this value for generic or unhandled error conditions.
    OutOfMemory,

    /// The driver rejected shader code while creating a shader module.
    ShaderModuleCreation(vk::Result),

    /// The driver could not create a pipeline layout.
    PipelineLayoutCreation(vk::Result),

    /// The driver rejected the combined graphics pipeline description.
    GraphicPipelineCreation(vk::Result),

    /// A pipeline state configuration was used before a required handle was assigned.
    UnsetPipelineReference(&'static str),
}

impl DriverError {
    /// Maps the common out-of-memory results and treats everything else as unsupported.
    pub(crate) fn from_vk(err: vk::Result) -> Self {
        match err {
            vk::Result::ERROR_OUT_OF_HOST_MEMORY | vk::Result::ERROR_OUT_OF_DEVICE_MEMORY => {
                Self::OutOfMemory
            }
            _ => Self::Unsupported,
        }
    }
}

impl Display for DriverError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidShaderCode { len } => {
                write!(f, "shader code of {len} bytes is not a whole number of words")
            }
            Self::ShaderModuleCreation(err) => write!(f, "unable to create shader module: {err}"),
            Self::PipelineLayoutCreation(err) => {
                write!(f, "unable to create pipeline layout: {err}")
            }
            Self::GraphicPipelineCreation(err) => {
                write!(f, "unable to create graphic pipeline: {err}")
            }
            Self::UnsetPipelineReference(name) => {
                write!(f, "pipeline state `{name}` must be set before creating a pipeline")
            }
            _ => write!(f, "{:?}", self),
        }
    }
}

impl Error for DriverError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    pub fn driver_error_from_vk() {
        assert_eq!(
            DriverError::from_vk(vk::Result::ERROR_OUT_OF_DEVICE_MEMORY),
            DriverError::OutOfMemory
        );
        assert_eq!(
            DriverError::from_vk(vk::Result::ERROR_INITIALIZATION_FAILED),
            DriverError::Unsupported
        );
    }

    #[test]
    pub fn driver_error_display() {
        assert_eq!(
            DriverError::UnsetPipelineReference("layout").to_string(),
            "pipeline state `layout` must be set before creating a pipeline"
        );
        assert_eq!(DriverError::Unsupported.to_string(), "Unsupported");
    }
}
