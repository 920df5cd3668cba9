//! Shader module types

use {
    super::{device::Device, DeviceApi, DriverError},
    ash::{util::read_spv, vk},
    log::{trace, warn},
    std::{
        fmt::{Debug, Formatter},
        io::Cursor,
        ops::Deref,
        sync::Arc,
        thread::panicking,
    },
};

/// The programmable pipeline stage a [`ShaderModule`] is bound to.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum ShaderStage {
    /// Executes once per vertex.
    Vertex,

    /// Executes once per rasterized fragment.
    Fragment,
}

impl From<ShaderStage> for vk::ShaderStageFlags {
    fn from(stage: ShaderStage) -> Self {
        match stage {
            ShaderStage::Vertex => Self::VERTEX,
            ShaderStage::Fragment => Self::FRAGMENT,
        }
    }
}

/// Opaque representation of a [shader module] object.
///
/// The module is destroyed when this value is dropped.
///
/// [shader module]: https://registry.khronos.org/vulkan/specs/1.3-extensions/man/html/VkShaderModule.html
pub struct ShaderModule<D = Device>
where
    D: DeviceApi,
{
    device: Arc<D>,
    shader_module: vk::ShaderModule,

    /// The stage this module was created for.
    pub stage: ShaderStage,
}

impl<D> ShaderModule<D>
where
    D: DeviceApi,
{
    /// Loads compiled SPIR-V code into a new shader module.
    ///
    /// `code` must be a non-empty, whole number of 32-bit words in either byte order. Code which
    /// is not is rejected with [`DriverError::InvalidShaderCode`] before the device is called.
    #[profiling::function]
    pub fn create(device: &Arc<D>, stage: ShaderStage, code: &[u8]) -> Result<Self, DriverError> {
        trace!("create {stage:?} ({} bytes)", code.len());

        if code.is_empty() || code.len() % 4 != 0 {
            warn!("invalid {stage:?} shader code length: {}", code.len());

            return Err(DriverError::InvalidShaderCode { len: code.len() });
        }

        // Copies into u32-aligned storage and fixes up big-endian binaries
        let code = read_spv(&mut Cursor::new(code)).map_err(|err| {
            warn!("{err}");

            DriverError::InvalidShaderCode { len: code.len() }
        })?;

        let device = Arc::clone(device);
        let shader_module = unsafe {
            device
                .create_shader_module(&vk::ShaderModuleCreateInfo::default().code(&code))
                .map_err(|err| {
                    warn!("{err}");

                    DriverError::ShaderModuleCreation(err)
                })?
        };

        Ok(Self {
            device,
            shader_module,
            stage,
        })
    }
}

impl<D> Debug for ShaderModule<D>
where
    D: DeviceApi,
{
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShaderModule")
            .field("shader_module", &self.shader_module)
            .field("stage", &self.stage)
            .finish()
    }
}

impl<D> Deref for ShaderModule<D>
where
    D: DeviceApi,
{
    type Target = vk::ShaderModule;

    fn deref(&self) -> &Self::Target {
        &self.shader_module
    }
}

impl<D> Drop for ShaderModule<D>
where
    D: DeviceApi,
{
    #[profiling::function]
    fn drop(&mut self) {
        if panicking() {
            return;
        }

        trace!("drop {:?}", self.stage);

        unsafe {
            self.device.destroy_shader_module(self.shader_module);
        }
    }
}
