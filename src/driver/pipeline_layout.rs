use {
    super::{device::Device, DeviceApi, DriverError},
    ash::vk,
    log::{trace, warn},
    std::{
        fmt::{Debug, Formatter},
        ops::Deref,
        sync::Arc,
        thread::panicking,
    },
};

/// Opaque representation of a [pipeline layout] object.
///
/// A layout is independent of any single pipeline and must outlive every pipeline created with it.
///
/// [pipeline layout]: https://registry.khronos.org/vulkan/specs/1.3-extensions/man/html/VkPipelineLayout.html
pub struct PipelineLayout<D = Device>
where
    D: DeviceApi,
{
    device: Arc<D>,

    /// Information used to create this object.
    pub info: PipelineLayoutInfo,

    layout: vk::PipelineLayout,
}

impl<D> PipelineLayout<D>
where
    D: DeviceApi,
{
    /// Creates a new pipeline layout on the given device.
    ///
    /// Use `PipelineLayoutInfo::default()` for a layout without descriptor sets or push constants.
    #[profiling::function]
    pub fn create(
        device: &Arc<D>,
        info: impl Into<PipelineLayoutInfo>,
    ) -> Result<Self, DriverError> {
        let device = Arc::clone(device);
        let info = info.into();

        trace!(
            "create ({} set layouts, {} push constant ranges)",
            info.set_layouts.len(),
            info.push_constant_ranges.len()
        );

        let layout = unsafe {
            device
                .create_pipeline_layout(
                    &vk::PipelineLayoutCreateInfo::default()
                        .set_layouts(&info.set_layouts)
                        .push_constant_ranges(&info.push_constant_ranges),
                )
                .map_err(|err| {
                    warn!("{err}");

                    DriverError::PipelineLayoutCreation(err)
                })?
        };

        Ok(Self {
            device,
            info,
            layout,
        })
    }
}

impl<D> Debug for PipelineLayout<D>
where
    D: DeviceApi,
{
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PipelineLayout")
            .field("info", &self.info)
            .field("layout", &self.layout)
            .finish()
    }
}

impl<D> Deref for PipelineLayout<D>
where
    D: DeviceApi,
{
    type Target = vk::PipelineLayout;

    fn deref(&self) -> &Self::Target {
        &self.layout
    }
}

impl<D> Drop for PipelineLayout<D>
where
    D: DeviceApi,
{
    #[profiling::function]
    fn drop(&mut self) {
        if panicking() {
            return;
        }

        trace!("drop");

        unsafe {
            self.device.destroy_pipeline_layout(self.layout);
        }
    }
}

/// Information used to create a [`PipelineLayout`] instance.
///
/// The default value describes an empty layout.
#[derive(Clone, Debug, Default)]
pub struct PipelineLayoutInfo {
    /// Descriptor set layouts, in set index order.
    pub set_layouts: Vec<vk::DescriptorSetLayout>,

    /// Push constant ranges accessible by the pipeline stages.
    pub push_constant_ranges: Vec<vk::PushConstantRange>,
}

#[cfg(test)]
mod tests {
    use {
        super::*,
        crate::mock::{Ledger, MockDevice, Resource},
    };

    #[test]
    pub fn pipeline_layout_empty() {
        let device = Arc::new(MockDevice::new(Ledger::default()));
        let layout = PipelineLayout::create(&device, PipelineLayoutInfo::default()).unwrap();

        assert_ne!(*layout, vk::PipelineLayout::null());
        assert!(layout.info.set_layouts.is_empty());
        assert!(layout.info.push_constant_ranges.is_empty());
        assert_eq!(device.layout_shapes(), vec![(0, 0)]);

        drop(layout);

        assert_eq!(device.ledger().live(Resource::PipelineLayout), 0);
    }

    #[test]
    pub fn pipeline_layout_push_constants() {
        let device = Arc::new(MockDevice::new(Ledger::default()));
        let info = PipelineLayoutInfo {
            push_constant_ranges: vec![vk::PushConstantRange {
                stage_flags: vk::ShaderStageFlags::VERTEX,
                offset: 0,
                size: 16,
            }],
            ..Default::default()
        };

        let _layout = PipelineLayout::create(&device, info).unwrap();

        assert_eq!(device.layout_shapes(), vec![(0, 1)]);
    }

    #[test]
    pub fn pipeline_layout_failure() {
        let device = Arc::new(MockDevice::new(Ledger::default()));
        device.fail_pipeline_layouts(vk::Result::ERROR_OUT_OF_HOST_MEMORY);

        let err = PipelineLayout::create(&device, PipelineLayoutInfo::default()).unwrap_err();

        assert_eq!(
            err,
            DriverError::PipelineLayoutCreation(vk::Result::ERROR_OUT_OF_HOST_MEMORY)
        );
        assert_eq!(device.ledger().created(Resource::PipelineLayout), 0);
    }
}
