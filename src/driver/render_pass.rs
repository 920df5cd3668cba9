use {
    super::{device::Device, DriverError, SampleCount},
    ash::vk,
    log::{trace, warn},
    std::{
        fmt::{Debug, Formatter},
        ops::Deref,
        slice::from_ref,
        sync::Arc,
        thread::panicking,
    },
};

/// Describes one attachment of a render pass.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub struct AttachmentInfo {
    pub fmt: vk::Format,
    pub sample_count: SampleCount,
    pub load_op: vk::AttachmentLoadOp,
    pub store_op: vk::AttachmentStoreOp,
    pub stencil_load_op: vk::AttachmentLoadOp,
    pub stencil_store_op: vk::AttachmentStoreOp,
    pub initial_layout: vk::ImageLayout,
    pub final_layout: vk::ImageLayout,
}

impl AttachmentInfo {
    /// A single-sample color attachment which is cleared, stored and then handed to the
    /// presentation engine.
    pub fn present(fmt: vk::Format) -> Self {
        Self {
            fmt,
            load_op: vk::AttachmentLoadOp::CLEAR,
            store_op: vk::AttachmentStoreOp::STORE,
            final_layout: vk::ImageLayout::PRESENT_SRC_KHR,
            ..Default::default()
        }
    }
}

impl Default for AttachmentInfo {
    fn default() -> Self {
        AttachmentInfo {
            fmt: vk::Format::UNDEFINED,
            sample_count: SampleCount::Type1,
            initial_layout: vk::ImageLayout::UNDEFINED,
            load_op: vk::AttachmentLoadOp::DONT_CARE,
            stencil_load_op: vk::AttachmentLoadOp::DONT_CARE,
            store_op: vk::AttachmentStoreOp::DONT_CARE,
            stencil_store_op: vk::AttachmentStoreOp::DONT_CARE,
            final_layout: vk::ImageLayout::UNDEFINED,
        }
    }
}

impl From<AttachmentInfo> for vk::AttachmentDescription {
    fn from(info: AttachmentInfo) -> Self {
        Self::default()
            .format(info.fmt)
            .samples(info.sample_count.into())
            .load_op(info.load_op)
            .store_op(info.store_op)
            .stencil_load_op(info.stencil_load_op)
            .stencil_store_op(info.stencil_store_op)
            .initial_layout(info.initial_layout)
            .final_layout(info.final_layout)
    }
}

/// A render pass with one subpass writing one color attachment.
///
/// Pipelines are created against subpass `0` of this render pass.
pub struct RenderPass {
    /// Information used to create this object.
    pub attachment: AttachmentInfo,

    device: Arc<Device>,
    render_pass: vk::RenderPass,
}

impl RenderPass {
    #[profiling::function]
    pub fn create(device: &Arc<Device>, attachment: AttachmentInfo) -> Result<Self, DriverError> {
        trace!("create {:?}", attachment.fmt);

        let device = Arc::clone(device);
        let attachment_description = vk::AttachmentDescription::from(attachment);
        let color_attachment = vk::AttachmentReference::default()
            .attachment(0)
            .layout(vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL);
        let subpass = vk::SubpassDescription::default()
            .pipeline_bind_point(vk::PipelineBindPoint::GRAPHICS)
            .color_attachments(from_ref(&color_attachment));

        // Waits for the presentation engine to release the image before writing to it
        let dependency = vk::SubpassDependency::default()
            .src_subpass(vk::SUBPASS_EXTERNAL)
            .dst_subpass(0)
            .src_stage_mask(vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT)
            .dst_stage_mask(vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT)
            .dst_access_mask(vk::AccessFlags::COLOR_ATTACHMENT_WRITE);
        let render_pass_info = vk::RenderPassCreateInfo::default()
            .attachments(from_ref(&attachment_description))
            .subpasses(from_ref(&subpass))
            .dependencies(from_ref(&dependency));

        let render_pass = unsafe {
            device
                .create_render_pass(&render_pass_info, None)
                .map_err(|err| {
                    warn!("{err}");

                    DriverError::from_vk(err)
                })?
        };

        Ok(Self {
            attachment,
            device,
            render_pass,
        })
    }
}

impl Debug for RenderPass {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RenderPass")
            .field("attachment", &self.attachment)
            .field("render_pass", &self.render_pass)
            .finish()
    }
}

impl Deref for RenderPass {
    type Target = vk::RenderPass;

    fn deref(&self) -> &Self::Target {
        &self.render_pass
    }
}

impl Drop for RenderPass {
    #[profiling::function]
    fn drop(&mut self) {
        if panicking() {
            return;
        }

        trace!("drop");

        unsafe {
            self.device.destroy_render_pass(self.render_pass, None);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    pub fn attachment_info_present() {
        let info = AttachmentInfo::present(vk::Format::B8G8R8A8_SRGB);
        let description = vk::AttachmentDescription::from(info);

        assert_eq!(description.format, vk::Format::B8G8R8A8_SRGB);
        assert_eq!(description.samples, vk::SampleCountFlags::TYPE_1);
        assert_eq!(description.load_op, vk::AttachmentLoadOp::CLEAR);
        assert_eq!(description.store_op, vk::AttachmentStoreOp::STORE);
        assert_eq!(description.stencil_load_op, vk::AttachmentLoadOp::DONT_CARE);
        assert_eq!(description.initial_layout, vk::ImageLayout::UNDEFINED);
        assert_eq!(description.final_layout, vk::ImageLayout::PRESENT_SRC_KHR);
    }
}
