//! _CFD Render_ is a minimal Vulkan rendering bootstrap: it opens a window, selects a GPU, creates
//! a swapchain and builds one fully-configured graphics pipeline which draws into it every frame.
//!
//! The interesting part is the pipeline construction and GPU object lifecycle protocol:
//!
//! - [`driver::PipelineStateConfig`] is a plain, comparable description of every piece of
//!   fixed-function state. [`driver::create_default_config`] returns one which is complete for a
//!   given render target extent.
//! - [`driver::GraphicPipeline::create`] turns that description plus two compiled SPIR-V shaders
//!   into a ready-to-bind pipeline, or fails without leaking anything.
//! - [`app::App`] acquires the window, device, swapchain, pipeline layout and pipeline in that
//!   order and always releases them in exactly the reverse order.
//!
//! # Usage
//!
//! ```no_run
//! use cfd_render::prelude::*;
//!
//! fn main() -> Result<(), AppError> {
//!     App::new(VulkanPlatform, AppConfig::default()).run()
//! }
//! ```
//!
//! Pipelines may also be built directly on any [`driver::DeviceApi`] implementation:
//!
//! ```no_run
//! # use std::sync::Arc;
//! # use cfd_render::prelude::*;
//! # fn build(device: &Arc<Device>, target: &Swapchain, vert: &[u8], frag: &[u8])
//! # -> Result<(), DriverError> {
//! let layout = PipelineLayout::create(device, PipelineLayoutInfo::default())?;
//! let config = create_default_config(target.width(), target.height())
//!     .with_layout(*layout)
//!     .with_render_pass(target.render_pass());
//! let pipeline = GraphicPipeline::create(device, config, vert, frag)?;
//! # Ok(()) }
//! ```
//!
//! # Testing
//!
//! The `test-device` feature exposes the [`mock`] module: a device, window and render target which
//! record every call instead of talking to a GPU.

pub mod app;
pub mod config;
pub mod driver;
pub mod window;

#[cfg(any(test, feature = "test-device"))]
pub mod mock;

/// Things, particularly traits, which are used in almost every program.
pub mod prelude {
    pub use {
        super::{
            app::{App, AppError, AppState, Platform, VulkanPlatform},
            config::{AppConfig, ConfigError},
            driver::{
                create_default_config, vk, BlendMode, DepthStencilMode, Device, DeviceApi,
                DeviceInfo, DriverError, GraphicPipeline, InputAssemblyMode, MultisampleMode,
                PipelineLayout, PipelineLayoutInfo, PipelineStateConfig, RasterizationMode,
                RenderTarget, SampleCount, ShaderModule, ShaderStage, Swapchain, SwapchainInfo,
            },
            window::{Window, WindowError, WinitWindow},
        },
        log::{debug, error, info, logger, trace, warn}, // Everyone wants a log
    };
}
