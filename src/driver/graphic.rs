//! Graphics pipeline types

use {
    super::{
        device::Device,
        shader::{ShaderModule, ShaderStage},
        DeviceApi, DriverError,
    },
    ash::vk,
    derive_builder::{Builder, UninitializedFieldError},
    log::{trace, warn},
    ordered_float::OrderedFloat,
    std::{
        ffi::CStr,
        fmt::{Debug, Formatter},
        ops::Deref,
        slice::from_ref,
        sync::Arc,
        thread::panicking,
    },
};

const ENTRY_NAME: &CStr = c"main";

const RGBA_COLOR_COMPONENTS: vk::ColorComponentFlags = vk::ColorComponentFlags::from_raw(
    vk::ColorComponentFlags::R.as_raw()
        | vk::ColorComponentFlags::G.as_raw()
        | vk::ColorComponentFlags::B.as_raw()
        | vk::ColorComponentFlags::A.as_raw(),
);

/// Returns a complete pipeline state configuration which renders to the full `width` × `height`
/// extent.
///
/// The `layout` and `render_pass` handles are left null and must be assigned before the
/// configuration is used to create a [`GraphicPipeline`].
pub fn create_default_config(width: u32, height: u32) -> PipelineStateConfig {
    PipelineStateConfig::new(width, height)
}

/// Specifies color blend state used when rasterization is enabled for any color attachments
/// accessed during rendering.
///
/// See
/// [VkPipelineColorBlendAttachmentState](https://registry.khronos.org/vulkan/specs/1.3-extensions/man/html/VkPipelineColorBlendAttachmentState.html).
#[derive(Builder, Clone, Copy, Debug, Eq, Hash, PartialEq)]
#[builder(
    build_fn(private, name = "fallible_build", error = "BuilderError"),
    derive(Clone, Copy, Debug),
    pattern = "owned"
)]
pub struct BlendMode {
    /// Controls whether blending is enabled for the corresponding color attachment.
    ///
    /// If blending is not enabled, the source fragment’s color for that attachment is passed
    /// through unmodified.
    #[builder(default = "false")]
    pub blend_enable: bool,

    /// Selects which blend factor is used to determine the source factors.
    #[builder(default = "vk::BlendFactor::ONE")]
    pub src_color_blend_factor: vk::BlendFactor,

    /// Selects which blend factor is used to determine the destination factors.
    #[builder(default = "vk::BlendFactor::ZERO")]
    pub dst_color_blend_factor: vk::BlendFactor,

    /// Selects which blend operation is used to calculate the RGB values to write to the color
    /// attachment.
    #[builder(default = "vk::BlendOp::ADD")]
    pub color_blend_op: vk::BlendOp,

    /// Selects which blend factor is used to determine the source factor.
    #[builder(default = "vk::BlendFactor::ONE")]
    pub src_alpha_blend_factor: vk::BlendFactor,

    /// Selects which blend factor is used to determine the destination factor.
    #[builder(default = "vk::BlendFactor::ZERO")]
    pub dst_alpha_blend_factor: vk::BlendFactor,

    /// Selects which blend operation is used to calculate the alpha values to write to the color
    /// attachment.
    #[builder(default = "vk::BlendOp::ADD")]
    pub alpha_blend_op: vk::BlendOp,

    /// A bitmask of specifying which of the R, G, B, and/or A components are enabled for writing.
    #[builder(default = "RGBA_COLOR_COMPONENTS")]
    pub color_write_mask: vk::ColorComponentFlags,
}

impl BlendMode {
    /// Writes all four channels of the fragment color unmodified.
    pub const REPLACE: Self = Self {
        blend_enable: false,
        src_color_blend_factor: vk::BlendFactor::ONE,
        dst_color_blend_factor: vk::BlendFactor::ZERO,
        color_blend_op: vk::BlendOp::ADD,
        src_alpha_blend_factor: vk::BlendFactor::ONE,
        dst_alpha_blend_factor: vk::BlendFactor::ZERO,
        alpha_blend_op: vk::BlendOp::ADD,
        color_write_mask: RGBA_COLOR_COMPONENTS,
    };

    /// Specifies a default blend mode which is not enabled.
    #[allow(clippy::new_ret_no_self)]
    pub fn new() -> BlendModeBuilder {
        BlendModeBuilder::default()
    }
}

// the Builder derive Macro wants Default to be implemented for BlendMode
impl Default for BlendMode {
    fn default() -> Self {
        Self::REPLACE
    }
}

impl From<BlendMode> for vk::PipelineColorBlendAttachmentState {
    fn from(mode: BlendMode) -> Self {
        Self {
            blend_enable: mode.blend_enable as _,
            src_color_blend_factor: mode.src_color_blend_factor,
            dst_color_blend_factor: mode.dst_color_blend_factor,
            color_blend_op: mode.color_blend_op,
            src_alpha_blend_factor: mode.src_alpha_blend_factor,
            dst_alpha_blend_factor: mode.dst_alpha_blend_factor,
            alpha_blend_op: mode.alpha_blend_op,
            color_write_mask: mode.color_write_mask,
        }
    }
}

// HACK: https://github.com/colin-kiegel/rust-derive-builder/issues/56
impl BlendModeBuilder {
    /// Builds a new `BlendMode`.
    pub fn build(self) -> BlendMode {
        self.fallible_build()
            .expect("All required fields set at initialization")
    }
}

#[derive(Debug)]
struct BuilderError;

impl From<UninitializedFieldError> for BuilderError {
    fn from(_: UninitializedFieldError) -> Self {
        Self
    }
}

/// Depth values added to each fragment before the depth test.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq)]
pub struct DepthBias {
    /// A constant depth value added to each fragment.
    pub constant_factor: OrderedFloat<f32>,

    /// The maximum (or minimum) depth bias of a fragment.
    pub clamp: OrderedFloat<f32>,

    /// A scalar factor applied to a fragment’s slope in depth bias calculations.
    pub slope_factor: OrderedFloat<f32>,
}

/// Specifies the [depth bounds tests], [stencil test], and [depth test] pipeline state.
///
/// [depth bounds tests]: https://registry.khronos.org/vulkan/specs/1.3-extensions/html/vkspec.html#fragops-dbt
/// [stencil test]: https://registry.khronos.org/vulkan/specs/1.3-extensions/html/vkspec.html#fragops-stencil
/// [depth test]: https://registry.khronos.org/vulkan/specs/1.3-extensions/html/vkspec.html#fragops-depth
#[derive(Builder, Clone, Copy, Debug, Eq, Hash, PartialEq)]
#[builder(
    build_fn(private, name = "fallible_build", error = "BuilderError"),
    derive(Clone, Copy, Debug),
    pattern = "owned"
)]
pub struct DepthStencilMode {
    /// Control parameters of the stencil test for back-facing primitives.
    #[builder(default)]
    pub back: StencilMode,

    /// Controls whether [depth bounds testing] is enabled.
    ///
    /// [depth bounds testing]: https://registry.khronos.org/vulkan/specs/1.3-extensions/html/vkspec.html#fragops-dbt
    #[builder(default)]
    pub bounds_test: bool,

    /// A value specifying the comparison operator to use in the depth comparison step of the
    /// depth test.
    #[builder(default = "vk::CompareOp::LESS")]
    pub compare_op: vk::CompareOp,

    /// Controls whether depth testing is enabled.
    #[builder(default = "true")]
    pub depth_test: bool,

    /// Controls whether depth writes are enabled when `depth_test` is `true`.
    ///
    /// Depth writes are always disabled when `depth_test` is `false`.
    #[builder(default = "true")]
    pub depth_write: bool,

    /// Control parameters of the stencil test for front-facing primitives.
    #[builder(default)]
    pub front: StencilMode,

    // Note: Using setter(into) so caller does not need our version of OrderedFloat
    /// Minimum depth bound used in the depth bounds test.
    #[builder(default, setter(into))]
    pub min: OrderedFloat<f32>,

    // Note: Using setter(into) so caller does not need our version of OrderedFloat
    /// Maximum depth bound used in the depth bounds test.
    #[builder(default = "OrderedFloat(1.0)", setter(into))]
    pub max: OrderedFloat<f32>,

    /// Controls whether stencil testing is enabled.
    #[builder(default)]
    pub stencil_test: bool,
}

impl DepthStencilMode {
    /// Tests and writes depth using a less-than comparison; no bounds or stencil test.
    pub const DEPTH_WRITE: Self = Self {
        back: StencilMode::IGNORE,
        bounds_test: false,
        compare_op: vk::CompareOp::LESS,
        depth_test: true,
        depth_write: true,
        front: StencilMode::IGNORE,
        min: OrderedFloat(0.0),
        max: OrderedFloat(1.0),
        stencil_test: false,
    };

    /// Specifies a default depth/stencil mode which is equal to
    /// [`DepthStencilMode::DEPTH_WRITE`].
    #[allow(clippy::new_ret_no_self)]
    pub fn new() -> DepthStencilModeBuilder {
        DepthStencilModeBuilder::default()
    }
}

impl Default for DepthStencilMode {
    fn default() -> Self {
        Self::DEPTH_WRITE
    }
}

impl From<DepthStencilMode> for vk::PipelineDepthStencilStateCreateInfo<'_> {
    fn from(mode: DepthStencilMode) -> Self {
        Self::default()
            .back(mode.back.into())
            .depth_bounds_test_enable(mode.bounds_test)
            .depth_compare_op(mode.compare_op)
            .depth_test_enable(mode.depth_test)
            .depth_write_enable(mode.depth_write)
            .front(mode.front.into())
            .max_depth_bounds(mode.max.into_inner())
            .min_depth_bounds(mode.min.into_inner())
            .stencil_test_enable(mode.stencil_test)
    }
}

// HACK: https://github.com/colin-kiegel/rust-derive-builder/issues/56
impl DepthStencilModeBuilder {
    /// Builds a new `DepthStencilMode`.
    pub fn build(self) -> DepthStencilMode {
        self.fallible_build()
            .expect("All required fields set at initialization")
    }
}

/// Opaque representation of a [pipeline] object.
///
/// Owns the vertex and fragment shader modules used to create it; all three handles are destroyed
/// together when this value is dropped, the pipeline first.
///
/// [pipeline]: https://registry.khronos.org/vulkan/specs/1.3-extensions/man/html/VkPipeline.html
pub struct GraphicPipeline<D = Device>
where
    D: DeviceApi,
{
    /// Information used to create this object.
    pub config: PipelineStateConfig,

    device: Arc<D>,

    /// A descriptive name used in debugging messages.
    pub name: Option<String>,

    pipeline: vk::Pipeline,
    shader_modules: Vec<ShaderModule<D>>,
}

impl<D> GraphicPipeline<D>
where
    D: DeviceApi,
{
    /// Creates a new graphic pipeline on the given device from compiled vertex and fragment SPIR-V
    /// code.
    ///
    /// The pipeline reads no vertex buffers, uses the `main` entry point of both shaders and bakes
    /// all state at creation time (no dynamic state).
    ///
    /// # Errors
    ///
    /// - [`DriverError::UnsetPipelineReference`] if `config.layout` or `config.render_pass` is null;
    ///   the device is not called.
    /// - [`DriverError::InvalidShaderCode`] or [`DriverError::ShaderModuleCreation`] if either
    ///   shader cannot be loaded.
    /// - [`DriverError::GraphicPipelineCreation`] if the device rejects the pipeline.
    ///
    /// Shader modules created before a failure are destroyed before the error is returned.
    #[profiling::function]
    pub fn create(
        device: &Arc<D>,
        config: impl Into<PipelineStateConfig>,
        vertex_code: &[u8],
        fragment_code: &[u8],
    ) -> Result<Self, DriverError> {
        trace!("create");

        let device = Arc::clone(device);
        let config = config.into();

        PipelineStateConfig::validate(&config)?;

        let shader_modules = vec![
            ShaderModule::create(&device, ShaderStage::Vertex, vertex_code)?,
            ShaderModule::create(&device, ShaderStage::Fragment, fragment_code)?,
        ];
        let stages = shader_modules
            .iter()
            .map(|shader_module| {
                vk::PipelineShaderStageCreateInfo::default()
                    .stage(shader_module.stage.into())
                    .module(**shader_module)
                    .name(ENTRY_NAME)
            })
            .collect::<Box<[_]>>();

        // Vertices are generated by the vertex shader
        let vertex_input_state = vk::PipelineVertexInputStateCreateInfo::default();

        let viewport = vk::Viewport::from(config.viewport);
        let scissor = vk::Rect2D::from(config.scissor);
        let viewport_state = vk::PipelineViewportStateCreateInfo::default()
            .viewports(from_ref(&viewport))
            .scissors(from_ref(&scissor));
        let color_blend_attachment =
            vk::PipelineColorBlendAttachmentState::from(config.color_blend_attachment);
        let color_blend_state = vk::PipelineColorBlendStateCreateInfo::default()
            .logic_op_enable(false)
            .logic_op(vk::LogicOp::COPY)
            .attachments(from_ref(&color_blend_attachment))
            .blend_constants([0.0; 4]);
        let input_assembly_state =
            vk::PipelineInputAssemblyStateCreateInfo::from(config.input_assembly);
        let rasterization_state =
            vk::PipelineRasterizationStateCreateInfo::from(config.rasterization);
        let multisample_state = vk::PipelineMultisampleStateCreateInfo::from(config.multisample);
        let depth_stencil_state =
            vk::PipelineDepthStencilStateCreateInfo::from(config.depth_stencil);
        let graphic_pipeline_info = vk::GraphicsPipelineCreateInfo::default()
            .stages(&stages)
            .vertex_input_state(&vertex_input_state)
            .input_assembly_state(&input_assembly_state)
            .viewport_state(&viewport_state)
            .rasterization_state(&rasterization_state)
            .multisample_state(&multisample_state)
            .depth_stencil_state(&depth_stencil_state)
            .color_blend_state(&color_blend_state)
            .layout(config.layout)
            .render_pass(config.render_pass)
            .subpass(config.subpass)
            .base_pipeline_handle(vk::Pipeline::null())
            .base_pipeline_index(-1);

        let pipeline = unsafe {
            device
                .create_graphic_pipeline(&graphic_pipeline_info)
                .map_err(|err| {
                    warn!("create_graphic_pipeline: {err}\n{:#?}", config);

                    DriverError::GraphicPipelineCreation(err)
                })?
        };

        Ok(Self {
            config,
            device,
            name: None,
            pipeline,
            shader_modules,
        })
    }

    /// Returns the shader module handle created for the given stage.
    pub fn shader_module(this: &Self, stage: ShaderStage) -> Option<vk::ShaderModule> {
        this.shader_modules
            .iter()
            .find(|shader_module| shader_module.stage == stage)
            .map(|shader_module| **shader_module)
    }

    /// Sets the debugging name assigned to this pipeline.
    pub fn with_name(mut this: Self, name: impl Into<String>) -> Self {
        this.name = Some(name.into());
        this
    }
}

impl<D> Debug for GraphicPipeline<D>
where
    D: DeviceApi,
{
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GraphicPipeline")
            .field("config", &self.config)
            .field("name", &self.name)
            .field("pipeline", &self.pipeline)
            .field("shader_modules", &self.shader_modules)
            .finish()
    }
}

impl<D> Deref for GraphicPipeline<D>
where
    D: DeviceApi,
{
    type Target = vk::Pipeline;

    fn deref(&self) -> &Self::Target {
        &self.pipeline
    }
}

impl<D> Drop for GraphicPipeline<D>
where
    D: DeviceApi,
{
    #[profiling::function]
    fn drop(&mut self) {
        if panicking() {
            return;
        }

        trace!("drop {}", self.name.as_deref().unwrap_or("(unnamed)"));

        unsafe {
            self.device.destroy_pipeline(self.pipeline);
        }

        // Fragment module first, then vertex
        while let Some(shader_module) = self.shader_modules.pop() {
            drop(shader_module);
        }
    }
}

/// Input primitive assembly state.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub struct InputAssemblyMode {
    /// The primitive topology.
    pub topology: vk::PrimitiveTopology,

    /// Controls whether a special vertex index value restarts the assembly of primitives.
    pub primitive_restart: bool,
}

impl InputAssemblyMode {
    /// Separate triangles from each set of three vertices.
    pub const TRIANGLE_LIST: Self = Self {
        topology: vk::PrimitiveTopology::TRIANGLE_LIST,
        primitive_restart: false,
    };
}

impl Default for InputAssemblyMode {
    fn default() -> Self {
        Self::TRIANGLE_LIST
    }
}

impl From<InputAssemblyMode> for vk::PipelineInputAssemblyStateCreateInfo<'_> {
    fn from(mode: InputAssemblyMode) -> Self {
        Self::default()
            .topology(mode.topology)
            .primitive_restart_enable(mode.primitive_restart)
    }
}

/// Multisample state, see
/// [multisampling](https://registry.khronos.org/vulkan/specs/1.3-extensions/html/vkspec.html#primsrast-multisampling).
#[derive(Builder, Clone, Copy, Debug, Eq, Hash, PartialEq)]
#[builder(
    build_fn(private, name = "fallible_build", error = "BuilderError"),
    derive(Clone, Copy, Debug),
    pattern = "owned"
)]
pub struct MultisampleMode {
    /// Controls whether a temporary coverage value is generated based on the alpha component of the
    /// fragment’s first color output.
    #[builder(default)]
    pub alpha_to_coverage: bool,

    /// Controls whether the alpha component of the fragment’s first color output is replaced with
    /// one.
    #[builder(default)]
    pub alpha_to_one: bool,

    /// Specify a fraction of the minimum number of unique samples to process for each fragment.
    ///
    /// Sample shading is enabled when this is set.
    #[builder(default, setter(into, strip_option))]
    pub min_sample_shading: Option<OrderedFloat<f32>>,

    /// Multisampling antialias mode.
    ///
    /// The default value is `SampleCount::Type1`.
    #[builder(default)]
    pub samples: SampleCount,
}

impl MultisampleMode {
    /// One sample per pixel, no sample shading.
    pub const SINGLE_SAMPLE: Self = Self {
        alpha_to_coverage: false,
        alpha_to_one: false,
        min_sample_shading: None,
        samples: SampleCount::Type1,
    };

    /// Specifies a default multisample mode which is equal to [`MultisampleMode::SINGLE_SAMPLE`].
    #[allow(clippy::new_ret_no_self)]
    pub fn new() -> MultisampleModeBuilder {
        MultisampleModeBuilder::default()
    }
}

impl Default for MultisampleMode {
    fn default() -> Self {
        Self::SINGLE_SAMPLE
    }
}

impl From<MultisampleMode> for vk::PipelineMultisampleStateCreateInfo<'_> {
    fn from(mode: MultisampleMode) -> Self {
        #[cfg(debug_assertions)]
        if mode.min_sample_shading.is_some() && mode.samples.is_single() {
            warn!("unsupported sample rate shading of single-sample pipeline");
        }

        Self::default()
            .alpha_to_coverage_enable(mode.alpha_to_coverage)
            .alpha_to_one_enable(mode.alpha_to_one)
            .min_sample_shading(
                mode.min_sample_shading
                    .map(OrderedFloat::into_inner)
                    .unwrap_or(1.0),
            )
            .rasterization_samples(mode.samples.into())
            .sample_shading_enable(mode.min_sample_shading.is_some())
    }
}

// HACK: https://github.com/colin-kiegel/rust-derive-builder/issues/56
impl MultisampleModeBuilder {
    /// Builds a new `MultisampleMode`.
    pub fn build(self) -> MultisampleMode {
        self.fallible_build()
            .expect("All required fields set at initialization")
    }
}

/// Complete fixed-function state of a [`GraphicPipeline`] plus the external objects it is
/// compatible with.
///
/// The intrinsic state (everything except `layout`, `render_pass` and `subpass`) always holds
/// usable values. The extrinsic handles start out null and must be assigned with
/// [`PipelineStateConfig::with_layout`] and [`PipelineStateConfig::with_render_pass`].
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub struct PipelineStateConfig {
    /// The viewport transform applied to rasterized primitives.
    pub viewport: Viewport,

    /// Fragments outside of this rectangle are discarded.
    pub scissor: Scissor,

    /// Primitive topology and restart behavior.
    pub input_assembly: InputAssemblyMode,

    /// Polygon rasterization state.
    pub rasterization: RasterizationMode,

    /// Multisample state.
    pub multisample: MultisampleMode,

    /// Blend state of the single color attachment.
    pub color_blend_attachment: BlendMode,

    /// Depth bounds, stencil and depth test state.
    pub depth_stencil: DepthStencilMode,

    /// The resource binding layout; required.
    pub layout: vk::PipelineLayout,

    /// The render pass the pipeline is used with; required.
    pub render_pass: vk::RenderPass,

    /// Index of the subpass of `render_pass` the pipeline is used in.
    pub subpass: u32,
}

impl PipelineStateConfig {
    /// Returns the default pipeline state for a `width` × `height` render target.
    ///
    /// Viewport and scissor cover the full extent with a depth range of `[0, 1]`; triangle lists
    /// are filled without culling with clockwise front faces; single sample; blending disabled
    /// with all channels written; depth test and write with `LESS`; no stencil test.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            viewport: Viewport::new(width, height),
            scissor: Scissor::new(width, height),
            input_assembly: InputAssemblyMode::TRIANGLE_LIST,
            rasterization: RasterizationMode::FILL,
            multisample: MultisampleMode::SINGLE_SAMPLE,
            color_blend_attachment: BlendMode::REPLACE,
            depth_stencil: DepthStencilMode::DEPTH_WRITE,
            layout: vk::PipelineLayout::null(),
            render_pass: vk::RenderPass::null(),
            subpass: 0,
        }
    }

    /// Sets the pipeline layout handle.
    pub fn with_layout(mut self, layout: vk::PipelineLayout) -> Self {
        self.layout = layout;
        self
    }

    /// Sets the render pass handle.
    pub fn with_render_pass(mut self, render_pass: vk::RenderPass) -> Self {
        self.render_pass = render_pass;
        self
    }

    /// Sets the subpass index.
    pub fn with_subpass(mut self, subpass: u32) -> Self {
        self.subpass = subpass;
        self
    }

    /// Returns an error naming the first required handle which has not been set.
    pub fn validate(this: &Self) -> Result<(), DriverError> {
        if this.layout == vk::PipelineLayout::null() {
            warn!("pipeline layout not set");

            return Err(DriverError::UnsetPipelineReference("layout"));
        }

        if this.render_pass == vk::RenderPass::null() {
            warn!("render pass not set");

            return Err(DriverError::UnsetPipelineReference("render_pass"));
        }

        Ok(())
    }
}

/// Polygon rasterization state, see
/// [VkPipelineRasterizationStateCreateInfo](https://registry.khronos.org/vulkan/specs/1.3-extensions/man/html/VkPipelineRasterizationStateCreateInfo.html).
#[derive(Builder, Clone, Copy, Debug, Eq, Hash, PartialEq)]
#[builder(
    build_fn(private, name = "fallible_build", error = "BuilderError"),
    derive(Clone, Copy, Debug),
    pattern = "owned"
)]
pub struct RasterizationMode {
    /// Bitmask controlling triangle culling.
    ///
    /// The default value is `vk::CullModeFlags::NONE`.
    #[builder(default = "vk::CullModeFlags::NONE")]
    pub cull_mode: vk::CullModeFlags,

    /// Depth bias applied to fragments; disabled when `None`.
    #[builder(default, setter(strip_option))]
    pub depth_bias: Option<DepthBias>,

    /// Controls whether to clamp the fragment’s depth values instead of clipping primitives to the
    /// z planes of the frustum.
    #[builder(default)]
    pub depth_clamp: bool,

    /// Controls whether primitives are discarded immediately before the rasterization stage.
    #[builder(default)]
    pub discard: bool,

    /// Interpret polygon front-facing orientation.
    ///
    /// The default value is `vk::FrontFace::CLOCKWISE`.
    #[builder(default = "vk::FrontFace::CLOCKWISE")]
    pub front_face: vk::FrontFace,

    /// Width of rasterized line segments.
    #[builder(default = "OrderedFloat(1.0)", setter(into))]
    pub line_width: OrderedFloat<f32>,

    /// Control polygon rasterization mode.
    ///
    /// The default value is `vk::PolygonMode::FILL`.
    #[builder(default = "vk::PolygonMode::FILL")]
    pub polygon_mode: vk::PolygonMode,
}

impl RasterizationMode {
    /// Filled polygons, no culling, clockwise front faces and no depth bias.
    pub const FILL: Self = Self {
        cull_mode: vk::CullModeFlags::NONE,
        depth_bias: None,
        depth_clamp: false,
        discard: false,
        front_face: vk::FrontFace::CLOCKWISE,
        line_width: OrderedFloat(1.0),
        polygon_mode: vk::PolygonMode::FILL,
    };

    /// Creates a default `RasterizationModeBuilder`.
    #[allow(clippy::new_ret_no_self)]
    pub fn new() -> RasterizationModeBuilder {
        RasterizationModeBuilder::default()
    }

    /// Converts a `RasterizationMode` into a `RasterizationModeBuilder`.
    #[inline(always)]
    pub fn to_builder(self) -> RasterizationModeBuilder {
        RasterizationModeBuilder {
            cull_mode: Some(self.cull_mode),
            depth_bias: Some(self.depth_bias),
            depth_clamp: Some(self.depth_clamp),
            discard: Some(self.discard),
            front_face: Some(self.front_face),
            line_width: Some(self.line_width),
            polygon_mode: Some(self.polygon_mode),
        }
    }
}

impl Default for RasterizationMode {
    fn default() -> Self {
        Self::FILL
    }
}

impl From<RasterizationMode> for vk::PipelineRasterizationStateCreateInfo<'_> {
    fn from(mode: RasterizationMode) -> Self {
        let depth_bias = mode.depth_bias.unwrap_or_default();

        Self::default()
            .cull_mode(mode.cull_mode)
            .depth_bias_clamp(depth_bias.clamp.into_inner())
            .depth_bias_constant_factor(depth_bias.constant_factor.into_inner())
            .depth_bias_enable(mode.depth_bias.is_some())
            .depth_bias_slope_factor(depth_bias.slope_factor.into_inner())
            .depth_clamp_enable(mode.depth_clamp)
            .front_face(mode.front_face)
            .line_width(mode.line_width.into_inner())
            .polygon_mode(mode.polygon_mode)
            .rasterizer_discard_enable(mode.discard)
    }
}

// HACK: https://github.com/colin-kiegel/rust-derive-builder/issues/56
impl RasterizationModeBuilder {
    /// Builds a new `RasterizationMode`.
    pub fn build(self) -> RasterizationMode {
        self.fallible_build()
            .expect("All required fields set at initialization")
    }
}

/// Specifies sample counts supported for rasterization.
///
/// Values must not exceed the device limits specified by the physical device properties.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq)]
pub enum SampleCount {
    /// Single image sample. This is the usual mode.
    #[default]
    Type1,

    /// Multiple image samples.
    Type2,

    /// Multiple image samples.
    Type4,

    /// Multiple image samples.
    Type8,

    /// Multiple image samples.
    Type16,

    /// Multiple image samples.
    Type32,

    /// Multiple image samples.
    Type64,
}

impl SampleCount {
    /// Returns `true` when the value represents a single sample mode.
    pub fn is_single(self) -> bool {
        matches!(self, Self::Type1)
    }
}

impl From<SampleCount> for vk::SampleCountFlags {
    fn from(sample_count: SampleCount) -> Self {
        match sample_count {
            SampleCount::Type1 => Self::TYPE_1,
            SampleCount::Type2 => Self::TYPE_2,
            SampleCount::Type4 => Self::TYPE_4,
            SampleCount::Type8 => Self::TYPE_8,
            SampleCount::Type16 => Self::TYPE_16,
            SampleCount::Type32 => Self::TYPE_32,
            SampleCount::Type64 => Self::TYPE_64,
        }
    }
}

/// A rectangle of the framebuffer which fragments may be written to.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq)]
pub struct Scissor {
    /// Horizontal offset in pixels.
    pub x: i32,

    /// Vertical offset in pixels.
    pub y: i32,

    /// Extent width in pixels.
    pub width: u32,

    /// Extent height in pixels.
    pub height: u32,
}

impl Scissor {
    /// A scissor rectangle covering a full `width` × `height` extent.
    pub const fn new(width: u32, height: u32) -> Self {
        Self {
            x: 0,
            y: 0,
            width,
            height,
        }
    }
}

impl From<Scissor> for vk::Rect2D {
    fn from(scissor: Scissor) -> Self {
        Self {
            offset: vk::Offset2D {
                x: scissor.x,
                y: scissor.y,
            },
            extent: vk::Extent2D {
                width: scissor.width,
                height: scissor.height,
            },
        }
    }
}

/// Specifies stencil mode during rasterization.
///
/// See
/// [stencil test](https://registry.khronos.org/vulkan/specs/1.3-extensions/html/vkspec.html#fragops-stencil).
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub struct StencilMode {
    /// The action performed on samples that fail the stencil test.
    pub fail_op: vk::StencilOp,

    /// The action performed on samples that pass both the depth and stencil tests.
    pub pass_op: vk::StencilOp,

    /// The action performed on samples that pass the stencil test and fail the depth test.
    pub depth_fail_op: vk::StencilOp,

    /// The comparison operator used in the stencil test.
    pub compare_op: vk::CompareOp,

    /// The bits of the unsigned integer stencil values participating in the stencil test.
    pub compare_mask: u32,

    /// The bits of the unsigned integer stencil values updated by the stencil test in the stencil
    /// framebuffer attachment.
    pub write_mask: u32,

    /// An unsigned integer stencil reference value that is used in the unsigned stencil comparison.
    pub reference: u32,
}

impl StencilMode {
    /// Specifes a stencil mode which is has no effect.
    pub const IGNORE: Self = Self {
        fail_op: vk::StencilOp::KEEP,
        pass_op: vk::StencilOp::KEEP,
        depth_fail_op: vk::StencilOp::KEEP,
        compare_op: vk::CompareOp::NEVER,
        compare_mask: 0,
        write_mask: 0,
        reference: 0,
    };
}

impl Default for StencilMode {
    fn default() -> Self {
        Self::IGNORE
    }
}

impl From<StencilMode> for vk::StencilOpState {
    fn from(mode: StencilMode) -> Self {
        Self {
            fail_op: mode.fail_op,
            pass_op: mode.pass_op,
            depth_fail_op: mode.depth_fail_op,
            compare_op: mode.compare_op,
            compare_mask: mode.compare_mask,
            write_mask: mode.write_mask,
            reference: mode.reference,
        }
    }
}

/// The viewport transform of normalized device coordinates into framebuffer coordinates.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq)]
pub struct Viewport {
    /// Upper-left corner x coordinate.
    pub x: OrderedFloat<f32>,

    /// Upper-left corner y coordinate.
    pub y: OrderedFloat<f32>,

    /// Viewport width.
    pub width: OrderedFloat<f32>,

    /// Viewport height.
    pub height: OrderedFloat<f32>,

    /// Depth range minimum.
    pub min_depth: OrderedFloat<f32>,

    /// Depth range maximum.
    pub max_depth: OrderedFloat<f32>,
}

impl Viewport {
    /// A viewport covering a full `width` × `height` extent with a depth range of `[0, 1]`.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            x: OrderedFloat(0.0),
            y: OrderedFloat(0.0),
            width: OrderedFloat(width as _),
            height: OrderedFloat(height as _),
            min_depth: OrderedFloat(0.0),
            max_depth: OrderedFloat(1.0),
        }
    }
}

impl From<Viewport> for vk::Viewport {
    fn from(viewport: Viewport) -> Self {
        Self {
            x: viewport.x.into_inner(),
            y: viewport.y.into_inner(),
            width: viewport.width.into_inner(),
            height: viewport.height.into_inner(),
            min_depth: viewport.min_depth.into_inner(),
            max_depth: viewport.max_depth.into_inner(),
        }
    }
}

#[cfg(test)]
mod tests {
    use {
        super::*,
        crate::mock::{Ledger, MockDevice, Resource},
        ash::vk::Handle,
    };

    const VERT: [u8; 8] = [0x03, 0x02, 0x23, 0x07, 0x00, 0x00, 0x01, 0x00];
    const FRAG: [u8; 8] = [0x03, 0x02, 0x23, 0x07, 0x00, 0x00, 0x02, 0x00];

    fn device() -> Arc<MockDevice> {
        Arc::new(MockDevice::new(Ledger::default()))
    }

    fn config() -> PipelineStateConfig {
        create_default_config(800, 600)
            .with_layout(vk::PipelineLayout::from_raw(0xa))
            .with_render_pass(vk::RenderPass::from_raw(0xb))
    }

    #[test]
    pub fn default_config_extent() {
        for (width, height) in [(1, 1), (800, 600), (1920, 1080), (4096, 16)] {
            let config = create_default_config(width, height);

            assert_eq!(config.viewport.width, OrderedFloat(width as f32));
            assert_eq!(config.viewport.height, OrderedFloat(height as f32));
            assert_eq!(config.viewport.min_depth, OrderedFloat(0.0));
            assert_eq!(config.viewport.max_depth, OrderedFloat(1.0));
            assert_eq!(config.scissor, Scissor::new(width, height));
            assert_eq!((config.scissor.x, config.scissor.y), (0, 0));
        }
    }

    #[test]
    pub fn default_config_state() {
        let config = create_default_config(800, 600);

        assert_eq!(
            config.input_assembly.topology,
            vk::PrimitiveTopology::TRIANGLE_LIST
        );
        assert!(!config.input_assembly.primitive_restart);
        assert_eq!(config.rasterization.polygon_mode, vk::PolygonMode::FILL);
        assert_eq!(config.rasterization.cull_mode, vk::CullModeFlags::NONE);
        assert_eq!(config.rasterization.front_face, vk::FrontFace::CLOCKWISE);
        assert_eq!(config.rasterization.depth_bias, None);
        assert!(config.multisample.samples.is_single());
        assert_eq!(config.multisample.min_sample_shading, None);
        assert!(!config.color_blend_attachment.blend_enable);
        assert_eq!(
            config.color_blend_attachment.color_write_mask,
            RGBA_COLOR_COMPONENTS
        );
        assert_eq!(
            config.color_blend_attachment.src_color_blend_factor,
            vk::BlendFactor::ONE
        );
        assert_eq!(
            config.color_blend_attachment.dst_alpha_blend_factor,
            vk::BlendFactor::ZERO
        );
        assert!(config.depth_stencil.depth_test);
        assert!(config.depth_stencil.depth_write);
        assert_eq!(config.depth_stencil.compare_op, vk::CompareOp::LESS);
        assert!(!config.depth_stencil.bounds_test);
        assert_eq!(
            (config.depth_stencil.min, config.depth_stencil.max),
            (OrderedFloat(0.0), OrderedFloat(1.0))
        );
        assert!(!config.depth_stencil.stencil_test);
        assert_eq!(config.layout, vk::PipelineLayout::null());
        assert_eq!(config.render_pass, vk::RenderPass::null());
        assert_eq!(config.subpass, 0);
    }

    #[test]
    pub fn builders_match_defaults() {
        assert_eq!(BlendMode::new().build(), BlendMode::default());
        assert_eq!(DepthStencilMode::new().build(), DepthStencilMode::default());
        assert_eq!(MultisampleMode::new().build(), MultisampleMode::default());
        assert_eq!(
            RasterizationMode::new().build(),
            RasterizationMode::default()
        );
    }

    #[test]
    pub fn rasterization_mode_to_builder() {
        let mode = RasterizationMode::new()
            .cull_mode(vk::CullModeFlags::BACK)
            .depth_bias(DepthBias {
                constant_factor: OrderedFloat(1.25),
                ..Default::default()
            })
            .line_width(2.0f32)
            .build();

        assert_eq!(mode, mode.to_builder().build());

        let info = vk::PipelineRasterizationStateCreateInfo::from(mode);

        assert_eq!(info.depth_bias_enable, vk::TRUE);
        assert_eq!(info.depth_bias_constant_factor, 1.25);
        assert_eq!(info.line_width, 2.0);
    }

    #[test]
    pub fn multisample_mode_sample_shading() {
        let mode = MultisampleMode::new()
            .samples(SampleCount::Type4)
            .min_sample_shading(0.5f32)
            .build();
        let info = vk::PipelineMultisampleStateCreateInfo::from(mode);

        assert_eq!(info.sample_shading_enable, vk::TRUE);
        assert_eq!(info.min_sample_shading, 0.5);
        assert_eq!(info.rasterization_samples, vk::SampleCountFlags::TYPE_4);
    }

    #[test]
    pub fn config_is_comparable() {
        let config = config();
        let copy = config;

        assert_eq!(config, copy);
        assert_ne!(config, copy.with_subpass(1));
    }

    #[test]
    pub fn graphic_pipeline_create() {
        let device = device();
        let pipeline = GraphicPipeline::create(&device, config(), &VERT, &FRAG).unwrap();
        let vertex = GraphicPipeline::shader_module(&pipeline, ShaderStage::Vertex);
        let fragment = GraphicPipeline::shader_module(&pipeline, ShaderStage::Fragment);

        assert_ne!(*pipeline, vk::Pipeline::null());
        assert!(vertex.is_some());
        assert!(fragment.is_some());

        let records = device.pipeline_records();
        let record = &records[0];

        assert_eq!(records.len(), 1);
        assert_eq!(
            record.stages,
            vec![
                (vk::ShaderStageFlags::VERTEX, "main".to_owned()),
                (vk::ShaderStageFlags::FRAGMENT, "main".to_owned())
            ]
        );
        assert_eq!(record.vertex_binding_count, 0);
        assert_eq!(record.vertex_attribute_count, 0);
        assert_eq!(record.viewports, vec![[0.0, 0.0, 800.0, 600.0, 0.0, 1.0]]);
        assert_eq!(record.scissors, vec![(0, 0, 800, 600)]);
        assert!(!record.logic_op_enable);
        assert_eq!(record.logic_op, vk::LogicOp::COPY);
        assert_eq!(record.color_attachment_count, 1);
        assert_eq!(record.blend_constants, [0.0; 4]);
        assert!(!record.has_dynamic_state);
        assert_eq!(record.base_pipeline_index, -1);
        assert_eq!(record.base_pipeline_handle, vk::Pipeline::null());
        assert_eq!(record.layout.as_raw(), 0xa);
        assert_eq!(record.render_pass.as_raw(), 0xb);
        assert_eq!(record.subpass, 0);
    }

    #[test]
    pub fn graphic_pipeline_unset_layout() {
        let device = device();
        let config = create_default_config(800, 600).with_render_pass(vk::RenderPass::from_raw(1));
        let err = GraphicPipeline::create(&device, config, &VERT, &FRAG).unwrap_err();

        assert_eq!(err, DriverError::UnsetPipelineReference("layout"));
        assert_eq!(device.ledger().created(Resource::ShaderModule), 0);
        assert_eq!(device.ledger().created(Resource::GraphicPipeline), 0);
    }

    #[test]
    pub fn graphic_pipeline_unset_render_pass() {
        let device = device();
        let config = create_default_config(800, 600).with_layout(vk::PipelineLayout::from_raw(1));
        let err = GraphicPipeline::create(&device, config, &VERT, &FRAG).unwrap_err();

        assert_eq!(err, DriverError::UnsetPipelineReference("render_pass"));
        assert_eq!(device.ledger().created(Resource::ShaderModule), 0);
        assert_eq!(device.ledger().created(Resource::GraphicPipeline), 0);
    }

    #[test]
    pub fn graphic_pipeline_empty_fragment_releases_vertex() {
        let device = device();
        let err = GraphicPipeline::create(&device, config(), &VERT, &[]).unwrap_err();

        assert_eq!(err, DriverError::InvalidShaderCode { len: 0 });
        assert_eq!(device.ledger().created(Resource::ShaderModule), 1);
        assert_eq!(device.ledger().live(Resource::ShaderModule), 0);
        assert_eq!(device.ledger().created(Resource::GraphicPipeline), 0);
    }

    #[test]
    pub fn graphic_pipeline_rejected_releases_modules() {
        let device = device();
        device.fail_graphic_pipelines(vk::Result::ERROR_INITIALIZATION_FAILED);

        let err = GraphicPipeline::create(&device, config(), &VERT, &FRAG).unwrap_err();

        assert_eq!(
            err,
            DriverError::GraphicPipelineCreation(vk::Result::ERROR_INITIALIZATION_FAILED)
        );
        assert_eq!(device.ledger().created(Resource::ShaderModule), 2);
        assert_eq!(device.ledger().live(Resource::ShaderModule), 0);
        assert_eq!(device.ledger().live(Resource::GraphicPipeline), 0);
    }

    #[test]
    pub fn graphic_pipeline_drop_order() {
        let device = device();
        let pipeline = GraphicPipeline::create(&device, config(), &VERT, &FRAG).unwrap();
        let vertex = GraphicPipeline::shader_module(&pipeline, ShaderStage::Vertex).unwrap();
        let fragment = GraphicPipeline::shader_module(&pipeline, ShaderStage::Fragment).unwrap();
        let handle = *pipeline;

        drop(pipeline);

        let ledger = device.ledger();

        assert_eq!(
            ledger.destroyed(),
            vec![
                (Resource::GraphicPipeline, handle.as_raw()),
                (Resource::ShaderModule, fragment.as_raw()),
                (Resource::ShaderModule, vertex.as_raw()),
            ]
        );
        assert_eq!(
            ledger.destroy_count(Resource::GraphicPipeline, handle.as_raw()),
            1
        );
    }

    #[test]
    pub fn graphic_pipeline_with_name() {
        let device = device();
        let pipeline = GraphicPipeline::create(&device, config(), &VERT, &FRAG).unwrap();
        let pipeline = GraphicPipeline::with_name(pipeline, "triangle");

        assert_eq!(pipeline.name.as_deref(), Some("triangle"));
    }
}
