//! Recording stand-ins for the window, device and swapchain.
//!
//! Every mock shares one [`Ledger`] which records each create, destroy and draw in call order, so
//! tests can check lifetimes and teardown order without a GPU.

use {
    crate::{
        app::{AppError, Platform},
        config::AppConfig,
        driver::{DeviceApi, DriverError, RenderTarget},
        window::Window,
    },
    ash::{
        prelude::VkResult,
        vk::{self, Handle},
    },
    parking_lot::Mutex,
    std::{
        collections::HashMap,
        ffi::{c_char, CStr},
        io,
        path::{Path, PathBuf},
        slice,
        sync::Arc,
    },
};

/// The kinds of object tracked by a [`Ledger`].
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum Resource {
    Window,
    Device,
    RenderTarget,
    PipelineLayout,
    ShaderModule,
    GraphicPipeline,
}

/// A single recorded call.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum LedgerEntry {
    Create(Resource, u64),
    Destroy(Resource, u64),
    Draw(u64),
    WaitIdle,
}

impl LedgerEntry {
    fn is_create(&self, resource: Resource) -> bool {
        matches!(self, Self::Create(res, _) if *res == resource)
    }

    fn is_destroy(&self, resource: Resource) -> bool {
        matches!(self, Self::Destroy(res, _) if *res == resource)
    }
}

#[derive(Debug, Default)]
struct LedgerState {
    entries: Vec<LedgerEntry>,
    next_handle: u64,
}

/// Shared, ordered record of every call made on the mocks.
#[derive(Clone, Debug, Default)]
pub struct Ledger(Arc<Mutex<LedgerState>>);

impl Ledger {
    /// Every entry in call order.
    pub fn entries(&self) -> Vec<LedgerEntry> {
        self.0.lock().entries.clone()
    }

    /// Number of objects of the given kind which have ever been created.
    pub fn created(&self, resource: Resource) -> usize {
        self.count(|entry| entry.is_create(resource))
    }

    /// Objects of the given kind in creation order.
    pub fn created_order(&self) -> Vec<(Resource, u64)> {
        self.collect(|entry| match entry {
            LedgerEntry::Create(resource, raw) => Some((resource, raw)),
            _ => None,
        })
    }

    /// Number of times the given object has been destroyed.
    pub fn destroy_count(&self, resource: Resource, raw: u64) -> usize {
        self.count(|entry| *entry == LedgerEntry::Destroy(resource, raw))
    }

    /// Destroyed objects in destruction order.
    pub fn destroyed(&self) -> Vec<(Resource, u64)> {
        self.collect(|entry| match entry {
            LedgerEntry::Destroy(resource, raw) => Some((resource, raw)),
            _ => None,
        })
    }

    /// Number of draws recorded by render targets.
    pub fn draws(&self) -> usize {
        self.count(|entry| matches!(entry, LedgerEntry::Draw(_)))
    }

    /// Number of objects of the given kind which have been created but not yet destroyed.
    pub fn live(&self, resource: Resource) -> usize {
        let destroyed = self.count(|entry| entry.is_destroy(resource));

        self.created(resource) - destroyed
    }

    /// Appends an entry.
    pub fn record(&self, entry: LedgerEntry) {
        self.0.lock().entries.push(entry);
    }

    fn collect<T>(&self, f: impl Fn(LedgerEntry) -> Option<T>) -> Vec<T> {
        let state = self.0.lock();

        state.entries.iter().copied().filter_map(f).collect()
    }

    fn count(&self, f: impl Fn(&LedgerEntry) -> bool) -> usize {
        let state = self.0.lock();

        state.entries.iter().filter(|entry| f(entry)).count()
    }

    /// Records the creation of a new object and returns its unique, non-zero raw handle.
    fn create(&self, resource: Resource) -> u64 {
        let mut state = self.0.lock();
        state.next_handle += 1;

        let raw = state.next_handle;
        state.entries.push(LedgerEntry::Create(resource, raw));

        raw
    }
}

/// The parts of a graphics pipeline create info which tests inspect.
#[derive(Clone, Debug, PartialEq)]
pub struct PipelineRecord {
    pub stages: Vec<(vk::ShaderStageFlags, String)>,
    pub vertex_binding_count: u32,
    pub vertex_attribute_count: u32,
    pub topology: vk::PrimitiveTopology,
    pub viewports: Vec<[f32; 6]>,
    pub scissors: Vec<(i32, i32, u32, u32)>,
    pub polygon_mode: vk::PolygonMode,
    pub cull_mode: vk::CullModeFlags,
    pub front_face: vk::FrontFace,
    pub samples: vk::SampleCountFlags,
    pub depth_test: bool,
    pub depth_write: bool,
    pub depth_compare_op: vk::CompareOp,
    pub logic_op_enable: bool,
    pub logic_op: vk::LogicOp,
    pub color_attachment_count: u32,
    pub blend_enable: bool,
    pub color_write_mask: vk::ColorComponentFlags,
    pub blend_constants: [f32; 4],
    pub has_dynamic_state: bool,
    pub layout: vk::PipelineLayout,
    pub render_pass: vk::RenderPass,
    pub subpass: u32,
    pub base_pipeline_handle: vk::Pipeline,
    pub base_pipeline_index: i32,
}

impl PipelineRecord {
    /// # Safety
    ///
    /// Every pointer in `info` must be null or valid for its declared count.
    unsafe fn read(info: &vk::GraphicsPipelineCreateInfo<'_>) -> Self {
        let stages = raw_slice(info.p_stages, info.stage_count)
            .iter()
            .map(|stage| (stage.stage, raw_name(stage.p_name)))
            .collect();
        let vertex_input = read_or_default(info.p_vertex_input_state);
        let input_assembly = read_or_default(info.p_input_assembly_state);
        let viewport_state = read_or_default(info.p_viewport_state);
        let rasterization = read_or_default(info.p_rasterization_state);
        let multisample = read_or_default(info.p_multisample_state);
        let depth_stencil = read_or_default(info.p_depth_stencil_state);
        let color_blend = read_or_default(info.p_color_blend_state);
        let attachments = raw_slice(color_blend.p_attachments, color_blend.attachment_count);
        let attachment = attachments.first().copied().unwrap_or_default();
        let viewports = raw_slice(viewport_state.p_viewports, viewport_state.viewport_count);
        let scissors = raw_slice(viewport_state.p_scissors, viewport_state.scissor_count);

        Self {
            stages,
            vertex_binding_count: vertex_input.vertex_binding_description_count,
            vertex_attribute_count: vertex_input.vertex_attribute_description_count,
            topology: input_assembly.topology,
            viewports: viewports.iter().map(viewport_values).collect(),
            scissors: scissors.iter().map(scissor_values).collect(),
            polygon_mode: rasterization.polygon_mode,
            cull_mode: rasterization.cull_mode,
            front_face: rasterization.front_face,
            samples: multisample.rasterization_samples,
            depth_test: depth_stencil.depth_test_enable == vk::TRUE,
            depth_write: depth_stencil.depth_write_enable == vk::TRUE,
            depth_compare_op: depth_stencil.depth_compare_op,
            logic_op_enable: color_blend.logic_op_enable == vk::TRUE,
            logic_op: color_blend.logic_op,
            color_attachment_count: color_blend.attachment_count,
            blend_enable: attachment.blend_enable == vk::TRUE,
            color_write_mask: attachment.color_write_mask,
            blend_constants: color_blend.blend_constants,
            has_dynamic_state: !info.p_dynamic_state.is_null(),
            layout: info.layout,
            render_pass: info.render_pass,
            subpass: info.subpass,
            base_pipeline_handle: info.base_pipeline_handle,
            base_pipeline_index: info.base_pipeline_index,
        }
    }
}

unsafe fn raw_name(ptr: *const c_char) -> String {
    if ptr.is_null() {
        String::new()
    } else {
        CStr::from_ptr(ptr).to_string_lossy().into_owned()
    }
}

unsafe fn raw_slice<'a, T>(ptr: *const T, len: u32) -> &'a [T] {
    if ptr.is_null() || len == 0 {
        &[]
    } else {
        slice::from_raw_parts(ptr, len as usize)
    }
}

unsafe fn read_or_default<T>(ptr: *const T) -> T
where
    T: Copy + Default,
{
    ptr.as_ref().copied().unwrap_or_default()
}

fn scissor_values(scissor: &vk::Rect2D) -> (i32, i32, u32, u32) {
    (
        scissor.offset.x,
        scissor.offset.y,
        scissor.extent.width,
        scissor.extent.height,
    )
}

fn viewport_values(viewport: &vk::Viewport) -> [f32; 6] {
    [
        viewport.x,
        viewport.y,
        viewport.width,
        viewport.height,
        viewport.min_depth,
        viewport.max_depth,
    ]
}

#[derive(Debug, Default)]
struct MockDeviceState {
    fail_graphic_pipelines: Option<vk::Result>,
    fail_pipeline_layouts: Option<vk::Result>,
    fail_shader_modules: Option<vk::Result>,
    layout_shapes: Vec<(usize, usize)>,
    pipeline_records: Vec<PipelineRecord>,
    shader_words: Vec<Vec<u32>>,
}

/// A device which hands out unique handles and records every call in its [`Ledger`].
#[derive(Debug)]
pub struct MockDevice {
    ledger: Ledger,
    raw: u64,
    state: Mutex<MockDeviceState>,
}

impl MockDevice {
    pub fn new(ledger: Ledger) -> Self {
        let raw = ledger.create(Resource::Device);

        Self {
            ledger,
            raw,
            state: Default::default(),
        }
    }

    /// Makes every following graphics pipeline creation fail with `err`.
    pub fn fail_graphic_pipelines(&self, err: vk::Result) {
        self.state.lock().fail_graphic_pipelines = Some(err);
    }

    /// Makes every following pipeline layout creation fail with `err`.
    pub fn fail_pipeline_layouts(&self, err: vk::Result) {
        self.state.lock().fail_pipeline_layouts = Some(err);
    }

    /// Makes every following shader module creation fail with `err`.
    pub fn fail_shader_modules(&self, err: vk::Result) {
        self.state.lock().fail_shader_modules = Some(err);
    }

    /// Set layout and push constant range counts of each pipeline layout creation.
    pub fn layout_shapes(&self) -> Vec<(usize, usize)> {
        self.state.lock().layout_shapes.clone()
    }

    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    /// One record per successful graphics pipeline creation.
    pub fn pipeline_records(&self) -> Vec<PipelineRecord> {
        self.state.lock().pipeline_records.clone()
    }

    /// The code words passed to each shader module creation.
    pub fn shader_words(&self) -> Vec<Vec<u32>> {
        self.state.lock().shader_words.clone()
    }
}

impl DeviceApi for MockDevice {
    unsafe fn create_shader_module(
        &self,
        info: &vk::ShaderModuleCreateInfo<'_>,
    ) -> VkResult<vk::ShaderModule> {
        let mut state = self.state.lock();

        if let Some(err) = state.fail_shader_modules {
            return Err(err);
        }

        let len = info.code_size / 4;
        let words = raw_slice(info.p_code, len as u32).to_vec();
        state.shader_words.push(words);

        let raw = self.ledger.create(Resource::ShaderModule);

        Ok(vk::ShaderModule::from_raw(raw))
    }

    unsafe fn destroy_shader_module(&self, shader_module: vk::ShaderModule) {
        let entry = LedgerEntry::Destroy(Resource::ShaderModule, shader_module.as_raw());

        self.ledger.record(entry);
    }

    unsafe fn create_pipeline_layout(
        &self,
        info: &vk::PipelineLayoutCreateInfo<'_>,
    ) -> VkResult<vk::PipelineLayout> {
        let mut state = self.state.lock();

        if let Some(err) = state.fail_pipeline_layouts {
            return Err(err);
        }

        let set_layouts = info.set_layout_count as usize;
        let push_constants = info.push_constant_range_count as usize;
        state.layout_shapes.push((set_layouts, push_constants));

        let raw = self.ledger.create(Resource::PipelineLayout);

        Ok(vk::PipelineLayout::from_raw(raw))
    }

    unsafe fn destroy_pipeline_layout(&self, layout: vk::PipelineLayout) {
        let entry = LedgerEntry::Destroy(Resource::PipelineLayout, layout.as_raw());

        self.ledger.record(entry);
    }

    unsafe fn create_graphic_pipeline(
        &self,
        info: &vk::GraphicsPipelineCreateInfo<'_>,
    ) -> VkResult<vk::Pipeline> {
        let mut state = self.state.lock();

        if let Some(err) = state.fail_graphic_pipelines {
            return Err(err);
        }

        state.pipeline_records.push(PipelineRecord::read(info));

        let raw = self.ledger.create(Resource::GraphicPipeline);

        Ok(vk::Pipeline::from_raw(raw))
    }

    unsafe fn destroy_pipeline(&self, pipeline: vk::Pipeline) {
        let entry = LedgerEntry::Destroy(Resource::GraphicPipeline, pipeline.as_raw());

        self.ledger.record(entry);
    }

    fn wait_idle(&self) {
        self.ledger.record(LedgerEntry::WaitIdle);
    }
}

impl Drop for MockDevice {
    fn drop(&mut self) {
        let entry = LedgerEntry::Destroy(Resource::Device, self.raw);

        self.ledger.record(entry);
    }
}

/// A window which requests close after a fixed number of event polls.
#[derive(Debug)]
pub struct MockWindow {
    close_after_polls: usize,
    ledger: Ledger,
    polls: usize,
    raw: u64,
}

impl MockWindow {
    /// With `close_after_polls` of zero the window is closed before the first poll.
    pub fn new(ledger: Ledger, close_after_polls: usize) -> Self {
        let raw = ledger.create(Resource::Window);

        Self {
            close_after_polls,
            ledger,
            polls: 0,
            raw,
        }
    }
}

impl Window for MockWindow {
    fn poll_events(&mut self) {
        self.polls += 1;
    }

    fn should_close(&self) -> bool {
        self.polls >= self.close_after_polls
    }
}

impl Drop for MockWindow {
    fn drop(&mut self) {
        let entry = LedgerEntry::Destroy(Resource::Window, self.raw);

        self.ledger.record(entry);
    }
}

/// A fixed-size render target which records draws instead of presenting.
#[derive(Debug)]
pub struct MockRenderTarget {
    draws: usize,
    fail_draw: Option<(usize, DriverError)>,
    height: u32,
    ledger: Ledger,
    raw: u64,
    width: u32,
}

impl MockRenderTarget {
    pub fn new(ledger: Ledger, width: u32, height: u32) -> Self {
        let raw = ledger.create(Resource::RenderTarget);

        Self {
            draws: 0,
            fail_draw: None,
            height,
            ledger,
            raw,
            width,
        }
    }

    /// Makes every draw after the first `draws` successful ones fail with `err`.
    pub fn fail_draw_after(mut self, draws: usize, err: DriverError) -> Self {
        self.fail_draw = Some((draws, err));
        self
    }
}

impl RenderTarget for MockRenderTarget {
    fn draw(&mut self, pipeline: vk::Pipeline) -> Result<(), DriverError> {
        if let Some((draws, err)) = self.fail_draw {
            if self.draws >= draws {
                return Err(err);
            }
        }

        self.draws += 1;
        self.ledger.record(LedgerEntry::Draw(pipeline.as_raw()));

        Ok(())
    }

    fn height(&self) -> u32 {
        self.height
    }

    fn render_pass(&self) -> vk::RenderPass {
        // The render pass lives and dies with the target
        vk::RenderPass::from_raw(self.raw)
    }

    fn width(&self) -> u32 {
        self.width
    }
}

impl Drop for MockRenderTarget {
    fn drop(&mut self) {
        let entry = LedgerEntry::Destroy(Resource::RenderTarget, self.raw);

        self.ledger.record(entry);
    }
}

/// Builds mock windows, devices and render targets which share one [`Ledger`].
///
/// Shader binaries are served from memory; any path which was not added reads as not found.
#[derive(Debug, Default)]
pub struct MockPlatform {
    close_after_polls: usize,
    fail_draw: Option<(usize, DriverError)>,
    fail_graphic_pipelines: Option<vk::Result>,
    fail_pipeline_layouts: Option<vk::Result>,
    fail_render_target: Option<DriverError>,
    ledger: Ledger,
    shaders: HashMap<PathBuf, Vec<u8>>,
}

impl MockPlatform {
    pub fn new(ledger: Ledger) -> Self {
        Self {
            close_after_polls: 1,
            ledger,
            ..Default::default()
        }
    }

    /// Number of event polls before the window requests close.
    pub fn close_after_polls(mut self, polls: usize) -> Self {
        self.close_after_polls = polls;
        self
    }

    /// Render targets draw `draws` frames successfully and then fail every draw with `err`.
    pub fn fail_draw_after(mut self, draws: usize, err: DriverError) -> Self {
        self.fail_draw = Some((draws, err));
        self
    }

    pub fn fail_graphic_pipelines(mut self, err: vk::Result) -> Self {
        self.fail_graphic_pipelines = Some(err);
        self
    }

    pub fn fail_pipeline_layouts(mut self, err: vk::Result) -> Self {
        self.fail_pipeline_layouts = Some(err);
        self
    }

    pub fn fail_render_target(mut self, err: DriverError) -> Self {
        self.fail_render_target = Some(err);
        self
    }

    /// Serves `code` for reads of `path`.
    pub fn with_shader(mut self, path: impl Into<PathBuf>, code: impl Into<Vec<u8>>) -> Self {
        self.shaders.insert(path.into(), code.into());
        self
    }
}

impl Platform for MockPlatform {
    type Device = MockDevice;
    type RenderTarget = MockRenderTarget;
    type Window = MockWindow;

    fn create_window(&mut self, _config: &AppConfig) -> Result<Self::Window, AppError> {
        let ledger = self.ledger.clone();

        Ok(MockWindow::new(ledger, self.close_after_polls))
    }

    fn create_device(
        &mut self,
        _config: &AppConfig,
        _window: &Self::Window,
    ) -> Result<Arc<Self::Device>, AppError> {
        let device = MockDevice::new(self.ledger.clone());

        if let Some(err) = self.fail_graphic_pipelines {
            device.fail_graphic_pipelines(err);
        }

        if let Some(err) = self.fail_pipeline_layouts {
            device.fail_pipeline_layouts(err);
        }

        Ok(Arc::new(device))
    }

    fn create_render_target(
        &mut self,
        config: &AppConfig,
        _device: &Arc<Self::Device>,
        _window: &Self::Window,
    ) -> Result<Self::RenderTarget, AppError> {
        if let Some(err) = self.fail_render_target {
            return Err(AppError::Driver(err));
        }

        let ledger = self.ledger.clone();
        let (width, height) = (config.window.width, config.window.height);
        let mut render_target = MockRenderTarget::new(ledger, width, height);

        if let Some((draws, err)) = self.fail_draw {
            render_target = render_target.fail_draw_after(draws, err);
        }

        Ok(render_target)
    }

    fn read_shader(&mut self, path: &Path) -> Result<Vec<u8>, AppError> {
        match self.shaders.get(path) {
            Some(code) => Ok(code.clone()),
            None => Err(AppError::ShaderBinaryRead {
                path: path.to_owned(),
                err: io::ErrorKind::NotFound.into(),
            }),
        }
    }
}
