//! Application lifecycle: ordered resource acquisition, the frame loop and teardown.

use {
    crate::{
        config::AppConfig,
        driver::{
            create_default_config, Device, DeviceApi, DeviceInfo, DriverError, GraphicPipeline,
            PipelineLayout, PipelineLayoutInfo, RenderTarget, Swapchain, SwapchainInfo,
        },
        window::{Window, WindowError, WinitWindow},
    },
    log::{debug, info, trace, warn},
    std::{
        error::Error,
        fmt::{Display, Formatter},
        fs::read,
        io::Error as IoError,
        path::{Path, PathBuf},
        sync::Arc,
        thread::panicking,
    },
};

/// Source of the window, device and render target an [`App`] runs on.
pub trait Platform {
    /// The device pipelines are created on.
    type Device: DeviceApi;

    /// The target frames are drawn into.
    type RenderTarget: RenderTarget;

    /// The window whose events drive the frame loop.
    type Window: Window;

    fn create_window(&mut self, config: &AppConfig) -> Result<Self::Window, AppError>;

    fn create_device(
        &mut self,
        config: &AppConfig,
        window: &Self::Window,
    ) -> Result<Arc<Self::Device>, AppError>;

    fn create_render_target(
        &mut self,
        config: &AppConfig,
        device: &Arc<Self::Device>,
        window: &Self::Window,
    ) -> Result<Self::RenderTarget, AppError>;

    /// Reads a compiled shader binary.
    ///
    /// The default implementation reads the file at `path`.
    fn read_shader(&mut self, path: &Path) -> Result<Vec<u8>, AppError> {
        trace!("read_shader {}", path.display());

        read(path).map_err(|err| {
            warn!("unable to read {}: {err}", path.display());

            AppError::ShaderBinaryRead {
                path: path.to_owned(),
                err,
            }
        })
    }
}

/// A `winit` window presenting through a Vulkan swapchain.
#[derive(Debug, Default)]
pub struct VulkanPlatform;

impl Platform for VulkanPlatform {
    type Device = Device;
    type RenderTarget = Swapchain;
    type Window = WinitWindow;

    fn create_window(&mut self, config: &AppConfig) -> Result<Self::Window, AppError> {
        Ok(WinitWindow::new(
            config.window.width,
            config.window.height,
            config.window.title.as_str(),
        )?)
    }

    fn create_device(
        &mut self,
        config: &AppConfig,
        window: &Self::Window,
    ) -> Result<Arc<Self::Device>, AppError> {
        let info = DeviceInfo::new().debug(config.driver.debug);

        Ok(Arc::new(Device::create(window, info)?))
    }

    fn create_render_target(
        &mut self,
        config: &AppConfig,
        device: &Arc<Self::Device>,
        window: &Self::Window,
    ) -> Result<Self::RenderTarget, AppError> {
        let (width, height) = window.inner_size();
        let info = SwapchainInfo::new(width, height)
            .desired_image_count(config.driver.desired_image_count);
        let swapchain = Swapchain::create(device, info)?;

        debug!("{} swapchain images", Swapchain::image_count(&swapchain));

        Ok(swapchain)
    }
}

/// The lifecycle stage of an [`App`].
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum AppState {
    /// Nothing has been acquired yet.
    Uninitialized,

    /// Every resource is live and no frame has been drawn.
    Initialized,

    /// The frame loop is executing.
    Running,

    /// Resources are being released.
    ShuttingDown,

    /// Every resource has been released.
    Terminated,
}

/// Owns the window, device, render target, pipeline layout and graphic pipeline.
///
/// Resources are acquired in that order by [`App::initialize`] and always released in exactly the
/// reverse order: after the frame loop ends, when acquisition fails part way, or when the `App`
/// is dropped.
pub struct App<P>
where
    P: Platform,
{
    config: AppConfig,
    frame_count: usize,
    platform: P,
    state: AppState,

    // Acquisition order
    window: Option<P::Window>,
    device: Option<Arc<P::Device>>,
    render_target: Option<P::RenderTarget>,
    layout: Option<PipelineLayout<P::Device>>,
    pipeline: Option<GraphicPipeline<P::Device>>,
}

impl<P> App<P>
where
    P: Platform,
{
    pub fn new(platform: P, config: AppConfig) -> Self {
        Self {
            config,
            frame_count: 0,
            platform,
            state: AppState::Uninitialized,
            window: None,
            device: None,
            render_target: None,
            layout: None,
            pipeline: None,
        }
    }

    /// Settings this application was created with.
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// The number of frames drawn so far.
    pub fn frame_count(&self) -> usize {
        self.frame_count
    }

    /// Acquires every resource, in order.
    ///
    /// On failure everything acquired so far is released before the error is returned and the
    /// application is left terminated.
    #[profiling::function]
    pub fn initialize(&mut self) -> Result<(), AppError> {
        match self.state {
            AppState::Uninitialized => (),
            AppState::Terminated => {
                warn!("already terminated");

                return Err(AppError::Terminated);
            }
            _ => {
                warn!("already initialized");

                return Ok(());
            }
        }

        if let Err(err) = self.acquire() {
            warn!("initialization failed: {err}");

            self.teardown();

            return Err(err);
        }

        self.state = AppState::Initialized;

        info!("Initialized");

        Ok(())
    }

    fn acquire(&mut self) -> Result<(), AppError> {
        let window = self.platform.create_window(&self.config)?;
        let window = self.window.insert(window);
        let device = self.platform.create_device(&self.config, window)?;
        let device = self.device.insert(device);
        let render_target = self
            .platform
            .create_render_target(&self.config, device, window)?;
        let render_target = self.render_target.insert(render_target);
        let layout = PipelineLayout::create(device, PipelineLayoutInfo::default())?;
        let layout = self.layout.insert(layout);

        let vertex_code = self.platform.read_shader(&self.config.shaders.vertex)?;
        let fragment_code = self.platform.read_shader(&self.config.shaders.fragment)?;
        let config = create_default_config(render_target.width(), render_target.height())
            .with_layout(**layout)
            .with_render_pass(render_target.render_pass());
        let pipeline = GraphicPipeline::create(device, config, &vertex_code, &fragment_code)?;

        self.pipeline = Some(GraphicPipeline::with_name(pipeline, "triangle"));

        Ok(())
    }

    /// Initializes if needed, then draws one frame per window event poll until the window asks
    /// to close.
    ///
    /// All resources are released before this function returns, whether or not it succeeds. An
    /// application which has already terminated returns [`AppError::Terminated`].
    #[profiling::function]
    pub fn run(&mut self) -> Result<(), AppError> {
        self.initialize()?;

        if self.state != AppState::Initialized {
            return Ok(());
        }

        self.state = AppState::Running;

        info!("Running");

        let res = self.frame_loop();

        if let Err(err) = &res {
            warn!("frame loop failed: {err}");
        }

        info!("Exiting after {} frames", self.frame_count);

        self.teardown();

        res
    }

    fn frame_loop(&mut self) -> Result<(), AppError> {
        let (Some(window), Some(render_target), Some(pipeline)) = (
            self.window.as_mut(),
            self.render_target.as_mut(),
            self.pipeline.as_ref(),
        ) else {
            return Err(DriverError::InvalidData.into());
        };

        while !window.should_close() {
            window.poll_events();

            if window.should_close() {
                break;
            }

            render_target.draw(**pipeline)?;
            self.frame_count += 1;

            profiling::finish_frame!();
        }

        Ok(())
    }

    /// The current lifecycle stage.
    pub fn state(&self) -> AppState {
        self.state
    }

    /// Releases every live resource in reverse acquisition order.
    ///
    /// Waits for the device to finish all work first. Safe to call more than once.
    #[profiling::function]
    pub fn teardown(&mut self) {
        if self.state == AppState::Terminated {
            return;
        }

        trace!("teardown");

        self.state = AppState::ShuttingDown;

        if let Some(device) = &self.device {
            device.wait_idle();
        }

        self.pipeline = None;
        self.layout = None;
        self.render_target = None;

        if let Some(device) = self.device.take() {
            debug_assert_eq!(
                Arc::strong_count(&device),
                1,
                "device must be released last"
            );

            drop(device);
        }

        self.window = None;
        self.state = AppState::Terminated;

        info!("Terminated");
    }
}

impl<P> Drop for App<P>
where
    P: Platform,
{
    fn drop(&mut self) {
        if panicking() {
            return;
        }

        self.teardown();
    }
}

/// Describes failures to start or run an [`App`].
#[derive(Debug)]
pub enum AppError {
    /// A device, render target or pipeline operation failed.
    Driver(DriverError),

    /// A shader binary could not be read.
    ShaderBinaryRead {
        /// The file which was read.
        path: PathBuf,

        /// The underlying error.
        err: IoError,
    },

    /// The application was torn down and cannot be started again.
    Terminated,

    /// The window could not be opened.
    Window(WindowError),
}

impl Display for AppError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Driver(err) => err.fmt(f),
            Self::ShaderBinaryRead { path, err } => {
                write!(f, "unable to read shader {}: {err}", path.display())
            }
            Self::Terminated => write!(f, "application already terminated"),
            Self::Window(err) => err.fmt(f),
        }
    }
}

impl Error for AppError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Driver(err) => Some(err),
            Self::ShaderBinaryRead { err, .. } => Some(err),
            Self::Terminated => None,
            Self::Window(err) => Some(err),
        }
    }
}

impl From<DriverError> for AppError {
    fn from(err: DriverError) -> Self {
        Self::Driver(err)
    }
}

impl From<WindowError> for AppError {
    fn from(err: WindowError) -> Self {
        Self::Window(err)
    }
}

#[cfg(test)]
mod tests {
    use {
        super::*,
        crate::mock::{Ledger, LedgerEntry, MockPlatform, Resource},
        ash::vk::{self, Handle},
    };

    const VERT: [u8; 8] = [0x03, 0x02, 0x23, 0x07, 0x00, 0x00, 0x01, 0x00];
    const FRAG: [u8; 8] = [0x03, 0x02, 0x23, 0x07, 0x00, 0x00, 0x02, 0x00];

    fn platform(ledger: &Ledger) -> MockPlatform {
        let shaders = AppConfig::default().shaders;

        MockPlatform::new(ledger.clone())
            .with_shader(shaders.vertex, VERT)
            .with_shader(shaders.fragment, FRAG)
    }

    #[test]
    pub fn app_state_transitions() {
        let ledger = Ledger::default();
        let mut app = App::new(platform(&ledger), AppConfig::default());

        assert_eq!(app.state(), AppState::Uninitialized);

        app.initialize().unwrap();

        assert_eq!(app.state(), AppState::Initialized);
        assert_eq!(ledger.live(Resource::GraphicPipeline), 1);

        app.run().unwrap();

        assert_eq!(app.state(), AppState::Terminated);
        assert_eq!(ledger.live(Resource::GraphicPipeline), 0);
    }

    #[test]
    pub fn app_draws_until_close() {
        let ledger = Ledger::default();
        let mut app = App::new(platform(&ledger).close_after_polls(4), AppConfig::default());

        app.run().unwrap();

        assert_eq!(app.frame_count(), 3);
        assert_eq!(ledger.draws(), 3);

        let pipeline = ledger
            .created_order()
            .into_iter()
            .find(|(resource, _)| *resource == Resource::GraphicPipeline)
            .map(|(_, raw)| raw)
            .unwrap();

        for entry in ledger.entries() {
            if let LedgerEntry::Draw(raw) = entry {
                assert_eq!(raw, pipeline);
            }
        }
    }

    #[test]
    pub fn app_waits_idle_before_teardown() {
        let ledger = Ledger::default();

        App::new(platform(&ledger), AppConfig::default())
            .run()
            .unwrap();

        let entries = ledger.entries();
        let wait_idle = entries
            .iter()
            .position(|entry| *entry == LedgerEntry::WaitIdle)
            .unwrap();
        let first_destroy = entries
            .iter()
            .position(|entry| matches!(entry, LedgerEntry::Destroy(..)))
            .unwrap();

        assert!(wait_idle < first_destroy);
    }

    #[test]
    pub fn app_pipeline_matches_render_target() {
        let ledger = Ledger::default();
        let mut config = AppConfig::default();
        config.window.width = 320;
        config.window.height = 240;

        let mut app = App::new(platform(&ledger), config);
        app.initialize().unwrap();

        let pipeline = app.pipeline.as_ref().unwrap();
        let render_target = ledger
            .created_order()
            .into_iter()
            .find(|(resource, _)| *resource == Resource::RenderTarget)
            .map(|(_, raw)| raw)
            .unwrap();

        assert_eq!(pipeline.config.scissor.width, 320);
        assert_eq!(pipeline.config.scissor.height, 240);
        assert_eq!(
            pipeline.config.render_pass,
            vk::RenderPass::from_raw(render_target)
        );
        assert_eq!(pipeline.config.layout, **app.layout.as_ref().unwrap());
        assert_eq!(pipeline.name.as_deref(), Some("triangle"));
    }

    #[test]
    pub fn app_teardown_twice() {
        let ledger = Ledger::default();
        let mut app = App::new(platform(&ledger), AppConfig::default());

        app.initialize().unwrap();
        app.teardown();

        let destroyed = ledger.destroyed().len();

        app.teardown();
        drop(app);

        assert_eq!(ledger.destroyed().len(), destroyed);
    }

    #[test]
    pub fn app_run_after_terminated() {
        let ledger = Ledger::default();
        let mut app = App::new(platform(&ledger), AppConfig::default());

        app.run().unwrap();

        let entries = ledger.entries().len();
        let err = app.run().unwrap_err();

        assert!(matches!(err, AppError::Terminated));
        assert_eq!(app.state(), AppState::Terminated);
        assert_eq!(ledger.entries().len(), entries);
        assert_eq!(app.frame_count(), 0);
    }

    #[test]
    pub fn app_drop_releases_resources() {
        let ledger = Ledger::default();
        let mut app = App::new(platform(&ledger), AppConfig::default());

        app.initialize().unwrap();
        drop(app);

        for resource in [
            Resource::Window,
            Resource::Device,
            Resource::RenderTarget,
            Resource::PipelineLayout,
            Resource::ShaderModule,
            Resource::GraphicPipeline,
        ] {
            assert_eq!(ledger.live(resource), 0, "{resource:?}");
        }
    }

    #[test]
    pub fn app_error_display() {
        let err = AppError::ShaderBinaryRead {
            path: PathBuf::from("a.spv"),
            err: IoError::from(std::io::ErrorKind::NotFound),
        };

        assert!(err.to_string().starts_with("unable to read shader a.spv"));
        assert!(err.source().is_some());
        assert_eq!(
            AppError::from(DriverError::Unsupported).to_string(),
            "Unsupported"
        );
    }
}
