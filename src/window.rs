//! Window creation and event polling.

use {
    log::{info, trace, warn},
    raw_window_handle::{
        DisplayHandle, HandleError, HasDisplayHandle, HasWindowHandle, WindowHandle,
    },
    std::{error, fmt, time::Duration},
    winit::{
        application::ApplicationHandler,
        dpi::PhysicalSize,
        error::{EventLoopError, OsError},
        event::WindowEvent,
        event_loop::{ActiveEventLoop, EventLoop},
        platform::pump_events::{EventLoopExtPumpEvents, PumpStatus},
        window::{WindowAttributes, WindowId},
    },
};

/// The operations the application loop needs from a window.
pub trait Window {
    /// Processes all pending window system events without blocking.
    fn poll_events(&mut self);

    /// Returns `true` once the user or the window system has asked the window to close.
    fn should_close(&self) -> bool;
}

/// A fixed-size operating system window backed by `winit`.
///
/// The window is not resizable: the graphics pipeline bakes its viewport at creation time.
pub struct WinitWindow {
    // Declared first so the window drops before its event loop
    window: winit::window::Window,
    event_loop: EventLoop<()>,
    handler: WindowHandler,
}

impl WinitWindow {
    /// Opens a window with the given inner size, in pixels, and title.
    #[profiling::function]
    pub fn new(width: u32, height: u32, title: impl Into<String>) -> Result<Self, WindowError> {
        let mut event_loop = EventLoop::new()?;
        let mut handler = WindowHandler {
            attributes: WindowAttributes::default()
                .with_inner_size(PhysicalSize::new(width, height))
                .with_resizable(false)
                .with_title(title),
            close_requested: false,
            created: false,
            error: None,
            window: None,
        };

        // The window can only be created once the event loop reports it has resumed
        let window = loop {
            if let PumpStatus::Exit(code) =
                event_loop.pump_app_events(Some(Duration::ZERO), &mut handler)
            {
                warn!("Event loop exited before the window was created");

                return Err(EventLoopError::ExitFailure(code).into());
            }

            if let Some(err) = handler.error.take() {
                return Err(err.into());
            }

            if let Some(window) = handler.window.take() {
                break window;
            }
        };

        info!("Created {width}x{height} window");

        Ok(Self {
            window,
            event_loop,
            handler,
        })
    }

    /// The size of the drawable area of the window, in pixels.
    pub fn inner_size(&self) -> (u32, u32) {
        let size = self.window.inner_size();

        (size.width, size.height)
    }
}

impl fmt::Debug for WinitWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WinitWindow")
            .field("window", &self.window.id())
            .field("close_requested", &self.handler.close_requested)
            .finish()
    }
}

impl Drop for WinitWindow {
    fn drop(&mut self) {
        trace!("drop");
    }
}

impl HasDisplayHandle for WinitWindow {
    fn display_handle(&self) -> Result<DisplayHandle<'_>, HandleError> {
        self.window.display_handle()
    }
}

impl HasWindowHandle for WinitWindow {
    fn window_handle(&self) -> Result<WindowHandle<'_>, HandleError> {
        self.window.window_handle()
    }
}

impl Window for WinitWindow {
    #[profiling::function]
    fn poll_events(&mut self) {
        if let PumpStatus::Exit(code) = self
            .event_loop
            .pump_app_events(Some(Duration::ZERO), &mut self.handler)
        {
            info!("Event loop exited ({code})");

            self.handler.close_requested = true;
        }
    }

    fn should_close(&self) -> bool {
        self.handler.close_requested
    }
}

struct WindowHandler {
    attributes: WindowAttributes,
    close_requested: bool,
    created: bool,
    error: Option<OsError>,
    window: Option<winit::window::Window>,
}

impl ApplicationHandler for WindowHandler {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.created {
            return;
        }

        match event_loop.create_window(self.attributes.clone()) {
            Ok(window) => {
                self.created = true;
                self.window = Some(window);
            }
            Err(err) => {
                warn!("Unable to create window: {err}");

                self.error = Some(err);
                event_loop.exit();
            }
        }
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        _window_id: WindowId,
        event: WindowEvent,
    ) {
        if let WindowEvent::CloseRequested = event {
            info!("close requested");

            self.close_requested = true;
            event_loop.exit();
        }
    }
}

/// Describes failures to open a window.
#[derive(Debug)]
pub enum WindowError {
    /// The event loop could not be created or exited early.
    EventLoop(EventLoopError),

    /// The operating system refused to create the window.
    Os(OsError),
}

impl error::Error for WindowError {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        Some(match self {
            Self::EventLoop(err) => err,
            Self::Os(err) => err,
        })
    }
}

impl fmt::Display for WindowError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EventLoop(err) => err.fmt(f),
            Self::Os(err) => err.fmt(f),
        }
    }
}

impl From<EventLoopError> for WindowError {
    fn from(err: EventLoopError) -> Self {
        Self::EventLoop(err)
    }
}

impl From<OsError> for WindowError {
    fn from(err: OsError) -> Self {
        Self::Os(err)
    }
}
