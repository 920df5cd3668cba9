use {
    super::DriverError,
    ash::{ext, vk, Entry},
    log::{debug, error, info, trace, warn},
    std::{
        ffi::{c_void, CStr},
        fmt::{Debug, Formatter},
        ops::Deref,
        os::raw::c_char,
        thread::panicking,
    },
};

const APPLICATION_NAME: &CStr = c"cfd";
const VALIDATION_LAYER_NAME: &CStr = c"VK_LAYER_KHRONOS_validation";

unsafe extern "system" fn vulkan_debug_callback(
    severity: vk::DebugUtilsMessageSeverityFlagsEXT,
    ty: vk::DebugUtilsMessageTypeFlagsEXT,
    data: *const vk::DebugUtilsMessengerCallbackDataEXT<'_>,
    _user_data: *mut c_void,
) -> vk::Bool32 {
    if panicking() || data.is_null() {
        return vk::FALSE;
    }

    let data = &*data;
    let message = data
        .message_as_c_str()
        .map(CStr::to_string_lossy)
        .unwrap_or_default();

    if let Some(vuid) = data.message_id_name_as_c_str() {
        trace!("{vuid:?}");
    }

    if severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::ERROR) {
        error!("🆘 {ty:?} {message}");
    } else if severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::WARNING) {
        warn!("{ty:?} {message}");
    } else if severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::INFO) {
        debug!("{ty:?} {message}");
    } else {
        trace!("{ty:?} {message}");
    }

    vk::FALSE
}

/// There is no global state in Vulkan and all per-application state is stored in a VkInstance
/// object.
///
/// Creating an Instance initializes the Vulkan library and allows the application to pass
/// information about itself to the implementation.
pub struct Instance {
    debug_utils: Option<(ext::debug_utils::Instance, vk::DebugUtilsMessengerEXT)>,
    entry: Entry,
    instance: ash::Instance,
}

impl Instance {
    /// Creates a new Vulkan instance with the given window-system extensions enabled.
    ///
    /// When `debug` is `true` the Khronos validation layer is enabled and its messages are
    /// written to the log.
    #[profiling::function]
    pub fn create(debug: bool, required_extensions: &[*const c_char]) -> Result<Self, DriverError> {
        trace!("create");

        let entry = unsafe {
            Entry::load().map_err(|err| {
                error!("Vulkan driver not found: {err}");

                DriverError::Unsupported
            })?
        };

        let extension_names = required_extensions
            .iter()
            .copied()
            .chain(Self::extension_names(debug))
            .collect::<Box<[_]>>();
        let layer_names = Self::layer_names(debug);
        let app_info = vk::ApplicationInfo::default()
            .application_name(APPLICATION_NAME)
            .engine_name(APPLICATION_NAME)
            .api_version(vk::API_VERSION_1_0);
        let instance_info = vk::InstanceCreateInfo::default()
            .application_info(&app_info)
            .enabled_layer_names(&layer_names)
            .enabled_extension_names(&extension_names);

        let instance = unsafe {
            entry.create_instance(&instance_info, None).map_err(|err| {
                if debug {
                    warn!("debug may only be enabled with a valid Vulkan SDK installation");
                }

                error!("unable to create Vulkan instance: {err}");

                DriverError::from_vk(err)
            })?
        };

        info!("created a Vulkan instance");

        let debug_utils = debug
            .then(|| Self::create_debug_messenger(&entry, &instance))
            .flatten();

        Ok(Self {
            debug_utils,
            entry,
            instance,
        })
    }

    fn create_debug_messenger(
        entry: &Entry,
        instance: &ash::Instance,
    ) -> Option<(ext::debug_utils::Instance, vk::DebugUtilsMessengerEXT)> {
        let debug_utils = ext::debug_utils::Instance::new(entry, instance);
        let messenger_info = vk::DebugUtilsMessengerCreateInfoEXT::default()
            .message_severity(
                vk::DebugUtilsMessageSeverityFlagsEXT::ERROR
                    | vk::DebugUtilsMessageSeverityFlagsEXT::WARNING
                    | vk::DebugUtilsMessageSeverityFlagsEXT::INFO,
            )
            .message_type(
                vk::DebugUtilsMessageTypeFlagsEXT::GENERAL
                    | vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION
                    | vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE,
            )
            .pfn_user_callback(Some(vulkan_debug_callback));

        match unsafe { debug_utils.create_debug_utils_messenger(&messenger_info, None) } {
            Ok(messenger) => Some((debug_utils, messenger)),
            Err(err) => {
                warn!("unable to create debug messenger: {err}");

                None
            }
        }
    }

    /// Returns the `ash` entrypoint for Vulkan functions.
    pub fn entry(this: &Self) -> &Entry {
        &this.entry
    }

    fn extension_names(debug: bool) -> Vec<*const c_char> {
        let mut res = vec![];

        if debug {
            res.push(ext::debug_utils::NAME.as_ptr());
        }

        res
    }

    /// Returns `true` if this instance was created with debug layers enabled.
    pub fn is_debug(this: &Self) -> bool {
        this.debug_utils.is_some()
    }

    fn layer_names(debug: bool) -> Vec<*const c_char> {
        let mut res = vec![];

        if debug {
            res.push(VALIDATION_LAYER_NAME.as_ptr());
        }

        res
    }
}

impl Debug for Instance {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str("Instance")
    }
}

impl Deref for Instance {
    type Target = ash::Instance;

    fn deref(&self) -> &Self::Target {
        &self.instance
    }
}

impl Drop for Instance {
    #[profiling::function]
    fn drop(&mut self) {
        if panicking() {
            return;
        }

        trace!("drop");

        unsafe {
            if let Some((debug_utils, messenger)) = self.debug_utils.take() {
                debug_utils.destroy_debug_utils_messenger(messenger, None);
            }

            self.instance.destroy_instance(None);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    pub fn instance_debug_names() {
        assert!(Instance::extension_names(false).is_empty());
        assert!(Instance::layer_names(false).is_empty());
        assert_eq!(Instance::extension_names(true).len(), 1);
        assert_eq!(
            unsafe { CStr::from_ptr(Instance::layer_names(true)[0]) },
            VALIDATION_LAYER_NAME
        );
    }
}
