use {
    log::info,
    serde::{Deserialize, Serialize},
    std::{
        error::Error,
        fmt::{Display, Formatter},
        fs::read_to_string,
        io::Error as IoError,
        path::{Path, PathBuf},
    },
    toml::from_str,
};

/// The file read when no other configuration path is given.
pub const CONFIG_FILENAME: &str = "cfd.toml";

/// Application settings, read from a TOML file.
///
/// Every table and field is optional; missing values take their defaults.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(default)]
pub struct AppConfig {
    pub driver: DriverConfig,
    pub shaders: ShaderConfig,
    pub window: WindowConfig,
}

impl AppConfig {
    /// Reads the configuration at `path`, or returns the defaults if there is no such file.
    pub fn read(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();

        if !path.exists() {
            info!("Config file {} not found, using defaults", path.display());

            return Ok(Self::default());
        }

        let toml = read_to_string(path).map_err(ConfigError::Io)?;

        Self::from_toml(&toml)
    }

    /// Parses and validates a configuration.
    pub fn from_toml(toml: &str) -> Result<Self, ConfigError> {
        let config: Self = from_str(toml).map_err(ConfigError::Parse)?;
        config.validate()?;

        Ok(config)
    }

    /// Returns an error if the window has an empty extent.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.window.width == 0 || self.window.height == 0 {
            return Err(ConfigError::EmptyExtent {
                width: self.window.width,
                height: self.window.height,
            });
        }

        Ok(())
    }
}

/// Describes failures to load an [`AppConfig`].
#[derive(Debug)]
pub enum ConfigError {
    /// The window width or height is zero.
    EmptyExtent { width: u32, height: u32 },

    /// The file could not be read.
    Io(IoError),

    /// The file is not valid TOML or has values of the wrong type.
    Parse(toml::de::Error),
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyExtent { width, height } => {
                write!(f, "window extent {width}x{height} is empty")
            }
            Self::Io(err) => write!(f, "unable to read config: {err}"),
            Self::Parse(err) => write!(f, "invalid config: {err}"),
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::EmptyExtent { .. } => None,
            Self::Io(err) => Some(err),
            Self::Parse(err) => Some(err),
        }
    }
}

/// Vulkan instance and swapchain settings.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(default)]
pub struct DriverConfig {
    /// Enables the validation layer and routes its messages into the log.
    ///
    /// The default value is `false`.
    pub debug: bool,

    /// The number of swapchain images requested; clamped to what the surface supports.
    ///
    /// The default value is `3`.
    pub desired_image_count: u32,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            debug: false,
            desired_image_count: 3,
        }
    }
}

/// Paths of the compiled SPIR-V shader binaries.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(default)]
pub struct ShaderConfig {
    pub fragment: PathBuf,
    pub vertex: PathBuf,
}

impl Default for ShaderConfig {
    fn default() -> Self {
        Self {
            fragment: PathBuf::from("shaders/shader.frag.spv"),
            vertex: PathBuf::from("shaders/shader.vert.spv"),
        }
    }
}

/// Window settings.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(default)]
pub struct WindowConfig {
    /// The default value is `600`.
    pub height: u32,

    /// The default value is `"CFD"`.
    pub title: String,

    /// The default value is `800`.
    pub width: u32,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            height: 600,
            title: "CFD".to_owned(),
            width: 800,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    pub fn config_defaults() {
        let config = AppConfig::default();

        assert_eq!((config.window.width, config.window.height), (800, 600));
        assert_eq!(config.window.title, "CFD");
        assert_eq!(config.shaders.vertex, Path::new("shaders/shader.vert.spv"));
        assert_eq!(
            config.shaders.fragment,
            Path::new("shaders/shader.frag.spv")
        );
        assert!(!config.driver.debug);
        assert_eq!(config.driver.desired_image_count, 3);
    }

    #[test]
    pub fn config_empty_file() {
        assert_eq!(AppConfig::from_toml("").unwrap(), AppConfig::default());
    }

    #[test]
    pub fn config_partial_file() {
        let config = AppConfig::from_toml(
            r#"
            [window]
            width = 1024

            [driver]
            debug = true
            "#,
        )
        .unwrap();

        assert_eq!((config.window.width, config.window.height), (1024, 600));
        assert!(config.driver.debug);
        assert_eq!(config.driver.desired_image_count, 3);
        assert_eq!(config.shaders, ShaderConfig::default());
    }

    #[test]
    pub fn config_zero_extent() {
        let err = AppConfig::from_toml("[window]\nheight = 0").unwrap_err();

        match err {
            ConfigError::EmptyExtent { width, height } => assert_eq!((width, height), (800, 0)),
            err => panic!("unexpected error: {err}"),
        }
    }

    #[test]
    pub fn config_wrong_type() {
        let err = AppConfig::from_toml("[window]\nwidth = \"wide\"").unwrap_err();

        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    pub fn config_missing_file() {
        let config = AppConfig::read("does/not/exist/cfd.toml").unwrap();

        assert_eq!(config, AppConfig::default());
    }
}
