use {
    anyhow::Context,
    cfd_render::{
        app::{App, VulkanPlatform},
        config::{AppConfig, CONFIG_FILENAME},
    },
    clap::Parser,
    log::error,
    std::{path::PathBuf, process::ExitCode},
};

/// Opens a window and draws a triangle with a single Vulkan graphics pipeline until the window is
/// closed.
///
/// Run with RUST_LOG=info (or trace) to follow device selection and the resource lifecycle.
fn main() -> ExitCode {
    pretty_env_logger::init();

    match run(Args::parse()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("{err:#}");

            ExitCode::FAILURE
        }
    }
}

fn run(args: Args) -> anyhow::Result<()> {
    let mut config = AppConfig::read(&args.config)
        .with_context(|| format!("loading {}", args.config.display()))?;

    args.apply(&mut config);
    config.validate().context("command line")?;

    App::new(VulkanPlatform, config).run().context("rendering")
}

#[derive(Debug, Parser)]
#[command(version, about)]
struct Args {
    /// Configuration file; missing files use the defaults
    #[arg(long, default_value = CONFIG_FILENAME)]
    config: PathBuf,

    /// Enable Vulkan SDK validation layers
    #[arg(long)]
    debug: bool,

    /// Compiled SPIR-V fragment shader
    #[arg(long)]
    fragment: Option<PathBuf>,

    /// Window height in pixels
    #[arg(long)]
    height: Option<u32>,

    /// Compiled SPIR-V vertex shader
    #[arg(long)]
    vertex: Option<PathBuf>,

    /// Window width in pixels
    #[arg(long)]
    width: Option<u32>,
}

impl Args {
    fn apply(self, config: &mut AppConfig) {
        config.driver.debug |= self.debug;

        if let Some(fragment) = self.fragment {
            config.shaders.fragment = fragment;
        }

        if let Some(height) = self.height {
            config.window.height = height;
        }

        if let Some(vertex) = self.vertex {
            config.shaders.vertex = vertex;
        }

        if let Some(width) = self.width {
            config.window.width = width;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    pub fn args_override_config() {
        let args = Args::parse_from(["cfd", "--debug", "--width", "1024", "--vertex", "v.spv"]);
        let mut config = AppConfig::default();

        assert_eq!(args.config, PathBuf::from(CONFIG_FILENAME));

        args.apply(&mut config);

        assert!(config.driver.debug);
        assert_eq!((config.window.width, config.window.height), (1024, 600));
        assert_eq!(config.shaders.vertex, PathBuf::from("v.spv"));
        assert_eq!(
            config.shaders.fragment,
            AppConfig::default().shaders.fragment
        );
    }
}
