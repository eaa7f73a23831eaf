//! Driver configuration. [CompilerConfig] is created with opinionated default values, which can then
//! be overwritten by environment variables prefixed with `WIREPLAN_` or `wireplan.json` file.

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

const CONFIG_ENV_PREFIX: &str = "WIREPLAN";

/// Name of the default config file.
pub const CONFIG_FILE: &str = "wireplan.json";

/// Configuration of the [Application](crate::application::Application).
#[non_exhaustive]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct CompilerConfig {
    /// Should a default tracing logger be installed in the scope of the application.
    pub install_tracing_logger: bool,
    /// Should the first failed compilation cancel all pending ones.
    pub fail_fast: bool,
    /// Should the built-in global setup be merged into every compiled setup.
    pub include_default_setup: bool,
}

impl Default for CompilerConfig {
    fn default() -> Self {
        Self {
            install_tracing_logger: true,
            fail_fast: true,
            include_default_setup: true,
        }
    }
}

impl From<OptionalCompilerConfig> for CompilerConfig {
    fn from(value: OptionalCompilerConfig) -> Self {
        let default = Self::default();
        Self {
            install_tracing_logger: value
                .install_tracing_logger
                .unwrap_or(default.install_tracing_logger),
            fail_fast: value.fail_fast.unwrap_or(default.fail_fast),
            include_default_setup: value
                .include_default_setup
                .unwrap_or(default.include_default_setup),
        }
    }
}

impl CompilerConfig {
    /// Loads the config from [CONFIG_FILE] and the environment.
    pub fn init_from_environment() -> Result<Self, ConfigError> {
        Config::builder()
            .add_source(File::with_name(CONFIG_FILE).required(false))
            .add_source(Environment::with_prefix(CONFIG_ENV_PREFIX))
            .build()
            .and_then(|config| config.try_deserialize::<OptionalCompilerConfig>())
            .map(|config| config.into())
    }
}

#[derive(Deserialize)]
struct OptionalCompilerConfig {
    install_tracing_logger: Option<bool>,
    fail_fast: Option<bool>,
    include_default_setup: Option<bool>,
}
