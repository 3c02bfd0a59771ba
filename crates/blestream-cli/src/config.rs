//! blestream CLI configuration
//!
//! Configuration is layered with figment, lowest priority first:
//! - built-in defaults
//! - a TOML file (`blestream.toml` in the working directory, or `--config`)
//! - environment variables prefixed `BLESTREAM_`, nested keys split on `__`
//!   (for example `BLESTREAM_LINK__WRITE_WINDOW=3`)
//! - command line overrides

use std::path::Path;

use blestream_runtime::{LinkConfig, RuntimeConfig};
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Default configuration file, looked up in the working directory
pub const DEFAULT_CONFIG_FILE: &str = "blestream.toml";

/// Environment variable prefix
pub const ENV_PREFIX: &str = "BLESTREAM_";

// ----------------------------------------------------------------------------
// CLI Application Configuration
// ----------------------------------------------------------------------------

/// Complete configuration for the blestream CLI
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CliConfig {
    /// Connection runtime and channel tunables
    pub runtime: RuntimeConfig,
    /// Shape of the simulated link
    pub link: LinkConfig,
}

/// Values given on the command line that win over every other layer
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub write_window: Option<usize>,
}

// ----------------------------------------------------------------------------
// Configuration Loading Logic
// ----------------------------------------------------------------------------

impl CliConfig {
    /// Load defaults, `blestream.toml` and the environment
    pub fn load() -> Result<Self> {
        Self::load_with_overrides(None::<&Path>, &CliOverrides::default())
    }

    /// Load defaults, the given file and the environment
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::load_with_overrides(Some(path), &CliOverrides::default())
    }

    /// Load every layer, with command line overrides on top
    pub fn load_with_overrides<P: AsRef<Path>>(
        path: Option<P>,
        overrides: &CliOverrides,
    ) -> Result<Self> {
        let file = match &path {
            Some(path) => Toml::file(path.as_ref()),
            None => Toml::file(DEFAULT_CONFIG_FILE),
        };

        let mut figment = Figment::new()
            .merge(Serialized::defaults(Self::default()))
            .merge(file)
            .merge(Env::prefixed(ENV_PREFIX).split("__"));

        if let Some(window) = overrides.write_window {
            figment = figment.merge(("link.write_window", window));
        }

        let config: CliConfig = figment.extract()?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.runtime.validate()?;
        self.link.validate()?;
        Ok(())
    }

    /// Render the configuration as TOML
    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }
}
