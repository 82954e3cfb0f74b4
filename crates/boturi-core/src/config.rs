// SPDX-License-Identifier: CEPL-1.0
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("parsing {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

#[derive(Debug, Deserialize, Clone, Default, PartialEq)]
pub struct GameConfig {
    #[serde(default)]
    pub window: WindowCfg,
    #[serde(default)]
    pub render: RenderCfg,
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct WindowCfg {
    pub title: String,
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct RenderCfg {
    /// Enables the Khronos validation layer and forwards its messages to tracing.
    pub debug_mode: bool,
    pub vsync: bool,
    /// Upper bound for the MSAA sample count; the device limit still applies.
    pub msaa_samples: u32,
    pub clear_color: [f32; 4],
    /// Bound on the device-idle wait before a rebuild. 0 waits forever.
    pub idle_timeout_ms: u64,
}

impl Default for WindowCfg {
    fn default() -> Self {
        WindowCfg {
            title: "Boturi".to_owned(),
            width: 800,
            height: 600,
        }
    }
}

impl Default for RenderCfg {
    fn default() -> Self {
        RenderCfg {
            debug_mode: false,
            vsync: true,
            msaa_samples: 8,
            clear_color: [0.02, 0.02, 0.04, 1.0],
            idle_timeout_ms: 0,
        }
    }
}

impl GameConfig {
    pub fn from_toml_str(src: &str, path: &Path) -> Result<Self, ConfigError> {
        toml::from_str(src).map_err(|source| ConfigError::Parse {
            path: path.to_owned(),
            source,
        })
    }

    /// Loads `path`, falling back to defaults when the file does not exist.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        match fs::read_to_string(path) {
            Ok(s) => Self::from_toml_str(&s, path),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!("{} not found, using default config", path.display());
                Ok(Self::default())
            }
            Err(source) => Err(ConfigError::Io {
                path: path.to_owned(),
                source,
            }),
        }
    }
}
