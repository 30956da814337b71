// SPDX-License-Identifier: GPL-3.0-only

use crate::constants::aging::{LOGICAL_HEIGHT, LOGICAL_WIDTH};
use crate::constants::noise::{DEFAULT_CELL_SIZE, DEFAULT_GRADIENTS, DEFAULT_SEED};
use crate::constants::storage::APP_DIR;
use crate::errors::{AgeError, AgeResult};
use crate::media::noise::Interpolation;
use crate::photo::store::StoreOptions;
use crate::pipelines::aging::AgingConfig;
use crate::pipelines::sample::SampleSpec;
use crate::storage::PhotoLibrary;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

/// File name of the configuration inside the app config directory
pub const CONFIG_FILE: &str = "config.json";

/// User configuration
///
/// Missing fields take their default, so a config file only needs the
/// settings it changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Photo library directory (None = `<data_dir>/agecam/library`)
    pub library_dir: Option<PathBuf>,
    /// Simulated delay between task stages in milliseconds (0 = none)
    pub stage_delay_ms: u64,
    /// Seed for sample image noise
    pub noise_seed: u64,
    /// Size of the noise gradient pool
    pub noise_gradients: usize,
    /// Noise smoothing curve
    pub interpolation: Interpolation,
    /// Pixels per noise lattice cell
    pub noise_cell_size: f32,
    /// Width of an age-0 landscape photo
    pub logical_width: u32,
    /// Height of an age-0 landscape photo
    pub logical_height: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            library_dir: None,
            stage_delay_ms: 0,
            noise_seed: DEFAULT_SEED,
            noise_gradients: DEFAULT_GRADIENTS,
            interpolation: Interpolation::default(),
            noise_cell_size: DEFAULT_CELL_SIZE,
            logical_width: LOGICAL_WIDTH,
            logical_height: LOGICAL_HEIGHT,
        }
    }
}

impl Config {
    /// `<config_dir>/agecam/config.json`
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(APP_DIR).join(CONFIG_FILE))
    }

    /// Load from `path`, or from [`Config::default_path`] when `None`
    ///
    /// An explicit path must exist. The default location may be absent, in
    /// which case the defaults are used.
    pub fn load(path: Option<&Path>) -> AgeResult<Self> {
        let (path, required) = match path {
            Some(path) => (path.to_path_buf(), true),
            None => match Self::default_path() {
                Some(path) => (path, false),
                None => return Ok(Self::default()),
            },
        };

        if !path.exists() {
            if required {
                return Err(AgeError::Config(format!("{} does not exist", path.display())));
            }
            debug!(path = %path.display(), "No config file, using defaults");
            return Ok(Self::default());
        }

        let text = std::fs::read_to_string(&path)
            .map_err(|e| AgeError::Config(format!("{}: {}", path.display(), e)))?;
        let config = Self::from_json(&text)
            .map_err(|e| AgeError::Config(format!("{}: {}", path.display(), e)))?;
        debug!(path = %path.display(), "Loaded config");
        Ok(config)
    }

    pub fn from_json(text: &str) -> AgeResult<Self> {
        let config: Self =
            serde_json::from_str(text).map_err(|e| AgeError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_json(&self) -> AgeResult<String> {
        serde_json::to_string_pretty(self).map_err(|e| AgeError::Config(e.to_string()))
    }

    fn validate(&self) -> AgeResult<()> {
        if self.logical_width < 2 || self.logical_height < 2 {
            return Err(AgeError::Config(format!(
                "logical size {}x{} is too small",
                self.logical_width, self.logical_height
            )));
        }
        if self.noise_gradients < 2 {
            return Err(AgeError::Config("noise_gradients must be at least 2".to_string()));
        }
        if !(self.noise_cell_size > 0.0) {
            return Err(AgeError::Config("noise_cell_size must be positive".to_string()));
        }
        Ok(())
    }

    pub fn library(&self) -> PhotoLibrary {
        PhotoLibrary::new(
            self.library_dir
                .clone()
                .unwrap_or_else(PhotoLibrary::default_root),
        )
    }

    pub fn aging(&self) -> AgingConfig {
        AgingConfig {
            logical_size: (self.logical_width, self.logical_height),
        }
    }

    pub fn store_options(&self) -> StoreOptions {
        StoreOptions {
            aging: self.aging(),
            stage_delay_ms: self.stage_delay_ms,
        }
    }

    /// Sample spec at the logical size
    pub fn sample_spec(&self) -> SampleSpec {
        SampleSpec {
            width: self.logical_width,
            height: self.logical_height,
            seed: self.noise_seed,
            gradients: self.noise_gradients,
            interpolation: self.interpolation,
            cell_size: self.noise_cell_size,
        }
    }
}
