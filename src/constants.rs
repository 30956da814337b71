// SPDX-License-Identifier: GPL-3.0-only

//! Application-wide constants

/// Number of age states; valid states are `0..AGE_STATE_MAX`
pub const AGE_STATE_MAX: u32 = 12;

/// Aging tuning
pub mod aging {
    /// JPEG quality at age state 0
    pub const JPEG_QUALITY_MAX: u8 = 80;

    /// JPEG quality at the oldest age state
    pub const JPEG_QUALITY_MIN: u8 = 50;

    /// Size scale at the oldest age state (state 0 is 1.0)
    pub const MIN_SIZE_SCALE: f32 = 0.3;

    /// Color only bleeds once per this many states (low bits of the state are cleared)
    pub const COLOR_STEP_MASK: u32 = !3;

    /// Default full logical size (landscape); portrait swaps the axes
    pub const LOGICAL_WIDTH: u32 = 1024;
    pub const LOGICAL_HEIGHT: u32 = 768;
}

/// Scheduler tuning
pub mod scheduler {
    /// Hard ceiling on stages per task
    pub const MAX_STAGES: u32 = 100;

    /// Simulated delay jitter bounds, as multiples of the configured delay
    pub const DELAY_JITTER_MIN: f64 = 0.6;
    pub const DELAY_JITTER_MAX: f64 = 1.4;
}

/// Noise synthesis defaults
pub mod noise {
    /// Gradient pool size
    pub const DEFAULT_GRADIENTS: usize = 256;

    /// Default generator seed
    pub const DEFAULT_SEED: u64 = 0x5eed_cafe;

    /// Multiplier mixing the lattice row into the gradient hash
    pub const ROW_MIX: i32 = 101_561;

    /// Hash round multiplier
    pub const HASH_MUL: u32 = 0x045d_9f3b;

    /// Default lattice cell size in pixels for rendered samples
    pub const DEFAULT_CELL_SIZE: f32 = 48.0;
}

/// Storage layout
pub mod storage {
    /// Catalog file name inside the library directory
    pub const CATALOG_FILE: &str = "catalog.jsonl";

    /// Application directory name under the platform data/config dirs
    pub const APP_DIR: &str = "agecam";
}

/// Version string reported by the CLI
pub fn app_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
