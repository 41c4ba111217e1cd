//! Blosc compression stage for a frame-processing pipeline.
//!
//! Frames arrive from the dispatcher through [`BloscStage::process`], are
//! compressed with the settings committed for their acquisition, and leave
//! through a [`FrameSink`]. Configuration updates land in the *commanded*
//! settings and only take effect at the next acquisition boundary.

pub mod config;
pub mod error;
pub mod settings;
pub mod sink;
pub mod stage;
pub mod stats;

pub use config::{ConfigError, InitialSettings, StageConfig};
pub use error::{SinkError, StageError};
pub use settings::{apply_update, CompressionSettings, ConfigReply};
pub use sink::FrameSink;
pub use stage::BloscStage;
pub use stats::{StageStats, StatsSnapshot};

/// Control-channel key for the compressor selector.
pub const CONFIG_COMPRESSOR: &str = "compressor";
/// Control-channel key for the codec thread count.
pub const CONFIG_THREADS: &str = "threads";
/// Control-channel key for the compression level.
pub const CONFIG_LEVEL: &str = "level";
/// Control-channel key for the shuffle filter.
pub const CONFIG_SHUFFLE: &str = "shuffle";

/// Stage name used when a config file does not set one.
pub const DEFAULT_STAGE_NAME: &str = "blosc";
/// Element size assumed for frames without a data type.
pub const DEFAULT_TYPE_SIZE: usize = 2;

pub fn version_major() -> u32 {
    env!("CARGO_PKG_VERSION_MAJOR").parse().unwrap_or(0)
}

pub fn version_minor() -> u32 {
    env!("CARGO_PKG_VERSION_MINOR").parse().unwrap_or(0)
}

pub fn version_patch() -> u32 {
    env!("CARGO_PKG_VERSION_PATCH").parse().unwrap_or(0)
}

/// `major.minor.patch`.
pub fn version_short() -> String {
    format!("{}.{}.{}", version_major(), version_minor(), version_patch())
}

/// Full package version, including any pre-release suffix.
pub fn version_long() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
