//! Flightdeck Core - shared model for preview distribution
//!
//! This crate provides the foundational types (previews, builds, platform
//! tags), error handling, configuration loading and the persistent settings
//! store used by the upload and run workflows.

pub mod config;
pub mod error;
pub mod process;
pub mod settings;
pub mod types;

pub use config::Config;
pub use error::{ConfigError, FlightdeckError, Result};
pub use process::{CallbackRunner, CommandOutput, CommandRunner, CommandSpec, SystemCommandRunner};
pub use settings::{FileSettingsStore, MemorySettingsStore, SettingKey, SettingsStore, SettingsStoreExt};
pub use types::{AppBuild, ArtifactType, PlatformTag, Preview};
