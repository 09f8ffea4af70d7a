//! Flightdeck Devices - running previews on simulators, Apple devices and Android
//!
//! Devices are discovered through `simctl`, `devicectl` and `adb`, a build
//! matching the chosen device is downloaded, and the app is installed and
//! launched.

pub mod artifacts;
pub mod backends;
pub mod device;
pub mod error;
pub mod orchestration;
pub mod registry;
pub mod selection;

pub use artifacts::{ArtifactDownloader, BinaryKind, DownloadedArtifact, HttpArtifactDownloader};
pub use device::{AndroidDeviceKind, ConnectionState, Device, DeviceKind, DeviceRef, LAST_SELECTED_DEVICE};
pub use error::{DeviceError, Result};
pub use orchestration::{ProgressReporter, RunOrchestrator, RunOutcome, RunPhase, RunRequest, SilentReporter};
pub use registry::{Backends, DeviceRegistry};
pub use selection::{select_device, DevicePrompter};
