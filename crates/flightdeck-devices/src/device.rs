//! Unified device model

use flightdeck_core::{PlatformTag, SettingKey};
use serde::{Deserialize, Serialize};

/// Device chosen at the last interactive prompt
pub const LAST_SELECTED_DEVICE: SettingKey<DeviceRef> = SettingKey::new("last_selected_device");

/// Connection of a physical Apple device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    Connected,
    Disconnected,
}

/// Whether an Android target is emulated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AndroidDeviceKind {
    Emulator,
    Device,
}

/// A target a preview can run on.
///
/// Ids are unique only within one variant, so a device is always referred
/// to together with its kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Device {
    Simulator {
        id: String,
        name: String,
        platform: PlatformTag,
        booted: bool,
    },
    PhysicalDevice {
        id: String,
        name: String,
        platform: PlatformTag,
        connection_state: ConnectionState,
    },
    AndroidDevice {
        id: String,
        name: String,
        kind: AndroidDeviceKind,
    },
}

/// Which variant a device belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceKind {
    Simulator,
    Physical,
    Android,
}

/// Persistable reference to a device
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceRef {
    pub kind: DeviceKind,
    pub id: String,
}

impl Device {
    pub fn id(&self) -> &str {
        match self {
            Self::Simulator { id, .. }
            | Self::PhysicalDevice { id, .. }
            | Self::AndroidDevice { id, .. } => id,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Self::Simulator { name, .. }
            | Self::PhysicalDevice { name, .. }
            | Self::AndroidDevice { name, .. } => name,
        }
    }

    pub fn kind(&self) -> DeviceKind {
        match self {
            Self::Simulator { .. } => DeviceKind::Simulator,
            Self::PhysicalDevice { .. } => DeviceKind::Physical,
            Self::AndroidDevice { .. } => DeviceKind::Android,
        }
    }

    pub fn reference(&self) -> DeviceRef {
        DeviceRef {
            kind: self.kind(),
            id: self.id().to_string(),
        }
    }

    /// Simulators must be booted; physical and Android devices are always ready
    pub fn is_ready(&self) -> bool {
        match self {
            Self::Simulator { booted, .. } => *booted,
            Self::PhysicalDevice { .. } | Self::AndroidDevice { .. } => true,
        }
    }

    /// Platforms a build must support to run here
    pub fn platform_tags(&self) -> Vec<PlatformTag> {
        match self {
            Self::Simulator { platform, .. } | Self::PhysicalDevice { platform, .. } => {
                vec![*platform]
            }
            Self::AndroidDevice { .. } => vec![PlatformTag::Android],
        }
    }

    /// Human readable description, e.g. `iPhone 15 Pro (iOS Simulator, booted)`
    pub fn label(&self) -> String {
        match self {
            Self::Simulator {
                name,
                platform,
                booted,
                ..
            } => {
                let state = if *booted { "booted" } else { "shut down" };
                format!("{} ({}, {})", name, platform.display_name(), state)
            }
            Self::PhysicalDevice {
                name,
                platform,
                connection_state,
                ..
            } => {
                let state = match connection_state {
                    ConnectionState::Connected => "connected",
                    ConnectionState::Disconnected => "disconnected",
                };
                format!("{} ({} device, {})", name, platform.display_name(), state)
            }
            Self::AndroidDevice { name, kind, .. } => {
                let kind = match kind {
                    AndroidDeviceKind::Emulator => "Android emulator",
                    AndroidDeviceKind::Device => "Android device",
                };
                format!("{} ({})", name, kind)
            }
        }
    }

    /// Whether an explicit `--device` argument names this device
    pub fn matches(&self, query: &str) -> bool {
        self.name() == query || self.id() == query
    }
}

impl std::fmt::Display for Device {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_readiness() {
        let shut_down = Device::Simulator {
            id: "A".into(),
            name: "iPhone 15".into(),
            platform: PlatformTag::IosSimulator,
            booted: false,
        };
        let disconnected = Device::PhysicalDevice {
            id: "B".into(),
            name: "Phone".into(),
            platform: PlatformTag::Ios,
            connection_state: ConnectionState::Disconnected,
        };
        let emulator = Device::AndroidDevice {
            id: "emulator-5554".into(),
            name: "Pixel 8".into(),
            kind: AndroidDeviceKind::Emulator,
        };

        assert!(!shut_down.is_ready());
        assert!(disconnected.is_ready());
        assert!(emulator.is_ready());
        assert_eq!(emulator.platform_tags(), vec![PlatformTag::Android]);
    }

    #[test]
    fn test_label_and_reference() {
        let sim = Device::Simulator {
            id: "UDID-1".into(),
            name: "iPhone 15 Pro".into(),
            platform: PlatformTag::IosSimulator,
            booted: true,
        };
        assert_eq!(sim.label(), "iPhone 15 Pro (iOS Simulator, booted)");
        assert_eq!(
            sim.reference(),
            DeviceRef {
                kind: DeviceKind::Simulator,
                id: "UDID-1".into()
            }
        );
        assert!(sim.matches("iPhone 15 Pro"));
        assert!(sim.matches("UDID-1"));
        assert!(!sim.matches("iPhone"));
    }

    #[test]
    fn test_reference_serialization() {
        let reference = DeviceRef {
            kind: DeviceKind::Android,
            id: "emulator-5554".into(),
        };
        let json = serde_json::to_value(&reference).unwrap();
        assert_eq!(json, serde_json::json!({"kind": "android", "id": "emulator-5554"}));
    }
}
