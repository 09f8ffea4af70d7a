//! Choosing the device to run on

use async_trait::async_trait;
use flightdeck_core::{SettingsStore, SettingsStoreExt};
use tracing::{debug, warn};

use crate::device::{Device, LAST_SELECTED_DEVICE};
use crate::error::{DeviceError, Result};

/// Asks the user to pick a device
#[async_trait]
pub trait DevicePrompter: Send + Sync {
    /// Index into `devices` of the chosen device; `default` is preselected
    async fn choose(&self, devices: &[Device], default: Option<usize>) -> Result<usize>;
}

/// Pick a device from `devices`.
///
/// An explicit name or id wins. Without one a single ready device is taken
/// as is; anything else asks the prompter with every device listed. Only a
/// prompted choice is remembered.
pub async fn select_device(
    devices: &[Device],
    explicit: Option<&str>,
    prompter: &dyn DevicePrompter,
    settings: &dyn SettingsStore,
) -> Result<Device> {
    if devices.is_empty() {
        return Err(DeviceError::NoDevicesFound);
    }

    if let Some(query) = explicit {
        return devices
            .iter()
            .find(|d| d.matches(query))
            .cloned()
            .ok_or_else(|| DeviceError::DeviceNotFound(query.to_string()));
    }

    let mut ready = devices.iter().filter(|d| d.is_ready());
    if let (Some(only), None) = (ready.next(), ready.next()) {
        debug!(device = %only, "auto-selected the only ready device");
        return Ok(only.clone());
    }

    let default = last_selected_index(devices, settings);
    let index = prompter.choose(devices, default).await?;
    let device = devices
        .get(index)
        .cloned()
        .ok_or_else(|| DeviceError::Prompt(format!("selection {} is out of range", index)))?;

    if let Err(e) = settings.set(&LAST_SELECTED_DEVICE, &device.reference()) {
        warn!(error = %e, "failed to remember the selected device");
    }
    Ok(device)
}

fn last_selected_index(devices: &[Device], settings: &dyn SettingsStore) -> Option<usize> {
    let last = match settings.get(&LAST_SELECTED_DEVICE) {
        Ok(last) => last?,
        Err(e) => {
            debug!(error = %e, "ignoring unreadable last selected device");
            return None;
        }
    };
    devices.iter().position(|d| d.reference() == last)
}

#[cfg(test)]
pub(crate) mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::device::{AndroidDeviceKind, DeviceKind, DeviceRef};
    use flightdeck_core::{MemorySettingsStore, PlatformTag};

    /// Answers with a fixed index and records what it was shown
    pub(crate) struct ScriptedPrompter {
        pub answer: usize,
        pub prompts: Mutex<Vec<(Vec<Device>, Option<usize>)>>,
    }

    impl ScriptedPrompter {
        pub(crate) fn new(answer: usize) -> Self {
            Self {
                answer,
                prompts: Mutex::new(Vec::new()),
            }
        }

        pub(crate) fn prompt_count(&self) -> usize {
            self.prompts.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl DevicePrompter for ScriptedPrompter {
        async fn choose(&self, devices: &[Device], default: Option<usize>) -> Result<usize> {
            self.prompts.lock().unwrap().push((devices.to_vec(), default));
            Ok(self.answer)
        }
    }

    pub(crate) fn simulator(id: &str, name: &str, booted: bool) -> Device {
        Device::Simulator {
            id: id.into(),
            name: name.into(),
            platform: PlatformTag::IosSimulator,
            booted,
        }
    }

    pub(crate) fn android(id: &str, name: &str) -> Device {
        Device::AndroidDevice {
            id: id.into(),
            name: name.into(),
            kind: AndroidDeviceKind::Emulator,
        }
    }

    #[tokio::test]
    async fn test_no_devices() {
        let prompter = ScriptedPrompter::new(0);
        let err = select_device(&[], None, &prompter, &MemorySettingsStore::new()).await.unwrap_err();
        assert!(matches!(err, DeviceError::NoDevicesFound));
    }

    #[tokio::test]
    async fn test_single_ready_device_is_auto_selected() {
        let devices = vec![
            simulator("A", "iPhone 15 Pro", true),
            simulator("B", "iPhone SE", false),
        ];
        let prompter = ScriptedPrompter::new(1);
        let settings = MemorySettingsStore::new();

        let first = select_device(&devices, None, &prompter, &settings).await.unwrap();
        let second = select_device(&devices, None, &prompter, &settings).await.unwrap();

        assert_eq!(first, devices[0]);
        assert_eq!(first, second);
        assert_eq!(prompter.prompt_count(), 0);
        assert_eq!(settings.get(&LAST_SELECTED_DEVICE).unwrap(), None);
    }

    #[tokio::test]
    async fn test_no_ready_device_prompts() {
        let devices = vec![
            simulator("A", "iPhone 15 Pro", false),
            simulator("B", "iPhone SE", false),
        ];
        let prompter = ScriptedPrompter::new(1);
        let settings = MemorySettingsStore::new();

        let chosen = select_device(&devices, None, &prompter, &settings).await.unwrap();

        assert_eq!(chosen, devices[1]);
        assert_eq!(prompter.prompt_count(), 1);
        assert_eq!(
            settings.get(&LAST_SELECTED_DEVICE).unwrap(),
            Some(DeviceRef {
                kind: DeviceKind::Simulator,
                id: "B".into()
            })
        );
    }

    #[tokio::test]
    async fn test_prompt_lists_every_device_and_defaults_to_last_choice() {
        let devices = vec![
            simulator("A", "iPhone 15 Pro", false),
            android("emulator-5554", "Pixel 8"),
            android("R58M", "Galaxy S21"),
        ];
        let settings = MemorySettingsStore::new();
        settings
            .set(&LAST_SELECTED_DEVICE, &devices[2].reference())
            .unwrap();
        let prompter = ScriptedPrompter::new(2);

        select_device(&devices, None, &prompter, &settings).await.unwrap();

        let prompts = prompter.prompts.lock().unwrap();
        assert_eq!(prompts[0].0.len(), 3);
        assert_eq!(prompts[0].1, Some(2));
    }

    #[tokio::test]
    async fn test_same_id_in_another_variant_is_not_the_default() {
        let devices = vec![
            simulator("shared", "iPhone", false),
            android("other", "Pixel"),
        ];
        let settings = MemorySettingsStore::new();
        settings
            .set(
                &LAST_SELECTED_DEVICE,
                &DeviceRef {
                    kind: DeviceKind::Android,
                    id: "shared".into(),
                },
            )
            .unwrap();
        let prompter = ScriptedPrompter::new(0);

        select_device(&devices, None, &prompter, &settings).await.unwrap();
        assert_eq!(prompter.prompts.lock().unwrap()[0].1, None);
    }

    #[tokio::test]
    async fn test_explicit_device() {
        let devices = vec![
            simulator("A", "iPhone 15 Pro", true),
            android("emulator-5554", "Pixel 8"),
        ];
        let prompter = ScriptedPrompter::new(0);
        let settings = MemorySettingsStore::new();

        let by_name = select_device(&devices, Some("Pixel 8"), &prompter, &settings).await.unwrap();
        let by_id = select_device(&devices, Some("A"), &prompter, &settings).await.unwrap();
        assert_eq!(by_name, devices[1]);
        assert_eq!(by_id, devices[0]);

        let err = select_device(&devices, Some("iPad"), &prompter, &settings).await.unwrap_err();
        assert!(matches!(err, DeviceError::DeviceNotFound(ref q) if q == "iPad"));
        assert_eq!(prompter.prompt_count(), 0);
    }
}
