//! Audio output device enumeration and selection.

use serde::{Deserialize, Serialize};

/// Metadata about an audio output device.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceInfo {
    /// Human-readable device name reported by the OS.
    pub name: String,
    /// Whether this is the system default output device.
    pub is_default: bool,
}

/// Pick a device from `names`.
///
/// Order of preference: exact match on `preferred`, case-insensitive match on
/// `preferred`, the system default, the first device. `None` only when
/// `names` is empty.
pub fn select_device_index(
    names: &[String],
    preferred: Option<&str>,
    default_name: Option<&str>,
) -> Option<usize> {
    if let Some(preferred) = preferred.map(str::trim).filter(|p| !p.is_empty()) {
        if let Some(idx) = names.iter().position(|n| n == preferred) {
            return Some(idx);
        }
        if let Some(idx) = names.iter().position(|n| n.eq_ignore_ascii_case(preferred)) {
            return Some(idx);
        }
    }

    if let Some(default_name) = default_name {
        if let Some(idx) = names.iter().position(|n| n == default_name) {
            return Some(idx);
        }
    }

    if names.is_empty() {
        None
    } else {
        Some(0)
    }
}

/// List all available audio output devices on the system.
///
/// Returns an empty `Vec` if cpal is not available or no devices exist.
#[cfg(feature = "audio-cpal")]
pub fn list_output_devices() -> Vec<DeviceInfo> {
    use cpal::traits::{DeviceTrait, HostTrait};

    let host = cpal::default_host();
    let default_name = host.default_output_device().and_then(|d| d.name().ok());

    match host.output_devices() {
        Ok(devices) => {
            let mut list = devices
                .enumerate()
                .map(|(idx, device)| {
                    let name = device
                        .name()
                        .unwrap_or_else(|_| format!("Output Device {}", idx + 1));
                    let is_default = default_name.as_deref() == Some(name.as_str());
                    DeviceInfo { name, is_default }
                })
                .collect::<Vec<_>>();
            list.sort_by_key(|d| (!d.is_default, d.name.to_ascii_lowercase()));
            list
        }
        Err(e) => {
            tracing::warn!("failed to enumerate output devices: {e}");
            default_name
                .map(|name| vec![DeviceInfo { name, is_default: true }])
                .unwrap_or_default()
        }
    }
}

#[cfg(not(feature = "audio-cpal"))]
pub fn list_output_devices() -> Vec<DeviceInfo> {
    vec![]
}
