//! Persistent host settings (JSON file in the user data directory).

use std::fs;
use std::path::{Path, PathBuf};

use ringbridge_core::{SessionConfig, ToneConfig, Waveform};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[serde(default)]
pub struct AppSettings {
    pub preferred_output_device: Option<String>,
    pub waveform: Waveform,
    pub frequency_hz: f32,
    pub amplitude: f32,
    pub sample_rate: u32,
    /// Engine buffer length, and therefore ring capacity, in samples.
    pub buffer_len: usize,
    pub tick_hz: f64,
    /// Backlog the engine keeps ahead of the reader. `0` runs unpaced.
    pub target_latency_ms: f32,
    /// Stop after this many seconds. `0` runs until killed.
    pub run_seconds: u64,
    pub report_interval_ms: u64,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            preferred_output_device: None,
            waveform: Waveform::Square,
            frequency_hz: 440.0,
            amplitude: 0.2,
            sample_rate: 44_100,
            buffer_len: 44_100,
            tick_hz: 59.7275,
            target_latency_ms: 1000.0 / 30.0,
            run_seconds: 5,
            report_interval_ms: 1_000,
        }
    }
}

impl AppSettings {
    pub fn normalize(&mut self) {
        self.preferred_output_device = self
            .preferred_output_device
            .as_ref()
            .map(|d| d.trim().to_string())
            .filter(|d| !d.is_empty());
        self.sample_rate = self.sample_rate.clamp(8_000, 192_000);
        self.frequency_hz = self
            .frequency_hz
            .clamp(20.0, self.sample_rate as f32 / 2.0);
        self.amplitude = self.amplitude.clamp(0.0, 1.0);
        self.tick_hz = if self.tick_hz.is_finite() {
            self.tick_hz.clamp(1.0, 1_000.0)
        } else {
            59.7275
        };
        // At least a second of audio, at most ten, and always longer than
        // one unpaced tick.
        self.buffer_len = self
            .buffer_len
            .clamp(self.sample_rate as usize, self.sample_rate as usize * 10)
            .max(self.samples_per_tick() + 1);
        let max_latency_ms = self.buffer_len as f32 * 1000.0 / self.sample_rate as f32 / 2.0;
        self.target_latency_ms = self.target_latency_ms.clamp(0.0, max_latency_ms);
        self.report_interval_ms = self.report_interval_ms.clamp(100, 60_000);
    }

    pub fn samples_per_tick(&self) -> usize {
        (self.sample_rate as f64 / self.tick_hz).ceil() as usize
    }

    pub fn target_latency_samples(&self) -> Option<usize> {
        if self.target_latency_ms <= 0.0 {
            return None;
        }
        Some((self.target_latency_ms * self.sample_rate as f32 / 1000.0).round() as usize)
    }

    pub fn tone_config(&self) -> ToneConfig {
        ToneConfig {
            buffer_len: self.buffer_len,
            sample_rate: self.sample_rate,
            frequency_hz: self.frequency_hz,
            amplitude: self.amplitude,
            waveform: self.waveform,
            tick_hz: self.tick_hz,
            target_latency_samples: self.target_latency_samples(),
        }
    }

    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            tick_hz: self.tick_hz,
            ring_capacity: Some(self.buffer_len),
            preferred_output_device: self.preferred_output_device.clone(),
            sample_rate: self.sample_rate,
        }
    }
}

pub fn default_settings_path() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var_os("APPDATA")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("."))
            .join("ringbridge")
            .join("settings.json")
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var_os("XDG_DATA_HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|| {
                std::env::var_os("HOME")
                    .map(PathBuf::from)
                    .unwrap_or_else(|| PathBuf::from("/tmp"))
                    .join(".local")
                    .join("share")
            })
            .join("ringbridge")
            .join("settings.json")
    }
}

/// Missing or unreadable files fall back to defaults.
pub fn load_settings(path: &Path) -> AppSettings {
    let mut settings = fs::read_to_string(path)
        .ok()
        .and_then(|raw| serde_json::from_str::<AppSettings>(&raw).ok())
        .unwrap_or_default();
    settings.normalize();
    settings
}

pub fn save_settings(path: &Path, settings: &AppSettings) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_string_pretty(settings).map_err(std::io::Error::other)?;
    fs::write(path, json)
}
