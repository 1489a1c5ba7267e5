//! Audio playback via cpal backend.
//!
//! # Design constraints
//!
//! The cpal output callback runs on an OS audio thread at elevated priority
//! with a hard deadline per buffer. It **must not**:
//! - Allocate heap memory (after the first callback sized the scratch buffer)
//! - Block on a mutex or condvar
//! - Perform I/O or logging
//!
//! Every callback is one render quantum: it calls
//! [`ConsumerBridge::render_interleaved`], which only does atomic loads, one
//! atomic store and plain copies.
//!
//! # Threading note
//!
//! `cpal::Stream` is `!Send` on most platforms (COM on Windows, CoreAudio on
//! macOS). `AudioPlayback` therefore must be created and dropped on the same
//! thread; the session does this on its dedicated render-host thread.

pub mod device;

#[cfg(feature = "audio-cpal")]
use cpal::{
    traits::{DeviceTrait, StreamTrait},
    SampleFormat, SampleRate, Stream, StreamConfig, SupportedStreamConfig,
};

use crate::{
    bridge::consumer::ConsumerBridge,
    error::{BridgeError, Result},
};
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
#[cfg(feature = "audio-cpal")]
use tracing::{error, info, warn};

/// Handle to an active audio output stream.
///
/// **Not `Send`**: `cpal::Stream` is bound to its creation thread on
/// Windows/macOS. Create and drop this type on the same OS thread.
pub struct AudioPlayback {
    /// Kept alive so the stream is not dropped prematurely.
    #[cfg(feature = "audio-cpal")]
    _stream: Stream,
    /// Shared flag; set to `false` to make the callback emit silence.
    running: Arc<AtomicBool>,
    /// Actual output sample rate of the device (Hz).
    pub sample_rate: u32,
    /// Interleaved channel count of the device stream.
    pub channels: u16,
    /// Name of the device that was opened.
    pub device_name: String,
}

impl AudioPlayback {
    /// Open an output device by preferred name, otherwise fall back to the
    /// default output device and then the first available device.
    ///
    /// `sample_rate` is the engine's rate; it is requested from the device
    /// when any supported config allows it. Otherwise the device default is
    /// used and the mismatch is logged (the bridge does not resample).
    ///
    /// # Errors
    /// `NoDefaultOutputDevice` when no output exists, `AudioDevice` when the
    /// device cannot be queried, `AudioStream` when cpal fails to build or
    /// start the stream or the sample format is unsupported.
    #[cfg(feature = "audio-cpal")]
    pub fn open_with_preference(
        mut consumer: ConsumerBridge,
        running: Arc<AtomicBool>,
        preferred_device_name: Option<&str>,
        sample_rate: u32,
    ) -> Result<Self> {
        use cpal::traits::HostTrait;

        let host = cpal::default_host();
        let default_name = host.default_output_device().and_then(|d| d.name().ok());

        let mut devices: Vec<cpal::Device> = match host.output_devices() {
            Ok(devices) => devices.collect(),
            Err(e) => {
                warn!("failed to list output devices: {e}");
                Vec::new()
            }
        };
        let names: Vec<String> = devices
            .iter()
            .enumerate()
            .map(|(idx, d)| {
                d.name()
                    .unwrap_or_else(|_| format!("Output Device {}", idx + 1))
            })
            .collect();

        if let Some(preferred_name) = preferred_device_name {
            if !names.iter().any(|n| n.eq_ignore_ascii_case(preferred_name.trim())) {
                warn!(
                    "preferred output device '{}' not found, falling back",
                    preferred_name
                );
            }
        }

        let (device, device_name) =
            match device::select_device_index(&names, preferred_device_name, default_name.as_deref())
            {
                Some(idx) => (devices.swap_remove(idx), names[idx].clone()),
                None => {
                    let device = host
                        .default_output_device()
                        .ok_or(BridgeError::NoDefaultOutputDevice)?;
                    let name = device.name().unwrap_or_default();
                    (device, name)
                }
            };

        info!(device = device_name.as_str(), "opening output device");

        let supported = Self::pick_config(&device, sample_rate)?;
        let channels = supported.channels();
        let device_rate = supported.sample_rate().0;
        if device_rate != sample_rate {
            warn!(
                engine_rate = sample_rate,
                device_rate, "device does not support the engine rate; playback pitch will shift"
            );
        }

        info!(
            sample_rate = device_rate,
            channels,
            format = ?supported.sample_format(),
            "audio config selected"
        );

        let config = StreamConfig {
            channels,
            sample_rate: SampleRate(device_rate),
            buffer_size: cpal::BufferSize::Default,
        };
        let ch = channels as usize;

        // Pre-clone one Arc per sample format branch so each closure owns its flag.
        let running_f32 = Arc::clone(&running);
        let running_i16 = Arc::clone(&running);
        let running_u16 = Arc::clone(&running);

        let stream = match supported.sample_format() {
            SampleFormat::F32 => device.build_output_stream(
                &config,
                move |data: &mut [f32], _info| {
                    if !running_f32.load(Ordering::Relaxed) {
                        data.fill(0.0);
                        return;
                    }
                    consumer.render_interleaved(data, ch);
                },
                |err| error!("audio stream error: {err}"),
                None,
            ),

            SampleFormat::I16 => {
                let mut scratch: Vec<f32> = Vec::new();
                device.build_output_stream(
                    &config,
                    move |data: &mut [i16], _info| {
                        if !running_i16.load(Ordering::Relaxed) {
                            data.fill(0);
                            return;
                        }
                        scratch.resize(data.len(), 0.0);
                        consumer.render_interleaved(&mut scratch, ch);
                        for (out, s) in data.iter_mut().zip(&scratch) {
                            *out = (s.clamp(-1.0, 1.0) * i16::MAX as f32) as i16;
                        }
                    },
                    |err| error!("audio stream error: {err}"),
                    None,
                )
            }

            SampleFormat::U16 => {
                let mut scratch: Vec<f32> = Vec::new();
                device.build_output_stream(
                    &config,
                    move |data: &mut [u16], _info| {
                        if !running_u16.load(Ordering::Relaxed) {
                            data.fill(u16::MAX / 2 + 1);
                            return;
                        }
                        scratch.resize(data.len(), 0.0);
                        consumer.render_interleaved(&mut scratch, ch);
                        for (out, s) in data.iter_mut().zip(&scratch) {
                            *out = ((s.clamp(-1.0, 1.0) * 0.5 + 0.5) * u16::MAX as f32) as u16;
                        }
                    },
                    |err| error!("audio stream error: {err}"),
                    None,
                )
            }

            fmt => {
                return Err(BridgeError::AudioStream(format!(
                    "unsupported sample format: {fmt:?}"
                )))
            }
        }
        .map_err(|e| BridgeError::AudioStream(e.to_string()))?;

        stream
            .play()
            .map_err(|e| BridgeError::AudioStream(e.to_string()))?;

        Ok(Self {
            _stream: stream,
            running,
            sample_rate: device_rate,
            channels,
            device_name,
        })
    }

    /// Open the system default output device.
    ///
    /// Must be called from the thread that will also drop this value.
    #[cfg(feature = "audio-cpal")]
    pub fn open_default(
        consumer: ConsumerBridge,
        running: Arc<AtomicBool>,
        sample_rate: u32,
    ) -> Result<Self> {
        Self::open_with_preference(consumer, running, None, sample_rate)
    }

    /// Prefer an `f32` config at the engine rate, then any format at that
    /// rate, then the device default.
    #[cfg(feature = "audio-cpal")]
    fn pick_config(device: &cpal::Device, sample_rate: u32) -> Result<SupportedStreamConfig> {
        let wanted = SampleRate(sample_rate);
        let ranges: Vec<_> = match device.supported_output_configs() {
            Ok(ranges) => ranges.collect(),
            Err(e) => {
                warn!("failed to query output configs: {e}");
                Vec::new()
            }
        };

        let in_range = |r: &&cpal::SupportedStreamConfigRange| {
            r.min_sample_rate() <= wanted && wanted <= r.max_sample_rate()
        };

        if let Some(range) = ranges
            .iter()
            .filter(in_range)
            .find(|r| r.sample_format() == SampleFormat::F32)
            .or_else(|| ranges.iter().find(in_range))
        {
            return Ok(range.clone().with_sample_rate(wanted));
        }

        device
            .default_output_config()
            .map_err(|e| BridgeError::AudioDevice(e.to_string()))
    }

    /// Stop: the callback emits silence from its next invocation on.
    #[cfg(feature = "audio-cpal")]
    pub fn stop(&self) {
        self.running.store(false, Ordering::Release);
    }
}

/// Stub when the `audio-cpal` feature is disabled.
#[cfg(not(feature = "audio-cpal"))]
impl AudioPlayback {
    pub fn open_with_preference(
        _consumer: ConsumerBridge,
        _running: Arc<AtomicBool>,
        _preferred_device_name: Option<&str>,
        _sample_rate: u32,
    ) -> Result<Self> {
        Err(BridgeError::AudioStream(
            "compiled without audio-cpal feature".into(),
        ))
    }

    pub fn open_default(
        consumer: ConsumerBridge,
        running: Arc<AtomicBool>,
        sample_rate: u32,
    ) -> Result<Self> {
        Self::open_with_preference(consumer, running, None, sample_rate)
    }

    pub fn stop(&self) {
        self.running.store(false, Ordering::Release);
    }
}
