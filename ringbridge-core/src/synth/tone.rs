//! `ToneEngine`: a small oscillator that behaves like an emulator sound unit.
//!
//! Each tick stands for one emulated video frame. Two production modes:
//!
//! - **Unpaced**: every tick appends `ceil(sample_rate / tick_hz)` samples,
//!   the way a free-running core emits one frame of audio per frame.
//! - **Paced**: every tick tops the unread backlog up to
//!   `target_latency_samples`, using the mirrored read cursor. The engine
//!   then never runs further ahead of the reader than the target.

use std::f32::consts::TAU;

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{local::EngineLocalBuffer, SampleEngine};
use crate::error::{BridgeError, Result};

/// Frame rate of the handheld the bridge was built for (Hz).
pub const DEFAULT_TICK_HZ: f64 = 59.7275;

/// Native buffer length: one second at 44.1 kHz.
pub const DEFAULT_BUFFER_LEN: usize = 44_100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Waveform {
    Sine,
    Square,
    Triangle,
}

impl Waveform {
    /// Value at `phase` in [0, 1), range [-1, 1].
    fn sample(self, phase: f32) -> f32 {
        match self {
            Waveform::Sine => (phase * TAU).sin(),
            Waveform::Square => {
                if phase < 0.5 {
                    1.0
                } else {
                    -1.0
                }
            }
            Waveform::Triangle => 1.0 - 4.0 * (phase - 0.5).abs(),
        }
    }
}

/// Configuration for `ToneEngine`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ToneConfig {
    /// Length of the engine buffer, and therefore of the shared ring.
    /// Default: 44100.
    pub buffer_len: usize,
    /// Output sample rate (Hz). Default: 44100.
    pub sample_rate: u32,
    /// Oscillator frequency (Hz). Default: 440.
    pub frequency_hz: f32,
    /// Peak amplitude in [0, 1]. Default: 0.25.
    pub amplitude: f32,
    pub waveform: Waveform,
    /// Ticks per second. Default: 59.7275.
    pub tick_hz: f64,
    /// Unread backlog to maintain, in samples. `None` runs unpaced.
    /// Default: 1470 (1/30 s at 44.1 kHz).
    pub target_latency_samples: Option<usize>,
}

impl Default for ToneConfig {
    fn default() -> Self {
        Self {
            buffer_len: DEFAULT_BUFFER_LEN,
            sample_rate: 44_100,
            frequency_hz: 440.0,
            amplitude: 0.25,
            waveform: Waveform::Sine,
            tick_hz: DEFAULT_TICK_HZ,
            target_latency_samples: Some(44_100 / 30),
        }
    }
}

impl ToneConfig {
    /// Samples appended per tick in unpaced mode.
    pub fn samples_per_tick(&self) -> usize {
        (self.sample_rate as f64 / self.tick_hz).ceil() as usize
    }
}

/// Oscillator engine writing into its own `EngineLocalBuffer`.
#[derive(Debug, Clone)]
pub struct ToneEngine {
    config: ToneConfig,
    buffer: EngineLocalBuffer,
    phase: f32,
    phase_step: f32,
    max_tick: usize,
    ticks: u64,
}

impl ToneEngine {
    /// # Errors
    /// `BridgeError::ZeroCapacity` for an empty buffer,
    /// `BridgeError::InvalidConfig` for non-positive rates, and
    /// `BridgeError::TickExceedsCapacity` when one tick could fill the whole
    /// buffer. A full-buffer tick lands the write cursor back on the read
    /// cursor and reads as empty, so the engine stays strictly below it.
    pub fn new(config: ToneConfig) -> Result<Self> {
        if config.buffer_len == 0 {
            return Err(BridgeError::ZeroCapacity);
        }
        if config.sample_rate == 0 {
            return Err(BridgeError::InvalidConfig("sample_rate must be positive".into()));
        }
        if !(config.tick_hz.is_finite() && config.tick_hz > 0.0) {
            return Err(BridgeError::InvalidConfig(format!(
                "tick_hz must be positive, got {}",
                config.tick_hz
            )));
        }

        let max_tick = config
            .target_latency_samples
            .unwrap_or_else(|| config.samples_per_tick());
        if max_tick >= config.buffer_len {
            return Err(BridgeError::TickExceedsCapacity {
                tick: max_tick,
                capacity: config.buffer_len,
            });
        }

        let phase_step = config.frequency_hz / config.sample_rate as f32;
        debug!(
            max_tick,
            phase_step,
            paced = config.target_latency_samples.is_some(),
            "tone engine configured"
        );

        Ok(Self {
            buffer: EngineLocalBuffer::new(config.buffer_len),
            config,
            phase: 0.0,
            phase_step,
            max_tick,
            ticks: 0,
        })
    }

    pub fn config(&self) -> &ToneConfig {
        &self.config
    }

    /// Ticks advanced so far.
    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    fn samples_for_this_tick(&self) -> usize {
        match self.config.target_latency_samples {
            Some(target) => target.saturating_sub(self.buffer.cached()),
            None => self.max_tick,
        }
    }

    fn next_sample(&mut self) -> f32 {
        let value = self.config.waveform.sample(self.phase) * self.config.amplitude;
        self.phase = (self.phase + self.phase_step).fract();
        value
    }
}

impl SampleEngine for ToneEngine {
    fn local_buffer(&self) -> &EngineLocalBuffer {
        &self.buffer
    }

    fn local_buffer_mut(&mut self) -> &mut EngineLocalBuffer {
        &mut self.buffer
    }

    fn max_tick_samples(&self) -> usize {
        self.max_tick
    }

    fn advance_one_tick(&mut self) {
        let n = self.samples_for_this_tick();
        for _ in 0..n {
            let s = self.next_sample();
            self.buffer.push(s);
        }
        self.ticks += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn unpaced(sample_rate: u32, tick_hz: f64) -> ToneConfig {
        ToneConfig {
            buffer_len: 4096,
            sample_rate,
            tick_hz,
            target_latency_samples: None,
            ..ToneConfig::default()
        }
    }

    #[test]
    fn unpaced_tick_rounds_up() {
        let mut engine = ToneEngine::new(unpaced(44_100, DEFAULT_TICK_HZ)).unwrap();
        assert_eq!(engine.max_tick_samples(), 739);
        engine.advance_one_tick();
        engine.advance_one_tick();
        assert_eq!(engine.local_buffer().write_position(), 2 * 739);
        assert_eq!(engine.ticks(), 2);
    }

    #[test]
    fn paced_engine_stops_at_target() {
        let config = ToneConfig {
            buffer_len: 4096,
            target_latency_samples: Some(1000),
            ..ToneConfig::default()
        };
        let mut engine = ToneEngine::new(config).unwrap();

        engine.advance_one_tick();
        assert_eq!(engine.local_buffer().cached(), 1000);

        // Nothing read yet: the next tick must not add anything.
        engine.advance_one_tick();
        assert_eq!(engine.local_buffer().write_position(), 1000);

        // Reader caught up on 300 samples: exactly 300 are topped up.
        engine.local_buffer_mut().set_read_mirror(300);
        engine.advance_one_tick();
        assert_eq!(engine.local_buffer().write_position(), 1300);
        assert_eq!(engine.local_buffer().cached(), 1000);
    }

    #[test]
    fn amplitude_bounds_every_waveform() {
        for waveform in [Waveform::Sine, Waveform::Square, Waveform::Triangle] {
            let config = ToneConfig {
                waveform,
                amplitude: 0.5,
                frequency_hz: 1000.0,
                ..unpaced(8_000, 10.0)
            };
            let mut engine = ToneEngine::new(config).unwrap();
            engine.advance_one_tick();
            let peak = engine.local_buffer().as_slice()[..800]
                .iter()
                .fold(0.0f32, |m, s| m.max(s.abs()));
            assert!(peak <= 0.5 + 1e-6, "{waveform:?} peak {peak}");
            assert!(peak > 0.4, "{waveform:?} peak {peak}");
        }
    }

    #[test]
    fn sine_starts_at_zero_and_reaches_quarter_period_peak() {
        let config = ToneConfig {
            frequency_hz: 100.0,
            amplitude: 1.0,
            ..unpaced(400, 1.0)
        };
        let mut engine = ToneEngine::new(config).unwrap();
        engine.advance_one_tick();
        let s = engine.local_buffer().as_slice();
        assert_abs_diff_eq!(s[0], 0.0, epsilon = 1e-6);
        assert_abs_diff_eq!(s[1], 1.0, epsilon = 1e-6);
        assert_abs_diff_eq!(s[3], -1.0, epsilon = 1e-6);
    }

    #[test]
    fn rejects_tick_larger_than_buffer() {
        let config = ToneConfig {
            buffer_len: 100,
            ..unpaced(44_100, 60.0)
        };
        assert!(matches!(
            ToneEngine::new(config),
            Err(BridgeError::TickExceedsCapacity { tick: 735, capacity: 100 })
        ));
    }

    #[test]
    fn rejects_tick_equal_to_buffer() {
        let unpaced = ToneConfig {
            buffer_len: 44_100,
            ..unpaced(44_100, 1.0)
        };
        assert!(matches!(
            ToneEngine::new(unpaced),
            Err(BridgeError::TickExceedsCapacity { tick: 44_100, capacity: 44_100 })
        ));

        let paced = ToneConfig {
            buffer_len: 1024,
            target_latency_samples: Some(1024),
            ..ToneConfig::default()
        };
        assert!(matches!(
            ToneEngine::new(paced),
            Err(BridgeError::TickExceedsCapacity { tick: 1024, capacity: 1024 })
        ));

        let largest = ToneConfig {
            buffer_len: 1024,
            target_latency_samples: Some(1023),
            ..ToneConfig::default()
        };
        assert_eq!(ToneEngine::new(largest).unwrap().max_tick_samples(), 1023);
    }

    #[test]
    fn rejects_bad_rates() {
        let config = ToneConfig {
            tick_hz: 0.0,
            ..ToneConfig::default()
        };
        assert!(matches!(ToneEngine::new(config), Err(BridgeError::InvalidConfig(_))));

        let config = ToneConfig {
            sample_rate: 0,
            ..ToneConfig::default()
        };
        assert!(matches!(ToneEngine::new(config), Err(BridgeError::InvalidConfig(_))));
    }
}
