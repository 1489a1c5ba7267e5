//! Sample engine abstraction.
//!
//! The `SampleEngine` trait is the producer-side extensibility point: an
//! emulator's sound unit, the bundled [`tone::ToneEngine`], or a scripted test
//! engine all plug into [`ProducerBridge`](crate::bridge::producer::ProducerBridge)
//! the same way.

pub mod local;
pub mod tone;

use local::EngineLocalBuffer;

/// Contract for anything that produces mono samples in fixed ticks.
///
/// Engines are exclusively owned by the producer thread.
pub trait SampleEngine: Send + 'static {
    /// The engine's private circular buffer. Its capacity is the session's
    /// ring capacity and must not change after construction.
    fn local_buffer(&self) -> &EngineLocalBuffer;

    /// Mutable access, used by the producer to mirror the read cursor before
    /// each tick.
    fn local_buffer_mut(&mut self) -> &mut EngineLocalBuffer;

    /// Upper bound on samples appended by one `advance_one_tick` call.
    /// Checked against the ring capacity at session setup.
    fn max_tick_samples(&self) -> usize;

    /// Advance by exactly one tick, appending new samples to the local
    /// buffer. The buffer's `read_mirror` marks where unread data begins;
    /// engines that respect it never overwrite samples the consumer has not
    /// seen yet.
    fn advance_one_tick(&mut self);
}

impl SampleEngine for Box<dyn SampleEngine> {
    fn local_buffer(&self) -> &EngineLocalBuffer {
        (**self).local_buffer()
    }

    fn local_buffer_mut(&mut self) -> &mut EngineLocalBuffer {
        (**self).local_buffer_mut()
    }

    fn max_tick_samples(&self) -> usize {
        (**self).max_tick_samples()
    }

    fn advance_one_tick(&mut self) {
        (**self).advance_one_tick()
    }
}
