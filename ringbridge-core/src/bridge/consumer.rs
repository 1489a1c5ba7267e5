//! Render side: fan the mono ring out to every output channel.

use std::sync::{atomic::Ordering, Arc};

use super::BridgeDiagnostics;
use crate::buffering::{available_between, RingConsumer, SharedRing};

/// Runs on the render thread and owns the ring's read side.
///
/// Safe to call from a real-time audio callback: `render` and
/// `render_interleaved` take no locks, never wait and never allocate.
pub struct ConsumerBridge {
    ring: RingConsumer,
    /// One ring's worth of staging for interleaved output, allocated up front.
    scratch: Vec<f32>,
    diagnostics: Arc<BridgeDiagnostics>,
}

impl ConsumerBridge {
    pub fn new(ring: RingConsumer, diagnostics: Arc<BridgeDiagnostics>) -> Self {
        let scratch = vec![0.0; ring.capacity()];
        Self {
            ring,
            scratch,
            diagnostics,
        }
    }

    pub fn capacity(&self) -> usize {
        self.ring.capacity()
    }

    pub fn available(&self) -> usize {
        self.ring.available()
    }

    /// Read-only view of the shared ring.
    pub fn ring(&self) -> Arc<SharedRing> {
        self.ring.observer()
    }

    /// Copy available samples into every planar output channel.
    ///
    /// Each channel receives `min(available, channel.len())` samples from the
    /// same read position; slots past that are left untouched, so silent
    /// destinations stay silent on underrun. The read cursor then advances by
    /// the largest count any channel took, even when shorter channels took
    /// fewer. Returns that count.
    pub fn render(&mut self, outputs: &mut [&mut [f32]]) -> usize {
        let capacity = self.ring.capacity();
        let write_pos = self.ring.write_pos();
        let read_pos = self.ring.read_pos();
        let available = available_between(write_pos, read_pos, capacity);

        let mut copied = 0;
        let mut requested = 0;
        for channel in outputs.iter_mut() {
            let to_copy = available.min(channel.len());
            self.ring.copy_to(&mut channel[..to_copy], read_pos);
            copied = copied.max(to_copy);
            requested = requested.max(channel.len());
        }

        self.ring.publish(read_pos + copied);
        self.record(copied, available < requested);
        copied
    }

    /// Render into one interleaved buffer of `channels`-sample frames.
    ///
    /// Every channel of a frame gets the same sample. Frames past the
    /// available data are zeroed, since device buffers are not guaranteed
    /// to arrive silent. Returns the number of frames taken from the ring.
    pub fn render_interleaved(&mut self, data: &mut [f32], channels: usize) -> usize {
        let channels = channels.max(1);
        let frames = data.len() / channels;
        let capacity = self.ring.capacity();
        let write_pos = self.ring.write_pos();
        let read_pos = self.ring.read_pos();
        let available = available_between(write_pos, read_pos, capacity);

        let to_copy = available.min(frames);
        self.ring.copy_to(&mut self.scratch[..to_copy], read_pos);

        for (i, frame) in data.chunks_exact_mut(channels).enumerate() {
            let value = if i < to_copy { self.scratch[i] } else { 0.0 };
            frame.fill(value);
        }
        // Trailing partial frame, if the host handed us one.
        let tail = frames * channels;
        data[tail..].fill(0.0);

        self.ring.publish(read_pos + to_copy);
        self.record(to_copy, available < frames);
        to_copy
    }

    fn record(&self, copied: usize, underrun: bool) {
        self.diagnostics.quanta.fetch_add(1, Ordering::Relaxed);
        self.diagnostics
            .samples_rendered
            .fetch_add(copied as u64, Ordering::Relaxed);
        if underrun {
            self.diagnostics.underruns.fetch_add(1, Ordering::Relaxed);
        }
    }
}
