//! Producer and consumer bridges around the shared ring.
//!
//! ## Per-tick / per-quantum flow
//!
//! ```text
//! producer thread                         render thread
//! ───────────────                         ─────────────
//! 1. snapshot read_pos (Acquire)          1. snapshot write_pos, read_pos
//! 2. engine.advance_one_tick()            2. copy min(available, len) into
//! 3. span = [prev_write, engine_write)       every channel, copied = max
//! 4. WrappingCopy span into ring          3. publish read_pos += copied
//! 5. publish write_pos (Release)
//! ```
//!
//! Both routines finish unconditionally: no locks, no waits, no allocation.

pub mod consumer;
pub mod producer;

use std::sync::{
    atomic::{AtomicU64, AtomicUsize, Ordering},
    Arc,
};

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::{
    buffering::create_shared_ring,
    error::{BridgeError, Result},
    synth::SampleEngine,
};
use consumer::ConsumerBridge;
use producer::ProducerBridge;

/// Counters shared by both bridges. All updates are `Relaxed`: they are
/// observability only and never gate control flow.
pub struct BridgeDiagnostics {
    pub ticks: AtomicU64,
    pub samples_produced: AtomicU64,
    /// Ticks whose new samples overwrote data the consumer had not read.
    pub overruns: AtomicUsize,
    pub quanta: AtomicU64,
    pub samples_rendered: AtomicU64,
    /// Quanta that found fewer samples than the longest channel asked for.
    pub underruns: AtomicUsize,
}

impl Default for BridgeDiagnostics {
    fn default() -> Self {
        Self {
            ticks: AtomicU64::new(0),
            samples_produced: AtomicU64::new(0),
            overruns: AtomicUsize::new(0),
            quanta: AtomicU64::new(0),
            samples_rendered: AtomicU64::new(0),
            underruns: AtomicUsize::new(0),
        }
    }
}

impl BridgeDiagnostics {
    pub fn reset(&self) {
        self.ticks.store(0, Ordering::Relaxed);
        self.samples_produced.store(0, Ordering::Relaxed);
        self.overruns.store(0, Ordering::Relaxed);
        self.quanta.store(0, Ordering::Relaxed);
        self.samples_rendered.store(0, Ordering::Relaxed);
        self.underruns.store(0, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> DiagnosticsSnapshot {
        DiagnosticsSnapshot {
            ticks: self.ticks.load(Ordering::Relaxed),
            samples_produced: self.samples_produced.load(Ordering::Relaxed),
            overruns: self.overruns.load(Ordering::Relaxed),
            quanta: self.quanta.load(Ordering::Relaxed),
            samples_rendered: self.samples_rendered.load(Ordering::Relaxed),
            underruns: self.underruns.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiagnosticsSnapshot {
    pub ticks: u64,
    pub samples_produced: u64,
    pub overruns: usize,
    pub quanta: u64,
    pub samples_rendered: u64,
    pub underruns: usize,
}

/// Validate the engine against the ring it will feed, then build the ring and
/// both bridges.
///
/// `declared_capacity` is the ring length the host configured, if any; it must
/// agree with the engine's buffer length.
///
/// # Errors
/// Any misconfiguration is fatal here, before a single tick runs:
/// `ZeroCapacity`, `CapacityMismatch`, `TickExceedsCapacity` or
/// `CursorMismatch`.
pub fn create_bridges(
    engine: Box<dyn SampleEngine>,
    declared_capacity: Option<usize>,
    diagnostics: Arc<BridgeDiagnostics>,
) -> Result<(ProducerBridge, ConsumerBridge)> {
    let capacity = engine.local_buffer().capacity();
    if let Some(declared) = declared_capacity {
        if declared != capacity {
            return Err(BridgeError::CapacityMismatch {
                engine: capacity,
                ring: declared,
            });
        }
    }

    let (ring_producer, ring_consumer) = create_shared_ring(capacity)?;
    let producer = ProducerBridge::new(ring_producer, engine, Arc::clone(&diagnostics))?;
    let consumer = ConsumerBridge::new(ring_consumer, diagnostics);

    info!(capacity, "sample ring created");
    Ok((producer, consumer))
}
