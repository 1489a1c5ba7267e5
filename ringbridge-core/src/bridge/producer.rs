//! Producer side: advance the engine, copy its new samples into the ring.
//!
//! The producer never waits for the consumer. If the engine outpaces the
//! render thread, unread ring data is overwritten and the tick is counted in
//! `BridgeDiagnostics::overruns`; blocking here would stall the clock that
//! drives the whole emulation.

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, info};

use super::BridgeDiagnostics;
use crate::{
    buffering::{available_between, RingProducer, SharedRing},
    error::{BridgeError, Result},
    synth::SampleEngine,
};

/// What one tick did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TickReport {
    /// Samples the engine appended this tick.
    pub produced: u64,
    /// Samples copied into the ring (`min(produced, capacity)`).
    pub copied: usize,
    /// Whether the copy overwrote samples the consumer had not read.
    pub overran: bool,
}

/// Runs on the producer thread and owns the engine plus the ring's write side.
pub struct ProducerBridge {
    ring: RingProducer,
    engine: Box<dyn SampleEngine>,
    /// Engine write position already mirrored into the ring.
    prev_write: u64,
    diagnostics: Arc<BridgeDiagnostics>,
}

impl ProducerBridge {
    /// # Errors
    /// - `CapacityMismatch` if the engine buffer and ring differ in length.
    /// - `TickExceedsCapacity` if one tick may produce more than the ring holds.
    /// - `CursorMismatch` if the engine's write index is not where the ring's
    ///   write cursor is.
    pub fn new(
        ring: RingProducer,
        engine: Box<dyn SampleEngine>,
        diagnostics: Arc<BridgeDiagnostics>,
    ) -> Result<Self> {
        let capacity = ring.capacity();
        let local = engine.local_buffer();

        if local.capacity() != capacity {
            return Err(BridgeError::CapacityMismatch {
                engine: local.capacity(),
                ring: capacity,
            });
        }

        let tick = engine.max_tick_samples();
        if tick > capacity {
            return Err(BridgeError::TickExceedsCapacity { tick, capacity });
        }

        if local.write_index() != ring.write_pos() {
            return Err(BridgeError::CursorMismatch {
                engine: local.write_index(),
                ring: ring.write_pos(),
            });
        }

        let prev_write = local.write_position();
        debug!(capacity, max_tick = tick, "producer bridge ready");

        Ok(Self {
            ring,
            engine,
            prev_write,
            diagnostics,
        })
    }

    pub fn capacity(&self) -> usize {
        self.ring.capacity()
    }

    pub fn engine(&self) -> &dyn SampleEngine {
        self.engine.as_ref()
    }

    pub fn engine_mut(&mut self) -> &mut dyn SampleEngine {
        self.engine.as_mut()
    }

    /// Read-only view of the shared ring.
    pub fn ring(&self) -> Arc<SharedRing> {
        self.ring.observer()
    }

    /// Advance the engine by one tick and publish what it produced.
    pub fn tick(&mut self) -> TickReport {
        let capacity = self.ring.capacity();

        // ── 1. Bound for this tick ───────────────────────────────────────
        let local_read = self.ring.read_pos();
        self.engine.local_buffer_mut().set_read_mirror(local_read);

        // ── 2. Run the engine ────────────────────────────────────────────
        self.engine.advance_one_tick();

        // ── 3. New span [prev_write, engine_write) ───────────────────────
        let local = self.engine.local_buffer();
        let engine_write = local.write_position();
        let produced = engine_write.saturating_sub(self.prev_write);
        // Only the newest `capacity` samples still exist in the engine buffer.
        let copied = produced.min(capacity as u64) as usize;
        let src_offset = ((engine_write - copied as u64) % capacity as u64) as usize;

        let undrained = available_between(self.ring.write_pos(), local_read, capacity);
        let overran = copied > 0 && undrained + copied >= capacity;

        // ── 4. Copy into the ring ────────────────────────────────────────
        self.ring
            .copy_from_circular(local.as_slice(), src_offset, copied);

        // ── 5. Publish ───────────────────────────────────────────────────
        self.ring.publish((engine_write % capacity as u64) as usize);
        self.prev_write = engine_write;

        self.diagnostics.ticks.fetch_add(1, Ordering::Relaxed);
        self.diagnostics
            .samples_produced
            .fetch_add(produced, Ordering::Relaxed);
        if overran {
            self.diagnostics.overruns.fetch_add(1, Ordering::Relaxed);
        }

        TickReport {
            produced,
            copied,
            overran,
        }
    }
}

/// Tick `producer` every `interval` until `running` is cleared.
///
/// Deadlines advance by exactly one interval per tick so the cadence does not
/// drift. When the thread falls more than one interval behind (suspend,
/// debugger, overloaded host) the schedule is re-anchored to now rather than
/// bursting through the missed ticks.
pub fn run(mut producer: ProducerBridge, interval: Duration, running: Arc<AtomicBool>) {
    info!(interval_us = interval.as_micros() as u64, "producer cadence started");

    let mut deadline = Instant::now();
    loop {
        if !running.load(Ordering::Relaxed) {
            break;
        }

        producer.tick();

        deadline += interval;
        let now = Instant::now();
        if deadline > now {
            thread::sleep(deadline - now);
        } else if now - deadline > interval {
            debug!(
                behind_us = (now - deadline).as_micros() as u64,
                "producer fell behind, re-anchoring cadence"
            );
            deadline = now;
        }
    }

    info!("producer cadence stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffering::create_shared_ring;
    use crate::synth::local::EngineLocalBuffer;

    /// Appends a fixed script of tick sizes, writing a running counter.
    struct Scripted {
        buffer: EngineLocalBuffer,
        ticks: Vec<usize>,
        next: usize,
        counter: f32,
    }

    impl Scripted {
        fn new(capacity: usize, ticks: Vec<usize>) -> Self {
            Self {
                buffer: EngineLocalBuffer::new(capacity),
                ticks,
                next: 0,
                counter: 0.0,
            }
        }
    }

    impl SampleEngine for Scripted {
        fn local_buffer(&self) -> &EngineLocalBuffer {
            &self.buffer
        }

        fn local_buffer_mut(&mut self) -> &mut EngineLocalBuffer {
            &mut self.buffer
        }

        fn max_tick_samples(&self) -> usize {
            self.ticks.iter().copied().max().unwrap_or(0)
        }

        fn advance_one_tick(&mut self) {
            let n = self.ticks.get(self.next).copied().unwrap_or(0);
            self.next += 1;
            for _ in 0..n {
                self.counter += 1.0;
                self.buffer.push(self.counter);
            }
        }
    }

    fn bridge(capacity: usize, ticks: Vec<usize>) -> (ProducerBridge, crate::RingConsumer) {
        let (ring, consumer) = create_shared_ring(capacity).unwrap();
        let producer =
            ProducerBridge::new(ring, Box::new(Scripted::new(capacity, ticks)), Arc::default())
                .unwrap();
        (producer, consumer)
    }

    #[test]
    fn rejects_capacity_mismatch() {
        let (ring, _consumer) = create_shared_ring(8).unwrap();
        let err = ProducerBridge::new(ring, Box::new(Scripted::new(16, vec![4])), Arc::default())
            .err()
            .unwrap();
        assert!(matches!(err, BridgeError::CapacityMismatch { engine: 16, ring: 8 }));
    }

    #[test]
    fn rejects_tick_larger_than_ring() {
        let (ring, _consumer) = create_shared_ring(8).unwrap();
        let err = ProducerBridge::new(ring, Box::new(Scripted::new(8, vec![9])), Arc::default())
            .err()
            .unwrap();
        assert!(matches!(err, BridgeError::TickExceedsCapacity { tick: 9, capacity: 8 }));
    }

    #[test]
    fn rejects_engine_that_already_ran() {
        let (ring, _consumer) = create_shared_ring(8).unwrap();
        let mut engine = Scripted::new(8, vec![3]);
        engine.advance_one_tick();
        let err = ProducerBridge::new(ring, Box::new(engine), Arc::default())
            .err()
            .unwrap();
        assert!(matches!(err, BridgeError::CursorMismatch { engine: 3, ring: 0 }));
    }

    #[test]
    fn tick_publishes_new_samples() {
        let (mut producer, mut consumer) = bridge(8, vec![3, 0, 2]);

        let report = producer.tick();
        assert_eq!(report, TickReport { produced: 3, copied: 3, overran: false });
        assert_eq!(consumer.available(), 3);

        // An empty tick still publishes, to the same cursor.
        assert_eq!(producer.tick().produced, 0);
        assert_eq!(consumer.write_pos(), 3);

        producer.tick();
        let mut out = [0.0f32; 5];
        assert_eq!(consumer.pop_slice(&mut out), 5);
        assert_eq!(out, [1.0, 2.0, 3.0, 4.0, 5.0]);
    }

    #[test]
    fn tick_copies_across_the_wrap() {
        let (mut producer, mut consumer) = bridge(8, vec![6, 5]);
        producer.tick();
        let mut sink = [0.0f32; 6];
        consumer.pop_slice(&mut sink);

        producer.tick();
        assert_eq!(consumer.write_pos(), 3);
        let mut out = [0.0f32; 5];
        assert_eq!(consumer.pop_slice(&mut out), 5);
        assert_eq!(out, [7.0, 8.0, 9.0, 10.0, 11.0]);
    }

    #[test]
    fn overflow_is_lossy_and_counted() {
        let diagnostics = Arc::new(BridgeDiagnostics::default());
        let (ring, consumer) = create_shared_ring(4).unwrap();
        let mut producer = ProducerBridge::new(
            ring,
            Box::new(Scripted::new(4, vec![3, 3])),
            Arc::clone(&diagnostics),
        )
        .unwrap();

        assert!(!producer.tick().overran);
        let report = producer.tick();
        assert!(report.overran);
        assert_eq!(consumer.write_pos(), 2);
        assert_eq!(consumer.available(), 2);
        assert_eq!(diagnostics.snapshot().overruns, 1);
        assert_eq!(diagnostics.snapshot().samples_produced, 6);
    }

    #[test]
    fn read_cursor_is_mirrored_before_each_tick() {
        let (mut producer, mut consumer) = bridge(8, vec![4, 1]);
        producer.tick();
        let mut out = [0.0f32; 3];
        consumer.pop_slice(&mut out);

        producer.tick();
        assert_eq!(producer.engine().local_buffer().read_mirror(), 3);
    }

    #[test]
    fn cadence_stops_when_flag_clears() {
        let (producer, _consumer) = bridge(64, vec![1; 1000]);
        let running = Arc::new(AtomicBool::new(true));
        let flag = Arc::clone(&running);
        let handle = thread::spawn(move || run(producer, Duration::from_millis(1), flag));

        thread::sleep(Duration::from_millis(20));
        running.store(false, Ordering::SeqCst);
        handle.join().expect("producer thread panicked");
    }
}
