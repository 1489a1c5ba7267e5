use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::thread;
use std::time::{Duration, Instant};

use ringbridge_core::bridge::producer;
use ringbridge_core::{
    create_bridges, BridgeDiagnostics, BridgeSession, EngineLocalBuffer, SampleEngine,
    SessionConfig, SessionStatus,
};

/// Emits an incrementing ramp, never more than the read bound allows.
struct RampEngine {
    buffer: EngineLocalBuffer,
    per_tick: usize,
    next: u32,
}

impl RampEngine {
    fn new(capacity: usize, per_tick: usize) -> Self {
        Self {
            buffer: EngineLocalBuffer::new(capacity),
            per_tick,
            next: 0,
        }
    }
}

impl SampleEngine for RampEngine {
    fn local_buffer(&self) -> &EngineLocalBuffer {
        &self.buffer
    }

    fn local_buffer_mut(&mut self) -> &mut EngineLocalBuffer {
        &mut self.buffer
    }

    fn max_tick_samples(&self) -> usize {
        self.per_tick
    }

    fn advance_one_tick(&mut self) {
        let n = self.per_tick.min(self.buffer.headroom());
        for _ in 0..n {
            self.next += 1;
            self.buffer.push(self.next as f32);
        }
    }
}

#[test]
fn ramp_survives_two_free_running_threads() {
    const TARGET: u32 = 200_000;

    let diagnostics = Arc::new(BridgeDiagnostics::default());
    let (mut producer, mut consumer) = create_bridges(
        Box::new(RampEngine::new(1024, 300)),
        Some(1024),
        Arc::clone(&diagnostics),
    )
    .unwrap();

    let done = Arc::new(AtomicBool::new(false));
    let producer_done = Arc::clone(&done);
    let producer_thread = thread::spawn(move || {
        while !producer_done.load(Ordering::Relaxed) {
            producer.tick();
            thread::yield_now();
        }
    });

    let mut expected = 1u32;
    let mut left = [0.0f32; 128];
    let mut right = [0.0f32; 128];
    let deadline = Instant::now() + Duration::from_secs(20);

    while expected <= TARGET {
        assert!(Instant::now() < deadline, "consumer starved at {expected}");
        left.fill(-1.0);
        right.fill(-1.0);
        let copied = consumer.render(&mut [&mut left[..], &mut right[..]]);
        for i in 0..copied {
            assert_eq!(left[i], expected as f32, "gap or reorder at sample {expected}");
            assert_eq!(right[i], left[i]);
            expected += 1;
        }
        // Slots past the copy keep whatever the caller left there.
        assert!(left[copied..].iter().all(|&s| s == -1.0));
        assert!(right[copied..].iter().all(|&s| s == -1.0));
    }

    done.store(true, Ordering::SeqCst);
    producer_thread.join().expect("producer thread panicked");

    let snap = diagnostics.snapshot();
    assert_eq!(snap.overruns, 0);
    assert!(snap.samples_rendered >= TARGET as u64);
}

#[test]
fn cadence_thread_feeds_a_detached_consumer() {
    let session = BridgeSession::new(SessionConfig {
        tick_hz: 1_000.0,
        ..SessionConfig::default()
    });
    let mut status = session.subscribe_status();

    let mut consumer = session
        .start_detached(Box::new(RampEngine::new(4096, 64)))
        .unwrap();
    assert_eq!(status.try_recv().unwrap().status, SessionStatus::Running);
    assert_eq!(session.ring().unwrap().capacity(), 4096);

    let mut out = [0.0f32; 256];
    let mut expected = 1u32;
    let deadline = Instant::now() + Duration::from_secs(10);
    while expected <= 2_000 {
        assert!(Instant::now() < deadline, "cadence produced only {expected} samples");
        let copied = consumer.render(&mut [&mut out[..]]);
        for &s in &out[..copied] {
            assert_eq!(s, expected as f32);
            expected += 1;
        }
        thread::sleep(Duration::from_millis(1));
    }

    session.stop().unwrap();
    assert_eq!(status.try_recv().unwrap().status, SessionStatus::Stopped);

    let snap = session.diagnostics_snapshot();
    assert!(snap.ticks > 0);
    assert_eq!(snap.overruns, 0);
}

#[test]
fn stopping_the_cadence_needs_no_drain() {
    let (producer_bridge, consumer) = create_bridges(
        Box::new(RampEngine::new(256, 16)),
        None,
        Arc::default(),
    )
    .unwrap();

    let running = Arc::new(AtomicBool::new(true));
    let flag = Arc::clone(&running);
    let handle = thread::spawn(move || {
        producer::run(producer_bridge, Duration::from_micros(500), flag)
    });

    thread::sleep(Duration::from_millis(10));
    running.store(false, Ordering::SeqCst);
    handle.join().expect("producer thread panicked");

    // Whatever was published stays readable, bounded by the ring.
    let available = consumer.available();
    assert!(available < consumer.capacity());
    assert!(available > 0);
}
