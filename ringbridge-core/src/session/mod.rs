//! `BridgeSession`: top-level lifecycle controller.
//!
//! ## Lifecycle
//!
//! ```text
//! BridgeSession::new(config)
//!     └─► start_with_device(engine) / start_detached(engine)
//!             validate → ring + bridges → handshake → status = Running
//!         └─► stop()    → running=false, producer joined, status = Stopped
//! ```
//!
//! Misconfiguration is rejected inside `start*` before any thread is spawned.
//! Calling `start*` twice returns `AlreadyRunning`; `stop` while idle returns
//! `NotRunning`.
//!
//! ## Threading
//!
//! The producer runs on its own thread at a fixed cadence. With a device,
//! the consumer bridge is handed to a render-host thread over a one-shot
//! channel (the only cross-thread message of the session); that thread opens
//! the cpal stream, because `cpal::Stream` is `!Send`, and reports back
//! whether the device opened.

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::bounded;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::{error, info, warn};

use crate::{
    audio::AudioPlayback,
    bridge::{
        consumer::ConsumerBridge, create_bridges, producer, BridgeDiagnostics,
        DiagnosticsSnapshot,
    },
    buffering::SharedRing,
    error::{BridgeError, Result},
    events::{SessionStatus, SessionStatusEvent},
    synth::{tone::DEFAULT_TICK_HZ, SampleEngine},
};

/// Broadcast channel capacity for status events.
const BROADCAST_CAP: usize = 64;

/// How often the idle render-host thread checks the running flag.
const HOST_POLL_INTERVAL: Duration = Duration::from_millis(20);

/// Configuration for `BridgeSession`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[serde(default)]
pub struct SessionConfig {
    /// Producer ticks per second. Default: 59.7275.
    pub tick_hz: f64,
    /// Ring length the host expects. Must equal the engine's buffer length
    /// when set; `None` adopts the engine's length.
    pub ring_capacity: Option<usize>,
    /// Output device name. `None` uses the system default.
    pub preferred_output_device: Option<String>,
    /// Rate requested from the output device (Hz). Default: 44100.
    pub sample_rate: u32,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            tick_hz: DEFAULT_TICK_HZ,
            ring_capacity: None,
            preferred_output_device: None,
            sample_rate: 44_100,
        }
    }
}

impl SessionConfig {
    /// # Errors
    /// `InvalidConfig` when `tick_hz` is not a positive finite number.
    pub fn tick_interval(&self) -> Result<Duration> {
        if !(self.tick_hz.is_finite() && self.tick_hz > 0.0) {
            return Err(BridgeError::InvalidConfig(format!(
                "tick_hz must be positive, got {}",
                self.tick_hz
            )));
        }
        Ok(Duration::from_secs_f64(1.0 / self.tick_hz))
    }
}

/// The session handle.
///
/// `BridgeSession` is `Send + Sync`; share it with `Arc` if several threads
/// need to observe or stop it.
pub struct BridgeSession {
    config: SessionConfig,
    /// `true` while the producer cadence and render host are active.
    running: Arc<AtomicBool>,
    status: Arc<Mutex<SessionStatus>>,
    status_tx: broadcast::Sender<SessionStatusEvent>,
    diagnostics: Arc<BridgeDiagnostics>,
    ring: Mutex<Option<Arc<SharedRing>>>,
    threads: Mutex<Vec<JoinHandle<()>>>,
}

impl BridgeSession {
    /// Create a session. Nothing runs until a `start*` call.
    pub fn new(config: SessionConfig) -> Self {
        let (status_tx, _) = broadcast::channel(BROADCAST_CAP);
        Self {
            config,
            running: Arc::new(AtomicBool::new(false)),
            status: Arc::new(Mutex::new(SessionStatus::Idle)),
            status_tx,
            diagnostics: Arc::new(BridgeDiagnostics::default()),
            ring: Mutex::new(None),
            threads: Mutex::new(Vec::new()),
        }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Start the producer cadence and hand the consumer bridge back to the
    /// caller, who drives `render` from its own render thread.
    ///
    /// # Errors
    /// `AlreadyRunning`, or any misconfiguration from bridge setup.
    pub fn start_detached(&self, engine: Box<dyn SampleEngine>) -> Result<ConsumerBridge> {
        // Claim the session before any setup so concurrent starts cannot both win.
        if self
            .running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(BridgeError::AlreadyRunning);
        }

        let interval = match self.config.tick_interval() {
            Ok(i) => i,
            Err(e) => {
                self.running.store(false, Ordering::SeqCst);
                return Err(self.fail(e));
            }
        };
        self.diagnostics.reset();
        let (producer_bridge, consumer) = match create_bridges(
            engine,
            self.config.ring_capacity,
            Arc::clone(&self.diagnostics),
        ) {
            Ok(pair) => pair,
            Err(e) => {
                self.running.store(false, Ordering::SeqCst);
                return Err(self.fail(e));
            }
        };

        *self.ring.lock() = Some(producer_bridge.ring());

        let running = Arc::clone(&self.running);
        let spawned = thread::Builder::new()
            .name("ringbridge-producer".into())
            .spawn(move || producer::run(producer_bridge, interval, running));
        match spawned {
            Ok(handle) => self.threads.lock().push(handle),
            Err(e) => {
                self.running.store(false, Ordering::SeqCst);
                return Err(self.fail(BridgeError::Io(e)));
            }
        }

        self.set_status(SessionStatus::Running, None);
        info!(tick_hz = self.config.tick_hz, "session started");
        Ok(consumer)
    }

    /// Start with the system default output device.
    pub fn start(&self, engine: Box<dyn SampleEngine>) -> Result<()> {
        let preferred = self.config.preferred_output_device.clone();
        self.start_with_device(engine, preferred)
    }

    /// Start the producer cadence and play the consumer side through a cpal
    /// output stream on `preferred_output_device` (or the default device).
    ///
    /// Blocks until the device is confirmed open (or fails).
    ///
    /// # Errors
    /// - `AlreadyRunning` if already started.
    /// - Any misconfiguration from bridge setup.
    /// - `NoDefaultOutputDevice` / `AudioDevice` / `AudioStream` on device error.
    pub fn start_with_device(
        &self,
        engine: Box<dyn SampleEngine>,
        preferred_output_device: Option<String>,
    ) -> Result<()> {
        let consumer = self.start_detached(engine)?;

        // Session-start handshake: the consumer crosses to the host thread once.
        let (handoff_tx, handoff_rx) = bounded::<ConsumerBridge>(1);
        // The host thread reports the opened device rate, or why it failed.
        let (open_tx, open_rx) = bounded::<Result<u32>>(1);

        let running = Arc::clone(&self.running);
        let sample_rate = self.config.sample_rate;

        let spawned = thread::Builder::new()
            .name("ringbridge-render".into())
            .spawn(move || {
                let Ok(consumer) = handoff_rx.recv() else {
                    return;
                };

                // ── Open device (must happen on THIS thread, cpal::Stream is !Send) ──
                let playback = match AudioPlayback::open_with_preference(
                    consumer,
                    Arc::clone(&running),
                    preferred_output_device.as_deref(),
                    sample_rate,
                ) {
                    Ok(p) => {
                        let _ = open_tx.send(Ok(p.sample_rate));
                        p
                    }
                    Err(e) => {
                        let _ = open_tx.send(Err(e));
                        return;
                    }
                };

                while running.load(Ordering::Relaxed) {
                    thread::sleep(HOST_POLL_INTERVAL);
                }

                playback.stop();
                // Stream drops here, releasing the device on this thread.
                drop(playback);
            });

        let handle = match spawned {
            Ok(handle) => handle,
            Err(e) => return Err(self.abort_start(BridgeError::Io(e))),
        };
        self.threads.lock().push(handle);

        if handoff_tx.send(consumer).is_err() {
            return Err(self.abort_start(BridgeError::Other(anyhow::anyhow!(
                "render host exited before the handshake"
            ))));
        }

        match open_rx.recv() {
            Ok(Ok(rate)) => {
                info!(device_rate = rate, "output device open, playing");
                Ok(())
            }
            Ok(Err(e)) => Err(self.abort_start(e)),
            Err(_) => Err(self.abort_start(BridgeError::Other(anyhow::anyhow!(
                "render host died unexpectedly"
            )))),
        }
    }

    /// Stop the producer cadence and silence the render host.
    ///
    /// No draining: every tick and quantum is complete on its own.
    ///
    /// # Errors
    /// `NotRunning` if not currently running.
    pub fn stop(&self) -> Result<()> {
        if !self.running.swap(false, Ordering::SeqCst) {
            return Err(BridgeError::NotRunning);
        }

        self.join_threads();
        self.set_status(SessionStatus::Stopped, None);
        info!(diagnostics = ?self.diagnostics.snapshot(), "session stopped");
        Ok(())
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Current session status (snapshot).
    pub fn status(&self) -> SessionStatus {
        *self.status.lock()
    }

    /// Subscribe to live status change events.
    pub fn subscribe_status(&self) -> broadcast::Receiver<SessionStatusEvent> {
        self.status_tx.subscribe()
    }

    /// Snapshot of bridge counters for observability.
    pub fn diagnostics_snapshot(&self) -> DiagnosticsSnapshot {
        self.diagnostics.snapshot()
    }

    /// Read-only view of the current session's ring, once started.
    pub fn ring(&self) -> Option<Arc<SharedRing>> {
        self.ring.lock().clone()
    }

    // ── Internal helpers ─────────────────────────────────────────────────────

    fn set_status(&self, new_status: SessionStatus, detail: Option<String>) {
        *self.status.lock() = new_status;
        let _ = self.status_tx.send(SessionStatusEvent {
            status: new_status,
            detail,
        });
    }

    /// Setup failure before anything was spawned: one diagnostic, status Error.
    fn fail(&self, e: BridgeError) -> BridgeError {
        error!("session start failed: {e}");
        self.set_status(SessionStatus::Error, Some(e.to_string()));
        e
    }

    /// Setup failure after the producer started: tear it down again.
    fn abort_start(&self, e: BridgeError) -> BridgeError {
        self.running.store(false, Ordering::SeqCst);
        self.join_threads();
        self.fail(e)
    }

    fn join_threads(&self) {
        let handles: Vec<_> = self.threads.lock().drain(..).collect();
        for handle in handles {
            if handle.join().is_err() {
                warn!("bridge thread panicked during shutdown");
            }
        }
    }
}

impl Drop for BridgeSession {
    fn drop(&mut self) {
        if self.running.swap(false, Ordering::SeqCst) {
            self.join_threads();
        }
    }
}
