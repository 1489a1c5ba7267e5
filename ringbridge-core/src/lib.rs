//! # ringbridge-core
//!
//! Lock-free bridge between a ticking synthesis engine and a real-time audio
//! callback.
//!
//! ## Architecture
//!
//! ```text
//! SampleEngine::advance_one_tick ─► EngineLocalBuffer
//!                                        │  (producer thread, fixed cadence)
//!                                   ProducerBridge ── WrappingCopy ──► SharedRing
//!                                                                        │
//!                                   ConsumerBridge ◄── WrappingCopy ─────┘
//!                                        │  (render thread, per quantum)
//!                                   output channels (identical mono copy)
//! ```
//!
//! Neither bridge locks, blocks or allocates once the session is running.
//! Overflow and underrun are absorbed by policy and only show up in
//! [`bridge::BridgeDiagnostics`].

#![forbid(unsafe_code)]
#![warn(clippy::all)]

pub mod audio;
pub mod bridge;
pub mod buffering;
pub mod error;
pub mod events;
pub mod session;
pub mod synth;

// Convenience re-exports for downstream crates
pub use bridge::{
    consumer::ConsumerBridge, create_bridges, producer::ProducerBridge, BridgeDiagnostics,
    DiagnosticsSnapshot,
};
pub use buffering::{create_shared_ring, RingConsumer, RingProducer, SharedRing};
pub use error::BridgeError;
pub use events::{SessionStatus, SessionStatusEvent};
pub use session::{BridgeSession, SessionConfig};
pub use synth::{
    local::EngineLocalBuffer,
    tone::{ToneConfig, ToneEngine, Waveform},
    SampleEngine,
};
