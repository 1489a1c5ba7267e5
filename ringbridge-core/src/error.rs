use thiserror::Error;

/// All errors produced by ringbridge-core.
///
/// Every variant is a setup or lifecycle failure. Overflow and underrun are
/// steady-state policies and never surface here.
#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("ring capacity must be non-zero")]
    ZeroCapacity,

    #[error("engine buffer holds {engine} samples but the ring holds {ring}")]
    CapacityMismatch { engine: usize, ring: usize },

    #[error("engine may produce {tick} samples per tick, ring capacity is {capacity}")]
    TickExceedsCapacity { tick: usize, capacity: usize },

    #[error("engine write index {engine} does not match ring write cursor {ring}")]
    CursorMismatch { engine: usize, ring: usize },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("audio device error: {0}")]
    AudioDevice(String),

    #[error("audio stream error: {0}")]
    AudioStream(String),

    #[error("no default output device found")]
    NoDefaultOutputDevice,

    #[error("session is already running")]
    AlreadyRunning,

    #[error("session is not running")]
    NotRunning,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl BridgeError {
    /// `true` for errors that mean the producer and ring disagree about
    /// their shape. These abort session start.
    pub fn is_misconfiguration(&self) -> bool {
        matches!(
            self,
            BridgeError::ZeroCapacity
                | BridgeError::CapacityMismatch { .. }
                | BridgeError::TickExceedsCapacity { .. }
                | BridgeError::CursorMismatch { .. }
                | BridgeError::InvalidConfig(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, BridgeError>;
