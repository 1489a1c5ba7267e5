//! Lock-free SPSC sample ring shared between the producer and render threads.
//!
//! `SharedRing` is allocated once per session and never resized. It is split
//! into a [`RingProducer`] held by the producer thread and a [`RingConsumer`]
//! held by the render thread; each handle is the only writer of its cursor.

pub mod ring;
pub mod wrap;

pub use ring::{available_between, create_shared_ring, RingConsumer, RingProducer, SharedRing};
pub use wrap::{copy_wrapping, for_each_segment};
