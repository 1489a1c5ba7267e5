//! The cross-thread sample ring and its two role handles.
//!
//! ## Memory ordering
//!
//! | Field | Writer | Store | Reader | Load |
//! |-------|--------|-------|--------|------|
//! | samples | producer | `Relaxed` | consumer | `Relaxed` |
//! | `write_pos` | producer | `Release` | consumer | `Acquire` |
//! | `read_pos` | consumer | `Release` | producer | `Acquire` |
//!
//! Sample stores happen before the `write_pos` release, so a consumer that
//! acquires the new cursor sees the new samples. The consumer releases
//! `read_pos` only after it has loaded the samples it is giving back.
//!
//! No slot is reserved: `available() == 0` always means empty, and the ring
//! can never report `capacity` unread samples. A producer that outruns the
//! consumer overwrites unread data and the cursor arithmetic simply wraps.

use std::fmt;
use std::sync::{
    atomic::{AtomicU32, AtomicUsize, Ordering},
    Arc,
};

use super::wrap::for_each_segment;
use crate::error::{BridgeError, Result};

/// Fixed-capacity mono sample buffer plus its write and read cursors.
///
/// Only the read-only surface is public. Mutation goes through
/// [`RingProducer`] (samples, `write_pos`) and [`RingConsumer`] (`read_pos`),
/// one of each per ring.
pub struct SharedRing {
    /// `f32` bit patterns; zero bits are `0.0`, so a fresh ring is silent.
    samples: Box<[AtomicU32]>,
    write_pos: AtomicUsize,
    read_pos: AtomicUsize,
}

impl SharedRing {
    fn new(capacity: usize) -> Result<Self> {
        if capacity == 0 {
            return Err(BridgeError::ZeroCapacity);
        }
        let samples = (0..capacity).map(|_| AtomicU32::new(0)).collect();
        Ok(Self {
            samples,
            write_pos: AtomicUsize::new(0),
            read_pos: AtomicUsize::new(0),
        })
    }

    pub fn capacity(&self) -> usize {
        self.samples.len()
    }

    pub fn write_pos(&self) -> usize {
        self.write_pos.load(Ordering::Acquire)
    }

    pub fn read_pos(&self) -> usize {
        self.read_pos.load(Ordering::Acquire)
    }

    /// Unread sample count, `(write_pos - read_pos + C) mod C`.
    pub fn available(&self) -> usize {
        available_between(self.write_pos(), self.read_pos(), self.capacity())
    }

    fn store(&self, start: usize, values: &[f32]) {
        let slots = &self.samples[start..start + values.len()];
        for (slot, value) in slots.iter().zip(values) {
            slot.store(value.to_bits(), Ordering::Relaxed);
        }
    }

    fn load(&self, start: usize, out: &mut [f32]) {
        let slots = &self.samples[start..start + out.len()];
        for (value, slot) in out.iter_mut().zip(slots) {
            *value = f32::from_bits(slot.load(Ordering::Relaxed));
        }
    }
}

impl fmt::Debug for SharedRing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SharedRing")
            .field("capacity", &self.capacity())
            .field("write_pos", &self.write_pos())
            .field("read_pos", &self.read_pos())
            .finish()
    }
}

/// Unread count for a cursor pair on a ring of `capacity` slots.
pub fn available_between(write_pos: usize, read_pos: usize, capacity: usize) -> usize {
    (write_pos + capacity - read_pos) % capacity
}

/// Create a ring of `capacity` samples and split it into its two handles.
///
/// # Errors
/// Returns `BridgeError::ZeroCapacity` when `capacity == 0`.
pub fn create_shared_ring(capacity: usize) -> Result<(RingProducer, RingConsumer)> {
    let ring = Arc::new(SharedRing::new(capacity)?);
    Ok((
        RingProducer {
            ring: Arc::clone(&ring),
        },
        RingConsumer { ring },
    ))
}

/// Producer half: owns the samples and `write_pos`.
#[derive(Debug)]
pub struct RingProducer {
    ring: Arc<SharedRing>,
}

impl RingProducer {
    pub fn capacity(&self) -> usize {
        self.ring.capacity()
    }

    /// Own cursor; no other thread writes it.
    pub fn write_pos(&self) -> usize {
        self.ring.write_pos.load(Ordering::Relaxed)
    }

    /// Consumer's last published read cursor.
    pub fn read_pos(&self) -> usize {
        self.ring.read_pos()
    }

    pub fn available(&self) -> usize {
        available_between(self.write_pos(), self.read_pos(), self.capacity())
    }

    /// Copy `length` samples from a circular `src` of the same capacity,
    /// starting at `src_offset`, into the identical ring positions.
    ///
    /// Not visible to the consumer until [`publish`](Self::publish).
    ///
    /// # Panics
    /// Panics if `src` is shorter than the ring, or if `length` exceeds the
    /// capacity or `src_offset` lies outside it.
    pub fn copy_from_circular(&mut self, src: &[f32], src_offset: usize, length: usize) {
        debug_assert_eq!(src.len(), self.capacity());
        for_each_segment(src_offset, length, self.capacity(), |range, _| {
            self.ring.store(range.start, &src[range]);
        });
    }

    /// Commit a new write cursor (taken mod capacity).
    pub fn publish(&mut self, write_pos: usize) {
        self.ring
            .write_pos
            .store(write_pos % self.capacity(), Ordering::Release);
    }

    /// Write `samples` at the write cursor and publish the advanced cursor.
    ///
    /// Unread data is overwritten without complaint. When `samples` is longer
    /// than the ring only its newest `capacity` samples are kept. Returns the
    /// number of samples stored.
    pub fn push_slice(&mut self, samples: &[f32]) -> usize {
        let capacity = self.capacity();
        let dropped = samples.len().saturating_sub(capacity);
        let samples = &samples[dropped..];
        let start = (self.write_pos() + dropped) % capacity;

        // The split is symmetric: ranges index the ring, deltas index `samples`.
        for_each_segment(start, samples.len(), capacity, |range, delta| {
            let len = range.len();
            self.ring.store(range.start, &samples[delta..delta + len]);
        });
        self.publish(start + samples.len());
        samples.len()
    }

    /// Read-only view of the shared ring for monitoring.
    pub fn observer(&self) -> Arc<SharedRing> {
        Arc::clone(&self.ring)
    }
}

/// Consumer half: owns `read_pos`.
#[derive(Debug)]
pub struct RingConsumer {
    ring: Arc<SharedRing>,
}

impl RingConsumer {
    pub fn capacity(&self) -> usize {
        self.ring.capacity()
    }

    /// Producer's last published write cursor.
    pub fn write_pos(&self) -> usize {
        self.ring.write_pos()
    }

    /// Own cursor; no other thread writes it.
    pub fn read_pos(&self) -> usize {
        self.ring.read_pos.load(Ordering::Relaxed)
    }

    pub fn available(&self) -> usize {
        available_between(self.write_pos(), self.read_pos(), self.capacity())
    }

    /// Copy `dst.len()` samples starting at ring index `src_offset` into
    /// `dst`, wrapping at the end of the ring.
    ///
    /// # Panics
    /// Panics if `dst` is longer than the ring or `src_offset` lies outside
    /// it.
    pub fn copy_to(&self, dst: &mut [f32], src_offset: usize) {
        for_each_segment(src_offset, dst.len(), self.capacity(), |range, delta| {
            let len = range.len();
            self.ring.load(range.start, &mut dst[delta..delta + len]);
        });
    }

    /// Commit a new read cursor (taken mod capacity).
    pub fn publish(&mut self, read_pos: usize) {
        self.ring
            .read_pos
            .store(read_pos % self.capacity(), Ordering::Release);
    }

    /// Drain up to `dst.len()` unread samples into `dst` and publish the
    /// advanced read cursor. Returns the number of samples read.
    pub fn pop_slice(&mut self, dst: &mut [f32]) -> usize {
        let read_pos = self.read_pos();
        let n = self.available().min(dst.len());
        self.copy_to(&mut dst[..n], read_pos);
        self.publish(read_pos + n);
        n
    }

    /// Read-only view of the shared ring for monitoring.
    pub fn observer(&self) -> Arc<SharedRing> {
        Arc::clone(&self.ring)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_capacity_is_rejected() {
        assert!(matches!(create_shared_ring(0), Err(BridgeError::ZeroCapacity)));
    }

    #[test]
    fn fresh_ring_is_empty_and_silent() {
        let (_producer, mut consumer) = create_shared_ring(16).unwrap();
        assert_eq!(consumer.available(), 0);
        let mut out = [1.0f32; 4];
        assert_eq!(consumer.pop_slice(&mut out), 0);
        assert_eq!(out, [1.0; 4]);

        let mut raw = [1.0f32; 4];
        consumer.copy_to(&mut raw, 0);
        assert_eq!(raw, [0.0; 4]);
    }

    #[test]
    fn available_formula_wraps() {
        assert_eq!(available_between(3, 0, 4), 3);
        assert_eq!(available_between(2, 0, 4), 2);
        assert_eq!(available_between(1, 3, 4), 2);
        assert_eq!(available_between(5, 5, 8), 0);
    }

    #[test]
    fn overflow_overwrites_without_flagging() {
        let (mut producer, consumer) = create_shared_ring(4).unwrap();
        producer.push_slice(&[1.0, 2.0, 3.0]);
        assert_eq!(consumer.available(), 3);

        producer.push_slice(&[4.0, 5.0, 6.0]);
        assert_eq!(producer.write_pos(), 2);
        assert_eq!(consumer.read_pos(), 0);
        assert_eq!(consumer.available(), 2);
    }

    #[test]
    fn push_then_pop_across_the_boundary() {
        let (mut producer, mut consumer) = create_shared_ring(8).unwrap();
        producer.push_slice(&[0.0; 6]);
        let mut sink = [0.0f32; 6];
        assert_eq!(consumer.pop_slice(&mut sink), 6);

        producer.push_slice(&[1.0, 2.0, 3.0, 4.0, 5.0]);
        assert_eq!(producer.write_pos(), 3);

        let mut out = [0.0f32; 5];
        assert_eq!(consumer.pop_slice(&mut out), 5);
        assert_eq!(out, [1.0, 2.0, 3.0, 4.0, 5.0]);
        assert_eq!(consumer.available(), 0);
    }

    #[test]
    fn oversized_push_keeps_newest_samples() {
        let (mut producer, mut consumer) = create_shared_ring(4).unwrap();
        let stored = producer.push_slice(&[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
        assert_eq!(stored, 4);
        // A full ring of new data reads back as empty: no reserved slot.
        assert_eq!(consumer.available(), 0);

        let mut raw = [0.0f32; 4];
        consumer.copy_to(&mut raw, consumer.write_pos());
        assert_eq!(raw, [3.0, 4.0, 5.0, 6.0]);
    }

    #[test]
    fn copy_from_circular_targets_matching_positions() {
        let (mut producer, consumer) = create_shared_ring(8).unwrap();
        let engine: Vec<f32> = (0..8).map(|i| i as f32 * 10.0).collect();
        producer.copy_from_circular(&engine, 6, 5);

        // Not published yet.
        assert_eq!(consumer.available(), 0);
        producer.publish(6 + 5);
        assert_eq!(consumer.write_pos(), 3);

        let mut raw = [0.0f32; 8];
        consumer.copy_to(&mut raw, 0);
        assert_eq!(raw, [0.0, 10.0, 20.0, 0.0, 0.0, 0.0, 60.0, 70.0]);
    }

    #[test]
    fn observer_sees_both_cursors() {
        let (mut producer, mut consumer) = create_shared_ring(8).unwrap();
        let observer = producer.observer();
        producer.push_slice(&[1.0; 5]);
        let mut out = [0.0f32; 2];
        consumer.pop_slice(&mut out);

        assert_eq!(observer.write_pos(), 5);
        assert_eq!(observer.read_pos(), 2);
        assert_eq!(observer.available(), 3);
        assert_eq!(observer.capacity(), 8);
    }
}
