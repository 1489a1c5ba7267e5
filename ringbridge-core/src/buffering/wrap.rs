//! Copies out of a circular source, split at the wrap boundary.
//!
//! A span of `length` samples starting at `src_offset` in a circular buffer of
//! `capacity` samples is at most two linear ranges:
//!
//! ```text
//! src_offset + length <= capacity:   [src_offset, src_offset + length)
//! otherwise:                         [src_offset, capacity) then [0, remainder)
//! ```
//!
//! The second range lands in the destination right after the first one. The
//! producer and consumer sides of the ring both go through
//! [`for_each_segment`], so the split logic exists exactly once.

use std::ops::Range;

/// Visit the linear source ranges of a circular span.
///
/// `f` receives each source range together with its offset relative to the
/// start of the destination (`0` for the first range, `capacity - src_offset`
/// for the wrapped remainder). A zero `length` visits nothing, so an empty
/// span can never be mistaken for the whole buffer.
///
/// `length` must not exceed `capacity` and `src_offset` must be below it.
pub fn for_each_segment<F>(src_offset: usize, length: usize, capacity: usize, mut f: F)
where
    F: FnMut(Range<usize>, usize),
{
    if length == 0 {
        return;
    }
    debug_assert!(src_offset < capacity, "offset {src_offset} outside ring of {capacity}");
    debug_assert!(length <= capacity, "span {length} larger than ring of {capacity}");

    if src_offset + length <= capacity {
        f(src_offset..src_offset + length, 0);
    } else {
        let head = capacity - src_offset;
        f(src_offset..capacity, 0);
        f(0..length - head, head);
    }
}

/// Slice form of the wrapping copy: `src` is circular, `dst` is linear.
///
/// # Panics
/// Panics if `dst` cannot hold `length` samples starting at `dst_offset`.
pub fn copy_wrapping<T: Copy>(
    dst: &mut [T],
    dst_offset: usize,
    src: &[T],
    src_offset: usize,
    length: usize,
) {
    for_each_segment(src_offset, length, src.len(), |range, delta| {
        let start = dst_offset + delta;
        dst[start..start + range.len()].copy_from_slice(&src[range]);
    });
}
