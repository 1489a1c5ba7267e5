//! The engine's private staging buffer.

/// Circular sample buffer owned by the producer thread.
///
/// Its length equals the shared ring's capacity, so both use the same index
/// space. The write cursor is monotonic; [`write_index`](Self::write_index)
/// wraps it. `read_mirror` is the consumer's read cursor as observed at the
/// start of the current tick, telling the engine which region is still
/// unread.
#[derive(Debug, Clone)]
pub struct EngineLocalBuffer {
    samples: Vec<f32>,
    write_position: u64,
    read_mirror: usize,
}

impl EngineLocalBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            samples: vec![0.0; capacity],
            write_position: 0,
            read_mirror: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.samples.len()
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.samples
    }

    /// Total samples ever written.
    pub fn write_position(&self) -> u64 {
        self.write_position
    }

    pub fn write_index(&self) -> usize {
        match self.capacity() {
            0 => 0,
            c => (self.write_position % c as u64) as usize,
        }
    }

    pub fn read_mirror(&self) -> usize {
        self.read_mirror
    }

    pub fn set_read_mirror(&mut self, read_pos: usize) {
        self.read_mirror = read_pos;
    }

    /// Samples written but not yet read, as of the mirrored read cursor.
    pub fn cached(&self) -> usize {
        match self.capacity() {
            0 => 0,
            c => (self.write_index() + c - self.read_mirror % c) % c,
        }
    }

    /// Samples that can be written this tick without overwriting unread data.
    pub fn headroom(&self) -> usize {
        self.capacity().saturating_sub(1 + self.cached())
    }

    pub fn push(&mut self, sample: f32) {
        if self.samples.is_empty() {
            return;
        }
        let idx = self.write_index();
        self.samples[idx] = sample;
        self.write_position += 1;
    }

    pub fn extend_from_slice(&mut self, samples: &[f32]) {
        for &s in samples {
            self.push(s);
        }
    }

    /// Append interleaved frames, keeping only the first channel of each.
    pub fn push_interleaved(&mut self, frames: &[f32], channels: usize) {
        let channels = channels.max(1);
        for frame in frames.chunks_exact(channels) {
            self.push(frame[0]);
        }
    }
}
