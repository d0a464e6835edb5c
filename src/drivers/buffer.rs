use crate::types::{BufferWindow, BUFFER_SIZE};

/// Fixed-capacity circular store holding the latest `BUFFER_SIZE` samples of one channel.
///
/// The slot under the cursor is always the oldest sample, so reading from the
/// cursor and wrapping yields the window in temporal order.
#[derive(Clone, Debug)]
pub struct RingBuffer {
    samples: [u16; BUFFER_SIZE],
    cursor: usize,
}

impl Default for RingBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl RingBuffer {
    pub fn new() -> Self {
        Self {
            samples: [0; BUFFER_SIZE],
            cursor: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        BUFFER_SIZE
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn write(&mut self, sample: u16) {
        self.samples[self.cursor] = sample;
        self.cursor = (self.cursor + 1) % BUFFER_SIZE;
    }

    /// Zero every slot and rewind the cursor.
    pub fn clear(&mut self) {
        self.samples = [0; BUFFER_SIZE];
        self.cursor = 0;
    }

    /// Oldest to newest.
    pub fn iter(&self) -> impl Iterator<Item = u16> + '_ {
        let (newest, oldest) = self.samples.split_at(self.cursor);
        oldest.iter().chain(newest.iter()).copied()
    }

    /// Copy up to `dest.len()` samples from the oldest position. Returns how many were copied.
    pub fn read_into(&self, dest: &mut [u16]) -> usize {
        let mut copied = 0;
        for (slot, sample) in dest.iter_mut().zip(self.iter()) {
            *slot = sample;
            copied += 1;
        }
        copied
    }

    pub fn read_window(&self, count: usize) -> BufferWindow {
        BufferWindow {
            samples: self.iter().take(count.min(BUFFER_SIZE)).collect(),
            position: self.cursor,
        }
    }
}
