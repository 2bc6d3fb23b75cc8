/// Fixed-capacity batch of readings
use crate::models::Reading;

/// Result of recording one reading
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferStatus {
    Accepted,
    /// The write filled the last slot; the batch must be reported and reset
    Full,
}

/// Ordered sequence of `capacity` reading slots plus a write cursor
///
/// The buffer is owned by the steady-state loop. Slots are reused across
/// cycles: after a reset the next write lands on position 0 and overwrites
/// whatever the previous batch left there.
#[derive(Debug)]
pub struct SampleBuffer {
    slots: Vec<Reading>,
    capacity: usize,
    cursor: usize,
}

impl SampleBuffer {
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "sample buffer capacity must be non-zero");
        Self {
            slots: Vec::with_capacity(capacity),
            capacity,
            cursor: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Next write position
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn is_full(&self) -> bool {
        self.cursor == self.capacity
    }

    /// Store `reading` at the cursor and advance it
    ///
    /// Returns `Full` exactly when this write occupied the last slot. A
    /// full buffer that was never reset starts over at position 0 instead
    /// of refusing the write.
    pub fn record(&mut self, reading: Reading) -> BufferStatus {
        if self.is_full() {
            log::warn!("Sample buffer was not reset after a full batch, starting over");
            self.reset();
        }

        if self.cursor < self.slots.len() {
            self.slots[self.cursor] = reading;
        } else {
            self.slots.push(reading);
        }
        self.cursor += 1;

        if self.is_full() {
            BufferStatus::Full
        } else {
            BufferStatus::Accepted
        }
    }

    /// The complete batch in write order, only while the buffer is full
    pub fn batch(&self) -> Option<&[Reading]> {
        self.is_full().then_some(&self.slots[..])
    }

    /// Readings written in the current cycle so far
    pub fn pending(&self) -> &[Reading] {
        &self.slots[..self.cursor]
    }

    pub fn reset(&mut self) {
        self.cursor = 0;
    }
}
