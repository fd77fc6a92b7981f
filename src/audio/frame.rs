//! Audio frames and the ingest stamp.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use bytes::Bytes;

use crate::clock::Clock;

/// One chunk of broadcaster audio.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioFrame {
    /// Monotonic per-process sequence, starting at 1.
    pub sequence: u64,
    /// Epoch milliseconds on the source clock when the frame was captured.
    pub timestamp: u64,
    /// Encoded audio payload.
    pub data: Bytes,
}

impl AudioFrame {
    pub fn new(sequence: u64, timestamp: u64, data: impl Into<Bytes>) -> Self {
        Self {
            sequence,
            timestamp,
            data: data.into(),
        }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// Stamps raw broadcaster bytes with a sequence number and capture time.
pub struct AudioIngest {
    next_sequence: AtomicU64,
    clock: Arc<dyn Clock>,
}

impl AudioIngest {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            next_sequence: AtomicU64::new(1),
            clock,
        }
    }

    /// Wrap `data` into the next [`AudioFrame`].
    pub fn stamp(&self, data: impl Into<Bytes>) -> AudioFrame {
        let sequence = self.next_sequence.fetch_add(1, Ordering::Relaxed);
        AudioFrame::new(sequence, self.clock.now_millis(), data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;

    #[test]
    fn stamps_increasing_sequences_with_clock_time() {
        let clock = Arc::new(ManualClock::new(5_000));
        let ingest = AudioIngest::new(clock.clone());

        let a = ingest.stamp(vec![1u8, 2, 3]);
        clock.set(5_020);
        let b = ingest.stamp(Bytes::from_static(b"\x04"));

        assert_eq!((a.sequence, a.timestamp, a.len()), (1, 5_000, 3));
        assert_eq!((b.sequence, b.timestamp, b.len()), (2, 5_020, 1));
    }

    #[test]
    fn clone_shares_payload() {
        let frame = AudioFrame::new(1, 0, vec![0u8; 1024]);
        let copy = frame.clone();
        assert_eq!(frame.data.as_ptr(), copy.data.as_ptr());
    }
}
