
mod fixed_big_int;

use fixed_big_int::FixedBigInt;
use serde::{Deserialize, Serialize};

/// ReplayDetector is the interface of sequence replay detector.
pub trait ReplayDetector {
    /// Check returns true if given sequence number is not replayed.
    /// Call accept() to mark the packet is received properly.
    fn check(&mut self, seq: u64) -> bool;
    fn accept(&mut self);
}

/// ReplayDetectorState is the plain-data capture of a [`SlidingWindowDetector`],
/// suitable for persisting and seeding a detector in another process.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplayDetectorState {
    pub window_size: usize,
    pub max_seq: u64,
    pub latest_seq: u64,
    pub mask: Vec<u64>,
}

/// SlidingWindowDetector is a replay detector over a window of recently seen
/// sequence numbers. Sequence numbers must not wrap; SRTP feeds it the 48-bit
/// packet index and DTLS the 48-bit record sequence number.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlidingWindowDetector {
    accepted: bool,
    seq: u64,
    latest_seq: u64,
    max_seq: u64,
    window_size: usize,
    mask: FixedBigInt,
}

impl SlidingWindowDetector {
    /// New creates ReplayDetector.
    /// Created ReplayDetector doesn't allow wrapping.
    /// It can handle monotonically increasing sequence number up to
    /// full 64bit number. It is suitable for DTLS replay protection.
    pub fn new(window_size: usize, max_seq: u64) -> Self {
        SlidingWindowDetector {
            accepted: false,
            seq: 0,
            latest_seq: 0,
            max_seq,
            window_size,
            mask: FixedBigInt::new(window_size),
        }
    }

    /// Rebuilds a detector from a capture. Returns `None` if the mask does
    /// not fit the window size.
    pub fn from_state(state: &ReplayDetectorState) -> Option<Self> {
        let mask = FixedBigInt::from_words(state.window_size, &state.mask)?;
        Some(SlidingWindowDetector {
            accepted: false,
            seq: 0,
            latest_seq: state.latest_seq,
            max_seq: state.max_seq,
            window_size: state.window_size,
            mask,
        })
    }

    pub fn state(&self) -> ReplayDetectorState {
        ReplayDetectorState {
            window_size: self.window_size,
            max_seq: self.max_seq,
            latest_seq: self.latest_seq,
            mask: self.mask.words().to_vec(),
        }
    }

    pub fn latest_seq(&self) -> u64 {
        self.latest_seq
    }

    pub fn window_size(&self) -> usize {
        self.window_size
    }
}

impl ReplayDetector for SlidingWindowDetector {
    fn check(&mut self, seq: u64) -> bool {
        self.accepted = false;

        if seq > self.max_seq {
            // Exceeded upper limit.
            return false;
        }

        if seq <= self.latest_seq {
            if self.latest_seq >= self.window_size as u64 + seq {
                return false;
            }
            if self.mask.bit((self.latest_seq - seq) as usize) != 0 {
                // The sequence number is duplicated.
                return false;
            }
        }

        self.accepted = true;
        self.seq = seq;
        true
    }

    fn accept(&mut self) {
        if !self.accepted {
            return;
        }

        if self.seq > self.latest_seq {
            // Update the head of the window.
            self.mask.lsh((self.seq - self.latest_seq) as usize);
            self.latest_seq = self.seq;
        }
        let diff = (self.latest_seq - self.seq) as usize;
        self.mask.set_bit(diff);
        self.accepted = false;
    }
}
