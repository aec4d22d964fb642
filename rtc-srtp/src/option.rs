use shared::replay_detector::SlidingWindowDetector;

use crate::context::MAX_SRTP_INDEX;

/// ContextOption represents option of Context using the functional options pattern.
pub type ContextOption = Box<dyn (Fn() -> SlidingWindowDetector) + Send + Sync>;

/// srtp_replay_protection sets SRTP replay protection window size.
/// The window tracks the 48-bit packet index, so it keeps working across
/// sequence number rollovers.
pub fn srtp_replay_protection(window_size: usize) -> ContextOption {
    Box::new(move || SlidingWindowDetector::new(window_size, MAX_SRTP_INDEX))
}
