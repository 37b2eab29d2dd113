use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

pub const MIN_PLAYBACK_RATE: f32 = 0.25;
pub const MAX_PLAYBACK_RATE: f32 = 4.0;

/// Cloneable rate control shared with a source's producer thread.
///
/// The rate is stored as `f32` bits in an atomic so the producer can sample
/// it every frame without locking.
#[derive(Clone)]
pub struct PlaybackHandle {
    bits: Arc<AtomicU32>,
}

impl PlaybackHandle {
    pub fn new() -> Self {
        Self {
            bits: Arc::new(AtomicU32::new(1.0f32.to_bits())),
        }
    }

    pub fn rate(&self) -> f32 {
        f32::from_bits(self.bits.load(Ordering::Relaxed))
    }

    pub fn set_rate(&self, rate: f32) {
        let clamped = rate.clamp(MIN_PLAYBACK_RATE, MAX_PLAYBACK_RATE);
        self.bits.store(clamped.to_bits(), Ordering::Relaxed);
    }

    /// Doubles (`steps > 0`) or halves (`steps < 0`) the rate per step,
    /// saturating at the clamp bounds. Returns the new rate.
    pub fn adjust(&self, steps: i32) -> f32 {
        self.set_rate(self.rate() * 2f32.powi(steps));
        self.rate()
    }
}

impl Default for PlaybackHandle {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_at_unit_rate() {
        assert_eq!(PlaybackHandle::new().rate(), 1.0);
    }

    #[test]
    fn set_rate_clamps_to_bounds() {
        let handle = PlaybackHandle::new();
        handle.set_rate(100.0);
        assert_eq!(handle.rate(), MAX_PLAYBACK_RATE);
        handle.set_rate(0.0);
        assert_eq!(handle.rate(), MIN_PLAYBACK_RATE);
    }

    #[test]
    fn adjust_doubles_and_halves() {
        let handle = PlaybackHandle::new();
        assert_eq!(handle.adjust(1), 2.0);
        assert_eq!(handle.adjust(-2), 0.5);
    }

    #[test]
    fn adjust_saturates() {
        let handle = PlaybackHandle::new();
        for _ in 0..8 {
            handle.adjust(1);
        }
        assert_eq!(handle.rate(), MAX_PLAYBACK_RATE);
        for _ in 0..16 {
            handle.adjust(-1);
        }
        assert_eq!(handle.rate(), MIN_PLAYBACK_RATE);
    }

    #[test]
    fn clones_share_storage() {
        let handle = PlaybackHandle::new();
        let clone = handle.clone();
        handle.set_rate(2.0);
        assert_eq!(clone.rate(), 2.0);
    }
}
