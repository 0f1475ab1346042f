//! Render utility helpers.

use std::time::Instant;

/// Monotonic seconds since viewer startup.
///
/// Created once with the viewer state; the render loop reads it to timestamp
/// load completion. Damping in the orbit controls is per-frame, so nothing
/// here tracks inter-frame deltas.
#[derive(Debug, Clone)]
pub struct FrameClock {
    start: Instant,
}

impl FrameClock {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    /// Seconds since this clock was created.
    #[inline]
    pub fn elapsed_s(&self) -> f32 {
        self.start.elapsed().as_secs_f32()
    }
}

impl Default for FrameClock {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn elapsed_is_nonnegative_and_monotonic() {
        let clock = FrameClock::new();
        let a = clock.elapsed_s();
        let b = clock.elapsed_s();
        assert!(a >= 0.0);
        assert!(b >= a);
    }
}
