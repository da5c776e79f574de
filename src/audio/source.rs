use anyhow::Result;
use std::time::{Duration, Instant};

/// One poll's worth of mono PCM.
pub type SampleBlock = Vec<i16>;

pub trait SampleSource {
    fn sample_rate(&self) -> u32;

    /// Blocks until the next block is ready. `Ok(None)` marks the end of a
    /// finite source; errors are fatal to the caller.
    fn read_block(&mut self) -> Result<Option<SampleBlock>>;
}

/// Supplies the single timestamp used for every decision in one iteration.
pub trait Clock {
    fn tick(&mut self, block: &[i16], sample_rate: u32) -> Duration;
}

/// Wall time since construction, for live capture.
pub struct MonotonicClock {
    start: Instant,
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MonotonicClock {
    fn tick(&mut self, _block: &[i16], _sample_rate: u32) -> Duration {
        self.start.elapsed()
    }
}

/// Stream time derived from samples consumed, for replaying recordings
/// faster than real time.
#[derive(Default)]
pub struct SampleClock {
    samples: u64,
}

impl Clock for SampleClock {
    fn tick(&mut self, block: &[i16], sample_rate: u32) -> Duration {
        self.samples += block.len() as u64;
        let nanos = self.samples as u128 * 1_000_000_000 / sample_rate.max(1) as u128;
        Duration::from_nanos(nanos as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sample_clock_advances_by_block_duration() {
        let mut clock = SampleClock::default();
        let block = vec![0i16; 480];
        assert_eq!(clock.tick(&block, 48_000), Duration::from_millis(10));
        assert_eq!(clock.tick(&block, 48_000), Duration::from_millis(20));
        assert_eq!(clock.tick(&[], 48_000), Duration::from_millis(20));
    }

    #[test]
    fn monotonic_clock_never_goes_back() {
        let mut clock = MonotonicClock::new();
        let a = clock.tick(&[], 48_000);
        let b = clock.tick(&[], 48_000);
        assert!(b >= a);
    }
}
