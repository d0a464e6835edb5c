use crate::drivers::RingBuffer;
use crate::types::Stats;

/// Re-derives min/max/average and a frequency estimate straight from a ring buffer.
///
/// A slot counts as valid only when it is non-zero, so a genuine zero reading
/// cannot be told apart from a slot that was never written. Nothing is
/// accumulated between calls: every result reflects what the buffer holds now.
#[derive(Clone, Copy, Debug)]
pub struct StatsEstimator {
    sample_rate_hz: f32,
}

impl StatsEstimator {
    /// `sample_rate_hz` is the rate at which samples landed in the buffer,
    /// i.e. after decimation.
    pub fn new(sample_rate_hz: f32) -> Self {
        Self { sample_rate_hz }
    }

    pub fn sample_rate_hz(&self) -> f32 {
        self.sample_rate_hz
    }

    /// Intervals between crossings shorter than this many samples (200 us) are
    /// treated as jitter and left out of the average.
    pub fn min_crossing_gap(&self) -> usize {
        ((0.0002 * self.sample_rate_hz).round() as usize).max(1)
    }

    pub fn compute(&self, ring: &RingBuffer) -> Stats {
        let mut min = u16::MAX;
        let mut max = 0u16;
        let mut sum = 0u64;
        let mut valid = 0usize;
        for sample in ring.iter().filter(|s| *s > 0) {
            min = min.min(sample);
            max = max.max(sample);
            sum += u64::from(sample);
            valid += 1;
        }
        if valid == 0 {
            return Stats::default();
        }
        let average = (sum as f64 / valid as f64) as f32;
        Stats {
            min,
            max,
            average,
            frequency_hz: self.frequency(ring, average, min, max),
            valid_samples: valid,
        }
    }

    // Retrospective Schmitt detector over the window: an upward pass through
    // the upper bound is a crossing, dropping below the lower bound re-arms.
    fn frequency(&self, ring: &RingBuffer, average: f32, min: u16, max: u16) -> f32 {
        let band = f32::from((max - min) / 5);
        let upper = average + band / 2.0;
        let lower = average - band / 2.0;
        let min_gap = self.min_crossing_gap();

        let mut high = false;
        let mut last_crossing: Option<usize> = None;
        let mut total_interval = 0usize;
        let mut intervals = 0usize;

        for (index, sample) in ring.iter().enumerate() {
            if sample == 0 {
                continue;
            }
            let value = f32::from(sample);
            if !high && value > upper {
                high = true;
                if let Some(previous) = last_crossing {
                    let interval = index - previous;
                    if interval >= min_gap {
                        total_interval += interval;
                        intervals += 1;
                    }
                }
                last_crossing = Some(index);
            } else if high && value < lower {
                high = false;
            }
        }

        if intervals == 0 {
            return 0.0;
        }
        let mean_interval = total_interval as f32 / intervals as f32;
        self.sample_rate_hz / mean_interval
    }
}
