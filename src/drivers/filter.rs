use crate::types::MEDIAN_WINDOW;

/// Sliding median used to knock out single-sample spikes before triggering.
///
/// Until the window has been filled once, samples pass through untouched.
/// Trigger thresholds downstream are tuned against that cold-start behaviour.
#[derive(Clone, Debug)]
pub struct MedianFilter<const W: usize = MEDIAN_WINDOW> {
    window: [u16; W],
    index: usize,
    warm: bool,
}

impl<const W: usize> Default for MedianFilter<W> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const W: usize> MedianFilter<W> {
    pub fn new() -> Self {
        Self {
            window: [0; W],
            index: 0,
            warm: false,
        }
    }

    pub fn is_warm(&self) -> bool {
        self.warm
    }

    pub fn reset(&mut self) {
        *self = Self::new();
    }

    pub fn push(&mut self, sample: u16) -> u16 {
        self.window[self.index] = sample;
        self.index = (self.index + 1) % W;
        if self.index == 0 {
            self.warm = true;
        }
        if !self.warm {
            return sample;
        }
        let mut sorted = self.window;
        sorted.sort_unstable();
        sorted[W / 2]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn passes_through_until_warm() {
        let mut filter = MedianFilter::<3>::new();
        assert_eq!(filter.push(100), 100);
        assert_eq!(filter.push(4000), 4000);
        assert!(!filter.is_warm());
        // Third push completes the window: median of {100, 4000, 200}.
        assert_eq!(filter.push(200), 200);
        assert!(filter.is_warm());
    }

    #[test]
    fn suppresses_single_impulse() {
        let mut filter = MedianFilter::<3>::new();
        for _ in 0..3 {
            filter.push(1000);
        }
        assert_eq!(filter.push(4095), 1000);
        assert_eq!(filter.push(1000), 1000);
        assert_eq!(filter.push(0), 1000);
        assert_eq!(filter.push(1000), 1000);
    }

    #[test]
    fn five_wide_window() {
        let mut filter = MedianFilter::<5>::new();
        for v in [10, 20, 30, 40] {
            assert_eq!(filter.push(v), v);
        }
        assert_eq!(filter.push(9999), 30);
        filter.reset();
        assert!(!filter.is_warm());
        assert_eq!(filter.push(5), 5);
    }
}
