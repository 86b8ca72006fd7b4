//! Median Filter for ADC Noise Reduction

/// Sliding window median filter over a fixed, odd-sized window
pub struct MedianFilter<const N: usize> {
    window: [u16; N],
    position: usize,
    filled: bool,
}

impl<const N: usize> MedianFilter<N> {
    /// Create an empty filter
    pub fn new() -> Self {
        assert!(N > 0 && N % 2 == 1, "Window size must be odd and > 0");
        Self {
            window: [0; N],
            position: 0,
            filled: false,
        }
    }

    /// Add a sample and get the filtered output
    pub fn filter(&mut self, value: u16) -> u16 {
        self.window[self.position] = value;
        self.position = (self.position + 1) % N;

        if self.position == 0 {
            self.filled = true;
        }

        if !self.filled {
            // Pass samples through until the window is full
            return value;
        }

        let mut sorted = self.window;
        sorted.sort_unstable();
        sorted[N / 2]
    }

    /// Reset the filter
    pub fn reset(&mut self) {
        self.window = [0; N];
        self.position = 0;
        self.filled = false;
    }
}

impl<const N: usize> Default for MedianFilter<N> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_median_filter_basic() {
        let mut filter = MedianFilter::<5>::new();

        filter.filter(2010);
        filter.filter(2012);
        filter.filter(2011);
        filter.filter(4095); // spike
        filter.filter(2013);

        // Median of [2012, 2011, 4095, 2013, 2012]
        assert_eq!(filter.filter(2012), 2012);
    }

    #[test]
    fn test_passthrough_until_filled() {
        let mut filter = MedianFilter::<3>::new();
        assert_eq!(filter.filter(7), 7);
        assert_eq!(filter.filter(9), 9);
        assert_eq!(filter.filter(8), 8);
    }

    #[test]
    fn test_reset() {
        let mut filter = MedianFilter::<3>::new();
        for v in [100, 100, 100] {
            filter.filter(v);
        }
        filter.reset();
        assert_eq!(filter.filter(5), 5);
    }
}
