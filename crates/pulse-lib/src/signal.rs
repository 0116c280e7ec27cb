use serde::{Deserialize, Serialize};

/// Raw 16-bit ADC magnitude. The timestamp is implicit in its position in the stream.
pub type Sample = u16;

/// Fixed sample period of the reference sensor (250 Hz).
pub const DEFAULT_SAMPLE_PERIOD_MS: f64 = 4.0;

/// Beat onsets as strictly increasing offsets into a sample batch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Peaks {
    pub indices: Vec<usize>,
}

impl Peaks {
    pub fn from_indices(indices: Vec<usize>) -> Self {
        Self { indices }
    }
    pub fn len(&self) -> usize {
        self.indices.len()
    }
    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }
}

/// Open interval of physiologically plausible peak-to-peak intervals (ms).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PpiBounds {
    pub min_ms: f64,
    pub max_ms: f64,
}

impl Default for PpiBounds {
    fn default() -> Self {
        Self {
            min_ms: 150.0,
            max_ms: 2000.0,
        }
    }
}

impl PpiBounds {
    pub fn contains(&self, ppi_ms: f64) -> bool {
        self.min_ms < ppi_ms && ppi_ms < self.max_ms
    }
}

/// Peak-to-peak intervals in milliseconds, in beat order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PpiSeries {
    pub ppi: Vec<f64>,
}

impl PpiSeries {
    pub fn new(ppi: Vec<f64>) -> Self {
        Self { ppi }
    }

    /// Convert consecutive peak offsets to intervals, dropping anything outside `bounds`.
    ///
    /// Rejected intervals are discarded rather than interpolated, so a missed beat
    /// shortens the series instead of producing a double-length interval.
    pub fn from_peaks(peaks: &Peaks, sample_period_ms: f64, bounds: PpiBounds) -> Self {
        let ppi = peaks
            .indices
            .windows(2)
            .map(|w| (w[1] - w[0]) as f64 * sample_period_ms)
            .filter(|&ppi| bounds.contains(ppi))
            .collect();
        Self { ppi }
    }

    pub fn len(&self) -> usize {
        self.ppi.len()
    }
    pub fn is_empty(&self) -> bool {
        self.ppi.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{rngs::StdRng, Rng, SeedableRng};

    #[test]
    fn converts_peak_spacing_to_milliseconds() {
        let peaks = Peaks::from_indices(vec![10, 260, 510, 770]);
        let series = PpiSeries::from_peaks(&peaks, 4.0, PpiBounds::default());
        assert_eq!(series.ppi, vec![1000.0, 1000.0, 1040.0]);
    }

    #[test]
    fn drops_noise_and_missed_beats() {
        // 20 samples = 80 ms (noise), 600 samples = 2400 ms (missed beat)
        let peaks = Peaks::from_indices(vec![0, 20, 270, 870, 1120]);
        let series = PpiSeries::from_peaks(&peaks, 4.0, PpiBounds::default());
        assert_eq!(series.ppi, vec![1000.0, 1000.0]);
    }

    #[test]
    fn bounds_are_exclusive() {
        let bounds = PpiBounds::default();
        assert!(!bounds.contains(150.0));
        assert!(!bounds.contains(2000.0));
        assert!(bounds.contains(150.5));
        assert!(bounds.contains(1999.0));
    }

    #[test]
    fn random_peak_lists_never_escape_bounds() {
        let mut rng = StdRng::seed_from_u64(7);
        let bounds = PpiBounds::default();
        for _ in 0..200 {
            let mut idx = 0usize;
            let mut indices = Vec::new();
            for _ in 0..rng.gen_range(0..60) {
                idx += rng.gen_range(1..700);
                indices.push(idx);
            }
            let series = PpiSeries::from_peaks(&Peaks::from_indices(indices), 4.0, bounds);
            assert!(series.ppi.iter().all(|&v| 150.0 < v && v < 2000.0));
        }
    }

    #[test]
    fn fewer_than_two_peaks_yield_nothing() {
        let series = PpiSeries::from_peaks(&Peaks::from_indices(vec![42]), 4.0, PpiBounds::default());
        assert!(series.is_empty());
    }
}
