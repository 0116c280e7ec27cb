use crate::{
    detectors::ppg::{detect_peaks_with_config, PpgDetectorConfig},
    metrics::hrv::{hrv_batch, HrvConfig, HrvSummary},
    signal::{Peaks, PpiBounds, PpiSeries, DEFAULT_SAMPLE_PERIOD_MS},
};
use serde::{Deserialize, Serialize};

/// Sampling and beat-extraction parameters shared by every session.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub sample_period_ms: f64,
    pub ppi_bounds: PpiBounds,
    pub detector: PpgDetectorConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            sample_period_ms: DEFAULT_SAMPLE_PERIOD_MS,
            ppi_bounds: PpiBounds::default(),
            detector: PpgDetectorConfig::default(),
        }
    }
}

impl PipelineConfig {
    /// Number of samples covering `ms` of signal.
    pub fn samples_for_ms(&self, ms: u64) -> usize {
        if self.sample_period_ms <= 0.0 {
            return 0;
        }
        (ms as f64 / self.sample_period_ms).round() as usize
    }
}

/// Peaks and filtered intervals of one batch.
pub fn extract_ppi<T: Copy + Into<f64>>(samples: &[T], cfg: &PipelineConfig) -> (Peaks, PpiSeries) {
    let peaks = detect_peaks_with_config(samples, &cfg.detector);
    let ppi = PpiSeries::from_peaks(&peaks, cfg.sample_period_ms, cfg.ppi_bounds);
    (peaks, ppi)
}

/// Everything the batch pipeline derives from one capture.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BeatPipelineResult {
    pub sample_count: usize,
    pub peaks: Peaks,
    pub ppi: PpiSeries,
    /// `None` when the capture held too few intervals.
    pub hrv: Option<HrvSummary>,
}

/// Detection → interval extraction → batch HRV in one call.
pub fn run_beat_pipeline<T: Copy + Into<f64>>(
    samples: &[T],
    cfg: &PipelineConfig,
    hrv_cfg: &HrvConfig,
) -> BeatPipelineResult {
    let (peaks, ppi) = extract_ppi(samples, cfg);
    let hrv = hrv_batch(&ppi, hrv_cfg);
    BeatPipelineResult {
        sample_count: samples.len(),
        peaks,
        ppi,
        hrv,
    }
}
