use crate::signal::Peaks;
use serde::{Deserialize, Serialize};

/// Parameters for the single-threshold PPG beat detector.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PpgDetectorConfig {
    /// Threshold sits `range / threshold_divisor` above the batch mean.
    pub threshold_divisor: f64,
}

impl Default for PpgDetectorConfig {
    fn default() -> Self {
        Self {
            threshold_divisor: 5.0,
        }
    }
}

/// Detect beat onsets with the default configuration.
pub fn detect_peaks<T: Copy + Into<f64>>(samples: &[T]) -> Peaks {
    detect_peaks_with_config(samples, &PpgDetectorConfig::default())
}

/// Record every upward crossing of an adaptive threshold as a beat onset.
///
/// The threshold is recomputed from the whole batch and does not follow a
/// baseline across batches, so callers must pass windows long enough to be
/// roughly stationary (seconds, not single beats).
pub fn detect_peaks_with_config<T: Copy + Into<f64>>(
    samples: &[T],
    cfg: &PpgDetectorConfig,
) -> Peaks {
    if samples.len() < 2 {
        return Peaks::default();
    }
    let threshold = adaptive_threshold(samples, cfg);
    let indices = samples
        .windows(2)
        .enumerate()
        .filter(|(_, w)| {
            let (a, b): (f64, f64) = (w[0].into(), w[1].into());
            a <= threshold && threshold <= b
        })
        .map(|(i, _)| i + 1)
        .collect();
    Peaks::from_indices(indices)
}

/// `mean + (max - min) / divisor` over the batch.
pub fn adaptive_threshold<T: Copy + Into<f64>>(samples: &[T], cfg: &PpgDetectorConfig) -> f64 {
    if samples.is_empty() {
        return 0.0;
    }
    let mut sum = 0.0;
    let mut min = f64::INFINITY;
    let mut max = f64::NEG_INFINITY;
    for &s in samples {
        let v: f64 = s.into();
        sum += v;
        min = min.min(v);
        max = max.max(v);
    }
    let mean = sum / samples.len() as f64;
    let divisor = if cfg.threshold_divisor > 0.0 {
        cfg.threshold_divisor
    } else {
        5.0
    };
    mean + (max - min) / divisor
}
