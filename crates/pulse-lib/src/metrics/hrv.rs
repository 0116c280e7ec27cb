use crate::signal::PpiSeries;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HrvConfig {
    /// Below this many intervals the capture is reported as insufficient.
    pub min_ppi_count: usize,
    /// Successive differences are clamped to this magnitude before squaring.
    pub diff_cap_ms: f64,
}

impl Default for HrvConfig {
    fn default() -> Self {
        Self {
            min_ppi_count: 10,
            diff_cap_ms: 250.0,
        }
    }
}

/// Time-domain HRV over one capture. Values are unrounded.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HrvSummary {
    pub n: usize,
    pub mean_ppi: f64,
    pub mean_hr: f64,
    pub sdnn: f64,
    pub rmssd: f64,
    pub pnn50: f64,
}

/// Batch HRV, or `None` when the series is too short to be meaningful.
pub fn hrv_batch(ppi: &PpiSeries, cfg: &HrvConfig) -> Option<HrvSummary> {
    let n = ppi.len();
    if n < cfg.min_ppi_count.max(2) {
        return None;
    }
    let mean_ppi = mean(&ppi.ppi);
    let mean_hr = (60_000.0 / mean_ppi.round_ties_even()).round_ties_even();
    Some(HrvSummary {
        n,
        mean_ppi,
        mean_hr,
        sdnn: sdnn(&ppi.ppi),
        rmssd: rmssd_capped(&ppi.ppi, cfg.diff_cap_ms),
        pnn50: pnn50(&ppi.ppi),
    })
}

pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}

/// Sample standard deviation (n - 1).
pub fn sdnn(values: &[f64]) -> f64 {
    let n = values.len();
    if n < 2 {
        return 0.0;
    }
    let mu = mean(values);
    (values.iter().map(|x| (x - mu).powi(2)).sum::<f64>() / (n as f64 - 1.0)).sqrt()
}

/// RMS of successive differences with each |difference| limited to `cap_ms`.
pub fn rmssd_capped(values: &[f64], cap_ms: f64) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let squares: Vec<f64> = values
        .windows(2)
        .map(|w| (w[1] - w[0]).abs().min(cap_ms).powi(2))
        .collect();
    mean(&squares).sqrt()
}

/// Share of successive differences larger than 50 ms.
pub fn pnn50(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let over = values
        .windows(2)
        .filter(|w| (w[1] - w[0]).abs() > 50.0)
        .count();
    over as f64 / (values.len() - 1) as f64
}
