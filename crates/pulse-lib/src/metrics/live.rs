use crate::{metrics::hrv::mean, signal::PpiSeries};
use serde::{Deserialize, Serialize};

/// Parameters for the sliding-window heart-rate estimate.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LiveBpmConfig {
    pub min_ppi_count: usize,
    /// Intervals further than this from the mean are treated as artifacts.
    pub norm_tolerance_ms: f64,
    pub min_bpm: u32,
    pub max_bpm: u32,
    /// History kept after an accepted update.
    pub retain: usize,
}

impl Default for LiveBpmConfig {
    fn default() -> Self {
        Self {
            min_ppi_count: 3,
            norm_tolerance_ms: 250.0,
            min_bpm: 30,
            max_bpm: 220,
            retain: 5,
        }
    }
}

/// BPM from the intervals close to the mean, or `None` when there is not
/// enough data or the estimate is outside the plausible range.
pub fn live_bpm(ppi: &[f64], cfg: &LiveBpmConfig) -> Option<u32> {
    if ppi.is_empty() || ppi.len() < cfg.min_ppi_count {
        return None;
    }
    let avg = mean(ppi);
    let normal: Vec<f64> = ppi
        .iter()
        .copied()
        .filter(|&v| avg - cfg.norm_tolerance_ms < v && v < avg + cfg.norm_tolerance_ms)
        .collect();
    if normal.is_empty() {
        return None;
    }
    let avg_ppi = mean(&normal);
    if avg_ppi <= 0.0 {
        return None;
    }
    let bpm = (60_000.0 / avg_ppi).round_ties_even();
    if bpm < cfg.min_bpm as f64 || bpm > cfg.max_bpm as f64 {
        return None;
    }
    Some(bpm as u32)
}

/// Interval history and last accepted BPM of a live session.
#[derive(Debug, Clone, Default)]
pub struct BpmTracker {
    cfg: LiveBpmConfig,
    ppi: Vec<f64>,
    bpm: Option<u32>,
}

impl BpmTracker {
    pub fn new(cfg: LiveBpmConfig) -> Self {
        Self {
            cfg,
            ppi: Vec::new(),
            bpm: None,
        }
    }

    /// Append a new batch of intervals and try to refresh the estimate.
    ///
    /// Returns the new BPM on success. A rejected update leaves the previous
    /// value in place.
    pub fn ingest(&mut self, batch: &PpiSeries) -> Option<u32> {
        self.ppi.extend_from_slice(&batch.ppi);
        let bpm = live_bpm(&self.ppi, &self.cfg)?;
        self.bpm = Some(bpm);
        let keep = self.cfg.retain.max(1);
        if self.ppi.len() > keep {
            self.ppi.drain(..self.ppi.len() - keep);
        }
        Some(bpm)
    }

    pub fn bpm(&self) -> Option<u32> {
        self.bpm
    }

    pub fn history(&self) -> &[f64] {
        &self.ppi
    }

    pub fn clear(&mut self) {
        self.ppi.clear();
        self.bpm = None;
    }
}
