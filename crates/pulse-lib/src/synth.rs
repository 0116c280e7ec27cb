//! Synthetic PPG source for simulations and tests.

use crate::signal::Sample;
use rand::{rngs::StdRng, Rng, SeedableRng};

const BASELINE: f64 = 30_000.0;
const AMPLITUDE: f64 = 20_000.0;

/// Periodic pulse shape (systolic peak plus a small dicrotic wave) sampled at a
/// fixed period. Deterministic unless noise is enabled, and then reproducible
/// from the seed.
#[derive(Debug, Clone)]
pub struct SyntheticPpg {
    bpm: f64,
    period_ms: f64,
    index: u64,
    noise: Option<(StdRng, f64)>,
}

impl SyntheticPpg {
    pub fn new(bpm: f64, period_ms: f64) -> Self {
        Self {
            bpm: bpm.max(1.0),
            period_ms,
            index: 0,
            noise: None,
        }
    }

    /// Add uniform noise of +/- `amplitude` ADC counts.
    pub fn with_noise(mut self, amplitude: f64, seed: u64) -> Self {
        self.noise = Some((StdRng::seed_from_u64(seed), amplitude.abs()));
        self
    }

    pub fn beat_ms(&self) -> f64 {
        60_000.0 / self.bpm
    }

    pub fn next_sample(&mut self) -> Sample {
        let t = self.index as f64 * self.period_ms;
        self.index += 1;
        let beat = self.beat_ms();
        let phase = (t % beat) / beat;
        let mut value = BASELINE + AMPLITUDE * pulse(phase);
        if let Some((rng, amp)) = self.noise.as_mut() {
            if *amp > 0.0 {
                value += rng.gen_range(-*amp..=*amp);
            }
        }
        value.round().clamp(0.0, u16::MAX as f64) as Sample
    }

    pub fn take_samples(&mut self, n: usize) -> Vec<Sample> {
        (0..n).map(|_| self.next_sample()).collect()
    }
}

fn pulse(phase: f64) -> f64 {
    let systolic = (-0.5 * ((phase - 0.5) / 0.06).powi(2)).exp();
    let dicrotic = 0.15 * (-0.5 * ((phase - 0.75) / 0.05).powi(2)).exp();
    systolic + dicrotic
}
