use crate::error::SessionError;
use anyhow::{Context, Result};
use pulse_lib::{
    metrics::{hrv::HrvConfig, live::LiveBpmConfig},
    pipeline::PipelineConfig,
};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LiveSessionConfig {
    /// Signal span kept for a BPM update.
    pub window_ms: u64,
    pub bpm_update_interval_ms: u64,
    pub heading_refresh_ms: u64,
    pub waveform_refresh_ms: u64,
    /// Display columns per waveform point.
    pub waveform_x_scale: usize,
    pub bpm: LiveBpmConfig,
}

impl Default for LiveSessionConfig {
    fn default() -> Self {
        Self {
            window_ms: 5_000,
            bpm_update_interval_ms: 5_000,
            heading_refresh_ms: 500,
            waveform_refresh_ms: 25,
            waveform_x_scale: 2,
            bpm: LiveBpmConfig::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisSessionConfig {
    pub duration_ms: u64,
    pub hrv: HrvConfig,
    /// Give up on the remote service after this long and analyse locally.
    /// Zero waits forever.
    pub remote_timeout_ms: u64,
    pub remote_poll_ms: u64,
}

impl Default for AnalysisSessionConfig {
    fn default() -> Self {
        Self {
            duration_ms: 30_000,
            hrv: HrvConfig::default(),
            remote_timeout_ms: 60_000,
            remote_poll_ms: 25,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub pipeline: PipelineConfig,
    pub live: LiveSessionConfig,
    pub analysis: AnalysisSessionConfig,
    /// Capacity of the interrupt-side sample queue.
    pub fifo_capacity: usize,
    /// Sleep between polls while waiting for a confirmation press.
    pub press_poll_ms: u64,
    pub history_dir: PathBuf,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            pipeline: PipelineConfig::default(),
            live: LiveSessionConfig::default(),
            analysis: AnalysisSessionConfig::default(),
            fifo_capacity: 1024,
            press_poll_ms: 50,
            history_dir: PathBuf::from("history"),
        }
    }
}

impl SessionConfig {
    /// Newest samples kept for a live BPM update at the configured sample period.
    pub fn live_window_samples(&self) -> usize {
        self.pipeline.samples_for_ms(self.live.window_ms)
    }

    pub fn validate(&self) -> Result<(), SessionError> {
        if self.pipeline.sample_period_ms <= 0.0 {
            return Err(SessionError::Config(
                "pipeline.sample_period_ms must be positive".into(),
            ));
        }
        if self.pipeline.ppi_bounds.min_ms >= self.pipeline.ppi_bounds.max_ms {
            return Err(SessionError::Config(
                "pipeline.ppi_bounds.min_ms must be below max_ms".into(),
            ));
        }
        if self.fifo_capacity == 0 {
            return Err(SessionError::Config("fifo_capacity must be at least 1".into()));
        }
        if self.live_window_samples() < 2 {
            return Err(SessionError::Config(
                "live.window_ms must cover at least 2 samples".into(),
            ));
        }
        if self.analysis.hrv.min_ppi_count < 2 {
            return Err(SessionError::Config(
                "analysis.hrv.min_ppi_count must be at least 2".into(),
            ));
        }
        if self.live.bpm.min_bpm > self.live.bpm.max_bpm {
            return Err(SessionError::Config(
                "live.bpm.min_bpm must not exceed max_bpm".into(),
            ));
        }
        if self.analysis.remote_poll_ms == 0 {
            return Err(SessionError::Config(
                "analysis.remote_poll_ms must be positive".into(),
            ));
        }
        Ok(())
    }
}

pub fn read_config(path: &Path) -> Result<SessionConfig> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("failed to read config {}", path.display()))?;
    let config: SessionConfig =
        toml::from_str(&contents).with_context(|| format!("parsing config {}", path.display()))?;
    config
        .validate()
        .with_context(|| format!("validating config {}", path.display()))?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn partial_file_keeps_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("pulse.toml");
        fs::write(
            &path,
            r#"
history_dir = "/tmp/records"

[analysis]
duration_ms = 10000
remote_timeout_ms = 5000

[live.bpm]
max_bpm = 200
"#,
        )
        .unwrap();
        let cfg = read_config(&path).unwrap();
        assert_eq!(cfg.analysis.duration_ms, 10_000);
        assert_eq!(cfg.analysis.remote_timeout_ms, 5_000);
        assert_eq!(cfg.analysis.hrv.min_ppi_count, 10);
        assert_eq!(cfg.live.bpm.max_bpm, 200);
        assert_eq!(cfg.live.bpm.min_bpm, 30);
        assert_eq!(cfg.live.window_ms, 5_000);
        assert_eq!(cfg.live_window_samples(), 1250);
        assert_eq!(cfg.pipeline.sample_period_ms, 4.0);
        assert_eq!(cfg.history_dir, PathBuf::from("/tmp/records"));
    }

    #[test]
    fn rejects_inverted_bounds() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("bad.toml");
        fs::write(
            &path,
            "[pipeline.ppi_bounds]\nmin_ms = 2000.0\nmax_ms = 150.0\n",
        )
        .unwrap();
        let err = read_config(&path).unwrap_err();
        assert!(format!("{err:#}").contains("ppi_bounds"));
    }

    #[test]
    fn live_window_follows_sample_period() {
        let mut cfg = SessionConfig::default();
        cfg.pipeline.sample_period_ms = 2.0;
        assert_eq!(cfg.live_window_samples(), 2500);
        cfg.live.window_ms = 2;
        assert!(matches!(cfg.validate(), Err(SessionError::Config(_))));
    }

    #[test]
    fn rejects_single_interval_minimum() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("low.toml");
        fs::write(&path, "[analysis.hrv]\nmin_ppi_count = 1\n").unwrap();
        let err = read_config(&path).unwrap_err();
        assert!(format!("{err:#}").contains("min_ppi_count"));
    }

    #[test]
    fn defaults_are_valid() {
        assert!(SessionConfig::default().validate().is_ok());
    }
}
