use super::{SessionBuffers, Teardown};
use crate::{
    config::SessionConfig,
    device::{wait_for_press, Devices},
    error::SessionError,
    history::RecordStore,
    record::MetricsRecord,
    remote::{
        build_request, correlates, parse_response, RemoteAnalysis, REQUEST_TOPIC,
        TELEMETRY_TOPIC,
    },
};
use log::{debug, error, info, warn};
use pulse_lib::{
    metrics::hrv::hrv_batch,
    pipeline::extract_ppi,
    ring::SampleFeed,
    signal::{PpiSeries, Sample},
};

/// Pause between empty drains, shorter than one sample period.
const IDLE_SLEEP_MS: u64 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnalysisMode {
    /// HRV computed on the device.
    Local,
    /// Intervals sent to the scoring service, SNS/PNS included in the answer.
    Remote,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnalysisPhase {
    Idle,
    Armed,
    Collecting,
    Completed,
    InsufficientData,
    Error,
    Reported,
}

#[derive(Debug, Clone, PartialEq)]
pub enum AnalysisOutcome {
    Completed(MetricsRecord),
    InsufficientData { ppi_count: usize },
    Failed(String),
}

#[derive(Debug, Default)]
struct CaptureBuffers {
    samples: Vec<Sample>,
    ppi: PpiSeries,
}

impl SessionBuffers for CaptureBuffers {
    fn clear(&mut self) {
        self.samples.clear();
        self.ppi.ppi.clear();
    }
}

impl CaptureBuffers {
    /// Returns the number of samples moved.
    fn drain(&mut self, feed: &SampleFeed) -> usize {
        let before = self.samples.len();
        while let Some(sample) = feed.pop() {
            self.samples.push(sample);
        }
        self.samples.len() - before
    }
}

/// Timed capture followed by one batch HRV analysis.
pub struct AnalysisSession<'a> {
    feed: &'a SampleFeed,
    cfg: &'a SessionConfig,
    mode: AnalysisMode,
    phase: AnalysisPhase,
    buffers: CaptureBuffers,
}

impl<'a> AnalysisSession<'a> {
    pub fn new(feed: &'a SampleFeed, cfg: &'a SessionConfig, mode: AnalysisMode) -> Self {
        Self {
            feed,
            cfg,
            mode,
            phase: AnalysisPhase::Idle,
            buffers: CaptureBuffers::default(),
        }
    }

    pub fn phase(&self) -> AnalysisPhase {
        self.phase
    }

    pub fn mode(&self) -> AnalysisMode {
        self.mode
    }

    pub fn run(
        &mut self,
        dev: &mut Devices<'_>,
        store: &mut dyn RecordStore,
        remote: &mut dyn RemoteAnalysis,
    ) -> AnalysisOutcome {
        let (feed, cfg, mode) = (self.feed, self.cfg, self.mode);
        let poll_ms = cfg.press_poll_ms;

        self.phase = AnalysisPhase::Armed;
        dev.display.centered_texts(&[
            "Place a finger",
            "on the sensor",
            "and press to",
            "start the scan",
        ]);
        wait_for_press(dev.input, dev.clock, poll_ms);

        let mut scope = Teardown::begin(feed, &mut self.buffers);
        self.phase = AnalysisPhase::Collecting;
        info!("{mode:?} analysis: collecting for {} ms", cfg.analysis.duration_ms);
        dev.display.centered_texts(&["Collecting data"]);

        let start = dev.clock.now_ms();
        while dev.clock.now_ms().saturating_sub(start) < cfg.analysis.duration_ms {
            if scope.drain(feed) == 0 {
                dev.clock.sleep_ms(IDLE_SLEEP_MS);
            }
            if dev.input.single_press() {
                info!("collection cancelled");
                break;
            }
        }
        scope.drain(feed);
        feed.pause();

        let (peaks, ppi) = extract_ppi(&scope.samples, &cfg.pipeline);
        debug!(
            "captured {} samples, {} peaks, {} intervals",
            scope.samples.len(),
            peaks.len(),
            ppi.len()
        );
        scope.ppi = ppi;

        let ppi_count = scope.ppi.len();
        if ppi_count < cfg.analysis.hrv.min_ppi_count {
            drop(scope);
            self.phase = AnalysisPhase::InsufficientData;
            warn!("only {ppi_count} intervals captured");
            dev.display
                .centered_texts(&["Not enough data.", "Try again", "Press to exit"]);
            wait_for_press(dev.input, dev.clock, poll_ms);
            self.phase = AnalysisPhase::Reported;
            return AnalysisOutcome::InsufficientData { ppi_count };
        }

        let timestamp = dev.clock.unix_secs();
        let result = match mode {
            AnalysisMode::Local => local_record(timestamp, &scope.ppi, cfg),
            AnalysisMode::Remote => remote_record(timestamp, &scope.ppi, cfg, dev, remote),
        };
        drop(scope);

        let record = match result {
            Ok(record) => record,
            Err(err) => {
                self.phase = AnalysisPhase::Error;
                error!("{err:#}");
                dev.display
                    .centered_texts(&[" ", "Analysis error!", " ", "Press to exit"]);
                wait_for_press(dev.input, dev.clock, poll_ms);
                self.phase = AnalysisPhase::Reported;
                return AnalysisOutcome::Failed(err.to_string());
            }
        };

        self.phase = AnalysisPhase::Completed;
        let lines = record.display_lines();
        let lines: Vec<&str> = lines.iter().map(String::as_str).collect();
        dev.display.texts(&lines);

        if let Err(err) = store.save(&record) {
            error!("{:#}", SessionError::Storage(err));
        }
        if remote.is_connected() {
            let published = serde_json::to_value(&record)
                .map_err(anyhow::Error::from)
                .and_then(|payload| remote.publish(TELEMETRY_TOPIC, &payload));
            if let Err(err) = published {
                warn!("telemetry not published: {err:#}");
            }
        }

        wait_for_press(dev.input, dev.clock, poll_ms);
        self.phase = AnalysisPhase::Reported;
        AnalysisOutcome::Completed(record)
    }
}

fn local_record(
    timestamp: u64,
    ppi: &PpiSeries,
    cfg: &SessionConfig,
) -> Result<MetricsRecord, SessionError> {
    let hrv = hrv_batch(ppi, &cfg.analysis.hrv).ok_or_else(|| {
        SessionError::Analysis(format!("{} intervals are too few for HRV", ppi.len()))
    })?;
    Ok(MetricsRecord::local(timestamp, timestamp, &hrv))
}

fn remote_record(
    id: u64,
    ppi: &PpiSeries,
    cfg: &SessionConfig,
    dev: &mut Devices<'_>,
    remote: &mut dyn RemoteAnalysis,
) -> Result<MetricsRecord, SessionError> {
    remote
        .publish(REQUEST_TOPIC, &build_request(id, ppi))
        .map_err(SessionError::Remote)?;
    info!("request {id} sent with {} intervals", ppi.len());
    dev.display
        .centered_texts(&["Waiting for", "remote analysis"]);

    let timeout_ms = cfg.analysis.remote_timeout_ms;
    let start = dev.clock.now_ms();
    let response = loop {
        if let Some(message) = remote.poll() {
            if correlates(&message, id) {
                break message;
            }
            debug!("ignoring response for another request");
            continue;
        }
        if timeout_ms > 0 && dev.clock.now_ms().saturating_sub(start) >= timeout_ms {
            warn!("no remote answer after {timeout_ms} ms, analysing locally");
            return local_record(id, ppi, cfg);
        }
        dev.clock.sleep_ms(cfg.analysis.remote_poll_ms);
    };

    MetricsRecord::remote(id, id, &parse_response(&response))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::AnalysisKind;

    #[test]
    fn local_record_needs_enough_intervals() {
        let cfg = SessionConfig::default();
        let record = local_record(9, &PpiSeries::new(vec![800.0; 12]), &cfg).unwrap();
        assert_eq!(record.kind, AnalysisKind::Local);
        assert_eq!(record.mean_hr, 75);
        let err = local_record(9, &PpiSeries::new(vec![800.0; 4]), &cfg).unwrap_err();
        assert!(matches!(err, SessionError::Analysis(_)));
    }

    #[test]
    fn capture_buffers_clear() {
        let mut buffers = CaptureBuffers {
            samples: vec![1, 2],
            ppi: PpiSeries::new(vec![900.0]),
        };
        buffers.clear();
        assert!(buffers.samples.is_empty() && buffers.ppi.is_empty());
    }

    #[test]
    fn drain_counts_moved_samples() {
        let feed = SampleFeed::new(16);
        feed.restart();
        let mut buffers = CaptureBuffers::default();
        assert_eq!(buffers.drain(&feed), 0);
        for s in [10, 20, 30] {
            feed.on_tick(s);
        }
        assert_eq!(buffers.drain(&feed), 3);
        assert_eq!(buffers.samples, vec![10, 20, 30]);
        assert_eq!(buffers.drain(&feed), 0);
    }
}
