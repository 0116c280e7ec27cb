use super::{SessionBuffers, Teardown};
use crate::{
    config::SessionConfig,
    device::{wait_for_press, Devices},
};
use log::{debug, info};
use pulse_lib::{
    metrics::live::BpmTracker, pipeline::extract_ppi, ring::SampleFeed, signal::Sample,
};
use serde::Serialize;
use std::collections::VecDeque;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LivePhase {
    Idle,
    Armed,
    Running,
    Stopped,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LiveReport {
    /// Last accepted BPM, if any update succeeded.
    pub final_bpm: Option<u32>,
    /// Number of accepted BPM updates.
    pub updates: usize,
}

#[derive(Debug, Default)]
struct LiveBuffers {
    samples: Vec<Sample>,
    waveform: VecDeque<Sample>,
    tracker: BpmTracker,
}

impl SessionBuffers for LiveBuffers {
    fn clear(&mut self) {
        self.samples.clear();
        self.waveform.clear();
        self.tracker.clear();
    }
}

impl LiveBuffers {
    /// Move everything queued into the window, keeping only the newest `window` samples.
    fn drain(&mut self, feed: &SampleFeed, window: usize) {
        while let Some(sample) = feed.pop() {
            self.samples.push(sample);
        }
        if self.samples.len() > window {
            let excess = self.samples.len() - window;
            self.samples.drain(..excess);
        }
    }

    /// Append to the rolling waveform and return its (min, max).
    fn scroll(&mut self, value: Sample, width: usize) -> (Sample, Sample) {
        self.waveform.push_back(value);
        while self.waveform.len() > width {
            self.waveform.pop_front();
        }
        let min = self.waveform.iter().copied().min().unwrap_or(value);
        let max = self.waveform.iter().copied().max().unwrap_or(value);
        (min, max)
    }
}

/// Continuous heart-rate display, stopped only by a button press.
pub struct LiveSession<'a> {
    feed: &'a SampleFeed,
    cfg: &'a SessionConfig,
    phase: LivePhase,
    buffers: LiveBuffers,
}

impl<'a> LiveSession<'a> {
    pub fn new(feed: &'a SampleFeed, cfg: &'a SessionConfig) -> Self {
        Self {
            feed,
            cfg,
            phase: LivePhase::Idle,
            buffers: LiveBuffers {
                tracker: BpmTracker::new(cfg.live.bpm),
                ..LiveBuffers::default()
            },
        }
    }

    pub fn phase(&self) -> LivePhase {
        self.phase
    }

    pub fn run(&mut self, dev: &mut Devices<'_>) -> LiveReport {
        let (feed, cfg) = (self.feed, self.cfg);
        let live = &cfg.live;
        let window = cfg.live_window_samples();
        let poll_ms = cfg.press_poll_ms;

        self.phase = LivePhase::Armed;
        dev.display.centered_texts(&["Live HR", " ", "Press to start"]);
        wait_for_press(dev.input, dev.clock, poll_ms);

        let width = (dev.display.width() / live.waveform_x_scale.max(1)).max(1);
        let mut scope = Teardown::begin(feed, &mut self.buffers);
        self.phase = LivePhase::Running;
        info!("live HR recording started");
        dev.display.clear();

        let start = dev.clock.now_ms();
        let (mut last_bpm_update, mut last_heading, mut last_waveform) = (start, start, start);
        let mut updates = 0;

        while !dev.input.single_press() {
            scope.drain(feed, window);
            let now = dev.clock.now_ms();

            if now.saturating_sub(last_waveform) >= live.waveform_refresh_ms {
                if let Some(&newest) = scope.samples.last() {
                    let (min, max) = scope.scroll(newest, width);
                    dev.display.draw_waveform(newest, min, max);
                    last_waveform = now;
                }
            }

            if scope.samples.len() >= window
                && now.saturating_sub(last_bpm_update) >= live.bpm_update_interval_ms
            {
                let (peaks, ppi) = extract_ppi(&scope.samples, &cfg.pipeline);
                scope.samples.clear();
                debug!("live window: {} peaks, {} intervals", peaks.len(), ppi.len());
                match scope.tracker.ingest(&ppi) {
                    Some(bpm) => {
                        debug!("BPM updated to {bpm}");
                        updates += 1;
                        last_bpm_update = now;
                    }
                    None => debug!("no BPM update"),
                }
            }

            if now.saturating_sub(last_heading) >= live.heading_refresh_ms {
                dev.display.heading("HR", &bpm_text(scope.tracker.bpm()));
                last_heading = now;
            }
        }

        let final_bpm = scope.tracker.bpm();
        let dropped = feed.ring().dropped();
        drop(scope);
        self.phase = LivePhase::Stopped;
        if dropped > 0 {
            debug!("{dropped} samples overwritten during live session");
        }
        info!("live HR recording stopped");

        let text = bpm_text(final_bpm);
        dev.display
            .centered_texts(&["Final HR", " ", text.as_str(), " ", "Press to exit"]);
        wait_for_press(dev.input, dev.clock, poll_ms);

        LiveReport { final_bpm, updates }
    }
}

fn bpm_text(bpm: Option<u32>) -> String {
    match bpm {
        Some(bpm) => format!("{bpm} BPM"),
        None => "---".to_string(),
    }
}
