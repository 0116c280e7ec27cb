#![allow(dead_code)]

use anyhow::{bail, Result};
use pulse_lib::{ring::SampleFeed, signal::Sample, synth::SyntheticPpg};
use pulse_run::{
    device::{Clock, Display, Input},
    history::RecordStore,
    remote::{loopback_response, RemoteAnalysis, REQUEST_TOPIC},
    MetricsRecord,
};
use pulse_lib::metrics::hrv::HrvConfig;
use serde_json::{json, Value};
use std::cell::Cell;
use std::collections::VecDeque;

pub const EPOCH: u64 = 1_700_000_000;

/// Advances 4 ms (one sample period) on every read; sleeping adds to it.
#[derive(Default)]
pub struct StepClock {
    now: Cell<u64>,
    slept: Cell<u64>,
}

impl StepClock {
    /// Total milliseconds spent in `sleep_ms`.
    pub fn slept_ms(&self) -> u64 {
        self.slept.get()
    }
}

impl Clock for StepClock {
    fn now_ms(&self) -> u64 {
        self.now.set(self.now.get() + 4);
        self.now.get()
    }
    fn sleep_ms(&self, ms: u64) {
        self.now.set(self.now.get() + ms);
        self.slept.set(self.slept.get() + ms);
    }
    fn unix_secs(&self) -> u64 {
        EPOCH + self.now.get() / 1000
    }
}

/// Plays the sampler and the user at once: every poll while the feed is
/// recording delivers one synthetic sample, prompts are confirmed as soon as
/// they are shown, and the recording is cancelled on poll `cancel_at`.
pub struct ScriptedInput<'a> {
    feed: &'a SampleFeed,
    source: SyntheticPpg,
    recording_polls: usize,
    cancel_at: usize,
}

impl<'a> ScriptedInput<'a> {
    pub fn new(feed: &'a SampleFeed, bpm: f64, cancel_at: usize) -> Self {
        Self {
            feed,
            source: SyntheticPpg::new(bpm, 4.0),
            recording_polls: 0,
            cancel_at,
        }
    }

    pub fn recording_polls(&self) -> usize {
        self.recording_polls
    }
}

impl Input for ScriptedInput<'_> {
    fn single_press(&mut self) -> bool {
        if !self.feed.is_recording() {
            return true;
        }
        self.feed.on_tick(self.source.next_sample());
        self.recording_polls += 1;
        self.recording_polls == self.cancel_at
    }
}

/// Confirms prompts but never delivers a sample: a sensor with nothing attached.
pub struct IdleSensor<'a> {
    pub feed: &'a SampleFeed,
}

impl Input for IdleSensor<'_> {
    fn single_press(&mut self) -> bool {
        !self.feed.is_recording()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Frame {
    Clear,
    Heading(String, String),
    Texts(Vec<String>),
    Centered(Vec<String>),
}

#[derive(Default)]
pub struct RecordingDisplay {
    pub frames: Vec<Frame>,
    pub waveform_points: usize,
}

impl RecordingDisplay {
    pub fn centered(&self) -> Vec<Vec<String>> {
        self.frames
            .iter()
            .filter_map(|f| match f {
                Frame::Centered(lines) => Some(lines.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn headings(&self) -> Vec<String> {
        self.frames
            .iter()
            .filter_map(|f| match f {
                Frame::Heading(_, right) => Some(right.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn last_texts(&self) -> Option<Vec<String>> {
        self.frames.iter().rev().find_map(|f| match f {
            Frame::Texts(lines) => Some(lines.clone()),
            _ => None,
        })
    }
}

fn owned(lines: &[&str]) -> Vec<String> {
    lines.iter().map(|l| l.to_string()).collect()
}

impl Display for RecordingDisplay {
    fn width(&self) -> usize {
        128
    }
    fn clear(&mut self) {
        self.frames.push(Frame::Clear);
    }
    fn heading(&mut self, left: &str, right: &str) {
        self.frames.push(Frame::Heading(left.into(), right.into()));
    }
    fn texts(&mut self, lines: &[&str]) {
        self.frames.push(Frame::Texts(owned(lines)));
    }
    fn centered_texts(&mut self, lines: &[&str]) {
        self.frames.push(Frame::Centered(owned(lines)));
    }
    fn draw_waveform(&mut self, _value: Sample, min: Sample, max: Sample) {
        assert!(min <= max);
        self.waveform_points += 1;
    }
}

#[derive(Default)]
pub struct MemoryStore {
    pub records: Vec<MetricsRecord>,
    pub fail: bool,
}

impl RecordStore for MemoryStore {
    fn save(&mut self, record: &MetricsRecord) -> Result<()> {
        if self.fail {
            bail!("disk full");
        }
        self.records.push(record.clone());
        Ok(())
    }
}

/// How [`ScriptedRemote`] answers a request.
pub enum Reply {
    /// Score the request like the service would.
    Scored,
    /// Answer with only these `data.analysis` fields.
    Partial(Value),
    /// Never answer.
    Silent,
}

/// Synchronous remote: answers are queued the moment a request is published.
pub struct ScriptedRemote {
    reply: Reply,
    /// Queue a response for some other request ahead of the real one.
    pub stale_first: bool,
    pub published: Vec<(String, Value)>,
    inbox: VecDeque<Value>,
}

impl ScriptedRemote {
    pub fn new(reply: Reply) -> Self {
        Self {
            reply,
            stale_first: false,
            published: Vec::new(),
            inbox: VecDeque::new(),
        }
    }

    pub fn topics(&self) -> Vec<&str> {
        self.published.iter().map(|(t, _)| t.as_str()).collect()
    }
}

impl RemoteAnalysis for ScriptedRemote {
    fn publish(&mut self, topic: &str, payload: &Value) -> Result<()> {
        self.published.push((topic.to_string(), payload.clone()));
        if topic != REQUEST_TOPIC {
            return Ok(());
        }
        let id = payload["id"].clone();
        if self.stale_first {
            self.inbox.push_back(json!({
                "id": 1,
                "data": { "analysis": { "mean_rr_ms": 1.0 } }
            }));
        }
        match &self.reply {
            Reply::Scored => {
                if let Some(response) = loopback_response(payload, &HrvConfig::default()) {
                    self.inbox.push_back(response);
                }
            }
            Reply::Partial(analysis) => self
                .inbox
                .push_back(json!({ "id": id, "data": { "analysis": analysis } })),
            Reply::Silent => {}
        }
        Ok(())
    }

    fn poll(&mut self) -> Option<Value> {
        self.inbox.pop_front()
    }

    fn is_connected(&self) -> bool {
        true
    }
}
