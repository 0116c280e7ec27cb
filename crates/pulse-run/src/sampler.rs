//! Fixed-period producer feeding the sample queue.

use anyhow::{Context, Result};
use log::debug;
use pulse_lib::{ring::SampleFeed, signal::Sample, synth::SyntheticPpg};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// Analog front end read once per tick.
pub trait SampleSource: Send + 'static {
    fn read_u16(&mut self) -> Sample;
}

impl SampleSource for SyntheticPpg {
    fn read_u16(&mut self) -> Sample {
        self.next_sample()
    }
}

/// Background timer calling [`SampleFeed::on_tick`] every `period`.
///
/// Ticks are scheduled against absolute deadlines, so a late wake-up is made
/// up by ticking back-to-back rather than drifting.
pub struct Sampler {
    running: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl Sampler {
    pub fn start<S: SampleSource>(
        mut source: S,
        feed: Arc<SampleFeed>,
        period: Duration,
    ) -> Result<Self> {
        let running = Arc::new(AtomicBool::new(true));
        let flag = Arc::clone(&running);
        let handle = thread::Builder::new()
            .name("pulse-sampler".into())
            .spawn(move || {
                let start = Instant::now();
                let mut ticks: u32 = 0;
                while flag.load(Ordering::Relaxed) {
                    ticks = ticks.wrapping_add(1);
                    let deadline = start + period * ticks;
                    let now = Instant::now();
                    if deadline > now {
                        thread::sleep(deadline - now);
                    }
                    feed.on_tick(source.read_u16());
                }
                debug!("sampler stopped after {ticks} ticks");
            })
            .context("spawning sampler thread")?;
        Ok(Self {
            running,
            handle: Some(handle),
        })
    }

    pub fn stop(&mut self) {
        self.running.store(false, Ordering::Relaxed);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for Sampler {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Counter(u16);

    impl SampleSource for Counter {
        fn read_u16(&mut self) -> Sample {
            self.0 = self.0.wrapping_add(1);
            self.0
        }
    }

    #[test]
    fn ticks_into_recording_feed() {
        let feed = Arc::new(SampleFeed::new(256));
        feed.resume();
        let mut sampler =
            Sampler::start(Counter(0), Arc::clone(&feed), Duration::from_millis(1)).unwrap();
        thread::sleep(Duration::from_millis(50));
        sampler.stop();
        let drained: Vec<Sample> = std::iter::from_fn(|| feed.pop()).collect();
        assert!(drained.len() >= 10, "only {} samples", drained.len());
        assert!(drained.windows(2).all(|w| w[1] == w[0] + 1));
    }

    #[test]
    fn paused_feed_collects_nothing() {
        let feed = Arc::new(SampleFeed::new(64));
        let sampler =
            Sampler::start(Counter(0), Arc::clone(&feed), Duration::from_millis(1)).unwrap();
        thread::sleep(Duration::from_millis(20));
        drop(sampler);
        assert!(!feed.has_data());
    }
}
