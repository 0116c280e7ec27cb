//! Boundaries to the device's display, button, and clock.

use pulse_lib::signal::Sample;
use std::thread;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

/// Output sink. Sessions never read anything back from it.
pub trait Display {
    /// Width in pixels, used to size the scrolling waveform.
    fn width(&self) -> usize;
    fn clear(&mut self);
    /// Single header line with a left and a right part; the rest of the screen is kept.
    fn heading(&mut self, left: &str, right: &str);
    fn texts(&mut self, lines: &[&str]);
    fn centered_texts(&mut self, lines: &[&str]);
    /// Advance the waveform by one column, scaled between `min` and `max`.
    fn draw_waveform(&mut self, value: Sample, min: Sample, max: Sample);
}

/// Debounced button. Returns `true` once per physical press.
pub trait Input {
    fn single_press(&mut self) -> bool;
}

pub trait Clock {
    /// Monotonic milliseconds.
    fn now_ms(&self) -> u64;
    fn sleep_ms(&self, ms: u64);
    /// Wall-clock seconds, used for record identifiers.
    fn unix_secs(&self) -> u64;
}

/// The three device boundaries a session drives.
pub struct Devices<'a> {
    pub display: &'a mut dyn Display,
    pub input: &'a mut dyn Input,
    pub clock: &'a dyn Clock,
}

/// Block until the button is pressed, sleeping `poll_ms` between checks.
pub fn wait_for_press(input: &mut dyn Input, clock: &dyn Clock, poll_ms: u64) {
    while !input.single_press() {
        clock.sleep_ms(poll_ms);
    }
}

#[derive(Debug, Clone)]
pub struct SystemClock {
    start: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now_ms(&self) -> u64 {
        self.start.elapsed().as_millis() as u64
    }

    fn sleep_ms(&self, ms: u64) {
        thread::sleep(Duration::from_millis(ms));
    }

    fn unix_secs(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0)
    }
}
