//! Live monitoring and timed analysis sessions.
//!
//! Only one session may drive the sample feed at a time. Each run restarts
//! the feed, owns its accumulation buffers, and releases both through a
//! [`Teardown`] guard on every exit path.

pub mod analysis;
pub mod live;

pub use analysis::{AnalysisMode, AnalysisOutcome, AnalysisPhase, AnalysisSession};
pub use live::{LivePhase, LiveReport, LiveSession};

use pulse_lib::ring::SampleFeed;
use std::ops::{Deref, DerefMut};

/// Session-owned buffers that must be emptied when a run ends.
pub trait SessionBuffers {
    fn clear(&mut self);
}

/// Pauses the producer and clears the session buffers when dropped.
pub struct Teardown<'a, B: SessionBuffers> {
    feed: &'a SampleFeed,
    buffers: &'a mut B,
}

impl<'a, B: SessionBuffers> Teardown<'a, B> {
    /// Start a run: clear stale buffers, then restart the producer.
    pub fn begin(feed: &'a SampleFeed, buffers: &'a mut B) -> Self {
        buffers.clear();
        feed.restart();
        Self { feed, buffers }
    }
}

impl<B: SessionBuffers> Deref for Teardown<'_, B> {
    type Target = B;
    fn deref(&self) -> &B {
        self.buffers
    }
}

impl<B: SessionBuffers> DerefMut for Teardown<'_, B> {
    fn deref_mut(&mut self) -> &mut B {
        self.buffers
    }
}

impl<B: SessionBuffers> Drop for Teardown<'_, B> {
    fn drop(&mut self) {
        self.feed.pause();
        self.buffers.clear();
    }
}
