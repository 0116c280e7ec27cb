//! Lock-free sample queue between the sampling timer and the session loop.
//!
//! One producer (timer callback) and one consumer (the active session). The
//! producer never blocks: when the queue is full the oldest unread sample is
//! overwritten and the consumer skips past it on its next read.

use crate::signal::Sample;
use std::hint;
use std::sync::atomic::{fence, AtomicBool, AtomicU16, AtomicUsize, Ordering};

/// Fixed-capacity overwrite-on-full SPSC ring of samples.
///
/// Positions are monotonically increasing sequence numbers; the slot of a
/// position is `pos % capacity`. `reserved` is bumped before a slot is written
/// and `committed` after, so a reader can detect a slot that was overwritten
/// while it was being read.
#[derive(Debug)]
pub struct RingBuffer {
    slots: Box<[AtomicU16]>,
    reserved: AtomicUsize,
    committed: AtomicUsize,
    read: AtomicUsize,
    dropped: AtomicUsize,
}

impl RingBuffer {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let slots: Vec<AtomicU16> = (0..capacity).map(|_| AtomicU16::new(0)).collect();
        Self {
            slots: slots.into_boxed_slice(),
            reserved: AtomicUsize::new(0),
            committed: AtomicUsize::new(0),
            read: AtomicUsize::new(0),
            dropped: AtomicUsize::new(0),
        }
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Producer side. O(1), never fails.
    pub fn push(&self, sample: Sample) {
        let pos = self.committed.load(Ordering::Relaxed);
        self.reserved.store(pos.wrapping_add(1), Ordering::Relaxed);
        fence(Ordering::Release);
        self.slots[pos % self.capacity()].store(sample, Ordering::Relaxed);
        self.committed.store(pos.wrapping_add(1), Ordering::Release);
    }

    /// Consumer side. Returns the oldest sample that has not been overwritten.
    pub fn pop(&self) -> Option<Sample> {
        let cap = self.capacity();
        loop {
            let committed = self.committed.load(Ordering::Acquire);
            let mut read = self.read.load(Ordering::Relaxed);
            let pending = committed.wrapping_sub(read);
            if pending == 0 {
                return None;
            }
            if pending > cap {
                let lost = pending - cap;
                self.dropped.fetch_add(lost, Ordering::Relaxed);
                read = read.wrapping_add(lost);
            }
            let value = self.slots[read % cap].load(Ordering::Relaxed);
            fence(Ordering::Acquire);
            let reserved = self.reserved.load(Ordering::Relaxed);
            let ahead = reserved.wrapping_sub(read);
            if ahead > cap {
                // slot was reused while we read it
                let lost = ahead - cap;
                self.dropped.fetch_add(lost, Ordering::Relaxed);
                self.read.store(read.wrapping_add(lost), Ordering::Relaxed);
                continue;
            }
            self.read.store(read.wrapping_add(1), Ordering::Release);
            return Some(value);
        }
    }

    pub fn has_data(&self) -> bool {
        self.len() > 0
    }

    /// Number of unread samples, never more than `capacity`.
    pub fn len(&self) -> usize {
        let committed = self.committed.load(Ordering::Acquire);
        let read = self.read.load(Ordering::Relaxed);
        committed.wrapping_sub(read).min(self.capacity())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Samples overwritten before the consumer reached them since the last reset.
    pub fn dropped(&self) -> usize {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Clear all positions. Only sound while the producer is paused.
    pub fn reset(&self) {
        self.reserved.store(0, Ordering::Relaxed);
        self.committed.store(0, Ordering::Relaxed);
        self.read.store(0, Ordering::Relaxed);
        self.dropped.store(0, Ordering::Relaxed);
        fence(Ordering::SeqCst);
    }
}

/// Gated producer entry point: the timer callback calls [`SampleFeed::on_tick`]
/// and sessions pause, reset, and resume it around their runs.
#[derive(Debug)]
pub struct SampleFeed {
    ring: RingBuffer,
    recording: AtomicBool,
    in_tick: AtomicBool,
}

impl SampleFeed {
    pub fn new(capacity: usize) -> Self {
        Self {
            ring: RingBuffer::new(capacity),
            recording: AtomicBool::new(false),
            in_tick: AtomicBool::new(false),
        }
    }

    pub fn ring(&self) -> &RingBuffer {
        &self.ring
    }

    /// Timer callback body. Drops the sample when recording is paused.
    pub fn on_tick(&self, sample: Sample) {
        self.in_tick.store(true, Ordering::SeqCst);
        if self.recording.load(Ordering::SeqCst) {
            self.ring.push(sample);
        }
        self.in_tick.store(false, Ordering::SeqCst);
    }

    pub fn is_recording(&self) -> bool {
        self.recording.load(Ordering::SeqCst)
    }

    /// Stop accepting samples and wait out a tick already in flight.
    pub fn pause(&self) {
        self.recording.store(false, Ordering::SeqCst);
        while self.in_tick.load(Ordering::SeqCst) {
            hint::spin_loop();
        }
    }

    pub fn resume(&self) {
        self.recording.store(true, Ordering::SeqCst);
    }

    /// pause → reset → resume
    pub fn restart(&self) {
        self.pause();
        self.ring.reset();
        self.resume();
    }

    pub fn pop(&self) -> Option<Sample> {
        self.ring.pop()
    }

    pub fn has_data(&self) -> bool {
        self.ring.has_data()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn fifo_order() {
        let ring = RingBuffer::new(8);
        for s in [3, 1, 4, 1, 5] {
            ring.push(s);
        }
        let out: Vec<_> = std::iter::from_fn(|| ring.pop()).collect();
        assert_eq!(out, vec![3, 1, 4, 1, 5]);
        assert!(!ring.has_data());
        assert_eq!(ring.pop(), None);
    }

    #[test]
    fn overwrite_drops_oldest() {
        let ring = RingBuffer::new(4);
        for s in 1..=5 {
            ring.push(s);
        }
        assert_eq!(ring.len(), 4);
        assert_eq!(ring.pop(), Some(2));
        assert_eq!(ring.dropped(), 1);
        assert_eq!(ring.len(), 3);
    }

    #[test]
    fn sustained_overload_keeps_latest_window() {
        let ring = RingBuffer::new(16);
        for s in 0..1000u16 {
            ring.push(s);
        }
        let out: Vec<_> = std::iter::from_fn(|| ring.pop()).collect();
        assert_eq!(out, (984..1000).collect::<Vec<_>>());
    }

    #[test]
    fn reset_empties_ring() {
        let ring = RingBuffer::new(4);
        ring.push(1);
        ring.push(2);
        ring.reset();
        assert!(ring.is_empty());
        assert_eq!(ring.pop(), None);
        ring.push(9);
        assert_eq!(ring.pop(), Some(9));
    }

    #[test]
    fn paused_feed_ignores_ticks() {
        let feed = SampleFeed::new(8);
        feed.on_tick(1);
        assert!(!feed.has_data());
        feed.resume();
        feed.on_tick(2);
        feed.pause();
        feed.on_tick(3);
        assert_eq!(feed.pop(), Some(2));
        assert_eq!(feed.pop(), None);
    }

    #[test]
    fn restart_discards_stale_samples() {
        let feed = SampleFeed::new(8);
        feed.resume();
        feed.on_tick(10);
        feed.on_tick(11);
        feed.restart();
        assert!(feed.is_recording());
        assert!(!feed.has_data());
        feed.on_tick(12);
        assert_eq!(feed.pop(), Some(12));
    }

    #[test]
    fn concurrent_reader_sees_increasing_values() {
        let feed = Arc::new(SampleFeed::new(64));
        feed.resume();
        let producer = {
            let feed = Arc::clone(&feed);
            thread::spawn(move || {
                for s in 0..20_000u32 {
                    feed.on_tick((s % 60_000) as u16);
                }
            })
        };
        let mut last: Option<u16> = None;
        let mut seen = 0usize;
        while !producer.is_finished() || feed.has_data() {
            if let Some(v) = feed.pop() {
                if let Some(prev) = last {
                    assert!(v > prev, "{v} after {prev}");
                }
                last = Some(v);
                seen += 1;
            }
        }
        producer.join().unwrap();
        assert!(seen > 0);
    }
}
