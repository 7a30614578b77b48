// Copyright (C) 2026 Michael Wilson <mike@mdwn.dev>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//

//! The shared sample buffer and its publish/retire handoff.
//!
//! A [`SampleBuffer`] is immutable once built. Replacing it goes through
//! [`BufferHandle::publish`]: the new buffer is constructed off the audio
//! thread, swapped in atomically, and the old one is parked on a retired list
//! until nothing but the handle still references it. Freeing only ever
//! happens on the control thread.

use std::sync::Arc;
use std::time::Duration;

use arc_swap::{ArcSwap, Guard};
use parking_lot::Mutex;
use tracing::debug;

use super::error::SamplerError;

/// Mono audio frames loaded into memory for playback.
#[derive(Debug)]
pub struct SampleBuffer {
    /// Name of the sample, as shown to the user.
    name: String,
    /// The frames, one f32 per frame.
    frames: Vec<f32>,
    /// Sample rate of the source material.
    sample_rate: u32,
    /// Maximum number of frames this buffer may hold.
    max_capacity: usize,
}

impl SampleBuffer {
    /// Creates a buffer, rejecting frame counts above `max_capacity`.
    pub fn new(
        name: &str,
        frames: Vec<f32>,
        sample_rate: u32,
        max_capacity: usize,
    ) -> Result<Self, SamplerError> {
        if frames.len() > max_capacity {
            return Err(SamplerError::TooLarge {
                name: name.to_string(),
                frames: frames.len(),
                capacity: max_capacity,
            });
        }
        Ok(Self {
            name: name.to_string(),
            frames,
            sample_rate,
            max_capacity,
        })
    }

    /// Creates an empty buffer, used before the first successful load.
    pub fn empty(sample_rate: u32, max_capacity: usize) -> Self {
        Self {
            name: String::new(),
            frames: Vec::new(),
            sample_rate,
            max_capacity,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Raw frames, for waveform display.
    pub fn frames(&self) -> &[f32] {
        &self.frames
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn max_capacity(&self) -> usize {
        self.max_capacity
    }

    /// Index of the last frame, or 0 for an empty buffer.
    pub fn last_frame(&self) -> usize {
        self.frames.len().saturating_sub(1)
    }

    pub fn duration(&self) -> Duration {
        if self.sample_rate == 0 {
            return Duration::ZERO;
        }
        Duration::from_secs_f64(self.frames.len() as f64 / self.sample_rate as f64)
    }

    /// Reads the buffer at a fractional frame position, linearly interpolating
    /// between the two nearest frames. Positions past the end read silence.
    #[inline]
    pub fn sample_at(&self, position: f64) -> f32 {
        if position < 0.0 {
            return 0.0;
        }
        let index = position as usize;
        let frac = (position - index as f64) as f32;
        let s0 = self.frames.get(index).copied().unwrap_or(0.0);
        let s1 = self.frames.get(index + 1).copied().unwrap_or(s0);
        s0 + (s1 - s0) * frac
    }
}

/// Atomically swappable holder for the active [`SampleBuffer`].
pub struct BufferHandle {
    /// The published buffer.
    current: ArcSwap<SampleBuffer>,
    /// Buffers that have been replaced but may still be referenced.
    retired: Mutex<Vec<Arc<SampleBuffer>>>,
}

impl BufferHandle {
    pub fn new(initial: SampleBuffer) -> Self {
        Self {
            current: ArcSwap::from_pointee(initial),
            retired: Mutex::new(Vec::new()),
        }
    }

    /// Borrows the current buffer. Lock-free and allocation-free; safe to
    /// call from the audio thread. Hold the guard for one block at most.
    #[inline]
    pub fn load(&self) -> Guard<Arc<SampleBuffer>> {
        self.current.load()
    }

    /// Returns an owned reference to the current buffer, for the UI.
    pub fn current(&self) -> Arc<SampleBuffer> {
        self.current.load_full()
    }

    /// Publishes a new buffer. The previous one is retired, not dropped.
    pub fn publish(&self, buffer: SampleBuffer) {
        let previous = self.current.swap(Arc::new(buffer));
        self.retired.lock().push(previous);
        self.collect();
    }

    /// Frees retired buffers that nothing else references any more. Returns
    /// the number of buffers freed.
    pub fn collect(&self) -> usize {
        let mut retired = self.retired.lock();
        let before = retired.len();
        retired.retain(|buffer| Arc::strong_count(buffer) > 1);
        let freed = before - retired.len();
        if freed > 0 {
            debug!(freed, pending = retired.len(), "Retired sample buffers freed");
        }
        freed
    }

    /// Number of retired buffers still waiting on a reader.
    pub fn retired_count(&self) -> usize {
        self.retired.lock().len()
    }
}

impl std::fmt::Debug for BufferHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let current = self.current.load();
        f.debug_struct("BufferHandle")
            .field("name", &current.name())
            .field("frames", &current.len())
            .field("retired", &self.retired_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capacity_is_enforced() {
        assert!(SampleBuffer::new("fits", vec![0.0; 4], 44100, 4).is_ok());
        match SampleBuffer::new("big", vec![0.0; 5], 44100, 4) {
            Err(SamplerError::TooLarge {
                frames, capacity, ..
            }) => {
                assert_eq!(frames, 5);
                assert_eq!(capacity, 4);
            }
            other => panic!("expected TooLarge, got {:?}", other),
        }
    }

    #[test]
    fn test_sample_at_interpolates() {
        let buffer = SampleBuffer::new("ramp", vec![0.0, 1.0, 2.0, 3.0], 44100, 16).unwrap();
        assert_eq!(buffer.sample_at(0.0), 0.0);
        assert_eq!(buffer.sample_at(0.5), 0.5);
        assert_eq!(buffer.sample_at(2.25), 2.25);
        assert_eq!(buffer.sample_at(3.0), 3.0);
        // The last frame holds its value; beyond it is silence.
        assert_eq!(buffer.sample_at(3.5), 3.0);
        assert_eq!(buffer.sample_at(4.0), 0.0);
        assert_eq!(buffer.sample_at(-1.0), 0.0);
    }

    #[test]
    fn test_empty_buffer() {
        let buffer = SampleBuffer::empty(48000, 100);
        assert!(buffer.is_empty());
        assert_eq!(buffer.last_frame(), 0);
        assert_eq!(buffer.sample_at(0.0), 0.0);
        assert_eq!(buffer.duration(), Duration::ZERO);
    }

    #[test]
    fn test_publish_retires_until_unreferenced() {
        let handle = BufferHandle::new(SampleBuffer::new("a", vec![1.0; 8], 44100, 8).unwrap());

        // A reader holding the old buffer keeps it alive across the publish.
        let reader = handle.current();
        handle.publish(SampleBuffer::new("b", vec![2.0; 8], 44100, 8).unwrap());
        assert_eq!(handle.load().name(), "b");
        assert_eq!(handle.retired_count(), 1);
        assert_eq!(reader.frames()[0], 1.0);

        drop(reader);
        assert_eq!(handle.collect(), 1);
        assert_eq!(handle.retired_count(), 0);
    }

    #[test]
    fn test_guard_keeps_buffer_alive() {
        let handle = BufferHandle::new(SampleBuffer::new("a", vec![1.0; 8], 44100, 8).unwrap());
        let guard = handle.load();
        handle.publish(SampleBuffer::new("b", vec![2.0; 8], 44100, 8).unwrap());
        assert_eq!(guard.frames()[7], 1.0);
        assert_eq!(handle.retired_count(), 1);
        drop(guard);
        handle.collect();
        assert_eq!(handle.retired_count(), 0);
    }
}
