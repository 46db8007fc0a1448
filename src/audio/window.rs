//! Amplitude windowing and the rolling waveform shared with the display.
//!
//! Decoded mono samples are staged until a full window is available, then
//! exactly one window is popped from the front and reduced to a single
//! amplitude. Windows never overlap, never skip samples, and are emitted in
//! arrival order.

use crate::audio::SampleFormat;
use serde::Serialize;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

/// Windows cover `sample_rate / 100 * scale` samples (~10ms × scale).
const WINDOW_BASE_DIVISOR: u32 = 100;

pub struct AmplitudeWindower {
    window_samples: usize,
    window_secs: f64,
    normalizer: f32,
    staged: Vec<f32>,
}

impl AmplitudeWindower {
    pub fn new(format: SampleFormat, sample_rate: u32, scale: u32) -> Self {
        let window_samples = ((sample_rate / WINDOW_BASE_DIVISOR).max(1) * scale.max(1)) as usize;
        // Integer amplitudes are divided by the format's peak-to-peak range;
        // float capture is already on the [-1,1] scale.
        let normalizer = if format.is_float() {
            1.0
        } else {
            format.full_scale() * 2.0
        };
        Self {
            window_samples,
            window_secs: window_samples as f64 / sample_rate as f64,
            normalizer,
            staged: Vec::with_capacity(window_samples),
        }
    }

    /// Wall-clock span of one window, in seconds.
    pub fn window_seconds(&self) -> f64 {
        self.window_secs
    }

    pub fn window_samples(&self) -> usize {
        self.window_samples
    }

    /// Samples staged but not yet covered by an emitted window.
    pub fn staged_len(&self) -> usize {
        self.staged.len()
    }

    /// Stage decoded samples and emit one amplitude per complete window.
    ///
    /// Amplitude is |max − min| over the window, normalized by twice the
    /// format's full scale and clamped so the published value stays in [0,1]
    /// (a window spanning both integer extremes overshoots by one LSB).
    pub fn push(&mut self, samples: &[f32]) -> Vec<f32> {
        self.staged.extend_from_slice(samples);

        let mut amplitudes = Vec::new();
        while self.staged.len() >= self.window_samples {
            let window = &self.staged[..self.window_samples];
            let mut min = f32::INFINITY;
            let mut max = f32::NEG_INFINITY;
            for &sample in window {
                min = min.min(sample);
                max = max.max(sample);
            }
            amplitudes.push(((max - min).abs() / self.normalizer).clamp(0.0, 1.0));
            self.staged.drain(..self.window_samples);
        }
        amplitudes
    }
}

/// Bounded FIFO of the most recent window amplitudes, display-only state.
#[derive(Debug, Clone)]
pub struct WaveformBuffer {
    values: VecDeque<f32>,
    capacity: usize,
}

impl WaveformBuffer {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            values: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn push(&mut self, amplitude: f32) {
        if self.values.len() == self.capacity {
            self.values.pop_front();
        }
        self.values.push_back(amplitude);
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn amplitudes(&self) -> Vec<f32> {
        self.values.iter().copied().collect()
    }
}

/// Immutable view of the waveform published for rendering.
#[derive(Debug, Clone, Default, Serialize)]
pub struct WaveformSnapshot {
    pub amplitudes: Vec<f32>,
    pub elapsed_secs: f64,
}

/// Copy-on-read handoff between the capture thread and the display.
///
/// The capture thread replaces the snapshot; readers clone it out. Neither
/// side ever holds the lock across rendering or I/O.
#[derive(Debug, Clone, Default)]
pub struct WaveformFeed {
    inner: Arc<Mutex<WaveformSnapshot>>,
}

impl WaveformFeed {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn publish(&self, buffer: &WaveformBuffer, elapsed_secs: f64) {
        let snapshot = WaveformSnapshot {
            amplitudes: buffer.amplitudes(),
            elapsed_secs,
        };
        *self
            .inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = snapshot;
    }

    pub fn snapshot(&self) -> WaveformSnapshot {
        self.inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}
