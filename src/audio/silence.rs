//! Silence episode tracking that drives automatic segment splits.
//!
//! The tracker consumes one amplitude per window together with the window's
//! duration and accumulates how long the signal has stayed below the silence
//! threshold. A split is requested once per silence episode: the tracker
//! must be re-armed by an intervening non-silent window before it can ask
//! again, so one long quiet stretch never produces back-to-back splits.

/// Thresholds for the split decision. All values are configurable defaults,
/// not invariants.
#[derive(Debug, Clone)]
pub struct SilenceConfig {
    /// Amplitude below this (on the normalized [0,1] scale) counts as silence.
    pub threshold: f32,
    /// Accumulated silence required before a split is requested (seconds).
    pub split_secs: f64,
    /// Minimum time since segment start before any split may fire (seconds).
    pub min_record_secs: f64,
}

impl Default for SilenceConfig {
    fn default() -> Self {
        Self {
            threshold: 0.01,
            split_secs: 0.5,
            min_record_secs: 10.0,
        }
    }
}

/// Per-session silence state. Survives rotations; only the per-segment
/// clock restarts (`begin_segment`) and only the armed flag is per-episode.
#[derive(Debug)]
pub struct SilenceTracker {
    cfg: SilenceConfig,
    accumulated_secs: f64,
    elapsed_secs: f64,
    armed: bool,
}

impl SilenceTracker {
    pub fn new(cfg: SilenceConfig) -> Self {
        Self {
            cfg,
            accumulated_secs: 0.0,
            elapsed_secs: 0.0,
            armed: false,
        }
    }

    /// Restart the per-segment clock after a rotation or at session start.
    pub fn begin_segment(&mut self) {
        self.elapsed_secs = 0.0;
    }

    /// Feed one window amplitude with its duration.
    ///
    /// Returns true when a split should be requested. Requests are advisory;
    /// the pipeline honors them only while auto-split is enabled.
    pub fn observe(&mut self, amplitude: f32, dt_secs: f64) -> bool {
        self.elapsed_secs += dt_secs;

        if amplitude < self.cfg.threshold {
            self.accumulated_secs += dt_secs;
        } else {
            self.accumulated_secs = 0.0;
            self.armed = true;
        }

        if self.accumulated_secs > self.cfg.split_secs
            && self.armed
            && self.elapsed_secs > self.cfg.min_record_secs
        {
            self.armed = false;
            return true;
        }
        false
    }

    pub fn accumulated_silence_secs(&self) -> f64 {
        self.accumulated_secs
    }

    pub fn segment_elapsed_secs(&self) -> f64 {
        self.elapsed_secs
    }

    pub fn is_armed(&self) -> bool {
        self.armed
    }
}
