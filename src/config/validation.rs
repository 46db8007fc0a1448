use super::defaults::{
    MAX_CHANNELS, MAX_CHUNK_FRAMES, MAX_SAMPLE_RATE, MAX_WINDOW_SCALE, MIN_CHANNELS,
    MIN_CHUNK_FRAMES, MIN_SAMPLE_RATE,
};
use super::{AppConfig, FileOverrides};
use anyhow::{bail, Context, Result};
use clap::Parser;
use std::fs;
use std::path::Path;

impl AppConfig {
    /// Parse CLI arguments, apply the optional config file, and validate.
    pub fn parse_args() -> Result<Self> {
        let mut config = Self::parse();
        if let Some(path) = config.config_file.clone() {
            config.apply_file(&path)?;
        }
        config.validate()?;
        Ok(config)
    }

    /// Overlay values from a YAML file onto the parsed flags.
    pub fn apply_file(&mut self, path: &Path) -> Result<()> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        let overrides: FileOverrides = serde_yaml::from_str(&raw)
            .with_context(|| format!("invalid config file {}", path.display()))?;
        self.apply_overrides(overrides);
        Ok(())
    }

    pub(super) fn apply_overrides(&mut self, overrides: FileOverrides) {
        let FileOverrides {
            input_device,
            sample_format,
            channels,
            sample_rate,
            chunk_frames,
            auto_split,
            auto_rename,
            convert_flac,
            ffmpeg_cmd,
            silence_threshold,
            silence_split_secs,
            min_record_secs,
            window_scale,
            recordings_dir,
            songs_dir,
        } = overrides;

        if input_device.is_some() {
            self.input_device = input_device;
        }
        if let Some(value) = sample_format {
            self.sample_format = value;
        }
        if let Some(value) = channels {
            self.channels = value;
        }
        if let Some(value) = sample_rate {
            self.sample_rate = value;
        }
        if let Some(value) = chunk_frames {
            self.chunk_frames = value;
        }
        if let Some(value) = auto_split {
            self.auto_split = value;
        }
        if let Some(value) = auto_rename {
            self.auto_rename = value;
        }
        if let Some(value) = convert_flac {
            self.convert_flac = value;
        }
        if let Some(value) = ffmpeg_cmd {
            self.ffmpeg_cmd = value;
        }
        if let Some(value) = silence_threshold {
            self.silence_threshold = value;
        }
        if let Some(value) = silence_split_secs {
            self.silence_split_secs = value;
        }
        if let Some(value) = min_record_secs {
            self.min_record_secs = value;
        }
        if let Some(value) = window_scale {
            self.window_scale = value;
        }
        if let Some(value) = recordings_dir {
            self.recordings_dir = value;
        }
        if let Some(value) = songs_dir {
            self.songs_dir = value;
        }
    }

    /// Check ranges so downstream math and the device open cannot be fed
    /// nonsense values.
    pub fn validate(&mut self) -> Result<()> {
        if !(MIN_CHANNELS..=MAX_CHANNELS).contains(&self.channels) {
            bail!(
                "--channels must be between {MIN_CHANNELS} and {MAX_CHANNELS}, got {}",
                self.channels
            );
        }
        if !(MIN_SAMPLE_RATE..=MAX_SAMPLE_RATE).contains(&self.sample_rate) {
            bail!(
                "--sample-rate must be between {MIN_SAMPLE_RATE} and {MAX_SAMPLE_RATE} Hz, got {}",
                self.sample_rate
            );
        }
        if !(MIN_CHUNK_FRAMES..=MAX_CHUNK_FRAMES).contains(&self.chunk_frames) {
            bail!(
                "--chunk-frames must be between {MIN_CHUNK_FRAMES} and {MAX_CHUNK_FRAMES}, got {}",
                self.chunk_frames
            );
        }
        if !self.silence_threshold.is_finite() || !(0.0..=1.0).contains(&self.silence_threshold) {
            bail!(
                "--silence-threshold must be between 0.0 and 1.0, got {}",
                self.silence_threshold
            );
        }
        if !self.silence_split_secs.is_finite() || self.silence_split_secs <= 0.0 {
            bail!(
                "--silence-split-secs must be positive, got {}",
                self.silence_split_secs
            );
        }
        if !self.min_record_secs.is_finite() || self.min_record_secs < 0.0 {
            bail!(
                "--min-record-secs must be zero or positive, got {}",
                self.min_record_secs
            );
        }
        if !(1..=MAX_WINDOW_SCALE).contains(&self.window_scale) {
            bail!(
                "--window-scale must be between 1 and {MAX_WINDOW_SCALE}, got {}",
                self.window_scale
            );
        }

        self.ffmpeg_cmd = self.ffmpeg_cmd.trim().to_string();
        if self.ffmpeg_cmd.is_empty() {
            bail!("--ffmpeg-cmd must not be empty");
        }
        Ok(())
    }
}
